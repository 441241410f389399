use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use buscador::config::AppConfig;
use buscador::data::{DataCache, RawTables};
use buscador::location::NormalizationPolicy;
use buscador::server::routes::route_request;
use buscador::server::{router, AppState};
use buscador::{Table, Value};

/// State over the fixture files in `data/`.
fn fixture_state() -> AppState {
    let config = AppConfig::default();
    let cache = DataCache::load(&config).expect("fixture data should load");
    AppState::new(config, cache)
}

/// State whose establishments table cannot be consolidated (no CATEGORIA column).
fn state_without_category() -> AppState {
    let row = |d: &str| {
        vec![
            ("DEPARTAMENTO", Value::text(d)),
            ("PROVINCIA", Value::text(d)),
            ("DISTRITO", Value::text(d)),
        ]
    };
    let raw = RawTables {
        establishments: Table::from_records(vec![row("LIMA")]),
        stations: Table::from_records(vec![{
            let mut r = row("LIMA");
            r.push(("COMISARIA", Value::text("Comisaria Lima")));
            r
        }]),
        locations: Table::from_records(vec![row("LIMA")]),
    };
    let cache = DataCache::from_tables(raw, NormalizationPolicy::Uppercase).expect("cache");
    AppState::new(AppConfig::default(), cache)
}

fn unique_temp_dir(name: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("buscador-{name}-{stamp}"));
    fs::create_dir_all(&dir).expect("temp dir should be created");
    dir
}

/// State over copies of the fixture files in a scratch directory.
fn scratch_state(name: &str) -> (AppState, PathBuf) {
    let dir = unique_temp_dir(name);
    for file in ["establecimientos.csv", "comisarias.csv", "ubigeos.csv"] {
        fs::copy(PathBuf::from("data").join(file), dir.join(file)).expect("fixture copy");
    }
    let mut config = AppConfig::default();
    config.reroot_sources(&dir);
    let cache = DataCache::load(&config).expect("scratch data should load");
    (AppState::new(config, cache), dir)
}

fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).expect("response should be valid json")
}

#[test]
fn health_endpoint_returns_ok_json() {
    let state = fixture_state();
    let response = route_request(&state, "GET", "/api/health", "");
    assert_eq!(response.status_code, 200);
    assert_eq!(response.content_type, "application/json");
    assert!(response.body_text().contains("\"status\": \"ok\""));
}

#[test]
fn index_page_offers_todos_and_downloads() {
    let state = fixture_state();
    let response = route_request(&state, "GET", "/", "");
    assert_eq!(response.status_code, 200);
    let body = response.body_text();
    assert!(body.contains("(Todos)"));
    assert!(body.contains("/api/download/"));
}

#[test]
fn options_cascade_from_query() {
    let state = fixture_state();

    let all = json(&route_request(&state, "GET", "/api/options", "").body_text());
    assert_eq!(
        all["departamentos"],
        serde_json::json!(["AREQUIPA", "CUSCO", "LIMA", "PUNO"])
    );
    assert_eq!(all["todos"], "(Todos)");

    let lima = json(
        &route_request(&state, "GET", "/api/options?departamento=lima", "").body_text(),
    );
    assert_eq!(lima["seleccion"]["departamento"], "LIMA");
    assert_eq!(lima["provincias"], serde_json::json!(["CAÑETE", "LIMA"]));
    assert_eq!(
        lima["distritos"],
        serde_json::json!(["LIMA", "MIRAFLORES", "SAN VICENTE DE CAÑETE", "SANTIAGO DE SURCO"])
    );

    let province_only = json(
        &route_request(&state, "GET", "/api/options?departamento=(Todos)&provincia=CUSCO", "")
            .body_text(),
    );
    assert_eq!(province_only["distritos"], serde_json::json!(["CUSCO", "WANCHAQ"]));
}

#[test]
fn options_ignore_province_outside_selected_department() {
    let state = fixture_state();
    let payload = json(
        &route_request(
            &state,
            "GET",
            "/api/options?departamento=CUSCO&provincia=LIMA&distrito=MIRAFLORES",
            "",
        )
        .body_text(),
    );
    assert_eq!(payload["provincias"], serde_json::json!(["CUSCO"]));
    assert_eq!(payload["distritos"], serde_json::json!(["CUSCO", "WANCHAQ"]));
}

#[test]
fn results_filter_both_tables_and_summarize() {
    let state = fixture_state();
    let response = route_request(
        &state,
        "GET",
        "/api/results?departamento=LIMA&provincia=LIMA&distrito=SANTIAGO%20DE%20SURCO",
        "",
    );
    assert_eq!(response.status_code, 200);
    let payload = json(&response.body_text());
    assert_eq!(payload["establecimientos"]["count"], 2);
    assert_eq!(payload["comisarias"]["count"], 2);
    assert_eq!(
        payload["resumen"],
        "Resultados: 2 servicios y 2 comisarías mostradas."
    );
    assert_eq!(payload["establecimientos"]["columns"][0], "DEPARTAMENTO");
    assert_eq!(payload["generation"], 1);
}

#[test]
fn unfiltered_results_return_every_row() {
    let state = fixture_state();
    let payload = json(&route_request(&state, "GET", "/api/results", "").body_text());
    assert_eq!(payload["establecimientos"]["count"], 7);
    assert_eq!(payload["comisarias"]["count"], 5);
}

#[test]
fn empty_selection_is_not_an_error() {
    let state = fixture_state();
    let response = route_request(&state, "GET", "/api/results?departamento=LORETO", "");
    assert_eq!(response.status_code, 200);
    let payload = json(&response.body_text());
    assert_eq!(payload["establecimientos"]["count"], 0);
    assert_eq!(payload["comisarias"]["count"], 0);
    assert!(payload["establecimientos"]["columns"].as_array().is_some_and(|c| !c.is_empty()));

    let download = route_request(
        &state,
        "GET",
        "/api/download/comisarias?formato=csv&departamento=LORETO",
        "",
    );
    assert_eq!(download.status_code, 200);
    assert_eq!(
        download.body_text(),
        "DEPARTAMENTO,PROVINCIA,DISTRITO,COMISARIA,DIRECCION,TELEFONO\n"
    );
}

#[test]
fn consolidated_endpoint_tags_rows() {
    let state = fixture_state();
    let payload = json(
        &route_request(&state, "GET", "/api/consolidated?departamento=CUSCO", "").body_text(),
    );
    let table = &payload["consolidado"];
    assert_eq!(table["columns"][0], "TIPO");
    assert_eq!(table["count"], 3);
    let kinds: Vec<&str> = table["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .filter_map(|row| row[0].as_str())
        .collect();
    assert_eq!(kinds, vec!["SERVICIO DE AYUDA", "SERVICIO DE AYUDA", "COMISARIA"]);
    assert!(!table.to_string().contains("null"));
}

#[test]
fn download_sets_attachment_name_and_mime() {
    let state = fixture_state();
    let response = route_request(
        &state,
        "GET",
        "/api/download/servicios?formato=xlsx&departamento=CUSCO",
        "",
    );
    assert_eq!(response.status_code, 200);
    assert_eq!(
        response.content_type,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(response.attachment.as_deref(), Some("servicios_filtrados.xlsx"));
    assert!(response.body.starts_with(b"PK"));
}

#[test]
fn download_defaults_to_configured_format() {
    let state = fixture_state();
    let response = route_request(&state, "GET", "/api/download/comisarias?distrito=PUNO", "");
    assert_eq!(response.status_code, 200);
    assert_eq!(response.attachment.as_deref(), Some("comisarias_filtradas.csv"));
    assert!(response.body_text().contains("Comisaría Puno"));
}

#[test]
fn download_rejects_unknown_kind_and_format() {
    let state = fixture_state();
    let kind = route_request(&state, "GET", "/api/download/hospitales", "");
    assert_eq!(kind.status_code, 400);
    let format = route_request(&state, "GET", "/api/download/servicios?formato=pdf", "");
    assert_eq!(format.status_code, 400);
    assert!(format.body_text().contains("unknown export format"));
}

#[test]
fn consolidation_schema_error_is_reported() {
    let state = state_without_category();
    let response = route_request(&state, "GET", "/api/consolidated", "");
    assert_eq!(response.status_code, 500);
    assert!(response.body_text().contains("CATEGORIA"));

    let download = route_request(&state, "GET", "/api/download/consolidado?formato=csv", "");
    assert_eq!(download.status_code, 500);
}

#[test]
fn reload_bumps_generation() {
    let state = state_without_category();
    let before = json(&route_request(&state, "GET", "/api/data/version", "").body_text());
    assert_eq!(before["generation"], 1);

    let reload = route_request(&state, "POST", "/api/reload", "");
    assert_eq!(reload.status_code, 200);
    assert_eq!(json(&reload.body_text())["generation"], 2);

    let after = json(&route_request(&state, "GET", "/api/data/version", "").body_text());
    assert_eq!(after["generation"], 2);
    assert_eq!(after["ubigeos"], 1);
}

#[test]
fn failed_reload_keeps_current_generation() {
    let (state, dir) = scratch_state("reload");
    fs::remove_file(dir.join("comisarias.csv")).expect("remove source");

    let reload = route_request(&state, "POST", "/api/reload", "");
    assert_eq!(reload.status_code, 500);
    let body = json(&reload.body_text());
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().is_some_and(|m| m.contains("comisarias.csv")));

    let version = json(&route_request(&state, "GET", "/api/data/version", "").body_text());
    assert_eq!(version["generation"], 1);
    assert_eq!(version["comisarias"], 5);
    let results = json(&route_request(&state, "GET", "/api/results", "").body_text());
    assert_eq!(results["comisarias"]["count"], 5);

    fs::copy("data/comisarias.csv", dir.join("comisarias.csv")).expect("restore source");
    let reload = route_request(&state, "POST", "/api/reload", "");
    assert_eq!(reload.status_code, 200);
    assert_eq!(json(&reload.body_text())["generation"], 2);
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn index_page_renders_cells_as_text() {
    let state = fixture_state();
    let body = route_request(&state, "GET", "/", "").body_text().into_owned();
    assert!(body.contains("textContent"));
    assert!(!body.contains("'<td>' +"));
}

#[test]
fn unknown_route_is_404() {
    let state = fixture_state();
    let response = route_request(&state, "GET", "/api/nope", "");
    assert_eq!(response.status_code, 404);
    let response = route_request(&state, "GET", "/api/reload", "");
    assert_eq!(response.status_code, 404);
}

#[tokio::test]
async fn axum_router_serves_downloads() {
    let app = router(Arc::new(fixture_state()));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/download/consolidado?formato=csv&departamento=PUNO")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"servicios_y_comisarias_filtrados.csv\""
    );
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv; charset=utf-8");
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let text = String::from_utf8(body.to_vec()).expect("utf-8");
    assert!(text.starts_with("TIPO,"));
    assert!(text.contains("COMISARIA,PUNO"));
}
