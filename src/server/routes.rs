use std::borrow::Cow;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::server::api;
use crate::server::AppState;

pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: &'static str,
    pub content_type: &'static str,
    /// Set for downloads; becomes a `Content-Disposition: attachment` header.
    pub attachment: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    fn json(body: String) -> HttpResponse {
        HttpResponse {
            status_code: 200,
            status_text: "OK",
            content_type: "application/json",
            attachment: None,
            body: body.into_bytes(),
        }
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        if let Some(name) = self.attachment {
            if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{name}\"")) {
                headers.insert(header::CONTENT_DISPOSITION, value);
            }
        }
        response
    }
}

pub fn route_request(state: &AppState, method: &str, path: &str, _body: &str) -> HttpResponse {
    let route = path.split('?').next().unwrap_or(path);
    debug!(method, route, "dispatch");

    match (method, route) {
        ("GET", "/") | ("GET", "/index.html") => HttpResponse {
            status_code: 200,
            status_text: "OK",
            content_type: "text/html; charset=utf-8",
            attachment: None,
            body: index_html().into_bytes(),
        },
        ("GET", "/api/health") => match api::health_payload() {
            Ok(payload) => HttpResponse::json(payload),
            Err(err) => error_response(500, "Internal Server Error", &err.to_string()),
        },
        ("GET", "/api/options") => api_result(api::options_payload(state, path)),
        ("GET", "/api/results") => api_result(api::results_payload(state, path)),
        ("GET", "/api/consolidated") => api_result(api::consolidated_payload(state, path)),
        ("GET", "/api/data/version") => match api::data_version_payload(state) {
            Ok(payload) => HttpResponse::json(payload),
            Err(err) => error_response(500, "Internal Server Error", &err.to_string()),
        },
        ("POST", "/api/reload") => api_result(api::reload_payload(state)),
        (method, route) if method == "GET" && route.starts_with("/api/download/") => {
            let kind = route.trim_start_matches("/api/download/");
            match api::download(state, kind, path) {
                Ok(download) => HttpResponse {
                    status_code: 200,
                    status_text: "OK",
                    content_type: download.mime,
                    attachment: Some(download.file_name),
                    body: download.bytes,
                },
                Err(err) => api_error_response(&err),
            }
        }
        _ => error_response(404, "Not Found", "Route not found"),
    }
}

fn api_result(result: Result<String, api::ApiError>) -> HttpResponse {
    match result {
        Ok(payload) => HttpResponse::json(payload),
        Err(err) => api_error_response(&err),
    }
}

fn api_error_response(err: &api::ApiError) -> HttpResponse {
    let (status_code, status_text) = err.status();
    if status_code >= 500 {
        warn!(error = %err, "request failed");
    }
    error_response(status_code, status_text, &err.to_string())
}

fn error_response(status_code: u16, status_text: &'static str, message: &str) -> HttpResponse {
    HttpResponse {
        status_code,
        status_text,
        content_type: "application/json",
        attachment: None,
        body: format!(
            "{{\n  \"status\": \"error\",\n  \"message\": {}\n}}",
            serde_json::to_string(message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
        )
        .into_bytes(),
    }
}

fn index_html() -> String {
    r#"<!doctype html>
<html lang="es">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width,initial-scale=1" />
  <title>Servicios de ayuda y comisarías</title>
  <style>
    body { font-family: Arial, sans-serif; margin: 0; display: flex; min-height: 100vh; }
    aside { width: 260px; padding: 16px; background: #f4f4f4; box-sizing: border-box; }
    main { flex: 1; padding: 16px 24px; overflow-x: auto; }
    label { display: block; margin: 12px 0 4px; font-weight: 600; }
    select { width: 100%; padding: 6px; }
    button { margin-top: 16px; padding: 6px 12px; }
    table { border-collapse: collapse; font-size: 0.85rem; margin: 8px 0 12px; }
    th, td { border: 1px solid #ddd; padding: 4px 8px; text-align: left; }
    th { background: #eee; }
    .downloads a { margin-right: 12px; }
  </style>
</head>
<body>
  <aside>
    <h2>Filtros</h2>
    <label for="departamento">Departamento</label>
    <select id="departamento"></select>
    <label for="provincia">Provincia</label>
    <select id="provincia"></select>
    <label for="distrito">Distrito</label>
    <select id="distrito"></select>
    <button id="reload-btn">Recargar datos</button>
    <p id="status" style="font-size:0.8rem;color:#666;"></p>
  </aside>
  <main>
    <h1>Buscador de Servicios y Comisarías</h1>

    <h2>Servicios de ayuda disponibles</h2>
    <div class="downloads">
      <a data-kind="servicios" data-format="csv">Descargar servicios filtrados (CSV)</a>
      <a data-kind="servicios" data-format="xlsx">Descargar servicios filtrados (Excel)</a>
    </div>
    <div id="servicios"></div>

    <h2>Comisarías disponibles</h2>
    <div class="downloads">
      <a data-kind="comisarias" data-format="csv">Descargar comisarías filtradas (CSV)</a>
      <a data-kind="comisarias" data-format="xlsx">Descargar comisarías filtradas (Excel)</a>
    </div>
    <div id="comisarias"></div>

    <div class="downloads">
      <a data-kind="consolidado" data-format="xlsx">Descargar servicios y comisarías (Excel)</a>
    </div>
    <hr />
    <p><strong id="resumen"></strong></p>
  </main>

  <script>
    const TODOS = '(Todos)';
    const selects = ['departamento', 'provincia', 'distrito'].map(id => document.getElementById(id));

    function query() {
      const params = new URLSearchParams();
      selects.forEach(sel => { if (sel.value && sel.value !== TODOS) params.set(sel.id, sel.value); });
      return params.toString();
    }

    function fill(sel, values) {
      const current = sel.value;
      sel.innerHTML = '';
      [TODOS].concat(values).forEach(v => {
        const opt = document.createElement('option');
        opt.value = v; opt.textContent = v;
        sel.appendChild(opt);
      });
      sel.value = values.includes(current) ? current : TODOS;
    }

    function cell(tag, value) {
      const el = document.createElement(tag);
      el.textContent = value === null ? '' : String(value);
      return el;
    }

    function renderTable(target, table) {
      const el = document.getElementById(target);
      el.replaceChildren();
      if (!table.count) { el.appendChild(cell('p', 'Sin resultados (0).')); return; }
      const grid = document.createElement('table');
      const head = grid.insertRow();
      table.columns.forEach(c => head.appendChild(cell('th', c)));
      table.rows.forEach(r => {
        const tr = grid.insertRow();
        r.forEach(v => tr.appendChild(cell('td', v)));
      });
      el.append(cell('p', table.count + ' filas'), grid);
    }

    async function refreshOptions() {
      const data = await fetch('/api/options?' + query()).then(r => r.json());
      fill(selects[0], data.departamentos);
      fill(selects[1], data.provincias);
      fill(selects[2], data.distritos);
    }

    async function refreshResults() {
      const q = query();
      const data = await fetch('/api/results?' + q).then(r => r.json());
      if (data.status !== 'ok') { document.getElementById('resumen').textContent = data.message; return; }
      renderTable('servicios', data.establecimientos);
      renderTable('comisarias', data.comisarias);
      document.getElementById('resumen').textContent = data.resumen;
      document.querySelectorAll('.downloads a').forEach(a => {
        a.href = '/api/download/' + a.dataset.kind + '?formato=' + a.dataset.format + (q ? '&' + q : '');
      });
    }

    async function refresh() { await refreshOptions(); await refreshResults(); }

    selects.forEach((sel, level) => sel.addEventListener('change', () => {
      selects.slice(level + 1).forEach(child => fill(child, []));
      refresh();
    }));

    document.getElementById('reload-btn').addEventListener('click', async () => {
      const res = await fetch('/api/reload', { method: 'POST' });
      const data = await res.json();
      document.getElementById('status').textContent =
        data.status === 'ok' ? 'Datos recargados (generación ' + data.generation + ')' : data.message;
      refresh();
    });

    [selects[0], selects[1], selects[2]].forEach(sel => fill(sel, []));
    refresh();
  </script>
</body>
</html>
"#
    .to_string()
}
