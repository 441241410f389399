use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::dashboard::FilteredView;
use crate::error::{DashboardError, ExportError, LoadError, SchemaError};
use crate::export::{Download, DownloadKind, ExportFormat};
use crate::location::{LocationOptions, LocationSelection};
use crate::server::AppState;
use crate::table::{Table, Value};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid query: {0}")]
    Query(#[from] serde_urlencoded::de::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> (u16, &'static str) {
        match self {
            Self::Query(_) | Self::BadRequest(_) => (400, "Bad Request"),
            _ => (500, "Internal Server Error"),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::Schema(e) => Self::Schema(e),
            DashboardError::Export(e) => Self::Export(e),
        }
    }
}

/// Query string accepted by every filter endpoint. `(Todos)` or blank means unset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectionQuery {
    pub departamento: Option<String>,
    pub provincia: Option<String>,
    pub distrito: Option<String>,
    pub formato: Option<String>,
}

impl SelectionQuery {
    pub fn parse(path: &str) -> Result<SelectionQuery, ApiError> {
        let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");
        Ok(serde_urlencoded::from_str(query)?)
    }

    fn selection(&self, state: &AppState) -> LocationSelection {
        LocationSelection::from_labels(
            self.departamento.as_deref(),
            self.provincia.as_deref(),
            self.distrito.as_deref(),
        )
        .canonicalized(state.cache.policy())
    }

    fn format(&self, state: &AppState) -> Result<ExportFormat, ApiError> {
        match self.formato.as_deref() {
            None | Some("") => Ok(state.config.export_format),
            Some(raw) => raw.parse().map_err(ApiError::BadRequest),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TablePayload<'a> {
    pub columns: &'a [String],
    pub rows: &'a [Vec<Value>],
    pub count: usize,
}

impl<'a> From<&'a Table> for TablePayload<'a> {
    fn from(table: &'a Table) -> Self {
        TablePayload {
            columns: &table.columns,
            rows: &table.rows,
            count: table.len(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OptionsResponse<'a> {
    status: &'static str,
    todos: &'static str,
    seleccion: &'a LocationSelection,
    #[serde(flatten)]
    options: LocationOptions,
}

#[derive(Debug, Serialize)]
struct ResultsResponse<'a> {
    status: &'static str,
    generation: u64,
    seleccion: &'a LocationSelection,
    establecimientos: TablePayload<'a>,
    comisarias: TablePayload<'a>,
    resumen: String,
}

#[derive(Debug, Serialize)]
struct ConsolidatedResponse<'a> {
    status: &'static str,
    generation: u64,
    seleccion: &'a LocationSelection,
    consolidado: TablePayload<'a>,
}

#[derive(Debug, Serialize)]
struct SourceStatus {
    name: &'static str,
    path: String,
}

#[derive(Debug, Serialize)]
struct DataVersionResponse {
    status: &'static str,
    generation: u64,
    loaded_at: String,
    normalization: &'static str,
    establecimientos: usize,
    comisarias: usize,
    ubigeos: usize,
    sources: Vec<SourceStatus>,
}

pub fn health_payload() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "service": "buscador-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub fn options_payload(state: &AppState, path: &str) -> Result<String, ApiError> {
    let query = SelectionQuery::parse(path)?;
    let selection = query.selection(state);
    let snapshot = state.cache.snapshot();
    let response = OptionsResponse {
        status: "ok",
        todos: crate::location::ALL_LABEL,
        seleccion: &selection,
        options: snapshot.index.options(&selection),
    };
    Ok(serde_json::to_string_pretty(&response)?)
}

pub fn results_payload(state: &AppState, path: &str) -> Result<String, ApiError> {
    let query = SelectionQuery::parse(path)?;
    let snapshot = state.cache.snapshot();
    let view = FilteredView::compute(&snapshot, &query.selection(state));
    let response = ResultsResponse {
        status: "ok",
        generation: snapshot.generation,
        seleccion: &view.selection,
        establecimientos: TablePayload::from(&view.establishments),
        comisarias: TablePayload::from(&view.stations),
        resumen: view.summary(),
    };
    Ok(serde_json::to_string_pretty(&response)?)
}

pub fn consolidated_payload(state: &AppState, path: &str) -> Result<String, ApiError> {
    let query = SelectionQuery::parse(path)?;
    let snapshot = state.cache.snapshot();
    let view = FilteredView::compute(&snapshot, &query.selection(state));
    let merged = view.consolidated()?;
    let response = ConsolidatedResponse {
        status: "ok",
        generation: snapshot.generation,
        seleccion: &view.selection,
        consolidado: TablePayload::from(&merged),
    };
    Ok(serde_json::to_string_pretty(&response)?)
}

/// `kind` is the last path segment of `/api/download/{kind}`.
pub fn download(state: &AppState, kind: &str, path: &str) -> Result<Download, ApiError> {
    let kind: DownloadKind = kind.parse().map_err(ApiError::BadRequest)?;
    let query = SelectionQuery::parse(path)?;
    let format = query.format(state)?;
    let snapshot = state.cache.snapshot();
    let view = FilteredView::compute(&snapshot, &query.selection(state));
    Ok(view.download(kind, format)?)
}

pub fn data_version_payload(state: &AppState) -> Result<String, serde_json::Error> {
    let snapshot = state.cache.snapshot();
    let sources = state
        .cache
        .sources()
        .into_iter()
        .map(|(name, path)| SourceStatus { name, path })
        .collect();
    serde_json::to_string_pretty(&DataVersionResponse {
        status: "ok",
        generation: snapshot.generation,
        loaded_at: snapshot.loaded_at.to_rfc3339(),
        normalization: snapshot.policy.as_str(),
        establecimientos: snapshot.establishments.len(),
        comisarias: snapshot.stations.len(),
        ubigeos: snapshot.locations.len(),
        sources,
    })
}

pub fn reload_payload(state: &AppState) -> Result<String, ApiError> {
    let snapshot = state.cache.reload()?;
    info!(generation = snapshot.generation, "reload requested over http");
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "generation": snapshot.generation,
        "loaded_at": snapshot.loaded_at.to_rfc3339(),
    }))?)
}
