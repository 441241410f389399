use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tracing::info;

use crate::config::AppConfig;
use crate::data::DataCache;

pub mod api;
pub mod routes;

/// Everything a request needs: configuration and the shared table cache.
#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    pub cache: DataCache,
}

impl AppState {
    pub fn new(config: AppConfig, cache: DataCache) -> AppState {
        AppState { config, cache }
    }
}

/// Single fallback handler; all routing happens in [`routes::route_request`].
pub fn router(state: Arc<AppState>) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

async fn dispatch(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    body: String,
) -> Response {
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    routes::route_request(&state, method.as_str(), path, &body).into_response()
}

pub fn run_server(state: AppState) -> std::io::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(Arc::new(state)))
}

async fn serve(state: Arc<AppState>) -> std::io::Result<()> {
    let bind_addr = state.config.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(
        generation = state.cache.generation(),
        "buscador server listening on http://{bind_addr}"
    );
    axum::serve(listener, router(state)).await
}
