use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use symptomgraph_core::Concept;
use symptomgraph_pipeline::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::{ApiResult, AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/disease/{name}", get(disease_symptoms))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Symptom concepts of the named disease.
///
/// A client disconnect drops this future, which cancels the traversal.
async fn disease_symptoms(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<Concept>>> {
    let cancel = CancellationToken::new();
    let symptoms = state.pipeline.traverse(&name, &cancel).await?;
    debug!("{} symptoms for {}", symptoms.len(), name);
    Ok(Json(symptoms))
}
