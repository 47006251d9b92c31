//! JSON API under `/api`.

use axum::Json;
use axum::extract::{Path, State};
use multipack_core::{AssetSummary, BuildState, Target};

use crate::dto::{TargetSummary, WorkerSummary};
use crate::error::HttpError;
use crate::state::AppState;

fn recognize(state: &AppState, name: &str) -> Result<Target, HttpError> {
    state
        .resolver
        .recognize(name)
        .ok_or_else(|| HttpError::BadRequest(format!("Unknown target: {name}")))
}

/// `GET /api/targets`
pub async fn targets(State(state): State<AppState>) -> Result<Json<Vec<TargetSummary>>, HttpError> {
    let backend = state.gateway.backend();
    let workers = state.gateway.workers();

    let mut summaries = Vec::new();
    for target in state.resolver.targets() {
        let build = backend.get_build_state(target).await?;
        let worker = workers
            .iter()
            .find(|info| &info.target == target)
            .map(|info| WorkerSummary {
                status: info.status,
                port: info.port,
            });
        summaries.push(TargetSummary {
            name: target.clone(),
            phase: build.phase,
            generation: build.generation,
            worker,
        });
    }
    Ok(Json(summaries))
}

/// `GET /api/{target}/stats`
pub async fn stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BuildState>, HttpError> {
    let target = recognize(&state, &name)?;
    Ok(Json(state.gateway.backend().get_build_state(&target).await?))
}

/// `GET /api/{target}/assets`
pub async fn assets(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<AssetSummary>>, HttpError> {
    let target = recognize(&state, &name)?;
    let build = state.gateway.backend().get_build_state(&target).await?;
    Ok(Json(build.latest.map(|record| record.assets).unwrap_or_default()))
}
