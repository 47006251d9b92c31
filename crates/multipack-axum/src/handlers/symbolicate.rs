//! Stack symbolication endpoint.

use axum::Json;
use axum::extract::State;
use multipack_core::{SymbolicateRequest, SymbolicateResponse};

use crate::error::HttpError;
use crate::state::AppState;

/// `POST /symbolicate`
///
/// The target is inferred from the frames. Frames that cannot be resolved
/// come back unchanged; only an unidentifiable target fails the request.
pub async fn symbolicate(
    State(state): State<AppState>,
    Json(request): Json<SymbolicateRequest>,
) -> Result<Json<SymbolicateResponse>, HttpError> {
    let response = state
        .symbolicator
        .symbolicate(request.stack)
        .await
        .inspect_err(|e| state.logger.warn(&e.to_string(), None))?;
    Ok(Json(response))
}
