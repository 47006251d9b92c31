//! Asset fallback route.
//!
//! Any request not claimed by another route is an asset request. Its target
//! comes from the `target` query parameter, the legacy `platform` parameter
//! or the `.<target>.<ext>` filename suffix, in that order.

use axum::extract::{Query, Request, State};
use axum::http::Uri;
use axum::response::Response;
use multipack_core::target::filename_target;
use multipack_core::{Target, TargetResolver};
use serde_json::json;

use crate::dto::TargetQuery;
use crate::error::HttpError;
use crate::state::AppState;

/// Resolve the target a request addresses.
pub fn resolve_target(resolver: &TargetResolver, uri: &Uri) -> Result<Target, HttpError> {
    let query = Query::<TargetQuery>::try_from_uri(uri)
        .map(|Query(query)| query)
        .unwrap_or_default();

    if let Some(name) = query.explicit() {
        return resolver
            .recognize(name)
            .ok_or_else(|| HttpError::BadRequest(format!("Unknown target: {name}")));
    }

    filename_target(uri.path())
        .and_then(|name| resolver.recognize(name))
        .ok_or_else(|| {
            HttpError::BadRequest(format!(
                "Cannot infer target for {}; pass ?target=<name>",
                uri.path()
            ))
        })
}

/// Fallback handler serving or forwarding asset requests.
pub async fn serve(State(state): State<AppState>, request: Request) -> Result<Response, HttpError> {
    let target = resolve_target(&state.resolver, request.uri())?;
    let path = request.uri().path().to_string();

    state.gateway.serve(&target, request).await.inspect_err(|e| {
        if e.status().is_server_error() {
            state.logger.error(
                &e.to_string(),
                Some(json!({ "target": target, "path": path })),
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> TargetResolver {
        TargetResolver::new(vec![
            Target::new("ios").unwrap(),
            Target::new("android").unwrap(),
        ])
    }

    fn resolve(uri: &str) -> Result<Target, HttpError> {
        resolve_target(&resolver(), &uri.parse().unwrap())
    }

    #[test]
    fn test_query_parameter_wins() {
        assert_eq!(resolve("/index.android.bundle?target=ios").unwrap().as_str(), "ios");
        assert_eq!(resolve("/index.bundle?platform=android").unwrap().as_str(), "android");
    }

    #[test]
    fn test_filename_suffix() {
        assert_eq!(resolve("/main.android.bundle").unwrap().as_str(), "android");
        assert_eq!(resolve("/main.ios.bundle.map").unwrap().as_str(), "ios");
    }

    #[test]
    fn test_unresolvable_is_bad_request() {
        assert!(matches!(resolve("/index.bundle"), Err(HttpError::BadRequest(_))));
        assert!(matches!(resolve("/index.bundle?target=web"), Err(HttpError::BadRequest(_))));
        assert!(matches!(resolve("/index.web.bundle"), Err(HttpError::BadRequest(_))));
    }
}
