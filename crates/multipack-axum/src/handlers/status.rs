//! Liveness endpoints polled by clients and editor tooling.

/// `GET /`
pub async fn index() -> &'static str {
    "multipack dev server is running"
}

/// `GET /status`
pub async fn status() -> &'static str {
    "packager-status:running"
}
