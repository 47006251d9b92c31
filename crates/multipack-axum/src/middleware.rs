//! Request lifecycle logging.
//!
//! Emits a `request_started` / `request_completed` record pair per request,
//! keyed by a request id. The console sink correlates the pair into one
//! rendered line. A request dropped before it produced a response, because
//! the client went away, completes with status 499.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use multipack_core::LogEntry;
use multipack_runtime::Logger;

use crate::state::AppState;

/// Status recorded for requests abandoned by the client.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Log every request when `log_requests` is enabled.
pub async fn log_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.config.log_requests {
        return next.run(request).await;
    }

    let mut record = RequestRecord::start(
        state.logger.clone(),
        state.next_request_id(),
        request.method().as_str(),
        &request.uri().to_string(),
    );
    let response = next.run(request).await;
    record.status = Some(response.status().as_u16());
    response
}

/// Emits `request_completed` when dropped.
struct RequestRecord {
    logger: Logger,
    req_id: String,
    started: Instant,
    status: Option<u16>,
}

impl RequestRecord {
    fn start(logger: Logger, req_id: String, method: &str, url: &str) -> Self {
        logger.process(LogEntry::request_started(
            logger.issuer(),
            &req_id,
            method,
            url,
        ));
        Self {
            logger,
            req_id,
            started: Instant::now(),
            status: None,
        }
    }
}

impl Drop for RequestRecord {
    fn drop(&mut self) {
        let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.logger.process(LogEntry::request_completed(
            self.logger.issuer(),
            &self.req_id,
            self.status.unwrap_or(CLIENT_CLOSED_REQUEST),
            elapsed_ms,
        ));
    }
}
