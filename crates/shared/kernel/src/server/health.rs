use axum::http::header;
use axum::{Json, response::IntoResponse};
use larp_derive::{api_handler, api_model};
use larp_domain::constants::SYSTEM_TAG;
use std::sync::LazyLock;
use std::time::Instant;

/// Liveness report.
#[api_model]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// Seconds since the first health probe or process start.
    uptime: u64,
}

static STARTED: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Pins the uptime clock; the server calls this once during startup.
pub(crate) fn mark_started() {
    LazyLock::force(&STARTED);
}

#[api_handler(
    get,
    path = "/health",
    responses((status = OK, description = "Service is up", body = HealthResponse)),
    tag = SYSTEM_TAG,
)]
pub(super) async fn health_handler() -> impl IntoResponse {
    let body = HealthResponse {
        status: "up",
        version: env!("CARGO_PKG_VERSION"),
        uptime: STARTED.elapsed().as_secs(),
    };

    ([(header::CACHE_CONTROL, "no-store"), (header::PRAGMA, "no-cache")], Json(body))
}
