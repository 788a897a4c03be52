//! HTTP surface of the managed function.

pub mod callable;
pub mod execution_id;
pub mod health;

use std::{sync::Arc, time::Duration};

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::timeout::TimeoutLayer;

use crate::{config::FunctionConfig, platform::Platform};

/// Build the function's axum router.
///
/// The timeout layer plays the host's invocation timeout: when it fires the
/// handler future, and with it any outstanding completion call, is dropped.
pub fn router(platform: Arc<Platform>, function: &FunctionConfig) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route(&format!("/{}", function.name), post(callable::invoke))
        .with_state(platform)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(function.timeout_secs),
        ))
        .layer(middleware::from_fn(execution_id::execution_id_middleware))
}
