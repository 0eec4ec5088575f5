//! Web server module for handling platform callbacks.
//!
//! This module provides a small web server that:
//! - Answers the URL verification handshake (GET)
//! - Acknowledges message deliveries (POST)
//! - Delegates signature checks and decryption to the envelope codec
//!
//! Both methods share one route, as configured on the platform side.

pub mod handlers;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub use handlers::{
    health, receive_message, verify_url, AppState, CallbackQuery, HealthResponse, FAIL_BODY,
    SUCCESS_BODY,
};

/// Build the router for the configured callback path.
pub fn router(state: AppState) -> Router {
    let callback_path = state.config.callback_path.clone();

    Router::new()
        .route("/health", get(health))
        .route(&callback_path, get(verify_url).post(receive_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
