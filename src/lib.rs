//! Call-for-papers review service.

pub mod cfp;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod routes;
pub mod state;
pub mod templates;

#[cfg(test)]
mod testing;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::{Error, Result};
pub use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
