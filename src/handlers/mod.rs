use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::state::AppState;

mod auth;
mod health;
mod metrics;
mod ugrozena_lica;

pub use auth::{login_handler, register_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use ugrozena_lica::{
    create_handler, delete_handler, get_handler, list_handler, update_handler,
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/ugrozena-lica", get(list_handler).post(create_handler))
        .route(
            "/api/ugrozena-lica/{id}",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .with_state(state)
}
