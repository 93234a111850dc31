mod health;
mod history;
mod jobs;
mod rules;

use axum::Router;

use crate::AppState;

pub use health::health_router;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(history::router())
        .merge(rules::router())
        .merge(jobs::router())
}
