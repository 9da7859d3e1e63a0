mod dto;
mod forms;
pub mod handlers;
pub mod repo;
pub mod repo_types;
mod services;


use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::account_routes())
        .merge(handlers::media_routes())
}
