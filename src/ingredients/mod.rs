mod dto;
pub mod handlers;

pub(crate) use dto::require_text;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::ingredient_routes())
        .merge(handlers::purchase_routes())
}
