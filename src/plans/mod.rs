mod dto;
pub mod handlers;

pub(crate) use dto::WeekQuery;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::plan_routes()
}
