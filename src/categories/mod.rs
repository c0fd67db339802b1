pub mod handlers;

pub(crate) use handlers::ensure_category;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::category_routes()
}
