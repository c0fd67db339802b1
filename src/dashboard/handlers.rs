use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use time::{Date, OffsetDateTime};
use tracing::instrument;

use super::services::{expiring_lots, items_to_buy, low_stock_lots, summarize_plan, DaySummary};
use crate::{
    engine::generate_shopping_list,
    error::AppError,
    plans::WeekQuery,
    state::AppState,
    store::{iso_date, IngredientListItem},
};

#[derive(Debug, Serialize)]
pub struct ShoppingSummary {
    #[serde(with = "iso_date")]
    pub week_start_date: Date,
    pub items_to_buy: usize,
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/expiring-ingredients", get(expiring))
        .route("/dashboard/low-stock-ingredients", get(low_stock))
        .route("/dashboard/weekly-plan-summary", get(plan_summary))
        .route("/dashboard/shopping-list-summary", get(shopping_summary))
}

#[instrument(skip(state))]
pub async fn expiring(
    State(state): State<AppState>,
) -> Result<Json<Vec<IngredientListItem>>, AppError> {
    let today = OffsetDateTime::now_utc().date();
    let lots = state.store.list_ingredients().await?;
    Ok(Json(expiring_lots(
        lots,
        today,
        state.config.dashboard.expiring_within_days,
    )))
}

#[instrument(skip(state))]
pub async fn low_stock(
    State(state): State<AppState>,
) -> Result<Json<Vec<IngredientListItem>>, AppError> {
    let lots = state.store.list_ingredients().await?;
    Ok(Json(low_stock_lots(
        lots,
        state.config.dashboard.low_stock_threshold,
    )))
}

#[instrument(skip(state))]
pub async fn plan_summary(
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<Vec<DaySummary>>, AppError> {
    let week = query.require()?;
    let (entries, recipes) = futures::try_join!(
        state.store.get_weekly_plan_entries(week),
        state.store.list_recipes(),
    )?;
    Ok(Json(summarize_plan(&entries, &recipes)))
}

#[instrument(skip(state))]
pub async fn shopping_summary(
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<ShoppingSummary>, AppError> {
    let week = query.require()?;
    let lines = generate_shopping_list(&*state.store, week).await?;
    Ok(Json(ShoppingSummary {
        week_start_date: week,
        items_to_buy: items_to_buy(&lines),
    }))
}
