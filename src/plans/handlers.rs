use std::collections::BTreeSet;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{ShoppingListRequest, UpsertPlanRequest, WeekQuery};
use crate::{
    engine::{generate_shopping_list, ShoppingListLine},
    error::AppError,
    state::AppState,
    store::WeeklyPlanEntry,
};

pub fn plan_routes() -> Router<AppState> {
    Router::new()
        .route("/weekly-plan", get(get_weekly_plan).post(upsert_weekly_plan))
        .route("/shopping-list", post(shopping_list))
}

#[instrument(skip(state))]
pub async fn get_weekly_plan(
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<Vec<WeeklyPlanEntry>>, AppError> {
    let week = query.require()?;
    Ok(Json(state.store.get_weekly_plan_entries(week).await?))
}

#[instrument(skip(state, payload))]
pub async fn upsert_weekly_plan(
    State(state): State<AppState>,
    Json(payload): Json<UpsertPlanRequest>,
) -> Result<Json<Vec<WeeklyPlanEntry>>, AppError> {
    payload.validate()?;

    let referenced: BTreeSet<Uuid> = payload
        .plans
        .iter()
        .flat_map(|d| [d.breakfast_recipe_id, d.lunch_recipe_id, d.dinner_recipe_id])
        .flatten()
        .collect();
    for id in referenced {
        if state.store.get_recipe(id).await?.is_none() {
            return Err(AppError::not_found("recipe", id));
        }
    }

    let entries = state
        .store
        .upsert_weekly_plan(payload.week_start_date, &payload.plans)
        .await?;
    info!(days = entries.len(), "weekly plan saved");
    Ok(Json(entries))
}

#[instrument(skip(state))]
pub async fn shopping_list(
    State(state): State<AppState>,
    Json(payload): Json<ShoppingListRequest>,
) -> Result<Json<Vec<ShoppingListLine>>, AppError> {
    let week = WeekQuery {
        week_start_date: payload.week_start_date,
    }
    .require()?;
    Ok(Json(generate_shopping_list(&*state.store, week).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MealType, NewIngredient, NewRecipe};
    use serde_json::json;
    use time::macros::date;

    fn body<T: serde::de::DeserializeOwned>(v: serde_json::Value) -> Json<T> {
        Json(serde_json::from_value(v).unwrap())
    }

    #[tokio::test]
    async fn day_out_of_range_is_rejected() {
        let state = AppState::fake();
        let err = upsert_weekly_plan(
            State(state),
            body(json!({
                "week_start_date": "2024-06-03",
                "plans": [{"day_of_week": 8}]
            })),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_recipe_in_slot_is_not_found() {
        let state = AppState::fake();
        let err = upsert_weekly_plan(
            State(state),
            body(json!({
                "week_start_date": "2024-06-03",
                "plans": [{"day_of_week": 1, "lunch_recipe_id": Uuid::new_v4()}]
            })),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn missing_week_is_validation_error() {
        let state = AppState::fake();
        let err = get_weekly_plan(State(state.clone()), Query(WeekQuery::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = shopping_list(State(state), body(json!({}))).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn planned_breakfast_shows_up_on_shopping_list() {
        let state = AppState::fake();
        let flour = state
            .store
            .create_ingredient(&NewIngredient {
                name: "Flour".into(),
                unit: "kg".into(),
                stock: 0,
                expiry_date: None,
                category_id: None,
            })
            .await
            .unwrap();
        let pancakes = state
            .store
            .create_recipe(&NewRecipe {
                name: "Pancakes".into(),
                meal_type: MealType::Breakfast,
                description: None,
                recipe_category_id: None,
            })
            .await
            .unwrap();
        state
            .store
            .add_requirement(pancakes.id, flour.id, 2)
            .await
            .unwrap();

        upsert_weekly_plan(
            State(state.clone()),
            body(json!({
                "week_start_date": "2024-06-03",
                "plans": [{"day_of_week": 1, "breakfast_recipe_id": pancakes.id}]
            })),
        )
        .await
        .unwrap();

        let Json(plan) = get_weekly_plan(
            State(state.clone()),
            Query(WeekQuery {
                week_start_date: Some(date!(2024 - 06 - 03)),
            }),
        )
        .await
        .unwrap();
        assert_eq!(plan.len(), 1);

        let Json(lines) = shopping_list(State(state), body(json!({"week_start_date": "2024-06-03"})))
            .await
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].ingredient_id, flour.id);
        assert_eq!(lines[0].total_needed, 2);
        assert_eq!(lines[0].to_buy, 2);
    }
}
