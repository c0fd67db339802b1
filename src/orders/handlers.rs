use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    engine::{
        commit_order, evaluate_order, recipe_availability, FulfillmentLine, OrderOutcome,
        OrderState, RecipeAvailability,
    },
    error::AppError,
    state::AppState,
};

/// Recipe ids may repeat; each occurrence is one serving.
#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    pub recipe_ids: Vec<Uuid>,
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/evaluate", post(evaluate))
        .route("/orders/commit", post(commit))
        .route("/recipe-availability", get(availability))
}

#[instrument(skip(state))]
pub async fn evaluate(
    State(state): State<AppState>,
    Json(payload): Json<OrderRequest>,
) -> Result<Json<Vec<FulfillmentLine>>, AppError> {
    Ok(Json(evaluate_order(&*state.store, &payload.recipe_ids).await?))
}

#[instrument(skip(state))]
pub async fn commit(
    State(state): State<AppState>,
    Json(payload): Json<OrderRequest>,
) -> Result<(StatusCode, Json<OrderOutcome>), AppError> {
    let outcome = commit_order(&*state.store, &payload.recipe_ids).await?;
    let status = match outcome.state() {
        OrderState::Rejected => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    info!(state = ?outcome.state(), "order finished");
    Ok((status, Json(outcome)))
}

#[instrument(skip(state))]
pub async fn availability(
    State(state): State<AppState>,
) -> Result<Json<Vec<RecipeAvailability>>, AppError> {
    Ok(Json(recipe_availability(&*state.store).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{kitchen, Kitchen};
    use crate::store::KitchenStore;
    use std::sync::Arc;

    /// Ids of the fixture kitchen, with its store moved into an `AppState`.
    struct Ids {
        flour: Uuid,
        a: Uuid,
        b: Uuid,
    }

    fn state_over(k: Kitchen) -> (AppState, Ids) {
        let Kitchen { store, flour, a, b, .. } = k;
        let store: Arc<dyn KitchenStore> = Arc::new(store);
        (
            AppState::from_parts(store, AppState::fake().config),
            Ids { flour, a, b },
        )
    }

    fn order(ids: &[Uuid]) -> Json<OrderRequest> {
        Json(OrderRequest {
            recipe_ids: ids.to_vec(),
        })
    }

    #[tokio::test]
    async fn rejected_commit_is_conflict_and_writes_nothing() {
        let (state, k) = state_over(kitchen(4, 1).await);
        let (status, Json(outcome)) = commit(State(state.clone()), order(&[k.a, k.b]))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(outcome.state(), OrderState::Rejected);

        let body = serde_json::to_value(&outcome).unwrap();
        assert_eq!(body["status"], "REJECTED");
        assert_eq!(body["missing"][0]["ingredient_id"], k.flour.to_string());

        let flour = state.store.get_ingredient(k.flour).await.unwrap().unwrap();
        assert_eq!(flour.stock, 4);
    }

    #[tokio::test]
    async fn committed_order_deducts() {
        let (state, k) = state_over(kitchen(10, 2).await);
        let (status, _) = commit(State(state.clone()), order(&[k.a, k.b]))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        let flour = state.store.get_ingredient(k.flour).await.unwrap().unwrap();
        assert_eq!(flour.stock, 5);
    }

    #[tokio::test]
    async fn empty_order_is_validation_error() {
        let state = AppState::fake();
        let err = evaluate(State(state), order(&[])).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn availability_lists_every_recipe() {
        let (state, k) = state_over(kitchen(2, 0).await);
        let Json(rows) = availability(State(state)).await.unwrap();
        assert_eq!(rows.len(), 3);
        let a = rows.iter().find(|r| r.recipe_id == k.a).unwrap();
        assert!(a.can_make);
        let b = rows.iter().find(|r| r.recipe_id == k.b).unwrap();
        assert!(!b.can_make);
    }
}
