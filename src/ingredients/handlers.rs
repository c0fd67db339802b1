use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    AdjustStockRequest, AdjustStockResponse, BatchLookupQuery, BatchLookupResponse,
    ConfirmPurchaseResponse, CreateIngredientRequest, UpdateIngredientRequest,
};
use crate::{
    categories::ensure_category,
    engine::reconcile_purchases,
    error::AppError,
    state::AppState,
    store::{
        BatchKey, CategoryKind, Ingredient, IngredientListItem, PurchaseItem, StockAdjustment,
        StockShortage,
    },
};

pub fn ingredient_routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients).post(create_ingredient))
        .route(
            "/ingredients/:id",
            get(get_ingredient)
                .put(update_ingredient)
                .delete(delete_ingredient),
        )
        .route("/ingredients/:id/adjust", post(adjust_stock))
        .route("/ingredient-lookup", get(lookup_batch))
}

pub fn purchase_routes() -> Router<AppState> {
    Router::new().route("/purchases/confirm", post(confirm_purchase))
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
) -> Result<Json<Vec<IngredientListItem>>, AppError> {
    Ok(Json(state.store.list_ingredients().await?))
}

#[instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ingredient>, AppError> {
    state
        .store
        .get_ingredient(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("ingredient", id))
}

#[instrument(skip(state, payload))]
pub async fn create_ingredient(
    State(state): State<AppState>,
    Json(payload): Json<CreateIngredientRequest>,
) -> Result<(StatusCode, Json<Ingredient>), AppError> {
    let new = payload.validate()?;
    let key = new.batch_key();
    if let Some(existing) = state.store.find_ingredient_by_batch_key(&key).await? {
        warn!(batch = %key, %existing, "lot already exists");
        return Err(AppError::Conflict(format!(
            "lot {key} already exists as {existing}; confirm a purchase to restock it"
        )));
    }
    ensure_category(&state, CategoryKind::Ingredient, new.category_id).await?;
    let lot = state.store.create_ingredient(&new).await?;
    info!(ingredient_id = %lot.id, batch = %key, "ingredient created");
    Ok((StatusCode::CREATED, Json(lot)))
}

#[instrument(skip(state, payload))]
pub async fn update_ingredient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateIngredientRequest>,
) -> Result<Json<Ingredient>, AppError> {
    let patch = payload.validate()?;
    let current = state
        .store
        .get_ingredient(id)
        .await?
        .ok_or_else(|| AppError::not_found("ingredient", id))?;

    let key = patch.apply_to(&current).batch_key();
    match state.store.find_ingredient_by_batch_key(&key).await? {
        Some(other) if other != id => {
            return Err(AppError::Conflict(format!("lot {key} already exists as {other}")));
        }
        _ => {}
    }
    ensure_category(&state, CategoryKind::Ingredient, patch.category_id).await?;

    state
        .store
        .update_ingredient(id, &patch)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("ingredient", id))
}

#[instrument(skip(state))]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_ingredient(id).await? {
        return Err(AppError::not_found("ingredient", id));
    }
    info!(ingredient_id = %id, "ingredient deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<Json<AdjustStockResponse>, AppError> {
    let removing = payload.validate()?;
    match state.store.adjust_stock(id, payload.delta).await? {
        StockAdjustment::Applied { stock } => Ok(Json(AdjustStockResponse {
            ingredient_id: id,
            stock,
        })),
        StockAdjustment::Missing => Err(AppError::not_found("ingredient", id)),
        StockAdjustment::WouldGoNegative { lot } => Err(AppError::InsufficientStock(vec![
            StockShortage::for_lot(id, removing, Some(&lot)),
        ])),
    }
}

#[instrument(skip(state))]
pub async fn lookup_batch(
    State(state): State<AppState>,
    Query(query): Query<BatchLookupQuery>,
) -> Result<Json<BatchLookupResponse>, AppError> {
    let key = BatchKey::from(query);
    let ingredient_id = state.store.find_ingredient_by_batch_key(&key).await?;
    Ok(Json(BatchLookupResponse { ingredient_id }))
}

/// POST /purchases/confirm `[{ name, unit, quantity, expiry_date?, category_id? }]`
#[instrument(skip(state, items), fields(items = items.len()))]
pub async fn confirm_purchase(
    State(state): State<AppState>,
    Json(items): Json<Vec<PurchaseItem>>,
) -> Result<Json<ConfirmPurchaseResponse>, AppError> {
    let receipts = reconcile_purchases(&*state.store, &items).await?;
    Ok(Json(ConfirmPurchaseResponse {
        success: true,
        receipts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body<T: serde::de::DeserializeOwned>(v: serde_json::Value) -> Json<T> {
        Json(serde_json::from_value(v).unwrap())
    }

    async fn create(state: &AppState, v: serde_json::Value) -> Result<Ingredient, AppError> {
        create_ingredient(State(state.clone()), body(v))
            .await
            .map(|(_, Json(lot))| lot)
    }

    #[tokio::test]
    async fn create_then_duplicate_is_conflict() {
        let state = AppState::fake();
        let req = json!({"name": "Milk", "unit": "L", "stock": 2, "expiry_date": "2024-06-01"});
        let lot = create(&state, req.clone()).await.unwrap();
        assert_eq!(lot.stock, 2);

        let err = create(&state, req).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let state = AppState::fake();
        let err = create(&state, json!({"name": " ", "unit": "L"})).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_ingredient_is_not_found() {
        let state = AppState::fake();
        let id = Uuid::new_v4();
        let err = get_ingredient(State(state.clone()), Path(id)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));

        let err = update_ingredient(State(state.clone()), Path(id), body(json!({"stock": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));

        let err = delete_ingredient(State(state), Path(id)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let state = AppState::fake();
        let lot = create(&state, json!({"name": "Rice", "unit": "kg", "stock": 3}))
            .await
            .unwrap();
        let Json(updated) =
            update_ingredient(State(state), Path(lot.id), body(json!({"stock": 8})))
                .await
                .unwrap();
        assert_eq!(updated.stock, 8);
        assert_eq!(updated.name, "Rice");
    }

    #[tokio::test]
    async fn update_into_another_lots_key_is_conflict() {
        let state = AppState::fake();
        create(&state, json!({"name": "Rice", "unit": "kg"})).await.unwrap();
        let other = create(&state, json!({"name": "Rice", "unit": "g"})).await.unwrap();
        let err = update_ingredient(State(state), Path(other.id), body(json!({"unit": "kg"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn adjust_below_zero_reports_shortage() {
        let state = AppState::fake();
        let lot = create(&state, json!({"name": "Egg", "unit": "pc", "stock": 2}))
            .await
            .unwrap();
        let err = adjust_stock(State(state.clone()), Path(lot.id), body(json!({"delta": -3})))
            .await
            .unwrap_err();
        let AppError::InsufficientStock(short) = err else {
            panic!("expected shortage");
        };
        assert_eq!((short[0].needed, short[0].available), (3, 2));

        let Json(res) = adjust_stock(State(state), Path(lot.id), body(json!({"delta": 5})))
            .await
            .unwrap();
        assert_eq!(res.stock, 7);
    }

    #[tokio::test]
    async fn adjust_outside_i64_range_is_validation_error() {
        let state = AppState::fake();
        let lot = create(&state, json!({"name": "Egg", "unit": "pc", "stock": 2}))
            .await
            .unwrap();

        let err = adjust_stock(
            State(state.clone()),
            Path(lot.id),
            body(json!({ "delta": i64::MIN })),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = adjust_stock(
            State(state.clone()),
            Path(lot.id),
            body(json!({ "delta": i64::MAX })),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let Json(lot) = get_ingredient(State(state), Path(lot.id)).await.unwrap();
        assert_eq!(lot.stock, 2);
    }

    #[tokio::test]
    async fn purchase_past_i64_range_is_validation_error() {
        let state = AppState::fake();
        let items = json!([{"name": "Milk", "unit": "L", "quantity": i64::MAX}]);
        confirm_purchase(State(state.clone()), body(items.clone())).await.unwrap();
        let err = confirm_purchase(State(state.clone()), body(items))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let Json(lots) = list_ingredients(State(state)).await.unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].stock, i64::MAX);
    }

    #[tokio::test]
    async fn unknown_category_is_not_found() {
        let state = AppState::fake();
        let stray = Uuid::new_v4();
        let err = create(
            &state,
            json!({"name": "Kale", "unit": "g", "category_id": stray}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound { entity: "category", id } if id == stray));

        let items = json!([{"name": "Kale", "unit": "g", "quantity": 1, "category_id": stray}]);
        let err = confirm_purchase(State(state.clone()), body(items))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        let Json(lots) = list_ingredients(State(state)).await.unwrap();
        assert!(lots.is_empty());
    }

    #[tokio::test]
    async fn confirm_purchase_then_lookup() {
        let state = AppState::fake();
        let items = json!([{"name": "Milk", "unit": "L", "quantity": 2, "expiry_date": "2024-06-01"}]);
        confirm_purchase(State(state.clone()), body(items.clone())).await.unwrap();
        let Json(res) = confirm_purchase(State(state.clone()), body(items)).await.unwrap();
        assert_eq!(res.receipts[0].stock, 4);

        let query: BatchLookupQuery = serde_json::from_value(
            json!({"name": "Milk", "unit": "L", "expiry_date": "2024-06-01"}),
        )
        .unwrap();
        let Json(found) = lookup_batch(State(state), Query(query)).await.unwrap();
        assert_eq!(found.ingredient_id, Some(res.receipts[0].ingredient_id));
    }
}
