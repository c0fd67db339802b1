use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{RecipeRequest, RequirementRequest};
use crate::{
    categories::ensure_category,
    error::AppError,
    state::AppState,
    store::{CategoryKind, Recipe, RecipeRequirement, RequirementDetail},
};

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route(
            "/recipes/:id/ingredients",
            get(list_requirements).post(add_requirement),
        )
        .route(
            "/recipe-ingredients/:id",
            put(update_requirement).delete(delete_requirement),
        )
}

async fn ensure_ingredient(state: &AppState, id: Uuid) -> Result<(), AppError> {
    match state.store.get_ingredient(id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::not_found("ingredient", id)),
    }
}

#[instrument(skip(state))]
pub async fn list_recipes(State(state): State<AppState>) -> Result<Json<Vec<Recipe>>, AppError> {
    Ok(Json(state.store.list_recipes().await?))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Recipe>, AppError> {
    state
        .store
        .get_recipe(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("recipe", id))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    Json(payload): Json<RecipeRequest>,
) -> Result<(StatusCode, Json<Recipe>), AppError> {
    let new = payload.validate()?;
    ensure_category(&state, CategoryKind::Recipe, new.recipe_category_id).await?;
    let recipe = state.store.create_recipe(&new).await?;
    info!(recipe_id = %recipe.id, name = %recipe.name, "recipe created");
    Ok((StatusCode::CREATED, Json(recipe)))
}

#[instrument(skip(state, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecipeRequest>,
) -> Result<Json<Recipe>, AppError> {
    let new = payload.validate()?;
    ensure_category(&state, CategoryKind::Recipe, new.recipe_category_id).await?;
    state
        .store
        .update_recipe(id, &new)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("recipe", id))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_recipe(id).await? {
        return Err(AppError::not_found("recipe", id));
    }
    info!(recipe_id = %id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_requirements(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
) -> Result<Json<Vec<RequirementDetail>>, AppError> {
    if state.store.get_recipe(recipe_id).await?.is_none() {
        return Err(AppError::not_found("recipe", recipe_id));
    }
    Ok(Json(state.store.list_requirement_details(recipe_id).await?))
}

#[instrument(skip(state))]
pub async fn add_requirement(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
    Json(payload): Json<RequirementRequest>,
) -> Result<(StatusCode, Json<RecipeRequirement>), AppError> {
    payload.validate()?;
    if state.store.get_recipe(recipe_id).await?.is_none() {
        return Err(AppError::not_found("recipe", recipe_id));
    }
    ensure_ingredient(&state, payload.ingredient_id).await?;
    let row = state
        .store
        .add_requirement(recipe_id, payload.ingredient_id, payload.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

#[instrument(skip(state))]
pub async fn update_requirement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RequirementRequest>,
) -> Result<Json<RecipeRequirement>, AppError> {
    payload.validate()?;
    ensure_ingredient(&state, payload.ingredient_id).await?;
    state
        .store
        .update_requirement(id, payload.ingredient_id, payload.quantity)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("recipe requirement", id))
}

#[instrument(skip(state))]
pub async fn delete_requirement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_requirement(id).await? {
        return Err(AppError::not_found("recipe requirement", id));
    }
    Ok(StatusCode::NO_CONTENT)
}
