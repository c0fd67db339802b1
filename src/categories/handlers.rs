use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    error::AppError,
    ingredients::require_text,
    state::AppState,
    store::{Category, CategoryKind},
};

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .merge(routes_for("/categories", CategoryKind::Ingredient))
        .merge(routes_for("/recipe-categories", CategoryKind::Recipe))
}

fn routes_for(path: &str, kind: CategoryKind) -> Router<AppState> {
    Router::new()
        .route(
            path,
            get(move |state: State<AppState>| list_categories(state, kind)).post(
                move |state: State<AppState>, body: Json<CategoryRequest>| {
                    create_category(state, kind, body)
                },
            ),
        )
        .route(
            &format!("{path}/:id"),
            put(
                move |state: State<AppState>, id: Path<Uuid>, body: Json<CategoryRequest>| {
                    rename_category(state, kind, id, body)
                },
            )
            .delete(move |state: State<AppState>, id: Path<Uuid>| {
                delete_category(state, kind, id)
            }),
        )
}

/// Fails with `NotFound` when `id` names no category of `kind`.
pub(crate) async fn ensure_category(
    state: &AppState,
    kind: CategoryKind,
    id: Option<Uuid>,
) -> Result<(), AppError> {
    let Some(id) = id else {
        return Ok(());
    };
    match state.store.get_category(kind, id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::not_found(kind.entity(), id)),
    }
}

async fn ensure_name_free(
    state: &AppState,
    kind: CategoryKind,
    name: &str,
    except: Option<Uuid>,
) -> Result<(), AppError> {
    let taken = state
        .store
        .list_categories(kind)
        .await?
        .into_iter()
        .any(|c| c.name == name && Some(c.id) != except);
    if taken {
        return Err(AppError::Conflict(format!(
            "{} {name:?} already exists",
            kind.entity()
        )));
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    kind: CategoryKind,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.store.list_categories(kind).await?))
}

#[instrument(skip(state))]
pub async fn create_category(
    State(state): State<AppState>,
    kind: CategoryKind,
    Json(payload): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    require_text("name", &payload.name)?;
    ensure_name_free(&state, kind, &payload.name, None).await?;
    let category = state.store.create_category(kind, &payload.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state))]
pub async fn rename_category(
    State(state): State<AppState>,
    kind: CategoryKind,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<Category>, AppError> {
    require_text("name", &payload.name)?;
    ensure_name_free(&state, kind, &payload.name, Some(id)).await?;
    state
        .store
        .rename_category(kind, id, &payload.name)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(kind.entity(), id))
}

/// Lots or recipes in the category stay; only their category is cleared.
#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    kind: CategoryKind,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_category(kind, id).await? {
        return Err(AppError::not_found(kind.entity(), id));
    }
    info!(category_id = %id, ?kind, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MealType, NewIngredient, NewRecipe};

    const INGREDIENT: CategoryKind = CategoryKind::Ingredient;
    const RECIPE: CategoryKind = CategoryKind::Recipe;

    fn named(name: &str) -> Json<CategoryRequest> {
        Json(CategoryRequest { name: name.into() })
    }

    #[tokio::test]
    async fn duplicate_name_is_conflict() {
        let state = AppState::fake();
        create_category(State(state.clone()), INGREDIENT, named("Dairy")).await.unwrap();
        let err = create_category(State(state), INGREDIENT, named("Dairy"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn store_duplicate_is_conflict_even_past_the_name_check() {
        let state = AppState::fake();
        state.store.create_category(INGREDIENT, "Dairy").await.unwrap();
        let err: AppError = state
            .store
            .create_category(INGREDIENT, "Dairy")
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn kinds_keep_separate_names() {
        let state = AppState::fake();
        create_category(State(state.clone()), INGREDIENT, named("Quick")).await.unwrap();
        create_category(State(state.clone()), RECIPE, named("Quick")).await.unwrap();
        let Json(rows) = list_categories(State(state), RECIPE).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn delete_nulls_ingredient_category() {
        let state = AppState::fake();
        let (_, Json(veg)) = create_category(State(state.clone()), INGREDIENT, named("Veg"))
            .await
            .unwrap();
        let carrot = state
            .store
            .create_ingredient(&NewIngredient {
                name: "Carrot".into(),
                unit: "pc".into(),
                stock: 3,
                expiry_date: None,
                category_id: Some(veg.id),
            })
            .await
            .unwrap();

        let status = delete_category(State(state.clone()), INGREDIENT, Path(veg.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let carrot = state.store.get_ingredient(carrot.id).await.unwrap().unwrap();
        assert_eq!(carrot.category_id, None);
        assert_eq!(carrot.stock, 3);

        let err = delete_category(State(state), INGREDIENT, Path(veg.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_nulls_recipe_category() {
        let state = AppState::fake();
        let (_, Json(quick)) = create_category(State(state.clone()), RECIPE, named("Quick"))
            .await
            .unwrap();
        let omelette = state
            .store
            .create_recipe(&NewRecipe {
                name: "Omelette".into(),
                meal_type: MealType::Breakfast,
                description: None,
                recipe_category_id: Some(quick.id),
            })
            .await
            .unwrap();

        // Ingredient categories never see a recipe category id.
        let err = delete_category(State(state.clone()), INGREDIENT, Path(quick.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { entity: "category", .. }));

        delete_category(State(state.clone()), RECIPE, Path(quick.id)).await.unwrap();
        let omelette = state.store.get_recipe(omelette.id).await.unwrap().unwrap();
        assert_eq!(omelette.recipe_category_id, None);
    }
}
