use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::aggregate::{aggregate_requirements, RequirementAggregate};
use crate::error::AppError;
use crate::store::{Ingredient, IngredientStore, RecipeStore, StockShortage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FulfillmentLine {
    pub ingredient_id: Uuid,
    pub name: String,
    pub unit: String,
    pub quantity: i64,
    pub stock: i64,
    pub sufficient: bool,
}

impl FulfillmentLine {
    pub fn shortage(&self) -> Option<StockShortage> {
        (!self.sufficient).then(|| StockShortage {
            ingredient_id: self.ingredient_id,
            name: self.name.clone(),
            needed: self.quantity,
            available: self.stock,
            unit: self.unit.clone(),
        })
    }
}

pub(crate) fn ensure_recipes_given(recipe_ids: &[Uuid]) -> Result<(), AppError> {
    if recipe_ids.is_empty() {
        return Err(AppError::validation("recipe_ids must not be empty"));
    }
    Ok(())
}

/// Each aggregated ingredient with its required quantity and current lot,
/// in aggregate order. Lookups run concurrently.
pub(crate) async fn join_stock<S>(
    store: &S,
    aggregate: &RequirementAggregate,
) -> Result<Vec<(Uuid, i64, Option<Ingredient>)>, AppError>
where
    S: IngredientStore + ?Sized,
{
    let lots = try_join_all(aggregate.iter().map(|(id, _)| store.get_ingredient(id))).await?;
    Ok(aggregate
        .iter()
        .zip(lots)
        .map(|((id, quantity), lot)| (id, quantity, lot))
        .collect())
}

/// Join an aggregate against current stock. Read-only; reserves nothing.
#[instrument(skip_all, fields(ingredients = aggregate.len()))]
pub async fn evaluate_aggregate<S>(
    store: &S,
    aggregate: &RequirementAggregate,
) -> Result<Vec<FulfillmentLine>, AppError>
where
    S: IngredientStore + ?Sized,
{
    let lines: Vec<FulfillmentLine> = join_stock(store, aggregate)
        .await?
        .into_iter()
        .map(|(ingredient_id, quantity, lot)| {
            let (name, unit, stock) = match lot {
                Some(l) => (l.name, l.unit, l.stock),
                None => {
                    debug!(%ingredient_id, "required ingredient missing from store");
                    (String::new(), String::new(), 0)
                }
            };
            FulfillmentLine {
                ingredient_id,
                name,
                unit,
                quantity,
                stock,
                sufficient: stock >= quantity,
            }
        })
        .collect();
    Ok(lines)
}

/// Sufficiency of every ingredient an order of `recipe_ids` would consume.
#[instrument(skip(store))]
pub async fn evaluate_order<S>(
    store: &S,
    recipe_ids: &[Uuid],
) -> Result<Vec<FulfillmentLine>, AppError>
where
    S: IngredientStore + RecipeStore + ?Sized,
{
    ensure_recipes_given(recipe_ids)?;
    let aggregate = aggregate_requirements(store, recipe_ids).await?;
    evaluate_aggregate(store, &aggregate).await
}
