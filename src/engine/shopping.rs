use serde::Serialize;
use time::Date;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::aggregate::aggregate_requirements;
use super::fulfillment::join_stock;
use crate::error::AppError;
use crate::store::{iso_date, IngredientStore, PlanStore, RecipeStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListLine {
    pub ingredient_id: Uuid,
    pub name: String,
    pub unit: String,
    pub total_needed: i64,
    pub stock: i64,
    pub to_buy: i64,
    #[serde(with = "iso_date::option")]
    pub expiry_date: Option<Date>,
}

/// Amount still to buy; never negative.
pub fn shortfall(total_needed: i64, stock: i64) -> i64 {
    total_needed.saturating_sub(stock).max(0)
}

/// Consolidated list for every meal planned in the week starting `week_start`.
#[instrument(skip(store))]
pub async fn generate_shopping_list<S>(
    store: &S,
    week_start: Date,
) -> Result<Vec<ShoppingListLine>, AppError>
where
    S: PlanStore + RecipeStore + IngredientStore + ?Sized,
{
    let entries = store.get_weekly_plan_entries(week_start).await?;
    let recipe_ids: Vec<Uuid> = entries.iter().flat_map(|e| e.recipe_ids()).collect();
    if recipe_ids.is_empty() {
        debug!("nothing planned for week");
        return Ok(Vec::new());
    }

    let aggregate = aggregate_requirements(store, &recipe_ids).await?;
    let lines = join_stock(store, &aggregate)
        .await?
        .into_iter()
        .map(|(ingredient_id, total_needed, lot)| {
            let stock = lot.as_ref().map(|l| l.stock).unwrap_or(0);
            ShoppingListLine {
                ingredient_id,
                name: lot.as_ref().map(|l| l.name.clone()).unwrap_or_default(),
                unit: lot.as_ref().map(|l| l.unit.clone()).unwrap_or_default(),
                total_needed,
                stock,
                to_buy: shortfall(total_needed, stock),
                expiry_date: lot.and_then(|l| l.expiry_date),
            }
        })
        .collect();
    Ok(lines)
}
