use std::collections::BTreeMap;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::store::{RecipeStore, StockDeduction};

/// Total quantity needed per ingredient across a set of recipes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequirementAggregate {
    totals: BTreeMap<Uuid, i64>,
}

impl RequirementAggregate {
    /// Fails rather than clamp when the running total leaves the `i64` range.
    pub fn add(&mut self, ingredient_id: Uuid, quantity: i64) -> Result<(), AppError> {
        let total = self.totals.entry(ingredient_id).or_default();
        *total = total
            .checked_add(quantity)
            .ok_or_else(|| too_large(ingredient_id))?;
        Ok(())
    }

    pub fn quantity_for(&self, ingredient_id: Uuid) -> i64 {
        self.totals.get(&ingredient_id).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Uuid, i64)> + '_ {
        self.totals.iter().map(|(id, q)| (*id, *q))
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn deductions(&self) -> Vec<StockDeduction> {
        self.iter()
            .map(|(ingredient_id, quantity)| StockDeduction {
                ingredient_id,
                quantity,
            })
            .collect()
    }
}

fn too_large(ingredient_id: Uuid) -> AppError {
    AppError::validation(format!(
        "total requirement for ingredient {ingredient_id} is too large"
    ))
}

/// Sum requirements over `recipe_ids`. Duplicates count once per occurrence;
/// unknown recipes and recipes without requirements contribute nothing.
#[instrument(skip(store), fields(recipes = recipe_ids.len()))]
pub async fn aggregate_requirements<S>(
    store: &S,
    recipe_ids: &[Uuid],
) -> Result<RequirementAggregate, AppError>
where
    S: RecipeStore + ?Sized,
{
    let mut multiplicity: BTreeMap<Uuid, i64> = BTreeMap::new();
    for id in recipe_ids {
        *multiplicity.entry(*id).or_default() += 1;
    }

    // Lookups are read-only and independent, so issue them together.
    let rows = try_join_all(
        multiplicity
            .keys()
            .map(|id| store.get_recipe_requirements(*id)),
    )
    .await?;

    let mut aggregate = RequirementAggregate::default();
    for ((recipe_id, times), requirements) in multiplicity.iter().zip(rows) {
        if requirements.is_empty() {
            debug!(%recipe_id, "recipe contributes no requirements");
        }
        for r in requirements {
            let quantity = r
                .quantity
                .checked_mul(*times)
                .ok_or_else(|| too_large(r.ingredient_id))?;
            aggregate.add(r.ingredient_id, quantity)?;
        }
    }

    debug!(ingredients = aggregate.len(), "requirements aggregated");
    Ok(aggregate)
}
