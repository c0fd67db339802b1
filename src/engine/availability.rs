use std::collections::HashMap;

use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use super::aggregate::RequirementAggregate;
use crate::error::AppError;
use crate::store::{IngredientStore, RecipeStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingIngredient {
    pub ingredient_id: Uuid,
    pub name: String,
    pub required: i64,
    pub stock: i64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeAvailability {
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub can_make: bool,
    pub missing_ingredients: Vec<MissingIngredient>,
}

/// Whether each recipe could be cooked on its own from current stock.
#[instrument(skip(store))]
pub async fn recipe_availability<S>(store: &S) -> Result<Vec<RecipeAvailability>, AppError>
where
    S: IngredientStore + RecipeStore + ?Sized,
{
    let (recipes, requirements, lots) = futures::try_join!(
        store.list_recipes(),
        store.list_all_requirements(),
        store.list_ingredients(),
    )?;
    let lots: HashMap<Uuid, _> = lots.into_iter().map(|l| (l.id, l)).collect();

    let mut per_recipe: HashMap<Uuid, RequirementAggregate> = HashMap::new();
    for r in requirements {
        per_recipe
            .entry(r.recipe_id)
            .or_default()
            .add(r.ingredient_id, r.quantity)?;
    }

    let report = recipes
        .into_iter()
        .map(|recipe| {
            let missing_ingredients: Vec<MissingIngredient> = per_recipe
                .get(&recipe.id)
                .map(|agg| {
                    agg.iter()
                        .filter_map(|(ingredient_id, required)| {
                            let lot = lots.get(&ingredient_id);
                            let stock = lot.map(|l| l.stock).unwrap_or(0);
                            (stock < required).then(|| MissingIngredient {
                                ingredient_id,
                                name: lot.map(|l| l.name.clone()).unwrap_or_default(),
                                required,
                                stock,
                                unit: lot.map(|l| l.unit.clone()).unwrap_or_default(),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            RecipeAvailability {
                recipe_id: recipe.id,
                recipe_name: recipe.name,
                can_make: missing_ingredients.is_empty(),
                missing_ingredients,
            }
        })
        .collect();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{kitchen, Kitchen};

    #[tokio::test]
    async fn each_recipe_is_judged_alone() {
        // 4 flour covers A (2) or B (3) on its own but not both together.
        let Kitchen { store, egg, a, b, empty, .. } = kitchen(4, 0).await;
        let report = recipe_availability(&store).await.unwrap();
        let by_id = |id: Uuid| report.iter().find(|r| r.recipe_id == id).unwrap();

        assert!(by_id(a).can_make);
        assert!(by_id(empty).can_make);

        let b_report = by_id(b);
        assert!(!b_report.can_make);
        assert_eq!(b_report.missing_ingredients.len(), 1);
        let missing = &b_report.missing_ingredients[0];
        assert_eq!(missing.ingredient_id, egg);
        assert_eq!(missing.name, "Egg");
        assert_eq!((missing.required, missing.stock), (1, 0));
    }
}
