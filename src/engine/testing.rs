use uuid::Uuid;

use crate::store::{IngredientStore, MealType, MemoryStore, NewIngredient, NewRecipe, RecipeStore};

/// Recipe A needs 2 flour, recipe B needs 3 flour and 1 egg, `empty` needs nothing.
pub(crate) struct Kitchen {
    pub store: MemoryStore,
    pub flour: Uuid,
    pub egg: Uuid,
    pub a: Uuid,
    pub b: Uuid,
    pub empty: Uuid,
}

async fn lot(store: &MemoryStore, name: &str, unit: &str, stock: i64) -> Uuid {
    store
        .create_ingredient(&NewIngredient {
            name: name.into(),
            unit: unit.into(),
            stock,
            expiry_date: None,
            category_id: None,
        })
        .await
        .unwrap()
        .id
}

async fn recipe(store: &MemoryStore, name: &str, needs: &[(Uuid, i64)]) -> Uuid {
    let id = store
        .create_recipe(&NewRecipe {
            name: name.into(),
            meal_type: MealType::Dinner,
            description: None,
            recipe_category_id: None,
        })
        .await
        .unwrap()
        .id;
    for (ingredient_id, quantity) in needs {
        store
            .add_requirement(id, *ingredient_id, *quantity)
            .await
            .unwrap();
    }
    id
}

pub(crate) async fn kitchen(flour_stock: i64, egg_stock: i64) -> Kitchen {
    let store = MemoryStore::new();
    let flour = lot(&store, "Flour", "kg", flour_stock).await;
    let egg = lot(&store, "Egg", "pc", egg_stock).await;
    let a = recipe(&store, "A", &[(flour, 2)]).await;
    let b = recipe(&store, "B", &[(flour, 3), (egg, 1)]).await;
    let empty = recipe(&store, "Water", &[]).await;
    Kitchen {
        store,
        flour,
        egg,
        a,
        b,
        empty,
    }
}
