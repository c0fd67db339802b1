use std::collections::BTreeMap;

use async_trait::async_trait;
use time::Date;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    BatchKey, Category, CategoryKind, CategoryStore, ConstraintViolation, DayPlan,
    DeductionOutcome, Ingredient, IngredientListItem, IngredientPatch, IngredientStore,
    NewIngredient, NewRecipe, PlanStore, PurchaseItem, PurchaseMerge, Recipe, RecipeRequirement,
    RecipeStore, RequirementDetail, StockAdjustment, StockDeduction, StockShortage,
    WeeklyPlanEntry,
};

#[derive(Default)]
struct State {
    ingredients: BTreeMap<Uuid, Ingredient>,
    ingredient_categories: BTreeMap<Uuid, Category>,
    recipe_categories: BTreeMap<Uuid, Category>,
    recipes: BTreeMap<Uuid, Recipe>,
    requirements: BTreeMap<Uuid, RecipeRequirement>,
    plan: Vec<WeeklyPlanEntry>,
}

impl State {
    fn lot_with_key(&self, key: &BatchKey) -> Option<Uuid> {
        self.ingredients
            .values()
            .find(|lot| lot.batch_key() == *key)
            .map(|lot| lot.id)
    }

    fn ensure_key_free(
        &self,
        key: &BatchKey,
        except: Option<Uuid>,
    ) -> Result<(), ConstraintViolation> {
        match self.lot_with_key(key) {
            Some(id) if Some(id) != except => {
                Err(ConstraintViolation::Duplicate(format!("lot {key}")))
            }
            _ => Ok(()),
        }
    }

    fn categories(&self, kind: CategoryKind) -> &BTreeMap<Uuid, Category> {
        match kind {
            CategoryKind::Ingredient => &self.ingredient_categories,
            CategoryKind::Recipe => &self.recipe_categories,
        }
    }

    fn categories_mut(&mut self, kind: CategoryKind) -> &mut BTreeMap<Uuid, Category> {
        match kind {
            CategoryKind::Ingredient => &mut self.ingredient_categories,
            CategoryKind::Recipe => &mut self.recipe_categories,
        }
    }

    fn ensure_category(
        &self,
        kind: CategoryKind,
        id: Option<Uuid>,
    ) -> Result<(), ConstraintViolation> {
        match id {
            Some(id) if !self.categories(kind).contains_key(&id) => Err(
                ConstraintViolation::MissingReference(format!("{} {id}", kind.entity())),
            ),
            _ => Ok(()),
        }
    }

    fn ensure_recipe(&self, id: Uuid) -> Result<(), ConstraintViolation> {
        if self.recipes.contains_key(&id) {
            Ok(())
        } else {
            Err(ConstraintViolation::MissingReference(format!("recipe {id}")))
        }
    }
}

fn ensure_quantity(quantity: i64) -> Result<(), ConstraintViolation> {
    if quantity <= 0 {
        return Err(ConstraintViolation::OutOfRange(format!("quantity {quantity}")));
    }
    Ok(())
}

fn ensure_stock(stock: i64) -> Result<(), ConstraintViolation> {
    if stock < 0 {
        return Err(ConstraintViolation::OutOfRange(format!("stock {stock}")));
    }
    Ok(())
}

/// Store kept in process memory. One lock guards the whole state, so every
/// method is a single atomic unit of work.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IngredientStore for MemoryStore {
    async fn list_ingredients(&self) -> anyhow::Result<Vec<IngredientListItem>> {
        let state = self.state.lock().await;
        let mut items: Vec<IngredientListItem> = state
            .ingredients
            .values()
            .map(|lot| IngredientListItem {
                id: lot.id,
                name: lot.name.clone(),
                unit: lot.unit.clone(),
                stock: lot.stock,
                expiry_date: lot.expiry_date,
                category_id: lot.category_id,
                category_name: lot
                    .category_id
                    .and_then(|c| state.ingredient_categories.get(&c))
                    .map(|c| c.name.clone()),
            })
            .collect();
        items.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| match (a.expiry_date, b.expiry_date) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
        });
        Ok(items)
    }

    async fn get_ingredient(&self, id: Uuid) -> anyhow::Result<Option<Ingredient>> {
        Ok(self.state.lock().await.ingredients.get(&id).cloned())
    }

    async fn find_ingredient_by_batch_key(&self, key: &BatchKey) -> anyhow::Result<Option<Uuid>> {
        Ok(self.state.lock().await.lot_with_key(key))
    }

    async fn create_ingredient(&self, new: &NewIngredient) -> anyhow::Result<Ingredient> {
        ensure_stock(new.stock)?;
        let mut state = self.state.lock().await;
        state.ensure_key_free(&new.batch_key(), None)?;
        state.ensure_category(CategoryKind::Ingredient, new.category_id)?;
        let lot = Ingredient {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            unit: new.unit.clone(),
            stock: new.stock,
            expiry_date: new.expiry_date,
            category_id: new.category_id,
        };
        state.ingredients.insert(lot.id, lot.clone());
        Ok(lot)
    }

    async fn update_ingredient(
        &self,
        id: Uuid,
        patch: &IngredientPatch,
    ) -> anyhow::Result<Option<Ingredient>> {
        let mut state = self.state.lock().await;
        let Some(current) = state.ingredients.get(&id) else {
            return Ok(None);
        };
        let updated = patch.apply_to(current);
        ensure_stock(updated.stock)?;
        state.ensure_key_free(&updated.batch_key(), Some(id))?;
        state.ensure_category(CategoryKind::Ingredient, updated.category_id)?;
        state.ingredients.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_ingredient(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.state.lock().await.ingredients.remove(&id).is_some())
    }

    async fn adjust_stock(&self, id: Uuid, delta: i64) -> anyhow::Result<StockAdjustment> {
        let mut state = self.state.lock().await;
        let Some(lot) = state.ingredients.get_mut(&id) else {
            return Ok(StockAdjustment::Missing);
        };
        let stock = lot
            .stock
            .checked_add(delta)
            .ok_or_else(|| ConstraintViolation::OutOfRange(format!("stock of {id}")))?;
        if stock < 0 {
            return Ok(StockAdjustment::WouldGoNegative { lot: lot.clone() });
        }
        lot.stock = stock;
        Ok(StockAdjustment::Applied { stock })
    }

    async fn apply_deductions(
        &self,
        deductions: &[StockDeduction],
    ) -> anyhow::Result<DeductionOutcome> {
        let mut state = self.state.lock().await;
        let short: Vec<StockShortage> = deductions
            .iter()
            .filter_map(|d| {
                let lot = state.ingredients.get(&d.ingredient_id);
                match lot {
                    Some(l) if l.stock >= d.quantity => None,
                    _ => Some(StockShortage::for_lot(d.ingredient_id, d.quantity, lot)),
                }
            })
            .collect();
        if !short.is_empty() {
            return Ok(DeductionOutcome::Short(short));
        }
        for d in deductions {
            if let Some(lot) = state.ingredients.get_mut(&d.ingredient_id) {
                lot.stock -= d.quantity;
            }
        }
        Ok(DeductionOutcome::Applied)
    }

    async fn merge_purchase(&self, item: &PurchaseItem) -> anyhow::Result<PurchaseMerge> {
        let mut state = self.state.lock().await;
        if let Some(id) = state.lot_with_key(&item.batch_key()) {
            if let Some(lot) = state.ingredients.get_mut(&id) {
                lot.stock = lot
                    .stock
                    .checked_add(item.quantity)
                    .ok_or_else(|| ConstraintViolation::OutOfRange(format!("stock of {id}")))?;
                return Ok(PurchaseMerge {
                    ingredient_id: id,
                    created: false,
                    stock: lot.stock,
                });
            }
        }
        ensure_stock(item.quantity)?;
        state.ensure_category(CategoryKind::Ingredient, item.category_id)?;
        let lot = Ingredient {
            id: Uuid::new_v4(),
            name: item.name.clone(),
            unit: item.unit.clone(),
            stock: item.quantity,
            expiry_date: item.expiry_date,
            category_id: item.category_id,
        };
        let merge = PurchaseMerge {
            ingredient_id: lot.id,
            created: true,
            stock: lot.stock,
        };
        state.ingredients.insert(lot.id, lot);
        Ok(merge)
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn list_categories(&self, kind: CategoryKind) -> anyhow::Result<Vec<Category>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Category> = state.categories(kind).values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get_category(&self, kind: CategoryKind, id: Uuid) -> anyhow::Result<Option<Category>> {
        Ok(self.state.lock().await.categories(kind).get(&id).cloned())
    }

    async fn create_category(&self, kind: CategoryKind, name: &str) -> anyhow::Result<Category> {
        let mut state = self.state.lock().await;
        if state.categories(kind).values().any(|c| c.name == name) {
            let what = format!("{} {name:?}", kind.entity());
            return Err(ConstraintViolation::Duplicate(what).into());
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        state.categories_mut(kind).insert(category.id, category.clone());
        Ok(category)
    }

    async fn rename_category(
        &self,
        kind: CategoryKind,
        id: Uuid,
        name: &str,
    ) -> anyhow::Result<Option<Category>> {
        let mut state = self.state.lock().await;
        if state
            .categories(kind)
            .values()
            .any(|c| c.name == name && c.id != id)
        {
            let what = format!("{} {name:?}", kind.entity());
            return Err(ConstraintViolation::Duplicate(what).into());
        }
        Ok(state.categories_mut(kind).get_mut(&id).map(|c| {
            c.name = name.to_string();
            c.clone()
        }))
    }

    async fn delete_category(&self, kind: CategoryKind, id: Uuid) -> anyhow::Result<bool> {
        let mut state = self.state.lock().await;
        match kind {
            CategoryKind::Ingredient => {
                for lot in state.ingredients.values_mut() {
                    if lot.category_id == Some(id) {
                        lot.category_id = None;
                    }
                }
            }
            CategoryKind::Recipe => {
                for recipe in state.recipes.values_mut() {
                    if recipe.recipe_category_id == Some(id) {
                        recipe.recipe_category_id = None;
                    }
                }
            }
        }
        Ok(state.categories_mut(kind).remove(&id).is_some())
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn list_recipes(&self) -> anyhow::Result<Vec<Recipe>> {
        let mut rows: Vec<Recipe> = self.state.lock().await.recipes.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get_recipe(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        Ok(self.state.lock().await.recipes.get(&id).cloned())
    }

    async fn create_recipe(&self, new: &NewRecipe) -> anyhow::Result<Recipe> {
        let mut state = self.state.lock().await;
        state.ensure_category(CategoryKind::Recipe, new.recipe_category_id)?;
        let recipe = Recipe {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            meal_type: new.meal_type,
            description: new.description.clone(),
            recipe_category_id: new.recipe_category_id,
        };
        state.recipes.insert(recipe.id, recipe.clone());
        Ok(recipe)
    }

    async fn update_recipe(&self, id: Uuid, new: &NewRecipe) -> anyhow::Result<Option<Recipe>> {
        let mut state = self.state.lock().await;
        state.ensure_category(CategoryKind::Recipe, new.recipe_category_id)?;
        Ok(state.recipes.get_mut(&id).map(|r| {
            r.name = new.name.clone();
            r.meal_type = new.meal_type;
            r.description = new.description.clone();
            r.recipe_category_id = new.recipe_category_id;
            r.clone()
        }))
    }

    async fn delete_recipe(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut state = self.state.lock().await;
        if state.recipes.remove(&id).is_none() {
            return Ok(false);
        }
        state.requirements.retain(|_, r| r.recipe_id != id);
        for entry in &mut state.plan {
            for slot in [
                &mut entry.breakfast_recipe_id,
                &mut entry.lunch_recipe_id,
                &mut entry.dinner_recipe_id,
            ] {
                if *slot == Some(id) {
                    *slot = None;
                }
            }
        }
        Ok(true)
    }

    async fn get_recipe_requirements(
        &self,
        recipe_id: Uuid,
    ) -> anyhow::Result<Vec<RecipeRequirement>> {
        Ok(self
            .state
            .lock()
            .await
            .requirements
            .values()
            .filter(|r| r.recipe_id == recipe_id)
            .cloned()
            .collect())
    }

    async fn list_all_requirements(&self) -> anyhow::Result<Vec<RecipeRequirement>> {
        Ok(self.state.lock().await.requirements.values().cloned().collect())
    }

    async fn list_requirement_details(
        &self,
        recipe_id: Uuid,
    ) -> anyhow::Result<Vec<RequirementDetail>> {
        let state = self.state.lock().await;
        let mut rows: Vec<RequirementDetail> = state
            .requirements
            .values()
            .filter(|r| r.recipe_id == recipe_id)
            .map(|r| {
                let lot = state.ingredients.get(&r.ingredient_id);
                RequirementDetail {
                    id: r.id,
                    ingredient_id: r.ingredient_id,
                    name: lot.map(|l| l.name.clone()).unwrap_or_default(),
                    unit: lot.map(|l| l.unit.clone()).unwrap_or_default(),
                    quantity: r.quantity,
                }
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn add_requirement(
        &self,
        recipe_id: Uuid,
        ingredient_id: Uuid,
        quantity: i64,
    ) -> anyhow::Result<RecipeRequirement> {
        ensure_quantity(quantity)?;
        let mut state = self.state.lock().await;
        state.ensure_recipe(recipe_id)?;
        let row = RecipeRequirement {
            id: Uuid::new_v4(),
            recipe_id,
            ingredient_id,
            quantity,
        };
        state.requirements.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_requirement(
        &self,
        id: Uuid,
        ingredient_id: Uuid,
        quantity: i64,
    ) -> anyhow::Result<Option<RecipeRequirement>> {
        ensure_quantity(quantity)?;
        let mut state = self.state.lock().await;
        Ok(state.requirements.get_mut(&id).map(|r| {
            r.ingredient_id = ingredient_id;
            r.quantity = quantity;
            r.clone()
        }))
    }

    async fn delete_requirement(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.state.lock().await.requirements.remove(&id).is_some())
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn get_weekly_plan_entries(
        &self,
        week_start: Date,
    ) -> anyhow::Result<Vec<WeeklyPlanEntry>> {
        let mut rows: Vec<WeeklyPlanEntry> = self
            .state
            .lock()
            .await
            .plan
            .iter()
            .filter(|e| e.week_start_date == week_start)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.day_of_week);
        Ok(rows)
    }

    async fn upsert_weekly_plan(
        &self,
        week_start: Date,
        days: &[DayPlan],
    ) -> anyhow::Result<Vec<WeeklyPlanEntry>> {
        if let Some(day) = days.iter().find(|d| !(1..=7).contains(&d.day_of_week)) {
            let what = format!("day_of_week {}", day.day_of_week);
            return Err(ConstraintViolation::OutOfRange(what).into());
        }
        let mut state = self.state.lock().await;
        for day in days {
            for id in [day.breakfast_recipe_id, day.lunch_recipe_id, day.dinner_recipe_id]
                .into_iter()
                .flatten()
            {
                state.ensure_recipe(id)?;
            }
        }
        let mut entries = Vec::with_capacity(days.len());
        for day in days {
            let existing = state
                .plan
                .iter_mut()
                .find(|e| e.week_start_date == week_start && e.day_of_week == day.day_of_week);
            let entry = match existing {
                Some(e) => {
                    e.breakfast_recipe_id = day.breakfast_recipe_id;
                    e.lunch_recipe_id = day.lunch_recipe_id;
                    e.dinner_recipe_id = day.dinner_recipe_id;
                    e.clone()
                }
                None => {
                    let e = WeeklyPlanEntry {
                        id: Uuid::new_v4(),
                        week_start_date: week_start,
                        day_of_week: day.day_of_week,
                        breakfast_recipe_id: day.breakfast_recipe_id,
                        lunch_recipe_id: day.lunch_recipe_id,
                        dinner_recipe_id: day.dinner_recipe_id,
                    };
                    state.plan.push(e.clone());
                    e
                }
            };
            entries.push(entry);
        }
        entries.sort_by_key(|e| e.day_of_week);
        Ok(entries)
    }
}
