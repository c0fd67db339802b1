//! Storage seams consumed by the engine and the HTTP layer.
//!
//! Every method is a suspension point. Implementations must keep the
//! `stock >= 0` invariant and the uniqueness of [`BatchKey`] on their own:
//! [`IngredientStore::apply_deductions`] is all-or-nothing and
//! [`IngredientStore::merge_purchase`] is an atomic upsert on the batch key.

use async_trait::async_trait;
use time::Date;
use uuid::Uuid;

mod memory;
mod postgres;
pub mod types;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use types::*;

/// A write refused by an integrity rule of the store. Raised by every
/// implementation so callers can tell a rejected write from a failed one.
#[derive(Debug, thiserror::Error)]
pub enum ConstraintViolation {
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("{0} does not exist")]
    MissingReference(String),
    #[error("{0} is out of range")]
    OutOfRange(String),
}

#[async_trait]
pub trait IngredientStore: Send + Sync {
    async fn list_ingredients(&self) -> anyhow::Result<Vec<IngredientListItem>>;
    async fn get_ingredient(&self, id: Uuid) -> anyhow::Result<Option<Ingredient>>;
    async fn find_ingredient_by_batch_key(&self, key: &BatchKey) -> anyhow::Result<Option<Uuid>>;
    async fn create_ingredient(&self, new: &NewIngredient) -> anyhow::Result<Ingredient>;
    async fn update_ingredient(
        &self,
        id: Uuid,
        patch: &IngredientPatch,
    ) -> anyhow::Result<Option<Ingredient>>;
    async fn delete_ingredient(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Add `delta` (possibly negative) to a lot's stock unless it would drop below zero.
    async fn adjust_stock(&self, id: Uuid, delta: i64) -> anyhow::Result<StockAdjustment>;

    /// Decrement every listed lot in one unit of work. When any lot is short
    /// nothing is written and every short lot is reported.
    async fn apply_deductions(
        &self,
        deductions: &[StockDeduction],
    ) -> anyhow::Result<DeductionOutcome>;

    /// Add the purchase to the lot with the same batch key, or create it.
    async fn merge_purchase(&self, item: &PurchaseItem) -> anyhow::Result<PurchaseMerge>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn list_categories(&self, kind: CategoryKind) -> anyhow::Result<Vec<Category>>;
    async fn get_category(&self, kind: CategoryKind, id: Uuid) -> anyhow::Result<Option<Category>>;
    async fn create_category(&self, kind: CategoryKind, name: &str) -> anyhow::Result<Category>;
    async fn rename_category(
        &self,
        kind: CategoryKind,
        id: Uuid,
        name: &str,
    ) -> anyhow::Result<Option<Category>>;
    /// Removes the category and clears it from every lot or recipe that used it.
    async fn delete_category(&self, kind: CategoryKind, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn list_recipes(&self) -> anyhow::Result<Vec<Recipe>>;
    async fn get_recipe(&self, id: Uuid) -> anyhow::Result<Option<Recipe>>;
    async fn create_recipe(&self, new: &NewRecipe) -> anyhow::Result<Recipe>;
    async fn update_recipe(&self, id: Uuid, new: &NewRecipe) -> anyhow::Result<Option<Recipe>>;
    async fn delete_recipe(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Requirement rows of a recipe; an unknown recipe has none.
    async fn get_recipe_requirements(&self, recipe_id: Uuid)
        -> anyhow::Result<Vec<RecipeRequirement>>;
    async fn list_all_requirements(&self) -> anyhow::Result<Vec<RecipeRequirement>>;
    async fn list_requirement_details(
        &self,
        recipe_id: Uuid,
    ) -> anyhow::Result<Vec<RequirementDetail>>;
    async fn add_requirement(
        &self,
        recipe_id: Uuid,
        ingredient_id: Uuid,
        quantity: i64,
    ) -> anyhow::Result<RecipeRequirement>;
    async fn update_requirement(
        &self,
        id: Uuid,
        ingredient_id: Uuid,
        quantity: i64,
    ) -> anyhow::Result<Option<RecipeRequirement>>;
    async fn delete_requirement(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Entries of one week ordered by day.
    async fn get_weekly_plan_entries(&self, week_start: Date)
        -> anyhow::Result<Vec<WeeklyPlanEntry>>;
    async fn upsert_weekly_plan(
        &self,
        week_start: Date,
        days: &[DayPlan],
    ) -> anyhow::Result<Vec<WeeklyPlanEntry>>;
}

pub trait KitchenStore: IngredientStore + CategoryStore + RecipeStore + PlanStore {}

impl<T> KitchenStore for T where T: IngredientStore + CategoryStore + RecipeStore + PlanStore {}
