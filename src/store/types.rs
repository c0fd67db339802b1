use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::Date;
use uuid::Uuid;

time::serde::format_description!(calendar_date, Date, "[year]-[month]-[day]");

/// `YYYY-MM-DD` serde format for [`Date`], with an `option` variant.
pub mod iso_date {
    pub use super::calendar_date::*;
}

/// Identity of a physical batch: two lots with equal keys are the same batch.
///
/// A missing expiry date only ever matches another missing expiry date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchKey {
    pub name: String,
    pub unit: String,
    pub expiry_date: Option<Date>,
}

impl BatchKey {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, expiry_date: Option<Date>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            expiry_date,
        }
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expiry_date {
            Some(d) => write!(f, "{} ({}) exp {}", self.name, self.unit, d),
            None => write!(f, "{} ({}) no expiry", self.name, self.unit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
    pub stock: i64,
    #[serde(with = "iso_date::option")]
    pub expiry_date: Option<Date>,
    pub category_id: Option<Uuid>,
}

impl Ingredient {
    pub fn batch_key(&self) -> BatchKey {
        BatchKey::new(self.name.clone(), self.unit.clone(), self.expiry_date)
    }
}

/// Lot as listed to clients, with its category name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct IngredientListItem {
    pub id: Uuid,
    pub name: String,
    pub unit: String,
    pub stock: i64,
    #[serde(with = "iso_date::option")]
    pub expiry_date: Option<Date>,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub unit: String,
    pub stock: i64,
    pub expiry_date: Option<Date>,
    pub category_id: Option<Uuid>,
}

impl NewIngredient {
    pub fn batch_key(&self) -> BatchKey {
        BatchKey::new(self.name.clone(), self.unit.clone(), self.expiry_date)
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct IngredientPatch {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub stock: Option<i64>,
    pub expiry_date: Option<Date>,
    pub category_id: Option<Uuid>,
}

impl IngredientPatch {
    pub fn apply_to(&self, current: &Ingredient) -> Ingredient {
        Ingredient {
            id: current.id,
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            unit: self.unit.clone().unwrap_or_else(|| current.unit.clone()),
            stock: self.stock.unwrap_or(current.stock),
            expiry_date: self.expiry_date.or(current.expiry_date),
            category_id: self.category_id.or(current.category_id),
        }
    }
}

/// Ingredients and recipes are filed under separate category lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryKind {
    Ingredient,
    Recipe,
}

impl CategoryKind {
    pub fn entity(self) -> &'static str {
        match self {
            CategoryKind::Ingredient => "category",
            CategoryKind::Recipe => "recipe category",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }
}

impl FromStr for MealType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            other => anyhow::bail!("unknown meal type {other:?}"),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct RecipeRow {
    pub id: Uuid,
    pub name: String,
    pub meal_type: String,
    pub description: Option<String>,
    pub recipe_category_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub meal_type: MealType,
    pub description: Option<String>,
    pub recipe_category_id: Option<Uuid>,
}

impl TryFrom<RecipeRow> for Recipe {
    type Error = anyhow::Error;

    fn try_from(r: RecipeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            name: r.name,
            meal_type: r.meal_type.parse()?,
            description: r.description,
            recipe_category_id: r.recipe_category_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub name: String,
    pub meal_type: MealType,
    pub description: Option<String>,
    pub recipe_category_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct RecipeRequirement {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub ingredient_id: Uuid,
    pub quantity: i64,
}

/// Requirement row joined with the lot it names; empty name/unit when the lot is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct RequirementDetail {
    pub id: Uuid,
    pub ingredient_id: Uuid,
    pub name: String,
    pub unit: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct WeeklyPlanEntry {
    pub id: Uuid,
    #[serde(with = "iso_date")]
    pub week_start_date: Date,
    pub day_of_week: i16,
    pub breakfast_recipe_id: Option<Uuid>,
    pub lunch_recipe_id: Option<Uuid>,
    pub dinner_recipe_id: Option<Uuid>,
}

impl WeeklyPlanEntry {
    /// Recipes planned for the day, unset slots skipped.
    pub fn recipe_ids(&self) -> impl Iterator<Item = Uuid> {
        [
            self.breakfast_recipe_id,
            self.lunch_recipe_id,
            self.dinner_recipe_id,
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DayPlan {
    pub day_of_week: i16,
    #[serde(default)]
    pub breakfast_recipe_id: Option<Uuid>,
    #[serde(default)]
    pub lunch_recipe_id: Option<Uuid>,
    #[serde(default)]
    pub dinner_recipe_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockDeduction {
    pub ingredient_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockShortage {
    pub ingredient_id: Uuid,
    pub name: String,
    pub needed: i64,
    pub available: i64,
    pub unit: String,
}

impl StockShortage {
    /// Shortage for `needed` units of a lot; an absent lot has nothing available.
    pub fn for_lot(ingredient_id: Uuid, needed: i64, lot: Option<&Ingredient>) -> Self {
        Self {
            ingredient_id,
            name: lot.map(|l| l.name.clone()).unwrap_or_default(),
            needed,
            available: lot.map(|l| l.stock).unwrap_or(0),
            unit: lot.map(|l| l.unit.clone()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeductionOutcome {
    Applied,
    Short(Vec<StockShortage>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockAdjustment {
    Applied { stock: i64 },
    Missing,
    WouldGoNegative { lot: Ingredient },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PurchaseItem {
    pub name: String,
    pub unit: String,
    pub quantity: i64,
    #[serde(default, with = "iso_date::option")]
    pub expiry_date: Option<Date>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

impl PurchaseItem {
    pub fn batch_key(&self) -> BatchKey {
        BatchKey::new(self.name.clone(), self.unit.clone(), self.expiry_date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurchaseMerge {
    pub ingredient_id: Uuid,
    pub created: bool,
    pub stock: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn batch_keys_do_not_collide_on_shifted_separators() {
        let a = BatchKey::new("Milk", "L", None);
        let b = BatchKey::new("Mil", "kL", None);
        assert_ne!(a, b);
    }

    #[test]
    fn missing_expiry_only_matches_missing_expiry() {
        let dated = BatchKey::new("Milk", "L", Some(date!(2024 - 06 - 01)));
        let undated = BatchKey::new("Milk", "L", None);
        assert_ne!(dated, undated);
        assert_eq!(undated, BatchKey::new("Milk", "L", None));
    }

    #[test]
    fn plan_entry_skips_unset_slots() {
        let lunch = Uuid::new_v4();
        let entry = WeeklyPlanEntry {
            id: Uuid::new_v4(),
            week_start_date: date!(2024 - 06 - 03),
            day_of_week: 1,
            breakfast_recipe_id: None,
            lunch_recipe_id: Some(lunch),
            dinner_recipe_id: None,
        };
        assert_eq!(entry.recipe_ids().collect::<Vec<_>>(), vec![lunch]);
    }

    #[test]
    fn purchase_item_parses_iso_expiry() {
        let item: PurchaseItem = serde_json::from_str(
            r#"{"name":"Milk","unit":"L","quantity":2,"expiry_date":"2024-06-01"}"#,
        )
        .unwrap();
        assert_eq!(item.expiry_date, Some(date!(2024 - 06 - 01)));
        assert_eq!(item.category_id, None);

        let undated: PurchaseItem =
            serde_json::from_str(r#"{"name":"Salt","unit":"g","quantity":500}"#).unwrap();
        assert_eq!(undated.expiry_date, None);
    }

    #[test]
    fn patch_keeps_unset_fields() {
        let lot = Ingredient {
            id: Uuid::new_v4(),
            name: "Flour".into(),
            unit: "kg".into(),
            stock: 4,
            expiry_date: None,
            category_id: None,
        };
        let patched = IngredientPatch {
            stock: Some(9),
            ..Default::default()
        }
        .apply_to(&lot);
        assert_eq!(patched.stock, 9);
        assert_eq!(patched.name, "Flour");
        assert_eq!(patched.unit, "kg");
    }

    #[test]
    fn meal_type_round_trips_through_text() {
        for t in [MealType::Breakfast, MealType::Lunch, MealType::Dinner] {
            assert_eq!(t.as_str().parse::<MealType>().unwrap(), t);
        }
        assert!("brunch".parse::<MealType>().is_err());
    }
}
