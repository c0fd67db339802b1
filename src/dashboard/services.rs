use std::collections::HashMap;

use serde::Serialize;
use time::{Date, Duration};
use uuid::Uuid;

use crate::engine::ShoppingListLine;
use crate::store::{IngredientListItem, Recipe, WeeklyPlanEntry};

/// Lots still in stock that expire on or before `today + within_days`, soonest first.
/// Already expired lots are included.
pub fn expiring_lots(
    lots: Vec<IngredientListItem>,
    today: Date,
    within_days: i64,
) -> Vec<IngredientListItem> {
    let horizon = today.saturating_add(Duration::days(within_days));
    let mut out: Vec<_> = lots
        .into_iter()
        .filter(|l| l.stock > 0 && l.expiry_date.is_some_and(|d| d <= horizon))
        .collect();
    out.sort_by_key(|l| (l.expiry_date, l.name.clone()));
    out
}

/// Lots below `threshold`, emptiest first.
pub fn low_stock_lots(lots: Vec<IngredientListItem>, threshold: i64) -> Vec<IngredientListItem> {
    let mut out: Vec<_> = lots.into_iter().filter(|l| l.stock < threshold).collect();
    out.sort_by_key(|l| (l.stock, l.name.clone()));
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub day_of_week: i16,
    pub breakfast: Option<String>,
    pub lunch: Option<String>,
    pub dinner: Option<String>,
}

pub fn summarize_plan(entries: &[WeeklyPlanEntry], recipes: &[Recipe]) -> Vec<DaySummary> {
    let names: HashMap<Uuid, &str> = recipes.iter().map(|r| (r.id, r.name.as_str())).collect();
    let name_of = |id: Option<Uuid>| id.and_then(|id| names.get(&id)).map(|n| n.to_string());
    entries
        .iter()
        .map(|e| DaySummary {
            day_of_week: e.day_of_week,
            breakfast: name_of(e.breakfast_recipe_id),
            lunch: name_of(e.lunch_recipe_id),
            dinner: name_of(e.dinner_recipe_id),
        })
        .collect()
}

pub fn items_to_buy(lines: &[ShoppingListLine]) -> usize {
    lines.iter().filter(|l| l.to_buy > 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MealType;
    use time::macros::date;

    fn lot(name: &str, stock: i64, expiry: Option<Date>) -> IngredientListItem {
        IngredientListItem {
            id: Uuid::new_v4(),
            name: name.into(),
            unit: "pc".into(),
            stock,
            expiry_date: expiry,
            category_id: None,
            category_name: None,
        }
    }

    #[test]
    fn expiring_includes_expired_and_skips_empty_or_undated() {
        let today = date!(2024 - 06 - 10);
        let lots = vec![
            lot("Yogurt", 2, Some(date!(2024 - 06 - 12))),
            lot("Milk", 1, Some(date!(2024 - 06 - 08))),
            lot("Cheese", 3, Some(date!(2024 - 06 - 20))),
            lot("Cream", 0, Some(date!(2024 - 06 - 11))),
            lot("Salt", 9, None),
        ];
        let names: Vec<_> = expiring_lots(lots, today, 3)
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, ["Milk", "Yogurt"]);
    }

    #[test]
    fn low_stock_is_strictly_below_threshold() {
        let lots = vec![lot("Rice", 5, None), lot("Egg", 1, None), lot("Oil", 4, None)];
        let names: Vec<_> = low_stock_lots(lots, 5).into_iter().map(|l| l.name).collect();
        assert_eq!(names, ["Egg", "Oil"]);
    }

    #[test]
    fn plan_summary_resolves_names_and_leaves_gaps() {
        let soup = Recipe {
            id: Uuid::new_v4(),
            name: "Soup".into(),
            meal_type: MealType::Lunch,
            description: None,
            recipe_category_id: None,
        };
        let entry = WeeklyPlanEntry {
            id: Uuid::new_v4(),
            week_start_date: date!(2024 - 06 - 03),
            day_of_week: 2,
            breakfast_recipe_id: None,
            lunch_recipe_id: Some(soup.id),
            dinner_recipe_id: Some(Uuid::new_v4()),
        };
        let rows = summarize_plan(&[entry], &[soup]);
        assert_eq!(rows[0].lunch.as_deref(), Some("Soup"));
        assert_eq!(rows[0].breakfast, None);
        assert_eq!(rows[0].dinner, None);
    }
}
