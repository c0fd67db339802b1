use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::ingredients::require_text;
use crate::store::{MealType, NewRecipe};

#[derive(Debug, Deserialize)]
pub struct RecipeRequest {
    pub name: String,
    pub meal_type: MealType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub recipe_category_id: Option<Uuid>,
}

impl RecipeRequest {
    pub fn validate(self) -> Result<NewRecipe, AppError> {
        require_text("name", &self.name)?;
        Ok(NewRecipe {
            name: self.name,
            meal_type: self.meal_type,
            description: self.description,
            recipe_category_id: self.recipe_category_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RequirementRequest {
    pub ingredient_id: Uuid,
    pub quantity: i64,
}

impl RequirementRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.quantity <= 0 {
            return Err(AppError::validation(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        Ok(())
    }
}
