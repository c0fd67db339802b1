use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::engine::PurchaseReceipt;
use crate::error::AppError;
use crate::store::{iso_date, BatchKey, IngredientPatch, NewIngredient};

#[derive(Debug, Deserialize)]
pub struct CreateIngredientRequest {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub stock: i64,
    #[serde(default, with = "iso_date::option")]
    pub expiry_date: Option<Date>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

impl CreateIngredientRequest {
    pub fn validate(self) -> Result<NewIngredient, AppError> {
        require_text("name", &self.name)?;
        require_text("unit", &self.unit)?;
        if self.stock < 0 {
            return Err(AppError::validation("stock must not be negative"));
        }
        Ok(NewIngredient {
            name: self.name,
            unit: self.unit,
            stock: self.stock,
            expiry_date: self.expiry_date,
            category_id: self.category_id,
        })
    }
}

/// Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateIngredientRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default, with = "iso_date::option")]
    pub expiry_date: Option<Date>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

impl UpdateIngredientRequest {
    pub fn validate(self) -> Result<IngredientPatch, AppError> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(unit) = &self.unit {
            require_text("unit", unit)?;
        }
        if matches!(self.stock, Some(s) if s < 0) {
            return Err(AppError::validation("stock must not be negative"));
        }
        Ok(IngredientPatch {
            name: self.name,
            unit: self.unit,
            stock: self.stock,
            expiry_date: self.expiry_date,
            category_id: self.category_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
}

impl AdjustStockRequest {
    /// The amount a negative delta asks to remove, reported back on refusal.
    pub fn validate(&self) -> Result<i64, AppError> {
        self.delta
            .checked_neg()
            .ok_or_else(|| AppError::validation(format!("delta {} is out of range", self.delta)))
    }
}

#[derive(Debug, Serialize)]
pub struct AdjustStockResponse {
    pub ingredient_id: Uuid,
    pub stock: i64,
}

#[derive(Debug, Deserialize)]
pub struct BatchLookupQuery {
    pub name: String,
    pub unit: String,
    #[serde(default, with = "iso_date::option")]
    pub expiry_date: Option<Date>,
}

impl From<BatchLookupQuery> for BatchKey {
    fn from(q: BatchLookupQuery) -> Self {
        BatchKey::new(q.name, q.unit, q.expiry_date)
    }
}

#[derive(Debug, Serialize)]
pub struct BatchLookupResponse {
    pub ingredient_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmPurchaseResponse {
    pub success: bool,
    pub receipts: Vec<PurchaseReceipt>,
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(())
}
