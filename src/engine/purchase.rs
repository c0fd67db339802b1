use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::store::{CategoryKind, CategoryStore, IngredientStore, PurchaseItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileAction {
    Created,
    Merged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseReceipt {
    pub ingredient_id: Uuid,
    pub action: ReconcileAction,
    pub stock: i64,
}

pub fn validate_purchases(items: &[PurchaseItem]) -> Result<(), AppError> {
    for (i, item) in items.iter().enumerate() {
        if item.name.trim().is_empty() {
            return Err(AppError::validation(format!("item {i}: name is required")));
        }
        if item.unit.trim().is_empty() {
            return Err(AppError::validation(format!("item {i}: unit is required")));
        }
        if item.quantity <= 0 {
            return Err(AppError::validation(format!(
                "item {i}: quantity must be positive, got {}",
                item.quantity
            )));
        }
    }
    Ok(())
}

async fn ensure_categories<S>(store: &S, items: &[PurchaseItem]) -> Result<(), AppError>
where
    S: CategoryStore + ?Sized,
{
    let ids: BTreeSet<Uuid> = items.iter().filter_map(|i| i.category_id).collect();
    for id in ids {
        if store.get_category(CategoryKind::Ingredient, id).await?.is_none() {
            return Err(AppError::not_found(CategoryKind::Ingredient.entity(), id));
        }
    }
    Ok(())
}

/// Restock each purchased item into the lot with the same batch key, or
/// start a new lot. Items and their categories are checked up front; each
/// item is then its own atomic upsert, so a storage failure mid-list leaves
/// earlier items applied.
#[instrument(skip_all, fields(items = items.len()))]
pub async fn reconcile_purchases<S>(
    store: &S,
    items: &[PurchaseItem],
) -> Result<Vec<PurchaseReceipt>, AppError>
where
    S: IngredientStore + CategoryStore + ?Sized,
{
    validate_purchases(items)?;
    ensure_categories(store, items).await?;

    let mut receipts = Vec::with_capacity(items.len());
    for item in items {
        let merge = store.merge_purchase(item).await?;
        let action = if merge.created {
            ReconcileAction::Created
        } else {
            ReconcileAction::Merged
        };
        info!(
            batch = %item.batch_key(),
            ingredient_id = %merge.ingredient_id,
            ?action,
            stock = merge.stock,
            "purchase reconciled"
        );
        receipts.push(PurchaseReceipt {
            ingredient_id: merge.ingredient_id,
            action,
            stock: merge.stock,
        });
    }
    Ok(receipts)
}
