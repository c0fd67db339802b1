//! Order commit: `Proposed -> Validated -> Committed`, or `Proposed -> Rejected`.
//!
//! Sufficiency is always recomputed from current stock at commit time. The
//! decrement itself goes through [`IngredientStore::apply_deductions`], whose
//! conditional per-lot update closes the window between validation and write:
//! a lot drained by a concurrent commit turns this commit into `Rejected` with
//! nothing written.

use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::aggregate::aggregate_requirements;
use super::fulfillment::{ensure_recipes_given, evaluate_aggregate};
use crate::error::AppError;
use crate::store::{DeductionOutcome, IngredientStore, RecipeStore, StockDeduction, StockShortage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Proposed,
    Validated,
    Committed,
    Rejected,
}

impl OrderState {
    fn advance(self, next: OrderState) -> OrderState {
        use OrderState::*;
        debug_assert!(
            matches!(
                (self, next),
                (Proposed, Validated) | (Proposed, Rejected) | (Validated, Committed) | (Validated, Rejected)
            ),
            "illegal order transition {self:?} -> {next:?}"
        );
        next
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderOutcome {
    Committed { deducted: Vec<StockDeduction> },
    Rejected { missing: Vec<StockShortage> },
}

impl OrderOutcome {
    pub fn state(&self) -> OrderState {
        match self {
            OrderOutcome::Committed { .. } => OrderState::Committed,
            OrderOutcome::Rejected { .. } => OrderState::Rejected,
        }
    }
}

#[instrument(skip(store))]
pub async fn commit_order<S>(store: &S, recipe_ids: &[Uuid]) -> Result<OrderOutcome, AppError>
where
    S: IngredientStore + RecipeStore + ?Sized,
{
    ensure_recipes_given(recipe_ids)?;
    let state = OrderState::Proposed;

    let aggregate = aggregate_requirements(store, recipe_ids).await?;
    let missing: Vec<StockShortage> = evaluate_aggregate(store, &aggregate)
        .await?
        .iter()
        .filter_map(|line| line.shortage())
        .collect();
    if !missing.is_empty() {
        let state = state.advance(OrderState::Rejected);
        warn!(?state, short = missing.len(), "order rejected at validation");
        return Ok(OrderOutcome::Rejected { missing });
    }
    let state = state.advance(OrderState::Validated);

    let deductions = aggregate.deductions();
    match store.apply_deductions(&deductions).await? {
        DeductionOutcome::Applied => {
            let state = state.advance(OrderState::Committed);
            info!(?state, ingredients = deductions.len(), "order committed");
            Ok(OrderOutcome::Committed {
                deducted: deductions,
            })
        }
        DeductionOutcome::Short(missing) => {
            let state = state.advance(OrderState::Rejected);
            warn!(?state, short = missing.len(), "stock changed since validation; order rejected");
            Ok(OrderOutcome::Rejected { missing })
        }
    }
}
