//! Inventory fulfillment and reconciliation.
//!
//! Everything here talks to storage only through the traits in
//! [`crate::store`], so the same code runs against Postgres and the
//! in-memory store.

pub mod aggregate;
pub mod availability;
pub mod fulfillment;
pub mod order;
pub mod purchase;
pub mod shopping;

#[cfg(test)]
pub(crate) mod testing;

pub use availability::{recipe_availability, RecipeAvailability};
pub use fulfillment::{evaluate_order, FulfillmentLine};
pub use order::{commit_order, OrderOutcome, OrderState};
pub use purchase::{reconcile_purchases, PurchaseReceipt};
pub use shopping::{generate_shopping_list, ShoppingListLine};
