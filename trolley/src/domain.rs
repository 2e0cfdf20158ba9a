use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::price::Price;

/// Line item payload exactly as stored in a cart hash field. The price
/// snapshot stays a string end to end so it never passes through a float.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    pub quantity: u32,
    pub price_snapshot: String,
    #[serde(default)]
    pub variant: String,
}

/// A line item joined with the hash field (product id) it was stored under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: u32,
    pub price_snapshot: String,
    pub variant: String,
}

impl CartItem {
    pub fn from_stored(product_id: impl Into<String>, stored: StoredItem) -> Self {
        Self {
            product_id: product_id.into(),
            quantity: stored.quantity,
            price_snapshot: stored.price_snapshot,
            variant: stored.variant,
        }
    }
}

/// Aggregated view of one cart.
#[derive(Clone, Debug)]
pub struct Cart {
    pub cart_id: String,
    pub items: Vec<CartItem>,
    pub total_items: u64,
    pub total_price: Price,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Outcome of adding a product to a cart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemAdded {
    /// Quantity now stored for the product, after any increment.
    pub quantity: u32,
    /// Whether the product was absent from the cart before this call.
    pub is_new: bool,
}

impl ItemAdded {
    pub fn new(quantity: u32, is_new: bool) -> Self {
        Self { quantity, is_new }
    }
}

/// Outcome of setting a product's quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuantityUpdated {
    pub quantity: u32,
    /// True when the quantity was set to zero and the entry was removed.
    pub removed: bool,
}

impl QuantityUpdated {
    pub fn new(quantity: u32, removed: bool) -> Self {
        Self { quantity, removed }
    }
}

/// Outcome of merging one cart into another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeSummary {
    /// Source entries written into the target, conflicting or not.
    pub merged: u32,
    /// Source entries that collided with an existing target entry.
    pub conflicts: u32,
    pub resolution: ConflictResolution,
}

impl MergeSummary {
    pub fn new(merged: u32, conflicts: u32, resolution: ConflictResolution) -> Self {
        Self { merged, conflicts, resolution }
    }
}

/// Result of a completed (simulated) checkout.
#[derive(Clone, Debug)]
pub struct Order {
    pub order_id: String,
    pub cart_id: String,
    pub total: Price,
    pub items: Vec<CartItem>,
}

/// How colliding products are combined when two carts merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Quantities add up; the source entry supplies price and variant.
    #[default]
    Sum,
    /// The source entry replaces the target entry wholesale.
    LastWriteWins,
}

impl ConflictResolution {
    /// Wire word understood by the merge script.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::Sum => "sum",
            ConflictResolution::LastWriteWins => "last-write-wins",
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "sum" => Ok(ConflictResolution::Sum),
            "last-write-wins" => Ok(ConflictResolution::LastWriteWins),
            other => Err(format!("unknown conflict resolution: {other}")),
        }
    }
}
