use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trolley::domain::CartItem;

// === Cart Operation Models ===

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
    pub price: String,
    #[serde(default)]
    pub variant: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemAddedResponse {
    pub product_id: String,
    pub quantity: u32,
    pub is_new: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct QuantityUpdatedResponse {
    pub product_id: String,
    pub quantity: u32,
    pub removed: bool,
}

#[derive(Debug, Serialize)]
pub struct RemoveItemResponse {
    pub removed: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearCartResponse {
    pub cleared: bool,
}

#[derive(Debug, Serialize)]
pub struct CartItemBody {
    pub product_id: String,
    pub quantity: u32,
    pub price_snapshot: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub variant: String,
}

impl From<CartItem> for CartItemBody {
    fn from(item: CartItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            price_snapshot: item.price_snapshot,
            variant: item.variant,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub cart_id: String,
    pub items: BTreeMap<String, CartItemBody>,
    pub total_items: u64,
    pub total_price: String,
}

// === Merge Models ===

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub source_cart_id: String,
    pub target_cart_id: String,
    #[serde(default)]
    pub conflict_resolution: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MergeResponse {
    pub merged: u32,
    pub conflicts: u32,
    pub resolution: String,
}

// === Checkout Models ===

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub cart_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_validate_pricing")]
    pub validate_pricing: bool,
}

fn default_validate_pricing() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub cart_id: String,
    pub total: String,
    pub items: Vec<CartItemBody>,
    pub message: String,
}

// === Health Models ===

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub redis: RedisHealth,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct RedisHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
}

// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }
}
