use shared::TtlSeconds;
use shared::config::Config;

/// Limits and expiry rules consulted by every cart mutation.
#[derive(Clone, Copy, Debug)]
pub struct CartPolicy {
    pub max_items_per_cart: u32,
    pub max_quantity_per_item: u32,
    pub cart_ttl: TtlSeconds,
    pub guest_cart_ttl: TtlSeconds,
}

impl CartPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_items_per_cart: config.max_items_per_cart,
            max_quantity_per_item: config.max_quantity_per_item,
            cart_ttl: config.cart_ttl,
            guest_cart_ttl: config.guest_cart_ttl,
        }
    }

    /// Guest carts expire quickly; identified-user carts are long-lived.
    pub fn ttl_for(&self, is_guest: bool) -> TtlSeconds {
        if is_guest { self.guest_cart_ttl } else { self.cart_ttl }
    }
}

/// Cache key addressing one cart's hash. Every command touching the cart
/// goes through this key, so the hash and its expiry share a lifecycle.
pub fn cart_key(cart_id: &str) -> String {
    format!("cart:{cart_id}")
}
