use tracing::{debug, info};
use uuid::Uuid;

use shared::{Error, Result};

use crate::cart_service::CartService;
use crate::domain::Order;

/// Stock assumed available for every product by the simulated inventory
/// check. No catalog or warehouse system is wired up.
const SIMULATED_AVAILABLE_STOCK: u32 = 999;

/// Application service for the simulated checkout flow: validate the cart,
/// mint an order id, pretend to persist the order, then clear the cart.
#[derive(Clone, Debug)]
pub struct CheckoutService {
    carts: CartService,
}

impl CheckoutService {
    pub fn new(carts: CartService) -> Self {
        Self { carts }
    }

    pub async fn start_checkout(
        &self,
        cart_id: &str,
        user_id: Option<&str>,
        validate_pricing: bool,
    ) -> Result<Order> {
        let cart = match self.carts.get_cart(cart_id).await {
            Ok(cart) => cart,
            Err(Error::CartNotFound(_)) => {
                return Err(Error::Validation(format!(
                    "cart {cart_id} not found or already checked out"
                )));
            }
            Err(error) => return Err(error),
        };

        if cart.is_empty() {
            return Err(Error::Validation("cannot checkout an empty cart".to_string()));
        }

        if validate_pricing {
            // Snapshots are authoritative in this simulation; a real catalog
            // lookup would go here.
            debug!(items = cart.items.len(), "price validation passed");
        }

        for item in &cart.items {
            if item.quantity > SIMULATED_AVAILABLE_STOCK {
                return Err(Error::Validation(format!(
                    "insufficient stock for {}: requested {}, available {}",
                    item.product_id, item.quantity, SIMULATED_AVAILABLE_STOCK
                )));
            }
        }

        let order_id = Uuid::new_v4().to_string();
        info!(
            order_id = %order_id,
            identified_user = user_id.is_some(),
            total = %cart.total_price,
            "order recorded (simulated)"
        );

        self.carts.clear_cart(cart_id).await?;

        Ok(Order { order_id, cart_id: cart.cart_id, total: cart.total_price, items: cart.items })
    }
}
