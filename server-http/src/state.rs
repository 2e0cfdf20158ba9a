use std::sync::Arc;
use trolley::policy::CartPolicy;
use trolley::ports::CartTransport;
use trolley::{CartService, CheckoutService};

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub transport: Arc<dyn CartTransport>,
}

impl AppState {
    pub fn new(transport: Arc<dyn CartTransport>, policy: CartPolicy) -> Self {
        let carts = CartService::new(transport.clone(), policy);
        let checkout = CheckoutService::new(carts.clone());

        Self {
            carts,
            checkout,
            transport,
        }
    }
}
