pub mod cart_service;
pub mod checkout_service;
pub mod domain;
pub mod policy;
pub mod ports;
pub mod price;
pub mod scripts;

// Re-export key types
pub use cart_service::CartService;
pub use checkout_service::CheckoutService;
