// shared/src/lib.rs

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("quantity {requested} exceeds the per-product limit of {limit}")]
    MaxQuantityExceeded { limit: u32, requested: u32 },
    #[error("cart already holds {current} distinct products, the limit is {limit}")]
    MaxItemsExceeded { limit: u32, current: u32 },
    #[error("product not found in cart: {0}")]
    ProductNotFound(String),
    #[error("cart not found: {0}")]
    CartNotFound(String),
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),
    #[error("operation outcome unknown: {0}")]
    UnknownOutcome(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlSeconds(pub u64);

pub mod config;
