#![deny(clippy::all)]

use async_trait::async_trait;
use shared::{Result, TtlSeconds};

// Ports are the pluggable extension points for the cache transport

/// Port for the cart store transport (e.g., Redis).
///
/// Mutations travel as atomic scripts so limit checks and writes land in one
/// indivisible step; the plain commands serve read and cleanup paths.
/// Implementations own connection pooling, per-command timeouts and retries.
#[async_trait]
pub trait CartTransport: Send + Sync + 'static {
    /// Run a script against `keys` with string arguments and return the raw
    /// reply for operation-specific decoding.
    async fn invoke_script(
        &self,
        source: &'static str,
        keys: &[&str],
        args: &[String],
    ) -> Result<redis::Value>;

    /// All field/value pairs of a hash, in server iteration order.
    async fn hash_entries(&self, key: &str) -> Result<Vec<(String, String)>>;

    /// Delete one hash field; true when the field existed.
    async fn delete_field(&self, key: &str, field: &str) -> Result<bool>;

    /// Number of fields currently in a hash (zero when the key is absent).
    async fn field_count(&self, key: &str) -> Result<u64>;

    async fn key_exists(&self, key: &str) -> Result<bool>;

    /// Delete a key outright; true when the key existed.
    async fn delete_key(&self, key: &str) -> Result<bool>;

    /// Reset a key's expiry; true when the key existed.
    async fn refresh_expiry(&self, key: &str, ttl: TtlSeconds) -> Result<bool>;

    /// Round-trip liveness probe.
    async fn ping(&self) -> Result<()>;
}
