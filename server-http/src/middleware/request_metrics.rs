use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use std::time::Instant;
use tracing::info;

use crate::validation::{CART_ID_HEADER, USER_ID_HEADER};

/// Hashes a cart or user identifier for log output. Identifiers are
/// pseudonymous session handles, so logs carry a short digest instead.
pub fn hash_identifier(id: &str) -> String {
    let hash = hex::encode(Sha256::digest(id.as_bytes()));
    hash[..8].to_string()
}

/// Request logging middleware: one line per request with method, path,
/// status, latency, and hashed identity headers.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let cart = request
        .headers()
        .get(CART_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(hash_identifier);
    let user = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(hash_identifier);

    let started = Instant::now();
    let mut response = next.run(request).await;
    let latency_ms = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;

    info!(
        "{} {} -> {} in {}ms cart={} user={}",
        method,
        path,
        response.status().as_u16(),
        latency_ms,
        cart.as_deref().unwrap_or("-"),
        user.as_deref().unwrap_or("-"),
    );

    if let Ok(value) = HeaderValue::from_str(&format!("{}", latency_ms)) {
        response.headers_mut().insert("x-response-time-ms", value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_identifier_is_short_and_hex() {
        let hashed = hash_identifier("guest-abc123");

        assert_eq!(hashed.len(), 8);
        assert!(hashed.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_identifier_is_deterministic() {
        assert_eq!(hash_identifier("user-42"), hash_identifier("user-42"));
        assert_ne!(hash_identifier("user-42"), hash_identifier("user-43"));
    }
}
