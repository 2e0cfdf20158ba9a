use tracing::warn;

use crate::TtlSeconds;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub redis_max_connections: usize,
    pub redis_connect_timeout_secs: u64,
    pub redis_command_timeout_secs: u64,
    pub cart_ttl: TtlSeconds,
    pub guest_cart_ttl: TtlSeconds,
    pub max_items_per_cart: u32,
    pub max_quantity_per_item: u32,
}

impl Config {
    const DEFAULT_REDIS_HOST: &str = "localhost";
    // Identified-user carts live for a week, guest carts for a day.
    const DEFAULT_CART_TTL_SECS: u64 = 604_800;
    const DEFAULT_GUEST_CART_TTL_SECS: u64 = 86_400;

    pub fn from_env() -> Self {
        let port = std::env::var("APP_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .unwrap_or(8000);
        let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| {
            let host = std::env::var("REDIS_HOST")
                .unwrap_or_else(|_| Self::DEFAULT_REDIS_HOST.to_string());
            let redis_port = std::env::var("REDIS_PORT")
                .unwrap_or_else(|_| "6379".to_string())
                .parse::<u16>()
                .unwrap_or(6379);
            let db = std::env::var("REDIS_DB")
                .unwrap_or_else(|_| "0".to_string())
                .parse::<u32>()
                .unwrap_or(0);
            match std::env::var("REDIS_AUTH_TOKEN") {
                Ok(token) if !token.is_empty() => redis_url(&host, redis_port, db, Some(&token)),
                _ => {
                    warn!("REDIS_AUTH_TOKEN not set, connecting to Redis without TLS");
                    redis_url(&host, redis_port, db, None)
                }
            }
        });
        Self {
            port,
            redis_url,
            redis_max_connections: std::env::var("REDIS_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "50".to_string())
                .parse::<usize>()
                .unwrap_or(50),
            redis_connect_timeout_secs: std::env::var("REDIS_CONNECT_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse::<u64>()
                .unwrap_or(5),
            redis_command_timeout_secs: std::env::var("REDIS_COMMAND_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse::<u64>()
                .unwrap_or(5),
            cart_ttl: TtlSeconds(
                std::env::var("CART_TTL_SECONDS")
                    .unwrap_or_else(|_| Self::DEFAULT_CART_TTL_SECS.to_string())
                    .parse::<u64>()
                    .unwrap_or(Self::DEFAULT_CART_TTL_SECS),
            ),
            guest_cart_ttl: TtlSeconds(
                std::env::var("GUEST_CART_TTL_SECONDS")
                    .unwrap_or_else(|_| Self::DEFAULT_GUEST_CART_TTL_SECS.to_string())
                    .parse::<u64>()
                    .unwrap_or(Self::DEFAULT_GUEST_CART_TTL_SECS),
            ),
            max_items_per_cart: std::env::var("MAX_ITEMS_PER_CART")
                .unwrap_or_else(|_| "200".to_string())
                .parse::<u32>()
                .unwrap_or(200),
            max_quantity_per_item: std::env::var("MAX_QUANTITY_PER_ITEM")
                .unwrap_or_else(|_| "99".to_string())
                .parse::<u32>()
                .unwrap_or(99),
        }
    }
}

// Auth tokens only ever travel over TLS.
fn redis_url(host: &str, port: u16, db: u32, auth_token: Option<&str>) -> String {
    match auth_token {
        Some(token) => format!("rediss://:{token}@{host}:{port}/{db}"),
        None => format!("redis://{host}:{port}/{db}"),
    }
}

#[cfg(test)]
mod tests {
    use super::redis_url;

    #[test]
    fn test_redis_url_plain_without_auth_token() {
        assert_eq!(redis_url("localhost", 6379, 0, None), "redis://localhost:6379/0");
    }

    #[test]
    fn test_redis_url_tls_with_auth_token() {
        assert_eq!(
            redis_url("cache.internal", 6380, 2, Some("s3cret")),
            "rediss://:s3cret@cache.internal:6380/2"
        );
    }
}
