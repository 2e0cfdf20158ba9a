use crate::models::{HealthResponse, RedisHealth};
use crate::state::AppState;
use axum::{extract::State, Json};
use std::time::Instant;
use tracing::warn;

/// GET /health
///
/// Always answers 200 so load balancers keep routing; the Redis leg of the
/// report says whether writes will actually succeed.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let started = Instant::now();
    let redis = match state.transport.ping().await {
        Ok(()) => RedisHealth {
            status: "healthy",
            latency_ms: Some(round_ms(started.elapsed().as_secs_f64())),
        },
        Err(error) => {
            warn!("Health probe failed to reach Redis: {}", error);
            RedisHealth {
                status: "unhealthy",
                latency_ms: None,
            }
        }
    };

    Json(HealthResponse {
        status: "healthy",
        service: "trolley-api",
        redis,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

fn round_ms(elapsed_secs: f64) -> f64 {
    (elapsed_secs * 100_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_ms_keeps_two_decimals() {
        assert_eq!(round_ms(0.001_234), 1.23);
        assert_eq!(round_ms(0.0), 0.0);
        assert_eq!(round_ms(1.5), 1500.0);
    }
}
