use axum::http::StatusCode;
use axum::Json;

use crate::models::ErrorResponse;
use crate::validation::ValidationError;

pub mod cart;
pub mod checkout;
pub mod health;

pub use cart::{add_item, clear_cart, get_cart, merge_carts, remove_item, update_quantity};
pub use checkout::start_checkout;
pub use health::health_check;

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

/// Maps a domain error onto a status code and wire body. Transport failures
/// and ambiguous outcomes collapse into one service-unavailable class; the
/// message still carries the underlying cause.
pub(crate) fn error_response(error: shared::Error) -> ApiError {
    let message = error.to_string();
    let (status, code) = match error {
        shared::Error::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        shared::Error::MaxQuantityExceeded { .. } => {
            (StatusCode::BAD_REQUEST, "max_quantity_exceeded")
        }
        shared::Error::MaxItemsExceeded { .. } => (StatusCode::BAD_REQUEST, "max_items_exceeded"),
        shared::Error::ProductNotFound(_) => (StatusCode::NOT_FOUND, "product_not_found"),
        shared::Error::CartNotFound(_) => (StatusCode::NOT_FOUND, "cart_not_found"),
        shared::Error::CacheUnavailable(_) | shared::Error::UnknownOutcome(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
        }
    };

    (status, Json(ErrorResponse::new(code, message)))
}

pub(crate) fn bad_request(error: ValidationError) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("validation_error", error.to_string())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_status_codes() {
        let cases = [
            (shared::Error::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                shared::Error::MaxQuantityExceeded {
                    limit: 100,
                    requested: 101,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                shared::Error::MaxItemsExceeded {
                    limit: 50,
                    current: 50,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                shared::Error::ProductNotFound("sku-1".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                shared::Error::CartNotFound("user-1".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                shared::Error::CacheUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                shared::Error::UnknownOutcome("timed out".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (error, expected) in cases {
            let (status, _) = error_response(error);
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn test_error_response_carries_machine_readable_code() {
        let (_, Json(body)) = error_response(shared::Error::UnknownOutcome("lost reply".into()));

        assert_eq!(body.error, "service_unavailable");
        assert!(body.message.contains("lost reply"));
    }
}
