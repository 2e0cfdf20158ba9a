use crate::handlers::{error_response, ApiError};
use crate::models::{CheckoutRequest, CheckoutResponse};
use crate::state::AppState;
use crate::validation;
use axum::{extract::State, http::HeaderMap, Json};
use tracing::info;

/// POST /checkout/start
pub async fn start_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    // Header identity wins over the body field when both are present.
    let user_id = validation::user_id(&headers).or_else(|| req.user_id.clone());

    info!("CHECKOUT: validate_pricing={}", req.validate_pricing);

    let order = state
        .checkout
        .start_checkout(&req.cart_id, user_id.as_deref(), req.validate_pricing)
        .await
        .map_err(error_response)?;

    Ok(Json(CheckoutResponse {
        order_id: order.order_id,
        cart_id: order.cart_id,
        total: order.total.to_string(),
        items: order.items.into_iter().map(Into::into).collect(),
        message: "Order placed successfully. Cart has been cleared.".to_string(),
    }))
}
