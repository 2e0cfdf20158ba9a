use crate::handlers::{bad_request, error_response, ApiError};
use crate::models::{
    AddItemRequest, CartResponse, ClearCartResponse, ErrorResponse, ItemAddedResponse,
    MergeRequest, MergeResponse, QuantityUpdatedResponse, RemoveItemResponse,
    UpdateQuantityRequest,
};
use crate::state::AppState;
use crate::validation;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::collections::BTreeMap;
use tracing::info;
use trolley::domain::Cart;

/// POST /cart/items
pub async fn add_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<ItemAddedResponse>, ApiError> {
    let cart_id = validation::require_cart_id(&headers).map_err(bad_request)?;
    let is_guest = validation::user_id(&headers).is_none();

    info!("ADD_ITEM: product={}, qty={}", req.product_id, req.quantity);

    let added = state
        .carts
        .add_item(
            &cart_id,
            &req.product_id,
            req.quantity,
            &req.price,
            req.variant.as_deref(),
            is_guest,
        )
        .await
        .map_err(error_response)?;

    Ok(Json(ItemAddedResponse {
        product_id: req.product_id,
        quantity: added.quantity,
        is_new: added.is_new,
    }))
}

/// GET /cart
pub async fn get_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>, ApiError> {
    let cart_id = validation::require_cart_id(&headers).map_err(bad_request)?;

    match state.carts.get_cart(&cart_id).await {
        Ok(cart) => Ok(Json(cart_response(cart))),
        // A cart that never existed renders as an empty cart, not an error.
        Err(shared::Error::CartNotFound(_)) => Ok(Json(CartResponse {
            cart_id,
            items: BTreeMap::new(),
            total_items: 0,
            total_price: "0".to_string(),
        })),
        Err(error) => Err(error_response(error)),
    }
}

/// PUT /cart/items/{product_id}
pub async fn update_quantity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<QuantityUpdatedResponse>, ApiError> {
    let cart_id = validation::require_cart_id(&headers).map_err(bad_request)?;
    let is_guest = validation::user_id(&headers).is_none();

    info!("UPDATE_QUANTITY: product={}, qty={}", product_id, req.quantity);

    let updated = state
        .carts
        .update_quantity(&cart_id, &product_id, req.quantity, is_guest)
        .await
        .map_err(error_response)?;

    Ok(Json(QuantityUpdatedResponse {
        product_id,
        quantity: updated.quantity,
        removed: updated.removed,
    }))
}

/// DELETE /cart/items/{product_id}
pub async fn remove_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> Result<Json<RemoveItemResponse>, ApiError> {
    let cart_id = validation::require_cart_id(&headers).map_err(bad_request)?;
    let is_guest = validation::user_id(&headers).is_none();

    info!("REMOVE_ITEM: product={}", product_id);

    let removed = state
        .carts
        .remove_item(&cart_id, &product_id, is_guest)
        .await
        .map_err(error_response)?;

    if !removed {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "product_not_found",
                format!("product not in cart: {}", product_id),
            )),
        ));
    }

    Ok(Json(RemoveItemResponse { removed }))
}

/// DELETE /cart
pub async fn clear_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ClearCartResponse>, ApiError> {
    let cart_id = validation::require_cart_id(&headers).map_err(bad_request)?;

    let cleared = state
        .carts
        .clear_cart(&cart_id)
        .await
        .map_err(error_response)?;

    Ok(Json(ClearCartResponse { cleared }))
}

/// POST /cart/merge
pub async fn merge_carts(
    State(state): State<AppState>,
    Json(req): Json<MergeRequest>,
) -> Result<Json<MergeResponse>, ApiError> {
    let resolution =
        validation::parse_resolution(req.conflict_resolution.as_deref()).map_err(bad_request)?;

    info!("MERGE_CARTS: resolution={}", resolution);

    let summary = state
        .carts
        .merge_carts(&req.source_cart_id, &req.target_cart_id, resolution)
        .await
        .map_err(error_response)?;

    Ok(Json(MergeResponse {
        merged: summary.merged,
        conflicts: summary.conflicts,
        resolution: summary.resolution.to_string(),
    }))
}

fn cart_response(cart: Cart) -> CartResponse {
    let total_price = cart.total_price.to_string();
    let items = cart
        .items
        .into_iter()
        .map(|item| (item.product_id.clone(), item.into()))
        .collect();

    CartResponse {
        cart_id: cart.cart_id,
        items,
        total_items: cart.total_items,
        total_price,
    }
}
