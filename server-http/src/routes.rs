use crate::handlers;
use crate::middleware;
use crate::state::AppState;
use axum::{
    middleware::from_fn,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;

/// Build and configure the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Cart routes
        .route("/cart", get(handlers::get_cart))
        .route("/cart", delete(handlers::clear_cart))
        .route("/cart/items", post(handlers::add_item))
        .route("/cart/items/{product_id}", put(handlers::update_quantity))
        .route("/cart/items/{product_id}", delete(handlers::remove_item))
        .route("/cart/merge", post(handlers::merge_carts))
        // Checkout routes
        .route("/checkout/start", post(handlers::start_checkout))
        // Middleware
        .layer(from_fn(middleware::track_metrics))
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
