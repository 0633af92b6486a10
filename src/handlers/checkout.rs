use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use tracing::instrument;

use crate::errors::ServiceError;
use crate::handlers::{created_response, success_response};
use crate::services::checkout::CheckoutRequest;
use crate::AppState;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(place_order))
        .route("/availability", post(check_availability))
}

/// Places an order for a cart
#[instrument(skip(state, request), fields(store_id = %request.cafe_id))]
async fn place_order(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let receipt = state.services.checkout.place_order(request).await?;
    Ok(created_response(receipt))
}

/// Dry run: reports stock and batch shortfalls without placing the order
async fn check_availability(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.services.checkout.check_availability(&request).await?;
    Ok(success_response(report))
}
