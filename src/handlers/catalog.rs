use axum::{
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::success_response;
use crate::services::catalog::{MaterialCostUpdate, RecipeLineInput};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RecalculateRequest {
    pub material_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct RecalculateResponse {
    pub affected_product_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRecipeRequest {
    pub lines: Vec<RecipeLineInput>,
}

/// Creates the router for store catalog hooks
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:store_id/materials/:material_id/cost",
            put(update_material_cost),
        )
        .route("/:store_id/products/:product_id/recipe", put(replace_recipe))
        .route("/:store_id/pricing/recalculate", post(recalculate_pricing))
}

async fn update_material_cost(
    State(state): State<AppState>,
    Path((store_id, material_id)): Path<(Uuid, Uuid)>,
    Json(update): Json<MaterialCostUpdate>,
) -> Result<impl IntoResponse, ServiceError> {
    let change = state
        .services
        .catalog
        .update_material_cost(store_id, material_id, update)
        .await?;
    Ok(success_response(change))
}

async fn replace_recipe(
    State(state): State<AppState>,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ReplaceRecipeRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let change = state
        .services
        .catalog
        .replace_recipe(store_id, product_id, request.lines)
        .await?;
    Ok(success_response(change))
}

async fn recalculate_pricing(
    State(state): State<AppState>,
    Path(store_id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    // An empty body recalculates the whole store
    let request: RecalculateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RecalculateRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ServiceError::ValidationError(format!("invalid recalculation request: {}", e))
        })?
    };
    let affected_product_ids = state
        .services
        .pricing
        .recalculate(store_id, request.material_id)
        .await?;
    Ok(success_response(RecalculateResponse {
        affected_product_ids,
    }))
}
