use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, Json};
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{catalog::CatalogService, checkout::CheckoutService, pricing::PricingService};

pub mod catalog;
pub mod checkout;
pub mod health;

/// Services shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
    pub pricing: Arc<PricingService>,
    pub catalog: Arc<CatalogService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        config: &AppConfig,
        event_sender: EventSender,
    ) -> Self {
        let pricing = PricingService::new(
            db_pool.clone(),
            config.pricing.clone(),
            event_sender.clone(),
        );
        let checkout = CheckoutService::new(db_pool.clone(), config.checkout.clone(), event_sender);
        let catalog = CatalogService::new(db_pool, pricing.clone());

        Self {
            checkout: Arc::new(checkout),
            pricing: Arc::new(pricing),
            catalog: Arc::new(catalog),
        }
    }
}

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(data))
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(data))
}
