#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use cafe_fulfillment::{
    config::AppConfig,
    db::{self, DbConfig},
    entities::{
        material_batch, product, product_recipe, raw_material, store, sub_recipe,
        sub_recipe_ingredient,
    },
    events::{Event, EventSender},
    services::checkout::{BuyerIdentity, CartLine, CheckoutRequest},
    AppState,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

/// In-memory SQLite database with the embedded schema applied.
///
/// A single pooled connection keeps every query on the same in-memory
/// database; concurrent callers queue for it.
pub async fn setup_db() -> Arc<DatabaseConnection> {
    let cfg = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        connect_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(600),
        acquire_timeout: Duration::from_secs(30),
    };
    let pool = db::establish_connection_with_config(&cfg)
        .await
        .expect("failed to create test database");
    db::run_migrations(&pool)
        .await
        .expect("failed to run migrations in tests");
    Arc::new(pool)
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.checkout.retry_backoff_ms = 1;
    cfg
}

/// Event sender whose receiver the test keeps, so published events can be asserted.
pub fn event_channel() -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(256);
    (EventSender::new(tx), rx)
}

pub fn drain_events(rx: &mut mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Router over a fresh database, for HTTP-level tests.
pub async fn test_router() -> (Router, Arc<DatabaseConnection>, mpsc::Receiver<Event>) {
    let db = setup_db().await;
    let (sender, rx) = event_channel();
    let state = AppState::new(db.clone(), test_config(), sender);
    (cafe_fulfillment::app_router(state), db, rx)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub async fn create_store(db: &DatabaseConnection, tax_percent: Decimal) -> store::Model {
    store::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Kopi Senja".to_string()),
        tax_percent: Set(tax_percent),
        min_price_multiplier: Set(None),
        max_price_multiplier: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("insert store")
}

pub async fn create_product(
    db: &DatabaseConnection,
    store_id: Uuid,
    name: &str,
    price: Decimal,
    stock: i32,
) -> product::Model {
    create_product_with_id(db, Uuid::new_v4(), store_id, name, price, stock).await
}

/// Checkout reserves lines in product id order; a fixed id pins that order.
pub async fn create_product_with_id(
    db: &DatabaseConnection,
    id: Uuid,
    store_id: Uuid,
    name: &str,
    price: Decimal,
    stock: i32,
) -> product::Model {
    let now = Utc::now();
    product::ActiveModel {
        id: Set(id),
        store_id: Set(store_id),
        name: Set(name.to_string()),
        price: Set(price),
        stock: Set(stock),
        status: Set(product::ProductStatus::for_stock(stock).as_str().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert product")
}

pub async fn create_material(
    db: &DatabaseConnection,
    store_id: Uuid,
    name: &str,
    cost: Decimal,
) -> raw_material::Model {
    raw_material::ActiveModel {
        id: Set(Uuid::new_v4()),
        store_id: Set(store_id),
        name: Set(name.to_string()),
        unit: Set("g".to_string()),
        current_cost: Set(cost),
        is_active: Set(true),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("insert material")
}

pub async fn create_batch(
    db: &DatabaseConnection,
    material_id: Uuid,
    quantity: Decimal,
    received: NaiveDate,
    expires: Option<NaiveDate>,
) -> material_batch::Model {
    let now = Utc::now();
    material_batch::ActiveModel {
        id: Set(Uuid::new_v4()),
        material_id: Set(material_id),
        quantity: Set(quantity),
        cost_per_unit: Set(Decimal::from(10)),
        received_date: Set(received),
        expiration_date: Set(expires),
        is_used: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert batch")
}

pub async fn add_material_line(
    db: &DatabaseConnection,
    product_id: Uuid,
    material_id: Uuid,
    quantity: Decimal,
) {
    product_recipe::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        material_id: Set(Some(material_id)),
        sub_recipe_id: Set(None),
        quantity: Set(quantity),
    }
    .insert(db)
    .await
    .expect("insert recipe line");
}

pub async fn add_sub_recipe_line(
    db: &DatabaseConnection,
    product_id: Uuid,
    sub_recipe_id: Uuid,
    quantity: Decimal,
) {
    product_recipe::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        material_id: Set(None),
        sub_recipe_id: Set(Some(sub_recipe_id)),
        quantity: Set(quantity),
    }
    .insert(db)
    .await
    .expect("insert recipe line");
}

pub async fn create_sub_recipe(
    db: &DatabaseConnection,
    store_id: Uuid,
    name: &str,
    ingredients: &[(Uuid, Decimal)],
) -> sub_recipe::Model {
    let sub = sub_recipe::ActiveModel {
        id: Set(Uuid::new_v4()),
        store_id: Set(store_id),
        name: Set(name.to_string()),
    }
    .insert(db)
    .await
    .expect("insert sub-recipe");

    for (material_id, quantity) in ingredients {
        sub_recipe_ingredient::ActiveModel {
            id: Set(Uuid::new_v4()),
            sub_recipe_id: Set(sub.id),
            material_id: Set(*material_id),
            quantity: Set(*quantity),
        }
        .insert(db)
        .await
        .expect("insert sub-recipe ingredient");
    }
    sub
}

pub async fn reload_product(db: &DatabaseConnection, id: Uuid) -> product::Model {
    product::Entity::find_by_id(id)
        .one(db)
        .await
        .expect("query product")
        .expect("product exists")
}

pub async fn reload_batch(db: &DatabaseConnection, id: Uuid) -> material_batch::Model {
    material_batch::Entity::find_by_id(id)
        .one(db)
        .await
        .expect("query batch")
        .expect("batch exists")
}

/// Cart paying the catalog price for each `(product, quantity, unit price)` line.
pub fn cart_request(
    store_id: Uuid,
    buyer: &str,
    lines: &[(Uuid, i32, Decimal)],
    payment_method: &str,
) -> CheckoutRequest {
    let cart: Vec<CartLine> = lines
        .iter()
        .map(|(id, quantity, price)| CartLine {
            id: *id,
            quantity: *quantity,
            price: *price,
            variations: vec![],
            addons: vec![],
        })
        .collect();
    let subtotal: Decimal = cart
        .iter()
        .map(|line| line.price * Decimal::from(line.quantity))
        .sum();

    CheckoutRequest {
        cafe_id: store_id,
        buyer: BuyerIdentity {
            user_id: None,
            display_name: buyer.to_string(),
        },
        cart,
        order_type: "take-away".to_string(),
        payment_method: payment_method.to_string(),
        customer_notes: None,
        subtotal,
        discount: Decimal::ZERO,
        tax: Decimal::ZERO,
        total: subtotal,
    }
}
