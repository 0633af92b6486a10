//! Order transaction coordinator.
//!
//! One attempt runs `Validating → Reserving → Committed | Aborted` inside a
//! single transaction. Retryable failures (lock conflicts, timeouts) are retried
//! a bounded number of times; stock shortfalls are final.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IntoActiveModel, QueryFilter, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::CheckoutConfig;
use crate::db::{best_effort, UnitOfWork};
use crate::entities::{
    customer, order,
    order::{OrderStatus, OrderType, PaymentStatus},
    order_item, order_item_option,
    order_item_option::OptionKind,
    payment, product,
    product::ProductStatus,
    store,
};
use crate::errors::{ServiceError, StockShortfall};
use crate::events::{Event, EventSender};
use crate::services::batch_allocator::BatchAllocator;
use crate::services::material_deduction;
use crate::services::recipe_cost::RecipeGraph;

/// Largest amount a money column holds (`DECIMAL(16, 4)`).
pub const MAX_AMOUNT: Decimal = dec!(999_999_999_999);

/// Largest quantity of one product a single order may request.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

/// A variation or add-on picked for a cart line, priced at time of sale.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct OptionSelection {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CartLine {
    /// Product id.
    pub id: Uuid,
    pub quantity: i32,
    /// Unit price shown to the buyer.
    pub price: Decimal,
    #[serde(default)]
    pub variations: Vec<OptionSelection>,
    #[serde(default)]
    pub addons: Vec<OptionSelection>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct BuyerIdentity {
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CheckoutRequest {
    pub cafe_id: Uuid,
    #[validate]
    pub buyer: BuyerIdentity,
    pub cart: Vec<CartLine>,
    pub order_type: String,
    #[validate(length(min = 1, max = 64))]
    pub payment_method: String,
    #[validate(length(max = 1000))]
    pub customer_notes: Option<String>,
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    /// Final amount due; discounts are already applied upstream.
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub success: bool,
    pub order_id: Uuid,
    pub order_number: String,
    pub payment_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineAvailability {
    pub product_id: Uuid,
    pub requested: i32,
    pub in_stock: i32,
    pub available: bool,
}

/// Result of a dry run: nothing is written or locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityReport {
    pub available: bool,
    pub lines: Vec<LineAvailability>,
    pub shortfalls: Vec<StockShortfall>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutPhase {
    Validating,
    Reserving,
    Committed,
    Aborted,
}

impl CheckoutPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutPhase::Validating => "validating",
            CheckoutPhase::Reserving => "reserving",
            CheckoutPhase::Committed => "committed",
            CheckoutPhase::Aborted => "aborted",
        }
    }
}

struct CommittedOrder {
    order: order::Model,
    depleted: Vec<Uuid>,
}

/// `ORD-YYYYMMDD-XXXXXXXX`
pub fn order_number(order_id: Uuid, at: DateTime<Utc>) -> String {
    let suffix: String = order_id.simple().to_string().chars().take(8).collect();
    format!("ORD-{}-{}", at.format("%Y%m%d"), suffix.to_uppercase())
}

fn check_amount(label: &str, amount: Decimal) -> Result<(), ServiceError> {
    if amount < Decimal::ZERO || amount > MAX_AMOUNT {
        return Err(ServiceError::ValidationError(format!(
            "{} must be between 0 and {}",
            label, MAX_AMOUNT
        )));
    }
    Ok(())
}

/// `unit price × quantity`, bounded to what a money column holds.
fn line_subtotal(line: &CartLine) -> Result<Decimal, ServiceError> {
    line.price
        .checked_mul(Decimal::from(line.quantity))
        .filter(|subtotal| *subtotal <= MAX_AMOUNT)
        .ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "subtotal for product {} exceeds {}",
                line.id, MAX_AMOUNT
            ))
        })
}

/// Shape checks that need no database access.
pub fn validate_request(request: &CheckoutRequest) -> Result<OrderType, ServiceError> {
    request.validate()?;
    if request.buyer.display_name.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "buyer display name cannot be blank".to_string(),
        ));
    }

    if request.cart.is_empty() {
        return Err(ServiceError::ValidationError("cart is empty".to_string()));
    }
    for line in &request.cart {
        if line.quantity < 1 || line.quantity > MAX_LINE_QUANTITY {
            return Err(ServiceError::ValidationError(format!(
                "quantity for product {} must be between 1 and {}",
                line.id, MAX_LINE_QUANTITY
            )));
        }
        check_amount(&format!("price for product {}", line.id), line.price)?;
        line_subtotal(line)?;
        for selection in line.variations.iter().chain(line.addons.iter()) {
            selection.validate()?;
            check_amount(&format!("price of option '{}'", selection.name), selection.price)?;
        }
    }
    requested_units(&request.cart)?;

    check_amount("subtotal", request.subtotal)?;
    check_amount("discount", request.discount)?;
    check_amount("tax", request.tax)?;
    check_amount("total", request.total)?;
    if request.total <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "order total must be greater than zero".to_string(),
        ));
    }

    OrderType::parse(&request.order_type).ok_or_else(|| {
        ServiceError::ValidationError(format!("unknown order type '{}'", request.order_type))
    })
}

/// Requested units per product, in product id order.
fn requested_units(cart: &[CartLine]) -> Result<BTreeMap<Uuid, i32>, ServiceError> {
    let mut units: BTreeMap<Uuid, i32> = BTreeMap::new();
    for line in cart {
        let total = units.entry(line.id).or_insert(0);
        *total = total
            .checked_add(line.quantity)
            .filter(|sum| *sum <= MAX_LINE_QUANTITY)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "quantity for product {} must not exceed {} per order",
                    line.id, MAX_LINE_QUANTITY
                ))
            })?;
    }
    Ok(units)
}

/// Runs `operation` until it succeeds or fails for good. Each attempt is
/// bounded by `attempt_timeout_ms`; retryable failures get at most
/// `max_retries` further attempts with linear backoff. Returns the value and
/// the attempt that produced it.
pub async fn with_retry<F, Fut, T>(
    config: &CheckoutConfig,
    mut operation: F,
) -> Result<(T, u32), ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let attempt_timeout = Duration::from_millis(config.attempt_timeout_ms);
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(attempt_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(format!(
                "checkout attempt exceeded {} ms",
                config.attempt_timeout_ms
            ))),
        };

        match outcome {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if e.is_retryable() && attempt <= config.max_retries => {
                counter!("cafe_checkout.retries", 1);
                warn!(attempt, error = %e, "Retryable checkout failure; retrying");
                let backoff = config.retry_backoff_ms * u64::from(attempt);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                counter!("cafe_checkout.aborted", 1);
                info!(
                    phase = CheckoutPhase::Aborted.as_str(),
                    attempt,
                    error = %e,
                    "Checkout aborted"
                );
                return Err(e);
            }
        }
    }
}

#[derive(Clone)]
pub struct CheckoutService {
    db_pool: Arc<DatabaseConnection>,
    config: CheckoutConfig,
    event_sender: EventSender,
}

impl CheckoutService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        config: CheckoutConfig,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db_pool,
            config,
            event_sender,
        }
    }

    /// Turns a cart into a committed order, or leaves the store untouched.
    #[instrument(skip(self, request), fields(store_id = %request.cafe_id, lines = request.cart.len()))]
    pub async fn place_order(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, ServiceError> {
        debug!(phase = CheckoutPhase::Validating.as_str(), "Checkout started");
        let order_type = match validate_request(&request) {
            Ok(order_type) => order_type,
            Err(e) => {
                counter!("cafe_checkout.rejected", 1);
                info!(phase = CheckoutPhase::Aborted.as_str(), error = %e, "Checkout rejected");
                return Err(e);
            }
        };

        let started = Instant::now();
        let request = &request;
        let (committed, attempt) =
            with_retry(&self.config, move || self.attempt(request, order_type)).await?;

        histogram!(
            "cafe_checkout.duration_seconds",
            started.elapsed().as_secs_f64()
        );
        counter!("cafe_checkout.committed", 1);
        info!(
            phase = CheckoutPhase::Committed.as_str(),
            order_id = %committed.order.id,
            order_number = %committed.order.order_number,
            attempt,
            "Order committed"
        );
        Ok(self.publish(committed).await)
    }

    /// Checks finished-goods stock and material batches for the cart without writing.
    #[instrument(skip(self, request), fields(store_id = %request.cafe_id))]
    pub async fn check_availability(
        &self,
        request: &CheckoutRequest,
    ) -> Result<AvailabilityReport, ServiceError> {
        validate_request(request)?;
        let db = &*self.db_pool;
        let store_id = request.cafe_id;

        ensure_store(db, store_id).await?;

        let units = requested_units(&request.cart)?;
        let product_ids: Vec<Uuid> = units.keys().copied().collect();
        let products: BTreeMap<Uuid, product::Model> = product::Entity::find()
            .filter(product::Column::StoreId.eq(store_id))
            .filter(product::Column::Id.is_in(product_ids.iter().copied()))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(units.len());
        let mut shortfalls = Vec::new();
        for (product_id, requested) in &units {
            let (in_stock, available) = match products.get(product_id) {
                Some(p) if p.is_available() => (p.stock, p.stock >= *requested),
                _ => (0, false),
            };
            if !available {
                shortfalls.push(StockShortfall::Product {
                    product_id: *product_id,
                    requested: *requested,
                    available: in_stock.max(0),
                });
            }
            lines.push(LineAvailability {
                product_id: *product_id,
                requested: *requested,
                in_stock,
                available,
            });
        }

        if self.config.deduct_materials {
            let graph = RecipeGraph::load_for_products(db, store_id, &product_ids)
                .await
                .map_err(ServiceError::db_error)?;
            let mut needs: BTreeMap<Uuid, Decimal> = BTreeMap::new();
            for (product_id, requested) in &units {
                for (material_id, quantity) in
                    graph.material_requirements(*product_id, Decimal::from(*requested))?
                {
                    let entry = needs.entry(material_id).or_default();
                    *entry = entry.checked_add(quantity).ok_or_else(|| {
                        ServiceError::ValidationError(format!(
                            "material {} requirement is too large to compute",
                            material_id
                        ))
                    })?;
                }
            }
            for (material_id, required) in needs {
                let plan = BatchAllocator
                    .allocate(db, material_id, required)
                    .await
                    .map_err(ServiceError::db_error)?;
                if !plan.is_satisfied() {
                    shortfalls.push(StockShortfall::Material {
                        material_id,
                        required,
                        shortage: plan.shortage,
                    });
                }
            }
        }

        Ok(AvailabilityReport {
            available: shortfalls.is_empty(),
            lines,
            shortfalls,
        })
    }

    async fn attempt(
        &self,
        request: &CheckoutRequest,
        order_type: OrderType,
    ) -> Result<CommittedOrder, ServiceError> {
        let uow = UnitOfWork::begin(&self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        match self.reserve(uow.txn(), request, order_type).await {
            Ok(committed) => {
                uow.commit().await.map_err(ServiceError::db_error)?;
                Ok(committed)
            }
            Err(e) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Checkout rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn reserve(
        &self,
        txn: &DatabaseTransaction,
        request: &CheckoutRequest,
        order_type: OrderType,
    ) -> Result<CommittedOrder, ServiceError> {
        let store_id = request.cafe_id;
        ensure_store(txn, store_id).await?;

        let customer = upsert_customer(txn, store_id, &request.buyer).await?;
        let payment_status = PaymentStatus::for_method(&request.payment_method);

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number(order_id, now)),
            store_id: Set(store_id),
            customer_id: Set(customer.id),
            order_type: Set(order_type.as_str().to_string()),
            subtotal: Set(request.subtotal),
            discount: Set(request.discount),
            tax: Set(request.tax),
            total: Set(request.total),
            payment_method: Set(request.payment_method.clone()),
            payment_status: Set(payment_status.as_str().to_string()),
            status: Set(OrderStatus::Pending.as_str().to_string()),
            customer_notes: Set(request.customer_notes.clone()),
            created_at: Set(now),
        }
        .insert(txn)
        .await
        .map_err(ServiceError::db_error)?;

        debug!(
            phase = CheckoutPhase::Reserving.as_str(),
            order_id = %order.id,
            "Reserving stock"
        );

        let graph = if self.config.deduct_materials {
            let product_ids: Vec<Uuid> = requested_units(&request.cart)?.into_keys().collect();
            Some(
                RecipeGraph::load_for_products(txn, store_id, &product_ids)
                    .await
                    .map_err(ServiceError::db_error)?,
            )
        } else {
            None
        };

        // Lines are reserved in product id order so concurrent orders lock rows alike
        let mut lines: Vec<&CartLine> = request.cart.iter().collect();
        lines.sort_by_key(|line| line.id);

        let mut depleted = Vec::new();
        for line in lines {
            let product = product::Entity::find_by_id(line.id)
                .filter(product::Column::StoreId.eq(store_id))
                .lock_exclusive()
                .one(txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("product {} no longer exists", line.id))
                })?;

            if !product.is_available() || product.stock < line.quantity {
                return Err(ServiceError::InsufficientStock(StockShortfall::Product {
                    product_id: product.id,
                    requested: line.quantity,
                    available: if product.is_available() {
                        product.stock.max(0)
                    } else {
                        0
                    },
                }));
            }

            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(product.id),
                product_name: Set(product.name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.price),
                subtotal: Set(line_subtotal(line)?),
                created_at: Set(now),
            }
            .insert(txn)
            .await
            .map_err(ServiceError::db_error)?;

            snapshot_options(txn, item.id, line).await;

            let decremented = product::Entity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(line.quantity),
                )
                .col_expr(
                    product::Column::Status,
                    Expr::case(
                        Expr::col(product::Column::Stock).lte(line.quantity),
                        ProductStatus::Unavailable.as_str(),
                    )
                    .finally(Expr::col(product::Column::Status))
                    .into(),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(now))
                .filter(product::Column::Id.eq(product.id))
                .filter(product::Column::Stock.gte(line.quantity))
                .exec(txn)
                .await
                .map_err(ServiceError::db_error)?;

            if decremented.rows_affected == 0 {
                return Err(ServiceError::ConcurrencyConflict(format!(
                    "stock of product {} changed during checkout",
                    product.id
                )));
            }
            if ProductStatus::for_stock(product.stock - line.quantity)
                == ProductStatus::Unavailable
            {
                depleted.push(product.id);
            }

            if let Some(graph) = &graph {
                for (material_id, quantity) in
                    graph.material_requirements(product.id, Decimal::from(line.quantity))?
                {
                    material_deduction::deduct(
                        UnitOfWork::join(txn),
                        Some(item.id),
                        material_id,
                        quantity,
                    )
                    .await?;
                }
            }
        }

        if payment_status == PaymentStatus::Paid {
            payment::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                amount: Set(request.total),
                method: Set(request.payment_method.clone()),
                status: Set(PaymentStatus::Paid.as_str().to_string()),
                paid_at: Set(now),
            }
            .insert(txn)
            .await
            .map_err(ServiceError::db_error)?;
        }

        Ok(CommittedOrder { order, depleted })
    }

    async fn publish(&self, committed: CommittedOrder) -> CheckoutReceipt {
        let CommittedOrder { order, depleted } = committed;

        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id: order.id,
                store_id: order.store_id,
                order_number: order.order_number.clone(),
                total: order.total,
                payment_status: order.payment_status.clone(),
            })
            .await;
        for product_id in depleted {
            self.event_sender
                .send_or_log(Event::StockDepleted {
                    product_id,
                    store_id: order.store_id,
                })
                .await;
        }

        CheckoutReceipt {
            success: true,
            order_id: order.id,
            order_number: order.order_number,
            payment_status: order.payment_status,
        }
    }
}

async fn ensure_store<C: sea_orm::ConnectionTrait>(
    conn: &C,
    store_id: Uuid,
) -> Result<store::Model, ServiceError> {
    store::Entity::find_by_id(store_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("store {} not found", store_id)))
}

/// First order under a name creates the customer; later orders reuse it.
async fn upsert_customer(
    txn: &DatabaseTransaction,
    store_id: Uuid,
    buyer: &BuyerIdentity,
) -> Result<customer::Model, ServiceError> {
    let display_name = buyer.display_name.trim();
    let existing = customer::Entity::find()
        .filter(customer::Column::StoreId.eq(store_id))
        .filter(customer::Column::DisplayName.eq(display_name))
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?;

    match existing {
        Some(found) if found.user_id.is_none() && buyer.user_id.is_some() => {
            let mut active = found.into_active_model();
            active.user_id = Set(buyer.user_id);
            active.update(txn).await.map_err(ServiceError::db_error)
        }
        Some(found) => Ok(found),
        None => customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store_id),
            display_name: Set(display_name.to_string()),
            user_id: Set(buyer.user_id),
            created_at: Set(Utc::now()),
        }
        .insert(txn)
        .await
        .map_err(ServiceError::db_error),
    }
}

/// Receipt detail only; a failed snapshot never aborts the order.
async fn snapshot_options(txn: &DatabaseTransaction, order_item_id: Uuid, line: &CartLine) {
    let selections = line
        .variations
        .iter()
        .map(|s| (OptionKind::Variation, s))
        .chain(line.addons.iter().map(|s| (OptionKind::Addon, s)));

    for (kind, selection) in selections {
        let row = order_item_option::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_item_id: Set(order_item_id),
            kind: Set(kind.as_str().to_string()),
            name: Set(selection.name.clone()),
            price: Set(selection.price),
        };
        best_effort(txn, "order_item_option", move |sp| {
            Box::pin(async move { row.insert(sp).await.map(|_| ()) })
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            cafe_id: Uuid::new_v4(),
            buyer: BuyerIdentity {
                user_id: None,
                display_name: "Rina".to_string(),
            },
            cart: vec![CartLine {
                id: Uuid::new_v4(),
                quantity: 2,
                price: dec!(25000),
                variations: vec![],
                addons: vec![],
            }],
            order_type: "dine-in".to_string(),
            payment_method: "Cash".to_string(),
            customer_notes: None,
            subtotal: dec!(50000),
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: dec!(50000),
        }
    }

    #[test]
    fn well_formed_request_passes() {
        assert_eq!(validate_request(&request()).unwrap(), OrderType::DineIn);
    }

    #[test]
    fn empty_cart_is_rejected() {
        let mut req = request();
        req.cart.clear();
        assert_matches!(validate_request(&req), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn non_positive_total_is_rejected() {
        let mut req = request();
        req.total = Decimal::ZERO;
        assert_matches!(validate_request(&req), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn zero_quantity_line_is_rejected() {
        let mut req = request();
        req.cart[0].quantity = 0;
        assert_matches!(validate_request(&req), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn blank_buyer_name_is_rejected() {
        let mut req = request();
        req.buyer.display_name = String::new();
        assert_matches!(validate_request(&req), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn unknown_order_type_is_rejected() {
        let mut req = request();
        req.order_type = "drive-through".to_string();
        assert_matches!(validate_request(&req), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn order_number_carries_date_and_id_prefix() {
        let id = Uuid::parse_str("3f2a9c1e-0000-4000-8000-000000000000").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
        assert_eq!(order_number(id, at), "ORD-20240309-3F2A9C1E");
    }

    #[test]
    fn requested_units_merge_repeated_products() {
        let mut req = request();
        let first = req.cart[0].clone();
        req.cart.push(CartLine {
            quantity: 3,
            ..first.clone()
        });
        let units = requested_units(&req.cart).unwrap();
        assert_eq!(units.get(&first.id), Some(&5));
    }

    fn retry_config(max_retries: u32, attempt_timeout_ms: u64) -> CheckoutConfig {
        CheckoutConfig {
            max_retries,
            attempt_timeout_ms,
            retry_backoff_ms: 1,
            deduct_materials: true,
        }
    }

    #[tokio::test]
    async fn conflicts_are_retried_a_bounded_number_of_times() {
        let mut calls = 0u32;
        let result: Result<((), u32), ServiceError> = with_retry(&retry_config(2, 1_000), || {
            calls += 1;
            async { Err(ServiceError::ConcurrencyConflict("stock moved".to_string())) }
        })
        .await;

        let err = result.unwrap_err();
        assert_matches!(err, ServiceError::ConcurrencyConflict(_));
        assert!(err.is_retryable());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn conflict_then_success_reports_the_winning_attempt() {
        let mut calls = 0u32;
        let (value, attempt) = with_retry(&retry_config(3, 1_000), || {
            calls += 1;
            let outcome = if calls < 3 {
                Err(ServiceError::ConcurrencyConflict("stock moved".to_string()))
            } else {
                Ok("ORD-1")
            };
            async move { outcome }
        })
        .await
        .unwrap();

        assert_eq!(value, "ORD-1");
        assert_eq!(attempt, 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn slow_attempts_time_out_and_give_up() {
        let mut calls = 0u32;
        let result: Result<((), u32), ServiceError> = with_retry(&retry_config(1, 10), || {
            calls += 1;
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_matches!(err, ServiceError::Timeout(_));
        assert!(err.is_retryable());
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn final_failures_are_not_retried() {
        let mut calls = 0u32;
        let result: Result<((), u32), ServiceError> = with_retry(&retry_config(5, 1_000), || {
            calls += 1;
            async { Err(ServiceError::NotFound("store".to_string())) }
        })
        .await;

        assert_matches!(result, Err(ServiceError::NotFound(_)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn whitespace_buyer_name_is_rejected() {
        let mut req = request();
        req.buyer.display_name = "   ".to_string();
        assert_matches!(validate_request(&req), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn line_subtotal_beyond_money_range_is_rejected() {
        let mut req = request();
        req.cart[0].price = Decimal::MAX / dec!(5);
        req.cart[0].quantity = 10;
        assert_matches!(validate_request(&req), Err(ServiceError::ValidationError(_)));

        req.cart[0].price = MAX_AMOUNT;
        req.cart[0].quantity = 2;
        assert_matches!(line_subtotal(&req.cart[0]), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn repeated_lines_cannot_overflow_requested_units() {
        let mut req = request();
        let first = req.cart[0].clone();
        req.cart[0].quantity = i32::MAX;
        req.cart.push(CartLine {
            quantity: i32::MAX,
            ..first.clone()
        });
        assert_matches!(requested_units(&req.cart), Err(ServiceError::ValidationError(_)));
        assert_matches!(validate_request(&req), Err(ServiceError::ValidationError(_)));

        req.cart[0].quantity = MAX_LINE_QUANTITY;
        req.cart[1].quantity = 1;
        assert_matches!(validate_request(&req), Err(ServiceError::ValidationError(_)));
    }
}
