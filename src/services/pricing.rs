use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::db::{best_effort, with_transaction};
use crate::entities::{price_change_notification, product, product_pricing, store};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::recipe_cost::RecipeGraph;

const ONE_HUNDRED: Decimal = dec!(100);

/// Prices derived from one ingredient cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub ingredient_cost: Decimal,
    pub desired_margin_percent: Decimal,
    pub suggested_price: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
}

impl PriceQuote {
    fn matches(&self, row: &product_pricing::Model) -> bool {
        row.ingredient_cost.round_dp(4) == self.ingredient_cost
            && row.desired_margin_percent.round_dp(4) == self.desired_margin_percent
            && row.suggested_price.round_dp(2) == self.suggested_price
            && row.min_price.round_dp(2) == self.min_price
            && row.max_price.round_dp(2) == self.max_price
    }
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `suggested = cost / (1 − margin/100 − tax/100)`, bounded by the cost multipliers.
///
/// A margin and tax that together reach 100% leave no positive divisor and are
/// rejected.
pub fn compute_pricing(
    ingredient_cost: Decimal,
    margin_percent: Decimal,
    tax_percent: Decimal,
    min_multiplier: Decimal,
    max_multiplier: Decimal,
) -> Result<PriceQuote, ServiceError> {
    let divisor = Decimal::ONE - margin_percent / ONE_HUNDRED - tax_percent / ONE_HUNDRED;
    if divisor <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "margin {}% plus tax {}% must stay below 100%",
            margin_percent, tax_percent
        )));
    }

    let cost = ingredient_cost.round_dp(4);
    let too_large = || {
        ServiceError::ValidationError(format!("ingredient cost {} is too large to price", cost))
    };
    Ok(PriceQuote {
        ingredient_cost: cost,
        desired_margin_percent: margin_percent.round_dp(4),
        suggested_price: money(cost.checked_div(divisor).ok_or_else(too_large)?),
        min_price: money(cost.checked_mul(min_multiplier).ok_or_else(too_large)?),
        max_price: money(cost.checked_mul(max_multiplier).ok_or_else(too_large)?),
    })
}

/// Which products a recalculation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeScope {
    Store,
    /// Products whose recipe reaches the material, directly or via a sub-recipe.
    Material(Uuid),
    Product(Uuid),
}

/// A material cost edit that triggered the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostChange {
    pub material_id: Uuid,
    pub old_cost: Decimal,
    pub new_cost: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecalculationOutcome {
    /// Products whose pricing was recalculated, in id order.
    pub product_ids: Vec<Uuid>,
    /// Subset whose stored pricing actually changed.
    pub changed: usize,
    /// Products left untouched because margin and tax leave no positive divisor.
    pub skipped: Vec<Uuid>,
}

#[derive(Clone)]
pub struct PricingService {
    db_pool: Arc<DatabaseConnection>,
    config: PricingConfig,
    event_sender: EventSender,
}

impl PricingService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        config: PricingConfig,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db_pool,
            config,
            event_sender,
        }
    }

    /// Recomputes pricing for the store, or for the products that use `material_id`.
    #[instrument(skip(self))]
    pub async fn recalculate(
        &self,
        store_id: Uuid,
        material_id: Option<Uuid>,
    ) -> Result<Vec<Uuid>, ServiceError> {
        let scope = material_id.map_or(CascadeScope::Store, CascadeScope::Material);
        let this = self.clone();
        let outcome = with_transaction(&self.db_pool, move |txn| {
            Box::pin(async move { this.recalculate_in(txn, store_id, scope, None).await })
        })
        .await?;

        self.publish(store_id, material_id, &outcome).await;
        Ok(outcome.product_ids)
    }

    /// Runs the cascade inside the caller's transaction. Writes one notification
    /// when `cost_change` is given.
    #[instrument(skip(self, txn))]
    pub async fn recalculate_in(
        &self,
        txn: &DatabaseTransaction,
        store_id: Uuid,
        scope: CascadeScope,
        cost_change: Option<CostChange>,
    ) -> Result<RecalculationOutcome, ServiceError> {
        let store = store::Entity::find_by_id(store_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("store {} not found", store_id)))?;

        let graph = RecipeGraph::load(txn, store_id)
            .await
            .map_err(ServiceError::db_error)?;

        let product_ids = self.products_in_scope(txn, store_id, scope, &graph).await?;

        let existing: HashMap<Uuid, product_pricing::Model> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            product_pricing::Entity::find()
                .filter(product_pricing::Column::ProductId.is_in(product_ids.iter().copied()))
                .all(txn)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|row| (row.product_id, row))
                .collect()
        };

        let min_multiplier = store
            .min_price_multiplier
            .unwrap_or(self.config.min_price_multiplier);
        let max_multiplier = store
            .max_price_multiplier
            .unwrap_or(self.config.max_price_multiplier);

        let now = Utc::now();
        let mut outcome = RecalculationOutcome::default();
        for product_id in product_ids {
            let current = existing.get(&product_id);
            let margin = current
                .map(|row| row.desired_margin_percent)
                .unwrap_or(self.config.default_margin_percent);
            let quote = match graph.ingredient_cost(product_id).and_then(|cost| {
                compute_pricing(
                    cost,
                    margin,
                    store.tax_percent,
                    min_multiplier,
                    max_multiplier,
                )
            }) {
                Ok(quote) => quote,
                Err(e) => {
                    error!(%product_id, %store_id, error = %e, "Skipping product with unusable pricing configuration");
                    counter!("cafe_pricing.skipped", 1);
                    outcome.skipped.push(product_id);
                    continue;
                }
            };

            match current {
                Some(row) if quote.matches(row) => {}
                Some(row) => {
                    let mut active = row.clone().into_active_model();
                    active.ingredient_cost = Set(quote.ingredient_cost);
                    active.desired_margin_percent = Set(quote.desired_margin_percent);
                    active.suggested_price = Set(quote.suggested_price);
                    active.min_price = Set(quote.min_price);
                    active.max_price = Set(quote.max_price);
                    active.last_calculated_at = Set(now);
                    active.update(txn).await.map_err(ServiceError::db_error)?;
                    outcome.changed += 1;
                }
                None => {
                    product_pricing::ActiveModel {
                        product_id: Set(product_id),
                        ingredient_cost: Set(quote.ingredient_cost),
                        desired_margin_percent: Set(quote.desired_margin_percent),
                        suggested_price: Set(quote.suggested_price),
                        min_price: Set(quote.min_price),
                        max_price: Set(quote.max_price),
                        last_calculated_at: Set(now),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                    outcome.changed += 1;
                }
            }
            outcome.product_ids.push(product_id);
        }

        if let Some(change) = cost_change {
            let affected = outcome.product_ids.len();
            let notification = price_change_notification::ActiveModel {
                id: Set(Uuid::new_v4()),
                store_id: Set(store_id),
                material_id: Set(Some(change.material_id)),
                old_cost: Set(Some(change.old_cost)),
                new_cost: Set(Some(change.new_cost)),
                affected_products: Set(affected as i32),
                message: Set(format!(
                    "Material cost changed from {} to {}; {} product price(s) recalculated",
                    change.old_cost, change.new_cost, affected
                )),
                is_read: Set(false),
                created_at: Set(now),
            };
            best_effort(txn, "price_change_notification", move |sp| {
                Box::pin(async move { notification.insert(sp).await.map(|_| ()) })
            })
            .await;
        }

        counter!("cafe_pricing.recalculated", outcome.product_ids.len() as u64);
        info!(
            %store_id,
            scope = ?scope,
            recalculated = outcome.product_ids.len(),
            changed = outcome.changed,
            skipped = outcome.skipped.len(),
            "Pricing cascade finished"
        );
        Ok(outcome)
    }

    /// Publishes the outcome of a committed cascade.
    pub async fn publish(
        &self,
        store_id: Uuid,
        material_id: Option<Uuid>,
        outcome: &RecalculationOutcome,
    ) {
        if outcome.changed == 0 {
            return;
        }
        self.event_sender
            .send_or_log(Event::PricesRecalculated {
                store_id,
                material_id,
                product_ids: outcome.product_ids.clone(),
            })
            .await;
    }

    async fn products_in_scope(
        &self,
        txn: &DatabaseTransaction,
        store_id: Uuid,
        scope: CascadeScope,
        graph: &RecipeGraph,
    ) -> Result<Vec<Uuid>, ServiceError> {
        let store_products: Vec<Uuid> = product::Entity::find()
            .select_only()
            .column(product::Column::Id)
            .filter(product::Column::StoreId.eq(store_id))
            .order_by_asc(product::Column::Id)
            .into_tuple()
            .all(txn)
            .await
            .map_err(ServiceError::db_error)?;

        let ids = match scope {
            CascadeScope::Store => store_products,
            CascadeScope::Material(material_id) => {
                let referencing = graph.products_referencing(material_id);
                store_products
                    .into_iter()
                    .filter(|id| referencing.binary_search(id).is_ok())
                    .collect()
            }
            CascadeScope::Product(product_id) => {
                if !store_products.contains(&product_id) {
                    warn!(%product_id, %store_id, "Product not found in store");
                    return Err(ServiceError::NotFound(format!(
                        "product {} not found in store {}",
                        product_id, store_id
                    )));
                }
                vec![product_id]
            }
        };
        Ok(ids)
    }
}
