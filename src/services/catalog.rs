use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::with_transaction;
use crate::entities::{material_cost_history, product, product_recipe, raw_material, sub_recipe};
use crate::errors::ServiceError;
use crate::services::pricing::{CascadeScope, CostChange, PricingService, RecalculationOutcome};

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct MaterialCostUpdate {
    pub new_cost: Decimal,
    #[validate(length(max = 255))]
    pub changed_by: Option<String>,
}

/// One ingredient line of a replacement recipe.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecipeLineInput {
    pub material_id: Option<Uuid>,
    pub sub_recipe_id: Option<Uuid>,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogChange {
    pub affected_product_ids: Vec<Uuid>,
    pub changed: usize,
}

impl From<RecalculationOutcome> for CatalogChange {
    fn from(outcome: RecalculationOutcome) -> Self {
        Self {
            affected_product_ids: outcome.product_ids,
            changed: outcome.changed,
        }
    }
}

/// Catalog edits that feed the pricing cascade.
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DatabaseConnection>,
    pricing: PricingService,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DatabaseConnection>, pricing: PricingService) -> Self {
        Self { db_pool, pricing }
    }

    /// Sets a material's cost, records the edit and reprices every product using it.
    #[instrument(skip(self, update), fields(new_cost = %update.new_cost))]
    pub async fn update_material_cost(
        &self,
        store_id: Uuid,
        material_id: Uuid,
        update: MaterialCostUpdate,
    ) -> Result<CatalogChange, ServiceError> {
        update.validate()?;
        if update.new_cost < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "material cost cannot be negative".to_string(),
            ));
        }

        let pricing = self.pricing.clone();
        let outcome = with_transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let material = raw_material::Entity::find_by_id(material_id)
                    .filter(raw_material::Column::StoreId.eq(store_id))
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "material {} not found in store {}",
                            material_id, store_id
                        ))
                    })?;

                let old_cost = material.current_cost;
                if old_cost == update.new_cost {
                    return Ok(RecalculationOutcome::default());
                }

                let now = Utc::now();
                let mut active = material.into_active_model();
                active.current_cost = Set(update.new_cost);
                active.updated_at = Set(now);
                active.update(txn).await.map_err(ServiceError::db_error)?;

                material_cost_history::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    material_id: Set(material_id),
                    old_cost: Set(old_cost),
                    new_cost: Set(update.new_cost),
                    changed_by: Set(update.changed_by),
                    changed_at: Set(now),
                }
                .insert(txn)
                .await
                .map_err(ServiceError::db_error)?;

                pricing
                    .recalculate_in(
                        txn,
                        store_id,
                        CascadeScope::Material(material_id),
                        Some(CostChange {
                            material_id,
                            old_cost,
                            new_cost: update.new_cost,
                        }),
                    )
                    .await
            })
        })
        .await?;

        self.pricing
            .publish(store_id, Some(material_id), &outcome)
            .await;
        info!(
            %material_id,
            affected = outcome.product_ids.len(),
            "Material cost updated"
        );
        Ok(outcome.into())
    }

    /// Replaces a product's recipe rows and reprices that product.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn replace_recipe(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        lines: Vec<RecipeLineInput>,
    ) -> Result<CatalogChange, ServiceError> {
        for (index, line) in lines.iter().enumerate() {
            if line.material_id.is_some() == line.sub_recipe_id.is_some() {
                return Err(ServiceError::ValidationError(format!(
                    "recipe line {} must reference exactly one of material_id or sub_recipe_id",
                    index
                )));
            }
            if line.quantity <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "recipe line {} must have a positive quantity",
                    index
                )));
            }
        }

        let pricing = self.pricing.clone();
        let outcome = with_transaction(&self.db_pool, move |txn| {
            Box::pin(async move {
                let exists = product::Entity::find_by_id(product_id)
                    .filter(product::Column::StoreId.eq(store_id))
                    .count(txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                if exists == 0 {
                    return Err(ServiceError::NotFound(format!(
                        "product {} not found in store {}",
                        product_id, store_id
                    )));
                }

                for line in &lines {
                    if let Some(material_id) = line.material_id {
                        let found = raw_material::Entity::find_by_id(material_id)
                            .filter(raw_material::Column::StoreId.eq(store_id))
                            .count(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        if found == 0 {
                            return Err(ServiceError::NotFound(format!(
                                "material {} not found in store {}",
                                material_id, store_id
                            )));
                        }
                    }
                    if let Some(sub_recipe_id) = line.sub_recipe_id {
                        let found = sub_recipe::Entity::find_by_id(sub_recipe_id)
                            .filter(sub_recipe::Column::StoreId.eq(store_id))
                            .count(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        if found == 0 {
                            return Err(ServiceError::NotFound(format!(
                                "sub-recipe {} not found in store {}",
                                sub_recipe_id, store_id
                            )));
                        }
                    }
                }

                product_recipe::Entity::delete_many()
                    .filter(product_recipe::Column::ProductId.eq(product_id))
                    .exec(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                for line in lines {
                    product_recipe::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        product_id: Set(product_id),
                        material_id: Set(line.material_id),
                        sub_recipe_id: Set(line.sub_recipe_id),
                        quantity: Set(line.quantity),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                }

                pricing
                    .recalculate_in(txn, store_id, CascadeScope::Product(product_id), None)
                    .await
            })
        })
        .await?;

        self.pricing.publish(store_id, None, &outcome).await;
        Ok(outcome.into())
    }
}
