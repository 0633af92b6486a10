//! Applies FEFO allocation plans to batch rows.
//!
//! [`deduct`] takes a [`UnitOfWork`]: a joined unit runs inside the caller's
//! transaction, an owned one is committed or rolled back here.

use chrono::Utc;
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, Set,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::{best_effort, UnitOfWork};
use crate::entities::{material_batch, material_usage_log};
use crate::errors::{ServiceError, StockShortfall};
use crate::services::batch_allocator::{AllocationPlan, BatchAllocator};

/// Consumes `quantity` of a material from its batches in FEFO order.
///
/// A shortage fails with [`ServiceError::InsufficientStock`] before any write.
/// A batch that changed under us fails with [`ServiceError::ConcurrencyConflict`];
/// with an owned unit everything is rolled back, with a joined unit the caller's
/// transaction is expected to abort.
#[instrument(skip(uow), fields(owned = uow.owns_transaction()))]
pub async fn deduct(
    uow: UnitOfWork<'_>,
    order_item_id: Option<Uuid>,
    material_id: Uuid,
    quantity: Decimal,
) -> Result<AllocationPlan, ServiceError> {
    let started = std::time::Instant::now();
    let result = apply(uow.txn(), order_item_id, material_id, quantity).await;

    match result {
        Ok(plan) => {
            uow.commit().await.map_err(ServiceError::db_error)?;
            histogram!(
                "cafe_materials.deduction_duration_seconds",
                started.elapsed().as_secs_f64()
            );
            Ok(plan)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(error = %rollback_err, "Rollback after failed deduction also failed");
            }
            Err(err)
        }
    }
}

/// Deducts in a transaction of its own.
pub async fn deduct_standalone(
    db: &DatabaseConnection,
    order_item_id: Option<Uuid>,
    material_id: Uuid,
    quantity: Decimal,
) -> Result<AllocationPlan, ServiceError> {
    let uow = UnitOfWork::begin(db).await.map_err(ServiceError::db_error)?;
    deduct(uow, order_item_id, material_id, quantity).await
}

async fn apply(
    txn: &DatabaseTransaction,
    order_item_id: Option<Uuid>,
    material_id: Uuid,
    quantity: Decimal,
) -> Result<AllocationPlan, ServiceError> {
    if quantity < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "cannot deduct a negative quantity ({}) of material {}",
            quantity, material_id
        )));
    }

    let now = Utc::now();
    let plan = BatchAllocator
        .allocate_for_update(txn, material_id, quantity, now.date_naive())
        .await
        .map_err(ServiceError::db_error)?;

    if !plan.is_satisfied() {
        counter!("cafe_materials.shortages", 1);
        info!(
            %material_id,
            required = %quantity,
            shortage = %plan.shortage,
            "Material batches cannot cover requirement"
        );
        return Err(ServiceError::InsufficientStock(StockShortfall::Material {
            material_id,
            required: quantity,
            shortage: plan.shortage,
        }));
    }

    for allocation in &plan.allocations {
        let updated = material_batch::Entity::update_many()
            .col_expr(
                material_batch::Column::Quantity,
                Expr::col(material_batch::Column::Quantity).sub(allocation.quantity),
            )
            .col_expr(material_batch::Column::UpdatedAt, Expr::value(now))
            .filter(material_batch::Column::Id.eq(allocation.batch_id))
            .filter(material_batch::Column::IsUsed.eq(false))
            .filter(material_batch::Column::Quantity.gte(allocation.quantity))
            .exec(txn)
            .await
            .map_err(ServiceError::db_error)?;

        if updated.rows_affected == 0 {
            counter!("cafe_materials.batch_conflicts", 1);
            warn!(
                batch_id = %allocation.batch_id,
                %material_id,
                quantity = %allocation.quantity,
                "Batch changed between allocation and decrement"
            );
            return Err(ServiceError::ConcurrencyConflict(format!(
                "batch {} of material {} no longer holds {}",
                allocation.batch_id, material_id, allocation.quantity
            )));
        }

        if allocation.exhausts_batch {
            material_batch::Entity::update_many()
                .col_expr(material_batch::Column::IsUsed, Expr::value(true))
                .filter(material_batch::Column::Id.eq(allocation.batch_id))
                .filter(material_batch::Column::Quantity.lte(Decimal::ZERO))
                .exec(txn)
                .await
                .map_err(ServiceError::db_error)?;
        }

        let entry = material_usage_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_item_id: Set(order_item_id),
            material_id: Set(material_id),
            batch_id: Set(allocation.batch_id),
            quantity_used: Set(allocation.quantity),
            cost_per_unit: Set(allocation.cost_per_unit),
            used_at: Set(now),
        };
        best_effort(txn, "material_usage_log", move |sp| {
            Box::pin(async move { entry.insert(sp).await.map(|_| ()) })
        })
        .await;
    }

    counter!("cafe_materials.deductions", 1);
    info!(
        %material_id,
        quantity = %quantity,
        batches = plan.allocations.len(),
        cost = %plan.total_cost(),
        "Material deducted"
    );
    Ok(plan)
}
