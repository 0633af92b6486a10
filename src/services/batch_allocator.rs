//! First-Expired-First-Out batch allocation.
//!
//! Planning is pure; fetching candidates is the only database access. Nothing
//! here writes, so a plan can back a dry run as well as a committing deduction.

use std::cmp::Ordering;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::entities::material_batch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCandidate {
    pub batch_id: Uuid,
    pub quantity: Decimal,
    pub cost_per_unit: Decimal,
    pub received_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub is_used: bool,
}

impl From<&material_batch::Model> for BatchCandidate {
    fn from(batch: &material_batch::Model) -> Self {
        Self {
            batch_id: batch.id,
            quantity: batch.quantity,
            cost_per_unit: batch.cost_per_unit,
            received_date: batch.received_date,
            expiration_date: batch.expiration_date,
            is_used: batch.is_used,
        }
    }
}

impl BatchCandidate {
    fn is_allocatable(&self, today: NaiveDate) -> bool {
        !self.is_used
            && self.quantity > Decimal::ZERO
            && self.expiration_date.map_or(true, |expires| expires >= today)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub batch_id: Uuid,
    pub quantity: Decimal,
    pub cost_per_unit: Decimal,
    /// The allocation takes everything the batch holds.
    pub exhausts_batch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationPlan {
    pub material_id: Uuid,
    pub requested: Decimal,
    pub allocations: Vec<Allocation>,
    /// Quantity that no batch could cover. Zero when the plan is satisfiable.
    pub shortage: Decimal,
}

impl AllocationPlan {
    pub fn is_satisfied(&self) -> bool {
        self.shortage.is_zero()
    }

    pub fn allocated(&self) -> Decimal {
        self.allocations.iter().map(|a| a.quantity).sum()
    }

    /// Cost of the allocated quantity at each batch's frozen receipt cost.
    pub fn total_cost(&self) -> Decimal {
        self.allocations
            .iter()
            .map(|a| a.quantity * a.cost_per_unit)
            .sum()
    }
}

/// Batches with an expiration date come first, soonest first; then oldest receipt.
pub fn fefo_order(a: &BatchCandidate, b: &BatchCandidate) -> Ordering {
    match (a.expiration_date, b.expiration_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then(a.received_date.cmp(&b.received_date))
    .then(a.batch_id.cmp(&b.batch_id))
}

/// Greedy FEFO walk over the allocatable batches.
pub fn plan_fefo(
    material_id: Uuid,
    batches: &[BatchCandidate],
    needed: Decimal,
    today: NaiveDate,
) -> AllocationPlan {
    let mut candidates: Vec<&BatchCandidate> =
        batches.iter().filter(|b| b.is_allocatable(today)).collect();
    candidates.sort_by(|a, b| fefo_order(a, b));

    let mut remaining = needed.max(Decimal::ZERO);
    let mut allocations = Vec::new();
    for batch in candidates {
        if remaining.is_zero() {
            break;
        }
        let take = remaining.min(batch.quantity);
        allocations.push(Allocation {
            batch_id: batch.batch_id,
            quantity: take,
            cost_per_unit: batch.cost_per_unit,
            exhausts_batch: take == batch.quantity,
        });
        remaining -= take;
    }

    AllocationPlan {
        material_id,
        requested: needed,
        allocations,
        shortage: remaining,
    }
}

/// Reads batch candidates and plans against them.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchAllocator;

impl BatchAllocator {
    /// Plans without locking. Safe for availability checks outside a transaction.
    #[instrument(skip(self, conn))]
    pub async fn allocate<C: ConnectionTrait>(
        &self,
        conn: &C,
        material_id: Uuid,
        needed: Decimal,
    ) -> Result<AllocationPlan, DbErr> {
        let today = Utc::now().date_naive();
        let batches = fetch_candidates(conn, material_id, today, false).await?;
        Ok(plan_fefo(material_id, &batches, needed, today))
    }

    /// Plans with the candidate rows locked for update. Call inside a transaction.
    #[instrument(skip(self, conn))]
    pub async fn allocate_for_update<C: ConnectionTrait>(
        &self,
        conn: &C,
        material_id: Uuid,
        needed: Decimal,
        today: NaiveDate,
    ) -> Result<AllocationPlan, DbErr> {
        let batches = fetch_candidates(conn, material_id, today, true).await?;
        let plan = plan_fefo(material_id, &batches, needed, today);
        debug!(
            batches = plan.allocations.len(),
            shortage = %plan.shortage,
            "Planned FEFO allocation"
        );
        Ok(plan)
    }
}

async fn fetch_candidates<C: ConnectionTrait>(
    conn: &C,
    material_id: Uuid,
    today: NaiveDate,
    lock: bool,
) -> Result<Vec<BatchCandidate>, DbErr> {
    let mut query = material_batch::Entity::find()
        .filter(material_batch::Column::MaterialId.eq(material_id))
        .filter(material_batch::Column::IsUsed.eq(false))
        .filter(material_batch::Column::Quantity.gt(Decimal::ZERO))
        .filter(
            Condition::any()
                .add(material_batch::Column::ExpirationDate.is_null())
                .add(material_batch::Column::ExpirationDate.gte(today)),
        )
        // Stable row order keeps lock acquisition consistent across transactions
        .order_by_asc(material_batch::Column::Id);
    if lock {
        query = query.lock_exclusive();
    }

    let rows = query.all(conn).await?;
    Ok(rows.iter().map(BatchCandidate::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn batch(quantity: Decimal, expires: Option<NaiveDate>, received: NaiveDate) -> BatchCandidate {
        BatchCandidate {
            batch_id: Uuid::new_v4(),
            quantity,
            cost_per_unit: dec!(10),
            received_date: received,
            expiration_date: expires,
            is_used: false,
        }
    }

    #[test]
    fn draws_soonest_expiring_batches_first() {
        let today = date(2023, 12, 1);
        let jan = batch(dec!(5), Some(date(2024, 1, 1)), date(2023, 11, 1));
        let mar = batch(dec!(5), Some(date(2024, 3, 1)), date(2023, 10, 1));
        let never = batch(dec!(5), None, date(2023, 9, 1));
        let material = Uuid::new_v4();

        let plan = plan_fefo(
            material,
            &[never.clone(), mar.clone(), jan.clone()],
            dec!(7),
            today,
        );

        assert!(plan.is_satisfied());
        assert_eq!(plan.allocations.len(), 2);
        assert_eq!(plan.allocations[0].batch_id, jan.batch_id);
        assert_eq!(plan.allocations[0].quantity, dec!(5));
        assert!(plan.allocations[0].exhausts_batch);
        assert_eq!(plan.allocations[1].batch_id, mar.batch_id);
        assert_eq!(plan.allocations[1].quantity, dec!(2));
        assert!(!plan.allocations[1].exhausts_batch);
        assert!(plan.allocations.iter().all(|a| a.batch_id != never.batch_id));
    }

    #[test]
    fn received_date_breaks_expiration_ties() {
        let today = date(2024, 1, 1);
        let newer = batch(dec!(3), Some(date(2024, 2, 1)), date(2023, 12, 20));
        let older = batch(dec!(3), Some(date(2024, 2, 1)), date(2023, 12, 1));

        let plan = plan_fefo(Uuid::new_v4(), &[newer, older.clone()], dec!(2), today);
        assert_eq!(plan.allocations[0].batch_id, older.batch_id);
    }

    #[test]
    fn reports_shortage_when_batches_run_out() {
        let today = date(2024, 1, 1);
        let batches = vec![
            batch(dec!(4), None, date(2023, 12, 1)),
            batch(dec!(6), Some(date(2024, 6, 1)), date(2023, 12, 1)),
        ];

        let plan = plan_fefo(Uuid::new_v4(), &batches, dec!(20), today);
        assert!(!plan.is_satisfied());
        assert_eq!(plan.shortage, dec!(10));
        assert_eq!(plan.allocated(), dec!(10));
    }

    #[test]
    fn skips_expired_used_and_empty_batches() {
        let today = date(2024, 5, 1);
        let expired = batch(dec!(10), Some(date(2024, 4, 30)), date(2024, 1, 1));
        let mut used = batch(dec!(10), None, date(2024, 1, 1));
        used.is_used = true;
        let empty = batch(dec!(0), None, date(2024, 1, 1));
        let expires_today = batch(dec!(1), Some(today), date(2024, 1, 1));

        let plan = plan_fefo(
            Uuid::new_v4(),
            &[expired, used, empty, expires_today.clone()],
            dec!(3),
            today,
        );
        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].batch_id, expires_today.batch_id);
        assert_eq!(plan.shortage, dec!(2));
    }

    #[test]
    fn total_cost_uses_each_batch_receipt_cost() {
        let today = date(2024, 1, 1);
        let mut cheap = batch(dec!(2), Some(date(2024, 1, 10)), date(2023, 12, 1));
        cheap.cost_per_unit = dec!(900);
        let mut dear = batch(dec!(5), Some(date(2024, 2, 10)), date(2023, 12, 1));
        dear.cost_per_unit = dec!(1100);

        let plan = plan_fefo(Uuid::new_v4(), &[dear, cheap], dec!(3), today);
        assert_eq!(plan.total_cost(), dec!(2900));
    }

    #[test]
    fn zero_need_allocates_nothing() {
        let plan = plan_fefo(
            Uuid::new_v4(),
            &[batch(dec!(5), None, date(2024, 1, 1))],
            Decimal::ZERO,
            date(2024, 1, 1),
        );
        assert!(plan.allocations.is_empty());
        assert!(plan.is_satisfied());
    }

    fn arb_batch() -> impl Strategy<Value = BatchCandidate> {
        (0u32..50, proptest::option::of(0i64..60), 0i64..60, any::<bool>()).prop_map(
            |(qty, exp_offset, recv_offset, used)| {
                let base = date(2024, 1, 1);
                BatchCandidate {
                    batch_id: Uuid::new_v4(),
                    quantity: Decimal::from(qty),
                    cost_per_unit: dec!(1),
                    received_date: base - chrono::Duration::days(recv_offset),
                    expiration_date: exp_offset.map(|d| base + chrono::Duration::days(d - 10)),
                    is_used: used,
                }
            },
        )
    }

    proptest! {
        #[test]
        fn allocation_conserves_quantity(
            batches in proptest::collection::vec(arb_batch(), 0..12),
            need in 0u32..200,
        ) {
            let today = date(2024, 1, 1);
            let need = Decimal::from(need);
            let plan = plan_fefo(Uuid::new_v4(), &batches, need, today);

            prop_assert_eq!(plan.allocated() + plan.shortage, need);

            let available: Decimal = batches
                .iter()
                .filter(|b| b.is_allocatable(today))
                .map(|b| b.quantity)
                .sum();
            prop_assert_eq!(plan.allocated(), need.min(available));

            for allocation in &plan.allocations {
                let source = batches.iter().find(|b| b.batch_id == allocation.batch_id).unwrap();
                prop_assert!(allocation.quantity > Decimal::ZERO);
                prop_assert!(allocation.quantity <= source.quantity);
                prop_assert!(source.is_allocatable(today));
            }
        }

        #[test]
        fn only_the_last_allocation_is_partial(
            batches in proptest::collection::vec(arb_batch(), 1..12),
            need in 1u32..200,
        ) {
            let today = date(2024, 1, 1);
            let plan = plan_fefo(Uuid::new_v4(), &batches, Decimal::from(need), today);
            let last = plan.allocations.len().saturating_sub(1);
            for (i, allocation) in plan.allocations.iter().enumerate() {
                if i < last {
                    prop_assert!(allocation.exhausts_batch);
                }
            }
            for pair in plan.allocations.windows(2) {
                let a = batches.iter().find(|b| b.batch_id == pair[0].batch_id).unwrap();
                let b = batches.iter().find(|b| b.batch_id == pair[1].batch_id).unwrap();
                prop_assert_ne!(fefo_order(a, b), Ordering::Greater);
            }
        }
    }
}
