use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store-scoped ingredient. On-hand quantity is not stored here: the unused
/// batches of the material are the stock ledger.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "raw_materials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub unit: String,
    /// Cost per unit used for recipe costing.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub current_cost: Decimal,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id"
    )]
    Store,
    #[sea_orm(has_many = "super::material_batch::Entity")]
    Batches,
    #[sea_orm(has_many = "super::material_cost_history::Entity")]
    CostHistory,
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl Related<super::material_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batches.def()
    }
}

impl Related<super::material_cost_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CostHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
