use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A café. Every catalog row and every order is scoped to exactly one store.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    /// Sales tax folded into suggested prices, in percent.
    #[sea_orm(column_type = "Decimal(Some((9, 4)))")]
    pub tax_percent: Decimal,
    /// Overrides the configured min-price multiplier when set.
    #[sea_orm(column_type = "Decimal(Some((9, 4)))", nullable)]
    pub min_price_multiplier: Option<Decimal>,
    /// Overrides the configured max-price multiplier when set.
    #[sea_orm(column_type = "Decimal(Some((9, 4)))", nullable)]
    pub max_price_multiplier: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
    #[sea_orm(has_many = "super::raw_material::Entity")]
    RawMaterials,
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::raw_material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RawMaterials.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
