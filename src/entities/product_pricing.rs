use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cached pricing of a product, derived from its recipe cost. Always rewritten as a
/// whole row.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_pricing")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub ingredient_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((9, 4)))")]
    pub desired_margin_percent: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub suggested_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub min_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub max_price: Decimal,
    pub last_calculated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
