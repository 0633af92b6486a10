use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Available,
    Unavailable,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Available => "available",
            ProductStatus::Unavailable => "unavailable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(ProductStatus::Available),
            "unavailable" => Some(ProductStatus::Unavailable),
            _ => None,
        }
    }

    /// The status a product must carry for a given finished-goods stock level.
    pub fn for_stock(stock: i32) -> Self {
        if stock > 0 {
            ProductStatus::Available
        } else {
            ProductStatus::Unavailable
        }
    }
}

/// A sellable menu item. `status` is a cached flag kept consistent with `stock > 0`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub price: Decimal,
    pub stock: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn is_available(&self) -> bool {
        ProductStatus::from_str(&self.status) == Some(ProductStatus::Available)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id"
    )]
    Store,
    #[sea_orm(has_many = "super::product_recipe::Entity")]
    Recipes,
    #[sea_orm(has_one = "super::product_pricing::Entity")]
    Pricing,
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl Related<super::product_recipe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipes.def()
    }
}

impl Related<super::product_pricing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pricing.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_stock() {
        assert_eq!(ProductStatus::for_stock(3), ProductStatus::Available);
        assert_eq!(ProductStatus::for_stock(0), ProductStatus::Unavailable);
        assert_eq!(ProductStatus::for_stock(-1), ProductStatus::Unavailable);
    }

    #[test]
    fn status_round_trips_through_column_text() {
        for status in [ProductStatus::Available, ProductStatus::Unavailable] {
            assert_eq!(ProductStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ProductStatus::from_str("sold_out"), None);
    }
}
