use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    TakeAway,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::DineIn => "dine_in",
            OrderType::TakeAway => "take_away",
        }
    }

    /// Accepts the spellings cart clients send (`dine-in`, `Dine In`, `take_away`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        match normalized.as_str() {
            "dine_in" | "dinein" => Some(OrderType::DineIn),
            "take_away" | "takeaway" => Some(OrderType::TakeAway),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }

    /// Cash is settled at the counter, so a cash order starts unpaid. Every other
    /// method is considered settled when the order is placed.
    pub fn for_method(payment_method: &str) -> Self {
        if payment_method.to_lowercase().contains("cash") {
            PaymentStatus::Unpaid
        } else {
            PaymentStatus::Paid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "ready" => Some(OrderStatus::Ready),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_number: String,
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub order_type: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub tax: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total: Decimal,
    pub payment_method: String,
    pub payment_status: String,
    pub status: String,
    pub customer_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id"
    )]
    Store,
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cash_is_unpaid_regardless_of_case() {
        assert_eq!(PaymentStatus::for_method("cash"), PaymentStatus::Unpaid);
        assert_eq!(PaymentStatus::for_method("CASH"), PaymentStatus::Unpaid);
        assert_eq!(
            PaymentStatus::for_method("Cash on pickup"),
            PaymentStatus::Unpaid
        );
    }

    #[test]
    fn non_cash_methods_are_paid() {
        assert_eq!(PaymentStatus::for_method("qris"), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::for_method("card"), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::for_method(""), PaymentStatus::Paid);
    }

    #[test]
    fn order_type_accepts_client_spellings() {
        assert_eq!(OrderType::parse("dine-in"), Some(OrderType::DineIn));
        assert_eq!(OrderType::parse("Dine In"), Some(OrderType::DineIn));
        assert_eq!(OrderType::parse("take_away"), Some(OrderType::TakeAway));
        assert_eq!(OrderType::parse("takeaway"), Some(OrderType::TakeAway));
        assert_eq!(OrderType::parse("delivery"), None);
    }
}
