use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ingredient line of a product. Exactly one of `material_id` and
/// `sub_recipe_id` is set.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_recipes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub material_id: Option<Uuid>,
    pub sub_recipe_id: Option<Uuid>,
    /// Quantity consumed per unit sold.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::raw_material::Entity",
        from = "Column::MaterialId",
        to = "super::raw_material::Column::Id"
    )]
    RawMaterial,
    #[sea_orm(
        belongs_to = "super::sub_recipe::Entity",
        from = "Column::SubRecipeId",
        to = "super::sub_recipe::Column::Id"
    )]
    SubRecipe,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::sub_recipe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubRecipe.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
