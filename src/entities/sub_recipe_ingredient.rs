use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sub_recipe_ingredients")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub sub_recipe_id: Uuid,
    pub material_id: Uuid,
    /// Quantity of material per one unit of the sub-recipe.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sub_recipe::Entity",
        from = "Column::SubRecipeId",
        to = "super::sub_recipe::Column::Id"
    )]
    SubRecipe,
    #[sea_orm(
        belongs_to = "super::raw_material::Entity",
        from = "Column::MaterialId",
        to = "super::raw_material::Column::Id"
    )]
    RawMaterial,
}

impl Related<super::sub_recipe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubRecipe.def()
    }
}

impl Related<super::raw_material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RawMaterial.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
