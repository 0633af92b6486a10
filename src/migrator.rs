use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_stores_and_customers::Migration),
            Box::new(m20240301_000002_create_catalog_tables::Migration),
            Box::new(m20240301_000003_create_ledger_tables::Migration),
            Box::new(m20240301_000004_create_order_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_stores_and_customers {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_stores_and_customers"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Stores::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Stores::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Stores::Name).string().not_null())
                        .col(
                            ColumnDef::new(Stores::TaxPercent)
                                .decimal_len(9, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Stores::MinPriceMultiplier).decimal_len(9, 4).null())
                        .col(ColumnDef::new(Stores::MaxPriceMultiplier).decimal_len(9, 4).null())
                        .col(
                            ColumnDef::new(Stores::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Customers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Customers::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Customers::DisplayName).string().not_null())
                        .col(ColumnDef::new(Customers::UserId).uuid().null())
                        .col(
                            ColumnDef::new(Customers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_customers_store_id")
                                .from(Customers::Table, Customers::StoreId)
                                .to(Stores::Table, Stores::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Checkout relies on this key to resolve concurrent upserts of one buyer
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("ux_customers_store_display_name")
                        .table(Customers::Table)
                        .col(Customers::StoreId)
                        .col(Customers::DisplayName)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Stores::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum Stores {
        Table,
        Id,
        Name,
        TaxPercent,
        MinPriceMultiplier,
        MaxPriceMultiplier,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(crate) enum Customers {
        Table,
        Id,
        StoreId,
        DisplayName,
        UserId,
        CreatedAt,
    }
}

mod m20240301_000002_create_catalog_tables {

    use super::m20240301_000001_create_stores_and_customers::Stores;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Price).decimal_len(16, 4).not_null())
                        .col(
                            ColumnDef::new(Products::Stock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::Status).string().not_null())
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_store_id")
                                .from(Products::Table, Products::StoreId)
                                .to(Stores::Table, Stores::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RawMaterials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RawMaterials::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RawMaterials::StoreId).uuid().not_null())
                        .col(ColumnDef::new(RawMaterials::Name).string().not_null())
                        .col(ColumnDef::new(RawMaterials::Unit).string().not_null())
                        .col(
                            ColumnDef::new(RawMaterials::CurrentCost)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RawMaterials::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(RawMaterials::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_raw_materials_store_id")
                                .from(RawMaterials::Table, RawMaterials::StoreId)
                                .to(Stores::Table, Stores::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MaterialBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MaterialBatches::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MaterialBatches::MaterialId).uuid().not_null())
                        .col(
                            ColumnDef::new(MaterialBatches::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialBatches::CostPerUnit)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(MaterialBatches::ReceivedDate).date().not_null())
                        .col(ColumnDef::new(MaterialBatches::ExpirationDate).date().null())
                        .col(
                            ColumnDef::new(MaterialBatches::IsUsed)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(MaterialBatches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialBatches::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_material_batches_material_id")
                                .from(MaterialBatches::Table, MaterialBatches::MaterialId)
                                .to(RawMaterials::Table, RawMaterials::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Serves the FEFO candidate scan
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_material_batches_fefo")
                        .table(MaterialBatches::Table)
                        .col(MaterialBatches::MaterialId)
                        .col(MaterialBatches::IsUsed)
                        .col(MaterialBatches::ExpirationDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MaterialCostHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MaterialCostHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MaterialCostHistory::MaterialId).uuid().not_null())
                        .col(
                            ColumnDef::new(MaterialCostHistory::OldCost)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialCostHistory::NewCost)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(MaterialCostHistory::ChangedBy).string().null())
                        .col(
                            ColumnDef::new(MaterialCostHistory::ChangedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_material_cost_history_material_id")
                                .from(MaterialCostHistory::Table, MaterialCostHistory::MaterialId)
                                .to(RawMaterials::Table, RawMaterials::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SubRecipes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SubRecipes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(SubRecipes::StoreId).uuid().not_null())
                        .col(ColumnDef::new(SubRecipes::Name).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SubRecipeIngredients::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SubRecipeIngredients::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SubRecipeIngredients::SubRecipeId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SubRecipeIngredients::MaterialId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SubRecipeIngredients::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sub_recipe_ingredients_sub_recipe_id")
                                .from(
                                    SubRecipeIngredients::Table,
                                    SubRecipeIngredients::SubRecipeId,
                                )
                                .to(SubRecipes::Table, SubRecipes::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Ingredient references are unconstrained; a dangling one costs zero
            manager
                .create_table(
                    Table::create()
                        .table(ProductRecipes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductRecipes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductRecipes::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductRecipes::MaterialId).uuid().null())
                        .col(ColumnDef::new(ProductRecipes::SubRecipeId).uuid().null())
                        .col(
                            ColumnDef::new(ProductRecipes::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_recipes_product_id")
                                .from(ProductRecipes::Table, ProductRecipes::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_recipes_product_id")
                        .table(ProductRecipes::Table)
                        .col(ProductRecipes::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductPricing::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductPricing::ProductId)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductPricing::IngredientCost)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductPricing::DesiredMarginPercent)
                                .decimal_len(9, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductPricing::SuggestedPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductPricing::MinPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductPricing::MaxPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductPricing::LastCalculatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_pricing_product_id")
                                .from(ProductPricing::Table, ProductPricing::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductPricing::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductRecipes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SubRecipeIngredients::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SubRecipes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(MaterialCostHistory::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(MaterialBatches::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RawMaterials::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum Products {
        Table,
        Id,
        StoreId,
        Name,
        Price,
        Stock,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(crate) enum RawMaterials {
        Table,
        Id,
        StoreId,
        Name,
        Unit,
        CurrentCost,
        IsActive,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum MaterialBatches {
        Table,
        Id,
        MaterialId,
        Quantity,
        CostPerUnit,
        ReceivedDate,
        ExpirationDate,
        IsUsed,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum MaterialCostHistory {
        Table,
        Id,
        MaterialId,
        OldCost,
        NewCost,
        ChangedBy,
        ChangedAt,
    }

    #[derive(DeriveIden)]
    enum SubRecipes {
        Table,
        Id,
        StoreId,
        Name,
    }

    #[derive(DeriveIden)]
    enum SubRecipeIngredients {
        Table,
        Id,
        SubRecipeId,
        MaterialId,
        Quantity,
    }

    #[derive(DeriveIden)]
    enum ProductRecipes {
        Table,
        Id,
        ProductId,
        MaterialId,
        SubRecipeId,
        Quantity,
    }

    #[derive(DeriveIden)]
    enum ProductPricing {
        Table,
        ProductId,
        IngredientCost,
        DesiredMarginPercent,
        SuggestedPrice,
        MinPrice,
        MaxPrice,
        LastCalculatedAt,
    }
}

mod m20240301_000003_create_ledger_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_ledger_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Audit rows, no foreign keys
            manager
                .create_table(
                    Table::create()
                        .table(MaterialUsageLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MaterialUsageLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MaterialUsageLogs::OrderItemId).uuid().null())
                        .col(ColumnDef::new(MaterialUsageLogs::MaterialId).uuid().not_null())
                        .col(ColumnDef::new(MaterialUsageLogs::BatchId).uuid().not_null())
                        .col(
                            ColumnDef::new(MaterialUsageLogs::QuantityUsed)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialUsageLogs::CostPerUnit)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialUsageLogs::UsedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_material_usage_logs_order_item_id")
                        .table(MaterialUsageLogs::Table)
                        .col(MaterialUsageLogs::OrderItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PriceChangeNotifications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PriceChangeNotifications::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PriceChangeNotifications::StoreId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PriceChangeNotifications::MaterialId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PriceChangeNotifications::OldCost)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PriceChangeNotifications::NewCost)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PriceChangeNotifications::AffectedProducts)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PriceChangeNotifications::Message)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PriceChangeNotifications::IsRead)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(PriceChangeNotifications::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(PriceChangeNotifications::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(MaterialUsageLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum MaterialUsageLogs {
        Table,
        Id,
        OrderItemId,
        MaterialId,
        BatchId,
        QuantityUsed,
        CostPerUnit,
        UsedAt,
    }

    #[derive(DeriveIden)]
    enum PriceChangeNotifications {
        Table,
        Id,
        StoreId,
        MaterialId,
        OldCost,
        NewCost,
        AffectedProducts,
        Message,
        IsRead,
        CreatedAt,
    }
}

mod m20240301_000004_create_order_tables {

    use super::m20240301_000001_create_stores_and_customers::{Customers, Stores};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::OrderType).string().not_null())
                        .col(ColumnDef::new(Orders::Subtotal).decimal_len(16, 4).not_null())
                        .col(
                            ColumnDef::new(Orders::Discount)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::Tax)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Total).decimal_len(16, 4).not_null())
                        .col(ColumnDef::new(Orders::PaymentMethod).string().not_null())
                        .col(ColumnDef::new(Orders::PaymentStatus).string().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerNotes).text().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_store_id")
                                .from(Orders::Table, Orders::StoreId)
                                .to(Stores::Table, Stores::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_customer_id")
                                .from(Orders::Table, Orders::CustomerId)
                                .to(Customers::Table, Customers::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("ux_orders_order_number")
                        .table(Orders::Table)
                        .col(Orders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductName).string().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::Subtotal)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItemOptions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItemOptions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItemOptions::OrderItemId).uuid().not_null())
                        .col(ColumnDef::new(OrderItemOptions::Kind).string().not_null())
                        .col(ColumnDef::new(OrderItemOptions::Name).string().not_null())
                        .col(
                            ColumnDef::new(OrderItemOptions::Price)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_item_options_order_item_id")
                                .from(OrderItemOptions::Table, OrderItemOptions::OrderItemId)
                                .to(OrderItems::Table, OrderItems::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Payments::Amount).decimal_len(16, 4).not_null())
                        .col(ColumnDef::new(Payments::Method).string().not_null())
                        .col(ColumnDef::new(Payments::Status).string().not_null())
                        .col(
                            ColumnDef::new(Payments::PaidAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payments_order_id")
                                .from(Payments::Table, Payments::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderItemOptions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        StoreId,
        CustomerId,
        OrderType,
        Subtotal,
        Discount,
        Tax,
        Total,
        PaymentMethod,
        PaymentStatus,
        Status,
        CustomerNotes,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        ProductName,
        Quantity,
        UnitPrice,
        Subtotal,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItemOptions {
        Table,
        Id,
        OrderItemId,
        Kind,
        Name,
        Price,
    }

    #[derive(DeriveIden)]
    enum Payments {
        Table,
        Id,
        OrderId,
        Amount,
        Method,
        Status,
        PaidAt,
    }
}
