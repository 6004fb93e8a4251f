use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_stock_movements_table::Migration),
            Box::new(m20240101_000002_create_location_stock_table::Migration),
            Box::new(m20240101_000003_create_product_stock_table::Migration),
            Box::new(m20240101_000004_create_stock_take_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_stock_movements_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_stock_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::TenantId).uuid().not_null())
                        .col(ColumnDef::new(StockMovements::ProductId).uuid().not_null())
                        .col(ColumnDef::new(StockMovements::VariantId).uuid().null())
                        .col(ColumnDef::new(StockMovements::Kind).string().not_null())
                        .col(
                            ColumnDef::new(StockMovements::QuantityDelta)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::LocationFrom).string().null())
                        .col(ColumnDef::new(StockMovements::LocationTo).string().null())
                        .col(
                            ColumnDef::new(StockMovements::ReferenceType)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(StockMovements::ReferenceId).string().null())
                        .col(ColumnDef::new(StockMovements::Notes).string().null())
                        .col(ColumnDef::new(StockMovements::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_movements_tenant_product")
                        .table(StockMovements::Table)
                        .col(StockMovements::TenantId)
                        .col(StockMovements::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_movements_created_at")
                        .table(StockMovements::Table)
                        .col(StockMovements::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum StockMovements {
        Table,
        Id,
        TenantId,
        ProductId,
        VariantId,
        Kind,
        QuantityDelta,
        LocationFrom,
        LocationTo,
        ReferenceType,
        ReferenceId,
        Notes,
        CreatedBy,
        CreatedAt,
    }
}

mod m20240101_000002_create_location_stock_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_location_stock_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LocationStock::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LocationStock::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LocationStock::TenantId).uuid().not_null())
                        .col(ColumnDef::new(LocationStock::ProductId).uuid().not_null())
                        .col(ColumnDef::new(LocationStock::VariantId).uuid().null())
                        .col(ColumnDef::new(LocationStock::Location).string().not_null())
                        .col(
                            ColumnDef::new(LocationStock::Quantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(LocationStock::ReservedQuantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(LocationStock::Version)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(LocationStock::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LocationStock::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One row per (tenant, product, variant, location) key. The
            // ledger upserts through a read-first path inside a transaction,
            // so the index is a backstop, not the concurrency mechanism.
            manager
                .create_index(
                    Index::create()
                        .name("idx_location_stock_key")
                        .table(LocationStock::Table)
                        .col(LocationStock::TenantId)
                        .col(LocationStock::ProductId)
                        .col(LocationStock::VariantId)
                        .col(LocationStock::Location)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_location_stock_location")
                        .table(LocationStock::Table)
                        .col(LocationStock::TenantId)
                        .col(LocationStock::Location)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LocationStock::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum LocationStock {
        Table,
        Id,
        TenantId,
        ProductId,
        VariantId,
        Location,
        Quantity,
        ReservedQuantity,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_product_stock_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_product_stock_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductStock::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductStock::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductStock::TenantId).uuid().not_null())
                        .col(ColumnDef::new(ProductStock::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductStock::VariantId).uuid().null())
                        .col(
                            ColumnDef::new(ProductStock::TotalQuantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductStock::Version)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductStock::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductStock::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_product_stock_key")
                        .table(ProductStock::Table)
                        .col(ProductStock::TenantId)
                        .col(ProductStock::ProductId)
                        .col(ProductStock::VariantId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductStock::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum ProductStock {
        Table,
        Id,
        TenantId,
        ProductId,
        VariantId,
        TotalQuantity,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_stock_take_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_stock_take_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockTakeSessions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTakeSessions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTakeSessions::TenantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTakeSessions::Location)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTakeSessions::Status)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTakeSessions::Notes).string().null())
                        .col(
                            ColumnDef::new(StockTakeSessions::CreatedBy)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTakeSessions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTakeSessions::CompletedAt)
                                .timestamp()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockTakeItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTakeItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTakeItems::SessionId).uuid().not_null())
                        .col(ColumnDef::new(StockTakeItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(StockTakeItems::VariantId).uuid().null())
                        .col(
                            ColumnDef::new(StockTakeItems::ExpectedQuantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTakeItems::CountedQuantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockTakeItems::Counted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(StockTakeItems::Notes).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_take_items_session")
                                .from(StockTakeItems::Table, StockTakeItems::SessionId)
                                .to(StockTakeSessions::Table, StockTakeSessions::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_take_items_scope")
                        .table(StockTakeItems::Table)
                        .col(StockTakeItems::SessionId)
                        .col(StockTakeItems::ProductId)
                        .col(StockTakeItems::VariantId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockTakeItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockTakeSessions::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum StockTakeSessions {
        Table,
        Id,
        TenantId,
        Location,
        Status,
        Notes,
        CreatedBy,
        CreatedAt,
        CompletedAt,
    }

    #[derive(Iden)]
    enum StockTakeItems {
        Table,
        Id,
        SessionId,
        ProductId,
        VariantId,
        ExpectedQuantity,
        CountedQuantity,
        Counted,
        Notes,
    }
}
