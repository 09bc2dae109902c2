use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InventoryItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InventoryItems::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryItems::MerchantId).uuid().not_null())
                    .col(ColumnDef::new(InventoryItems::Name).string().not_null())
                    .col(ColumnDef::new(InventoryItems::Description).text().null())
                    .col(ColumnDef::new(InventoryItems::Category).string().not_null())
                    .col(ColumnDef::new(InventoryItems::ItemType).string().not_null())
                    .col(ColumnDef::new(InventoryItems::State).string().not_null())
                    .col(ColumnDef::new(InventoryItems::District).string().not_null())
                    .col(
                        ColumnDef::new(InventoryItems::BasePrice)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(InventoryItems::Currency)
                            .string()
                            .not_null()
                            .default("MYR"),
                    )
                    .col(
                        ColumnDef::new(InventoryItems::MinStay)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(InventoryItems::MaxStay).integer().null())
                    .col(
                        ColumnDef::new(InventoryItems::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(InventoryItems::IsVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(InventoryItems::IsFeatured)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(InventoryItems::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryItems::UpdatedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_inventory_items_merchant")
                    .table(InventoryItems::Table)
                    .col(InventoryItems::MerchantId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InventoryItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum InventoryItems {
    Table,
    Id,
    MerchantId,
    Name,
    Description,
    Category,
    ItemType,
    State,
    District,
    BasePrice,
    Currency,
    MinStay,
    MaxStay,
    IsActive,
    IsVerified,
    IsFeatured,
    CreatedAt,
    UpdatedAt,
}
