use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AvailabilitySlots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AvailabilitySlots::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AvailabilitySlots::InventoryId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AvailabilitySlots::Date).date().not_null())
                    .col(
                        ColumnDef::new(AvailabilitySlots::IsAvailable)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(AvailabilitySlots::Quantity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AvailabilitySlots::PriceOverride)
                            .decimal()
                            .null(),
                    )
                    .col(ColumnDef::new(AvailabilitySlots::BlockedBy).uuid().null())
                    .col(
                        ColumnDef::new(AvailabilitySlots::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AvailabilitySlots::UpdatedAt)
                            .timestamp()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // One slot per (item, date)
        manager
            .create_index(
                Index::create()
                    .name("idx_availability_slots_item_date")
                    .table(AvailabilitySlots::Table)
                    .col(AvailabilitySlots::InventoryId)
                    .col(AvailabilitySlots::Date)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AvailabilitySlots::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum AvailabilitySlots {
    Table,
    Id,
    InventoryId,
    Date,
    IsAvailable,
    Quantity,
    PriceOverride,
    BlockedBy,
    CreatedAt,
    UpdatedAt,
}
