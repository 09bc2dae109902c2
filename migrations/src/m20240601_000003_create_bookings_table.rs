use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bookings::Id).uuid().primary_key().not_null())
                    .col(
                        ColumnDef::new(Bookings::BookingReference)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Bookings::UserId).uuid().null())
                    .col(ColumnDef::new(Bookings::InventoryId).uuid().not_null())
                    .col(ColumnDef::new(Bookings::MerchantId).uuid().not_null())
                    .col(ColumnDef::new(Bookings::CheckInDate).date().not_null())
                    .col(ColumnDef::new(Bookings::CheckOutDate).date().not_null())
                    .col(
                        ColumnDef::new(Bookings::Quantity)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Bookings::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Bookings::Channel)
                            .string()
                            .not_null()
                            .default("online"),
                    )
                    .col(
                        ColumnDef::new(Bookings::BaseAmount)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Bookings::ServiceFee)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Bookings::TaxAmount)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Bookings::DiscountAmount)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Bookings::TotalAmount)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Bookings::Currency)
                            .string()
                            .not_null()
                            .default("MYR"),
                    )
                    .col(
                        ColumnDef::new(Bookings::PaymentStatus)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Bookings::GuestName).string().null())
                    .col(ColumnDef::new(Bookings::GuestPhone).string().null())
                    .col(ColumnDef::new(Bookings::GuestEmail).string().null())
                    .col(
                        ColumnDef::new(Bookings::GuestCount)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(Bookings::SpecialRequests).text().null())
                    .col(ColumnDef::new(Bookings::PaidAt).timestamp().null())
                    .col(ColumnDef::new(Bookings::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Bookings::UpdatedAt).timestamp().null())
                    .col(
                        ColumnDef::new(Bookings::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bookings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Bookings {
    Table,
    Id,
    BookingReference,
    UserId,
    InventoryId,
    MerchantId,
    CheckInDate,
    CheckOutDate,
    Quantity,
    Status,
    Channel,
    BaseAmount,
    ServiceFee,
    TaxAmount,
    DiscountAmount,
    TotalAmount,
    Currency,
    PaymentStatus,
    GuestName,
    GuestPhone,
    GuestEmail,
    GuestCount,
    SpecialRequests,
    PaidAt,
    CreatedAt,
    UpdatedAt,
    Version,
}
