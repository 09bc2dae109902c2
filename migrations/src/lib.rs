pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_inventory_table;
mod m20240601_000002_create_availability_slots_table;
mod m20240601_000003_create_bookings_table;
mod m20240615_000004_add_booking_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_inventory_table::Migration),
            Box::new(m20240601_000002_create_availability_slots_table::Migration),
            Box::new(m20240601_000003_create_bookings_table::Migration),
            Box::new(m20240615_000004_add_booking_indexes::Migration),
        ]
    }
}
