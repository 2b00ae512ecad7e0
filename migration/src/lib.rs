pub use sea_orm_migration::prelude::*;

mod m20250901_000001_create_catalog_tables;
mod m20250901_000002_create_cart_items;
mod m20250901_000003_create_coupons;
mod m20250901_000004_create_orders;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250901_000001_create_catalog_tables::Migration),
            Box::new(m20250901_000002_create_cart_items::Migration),
            Box::new(m20250901_000003_create_coupons::Migration),
            Box::new(m20250901_000004_create_orders::Migration),
        ]
    }
}
