//! Database migrations

use sea_orm_migration::prelude::*;

mod m20250301_000001_create_acme_tables;
mod m20250301_000002_create_serving_tables;
mod m20250415_000001_add_task_running_lease;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_acme_tables::Migration),
            Box::new(m20250301_000002_create_serving_tables::Migration),
            Box::new(m20250415_000001_add_task_running_lease::Migration),
        ]
    }
}
