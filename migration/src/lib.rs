pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20260301_000001_url_analytics;
mod m20260301_000002_url_analytics_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_url_analytics::Migration),
            Box::new(m20260301_000002_url_analytics_indexes::Migration),
        ]
    }
}
