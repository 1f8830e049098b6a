use sea_orm_migration::prelude::*;

mod m20251217_000001_create_incoming_events;
mod m20251221_000002_add_claim_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251217_000001_create_incoming_events::Migration),
            Box::new(m20251221_000002_add_claim_index::Migration),
        ]
    }
}
