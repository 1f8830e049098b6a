use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    cli::run_cli(inlet_ingest_migration::Migrator).await;
}
