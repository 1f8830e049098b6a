use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Serves the worker claim query: status + due/lease filters, oldest first.
        manager
            .create_index(
                Index::create()
                    .table(IncomingEvents::Table)
                    .col(IncomingEvents::Status)
                    .col(IncomingEvents::NextAttemptAt)
                    .col(IncomingEvents::LockedUntil)
                    .col(IncomingEvents::ReceivedAt)
                    .name("idx_incoming_events_claim")
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(IncomingEvents::Table)
                    .col(IncomingEvents::LockId)
                    .name("idx_incoming_events_lock_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_incoming_events_lock_id").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_incoming_events_claim").to_owned())
            .await
    }
}

#[derive(Iden)]
enum IncomingEvents {
    Table,
    Status,
    NextAttemptAt,
    LockedUntil,
    ReceivedAt,
    LockId,
}
