use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IncomingEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IncomingEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IncomingEvents::Provider).string().not_null())
                    .col(
                        ColumnDef::new(IncomingEvents::ProviderEventId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(IncomingEvents::EventType).string().not_null())
                    .col(
                        ColumnDef::new(IncomingEvents::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(IncomingEvents::Payload).binary().not_null())
                    .col(
                        ColumnDef::new(IncomingEvents::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IncomingEvents::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(IncomingEvents::LastError).text())
                    .col(ColumnDef::new(IncomingEvents::LastAttemptAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(IncomingEvents::NextAttemptAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(IncomingEvents::ProcessedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(IncomingEvents::LockedUntil).timestamp_with_time_zone())
                    .col(ColumnDef::new(IncomingEvents::LockId).string())
                    .to_owned(),
            )
            .await?;

        // Dedupe key: a redelivered provider event must land on the same row.
        manager
            .create_index(
                Index::create()
                    .table(IncomingEvents::Table)
                    .col(IncomingEvents::Provider)
                    .col(IncomingEvents::ProviderEventId)
                    .name("uq_incoming_events_provider_event")
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IncomingEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum IncomingEvents {
    Table,
    Id,
    Provider,
    ProviderEventId,
    EventType,
    ReceivedAt,
    Payload,
    Status,
    Attempts,
    LastError,
    LastAttemptAt,
    NextAttemptAt,
    ProcessedAt,
    LockedUntil,
    LockId,
}
