use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use inlet_ingest_schema::incoming_events::{self, Column};

use crate::domain::repository::EventStore;
use crate::domain::types::{EventStatus, IncomingEvent, InsertOutcome, LeaseClaim, Settlement};
use crate::error::IngestError;

// ── Event store ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbEventStore {
    pub db: DatabaseConnection,
}

impl EventStore for DbEventStore {
    async fn insert_if_absent(&self, event: &IncomingEvent) -> Result<InsertOutcome, IngestError> {
        // Only the dedupe key is tolerated as a conflict; other violations and
        // storage failures still surface as errors.
        let inserted = incoming_events::Entity::insert(active_model(event))
            .on_conflict(
                OnConflict::columns([Column::Provider, Column::ProviderEventId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .context("insert incoming event")?;
        Ok(if inserted == 0 {
            InsertOutcome::Duplicate
        } else {
            InsertOutcome::Inserted
        })
    }

    async fn claim_batch(&self, claim: &LeaseClaim) -> Result<Vec<IncomingEvent>, IngestError> {
        let candidates: Vec<Uuid> = incoming_events::Entity::find()
            .select_only()
            .column(Column::Id)
            .filter(claimable(claim.now))
            .order_by_asc(Column::ReceivedAt)
            .limit(claim.limit)
            .into_tuple()
            .all(&self.db)
            .await
            .context("select claim candidates")?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // The predicate is re-checked inside the UPDATE, so when two schedulers
        // race for the same candidate only one update matches the row.
        incoming_events::Entity::update_many()
            .col_expr(Column::Status, Expr::value(EventStatus::Processing.as_str()))
            .col_expr(Column::LockedUntil, Expr::value(claim.lease_until))
            .col_expr(Column::LockId, Expr::value(claim.lock_id.clone()))
            .filter(Column::Id.is_in(candidates))
            .filter(claimable(claim.now))
            .exec(&self.db)
            .await
            .context("claim incoming events")?;

        let models = incoming_events::Entity::find()
            .filter(Column::LockId.eq(claim.lock_id.as_str()))
            .filter(Column::Status.eq(EventStatus::Processing.as_str()))
            .order_by_asc(Column::ReceivedAt)
            .all(&self.db)
            .await
            .context("load claimed events")?;
        models.into_iter().map(event_from_model).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<IncomingEvent>, IngestError> {
        let model = incoming_events::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find incoming event by id")?;
        model.map(event_from_model).transpose()
    }

    async fn settle(
        &self,
        id: Uuid,
        lock_id: &str,
        settlement: &Settlement,
    ) -> Result<bool, IngestError> {
        let no_time: Option<DateTime<Utc>> = None;
        let no_text: Option<String> = None;

        let mut update = incoming_events::Entity::update_many()
            .col_expr(Column::Status, Expr::value(settlement.status().as_str()))
            .col_expr(Column::LastAttemptAt, Expr::value(settlement.attempted_at()))
            .col_expr(Column::LockedUntil, Expr::value(no_time))
            .col_expr(Column::LockId, Expr::value(no_text.clone()));
        update = match settlement {
            Settlement::Processed { processed_at, .. } => update
                .col_expr(Column::ProcessedAt, Expr::value(*processed_at))
                .col_expr(Column::LastError, Expr::value(no_text))
                .col_expr(Column::NextAttemptAt, Expr::value(no_time)),
            Settlement::Retry {
                attempts,
                error,
                next_attempt_at,
                ..
            } => update
                .col_expr(Column::Attempts, Expr::value(*attempts))
                .col_expr(Column::LastError, Expr::value(Some(error.clone())))
                .col_expr(Column::NextAttemptAt, Expr::value(*next_attempt_at)),
            Settlement::DeadLettered {
                attempts, error, ..
            } => update
                .col_expr(Column::Attempts, Expr::value(*attempts))
                .col_expr(Column::LastError, Expr::value(Some(error.clone())))
                .col_expr(Column::NextAttemptAt, Expr::value(no_time)),
        };

        let result = update
            .filter(Column::Id.eq(id))
            .filter(Column::LockId.eq(lock_id))
            .filter(Column::Status.eq(EventStatus::Processing.as_str()))
            .exec(&self.db)
            .await
            .context("settle incoming event")?;
        Ok(result.rows_affected == 1)
    }

    async fn ping(&self) -> Result<(), IngestError> {
        self.db.ping().await.context("ping database")?;
        Ok(())
    }
}

/// SQL form of [`IncomingEvent::is_claimable`].
fn claimable(now: DateTime<Utc>) -> Condition {
    let due_received = Condition::all()
        .add(Column::Status.eq(EventStatus::Received.as_str()))
        .add(
            Condition::any()
                .add(Column::NextAttemptAt.is_null())
                .add(Column::NextAttemptAt.lte(now)),
        )
        .add(
            Condition::any()
                .add(Column::LockedUntil.is_null())
                .add(Column::LockedUntil.lte(now)),
        );
    let abandoned = Condition::all()
        .add(Column::Status.eq(EventStatus::Processing.as_str()))
        .add(Column::LockedUntil.lte(now));
    Condition::any().add(due_received).add(abandoned)
}

fn active_model(event: &IncomingEvent) -> incoming_events::ActiveModel {
    incoming_events::ActiveModel {
        id: Set(event.id),
        provider: Set(event.provider.clone()),
        provider_event_id: Set(event.provider_event_id.clone()),
        event_type: Set(event.event_type.clone()),
        received_at: Set(event.received_at),
        payload: Set(event.payload.clone()),
        status: Set(event.status.as_str().to_owned()),
        attempts: Set(event.attempts),
        last_error: Set(event.last_error.clone()),
        last_attempt_at: Set(event.last_attempt_at),
        next_attempt_at: Set(event.next_attempt_at),
        processed_at: Set(event.processed_at),
        locked_until: Set(event.locked_until),
        lock_id: Set(event.lock_id.clone()),
    }
}

fn event_from_model(model: incoming_events::Model) -> Result<IncomingEvent, IngestError> {
    let status = model
        .status
        .parse::<EventStatus>()
        .with_context(|| format!("decode incoming event {}", model.id))?;
    Ok(IncomingEvent {
        id: model.id,
        provider: model.provider,
        provider_event_id: model.provider_event_id,
        event_type: model.event_type,
        received_at: model.received_at,
        payload: model.payload,
        status,
        attempts: model.attempts,
        last_error: model.last_error,
        last_attempt_at: model.last_attempt_at,
        next_attempt_at: model.next_attempt_at,
        processed_at: model.processed_at,
        locked_until: model.locked_until,
        lock_id: model.lock_id,
    })
}
