//! Media record repository.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use lumen_core::{
    new_v7, CandidateUpdate, ClassifierLabel, CycleReport, Error, EventBus, MediaRecord,
    Reconciler, RecordStore, ResolvedLocation, Result, ServerEvent,
};

use crate::cycle::PgCycle;

/// PostgreSQL repository for media records.
#[derive(Clone)]
pub struct PgMediaRepository {
    pool: Pool<Postgres>,
    events: Option<EventBus>,
}

impl PgMediaRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool, events: None }
    }

    /// Emit deletion events on the given bus.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Start a cycle in a new transaction.
    pub async fn begin(&self) -> Result<PgCycle<'static>> {
        let tx = self.pool.begin().await.map_err(Error::Database)?;
        Ok(PgCycle::new(tx))
    }

    /// Insert a record and its details, returning the assigned id.
    pub async fn insert(&self, record: &MediaRecord) -> Result<Uuid> {
        let mut cycle = self.begin().await?;
        let id = cycle.insert_record(record).await?;
        cycle.commit().await?;
        Ok(id)
    }

    /// Load a record with details, keywords and labels.
    pub async fn get(&self, id: Uuid) -> Result<MediaRecord> {
        let mut cycle = self.begin().await?;
        let record = cycle.load_record(id).await?;
        cycle.commit().await?;
        Ok(record)
    }

    /// Run `f` as one reconciliation cycle on the record `id`.
    ///
    /// The record row is locked for the whole cycle. The transaction commits
    /// when `f` succeeds and rolls back when it fails, so a failed cycle
    /// leaves the stored record, keywords and labels untouched.
    ///
    /// ```rust,ignore
    /// let (record, report) = repo.reconcile(id, |cycle, record| Box::pin(async move {
    ///     reconciler.save(cycle, record, &update, &labels, None).await
    /// })).await?;
    /// ```
    pub async fn reconcile<F, T>(&self, id: Uuid, f: F) -> Result<(MediaRecord, T)>
    where
        F: for<'a> FnOnce(
            &'a mut PgCycle<'static>,
            &'a mut MediaRecord,
        ) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>,
    {
        let mut cycle = self.begin().await?;
        cycle.lock_record(id).await?;
        let mut record = cycle.load_record(id).await?;

        match f(&mut cycle, &mut record).await {
            Ok(value) => {
                cycle.commit().await?;
                Ok((record, value))
            }
            Err(e) => {
                warn!(
                    subsystem = "database",
                    component = "records",
                    op = "reconcile",
                    record_id = %id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Reconciliation cycle failed, rolling back"
                );
                cycle.rollback().await?;
                Err(e)
            }
        }
    }

    /// Automatic cycle on a stored record.
    pub async fn save_cycle(
        &self,
        id: Uuid,
        reconciler: &Reconciler,
        update: &CandidateUpdate,
        labels: &[ClassifierLabel],
        location: Option<&ResolvedLocation>,
    ) -> Result<(MediaRecord, CycleReport)> {
        let reconciler = reconciler.clone();
        let update = update.clone();
        let labels = labels.to_vec();
        let location = location.cloned();

        self.reconcile(id, move |cycle, record| {
            Box::pin(async move {
                reconciler
                    .save(cycle, record, &update, &labels, location.as_ref())
                    .await
            })
        })
        .await
    }

    /// Manual cycle for a submitted edit form.
    pub async fn save_form_cycle(
        &self,
        id: Uuid,
        reconciler: &Reconciler,
        form: &CandidateUpdate,
        location: Option<&ResolvedLocation>,
    ) -> Result<(MediaRecord, CycleReport)> {
        let reconciler = reconciler.clone();
        let form = form.clone();
        let location = location.cloned();

        self.reconcile(id, move |cycle, record| {
            Box::pin(async move {
                reconciler
                    .save_form(cycle, record, &form, location.as_ref())
                    .await
            })
        })
        .await
    }

    /// Mark a record deleted; associations are kept.
    pub async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        self.soft_delete_tx(&mut tx, id).await?;
        tx.commit().await.map_err(Error::Database)?;

        self.emit(ServerEvent::RecordDeleted {
            record_id: id,
            permanent: false,
        });
        Ok(())
    }

    /// Soft delete within an existing transaction.
    pub async fn soft_delete_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE media_record SET deleted_at = $1, updated_at = $1
             WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound(id));
        }
        Ok(())
    }

    pub async fn restore(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        self.restore_tx(&mut tx, id).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    /// Restore a soft-deleted record within an existing transaction.
    pub async fn restore_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE media_record SET deleted_at = NULL, updated_at = $1
             WHERE id = $2 AND deleted_at IS NOT NULL",
        )
        .bind(now)
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound(id));
        }
        Ok(())
    }

    /// Remove a record together with its keyword and label associations,
    /// details and share links.
    pub async fn delete_permanently(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        self.delete_permanently_tx(&mut tx, id).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "records",
            op = "delete_permanently",
            record_id = %id,
            "Media record permanently deleted"
        );
        self.emit(ServerEvent::RecordDeleted {
            record_id: id,
            permanent: true,
        });
        Ok(())
    }

    pub async fn delete_permanently_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<()> {
        for sql in [
            "DELETE FROM media_keyword WHERE record_id = $1",
            "DELETE FROM media_label WHERE record_id = $1",
            "DELETE FROM share_link WHERE record_id = $1",
            "DELETE FROM media_details WHERE record_id = $1",
        ] {
            sqlx::query(sql)
                .bind(id)
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?;
        }

        let result = sqlx::query("DELETE FROM media_record WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::RecordNotFound(id));
        }
        Ok(())
    }

    /// Create a share link for a record.
    pub async fn create_share_link(
        &self,
        record_id: Uuid,
        token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Uuid> {
        let id = new_v7();
        sqlx::query(
            "INSERT INTO share_link (id, record_id, token, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(record_id)
        .bind(token)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    pub async fn share_link_count(&self, record_id: Uuid) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM share_link WHERE record_id = $1")
            .bind(record_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    /// Live records captured in the given year and month, newest first.
    pub async fn list_ids_by_month(&self, year: i32, month: u32) -> Result<Vec<Uuid>> {
        sqlx::query_scalar(
            "SELECT id FROM media_record
             WHERE year = $1 AND month = $2 AND deleted_at IS NULL
             ORDER BY captured_at DESC",
        )
        .bind(year)
        .bind(month as i32)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    fn emit(&self, event: ServerEvent) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }
}
