//! # lumen-db
//!
//! PostgreSQL persistence for lumen.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgCycle`], a transaction-scoped implementation of the core store
//!   traits used by reconciliation cycles
//! - [`PgMediaRepository`] with row-locked cycles, soft delete, restore and
//!   cascading permanent delete
//!
//! ## Example
//!
//! ```rust,ignore
//! use lumen_db::{CandidateUpdate, Database, MediaRecord, Source};
//!
//! let db = Database::connect("postgres://localhost/lumen").await?;
//! let reconciler = db.reconciler();
//!
//! let id = db.records.insert(&MediaRecord::new()).await?;
//! let update = CandidateUpdate::new().title("Harbour at Night", Source::Meta);
//! let (record, report) = db.records.save_cycle(id, &reconciler, &update, &[], None).await?;
//! ```
pub mod cycle;
pub mod pool;
pub mod records;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use lumen_core::*;

pub use cycle::PgCycle;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use records::PgMediaRepository;

/// Combined database context.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Media record repository.
    pub records: PgMediaRepository,
    /// Bus shared by the repository and every reconciler created here.
    pub events: EventBus,
    config: ReconcileConfig,
}

impl Database {
    /// Create a new Database instance from a connection pool with the
    /// default engine configuration.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self::build(pool, ReconcileConfig::default())
    }

    /// Create with an engine configuration, rejecting invalid values.
    pub fn with_config(pool: sqlx::Pool<sqlx::Postgres>, config: ReconcileConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(pool, config))
    }

    fn build(pool: sqlx::Pool<sqlx::Postgres>, config: ReconcileConfig) -> Self {
        let events = config.event_bus();
        Self {
            records: PgMediaRepository::new(pool.clone()).with_events(events.clone()),
            events,
            config,
            pool,
        }
    }

    /// Connect to the given URL; pool and engine settings come from
    /// `LUMEN_*` environment variables.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, PoolConfig::from_env()).await
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, pool_config: PoolConfig) -> Result<Self> {
        let config = ReconcileConfig::load()?;
        let pool = create_pool_with_config(url, pool_config).await?;
        Self::with_config(pool, config)
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// A reconciler using this database's configuration and event bus.
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.config.clone(), self.events.clone())
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> sqlx::Pool<sqlx::Postgres> {
        PgPoolOptions::new()
            .connect_lazy(test_fixtures::DEFAULT_TEST_DATABASE_URL)
            .unwrap()
    }

    #[tokio::test]
    async fn test_with_config_rejects_invalid_config() {
        let config = ReconcileConfig {
            clip_title: 0,
            ..Default::default()
        };
        assert!(matches!(
            Database::with_config(lazy_pool(), config),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_reconciler_shares_configured_bus() {
        let config = ReconcileConfig {
            clip_title: 120,
            event_bus_capacity: 8,
            ..Default::default()
        };
        let db = Database::with_config(lazy_pool(), config).unwrap();
        let mut rx = db.events.subscribe();

        let reconciler = db.reconciler();
        assert_eq!(reconciler.config().clip_title, 120);
        reconciler
            .events()
            .emit(ServerEvent::LabelCountChanged { delta: 1 });

        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.event_type, "count.labels");
    }
}
