//! # tenon-db
//!
//! PostgreSQL database layer for tenon.
//!
//! This crate provides:
//! - Connection pool management
//! - Repositories for assets, components and their dependent records
//! - Component tree resolution
//! - The per-asset disassembly lock
//! - The idempotency ledger
//!
//! Repositories expose plain pool-backed methods for reads and normal CRUD,
//! plus `_tx` variants the disassembly engine calls inside its locked
//! transaction.

pub mod assets;
pub mod components;
pub mod dependents;
pub mod documents;
pub mod history;
pub mod ledger;
pub mod lock;
pub mod pool;
pub mod tree;

pub mod test_fixtures;

// Re-export core types
pub use tenon_core::*;

pub use assets::PgAssetRepository;
pub use components::PgComponentRepository;
pub use dependents::{DependentTable, PgDependentRepository};
pub use documents::PgDocumentRepository;
pub use history::PgHistoryRepository;
pub use ledger::PgOperationLedger;
pub use lock::{lock_key, LockCoordinator};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use tree::{Subtree, TreeResolver};

/// Combined database handle with all repositories.
#[derive(Clone)]
pub struct Database {
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub assets: PgAssetRepository,
    pub components: PgComponentRepository,
    pub documents: PgDocumentRepository,
    pub history: PgHistoryRepository,
    pub dependents: PgDependentRepository,
    pub tree: TreeResolver,
    pub ledger: PgOperationLedger,
    pub locks: LockCoordinator,
}

impl Database {
    /// Create a new database handle from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            assets: PgAssetRepository::new(pool.clone()),
            components: PgComponentRepository::new(pool.clone()),
            documents: PgDocumentRepository::new(pool.clone()),
            history: PgHistoryRepository::new(pool.clone()),
            dependents: PgDependentRepository::new(),
            tree: TreeResolver::new(),
            ledger: PgOperationLedger::new(pool.clone()),
            locks: LockCoordinator::new(pool.clone()),
            pool,
        }
    }

    /// Replace the lock coordinator, e.g. to apply configured timeouts.
    pub fn with_locks(mut self, locks: LockCoordinator) -> Self {
        self.locks = locks;
        self
    }

    /// Connect to the database with default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Connect to the database with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
