//! Per-asset exclusive lock for disassembly.
//!
//! Uses a transaction-scoped PostgreSQL advisory lock so the lock is shared
//! across every process pointed at the same database and is released by
//! commit, rollback, or a dropped connection. Keys use the two-int form:
//! a fixed namespace derived from [`defaults::LOCK_NAMESPACE`] plus the
//! asset id, which keeps them apart from unrelated advisory locks.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use tenon_core::defaults;
use tenon_core::{Error, Result};

/// SQLSTATE raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE raised when `statement_timeout` expires.
const QUERY_CANCELED: &str = "57014";

/// Derive the namespace half of an advisory lock key.
pub fn lock_namespace(name: &str) -> i32 {
    let hash = blake3::hash(name.as_bytes());
    let bytes = hash.as_bytes();
    i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Advisory lock key for an asset: `(namespace, key)`.
///
/// Ids outside the `i32` range are folded; two assets sharing a key only
/// serialize against each other, they never run concurrently by mistake.
pub fn lock_key(asset_id: i64) -> (i32, i32) {
    let key = match i32::try_from(asset_id) {
        Ok(k) => k,
        Err(_) => ((asset_id >> 32) as i32) ^ (asset_id as i32),
    };
    (lock_namespace(defaults::LOCK_NAMESPACE), key)
}

/// Runs work inside a transaction that holds the exclusive lock of one asset.
#[derive(Clone)]
pub struct LockCoordinator {
    pool: PgPool,
    lock_timeout: Duration,
    statement_timeout: Duration,
}

impl LockCoordinator {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: Duration::from_secs(defaults::LOCK_TIMEOUT_SECS),
            statement_timeout: Duration::from_secs(defaults::STATEMENT_TIMEOUT_SECS),
        }
    }

    /// Set how long to wait for the lock before failing with a conflict.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the per-statement bound for work done under the lock.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }

    /// Take the asset's lock, run `f`, then commit.
    ///
    /// A second caller for the same asset blocks until the first one's
    /// transaction ends. If `f` fails, the transaction rolls back and the
    /// lock is released with it.
    ///
    /// ```rust,ignore
    /// let result = locks
    ///     .with_exclusive_lock(asset_id, move |tx| Box::pin(async move {
    ///         engine.run_locked(tx, ctx, req).await
    ///     }))
    ///     .await?;
    /// ```
    pub async fn with_exclusive_lock<F, T>(&self, asset_id: i64, f: F) -> Result<T>
    where
        F: for<'a> FnOnce(
            &'a mut Transaction<'_, Postgres>,
        ) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>,
    {
        let (namespace, key) = lock_key(asset_id);
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // SET does not take bind parameters; both values are integers we format.
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = {}",
            self.statement_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = {}",
            self.lock_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let wait = Instant::now();
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(namespace)
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_lock_error(e, asset_id, self.lock_timeout))?;

        debug!(
            subsystem = "db",
            component = "lock",
            op = "acquire",
            asset_id,
            wait_ms = wait.elapsed().as_millis() as u64,
            "Acquired disassembly lock"
        );

        // Row locks taken under the advisory lock should wait, not time out.
        sqlx::query("SET LOCAL lock_timeout TO DEFAULT")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let result = f(&mut tx).await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(result)
    }
}

fn map_lock_error(e: sqlx::Error, asset_id: i64, timeout: Duration) -> Error {
    let code = e
        .as_database_error()
        .and_then(|db| db.code())
        .map(|c| c.into_owned());
    match code.as_deref() {
        Some(LOCK_NOT_AVAILABLE) | Some(QUERY_CANCELED) => {
            warn!(
                subsystem = "db",
                component = "lock",
                op = "acquire",
                asset_id,
                timeout_secs = timeout.as_secs(),
                "Timed out waiting for disassembly lock"
            );
            Error::Conflict(format!(
                "asset {} is being disassembled by another operation",
                asset_id
            ))
        }
        _ => Error::Database(e),
    }
}
