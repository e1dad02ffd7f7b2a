//! Engine configuration.

use std::time::Duration;

use tenon_core::defaults;

/// Timeouts applied to every disassembly transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long to wait for another disassembly of the same asset to finish
    /// before failing with a conflict.
    pub lock_timeout: Duration,
    /// Upper bound for any single statement in the disassembly transaction.
    pub statement_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(defaults::LOCK_TIMEOUT_SECS),
            statement_timeout: Duration::from_secs(defaults::STATEMENT_TIMEOUT_SECS),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `TENON_LOCK_TIMEOUT_SECS` | `120` | Wait for the per-asset lock |
    /// | `TENON_STATEMENT_TIMEOUT_SECS` | `600` | Per-statement bound under the lock |
    pub fn from_env() -> Self {
        Self {
            lock_timeout: env_secs("TENON_LOCK_TIMEOUT_SECS", defaults::LOCK_TIMEOUT_SECS),
            statement_timeout: env_secs(
                "TENON_STATEMENT_TIMEOUT_SECS",
                defaults::STATEMENT_TIMEOUT_SECS,
            ),
        }
    }

    /// Set the lock wait.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the statement timeout.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(parse_secs(std::env::var(name).ok().as_deref(), default))
}

/// Parse a positive number of seconds, falling back to `default`.
fn parse_secs(value: Option<&str>, default: u64) -> u64 {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(default)
}
