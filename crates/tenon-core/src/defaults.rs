//! Centralized default constants for tenon.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic numbers.

// =============================================================================
// DATABASE POOL
// =============================================================================

/// Maximum number of connections in the pool.
pub const POOL_MAX_CONNECTIONS: u32 = 10;

/// Minimum number of connections kept open.
pub const POOL_MIN_CONNECTIONS: u32 = 1;

/// Connection acquire timeout in seconds.
pub const POOL_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Idle connection timeout in seconds.
pub const POOL_IDLE_TIMEOUT_SECS: u64 = 600;

/// Maximum connection lifetime in seconds.
pub const POOL_MAX_LIFETIME_SECS: u64 = 1800;

/// `application_name` reported to PostgreSQL.
pub const APPLICATION_NAME: &str = "tenon";

// =============================================================================
// DISASSEMBLY
// =============================================================================

/// How long a disassembly waits for the per-asset lock before failing with
/// a conflict. Another disassembly of the same asset may legitimately run
/// for minutes.
pub const LOCK_TIMEOUT_SECS: u64 = 120;

/// Upper bound on a single statement inside the disassembly transaction.
pub const STATEMENT_TIMEOUT_SECS: u64 = 600;

/// Namespace string for disassembly advisory locks.
pub const LOCK_NAMESPACE: &str = "tenon:disassemble";

/// Maximum length of a client-supplied operation token.
pub const OPERATION_TOKEN_MAX_LEN: usize = 128;

/// Maximum length of a promoted asset name.
pub const ASSET_NAME_MAX_LEN: usize = 200;

/// Document kind holding preventive-maintenance template JSON.
pub const PREVENTIVE_TEMPLATE_KIND: &str = "preventive_template";

// =============================================================================
// HTTP
// =============================================================================

/// Default listen host.
pub const HTTP_HOST: &str = "0.0.0.0";

/// Default listen port.
pub const HTTP_PORT: u16 = 3000;

/// Request timeout for the API server. Disassembly requests are long-lived.
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 900;
