//! Structured logging schema and field name constants for tenon.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same field names in every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention (ledger unavailable) |
//! | WARN  | Recoverable issue, automatic fallback applied (skipped action) |
//! | INFO  | Lifecycle events, operation completions, replays |
//! | DEBUG | Decision points (lock acquired, subtree resolved, stage changes) |
//! | TRACE | Per-row detail |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the HTTP request.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "engine"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "ledger", "lock", "tree", "executor", "finalizer", "orchestrator"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "begin", "acquire", "promote", "delete", "orphan", "dispose"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Client-supplied idempotency token.
pub const OPERATION_TOKEN: &str = "operation_token";

/// Tenant the request acts for.
pub const TENANT_ID: &str = "tenant_id";

/// Actor (user) issuing the request.
pub const ACTOR_ID: &str = "actor_id";

/// Asset being disassembled or created.
pub const ASSET_ID: &str = "asset_id";

/// Component targeted by a node action.
pub const COMPONENT_ID: &str = "component_id";

/// Orchestrator state machine stage.
pub const STAGE: &str = "stage";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of nodes in a resolved subtree (node + descendants).
pub const SUBTREE_SIZE: &str = "subtree_size";

/// Number of rows affected by a statement.
pub const ROWS_AFFECTED: &str = "rows_affected";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table or entity affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Error taxonomy kind.
pub const ERROR_KIND: &str = "error_kind";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: [&str; 19] = [
        REQUEST_ID,
        SUBSYSTEM,
        COMPONENT,
        OPERATION,
        OPERATION_TOKEN,
        TENANT_ID,
        ACTOR_ID,
        ASSET_ID,
        COMPONENT_ID,
        STAGE,
        DURATION_MS,
        SUBTREE_SIZE,
        ROWS_AFFECTED,
        POOL_SIZE,
        POOL_IDLE,
        DB_TABLE,
        SUCCESS,
        ERROR_MSG,
        ERROR_KIND,
    ];

    #[test]
    fn test_field_names_are_unique_snake_case() {
        let unique: HashSet<_> = ALL.iter().collect();
        assert_eq!(unique.len(), ALL.len());
        for name in ALL {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{name} is not snake_case"
            );
        }
    }
}
