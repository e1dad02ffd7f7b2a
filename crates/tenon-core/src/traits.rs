//! Core traits for tenon abstractions.
//!
//! These traits define the seams that concrete implementations satisfy,
//! enabling pluggable backends and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// IDEMPOTENCY LEDGER
// =============================================================================

/// Durable record of in-flight, completed and failed disassembly operations.
///
/// The ledger is a state machine separate from the business transaction:
/// entries are written outside of it, so a `pending` entry is visible to
/// concurrent callers and a `failed` entry survives the rollback.
#[async_trait]
pub trait OperationLedger: Send + Sync {
    /// Atomically check-and-insert an entry for `token`.
    ///
    /// Completed tokens replay their cached result, pending tokens conflict,
    /// failed tokens are reclaimed and re-executed. A token already bound to
    /// another tenant or asset is rejected as invalid input.
    async fn begin(
        &self,
        token: &str,
        asset_id: i64,
        tenant_id: i64,
        actor_id: i64,
    ) -> Result<LedgerBegin>;

    /// Mark a pending entry completed and cache its result.
    async fn complete(&self, token: &str, result: &DisassembleResult) -> Result<()>;

    /// Mark a pending entry failed. A later `begin` may retry the token.
    async fn fail(&self, token: &str, error: &str) -> Result<()>;

    /// Fetch an entry for polling, scoped to the calling tenant.
    async fn get(&self, token: &str, tenant_id: i64) -> Result<Option<DisassembleOperation>>;
}
