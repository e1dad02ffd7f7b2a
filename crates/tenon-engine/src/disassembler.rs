//! Disassembly orchestrator.
//!
//! Drives one request through the ledger, the per-asset lock, the node
//! actions and the finalizer:
//!
//! ```text
//! Received -> LedgerChecked -> Locked -> Validated -> Executing -> Finalizing -> Committed
//!                  |
//!                  +-> Replayed (completed token)
//! ```
//!
//! Any error after `LedgerChecked` ends in `Failed`, with the ledger entry
//! marked `failed` so the same token can be retried.

use std::sync::Arc;
use std::time::Instant;

use sqlx::{Postgres, Transaction};
use tracing::{debug, error, info, warn};

use tenon_core::{
    DisassembleOperation, DisassembleRequest, DisassembleResult, Error, LedgerBegin,
    OperationLedger, RequestContext, Result,
};
use tenon_db::Database;

use crate::config::EngineConfig;
use crate::executor::{ActionExecutor, ActionScope};
use crate::finalizer::Finalizer;

/// Orchestrator states, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    LedgerChecked,
    Locked,
    Validated,
    Executing,
    Finalizing,
    Committed,
    Replayed,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::LedgerChecked => "ledger_checked",
            Stage::Locked => "locked",
            Stage::Validated => "validated",
            Stage::Executing => "executing",
            Stage::Finalizing => "finalizing",
            Stage::Committed => "committed",
            Stage::Replayed => "replayed",
            Stage::Failed => "failed",
        }
    }
}

/// Whether this run is protected by a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LedgerMode {
    Tracked,
    Degraded,
}

/// Entry point for asset disassembly.
#[derive(Clone)]
pub struct Disassembler {
    db: Database,
    ledger: Arc<dyn OperationLedger>,
    executor: ActionExecutor,
    finalizer: Finalizer,
}

impl Disassembler {
    /// Build a disassembler over `db`, applying the configured timeouts to
    /// its lock coordinator. The ledger defaults to the database one.
    pub fn new(db: Database, config: EngineConfig) -> Self {
        let locks = db
            .locks
            .clone()
            .with_lock_timeout(config.lock_timeout)
            .with_statement_timeout(config.statement_timeout);
        let db = db.with_locks(locks);
        Self {
            ledger: Arc::new(db.ledger.clone()),
            executor: ActionExecutor::new(db.clone()),
            finalizer: Finalizer::new(db.clone()),
            db,
        }
    }

    /// Replace the idempotency ledger.
    pub fn with_ledger(mut self, ledger: Arc<dyn OperationLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Look up a ledger entry so clients can re-poll after a timeout.
    pub async fn operation(
        &self,
        ctx: RequestContext,
        token: &str,
    ) -> Result<Option<DisassembleOperation>> {
        self.ledger.get(token, ctx.tenant_id).await
    }

    /// Disassemble `req.target_asset_id` on behalf of `ctx`.
    ///
    /// Once the request is valid, the run continues in its own task. If the
    /// caller stops waiting, the ledger entry still ends `completed` or
    /// `failed`, and the token can be polled or retried.
    pub async fn disassemble(
        &self,
        ctx: RequestContext,
        req: DisassembleRequest,
    ) -> Result<DisassembleResult> {
        let token = req.operation_token.clone();
        let asset_id = req.target_asset_id;
        log_stage(Stage::Received, &token, asset_id);

        req.validate()?;

        let engine = self.clone();
        tokio::spawn(async move { engine.run_tracked(ctx, req).await })
            .await
            .map_err(|e| {
                error!(
                    subsystem = "engine",
                    component = "disassembler",
                    op = "disassemble",
                    operation_token = %token,
                    asset_id,
                    error = %e,
                    "Disassembly task aborted"
                );
                Error::Internal(format!("disassembly task for {} aborted: {}", token, e))
            })?
    }

    /// Ledger bookkeeping around the locked transaction.
    async fn run_tracked(
        &self,
        ctx: RequestContext,
        req: DisassembleRequest,
    ) -> Result<DisassembleResult> {
        let start = Instant::now();
        let token = req.operation_token.clone();
        let asset_id = req.target_asset_id;

        let mode = match self
            .ledger
            .begin(&token, asset_id, ctx.tenant_id, ctx.actor_id)
            .await
        {
            Ok(LedgerBegin::Fresh) => LedgerMode::Tracked,
            Ok(LedgerBegin::AlreadyCompleted(mut cached)) => {
                cached.cached = true;
                log_stage(Stage::Replayed, &token, asset_id);
                info!(
                    subsystem = "engine",
                    component = "disassembler",
                    op = "disassemble",
                    operation_token = %token,
                    asset_id,
                    "Replaying completed disassembly"
                );
                return Ok(cached);
            }
            Ok(LedgerBegin::AlreadyPending) => {
                return Err(Error::Conflict(format!(
                    "operation {} is already in progress",
                    token
                )));
            }
            Err(Error::Database(e)) => {
                error!(
                    subsystem = "engine",
                    component = "disassembler",
                    op = "ledger_begin",
                    operation_token = %token,
                    asset_id,
                    error = %e,
                    "Idempotency ledger unavailable, proceeding without it"
                );
                LedgerMode::Degraded
            }
            Err(e) => return Err(e),
        };
        log_stage(Stage::LedgerChecked, &token, asset_id);

        let engine = self.clone();
        let outcome = self
            .db
            .locks
            .with_exclusive_lock(asset_id, move |tx| {
                Box::pin(async move { engine.run_locked(tx, ctx, &req).await })
            })
            .await;

        match outcome {
            Ok(mut result) => {
                log_stage(Stage::Committed, &token, asset_id);
                match mode {
                    LedgerMode::Tracked => {
                        if let Err(e) = self.ledger.complete(&token, &result).await {
                            // Committed but unrecorded: the token stays pending,
                            // so a retry conflicts instead of running twice.
                            error!(
                                subsystem = "engine",
                                component = "disassembler",
                                op = "ledger_complete",
                                operation_token = %token,
                                asset_id,
                                error = %e,
                                "Failed to record completed disassembly"
                            );
                        }
                    }
                    LedgerMode::Degraded => result.idempotency_degraded = true,
                }
                info!(
                    subsystem = "engine",
                    component = "disassembler",
                    op = "disassemble",
                    operation_token = %token,
                    tenant_id = ctx.tenant_id,
                    actor_id = ctx.actor_id,
                    asset_id,
                    promoted = result.promoted_assets.len(),
                    deleted_components = result.deleted_components_count,
                    orphaned_components = result.orphaned_components_count,
                    original_asset_deleted = result.original_asset_deleted,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Disassembly committed"
                );
                Ok(result)
            }
            Err(e) => {
                log_stage(Stage::Failed, &token, asset_id);
                warn!(
                    subsystem = "engine",
                    component = "disassembler",
                    op = "disassemble",
                    operation_token = %token,
                    asset_id,
                    error_kind = e.kind().as_str(),
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Disassembly rolled back"
                );
                if mode == LedgerMode::Tracked {
                    if let Err(ledger_err) = self.ledger.fail(&token, &e.to_string()).await {
                        error!(
                            subsystem = "engine",
                            component = "disassembler",
                            op = "ledger_fail",
                            operation_token = %token,
                            asset_id,
                            error = %ledger_err,
                            "Failed to record failed disassembly"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Everything that happens while the asset lock is held.
    async fn run_locked(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ctx: RequestContext,
        req: &DisassembleRequest,
    ) -> Result<DisassembleResult> {
        let token = req.operation_token.as_str();
        let asset_id = req.target_asset_id;
        log_stage(Stage::Locked, token, asset_id);

        let origin = self
            .db
            .assets
            .get_for_update_tx(tx, asset_id)
            .await?
            .ok_or(Error::AssetNotFound(asset_id))?;
        if origin.tenant_id != ctx.tenant_id {
            return Err(Error::Forbidden(format!(
                "asset {} belongs to another tenant",
                asset_id
            )));
        }
        log_stage(Stage::Validated, token, asset_id);

        log_stage(Stage::Executing, token, asset_id);
        let mut result = DisassembleResult::default();
        for entry in &req.component_actions {
            // Earlier actions may have moved or removed this node, so it is
            // re-read under the lock every time.
            let component = match self.db.components.get_tx(tx, entry.component_id).await? {
                Some(c) if c.tenant_id == ctx.tenant_id && c.asset_id == Some(origin.id) => c,
                _ => {
                    warn!(
                        subsystem = "engine",
                        component = "disassembler",
                        op = entry.action.as_str(),
                        operation_token = token,
                        asset_id,
                        component_id = entry.component_id,
                        "Component is not part of the asset, skipping action"
                    );
                    result.skipped_component_ids.push(entry.component_id);
                    continue;
                }
            };

            let subtree = self
                .db
                .tree
                .descendants_tx(tx, ctx.tenant_id, origin.id, component.id)
                .await?;
            let scope = ActionScope {
                origin: &origin,
                component: &component,
                subtree: &subtree,
                actor_id: ctx.actor_id,
                migrate_history: req.migrate_history,
                migrate_documents: req.migrate_documents,
            };
            self.executor
                .apply_tx(tx, &entry.action, &scope)
                .await?
                .absorb_into(&mut result);
        }

        log_stage(Stage::Finalizing, token, asset_id);
        self.finalizer
            .finalize_tx(tx, ctx, &origin, req.dispose_original, &mut result)
            .await?;
        Ok(result)
    }
}

fn log_stage(stage: Stage, token: &str, asset_id: i64) {
    debug!(
        subsystem = "engine",
        component = "disassembler",
        stage = stage.as_str(),
        operation_token = token,
        asset_id,
        "Disassembly stage"
    );
}
