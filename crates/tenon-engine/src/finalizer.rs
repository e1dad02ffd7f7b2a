//! Aggregate finalizer: asset-level cleanup once every node action ran.

use serde_json::{json, Value as JsonValue};
use sqlx::{Postgres, Transaction};
use tracing::{debug, warn};

use tenon_core::{
    history_event_type, Asset, DisassembleResult, DisposeOriginal, NewHistoryEvent,
    PromotedAsset, RequestContext, Result,
};
use tenon_db::{Database, DependentTable};

use crate::template::{embedded_asset_id, parse_template, retarget_template};

/// Tables cleared before a hard delete of the original asset. Failure
/// occurrences take their applied solutions with them.
const ASSET_SCOPED_TABLES: [DependentTable; 6] = [
    DependentTable::Document,
    DependentTable::WorkOrder,
    DependentTable::FailureOccurrence,
    DependentTable::LotInstallation,
    DependentTable::MaintenanceChecklist,
    DependentTable::HistoryEvent,
];

#[derive(Clone)]
pub struct Finalizer {
    db: Database,
}

impl Finalizer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Migrate asset-level dependents, rewrite preventive templates and
    /// dispose of the original asset.
    pub async fn finalize_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ctx: RequestContext,
        origin: &Asset,
        dispose: DisposeOriginal,
        result: &mut DisassembleResult,
    ) -> Result<()> {
        let first_promoted = result.promoted_assets.first().cloned();

        if let Some(target) = &first_promoted {
            let moved = self
                .db
                .dependents
                .move_asset_level_tx(
                    tx,
                    DependentTable::MaintenanceChecklist,
                    origin.id,
                    target.id,
                )
                .await?;
            result.migrated_checklists += moved as i64;
        }

        result.migrated_preventive_templates += self
            .rewrite_templates_tx(tx, origin, first_promoted.as_ref(), dispose)
            .await? as i64;

        match dispose {
            DisposeOriginal::Delete => self.delete_original_tx(tx, ctx, origin, result).await,
            DisposeOriginal::Decommission => {
                self.decommission_original_tx(tx, ctx, origin, result)
                    .await
            }
        }
    }

    /// Patch templates that embed the original asset id.
    ///
    /// With a promoted asset they are retargeted to the first one. Without
    /// one they stay put, unless the original is being hard-deleted.
    /// Returns the number of templates retargeted.
    async fn rewrite_templates_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        origin: &Asset,
        target: Option<&PromotedAsset>,
        dispose: DisposeOriginal,
    ) -> Result<u64> {
        let documents = &self.db.documents;
        let templates = documents
            .list_preventive_templates_tx(tx, origin.tenant_id)
            .await?;

        let mut rewritten = 0;
        let mut doomed = Vec::new();
        for doc in templates {
            let Some(content) = doc.content.as_deref() else {
                continue;
            };
            let mut template = match parse_template(content) {
                Ok(t) => t,
                Err(e) => {
                    warn!(
                        subsystem = "engine",
                        component = "finalizer",
                        document_id = doc.id,
                        error = %e,
                        "Skipping preventive template with unreadable content"
                    );
                    continue;
                }
            };
            if embedded_asset_id(&template) != Some(origin.id) {
                continue;
            }

            match target {
                Some(target) => {
                    retarget_template(&mut template, target.id, &target.name);
                    documents
                        .update_template_tx(tx, doc.id, &template.to_string(), target.id)
                        .await?;
                    rewritten += 1;
                }
                None if dispose == DisposeOriginal::Delete => doomed.push(doc.id),
                None => {}
            }
        }

        if !doomed.is_empty() {
            documents.delete_by_ids_tx(tx, &doomed).await?;
        }
        debug!(
            subsystem = "engine",
            component = "finalizer",
            asset_id = origin.id,
            rewritten,
            deleted = doomed.len(),
            "Processed preventive templates"
        );
        Ok(rewritten)
    }

    async fn delete_original_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ctx: RequestContext,
        origin: &Asset,
        result: &mut DisassembleResult,
    ) -> Result<()> {
        let residue = self
            .db
            .components
            .orphan_all_for_asset_tx(tx, origin.id)
            .await?;
        result.orphaned_components_count += residue as i64;
        result.original_asset_deleted = true;

        // The asset row is about to go, so the terminal event cannot point at it.
        self.db
            .history
            .record_tx(
                tx,
                &NewHistoryEvent {
                    tenant_id: origin.tenant_id,
                    asset_id: None,
                    component_id: None,
                    event_type: history_event_type::ASSET_DELETED,
                    description: format!(
                        "Asset \"{}\" disassembled and deleted",
                        origin.name
                    ),
                    actor_id: Some(ctx.actor_id),
                    payload: summary_payload(origin, result),
                },
            )
            .await?;

        let deps = &self.db.dependents;
        for table in ASSET_SCOPED_TABLES {
            deps.delete_for_asset_tx(tx, table, origin.id).await?;
        }
        self.db.assets.delete_tx(tx, origin.id).await
    }

    async fn decommission_original_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ctx: RequestContext,
        origin: &Asset,
        result: &DisassembleResult,
    ) -> Result<()> {
        self.db.assets.decommission_tx(tx, origin.id).await?;
        self.db
            .history
            .record_tx(
                tx,
                &NewHistoryEvent {
                    tenant_id: origin.tenant_id,
                    asset_id: Some(origin.id),
                    component_id: None,
                    event_type: history_event_type::ASSET_DISASSEMBLED,
                    description: format!(
                        "Asset disassembled: {} promoted, {} deleted, {} orphaned",
                        result.promoted_assets.len(),
                        result.deleted_components_count,
                        result.orphaned_components_count
                    ),
                    actor_id: Some(ctx.actor_id),
                    payload: summary_payload(origin, result),
                },
            )
            .await?;
        Ok(())
    }
}

/// History payload shared by both disposal paths.
fn summary_payload(origin: &Asset, result: &DisassembleResult) -> JsonValue {
    json!({
        "assetId": origin.id,
        "assetName": origin.name,
        "promotedAssetIds": result
            .promoted_assets
            .iter()
            .map(|p| p.id)
            .collect::<Vec<_>>(),
        "deletedComponents": result.deleted_components_count,
        "orphanedComponents": result.orphaned_components_count,
        "migratedWorkOrders": result.migrated_work_orders,
        "migratedFailures": result.migrated_failures,
        "migratedDocuments": result.migrated_documents,
        "migratedLotInstallations": result.migrated_lot_installations,
        "migratedChecklists": result.migrated_checklists,
        "migratedPreventiveTemplates": result.migrated_preventive_templates,
    })
}
