//! Action executor: applies one component action to one resolved subtree.
//!
//! Each variant of [`ComponentAction`] has its own side-effect graph over the
//! dependent tables. The order of statements inside each variant matters:
//! rows that point into the subtree are detached or deleted before the rows
//! they point at.

use serde_json::json;
use sqlx::{Postgres, Transaction};
use tracing::debug;

use tenon_core::{
    history_event_type, Asset, Component, ComponentAction, DisassembleResult, DocumentMigration,
    HistoryMigration, NewHistoryEvent, PromotedAsset, Result,
};
use tenon_db::{Database, DependentTable, Subtree};

/// Everything an action needs to know about its target.
#[derive(Debug, Clone, Copy)]
pub struct ActionScope<'a> {
    /// The asset being disassembled.
    pub origin: &'a Asset,
    /// The targeted component, as loaded under the lock.
    pub component: &'a Component,
    /// The component and its descendants.
    pub subtree: &'a Subtree,
    pub actor_id: i64,
    pub migrate_history: HistoryMigration,
    pub migrate_documents: DocumentMigration,
}

/// Rows touched by a single action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationResult {
    pub promoted: Option<PromotedAsset>,
    pub deleted_components: u64,
    pub orphaned_components: u64,
    pub work_orders: u64,
    pub failures: u64,
    pub documents: u64,
    pub lot_installations: u64,
    pub checklists: u64,
}

impl MutationResult {
    /// Add this action's counts to the running result.
    pub fn absorb_into(self, result: &mut DisassembleResult) {
        if let Some(promoted) = self.promoted {
            result.promoted_assets.push(promoted);
        }
        result.deleted_components_count += self.deleted_components as i64;
        result.orphaned_components_count += self.orphaned_components as i64;
        result.migrated_work_orders += self.work_orders as i64;
        result.migrated_failures += self.failures as i64;
        result.migrated_documents += self.documents as i64;
        result.migrated_lot_installations += self.lot_installations as i64;
        result.migrated_checklists += self.checklists as i64;
    }
}

/// Runs promote, delete and orphan actions inside the disassembly transaction.
#[derive(Clone)]
pub struct ActionExecutor {
    db: Database,
}

impl ActionExecutor {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Apply `action` to the subtree described by `scope`.
    pub async fn apply_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        action: &ComponentAction,
        scope: &ActionScope<'_>,
    ) -> Result<MutationResult> {
        let mutation = match action {
            ComponentAction::Promote { new_asset_name } => {
                self.promote_tx(tx, scope, new_asset_name.as_deref())
                    .await?
            }
            ComponentAction::Delete => self.delete_tx(tx, scope).await?,
            ComponentAction::Orphan => self.orphan_tx(tx, scope).await?,
        };

        debug!(
            subsystem = "engine",
            component = "executor",
            op = action.as_str(),
            asset_id = scope.origin.id,
            component_id = scope.component.id,
            subtree_size = scope.subtree.len(),
            "Applied component action"
        );
        Ok(mutation)
    }

    /// Re-root the subtree under a brand-new asset.
    async fn promote_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        scope: &ActionScope<'_>,
        new_asset_name: Option<&str>,
    ) -> Result<MutationResult> {
        let component = scope.component;
        let name = new_asset_name
            .map(str::trim)
            .unwrap_or(component.name.as_str())
            .to_string();
        let ids = scope.subtree.all_ids();
        let deps = &self.db.dependents;

        let new_asset_id = self
            .db
            .assets
            .create_promoted_tx(tx, scope.origin, component, &name)
            .await?;
        self.db
            .components
            .reroot_tx(tx, component.id, &ids, new_asset_id)
            .await?;

        let mut mutation = MutationResult::default();

        if scope.migrate_history == HistoryMigration::Move {
            mutation.work_orders = deps
                .reassign_asset_tx(tx, DependentTable::WorkOrder, &ids, new_asset_id)
                .await?;
            mutation.failures = deps
                .reassign_asset_tx(tx, DependentTable::FailureOccurrence, &ids, new_asset_id)
                .await?;
            deps.reassign_asset_tx(tx, DependentTable::HistoryEvent, &ids, new_asset_id)
                .await?;
        }

        // Lots and checklists belong to the hardware, so they always follow it.
        mutation.lot_installations = deps
            .reassign_asset_tx(tx, DependentTable::LotInstallation, &ids, new_asset_id)
            .await?;
        mutation.checklists = deps
            .reassign_asset_tx(tx, DependentTable::MaintenanceChecklist, &ids, new_asset_id)
            .await?;

        mutation.documents = match scope.migrate_documents {
            DocumentMigration::Move => {
                deps.reassign_asset_tx(tx, DependentTable::Document, &ids, new_asset_id)
                    .await?
            }
            DocumentMigration::Copy => {
                self.db
                    .documents
                    .copy_to_asset_tx(tx, &ids, new_asset_id)
                    .await?
            }
            DocumentMigration::None => 0,
        };

        let subtree_size = scope.subtree.len() as i64;
        self.db
            .history
            .record_tx(
                tx,
                &NewHistoryEvent {
                    tenant_id: scope.origin.tenant_id,
                    asset_id: Some(new_asset_id),
                    component_id: Some(component.id),
                    event_type: history_event_type::ASSET_PROMOTED,
                    description: format!(
                        "Promoted from component \"{}\" of asset \"{}\"",
                        component.name, scope.origin.name
                    ),
                    actor_id: Some(scope.actor_id),
                    payload: json!({
                        "originAssetId": scope.origin.id,
                        "originAssetName": scope.origin.name,
                        "sourceComponentId": component.id,
                        "sourceComponentName": component.name,
                        "subtreeSize": subtree_size,
                        "migrateHistory": scope.migrate_history,
                        "migrateDocuments": scope.migrate_documents,
                    }),
                },
            )
            .await?;

        mutation.promoted = Some(PromotedAsset {
            id: new_asset_id,
            name,
            from_component: component.name.clone(),
            subtree_size,
        });
        Ok(mutation)
    }

    /// Remove the subtree and everything that cannot outlive it.
    async fn delete_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        scope: &ActionScope<'_>,
    ) -> Result<MutationResult> {
        let ids = scope.subtree.all_ids();
        let deps = &self.db.dependents;
        let mut mutation = MutationResult::default();

        mutation.work_orders = deps
            .detach_component_tx(tx, DependentTable::WorkOrder, &ids)
            .await?;
        deps.null_solution_refs_tx(tx, &ids).await?;
        mutation.failures = deps
            .delete_for_components_tx(tx, DependentTable::FailureOccurrence, &ids)
            .await?;
        mutation.lot_installations = deps
            .detach_component_tx(tx, DependentTable::LotInstallation, &ids)
            .await?;
        mutation.checklists = deps
            .detach_component_tx(tx, DependentTable::MaintenanceChecklist, &ids)
            .await?;
        mutation.documents = deps
            .detach_component_tx(tx, DependentTable::Document, &ids)
            .await?;
        deps.delete_for_components_tx(tx, DependentTable::HistoryEvent, &ids)
            .await?;

        let components = &self.db.components;
        components.detach_outside_children_tx(tx, &ids).await?;
        mutation.deleted_components = components
            .delete_levels_tx(tx, &scope.subtree.deletion_order())
            .await?;
        Ok(mutation)
    }

    /// Drop asset ownership from the subtree, keeping its internal shape.
    async fn orphan_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        scope: &ActionScope<'_>,
    ) -> Result<MutationResult> {
        let ids = scope.subtree.all_ids();
        let deps = &self.db.dependents;
        let mut mutation = MutationResult::default();

        mutation.orphaned_components = self
            .db
            .components
            .orphan_tx(tx, scope.component.id, &ids)
            .await?;
        mutation.lot_installations = deps
            .detach_asset_tx(tx, DependentTable::LotInstallation, &ids)
            .await?;
        mutation.checklists = deps
            .detach_asset_tx(tx, DependentTable::MaintenanceChecklist, &ids)
            .await?;
        Ok(mutation)
    }
}
