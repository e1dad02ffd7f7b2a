//! Records that hang off assets and components: work orders, failure
//! occurrences with their applied solutions, history events, inventory lot
//! installations and maintenance checklists.
//!
//! Every method takes an explicit id list (or asset id) and returns the
//! number of rows it touched. Ordering between calls is the caller's job.

use sqlx::{Postgres, Transaction};
use tracing::trace;

use tenon_core::{Error, Result};

/// Tables whose rows carry a `component_id` and/or `asset_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependentTable {
    WorkOrder,
    FailureOccurrence,
    HistoryEvent,
    LotInstallation,
    MaintenanceChecklist,
    Document,
}

impl DependentTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependentTable::WorkOrder => "work_order",
            DependentTable::FailureOccurrence => "failure_occurrence",
            DependentTable::HistoryEvent => "history_event",
            DependentTable::LotInstallation => "lot_installation",
            DependentTable::MaintenanceChecklist => "maintenance_checklist",
            DependentTable::Document => "document",
        }
    }
}

/// PostgreSQL repository for dependent-record migration and cleanup.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgDependentRepository;

impl PgDependentRepository {
    pub fn new() -> Self {
        Self
    }

    /// Point rows scoped to `component_ids` at `asset_id`, keeping the
    /// component reference.
    pub async fn reassign_asset_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        table: DependentTable,
        component_ids: &[i64],
        asset_id: i64,
    ) -> Result<u64> {
        let sql = format!(
            "UPDATE {} SET asset_id = $1 WHERE component_id = ANY($2)",
            table.as_str()
        );
        let rows = sqlx::query(&sql)
            .bind(asset_id)
            .bind(component_ids)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        trace!(db_table = table.as_str(), rows_affected = rows, "Reassigned asset");
        Ok(rows)
    }

    /// Null `component_id` on rows scoped to `component_ids`; the rows stay
    /// alive, attached to their asset only.
    pub async fn detach_component_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        table: DependentTable,
        component_ids: &[i64],
    ) -> Result<u64> {
        let sql = format!(
            "UPDATE {} SET component_id = NULL WHERE component_id = ANY($1)",
            table.as_str()
        );
        let rows = sqlx::query(&sql)
            .bind(component_ids)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        trace!(db_table = table.as_str(), rows_affected = rows, "Detached component");
        Ok(rows)
    }

    /// Null `asset_id` on rows scoped to `component_ids`; the rows stay
    /// attached to the hardware.
    pub async fn detach_asset_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        table: DependentTable,
        component_ids: &[i64],
    ) -> Result<u64> {
        let sql = format!(
            "UPDATE {} SET asset_id = NULL WHERE component_id = ANY($1)",
            table.as_str()
        );
        let rows = sqlx::query(&sql)
            .bind(component_ids)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        trace!(db_table = table.as_str(), rows_affected = rows, "Detached asset");
        Ok(rows)
    }

    /// Delete rows scoped to `component_ids`.
    ///
    /// For failure occurrences the applied solutions cascade; null their
    /// component references first with [`Self::null_solution_refs_tx`].
    pub async fn delete_for_components_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        table: DependentTable,
        component_ids: &[i64],
    ) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE component_id = ANY($1)", table.as_str());
        let rows = sqlx::query(&sql)
            .bind(component_ids)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        trace!(db_table = table.as_str(), rows_affected = rows, "Deleted component-scoped rows");
        Ok(rows)
    }

    /// Null both component references on applied solutions that point into
    /// `component_ids`, so the resolution trail outlives the hardware.
    pub async fn null_solution_refs_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        component_ids: &[i64],
    ) -> Result<u64> {
        let removed = sqlx::query(
            "UPDATE solution_applied SET removed_component_id = NULL \
             WHERE removed_component_id = ANY($1)",
        )
        .bind(component_ids)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        let installed = sqlx::query(
            "UPDATE solution_applied SET installed_component_id = NULL \
             WHERE installed_component_id = ANY($1)",
        )
        .bind(component_ids)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        Ok(removed + installed)
    }

    /// Move asset-level rows (no `component_id`) from one asset to another.
    pub async fn move_asset_level_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        table: DependentTable,
        from_asset_id: i64,
        to_asset_id: i64,
    ) -> Result<u64> {
        let sql = format!(
            "UPDATE {} SET asset_id = $1 WHERE asset_id = $2 AND component_id IS NULL",
            table.as_str()
        );
        let rows = sqlx::query(&sql)
            .bind(to_asset_id)
            .bind(from_asset_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        Ok(rows)
    }

    /// Delete every row still scoped to `asset_id`.
    pub async fn delete_for_asset_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        table: DependentTable,
        asset_id: i64,
    ) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE asset_id = $1", table.as_str());
        let rows = sqlx::query(&sql)
            .bind(asset_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();
        trace!(db_table = table.as_str(), rows_affected = rows, "Deleted asset-scoped rows");
        Ok(rows)
    }
}
