//! Domain models for tenon.
//!
//! Ids are `i64` to match the `BIGSERIAL` keys of the relational schema.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::defaults::{ASSET_NAME_MAX_LEN, OPERATION_TOKEN_MAX_LEN};
use crate::error::{Error, Result};

// =============================================================================
// ASSETS AND COMPONENTS
// =============================================================================

/// Lifecycle status of an asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetStatus {
    #[default]
    Active,
    Decommissioned,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Active => "ACTIVE",
            AssetStatus::Decommissioned => "DECOMMISSIONED",
        }
    }
}

impl std::str::FromStr for AssetStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(AssetStatus::Active),
            "DECOMMISSIONED" => Ok(AssetStatus::Decommissioned),
            other => Err(Error::Internal(format!("unknown asset status: {}", other))),
        }
    }
}

/// Organizational placement of an asset. Promoted assets inherit it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub area_id: Option<i64>,
    pub sector_id: Option<i64>,
    pub zone_id: Option<i64>,
}

/// A root-level physical unit (machine) owning a tree of components.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub code: Option<String>,
    pub status: AssetStatus,
    pub placement: Placement,
    pub criticality_score: Option<i32>,
    pub risk_score: Option<i32>,
    /// Component this asset was promoted from, if any.
    pub derived_from_component_id: Option<i64>,
    /// Asset the promoted component used to belong to.
    pub origin_asset_id: Option<i64>,
    pub promoted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for creating an asset.
#[derive(Debug, Clone, Default)]
pub struct CreateAssetRequest {
    pub tenant_id: i64,
    pub name: String,
    pub code: Option<String>,
    pub placement: Placement,
    pub criticality_score: Option<i32>,
    pub risk_score: Option<i32>,
}

/// A node in an asset's component hierarchy.
///
/// `asset_id = None` marks an orphan: structurally valid but unowned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: i64,
    pub tenant_id: i64,
    pub asset_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub criticality: Option<String>,
    pub is_safety_critical: bool,
}

/// Request for creating a component.
#[derive(Debug, Clone, Default)]
pub struct CreateComponentRequest {
    pub tenant_id: i64,
    pub asset_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub criticality: Option<String>,
    pub is_safety_critical: bool,
}

// =============================================================================
// DEPENDENT RECORDS
// =============================================================================

/// History event types written by the disassembly engine.
pub mod history_event_type {
    /// Written on a freshly promoted asset.
    pub const ASSET_PROMOTED: &str = "asset_promoted";
    /// Written on a decommissioned original asset.
    pub const ASSET_DISASSEMBLED: &str = "asset_disassembled";
    /// Terminal event for a hard-deleted asset (stored with no asset id).
    pub const ASSET_DELETED: &str = "asset_deleted";
}

/// An audit-trail entry read by the external history viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    pub id: i64,
    pub tenant_id: i64,
    pub asset_id: Option<i64>,
    pub component_id: Option<i64>,
    pub event_type: String,
    pub description: String,
    pub actor_id: Option<i64>,
    pub payload: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Request for appending a history event.
#[derive(Debug, Clone)]
pub struct NewHistoryEvent {
    pub tenant_id: i64,
    pub asset_id: Option<i64>,
    pub component_id: Option<i64>,
    pub event_type: &'static str,
    pub description: String,
    pub actor_id: Option<i64>,
    pub payload: JsonValue,
}

/// A generic attachment row. Rows of kind `preventive_template` carry a
/// JSON blob in `content` that embeds the owning asset id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,
    pub tenant_id: i64,
    pub asset_id: Option<i64>,
    pub component_id: Option<i64>,
    pub kind: String,
    pub name: String,
    pub storage_path: Option<String>,
    pub content_type: Option<String>,
    pub content: Option<String>,
}

// =============================================================================
// DISASSEMBLY REQUEST
// =============================================================================

/// Per-node action. A closed set: each variant has its own side-effect graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ComponentAction {
    /// Re-root the subtree as a brand-new asset.
    Promote {
        #[serde(
            rename = "newAssetName",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        new_asset_name: Option<String>,
    },
    /// Irreversibly remove the subtree.
    Delete,
    /// Detach the subtree from its asset, keeping internal structure.
    Orphan,
}

impl ComponentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentAction::Promote { .. } => "promote",
            ComponentAction::Delete => "delete",
            ComponentAction::Orphan => "orphan",
        }
    }
}

/// One targeted node and what to do with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentActionRequest {
    pub component_id: i64,
    #[serde(flatten)]
    pub action: ComponentAction,
}

/// What happens to the original asset once all node actions ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisposeOriginal {
    /// Hard-delete the asset row and everything still scoped to it.
    Delete,
    /// Soft path: status becomes DECOMMISSIONED.
    #[default]
    Decommission,
}

/// Whether work orders, failures and history follow promoted components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMigration {
    #[default]
    Move,
    Keep,
}

/// Document policy for promoted subtrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentMigration {
    #[default]
    Move,
    Copy,
    None,
}

/// A disassembly request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisassembleRequest {
    pub operation_token: String,
    pub target_asset_id: i64,
    pub component_actions: Vec<ComponentActionRequest>,
    #[serde(default)]
    pub dispose_original: DisposeOriginal,
    #[serde(default)]
    pub migrate_history: HistoryMigration,
    #[serde(default)]
    pub migrate_documents: DocumentMigration,
}

impl DisassembleRequest {
    /// Reject malformed requests before any ledger or lock interaction.
    pub fn validate(&self) -> Result<()> {
        let token = self.operation_token.trim();
        if token.is_empty() {
            return Err(Error::InvalidInput(
                "operationToken is required".to_string(),
            ));
        }
        if self.operation_token.chars().count() > OPERATION_TOKEN_MAX_LEN {
            return Err(Error::InvalidInput(format!(
                "operationToken exceeds {} characters",
                OPERATION_TOKEN_MAX_LEN
            )));
        }
        if self.component_actions.is_empty() {
            return Err(Error::InvalidInput(
                "componentActions must contain at least one action".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.component_actions.len());
        for entry in &self.component_actions {
            if !seen.insert(entry.component_id) {
                return Err(Error::InvalidInput(format!(
                    "component {} appears more than once in componentActions",
                    entry.component_id
                )));
            }
            if let ComponentAction::Promote {
                new_asset_name: Some(name),
            } = &entry.action
            {
                if name.trim().is_empty() {
                    return Err(Error::InvalidInput(format!(
                        "newAssetName for component {} is blank",
                        entry.component_id
                    )));
                }
                if name.chars().count() > ASSET_NAME_MAX_LEN {
                    return Err(Error::InvalidInput(format!(
                        "newAssetName for component {} exceeds {} characters",
                        entry.component_id, ASSET_NAME_MAX_LEN
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Caller identity supplied by the session collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant_id: i64,
    pub actor_id: i64,
}

// =============================================================================
// DISASSEMBLY RESULT
// =============================================================================

/// A new asset produced by a promote action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotedAsset {
    pub id: i64,
    pub name: String,
    /// Name of the component the asset was promoted from.
    pub from_component: String,
    pub subtree_size: i64,
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Accumulated outcome of one disassembly.
///
/// The ledger caches this payload; a replay returns it with `cached: true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisassembleResult {
    pub promoted_assets: Vec<PromotedAsset>,
    pub deleted_components_count: i64,
    pub orphaned_components_count: i64,
    pub migrated_work_orders: i64,
    pub migrated_failures: i64,
    pub migrated_documents: i64,
    pub migrated_lot_installations: i64,
    pub migrated_checklists: i64,
    pub migrated_preventive_templates: i64,
    pub original_asset_deleted: bool,
    /// Component actions skipped because the node is not part of the asset.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_component_ids: Vec<i64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cached: bool,
    /// Set when the ledger was unavailable and the request ran without
    /// idempotency protection.
    #[serde(default, skip_serializing_if = "is_false")]
    pub idempotency_degraded: bool,
}

// =============================================================================
// IDEMPOTENCY LEDGER
// =============================================================================

/// Status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Completed,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for OperationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(OperationStatus::Pending),
            "completed" => Ok(OperationStatus::Completed),
            "failed" => Ok(OperationStatus::Failed),
            other => Err(Error::Internal(format!(
                "unknown operation status: {}",
                other
            ))),
        }
    }
}

/// Ledger entry keyed by the client-supplied operation token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisassembleOperation {
    pub token: String,
    pub asset_id: i64,
    pub tenant_id: i64,
    pub actor_id: i64,
    pub status: OperationStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<DisassembleResult>,
    pub error_message: Option<String>,
}

/// Outcome of opening a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerBegin {
    /// A pending entry now exists for this call; execute.
    Fresh,
    /// The token already completed; replay the cached result.
    AlreadyCompleted(DisassembleResult),
    /// Another call holds the token.
    AlreadyPending,
}
