//! End-to-end disassembly against a real database.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use tenon_core::{
    history_event_type, AssetStatus, ComponentAction, ComponentActionRequest,
    DisassembleOperation, DisassembleRequest, DisassembleResult, DisposeOriginal,
    DocumentMigration, Error, HistoryMigration, LedgerBegin, OperationLedger, OperationStatus,
    RequestContext, Result,
};
use tenon_db::lock_key;
use tenon_db::test_fixtures::{AssetFixture, TestDatabase};
use tenon_engine::{Disassembler, EngineConfig};

const TENANT: i64 = 1;

fn ctx() -> RequestContext {
    RequestContext {
        tenant_id: TENANT,
        actor_id: 77,
    }
}

fn request(token: &str, asset_id: i64, actions: Vec<ComponentActionRequest>) -> DisassembleRequest {
    DisassembleRequest {
        operation_token: token.to_string(),
        target_asset_id: asset_id,
        component_actions: actions,
        dispose_original: DisposeOriginal::Decommission,
        migrate_history: HistoryMigration::Move,
        migrate_documents: DocumentMigration::Move,
    }
}

fn promote(id: i64, name: Option<&str>) -> ComponentActionRequest {
    ComponentActionRequest {
        component_id: id,
        action: ComponentAction::Promote {
            new_asset_name: name.map(String::from),
        },
    }
}

fn delete(id: i64) -> ComponentActionRequest {
    ComponentActionRequest {
        component_id: id,
        action: ComponentAction::Delete,
    }
}

fn orphan(id: i64) -> ComponentActionRequest {
    ComponentActionRequest {
        component_id: id,
        action: ComponentAction::Orphan,
    }
}

/// Asset M with root C1 whose children are C2 and C3.
struct Machine {
    asset: i64,
    c1: i64,
    c2: i64,
    c3: i64,
}

async fn machine(fx: &AssetFixture<'_>) -> Machine {
    let asset = fx.asset("M").await;
    let c1 = fx.component(asset, None, "C1").await;
    let c2 = fx.component(asset, Some(c1), "C2").await;
    let c3 = fx.component(asset, Some(c1), "C3").await;
    Machine { asset, c1, c2, c3 }
}

fn engine(test_db: &TestDatabase) -> Disassembler {
    Disassembler::new(test_db.db.clone(), EngineConfig::default())
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_promote_root_into_standalone_asset() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let wo_c2 = fx.work_order(m.asset, Some(m.c2), "Replace seal").await;
    let wo_asset = fx.work_order(m.asset, None, "Annual inspection").await;

    let result = engine(&test_db)
        .disassemble(
            ctx(),
            request("op-promote", m.asset, vec![promote(m.c1, Some("Standalone Pump"))]),
        )
        .await
        .unwrap();

    assert_eq!(result.promoted_assets.len(), 1);
    let promoted = &result.promoted_assets[0];
    assert_eq!(promoted.name, "Standalone Pump");
    assert_eq!(promoted.from_component, "C1");
    assert_eq!(promoted.subtree_size, 3);
    assert_eq!(result.migrated_work_orders, 1);
    assert!(!result.original_asset_deleted);
    assert!(!result.cached);

    for c in [m.c1, m.c2, m.c3] {
        assert_eq!(fx.column_of("component", "asset_id", c).await, Some(promoted.id));
    }
    assert_eq!(fx.column_of("component", "parent_id", m.c1).await, None);
    assert_eq!(fx.column_of("component", "parent_id", m.c2).await, Some(m.c1));
    assert_eq!(fx.column_of("work_order", "asset_id", wo_c2).await, Some(promoted.id));
    assert_eq!(fx.column_of("work_order", "asset_id", wo_asset).await, Some(m.asset));

    let original = test_db.db.assets.get(m.asset).await.unwrap().unwrap();
    assert_eq!(original.status, AssetStatus::Decommissioned);

    let new_asset = test_db.db.assets.get(promoted.id).await.unwrap().unwrap();
    assert_eq!(new_asset.status, AssetStatus::Active);
    assert_eq!(new_asset.derived_from_component_id, Some(m.c1));
    assert_eq!(new_asset.origin_asset_id, Some(m.asset));
    assert!(new_asset.promoted_at.is_some());
    assert_eq!(new_asset.criticality_score, original.criticality_score);

    let on_original = test_db.db.history.list_by_asset(m.asset).await.unwrap();
    assert_eq!(on_original.len(), 1);
    assert_eq!(on_original[0].event_type, history_event_type::ASSET_DISASSEMBLED);
    let on_new = test_db.db.history.list_by_asset(promoted.id).await.unwrap();
    assert_eq!(on_new.len(), 1);
    assert_eq!(on_new[0].event_type, history_event_type::ASSET_PROMOTED);
    assert_eq!(on_new[0].actor_id, Some(77));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_delete_child_detaches_work_orders() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let wo = fx.work_order(m.asset, Some(m.c2), "Fix C2").await;
    let failure = fx.failure(m.asset, Some(m.c2), "C2 cracked").await;

    let result = engine(&test_db)
        .disassemble(ctx(), request("op-delete", m.asset, vec![delete(m.c2)]))
        .await
        .unwrap();

    assert_eq!(result.deleted_components_count, 1);
    assert!(!fx.exists("component", m.c2).await);
    assert_eq!(fx.column_of("work_order", "component_id", wo).await, None);
    assert_eq!(fx.column_of("work_order", "asset_id", wo).await, Some(m.asset));
    assert!(!fx.exists("failure_occurrence", failure).await);

    assert_eq!(fx.column_of("component", "asset_id", m.c1).await, Some(m.asset));
    assert_eq!(fx.column_of("component", "asset_id", m.c3).await, Some(m.asset));
    assert_eq!(fx.column_of("component", "parent_id", m.c3).await, Some(m.c1));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_replay_returns_identical_payload() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let engine = engine(&test_db);
    let req = request("op-replay", m.asset, vec![promote(m.c2, None)]);

    let first = engine.disassemble(ctx(), req.clone()).await.unwrap();
    let second = engine.disassemble(ctx(), req).await.unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(
        DisassembleResult {
            cached: false,
            ..second.clone()
        },
        first
    );
    assert_eq!(
        serde_json::to_value(&second).unwrap()["promotedAssets"],
        serde_json::to_value(&first).unwrap()["promotedAssets"]
    );
    // Executed once: a single asset derives from C2.
    assert_eq!(
        fx.count_where("asset", "derived_from_component_id", m.c2).await,
        1
    );
    // Name falls back to the component name.
    assert_eq!(first.promoted_assets[0].name, "C2");

    let op = engine.operation(ctx(), "op-replay").await.unwrap().unwrap();
    assert_eq!(op.status, OperationStatus::Completed);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_promote_conserves_component_counts() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let asset = fx.asset("Conveyor").await;
    let frame = fx.component(asset, None, "Frame").await;
    let drive = fx.component(asset, Some(frame), "Drive").await;
    let motor = fx.component(asset, Some(drive), "Motor").await;
    fx.component(asset, Some(motor), "Fan").await;
    fx.component(asset, Some(drive), "Gearbox").await;
    fx.component(asset, Some(frame), "Belt").await;

    let before = test_db.db.components.count_by_asset(asset).await.unwrap();
    let result = engine(&test_db)
        .disassemble(ctx(), request("op-conserve", asset, vec![promote(drive, None)]))
        .await
        .unwrap();
    let new_id = result.promoted_assets[0].id;

    assert_eq!(result.promoted_assets[0].subtree_size, 4);
    assert_eq!(test_db.db.components.count_by_asset(asset).await.unwrap(), before - 4);
    assert_eq!(test_db.db.components.count_by_asset(new_id).await.unwrap(), 4);
    assert_eq!(fx.column_of("component", "parent_id", drive).await, None);
    // Deeper links inside the promoted subtree are untouched.
    assert_eq!(fx.column_of("component", "parent_id", motor).await, Some(drive));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_delete_leaves_no_dangling_references() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let c4 = fx.component(m.asset, Some(m.c2), "C4").await;

    let wo = fx.work_order(m.asset, Some(c4), "Fix C4").await;
    let lot = fx.lot_installation(m.asset, Some(m.c2)).await;
    let checklist = fx.checklist(m.asset, Some(c4), "C4 weekly").await;
    let doc = fx.document(m.asset, Some(m.c2), "c2-manual").await;
    fx.history(m.asset, Some(c4), "C4 inspected").await;

    // A failure elsewhere whose resolution swapped parts out of the subtree.
    let elsewhere = fx.failure(m.asset, Some(m.c3), "C3 jam").await;
    let solution = fx.solution(elsewhere, Some(c4), Some(m.c2)).await;
    let doomed_failure = fx.failure(m.asset, Some(m.c2), "C2 leak").await;
    let doomed_solution = fx.solution(doomed_failure, Some(m.c2), None).await;

    let result = engine(&test_db)
        .disassemble(ctx(), request("op-dangling", m.asset, vec![delete(m.c2)]))
        .await
        .unwrap();
    assert_eq!(result.deleted_components_count, 2);

    for table in [
        "work_order",
        "lot_installation",
        "maintenance_checklist",
        "document",
        "history_event",
        "failure_occurrence",
    ] {
        assert_eq!(fx.count_where(table, "component_id", m.c2).await, 0, "{}", table);
        assert_eq!(fx.count_where(table, "component_id", c4).await, 0, "{}", table);
    }
    for column in ["removed_component_id", "installed_component_id"] {
        assert_eq!(fx.count_where("solution_applied", column, m.c2).await, 0);
        assert_eq!(fx.count_where("solution_applied", column, c4).await, 0);
    }

    assert!(fx.exists("work_order", wo).await);
    assert!(fx.exists("lot_installation", lot).await);
    assert!(fx.exists("maintenance_checklist", checklist).await);
    assert!(fx.exists("document", doc).await);
    assert!(fx.exists("solution_applied", solution).await);
    assert!(!fx.exists("solution_applied", doomed_solution).await);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_orphan_preserves_internal_structure() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let c4 = fx.component(m.asset, Some(m.c2), "C4").await;
    let c5 = fx.component(m.asset, Some(c4), "C5").await;
    let lot = fx.lot_installation(m.asset, Some(c4)).await;
    let checklist = fx.checklist(m.asset, Some(m.c2), "C2 daily").await;

    let result = engine(&test_db)
        .disassemble(ctx(), request("op-orphan", m.asset, vec![orphan(m.c2)]))
        .await
        .unwrap();
    assert_eq!(result.orphaned_components_count, 3);

    for c in [m.c2, c4, c5] {
        assert_eq!(fx.column_of("component", "asset_id", c).await, None);
    }
    // The orphan root no longer hangs off a node the asset still owns.
    assert_eq!(fx.column_of("component", "parent_id", m.c2).await, None);
    assert_eq!(fx.column_of("component", "asset_id", m.c1).await, Some(m.asset));
    assert_eq!(fx.column_of("component", "parent_id", c4).await, Some(m.c2));
    assert_eq!(fx.column_of("component", "parent_id", c5).await, Some(c4));

    assert_eq!(fx.column_of("lot_installation", "asset_id", lot).await, None);
    assert_eq!(fx.column_of("lot_installation", "component_id", lot).await, Some(c4));
    assert_eq!(fx.column_of("maintenance_checklist", "asset_id", checklist).await, None);
    assert_eq!(
        fx.column_of("maintenance_checklist", "component_id", checklist).await,
        Some(m.c2)
    );

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_orphan_survives_delete_of_former_parent() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;

    let result = engine(&test_db)
        .disassemble(
            ctx(),
            request("op-orphan-delete", m.asset, vec![orphan(m.c2), delete(m.c1)]),
        )
        .await
        .unwrap();

    assert_eq!(result.orphaned_components_count, 1);
    assert_eq!(result.deleted_components_count, 2);
    assert!(fx.exists("component", m.c2).await);
    assert!(!fx.exists("component", m.c1).await);
    assert!(!fx.exists("component", m.c3).await);
    assert_eq!(fx.column_of("component", "asset_id", m.c2).await, None);
    assert_eq!(fx.column_of("component", "parent_id", m.c2).await, None);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_delete_spares_nodes_of_other_assets() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let other = fx.asset("Neighbour").await;
    let stray = fx.component(other, Some(m.c1), "Stray").await;

    let result = engine(&test_db)
        .disassemble(ctx(), request("op-delete-boundary", m.asset, vec![delete(m.c1)]))
        .await
        .unwrap();

    assert_eq!(result.deleted_components_count, 3);
    assert!(fx.exists("component", stray).await);
    assert_eq!(fx.column_of("component", "asset_id", stray).await, Some(other));
    assert_eq!(fx.column_of("component", "parent_id", stray).await, None);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_later_promote_leaves_orphan_unowned() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let engine = engine(&test_db);

    engine
        .disassemble(ctx(), request("op-orphan-first", m.asset, vec![orphan(m.c2)]))
        .await
        .unwrap();
    let result = engine
        .disassemble(ctx(), request("op-promote-after", m.asset, vec![promote(m.c1, None)]))
        .await
        .unwrap();

    assert_eq!(result.promoted_assets.len(), 1);
    assert_eq!(result.promoted_assets[0].subtree_size, 2);
    let new_asset = result.promoted_assets[0].id;
    assert_eq!(fx.column_of("component", "asset_id", m.c3).await, Some(new_asset));
    assert_eq!(fx.column_of("component", "asset_id", m.c2).await, None);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_concurrent_requests_on_same_asset_serialize() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let engine = engine(&test_db);

    let calls = (0..2).map(|i| {
        let engine = engine.clone();
        let req = request(&format!("op-concurrent-{}", i), m.asset, vec![promote(m.c1, None)]);
        async move { engine.disassemble(ctx(), req).await }
    });
    let results: Vec<DisassembleResult> = join_all(calls)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    // Whichever ran second found C1 already gone from the asset.
    let promoted: usize = results.iter().map(|r| r.promoted_assets.len()).sum();
    assert_eq!(promoted, 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| r.skipped_component_ids == vec![m.c1])
            .count(),
        1
    );
    assert_eq!(
        fx.count_where("asset", "derived_from_component_id", m.c1).await,
        1
    );

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_abandoned_call_still_settles_ledger() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let engine = engine(&test_db);

    // Another transaction holds the asset lock while the caller gives up.
    let (namespace, key) = lock_key(m.asset);
    let mut holder = test_db.pool.begin().await.unwrap();
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(namespace)
        .bind(key)
        .execute(&mut *holder)
        .await
        .unwrap();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(300),
        engine.disassemble(ctx(), request("op-abandoned", m.asset, vec![promote(m.c1, None)])),
    )
    .await;
    assert!(abandoned.is_err());
    holder.commit().await.unwrap();

    let mut operation = None;
    for _ in 0..100 {
        let current = engine.operation(ctx(), "op-abandoned").await.unwrap().unwrap();
        if current.status != OperationStatus::Pending {
            operation = Some(current);
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let operation = operation.expect("ledger entry never left pending");
    assert_eq!(operation.status, OperationStatus::Completed);
    assert_ne!(fx.column_of("component", "asset_id", m.c1).await, Some(m.asset));

    let replay = engine
        .disassemble(ctx(), request("op-abandoned", m.asset, vec![promote(m.c1, None)]))
        .await
        .unwrap();
    assert!(replay.cached);
    assert_eq!(replay.promoted_assets.len(), 1);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_same_token_executes_once() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let engine = engine(&test_db);
    let req = request("op-same-token", m.asset, vec![promote(m.c1, None)]);

    let calls = (0..4).map(|_| {
        let engine = engine.clone();
        let req = req.clone();
        async move { engine.disassemble(ctx(), req).await }
    });
    let outcomes = join_all(calls).await;

    let executed = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(r) if !r.cached))
        .count();
    assert_eq!(executed, 1);
    for outcome in &outcomes {
        match outcome {
            Ok(_) => {}
            Err(e) => assert!(matches!(e, Error::Conflict(_)), "unexpected {:?}", e),
        }
    }
    assert_eq!(
        fx.count_where("asset", "derived_from_component_id", m.c1).await,
        1
    );

    test_db.cleanup().await;
}

/// Ledger whose store is permanently unreachable.
struct UnreachableLedger;

#[async_trait]
impl OperationLedger for UnreachableLedger {
    async fn begin(&self, _: &str, _: i64, _: i64, _: i64) -> Result<LedgerBegin> {
        Err(Error::Database(sqlx::Error::PoolTimedOut))
    }

    async fn complete(&self, _: &str, _: &DisassembleResult) -> Result<()> {
        Err(Error::Database(sqlx::Error::PoolTimedOut))
    }

    async fn fail(&self, _: &str, _: &str) -> Result<()> {
        Err(Error::Database(sqlx::Error::PoolTimedOut))
    }

    async fn get(&self, _: &str, _: i64) -> Result<Option<DisassembleOperation>> {
        Ok(None)
    }
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_unreachable_ledger_degrades() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let engine = engine(&test_db).with_ledger(Arc::new(UnreachableLedger));

    let result = engine
        .disassemble(ctx(), request("op-degraded", m.asset, vec![orphan(m.c3)]))
        .await
        .unwrap();

    assert!(result.idempotency_degraded);
    assert_eq!(result.orphaned_components_count, 1);
    let body = serde_json::to_value(&result).unwrap();
    assert_eq!(body["idempotencyDegraded"], serde_json::json!(true));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_missing_and_foreign_assets_fail_and_mark_ledger() {
    let test_db = TestDatabase::new().await;
    let ours = AssetFixture::new(&test_db.pool, TENANT);
    let theirs = AssetFixture::new(&test_db.pool, 2);
    let m = machine(&ours).await;
    let foreign = theirs.asset("Foreign").await;
    let engine = engine(&test_db);

    let missing = engine
        .disassemble(ctx(), request("op-missing", 999_999, vec![delete(m.c2)]))
        .await;
    assert!(matches!(missing, Err(Error::AssetNotFound(999_999))));

    let forbidden = engine
        .disassemble(ctx(), request("op-foreign", foreign, vec![delete(m.c2)]))
        .await;
    assert!(matches!(forbidden, Err(Error::Forbidden(_))));

    let op = engine.operation(ctx(), "op-foreign").await.unwrap().unwrap();
    assert_eq!(op.status, OperationStatus::Failed);
    // Nothing committed.
    assert!(ours.exists("component", m.c2).await);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_component_outside_asset_is_skipped() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let other = fx.asset("Other").await;
    let stranger = fx.component(other, None, "Stranger").await;

    let result = engine(&test_db)
        .disassemble(
            ctx(),
            request("op-skip", m.asset, vec![delete(stranger), orphan(m.c3)]),
        )
        .await
        .unwrap();

    assert_eq!(result.skipped_component_ids, vec![stranger]);
    assert_eq!(result.orphaned_components_count, 1);
    assert!(fx.exists("component", stranger).await);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_hard_delete_cleans_up_original() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let leftover = fx.component(m.asset, None, "Spare rail").await;
    let asset_checklist = fx.checklist(m.asset, None, "Shift start").await;
    let template = fx.preventive_template(m.asset, "Monthly PM").await;
    let broken = fx.raw_template(Some(m.asset), "Broken", "{not json").await;
    let asset_wo = fx.work_order(m.asset, None, "Paint").await;
    let asset_doc = fx.document(m.asset, None, "layout").await;

    let mut req = request(
        "op-hard-delete",
        m.asset,
        vec![promote(m.c1, Some("Pump")), delete(m.c3)],
    );
    req.dispose_original = DisposeOriginal::Delete;

    let result = engine(&test_db).disassemble(ctx(), req).await.unwrap();
    let pump = result.promoted_assets[0].id;

    assert!(result.original_asset_deleted);
    assert!(test_db.db.assets.get(m.asset).await.unwrap().is_none());
    // C3 belonged to the promoted asset by the time its delete ran.
    assert_eq!(result.skipped_component_ids, vec![m.c3]);
    assert_eq!(result.orphaned_components_count, 1);
    assert_eq!(fx.column_of("component", "asset_id", leftover).await, None);

    assert_eq!(result.migrated_checklists, 1);
    assert_eq!(
        fx.column_of("maintenance_checklist", "asset_id", asset_checklist).await,
        Some(pump)
    );

    assert_eq!(result.migrated_preventive_templates, 1);
    let rewritten = test_db.db.documents.get(template).await.unwrap().unwrap();
    assert_eq!(rewritten.asset_id, Some(pump));
    let content: serde_json::Value =
        serde_json::from_str(rewritten.content.as_deref().unwrap()).unwrap();
    assert_eq!(content["assetId"], serde_json::json!(pump));
    assert_eq!(content["assetName"], serde_json::json!("Pump"));
    assert_eq!(content["intervalDays"], serde_json::json!(30));

    // Unreadable template was skipped and went with the asset's documents.
    assert!(!fx.exists("document", broken).await);
    assert!(!fx.exists("work_order", asset_wo).await);
    assert!(!fx.exists("document", asset_doc).await);

    let terminal = test_db
        .db
        .history
        .list_by_type(TENANT, history_event_type::ASSET_DELETED)
        .await
        .unwrap();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].asset_id, None);
    assert_eq!(terminal[0].payload["assetId"], serde_json::json!(m.asset));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_document_policies() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let engine = engine(&test_db);

    let mut docs = HashMap::new();
    let mut promoted = HashMap::new();
    for policy in [
        DocumentMigration::Move,
        DocumentMigration::Copy,
        DocumentMigration::None,
    ] {
        let m = machine(&fx).await;
        let doc = fx.document(m.asset, Some(m.c2), "manual").await;
        let mut req = request(&format!("op-docs-{:?}", policy), m.asset, vec![promote(m.c1, None)]);
        req.migrate_documents = policy;
        let result = engine.disassemble(ctx(), req).await.unwrap();
        docs.insert(format!("{:?}", policy), (m, doc, result.migrated_documents));
        promoted.insert(format!("{:?}", policy), result.promoted_assets[0].id);
    }

    let (m, doc, migrated) = &docs["Move"];
    assert_eq!(*migrated, 1);
    assert_eq!(fx.column_of("document", "asset_id", *doc).await, Some(promoted["Move"]));
    assert_eq!(fx.column_of("document", "component_id", *doc).await, Some(m.c2));

    let (m, doc, migrated) = &docs["Copy"];
    assert_eq!(*migrated, 1);
    assert_eq!(fx.column_of("document", "asset_id", *doc).await, Some(m.asset));
    assert_eq!(fx.column_of("document", "component_id", *doc).await, None);
    let copies = test_db
        .db
        .documents
        .list_by_asset(promoted["Copy"])
        .await
        .unwrap();
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].component_id, Some(m.c2));
    assert_eq!(copies[0].storage_path.as_deref(), Some("docs/manual.pdf"));

    let (m, doc, migrated) = &docs["None"];
    assert_eq!(*migrated, 0);
    assert_eq!(fx.column_of("document", "asset_id", *doc).await, Some(m.asset));
    assert_eq!(fx.column_of("document", "component_id", *doc).await, Some(m.c2));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_keep_history_leaves_paperwork_on_original() {
    let test_db = TestDatabase::new().await;
    let fx = AssetFixture::new(&test_db.pool, TENANT);
    let m = machine(&fx).await;
    let wo = fx.work_order(m.asset, Some(m.c2), "Fix C2").await;
    let failure = fx.failure(m.asset, Some(m.c2), "C2 leak").await;
    let lot = fx.lot_installation(m.asset, Some(m.c2)).await;

    let mut req = request("op-keep", m.asset, vec![promote(m.c1, None)]);
    req.migrate_history = HistoryMigration::Keep;
    let result = engine(&test_db).disassemble(ctx(), req).await.unwrap();
    let new_id = result.promoted_assets[0].id;

    assert_eq!(result.migrated_work_orders, 0);
    assert_eq!(result.migrated_failures, 0);
    assert_eq!(result.migrated_lot_installations, 1);
    assert_eq!(fx.column_of("work_order", "asset_id", wo).await, Some(m.asset));
    assert_eq!(fx.column_of("failure_occurrence", "asset_id", failure).await, Some(m.asset));
    assert_eq!(fx.column_of("lot_installation", "asset_id", lot).await, Some(new_id));

    test_db.cleanup().await;
}
