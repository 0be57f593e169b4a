//! Integration tests for SqliteLocalStore
//!
//! These tests exercise the mirror and queue ports against an in-memory
//! SQLite database. Each test creates a fresh database to ensure isolation;
//! the restart tests use a temporary file instead.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use healthbuddy_cache::{DatabasePool, SqliteLocalStore};
use healthbuddy_core::domain::{
    newtypes::{EntityId, EntityKind, LogicalPath, QueueId},
    NewOperation, OperationMethod,
};
use healthbuddy_core::ports::{EntryFilter, ILocalStore, IMirrorStore, IOutboundQueue, ManualClock};

// ============================================================================
// Test helpers
// ============================================================================

/// Create a fresh in-memory store for each test
async fn setup() -> SqliteLocalStore {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    SqliteLocalStore::new(pool.pool().clone())
}

fn goals_update(steps: u32) -> NewOperation {
    NewOperation::new(
        OperationMethod::Update,
        LogicalPath::new("/goals").unwrap(),
        EntityId::goals(),
        json!({ "steps": steps }),
    )
}

fn meal_create(entity_id: &EntityId) -> NewOperation {
    NewOperation::new(
        OperationMethod::Create,
        LogicalPath::new("/meals").unwrap(),
        entity_id.clone(),
        json!({ "items": ["oatmeal"] }),
    )
}

// ============================================================================
// Mirror tests
// ============================================================================

#[tokio::test]
async fn test_put_and_get_entry() {
    let store = setup().await;
    let id = EntityId::profile();

    assert!(store.get(&id).await.unwrap().is_none());

    store.put(&id, &json!({ "age": 41 }), false).await.unwrap();
    let entry = store.get(&id).await.unwrap().expect("entry exists");
    assert_eq!(entry.value(), &json!({ "age": 41 }));
    assert!(!entry.pending_sync());
    assert_eq!(entry.kind(), EntityKind::Profile);

    // Upsert overwrites value and flag together
    store.put(&id, &json!({ "age": 42 }), true).await.unwrap();
    let entry = store.get(&id).await.unwrap().unwrap();
    assert_eq!(entry.value(), &json!({ "age": 42 }));
    assert!(entry.pending_sync());
}

#[tokio::test]
async fn test_delete_entry() {
    let store = setup().await;
    let id = EntityId::generate(EntityKind::Meal);

    store.put(&id, &json!({}), false).await.unwrap();
    assert!(store.delete(&id).await.unwrap());
    assert!(!store.delete(&id).await.unwrap());
    assert!(store.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_newest_first_with_kind_and_limit() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let pool = DatabasePool::in_memory().await.unwrap();
    let store = SqliteLocalStore::with_clock(pool.pool().clone(), clock.clone());

    let mut meals = Vec::new();
    for i in 0..3 {
        let id = EntityId::generate(EntityKind::Meal);
        store.put(&id, &json!({ "n": i }), false).await.unwrap();
        meals.push(id);
        clock.advance(Duration::seconds(1));
    }
    store
        .put(&EntityId::goals(), &json!({ "steps": 1 }), false)
        .await
        .unwrap();

    let listed = store
        .list(&EntryFilter::new().with_kind(EntityKind::Meal).with_limit(2))
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].entity_id(), &meals[2]);
    assert_eq!(listed[1].entity_id(), &meals[1]);

    let all = store.list(&EntryFilter::new()).await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].entity_id(), &EntityId::goals());
}

#[tokio::test]
async fn test_list_pending_only() {
    let store = setup().await;
    let meal = EntityId::generate(EntityKind::Meal);

    store
        .record_mutation(&meal, &json!({ "items": [] }), &meal_create(&meal))
        .await
        .unwrap();
    store.put(&EntityId::profile(), &json!({}), false).await.unwrap();

    let pending = store.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].entity_id(), &meal);
}

#[tokio::test]
async fn test_refresh_skips_pending_entries() {
    let store = setup().await;
    let goals = EntityId::goals();

    // Not present yet: refresh creates it as synced
    assert!(store.refresh(&goals, &json!({ "steps": 5000 })).await.unwrap());
    assert!(!store.get(&goals).await.unwrap().unwrap().pending_sync());

    // A local optimistic write must survive a refresh
    store
        .record_mutation(&goals, &json!({ "steps": 9000 }), &goals_update(9000))
        .await
        .unwrap();
    assert!(!store.refresh(&goals, &json!({ "steps": 5000 })).await.unwrap());
    let entry = store.get(&goals).await.unwrap().unwrap();
    assert_eq!(entry.value(), &json!({ "steps": 9000 }));
    assert!(entry.pending_sync());
}

// ============================================================================
// Queue tests
// ============================================================================

#[tokio::test]
async fn test_enqueue_and_peek_in_order() {
    let store = setup().await;

    let first = store.enqueue(&goals_update(1)).await.unwrap();
    let second = store.enqueue(&goals_update(2)).await.unwrap();
    let third = store.enqueue(&goals_update(3)).await.unwrap();
    assert!(first < second && second < third);

    let ops = store.peek_ordered().await.unwrap();
    let ids: Vec<QueueId> = ops.iter().map(|op| op.queue_id()).collect();
    assert_eq!(ids, vec![first, second, third]);
    assert_eq!(ops[1].payload(), &json!({ "steps": 2 }));
    assert_eq!(ops[1].retry_count(), 0);
    assert!(ops[1].last_error().is_none());
}

#[tokio::test]
async fn test_operation_fields_survive_storage() {
    let store = setup().await;
    let op = goals_update(7);

    let id = store.enqueue(&op).await.unwrap();
    let stored = store.get_operation(id).await.unwrap().expect("stored");

    assert_eq!(stored.method(), OperationMethod::Update);
    assert_eq!(stored.target().as_str(), "/goals");
    assert_eq!(stored.entity_id(), &EntityId::goals());
    assert_eq!(stored.idempotency_key(), op.idempotency_key);
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let store = setup().await;
    let id = store.enqueue(&goals_update(1)).await.unwrap();

    assert!(store.remove(id).await.unwrap());
    assert!(!store.remove(id).await.unwrap());
    assert_eq!(store.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_queue_ids_are_never_reused() {
    let store = setup().await;
    let first = store.enqueue(&goals_update(1)).await.unwrap();
    store.remove(first).await.unwrap();

    let second = store.enqueue(&goals_update(2)).await.unwrap();
    assert!(second > first);
}

#[tokio::test]
async fn test_record_failure_increments() {
    let store = setup().await;
    let id = store.enqueue(&goals_update(1)).await.unwrap();

    assert_eq!(store.record_failure(id, "timeout").await.unwrap(), Some(1));
    assert_eq!(store.record_failure(id, "HTTP 503").await.unwrap(), Some(2));

    let op = store.get_operation(id).await.unwrap().unwrap();
    assert_eq!(op.retry_count(), 2);
    assert_eq!(op.last_error(), Some("HTTP 503"));

    store.remove(id).await.unwrap();
    assert_eq!(store.record_failure(id, "late").await.unwrap(), None);
}

#[tokio::test]
async fn test_clear_and_pending_count() {
    let store = setup().await;
    for i in 0..4 {
        store.enqueue(&goals_update(i)).await.unwrap();
    }
    assert_eq!(store.pending_count().await.unwrap(), 4);
    assert_eq!(store.clear().await.unwrap(), 4);
    assert_eq!(store.pending_count().await.unwrap(), 0);
}

// ============================================================================
// Coupled write tests
// ============================================================================

#[tokio::test]
async fn test_record_mutation_writes_both() {
    let store = setup().await;
    let meal = EntityId::generate(EntityKind::Meal);

    let (entry, queue_id) = store
        .record_mutation(&meal, &json!({ "items": ["toast"] }), &meal_create(&meal))
        .await
        .unwrap();

    assert!(entry.pending_sync());
    assert_eq!(store.get(&meal).await.unwrap().unwrap(), entry);
    let op = store.get_operation(queue_id).await.unwrap().unwrap();
    assert_eq!(op.entity_id(), &meal);
}

#[tokio::test]
async fn test_record_mutation_rolls_back_on_failure() {
    let store = setup().await;
    let goals = EntityId::goals();
    let op = goals_update(1);

    store
        .record_mutation(&goals, &json!({ "steps": 1 }), &op)
        .await
        .unwrap();

    // Same idempotency key violates the UNIQUE constraint; the mirror write
    // in the same transaction must not land.
    let result = store
        .record_mutation(&goals, &json!({ "steps": 999 }), &op)
        .await;
    assert!(result.is_err());

    let entry = store.get(&goals).await.unwrap().unwrap();
    assert_eq!(entry.value(), &json!({ "steps": 1 }));
    assert_eq!(store.pending_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_acknowledge_reconciles_entry() {
    let store = setup().await;
    let meal = EntityId::generate(EntityKind::Meal);
    let (_, queue_id) = store
        .record_mutation(&meal, &json!({ "items": ["rice"] }), &meal_create(&meal))
        .await
        .unwrap();

    let server = json!({ "id": "m-100", "items": ["rice"], "calories": 200 });
    assert!(store.acknowledge(queue_id, &meal, &server).await.unwrap());

    let entry = store.get(&meal).await.unwrap().unwrap();
    assert_eq!(entry.value(), &server);
    assert!(!entry.pending_sync());
    assert_eq!(store.pending_count().await.unwrap(), 0);

    // A duplicate completion leaves everything untouched
    assert!(!store
        .acknowledge(queue_id, &meal, &json!({ "stale": true }))
        .await
        .unwrap());
    assert_eq!(store.get(&meal).await.unwrap().unwrap().value(), &server);
}

#[tokio::test]
async fn test_acknowledge_keeps_newer_optimistic_value() {
    let store = setup().await;
    let goals = EntityId::goals();

    let (_, first) = store
        .record_mutation(&goals, &json!({ "steps": 8000 }), &goals_update(8000))
        .await
        .unwrap();
    store
        .record_mutation(&goals, &json!({ "steps": 9000 }), &goals_update(9000))
        .await
        .unwrap();

    store
        .acknowledge(first, &goals, &json!({ "steps": 8000, "id": 1 }))
        .await
        .unwrap();

    let entry = store.get(&goals).await.unwrap().unwrap();
    assert_eq!(entry.value(), &json!({ "steps": 9000, "id": 1 }));
    assert!(entry.pending_sync());
}

#[tokio::test]
async fn test_acknowledge_rebinds_queued_edits_to_server_id() {
    let store = setup().await;
    let meal = EntityId::generate(EntityKind::Meal);
    let local_key = meal.key().unwrap().to_string();

    let (_, create) = store
        .record_mutation(&meal, &json!({ "items": ["rice"] }), &meal_create(&meal))
        .await
        .unwrap();
    let edit = NewOperation::new(
        OperationMethod::Update,
        LogicalPath::new(format!("/meals/{local_key}")).unwrap(),
        meal.clone(),
        json!({ "items": ["rice"], "notes": "extra" }),
    );
    let (_, edit_id) = store
        .record_mutation(&meal, &json!({ "items": ["rice"], "notes": "extra" }), &edit)
        .await
        .unwrap();

    let server = json!({ "mealId": "m-77", "items": ["rice"], "calories": 200 });
    assert!(store.acknowledge(create, &meal, &server).await.unwrap());

    let queued = store.get_operation(edit_id).await.unwrap().unwrap();
    assert_eq!(queued.target().as_str(), "/meals/m-77");

    let entry = store.get(&meal).await.unwrap().unwrap();
    assert!(entry.pending_sync());
    assert_eq!(entry.server_id(), Some("m-77"));
    assert_eq!(entry.field_str("notes"), Some("extra"));
    assert_eq!(entry.value()["calories"], 200);
}

#[tokio::test]
async fn test_acknowledge_leaves_other_targets_alone() {
    let store = setup().await;
    let profile = EntityId::profile();
    let update = NewOperation::new(
        OperationMethod::Update,
        LogicalPath::new("/profile").unwrap(),
        profile.clone(),
        json!({ "age": 30 }),
    );
    let baseline = NewOperation::new(
        OperationMethod::Patch,
        LogicalPath::new("/profile/baseline").unwrap(),
        profile.clone(),
        json!({ "conditions": [] }),
    );
    let (_, first) = store
        .record_mutation(&profile, &json!({ "age": 30 }), &update)
        .await
        .unwrap();
    let (_, second) = store
        .record_mutation(&profile, &json!({ "age": 30 }), &baseline)
        .await
        .unwrap();

    store
        .acknowledge(first, &profile, &json!({ "id": "p-1", "age": 30 }))
        .await
        .unwrap();

    let queued = store.get_operation(second).await.unwrap().unwrap();
    assert_eq!(queued.target().as_str(), "/profile/baseline");
}

#[tokio::test]
async fn test_mark_synced_clears_pending() {
    let store = setup().await;
    let profile = EntityId::profile();
    store.put(&profile, &json!({ "age": 30 }), true).await.unwrap();

    store
        .mark_synced(&profile, &json!({ "age": 30, "id": "p1" }))
        .await
        .unwrap();

    let entry = store.get(&profile).await.unwrap().unwrap();
    assert!(!entry.pending_sync());
    assert_eq!(entry.field_str("id"), Some("p1"));
}

// ============================================================================
// Durability tests
// ============================================================================

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("healthbuddy.db");
    let goals = EntityId::goals();

    let queue_id = {
        let pool = DatabasePool::new(&db_path).await.unwrap();
        let store = SqliteLocalStore::new(pool.pool().clone());
        let (_, queue_id) = store
            .record_mutation(&goals, &json!({ "steps": 12000 }), &goals_update(12000))
            .await
            .unwrap();
        store.record_failure(queue_id, "offline").await.unwrap();
        pool.close().await;
        queue_id
    };

    let pool = DatabasePool::new(&db_path).await.unwrap();
    let store = SqliteLocalStore::new(pool.pool().clone());

    let entry = store.get(&goals).await.unwrap().unwrap();
    assert_eq!(entry.value(), &json!({ "steps": 12000 }));
    assert!(entry.pending_sync());

    let ops = store.peek_ordered().await.unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].queue_id(), queue_id);
    assert_eq!(ops[0].retry_count(), 1);

    // Schema application is idempotent and ids keep increasing
    let next = store.enqueue(&goals_update(1)).await.unwrap();
    assert!(next > queue_id);
}
