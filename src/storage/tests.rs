//! Storage Module Tests
//!
//! Validates the in-memory store implementations the binary and the pipeline tests run on.
//!
//! ## Test Scopes
//! - **Records**: `(owner, sku)` uniqueness under upsert, owner isolation, CRUD paging.
//! - **Ledger**: One-active-operation admission and lifecycle transitions.
//! - **Progress**: Retention window expiry.
//! - **Subscriptions / Inbound**: Owner scoping and capture ordering.

#[cfg(test)]
mod tests {
    use crate::catalog::types::{RecordDraft, RecordPatch, RecordQuery, PAGE_SIZE};
    use crate::events::types::{EventKind, SubscriptionDraft};
    use crate::executor::types::TaskId;
    use crate::operations::testing::record_by_sku;
    use crate::operations::types::{NewOperation, OperationKind, OperationStatus, ProgressSnapshot};
    use crate::relay::types::CapturedRequest;
    use crate::storage::inbound::MemoryInboundStore;
    use crate::storage::ledger::MemoryLedger;
    use crate::storage::progress::MemoryProgressStore;
    use crate::storage::records::MemoryRecordStore;
    use crate::storage::subscriptions::MemorySubscriptionStore;
    use crate::storage::{
        InboundStore, OperationLedger, ProgressStore, RecordStore, StoreError, SubscriptionStore,
    };
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn draft(sku: &str, name: &str) -> RecordDraft {
        RecordDraft::new(sku, name, "")
    }

    fn new_import(owner: &str) -> NewOperation {
        NewOperation {
            owner: owner.to_string(),
            kind: OperationKind::Import,
            file_path: Some("/tmp/upload.csv".to_string()),
        }
    }

    fn captured(method: &str, body: &str) -> CapturedRequest {
        CapturedRequest {
            method: method.to_string(),
            headers: BTreeMap::new(),
            body: body.to_string(),
            query_params: BTreeMap::new(),
        }
    }

    // ============================================================
    // RECORD STORE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_upsert_overwrites_existing_sku() {
        // ARRANGE
        let store = MemoryRecordStore::new();
        store
            .upsert_batch("alice", vec![draft("SKU-1", "First")])
            .await
            .unwrap();

        // ACT: Same SKU with different case and surrounding whitespace
        store
            .upsert_batch("alice", vec![draft("  sku-1 ", "Renamed")])
            .await
            .unwrap();

        // ASSERT: Still one record, with the new name
        assert_eq!(store.count_owned("alice").await.unwrap(), 1);
        let record = record_by_sku(&store, "alice", "SKU-1").await.unwrap();
        assert_eq!(record.name, "Renamed");
        assert_eq!(record.sku, "sku-1");
    }

    #[tokio::test]
    async fn test_same_sku_is_independent_per_owner() {
        let store = MemoryRecordStore::new();
        store.upsert_batch("alice", vec![draft("a", "A")]).await.unwrap();
        store.upsert_batch("bob", vec![draft("a", "B")]).await.unwrap();

        assert_eq!(store.count_owned("alice").await.unwrap(), 1);
        assert_eq!(store.count_owned("bob").await.unwrap(), 1);
        let bobs = record_by_sku(&store, "bob", "a").await.unwrap();
        assert_eq!(bobs.name, "B");
    }

    #[tokio::test]
    async fn test_concurrent_upserts_never_duplicate_a_sku() {
        // ARRANGE
        let store = Arc::new(MemoryRecordStore::new());

        // ACT: Many tasks upsert the same SKU at once
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .upsert_batch("alice", vec![draft("shared", &format!("writer {}", i))])
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // ASSERT
        assert_eq!(store.count_owned("alice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_owned_ids_and_delete_ids_respect_owner() {
        let store = MemoryRecordStore::new();
        store
            .upsert_batch("alice", vec![draft("a", "A"), draft("b", "B"), draft("c", "C")])
            .await
            .unwrap();
        store.upsert_batch("bob", vec![draft("a", "Bob A")]).await.unwrap();

        let ids = store.owned_ids("alice", 2).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

        let deleted = store.delete_ids(&ids).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count_owned("alice").await.unwrap(), 1);
        assert_eq!(store.count_owned("bob").await.unwrap(), 1);

        // Already gone: nothing to delete the second time
        assert_eq!(store.delete_ids(&ids).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deleted_sku_can_be_reinserted() {
        let store = MemoryRecordStore::new();
        let record = store.create("alice", draft("x", "X")).await.unwrap();

        store.delete("alice", record.id).await.unwrap();
        let again = store.create("alice", draft("x", "X again")).await.unwrap();

        assert_ne!(again.id, record.id);
        assert_eq!(store.count_owned("alice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_sku() {
        let store = MemoryRecordStore::new();
        store.create("alice", draft("dup", "One")).await.unwrap();

        let result = store.create("alice", draft("DUP", "Two")).await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_moves_sku_index() {
        let store = MemoryRecordStore::new();
        let first = store.create("alice", draft("old", "Thing")).await.unwrap();
        store.create("alice", draft("taken", "Other")).await.unwrap();

        // Moving onto a taken SKU is a conflict
        let clash = store
            .update(
                "alice",
                first.id,
                RecordPatch {
                    sku: Some("Taken".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(clash, Err(StoreError::Conflict(_))));

        let moved = store
            .update(
                "alice",
                first.id,
                RecordPatch {
                    sku: Some("NEW".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.sku, "new");
        assert!(record_by_sku(&store, "alice", "old").await.is_none());
        assert!(record_by_sku(&store, "alice", "new").await.is_some());
    }

    #[tokio::test]
    async fn test_update_trims_like_create() {
        let store = MemoryRecordStore::new();
        let created = store
            .create("alice", RecordDraft::new("lamp", "  Lamp ", " Warm "))
            .await
            .unwrap();

        let updated = store
            .update(
                "alice",
                created.id,
                RecordPatch {
                    name: Some("  Desk lamp\n".to_string()),
                    description: Some("\tBrass  ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!((created.name.as_str(), created.description.as_str()), ("Lamp", "Warm"));
        assert_eq!(updated.name, "Desk lamp");
        assert_eq!(updated.description, "Brass");
    }

    #[tokio::test]
    async fn test_get_and_delete_are_owner_scoped() {
        let store = MemoryRecordStore::new();
        let record = store.create("alice", draft("a", "A")).await.unwrap();

        assert!(matches!(
            store.get("bob", record.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("bob", record.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.get("alice", record.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let store = MemoryRecordStore::new();
        let drafts: Vec<RecordDraft> = (0..25)
            .map(|i| draft(&format!("item-{:02}", i), &format!("Widget {}", i)))
            .collect();
        store.upsert_batch("alice", drafts).await.unwrap();
        store.create("alice", draft("gadget", "Gadget")).await.unwrap();

        let first = store.list("alice", &RecordQuery::default()).await.unwrap();
        assert_eq!(first.total, 26);
        assert_eq!(first.num_pages, 2);
        assert_eq!(first.items.len(), PAGE_SIZE);

        // Out-of-range pages clamp to the last page
        let last = store
            .list(
                "alice",
                &RecordQuery {
                    q: None,
                    page: Some(99),
                },
            )
            .await
            .unwrap();
        assert_eq!(last.page, 2);
        assert_eq!(last.items.len(), 6);

        let filtered = store
            .list(
                "alice",
                &RecordQuery {
                    q: Some("GADG".to_string()),
                    page: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.items[0].sku, "gadget");
    }

    // ============================================================
    // LEDGER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_ledger_admits_one_active_operation_per_owner() {
        // ARRANGE
        let ledger = MemoryLedger::new();
        let first = ledger.begin(new_import("alice")).await.unwrap();

        // ACT
        let second = ledger.begin(new_import("alice")).await;
        let other_owner = ledger.begin(new_import("bob")).await;

        // ASSERT
        assert!(matches!(second, Err(StoreError::Conflict(_))));
        assert!(other_owner.is_ok());
        let active = ledger.active_for("alice").await.unwrap().unwrap();
        assert_eq!(active.id, first.id);
    }

    #[tokio::test]
    async fn test_concurrent_begin_admits_exactly_one() {
        let ledger = Arc::new(MemoryLedger::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.begin(new_import("alice")).await }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn test_terminal_transition_releases_admission() {
        let ledger = MemoryLedger::new();
        let op = ledger.begin(new_import("alice")).await.unwrap();

        ledger
            .transition(&op.id, OperationStatus::Processing)
            .await
            .unwrap();
        assert!(ledger.begin(new_import("alice")).await.is_err());

        ledger
            .transition(&op.id, OperationStatus::Completed)
            .await
            .unwrap();

        assert!(ledger.active_for("alice").await.unwrap().is_none());
        assert!(ledger.begin(new_import("alice")).await.is_ok());
    }

    #[tokio::test]
    async fn test_second_terminal_transition_is_rejected() {
        let ledger = MemoryLedger::new();
        let op = ledger.begin(new_import("alice")).await.unwrap();
        ledger
            .transition(&op.id, OperationStatus::Failed)
            .await
            .unwrap();

        let result = ledger.transition(&op.id, OperationStatus::Completed).await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(
            ledger.get(&op.id).await.unwrap().status,
            OperationStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_attach_task_and_history_order() {
        let ledger = MemoryLedger::new();
        let first = ledger.begin(new_import("alice")).await.unwrap();
        let task_id = TaskId::new();
        let attached = ledger.attach_task(&first.id, &task_id).await.unwrap();
        assert_eq!(attached.task_id, Some(task_id));
        ledger
            .transition(&first.id, OperationStatus::Completed)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = ledger.begin(new_import("alice")).await.unwrap();

        let history = ledger.list_for("alice", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
        assert_eq!(ledger.list_for("alice", 1).await.unwrap().len(), 1);
    }

    // ============================================================
    // PROGRESS STORE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_progress_put_and_get() {
        let store = MemoryProgressStore::new(Duration::from_secs(60));
        store
            .put("import_progress_x", ProgressSnapshot::processing(42, "Halfway"))
            .await
            .unwrap();

        let snapshot = store.get("import_progress_x").await.unwrap().unwrap();
        assert_eq!(snapshot.progress, 42);
        assert!(store.get("delete_progress_x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_progress_expires_after_ttl() {
        // ARRANGE: A tiny retention window
        let store = MemoryProgressStore::new(Duration::from_millis(10));
        store
            .put("import_progress_x", ProgressSnapshot::complete("Import complete!"))
            .await
            .unwrap();
        store
            .put("import_progress_y", ProgressSnapshot::complete("Import complete!"))
            .await
            .unwrap();

        // ACT
        tokio::time::sleep(Duration::from_millis(30)).await;

        // ASSERT: Reads treat expired entries as absent, the sweep reclaims the rest
        assert!(store.get("import_progress_x").await.unwrap().is_none());
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }

    // ============================================================
    // SUBSCRIPTION STORE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_subscriptions_are_owner_scoped() {
        let store = MemorySubscriptionStore::new();
        let subscription = store
            .create(
                "alice",
                SubscriptionDraft {
                    url: "https://example.com/hook".to_string(),
                    events: vec![EventKind::ProductCreated],
                    is_active: true,
                },
            )
            .await
            .unwrap();

        assert!(store.list_for("bob").await.unwrap().is_empty());
        assert!(matches!(
            store
                .update(
                    "bob",
                    subscription.id,
                    SubscriptionDraft {
                        url: "https://evil.example/hook".to_string(),
                        events: vec![EventKind::ProductDeleted],
                        is_active: true,
                    },
                )
                .await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("bob", subscription.id).await,
            Err(StoreError::NotFound(_))
        ));

        let updated = store
            .update(
                "alice",
                subscription.id,
                SubscriptionDraft {
                    url: "https://example.com/other".to_string(),
                    events: vec![EventKind::ImportCompleted],
                    is_active: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.url, "https://example.com/other");
        assert!(!updated.wants(EventKind::ImportCompleted));

        store.delete("alice", subscription.id).await.unwrap();
        assert!(store.list_for("alice").await.unwrap().is_empty());
    }

    // ============================================================
    // INBOUND STORE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_current_endpoint_is_stable_per_owner() {
        let store = MemoryInboundStore::new();

        let first = store.current_endpoint("alice").await.unwrap();
        let again = store.current_endpoint("alice").await.unwrap();
        let bobs = store.current_endpoint("bob").await.unwrap();

        assert_eq!(first.token, again.token);
        assert_ne!(first.token, bobs.token);
        assert_eq!(first.topic(), first.token.to_string());
    }

    #[tokio::test]
    async fn test_recent_requests_newest_first_and_limited() {
        let store = MemoryInboundStore::new();
        let endpoint = store.current_endpoint("alice").await.unwrap();
        for i in 0..5 {
            store
                .record_request(&endpoint.token, captured("POST", &format!("body {}", i)))
                .await
                .unwrap();
        }

        let recent = store.recent_requests(&endpoint.token, 3).await.unwrap();

        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].body, "body 4");
        assert_eq!(recent[2].body, "body 2");
    }

    #[tokio::test]
    async fn test_record_request_unknown_token() {
        let store = MemoryInboundStore::new();
        let token = uuid::Uuid::new_v4();

        let result = store.record_request(&token, captured("GET", "")).await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert!(store.recent_requests(&token, 10).await.unwrap().is_empty());
    }
}
