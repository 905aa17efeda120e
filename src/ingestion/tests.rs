//! Ingestion Module Tests
//!
//! ## Test Scopes
//! - **Deduplication**: Last row wins per SKU, within and across batches.
//! - **Row Filtering**: Blank SKUs, optional description, short rows.
//! - **Progress**: Monotonic snapshots, 100% exactly once, unknown sizes.
//! - **Failures**: Missing columns, undecodable input, storage errors mid-run.

#[cfg(test)]
mod tests {
    use crate::events::types::EventKind;
    use crate::ingestion::pipeline::{percent_of, IngestPipeline};
    use crate::ingestion::types::IngestSettings;
    use crate::operations::testing::{record_by_sku, FlakyRecordStore, Harness};
    use crate::operations::types::{
        OperationKind, OperationStatus, PipelineError, ProgressSnapshot, ProgressStatus,
    };
    use crate::storage::{OperationLedger, RecordStore};
    use std::io::Cursor;

    fn csv_input(text: &str) -> (Cursor<Vec<u8>>, Option<u64>) {
        let bytes = text.as_bytes().to_vec();
        let len = bytes.len() as u64;
        (Cursor::new(bytes), Some(len))
    }

    fn pipeline(harness: &Harness, settings: IngestSettings) -> IngestPipeline {
        IngestPipeline::new(harness.records.clone(), harness.notifier.clone(), settings)
    }

    fn assert_monotonic(snapshots: &[ProgressSnapshot]) {
        let processing: Vec<u8> = snapshots
            .iter()
            .filter(|s| s.status == ProgressStatus::Processing)
            .map(|s| s.progress)
            .collect();
        assert!(
            processing.windows(2).all(|pair| pair[0] <= pair[1]),
            "progress went backwards: {:?}",
            processing
        );
        assert!(processing.iter().all(|p| *p < 100));
    }

    // ============================================================
    // TEST 1: Deduplication and normalization
    // ============================================================

    #[tokio::test]
    async fn test_duplicate_skus_last_row_wins() {
        // ARRANGE
        let harness = Harness::new();
        let run = harness.begin("alice", OperationKind::Import).await;
        let (input, total) = csv_input("sku,name\nA1,Widget\na1,Widget v2\nB2,Gadget\n");

        // ACT
        let summary = pipeline(&harness, IngestSettings::default())
            .run(&run, input, total)
            .await
            .unwrap();

        // ASSERT: Two records, normalized SKUs, last occurrence kept
        assert_eq!(summary.rows_processed, 3);
        assert_eq!(harness.records.count_owned("alice").await.unwrap(), 2);
        let a1 = record_by_sku(harness.records.as_ref(), "alice", "a1").await.unwrap();
        assert_eq!(a1.name, "Widget v2");
        assert!(a1.is_active);
        let b2 = record_by_sku(harness.records.as_ref(), "alice", "b2").await.unwrap();
        assert_eq!(b2.name, "Gadget");

        let last = harness.snapshots(&run).pop().unwrap();
        assert_eq!(last, ProgressSnapshot::complete("Import complete!"));
        let operation = harness.ledger.get(&run.operation_id).await.unwrap();
        assert_eq!(operation.status, OperationStatus::Completed);
    }

    #[tokio::test]
    async fn test_duplicates_across_batch_boundaries() {
        // ARRANGE: Tiny batches so duplicates land in different flushes
        let harness = Harness::new();
        let run = harness.begin("alice", OperationKind::Import).await;
        let settings = IngestSettings {
            batch_size: 2,
            progress_every: 2,
        };
        let (input, total) = csv_input(
            "sku,name,description\n\
             x,First X,one\n\
             y,First Y,two\n\
             z,Only Z,three\n\
             X,Second X,four\n\
             w,Only W,five\n\
             y,Second Y,six\n\
             x,Third X,seven\n",
        );

        // ACT
        let summary = pipeline(&harness, settings).run(&run, input, total).await.unwrap();

        // ASSERT
        assert_eq!(summary.rows_processed, 7);
        assert!(summary.batches_flushed >= 3);
        assert_eq!(harness.records.count_owned("alice").await.unwrap(), 4);
        let x = record_by_sku(harness.records.as_ref(), "alice", "x").await.unwrap();
        assert_eq!((x.name.as_str(), x.description.as_str()), ("Third X", "seven"));
        let y = record_by_sku(harness.records.as_ref(), "alice", "y").await.unwrap();
        assert_eq!(y.name, "Second Y");
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let harness = Harness::new();
        let text = "sku,name,description\nk1,Kettle,Steel\nk2,Knife,Sharp\nk1,Kettle XL,Bigger\n";

        let first = harness.begin("alice", OperationKind::Import).await;
        let (input, total) = csv_input(text);
        pipeline(&harness, IngestSettings::default())
            .run(&first, input, total)
            .await
            .unwrap();
        let after_first = record_by_sku(harness.records.as_ref(), "alice", "k1").await.unwrap();

        // The first operation is terminal, so a second is admitted
        let second = harness.begin("alice", OperationKind::Import).await;
        let (input, total) = csv_input(text);
        pipeline(&harness, IngestSettings::default())
            .run(&second, input, total)
            .await
            .unwrap();

        assert_eq!(harness.records.count_owned("alice").await.unwrap(), 2);
        let after_second = record_by_sku(harness.records.as_ref(), "alice", "k1").await.unwrap();
        assert_eq!(after_first.id, after_second.id);
        assert_eq!(after_first.name, after_second.name);
        assert_eq!(after_first.description, after_second.description);
    }

    // ============================================================
    // TEST 2: Row filtering
    // ============================================================

    #[tokio::test]
    async fn test_blank_skus_are_skipped() {
        let harness = Harness::new();
        let run = harness.begin("alice", OperationKind::Import).await;
        let (input, total) = csv_input("sku,name\n,Nothing\n   ,Spaces\n ok ,Kept\n");

        let summary = pipeline(&harness, IngestSettings::default())
            .run(&run, input, total)
            .await
            .unwrap();

        assert_eq!(summary.rows_processed, 1);
        assert_eq!(harness.records.count_owned("alice").await.unwrap(), 1);
        assert!(record_by_sku(harness.records.as_ref(), "alice", "ok").await.is_some());
    }

    #[tokio::test]
    async fn test_columns_in_any_order_and_short_rows() {
        let harness = Harness::new();
        let run = harness.begin("alice", OperationKind::Import).await;
        let (input, total) = csv_input("name,extra,sku,description\nLamp,ignored,L1,Bright\nDesk,x,D1\n");

        pipeline(&harness, IngestSettings::default())
            .run(&run, input, total)
            .await
            .unwrap();

        let lamp = record_by_sku(harness.records.as_ref(), "alice", "l1").await.unwrap();
        assert_eq!(lamp.description, "Bright");
        let desk = record_by_sku(harness.records.as_ref(), "alice", "d1").await.unwrap();
        assert_eq!(desk.description, "");
    }

    #[tokio::test]
    async fn test_empty_file_completes_with_zero_rows() {
        let harness = Harness::new();
        let run = harness.begin("alice", OperationKind::Import).await;
        let (input, total) = csv_input("");

        let summary = pipeline(&harness, IngestSettings::default())
            .run(&run, input, total)
            .await
            .unwrap();

        assert_eq!(summary.rows_processed, 0);
        assert_eq!(summary.batches_flushed, 0);
        let operation = harness.ledger.get(&run.operation_id).await.unwrap();
        assert_eq!(operation.status, OperationStatus::Completed);

        // Completion event still carries the row count
        let events = harness.notifier.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, EventKind::ImportCompleted);
        assert_eq!(events[0].2["rows_processed"], 0);
    }

    // ============================================================
    // TEST 3: Progress reporting
    // ============================================================

    #[tokio::test]
    async fn test_progress_is_monotonic_and_completes_once() {
        // ARRANGE
        let harness = Harness::new();
        let run = harness.begin("alice", OperationKind::Import).await;
        let mut text = String::from("sku,name\n");
        for i in 0..50 {
            text.push_str(&format!("sku-{},Item {}\n", i, i));
        }
        let (input, total) = csv_input(&text);
        let settings = IngestSettings {
            batch_size: 7,
            progress_every: 5,
        };

        // ACT
        pipeline(&harness, settings).run(&run, input, total).await.unwrap();

        // ASSERT
        let snapshots = harness.snapshots(&run);
        assert_eq!(snapshots[0], ProgressSnapshot::processing(0, "Starting import..."));
        assert_eq!(snapshots.len(), 1 + 10 + 1);
        assert_monotonic(&snapshots);
        assert_eq!(snapshots.iter().filter(|s| s.progress == 100).count(), 1);
        assert_eq!(snapshots.last().unwrap().status, ProgressStatus::Complete);
        assert_eq!(snapshots[10].message, "Processed 50 records...");
        assert!(snapshots[10].progress >= 90);
    }

    #[tokio::test]
    async fn test_unknown_size_reports_zero_until_complete() {
        let harness = Harness::new();
        let run = harness.begin("alice", OperationKind::Import).await;
        let (input, _) = csv_input("sku,name\na,A\nb,B\nc,C\nd,D\n");
        let settings = IngestSettings {
            batch_size: 100,
            progress_every: 2,
        };

        pipeline(&harness, settings).run(&run, input, None).await.unwrap();

        let snapshots = harness.snapshots(&run);
        assert!(snapshots
            .iter()
            .filter(|s| s.status == ProgressStatus::Processing)
            .all(|s| s.progress == 0));
        assert_eq!(snapshots.last().unwrap().progress, 100);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(50, Some(200)), 25);
        assert_eq!(percent_of(199, Some(200)), 99);
        // Reserved for the terminal snapshot
        assert_eq!(percent_of(200, Some(200)), 99);
        assert_eq!(percent_of(10, Some(0)), 0);
        assert_eq!(percent_of(10, None), 0);
    }

    // ============================================================
    // TEST 4: Failures
    // ============================================================

    #[tokio::test]
    async fn test_missing_required_column_fails_operation() {
        // ARRANGE
        let harness = Harness::new();
        let run = harness.begin("alice", OperationKind::Import).await;
        let (input, total) = csv_input("sku,title\na,A\n");

        // ACT
        let result = pipeline(&harness, IngestSettings::default())
            .run(&run, input, total)
            .await;

        // ASSERT
        assert!(matches!(result, Err(PipelineError::MissingColumn("name"))));
        let last = harness.snapshots(&run).pop().unwrap();
        assert_eq!(last, ProgressSnapshot::failed("Missing required column: name"));
        let operation = harness.ledger.get(&run.operation_id).await.unwrap();
        assert_eq!(operation.status, OperationStatus::Failed);
        assert!(harness.notifier.events().is_empty());
    }

    #[tokio::test]
    async fn test_header_names_are_case_sensitive() {
        let harness = Harness::new();
        let run = harness.begin("alice", OperationKind::Import).await;
        let (input, total) = csv_input("SKU,Name\na,A\n");

        let result = pipeline(&harness, IngestSettings::default())
            .run(&run, input, total)
            .await;

        assert!(matches!(result, Err(PipelineError::MissingColumn("sku"))));
    }

    #[tokio::test]
    async fn test_undecodable_input_fails_operation() {
        let harness = Harness::new();
        let run = harness.begin("alice", OperationKind::Import).await;
        let mut bytes = b"sku,name\nok,Fine\n".to_vec();
        bytes.extend_from_slice(&[b'b', b',', 0xff, 0xfe, b'\n']);
        let total = Some(bytes.len() as u64);

        let result = pipeline(&harness, IngestSettings::default())
            .run(&run, Cursor::new(bytes), total)
            .await;

        assert!(matches!(result, Err(PipelineError::Csv(_))));
        let last = harness.snapshots(&run).pop().unwrap();
        assert_eq!(last.status, ProgressStatus::Failed);
        assert_eq!(last.progress, 0);
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_flushed_batches() {
        // ARRANGE: The second bulk upsert fails
        let harness = Harness::new();
        let run = harness.begin("alice", OperationKind::Import).await;
        let flaky = FlakyRecordStore::new(harness.records.clone(), 1);
        let pipeline = IngestPipeline::new(
            flaky,
            harness.notifier.clone(),
            IngestSettings {
                batch_size: 2,
                progress_every: 1000,
            },
        );
        let (input, total) = csv_input("sku,name\na,A\nb,B\nc,C\nd,D\n");

        // ACT
        let result = pipeline.run(&run, input, total).await;

        // ASSERT: Failure surfaced, first batch still committed
        assert!(matches!(result, Err(PipelineError::Store(_))));
        assert_eq!(harness.records.count_owned("alice").await.unwrap(), 2);
        let last = harness.snapshots(&run).pop().unwrap();
        assert_eq!(last, ProgressSnapshot::failed("database unavailable"));
        let operation = harness.ledger.get(&run.operation_id).await.unwrap();
        assert_eq!(operation.status, OperationStatus::Failed);
    }

    #[tokio::test]
    async fn test_complete_write_failure_fails_operation_and_releases_admission() {
        // ARRANGE: The progress cache refuses the terminal `complete` snapshot
        let harness = Harness::new();
        harness.progress.reject(ProgressStatus::Complete);
        let run = harness.begin("alice", OperationKind::Import).await;
        let (input, total) = csv_input("sku,name\na,A\n");

        // ACT
        let result = pipeline(&harness, IngestSettings::default())
            .run(&run, input, total)
            .await;

        // ASSERT: Failed everywhere, nothing announced, owner can submit again
        assert!(matches!(result, Err(PipelineError::Store(_))));
        let operation = harness.ledger.get(&run.operation_id).await.unwrap();
        assert_eq!(operation.status, OperationStatus::Failed);
        let last = harness.snapshots(&run).pop().unwrap();
        assert_eq!(last, ProgressSnapshot::failed("progress cache unavailable"));
        assert!(harness.notifier.events().is_empty());
        assert!(harness.ledger.active_for("alice").await.unwrap().is_none());
        let next = harness.begin("alice", OperationKind::Import).await;
        assert_ne!(next.operation_id, run.operation_id);
    }

    #[tokio::test]
    async fn test_failure_recording_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let harness = Harness::new();
        let run = harness.begin("alice", OperationKind::Import).await;
        let error = PipelineError::MissingColumn("sku");

        let recording = run.fail(&error);
        assert_send(&recording);
        recording.await;

        let operation = harness.ledger.get(&run.operation_id).await.unwrap();
        assert_eq!(operation.status, OperationStatus::Failed);
    }
}
