//! Batch job lifecycle tests
//!
//! Drive `BatchJobManager` end to end against a scripted provider and a
//! file-backed registry.

use crate::assert_batch_err;
use crate::common::fakes::{FailingUpdates, completed, remote, success_line};
use crate::common::{FakeProvider, Harness, MemoryItems, PROCESSOR};
use bytes::Bytes;
use litellm_batch::core::batch::{
    ArtifactKind, BatchJobManager, BatchStatus, CodecLimits, DecodeFailureKey, ItemRef, JobScope,
    ModelConfig, RequestCodec,
};
use litellm_batch::core::providers::{ProviderError, RemoteStatus};
use litellm_batch::storage::{ArtifactCache, InMemoryJobRegistry, JobFilter, JobRegistry};
use std::sync::Arc;
use tempfile::TempDir;
use litellm_batch::utils::error::BatchError;
use tokio_test::assert_ok;

fn widgets(number: u64) -> ItemRef {
    ItemRef::new("acme", "widgets", number)
}

// ==================== create ====================

#[tokio::test]
async fn test_create_persists_pending_job_with_item_count() {
    let harness = Harness::with_items("acme", "widgets", 3).await;
    harness.items.add(ItemRef::new("acme", "gadgets", 1));

    let job = harness.submit().await;

    assert_eq!(job.status, BatchStatus::Pending);
    assert_eq!(job.item_count, 3);
    assert_eq!(job.processor_type, PROCESSOR);
    assert_eq!(job.provider, "fake");
    assert_eq!(job.provider_batch_id.as_deref(), Some("batch_remote_1"));
    assert!(job.input_checksum.is_some());
    assert_eq!(harness.stored(&job.job_id).await, Some(job.clone()));
    assert!(harness.artifacts.job_dir(&job.job_id).exists());

    let submitted = harness.provider.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].job_id, job.job_id);
    assert_eq!(submitted[0].item_count, 3);
    let body = String::from_utf8(submitted[0].content.to_vec()).unwrap();
    assert_eq!(body.lines().count(), 3);
    assert!(body.contains("\"custom_id\":\"acme~widgets~1\""));
}

#[tokio::test]
async fn test_each_create_gets_its_own_job() {
    let harness = Harness::with_items("acme", "widgets", 2).await;

    let first = harness.submit().await;
    let second = harness.submit().await;

    assert_ne!(first.job_id, second.job_id);
    let jobs = assert_ok!(harness.manager.list_jobs(&JobFilter::new()).await);
    assert_eq!(jobs.len(), 2);
}

#[tokio::test]
async fn test_create_with_no_matching_items_is_empty_selection() {
    let harness = Harness::with_items("acme", "widgets", 2).await;

    let result = harness
        .manager
        .create_batch_job(
            PROCESSOR,
            &JobScope::repository("acme", "gizmos"),
            &ModelConfig::new("gpt-4o-mini"),
        )
        .await;

    assert_batch_err!(result, BatchError::EmptySelection { .. });
    assert_eq!(FakeProvider::count(&harness.provider.calls.submit), 0);
}

#[tokio::test]
async fn test_oversized_batch_fails_before_submission() {
    let limits = CodecLimits {
        max_items: 2,
        ..CodecLimits::default()
    };
    let harness = Harness::with_limits(MemoryItems::with_items("acme", "widgets", 3), limits).await;

    let result = harness
        .manager
        .create_batch_job(
            PROCESSOR,
            &JobScope::repository("acme", "widgets"),
            &ModelConfig::new("gpt-4o-mini"),
        )
        .await;

    assert_batch_err!(result, BatchError::PayloadTooLarge(_));
    assert_eq!(FakeProvider::count(&harness.provider.calls.submit), 0);
    assert!(assert_ok!(harness.manager.list_jobs(&JobFilter::new()).await).is_empty());
}

#[tokio::test]
async fn test_submit_failure_leaves_no_record() {
    let harness = Harness::with_items("acme", "widgets", 3).await;
    harness.provider.fail_submit(ProviderError::api_error(
        "fake",
        400,
        "The input file is invalid",
    ));

    let result = harness
        .manager
        .create_batch_job(
            PROCESSOR,
            &JobScope::repository("acme", "widgets"),
            &ModelConfig::new("gpt-4o-mini"),
        )
        .await;

    match result {
        Err(BatchError::Permanent { job_id, message, .. }) => {
            assert!(job_id.starts_with("batch_"));
            assert_eq!(message, "The input file is invalid");
            assert_eq!(harness.stored(&job_id).await, None);
            assert!(!harness.artifacts.job_dir(&job_id).exists());
        }
        other => panic!("expected Permanent, got {:?}", other),
    }
    assert!(assert_ok!(harness.manager.list_jobs(&JobFilter::new()).await).is_empty());
}

#[tokio::test]
async fn test_record_update_failure_after_submit_leaves_orphan() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(FailingUpdates::new(InMemoryJobRegistry::new()));
    let provider = Arc::new(FakeProvider::new());
    let items = Arc::new(MemoryItems::with_items("acme", "widgets", 2));
    let manager = BatchJobManager::new(
        registry.clone(),
        provider.clone(),
        items.clone(),
        items,
        ArtifactCache::new(dir.path().join("artifacts")).await.unwrap(),
        RequestCodec::new(CodecLimits::default()),
    );

    registry.fail_next_update();
    let result = manager
        .create_batch_job(
            PROCESSOR,
            &JobScope::repository("acme", "widgets"),
            &ModelConfig::new("gpt-4o-mini"),
        )
        .await;
    assert_batch_err!(result, BatchError::Registry(_));
    assert_eq!(FakeProvider::count(&provider.calls.submit), 1);

    let orphans = assert_ok!(manager.list_jobs(&JobFilter::new().orphaned()).await);
    assert_eq!(orphans.len(), 1);
    let orphan = &orphans[0];
    assert_eq!(orphan.status, BatchStatus::Pending);
    assert_eq!(orphan.provider_batch_id, None);

    assert_batch_err!(
        manager.check_job_status(&orphan.job_id).await,
        BatchError::InvalidState { .. }
    );
    assert_batch_err!(
        manager.collect_results(&orphan.job_id).await,
        BatchError::InvalidState { .. }
    );
    assert_eq!(FakeProvider::count(&provider.calls.get_status), 0);
    assert_eq!(FakeProvider::count(&provider.calls.fetch_artifact), 0);

    // An orphan has no remote batch to cancel; it is closed locally
    let cancelled = assert_ok!(manager.cancel_job(&orphan.job_id).await);
    assert_eq!(cancelled.status, BatchStatus::Cancelled);
    assert_eq!(FakeProvider::count(&provider.calls.cancel), 0);
    let stored = assert_ok!(registry.require(&orphan.job_id).await);
    assert_eq!(stored.status, BatchStatus::Cancelled);
    assert!(assert_ok!(manager.list_jobs(&JobFilter::new().orphaned()).await).is_empty());
}

// ==================== status ====================

#[tokio::test]
async fn test_counters_advance_but_never_regress() {
    let harness = Harness::with_items("acme", "widgets", 3).await;
    let job = harness.submit().await;
    assert_eq!(job.status, BatchStatus::Pending);
    let remote_id = job.provider_batch_id.clone().unwrap();

    harness
        .provider
        .push_status(remote(&remote_id, RemoteStatus::InProgress, 2, 0));
    let job = assert_ok!(harness.manager.check_job_status(&job.job_id).await);
    assert_eq!(job.status, BatchStatus::InProgress);
    assert_eq!(job.completed_count, 2);
    assert!(job.last_polled_at.is_some());

    harness
        .provider
        .push_status(remote(&remote_id, RemoteStatus::InProgress, 1, 0));
    let job = assert_ok!(harness.manager.check_job_status(&job.job_id).await);
    assert_eq!(job.completed_count, 2);
    assert_eq!(harness.stored(&job.job_id).await.unwrap().completed_count, 2);
}

#[tokio::test]
async fn test_backward_status_is_ignored() {
    let harness = Harness::with_items("acme", "widgets", 1).await;
    let job = harness.submit().await;
    let remote_id = job.provider_batch_id.clone().unwrap();

    harness
        .provider
        .push_status(remote(&remote_id, RemoteStatus::Finalizing, 1, 0));
    harness
        .provider
        .push_status(remote(&remote_id, RemoteStatus::Validating, 1, 0));

    assert_ok!(harness.manager.check_job_status(&job.job_id).await);
    let job = assert_ok!(harness.manager.check_job_status(&job.job_id).await);
    assert_eq!(job.status, BatchStatus::Finalizing);
}

#[tokio::test]
async fn test_unknown_remote_status_keeps_local_status() {
    let harness = Harness::with_items("acme", "widgets", 1).await;
    let job = harness.submit().await;
    let remote_id = job.provider_batch_id.clone().unwrap();

    harness.provider.push_status(remote(
        &remote_id,
        RemoteStatus::Unknown("paused".to_string()),
        0,
        0,
    ));
    let job = assert_ok!(harness.manager.check_job_status(&job.job_id).await);
    assert_eq!(job.status, BatchStatus::Pending);
}

#[tokio::test]
async fn test_terminal_status_is_idempotent_without_remote_calls() {
    let harness = Harness::with_items("acme", "widgets", 3).await;
    let job = harness.submit().await;
    let remote_id = job.provider_batch_id.clone().unwrap();
    harness
        .provider
        .push_status(completed(&remote_id, 3, "file-output-1"));

    let first = assert_ok!(harness.manager.check_job_status(&job.job_id).await);
    assert_eq!(first.status, BatchStatus::Completed);
    assert_eq!(first.output_artifact_ref.as_deref(), Some("file-output-1"));
    let polls = FakeProvider::count(&harness.provider.calls.get_status);

    let second = assert_ok!(harness.manager.check_job_status(&job.job_id).await);
    let third = assert_ok!(harness.manager.check_job_status(&job.job_id).await);

    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    assert_eq!(second, third);
    assert_eq!(FakeProvider::count(&harness.provider.calls.get_status), polls);
}

#[tokio::test]
async fn test_failed_status_check_leaves_record_untouched() {
    let harness = Harness::with_items("acme", "widgets", 1).await;
    let job = harness.submit().await;
    harness
        .provider
        .push_status_error(ProviderError::network("fake", "connection reset"));

    let result = harness.manager.check_job_status(&job.job_id).await;

    match result {
        Err(err) => {
            assert!(err.is_transient());
            assert!(err.to_string().contains(&job.job_id));
            assert!(err.to_string().contains("connection reset"));
        }
        Ok(job) => panic!("expected a transient error, got {:?}", job),
    }
    assert_eq!(harness.stored(&job.job_id).await, Some(job));
}

#[tokio::test]
async fn test_remote_batch_errors_are_kept_verbatim() {
    let harness = Harness::with_items("acme", "widgets", 1).await;
    let job = harness.submit().await;
    let remote_id = job.provider_batch_id.clone().unwrap();
    let mut failed = remote(&remote_id, RemoteStatus::Failed, 0, 0);
    failed.errors = vec!["invalid_json_line: Line is not valid JSON (line 1)".to_string()];
    harness.provider.push_status(failed);

    let job = assert_ok!(harness.manager.check_job_status(&job.job_id).await);

    assert_eq!(job.status, BatchStatus::Failed);
    assert_eq!(
        job.remote_errors,
        vec!["invalid_json_line: Line is not valid JSON (line 1)".to_string()]
    );
}

#[tokio::test]
async fn test_status_of_unknown_job_is_not_found() {
    let harness = Harness::with_items("acme", "widgets", 1).await;
    assert_batch_err!(
        harness.manager.check_job_status("batch_missing").await,
        BatchError::NotFound(_)
    );
}

// ==================== collect ====================

#[tokio::test]
async fn test_collect_dispatches_every_result_once() {
    let harness = Harness::with_items("acme", "widgets", 3).await;
    let job = harness.submit().await;
    let remote_id = job.provider_batch_id.clone().unwrap();
    harness
        .provider
        .push_status(completed(&remote_id, 3, "file-output-1"));
    assert_ok!(harness.manager.check_job_status(&job.job_id).await);

    let content = (1..=3)
        .map(|n| success_line(&widgets(n), &format!("label-{}", n)))
        .collect::<Vec<_>>()
        .join("\n");
    // Split mid-line to exercise chunk reassembly
    let (head, tail) = content.split_at(content.len() / 2);
    harness.provider.put_artifact(
        "file-output-1",
        vec![Bytes::from(head.to_string()), Bytes::from(tail.to_string())],
    );

    let report = assert_ok!(harness.manager.collect_results(&job.job_id).await);
    assert_eq!(report.dispatched, vec![widgets(1), widgets(2), widgets(3)]);
    assert!(report.decode_failures.is_empty());
    assert_ok!(report.ensure_complete());
    assert_eq!(
        harness.items.result(PROCESSOR, &widgets(2)).unwrap()["choices"][0]["message"]["content"],
        "label-2"
    );

    let stored = harness.stored(&job.job_id).await.unwrap();
    assert!(stored.collected);
    assert_eq!(stored.collection, Some(report.clone()));

    let fetches = FakeProvider::count(&harness.provider.calls.fetch_artifact);
    let again = assert_ok!(harness.manager.collect_results(&job.job_id).await);
    assert_eq!(again, report);
    assert_eq!(
        FakeProvider::count(&harness.provider.calls.fetch_artifact),
        fetches
    );
    assert_eq!(
        harness.items.stores.load(std::sync::atomic::Ordering::SeqCst),
        3
    );
}

#[tokio::test]
async fn test_malformed_line_among_hundred_is_reported() {
    let harness = Harness::with_items("acme", "widgets", 100).await;
    let job = harness.submit().await;
    let remote_id = job.provider_batch_id.clone().unwrap();
    harness
        .provider
        .push_status(completed(&remote_id, 100, "file-output-1"));
    assert_ok!(harness.manager.check_job_status(&job.job_id).await);

    let mut lines: Vec<String> = (1..=100)
        .map(|n| success_line(&widgets(n), "ok"))
        .collect();
    lines.insert(50, "{\"custom_id\": \"acme~widgets~".to_string());
    harness
        .provider
        .put_artifact("file-output-1", vec![Bytes::from(lines.join("\n") + "\n")]);

    let report = assert_ok!(harness.manager.collect_results(&job.job_id).await);

    assert_eq!(report.dispatched.len(), 100);
    assert_eq!(harness.items.result_count(), 100);
    assert_eq!(report.decode_failures.len(), 1);
    assert_eq!(report.decode_failures[0].key, DecodeFailureKey::LineIndex(50));
    assert_eq!(report.decode_failures[0].artifact, ArtifactKind::Output);
    assert_batch_err!(
        report.ensure_complete(),
        BatchError::PartialDecodeFailure { count: 1, .. }
    );
}

#[tokio::test]
async fn test_collect_failed_job_from_error_artifact() {
    let harness = Harness::with_items("acme", "widgets", 2).await;
    let job = harness.submit().await;
    let remote_id = job.provider_batch_id.clone().unwrap();
    let mut failed = remote(&remote_id, RemoteStatus::Failed, 0, 2);
    failed.error_file_id = Some("file-errors-1".to_string());
    harness.provider.push_status(failed);
    assert_ok!(harness.manager.check_job_status(&job.job_id).await);

    let error_lines = (1..=2)
        .map(|n| {
            serde_json::json!({
                "custom_id": format!("acme~widgets~{}", n),
                "response": {
                    "status_code": 400,
                    "body": {"error": {"code": "invalid_request_error", "message": "bad prompt"}}
                },
                "error": null
            })
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\r\n");
    harness
        .provider
        .put_artifact("file-errors-1", vec![Bytes::from(error_lines)]);

    let report = assert_ok!(harness.manager.collect_results(&job.job_id).await);

    assert!(report.dispatched.is_empty());
    assert_eq!(report.item_errors.len(), 2);
    assert_eq!(report.item_errors[0].code, "invalid_request_error");
    assert_eq!(report.item_errors[0].status_code, Some(400));
    assert_eq!(harness.items.result_count(), 0);
}

#[tokio::test]
async fn test_collect_requires_finished_job() {
    let harness = Harness::with_items("acme", "widgets", 1).await;
    let job = harness.submit().await;

    assert_batch_err!(
        harness.manager.collect_results(&job.job_id).await,
        BatchError::InvalidState {
            status: BatchStatus::Pending,
            ..
        }
    );
    assert_eq!(FakeProvider::count(&harness.provider.calls.fetch_artifact), 0);
}

#[tokio::test]
async fn test_failed_fetch_leaves_job_uncollected() {
    let harness = Harness::with_items("acme", "widgets", 1).await;
    let job = harness.submit().await;
    let remote_id = job.provider_batch_id.clone().unwrap();
    harness
        .provider
        .push_status(completed(&remote_id, 1, "file-output-missing"));
    assert_ok!(harness.manager.check_job_status(&job.job_id).await);

    assert_batch_err!(
        harness.manager.collect_results(&job.job_id).await,
        BatchError::Permanent { .. }
    );
    assert!(!harness.stored(&job.job_id).await.unwrap().collected);

    harness.provider.put_artifact(
        "file-output-missing",
        vec![Bytes::from(success_line(&widgets(1), "ok"))],
    );
    let report = assert_ok!(harness.manager.collect_results(&job.job_id).await);
    assert_eq!(report.dispatched, vec![widgets(1)]);
}

// ==================== cancel ====================

#[tokio::test]
async fn test_cancel_live_job() {
    let harness = Harness::with_items("acme", "widgets", 2).await;
    let job = harness.submit().await;

    let job = assert_ok!(harness.manager.cancel_job(&job.job_id).await);

    assert_eq!(job.status, BatchStatus::Cancelled);
    assert_eq!(FakeProvider::count(&harness.provider.calls.cancel), 1);
    assert_eq!(
        harness.stored(&job.job_id).await.unwrap().status,
        BatchStatus::Cancelled
    );
}

#[tokio::test]
async fn test_cancel_completed_job_is_invalid_state_without_remote_call() {
    let harness = Harness::with_items("acme", "widgets", 1).await;
    let job = harness.submit().await;
    let remote_id = job.provider_batch_id.clone().unwrap();
    harness
        .provider
        .push_status(completed(&remote_id, 1, "file-output-1"));
    assert_ok!(harness.manager.check_job_status(&job.job_id).await);

    assert_batch_err!(
        harness.manager.cancel_job(&job.job_id).await,
        BatchError::InvalidState {
            status: BatchStatus::Completed,
            ..
        }
    );
    assert_eq!(FakeProvider::count(&harness.provider.calls.cancel), 0);
}

#[tokio::test]
async fn test_cancel_race_adopts_remote_terminal_status() {
    let harness = Harness::with_items("acme", "widgets", 2).await;
    let job = harness.submit().await;
    let remote_id = job.provider_batch_id.clone().unwrap();
    harness.provider.set_cancel(Err(ProviderError::api_error(
        "fake",
        400,
        "Cannot cancel a batch with status 'completed'",
    )));
    harness
        .provider
        .push_status(completed(&remote_id, 2, "file-output-1"));

    let job = assert_ok!(harness.manager.cancel_job(&job.job_id).await);

    assert_eq!(job.status, BatchStatus::Completed);
    assert_eq!(job.completed_count, 2);
    assert_eq!(job.output_artifact_ref.as_deref(), Some("file-output-1"));
}

#[tokio::test]
async fn test_cancel_conflict_adopts_remote_terminal_status() {
    let harness = Harness::with_items("acme", "widgets", 2).await;
    let job = harness.submit().await;
    let remote_id = job.provider_batch_id.clone().unwrap();
    harness.provider.set_cancel(Err(ProviderError::api_error(
        "fake",
        409,
        "Cannot cancel a batch with status 'completed'",
    )));
    harness
        .provider
        .push_status(completed(&remote_id, 2, "file-output-1"));

    let job = assert_ok!(harness.manager.cancel_job(&job.job_id).await);

    assert_eq!(job.status, BatchStatus::Completed);
    assert_eq!(FakeProvider::count(&harness.provider.calls.cancel), 1);
    assert_eq!(FakeProvider::count(&harness.provider.calls.get_status), 1);
    let stored = harness.stored(&job.job_id).await.unwrap();
    assert_eq!(stored.status, BatchStatus::Completed);
}

#[tokio::test]
async fn test_cancel_rejected_for_live_batch_surfaces_remote_error() {
    let harness = Harness::with_items("acme", "widgets", 1).await;
    let job = harness.submit().await;
    let remote_id = job.provider_batch_id.clone().unwrap();
    harness.provider.set_cancel(Err(ProviderError::api_error(
        "fake",
        403,
        "Permission denied",
    )));
    harness
        .provider
        .push_status(remote(&remote_id, RemoteStatus::InProgress, 0, 0));

    match harness.manager.cancel_job(&job.job_id).await {
        Err(BatchError::Permanent {
            job_id,
            status,
            message,
            ..
        }) => {
            assert_eq!(job_id, job.job_id);
            assert_eq!(status, Some(403));
            assert_eq!(message, "Permission denied");
        }
        other => panic!("expected Permanent, got {:?}", other),
    }
    assert_eq!(
        harness.stored(&job.job_id).await.unwrap().status,
        BatchStatus::Pending
    );
}

// ==================== remove ====================

#[tokio::test]
async fn test_remove_live_job_requires_confirmation() {
    let harness = Harness::with_items("acme", "widgets", 1).await;
    let job = harness.submit().await;

    assert_batch_err!(
        harness.manager.remove_job(&job.job_id, false).await,
        BatchError::RequiresConfirmation {
            status: BatchStatus::Pending,
            ..
        }
    );
    assert!(harness.stored(&job.job_id).await.is_some());

    let removed = assert_ok!(harness.manager.remove_job(&job.job_id, true).await);
    assert_eq!(removed.job_id, job.job_id);
    assert_eq!(harness.stored(&job.job_id).await, None);
    assert!(!harness.artifacts.job_dir(&job.job_id).exists());
    assert_batch_err!(
        harness.manager.check_job_status(&job.job_id).await,
        BatchError::NotFound(_)
    );
}

#[tokio::test]
async fn test_remove_terminal_job_needs_no_force() {
    let harness = Harness::with_items("acme", "widgets", 1).await;
    let job = harness.submit().await;
    assert_ok!(harness.manager.cancel_job(&job.job_id).await);

    assert_ok!(harness.manager.remove_job(&job.job_id, false).await);
    assert_batch_err!(
        harness.manager.remove_job(&job.job_id, false).await,
        BatchError::NotFound(_)
    );
}

// ==================== list ====================

#[tokio::test]
async fn test_list_filters_by_status_and_scope_without_remote_calls() {
    let items = MemoryItems::with_items("acme", "widgets", 1);
    items.add(ItemRef::new("acme", "gadgets", 1));
    let harness = Harness::new(items).await;

    let widgets_job = harness.submit().await;
    let gadgets_job = harness
        .manager
        .create_batch_job(
            PROCESSOR,
            &JobScope::repository("acme", "gadgets"),
            &ModelConfig::new("gpt-4o-mini"),
        )
        .await
        .unwrap();
    assert_ok!(harness.manager.cancel_job(&gadgets_job.job_id).await);
    let polls = FakeProvider::count(&harness.provider.calls.get_status);

    let cancelled = assert_ok!(
        harness
            .manager
            .list_jobs(&JobFilter::new().with_status(BatchStatus::Cancelled))
            .await
    );
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].job_id, gadgets_job.job_id);

    let widgets = assert_ok!(
        harness
            .manager
            .list_jobs(&JobFilter::new().with_repository("widgets"))
            .await
    );
    assert_eq!(widgets.len(), 1);
    assert_eq!(widgets[0].job_id, widgets_job.job_id);

    let all = assert_ok!(
        harness
            .manager
            .list_jobs(&JobFilter::new().with_organization("acme"))
            .await
    );
    assert_eq!(all.len(), 2);
    assert_eq!(FakeProvider::count(&harness.provider.calls.get_status), polls);
}
