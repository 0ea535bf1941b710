//! Sync orchestrator behaviour against in-memory ports.

mod support;

use std::time::Duration;

use shelfsync_core::{
    CatalogScope, IntegrationRemoval, ProductStore, RotationPolicy, SyncSettings,
};
use shelfsync_domain::{
    ShelfSyncError, SyncRunStatus, SyncSummary, SyncType, TakealotApiResponse, TakealotSyncOptions,
};
use support::{fast_settings, integration, offers, HarnessBuilder, MockMarketplace, INTEGRATION, USER};

fn summary(imported: u64, updated: u64) -> SyncSummary {
    SyncSummary { imported, updated, skipped: 0 }
}

#[tokio::test]
async fn fifty_items_import_then_update() {
    let harness = HarnessBuilder::new(MockMarketplace::new(offers(1..=50))).build();
    let options = TakealotSyncOptions::manual(USER).with_limit(50);

    let first = harness.orchestrator.run_sync(options.clone()).await;
    assert_eq!(first, TakealotApiResponse::ok(summary(50, 0)));

    let second = harness.orchestrator.run_sync(options).await;
    assert_eq!(second, TakealotApiResponse::ok(summary(0, 50)));
    assert_eq!(harness.products.len(), 50);
}

#[tokio::test]
async fn cron_rerun_is_idempotent() {
    let harness = HarnessBuilder::new(MockMarketplace::new(offers(1..=35))).build();
    let options = TakealotSyncOptions::cron(USER, INTEGRATION);

    let first = harness.orchestrator.run_sync(options.clone()).await;
    let total = first.data.unwrap().total_written();
    assert_eq!(total, 35);

    let second = harness.orchestrator.run_sync(options).await;
    assert!(second.success);
    assert_eq!(second.data, Some(summary(0, total)));

    let runs = harness.runs.all();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.sync_type == SyncType::Cron));
    assert!(runs.iter().all(|r| r.status == SyncRunStatus::Succeeded));
}

#[tokio::test]
async fn counts_match_distinct_ids_when_upstream_repeats_offers() {
    let mut repeated = offers(1..=12);
    repeated.extend(offers([3, 4, 5]));
    repeated.extend(offers(13..=15));
    let harness = HarnessBuilder::new(MockMarketplace::new(repeated)).build();

    let response = harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;

    assert!(response.success);
    assert_eq!(response.data.unwrap().total_written(), 15);
    assert_eq!(harness.products.len(), 15);
}

#[tokio::test]
async fn limit_caps_processed_items() {
    let harness = HarnessBuilder::new(MockMarketplace::new(offers(1..=100))).build();

    let response =
        harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER).with_limit(25)).await;

    assert_eq!(response.data, Some(summary(25, 0)));
    // 25 items at page size 10 needs exactly three pages.
    assert_eq!(harness.marketplace.calls(), 3);
}

#[tokio::test]
async fn paginates_sequentially_without_total() {
    let harness =
        HarnessBuilder::new(MockMarketplace::new(offers(1..=45)).without_total()).build();

    let response = harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;

    assert_eq!(response.data, Some(summary(45, 0)));
    assert_eq!(harness.marketplace.calls(), 5);
}

#[tokio::test]
async fn exhausted_proxy_pool_reports_unavailable_and_keeps_progress() {
    let marketplace = MockMarketplace::new(offers(1..=30))
        .failing_page(2, ShelfSyncError::UpstreamUnavailable("connection reset".into()))
        .failing_page(3, ShelfSyncError::UpstreamUnavailable("connection reset".into()));
    let settings = SyncSettings { max_concurrent_pages: 1, ..fast_settings() };
    let harness = HarnessBuilder::new(marketplace).settings(settings).build();

    let response = harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;

    assert!(!response.success);
    assert_eq!(response.code.as_deref(), Some("UPSTREAM_UNAVAILABLE"));
    assert_eq!(response.data, Some(summary(10, 0)));
    assert_eq!(harness.pool.healthy_count(), 0);

    let scope = CatalogScope::new(USER, INTEGRATION);
    assert_eq!(harness.products.count_products(&scope).await.unwrap(), 10);
    assert!(harness.products.contains("1"));

    let record = &harness.runs.all()[0];
    assert_eq!(record.status, SyncRunStatus::Partial);
    assert_eq!(record.error_code.as_deref(), Some("UPSTREAM_UNAVAILABLE"));
}

#[tokio::test]
async fn page_failure_does_not_stop_other_pages() {
    let marketplace = MockMarketplace::new(offers(1..=30))
        .failing_page(2, ShelfSyncError::InvalidInput("bad page".into()));
    let harness = HarnessBuilder::new(marketplace).build();

    let response = harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;

    assert!(!response.success);
    assert_eq!(response.code.as_deref(), Some("INVALID_INPUT"));
    assert_eq!(response.data, Some(summary(20, 0)));
    // Non-transient errors do not penalise proxies.
    assert_eq!(harness.pool.healthy_count(), 2);
}

#[tokio::test]
async fn empty_pool_uses_direct_egress_only_when_allowed() {
    let denied = HarnessBuilder::new(MockMarketplace::new(offers(1..=5))).proxies(&[]).build();
    let response = denied.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;
    assert_eq!(response.code.as_deref(), Some("UPSTREAM_UNAVAILABLE"));
    assert!(response.error.unwrap().contains("proxy pool exhausted"));
    assert_eq!(denied.marketplace.calls(), 0);

    let allowed = HarnessBuilder::new(MockMarketplace::new(offers(1..=5)))
        .proxies(&[])
        .policy(RotationPolicy { max_attempts: 2, allow_direct: true })
        .build();
    let response = allowed.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;
    assert!(response.success);
    assert_eq!(allowed.marketplace.egresses(), vec!["direct"]);
}

#[tokio::test]
async fn concurrent_runs_for_same_integration_are_rejected() {
    let marketplace = MockMarketplace::new(offers(1..=20)).with_delay(Duration::from_millis(200));
    let harness = HarnessBuilder::new(marketplace).build();
    let options = TakealotSyncOptions::manual(USER);

    let (a, b) = tokio::join!(
        harness.orchestrator.run_sync(options.clone()),
        harness.orchestrator.run_sync(options.clone())
    );

    let responses = [a, b];
    let succeeded = responses.iter().filter(|r| r.success).count();
    let rejected: Vec<_> =
        responses.iter().filter(|r| r.code.as_deref() == Some("SYNC_IN_PROGRESS")).collect();
    assert_eq!(succeeded, 1);
    assert_eq!(rejected.len(), 1);
    assert!(rejected[0].error.as_deref().unwrap().contains("sync in progress"));

    assert!(!harness.orchestrator.is_running(USER, INTEGRATION));
    assert_eq!(harness.runs.all().len(), 1);
}

#[tokio::test]
async fn missing_user_is_unauthenticated() {
    let harness = HarnessBuilder::new(MockMarketplace::new(offers(1..=5))).build();

    let response = harness.orchestrator.run_sync(TakealotSyncOptions::default()).await;

    assert_eq!(response.code.as_deref(), Some("UNAUTHENTICATED"));
    assert!(harness.runs.all().is_empty());
}

#[tokio::test]
async fn missing_or_foreign_integration_is_unauthorized() {
    let harness = HarnessBuilder::new(MockMarketplace::new(offers(1..=5)))
        .integration(integration("int-2", "u2", "key-u2"))
        .build();

    let stranger = harness.orchestrator.run_sync(TakealotSyncOptions::manual("nobody")).await;
    assert_eq!(stranger.code.as_deref(), Some("UNAUTHORIZED"));

    let foreign = TakealotSyncOptions {
        integration_id: Some("int-2".into()),
        ..TakealotSyncOptions::manual(USER)
    };
    let response = harness.orchestrator.run_sync(foreign).await;
    assert_eq!(response.code.as_deref(), Some("UNAUTHORIZED"));
    assert_eq!(harness.marketplace.calls(), 0);
}

#[tokio::test]
async fn uses_the_integration_key() {
    let harness = HarnessBuilder::new(MockMarketplace::new(offers(1..=5))).build();

    harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;

    assert_eq!(harness.marketplace.keys_seen(), vec!["key-u1"]);
}

#[tokio::test]
async fn storage_failures_are_retried_then_skipped() {
    let harness = HarnessBuilder::new(MockMarketplace::new(offers(1..=10))).build();
    harness.products.fail_times("2", 2);
    harness.products.fail_always("7");

    let response = harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;

    assert!(!response.success);
    assert_eq!(response.code.as_deref(), Some("STORAGE_FAILURE"));
    assert_eq!(response.data, Some(SyncSummary { imported: 9, updated: 0, skipped: 1 }));
    assert!(harness.products.contains("2"));
    assert!(!harness.products.contains("7"));
    // 10 first attempts, 2 retries for "2", 2 retries for "7".
    assert_eq!(harness.products.upsert_calls(), 14);
}

#[tokio::test]
async fn deadline_returns_partial_aggregate() {
    let marketplace =
        MockMarketplace::new(offers(1..=20)).with_slow_page(2, Duration::from_secs(5));
    let settings = SyncSettings { run_deadline: Duration::from_millis(300), ..fast_settings() };
    let harness = HarnessBuilder::new(marketplace).settings(settings).build();

    let response = harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;

    assert!(!response.success);
    assert_eq!(response.code.as_deref(), Some("DEADLINE_EXCEEDED"));
    assert_eq!(response.data, Some(summary(10, 0)));
    assert!(!harness.orchestrator.is_running(USER, INTEGRATION));
}

#[tokio::test]
async fn deadline_counts_every_committed_write() {
    let settings = SyncSettings { run_deadline: Duration::from_millis(300), ..fast_settings() };
    let harness =
        HarnessBuilder::new(MockMarketplace::new(offers(1..=20))).settings(settings).build();
    harness.products.slow_writes(Duration::from_millis(45));

    let response = harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;

    assert_eq!(response.code.as_deref(), Some("DEADLINE_EXCEEDED"));
    let imported = response.data.expect("partial aggregate").imported;
    assert!(imported > 0 && imported < 20, "imported {imported}");
    assert_eq!(imported, harness.products.len() as u64);
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_storage_does_not_stall_page_fetches() {
    let marketplace =
        MockMarketplace::new(offers(1..=30)).with_slow_page(3, Duration::from_millis(200));
    let harness = HarnessBuilder::new(marketplace).build();
    harness.products.slow_writes(Duration::from_millis(60));

    let response = harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;

    assert_eq!(response, TakealotApiResponse::ok(summary(30, 0)));
    // Page 2 arrives at once and takes ~600ms to store; page 3 must be
    // observed while that is going on.
    let page_three = harness.marketplace.fetch_time(3).expect("page 3 fetched");
    assert!(page_three < Duration::from_millis(450), "page 3 took {page_three:?}");
}

#[tokio::test]
async fn panic_is_reported_and_lock_released() {
    let harness =
        HarnessBuilder::new(MockMarketplace::new(offers(1..=20)).panicking_page(2)).build();

    let response = harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;

    assert!(!response.success);
    assert_eq!(response.code.as_deref(), Some("INTERNAL_ERROR"));
    assert!(!harness.orchestrator.is_running(USER, INTEGRATION));
}

#[tokio::test]
async fn latest_runs_expose_last_outcome() {
    let harness = HarnessBuilder::new(MockMarketplace::new(offers(1..=3))).build();

    harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;
    harness.clock.advance_secs(60);
    harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;

    let latest = harness.orchestrator.latest_runs().await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].updated, 3);
    assert_eq!(latest[0].started_at, 1_700_000_060);
}

#[tokio::test]
async fn run_history_is_pruned_to_limit() {
    let settings = SyncSettings { run_history_limit: 2, ..fast_settings() };
    let harness =
        HarnessBuilder::new(MockMarketplace::new(offers(1..=3))).settings(settings).build();

    for _ in 0..4 {
        harness.orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await;
        harness.clock.advance_secs(60);
    }

    let runs = harness.runs.all();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].started_at, 1_700_000_120);
    assert_eq!(runs[1].started_at, 1_700_000_180);
}

#[tokio::test(flavor = "multi_thread")]
async fn removal_is_refused_while_sync_runs() {
    let marketplace =
        MockMarketplace::new(offers(1..=20)).with_slow_page(2, Duration::from_millis(500));
    let harness = HarnessBuilder::new(marketplace).build();

    let running = tokio::spawn({
        let orchestrator = harness.orchestrator.clone();
        async move { orchestrator.run_sync(TakealotSyncOptions::manual(USER)).await }
    });
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(harness.orchestrator.is_running(USER, INTEGRATION));

    let refused = harness.orchestrator.remove_integration(Some(USER), INTEGRATION).await;
    assert!(matches!(refused, Err(ShelfSyncError::SyncInProgress(_))));
    assert_eq!(harness.integrations.all().len(), 1);

    let response = running.await.expect("sync task should join");
    assert_eq!(response, TakealotApiResponse::ok(summary(20, 0)));

    let removal = harness
        .orchestrator
        .remove_integration(Some(USER), INTEGRATION)
        .await
        .expect("removal after the run");
    assert_eq!(removal, IntegrationRemoval { products_removed: 20, runs_removed: 1 });
    assert_eq!(harness.products.len(), 0);
    assert!(harness.runs.all().is_empty());
    assert!(harness.integrations.all().is_empty());
}

#[tokio::test]
async fn removal_checks_caller_and_ownership() {
    let harness = HarnessBuilder::new(MockMarketplace::new(offers(1..=3)))
        .integration(integration("int-2", "u2", "key-u2"))
        .build();

    let anonymous = harness.orchestrator.remove_integration(Some("  "), INTEGRATION).await;
    assert!(matches!(anonymous, Err(ShelfSyncError::Unauthenticated(_))));

    let foreign = harness.orchestrator.remove_integration(Some(USER), "int-2").await;
    assert!(matches!(foreign, Err(ShelfSyncError::Unauthorized(_))));

    let missing = harness.orchestrator.remove_integration(Some(USER), "int-9").await;
    assert!(matches!(missing, Err(ShelfSyncError::NotFound(_))));
    assert_eq!(harness.integrations.all().len(), 2);
}
