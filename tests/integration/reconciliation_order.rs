//! Event ordering across a population run

use super::test_utils::MemoryHarness;
use restree::error::BrowserError;
use restree::reconcile::{ChangeKind, Disposition, MutationApplied, Phase};
use restree::service::ResourceService;
use restree::VirtualPath;
use std::sync::Arc;

#[tokio::test]
async fn test_queued_events_apply_in_arrival_order() {
    let harness = Arc::new(MemoryHarness::new());
    harness
        .service
        .add_directory("/docs/manual")
        .add_directory("/maps/level1");
    harness.browser.open(&VirtualPath::root()).await.unwrap();

    let hold = harness.service.hold_listings().await;
    let run = {
        let harness = Arc::clone(&harness);
        tokio::spawn(async move { harness.browser.open(&VirtualPath::root()).await })
    };
    let reconciler = Arc::clone(harness.browser.reconciler());
    while !reconciler.is_populating() {
        tokio::task::yield_now().await;
    }

    let root = harness.service.user_data_root();
    let first = reconciler
        .on_changed(
            ChangeKind::Changed,
            harness.service.native_path("/docs/manual"),
            root.clone(),
        )
        .await;
    let second = reconciler
        .on_changed(
            ChangeKind::Changed,
            harness.service.native_path("/maps/level1"),
            root,
        )
        .await;
    assert_eq!(first, Disposition::Queued { pending: 1 });
    assert_eq!(second, Disposition::Queued { pending: 2 });

    let before = harness.service.listing_calls().len();
    drop(hold);
    run.await.unwrap().unwrap();

    let calls = harness.service.listing_calls();
    let tail: Vec<String> = calls[calls.len() - 2..].iter().map(|p| p.to_string()).collect();
    assert!(calls.len() > before);
    assert_eq!(tail, vec!["/docs/manual", "/maps/level1"]);
    assert_eq!(reconciler.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_two_renames_of_one_entry_resolve_in_order() {
    let harness = Arc::new(MemoryHarness::new());
    harness
        .service
        .add_directory("/docs/a")
        .add_directory("/maps")
        .add_directory("/audio");
    harness.browser.open(&VirtualPath::root()).await.unwrap();

    // On disk: /docs/a -> /maps/a -> /audio/a
    harness.service.rename_entry("/docs/a", "/maps/a");
    harness.service.rename_entry("/maps/a", "/audio/a");

    let hold = harness.service.hold_listings().await;
    let run = {
        let harness = Arc::clone(&harness);
        tokio::spawn(async move { harness.browser.open(&VirtualPath::root()).await })
    };
    let reconciler = Arc::clone(harness.browser.reconciler());
    while !reconciler.is_populating() {
        tokio::task::yield_now().await;
    }

    let root = harness.service.user_data_root();
    let native = |p: &str| harness.service.native_path(p);
    reconciler
        .on_renamed(native("/maps/a"), native("/docs/a"), root.clone())
        .await;
    reconciler
        .on_renamed(native("/audio/a"), native("/maps/a"), root)
        .await;

    drop(hold);
    run.await.unwrap().unwrap();

    let calls = harness.service.listing_calls();
    let tail: Vec<String> = calls[calls.len() - 4..].iter().map(|p| p.to_string()).collect();
    assert_eq!(tail, vec!["/docs", "/maps", "/maps", "/audio/a"]);
    assert_eq!(harness.names("/audio").await, vec!["a"]);
    assert!(harness.names("/docs").await.is_empty());
    assert!(harness.names("/maps").await.is_empty());
}

#[tokio::test]
async fn test_mutation_during_population_waits_for_drain() {
    let harness = Arc::new(MemoryHarness::new());
    harness.service.add_directory("/maps/level1").add_directory("/docs");
    harness.browser.open(&VirtualPath::root()).await.unwrap();

    let hold = harness.service.hold_listings().await;
    let run = {
        let harness = Arc::clone(&harness);
        tokio::spawn(async move { harness.browser.open(&VirtualPath::root()).await })
    };
    let reconciler = Arc::clone(harness.browser.reconciler());
    while !reconciler.is_populating() {
        tokio::task::yield_now().await;
    }

    let (source, dest) = (
        VirtualPath::parse("/maps/level1"),
        VirtualPath::parse("/docs/level1"),
    );
    harness.service.move_entry(&source, &dest).await.unwrap();
    let disposition = reconciler
        .on_mutation_applied(MutationApplied::Moved { source, dest })
        .await;
    assert!(matches!(disposition, Disposition::Queued { .. }));

    drop(hold);
    run.await.unwrap().unwrap();
    assert!(harness.names("/maps").await.is_empty());
    assert_eq!(harness.names("/docs").await, vec!["level1"]);
}

#[tokio::test]
async fn test_live_events_apply_synchronously_when_idle() {
    let harness = MemoryHarness::new();
    harness.service.add_directory("/maps");
    harness.browser.open(&VirtualPath::root()).await.unwrap();

    harness.service.add_directory("/maps/level2");
    let disposition = harness
        .browser
        .reconciler()
        .on_changed(
            ChangeKind::Created,
            harness.service.native_path("/maps/level2"),
            harness.service.user_data_root(),
        )
        .await;
    assert_eq!(disposition, Disposition::Applied { applied: 1 });
    assert_eq!(harness.names("/maps").await, vec!["level2"]);
}

/// Start a live change on /maps and stall it inside the drain
async fn stalled_live_drain(
    harness: &Arc<MemoryHarness>,
) -> (
    tokio::sync::OwnedRwLockWriteGuard<()>,
    tokio::task::JoinHandle<Disposition>,
) {
    let hold = harness.service.hold_listings().await;
    let live = {
        let harness = Arc::clone(harness);
        tokio::spawn(async move {
            harness
                .browser
                .reconciler()
                .on_changed(
                    ChangeKind::Changed,
                    harness.service.native_path("/maps"),
                    harness.service.user_data_root(),
                )
                .await
        })
    };
    while harness.browser.reconciler().phase() != Phase::Draining {
        tokio::task::yield_now().await;
    }
    (hold, live)
}

#[tokio::test]
async fn test_open_waits_for_live_drain() {
    let harness = Arc::new(MemoryHarness::new());
    harness.service.add_directory("/maps/level1").add_directory("/docs");
    harness.browser.open(&VirtualPath::root()).await.unwrap();

    let (hold, live) = stalled_live_drain(&harness).await;
    let open = {
        let harness = Arc::clone(&harness);
        tokio::spawn(async move { harness.browser.open(&VirtualPath::root()).await })
    };
    tokio::task::yield_now().await;
    assert!(!open.is_finished());

    drop(hold);
    assert_eq!(live.await.unwrap(), Disposition::Applied { applied: 1 });
    let report = open.await.unwrap().unwrap();
    assert!(report.is_complete());
    assert_eq!(harness.names("/maps").await, vec!["level1"]);
}

#[tokio::test]
async fn test_reset_during_live_drain_rebuilds_tree() {
    let harness = Arc::new(MemoryHarness::new());
    harness.service.add_directory("/maps/level1").add_directory("/docs");
    harness.browser.open(&VirtualPath::root()).await.unwrap();

    let (hold, live) = stalled_live_drain(&harness).await;
    let reset = {
        let harness = Arc::clone(&harness);
        tokio::spawn(async move { harness.browser.reset().await })
    };
    tokio::task::yield_now().await;
    // the tree is untouched until the drain hands over
    assert_eq!(harness.names("/").await, vec!["docs", "maps"]);

    drop(hold);
    live.await.unwrap();
    reset.await.unwrap().unwrap();
    assert_eq!(harness.names("/").await, vec!["docs", "maps"]);
    assert_eq!(harness.names("/maps").await, vec!["level1"]);
}

#[tokio::test]
async fn test_rejected_reset_leaves_tree_intact() {
    let harness = Arc::new(MemoryHarness::new());
    harness.service.add_directory("/maps/level1").add_directory("/docs");
    harness.browser.open(&VirtualPath::root()).await.unwrap();

    let hold = harness.service.hold_listings().await;
    let run = {
        let harness = Arc::clone(&harness);
        tokio::spawn(async move { harness.browser.open(&VirtualPath::root()).await })
    };
    let reconciler = Arc::clone(harness.browser.reconciler());
    while !reconciler.is_populating() {
        tokio::task::yield_now().await;
    }

    let result = harness.browser.reset().await;
    assert!(matches!(result, Err(BrowserError::AlreadyPopulating)));
    assert_eq!(harness.names("/").await, vec!["docs", "maps"]);
    assert_eq!(harness.names("/maps").await, vec!["level1"]);

    drop(hold);
    run.await.unwrap().unwrap();
    assert_eq!(harness.names("/maps").await, vec!["level1"]);
}
