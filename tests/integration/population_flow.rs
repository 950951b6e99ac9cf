//! Population through the browser facade over an in-memory namespace

use super::test_utils::MemoryHarness;
use restree::config::RestreeConfig;
use restree::error::{BrowserError, ResourceError};
use restree::VirtualPath;

#[tokio::test]
async fn test_docs_and_maps_scenario() {
    let harness = MemoryHarness::new();
    harness
        .service
        .add_directory("/docs")
        .add_directory("/maps/level1");

    harness.browser.open(&VirtualPath::root()).await.unwrap();
    harness
        .browser
        .open(&VirtualPath::parse("/maps"))
        .await
        .unwrap();

    assert_eq!(harness.names("/").await, vec!["docs", "maps"]);
    let level1 = harness
        .browser
        .with_tree(|tree| {
            let id = tree.lookup(&VirtualPath::parse("/maps/level1"))?;
            let node = tree.node(id)?;
            Some((node.children.len(), node.expanded))
        })
        .await
        .unwrap();
    assert_eq!(level1, Some((0, false)));
}

#[tokio::test]
async fn test_one_failing_sibling_does_not_abort_scan() {
    let harness = MemoryHarness::new();
    harness
        .service
        .add_directory("/audio/music")
        .add_directory("/maps/level1")
        .add_directory("/textures/stone")
        .fail_listing("/maps", ResourceError::Transport("engine disconnected".into()));

    let report = harness.browser.open(&VirtualPath::root()).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].error.contains("engine disconnected"));
    assert_eq!(harness.names("/audio").await, vec!["music"]);
    assert_eq!(harness.names("/textures").await, vec!["stone"]);
    assert!(harness.names("/maps").await.is_empty());
    assert!(harness
        .listing_error("/maps")
        .await
        .is_some_and(|e| e.contains("engine disconnected")));

    // a later refresh replaces the placeholder
    harness.service.clear_failures();
    harness
        .browser
        .open(&VirtualPath::parse("/maps"))
        .await
        .unwrap();
    assert_eq!(harness.names("/maps").await, vec!["level1"]);
    assert_eq!(harness.listing_error("/maps").await, None);
}

#[tokio::test]
async fn test_repopulation_is_idempotent_and_keeps_expansion() {
    let harness = MemoryHarness::new();
    harness.service.add_directory("/maps/level1/art");
    harness.browser.open(&VirtualPath::root()).await.unwrap();
    harness
        .browser
        .request_expand(&VirtualPath::parse("/maps/level1"))
        .await
        .unwrap();

    let before = harness.names("/maps").await;
    harness.browser.open(&VirtualPath::root()).await.unwrap();
    assert_eq!(harness.names("/maps").await, before);

    let expanded = harness
        .browser
        .with_tree(|tree| {
            let id = tree.lookup(&VirtualPath::parse("/maps/level1"));
            id.is_some_and(|id| tree.is_expanded(id))
        })
        .await
        .unwrap();
    assert!(expanded);
}

#[tokio::test]
async fn test_every_update_is_bracketed() {
    let harness = MemoryHarness::new();
    harness
        .service
        .add_directory("/docs")
        .add_directory("/maps/level1");

    harness.browser.open(&VirtualPath::root()).await.unwrap();
    harness
        .browser
        .request_rename(&VirtualPath::parse("/docs"), "manual")
        .await
        .unwrap();

    assert!(harness.sink.begins() > 0);
    assert_eq!(harness.sink.begins(), harness.sink.ends());
    assert_eq!(harness.sink.max_depth(), 1);
}

#[tokio::test]
async fn test_limited_concurrency_still_lists_everything() {
    let mut config = RestreeConfig::default();
    config.population.max_concurrent_queries = 1;
    config.population.expand_root = false;
    let harness = MemoryHarness::with_config(config);
    for name in ["a", "b", "c", "d", "e"] {
        harness.service.add_directory(&format!("/{}/inner", name));
    }

    let report = harness.browser.open(&VirtualPath::root()).await.unwrap();
    assert_eq!(report.directories_listed, 11);
    assert_eq!(report.nodes_attached, 10);
    let root_expanded = harness
        .browser
        .with_tree(|tree| tree.is_expanded(tree.root()))
        .await
        .unwrap();
    assert!(!root_expanded);
}

#[tokio::test]
async fn test_closed_browser_does_not_populate() {
    let harness = MemoryHarness::new();
    harness.service.add_directory("/maps");
    harness.browser.close();

    let report = harness.browser.open(&VirtualPath::root()).await.unwrap();
    assert!(report.cancelled);
    assert!(harness.names("/").await.is_empty());
}

#[tokio::test]
async fn test_reset_rebuilds_from_scratch() {
    let harness = MemoryHarness::new();
    harness.service.add_directory("/maps");
    harness.browser.open(&VirtualPath::root()).await.unwrap();

    harness.service.remove_entry("/maps").add_directory("/docs");
    harness.browser.reset().await.unwrap();
    assert_eq!(harness.names("/").await, vec!["docs"]);

    let missing = harness
        .browser
        .request_collapse(&VirtualPath::parse("/maps"))
        .await;
    assert!(matches!(missing, Err(BrowserError::NotInTree(_))));
}
