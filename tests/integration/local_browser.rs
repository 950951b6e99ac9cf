//! Browser over layered on-disk roots

use super::test_utils::LocalHarness;
use restree::error::{BrowserError, ResourceError};
use restree::VirtualPath;

#[tokio::test]
async fn test_layers_merge_into_one_tree() {
    let harness = LocalHarness::new(&["maps/level1", "docs"], &["maps/custom", "mods"]);
    std::fs::write(harness.data_root.join("maps").join("readme.txt"), "hi").unwrap();

    let report = harness.browser.open(&VirtualPath::root()).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(harness.names("/").await, vec!["docs", "maps", "mods"]);
    assert_eq!(harness.names("/maps").await, vec!["custom", "level1"]);

    let listing = harness
        .browser
        .navigate(&VirtualPath::parse("/maps"))
        .await
        .unwrap();
    assert_eq!(listing.directories, vec!["custom", "level1"]);
    assert_eq!(listing.files, vec!["readme.txt"]);
}

#[tokio::test]
async fn test_copy_from_data_lands_in_user_layer() {
    let harness = LocalHarness::new(&["maps/level1/art", "docs"], &[]);
    harness.browser.open(&VirtualPath::root()).await.unwrap();

    let dest = harness
        .browser
        .request_copy(&VirtualPath::parse("/maps/level1"), &VirtualPath::parse("/docs"))
        .await
        .unwrap();

    assert_eq!(dest, VirtualPath::parse("/docs/level1"));
    assert!(harness.user_root.join("docs").join("level1").join("art").is_dir());
    assert_eq!(harness.names("/docs").await, vec!["level1"]);
    assert_eq!(harness.names("/maps").await, vec!["level1"]);
}

#[tokio::test]
async fn test_read_only_data_cannot_be_deleted() {
    let harness = LocalHarness::new(&["docs"], &[]);
    harness.browser.open(&VirtualPath::root()).await.unwrap();

    let result = harness
        .browser
        .request_delete(&VirtualPath::parse("/docs"))
        .await;
    assert!(matches!(
        result,
        Err(BrowserError::Resource(ResourceError::ReadOnly(_)))
    ));
    assert_eq!(harness.names("/").await, vec!["docs"]);
}

#[tokio::test]
async fn test_move_and_delete_in_user_layer() {
    let harness = LocalHarness::new(&[], &["maps/level1", "archive"]);
    harness.browser.open(&VirtualPath::root()).await.unwrap();

    let dest = harness
        .browser
        .request_move(&VirtualPath::parse("/maps/level1"), &VirtualPath::parse("/archive"))
        .await
        .unwrap();
    assert_eq!(dest, VirtualPath::parse("/archive/level1"));
    assert!(harness.names("/maps").await.is_empty());
    assert_eq!(harness.names("/archive").await, vec!["level1"]);

    harness.browser.request_delete(&dest).await.unwrap();
    assert!(harness.names("/archive").await.is_empty());
    assert!(!harness.user_root.join("archive").join("level1").exists());
}

#[tokio::test]
async fn test_missing_directory_reports_not_found() {
    let harness = LocalHarness::new(&["maps"], &[]);
    harness.browser.open(&VirtualPath::root()).await.unwrap();

    let result = harness
        .browser
        .navigate(&VirtualPath::parse("/nowhere"))
        .await;
    assert!(matches!(
        result,
        Err(BrowserError::Resource(ResourceError::NotFound(_)))
    ));
}
