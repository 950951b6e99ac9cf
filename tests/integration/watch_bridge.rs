//! Live filesystem changes reaching the tree through the watch bridge

use super::test_utils::{child_names, eventually, LocalHarness};
use restree::VirtualPath;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_created_and_removed_directories_show_up() {
    let harness = LocalHarness::new(&["maps/level1"], &["maps"]);
    harness.browser.open(&VirtualPath::root()).await.unwrap();
    harness.browser.start_watching().unwrap();
    assert!(harness.browser.is_watching());

    let browser = &harness.browser;
    std::fs::create_dir(harness.user_root.join("maps").join("level2")).unwrap();
    let appeared = eventually(WAIT, || async move {
        child_names(browser, "/maps").await == vec!["level1", "level2"]
    })
    .await;
    assert!(appeared, "new directory never reached the tree");

    std::fs::remove_dir(harness.user_root.join("maps").join("level2")).unwrap();
    let vanished = eventually(WAIT, || async move {
        child_names(browser, "/maps").await == vec!["level1"]
    })
    .await;
    assert!(vanished, "removed directory never left the tree");

    harness.browser.close();
    assert!(!harness.browser.is_watching());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ignored_paths_do_not_reach_the_tree() {
    let harness = LocalHarness::new(&["maps"], &[]);
    harness.browser.open(&VirtualPath::root()).await.unwrap();
    harness.browser.start_watching().unwrap();

    std::fs::create_dir(harness.user_root.join(".git")).unwrap();
    std::fs::create_dir(harness.user_root.join("docs")).unwrap();

    let browser = &harness.browser;
    let appeared = eventually(WAIT, || async move {
        child_names(browser, "/").await == vec!["docs", "maps"]
    })
    .await;
    assert!(appeared);
}
