//! Shared test utilities for integration tests
//!
//! Builds browsers over in-memory and on-disk namespaces, and isolates the
//! environment for config loading tests.

use restree::config::RestreeConfig;
use restree::marshal::{CountingRenderSink, UiThread};
use restree::service::{LocalResourceService, MemoryResourceService};
use restree::{Browser, ResourceTree, VirtualPath};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const ISOLATED_VARS: [&str; 4] = ["HOME", "XDG_CONFIG_HOME", "RESTREE_ENV", "RESTREE_HOVER__DWELL_MS"];

/// Run `f` with HOME and XDG_CONFIG_HOME pointing into `test_dir`
///
/// `vars` are set for the duration of the call; everything is restored after.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<(&str, Option<String>)> = ISOLATED_VARS
        .iter()
        .map(|name| (*name, std::env::var(name).ok()))
        .collect();

    let home = test_dir.path().join("home");
    let config_home = test_dir.path().join("xdg-config");
    std::fs::create_dir_all(&home).unwrap();
    std::fs::create_dir_all(&config_home).unwrap();
    std::env::set_var("HOME", &home);
    std::env::set_var("XDG_CONFIG_HOME", &config_home);
    std::env::remove_var("RESTREE_ENV");
    std::env::remove_var("RESTREE_HOVER__DWELL_MS");
    for (name, value) in vars {
        std::env::set_var(name, value);
    }

    let result = f();

    for (name, _) in vars {
        std::env::remove_var(name);
    }
    for (name, value) in saved {
        match value {
            Some(v) => std::env::set_var(name, v),
            None => std::env::remove_var(name),
        }
    }
    result
}

/// Browser over an in-memory namespace
pub struct MemoryHarness {
    pub service: Arc<MemoryResourceService>,
    pub sink: Arc<CountingRenderSink>,
    pub browser: Browser,
}

impl MemoryHarness {
    pub fn new() -> Self {
        Self::with_config(RestreeConfig::default())
    }

    pub fn with_config(config: RestreeConfig) -> Self {
        let service = Arc::new(MemoryResourceService::new());
        let sink = Arc::new(CountingRenderSink::default());
        let ui = Arc::new(UiThread::spawn(ResourceTree::new(sink.clone())).unwrap());
        let browser = Browser::new(&config, service.clone(), ui);
        Self {
            service,
            sink,
            browser,
        }
    }

    pub async fn names(&self, path: &str) -> Vec<String> {
        child_names(&self.browser, path).await
    }

    /// Error message left under `path` by a failed listing
    pub async fn listing_error(&self, path: &str) -> Option<String> {
        let path = VirtualPath::parse(path);
        self.browser
            .with_tree(move |tree| tree.listing_error(&path).map(str::to_string))
            .await
            .unwrap()
    }
}

/// Browser over a data root and user-data root on disk
pub struct LocalHarness {
    pub temp_dir: TempDir,
    pub data_root: PathBuf,
    pub user_root: PathBuf,
    pub browser: Browser,
}

impl LocalHarness {
    /// Lay out `data_dirs` under the data root and `user_dirs` under the user root
    pub fn new(data_dirs: &[&str], user_dirs: &[&str]) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let data_root = temp_dir.path().join("data");
        let user_root = temp_dir.path().join("user");
        make_dirs(&data_root, data_dirs);
        make_dirs(&user_root, user_dirs);

        let service = LocalResourceService::new(data_root.clone(), user_root.clone());
        let (data_root, user_root) = {
            use restree::service::ResourceService;
            (service.data_root(), service.user_data_root())
        };
        let ui = Arc::new(UiThread::spawn(ResourceTree::default()).unwrap());
        let browser = Browser::new(&RestreeConfig::default(), Arc::new(service), ui);
        Self {
            temp_dir,
            data_root,
            user_root,
            browser,
        }
    }

    pub async fn names(&self, path: &str) -> Vec<String> {
        child_names(&self.browser, path).await
    }
}

fn make_dirs(root: &Path, dirs: &[&str]) {
    std::fs::create_dir_all(root).unwrap();
    for dir in dirs {
        std::fs::create_dir_all(root.join(dir)).unwrap();
    }
}

pub async fn child_names(browser: &Browser, path: &str) -> Vec<String> {
    let path = VirtualPath::parse(path);
    browser
        .with_tree(move |tree| tree.child_names(&path))
        .await
        .unwrap()
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
