//! CLI route: single route table and run context. Dispatches to the browser and presentation.

use crate::browser::Browser;
use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{
    format_listing_json, format_listing_text, format_report_text, format_tree_json,
    format_tree_text,
};
use crate::config::{ConfigLoader, RestreeConfig};
use crate::marshal::{RenderSink, TracingRenderSink, UiThread};
use crate::service::{LocalResourceService, LocalServiceConfig};
use crate::tree::path::VirtualPath;
use crate::tree::resource_tree::ResourceTree;
use anyhow::{anyhow, Context, Result};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::info;

/// Runtime context for CLI execution: effective config plus the async runtime.
pub struct RunContext {
    config: RestreeConfig,
    runtime: Runtime,
}

/// Counts finished update brackets so `watch` knows when to reprint
#[derive(Default)]
struct ChangeCounter {
    inner: TracingRenderSink,
    ends: AtomicUsize,
}

impl RenderSink for ChangeCounter {
    fn begin_update(&self) {
        self.inner.begin_update();
    }

    fn end_update(&self) {
        self.inner.end_update();
        self.ends.fetch_add(1, Ordering::SeqCst);
    }
}

impl RunContext {
    /// Load configuration (explicit file or workspace layers) and apply root overrides.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        data_root: Option<PathBuf>,
        user_data_root: Option<PathBuf>,
    ) -> Result<Self> {
        let mut config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ConfigLoader::load(&workspace_root).context("Failed to load configuration")?,
        };
        if let Some(data_root) = data_root {
            config.roots.data_root = Some(data_root);
        }
        if let Some(user_data_root) = user_data_root {
            config.roots.user_data_root = Some(user_data_root);
        }

        config.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow!("Configuration validation failed:\n{}", msgs.join("\n"))
        })?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("restree-worker")
            .build()
            .context("Failed to start async runtime")?;

        Ok(Self { config, runtime })
    }

    pub fn config(&self) -> &RestreeConfig {
        &self.config
    }

    /// Execute one command and return its printable output
    pub fn execute(&self, command: &Commands) -> Result<String> {
        info!(command = command.name(), "Executing command");
        if let Commands::Config { format } = command {
            return self.render_config(*format);
        }
        self.runtime.block_on(self.execute_async(command))
    }

    fn render_config(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => self.config.to_toml().context("Failed to render config"),
            OutputFormat::Json => {
                serde_json::to_string_pretty(&self.config).context("Failed to render config")
            }
        }
    }

    async fn execute_async(&self, command: &Commands) -> Result<String> {
        let sink = Arc::new(ChangeCounter::default());
        let browser = self.open_browser(sink.clone())?;
        let color = std::io::stdout().is_terminal();

        let output = match command {
            Commands::Tree {
                root,
                depth,
                format,
            } => {
                let root = VirtualPath::parse(root);
                browser
                    .reveal(&root)
                    .await
                    .with_context(|| format!("Failed to locate {}", root))?;
                let report = self.populate(&browser, &root).await?;
                let depth = *depth;
                let tree = match format {
                    OutputFormat::Text => {
                        let r = root.clone();
                        browser
                            .with_tree(move |tree| format_tree_text(tree, &r, depth, color))
                            .await?
                    }
                    OutputFormat::Json => {
                        let r = root.clone();
                        browser
                            .with_tree(move |tree| format_tree_json(tree, &r, depth))
                            .await??
                    }
                };
                match format {
                    OutputFormat::Text => format!("{}{}", tree, format_report_text(&report)),
                    OutputFormat::Json => tree,
                }
            }
            Commands::Ls { path, format } => {
                let listing = browser.navigate(&VirtualPath::parse(path)).await?;
                match format {
                    OutputFormat::Text => format_listing_text(&listing),
                    OutputFormat::Json => format_listing_json(&listing)?,
                }
            }
            Commands::Watch { seconds, depth } => {
                self.run_watch(&browser, &sink, *seconds, *depth, color)
                    .await?
            }
            Commands::Mv { source, dest_dir } => {
                self.populate(&browser, &VirtualPath::root()).await?;
                let dest = browser
                    .request_move(&VirtualPath::parse(source), &VirtualPath::parse(dest_dir))
                    .await?;
                self.render_around(&browser, &dest, color, format!("Moved {} -> {}", source, dest))
                    .await?
            }
            Commands::Cp { source, dest_dir } => {
                self.populate(&browser, &VirtualPath::root()).await?;
                let dest = browser
                    .request_copy(&VirtualPath::parse(source), &VirtualPath::parse(dest_dir))
                    .await?;
                self.render_around(&browser, &dest, color, format!("Copied {} -> {}", source, dest))
                    .await?
            }
            Commands::Rm { path } => {
                self.populate(&browser, &VirtualPath::root()).await?;
                let path = VirtualPath::parse(path);
                browser.request_delete(&path).await?;
                self.render_around(&browser, &path, color, format!("Deleted {}", path))
                    .await?
            }
            Commands::Rename { path, new_name } => {
                self.populate(&browser, &VirtualPath::root()).await?;
                let renamed = browser
                    .request_rename(&VirtualPath::parse(path), new_name)
                    .await?;
                self.render_around(&browser, &renamed, color, format!("Renamed {} -> {}", path, renamed))
                    .await?
            }
            Commands::Config { format } => self.render_config(*format)?,
        };
        browser.close();
        Ok(output)
    }

    fn open_browser(&self, sink: Arc<ChangeCounter>) -> Result<Browser> {
        let (data_root, user_data_root) = self.config.roots.resolve().ok_or_else(|| {
            anyhow!("No data root configured (use --data-root or roots.data_root)")
        })?;
        if !data_root.is_dir() {
            return Err(anyhow!("Data root {} is not a directory", data_root.display()));
        }

        let service = LocalResourceService::with_config(
            data_root,
            user_data_root,
            LocalServiceConfig {
                ignore_patterns: self.config.watch.ignore_patterns.clone(),
                ..LocalServiceConfig::default()
            },
        );
        let ui = UiThread::spawn(ResourceTree::new(sink)).context("Failed to start UI thread")?;
        Ok(Browser::new(&self.config, Arc::new(service), Arc::new(ui)))
    }

    async fn populate(
        &self,
        browser: &Browser,
        root: &VirtualPath,
    ) -> Result<crate::population::PopulationReport> {
        browser
            .open(root)
            .await
            .with_context(|| format!("Failed to populate {}", root))
    }

    /// Print the parent directory of `path` after a mutation
    async fn render_around(
        &self,
        browser: &Browser,
        path: &VirtualPath,
        color: bool,
        headline: String,
    ) -> Result<String> {
        let parent = path.parent();
        let tree = browser
            .with_tree(move |tree| format_tree_text(tree, &parent, Some(1), color))
            .await?;
        Ok(format!("{}\n{}", headline, tree.trim_end()))
    }

    async fn run_watch(
        &self,
        browser: &Browser,
        sink: &ChangeCounter,
        seconds: Option<u64>,
        depth: Option<usize>,
        color: bool,
    ) -> Result<String> {
        let report = self.populate(browser, &VirtualPath::root()).await?;
        println!("{}", format_report_text(&report));
        browser.start_watching().context("Failed to start watching")?;

        let deadline = async {
            match seconds {
                Some(s) => tokio::time::sleep(Duration::from_secs(s)).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut seen = usize::MAX;
        let mut ticker = tokio::time::interval(Duration::from_millis(250));
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for Ctrl-C")?;
                    break;
                }
                _ = ticker.tick() => {
                    let ends = sink.ends.load(Ordering::SeqCst);
                    if ends != seen {
                        seen = ends;
                        let text = browser
                            .with_tree(move |tree| format_tree_text(tree, &VirtualPath::root(), depth, color))
                            .await?;
                        println!("{}", text);
                    }
                }
            }
        }

        browser.stop_watching();
        Ok("Stopped watching".to_string())
    }
}
