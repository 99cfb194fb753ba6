//! Render a fixture tree the way the sidebar would show it
//!
//! Usage:
//!   cargo run --features dev-bins --bin repotree-dump -- --fixture tree.json --expand-to src/lib.rs
//!
//! The fixture is a JSON tree in the data-source wire shape
//! (`{ "name", "type", "path", "url", "contents": [...] }`).

use anyhow::{Context, Result as AnyhowResult};
use clap::Parser;
use repotree::compress::CompressedView;
use repotree::loader::{InMemorySource, RepoContext, SlowSource, SlowSourceConfig, TreeDataSource};
use repotree::logging::init_tracing;
use repotree::session::TreeSession;
use repotree::SidebarConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "repotree-dump")]
#[command(about = "Print the visible rows of a fixture repository tree", long_about = None)]
struct Args {
    /// JSON fixture describing the repository tree
    #[arg(long, value_name = "PATH")]
    fixture: PathBuf,

    /// Sidebar configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Serve one level per request instead of the whole tree at once
    #[arg(long)]
    defer: bool,

    /// Artificial delay per request, in milliseconds
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Reveal and focus this path
    #[arg(long, value_name = "PATH")]
    expand_to: Option<String>,

    /// Expand every folder
    #[arg(long)]
    expand_all: bool,

    /// Filter rows by this search key
    #[arg(long, value_name = "KEY")]
    search: Option<String>,

    /// Merge single-folder chains into one row
    #[arg(long)]
    compress: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> AnyhowResult<()> {
    init_tracing(LevelFilter::WARN);
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SidebarConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SidebarConfig::default(),
    };

    let json = std::fs::read_to_string(&args.fixture)
        .with_context(|| format!("Failed to read fixture {}", args.fixture.display()))?;
    let fixture = InMemorySource::from_json(&json).context("Invalid fixture")?;
    let mut source: Arc<dyn TreeDataSource> = Arc::new(fixture.with_defer(args.defer));
    if let Some(ms) = args.delay_ms {
        source = Arc::new(SlowSource::new(
            source,
            SlowSourceConfig::uniform(Duration::from_millis(ms)),
        ));
    }

    let session = TreeSession::new(source, RepoContext::new("local", "fixture", "main"), config);
    let explorer = session
        .set_up(|phase| tracing::debug!("Setup phase: {:?}", phase))
        .await?
        .context("Session was torn down during set-up")?;

    if args.expand_all {
        explorer.generator().expand_all().await?;
    }
    if let Some(path) = &args.expand_to {
        let segments: Vec<&str> = path.split('/').collect();
        if explorer.expand_to(segments.as_slice()).await.is_none() {
            anyhow::bail!("No such path: {path}");
        }
    }
    if let Some(key) = &args.search {
        explorer.update_search_key(key);
    }

    let snapshot = explorer.visible_nodes();
    if args.compress {
        print!("{}", CompressedView::new(&snapshot));
    } else {
        print!("{snapshot}");
    }
    Ok(())
}
