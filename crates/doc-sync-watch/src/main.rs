//! doc-sync-watch: Mirror one remote page into a local markdown file.
//!
//! Loads the page, writes it to disk, then autosaves every change made to the
//! file through the same sync engine the editor uses. Ctrl+C saves any
//! pending edits and exits.

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use doc_sync::{
    DocumentKey, EditorSync, EventBus, LoadOutcome, Role, SaveOutcome, SaveTrigger, SyncEvent,
};
use doc_sync_watch::{FileEventKind, FileSurface, FileWatcher, HttpOptions, HttpRemote, WatchConfig};

#[derive(Parser, Debug)]
#[command(name = "doc-sync-watch")]
#[command(about = "Edit a remote page as a local markdown file")]
struct Args {
    /// Base URL of the document API
    #[arg(short, long, env = "DOC_SYNC_SERVER")]
    server: Option<String>,

    /// Project containing the page
    #[arg(long, conflicts_with = "channel", required_unless_present = "channel")]
    project: Option<String>,

    /// Announcement channel containing the page
    #[arg(long)]
    channel: Option<String>,

    /// Page identifier
    #[arg(short, long)]
    document: String,

    /// Local file to mirror the page into
    #[arg(short, long)]
    file: PathBuf,

    /// Role used for permission checks
    #[arg(long, value_enum, default_value_t = RoleArg::Editor)]
    role: RoleArg,

    /// Bearer token for the API
    #[arg(long, env = "DOC_SYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the autosave delay in milliseconds
    #[arg(long)]
    autosave_ms: Option<u64>,

    /// Always send the full document instead of patches
    #[arg(long)]
    full_saves: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Viewer,
    Editor,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Viewer => Role::Viewer,
            RoleArg::Editor => Role::Editor,
            RoleArg::Admin => Role::Admin,
        }
    }
}

impl Args {
    fn document_key(&self) -> Result<DocumentKey> {
        match (&self.project, &self.channel) {
            (Some(project), None) => Ok(DocumentKey::project(project, &self.document)),
            (None, Some(channel)) => Ok(DocumentKey::channel(channel, &self.document)),
            _ => bail!("Specify exactly one of --project or --channel"),
        }
    }

    /// File config with command-line overrides applied.
    fn resolve_config(&self) -> Result<WatchConfig> {
        let mut config = match &self.config {
            Some(path) => WatchConfig::load(path)?,
            None => WatchConfig::default(),
        };
        if let Some(server) = &self.server {
            config.server_url = Some(server.clone());
        }
        if let Some(ms) = self.autosave_ms {
            config.sync = config.sync.with_autosave_delay(Duration::from_millis(ms));
        }
        if self.full_saves {
            config.sync.patch_mode = false;
        }
        Ok(config)
    }
}

fn log_event(event: &SyncEvent) {
    match serde_json::to_string(event) {
        Ok(json) => debug!(
            target: "doc_sync_watch::events",
            surface = event.surface(),
            path = event.path(),
            "{}",
            json
        ),
        Err(e) => warn!("Failed to serialize sync event: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,doc_sync=debug,doc_sync_watch=debug"
    } else {
        "info,doc_sync=info,doc_sync_watch=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let key = args.document_key()?;
    let config = args.resolve_config()?;
    let server = config
        .server_url
        .clone()
        .context("No server URL: pass --server, set DOC_SYNC_SERVER or add server_url to the config")?;

    info!("Starting doc-sync-watch");
    info!("Document: {}", key);
    info!("File: {:?}", args.file);
    info!(
        "Autosave delay: {:?}, patch mode: {}",
        config.sync.autosave_delay(),
        config.sync.patch_mode
    );

    let remote = Arc::new(HttpRemote::new(
        server,
        HttpOptions {
            auth_token: args.token.clone(),
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
        },
    )?);
    let surface = Arc::new(FileSurface::new(args.file.clone()));

    let events = Arc::new(EventBus::new());
    let _subscription = events.subscribe(|event| log_event(&event));

    let sync = EditorSync::builder("file", remote, surface.clone())
        .role(args.role.into())
        .events(events.clone())
        .config(config.sync.clone())
        .build();

    match sync.open(key.clone()).await.context("Failed to load document")? {
        LoadOutcome::Loaded {
            resolved_links,
            failed_links,
        } => {
            info!(resolved_links, failed_links, "Document mirrored to {:?}", surface.path());
        }
        LoadOutcome::Stale => bail!("Load of {} was superseded", key),
    }

    let mut watcher = FileWatcher::new(surface.path())?;
    info!("Watching for changes. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            Some(kind) = watcher.event_rx().recv() => {
                match kind {
                    FileEventKind::Modified => {
                        let phase = sync.notify_edited();
                        debug!(?phase, "File changed");
                    }
                    FileEventKind::Deleted => {
                        warn!("{:?} was deleted; keeping the last known content", surface.path());
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    // Pick up edits the debouncer has not delivered yet
    sync.notify_edited();
    if sync.is_dirty() {
        match sync.save(SaveTrigger::Explicit).await {
            SaveOutcome::Saved { .. } => info!("Pending changes saved"),
            SaveOutcome::Conflict => {
                warn!("Page changed remotely; run again to overwrite it with the local file")
            }
            SaveOutcome::Failed(e) => error!("Failed to save pending changes: {}", e),
            outcome => debug!(?outcome, "Final save skipped"),
        }
    }

    sync.close();
    info!("Shutting down");
    Ok(())
}
