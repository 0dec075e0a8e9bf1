//! Command implementations.
//!
//! Each invocation is a fresh worker instance. The registration file in the
//! cache directory tells it which version is installed or active, the way a
//! browser would remember it between page loads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use crumbcache_core::cache::{CacheStorage, DiskStorage};
use crumbcache_core::config::{Config, WorkerConfig};
use crumbcache_core::net::{resolve_url, HttpFetcher, Request, RequestMode};
use crumbcache_core::utils::{format_bytes, truncate_string};
use crumbcache_core::worker::{
    ClickOutcome, NotificationClick, OfflineCacheManager, Registration, ResponseSource, SyncOutcome,
    WorkerEvent, WorkerState,
};
use crumbcache_core::{EventReply, Method};
use tracing::{debug, info};

use crate::cli::{Commands, ConfigCommand, FetchArgs, MessageCommand, Overrides};
use crate::host::ConsoleHost;

/// Body preview length for `fetch`
const BODY_PREVIEW_CHARS: usize = 300;

/// Resolved settings for one invocation.
pub struct Invocation {
    pub config: Config,
    pub worker: WorkerConfig,
    pub cache_dir: PathBuf,
}

impl Invocation {
    /// Apply command-line overrides on top of the config file.
    pub fn resolve(mut config: Config, overrides: &Overrides) -> Result<Self> {
        if let Some(profile) = overrides.profile {
            config.profile = profile;
        }
        if let Some(ref origin) = overrides.origin {
            config.origin = Some(origin.clone());
        }
        if let Some(ref dir) = overrides.cache_dir {
            config.cache_dir = Some(dir.clone());
        }

        let worker = config.worker_config();
        worker
            .validate()
            .with_context(|| format!("Invalid {} worker config", config.profile.as_str()))?;
        let cache_dir = config.cache_dir().context("Could not determine cache directory")?;

        Ok(Self {
            config,
            worker,
            cache_dir,
        })
    }

    fn storage_dir(&self) -> PathBuf {
        self.cache_dir.join("caches")
    }

    fn registration(&self) -> Result<Registration> {
        let mut registration = Registration::new(self.cache_dir.clone());
        registration.load()?;
        Ok(registration)
    }

    async fn manager(&self, state: WorkerState) -> Result<OfflineCacheManager> {
        self.manager_for(self.worker.clone(), state).await
    }

    async fn manager_for(&self, worker: WorkerConfig, state: WorkerState) -> Result<OfflineCacheManager> {
        let storage = Arc::new(DiskStorage::new(self.storage_dir()).await?);
        let fetcher = Arc::new(HttpFetcher::new()?);
        let manager =
            OfflineCacheManager::resume(worker, storage, fetcher, Arc::new(ConsoleHost::new()), state)?;
        Ok(manager)
    }

    /// Worker for the version currently controlling pages. While the
    /// configured version waits or has failed, that is the recorded active one.
    async fn serving_manager(&self) -> Result<OfflineCacheManager> {
        let (worker, state) = self.registration()?.serving(&self.worker);
        if worker.version != self.worker.version {
            debug!(
                configured = %self.worker.version,
                serving = %worker.version,
                "Configured version is not active"
            );
        }
        self.manager_for(worker, state).await
    }
}

pub async fn run(command: Commands, overrides: &Overrides) -> Result<()> {
    // Config commands should work even when the config itself is broken.
    if let Commands::Config(ConfigCommand::Path) = command {
        println!("{}", Config::config_path()?.display());
        return Ok(());
    }

    let config = Config::load().context("Failed to load config")?;
    let ctx = Invocation::resolve(config, overrides)?;
    debug!(profile = ctx.config.profile.as_str(), cache_dir = ?ctx.cache_dir, "Invocation resolved");

    match command {
        Commands::Install { force } => install(&ctx, force).await,
        Commands::Activate => activate(&ctx).await,
        Commands::Fetch(args) => fetch(&ctx, args).await,
        Commands::Message(message) => message_command(&ctx, message).await,
        Commands::Push { text } => push(&ctx, text).await,
        Commands::Click { action } => click(&ctx, action).await,
        Commands::Sync { tag } => sync(&ctx, tag).await,
        Commands::Status => status(&ctx).await,
        Commands::Reset => reset(&ctx).await,
        Commands::Config(ConfigCommand::Init { force }) => {
            init_config(&ctx.config, &Config::config_path()?, force)
        }
        Commands::Config(ConfigCommand::Show) => {
            println!("{}", serde_json::to_string_pretty(&ctx.worker)?);
            Ok(())
        }
        Commands::Config(ConfigCommand::Path) => {
            println!("{}", Config::config_path()?.display());
            Ok(())
        }
    }
}

async fn install(ctx: &Invocation, force: bool) -> Result<()> {
    let mut registration = ctx.registration()?;
    let current = registration.state_for(&ctx.worker);
    if current != WorkerState::Parsed && !force {
        println!(
            "Version {} is already {}; use --force to reinstall",
            ctx.worker.version, current
        );
        return Ok(());
    }

    let manager = ctx.manager(WorkerState::Parsed).await?;
    manager
        .dispatch(WorkerEvent::Install)
        .await
        .with_context(|| format!("Install of version {} failed", ctx.worker.version))?;

    registration.record_installed(&ctx.worker);
    registration.save()?;
    info!(version = %ctx.worker.version, "Installed");
    println!(
        "Installed {} ({} files in {})",
        ctx.worker.version,
        ctx.worker.precache.len(),
        manager.precache_name()
    );

    if manager.skip_waiting_requested() {
        activate_with(ctx, &mut registration).await?;
    } else if let Some(active) = registration.active_version() {
        println!("Waiting behind active version {}", active);
    }
    Ok(())
}

async fn activate(ctx: &Invocation) -> Result<()> {
    let mut registration = ctx.registration()?;
    match registration.state_for(&ctx.worker) {
        WorkerState::Installed => activate_with(ctx, &mut registration).await,
        WorkerState::Activated => {
            println!("Version {} is already active", ctx.worker.version);
            Ok(())
        }
        _ => bail!("Version {} is not installed; run `crumbcache install` first", ctx.worker.version),
    }
}

async fn activate_with(ctx: &Invocation, registration: &mut Registration) -> Result<()> {
    let manager = ctx.manager(WorkerState::Installed).await?;
    let reply = manager.dispatch(WorkerEvent::Activate).await?;

    registration.record_activated(&ctx.worker);
    registration.save()?;

    if let EventReply::Activated(report) = reply {
        for name in &report.deleted {
            println!("Deleted old cache {}", name);
        }
        for name in &report.failed {
            println!("Could not delete old cache {}", name);
        }
    }
    println!("Activated {}", ctx.worker.version);
    Ok(())
}

async fn fetch(ctx: &Invocation, args: FetchArgs) -> Result<()> {
    let manager = ctx.serving_manager().await?;
    if manager.state() != WorkerState::Activated {
        println!("No active version; request will pass through");
    } else if manager.config().version != ctx.worker.version {
        println!("Served by active version {}", manager.config().version);
    }

    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid method {}", args.method))?;
    let url = resolve_url(manager.origin(), &args.url)?;
    let mode = if args.navigate {
        RequestMode::Navigate
    } else {
        RequestMode::SameOrigin
    };

    let reply = manager
        .dispatch(WorkerEvent::Fetch(Request::new(method, url, mode)))
        .await?;
    let EventReply::Fetch(outcome) = reply else {
        bail!("Unexpected reply to fetch");
    };

    let (Some(response), Some(source)) = (outcome.response(), outcome.source()) else {
        println!("Not intercepted (pass-through)");
        return Ok(());
    };

    let source = match source {
        ResponseSource::Cache => "cache",
        ResponseSource::Network => "network",
        ResponseSource::OfflinePage => "offline page",
        ResponseSource::OfflineFallback => "offline fallback",
    };
    println!("{} {} (from {})", response.status, response.status_text, source);
    if let Some(content_type) = response.content_type() {
        println!("Content-Type: {}", content_type);
    }
    println!("Length: {}", format_bytes(response.body.len()));
    println!();

    let text = response.text();
    if args.full {
        println!("{}", text);
    } else {
        println!("{}", truncate_string(&text, BODY_PREVIEW_CHARS));
    }
    Ok(())
}

async fn message_command(ctx: &Invocation, message: MessageCommand) -> Result<()> {
    let manager = ctx.serving_manager().await?;
    let value = match message {
        MessageCommand::SkipWaiting => serde_json::json!({ "type": "SKIP_WAITING" }),
        MessageCommand::StoreData { json } => {
            let payload: serde_json::Value =
                serde_json::from_str(&json).context("Payload is not valid JSON")?;
            serde_json::json!({ "type": "STORE_DATA", "payload": payload })
        }
    };
    manager.dispatch(WorkerEvent::Message(value)).await?;

    if manager.skip_waiting_requested() {
        let mut registration = ctx.registration()?;
        if registration.state_for(&ctx.worker) == WorkerState::Installed {
            activate_with(ctx, &mut registration).await?;
        }
    } else {
        println!("Stored data at {}", manager.config().store_data_key);
    }
    Ok(())
}

async fn push(ctx: &Invocation, text: Option<String>) -> Result<()> {
    let manager = ctx.serving_manager().await?;
    manager.dispatch(WorkerEvent::Push(text)).await?;
    Ok(())
}

async fn click(ctx: &Invocation, action: Option<String>) -> Result<()> {
    let manager = ctx.serving_manager().await?;
    let reply = manager
        .dispatch(WorkerEvent::NotificationClick(NotificationClick {
            action,
            ..NotificationClick::default()
        }))
        .await?;

    if let EventReply::Click(ClickOutcome::Dismissed) = reply {
        println!("Notification dismissed");
    }
    Ok(())
}

async fn sync(ctx: &Invocation, tag: String) -> Result<()> {
    let manager = ctx.serving_manager().await?;
    let reply = manager.dispatch(WorkerEvent::Sync(tag.clone())).await?;

    match reply {
        EventReply::Sync(SyncOutcome::UnknownTag) => println!("No sync task for tag {}", tag),
        EventReply::Sync(SyncOutcome::Completed { refreshed }) => {
            println!("Sync {} refreshed {} resources", tag, refreshed)
        }
        EventReply::Sync(SyncOutcome::Failed { errors }) => {
            for error in &errors {
                println!("  {}", error);
            }
            bail!("Sync {} failed for {} resources", tag, errors.len());
        }
        _ => {}
    }
    Ok(())
}

async fn status(ctx: &Invocation) -> Result<()> {
    let registration = ctx.registration()?;
    println!("Profile:  {}", ctx.config.profile.as_str());
    println!("Origin:   {}", ctx.worker.origin);
    println!("Cache:    {}", ctx.cache_dir.display());
    println!("Active:   {}", registration.active_version().unwrap_or("none"));
    println!("Waiting:  {}", registration.waiting_version().unwrap_or("none"));
    println!();

    let storage = DiskStorage::new(ctx.storage_dir()).await?;
    let names = storage.keys().await?;
    if names.is_empty() {
        println!("No caches");
        return Ok(());
    }

    let mut keep: Vec<String> = ctx.worker.active_cache_set().to_vec();
    for record in [&registration.data.active, &registration.data.waiting].into_iter().flatten() {
        keep.push(record.precache.clone());
        keep.push(record.runtime.clone());
    }
    for name in names {
        let entries = storage.entries(&name).await?;
        let bytes: usize = entries.iter().map(|e| e.size()).sum();
        let marker = if keep.contains(&name) { "" } else { " (stale)" };
        println!("{}{}: {} entries, {}", name, marker, entries.len(), format_bytes(bytes));
        for entry in entries {
            println!(
                "  {} {} {} {}",
                entry.response.status,
                entry.key.url,
                format_bytes(entry.size()),
                entry.age_display()
            );
        }
    }
    Ok(())
}

/// Forget every version and delete every cache partition.
async fn reset(ctx: &Invocation) -> Result<()> {
    let storage = DiskStorage::new(ctx.storage_dir()).await?;
    for name in storage.keys().await? {
        if storage.delete(&name).await? {
            println!("Deleted cache {}", name);
        }
    }

    let mut registration = ctx.registration()?;
    registration.clear()?;
    info!(cache_dir = ?ctx.cache_dir, "Registration cleared");
    println!("Registration cleared");
    Ok(())
}

/// Write the effective settings to `path` so later runs need no flags.
fn init_config(config: &Config, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; use --force to overwrite", path.display());
    }
    config
        .save_to(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
