use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use versioning::{
    ActionMeta, EditorContext, EditorSession, EngineConfig, HttpBackend, HydrationStatus,
    NavigationOutcome, SaveOutcome, SessionMediaCache, SiteBackend, SiteId, Snapshot,
    TimelineEntry,
};

#[derive(Parser)]
#[command(name = "site-history")]
#[command(about = "Site History CLI - Headless version history for site configurations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Site to operate on
    #[arg(short, long, global = true)]
    site: Option<String>,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Override the API key
    #[arg(long, global = true, env = "SITE_HISTORY_API_KEY")]
    api_key: Option<String>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the version timeline of a site
    Timeline {
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Save a site configuration as a new version
    Save {
        /// Template configuration file (JSON)
        file: PathBuf,

        /// Directory holding files referenced by blob: tokens
        #[arg(long)]
        media_dir: Option<PathBuf>,

        /// Description of the change
        #[arg(short, long, default_value = "Edited site")]
        message: String,

        /// Site display name to write alongside the template
        #[arg(long)]
        name: Option<String>,

        /// Version number to save on top of (defaults to latest)
        #[arg(long)]
        from: Option<u64>,
    },

    /// Print the configuration stored in a version
    Load {
        /// Version number
        version: u64,

        /// Write the configuration to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show which versions a return to latest would move past
    Restore {
        /// Version number currently being viewed
        from: u64,
    },

    /// Write the effective engine configuration to a file
    InitConfig {
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::InitConfig { output } => {
            config.save(&output)?;
            info!("Configuration written to {:?}", output);
            Ok(())
        }
        Commands::Timeline { json } => {
            let site = require_site(cli.site)?;
            timeline_command(config, site, json).await
        }
        Commands::Save {
            file,
            media_dir,
            message,
            name,
            from,
        } => {
            let site = require_site(cli.site)?;
            save_command(config, site, file, media_dir, message, name, from).await
        }
        Commands::Load { version, output } => {
            let site = require_site(cli.site)?;
            load_command(config, site, version, output).await
        }
        Commands::Restore { from } => {
            let site = require_site(cli.site)?;
            restore_command(config, site, from).await
        }
    }
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(url) = &cli.api_url {
        config = EngineConfig {
            api_url: url.trim_end_matches('/').to_string(),
            ..config
        };
    }
    if let Some(key) = &cli.api_key {
        config = config.with_api_key(key.clone());
    }
    Ok(config)
}

fn require_site(site: Option<String>) -> Result<SiteId> {
    site.map(SiteId::new)
        .ok_or_else(|| anyhow!("--site is required for this command"))
}

/// Opens an editing session seeded with the site's newest stored template.
async fn open_session(
    config: EngineConfig,
    site: SiteId,
    media_dir: Option<PathBuf>,
    loaded_version_number: Option<u64>,
) -> Result<EditorSession> {
    let backend = Arc::new(HttpBackend::new(&config)?);

    // Every save writes the site row and the version from the same
    // template, so the newest version mirrors what the row holds.
    let initial = match backend.list_versions(&site).await {
        Ok(records) => records
            .into_iter()
            .max_by_key(|r| r.version_number)
            .map(|r| Snapshot::from_template_config(r.template_config))
            .unwrap_or_else(|| Snapshot::new(serde_json::json!({}))),
        Err(e) => {
            warn!("Could not read current template: {}", e);
            Snapshot::new(serde_json::json!({}))
        }
    };

    let mut media = SessionMediaCache::new();
    if let Some(dir) = media_dir {
        media = media.with_blob_dir(dir);
    }

    let ctx = EditorContext::new(
        site,
        config,
        backend.clone(),
        backend,
        Arc::new(media),
        initial,
    );
    let session = EditorSession::new(Arc::new(ctx));

    match session.hydrate(loaded_version_number).await {
        HydrationStatus::Fresh { versions } => info!("Loaded {} versions", versions),
        HydrationStatus::Stale { reason } => warn!("{}", reason),
    }
    Ok(session)
}

fn find_version(session: &EditorSession, number: u64) -> Result<TimelineEntry> {
    session
        .list_timeline()
        .into_iter()
        .find(|e| e.version_number == number && !e.is_virtual)
        .ok_or_else(|| anyhow!("version {} not found", number))
}

fn print_entry(entry: &TimelineEntry) {
    let mut markers = Vec::new();
    if entry.is_latest {
        markers.push("latest");
    }
    if entry.is_active {
        markers.push("active");
    }
    println!(
        "v{:<4} {}  [{} {}]  {}{}",
        entry.version_number,
        entry.created_at.format("%Y-%m-%d %H:%M"),
        entry.branch_id,
        entry.branch_color,
        entry.title,
        if markers.is_empty() {
            String::new()
        } else {
            format!("  ({})", markers.join(", "))
        }
    );
    for change in &entry.change_list {
        println!("        - {}", change);
    }
}

async fn timeline_command(config: EngineConfig, site: SiteId, json: bool) -> Result<()> {
    let session = open_session(config, site, None, None).await?;
    let mut entries = session.list_timeline();
    entries.sort_by(|a, b| b.version_number.cmp(&a.version_number));

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if let Some(warning) = session.timeline_warning() {
        println!("warning: {}", warning);
    }
    for entry in &entries {
        print_entry(entry);
    }
    Ok(())
}

async fn save_command(
    config: EngineConfig,
    site: SiteId,
    file: PathBuf,
    media_dir: Option<PathBuf>,
    message: String,
    name: Option<String>,
    from: Option<u64>,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let edited = Snapshot::from_template_config(value);

    let session = open_session(config, site, media_dir, from).await?;
    if let Some(number) = from {
        let base = find_version(&session, number)?;
        if let NavigationOutcome::AwaitingDecision = session.load_version(&base.id)? {
            return Err(anyhow!("could not switch to version {}", number));
        }
    }
    if let Some(name) = name {
        session.set_display_name(name);
    }

    info!("Saving {:?}: {}", file, message);
    session.edit(edited, ActionMeta::new("cli", message));

    match session.save().await? {
        SaveOutcome::Saved(version) => {
            println!(
                "Saved v{} ({}) on branch {}: {}",
                version.version_number, version.id, version.metadata.branch_id, version.metadata.title
            );
            for change in &version.metadata.change_list {
                println!("  - {}", change);
            }
        }
        other => {
            if let Some(message) = other.message() {
                println!("{}", message);
            }
        }
    }
    Ok(())
}

async fn load_command(
    config: EngineConfig,
    site: SiteId,
    version: u64,
    output: Option<PathBuf>,
) -> Result<()> {
    let session = open_session(config, site, None, None).await?;
    let entry = find_version(&session, version)?;
    session.load_version(&entry.id)?;

    let template = session.live_snapshot().to_template_config();
    let pretty = serde_json::to_string_pretty(&template)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, pretty).await?;
            info!("Version {} written to {:?}", version, path);
        }
        None => println!("{}", pretty),
    }
    Ok(())
}

async fn restore_command(config: EngineConfig, site: SiteId, from: u64) -> Result<()> {
    let session = open_session(config, site, None, Some(from)).await?;
    find_version(&session, from)?;

    let preview = session.restore_to_latest()?;
    if preview.superseded.is_empty() {
        println!("v{} is already the latest version", from);
        return Ok(());
    }
    println!("Returning to latest moves past {} versions:", preview.superseded.len());
    for entry in &preview.superseded {
        print_entry(entry);
    }
    Ok(())
}
