//! Wrench CLI - inspect and replay the offline work queue
//!
//! Usage: wrench <command> [options]

mod transport;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wrench_common::{WrenchError, EXIT_CONFIG_ERROR, EXIT_ERROR};
use wrench_config::{Config, CONFIG_PATH};
use wrench_sync::{
    diff, Clock, Collection, FieldDiff, FileStorage, Method, MutationId, QueuedMutation, SyncConfig,
    SyncEngine, SyncError, SyncEvent, SystemClock, Verb,
};

use crate::transport::HttpTransport;

type CliEngine = SyncEngine<FileStorage, HttpTransport>;

#[derive(Parser)]
#[command(
    name = "wrench",
    version,
    about = "Offline work queue for the Wrench maintenance client"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a .wrench workspace in the current directory
    Init,

    /// Queue a raw request
    Add {
        /// HTTP method (POST, PUT, PATCH, DELETE)
        method: Method,

        /// Server-relative URL, e.g. /api/assets/42
        url: String,

        /// JSON body
        #[arg(long)]
        data: Option<String>,
    },

    /// Queue a create/update/delete of a CMMS entity
    Enqueue {
        /// Collection (assets, departments, locations, work-orders,
        /// preventive-maintenance, parts, purchase-orders, vendors)
        collection: Collection,

        /// create, update or delete
        verb: Verb,

        /// Entity as JSON
        entity: String,
    },

    /// Summarize queue and conflict counts
    Status {
        #[arg(long)]
        json: bool,
    },

    /// List pending mutations in replay order
    List {
        #[arg(long)]
        json: bool,
    },

    /// Replay the queue against the server
    Flush {
        /// Retry failures on the next flush instead of waiting out the backoff
        #[arg(long)]
        no_backoff: bool,

        #[arg(long)]
        json: bool,
    },

    /// Discard every pending mutation
    Clear,

    /// List conflicts awaiting review
    Conflicts {
        #[arg(long)]
        json: bool,
    },

    /// Remove a reviewed conflict
    Dismiss {
        /// Mutation id shown by `wrench conflicts`
        id: String,
    },

    /// Compare two JSON documents field by field
    Diff {
        local: PathBuf,
        server: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    wrench_common::telemetry::init_tracing(cli.verbose, cli.log_json);
    tracing::debug!("Wrench CLI started");

    let result = match cli.command {
        Commands::Init => cmd_init(),
        Commands::Add { method, url, data } => cmd_add(method, url, data).await,
        Commands::Enqueue {
            collection,
            verb,
            entity,
        } => cmd_enqueue(collection, verb, entity).await,
        Commands::Status { json } => cmd_status(json).await,
        Commands::List { json } => cmd_list(json).await,
        Commands::Flush { no_backoff, json } => cmd_flush(!no_backoff, json).await,
        Commands::Clear => cmd_clear().await,
        Commands::Conflicts { json } => cmd_conflicts(json).await,
        Commands::Dismiss { id } => cmd_dismiss(id).await,
        Commands::Diff {
            local,
            server,
            json,
        } => cmd_diff(&local, &server, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

//
// Helper functions
//

fn exit_code(error: &anyhow::Error) -> i32 {
    let config_error = matches!(error.downcast_ref::<WrenchError>(), Some(WrenchError::ConfigError(_)))
        || matches!(error.downcast_ref::<SyncError>(), Some(SyncError::Config(_)));
    if config_error {
        EXIT_CONFIG_ERROR
    } else {
        EXIT_ERROR
    }
}

fn load_config() -> anyhow::Result<Config> {
    let root = std::env::current_dir()?;
    Ok(Config::load(&root)?)
}

fn open_engine(config: &Config) -> anyhow::Result<CliEngine> {
    let storage = FileStorage::new(config.storage_dir());
    let transport = HttpTransport::new(&config.server)?;
    let engine = SyncEngine::new(
        SyncConfig::from_workspace(config),
        Arc::new(storage),
        transport,
        SystemClock,
    )?;
    Ok(engine)
}

fn parse_json(label: &str, text: &str) -> wrench_common::Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| WrenchError::ValidationError(format!("{} is not valid JSON: {}", label, e)))
}

fn read_json(path: &Path) -> wrench_common::Result<Value> {
    if !path.exists() {
        return Err(WrenchError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "(absent)".to_string(),
    }
}

fn print_mutation(index: usize, mutation: &QueuedMutation) {
    eprintln!("{}. [{}] {}", index + 1, mutation.id, mutation.describe());
    if mutation.retries > 0 {
        eprintln!("     retries: {}", mutation.retries);
    }
    if let Some(at) = mutation.next_attempt {
        eprintln!("     next attempt: {}", at.to_rfc3339());
    }
    if let Some(error) = &mutation.error {
        eprintln!("     last error: {}", error);
    }
}

fn print_diff(diffs: &[FieldDiff]) {
    for d in diffs {
        eprintln!("  {}: {} -> {}", d.field, show(d.local.as_ref()), show(d.server.as_ref()));
    }
}

//
// Command implementations
//

fn cmd_init() -> anyhow::Result<()> {
    use std::fs;

    let root = std::env::current_dir()?;
    let wrench_dir = root.join(".wrench");

    if !wrench_dir.exists() {
        fs::create_dir(&wrench_dir)?;
        eprintln!("✓ Created .wrench/");
    } else {
        eprintln!("✓ .wrench/ already exists");
    }

    let config_path = root.join(CONFIG_PATH);
    let config = if !config_path.exists() {
        let config = Config::with_root(&root);
        fs::write(&config_path, config.to_toml()?)?;
        eprintln!("✓ Created {}", CONFIG_PATH);
        config
    } else {
        eprintln!("✓ {} already exists", CONFIG_PATH);
        Config::load(&root)?
    };

    let storage_dir = config.storage_dir();
    if !storage_dir.exists() {
        fs::create_dir_all(&storage_dir)?;
        eprintln!("✓ Created {}", config.storage.dir.display());
    }

    // queued mutations are per-device state
    let gitignore_path = root.join(".gitignore");
    let entry = format!("{}/", config.storage.dir.display());
    if gitignore_path.exists() {
        let content = fs::read_to_string(&gitignore_path)?;
        if !content.lines().any(|line| line.trim() == entry) {
            let separator = if content.ends_with('\n') || content.is_empty() { "" } else { "\n" };
            fs::write(&gitignore_path, format!("{}{}\n# Wrench\n{}\n", content, separator, entry))?;
            eprintln!("✓ Updated .gitignore");
        }
    } else {
        fs::write(&gitignore_path, format!("# Wrench\n{}\n", entry))?;
        eprintln!("✓ Created .gitignore");
    }

    eprintln!("\n✅ Workspace initialized successfully!");
    Ok(())
}

async fn cmd_add(method: Method, url: String, data: Option<String>) -> anyhow::Result<()> {
    if method == Method::Get {
        anyhow::bail!("GET requests are reads and are never queued");
    }
    if !url.starts_with('/') {
        anyhow::bail!("URL must be server-relative and start with '/': {}", url);
    }
    let data = match data {
        Some(text) => parse_json("--data", &text)?,
        None => Value::Null,
    };

    let engine = open_engine(&load_config()?)?;
    let queued = engine.add(QueuedMutation::new(method, url, data)).await?;
    eprintln!("✓ Queued {} [{}]", queued.describe(), queued.id);
    Ok(())
}

async fn cmd_enqueue(collection: Collection, verb: Verb, entity: String) -> anyhow::Result<()> {
    let entity = parse_json("entity", &entity)?;

    let engine = open_engine(&load_config()?)?;
    let queued = engine.enqueue(collection, verb, &entity).await?;
    eprintln!("✓ Queued {} [{}]", queued.describe(), queued.id);
    Ok(())
}

async fn cmd_status(json: bool) -> anyhow::Result<()> {
    let config = load_config()?;
    let engine = open_engine(&config)?;

    let pending = engine.pending().await?;
    let now = SystemClock.now();
    let deferred = pending.iter().filter(|m| m.is_deferred(now)).count();
    let retrying = pending.iter().filter(|m| m.retries > 0).count();
    let conflicts = engine.conflicts().await?.len();

    if json {
        return print_json(&json!({
            "pending": pending.len(),
            "retrying": retrying,
            "deferred": deferred,
            "conflicts": conflicts,
            "server": config.server.base_url,
        }));
    }

    eprintln!("📡 Server: {}", config.server.base_url);
    eprintln!("  Pending: {}", pending.len());
    eprintln!("  Retrying: {}", retrying);
    eprintln!("  Waiting for backoff: {}", deferred);
    eprintln!("  Conflicts: {}", conflicts);
    Ok(())
}

async fn cmd_list(json: bool) -> anyhow::Result<()> {
    let engine = open_engine(&load_config()?)?;
    let pending = engine.pending().await?;

    if json {
        return print_json(&pending);
    }

    if pending.is_empty() {
        eprintln!("Queue is empty");
        return Ok(());
    }
    eprintln!("{} pending:", pending.len());
    for (i, mutation) in pending.iter().enumerate() {
        print_mutation(i, mutation);
    }
    Ok(())
}

async fn cmd_flush(enable_backoff: bool, json: bool) -> anyhow::Result<()> {
    let engine = open_engine(&load_config()?)?;
    let mut notices = Vec::new();
    let report = engine
        .flush_observed(enable_backoff, |event| notices.push(event))
        .await?;

    if json {
        let dropped: Vec<&str> = notices
            .iter()
            .filter_map(|event| match event {
                SyncEvent::MutationDropped { summary, .. } => Some(summary.as_str()),
                SyncEvent::ConflictRecorded { .. } => None,
            })
            .collect();
        return print_json(&json!({
            "attempted": report.attempted,
            "delivered": report.delivered,
            "deferred": report.deferred,
            "retried": report.retried,
            "conflicted": report.conflicted,
            "dropped": report.dropped,
            "dropNotices": dropped,
        }));
    }

    for event in &notices {
        match event {
            SyncEvent::MutationDropped { summary, .. } => eprintln!("✗ {}", summary),
            SyncEvent::ConflictRecorded { mutation_id, fields } => {
                eprintln!("⚠ Conflict on [{}]: {}", mutation_id, fields.join(", "))
            }
        }
    }
    eprintln!(
        "✓ Flushed: {} delivered, {} retrying, {} conflicted, {} dropped, {} waiting",
        report.delivered, report.retried, report.conflicted, report.dropped, report.deferred
    );
    Ok(())
}

async fn cmd_clear() -> anyhow::Result<()> {
    let engine = open_engine(&load_config()?)?;
    let count = engine.len().await?;
    engine.clear().await?;
    eprintln!("✓ Cleared {} pending mutations", count);
    Ok(())
}

async fn cmd_conflicts(json: bool) -> anyhow::Result<()> {
    let engine = open_engine(&load_config()?)?;
    let records = engine.conflicts().await?;

    if json {
        return print_json(&records);
    }

    if records.is_empty() {
        eprintln!("No conflicts");
        return Ok(());
    }
    for record in &records {
        eprintln!(
            "⚠ [{}] {} (recorded {})",
            record.mutation.id,
            record.mutation.describe(),
            record.recorded_at.to_rfc3339()
        );
        print_diff(&record.diff);
    }
    Ok(())
}

async fn cmd_dismiss(id: String) -> anyhow::Result<()> {
    let engine = open_engine(&load_config()?)?;
    match engine.dismiss_conflict(&MutationId::from(id.as_str())).await? {
        Some(record) => {
            eprintln!("✓ Dismissed conflict on {}", record.mutation.describe());
            Ok(())
        }
        None => anyhow::bail!("No conflict with id {}", id),
    }
}

fn cmd_diff(local: &Path, server: &Path, json: bool) -> anyhow::Result<()> {
    let local = read_json(local)?;
    let server = read_json(server)?;
    let diffs: Vec<FieldDiff> = diff(&local, &server).into_iter().map(FieldDiff::into_owned).collect();

    if json {
        return print_json(&diffs);
    }

    if diffs.is_empty() {
        eprintln!("No differences");
    } else {
        eprintln!("{} fields differ:", diffs.len());
        print_diff(&diffs);
    }
    Ok(())
}
