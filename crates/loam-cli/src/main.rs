//! LOAM CLI — drive a module runtime from the shell.
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`LOAM_*`)
//! 3. Project config (`.loam/config.toml` in the current directory)
//! 4. Global config (`~/.loam/config.toml`)
//! 5. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `LOAM_DEBUG`: enable debug diagnostics (`true`/`false`)
//! - `LOAM_STORAGE`: archive store root directory
//! - `LOAM_QUEUE_CAPACITY`: event queue capacity
//! - `LOAM_IDLE_TIMEOUT_MS`: event worker idle timeout
//! - `LOAM_DEFAULT_ALLOW`: permission default for grant-less modules
//! - `LOAM_LOG` / `RUST_LOG`: tracing filter directives

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loam_runtime::{ConfigLoader, Framework};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// LOAM — a dynamic module runtime.
#[derive(Parser, Debug)]
#[command(name = "loam")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Archive store root (overrides config and LOAM_STORAGE)
    #[arg(short, long, value_name = "DIR")]
    storage: Option<PathBuf>,

    /// Project root directory (defaults to the current directory)
    #[arg(short = 'C', long)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install a module archive
    Install {
        /// Install location (an opaque identity, e.g. `file:demo`)
        location: String,
        /// Path to the module archive file
        archive: PathBuf,
    },
    /// Start a module by numeric id
    Start { id: u64 },
    /// Stop a module by numeric id
    Stop { id: u64 },
    /// Replace a module's content in place
    Update {
        id: u64,
        /// Path to the new module archive file
        archive: PathBuf,
    },
    /// Uninstall a module by numeric id
    Uninstall { id: u64 },
    /// Refresh modules (all when no ids are given)
    Refresh { ids: Vec<u64> },
    /// Resolve every unresolved module
    Resolve,
    /// Start every module with a persisted start flag
    StartAll,
    /// List installed modules
    List,
    /// Show one module's identity, state and wiring
    Info { id: u64 },
}

fn init_tracing(debug: bool) {
    let default_directive = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("LOAM_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let project_root = args
        .project
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_default();
    let mut config = ConfigLoader::new()
        .with_project_root(&project_root)
        .load()
        .context("loading configuration")?;
    if args.debug {
        config.debug = true;
    }
    if let Some(storage) = args.storage {
        config.paths.storage_root = storage;
    }
    debug!(storage = %config.paths.storage_root.display(), "effective config");

    let framework = Framework::new(config).context("constructing framework")?;
    let restored = framework.restore().await.context("restoring modules")?;
    if restored > 0 {
        debug!(restored, "restored modules from store");
    }

    run(&framework, args.command).await?;
    framework.shutdown().await;
    Ok(())
}

async fn run(framework: &Framework, command: Command) -> Result<()> {
    match command {
        Command::Install { location, archive } => {
            let bytes = std::fs::read(&archive)
                .with_context(|| format!("reading {}", archive.display()))?;
            let ident = framework.install(&location, &bytes).await?;
            println!("installed {ident}");
        }
        Command::Start { id } => {
            framework.start(id).await?;
            println!("started #{id}");
        }
        Command::Stop { id } => {
            framework.stop(id).await?;
            println!("stopped #{id}");
        }
        Command::Update { id, archive } => {
            let bytes = std::fs::read(&archive)
                .with_context(|| format!("reading {}", archive.display()))?;
            framework.update(id, &bytes).await?;
            println!("updated #{id}");
        }
        Command::Uninstall { id } => {
            framework.uninstall(id).await?;
            println!("uninstalled #{id}");
        }
        Command::Refresh { ids } => {
            let ids = if ids.is_empty() { None } else { Some(ids) };
            framework.refresh_modules(ids.as_deref()).await?;
            println!("refreshed");
        }
        Command::Resolve => {
            framework.resolve_all().await?;
            println!("resolved");
        }
        Command::StartAll => {
            framework.start_all().await?;
            println!("started eager modules");
        }
        Command::List => {
            for ident in framework.module_ids() {
                let state = framework
                    .state_of(ident.id)
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                println!("#{:<4} {:<12} {}", ident.id, state, ident);
            }
        }
        Command::Info { id } => {
            let ident = framework
                .module_ids()
                .into_iter()
                .find(|m| m.id == id)
                .with_context(|| format!("no module #{id}"))?;
            let state = framework.state_of(id).unwrap_or_default();
            println!("module   {ident}");
            println!("location {}", ident.location);
            println!("state    {state}");
            match framework.wiring_of(id) {
                Some(wiring) if !wiring.is_empty() => {
                    println!("wires");
                    for wire in &wiring.wires {
                        println!("  {wire}");
                    }
                }
                Some(_) => println!("wires    (none)"),
                None => println!("wires    (unresolved)"),
            }
        }
    }
    Ok(())
}
