//! smart-route
//!
//! Command line front end for the routing rule engine.
//!
//! ```text
//! smart-route check <FILE>          parse rule text, print rules and warnings
//! smart-route choose ...            run one routing decision
//! smart-route watch [--config F]    hot-reload the configured rule file until stopped
//! ```

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use smart_route::config::loader::load_config;
use smart_route::config::watcher::RuleFileWatcher;
use smart_route::lifecycle::shutdown::Shutdown;
use smart_route::lifecycle::{signals, startup};
use smart_route::observability::{logging, metrics};
use smart_route::routing::{RequestContext, Server};
use smart_route::rules::parser;
use smart_route::EngineConfig;

#[derive(Parser)]
#[command(name = "smart-route")]
#[command(about = "Rule-driven client-side routing decisions", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a rule file and print the resulting rule set
    Check {
        file: PathBuf,
    },
    /// Decide where one call would go
    Choose {
        /// Rule file to decide against (overrides rules.path)
        #[arg(short, long)]
        rules: Option<PathBuf>,
        #[arg(short, long)]
        service: String,
        #[arg(long)]
        client_ip: Option<String>,
        #[arg(long)]
        user: Option<String>,
        /// Per-call debug host override
        #[arg(long)]
        debug_server: Option<String>,
        #[arg(long)]
        local_debug: bool,
        /// Candidate server, host:port (repeatable)
        #[arg(long = "candidate", required = true)]
        candidates: Vec<Server>,
    },
    /// Keep the rule set hot-reloaded until SIGINT/SIGTERM
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Check { file } => {
            logging::init_logging("warn");
            check(&file)
        }
        Commands::Choose {
            rules,
            service,
            client_ip,
            user,
            debug_server,
            local_debug,
            candidates,
        } => {
            logging::init_logging("warn");
            let mut config = config;
            if let Some(rules) = rules {
                config.rules.path = rules.display().to_string();
            }
            let runtime = startup::start(&config);

            let ctx = RequestContext {
                service_id: service,
                debug_server_ip: debug_server,
                local_debug,
                client_ip,
                client_user_id: user,
                candidates,
            };
            let (decision, server) = runtime.router.choose_with_decision(&ctx);
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "decision": decision,
                    "server": server.map(|s| s.to_string()),
                }))?
            );
            Ok(())
        }
        Commands::Watch => watch(config).await,
    }
}

fn check(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read(file)?;
    let parsed = parser::parse(&raw)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "rules": parsed.rule_set,
            "warnings": parsed.warnings,
            "ignored": parsed.ignored,
        }))?
    );
    Ok(())
}

async fn watch(config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&config.observability.log_level);
    tracing::info!("smart-route v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let runtime = startup::start(&config);
    let shutdown = Arc::new(Shutdown::new());

    let (watcher, changes) = RuleFileWatcher::new(
        Path::new(&config.rules.path),
        Duration::from_secs(config.rules.poll_interval_secs),
    );
    let reload_tx = watcher.sender();
    // Dropping the handle stops the watch, so keep it until exit.
    let _watch_handle = if config.rules.watch {
        Some(watcher.run()?)
    } else {
        tracing::info!("Rule file watching disabled, reload with SIGHUP");
        None
    };

    let signal_task = tokio::spawn(signals::handle_signals(shutdown.clone(), reload_tx));

    runtime.reloader.clone().run(changes, shutdown.subscribe()).await;

    if !shutdown.is_triggered() {
        tracing::warn!("Rule change channel closed, stopping");
    }
    shutdown.trigger();
    if let Ok(Err(e)) = signal_task.await {
        tracing::error!(error = %e, "Signal handler failed");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
