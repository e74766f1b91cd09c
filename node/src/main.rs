use anyhow::{Context, Result};
use cantus_registry::WorkRegistry;
use cantus_rpc::{start_server, AppState};
use cantus_storage::SledStore;
use cantus_types::SystemClock;
use clap::Parser;
use config::{Config, File as ConfigFile};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CANTUS_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "cantus-node", version = CANTUS_VERSION, about = "Cantus song ownership registry node")]
struct Cli {
    /// Path to a TOML config file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address the RPC server listens on.
    #[arg(long)]
    rpc_addr: Option<String>,

    /// Directory for the sled database.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Log filter, e.g. `info` or `cantus_registry=debug,info`.
    #[arg(long)]
    log_level: Option<String>,

    /// Name this node reports in API responses.
    #[arg(long)]
    node_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodeConfig {
    node_id: String,
    rpc_addr: String,
    db_path: PathBuf,
    log_level: String,
}

fn load_config(cli: &Cli) -> Result<NodeConfig> {
    let mut builder = Config::builder()
        .set_default("node_id", "cantus-node")?
        .set_default("rpc_addr", "127.0.0.1:8080")?
        .set_default("db_path", "./data/registry")?
        .set_default("log_level", "info")?;

    if let Some(path) = &cli.config {
        builder = builder.add_source(ConfigFile::from(path.as_path()));
    }
    builder = builder.add_source(config::Environment::with_prefix("CANTUS"));

    let mut cfg: NodeConfig = builder
        .build()
        .context("failed to load configuration")?
        .try_deserialize()
        .context("invalid configuration")?;

    if let Some(rpc_addr) = &cli.rpc_addr {
        cfg.rpc_addr = rpc_addr.clone();
    }
    if let Some(db_path) = &cli.db_path {
        cfg.db_path = db_path.clone();
    }
    if let Some(log_level) = &cli.log_level {
        cfg.log_level = log_level.clone();
    }
    if let Some(node_id) = &cli.node_id {
        cfg.node_id = node_id.clone();
    }

    Ok(cfg)
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Logs every committed registration, standing in for an external indexer.
async fn run_event_logger(registry: Arc<WorkRegistry>) {
    let mut events = registry.subscribe();
    loop {
        match events.recv().await {
            Ok(event) => {
                info!(
                    id = event.id.as_u64(),
                    registrant = %event.registrant,
                    title = %event.title,
                    creator = %event.creator,
                    registered_at = event.registered_at,
                    "work registered"
                );
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "event logger lagged behind the registry");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    init_tracing(&cfg.log_level);

    info!(
        version = CANTUS_VERSION,
        node_id = %cfg.node_id,
        rpc_addr = %cfg.rpc_addr,
        db_path = %cfg.db_path.display(),
        "starting cantus node"
    );

    let store = Arc::new(
        SledStore::open(&cfg.db_path)
            .with_context(|| format!("failed to open registry store at {}", cfg.db_path.display()))?,
    );
    let registry = Arc::new(WorkRegistry::new(store, Arc::new(SystemClock::new())));

    tokio::spawn(run_event_logger(registry.clone()));

    let state = AppState::new(registry.clone(), cfg.node_id.clone());
    let rpc_addr = cfg.rpc_addr.clone();
    let server = tokio::spawn(async move { start_server(state, &rpc_addr).await });

    tokio::select! {
        result = server => {
            match result {
                Ok(Ok(())) => warn!("RPC server exited"),
                Ok(Err(err)) => error!(%err, "RPC server failed"),
                Err(err) => error!(%err, "RPC server task panicked"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    registry
        .flush()
        .context("failed to flush registry store on shutdown")?;
    info!("cantus node stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("cantus-node").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_apply_without_config_file() {
        let cfg = load_config(&cli_with(&[])).unwrap();
        assert_eq!(cfg.node_id, "cantus-node");
        assert_eq!(cfg.rpc_addr, "127.0.0.1:8080");
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn cli_flags_override_defaults() {
        let cfg = load_config(&cli_with(&[
            "--rpc-addr",
            "0.0.0.0:9999",
            "--node-id",
            "registry-1",
            "--log-level",
            "debug",
        ]))
        .unwrap();
        assert_eq!(cfg.rpc_addr, "0.0.0.0:9999");
        assert_eq!(cfg.node_id, "registry-1");
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn config_file_layered_under_cli_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cantus.toml");
        std::fs::write(
            &path,
            "node_id = \"from-file\"\nrpc_addr = \"127.0.0.1:7000\"\n",
        )
        .unwrap();

        let cfg = load_config(&cli_with(&[
            "--config",
            path.to_str().unwrap(),
            "--node-id",
            "from-cli",
        ]))
        .unwrap();
        assert_eq!(cfg.node_id, "from-cli");
        assert_eq!(cfg.rpc_addr, "127.0.0.1:7000");
        assert_eq!(cfg.log_level, "info");
    }
}
