use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;

mod config;
use config::Config;

use serpent_chaos::{
    spawn_inventory, BindingManager, CandidateSource, ClusterOps, DeleteDispatcher, DirectSource,
    DryRunOps, ProducerConfig, QueueSource, StatusLine,
};
use serpent_core::ResourceKind;
use serpent_game::{Game, ARENA_HEIGHT, ARENA_WIDTH};
use serpent_kubehub::KindRegistry;

#[derive(Parser, Debug)]
#[command(
    name = "serpent",
    version,
    about = "Play snake in your terminal and wreak havoc on your Kubernetes cluster"
)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Append-only log file (the terminal is owned by the game)
    #[arg(long = "log-file", default_value = "serpent.log")]
    log_file: PathBuf,

    /// Log deletions instead of performing them
    #[arg(long = "dry-run", action = ArgAction::SetTrue)]
    dry_run: bool,
}

fn init_tracing(path: &Path) -> Result<()> {
    let env = std::env::var("SERPENT_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("SERPENT_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid SERPENT_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref())?;
    init_tracing(&cli.log_file)?;
    init_metrics();

    let kinds = cfg.kinds()?;
    let filter = cfg.filter();
    info!(?kinds, dry_run = cli.dry_run, "serpent starting");

    let client = serpent_kubehub::get_kube_client()
        .await
        .context("connecting to the cluster")?;
    let registry = KindRegistry::new(client);
    let ops: Arc<dyn ClusterOps> = if cli.dry_run {
        Arc::new(DryRunOps(registry))
    } else {
        Arc::new(registry)
    };

    let (queue_rx, producer) = spawn_inventory(
        ops.clone(),
        ProducerConfig {
            kinds: kinds.clone(),
            filter: filter.clone(),
            queue_capacity: cfg.queue_capacity,
            interval: Duration::from_millis(cfg.sample_interval_ms),
        },
    );

    let status = StatusLine::new();
    let dispatcher = Arc::new(DeleteDispatcher::new(ops.clone(), status.clone()));
    let fallback_timeout = Duration::from_millis(cfg.fallback_timeout_ms);
    let sources: Vec<Box<dyn CandidateSource>> = vec![
        Box::new(QueueSource::new(queue_rx)),
        Box::new(DirectSource::new(
            ops.clone(),
            kinds.clone(),
            filter.clone(),
            fallback_timeout,
        )),
    ];
    let mut manager = BindingManager::new(sources, dispatcher, status.clone());
    if cfg.fallback_delete_on_unbound {
        manager = manager.with_unbound_fallback(Box::new(DirectSource::new(
            ops.clone(),
            vec![ResourceKind::Pod],
            filter.clone(),
            fallback_timeout,
        )));
    }

    let game = Game::new(ARENA_WIDTH, ARENA_HEIGHT);
    let score = serpent_game::tui::run(game, manager, status).await?;

    // Abrupt shutdown is fine: in-flight deletions are idempotent upstream
    // and the producer is a best-effort side channel.
    producer.abort();
    println!("final score: {score}");
    Ok(())
}
