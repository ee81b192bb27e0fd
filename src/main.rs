use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use catalogd::catalog::{GitSourceProvider, RefreshCoordinator};
use catalogd::config::ServiceConfig;
use catalogd::server::{AppState, create_router};
use catalogd::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "catalogd")]
#[command(about = "A template catalog service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Config file (TOML, or JSON with a top-level "catalogs" object)
    #[arg(long, default_value = "./catalogd.toml")]
    config: PathBuf,

    /// Data directory for the database (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory for catalog checkouts (overrides the config file)
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync catalogs and serve them
    Serve {
        #[command(flatten)]
        common: CommonArgs,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Seconds between catalog refreshes
        #[arg(long)]
        refresh_interval: Option<u64>,
    },

    /// Refresh every catalog once and exit non-zero on any error
    Validate {
        #[command(flatten)]
        common: CommonArgs,
    },
}

fn load_config(common: &CommonArgs) -> anyhow::Result<ServiceConfig> {
    let mut config = ServiceConfig::load(&common.config)?;
    if let Some(data_dir) = &common.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(cache_dir) = &common.cache_dir {
        config.cache_dir = cache_dir.clone();
    }
    Ok(config)
}

fn build_coordinator(
    config: &ServiceConfig,
) -> anyhow::Result<(Arc<dyn Store>, Arc<RefreshCoordinator>)> {
    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create {}", config.data_dir.display()))?;

    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(config.db_path())?);
    store.initialize()?;

    let coordinator = Arc::new(RefreshCoordinator::new(
        Arc::clone(&store),
        Arc::new(GitSourceProvider::new(&config.cache_dir)),
        config.catalogs.clone(),
    ));
    Ok((store, coordinator))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("catalogd=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { common } => {
            let config = load_config(&common)?;
            let (_store, coordinator) = build_coordinator(&config)?;

            let results = tokio::task::spawn_blocking(move || coordinator.startup(true)).await?;
            match results {
                Ok(results) => info!("Validated {} catalogs", results.len()),
                Err(e) => {
                    error!("{}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Serve {
            common,
            host,
            port,
            refresh_interval,
        } => {
            let mut config = load_config(&common)?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(secs) = refresh_interval {
                config.refresh_interval_secs = secs;
            }
            config.validate()?;

            let (store, coordinator) = build_coordinator(&config)?;

            let initial = Arc::clone(&coordinator);
            tokio::task::spawn_blocking(move || initial.startup(false)).await??;

            tokio::spawn(Arc::clone(&coordinator).run(config.refresh_interval()));

            let state = Arc::new(AppState::new(store, coordinator));
            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting catalog service on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
