use clap::{Parser, Subcommand};
use distributed_search::cache::backend::MemoryCacheBackend;
use distributed_search::cache::manager::ResultCache;
use distributed_search::config::{Config, LauncherKind};
use distributed_search::coordinator::client::HttpUnitClient;
use distributed_search::coordinator::handlers::router;
use distributed_search::coordinator::service::Coordinator;
use distributed_search::lifecycle::launcher::{InProcessLauncher, ProcessLauncher, UnitLauncher};
use distributed_search::lifecycle::manager::LifecycleManager;
use distributed_search::pool::service::WorkerPool;
use distributed_search::search::index::IndexKind;
use distributed_search::search::types::SearchOptions;
use distributed_search::unit::client::{CoordinatorClient, HttpCoordinatorClient};
use distributed_search::unit::datastore::{Datastore, MemoryDatastore};
use distributed_search::unit::handlers::serve;
use distributed_search::unit::service::SearchUnit;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

#[derive(Parser)]
#[command(name = "distributed-search", version, about = "Partitioned full-text search cluster")]
struct Cli {
    /// Maximum log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    /// TOML configuration file. Flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs the partition coordinator and its management API.
    Coordinator {
        #[arg(long)]
        bind: Option<String>,
        /// Corpus file (.json or one record per line).
        #[arg(long)]
        data: PathBuf,
        /// Overrides the corpus size taken from the data file.
        #[arg(long)]
        total_data_size: Option<usize>,
        #[arg(long, value_enum)]
        launcher: Option<LauncherKind>,
        #[arg(long)]
        max_units: Option<usize>,
        /// Units to start right away.
        #[arg(long, default_value_t = 0)]
        units: usize,
        #[arg(long, value_enum, default_value_t = IndexKind::Token)]
        index: IndexKind,
    },
    /// Runs one search unit that registers with a coordinator.
    Unit {
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long)]
        port: u16,
        #[arg(long)]
        coordinator: String,
        #[arg(long)]
        data: PathBuf,
        #[arg(long, value_enum, default_value_t = IndexKind::Token)]
        index: IndexKind,
    },
    /// Runs one query through an in-process worker pool and prints the result.
    Local {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_enum, default_value_t = IndexKind::Token)]
        index: IndexKind,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Coordinator {
            bind,
            data,
            total_data_size,
            launcher,
            max_units,
            units,
            index,
        } => {
            if let Some(bind) = bind {
                config.coordinator.bind = bind;
            }
            if let Some(total) = total_data_size {
                config.coordinator.total_data_size = Some(total);
            }
            if let Some(launcher) = launcher {
                config.lifecycle.launcher = launcher;
            }
            if let Some(max_units) = max_units {
                config.lifecycle.max_units = max_units;
            }
            run_coordinator(config, data, units, index, cli.log_level).await
        }
        Command::Unit {
            id,
            host,
            port,
            coordinator,
            data,
            index,
        } => {
            let id = id.unwrap_or_else(|| format!("unit-{}", port));
            run_unit(id, host, port, coordinator, data, index).await
        }
        Command::Local {
            data,
            workers,
            query,
            limit,
            index,
        } => {
            if let Some(workers) = workers {
                config.pool.worker_count = workers;
            }
            run_local(config, data, query, limit, index).await
        }
    }
}

fn index_arg(kind: IndexKind) -> &'static str {
    match kind {
        IndexKind::Token => "token",
        IndexKind::Scan => "scan",
    }
}

async fn run_coordinator(
    config: Config,
    data: PathBuf,
    initial_units: usize,
    index: IndexKind,
    log_level: tracing::Level,
) -> anyhow::Result<()> {
    let datastore: Arc<dyn Datastore> = Arc::new(MemoryDatastore::load(&data)?);
    let total = match config.coordinator.total_data_size {
        Some(total) => total,
        None => datastore.count_all().await?,
    };

    tracing::info!("Starting coordinator on {}", config.coordinator.bind);
    tracing::info!("Corpus {} holds {} records", data.display(), total);

    // 1. Result cache:
    let cache = Arc::new(ResultCache::new(
        Arc::new(MemoryCacheBackend::new()),
        config.cache.clone(),
    ));

    // 2. Coordinator and background health probing:
    let coordinator = Coordinator::new(
        config.coordinator.clone(),
        total,
        Arc::new(HttpUnitClient::new()),
        cache.clone(),
    );
    let _health = coordinator.spawn_health_checks();

    // 3. Unit lifecycle:
    let coordinator_url = format!("http://{}", config.coordinator.bind);
    let launcher: Arc<dyn UnitLauncher> = match config.lifecycle.launcher {
        LauncherKind::Process => {
            let data_arg = data.to_string_lossy().into_owned();
            Arc::new(ProcessLauncher::current_exe(vec![
                "--data".to_string(),
                data_arg,
                "--index".to_string(),
                index_arg(index).to_string(),
                "--log-level".to_string(),
                log_level.to_string(),
            ])?)
        }
        LauncherKind::InProcess => Arc::new(InProcessLauncher::new(
            datastore.clone(),
            index,
            coordinator.clone(),
        )),
    };
    let lifecycle = LifecycleManager::new(
        config.lifecycle.clone(),
        coordinator_url,
        launcher,
        coordinator.clone(),
    );

    // 4. HTTP server:
    let app = router(coordinator.clone(), Some(lifecycle.clone()), cache);
    let listener = TcpListener::bind(&config.coordinator.bind).await?;
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);

    // 5. Initial units, once the coordinator can take registrations:
    if initial_units > 0 {
        let starter = lifecycle.clone();
        tokio::spawn(async move {
            match starter.reconcile(initial_units).await {
                Ok(report) => tracing::info!(
                    "Started {} of {} initial units",
                    report.current_count,
                    report.target_count
                ),
                Err(e) => tracing::error!("Initial unit start failed: {}", e),
            }
        });
    }

    tracing::info!("Press Ctrl+C to shutdown");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("Stopping managed units");
    lifecycle.shutdown().await?;
    Ok(())
}

async fn run_unit(
    id: String,
    host: String,
    port: u16,
    coordinator_url: String,
    data: PathBuf,
    index: IndexKind,
) -> anyhow::Result<()> {
    let datastore: Arc<dyn Datastore> = Arc::new(MemoryDatastore::load(&data)?);
    let address = format!("{}:{}", host, port);

    let listener = TcpListener::bind(&address).await?;
    let unit = SearchUnit::new(id.clone(), address.clone(), datastore, index);
    let shutdown = Arc::new(Notify::new());

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.notify_one();
        }
    });

    let server = tokio::spawn(serve(unit.clone(), listener, shutdown));
    tracing::info!("Unit {} serving on {}", id, address);

    let client = HttpCoordinatorClient::new(&coordinator_url);
    if let Err(e) = unit.register(&client).await {
        tracing::error!("Unit {} could not register with {}: {}", id, coordinator_url, e);
    }

    server.await??;

    if let Err(e) = client.deregister(&id).await {
        tracing::debug!("Unit {} deregistration skipped: {}", id, e);
    }
    tracing::info!("Unit {} stopped", id);
    Ok(())
}

async fn run_local(
    config: Config,
    data: PathBuf,
    query: String,
    limit: Option<usize>,
    index: IndexKind,
) -> anyhow::Result<()> {
    let datastore = MemoryDatastore::load(&data)?;
    let records = datastore.fetch_slice(0, datastore.len()).await?;

    let pool = WorkerPool::start(records, Arc::new(index), config.pool).await?;
    let options = SearchOptions {
        limit,
        ..SearchOptions::default()
    };
    let response = pool.search(&query, &options).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    pool.shutdown().await;
    Ok(())
}
