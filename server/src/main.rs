use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use docanalyzer::config::QueueBackend;
use docanalyzer::{logging, AnalyzerError, ConfigError, Runtime, WorkerPool};
use docanalyzer_server::{build_router, AppState};

/// Asynchronous document analysis service.
#[derive(Parser)]
#[command(name = "docanalyzer-server", version)]
struct Cli {
    /// Path to a JSON configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API, with an embedded worker pool unless disabled.
    Serve {
        /// Only accept and report jobs; leave execution to `worker` processes.
        #[arg(long)]
        no_workers: bool,
    },

    /// Run a worker pool against the shared database, without HTTP.
    Worker,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match docanalyzer::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting docanalyzer v{}", env!("CARGO_PKG_VERSION"));

    let result = Runtime::open(config).and_then(|runtime| match cli.command {
        Commands::Serve { no_workers } => serve(runtime, no_workers),
        Commands::Worker => work(runtime),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn start_pool(runtime: &Runtime) -> Result<WorkerPool, AnalyzerError> {
    let executor = runtime.default_executor()?;
    runtime.start_workers(executor)
}

fn serve(runtime: Runtime, no_workers: bool) -> Result<(), AnalyzerError> {
    let addr: SocketAddr = runtime.config().server.bind.parse().map_err(|e| {
        ConfigError::Validation {
            message: format!("server.bind: {}", e),
        }
    })?;

    let pool = if no_workers {
        info!("Embedded workers disabled");
        None
    } else {
        Some(start_pool(&runtime)?)
    };

    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AnalyzerError::io("Failed to start async runtime", e))?;

    let app = build_router(AppState::new(runtime));
    let served = tokio_runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on http://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    info!("Server stopped accepting connections");
    if let Some(pool) = pool {
        pool.shutdown();
        pool.wait();
    }

    served.map_err(|e| AnalyzerError::io(format!("HTTP server on {}", addr), e))
}

fn work(runtime: Runtime) -> Result<(), AnalyzerError> {
    if runtime.config().queue.backend != QueueBackend::Sqlite {
        return Err(ConfigError::Validation {
            message: "the worker command needs queue.backend = \"sqlite\"; the memory queue \
                      is only reachable inside the serving process"
                .to_string(),
        }
        .into());
    }

    let pool = start_pool(&runtime)?;

    let signals = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AnalyzerError::io("Failed to start signal runtime", e))?;
    info!("Worker process running; press Ctrl-C to stop");
    signals.block_on(shutdown_signal());

    pool.shutdown();
    pool.wait();
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
