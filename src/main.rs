use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spinel::server::{parse_args, serve, usage, CliAction, EngineKind};
use spinel::storage::memory::MemoryEngine;
use spinel::storage::raft::{RaftEngine, RAFT_PORT};
use spinel::storage::StorageEngine;
use spinel::version;

/// Entry point: parse the command line, pick a storage engine, and serve
/// RESP clients until the process is terminated.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let action = match parse_args(std::env::args()) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            eprintln!("{}", usage("spinel"));
            return ExitCode::FAILURE;
        }
    };

    let config = match action {
        CliAction::ShowHelp => {
            println!("{}", usage("spinel"));
            return ExitCode::SUCCESS;
        }
        CliAction::ShowVersion => {
            println!("{}", version::version_info());
            return ExitCode::SUCCESS;
        }
        CliAction::Run(config) => config,
    };

    info!("starting spinel server");

    let engine: Arc<dyn StorageEngine> = match config.engine {
        EngineKind::Memory => {
            info!("storage engine: memory");
            Arc::new(MemoryEngine::new())
        }
        EngineKind::Raft => {
            info!("storage engine: raft");
            let inner: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
            match RaftEngine::new(inner, RAFT_PORT).await {
                Ok(engine) => Arc::new(engine),
                Err(e) => {
                    error!(error = %e, "failed to start the raft engine");
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    let listener = match TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, port = config.port, "failed to bind the listener");
            return ExitCode::FAILURE;
        }
    };

    serve(listener, engine).await;
    ExitCode::SUCCESS
}
