use std::process::ExitCode;
use std::sync::Arc;

use assistant_relay::{
    app::{config::Config, constant::PKG_VERSION, model::AppState, route::create_router},
    core::session::spawn_sweeper,
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            core::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // 环境变量文件不存在时忽略
    let dotenv = dotenvy::dotenv();
    init_logging();
    if let Err(e) = &dotenv
        && !e.not_found()
    {
        warn!(error = %e, "failed to load .env");
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = PKG_VERSION,
        upstream = %config.upstream_base_url,
        mode = config.upstream_mode.as_str(),
        session_ttl_secs = config.session.ttl.as_secs(),
        "configuration loaded"
    );

    let state = match AppState::from_config(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!(error = %e, "failed to build upstream client");
            return ExitCode::FAILURE;
        }
    };

    let sweeper = spawn_sweeper(state.sessions.store().clone(), state.config.session.ttl);

    let (host, port) = (state.config.host.clone(), state.config.port);
    let listener = match tokio::net::TcpListener::bind((host.as_str(), port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%host, port, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    match listener.local_addr() {
        Ok(local) => info!("listening on {local}"),
        Err(_) => info!(%host, port, "listening"),
    }

    let app = create_router(state);
    let result = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;
    sweeper.abort();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server error");
            ExitCode::FAILURE
        }
    }
}
