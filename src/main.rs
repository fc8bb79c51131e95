use std::sync::Arc;

use config::ConfigError;
use split_watch::init_metrics;
use split_watch::routes;
use split_watch::AppContext;
use split_watch::ConnectionRegistry;
use split_watch::Error;
use split_watch::KubeStore;
use split_watch::LifecycleCoordinator;
use split_watch::LogConfig;
use split_watch::ResourceStore;
use split_watch::Result;
use split_watch::Settings;
use split_watch::SystemError;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::oneshot;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

const LOG_FILE_NAME: &str = "split-watch.log";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let settings = Settings::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&settings.log)?;
    init_metrics();

    // One store handle shared by the watch thread and the REST handlers
    let store: Arc<dyn ResourceStore> = Arc::new(KubeStore::new(settings.store.clone()));
    let registry = Arc::new(ConnectionRegistry::new());
    let lifecycle = Arc::new(LifecycleCoordinator::new(
        store.clone(),
        registry,
        settings.watch.clone(),
    ));

    let filter = routes(
        AppContext {
            store,
            lifecycle: lifecycle.clone(),
            websocket: settings.websocket.clone(),
        },
        settings.http.static_dir.as_deref(),
    );

    let address = settings.http.socket_addr()?;
    let (server_tx, server_rx) = oneshot::channel::<()>();
    let (bound, server) = warp::serve(filter)
        .try_bind_with_graceful_shutdown(address, async move {
            let _ = server_rx.await;
        })
        .map_err(|e| {
            error!("Failed to bind {}: {}", address, e);
            SystemError::Bind {
                address: address.to_string(),
                reason: e.to_string(),
            }
        })?;
    let server = tokio::spawn(server);

    lifecycle.start()?;
    info!("Listening on {}. Waiting for CTRL+C signal...", bound);

    wait_for_signal().await?;
    tokio::spawn(async {
        if wait_for_signal().await.is_ok() {
            warn!("Second signal received, forcing exit");
            std::process::exit(1);
        }
    });

    info!("Shutdown server..");
    lifecycle.stop(settings.lifecycle.join_timeout()).await;
    let _ = server_tx.send(());
    server.await.map_err(SystemError::TaskFailed)?;

    info!("Shutdown completed");
    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }
    Ok(())
}

fn env_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::Config(ConfigError::Message(e.to_string())))
}

/// Logs to stdout, and to `<dir>/split-watch.log` when a directory is set.
pub fn init_observability(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let stdout = tracing_subscriber::fmt::layer().with_filter(env_filter(&config.level)?);

    let (file, guard) = match &config.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let (non_blocking, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, LOG_FILE_NAME));
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(env_filter(&config.level)?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(stdout).with(file).init();
    Ok(guard)
}
