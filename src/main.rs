//! Curator - headless entry point
//!
//! Parses the command line, runs the requested library operations through the
//! task manager, waits for every pool to drain, then shuts down gracefully
//! before hard-cancelling whatever is left.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curator::cli::CliOptions;
use curator::config::Config;
use curator::media::Library;
use curator::messages::MessageSink;
use curator::tasks::{DatasourceScanTask, TaskManager, TaskManagerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let options = CliOptions::from_args();
    if options.help || !options.update {
        CliOptions::print_syntax();
        return Ok(());
    }

    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    install_panic_backstop();

    tracing::info!("Starting Curator");
    tracing::info!(data_dir = %config.data_dir.display(), "Configuration loaded");

    let sink = MessageSink::with_defaults();
    let manager = Arc::new(TaskManager::new(
        TaskManagerConfig {
            background_limit: config.background_pool_size,
            probe_limit: config.probe_pool_size,
        },
        sink.clone(),
    ));
    let library = Arc::new(Library::new());

    let datasources = if options.datasources.is_empty() {
        config.datasources.clone()
    } else {
        options.datasources
    };
    if datasources.is_empty() {
        tracing::warn!("no datasources configured, nothing to do");
        return Ok(());
    }

    let scan = DatasourceScanTask::new(library, manager.clone(), datasources, sink);
    if !manager.submit_main(scan.into_task()) {
        tracing::warn!("another main operation is already running");
    }

    // wait for all pools (artwork downloads et al) to drain
    let poll = Duration::from_millis(config.drain_poll_ms.max(1));
    while manager.is_any_running() {
        tokio::time::sleep(poll).await;
    }

    tracing::info!("all pools drained, shutting down");
    manager.shutdown();
    manager.shutdown_now();

    tracing::info!("bye bye");
    Ok(())
}

/// Last-resort net: log any panic with full context before the default
/// handler runs. Pool wrappers already contain task panics; this catches
/// everything else.
fn install_panic_backstop() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = if let Some(text) = info.payload().downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = info.payload().downcast_ref::<String>() {
            text.clone()
        } else {
            "unknown panic".to_string()
        };

        tracing::error!(
            thread = thread.name().unwrap_or("unnamed"),
            location = %location,
            payload = %payload,
            "uncaught panic"
        );
        default_hook(info);
    }));
}
