pub mod broadcast;
pub mod db;
pub mod engine;
pub mod estimation;
pub mod models;
pub mod notification;
pub mod segmentation;
pub mod sensing;
pub mod settings;
pub mod utils;

use anyhow::{Context, Result};

pub use broadcast::{BroadcastHub, EngineEvent, EventSink};
pub use db::Database;
pub use engine::Engine;
pub use estimation::{GenerativeClassifier, InferenceError};
pub use settings::{EngineConfig, SettingsStore};

/// Headless entry point: open the store, start both loops and run until
/// Ctrl-C. No generative backend is attached here; embedders that have one
/// build an [`Engine`] themselves.
pub fn run() -> Result<()> {
    let debug_mode = std::env::var("SIDEKICK_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    utils::init_logging(debug_mode);

    log::info!("Sidekick engine starting up...");

    let data_dir = settings::default_data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings_store = SettingsStore::new(data_dir.join(settings::CONFIG_FILE_NAME))?;
    let config = settings_store.config();
    let database = Database::new(data_dir.join(settings::DATABASE_FILE_NAME))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        let engine = Engine::new(config, database, None);
        engine.start().await?;

        wait_for_shutdown(&engine, &settings_store).await?;

        log::info!("Shutdown requested");
        engine.stop().await
    })
}

/// Block until Ctrl-C. On Unix a SIGHUP re-reads the settings file into the
/// running engine.
#[cfg(unix)]
async fn wait_for_shutdown(engine: &Engine, settings_store: &SettingsStore) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup =
        signal(SignalKind::hangup()).context("failed to listen for SIGHUP")?;
    loop {
        tokio::select! {
            _ = hangup.recv() => {
                log::info!("Reloading settings from {}", settings_store.path().display());
                if let Err(err) = engine.reload_settings(settings_store).await {
                    log::warn!("Settings reload failed, keeping current settings: {err:#}");
                }
            }
            result = tokio::signal::ctrl_c() => {
                return result.context("failed to listen for ctrl-c");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_engine: &Engine, _settings_store: &SettingsStore) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")
}
