use std::sync::Arc;

use anyhow::Context;

use pmon_camera::{CameraSettings, WebcamSource};
use pmon_core::{
    archive::ArchiveStore,
    config::Config,
    monitor::{MonitorSession, MonitorSettings},
};
use pmon_telegram::TelegramNotifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pmon_core::logging::init("pmon")?;

    let cfg = Config::load()?;

    let camera = Arc::new(
        WebcamSource::open(CameraSettings::from_config(&cfg)).context("camera unavailable")?,
    );
    let archive = ArchiveStore::open(&cfg.archive_dir).context("archive unavailable")?;
    let notifier = Arc::new(TelegramNotifier::from_token(
        &cfg.telegram_token,
        &cfg.destination,
    ));

    // Basic startup info.
    match notifier.whoami().await {
        Ok(name) => tracing::info!("pmon started: @{name}"),
        Err(e) => tracing::warn!(error = %e, "could not reach Telegram at startup"),
    }
    tracing::info!(
        destination = %cfg.destination,
        archive = %archive.dir().display(),
        "monitor configured"
    );
    match archive.latest() {
        Ok(Some(entry)) => tracing::info!(taken_at = %entry.taken_at, "last archived capture"),
        Ok(None) => tracing::info!("archive is empty"),
        Err(e) => tracing::warn!(error = %e, "could not list archive"),
    }

    let mut monitor = MonitorSession::new(
        MonitorSettings::from_config(&cfg),
        camera,
        archive,
        notifier,
    );

    if cfg.run_once {
        let outcome = monitor.run_cycle().await;
        tracing::info!(delivered = outcome.is_delivered(), "single capture finished");
        return Ok(());
    }

    tracing::info!(
        "Monitoring started. Capturing every {} minutes...",
        cfg.interval_minutes()
    );
    monitor.run().await;

    Ok(())
}
