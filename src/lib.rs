pub mod collectors;
pub mod config;
pub mod dashboard;
pub mod form;
pub mod identity;
pub mod models;
pub mod publish;
pub mod registry;
pub mod station;
pub mod store;
pub mod transform;
pub mod utils;

use crate::collectors::W1SysfsBus;
use crate::config::AppConfig;
use crate::dashboard::{FilePanel, LogPanel, Panel};
use crate::publish::LogPublisher;
use crate::station::{Schedule, Station};
use crate::store::{ConfigStore, FileStorage};
use anyhow::Context;
use log::{debug, error, info};
use std::time::Instant;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting application");

    tokio::select! {
        result = main_loop(config) => {
            match result {
                Ok(_) => info!("Application completed successfully"),
                Err(e) => {
                    error!("Application error: {e:#}");
                    // Print chain of error causes
                    let mut source = e.source();
                    while let Some(e) = source {
                        error!("Caused by: {e}");
                        source = e.source();
                    }
                    return Err(e).context("Application failed to run");
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}

async fn main_loop(config: AppConfig) -> anyhow::Result<()> {
    debug!("Opening storage {}", config.storage.file);
    let storage = FileStorage::open(&config.storage.file)
        .context(format!("Failed to open storage {}", config.storage.file))?;
    let store = ConfigStore::with_layout(storage, 0, config.storage.record_size);

    let panel: Box<dyn Panel> = if config.display.save_to_file {
        Box::new(FilePanel::new(&config.display.file))
    } else {
        Box::new(LogPanel)
    };

    let mut station = Station::new(
        W1SysfsBus::new(&config.bus.path),
        store,
        LogPublisher::default(),
        panel,
        Schedule::from(&config.intervals),
    )
    .with_measurement_topics(config.topics.per_measurement);
    station
        .start()
        .context(format!("Failed to scan 1-Wire bus at {}", config.bus.path))?;

    let started = Instant::now();
    let mut interval = tokio::time::interval(config.intervals.tick());
    loop {
        interval.tick().await; // Wait for the next tick
        let now_ms = started.elapsed().as_millis() as u64;
        station.tick(now_ms);
    }
}
