use std::time::Duration;

use anyhow::Result;
use chrono::{Local, Utc};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use agendasync_core::SyncEngine;

use super::run::print_report;

/// Run on every tick until interrupted. A failed tick does not stop the loop.
pub async fn run(engine: &SyncEngine, every: Duration) -> Result<()> {
    info!(interval = %humantime::format_duration(every), "watching");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match engine.run(Local::now().date_naive(), Utc::now()).await {
                    Ok(report) => print_report(&report),
                    Err(e) => error!(error = %e, "sync run failed, retrying next tick"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping");
                return Ok(());
            }
        }
    }
}
