use anyhow::Result;
use chrono::{Local, Utc};
use tracing::warn;

use agendasync_core::{SyncEngine, SyncReport};

pub async fn run(engine: &SyncEngine) -> Result<()> {
    let report = engine.run(Local::now().date_naive(), Utc::now()).await?;
    print_report(&report);
    Ok(())
}

pub fn print_report(report: &SyncReport) {
    if report.is_empty() {
        println!("No integration instances due");
        return;
    }

    for failure in report.failures() {
        if let Err(e) = &failure.outcome {
            warn!(instance = %failure.instance_id, firm = %failure.firm_id, "{e}");
        }
    }

    let totals = report.totals();
    let failed = report.failures().count();
    println!(
        "Synced {} instance(s), {} failed",
        report.0.len() - failed,
        failed
    );

    if totals.blocks_created > 0 || totals.blocks_updated > 0 {
        println!(
            "Blocks: {} created, {} updated",
            totals.blocks_created, totals.blocks_updated
        );
    }

    if totals.slots_created > 0 || totals.slots_updated > 0 || totals.slots_deleted > 0 {
        println!(
            "Slots: {} created, {} updated, {} deleted",
            totals.slots_created, totals.slots_updated, totals.slots_deleted
        );
    }

    if totals.bookings_created > 0 || totals.bookings_updated > 0 || totals.bookings_deleted > 0 {
        println!(
            "Bookings: {} created, {} updated, {} deleted",
            totals.bookings_created, totals.bookings_updated, totals.bookings_deleted
        );
    }

    if totals.skipped > 0 || totals.failed > 0 {
        println!(
            "Entries: {} skipped, {} failed",
            totals.skipped, totals.failed
        );
    }
}
