//! Bring previously synced bookings in line with the external agenda.

use tracing::{debug, info};

use crate::agenda::AgendaItem;
use crate::changeset::Matched;
use crate::error::{SyncError, SyncResult};
use crate::model::{BookingPatch, SlotPatch};
use crate::reconcile::{SyncContext, SyncStats, entry_failed};
use crate::resolve::resolve_broker;

pub async fn update_bookings(ctx: &SyncContext<'_>, matched: Vec<Matched<AgendaItem>>) -> SyncStats {
    let mut stats = SyncStats::default();

    for entry in matched {
        if let Err(e) = update_booking(ctx, &entry, &mut stats).await {
            entry_failed(&mut stats, &entry.external.id, &e);
        }
    }

    stats
}

/// Broker, time, and status are each checked on every pass; an unchanged
/// entry issues no writes.
async fn update_booking(
    ctx: &SyncContext<'_>,
    entry: &Matched<AgendaItem>,
    stats: &mut SyncStats,
) -> SyncResult<()> {
    let external = &entry.external;

    // Previously synced, so no firm default applies here
    let profile_id = match ctx.broker_of(external) {
        Some(broker) => resolve_broker(ctx.store, broker, None).await?,
        None => None,
    };
    let Some(profile_id) = profile_id else {
        info!(external_id = %external.id, "skipping booking with unresolved broker");
        stats.skipped += 1;
        return Ok(());
    };

    let Some(booking) = ctx.store.bookings(&[entry.local_id]).await?.into_iter().next() else {
        debug!(external_id = %external.id, booking = %entry.local_id, "linked booking no longer exists");
        stats.skipped += 1;
        return Ok(());
    };
    let Some(slot) = booking.slot.as_ref() else {
        return Err(SyncError::Store(format!("Booking {} has no slot", booking.id)));
    };

    if slot.profile_id != profile_id {
        ctx.store
            .update_slot(
                slot.id,
                &SlotPatch {
                    profile_id: Some(profile_id),
                },
            )
            .await?;
        stats.slots_updated += 1;
        info!(slot = %slot.id, %profile_id, "reassigned slot broker");
    }

    let mut patch = BookingPatch::default();

    if slot.start_at() != external.start || slot.end_at() != external.end {
        let siblings = ctx.store.slots_in_block(slot.block_id).await?;
        let target = match siblings.iter().find(|s| s.start_at() == external.start) {
            Some(existing) => existing.id,
            None => {
                let relocated = slot.relocated(external.start, external.duration_minutes());
                let created = ctx
                    .store
                    .insert_slots(std::slice::from_ref(&relocated))
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| SyncError::Store("Slot insert returned no row".into()))?;
                stats.slots_created += 1;
                created.id
            }
        };

        if target != booking.slot_id {
            patch.slot_id = Some(target);
        }
    }

    // Unmapped statuses leave the local status alone
    if let Some(status) = external.status.as_deref().and_then(|s| ctx.vocabulary.status(s))
        && status != booking.status
    {
        patch.status = Some(status);
    }

    if patch != BookingPatch::default() {
        ctx.store.update_booking(booking.id, &patch).await?;
        stats.bookings_updated += 1;
        info!(booking = %booking.id, external_id = %external.id, ?patch, "updated booking");
    }

    Ok(())
}
