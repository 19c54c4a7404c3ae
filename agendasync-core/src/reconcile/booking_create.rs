//! Place new external bookings into local blocks and slots.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agenda::AgendaItem;
use crate::bridge::BookingBridge;
use crate::error::{SyncError, SyncResult};
use crate::model::{Booking, BookingStatus, InternalType, NewBlock, NewBooking, NewSlot, Slot};
use crate::notify::{BookingRef, Notification};
use crate::reconcile::{SyncContext, SyncStats, entry_failed};
use crate::resolve::{resolve_broker, resolve_or_create_client, resolve_project};

/// Local identities an external booking refers to.
#[derive(Debug, Clone, Copy)]
struct Parties {
    project_id: Uuid,
    profile_id: Uuid,
    created_by: Uuid,
    client_id: Uuid,
}

pub async fn create_bookings(
    ctx: &SyncContext<'_>,
    entries: Vec<AgendaItem>,
    block_hint: Option<Uuid>,
) -> SyncStats {
    let mut stats = SyncStats::default();

    for entry in entries {
        if let Err(e) = create_booking(ctx, &entry, block_hint, &mut stats).await {
            entry_failed(&mut stats, &entry.id, &e);
        }
    }

    stats
}

async fn create_booking(
    ctx: &SyncContext<'_>,
    external: &AgendaItem,
    block_hint: Option<Uuid>,
    stats: &mut SyncStats,
) -> SyncResult<()> {
    if external.kind != InternalType::Booking || ctx.is_cancelled(external) {
        debug!(external_id = %external.id, status = ?external.status, "not creating booking");
        return Ok(());
    }

    if let Some(existing) = BookingBridge::lookup(ctx.store, &external.id).await? {
        debug!(external_id = %external.id, booking = %existing, "booking already synced");
        return Ok(());
    }

    let Some(parties) = resolve_parties(ctx, external).await? else {
        stats.skipped += 1;
        return Ok(());
    };

    let status = external
        .status
        .as_deref()
        .and_then(|s| ctx.vocabulary.status(s))
        .unwrap_or_default();

    let booking = match find_slot(ctx, external, &parties, block_hint).await? {
        Some(slot) => create_booking_in_slot(ctx, &slot, &parties, status, stats).await?,
        None => create_new_appointment(ctx, external, &parties, status, stats).await?,
    };

    BookingBridge::link(ctx.store, booking.id, &external.id, ctx.instance_id()).await?;
    info!(external_id = %external.id, booking = %booking.id, slot = %booking.slot_id, "created booking");

    notify(ctx, &booking, &parties, external.duration_minutes()).await;
    Ok(())
}

fn unresolved<T>(external: &AgendaItem, reason: &str) -> Option<T> {
    info!(external_id = %external.id, reason, "skipping booking");
    None
}

async fn resolve_parties(ctx: &SyncContext<'_>, external: &AgendaItem) -> SyncResult<Option<Parties>> {
    let firm_id = Some(ctx.firm_id());

    let Some(code) = external.project_code.as_ref() else {
        return Ok(unresolved(external, "no project code"));
    };
    let Some(project_id) = resolve_project(ctx.store, code).await? else {
        return Ok(unresolved(external, "project not found"));
    };

    let Some(broker) = ctx.broker_of(external) else {
        return Ok(unresolved(external, "no broker relation"));
    };
    let Some(profile_id) = resolve_broker(ctx.store, broker, firm_id).await? else {
        return Ok(unresolved(external, "broker is not connected"));
    };

    let Some(creator) = ctx.creator_of(external) else {
        return Ok(unresolved(external, "no creator relation"));
    };
    let Some(created_by) = resolve_broker(ctx.store, creator, firm_id).await? else {
        return Ok(unresolved(external, "creator is not connected"));
    };

    let Some(relation) = ctx.client_of(external) else {
        return Ok(unresolved(external, "no client relation"));
    };
    let client_id = resolve_or_create_client(
        ctx.store,
        ctx.source,
        relation,
        ctx.firm_id(),
        ctx.instance_id(),
    )
    .await?;

    Ok(Some(Parties {
        project_id,
        profile_id,
        created_by,
        client_id,
    }))
}

/// A slot starting exactly at the booking's start, inside a block that
/// contains the whole booking.
async fn find_slot(
    ctx: &SyncContext<'_>,
    external: &AgendaItem,
    parties: &Parties,
    block_hint: Option<Uuid>,
) -> SyncResult<Option<Slot>> {
    let mut candidates = match block_hint {
        Some(block_id) => ctx.store.blocks(&[block_id]).await?,
        None => Vec::new(),
    };
    if candidates.is_empty() {
        candidates = ctx
            .store
            .blocks_on(parties.profile_id, parties.project_id, external.start.date())
            .await?;
    }

    Ok(candidates
        .into_iter()
        .filter(|block| block.contains(external.start, external.end))
        .flat_map(|block| block.slots)
        .find(|slot| slot.start_at() == external.start))
}

// Occupancy is not checked against max_groups.
async fn create_booking_in_slot(
    ctx: &SyncContext<'_>,
    slot: &Slot,
    parties: &Parties,
    status: BookingStatus,
    stats: &mut SyncStats,
) -> SyncResult<Booking> {
    let booking = ctx
        .store
        .insert_booking(&NewBooking {
            slot_id: slot.id,
            client_id: parties.client_id,
            status,
            for_someone_else: false,
        })
        .await?;
    stats.bookings_created += 1;
    Ok(booking)
}

/// A single-slot block sized to the booking, with the booking inside it.
async fn create_new_appointment(
    ctx: &SyncContext<'_>,
    external: &AgendaItem,
    parties: &Parties,
    status: BookingStatus,
    stats: &mut SyncStats,
) -> SyncResult<Booking> {
    let duration = external.duration_minutes();

    let block = ctx
        .store
        .insert_block(&NewBlock {
            project_id: parties.project_id,
            profile_id: parties.profile_id,
            created_by: Some(parties.created_by),
            date: external.start.date(),
            start_time: external.start.time(),
            end_time: external.end.time(),
            duration,
            parties: 1,
            is_broker_block: false,
            interval_time: 0,
        })
        .await?;
    stats.blocks_created += 1;

    let slot = NewSlot {
        block_id: block.id,
        project_id: block.project_id,
        profile_id: block.profile_id,
        created_by: block.created_by,
        date: block.date,
        start_time: block.start_time,
        duration,
        max_groups: block.parties,
    };
    let slot = ctx
        .store
        .insert_slots(std::slice::from_ref(&slot))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| SyncError::Store("Slot insert returned no row".into()))?;
    stats.slots_created += 1;

    create_booking_in_slot(ctx, &slot, parties, status, stats).await
}

/// Send the confirmation. Failures are logged; the booking stands.
async fn notify(ctx: &SyncContext<'_>, booking: &Booking, parties: &Parties, duration: i64) {
    let language = match ctx.store.client(parties.client_id).await {
        Ok(Some(client)) => client.language,
        Ok(None) => None,
        Err(e) => {
            warn!(client = %parties.client_id, error = %e, "could not load client language");
            None
        }
    };

    let notification = Notification::appointment_confirmation(
        BookingRef {
            booking_id: booking.id,
            client_id: parties.client_id,
            project_id: parties.project_id,
            profile_id: parties.profile_id,
            firm_id: ctx.firm_id(),
        },
        duration,
        ctx.public_url,
        language.as_deref().unwrap_or("nl"),
    );

    match ctx.notifier.send(&notification).await {
        Ok(outcome) if outcome.success => {
            debug!(booking = %booking.id, "sent appointment confirmation")
        }
        Ok(outcome) => {
            warn!(booking = %booking.id, message = ?outcome.message, "appointment confirmation not sent")
        }
        Err(e) => warn!(booking = %booking.id, error = %e, "appointment confirmation failed"),
    }
}
