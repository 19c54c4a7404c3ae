//! Bring previously synced blocks in line with their external groups.

use std::collections::HashSet;

use tracing::{debug, info};
use uuid::Uuid;

use crate::agenda::AgendaGroup;
use crate::bridge::BookingBridge;
use crate::changeset::Matched;
use crate::error::SyncResult;
use crate::geometry::partition;
use crate::model::{Block, BlockPatch, ExternalId, SlotPatch};
use crate::reconcile::{SyncContext, SyncStats, delete_slots_cascade, entry_failed, sync_bookings};
use crate::resolve::{resolve_broker, resolve_project};

pub async fn update_blocks(ctx: &SyncContext<'_>, matched: Vec<Matched<AgendaGroup>>) -> SyncStats {
    let mut stats = SyncStats::default();

    for entry in matched {
        let id = entry.external.item.id.clone();
        if let Err(e) = update_block(ctx, entry, &mut stats).await {
            entry_failed(&mut stats, &id, &e);
        }
    }

    stats
}

async fn update_block(
    ctx: &SyncContext<'_>,
    entry: Matched<AgendaGroup>,
    stats: &mut SyncStats,
) -> SyncResult<()> {
    let Matched { external, local_id } = entry;
    let group = &external.item;

    let Some(block) = ctx.store.blocks(&[local_id]).await?.into_iter().next() else {
        debug!(external_id = %group.id, block = %local_id, "linked block no longer exists");
        stats.skipped += 1;
        return Ok(());
    };

    let project_id = match &group.project_code {
        Some(code) => resolve_project(ctx.store, code).await?,
        None => None,
    };
    if project_id.is_none() {
        info!(external_id = %group.id, "skipping block with unresolved project");
        stats.skipped += 1;
        return Ok(());
    }

    let profile_id = match ctx.broker_of(group) {
        Some(broker) => resolve_broker(ctx.store, broker, Some(ctx.firm_id())).await?,
        None => None,
    };
    let Some(profile_id) = profile_id else {
        info!(external_id = %group.id, "skipping block with unresolved broker");
        stats.skipped += 1;
        return Ok(());
    };

    if profile_id != block.profile_id {
        reassign_broker(ctx, &block, profile_id, stats).await?;
    }

    let remaining = if window_changed(&block, &external) {
        reshape(ctx, &block, &external, stats).await?
    } else {
        block.slots.iter().map(|s| s.id).collect()
    };

    remove_orphans(ctx, &remaining, &external, stats).await?;

    *stats += sync_bookings(ctx, external.bookings, Some(block.id)).await?;
    Ok(())
}

async fn reassign_broker(
    ctx: &SyncContext<'_>,
    block: &Block,
    profile_id: Uuid,
    stats: &mut SyncStats,
) -> SyncResult<()> {
    ctx.store
        .update_block(
            block.id,
            &BlockPatch {
                profile_id: Some(profile_id),
                ..BlockPatch::default()
            },
        )
        .await?;
    ctx.store
        .update_block_slots(
            block.id,
            &SlotPatch {
                profile_id: Some(profile_id),
            },
        )
        .await?;

    stats.blocks_updated += 1;
    stats.slots_updated += block.slots.len();
    info!(block = %block.id, %profile_id, "reassigned block broker");
    Ok(())
}

/// Exact comparison against the external window. A stored end clamped to
/// the last whole slot of that window also counts as unchanged.
fn window_changed(block: &Block, external: &AgendaGroup) -> bool {
    let (start, end) = (external.item.start, external.item.end);
    if block.start_at() != start {
        return true;
    }

    let clamped = partition(start, end, block.duration).map(|p| p.end);
    block.end_at() != end && Some(block.end_at()) != clamped
}

/// Drop slots starting outside the new window and move the block to it.
/// Returns the ids of the slots that survive.
async fn reshape(
    ctx: &SyncContext<'_>,
    block: &Block,
    external: &AgendaGroup,
    stats: &mut SyncStats,
) -> SyncResult<Vec<Uuid>> {
    let (start, end) = (external.item.start, external.item.end);

    let (inside, outside): (Vec<_>, Vec<_>) = block
        .slots
        .iter()
        .partition(|slot| (start..=end).contains(&slot.start_at()));

    let outside: Vec<Uuid> = outside.iter().map(|s| s.id).collect();
    delete_slots_cascade(ctx.store, &outside, stats).await?;

    ctx.store
        .update_block(
            block.id,
            &BlockPatch {
                date: Some(start.date()),
                start_time: Some(start.time()),
                end_time: Some(end.time()),
                ..BlockPatch::default()
            },
        )
        .await?;
    stats.blocks_updated += 1;
    info!(block = %block.id, %start, %end, deleted_slots = outside.len(), "moved block window");

    Ok(inside.iter().map(|s| s.id).collect())
}

/// Delete bookings in the block that the external group no longer lists,
/// including bookings that were never linked at all.
async fn remove_orphans(
    ctx: &SyncContext<'_>,
    slot_ids: &[Uuid],
    external: &AgendaGroup,
    stats: &mut SyncStats,
) -> SyncResult<()> {
    if slot_ids.is_empty() {
        return Ok(());
    }

    let bookings = ctx.store.bookings_in_slots(slot_ids).await?;
    if bookings.is_empty() {
        return Ok(());
    }

    let local_ids: Vec<Uuid> = bookings.iter().map(|b| b.id).collect();
    let linked = BookingBridge::external_ids(ctx.store, &local_ids).await?;
    let listed: HashSet<&ExternalId> = external.bookings.iter().map(|b| &b.id).collect();

    let orphans: Vec<Uuid> = local_ids
        .into_iter()
        .filter(|id| linked.get(id).is_none_or(|ext| !listed.contains(ext)))
        .collect();

    if !orphans.is_empty() {
        ctx.store.delete_bookings(&orphans).await?;
        stats.bookings_deleted += orphans.len();
        info!(block_external_id = %external.item.id, count = orphans.len(), "deleted orphaned bookings");
    }

    Ok(())
}
