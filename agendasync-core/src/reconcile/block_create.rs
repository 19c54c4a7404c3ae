//! Materialize new external groups as blocks partitioned into slots.

use tracing::info;

use crate::agenda::{AgendaGroup, AgendaItem};
use crate::bridge::BlockBridge;
use crate::error::SyncResult;
use crate::geometry::{block_parties, partition};
use crate::model::{NewBlock, NewSlot};
use crate::reconcile::{SyncContext, SyncStats, entry_failed, sync_bookings};
use crate::resolve::{resolve_broker, resolve_project};

pub async fn create_blocks(ctx: &SyncContext<'_>, groups: Vec<AgendaGroup>) -> SyncStats {
    let mut stats = SyncStats::default();

    for group in groups {
        let id = group.item.id.clone();
        if let Err(e) = create_block(ctx, group, &mut stats).await {
            entry_failed(&mut stats, &id, &e);
        }
    }

    stats
}

fn skip(group: &AgendaItem, reason: &str, stats: &mut SyncStats) -> SyncResult<()> {
    info!(external_id = %group.id, reason, "skipping block");
    stats.skipped += 1;
    Ok(())
}

async fn create_block(
    ctx: &SyncContext<'_>,
    external: AgendaGroup,
    stats: &mut SyncStats,
) -> SyncResult<()> {
    let AgendaGroup { item: group, bookings } = external;
    let firm_id = Some(ctx.firm_id());

    let project_id = match &group.project_code {
        Some(code) => resolve_project(ctx.store, code).await?,
        None => None,
    };
    let Some(project_id) = project_id else {
        return skip(&group, "project not found", stats);
    };

    let profile_id = match ctx.broker_of(&group) {
        Some(broker) => resolve_broker(ctx.store, broker, firm_id).await?,
        None => None,
    };
    let Some(profile_id) = profile_id else {
        return skip(&group, "broker is not connected", stats);
    };

    let created_by = match ctx.creator_of(&group) {
        Some(creator) => resolve_broker(ctx.store, creator, firm_id).await?,
        None => None,
    };
    let Some(created_by) = created_by else {
        return skip(&group, "creator is not connected", stats);
    };

    let viewable: Vec<AgendaItem> = bookings.into_iter().filter(|b| !ctx.is_cancelled(b)).collect();
    let Some(first) = viewable.first() else {
        return skip(&group, "no viewable bookings", stats);
    };

    let duration = first.duration_minutes();
    let parties = block_parties(&viewable);
    let Some(slots) = partition(group.start, group.end, duration) else {
        return skip(&group, "window does not fit one slot", stats);
    };

    let block = ctx
        .store
        .insert_block(&NewBlock {
            project_id,
            profile_id,
            created_by: Some(created_by),
            date: group.start.date(),
            start_time: group.start.time(),
            end_time: slots.end.time(),
            duration,
            parties,
            is_broker_block: false,
            interval_time: 0,
        })
        .await?;
    stats.blocks_created += 1;

    let new_slots: Vec<NewSlot> = slots
        .starts
        .iter()
        .map(|start| NewSlot {
            block_id: block.id,
            project_id,
            profile_id,
            created_by: Some(created_by),
            date: start.date(),
            start_time: start.time(),
            duration,
            max_groups: parties,
        })
        .collect();
    let inserted = ctx.store.insert_slots(&new_slots).await?;
    stats.slots_created += inserted.len();

    BlockBridge::link(ctx.store, block.id, &group.id, ctx.instance_id()).await?;
    info!(
        external_id = %group.id,
        block = %block.id,
        slots = inserted.len(),
        duration,
        parties,
        "created block"
    );

    *stats += sync_bookings(ctx, viewable, Some(block.id)).await?;
    Ok(())
}
