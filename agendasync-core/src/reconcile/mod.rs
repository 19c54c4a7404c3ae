//! Per-instance reconciliation of blocks and bookings.
//!
//! Each branch walks its entries one at a time: slot creation and block-time
//! changes must observe a consistent read of sibling slots, and the store
//! offers no row locking. Only whole branches run concurrently, and the
//! entries of concurrent branches never share an external id.

pub mod block_create;
pub mod block_update;
pub mod booking_create;
pub mod booking_update;

use std::fmt;
use std::ops::AddAssign;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::agenda::AgendaItem;
use crate::bridge::BookingKey;
use crate::changeset::split;
use crate::config::SyncSettings;
use crate::error::SyncResult;
use crate::model::{ExternalId, IntegrationInstance};
use crate::notify::Notifier;
use crate::remote::AgendaSource;
use crate::store::Store;
use crate::vocabulary::Vocabulary;

/// Everything a branch needs to reconcile one integration instance.
pub struct SyncContext<'a> {
    pub store: &'a dyn Store,
    pub source: &'a dyn AgendaSource,
    pub notifier: &'a dyn Notifier,
    pub settings: &'a SyncSettings,
    /// Public site used for links in notifications
    pub public_url: &'a str,
    pub instance: &'a IntegrationInstance,
    pub vocabulary: &'a Vocabulary,
}

impl SyncContext<'_> {
    pub fn firm_id(&self) -> Uuid {
        self.instance.firm_id
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance.id
    }

    pub fn broker_of<'i>(&self, item: &'i AgendaItem) -> Option<&'i ExternalId> {
        item.relation(&self.settings.relations.broker)
    }

    pub fn creator_of<'i>(&self, item: &'i AgendaItem) -> Option<&'i ExternalId> {
        item.relation(&self.settings.relations.creator)
    }

    pub fn client_of<'i>(&self, item: &'i AgendaItem) -> Option<&'i ExternalId> {
        item.relation(&self.settings.relations.client)
    }

    pub fn is_cancelled(&self, item: &AgendaItem) -> bool {
        item.is_cancelled(self.vocabulary, &self.settings.cancelled_status)
    }
}

/// Write and skip counts for one branch, instance, or run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub blocks_created: usize,
    pub blocks_updated: usize,
    pub slots_created: usize,
    pub slots_updated: usize,
    pub slots_deleted: usize,
    pub bookings_created: usize,
    pub bookings_updated: usize,
    pub bookings_deleted: usize,
    /// Entries left alone because a reference could not be resolved
    pub skipped: usize,
    /// Entries abandoned after a collaborator error
    pub failed: usize,
}

impl SyncStats {
    pub fn writes(&self) -> usize {
        self.blocks_created
            + self.blocks_updated
            + self.slots_created
            + self.slots_updated
            + self.slots_deleted
            + self.bookings_created
            + self.bookings_updated
            + self.bookings_deleted
    }

    pub fn is_empty(&self) -> bool {
        self.writes() == 0 && self.skipped == 0 && self.failed == 0
    }
}

impl AddAssign for SyncStats {
    fn add_assign(&mut self, other: Self) {
        self.blocks_created += other.blocks_created;
        self.blocks_updated += other.blocks_updated;
        self.slots_created += other.slots_created;
        self.slots_updated += other.slots_updated;
        self.slots_deleted += other.slots_deleted;
        self.bookings_created += other.bookings_created;
        self.bookings_updated += other.bookings_updated;
        self.bookings_deleted += other.bookings_deleted;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "blocks +{} ~{}, slots +{} ~{} -{}, bookings +{} ~{} -{}, skipped {}, failed {}",
            self.blocks_created,
            self.blocks_updated,
            self.slots_created,
            self.slots_updated,
            self.slots_deleted,
            self.bookings_created,
            self.bookings_updated,
            self.bookings_deleted,
            self.skipped,
            self.failed
        )
    }
}

/// Record a failed entry and carry on with the branch.
pub(crate) fn entry_failed(stats: &mut SyncStats, id: &ExternalId, error: &crate::error::SyncError) {
    warn!(external_id = %id, %error, "abandoning agenda entry");
    stats.failed += 1;
}

/// Delete slots along with every booking placed in them.
pub(crate) async fn delete_slots_cascade(
    store: &dyn Store,
    slot_ids: &[Uuid],
    stats: &mut SyncStats,
) -> SyncResult<()> {
    if slot_ids.is_empty() {
        return Ok(());
    }

    let bookings = store.bookings_in_slots(slot_ids).await?;
    if !bookings.is_empty() {
        store.delete_bookings_in_slots(slot_ids).await?;
        stats.bookings_deleted += bookings.len();
    }
    store.delete_slots(slot_ids).await?;
    stats.slots_deleted += slot_ids.len();
    Ok(())
}

/// Split bookings by prior sync and run both paths concurrently.
///
/// `block_hint` narrows placement of new bookings to a known parent block.
pub async fn sync_bookings(
    ctx: &SyncContext<'_>,
    bookings: Vec<AgendaItem>,
    block_hint: Option<Uuid>,
) -> SyncResult<SyncStats> {
    if bookings.is_empty() {
        return Ok(SyncStats::default());
    }

    let changes = split::<BookingKey, _>(ctx.store, bookings).await?;
    let (mut stats, created) = futures::join!(
        booking_update::update_bookings(ctx, changes.to_update),
        booking_create::create_bookings(ctx, changes.to_create, block_hint),
    );
    stats += created;
    Ok(stats)
}
