//! Persistence seam for the local scheduling model.
//!
//! The engine issues no transactions: every method is one independent
//! read or write, and multi-step mutations are composed by the caller.

pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::SyncResult;
use crate::model::{
    Block, BlockPatch, Booking, BookingPatch, Client, EntityType, ExternalAttribute, ExternalId,
    ExternalMapping, IntegrationInstance, NewBlock, NewBooking, NewClient, NewSlot, Project, Slot,
    SlotPatch,
};

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

/// Filter over the external attribute table. `None` fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct AttributeQuery {
    pub entity_type: Option<EntityType>,
    pub attribute_name: Option<String>,
    pub values: Option<Vec<ExternalId>>,
    pub entity_ids: Option<Vec<Uuid>>,
}

impl AttributeQuery {
    pub fn matches(&self, row: &ExternalAttribute) -> bool {
        self.entity_type.is_none_or(|t| t == row.entity_type)
            && self
                .attribute_name
                .as_deref()
                .is_none_or(|n| n == row.attribute_name)
            && self
                .values
                .as_ref()
                .is_none_or(|v| v.contains(&row.attribute_value))
            && self
                .entity_ids
                .as_ref()
                .is_none_or(|ids| ids.contains(&row.entity_id))
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // Integrations

    /// Instances of the named integration whose next sync is unset or not in the future.
    async fn due_instances(
        &self,
        integration_name: &str,
        now: DateTime<Utc>,
    ) -> SyncResult<Vec<IntegrationInstance>>;

    async fn integration_instance(&self, id: Uuid) -> SyncResult<Option<IntegrationInstance>>;

    async fn external_mappings(&self, instance_id: Uuid) -> SyncResult<Vec<ExternalMapping>>;

    async fn insert_external_mappings(&self, mappings: &[ExternalMapping]) -> SyncResult<()>;

    async fn external_attributes(&self, query: &AttributeQuery)
    -> SyncResult<Vec<ExternalAttribute>>;

    async fn insert_external_attribute(&self, attribute: &ExternalAttribute) -> SyncResult<()>;

    // Blocks (returned with their slots)

    async fn blocks(&self, ids: &[Uuid]) -> SyncResult<Vec<Block>>;

    async fn blocks_on(
        &self,
        profile_id: Uuid,
        project_id: Uuid,
        date: NaiveDate,
    ) -> SyncResult<Vec<Block>>;

    async fn insert_block(&self, block: &NewBlock) -> SyncResult<Block>;

    async fn update_block(&self, id: Uuid, patch: &BlockPatch) -> SyncResult<()>;

    // Slots

    async fn slots_in_block(&self, block_id: Uuid) -> SyncResult<Vec<Slot>>;

    async fn insert_slots(&self, slots: &[NewSlot]) -> SyncResult<Vec<Slot>>;

    async fn update_slot(&self, id: Uuid, patch: &SlotPatch) -> SyncResult<()>;

    async fn update_block_slots(&self, block_id: Uuid, patch: &SlotPatch) -> SyncResult<()>;

    async fn delete_slots(&self, ids: &[Uuid]) -> SyncResult<()>;

    // Bookings

    /// Bookings by id, each with its slot attached.
    async fn bookings(&self, ids: &[Uuid]) -> SyncResult<Vec<Booking>>;

    async fn bookings_in_slots(&self, slot_ids: &[Uuid]) -> SyncResult<Vec<Booking>>;

    async fn insert_booking(&self, booking: &NewBooking) -> SyncResult<Booking>;

    async fn update_booking(&self, id: Uuid, patch: &BookingPatch) -> SyncResult<()>;

    async fn delete_bookings(&self, ids: &[Uuid]) -> SyncResult<()>;

    async fn delete_bookings_in_slots(&self, slot_ids: &[Uuid]) -> SyncResult<()>;

    // Clients and projects

    /// Fails with `SyncError::Conflict` when the firm already has a client with this email.
    async fn insert_client(&self, client: &NewClient) -> SyncResult<Client>;

    async fn client(&self, id: Uuid) -> SyncResult<Option<Client>>;

    async fn client_by_email(&self, firm_id: Uuid, email: &str) -> SyncResult<Option<Client>>;

    async fn project(&self, id: Uuid) -> SyncResult<Option<Project>>;
}
