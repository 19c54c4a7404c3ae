//! In-process store.
//!
//! Enforces the same unique constraints as the relational schema and counts
//! every mutating call, which makes idempotency observable.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::model::{
    Block, BlockPatch, Booking, BookingPatch, Client, ExternalAttribute, ExternalMapping,
    Integration, IntegrationInstance, NewBlock, NewBooking, NewClient, NewSlot, Project, Slot,
    SlotPatch,
};
use crate::store::{AttributeQuery, Store};

#[derive(Default)]
struct Tables {
    integrations: Vec<Integration>,
    instances: Vec<IntegrationInstance>,
    mappings: Vec<ExternalMapping>,
    attributes: Vec<ExternalAttribute>,
    blocks: Vec<Block>,
    slots: Vec<Slot>,
    bookings: Vec<Booking>,
    clients: Vec<Client>,
    projects: Vec<Project>,
    writes: usize,
}

impl Tables {
    fn block_with_slots(&self, block: &Block) -> Block {
        let mut block = block.clone();
        block.slots = self
            .slots
            .iter()
            .filter(|s| s.block_id == block.id)
            .cloned()
            .collect();
        block
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SyncResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| SyncError::Store("memory store lock poisoned".into()))
    }

    fn write(&self) -> SyncResult<MutexGuard<'_, Tables>> {
        let mut tables = self.lock()?;
        tables.writes += 1;
        Ok(tables)
    }

    /// Number of mutating calls made through the `Store` trait.
    pub fn writes(&self) -> usize {
        self.lock().map(|t| t.writes).unwrap_or_default()
    }

    // =========================================================================
    // Seeding (not counted as writes)
    // =========================================================================

    pub fn add_integration(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        if let Ok(mut t) = self.lock() {
            t.integrations.push(Integration {
                id,
                name: name.to_string(),
            });
        }
        id
    }

    pub fn add_instance(&self, instance: IntegrationInstance) {
        if let Ok(mut t) = self.lock() {
            t.instances.push(instance);
        }
    }

    pub fn add_project(&self, status: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        if let Ok(mut t) = self.lock() {
            t.projects.push(Project {
                id,
                status: status.map(str::to_string),
            });
        }
        id
    }

    pub fn add_client(&self, client: Client) {
        if let Ok(mut t) = self.lock() {
            t.clients.push(client);
        }
    }

    pub fn add_attribute(&self, attribute: ExternalAttribute) {
        if let Ok(mut t) = self.lock() {
            t.attributes.push(attribute);
        }
    }

    pub fn add_mapping(&self, mapping: ExternalMapping) {
        if let Ok(mut t) = self.lock() {
            t.mappings.push(mapping);
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub fn all_blocks(&self) -> Vec<Block> {
        self.lock()
            .map(|t| t.blocks.iter().map(|b| t.block_with_slots(b)).collect())
            .unwrap_or_default()
    }

    pub fn all_slots(&self) -> Vec<Slot> {
        self.lock().map(|t| t.slots.clone()).unwrap_or_default()
    }

    pub fn all_bookings(&self) -> Vec<Booking> {
        self.lock().map(|t| t.bookings.clone()).unwrap_or_default()
    }

    pub fn all_attributes(&self) -> Vec<ExternalAttribute> {
        self.lock().map(|t| t.attributes.clone()).unwrap_or_default()
    }

    pub fn all_mappings(&self) -> Vec<ExternalMapping> {
        self.lock().map(|t| t.mappings.clone()).unwrap_or_default()
    }

    pub fn all_clients(&self) -> Vec<Client> {
        self.lock().map(|t| t.clients.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn due_instances(
        &self,
        integration_name: &str,
        now: DateTime<Utc>,
    ) -> SyncResult<Vec<IntegrationInstance>> {
        let t = self.lock()?;
        let Some(integration) = t.integrations.iter().find(|i| i.name == integration_name) else {
            return Ok(Vec::new());
        };

        Ok(t.instances
            .iter()
            .filter(|i| i.integration_id == integration.id && i.is_due(now))
            .cloned()
            .collect())
    }

    async fn integration_instance(&self, id: Uuid) -> SyncResult<Option<IntegrationInstance>> {
        Ok(self.lock()?.instances.iter().find(|i| i.id == id).cloned())
    }

    async fn external_mappings(&self, instance_id: Uuid) -> SyncResult<Vec<ExternalMapping>> {
        Ok(self
            .lock()?
            .mappings
            .iter()
            .filter(|m| m.integration_instance_id == instance_id)
            .cloned()
            .collect())
    }

    async fn insert_external_mappings(&self, mappings: &[ExternalMapping]) -> SyncResult<()> {
        let mut t = self.write()?;
        let duplicate = mappings.iter().any(|new| {
            t.mappings.iter().any(|m| {
                m.integration_instance_id == new.integration_instance_id
                    && m.kind == new.kind
                    && m.external_id == new.external_id
            })
        });
        if duplicate {
            return Err(SyncError::Conflict("external_mappings".into()));
        }
        t.mappings.extend(mappings.iter().cloned());
        Ok(())
    }

    async fn external_attributes(
        &self,
        query: &AttributeQuery,
    ) -> SyncResult<Vec<ExternalAttribute>> {
        Ok(self
            .lock()?
            .attributes
            .iter()
            .filter(|a| query.matches(a))
            .cloned()
            .collect())
    }

    async fn insert_external_attribute(&self, attribute: &ExternalAttribute) -> SyncResult<()> {
        self.write()?.attributes.push(attribute.clone());
        Ok(())
    }

    async fn blocks(&self, ids: &[Uuid]) -> SyncResult<Vec<Block>> {
        let t = self.lock()?;
        Ok(t.blocks
            .iter()
            .filter(|b| ids.contains(&b.id))
            .map(|b| t.block_with_slots(b))
            .collect())
    }

    async fn blocks_on(
        &self,
        profile_id: Uuid,
        project_id: Uuid,
        date: NaiveDate,
    ) -> SyncResult<Vec<Block>> {
        let t = self.lock()?;
        Ok(t.blocks
            .iter()
            .filter(|b| b.profile_id == profile_id && b.project_id == project_id && b.date == date)
            .map(|b| t.block_with_slots(b))
            .collect())
    }

    async fn insert_block(&self, new: &NewBlock) -> SyncResult<Block> {
        let block = Block {
            id: Uuid::new_v4(),
            project_id: new.project_id,
            profile_id: new.profile_id,
            created_by: new.created_by,
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            duration: new.duration,
            parties: new.parties,
            slots: Vec::new(),
        };
        self.write()?.blocks.push(block.clone());
        Ok(block)
    }

    async fn update_block(&self, id: Uuid, patch: &BlockPatch) -> SyncResult<()> {
        let mut t = self.write()?;
        if let Some(block) = t.blocks.iter_mut().find(|b| b.id == id) {
            if let Some(profile_id) = patch.profile_id {
                block.profile_id = profile_id;
            }
            if let Some(date) = patch.date {
                block.date = date;
            }
            if let Some(start) = patch.start_time {
                block.start_time = start;
            }
            if let Some(end) = patch.end_time {
                block.end_time = end;
            }
        }
        Ok(())
    }

    async fn slots_in_block(&self, block_id: Uuid) -> SyncResult<Vec<Slot>> {
        Ok(self
            .lock()?
            .slots
            .iter()
            .filter(|s| s.block_id == block_id)
            .cloned()
            .collect())
    }

    async fn insert_slots(&self, slots: &[NewSlot]) -> SyncResult<Vec<Slot>> {
        let created: Vec<Slot> = slots
            .iter()
            .map(|new| Slot {
                id: Uuid::new_v4(),
                block_id: new.block_id,
                project_id: new.project_id,
                profile_id: new.profile_id,
                created_by: new.created_by,
                date: new.date,
                start_time: new.start_time,
                duration: new.duration,
                max_groups: new.max_groups,
            })
            .collect();
        self.write()?.slots.extend(created.iter().cloned());
        Ok(created)
    }

    async fn update_slot(&self, id: Uuid, patch: &SlotPatch) -> SyncResult<()> {
        let mut t = self.write()?;
        for slot in t.slots.iter_mut().filter(|s| s.id == id) {
            if let Some(profile_id) = patch.profile_id {
                slot.profile_id = profile_id;
            }
        }
        Ok(())
    }

    async fn update_block_slots(&self, block_id: Uuid, patch: &SlotPatch) -> SyncResult<()> {
        let mut t = self.write()?;
        for slot in t.slots.iter_mut().filter(|s| s.block_id == block_id) {
            if let Some(profile_id) = patch.profile_id {
                slot.profile_id = profile_id;
            }
        }
        Ok(())
    }

    async fn delete_slots(&self, ids: &[Uuid]) -> SyncResult<()> {
        self.write()?.slots.retain(|s| !ids.contains(&s.id));
        Ok(())
    }

    async fn bookings(&self, ids: &[Uuid]) -> SyncResult<Vec<Booking>> {
        let t = self.lock()?;
        Ok(t.bookings
            .iter()
            .filter(|b| ids.contains(&b.id))
            .map(|b| {
                let mut booking = b.clone();
                booking.slot = t.slots.iter().find(|s| s.id == b.slot_id).cloned();
                booking
            })
            .collect())
    }

    async fn bookings_in_slots(&self, slot_ids: &[Uuid]) -> SyncResult<Vec<Booking>> {
        Ok(self
            .lock()?
            .bookings
            .iter()
            .filter(|b| slot_ids.contains(&b.slot_id))
            .cloned()
            .collect())
    }

    async fn insert_booking(&self, new: &NewBooking) -> SyncResult<Booking> {
        let booking = Booking {
            id: Uuid::new_v4(),
            slot_id: new.slot_id,
            client_id: new.client_id,
            status: new.status,
            slot: None,
        };
        self.write()?.bookings.push(booking.clone());
        Ok(booking)
    }

    async fn update_booking(&self, id: Uuid, patch: &BookingPatch) -> SyncResult<()> {
        let mut t = self.write()?;
        if let Some(booking) = t.bookings.iter_mut().find(|b| b.id == id) {
            if let Some(slot_id) = patch.slot_id {
                booking.slot_id = slot_id;
            }
            if let Some(status) = patch.status {
                booking.status = status;
            }
        }
        Ok(())
    }

    async fn delete_bookings(&self, ids: &[Uuid]) -> SyncResult<()> {
        self.write()?.bookings.retain(|b| !ids.contains(&b.id));
        Ok(())
    }

    async fn delete_bookings_in_slots(&self, slot_ids: &[Uuid]) -> SyncResult<()> {
        self.write()?
            .bookings
            .retain(|b| !slot_ids.contains(&b.slot_id));
        Ok(())
    }

    async fn insert_client(&self, new: &NewClient) -> SyncResult<Client> {
        let mut t = self.write()?;
        let taken = t
            .clients
            .iter()
            .any(|c| c.firm_id == new.firm_id && c.email.eq_ignore_ascii_case(&new.email));
        if taken {
            return Err(SyncError::Conflict("clients".into()));
        }

        let client = Client {
            id: Uuid::new_v4(),
            firm_id: new.firm_id,
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            language: Some(new.language.clone()),
        };
        t.clients.push(client.clone());
        Ok(client)
    }

    async fn client(&self, id: Uuid) -> SyncResult<Option<Client>> {
        Ok(self.lock()?.clients.iter().find(|c| c.id == id).cloned())
    }

    async fn client_by_email(&self, firm_id: Uuid, email: &str) -> SyncResult<Option<Client>> {
        Ok(self
            .lock()?
            .clients
            .iter()
            .find(|c| c.firm_id == firm_id && c.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn project(&self, id: Uuid) -> SyncResult<Option<Project>> {
        Ok(self.lock()?.projects.iter().find(|p| p.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_client(firm_id: Uuid, email: &str) -> NewClient {
        NewClient {
            firm_id,
            first_name: "Anna".into(),
            last_name: "de Vries".into(),
            email: email.into(),
            phone: None,
            language: "nl".into(),
        }
    }

    #[tokio::test]
    async fn test_client_email_is_unique_per_firm() {
        let store = MemoryStore::new();
        let firm = Uuid::new_v4();

        store.insert_client(&new_client(firm, "anna@example.com")).await.unwrap();
        let err = store
            .insert_client(&new_client(firm, "ANNA@example.com"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // Another firm may reuse the address
        store
            .insert_client(&new_client(Uuid::new_v4(), "anna@example.com"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_due_instances_filters_by_integration_and_schedule() {
        let store = MemoryStore::new();
        let realworks = store.add_integration("realworks");
        let other = store.add_integration("other");
        let now = Utc::now();

        let due = IntegrationInstance {
            id: Uuid::new_v4(),
            integration_id: realworks,
            firm_id: Uuid::new_v4(),
            next_sync_at: None,
        };
        store.add_instance(due.clone());
        store.add_instance(IntegrationInstance {
            id: Uuid::new_v4(),
            integration_id: realworks,
            firm_id: Uuid::new_v4(),
            next_sync_at: Some(now + chrono::Duration::hours(1)),
        });
        store.add_instance(IntegrationInstance {
            id: Uuid::new_v4(),
            integration_id: other,
            firm_id: Uuid::new_v4(),
            next_sync_at: None,
        });

        let found = store.due_instances("realworks", now).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
        assert_eq!(store.writes(), 0);
    }
}
