//! Shared fixtures: a scripted agenda, a recording notifier, a store that
//! can be told to fail, and a seeded in-memory store.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use agendasync_core::config::SyncSettings;
use agendasync_core::model::{
    Block, BlockPatch, Booking, BookingPatch, Client, EntityType, ExternalAttribute, ExternalId,
    ExternalMapping, IntegrationInstance, MappingKind, NewBlock, NewBooking, NewClient, NewSlot,
    Project, Slot, SlotPatch,
};
use agendasync_core::notify::{Notification, NotificationOutcome, Notifier};
use agendasync_core::remote::AgendaSource;
use agendasync_core::remote::protocol::{
    AgendaEntry, AgendaProject, RelationProfile, Relatie, VocabularyEntry,
};
use agendasync_core::store::{AttributeQuery, MemoryStore, Store};
use agendasync_core::window::{SyncWindow, parse_timestamp};
use agendasync_core::{SyncEngine, SyncError, SyncReport, SyncResult};

pub const BLOCK_TYPE: &str = "Bezichtiging blokken";
pub const BOOKING_TYPE: &str = "Bezichtiging";

pub const BROKER: i64 = 77;
pub const OTHER_BROKER: i64 = 78;
pub const CREATOR: i64 = 88;
pub const CLIENT: i64 = 300;
pub const PROJECT_CODE: &str = "P1";

/// Agenda source serving whatever entries a test puts in it.
#[derive(Default)]
pub struct ScriptedAgenda {
    entries: Mutex<Vec<AgendaEntry>>,
    profile: Mutex<Option<RelationProfile>>,
    failing_firms: Mutex<Vec<Uuid>>,
}

impl ScriptedAgenda {
    pub fn set_entries(&self, entries: Vec<AgendaEntry>) {
        *self.entries.lock().unwrap() = entries;
    }

    pub fn set_profile(&self, profile: RelationProfile) {
        *self.profile.lock().unwrap() = Some(profile);
    }

    pub fn fail_for(&self, firm_id: Uuid) {
        self.failing_firms.lock().unwrap().push(firm_id);
    }
}

#[async_trait]
impl AgendaSource for ScriptedAgenda {
    async fn firm_agenda(
        &self,
        firm_id: Uuid,
        window: &SyncWindow,
        _type_codes: &[ExternalId],
    ) -> SyncResult<Vec<AgendaEntry>> {
        if self.failing_firms.lock().unwrap().contains(&firm_id) {
            return Err(SyncError::Remote("agenda unavailable".into()));
        }

        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| parse_timestamp(&e.begintijd).is_ok_and(|at| window.contains(at)))
            .cloned()
            .collect())
    }

    async fn firm_types(&self, _firm_id: Uuid) -> SyncResult<Vec<VocabularyEntry>> {
        Ok(vec![vocab(1, BLOCK_TYPE), vocab(2, BOOKING_TYPE), vocab(3, "Taxatie")])
    }

    async fn firm_statuses(&self, _firm_id: Uuid) -> SyncResult<Vec<VocabularyEntry>> {
        Ok(vec![
            vocab(10, "Aangevraagd"),
            vocab(11, "Bevestigd"),
            vocab(12, "Geannuleerd"),
        ])
    }

    async fn client_profile(
        &self,
        relation_id: &ExternalId,
        _firm_id: Uuid,
    ) -> SyncResult<RelationProfile> {
        self.profile
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| SyncError::Remote(format!("relation {relation_id} not found")))
    }
}

fn vocab(id: i64, name: &str) -> VocabularyEntry {
    VocabularyEntry {
        systemid: ExternalId::from(id),
        name: name.to_string(),
    }
}

/// How the recording notifier answers a send.
#[derive(Debug, Clone, Copy, Default)]
pub enum Delivery {
    #[default]
    Accepted,
    /// Reached the dispatcher, which reported `success: false`.
    Rejected,
    Unreachable,
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    delivery: Mutex<Delivery>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn set_delivery(&self, delivery: Delivery) {
        *self.delivery.lock().unwrap() = delivery;
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> SyncResult<NotificationOutcome> {
        self.sent.lock().unwrap().push(notification.clone());
        match *self.delivery.lock().unwrap() {
            Delivery::Accepted => Ok(NotificationOutcome {
                success: true,
                message: None,
            }),
            Delivery::Rejected => Ok(NotificationOutcome {
                success: false,
                message: Some("template not configured".into()),
            }),
            Delivery::Unreachable => {
                Err(SyncError::Notification("dispatcher unreachable".into()))
            }
        }
    }
}

/// Memory store that rejects booking inserts for one client.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    failing_client: Mutex<Option<Uuid>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        FaultyStore {
            inner,
            failing_client: Mutex::new(None),
        }
    }

    pub fn fail_bookings_for(&self, client_id: Uuid) {
        *self.failing_client.lock().unwrap() = Some(client_id);
    }

    pub fn heal(&self) {
        *self.failing_client.lock().unwrap() = None;
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn due_instances(
        &self,
        integration_name: &str,
        now: DateTime<Utc>,
    ) -> SyncResult<Vec<IntegrationInstance>> {
        self.inner.due_instances(integration_name, now).await
    }

    async fn integration_instance(&self, id: Uuid) -> SyncResult<Option<IntegrationInstance>> {
        self.inner.integration_instance(id).await
    }

    async fn external_mappings(&self, instance_id: Uuid) -> SyncResult<Vec<ExternalMapping>> {
        self.inner.external_mappings(instance_id).await
    }

    async fn insert_external_mappings(&self, mappings: &[ExternalMapping]) -> SyncResult<()> {
        self.inner.insert_external_mappings(mappings).await
    }

    async fn external_attributes(
        &self,
        query: &AttributeQuery,
    ) -> SyncResult<Vec<ExternalAttribute>> {
        self.inner.external_attributes(query).await
    }

    async fn insert_external_attribute(&self, attribute: &ExternalAttribute) -> SyncResult<()> {
        self.inner.insert_external_attribute(attribute).await
    }

    async fn blocks(&self, ids: &[Uuid]) -> SyncResult<Vec<Block>> {
        self.inner.blocks(ids).await
    }

    async fn blocks_on(
        &self,
        profile_id: Uuid,
        project_id: Uuid,
        date: NaiveDate,
    ) -> SyncResult<Vec<Block>> {
        self.inner.blocks_on(profile_id, project_id, date).await
    }

    async fn insert_block(&self, block: &NewBlock) -> SyncResult<Block> {
        self.inner.insert_block(block).await
    }

    async fn update_block(&self, id: Uuid, patch: &BlockPatch) -> SyncResult<()> {
        self.inner.update_block(id, patch).await
    }

    async fn slots_in_block(&self, block_id: Uuid) -> SyncResult<Vec<Slot>> {
        self.inner.slots_in_block(block_id).await
    }

    async fn insert_slots(&self, slots: &[NewSlot]) -> SyncResult<Vec<Slot>> {
        self.inner.insert_slots(slots).await
    }

    async fn update_slot(&self, id: Uuid, patch: &SlotPatch) -> SyncResult<()> {
        self.inner.update_slot(id, patch).await
    }

    async fn update_block_slots(&self, block_id: Uuid, patch: &SlotPatch) -> SyncResult<()> {
        self.inner.update_block_slots(block_id, patch).await
    }

    async fn delete_slots(&self, ids: &[Uuid]) -> SyncResult<()> {
        self.inner.delete_slots(ids).await
    }

    async fn bookings(&self, ids: &[Uuid]) -> SyncResult<Vec<Booking>> {
        self.inner.bookings(ids).await
    }

    async fn bookings_in_slots(&self, slot_ids: &[Uuid]) -> SyncResult<Vec<Booking>> {
        self.inner.bookings_in_slots(slot_ids).await
    }

    async fn insert_booking(&self, booking: &NewBooking) -> SyncResult<Booking> {
        if *self.failing_client.lock().unwrap() == Some(booking.client_id) {
            return Err(SyncError::Store("bookings: 503 Service Unavailable".into()));
        }
        self.inner.insert_booking(booking).await
    }

    async fn update_booking(&self, id: Uuid, patch: &BookingPatch) -> SyncResult<()> {
        self.inner.update_booking(id, patch).await
    }

    async fn delete_bookings(&self, ids: &[Uuid]) -> SyncResult<()> {
        self.inner.delete_bookings(ids).await
    }

    async fn delete_bookings_in_slots(&self, slot_ids: &[Uuid]) -> SyncResult<()> {
        self.inner.delete_bookings_in_slots(slot_ids).await
    }

    async fn insert_client(&self, client: &NewClient) -> SyncResult<Client> {
        self.inner.insert_client(client).await
    }

    async fn client(&self, id: Uuid) -> SyncResult<Option<Client>> {
        self.inner.client(id).await
    }

    async fn client_by_email(&self, firm_id: Uuid, email: &str) -> SyncResult<Option<Client>> {
        self.inner.client_by_email(firm_id, email).await
    }

    async fn project(&self, id: Uuid) -> SyncResult<Option<Project>> {
        self.inner.project(id).await
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub agenda: Arc<ScriptedAgenda>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: SyncEngine,
    pub instance: IntegrationInstance,
    pub project_id: Uuid,
    pub broker_id: Uuid,
    pub other_broker_id: Uuid,
    pub creator_id: Uuid,
}

impl Fixture {
    /// One firm with a connected project, two brokers, a creator, and a
    /// fully mapped vocabulary.
    pub fn new() -> Self {
        Self::with_store(|store| store as Arc<dyn Store>)
    }

    /// Like `new`, with the engine writing through `wrap(store)`.
    pub fn with_store(wrap: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn Store>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let agenda = Arc::new(ScriptedAgenda::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let integration_id = store.add_integration("realworks");
        let instance = IntegrationInstance {
            id: Uuid::new_v4(),
            integration_id,
            firm_id: Uuid::new_v4(),
            next_sync_at: None,
        };
        store.add_instance(instance.clone());
        seed_vocabulary(&store, instance.id);

        let project_id = store.add_project(Some("active"));
        link(&store, EntityType::Project, project_id, "projectcode", ExternalId::new(PROJECT_CODE));

        let broker_id = Uuid::new_v4();
        let other_broker_id = Uuid::new_v4();
        let creator_id = Uuid::new_v4();
        link(&store, EntityType::Profile, broker_id, "medewerkerIdAanmaker", BROKER.into());
        link(&store, EntityType::Profile, other_broker_id, "medewerkerIdAanmaker", OTHER_BROKER.into());
        link(&store, EntityType::Profile, creator_id, "medewerkerIdAanmaker", CREATOR.into());

        let engine = SyncEngine::new(
            wrap(store.clone()),
            agenda.clone(),
            notifier.clone(),
            SyncSettings::default(),
            "https://book.example",
        );

        Fixture {
            store,
            agenda,
            notifier,
            engine,
            instance,
            project_id,
            broker_id,
            other_broker_id,
            creator_id,
        }
    }

    pub async fn run(&self) -> SyncReport {
        self.engine
            .run(today(), Utc.with_ymd_and_hms(2024, 1, 9, 6, 0, 0).unwrap())
            .await
            .unwrap()
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()
}

pub fn seed_vocabulary(store: &MemoryStore, instance_id: Uuid) {
    let mapping = |kind, id: i64, name: &str, internal: Option<&str>| ExternalMapping {
        integration_instance_id: instance_id,
        kind,
        external_id: ExternalId::from(id),
        external_name: name.to_string(),
        internal_enum: internal.map(str::to_string),
    };

    for m in [
        mapping(MappingKind::Type, 1, BLOCK_TYPE, Some("block")),
        mapping(MappingKind::Type, 2, BOOKING_TYPE, Some("booking")),
        mapping(MappingKind::Type, 3, "Taxatie", None),
        mapping(MappingKind::Status, 10, "Aangevraagd", Some("requested")),
        mapping(MappingKind::Status, 11, "Bevestigd", Some("confirmed")),
        mapping(MappingKind::Status, 12, "Geannuleerd", Some("cancelled")),
    ] {
        store.add_mapping(m);
    }
}

pub fn link(store: &MemoryStore, entity_type: EntityType, entity_id: Uuid, name: &str, value: ExternalId) {
    store.add_attribute(ExternalAttribute {
        entity_type,
        entity_id,
        attribute_name: name.to_string(),
        attribute_value: value,
        integration_instance_id: None,
    });
}

/// Builder for agenda entries on 2024-01-10.
pub struct Entry(AgendaEntry);

impl Entry {
    pub fn group(id: i64, start: &str, end: &str) -> Self {
        Self::new(id, BLOCK_TYPE, start, end)
    }

    pub fn booking(id: i64, start: &str, end: &str) -> Self {
        Self::new(id, BOOKING_TYPE, start, end).status("Bevestigd")
    }

    fn new(id: i64, agendatype: &str, start: &str, end: &str) -> Self {
        Entry(AgendaEntry {
            id: ExternalId::from(id),
            agendatype: agendatype.to_string(),
            begintijd: format!("2024-01-10 {start}:00"),
            eindtijd: format!("2024-01-10 {end}:00"),
            status: None,
            project: Some(AgendaProject {
                projectcode: Some(ExternalId::new(PROJECT_CODE)),
            }),
            relaties: vec![
                relatie("Agendapunt voor", BROKER),
                relatie("Geplaatst door (medewerker)", CREATOR),
                relatie("Betreft relatie", CLIENT),
            ],
        })
    }

    pub fn status(mut self, status: &str) -> Self {
        self.0.status = Some(status.to_string());
        self
    }

    pub fn broker(mut self, broker: i64) -> Self {
        for r in &mut self.0.relaties {
            if r.kind == "Agendapunt voor" {
                r.id = ExternalId::from(broker);
            }
        }
        self
    }

    pub fn client(mut self, client: i64) -> Self {
        for r in &mut self.0.relaties {
            if r.kind == "Betreft relatie" {
                r.id = ExternalId::from(client);
            }
        }
        self
    }

    pub fn build(self) -> AgendaEntry {
        self.0
    }
}

fn relatie(kind: &str, id: i64) -> Relatie {
    Relatie {
        kind: kind.to_string(),
        id: ExternalId::from(id),
    }
}

pub fn at(time: &str) -> chrono::NaiveDateTime {
    parse_timestamp(&format!("2024-01-10 {time}:00")).unwrap()
}
