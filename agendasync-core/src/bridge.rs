//! Typed views over the external attribute table.
//!
//! One physical table links local rows to external ids under several
//! `(entity_type, attribute_name)` pairs. Each pair gets its own marker type
//! so a broker id can never be looked up through the booking index. Within a
//! bridge the first matching row is authoritative: one external id resolves
//! to at most one local id.

use std::collections::HashMap;
use std::marker::PhantomData;

use uuid::Uuid;

use crate::error::SyncResult;
use crate::model::{EntityType, ExternalAttribute, ExternalId};
use crate::store::{AttributeQuery, Store};

pub trait BridgeKind {
    const ENTITY_TYPE: EntityType;
    const ATTRIBUTE_NAME: &'static str;
}

pub struct BrokerKey;
pub struct ClientKey;
pub struct ProjectKey;
pub struct BlockKey;
pub struct BookingKey;

impl BridgeKind for BrokerKey {
    const ENTITY_TYPE: EntityType = EntityType::Profile;
    const ATTRIBUTE_NAME: &'static str = "medewerkerIdAanmaker";
}

impl BridgeKind for ClientKey {
    const ENTITY_TYPE: EntityType = EntityType::Client;
    const ATTRIBUTE_NAME: &'static str = "relationId";
}

impl BridgeKind for ProjectKey {
    const ENTITY_TYPE: EntityType = EntityType::Project;
    const ATTRIBUTE_NAME: &'static str = "projectcode";
}

impl BridgeKind for BlockKey {
    const ENTITY_TYPE: EntityType = EntityType::Block;
    const ATTRIBUTE_NAME: &'static str = "blockId";
}

impl BridgeKind for BookingKey {
    const ENTITY_TYPE: EntityType = EntityType::Booking;
    const ATTRIBUTE_NAME: &'static str = "agendaId";
}

pub struct Bridge<K>(PhantomData<K>);

pub type BrokerBridge = Bridge<BrokerKey>;
pub type ClientBridge = Bridge<ClientKey>;
pub type ProjectBridge = Bridge<ProjectKey>;
pub type BlockBridge = Bridge<BlockKey>;
pub type BookingBridge = Bridge<BookingKey>;

impl<K: BridgeKind> Bridge<K> {
    fn query() -> AttributeQuery {
        AttributeQuery {
            entity_type: Some(K::ENTITY_TYPE),
            attribute_name: Some(K::ATTRIBUTE_NAME.to_string()),
            ..AttributeQuery::default()
        }
    }

    /// Local id linked to `external`, if any.
    pub async fn lookup(store: &dyn Store, external: &ExternalId) -> SyncResult<Option<Uuid>> {
        let rows = store
            .external_attributes(&AttributeQuery {
                values: Some(vec![external.clone()]),
                ..Self::query()
            })
            .await?;
        Ok(rows.first().map(|row| row.entity_id))
    }

    /// First link for each of `externals` that has one.
    pub async fn known(
        store: &dyn Store,
        externals: &[ExternalId],
    ) -> SyncResult<HashMap<ExternalId, Uuid>> {
        if externals.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = store
            .external_attributes(&AttributeQuery {
                values: Some(externals.to_vec()),
                ..Self::query()
            })
            .await?;

        let mut known = HashMap::new();
        for row in rows {
            known.entry(row.attribute_value).or_insert(row.entity_id);
        }
        Ok(known)
    }

    /// External id recorded for each of `locals` that has one.
    pub async fn external_ids(
        store: &dyn Store,
        locals: &[Uuid],
    ) -> SyncResult<HashMap<Uuid, ExternalId>> {
        if locals.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = store
            .external_attributes(&AttributeQuery {
                entity_ids: Some(locals.to_vec()),
                ..Self::query()
            })
            .await?;

        let mut ids = HashMap::new();
        for row in rows {
            ids.entry(row.entity_id).or_insert(row.attribute_value);
        }
        Ok(ids)
    }

    pub async fn link(
        store: &dyn Store,
        local: Uuid,
        external: &ExternalId,
        instance_id: Uuid,
    ) -> SyncResult<()> {
        store
            .insert_external_attribute(&ExternalAttribute {
                entity_type: K::ENTITY_TYPE,
                entity_id: local,
                attribute_name: K::ATTRIBUTE_NAME.to_string(),
                attribute_value: external.clone(),
                integration_instance_id: Some(instance_id),
            })
            .await
    }

    /// The external id a firm designated as its default for this bridge.
    pub async fn firm_default(store: &dyn Store, firm_id: Uuid) -> SyncResult<Option<ExternalId>> {
        let rows = store
            .external_attributes(&AttributeQuery {
                entity_type: Some(EntityType::FirmDefault),
                attribute_name: Some(K::ATTRIBUTE_NAME.to_string()),
                values: None,
                entity_ids: Some(vec![firm_id]),
            })
            .await?;
        Ok(rows.into_iter().next().map(|row| row.attribute_value))
    }
}
