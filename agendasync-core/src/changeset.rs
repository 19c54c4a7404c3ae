//! Routing of external entries to the update or create path.

use uuid::Uuid;

use crate::agenda::{AgendaGroup, AgendaItem};
use crate::bridge::{Bridge, BridgeKind};
use crate::error::SyncResult;
use crate::model::ExternalId;
use crate::store::Store;

/// Anything carrying an external agenda id.
pub trait Keyed {
    fn external_id(&self) -> &ExternalId;
}

impl Keyed for AgendaItem {
    fn external_id(&self) -> &ExternalId {
        &self.id
    }
}

impl Keyed for AgendaGroup {
    fn external_id(&self) -> &ExternalId {
        &self.item.id
    }
}

/// An external entry paired with the local row it was synced to earlier.
#[derive(Debug, Clone)]
pub struct Matched<T> {
    pub external: T,
    pub local_id: Uuid,
}

#[derive(Debug)]
pub struct ChangeSet<T> {
    pub to_update: Vec<Matched<T>>,
    pub to_create: Vec<T>,
}

impl<T> Default for ChangeSet<T> {
    fn default() -> Self {
        ChangeSet {
            to_update: Vec::new(),
            to_create: Vec::new(),
        }
    }
}

impl<T> ChangeSet<T> {
    pub fn is_empty(&self) -> bool {
        self.to_update.is_empty() && self.to_create.is_empty()
    }
}

/// Split `entries` by whether bridge `K` already links their external id.
pub async fn split<K: BridgeKind, T: Keyed>(
    store: &dyn Store,
    entries: Vec<T>,
) -> SyncResult<ChangeSet<T>> {
    let ids: Vec<ExternalId> = entries.iter().map(|e| e.external_id().clone()).collect();
    let known = Bridge::<K>::known(store, &ids).await?;

    let mut changes = ChangeSet::default();
    for entry in entries {
        match known.get(entry.external_id()) {
            Some(&local_id) => changes.to_update.push(Matched {
                external: entry,
                local_id,
            }),
            None => changes.to_create.push(entry),
        }
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BlockKey, BookingKey};
    use crate::model::{EntityType, ExternalAttribute};
    use crate::store::MemoryStore;

    struct Entry(ExternalId);

    impl Keyed for Entry {
        fn external_id(&self) -> &ExternalId {
            &self.0
        }
    }

    #[tokio::test]
    async fn test_split_routes_by_bridge() {
        let store = MemoryStore::new();
        let booking_id = Uuid::new_v4();
        store.add_attribute(ExternalAttribute {
            entity_type: EntityType::Booking,
            entity_id: booking_id,
            attribute_name: "agendaId".into(),
            attribute_value: ExternalId::from(1),
            integration_instance_id: None,
        });

        let entries = vec![Entry(ExternalId::from(1)), Entry(ExternalId::from(2))];
        let changes = split::<BookingKey, _>(&store, entries).await.unwrap();

        assert_eq!(changes.to_update.len(), 1);
        assert_eq!(changes.to_update[0].local_id, booking_id);
        assert_eq!(changes.to_create.len(), 1);
        assert_eq!(changes.to_create[0].0, ExternalId::from(2));

        // The same external id means nothing through the block bridge
        let entries = vec![Entry(ExternalId::from(1))];
        let changes = split::<BlockKey, _>(&store, entries).await.unwrap();
        assert!(changes.to_update.is_empty());
        assert_eq!(changes.to_create.len(), 1);
    }
}
