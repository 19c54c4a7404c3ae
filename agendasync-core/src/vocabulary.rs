//! External status/type vocabulary and its mapping onto internal enums.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::error::SyncResult;
use crate::model::{
    BookingStatus, ExternalId, ExternalMapping, IntegrationInstance, InternalType, MappingKind,
};
use crate::remote::AgendaSource;
use crate::remote::protocol::VocabularyEntry;
use crate::store::Store;

/// Lookup maps derived from an instance's external mappings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vocabulary {
    statuses: HashMap<String, BookingStatus>,
    types: HashMap<String, InternalType>,
    type_codes: Vec<ExternalId>,
}

impl Vocabulary {
    /// Only rows with a recognised internal enum make it into the maps;
    /// anything else stays unmapped so classification skips it.
    pub fn from_mappings(mappings: &[ExternalMapping]) -> Self {
        let mut vocabulary = Vocabulary::default();

        for mapping in mappings {
            let Some(internal) = mapping.internal_enum.as_deref() else {
                continue;
            };
            match mapping.kind {
                MappingKind::Status => {
                    if let Ok(status) = internal.parse::<BookingStatus>() {
                        vocabulary
                            .statuses
                            .insert(mapping.external_name.clone(), status);
                    }
                }
                MappingKind::Type => {
                    if let Ok(kind) = internal.parse::<InternalType>() {
                        vocabulary.types.insert(mapping.external_name.clone(), kind);
                        if !vocabulary.type_codes.contains(&mapping.external_id) {
                            vocabulary.type_codes.push(mapping.external_id.clone());
                        }
                    }
                }
            }
        }

        vocabulary.type_codes.sort();
        vocabulary
    }

    pub fn status(&self, external_name: &str) -> Option<BookingStatus> {
        self.statuses.get(external_name).copied()
    }

    pub fn kind(&self, external_name: &str) -> Option<InternalType> {
        self.types.get(external_name).copied()
    }

    /// External type codes worth fetching.
    pub fn type_codes(&self) -> &[ExternalId] {
        &self.type_codes
    }

    pub fn statuses(&self) -> &HashMap<String, BookingStatus> {
        &self.statuses
    }

    pub fn types(&self) -> &HashMap<String, InternalType> {
        &self.types
    }
}

/// Entries from `fetched` whose id is not yet recorded for `kind`.
///
/// The table is append-only: a renamed external code keeps its first name.
pub fn unseen_entries(
    existing: &[ExternalMapping],
    fetched: &[VocabularyEntry],
    kind: MappingKind,
    instance: &IntegrationInstance,
) -> Vec<ExternalMapping> {
    let mut seen: HashSet<&ExternalId> = existing
        .iter()
        .filter(|m| m.kind == kind)
        .map(|m| &m.external_id)
        .collect();

    fetched
        .iter()
        .filter(|entry| seen.insert(&entry.systemid))
        .map(|entry| ExternalMapping {
            integration_instance_id: instance.id,
            kind,
            external_id: entry.systemid.clone(),
            external_name: entry.name.clone(),
            internal_enum: None,
        })
        .collect()
}

/// Record unseen external codes and return the instance's vocabulary.
pub async fn sync_vocabulary(
    store: &dyn Store,
    source: &dyn AgendaSource,
    instance: &IntegrationInstance,
) -> SyncResult<Vocabulary> {
    let existing = store.external_mappings(instance.id).await?;

    let (types, statuses) = futures::try_join!(
        source.firm_types(instance.firm_id),
        source.firm_statuses(instance.firm_id),
    )?;

    let mut to_save = unseen_entries(&existing, &types, MappingKind::Type, instance);
    to_save.extend(unseen_entries(
        &existing,
        &statuses,
        MappingKind::Status,
        instance,
    ));

    if !to_save.is_empty() {
        info!(count = to_save.len(), "recording new vocabulary codes");
        store.insert_external_mappings(&to_save).await?;
    }

    let vocabulary = Vocabulary::from_mappings(&existing);
    if vocabulary.type_codes().is_empty() {
        warn!(instance = %instance.id, "no agenda types are mapped to block or booking");
    }
    Ok(vocabulary)
}
