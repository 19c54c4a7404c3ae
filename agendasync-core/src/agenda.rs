//! Classification of raw agenda entries into blocks and bookings.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::config::RelationLabels;
use crate::error::SyncResult;
use crate::model::{BookingStatus, ExternalId, InternalType};
use crate::remote::protocol::{AgendaEntry, Relatie};
use crate::vocabulary::Vocabulary;
use crate::window::{minutes_between, parse_timestamp};

/// An agenda entry with parsed times and a resolved internal kind.
#[derive(Debug, Clone, PartialEq)]
pub struct AgendaItem {
    pub id: ExternalId,
    pub kind: InternalType,
    pub type_name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: Option<String>,
    pub project_code: Option<ExternalId>,
    pub relations: Vec<Relatie>,
}

impl AgendaItem {
    pub fn from_entry(entry: AgendaEntry, kind: InternalType) -> SyncResult<Self> {
        Ok(AgendaItem {
            start: parse_timestamp(&entry.begintijd)?,
            end: parse_timestamp(&entry.eindtijd)?,
            id: entry.id,
            kind,
            type_name: entry.agendatype,
            status: entry.status,
            project_code: entry.project.and_then(|p| p.projectcode),
            relations: entry.relaties,
        })
    }

    /// External id of the first relation with the given role.
    pub fn relation(&self, label: &str) -> Option<&ExternalId> {
        self.relations
            .iter()
            .find(|r| r.kind == label)
            .map(|r| &r.id)
    }

    pub fn duration_minutes(&self) -> i64 {
        minutes_between(self.start, self.end)
    }

    /// Whether `other` lies within this item's interval (inclusive).
    pub fn contains(&self, other: &AgendaItem) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    pub fn is_cancelled(&self, vocabulary: &Vocabulary, cancelled_status: &str) -> bool {
        match self.status.as_deref() {
            Some(status) => {
                status == cancelled_status
                    || vocabulary.status(status) == Some(BookingStatus::Cancelled)
            }
            None => false,
        }
    }
}

/// A block-like entry together with the bookings nested inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct AgendaGroup {
    pub item: AgendaItem,
    pub bookings: Vec<AgendaItem>,
}

#[derive(Debug, Default)]
pub struct ClassifiedAgenda {
    pub groups: Vec<AgendaGroup>,
    /// Bookings not claimed by any group
    pub standalone: Vec<AgendaItem>,
}

/// Split entries into groups and standalone bookings.
///
/// A booking belongs to a group when both name the same broker relation and
/// project code and the booking's interval lies inside the group's. Each
/// booking is claimed by the first group that matches. Groups without a
/// broker or project cannot be reconciled and are dropped, as are entries
/// whose type is unmapped or whose timestamps do not parse.
pub fn classify(
    entries: Vec<AgendaEntry>,
    vocabulary: &Vocabulary,
    relations: &RelationLabels,
) -> ClassifiedAgenda {
    let mut groups = Vec::new();
    let mut singles = Vec::new();

    for entry in entries {
        let Some(kind) = vocabulary.kind(&entry.agendatype) else {
            debug!(id = %entry.id, agendatype = %entry.agendatype, "skipping unmapped agenda type");
            continue;
        };

        let id = entry.id.clone();
        let item = match AgendaItem::from_entry(entry, kind) {
            Ok(item) => item,
            Err(e) => {
                warn!(%id, error = %e, "skipping agenda entry");
                continue;
            }
        };

        match kind {
            InternalType::Block => groups.push(item),
            InternalType::Booking => singles.push(item),
        }
    }

    let mut claimed: HashSet<ExternalId> = HashSet::new();
    let mut classified = ClassifiedAgenda::default();

    for group in groups {
        let (Some(broker), Some(project)) = (
            group.relation(&relations.broker).cloned(),
            group.project_code.clone(),
        ) else {
            warn!(id = %group.id, "dropping group without broker or project");
            continue;
        };

        let bookings: Vec<AgendaItem> = singles
            .iter()
            .filter(|single| {
                single.id != group.id
                    && !claimed.contains(&single.id)
                    && single.relation(&relations.broker) == Some(&broker)
                    && single.project_code.as_ref() == Some(&project)
                    && group.contains(single)
            })
            .cloned()
            .collect();

        claimed.extend(bookings.iter().map(|b| b.id.clone()));
        classified.groups.push(AgendaGroup {
            item: group,
            bookings,
        });
    }

    classified.standalone = singles
        .into_iter()
        .filter(|single| !claimed.contains(&single.id))
        .collect();

    classified
}
