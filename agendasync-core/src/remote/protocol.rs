//! Wire types returned by the agenda proxy.
//!
//! Field names follow the CRM's Dutch vocabulary; only the fields the
//! reconciliation consumes are modelled.

use serde::{Deserialize, Serialize};

use crate::model::ExternalId;

/// One agenda item as delivered by the CRM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaEntry {
    pub id: ExternalId,
    /// External type name, resolved through the type vocabulary
    pub agendatype: String,
    /// `YYYY-MM-DD HH:MM:SS`
    pub begintijd: String,
    /// `YYYY-MM-DD HH:MM:SS`
    pub eindtijd: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub project: Option<AgendaProject>,
    #[serde(default)]
    pub relaties: Vec<Relatie>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgendaProject {
    #[serde(default)]
    pub projectcode: Option<ExternalId>,
}

/// A party linked to an agenda item, tagged by its role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relatie {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: ExternalId,
}

/// A status or type code in the CRM's vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub systemid: ExternalId,
    #[serde(alias = "type", alias = "status")]
    pub name: String,
}

/// Contact details of a CRM relation, used to provision local clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationProfile {
    #[serde(default)]
    pub roepnaam: Option<String>,
    #[serde(default)]
    pub voornaam: Option<String>,
    #[serde(default)]
    pub achternaam: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobiel_telefoonnummer: Option<String>,
    #[serde(default)]
    pub taal: Option<String>,
}

impl RelationProfile {
    pub fn first_name(&self) -> Option<&str> {
        self.roepnaam
            .as_deref()
            .or(self.voornaam.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

/// One page of a paginated listing.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub resultaten: Vec<T>,
    #[serde(default)]
    pub paginering: Option<Paginering>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Paginering {
    #[serde(default)]
    pub volgende: Option<String>,
}
