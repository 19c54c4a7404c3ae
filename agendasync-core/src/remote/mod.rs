//! The external agenda: what the CRM holds and how it is fetched.

pub mod protocol;
pub mod realworks;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::model::ExternalId;
use crate::remote::protocol::{AgendaEntry, RelationProfile, VocabularyEntry};
use crate::window::SyncWindow;

pub use realworks::RealworksClient;

/// Read access to a firm's agenda in the CRM.
#[async_trait]
pub trait AgendaSource: Send + Sync {
    /// Agenda items whose start falls in `window`, restricted to `type_codes`.
    async fn firm_agenda(
        &self,
        firm_id: Uuid,
        window: &SyncWindow,
        type_codes: &[ExternalId],
    ) -> SyncResult<Vec<AgendaEntry>>;

    async fn firm_types(&self, firm_id: Uuid) -> SyncResult<Vec<VocabularyEntry>>;

    async fn firm_statuses(&self, firm_id: Uuid) -> SyncResult<Vec<VocabularyEntry>>;

    async fn client_profile(
        &self,
        relation_id: &ExternalId,
        firm_id: Uuid,
    ) -> SyncResult<RelationProfile>;
}
