//! Reconciliation runs over all due integration instances.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::agenda::classify;
use crate::bridge::BlockKey;
use crate::changeset::split;
use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};
use crate::model::IntegrationInstance;
use crate::notify::Notifier;
use crate::reconcile::block_create::create_blocks;
use crate::reconcile::block_update::update_blocks;
use crate::reconcile::{SyncContext, SyncStats, sync_bookings};
use crate::remote::AgendaSource;
use crate::store::Store;
use crate::vocabulary::{Vocabulary, sync_vocabulary};
use crate::window::SyncWindow;

/// Outcome of one instance within a run.
#[derive(Debug)]
pub struct InstanceReport {
    pub instance_id: Uuid,
    pub firm_id: Uuid,
    pub outcome: Result<SyncStats, String>,
}

/// Per-instance outcomes of one run.
#[derive(Debug, Default)]
pub struct SyncReport(pub Vec<InstanceReport>);

impl SyncReport {
    pub fn totals(&self) -> SyncStats {
        let mut total = SyncStats::default();
        for stats in self.0.iter().filter_map(|r| r.outcome.as_ref().ok()) {
            total += *stats;
        }
        total
    }

    pub fn failures(&self) -> impl Iterator<Item = &InstanceReport> {
        self.0.iter().filter(|r| r.outcome.is_err())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct SyncEngine {
    store: Arc<dyn Store>,
    source: Arc<dyn AgendaSource>,
    notifier: Arc<dyn Notifier>,
    settings: SyncSettings,
    public_url: String,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn Store>,
        source: Arc<dyn AgendaSource>,
        notifier: Arc<dyn Notifier>,
        settings: SyncSettings,
        public_url: impl Into<String>,
    ) -> Self {
        SyncEngine {
            store,
            source,
            notifier,
            settings,
            public_url: public_url.into(),
        }
    }

    /// Sync every due instance, `batch_size` instances at a time.
    ///
    /// A failing instance is reported and does not affect the others. Only
    /// failing to list the due instances is an error.
    pub async fn run(&self, today: NaiveDate, now: DateTime<Utc>) -> SyncResult<SyncReport> {
        let instances = self
            .store
            .due_instances(&self.settings.integration_name, now)
            .await?;
        info!(count = instances.len(), "due integration instances");

        let mut report = SyncReport::default();
        for wave in instances.chunks(self.settings.batch_size.max(1)) {
            let results = join_all(wave.iter().map(|i| self.sync_instance(i, today))).await;

            for (instance, result) in wave.iter().zip(results) {
                if let Err(e) = &result {
                    error!(instance = %instance.id, firm = %instance.firm_id, error = %e, "instance sync failed");
                }
                report.0.push(InstanceReport {
                    instance_id: instance.id,
                    firm_id: instance.firm_id,
                    outcome: result.map_err(|e| e.to_string()),
                });
            }
        }

        Ok(report)
    }

    /// Full reconciliation of one instance's agenda window.
    #[instrument(skip_all, fields(instance = %instance.id, firm = %instance.firm_id))]
    pub async fn sync_instance(
        &self,
        instance: &IntegrationInstance,
        today: NaiveDate,
    ) -> SyncResult<SyncStats> {
        let store = self.store.as_ref();
        let vocabulary = sync_vocabulary(store, self.source.as_ref(), instance).await?;
        if vocabulary.type_codes().is_empty() {
            return Ok(SyncStats::default());
        }

        let window = SyncWindow::upcoming(today, self.settings.window_days);
        let entries = self
            .source
            .firm_agenda(instance.firm_id, &window, vocabulary.type_codes())
            .await?;

        let classified = classify(entries, &vocabulary, &self.settings.relations);
        info!(
            groups = classified.groups.len(),
            standalone = classified.standalone.len(),
            "classified agenda"
        );

        let ctx = SyncContext {
            store,
            source: self.source.as_ref(),
            notifier: self.notifier.as_ref(),
            settings: &self.settings,
            public_url: &self.public_url,
            instance,
            vocabulary: &vocabulary,
        };

        let blocks = split::<BlockKey, _>(store, classified.groups).await?;
        let (mut stats, created) = futures::join!(
            update_blocks(&ctx, blocks.to_update),
            create_blocks(&ctx, blocks.to_create),
        );
        stats += created;
        stats += sync_bookings(&ctx, classified.standalone, None).await?;

        info!(%stats, "instance synced");
        Ok(stats)
    }

    /// Run only the vocabulary step for one instance.
    pub async fn sync_vocabulary(&self, instance_id: Uuid) -> SyncResult<Vocabulary> {
        let instance = self
            .store
            .integration_instance(instance_id)
            .await?
            .ok_or_else(|| SyncError::InstanceNotFound(instance_id.to_string()))?;

        sync_vocabulary(self.store.as_ref(), self.source.as_ref(), &instance).await
    }
}
