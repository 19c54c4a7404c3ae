//! Appointment confirmations sent after a booking is created.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::constants::APPOINTMENT_CONFIRMATION_EVENT;
use crate::error::{SyncError, SyncResult};

/// Payload for the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub event: String,
    pub client_id: Uuid,
    pub project_id: Uuid,
    pub booking_id: Uuid,
    pub profile_id: Uuid,
    pub firm_id: Uuid,
    pub skip_broker_notification: bool,
    #[serde(rename = "additionalVariables")]
    pub additional_variables: BTreeMap<String, String>,
}

/// Ids a confirmation refers to.
#[derive(Debug, Clone, Copy)]
pub struct BookingRef {
    pub booking_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Uuid,
    pub profile_id: Uuid,
    pub firm_id: Uuid,
}

impl Notification {
    /// Confirmation for a newly placed booking, with self-service links.
    ///
    /// The broker is not notified: the appointment originates from the
    /// broker's own agenda.
    pub fn appointment_confirmation(
        booking: BookingRef,
        duration: i64,
        base_url: &str,
        language: &str,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        let mut variables = BTreeMap::new();
        variables.insert("duration".to_string(), duration.to_string());
        variables.insert(
            "cancel_url".to_string(),
            format!("{base}/cancel-booking/{}?lang={language}", booking.booking_id),
        );
        variables.insert(
            "reschedule_url".to_string(),
            format!("{base}/reschedule-booking/{}?lang={language}", booking.booking_id),
        );

        Notification {
            event: APPOINTMENT_CONFIRMATION_EVENT.to_string(),
            client_id: booking.client_id,
            project_id: booking.project_id,
            booking_id: booking.booking_id,
            profile_id: booking.profile_id,
            firm_id: booking.firm_id,
            skip_broker_notification: true,
            additional_variables: variables,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NotificationOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> SyncResult<NotificationOutcome>;
}

/// Posts notifications as JSON to a dispatcher endpoint.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Notification(format!("Failed to build HTTP client: {e}")))?;

        Ok(WebhookNotifier {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(level = "debug", skip_all, fields(event = %notification.event, booking = %notification.booking_id))]
    async fn send(&self, notification: &Notification) -> SyncResult<NotificationOutcome> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| SyncError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Notification(format!(
                "Dispatcher returned {status}: {body}"
            )));
        }

        response
            .json::<NotificationOutcome>()
            .await
            .map_err(|e| SyncError::Notification(format!("Failed to parse dispatcher reply: {e}")))
    }
}

/// Records notifications in the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> SyncResult<NotificationOutcome> {
        info!(
            event = %notification.event,
            booking = %notification.booking_id,
            client = %notification.client_id,
            "notification (not dispatched)"
        );
        Ok(NotificationOutcome {
            success: true,
            message: None,
        })
    }
}
