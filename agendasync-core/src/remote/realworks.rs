//! HTTP client for the agenda proxy that fronts the CRM's REST API.
//!
//! The proxy owns the CRM credentials; this client only forwards the firm
//! id and, when configured, a bearer token for the proxy itself.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::model::ExternalId;
use crate::remote::AgendaSource;
use crate::remote::protocol::{AgendaEntry, Page, RelationProfile, VocabularyEntry};
use crate::window::SyncWindow;

/// Upper bound on followed `volgende` links per listing.
const MAX_PAGES: usize = 500;

#[derive(Clone)]
pub struct RealworksClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
}

impl RealworksClient {
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Remote(format!("Failed to build HTTP client: {e}")))?;

        // A trailing slash keeps `Url::join` from dropping the last path segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| SyncError::Config(format!("Invalid agenda proxy URL '{base_url}': {e}")))?;

        Ok(RealworksClient {
            client,
            base_url,
            token: None,
            timeout,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn endpoint(&self, path: &str) -> SyncResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| SyncError::Remote(format!("Invalid endpoint '{path}': {e}")))
    }

    fn get(&self, url: Url) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> SyncResult<T> {
        let response = self.get(url.clone()).send().await.map_err(|e| self.map_err(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Remote(format!(
                "GET {} returned {}: {}",
                url.path(),
                status,
                body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::Remote(format!("Failed to parse {}: {e}", url.path())))
    }

    /// Follow `paginering.volgende` links and concatenate every page.
    async fn fetch_all<T: DeserializeOwned>(&self, first: Url) -> SyncResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(SyncError::Remote(format!(
                    "Pagination did not terminate after {MAX_PAGES} pages"
                )));
            }

            let page: Page<T> = self.fetch(url.clone()).await?;
            items.extend(page.resultaten);

            next = match page.paginering.and_then(|p| p.volgende) {
                Some(link) if !link.is_empty() => Some(url.join(&link).map_err(|e| {
                    SyncError::Remote(format!("Invalid pagination link '{link}': {e}"))
                })?),
                _ => None,
            };
        }

        debug!(pages, items = items.len(), "fetched paginated listing");
        Ok(items)
    }

    fn map_err(&self, e: reqwest::Error) -> SyncError {
        if e.is_timeout() {
            SyncError::RemoteTimeout(self.timeout.as_secs())
        } else {
            SyncError::Remote(e.to_string())
        }
    }
}

#[async_trait]
impl AgendaSource for RealworksClient {
    #[instrument(level = "info", skip(self, window, type_codes))]
    async fn firm_agenda(
        &self,
        firm_id: Uuid,
        window: &SyncWindow,
        type_codes: &[ExternalId],
    ) -> SyncResult<Vec<AgendaEntry>> {
        let codes = type_codes
            .iter()
            .map(ExternalId::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let mut url = self.endpoint(&format!("getAfdelingAgenda/{firm_id}"))?;
        url.query_pairs_mut()
            .append_pair("agendatypes", &codes)
            .append_pair("begintijdVanaf", &window.from_external())
            .append_pair("begintijdTot", &window.to_external());

        self.fetch_all(url).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn firm_types(&self, firm_id: Uuid) -> SyncResult<Vec<VocabularyEntry>> {
        self.fetch(self.endpoint(&format!("getAgendaTypes/{firm_id}"))?)
            .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn firm_statuses(&self, firm_id: Uuid) -> SyncResult<Vec<VocabularyEntry>> {
        self.fetch(self.endpoint(&format!("getAgendaStatussen/{firm_id}"))?)
            .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn client_profile(
        &self,
        relation_id: &ExternalId,
        firm_id: Uuid,
    ) -> SyncResult<RelationProfile> {
        let mut url = self.endpoint(&format!("getRelation/{relation_id}"))?;
        url.query_pairs_mut()
            .append_pair("firmId", &firm_id.to_string());

        self.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(id: i64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "agendatype": "Bezichtiging",
            "begintijd": "2024-01-10 09:00:00",
            "eindtijd": "2024-01-10 09:20:00",
            "status": "Bevestigd",
            "project": { "projectcode": "123456" },
            "relaties": [{ "type": "Agendapunt voor", "id": 77 }]
        })
    }

    #[tokio::test]
    async fn test_firm_agenda_follows_pagination() {
        let server = MockServer::start().await;
        let firm = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path(format!("/getAfdelingAgenda/{firm}")))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resultaten": [entry(2)],
                "paginering": {}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/getAfdelingAgenda/{firm}")))
            .and(query_param("begintijdVanaf", "2024-01-10 00:00:00"))
            .and(query_param("agendatypes", "11,12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resultaten": [entry(1)],
                "paginering": { "volgende": format!("/getAfdelingAgenda/{firm}?page=2") }
            })))
            .mount(&server)
            .await;

        let client = RealworksClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let window = SyncWindow::upcoming(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(), 7);
        let entries = client
            .firm_agenda(firm, &window, &[ExternalId::from(11), ExternalId::from(12)])
            .await
            .unwrap();

        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(entries[0].relaties[0].id, ExternalId::from(77));
    }

    #[tokio::test]
    async fn test_vocabulary_accepts_type_and_status_keys() {
        let server = MockServer::start().await;
        let firm = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path(format!("/getAgendaTypes/{firm}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "systemid": 11, "type": "Bezichtiging blokken" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/getAgendaStatussen/{firm}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "systemid": "3", "status": "Bevestigd" }
            ])))
            .mount(&server)
            .await;

        let client = RealworksClient::new(&server.uri(), Duration::from_secs(5)).unwrap();

        let types = client.firm_types(firm).await.unwrap();
        let statuses = client.firm_statuses(firm).await.unwrap();

        assert_eq!(types[0].name, "Bezichtiging blokken");
        assert_eq!(statuses[0].systemid, ExternalId::from(3));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        let firm = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/getRelation/42"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = RealworksClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let result = client.client_profile(&ExternalId::from(42), firm).await;

        assert!(matches!(result, Err(SyncError::Remote(_))));
    }
}
