//! Store backed by a PostgREST endpoint (e.g. Supabase's `/rest/v1`).

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::model::{
    Block, BlockPatch, Booking, BookingPatch, Client as ClientRow, ExternalAttribute,
    ExternalMapping, Integration, IntegrationInstance, NewBlock, NewBooking, NewClient, NewSlot,
    Project, Slot, SlotPatch,
};
use crate::store::{AttributeQuery, Store};

const BLOCK_WITH_SLOTS: &str = "*,slots(*)";
const BOOKING_WITH_SLOT: &str = "*,slot:slot_id(*)";

type Query = Vec<(&'static str, String)>;

pub struct PostgrestStore {
    client: Client,
    rest_url: Url,
    api_key: String,
}

impl PostgrestStore {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Store(format!("Failed to build HTTP client: {e}")))?;

        let base = Url::parse(base_url)
            .map_err(|e| SyncError::Config(format!("Invalid store URL '{base_url}': {e}")))?;
        let rest_url = base
            .join("rest/v1/")
            .map_err(|e| SyncError::Config(format!("Invalid store URL '{base_url}': {e}")))?;

        Ok(PostgrestStore {
            client,
            rest_url,
            api_key: api_key.into(),
        })
    }

    fn request(&self, method: Method, table: &str, query: &Query) -> SyncResult<RequestBuilder> {
        let url = self
            .rest_url
            .join(table)
            .map_err(|e| SyncError::Store(format!("Invalid table '{table}': {e}")))?;

        Ok(self
            .client
            .request(method, url)
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key))
    }

    async fn send(&self, table: &str, request: RequestBuilder) -> SyncResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Store(format!("{table}: {e}")))?;

        match response.status() {
            StatusCode::CONFLICT => Err(SyncError::Conflict(table.to_string())),
            status if status.is_success() => Ok(response),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SyncError::Store(format!("{table}: {status} {body}")))
            }
        }
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: Query) -> SyncResult<Vec<T>> {
        let request = self.request(Method::GET, table, &query)?;
        let response = self.send(table, request).await?;
        response
            .json()
            .await
            .map_err(|e| SyncError::Serialization(format!("{table}: {e}")))
    }

    async fn insert<B, T>(&self, table: &str, rows: &B, select: &str) -> SyncResult<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let query = vec![("select", select.to_string())];
        let request = self
            .request(Method::POST, table, &query)?
            .header("Prefer", "return=representation")
            .json(rows);
        let response = self.send(table, request).await?;
        response
            .json()
            .await
            .map_err(|e| SyncError::Serialization(format!("{table}: {e}")))
    }

    async fn insert_quiet<B: Serialize + ?Sized>(&self, table: &str, rows: &B) -> SyncResult<()> {
        let request = self
            .request(Method::POST, table, &Vec::new())?
            .header("Prefer", "return=minimal")
            .json(rows);
        self.send(table, request).await?;
        Ok(())
    }

    async fn patch<B: Serialize>(&self, table: &str, query: Query, body: &B) -> SyncResult<()> {
        let request = self
            .request(Method::PATCH, table, &query)?
            .header("Prefer", "return=minimal")
            .json(body);
        self.send(table, request).await?;
        Ok(())
    }

    async fn delete(&self, table: &str, query: Query) -> SyncResult<()> {
        let request = self.request(Method::DELETE, table, &query)?;
        self.send(table, request).await?;
        debug!(table, "deleted rows");
        Ok(())
    }

    async fn insert_one<B, T>(&self, table: &str, row: &B, select: &str) -> SyncResult<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        self.insert::<_, T>(table, std::slice::from_ref(row), select)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::Store(format!("{table}: insert returned no row")))
    }
}

fn eq(value: impl Display) -> String {
    format!("eq.{value}")
}

/// PostgREST `in.(...)` filter with every value quoted.
fn in_list<T: Display>(values: &[T]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.to_string().replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

/// Case-insensitive PostgREST `ilike.` filter with `LIKE` metacharacters escaped.
fn ilike_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("ilike.{escaped}")
}

#[async_trait]
impl Store for PostgrestStore {
    #[instrument(level = "debug", skip(self))]
    async fn due_instances(
        &self,
        integration_name: &str,
        now: DateTime<Utc>,
    ) -> SyncResult<Vec<IntegrationInstance>> {
        let integrations: Vec<Integration> = self
            .select(
                "integrations",
                vec![("select", "*".into()), ("name", eq(integration_name))],
            )
            .await?;

        let Some(integration) = integrations.into_iter().next() else {
            return Ok(Vec::new());
        };

        let now = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.select(
            "integration_instances",
            vec![
                ("select", "*".into()),
                ("integration_id", eq(integration.id)),
                ("or", format!("(next_sync_at.is.null,next_sync_at.lte.{now})")),
            ],
        )
        .await
    }

    async fn integration_instance(&self, id: Uuid) -> SyncResult<Option<IntegrationInstance>> {
        let rows: Vec<IntegrationInstance> = self
            .select(
                "integration_instances",
                vec![("select", "*".into()), ("id", eq(id))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn external_mappings(&self, instance_id: Uuid) -> SyncResult<Vec<ExternalMapping>> {
        self.select(
            "external_mappings",
            vec![
                ("select", "*".into()),
                ("integration_instance_id", eq(instance_id)),
            ],
        )
        .await
    }

    async fn insert_external_mappings(&self, mappings: &[ExternalMapping]) -> SyncResult<()> {
        if mappings.is_empty() {
            return Ok(());
        }
        self.insert_quiet("external_mappings", mappings).await
    }

    async fn external_attributes(
        &self,
        query: &AttributeQuery,
    ) -> SyncResult<Vec<ExternalAttribute>> {
        let mut params: Query = vec![("select", "*".into())];
        if let Some(entity_type) = query.entity_type {
            params.push(("entity_type", eq(entity_type.as_str())));
        }
        if let Some(name) = &query.attribute_name {
            params.push(("attribute_name", eq(name)));
        }
        if let Some(values) = &query.values {
            if values.is_empty() {
                return Ok(Vec::new());
            }
            params.push(("attribute_value", in_list(values)));
        }
        if let Some(ids) = &query.entity_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            params.push(("entity_id", in_list(ids)));
        }
        self.select("external_attributes", params).await
    }

    async fn insert_external_attribute(&self, attribute: &ExternalAttribute) -> SyncResult<()> {
        self.insert_quiet("external_attributes", std::slice::from_ref(attribute))
            .await
    }

    async fn blocks(&self, ids: &[Uuid]) -> SyncResult<Vec<Block>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            "blocks",
            vec![("select", BLOCK_WITH_SLOTS.into()), ("id", in_list(ids))],
        )
        .await
    }

    async fn blocks_on(
        &self,
        profile_id: Uuid,
        project_id: Uuid,
        date: NaiveDate,
    ) -> SyncResult<Vec<Block>> {
        self.select(
            "blocks",
            vec![
                ("select", BLOCK_WITH_SLOTS.into()),
                ("profile_id", eq(profile_id)),
                ("project_id", eq(project_id)),
                ("date", eq(date)),
            ],
        )
        .await
    }

    async fn insert_block(&self, block: &NewBlock) -> SyncResult<Block> {
        self.insert_one("blocks", block, "*").await
    }

    async fn update_block(&self, id: Uuid, patch: &BlockPatch) -> SyncResult<()> {
        self.patch("blocks", vec![("id", eq(id))], patch).await
    }

    async fn slots_in_block(&self, block_id: Uuid) -> SyncResult<Vec<Slot>> {
        self.select(
            "slots",
            vec![("select", "*".into()), ("block_id", eq(block_id))],
        )
        .await
    }

    async fn insert_slots(&self, slots: &[NewSlot]) -> SyncResult<Vec<Slot>> {
        if slots.is_empty() {
            return Ok(Vec::new());
        }
        self.insert("slots", slots, "*").await
    }

    async fn update_slot(&self, id: Uuid, patch: &SlotPatch) -> SyncResult<()> {
        self.patch("slots", vec![("id", eq(id))], patch).await
    }

    async fn update_block_slots(&self, block_id: Uuid, patch: &SlotPatch) -> SyncResult<()> {
        self.patch("slots", vec![("block_id", eq(block_id))], patch)
            .await
    }

    async fn delete_slots(&self, ids: &[Uuid]) -> SyncResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.delete("slots", vec![("id", in_list(ids))]).await
    }

    async fn bookings(&self, ids: &[Uuid]) -> SyncResult<Vec<Booking>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            "bookings",
            vec![("select", BOOKING_WITH_SLOT.into()), ("id", in_list(ids))],
        )
        .await
    }

    async fn bookings_in_slots(&self, slot_ids: &[Uuid]) -> SyncResult<Vec<Booking>> {
        if slot_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            "bookings",
            vec![("select", "*".into()), ("slot_id", in_list(slot_ids))],
        )
        .await
    }

    async fn insert_booking(&self, booking: &NewBooking) -> SyncResult<Booking> {
        self.insert_one("bookings", booking, "*").await
    }

    async fn update_booking(&self, id: Uuid, patch: &BookingPatch) -> SyncResult<()> {
        self.patch("bookings", vec![("id", eq(id))], patch).await
    }

    async fn delete_bookings(&self, ids: &[Uuid]) -> SyncResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.delete("bookings", vec![("id", in_list(ids))]).await
    }

    async fn delete_bookings_in_slots(&self, slot_ids: &[Uuid]) -> SyncResult<()> {
        if slot_ids.is_empty() {
            return Ok(());
        }
        self.delete("bookings", vec![("slot_id", in_list(slot_ids))])
            .await
    }

    async fn insert_client(&self, client: &NewClient) -> SyncResult<ClientRow> {
        self.insert_one("clients", client, "*").await
    }

    async fn client(&self, id: Uuid) -> SyncResult<Option<ClientRow>> {
        let rows: Vec<ClientRow> = self
            .select("clients", vec![("select", "*".into()), ("id", eq(id))])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn client_by_email(&self, firm_id: Uuid, email: &str) -> SyncResult<Option<ClientRow>> {
        let rows: Vec<ClientRow> = self
            .select(
                "clients",
                vec![
                    ("select", "*".into()),
                    ("firm_id", eq(firm_id)),
                    ("email", ilike_literal(email)),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn project(&self, id: Uuid) -> SyncResult<Option<Project>> {
        let rows: Vec<Project> = self
            .select(
                "projects",
                vec![("select", "id,status".into()), ("id", eq(id))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookingStatus, EntityType, ExternalId};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> PostgrestStore {
        PostgrestStore::new(&server.uri(), "service-key", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_in_list_quotes_values() {
        assert_eq!(in_list(&["1", "2"]), "in.(\"1\",\"2\")");
    }

    #[test]
    fn test_ilike_literal_escapes_wildcards() {
        assert_eq!(ilike_literal("Anna@Example.com"), "ilike.Anna@Example.com");
        assert_eq!(ilike_literal("a_b%c@x.nl"), r"ilike.a\_b\%c@x.nl");
    }

    #[tokio::test]
    async fn test_client_by_email_matches_literally() {
        let server = MockServer::start().await;
        let firm_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/clients"))
            .and(query_param("firm_id", format!("eq.{firm_id}")))
            .and(query_param("email", r"ilike.j\_de\_vries@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let found = store(&server)
            .client_by_email(firm_id, "j_de_vries@example.com")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_attribute_query_builds_filters() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/external_attributes"))
            .and(header("apikey", "service-key"))
            .and(query_param("entity_type", "eq.booking"))
            .and(query_param("attribute_name", "eq.agendaId"))
            .and(query_param("attribute_value", "in.(\"500\")"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "entity_type": "booking",
                "entity_id": "6f1c2f5e-8a51-4c8e-9a50-3c2a7f0b9d11",
                "attribute_name": "agendaId",
                "attribute_value": "500",
                "integration_instance_id": null
            }])))
            .mount(&server)
            .await;

        let rows = store(&server)
            .external_attributes(&AttributeQuery {
                entity_type: Some(EntityType::Booking),
                attribute_name: Some("agendaId".into()),
                values: Some(vec![ExternalId::from(500)]),
                entity_ids: None,
            })
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attribute_value, ExternalId::from(500));
    }

    #[tokio::test]
    async fn test_empty_in_filter_skips_request() {
        let server = MockServer::start().await;
        let rows = store(&server).bookings(&[]).await.unwrap();
        assert!(rows.is_empty());
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_conflict_status_maps_to_conflict_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/clients"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let err = store(&server)
            .insert_client(&NewClient {
                firm_id: Uuid::new_v4(),
                first_name: "Anna".into(),
                last_name: "de Vries".into(),
                email: "anna@example.com".into(),
                phone: None,
                language: "nl".into(),
            })
            .await
            .unwrap_err();

        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_booking_patch_only_sends_changed_fields() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/bookings"))
            .and(query_param("id", format!("eq.{id}")))
            .and(body_json(serde_json::json!({ "status": "confirmed" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .update_booking(
                id,
                &BookingPatch {
                    slot_id: None,
                    status: Some(BookingStatus::Confirmed),
                },
            )
            .await
            .unwrap();
    }
}
