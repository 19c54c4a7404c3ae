//! Cross-system identity resolution.
//!
//! Every resolver returns `Ok(None)` for an unknown reference; only store
//! failures are errors. The caller decides whether a miss is fatal to the
//! entry at hand.

use tracing::{debug, info};
use uuid::Uuid;

use crate::bridge::{Bridge, BridgeKind, BrokerKey, ClientBridge, ProjectBridge};
use crate::error::SyncResult;
use crate::model::{ExternalId, NewClient};
use crate::remote::AgendaSource;
use crate::remote::protocol::RelationProfile;
use crate::store::Store;

/// Exact lookup, then at most one hop through the firm's default.
///
/// The default's external id is resolved through the same bridge and never
/// consults a further default.
async fn resolve_with_default<K: BridgeKind>(
    store: &dyn Store,
    external: &ExternalId,
    firm_id: Option<Uuid>,
) -> SyncResult<Option<Uuid>> {
    if let Some(local) = Bridge::<K>::lookup(store, external).await? {
        return Ok(Some(local));
    }

    let Some(firm_id) = firm_id else {
        return Ok(None);
    };
    let Some(default) = Bridge::<K>::firm_default(store, firm_id).await? else {
        return Ok(None);
    };

    let local = Bridge::<K>::lookup(store, &default).await?;
    if local.is_some() {
        info!(%external, %default, %firm_id, "using firm default {}", K::ATTRIBUTE_NAME);
    }
    Ok(local)
}

/// Broker profile for an external employee id.
pub async fn resolve_broker(
    store: &dyn Store,
    external: &ExternalId,
    firm_id: Option<Uuid>,
) -> SyncResult<Option<Uuid>> {
    let resolved = resolve_with_default::<BrokerKey>(store, external, firm_id).await?;
    if resolved.is_none() {
        debug!(%external, "broker is not connected");
    }
    Ok(resolved)
}

/// Client for an external relation id. Clients have no firm default.
pub async fn resolve_client(store: &dyn Store, external: &ExternalId) -> SyncResult<Option<Uuid>> {
    ClientBridge::lookup(store, external).await
}

/// Project for an external project code, unless it is archived or deleted.
pub async fn resolve_project(store: &dyn Store, code: &ExternalId) -> SyncResult<Option<Uuid>> {
    let Some(project_id) = ProjectBridge::lookup(store, code).await? else {
        return Ok(None);
    };

    match store.project(project_id).await? {
        Some(project) if !project.is_syncable() => {
            info!(%code, status = ?project.status, "skipping soft-deleted project");
            Ok(None)
        }
        _ => Ok(Some(project_id)),
    }
}

/// Resolve a client relation, provisioning a local client on a miss.
///
/// Profile data is fetched best-effort; placeholders stand in for anything
/// the CRM does not return. A conflicting insert means another writer got
/// there first, so the existing row is linked instead.
pub async fn resolve_or_create_client(
    store: &dyn Store,
    source: &dyn AgendaSource,
    relation_id: &ExternalId,
    firm_id: Uuid,
    instance_id: Uuid,
) -> SyncResult<Uuid> {
    if let Some(client_id) = resolve_client(store, relation_id).await? {
        return Ok(client_id);
    }

    let profile = match source.client_profile(relation_id, firm_id).await {
        Ok(profile) => profile,
        Err(e) => {
            info!(%relation_id, error = %e, "relation profile unavailable, using placeholders");
            RelationProfile::default()
        }
    };

    let new_client = placeholder_client(&profile, relation_id, firm_id);
    let client_id = match store.insert_client(&new_client).await {
        Ok(client) => client.id,
        Err(e) if e.is_conflict() => {
            match store.client_by_email(firm_id, &new_client.email).await? {
                Some(existing) => existing.id,
                None => return Err(e),
            }
        }
        Err(e) => return Err(e),
    };

    ClientBridge::link(store, client_id, relation_id, instance_id).await?;
    info!(%relation_id, %client_id, "linked client");
    Ok(client_id)
}

fn placeholder_client(profile: &RelationProfile, relation_id: &ExternalId, firm_id: Uuid) -> NewClient {
    let non_empty = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    NewClient {
        firm_id,
        first_name: profile
            .first_name()
            .map(str::to_string)
            .unwrap_or_else(|| "Realworks".to_string()),
        last_name: non_empty(&profile.achternaam)
            .unwrap_or_else(|| format!("Relatie {relation_id}")),
        email: non_empty(&profile.email)
            .unwrap_or_else(|| format!("realworks-{relation_id}@placeholder.invalid")),
        phone: non_empty(&profile.mobiel_telefoonnummer),
        language: non_empty(&profile.taal)
            .map(|l| l.to_lowercase())
            .unwrap_or_else(|| "nl".to_string()),
    }
}
