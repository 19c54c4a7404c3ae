//! Local scheduling model: blocks, slots, bookings and the identity tables
//! that tie them to the external agenda.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Identifier assigned by the external agenda.
///
/// The agenda emits numbers, the attribute table stores text. Both are
/// normalized to their decimal string so comparisons never depend on the
/// wire type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    pub fn new(id: impl Into<String>) -> Self {
        ExternalId(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ExternalId {
    fn from(id: i64) -> Self {
        ExternalId(id.to_string())
    }
}

impl From<&str> for ExternalId {
    fn from(id: &str) -> Self {
        ExternalId::new(id)
    }
}

impl<'de> Deserialize<'de> for ExternalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Ok(ExternalId::new(s)),
            serde_json::Value::Number(n) => Ok(ExternalId(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "expected string or number id, got {other}"
            ))),
        }
    }
}

// ============================================================================
// Integration
// ============================================================================

/// One CRM connection for one firm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationInstance {
    pub id: Uuid,
    pub integration_id: Uuid,
    pub firm_id: Uuid,
    #[serde(default)]
    pub next_sync_at: Option<DateTime<Utc>>,
}

impl IntegrationInstance {
    /// Instances without a schedule are always due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_sync_at.is_none_or(|at| at <= now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    Status,
    Type,
}

/// Vocabulary row: one external status or type code and, once an operator
/// has mapped it, the internal enum it stands for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalMapping {
    pub integration_instance_id: Uuid,
    #[serde(rename = "type")]
    pub kind: MappingKind,
    pub external_id: ExternalId,
    pub external_name: String,
    #[serde(default)]
    pub internal_enum: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Block,
    Booking,
    Client,
    Profile,
    Project,
    FirmDefault,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Block => "block",
            EntityType::Booking => "booking",
            EntityType::Client => "client",
            EntityType::Profile => "profile",
            EntityType::Project => "project",
            EntityType::FirmDefault => "firm_default",
        }
    }
}

/// Identity bridge row linking one local entity to one external id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalAttribute {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub attribute_name: String,
    pub attribute_value: ExternalId,
    #[serde(default)]
    pub integration_instance_id: Option<Uuid>,
}

// ============================================================================
// Internal vocabulary
// ============================================================================

/// Internal agenda item kinds the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternalType {
    Block,
    Booking,
}

impl InternalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InternalType::Block => "block",
            InternalType::Booking => "booking",
        }
    }
}

impl fmt::Display for InternalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InternalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(InternalType::Block),
            "booking" => Ok(InternalType::Booking),
            other => Err(format!("unknown agenda type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Requested,
    Confirmed,
    #[default]
    Booked,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Requested => "requested",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Booked => "booked",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(BookingStatus::Requested),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "booked" => Ok(BookingStatus::Booked),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            "no_show" => Ok(BookingStatus::NoShow),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}

// ============================================================================
// Scheduling entities
// ============================================================================

/// A broker's viewing window on one day for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    pub project_id: Uuid,
    pub profile_id: Uuid,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Minutes per slot
    pub duration: i64,
    /// Maximum concurrent parties per slot
    pub parties: i64,
    #[serde(default, skip_serializing)]
    pub slots: Vec<Slot>,
}

impl Block {
    pub fn start_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn end_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }

    /// Whether `[start, end]` lies within this block's window (inclusive).
    pub fn contains(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start_at() <= start && self.end_at() >= end
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewBlock {
    pub project_id: Uuid,
    pub profile_id: Uuid,
    pub created_by: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration: i64,
    pub parties: i64,
    pub is_broker_block: bool,
    pub interval_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlockPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
}

/// A fixed-length bookable interval inside a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub block_id: Uuid,
    pub project_id: Uuid,
    pub profile_id: Uuid,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration: i64,
    pub max_groups: i64,
}

impl Slot {
    pub fn start_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn end_at(&self) -> NaiveDateTime {
        self.start_at() + Duration::minutes(self.duration)
    }

    /// A copy of this slot's attributes moved to a new interval.
    pub fn relocated(&self, start: NaiveDateTime, duration: i64) -> NewSlot {
        NewSlot {
            block_id: self.block_id,
            project_id: self.project_id,
            profile_id: self.profile_id,
            created_by: self.created_by,
            date: start.date(),
            start_time: start.time(),
            duration,
            max_groups: self.max_groups,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSlot {
    pub block_id: Uuid,
    pub project_id: Uuid,
    pub profile_id: Uuid,
    pub created_by: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration: i64,
    pub max_groups: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<Uuid>,
}

/// A client's appointment in one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub client_id: Uuid,
    pub status: BookingStatus,
    #[serde(default, skip_serializing)]
    pub slot: Option<Slot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewBooking {
    pub slot_id: Uuid,
    pub client_id: Uuid,
    pub status: BookingStatus,
    pub for_someone_else: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BookingStatus>,
}

// ============================================================================
// Referenced entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub firm_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewClient {
    pub firm_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    #[serde(default)]
    pub status: Option<String>,
}

impl Project {
    /// Soft-deleted projects are never synced into.
    pub fn is_syncable(&self) -> bool {
        !matches!(self.status.as_deref(), Some("deleted" | "archived"))
    }
}
