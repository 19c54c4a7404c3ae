/// Number of days ahead of today that the agenda window covers.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Integration instances processed concurrently per wave.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Seconds between scheduled reconciliation runs.
pub const DEFAULT_INTERVAL_SECS: u64 = 3600;

pub const DEFAULT_INTEGRATION_NAME: &str = "realworks";

/// Timestamp layout used by the external agenda.
pub const EXTERNAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DEFAULT_BROKER_RELATION: &str = "Agendapunt voor";
pub const DEFAULT_CREATOR_RELATION: &str = "Geplaatst door (medewerker)";
pub const DEFAULT_CLIENT_RELATION: &str = "Betreft relatie";
pub const DEFAULT_CANCELLED_STATUS: &str = "Geannuleerd";

pub const APPOINTMENT_CONFIRMATION_EVENT: &str = "notification_appointment_confirmation";
