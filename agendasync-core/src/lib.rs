//! Reconciliation engine between a CRM agenda and a local booking schedule.
//!
//! External agenda entries are classified into groups (blocks) and single
//! appointments (bookings), bridged to local rows through the external
//! attribute table, and reconciled into blocks, slots and bookings:
//! - `sync` drives runs over due integration instances
//! - `reconcile` holds the block and booking branches
//! - `store`, `remote` and `notify` are the collaborator seams

pub mod agenda;
pub mod bridge;
pub mod changeset;
pub mod config;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod model;
pub mod notify;
pub mod reconcile;
pub mod remote;
pub mod resolve;
pub mod store;
pub mod sync;
pub mod vocabulary;
pub mod window;

pub use error::{SyncError, SyncResult};
pub use reconcile::SyncStats;
pub use sync::{SyncEngine, SyncReport};
