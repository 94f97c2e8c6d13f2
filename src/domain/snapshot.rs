use chrono::{DateTime, Utc};

use super::programmable_object::ObjectKind;
use super::target::Environment;

/// Metadata row capturing a programmable object's state at a scan instant
///. The large definition text lives separately in
/// `SnapshotDefinition` so bulk scans don't load it on hot paths.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: i64,
    pub scan_log_id: i64,
    pub tenant_id: i64,
    pub tenant_name: String,
    pub tenant_code: String,
    pub environment: Environment,
    pub full_name: String,
    pub schema: String,
    pub name: String,
    pub kind: ObjectKind,
    pub definition_hash: String,
    pub server_last_modified: DateTime<Utc>,
    pub snapshot_date: DateTime<Utc>,
    pub is_custom: bool,
}

/// A `Snapshot` before it has an id assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub tenant_id: i64,
    pub tenant_name: String,
    pub tenant_code: String,
    pub environment: Environment,
    pub full_name: String,
    pub schema: String,
    pub name: String,
    pub kind: ObjectKind,
    pub definition_hash: String,
    pub server_last_modified: DateTime<Utc>,
    pub snapshot_date: DateTime<Utc>,
    pub is_custom: bool,
}

/// One-to-one text holder for a `Snapshot`.
#[derive(Debug, Clone)]
pub struct SnapshotDefinition {
    pub snapshot_id: i64,
    pub definition: String,
}
