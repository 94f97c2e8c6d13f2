use chrono::{DateTime, Utc};

use super::programmable_object::ObjectKind;
use super::target::Environment;

/// A named frozen version of a target's non-custom objects. Immutable after creation.
#[derive(Debug, Clone)]
pub struct Baseline {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub source_tenant_id: i64,
    pub source_tenant_name: String,
    pub source_tenant_code: String,
    pub source_environment: Environment,
    pub total_objects: i32,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

/// A `Baseline` before it has an id. `name` uniqueness is case-insensitive
/// and enforced at insert by the repository.
#[derive(Debug, Clone)]
pub struct NewBaseline {
    pub name: String,
    pub description: Option<String>,
    pub source_tenant_id: i64,
    pub source_tenant_name: String,
    pub source_tenant_code: String,
    pub source_environment: Environment,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BaselineObject {
    pub id: i64,
    pub baseline_id: i64,
    pub full_name: String,
    pub schema: String,
    pub name: String,
    pub kind: ObjectKind,
    pub definition_hash: String,
    pub source_snapshot_id: i64,
}

#[derive(Debug, Clone)]
pub struct BaselineObjectDefinition {
    pub baseline_object_id: i64,
    pub definition: String,
}
