use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;

use super::baseline::{Baseline, BaselineObject, NewBaseline};
use super::change::{DetectedChange, NewDetectedChange};
use super::compare::CompareResult;
use super::error::ScanError;
use super::programmable_object::ProgrammableObject;
use super::scan_log::{ScanLog, ScanLogEntry};
use super::snapshot::{NewSnapshot, Snapshot};
use super::target::{ConnectionDescriptor, Environment};

/// Port: read a target database's catalog of programmable objects. Implemented by `infrastructure::extractor::SqlxObjectExtractor`.
#[async_trait]
pub trait ObjectExtractor: Send + Sync {
    async fn test_connection(
        &self,
        conn: &ConnectionDescriptor,
        deadline: Duration,
    ) -> Result<(bool, String), ScanError>;

    async fn extract_all(
        &self,
        conn: &ConnectionDescriptor,
        deadline: Duration,
    ) -> Result<Vec<ProgrammableObject>, ScanError>;

    async fn extract_single(
        &self,
        conn: &ConnectionDescriptor,
        schema: &str,
        name: &str,
        deadline: Duration,
    ) -> Result<Option<ProgrammableObject>, ScanError>;
}

/// Port: ScanLog/ScanLogEntry persistence.
#[async_trait]
pub trait ScanLogRepository: Send + Sync {
    async fn ensure_schema(&self) -> Result<(), ScanError>;
    async fn create_scan_log(&self, log: &ScanLog) -> Result<i64, ScanError>;
    async fn update_scan_log(&self, log: &ScanLog) -> Result<(), ScanError>;
    async fn get_scan_log(&self, id: i64) -> Result<Option<ScanLog>, ScanError>;
    async fn list_recent_scan_logs(&self, limit: i64) -> Result<Vec<ScanLog>, ScanError>;

    async fn create_scan_entry(&self, entry: &ScanLogEntry) -> Result<i64, ScanError>;
    async fn update_scan_entry(&self, entry: &ScanLogEntry) -> Result<(), ScanError>;
    async fn list_scan_entries(&self, scan_log_id: i64) -> Result<Vec<ScanLogEntry>, ScanError>;
}

/// Port: Snapshot/SnapshotDefinition persistence and the "latest" view.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// `snapshots` and `definitions` MUST have equal length; the i-th
    /// definition belongs to the i-th snapshot.
    async fn bulk_insert_snapshots(
        &self,
        scan_log_id: i64,
        snapshots: &[NewSnapshot],
        definitions: &[String],
    ) -> Result<(), ScanError>;

    async fn latest_snapshots(
        &self,
        tenant_id: i64,
        environment: Environment,
    ) -> Result<Vec<Snapshot>, ScanError>;

    async fn get_snapshot_definition(&self, snapshot_id: i64) -> Result<Option<String>, ScanError>;
}

/// Port: DetectedChange persistence and notification batching.
#[async_trait]
pub trait ChangeRepository: Send + Sync {
    async fn bulk_insert_changes(&self, changes: &[NewDetectedChange]) -> Result<(), ScanError>;
    async fn pending_notifications(&self) -> Result<Vec<DetectedChange>, ScanError>;
    /// Batches in groups of at most 1000 ids.
    async fn mark_notification_sent(&self, ids: &[i64]) -> Result<(), ScanError>;
}

/// Port: Baseline persistence.
#[async_trait]
pub trait BaselineRepository: Send + Sync {
    async fn create_baseline(&self, meta: &NewBaseline) -> Result<i64, ScanError>;

    /// Clones the non-custom latest snapshots of `(tenant_id, environment)`
    /// into the baseline's object tables and returns how many were frozen.
    async fn freeze_baseline_from_latest(
        &self,
        baseline_id: i64,
        tenant_id: i64,
        environment: Environment,
    ) -> Result<i32, ScanError>;

    async fn list_baselines(&self) -> Result<Vec<Baseline>, ScanError>;
    async fn get_baseline(&self, id: i64) -> Result<Option<Baseline>, ScanError>;
    async fn delete_baseline(&self, id: i64) -> Result<(), ScanError>;
    async fn list_baseline_objects(&self, id: i64) -> Result<Vec<BaselineObject>, ScanError>;
    async fn get_baseline_object_definition(&self, object_id: i64) -> Result<Option<String>, ScanError>;

    /// `Baseline` plus every `(BaselineObject, definition)` pair, for
    /// rendering or comparison without N+1 definition reads.
    async fn load_baseline_with_definitions(
        &self,
        id: i64,
    ) -> Result<(Baseline, Vec<(BaselineObject, String)>), ScanError>;
}

/// Umbrella over the four repository ports; `infrastructure::db::repository`
/// implements all of them against one `sqlx::AnyPool`.
pub trait Repository: ScanLogRepository + SnapshotRepository + ChangeRepository + BaselineRepository {}
impl<T: ScanLogRepository + SnapshotRepository + ChangeRepository + BaselineRepository> Repository for T {}

/// Identity and environment-config surface the orchestrator needs to
/// enumerate targets. The tenancy/auth schema itself is out of scope; this is only the slice of it the core consumes.
#[derive(Debug, Clone)]
pub struct TenantInfo {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub environments: Vec<Environment>,
}

#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub encrypted_password: String,
    pub schema: String,
}

/// An entry in the global registry of tracked base objects.
/// `tenant_id = None` marks a "global" entry applying to every tenant.
#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub tenant_id: Option<i64>,
    pub full_name: String,
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn list_tenants(&self) -> Result<Vec<TenantInfo>, ScanError>;
    async fn environment_config(
        &self,
        tenant_id: i64,
        environment: Environment,
    ) -> Result<Option<EnvironmentConfig>, ScanError>;
    /// Case-insensitive `fullName` keys already present in the tenant's
    /// custom-object registry.
    async fn custom_registry(&self, tenant_id: i64) -> Result<BTreeSet<String>, ScanError>;
    async fn tracked_base_objects(&self) -> Result<Vec<TrackedObject>, ScanError>;
}

/// Port: `Notify(ScanLog, entries, pendingChanges)`. Invoked
/// once per scan after terminal status; errors are logged and swallowed by
/// the caller, never retried.
#[async_trait]
pub trait ScanNotifier: Send + Sync {
    async fn notify(
        &self,
        log: &ScanLog,
        entries: &[ScanLogEntry],
        pending: &[DetectedChange],
    ) -> Result<(), ScanError>;
}

/// Port: `Decrypt(opaque) → plain`. Real at-rest encryption is
/// out of scope; the core only treats the value as opaque.
pub trait CredentialDecryptor: Send + Sync {
    fn decrypt(&self, opaque: &str) -> Result<String, ScanError>;
}

/// Contract-only port for the external sync layer: `core`
/// never calls this itself, it only fixes the shape a Script Generator's
/// caller would implement against.
#[async_trait]
pub trait ScriptApplier: Send + Sync {
    async fn apply_script(&self, conn: &ConnectionDescriptor, script: &str) -> Result<(), ScanError>;
}

/// Port: render a `CompareResult` to a file format (JSON, HTML, ...). Add
/// new formats by implementing this, not by touching the CLI.
pub trait OutputWriter: Send + Sync {
    fn format(&self, result: &CompareResult) -> Result<String, ScanError>;
    fn extension(&self) -> &'static str;
}
