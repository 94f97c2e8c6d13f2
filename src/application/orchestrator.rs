use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::change::{ChangeDetector, ChangeType};
use crate::domain::error::ScanError;
use crate::domain::key::normalize_key;
use crate::domain::ports::{
    CredentialDecryptor, ObjectExtractor, Repository, ScanNotifier, TenantDirectory, TrackedObject,
};
use crate::domain::programmable_object::ProgrammableObject;
use crate::domain::scan_log::{ScanLog, ScanLogEntry, ScanTrigger};
use crate::domain::snapshot::{NewSnapshot, Snapshot};
use crate::domain::target::{ConnectionDescriptor, Environment};

/// Fixed per-target hard deadline covering connect + extract + repository
/// writes.
const TARGET_DEADLINE: Duration = Duration::from_secs(90);
/// `errorSummary` retains at most this many target error lines.
const MAX_ERROR_SUMMARY_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_parallel_tenants: usize,
    pub connection_timeout: Duration,
    pub custom_by_convention: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel_tenants: 5,
            connection_timeout: Duration::from_secs(30),
            custom_by_convention: true,
        }
    }
}

/// Drives full and partial scans across `(tenant, environment)` pairs with
/// bounded concurrency, timeouts and partial-failure accounting.
pub struct Orchestrator {
    extractor: Arc<dyn ObjectExtractor>,
    repository: Arc<dyn Repository>,
    detector: Arc<dyn ChangeDetector>,
    decryptor: Arc<dyn CredentialDecryptor>,
    notifier: Arc<dyn ScanNotifier>,
    directory: Arc<dyn TenantDirectory>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        extractor: Arc<dyn ObjectExtractor>,
        repository: Arc<dyn Repository>,
        detector: Arc<dyn ChangeDetector>,
        decryptor: Arc<dyn CredentialDecryptor>,
        notifier: Arc<dyn ScanNotifier>,
        directory: Arc<dyn TenantDirectory>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            extractor,
            repository,
            detector,
            decryptor,
            notifier,
            directory,
            config,
        }
    }

    /// `RunFullScan(trigger, triggeredBy, maxParallelTenants, scanAll)`.
    pub async fn run_full_scan(
        &self,
        trigger: ScanTrigger,
        triggered_by: Option<String>,
        max_parallel_tenants: Option<usize>,
        scan_all: bool,
        cancel: CancellationToken,
    ) -> Result<ScanLog, ScanError> {
        let tenants = self.directory.list_tenants().await?;
        let tracked = if scan_all {
            Vec::new()
        } else {
            self.directory.tracked_base_objects().await?
        };
        self.run_scan(
            trigger,
            triggered_by,
            tenants,
            tracked,
            scan_all,
            max_parallel_tenants.unwrap_or(self.config.max_parallel_tenants),
            cancel,
        )
        .await
    }

    /// `RunSingleScan(tenantId, environment?, trigger, triggeredBy, scanAll)`.
    pub async fn run_single_scan(
        &self,
        tenant_id: i64,
        environment: Option<Environment>,
        trigger: ScanTrigger,
        triggered_by: Option<String>,
        scan_all: bool,
        cancel: CancellationToken,
    ) -> Result<ScanLog, ScanError> {
        let all_tenants = self.directory.list_tenants().await?;
        let mut tenant = all_tenants
            .into_iter()
            .find(|t| t.id == tenant_id)
            .ok_or_else(|| ScanError::Invariant(format!("unknown tenant {tenant_id}")))?;
        if let Some(env) = environment {
            tenant.environments.retain(|e| *e == env);
        }
        let tracked = if scan_all {
            Vec::new()
        } else {
            self.directory.tracked_base_objects().await?
        };
        self.run_scan(trigger, triggered_by, vec![tenant], tracked, scan_all, 1, cancel)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_scan(
        &self,
        trigger: ScanTrigger,
        triggered_by: Option<String>,
        tenants: Vec<crate::domain::ports::TenantInfo>,
        tracked: Vec<TrackedObject>,
        scan_all: bool,
        max_parallel_tenants: usize,
        cancel: CancellationToken,
    ) -> Result<ScanLog, ScanError> {
        let mut log = ScanLog::started(trigger, triggered_by);
        log.total_tenants = tenants.len() as i32;
        log.total_environments = tenants.iter().map(|t| t.environments.len() as i32).sum();
        log.id = self.repository.create_scan_log(&log).await?;

        let semaphore = Arc::new(Semaphore::new(max_parallel_tenants.max(1)));
        let acc = Arc::new(ScanAccumulator::new());

        let mut handles = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            let semaphore = Arc::clone(&semaphore);
            let acc = Arc::clone(&acc);
            let cancel = cancel.clone();
            let extractor = Arc::clone(&self.extractor);
            let repository = Arc::clone(&self.repository);
            let detector = Arc::clone(&self.detector);
            let decryptor = Arc::clone(&self.decryptor);
            let directory = Arc::clone(&self.directory);
            let tracked = tracked.clone();
            let custom_by_convention = self.config.custom_by_convention;
            let connection_timeout = self.config.connection_timeout;
            let scan_log_id = log.id;

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                if cancel.is_cancelled() {
                    return;
                }

                let filter = build_filter(tenant.id, &tracked, scan_all);
                let custom_registry = match directory.custom_registry(tenant.id).await {
                    Ok(set) => set,
                    Err(e) => {
                        acc.record_error(format!("{}: {}", tenant.code, e));
                        return;
                    }
                };

                for environment in &tenant.environments {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let outcome = scan_target(
                        scan_log_id,
                        tenant.id,
                        &tenant.name,
                        &tenant.code,
                        *environment,
                        filter.as_ref(),
                        &custom_registry,
                        custom_by_convention,
                        connection_timeout,
                        directory.as_ref(),
                        extractor.as_ref(),
                        repository.as_ref(),
                        detector.as_ref(),
                        decryptor.as_ref(),
                        &cancel,
                    )
                    .await;
                    acc.record(outcome);
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "tenant scan task panicked");
            }
        }

        log.total_objects_scanned = acc.objects_scanned.load(Ordering::Relaxed);
        log.total_changes_detected = acc.changes_detected.load(Ordering::Relaxed);
        log.total_errors = acc.errors.load(Ordering::Relaxed);
        log.error_summary = acc.error_summary();

        if cancel.is_cancelled() {
            log.cancelled();
        } else {
            log.finish(acc.any_success.load(Ordering::Relaxed));
        }

        if let Err(e) = self.repository.update_scan_log(&log).await {
            warn!(error = %e, "failed to persist final scan log state");
        }

        let pending = self.repository.pending_notifications().await.unwrap_or_default();
        let entries = self.repository.list_scan_entries(log.id).await.unwrap_or_default();
        if let Err(e) = self.notifier.notify(&log, &entries, &pending).await {
            warn!(error = %e, "notification failed, swallowing per contract");
        }

        Ok(log)
    }
}

struct TargetOutcome {
    success: bool,
    objects_found: i32,
    new: i32,
    modified: i32,
    deleted: i32,
    error: Option<String>,
}

impl TargetOutcome {
    fn failed(message: String) -> Self {
        Self {
            success: false,
            objects_found: 0,
            new: 0,
            modified: 0,
            deleted: 0,
            error: Some(message),
        }
    }
}

/// The per-target procedure shared by `RunFullScan` and `RunSingleScan`.
#[allow(clippy::too_many_arguments)]
async fn scan_target(
    scan_log_id: i64,
    tenant_id: i64,
    tenant_name: &str,
    tenant_code: &str,
    environment: Environment,
    base_filter: Option<&BTreeSet<String>>,
    custom_registry: &BTreeSet<String>,
    custom_by_convention: bool,
    connection_timeout: Duration,
    directory: &dyn TenantDirectory,
    extractor: &dyn ObjectExtractor,
    repository: &dyn Repository,
    detector: &dyn ChangeDetector,
    decryptor: &dyn CredentialDecryptor,
    cancel: &CancellationToken,
) -> TargetOutcome {
    let mut entry = ScanLogEntry::started(scan_log_id, tenant_id, tenant_code.to_string(), environment);
    entry.id = match repository.create_scan_entry(&entry).await {
        Ok(id) => id,
        Err(e) => {
            return TargetOutcome::failed(format!("{}/{}: failed to create scan entry: {}", tenant_code, environment, e))
        }
    };

    let work = async {
        let env_config = directory
            .environment_config(tenant_id, environment)
            .await?
            .ok_or_else(|| ScanError::Configuration("no connection configured for target".into()))?;
        let password = decryptor.decrypt(&env_config.encrypted_password)?;
        let conn = ConnectionDescriptor {
            driver: env_config.driver,
            host: env_config.host,
            port: env_config.port,
            database: env_config.database,
            user: env_config.user,
            password,
            schema: env_config.schema,
        };

        let (ok, message) = extractor.test_connection(&conn, connection_timeout).await?;
        if !ok {
            return Err(ScanError::Connect(message));
        }

        let objects = extractor.extract_all(&conn, connection_timeout).await?;
        let included: Vec<ProgrammableObject> = objects
            .into_iter()
            .filter(|obj| {
                let full_name = obj.full_name();
                let custom = is_custom(&full_name, custom_registry, tenant_code, custom_by_convention);
                match base_filter {
                    None => true,
                    Some(f) => f.contains(&normalize_key(&full_name)) || custom,
                }
            })
            .collect();

        // Previous-snapshot read happens-before current-snapshot bulk-insert
        //.
        let previous = repository.latest_snapshots(tenant_id, environment).await?;

        let now = chrono::Utc::now();
        let mut new_snapshots = Vec::with_capacity(included.len());
        let mut definitions = Vec::with_capacity(included.len());
        for obj in &included {
            let full_name = obj.full_name();
            let is_custom_obj = is_custom(&full_name, custom_registry, tenant_code, custom_by_convention);
            new_snapshots.push(NewSnapshot {
                tenant_id,
                tenant_name: tenant_name.to_string(),
                tenant_code: tenant_code.to_string(),
                environment,
                full_name,
                schema: obj.schema.clone(),
                name: obj.name.clone(),
                kind: obj.kind,
                definition_hash: obj.definition_hash(),
                server_last_modified: obj.last_modified,
                snapshot_date: now,
                is_custom: is_custom_obj,
            });
            definitions.push(obj.definition.clone());
        }

        repository
            .bulk_insert_snapshots(scan_log_id, &new_snapshots, &definitions)
            .await?;

        // Change detection runs only on the non-custom subsets.
        let previous_non_custom: Vec<Snapshot> = previous.into_iter().filter(|s| !s.is_custom).collect();
        let current_non_custom: Vec<Snapshot> = new_snapshots
            .iter()
            .filter(|s| !s.is_custom)
            .map(|s| as_snapshot(scan_log_id, s))
            .collect();

        let changes = detector.detect(scan_log_id, &previous_non_custom, &current_non_custom);
        let new_count = changes.iter().filter(|c| c.change_type == ChangeType::Created).count() as i32;
        let modified_count = changes.iter().filter(|c| c.change_type == ChangeType::Modified).count() as i32;
        let deleted_count = changes.iter().filter(|c| c.change_type == ChangeType::Deleted).count() as i32;
        repository.bulk_insert_changes(&changes).await?;

        Ok::<_, ScanError>((included.len() as i32, new_count, modified_count, deleted_count))
    };

    let result = tokio::select! {
        _ = cancel.cancelled() => Err(ScanError::Cancelled),
        timed = tokio::time::timeout(TARGET_DEADLINE, work) => timed.unwrap_or(Err(ScanError::Timeout(TARGET_DEADLINE))),
    };

    match result {
        Ok((found, new, modified, deleted)) => {
            entry.finish_success(found, new, modified, deleted);
            let _ = repository.update_scan_entry(&entry).await;
            TargetOutcome {
                success: true,
                objects_found: found,
                new,
                modified,
                deleted,
                error: None,
            }
        }
        Err(e) => {
            entry.finish_failure(e.summary_line());
            let _ = repository.update_scan_entry(&entry).await;
            TargetOutcome::failed(format!("{}/{}: {}", tenant_code, environment, e.summary_line()))
        }
    }
}

fn as_snapshot(scan_log_id: i64, n: &NewSnapshot) -> Snapshot {
    Snapshot {
        id: 0,
        scan_log_id,
        tenant_id: n.tenant_id,
        tenant_name: n.tenant_name.clone(),
        tenant_code: n.tenant_code.clone(),
        environment: n.environment,
        full_name: n.full_name.clone(),
        schema: n.schema.clone(),
        name: n.name.clone(),
        kind: n.kind,
        definition_hash: n.definition_hash.clone(),
        server_last_modified: n.server_last_modified,
        snapshot_date: n.snapshot_date,
        is_custom: n.is_custom,
    }
}

/// Inclusion filter construction: null when the global registry
/// is empty or `scanAll=true`, otherwise the union of global (`tenantId`
/// null) and tenant-specific tracked entries.
fn build_filter(tenant_id: i64, tracked: &[TrackedObject], scan_all: bool) -> Option<BTreeSet<String>> {
    if scan_all || tracked.is_empty() {
        return None;
    }
    Some(
        tracked
            .iter()
            .filter(|t| t.tenant_id.is_none() || t.tenant_id == Some(tenant_id))
            .map(|t| normalize_key(&t.full_name))
            .collect(),
    )
}

/// `isCustom` per object: registry membership, or
/// (if enabled) a case-insensitive substring match of the tenant code
/// against the object's own name.
fn is_custom(full_name: &str, custom_registry: &BTreeSet<String>, tenant_code: &str, by_convention: bool) -> bool {
    if custom_registry.contains(&normalize_key(full_name)) {
        return true;
    }
    if !by_convention {
        return false;
    }
    let name_part = full_name.rsplit('.').next().unwrap_or(full_name);
    name_part.to_ascii_lowercase().contains(&tenant_code.to_ascii_lowercase())
}

struct ScanAccumulator {
    objects_scanned: AtomicI32,
    changes_detected: AtomicI32,
    errors: AtomicI32,
    any_success: AtomicBool,
    error_lines: Mutex<Vec<String>>,
}

impl ScanAccumulator {
    fn new() -> Self {
        Self {
            objects_scanned: AtomicI32::new(0),
            changes_detected: AtomicI32::new(0),
            errors: AtomicI32::new(0),
            any_success: AtomicBool::new(false),
            error_lines: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, outcome: TargetOutcome) {
        self.objects_scanned.fetch_add(outcome.objects_found, Ordering::Relaxed);
        self.changes_detected
            .fetch_add(outcome.new + outcome.modified + outcome.deleted, Ordering::Relaxed);
        if outcome.success {
            self.any_success.store(true, Ordering::Relaxed);
        } else {
            self.errors.fetch_add(1, Ordering::Relaxed);
            if let Some(message) = outcome.error {
                self.push_error_line(message);
            }
        }
    }

    fn record_error(&self, message: String) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.push_error_line(message);
    }

    fn push_error_line(&self, message: String) {
        let mut lines = self.error_lines.lock().unwrap();
        if lines.len() < MAX_ERROR_SUMMARY_LINES {
            lines.push(message);
        }
    }

    fn error_summary(&self) -> Option<String> {
        let lines = self.error_lines.lock().unwrap();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_filter_is_null_when_scan_all() {
        let tracked = vec![TrackedObject { tenant_id: None, full_name: "dbo.A".into() }];
        assert!(build_filter(1, &tracked, true).is_none());
    }

    #[test]
    fn build_filter_is_null_when_registry_empty() {
        assert!(build_filter(1, &[], false).is_none());
    }

    #[test]
    fn build_filter_unions_global_and_tenant_entries() {
        let tracked = vec![
            TrackedObject { tenant_id: None, full_name: "dbo.Global".into() },
            TrackedObject { tenant_id: Some(1), full_name: "dbo.Mine".into() },
            TrackedObject { tenant_id: Some(2), full_name: "dbo.Theirs".into() },
        ];
        let filter = build_filter(1, &tracked, false).unwrap();
        assert!(filter.contains("dbo.global"));
        assert!(filter.contains("dbo.mine"));
        assert!(!filter.contains("dbo.theirs"));
    }

    #[test]
    fn is_custom_matches_registry() {
        let mut registry = BTreeSet::new();
        registry.insert(normalize_key("dbo.Special"));
        assert!(is_custom("dbo.Special", &registry, "ACME", false));
    }

    #[test]
    fn is_custom_matches_by_convention() {
        let registry = BTreeSet::new();
        assert!(is_custom("dbo.Report_ACME", &registry, "ACME", true));
    }

    #[test]
    fn is_custom_false_when_convention_disabled_and_not_registered() {
        let registry = BTreeSet::new();
        assert!(!is_custom("dbo.Report_ACME", &registry, "ACME", false));
    }
}
