use async_trait::async_trait;
use sqlx::{AnyPool, Row};

use crate::domain::baseline::{Baseline, BaselineObject, NewBaseline};
use crate::domain::change::{ChangeType, DetectedChange, NewDetectedChange};
use crate::domain::error::ScanError;
use crate::domain::ports::{BaselineRepository, ChangeRepository, ScanLogRepository, SnapshotRepository};
use crate::domain::programmable_object::ObjectKind;
use crate::domain::scan_log::{ScanLog, ScanLogEntry, ScanStatus, ScanTrigger};
use crate::domain::snapshot::{NewSnapshot, Snapshot};
use crate::domain::target::Environment;

/// `sqlx::AnyPool`-backed Central Repository. The DDL and
/// queries below use Postgres syntax: the repository's own storage is
/// assumed Postgres-shaped regardless of which driver a scan *target* uses.
/// Multi-backend support for the engine's own metadata store is a
/// deliberate simplification, recorded in the grounding ledger.
pub struct SqlxRepository {
    pool: AnyPool,
}

impl SqlxRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    fn persistence_err(e: sqlx::Error) -> ScanError {
        ScanError::Persistence(e.to_string())
    }
}

fn status_str(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Running => "Running",
        ScanStatus::Completed => "Completed",
        ScanStatus::CompletedWithErrors => "CompletedWithErrors",
        ScanStatus::Failed => "Failed",
    }
}

fn parse_status(s: &str) -> ScanStatus {
    match s {
        "Completed" => ScanStatus::Completed,
        "CompletedWithErrors" => ScanStatus::CompletedWithErrors,
        "Failed" => ScanStatus::Failed,
        _ => ScanStatus::Running,
    }
}

fn trigger_str(trigger: ScanTrigger) -> &'static str {
    match trigger {
        ScanTrigger::Scheduled => "Scheduled",
        ScanTrigger::Manual => "Manual",
        ScanTrigger::OnDemand => "OnDemand",
        ScanTrigger::Compare => "Compare",
    }
}

fn parse_trigger(s: &str) -> ScanTrigger {
    match s {
        "Manual" => ScanTrigger::Manual,
        "OnDemand" => ScanTrigger::OnDemand,
        "Compare" => ScanTrigger::Compare,
        _ => ScanTrigger::Scheduled,
    }
}

fn change_type_str(t: ChangeType) -> &'static str {
    match t {
        ChangeType::Created => "Created",
        ChangeType::Modified => "Modified",
        ChangeType::Deleted => "Deleted",
    }
}

fn parse_change_type(s: &str) -> ChangeType {
    match s {
        "Modified" => ChangeType::Modified,
        "Deleted" => ChangeType::Deleted,
        _ => ChangeType::Created,
    }
}

#[async_trait]
impl ScanLogRepository for SqlxRepository {
    async fn ensure_schema(&self) -> Result<(), ScanError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS scan_logs ( \
                id BIGSERIAL PRIMARY KEY, \
                started_at TIMESTAMPTZ NOT NULL, \
                completed_at TIMESTAMPTZ, \
                status TEXT NOT NULL, \
                trigger TEXT NOT NULL, \
                triggered_by TEXT, \
                total_tenants INT NOT NULL DEFAULT 0, \
                total_environments INT NOT NULL DEFAULT 0, \
                total_objects_scanned INT NOT NULL DEFAULT 0, \
                total_changes_detected INT NOT NULL DEFAULT 0, \
                total_errors INT NOT NULL DEFAULT 0, \
                error_summary TEXT \
             )",
            "CREATE INDEX IF NOT EXISTS ix_scan_logs_started_at ON scan_logs (started_at DESC)",
            "CREATE TABLE IF NOT EXISTS scan_entries ( \
                id BIGSERIAL PRIMARY KEY, \
                scan_log_id BIGINT NOT NULL REFERENCES scan_logs(id), \
                tenant_id BIGINT NOT NULL, \
                tenant_code TEXT NOT NULL, \
                environment TEXT NOT NULL, \
                started_at TIMESTAMPTZ NOT NULL, \
                completed_at TIMESTAMPTZ, \
                success BOOLEAN NOT NULL DEFAULT FALSE, \
                objects_found INT NOT NULL DEFAULT 0, \
                objects_new INT NOT NULL DEFAULT 0, \
                objects_modified INT NOT NULL DEFAULT 0, \
                objects_deleted INT NOT NULL DEFAULT 0, \
                error_message TEXT, \
                duration_seconds DOUBLE PRECISION NOT NULL DEFAULT 0 \
             )",
            "CREATE INDEX IF NOT EXISTS ix_scan_entries_scan_log_id ON scan_entries (scan_log_id)",
            "CREATE TABLE IF NOT EXISTS object_snapshots ( \
                id BIGSERIAL PRIMARY KEY, \
                scan_log_id BIGINT NOT NULL REFERENCES scan_logs(id), \
                tenant_id BIGINT NOT NULL, \
                tenant_name TEXT NOT NULL, \
                tenant_code TEXT NOT NULL, \
                environment TEXT NOT NULL, \
                full_name TEXT NOT NULL, \
                schema_name TEXT NOT NULL, \
                name TEXT NOT NULL, \
                kind TEXT NOT NULL, \
                definition_hash TEXT NOT NULL, \
                object_last_modified TIMESTAMPTZ NOT NULL, \
                snapshot_date TIMESTAMPTZ NOT NULL, \
                is_custom BOOLEAN NOT NULL DEFAULT FALSE \
             )",
            "CREATE INDEX IF NOT EXISTS ix_snapshots_latest \
             ON object_snapshots (tenant_id, environment, snapshot_date DESC)",
            "CREATE INDEX IF NOT EXISTS ix_snapshots_by_name \
             ON object_snapshots (full_name, tenant_id, environment, snapshot_date DESC)",
            "CREATE INDEX IF NOT EXISTS ix_snapshots_scan_log_id ON object_snapshots (scan_log_id)",
            "CREATE TABLE IF NOT EXISTS object_snapshot_definitions ( \
                id BIGSERIAL PRIMARY KEY, \
                snapshot_id BIGINT NOT NULL UNIQUE REFERENCES object_snapshots(id), \
                definition TEXT NOT NULL \
             )",
            "CREATE TABLE IF NOT EXISTS detected_changes ( \
                id BIGSERIAL PRIMARY KEY, \
                scan_log_id BIGINT NOT NULL REFERENCES scan_logs(id), \
                tenant_id BIGINT NOT NULL, \
                tenant_code TEXT NOT NULL, \
                environment TEXT NOT NULL, \
                full_name TEXT NOT NULL, \
                kind TEXT NOT NULL, \
                change_type TEXT NOT NULL, \
                previous_hash TEXT, \
                current_hash TEXT, \
                detected_at TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
                notification_sent BOOLEAN NOT NULL DEFAULT FALSE \
             )",
            "CREATE INDEX IF NOT EXISTS ix_changes_pending ON detected_changes (notification_sent) \
             WHERE notification_sent = FALSE",
            "CREATE TABLE IF NOT EXISTS baselines ( \
                id BIGSERIAL PRIMARY KEY, \
                name TEXT NOT NULL, \
                description TEXT, \
                source_tenant_id BIGINT NOT NULL, \
                source_tenant_name TEXT NOT NULL, \
                source_tenant_code TEXT NOT NULL, \
                source_environment TEXT NOT NULL, \
                total_objects INT NOT NULL DEFAULT 0, \
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
                created_by TEXT \
             )",
            "CREATE UNIQUE INDEX IF NOT EXISTS ix_baselines_name_ci ON baselines (LOWER(name))",
            "CREATE TABLE IF NOT EXISTS baseline_objects ( \
                id BIGSERIAL PRIMARY KEY, \
                baseline_id BIGINT NOT NULL REFERENCES baselines(id) ON DELETE CASCADE, \
                full_name TEXT NOT NULL, \
                schema_name TEXT NOT NULL, \
                name TEXT NOT NULL, \
                kind TEXT NOT NULL, \
                definition_hash TEXT NOT NULL, \
                source_snapshot_id BIGINT NOT NULL \
             )",
            "CREATE TABLE IF NOT EXISTS baseline_object_definitions ( \
                id BIGSERIAL PRIMARY KEY, \
                baseline_object_id BIGINT NOT NULL UNIQUE REFERENCES baseline_objects(id) ON DELETE CASCADE, \
                definition TEXT NOT NULL \
             )",
        ];

        for stmt in statements {
            sqlx::query(stmt).execute(&self.pool).await.map_err(Self::persistence_err)?;
        }
        Ok(())
    }

    async fn create_scan_log(&self, log: &ScanLog) -> Result<i64, ScanError> {
        let row = sqlx::query(
            "INSERT INTO scan_logs (started_at, status, trigger, triggered_by, total_tenants, total_environments) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(log.started_at)
        .bind(status_str(log.status))
        .bind(trigger_str(log.trigger))
        .bind(&log.triggered_by)
        .bind(log.total_tenants)
        .bind(log.total_environments)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::persistence_err)?;
        row.try_get::<i64, _>(0).map_err(Self::persistence_err)
    }

    async fn update_scan_log(&self, log: &ScanLog) -> Result<(), ScanError> {
        sqlx::query(
            "UPDATE scan_logs SET completed_at = $1, status = $2, total_objects_scanned = $3, \
             total_changes_detected = $4, total_errors = $5, error_summary = $6 WHERE id = $7",
        )
        .bind(log.completed_at)
        .bind(status_str(log.status))
        .bind(log.total_objects_scanned)
        .bind(log.total_changes_detected)
        .bind(log.total_errors)
        .bind(&log.error_summary)
        .bind(log.id)
        .execute(&self.pool)
        .await
        .map_err(Self::persistence_err)?;
        Ok(())
    }

    async fn get_scan_log(&self, id: i64) -> Result<Option<ScanLog>, ScanError> {
        let row = sqlx::query(
            "SELECT id, started_at, completed_at, status, trigger, triggered_by, total_tenants, \
                    total_environments, total_objects_scanned, total_changes_detected, total_errors, error_summary \
             FROM scan_logs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::persistence_err)?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(ScanLog {
            id: row.try_get(0).map_err(Self::persistence_err)?,
            started_at: row.try_get(1).map_err(Self::persistence_err)?,
            completed_at: row.try_get(2).map_err(Self::persistence_err)?,
            status: parse_status(&row.try_get::<String, _>(3).map_err(Self::persistence_err)?),
            trigger: parse_trigger(&row.try_get::<String, _>(4).map_err(Self::persistence_err)?),
            triggered_by: row.try_get(5).map_err(Self::persistence_err)?,
            total_tenants: row.try_get(6).map_err(Self::persistence_err)?,
            total_environments: row.try_get(7).map_err(Self::persistence_err)?,
            total_objects_scanned: row.try_get(8).map_err(Self::persistence_err)?,
            total_changes_detected: row.try_get(9).map_err(Self::persistence_err)?,
            total_errors: row.try_get(10).map_err(Self::persistence_err)?,
            error_summary: row.try_get(11).map_err(Self::persistence_err)?,
        }))
    }

    async fn list_recent_scan_logs(&self, limit: i64) -> Result<Vec<ScanLog>, ScanError> {
        let rows = sqlx::query(
            "SELECT id, started_at, completed_at, status, trigger, triggered_by, total_tenants, \
                    total_environments, total_objects_scanned, total_changes_detected, total_errors, error_summary \
             FROM scan_logs ORDER BY started_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::persistence_err)?;

        let mut logs = Vec::with_capacity(rows.len());
        for row in &rows {
            logs.push(ScanLog {
                id: row.try_get(0).map_err(Self::persistence_err)?,
                started_at: row.try_get(1).map_err(Self::persistence_err)?,
                completed_at: row.try_get(2).map_err(Self::persistence_err)?,
                status: parse_status(&row.try_get::<String, _>(3).map_err(Self::persistence_err)?),
                trigger: parse_trigger(&row.try_get::<String, _>(4).map_err(Self::persistence_err)?),
                triggered_by: row.try_get(5).map_err(Self::persistence_err)?,
                total_tenants: row.try_get(6).map_err(Self::persistence_err)?,
                total_environments: row.try_get(7).map_err(Self::persistence_err)?,
                total_objects_scanned: row.try_get(8).map_err(Self::persistence_err)?,
                total_changes_detected: row.try_get(9).map_err(Self::persistence_err)?,
                total_errors: row.try_get(10).map_err(Self::persistence_err)?,
                error_summary: row.try_get(11).map_err(Self::persistence_err)?,
            });
        }
        Ok(logs)
    }

    async fn create_scan_entry(&self, entry: &ScanLogEntry) -> Result<i64, ScanError> {
        let row = sqlx::query(
            "INSERT INTO scan_entries (scan_log_id, tenant_id, tenant_code, environment, started_at, success) \
             VALUES ($1, $2, $3, $4, $5, FALSE) RETURNING id",
        )
        .bind(entry.scan_log_id)
        .bind(entry.tenant_id)
        .bind(&entry.tenant_code)
        .bind(entry.environment.as_str())
        .bind(entry.started_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::persistence_err)?;
        row.try_get::<i64, _>(0).map_err(Self::persistence_err)
    }

    async fn update_scan_entry(&self, entry: &ScanLogEntry) -> Result<(), ScanError> {
        sqlx::query(
            "UPDATE scan_entries SET completed_at = $1, success = $2, objects_found = $3, objects_new = $4, \
             objects_modified = $5, objects_deleted = $6, error_message = $7, duration_seconds = $8 \
             WHERE id = $9",
        )
        .bind(entry.completed_at)
        .bind(entry.success)
        .bind(entry.objects_found)
        .bind(entry.objects_new)
        .bind(entry.objects_modified)
        .bind(entry.objects_deleted)
        .bind(&entry.error_message)
        .bind(entry.duration_seconds)
        .bind(entry.id)
        .execute(&self.pool)
        .await
        .map_err(Self::persistence_err)?;
        Ok(())
    }

    async fn list_scan_entries(&self, scan_log_id: i64) -> Result<Vec<ScanLogEntry>, ScanError> {
        let rows = sqlx::query(
            "SELECT id, scan_log_id, tenant_id, tenant_code, environment, started_at, completed_at, success, \
                    objects_found, objects_new, objects_modified, objects_deleted, error_message, duration_seconds \
             FROM scan_entries WHERE scan_log_id = $1 ORDER BY id",
        )
        .bind(scan_log_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::persistence_err)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let environment_str: String = row.try_get(4).map_err(Self::persistence_err)?;
            entries.push(ScanLogEntry {
                id: row.try_get(0).map_err(Self::persistence_err)?,
                scan_log_id: row.try_get(1).map_err(Self::persistence_err)?,
                tenant_id: row.try_get(2).map_err(Self::persistence_err)?,
                tenant_code: row.try_get(3).map_err(Self::persistence_err)?,
                environment: Environment::from_str_loose(&environment_str)
                    .ok_or_else(|| ScanError::Persistence(format!("unknown environment {environment_str}")))?,
                started_at: row.try_get(5).map_err(Self::persistence_err)?,
                completed_at: row.try_get(6).map_err(Self::persistence_err)?,
                success: row.try_get(7).map_err(Self::persistence_err)?,
                objects_found: row.try_get(8).map_err(Self::persistence_err)?,
                objects_new: row.try_get(9).map_err(Self::persistence_err)?,
                objects_modified: row.try_get(10).map_err(Self::persistence_err)?,
                objects_deleted: row.try_get(11).map_err(Self::persistence_err)?,
                error_message: row.try_get(12).map_err(Self::persistence_err)?,
                duration_seconds: row.try_get(13).map_err(Self::persistence_err)?,
            });
        }
        Ok(entries)
    }
}

#[async_trait]
impl SnapshotRepository for SqlxRepository {
    async fn bulk_insert_snapshots(
        &self,
        scan_log_id: i64,
        snapshots: &[NewSnapshot],
        definitions: &[String],
    ) -> Result<(), ScanError> {
        if snapshots.len() != definitions.len() {
            return Err(ScanError::Invariant(format!(
                "snapshot/definition length mismatch: {} vs {}",
                snapshots.len(),
                definitions.len()
            )));
        }
        if snapshots.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(Self::persistence_err)?;

        for snapshot in snapshots {
            sqlx::query(
                "INSERT INTO object_snapshots \
                 (scan_log_id, tenant_id, tenant_name, tenant_code, environment, full_name, schema_name, name, \
                  kind, definition_hash, object_last_modified, snapshot_date, is_custom) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            )
            .bind(scan_log_id)
            .bind(snapshot.tenant_id)
            .bind(&snapshot.tenant_name)
            .bind(&snapshot.tenant_code)
            .bind(snapshot.environment.as_str())
            .bind(&snapshot.full_name)
            .bind(&snapshot.schema)
            .bind(&snapshot.name)
            .bind(snapshot.kind.code())
            .bind(&snapshot.definition_hash)
            .bind(snapshot.server_last_modified)
            .bind(snapshot.snapshot_date)
            .bind(snapshot.is_custom)
            .execute(&mut *tx)
            .await
            .map_err(Self::persistence_err)?;
        }

        // Identity join after bulk insert: re-query ids scoped to
        // this batch and pair by fullName, since `Any` gives no portable
        // "returning in insertion order" guarantee across drivers.
        let rows = sqlx::query("SELECT id, full_name FROM object_snapshots WHERE scan_log_id = $1 ORDER BY id")
            .bind(scan_log_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(Self::persistence_err)?;

        let mut by_full_name: std::collections::HashMap<String, Vec<i64>> = std::collections::HashMap::new();
        for row in &rows {
            let id: i64 = row.try_get(0).map_err(Self::persistence_err)?;
            let full_name: String = row.try_get(1).map_err(Self::persistence_err)?;
            by_full_name.entry(full_name).or_default().push(id);
        }

        for (snapshot, definition) in snapshots.iter().zip(definitions.iter()) {
            let Some(ids) = by_full_name.get_mut(&snapshot.full_name) else {
                continue;
            };
            let Some(id) = ids.pop() else { continue };
            sqlx::query("INSERT INTO object_snapshot_definitions (snapshot_id, definition) VALUES ($1, $2)")
                .bind(id)
                .bind(definition)
                .execute(&mut *tx)
                .await
                .map_err(Self::persistence_err)?;
        }

        tx.commit().await.map_err(Self::persistence_err)?;
        Ok(())
    }

    async fn latest_snapshots(&self, tenant_id: i64, environment: Environment) -> Result<Vec<Snapshot>, ScanError> {
        let rows = sqlx::query(
            "SELECT s.id, s.scan_log_id, s.tenant_id, s.tenant_name, s.tenant_code, s.environment, s.full_name, \
                    s.schema_name, s.name, s.kind, s.definition_hash, s.object_last_modified, s.snapshot_date, s.is_custom \
             FROM object_snapshots s \
             JOIN ( \
                 SELECT full_name, MAX(snapshot_date) AS max_date \
                 FROM object_snapshots \
                 WHERE tenant_id = $1 AND environment = $2 \
                 GROUP BY full_name \
             ) latest ON latest.full_name = s.full_name AND latest.max_date = s.snapshot_date \
             WHERE s.tenant_id = $1 AND s.environment = $2",
        )
        .bind(tenant_id)
        .bind(environment.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(Self::persistence_err)?;

        let mut snapshots = Vec::with_capacity(rows.len());
        for row in &rows {
            let kind_code: String = row.try_get(9).map_err(Self::persistence_err)?;
            snapshots.push(Snapshot {
                id: row.try_get(0).map_err(Self::persistence_err)?,
                scan_log_id: row.try_get(1).map_err(Self::persistence_err)?,
                tenant_id: row.try_get(2).map_err(Self::persistence_err)?,
                tenant_name: row.try_get(3).map_err(Self::persistence_err)?,
                tenant_code: row.try_get(4).map_err(Self::persistence_err)?,
                environment,
                full_name: row.try_get(6).map_err(Self::persistence_err)?,
                schema: row.try_get(7).map_err(Self::persistence_err)?,
                name: row.try_get(8).map_err(Self::persistence_err)?,
                kind: ObjectKind::from_code(&kind_code)
                    .ok_or_else(|| ScanError::Persistence(format!("unknown kind code {kind_code}")))?,
                definition_hash: row.try_get(10).map_err(Self::persistence_err)?,
                server_last_modified: row.try_get(11).map_err(Self::persistence_err)?,
                snapshot_date: row.try_get(12).map_err(Self::persistence_err)?,
                is_custom: row.try_get(13).map_err(Self::persistence_err)?,
            });
        }
        Ok(snapshots)
    }

    async fn get_snapshot_definition(&self, snapshot_id: i64) -> Result<Option<String>, ScanError> {
        let row = sqlx::query("SELECT definition FROM object_snapshot_definitions WHERE snapshot_id = $1")
            .bind(snapshot_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::persistence_err)?;
        match row {
            Some(row) => Ok(Some(row.try_get(0).map_err(Self::persistence_err)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ChangeRepository for SqlxRepository {
    async fn bulk_insert_changes(&self, changes: &[NewDetectedChange]) -> Result<(), ScanError> {
        for change in changes {
            sqlx::query(
                "INSERT INTO detected_changes \
                 (scan_log_id, tenant_id, tenant_code, environment, full_name, kind, change_type, \
                  previous_hash, current_hash, notification_sent) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE)",
            )
            .bind(change.scan_log_id)
            .bind(change.tenant_id)
            .bind(&change.tenant_code)
            .bind(change.environment.as_str())
            .bind(&change.full_name)
            .bind(change.kind.code())
            .bind(change_type_str(change.change_type))
            .bind(&change.previous_hash)
            .bind(&change.current_hash)
            .execute(&self.pool)
            .await
            .map_err(Self::persistence_err)?;
        }
        Ok(())
    }

    async fn pending_notifications(&self) -> Result<Vec<DetectedChange>, ScanError> {
        let rows = sqlx::query(
            "SELECT id, scan_log_id, tenant_id, tenant_code, environment, full_name, kind, change_type, \
                    previous_hash, current_hash, detected_at, notification_sent \
             FROM detected_changes WHERE notification_sent = FALSE ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Self::persistence_err)?;

        let mut changes = Vec::with_capacity(rows.len());
        for row in &rows {
            let kind_code: String = row.try_get(6).map_err(Self::persistence_err)?;
            let change_type: String = row.try_get(7).map_err(Self::persistence_err)?;
            let environment_str: String = row.try_get(4).map_err(Self::persistence_err)?;
            changes.push(DetectedChange {
                id: row.try_get(0).map_err(Self::persistence_err)?,
                scan_log_id: row.try_get(1).map_err(Self::persistence_err)?,
                tenant_id: row.try_get(2).map_err(Self::persistence_err)?,
                tenant_code: row.try_get(3).map_err(Self::persistence_err)?,
                environment: Environment::from_str_loose(&environment_str)
                    .ok_or_else(|| ScanError::Persistence(format!("unknown environment {environment_str}")))?,
                full_name: row.try_get(5).map_err(Self::persistence_err)?,
                kind: ObjectKind::from_code(&kind_code)
                    .ok_or_else(|| ScanError::Persistence(format!("unknown kind code {kind_code}")))?,
                change_type: parse_change_type(&change_type),
                previous_hash: row.try_get(8).map_err(Self::persistence_err)?,
                current_hash: row.try_get(9).map_err(Self::persistence_err)?,
                detected_at: row.try_get(10).map_err(Self::persistence_err)?,
                notification_sent: row.try_get(11).map_err(Self::persistence_err)?,
            });
        }
        Ok(changes)
    }

    async fn mark_notification_sent(&self, ids: &[i64]) -> Result<(), ScanError> {
        for chunk in ids.chunks(1000) {
            for id in chunk {
                sqlx::query("UPDATE detected_changes SET notification_sent = TRUE WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(Self::persistence_err)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BaselineRepository for SqlxRepository {
    async fn create_baseline(&self, meta: &NewBaseline) -> Result<i64, ScanError> {
        let existing = sqlx::query("SELECT id FROM baselines WHERE LOWER(name) = LOWER($1)")
            .bind(&meta.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::persistence_err)?;
        if existing.is_some() {
            return Err(ScanError::Invariant(format!("a baseline named '{}' already exists", meta.name)));
        }

        let row = sqlx::query(
            "INSERT INTO baselines \
             (name, description, source_tenant_id, source_tenant_name, source_tenant_code, source_environment, \
              total_objects, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, 0, $7) RETURNING id",
        )
        .bind(&meta.name)
        .bind(&meta.description)
        .bind(meta.source_tenant_id)
        .bind(&meta.source_tenant_name)
        .bind(&meta.source_tenant_code)
        .bind(meta.source_environment.as_str())
        .bind(&meta.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::persistence_err)?;
        row.try_get::<i64, _>(0).map_err(Self::persistence_err)
    }

    async fn freeze_baseline_from_latest(
        &self,
        baseline_id: i64,
        tenant_id: i64,
        environment: Environment,
    ) -> Result<i32, ScanError> {
        let latest = self.latest_snapshots(tenant_id, environment).await?;
        let non_custom: Vec<&Snapshot> = latest.iter().filter(|s| !s.is_custom).collect();

        for snapshot in &non_custom {
            let row = sqlx::query(
                "INSERT INTO baseline_objects (baseline_id, full_name, schema_name, name, kind, definition_hash, source_snapshot_id) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
            )
            .bind(baseline_id)
            .bind(&snapshot.full_name)
            .bind(&snapshot.schema)
            .bind(&snapshot.name)
            .bind(snapshot.kind.code())
            .bind(&snapshot.definition_hash)
            .bind(snapshot.id)
            .fetch_one(&self.pool)
            .await
            .map_err(Self::persistence_err)?;
            let baseline_object_id: i64 = row.try_get(0).map_err(Self::persistence_err)?;

            if let Some(definition) = self.get_snapshot_definition(snapshot.id).await? {
                sqlx::query("INSERT INTO baseline_object_definitions (baseline_object_id, definition) VALUES ($1, $2)")
                    .bind(baseline_object_id)
                    .bind(definition)
                    .execute(&self.pool)
                    .await
                    .map_err(Self::persistence_err)?;
            }
        }

        let count = non_custom.len() as i32;
        sqlx::query("UPDATE baselines SET total_objects = $1 WHERE id = $2")
            .bind(count)
            .bind(baseline_id)
            .execute(&self.pool)
            .await
            .map_err(Self::persistence_err)?;

        Ok(count)
    }

    async fn list_baselines(&self) -> Result<Vec<Baseline>, ScanError> {
        let rows = sqlx::query(
            "SELECT id, name, description, source_tenant_id, source_tenant_name, source_tenant_code, \
                    source_environment, total_objects, created_at, created_by \
             FROM baselines ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Self::persistence_err)?;

        let mut baselines = Vec::with_capacity(rows.len());
        for row in &rows {
            baselines.push(row_to_baseline(row)?);
        }
        Ok(baselines)
    }

    async fn get_baseline(&self, id: i64) -> Result<Option<Baseline>, ScanError> {
        let row = sqlx::query(
            "SELECT id, name, description, source_tenant_id, source_tenant_name, source_tenant_code, \
                    source_environment, total_objects, created_at, created_by \
             FROM baselines WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::persistence_err)?;
        row.as_ref().map(row_to_baseline).transpose()
    }

    async fn delete_baseline(&self, id: i64) -> Result<(), ScanError> {
        sqlx::query("DELETE FROM baselines WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Self::persistence_err)?;
        Ok(())
    }

    async fn list_baseline_objects(&self, id: i64) -> Result<Vec<BaselineObject>, ScanError> {
        let rows = sqlx::query(
            "SELECT id, baseline_id, full_name, schema_name, name, kind, definition_hash, source_snapshot_id \
             FROM baseline_objects WHERE baseline_id = $1 ORDER BY full_name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::persistence_err)?;

        let mut objects = Vec::with_capacity(rows.len());
        for row in &rows {
            objects.push(row_to_baseline_object(row)?);
        }
        Ok(objects)
    }

    async fn get_baseline_object_definition(&self, object_id: i64) -> Result<Option<String>, ScanError> {
        let row = sqlx::query("SELECT definition FROM baseline_object_definitions WHERE baseline_object_id = $1")
            .bind(object_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::persistence_err)?;
        match row {
            Some(row) => Ok(Some(row.try_get(0).map_err(Self::persistence_err)?)),
            None => Ok(None),
        }
    }

    async fn load_baseline_with_definitions(
        &self,
        id: i64,
    ) -> Result<(Baseline, Vec<(BaselineObject, String)>), ScanError> {
        let baseline = self
            .get_baseline(id)
            .await?
            .ok_or_else(|| ScanError::Invariant(format!("baseline {id} not found")))?;
        let objects = self.list_baseline_objects(id).await?;

        let mut pairs = Vec::with_capacity(objects.len());
        for object in objects {
            let definition = self.get_baseline_object_definition(object.id).await?.unwrap_or_default();
            pairs.push((object, definition));
        }
        Ok((baseline, pairs))
    }
}

fn row_to_baseline(row: &sqlx::any::AnyRow) -> Result<Baseline, ScanError> {
    let environment_str: String = row.try_get(6).map_err(SqlxRepository::persistence_err)?;
    Ok(Baseline {
        id: row.try_get(0).map_err(SqlxRepository::persistence_err)?,
        name: row.try_get(1).map_err(SqlxRepository::persistence_err)?,
        description: row.try_get(2).map_err(SqlxRepository::persistence_err)?,
        source_tenant_id: row.try_get(3).map_err(SqlxRepository::persistence_err)?,
        source_tenant_name: row.try_get(4).map_err(SqlxRepository::persistence_err)?,
        source_tenant_code: row.try_get(5).map_err(SqlxRepository::persistence_err)?,
        source_environment: Environment::from_str_loose(&environment_str)
            .ok_or_else(|| ScanError::Persistence(format!("unknown environment {environment_str}")))?,
        total_objects: row.try_get(7).map_err(SqlxRepository::persistence_err)?,
        created_at: row.try_get(8).map_err(SqlxRepository::persistence_err)?,
        created_by: row.try_get(9).map_err(SqlxRepository::persistence_err)?,
    })
}

fn row_to_baseline_object(row: &sqlx::any::AnyRow) -> Result<BaselineObject, ScanError> {
    let kind_code: String = row.try_get(5).map_err(SqlxRepository::persistence_err)?;
    Ok(BaselineObject {
        id: row.try_get(0).map_err(SqlxRepository::persistence_err)?,
        baseline_id: row.try_get(1).map_err(SqlxRepository::persistence_err)?,
        full_name: row.try_get(2).map_err(SqlxRepository::persistence_err)?,
        schema: row.try_get(3).map_err(SqlxRepository::persistence_err)?,
        name: row.try_get(4).map_err(SqlxRepository::persistence_err)?,
        kind: ObjectKind::from_code(&kind_code)
            .ok_or_else(|| ScanError::Persistence(format!("unknown kind code {kind_code}")))?,
        definition_hash: row.try_get(6).map_err(SqlxRepository::persistence_err)?,
        source_snapshot_id: row.try_get(7).map_err(SqlxRepository::persistence_err)?,
    })
}
