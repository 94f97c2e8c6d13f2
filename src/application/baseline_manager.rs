use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::baseline::{Baseline, BaselineObject, NewBaseline};
use crate::domain::compare::{diff_sets, exclude_custom, CompareEntry, CompareResult};
use crate::domain::error::ScanError;
use crate::domain::ports::{BaselineRepository, SnapshotRepository};
use crate::domain::target::Environment;

/// `CreateBaseline`/`ListBaselines`/`CompareBaseline`.
pub struct BaselineManager {
    baselines: Arc<dyn BaselineRepository>,
    snapshots: Arc<dyn SnapshotRepository>,
}

impl BaselineManager {
    pub fn new(baselines: Arc<dyn BaselineRepository>, snapshots: Arc<dyn SnapshotRepository>) -> Self {
        Self { baselines, snapshots }
    }

    /// Freezes the current non-custom latest snapshots of `(tenant_id,
    /// environment)` under `meta.name`. An empty freeze is rejected and the
    /// half-created baseline is removed.
    pub async fn create(
        &self,
        meta: NewBaseline,
        tenant_id: i64,
        environment: Environment,
    ) -> Result<(i64, i32), ScanError> {
        let id = self.baselines.create_baseline(&meta).await?;
        let count = self.baselines.freeze_baseline_from_latest(id, tenant_id, environment).await?;
        if count == 0 {
            self.baselines.delete_baseline(id).await?;
            return Err(ScanError::Invariant(
                "refusing to create an empty baseline: target has no non-custom objects".into(),
            ));
        }
        Ok((id, count))
    }

    pub async fn list(&self) -> Result<Vec<Baseline>, ScanError> {
        self.baselines.list_baselines().await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Baseline>, ScanError> {
        self.baselines.get_baseline(id).await
    }

    pub async fn objects(&self, id: i64) -> Result<Vec<BaselineObject>, ScanError> {
        self.baselines.list_baseline_objects(id).await
    }

    /// Compares a frozen baseline against a live target's current non-custom
    /// objects. The live side excludes custom objects by the
    /// same rule the scan applies when deciding what to freeze.
    pub async fn compare_against_live(
        &self,
        baseline_id: i64,
        live_tenant_id: i64,
        live_environment: Environment,
        custom_keys: &BTreeSet<String>,
        tenant_code: &str,
        by_convention: bool,
    ) -> Result<CompareResult, ScanError> {
        let (_, baseline_objects) = self.baselines.load_baseline_with_definitions(baseline_id).await?;
        let baseline_entries: Vec<CompareEntry> = baseline_objects
            .iter()
            .map(|(obj, _definition)| CompareEntry {
                full_name: obj.full_name.clone(),
                kind: obj.kind,
                definition_hash: obj.definition_hash.clone(),
            })
            .collect();

        let live = self.snapshots.latest_snapshots(live_tenant_id, live_environment).await?;
        let live_entries: Vec<CompareEntry> = live.iter().map(Into::into).collect();
        let live_entries = exclude_custom(live_entries, custom_keys, Some(tenant_code), by_convention);

        Ok(diff_sets(&baseline_entries, &live_entries, None))
    }

    pub async fn delete(&self, id: i64) -> Result<(), ScanError> {
        self.baselines.delete_baseline(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::change::NewDetectedChange;
    use crate::domain::ports::{ChangeRepository, ScanLogRepository};
    use crate::domain::scan_log::{ScanLog, ScanLogEntry};
    use crate::domain::snapshot::{NewSnapshot, Snapshot};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBaselines {
        next_id: Mutex<i64>,
        frozen_counts: Mutex<std::collections::BTreeMap<i64, i32>>,
        deleted: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl ScanLogRepository for FakeBaselines {
        async fn ensure_schema(&self) -> Result<(), ScanError> {
            Ok(())
        }
        async fn create_scan_log(&self, _log: &ScanLog) -> Result<i64, ScanError> {
            unreachable!()
        }
        async fn update_scan_log(&self, _log: &ScanLog) -> Result<(), ScanError> {
            unreachable!()
        }
        async fn get_scan_log(&self, _id: i64) -> Result<Option<ScanLog>, ScanError> {
            unreachable!()
        }
        async fn list_recent_scan_logs(&self, _limit: i64) -> Result<Vec<ScanLog>, ScanError> {
            unreachable!()
        }
        async fn create_scan_entry(&self, _entry: &ScanLogEntry) -> Result<i64, ScanError> {
            unreachable!()
        }
        async fn update_scan_entry(&self, _entry: &ScanLogEntry) -> Result<(), ScanError> {
            unreachable!()
        }
        async fn list_scan_entries(&self, _scan_log_id: i64) -> Result<Vec<ScanLogEntry>, ScanError> {
            unreachable!()
        }
    }

    #[async_trait]
    impl crate::domain::ports::SnapshotRepository for FakeBaselines {
        async fn bulk_insert_snapshots(
            &self,
            _scan_log_id: i64,
            _snapshots: &[NewSnapshot],
            _definitions: &[String],
        ) -> Result<(), ScanError> {
            unreachable!()
        }
        async fn latest_snapshots(&self, _tenant_id: i64, _environment: Environment) -> Result<Vec<Snapshot>, ScanError> {
            unreachable!()
        }
        async fn get_snapshot_definition(&self, _snapshot_id: i64) -> Result<Option<String>, ScanError> {
            unreachable!()
        }
    }

    #[async_trait]
    impl ChangeRepository for FakeBaselines {
        async fn bulk_insert_changes(&self, _changes: &[NewDetectedChange]) -> Result<(), ScanError> {
            unreachable!()
        }
        async fn pending_notifications(&self) -> Result<Vec<crate::domain::change::DetectedChange>, ScanError> {
            unreachable!()
        }
        async fn mark_notification_sent(&self, _ids: &[i64]) -> Result<(), ScanError> {
            unreachable!()
        }
    }

    #[async_trait]
    impl BaselineRepository for FakeBaselines {
        async fn create_baseline(&self, _meta: &NewBaseline) -> Result<i64, ScanError> {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Ok(*next)
        }

        async fn freeze_baseline_from_latest(
            &self,
            baseline_id: i64,
            _tenant_id: i64,
            _environment: Environment,
        ) -> Result<i32, ScanError> {
            Ok(*self.frozen_counts.lock().unwrap().get(&baseline_id).unwrap_or(&0))
        }

        async fn list_baselines(&self) -> Result<Vec<Baseline>, ScanError> {
            Ok(Vec::new())
        }
        async fn get_baseline(&self, _id: i64) -> Result<Option<Baseline>, ScanError> {
            Ok(None)
        }
        async fn delete_baseline(&self, id: i64) -> Result<(), ScanError> {
            self.deleted.lock().unwrap().push(id);
            Ok(())
        }
        async fn list_baseline_objects(&self, _id: i64) -> Result<Vec<BaselineObject>, ScanError> {
            Ok(Vec::new())
        }
        async fn get_baseline_object_definition(&self, _object_id: i64) -> Result<Option<String>, ScanError> {
            Ok(None)
        }
        async fn load_baseline_with_definitions(
            &self,
            _id: i64,
        ) -> Result<(Baseline, Vec<(BaselineObject, String)>), ScanError> {
            unreachable!()
        }
    }

    fn meta() -> NewBaseline {
        NewBaseline {
            name: "release-1".into(),
            description: None,
            source_tenant_id: 1,
            source_tenant_name: "Acme".into(),
            source_tenant_code: "ACME".into(),
            source_environment: Environment::Production,
            created_by: None,
        }
    }

    #[tokio::test]
    async fn create_rejects_empty_freeze_and_deletes_the_shell() {
        let repo = Arc::new(FakeBaselines::default());
        let manager = BaselineManager::new(repo.clone(), repo.clone());
        let result = manager.create(meta(), 1, Environment::Production).await;
        assert!(result.is_err());
        assert_eq!(repo.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_succeeds_when_objects_are_frozen() {
        let repo = Arc::new(FakeBaselines::default());
        repo.frozen_counts.lock().unwrap().insert(1, 3);
        let manager = BaselineManager::new(repo.clone(), repo.clone());
        let (id, count) = manager.create(meta(), 1, Environment::Production).await.unwrap();
        assert_eq!(id, 1);
        assert_eq!(count, 3);
        assert!(repo.deleted.lock().unwrap().is_empty());
    }
}
