use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::compare::{diff_sets, exclude_custom, line_diff, CompareResult, LineDiff};
use crate::domain::error::ScanError;
use crate::domain::programmable_object::ObjectKind;
use crate::domain::ports::SnapshotRepository;
use crate::domain::target::Environment;

/// Inline comparisons get a hard deadline distinct from the 90-second scan
/// budget.
const COMPARE_DEADLINE: Duration = Duration::from_secs(20);

/// `Compare(tenantA, envA, tenantB, envB, kindFilter)` and
/// `Diff(snapshotIdA, snapshotIdB)`.
pub struct Comparator {
    snapshots: Arc<dyn SnapshotRepository>,
}

impl Comparator {
    pub fn new(snapshots: Arc<dyn SnapshotRepository>) -> Self {
        Self { snapshots }
    }

    pub async fn compare(
        &self,
        tenant_a: i64,
        env_a: Environment,
        tenant_b: i64,
        env_b: Environment,
        kind_filter: Option<ObjectKind>,
    ) -> Result<CompareResult, ScanError> {
        tokio::time::timeout(COMPARE_DEADLINE, async {
            let source = self.snapshots.latest_snapshots(tenant_a, env_a).await?;
            let target = self.snapshots.latest_snapshots(tenant_b, env_b).await?;
            let source_entries = source.iter().map(Into::into).collect::<Vec<_>>();
            let target_entries = target.iter().map(Into::into).collect::<Vec<_>>();
            Ok(diff_sets(&source_entries, &target_entries, kind_filter))
        })
        .await
        .unwrap_or(Err(ScanError::Timeout(COMPARE_DEADLINE)))
    }

    /// Same as `compare` but first drops entries the tenant's custom
    /// registry (or by-convention match) claims, on both sides.
    pub async fn compare_excluding_custom(
        &self,
        tenant_a: i64,
        env_a: Environment,
        tenant_b: i64,
        env_b: Environment,
        kind_filter: Option<ObjectKind>,
        custom_keys: &BTreeSet<String>,
        tenant_code: &str,
        by_convention: bool,
    ) -> Result<CompareResult, ScanError> {
        tokio::time::timeout(COMPARE_DEADLINE, async {
            let source = self.snapshots.latest_snapshots(tenant_a, env_a).await?;
            let target = self.snapshots.latest_snapshots(tenant_b, env_b).await?;
            let source_entries = source.iter().map(Into::into).collect::<Vec<_>>();
            let target_entries = target.iter().map(Into::into).collect::<Vec<_>>();
            let source_entries = exclude_custom(source_entries, custom_keys, Some(tenant_code), by_convention);
            let target_entries = exclude_custom(target_entries, custom_keys, Some(tenant_code), by_convention);
            Ok(diff_sets(&source_entries, &target_entries, kind_filter))
        })
        .await
        .unwrap_or(Err(ScanError::Timeout(COMPARE_DEADLINE)))
    }

    pub async fn diff(&self, snapshot_id_a: i64, snapshot_id_b: i64) -> Result<LineDiff, ScanError> {
        tokio::time::timeout(COMPARE_DEADLINE, async {
            let a = self
                .snapshots
                .get_snapshot_definition(snapshot_id_a)
                .await?
                .ok_or_else(|| ScanError::Invariant(format!("snapshot {snapshot_id_a} has no definition")))?;
            let b = self
                .snapshots
                .get_snapshot_definition(snapshot_id_b)
                .await?
                .ok_or_else(|| ScanError::Invariant(format!("snapshot {snapshot_id_b} has no definition")))?;
            Ok(line_diff(&a, &b))
        })
        .await
        .unwrap_or(Err(ScanError::Timeout(COMPARE_DEADLINE)))
    }
}
