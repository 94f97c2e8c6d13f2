use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::key::normalize_key;
use super::programmable_object::ObjectKind;
use super::snapshot::Snapshot;
use super::target::Environment;

/// What kind of change a `DetectedChange` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
}

/// A recorded created/modified/deleted object.
/// At most one row exists for a given `(scanLogId, target, fullName)`.
#[derive(Debug, Clone)]
pub struct DetectedChange {
    pub id: i64,
    pub scan_log_id: i64,
    pub tenant_id: i64,
    pub tenant_code: String,
    pub environment: Environment,
    pub full_name: String,
    pub kind: ObjectKind,
    pub change_type: ChangeType,
    pub previous_hash: Option<String>,
    pub current_hash: Option<String>,
    pub detected_at: DateTime<Utc>,
    pub notification_sent: bool,
}

/// A `DetectedChange` before it has an id and before `notificationSent` has
/// ever been touched (always `false` on insert).
#[derive(Debug, Clone)]
pub struct NewDetectedChange {
    pub scan_log_id: i64,
    pub tenant_id: i64,
    pub tenant_code: String,
    pub environment: Environment,
    pub full_name: String,
    pub kind: ObjectKind,
    pub change_type: ChangeType,
    pub previous_hash: Option<String>,
    pub current_hash: Option<String>,
}

/// Derives the (Created, Modified, Deleted) set between a target's previous
/// and current snapshot sets. A pure function over two slices
/// keyed by `fullName`, case-insensitive.
pub trait ChangeDetector: Send + Sync {
    /// `current_scan_log_id` is stamped onto every emitted change, including
    /// `Deleted` changes (which have no current snapshot to take it from).
    fn detect(
        &self,
        current_scan_log_id: i64,
        previous: &[Snapshot],
        current: &[Snapshot],
    ) -> Vec<NewDetectedChange>;
}

#[derive(Debug, Default)]
pub struct DefaultChangeDetector;

impl ChangeDetector for DefaultChangeDetector {
    fn detect(
        &self,
        current_scan_log_id: i64,
        previous: &[Snapshot],
        current: &[Snapshot],
    ) -> Vec<NewDetectedChange> {
        // Baseline scan rule: an empty previous set never emits changes.
        if previous.is_empty() {
            return Vec::new();
        }

        let previous_index: BTreeMap<String, &Snapshot> = previous
            .iter()
            .map(|s| (normalize_key(&s.full_name), s))
            .collect();
        let current_index: BTreeMap<String, &Snapshot> = current
            .iter()
            .map(|s| (normalize_key(&s.full_name), s))
            .collect();

        let mut changes = Vec::new();

        for (key, cur) in &current_index {
            match previous_index.get(key) {
                None => changes.push(NewDetectedChange {
                    scan_log_id: current_scan_log_id,
                    tenant_id: cur.tenant_id,
                    tenant_code: cur.tenant_code.clone(),
                    environment: cur.environment,
                    full_name: cur.full_name.clone(),
                    kind: cur.kind,
                    change_type: ChangeType::Created,
                    previous_hash: None,
                    current_hash: Some(cur.definition_hash.clone()),
                }),
                Some(prev) if prev.definition_hash != cur.definition_hash => {
                    changes.push(NewDetectedChange {
                        scan_log_id: current_scan_log_id,
                        tenant_id: cur.tenant_id,
                        tenant_code: cur.tenant_code.clone(),
                        environment: cur.environment,
                        full_name: cur.full_name.clone(),
                        kind: cur.kind,
                        change_type: ChangeType::Modified,
                        previous_hash: Some(prev.definition_hash.clone()),
                        current_hash: Some(cur.definition_hash.clone()),
                    })
                }
                Some(_) => {}
            }
        }

        for (key, prev) in &previous_index {
            if !current_index.contains_key(key) {
                changes.push(NewDetectedChange {
                    scan_log_id: current_scan_log_id,
                    tenant_id: prev.tenant_id,
                    tenant_code: prev.tenant_code.clone(),
                    environment: prev.environment,
                    full_name: prev.full_name.clone(),
                    kind: prev.kind,
                    change_type: ChangeType::Deleted,
                    previous_hash: Some(prev.definition_hash.clone()),
                    current_hash: None,
                });
            }
        }

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(full_name: &str, hash: &str) -> Snapshot {
        Snapshot {
            id: 0,
            scan_log_id: 1,
            tenant_id: 1,
            tenant_name: "Acme".into(),
            tenant_code: "ACME".into(),
            environment: Environment::Production,
            full_name: full_name.into(),
            schema: "dbo".into(),
            name: full_name.split('.').next_back().unwrap().into(),
            kind: ObjectKind::Procedure,
            definition_hash: hash.into(),
            server_last_modified: Utc::now(),
            snapshot_date: Utc::now(),
            is_custom: false,
        }
    }

    #[test]
    fn empty_previous_never_emits_changes() {
        let current = vec![snap("dbo.A", "h1")];
        let changes = DefaultChangeDetector.detect(2, &[], &current);
        assert!(changes.is_empty());
    }

    #[test]
    fn detects_created_modified_and_deleted() {
        let previous = vec![snap("dbo.A", "h1"), snap("dbo.B", "h2")];
        let current = vec![snap("dbo.A", "h1"), snap("dbo.B", "h3"), snap("dbo.C", "h4")];

        let mut changes = DefaultChangeDetector.detect(2, &previous, &current);
        changes.sort_by(|a, b| a.full_name.cmp(&b.full_name));

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].full_name, "dbo.B");
        assert_eq!(changes[0].change_type, ChangeType::Modified);
        assert_eq!(changes[0].previous_hash.as_deref(), Some("h2"));
        assert_eq!(changes[0].current_hash.as_deref(), Some("h3"));
        assert_eq!(changes[1].full_name, "dbo.C");
        assert_eq!(changes[1].change_type, ChangeType::Created);
        assert_eq!(changes[1].previous_hash, None);
    }

    #[test]
    fn unchanged_objects_emit_nothing() {
        let previous = vec![snap("dbo.A", "h1")];
        let current = vec![snap("dbo.A", "h1")];
        assert!(DefaultChangeDetector.detect(2, &previous, &current).is_empty());
    }

    #[test]
    fn key_matching_is_case_insensitive() {
        let previous = vec![snap("dbo.GetOrders", "h1")];
        let current = vec![snap("DBO.GETORDERS", "h1")];
        assert!(DefaultChangeDetector.detect(2, &previous, &current).is_empty());
    }

    #[test]
    fn deletion_carries_previous_hash_and_no_current_hash() {
        let previous = vec![snap("dbo.A", "h1")];
        let current: Vec<Snapshot> = vec![];
        let changes = DefaultChangeDetector.detect(2, &previous, &current);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Deleted);
        assert_eq!(changes[0].previous_hash.as_deref(), Some("h1"));
        assert_eq!(changes[0].current_hash, None);
    }

    #[test]
    fn detection_is_idempotent() {
        let previous = vec![snap("dbo.A", "h1"), snap("dbo.B", "h2")];
        let current = vec![snap("dbo.A", "h1"), snap("dbo.B", "h3"), snap("dbo.C", "h4")];
        let mut first = DefaultChangeDetector.detect(2, &previous, &current);
        let mut second = DefaultChangeDetector.detect(2, &previous, &current);
        first.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        second.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.full_name, b.full_name);
            assert_eq!(a.change_type, b.change_type);
        }
    }
}
