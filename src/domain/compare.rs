use std::collections::{BTreeMap, BTreeSet};

use super::key::normalize_key;
use super::programmable_object::{normalize_definition, ObjectKind};
use super::snapshot::Snapshot;

/// Outcome of comparing one `fullName` between a source and a target set
///. Declaration order fixes the sort priority of `(status,
/// fullName)` ordering: divergences sort before agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum CompareStatus {
    OnlyInSource,
    OnlyInTarget,
    Modified,
    Equal,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CompareItem {
    pub full_name: String,
    pub kind: ObjectKind,
    pub status: CompareStatus,
    pub source_hash: Option<String>,
    pub target_hash: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CompareResult {
    pub items: Vec<CompareItem>,
}

impl CompareResult {
    pub fn count(&self, status: CompareStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }
}

/// One side of a comparison: a `fullName` plus the data needed to classify
/// it. Used both for live snapshot sets (`Comparator::compare`) and for
/// in-memory baseline dictionaries (`Comparator::compare_dictionaries`).
impl std::fmt::Display for CompareStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompareStatus::OnlyInSource => "Only in source",
            CompareStatus::OnlyInTarget => "Only in target",
            CompareStatus::Modified => "Modified",
            CompareStatus::Equal => "Equal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct CompareEntry {
    pub full_name: String,
    pub kind: ObjectKind,
    pub definition_hash: String,
}

impl From<&Snapshot> for CompareEntry {
    fn from(s: &Snapshot) -> Self {
        CompareEntry {
            full_name: s.full_name.clone(),
            kind: s.kind,
            definition_hash: s.definition_hash.clone(),
        }
    }
}

/// The shared algorithm behind `Compare` and `CompareDictionaries`: classify every `fullName` present in either side, then order by
/// `(status, fullName)`.
pub fn diff_sets(
    source: &[CompareEntry],
    target: &[CompareEntry],
    kind_filter: Option<ObjectKind>,
) -> CompareResult {
    let source_index: BTreeMap<String, &CompareEntry> = source
        .iter()
        .map(|e| (normalize_key(&e.full_name), e))
        .collect();
    let target_index: BTreeMap<String, &CompareEntry> = target
        .iter()
        .map(|e| (normalize_key(&e.full_name), e))
        .collect();

    let keys: BTreeSet<&String> = source_index.keys().chain(target_index.keys()).collect();

    let mut items: Vec<CompareItem> = keys
        .into_iter()
        .filter_map(|key| {
            let in_source = source_index.get(key);
            let in_target = target_index.get(key);
            let (full_name, kind, status, source_hash, target_hash) = match (in_source, in_target) {
                (Some(s), None) => (
                    s.full_name.clone(),
                    s.kind,
                    CompareStatus::OnlyInSource,
                    Some(s.definition_hash.clone()),
                    None,
                ),
                (None, Some(t)) => (
                    t.full_name.clone(),
                    t.kind,
                    CompareStatus::OnlyInTarget,
                    None,
                    Some(t.definition_hash.clone()),
                ),
                (Some(s), Some(t)) if s.definition_hash == t.definition_hash => (
                    t.full_name.clone(),
                    t.kind,
                    CompareStatus::Equal,
                    Some(s.definition_hash.clone()),
                    Some(t.definition_hash.clone()),
                ),
                (Some(s), Some(t)) => (
                    t.full_name.clone(),
                    t.kind,
                    CompareStatus::Modified,
                    Some(s.definition_hash.clone()),
                    Some(t.definition_hash.clone()),
                ),
                (None, None) => unreachable!("key came from one of the two indexes"),
            };

            if let Some(filter) = kind_filter {
                if kind != filter {
                    return None;
                }
            }

            Some(CompareItem {
                full_name,
                kind,
                status,
                source_hash,
                target_hash,
            })
        })
        .collect();

    items.sort_by(|a, b| a.status.cmp(&b.status).then_with(|| a.full_name.cmp(&b.full_name)));

    CompareResult { items }
}

/// Exclude entries the caller considers custom from a target-side
/// dictionary before comparing: baselines never contain custom objects, so
/// a live-side custom object must not surface as `OnlyInTarget`.
pub fn exclude_custom(
    entries: Vec<CompareEntry>,
    custom_keys: &BTreeSet<String>,
    tenant_code: Option<&str>,
    by_convention: bool,
) -> Vec<CompareEntry> {
    entries
        .into_iter()
        .filter(|e| {
            let key = normalize_key(&e.full_name);
            if custom_keys.contains(&key) {
                return false;
            }
            if by_convention {
                if let Some(code) = tenant_code {
                    let name_part = e.full_name.rsplit('.').next().unwrap_or(&e.full_name);
                    if name_part.to_ascii_lowercase().contains(&code.to_ascii_lowercase()) {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}

/// One line of a unified line diff.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum DiffLine {
    Added(String),
    Removed(String),
    Unchanged(String),
}

/// Result of `Comparator::Diff`: the add/remove line counts the
/// contract fixes, plus the line sequence a presentation layer renders.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LineDiff {
    pub added_lines: usize,
    pub removed_lines: usize,
    pub lines: Vec<DiffLine>,
}

/// Side-by-side line diff of two normalized definitions. A classic LCS-backed diff: O(n*m) time and space over line counts,
/// acceptable for the handful-of-hundred-line definitions this compares.
pub fn line_diff(source_definition: &str, target_definition: &str) -> LineDiff {
    let source = normalize_definition(source_definition);
    let target = normalize_definition(target_definition);
    let a: Vec<&str> = source.lines().collect();
    let b: Vec<&str> = target.lines().collect();
    let (n, m) = (a.len(), b.len());

    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut lines = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            lines.push(DiffLine::Unchanged(a[i].to_string()));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            lines.push(DiffLine::Removed(a[i].to_string()));
            i += 1;
        } else {
            lines.push(DiffLine::Added(b[j].to_string()));
            j += 1;
        }
    }
    while i < n {
        lines.push(DiffLine::Removed(a[i].to_string()));
        i += 1;
    }
    while j < m {
        lines.push(DiffLine::Added(b[j].to_string()));
        j += 1;
    }

    let added_lines = lines.iter().filter(|l| matches!(l, DiffLine::Added(_))).count();
    let removed_lines = lines.iter().filter(|l| matches!(l, DiffLine::Removed(_))).count();

    LineDiff {
        added_lines,
        removed_lines,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(full_name: &str, hash: &str) -> CompareEntry {
        CompareEntry {
            full_name: full_name.into(),
            kind: ObjectKind::Procedure,
            definition_hash: hash.into(),
        }
    }

    #[test]
    fn equal_and_diverged_ordering() {
        let mut source = Vec::new();
        let mut target = Vec::new();
        for i in 0..10 {
            let name = format!("dbo.P{i}");
            source.push(entry(&name, "same"));
            target.push(entry(&name, "same"));
        }
        source.push(entry("dbo.Q1", "a"));
        target.push(entry("dbo.Q1", "b"));
        source.push(entry("dbo.Q2", "a"));
        target.push(entry("dbo.Q2", "c"));

        let result = diff_sets(&source, &target, None);
        assert_eq!(result.count(CompareStatus::Equal), 10);
        assert_eq!(result.count(CompareStatus::Modified), 2);
    }

    #[test]
    fn only_in_source_and_only_in_target() {
        let source = vec![entry("dbo.A", "h1")];
        let target = vec![entry("dbo.B", "h2")];
        let result = diff_sets(&source, &target, None);
        assert_eq!(result.count(CompareStatus::OnlyInSource), 1);
        assert_eq!(result.count(CompareStatus::OnlyInTarget), 1);
    }

    #[test]
    fn kind_filter_restricts_emitted_items() {
        let source = vec![entry("dbo.A", "h1")];
        let mut target_view = entry("dbo.A", "h1");
        target_view.kind = ObjectKind::View;
        let target = vec![target_view];
        let result = diff_sets(&source, &target, Some(ObjectKind::Procedure));
        assert!(result.items.is_empty());
    }

    #[test]
    fn exclude_custom_drops_registry_and_convention_matches() {
        let entries = vec![entry("dbo.Report_ACME", "h1"), entry("dbo.Core", "h2")];
        let mut custom_keys = BTreeSet::new();
        custom_keys.insert(normalize_key("dbo.Core"));
        let kept = exclude_custom(entries, &custom_keys, Some("ACME"), true);
        assert!(kept.is_empty());
    }

    #[test]
    fn line_diff_counts_pure_addition() {
        let diff = line_diff("a\nb", "a\nb\nc");
        assert_eq!(diff.added_lines, 1);
        assert_eq!(diff.removed_lines, 0);
    }

    #[test]
    fn line_diff_counts_pure_removal() {
        let diff = line_diff("a\nb\nc", "a\nc");
        assert_eq!(diff.added_lines, 0);
        assert_eq!(diff.removed_lines, 1);
    }

    #[test]
    fn line_diff_identical_has_no_changes() {
        let diff = line_diff("a\r\nb\r\n", "a\nb");
        assert_eq!(diff.added_lines, 0);
        assert_eq!(diff.removed_lines, 0);
    }
}
