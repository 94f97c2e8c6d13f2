use chrono::{DateTime, Utc};

use super::target::Environment;

/// Terminal and transient status of a `ScanLog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScanStatus {
    Running,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl ScanStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanStatus::Running)
    }
}

/// What caused a scan to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScanTrigger {
    Scheduled,
    Manual,
    OnDemand,
    Compare,
}

/// Created in `Running` state; updated exactly once to a terminal state.
#[derive(Debug, Clone)]
pub struct ScanLog {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ScanStatus,
    pub trigger: ScanTrigger,
    pub triggered_by: Option<String>,
    pub total_tenants: i32,
    pub total_environments: i32,
    pub total_objects_scanned: i32,
    pub total_changes_detected: i32,
    pub total_errors: i32,
    pub error_summary: Option<String>,
}

impl ScanLog {
    pub fn started(trigger: ScanTrigger, triggered_by: Option<String>) -> Self {
        Self {
            id: 0,
            started_at: Utc::now(),
            completed_at: None,
            status: ScanStatus::Running,
            trigger,
            triggered_by,
            total_tenants: 0,
            total_environments: 0,
            total_objects_scanned: 0,
            total_changes_detected: 0,
            total_errors: 0,
            error_summary: None,
        }
    }

    /// Terminal status policy: no errors → Completed; errors but at least
    /// one success → CompletedWithErrors; a fatal/cancellation path is
    /// applied separately by the caller.
    pub fn finish(&mut self, any_target_succeeded: bool) {
        self.completed_at = Some(Utc::now());
        self.status = if self.total_errors == 0 {
            ScanStatus::Completed
        } else if any_target_succeeded {
            ScanStatus::CompletedWithErrors
        } else {
            ScanStatus::Failed
        };
    }

    pub fn fail(&mut self, reason: &str) {
        self.completed_at = Some(Utc::now());
        self.status = ScanStatus::Failed;
        self.error_summary = Some(reason.to_string());
    }

    pub fn cancelled(&mut self) {
        self.fail("Cancelled");
    }
}

/// One per `(ScanLog, Target)`. Created at target
/// start, updated exactly once at target end.
#[derive(Debug, Clone)]
pub struct ScanLogEntry {
    pub id: i64,
    pub scan_log_id: i64,
    pub tenant_id: i64,
    pub tenant_code: String,
    pub environment: Environment,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub success: bool,
    pub objects_found: i32,
    pub objects_new: i32,
    pub objects_modified: i32,
    pub objects_deleted: i32,
    pub error_message: Option<String>,
    pub duration_seconds: f64,
}

impl ScanLogEntry {
    pub fn started(scan_log_id: i64, tenant_id: i64, tenant_code: String, environment: Environment) -> Self {
        Self {
            id: 0,
            scan_log_id,
            tenant_id,
            tenant_code,
            environment,
            started_at: Utc::now(),
            completed_at: None,
            success: false,
            objects_found: 0,
            objects_new: 0,
            objects_modified: 0,
            objects_deleted: 0,
            error_message: None,
            duration_seconds: 0.0,
        }
    }

    pub fn finish_success(&mut self, found: i32, new: i32, modified: i32, deleted: i32) {
        let completed = Utc::now();
        self.duration_seconds = (completed - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.completed_at = Some(completed);
        self.success = true;
        self.objects_found = found;
        self.objects_new = new;
        self.objects_modified = modified;
        self.objects_deleted = deleted;
    }

    pub fn finish_failure(&mut self, error_message: impl Into<String>) {
        let completed = Utc::now();
        self.duration_seconds = (completed - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.completed_at = Some(completed);
        self.success = false;
        self.error_message = Some(error_message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_with_no_errors_is_completed() {
        let mut log = ScanLog::started(ScanTrigger::Manual, None);
        log.total_errors = 0;
        log.finish(true);
        assert_eq!(log.status, ScanStatus::Completed);
    }

    #[test]
    fn finish_with_errors_and_a_success_is_completed_with_errors() {
        let mut log = ScanLog::started(ScanTrigger::Manual, None);
        log.total_errors = 2;
        log.finish(true);
        assert_eq!(log.status, ScanStatus::CompletedWithErrors);
    }

    #[test]
    fn finish_with_errors_and_no_success_is_failed() {
        let mut log = ScanLog::started(ScanTrigger::Manual, None);
        log.total_errors = 3;
        log.finish(false);
        assert_eq!(log.status, ScanStatus::Failed);
    }

    #[test]
    fn cancelled_sets_failed_with_reason() {
        let mut log = ScanLog::started(ScanTrigger::Scheduled, None);
        log.cancelled();
        assert_eq!(log.status, ScanStatus::Failed);
        assert_eq!(log.error_summary.as_deref(), Some("Cancelled"));
    }
}
