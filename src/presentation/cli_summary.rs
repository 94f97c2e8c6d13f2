use colored::*;
use tabled::settings::{object::Columns, Alignment, Modify, Style};
use tabled::{Table, Tabled};

use crate::domain::baseline::Baseline;
use crate::domain::compare::{CompareResult, CompareStatus};
use crate::domain::scan_log::{ScanLog, ScanLogEntry, ScanStatus};

#[derive(Tabled)]
struct EntryRow {
    tenant: String,
    environment: String,
    found: String,
    new: String,
    modified: String,
    deleted: String,
    status: String,
}

#[derive(Tabled)]
struct SummaryRow {
    metric: String,
    value: String,
}

pub fn print_scan_summary(log: &ScanLog, entries: &[ScanLogEntry]) {
    println!();
    println!("{}", "SCAN SUMMARY".bold().cyan());
    println!("Scan log: {}", log.id.to_string().bright_yellow());
    println!();

    if entries.is_empty() {
        println!("{}", "No targets were scanned.".italic());
        return;
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            tenant: e.tenant_code.bold().to_string(),
            environment: e.environment.to_string(),
            found: e.objects_found.to_string(),
            new: e.objects_new.to_string().green().to_string(),
            modified: e.objects_modified.to_string().yellow().to_string(),
            deleted: e.objects_deleted.to_string().red().to_string(),
            status: if e.success {
                "ok".green().to_string()
            } else {
                e.error_message.clone().unwrap_or_else(|| "failed".into()).red().to_string()
            },
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..=5)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let status_label = match log.status {
        ScanStatus::Completed => "Completed".green().to_string(),
        ScanStatus::CompletedWithErrors => "CompletedWithErrors".yellow().to_string(),
        ScanStatus::Failed => "Failed".red().to_string(),
        ScanStatus::Running => "Running".blue().to_string(),
    };

    let summary_rows = vec![
        SummaryRow {
            metric: "Status".into(),
            value: status_label,
        },
        SummaryRow {
            metric: "Objects scanned".into(),
            value: log.total_objects_scanned.to_string(),
        },
        SummaryRow {
            metric: "Changes detected".into(),
            value: log.total_changes_detected.to_string().bold().to_string(),
        },
        SummaryRow {
            metric: "Errors".into(),
            value: log.total_errors.to_string(),
        },
    ];
    let summary_table = Table::new(summary_rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..=1)).with(Alignment::right()))
        .to_string();
    println!();
    println!("{summary_table}");
    println!();
}

#[derive(Tabled)]
struct CompareRow {
    #[tabled(rename = "full name")]
    full_name: String,
    kind: String,
    status: String,
}

/// Prints a coloured table of a compare result. Returns `true` if any
/// divergence was found (so the caller can decide an exit code).
pub fn print_compare_summary(result: &CompareResult) -> bool {
    let diverged: Vec<_> = result.items.iter().filter(|i| i.status != CompareStatus::Equal).collect();

    println!();
    println!("{}", "COMPARE RESULT".bold().cyan());

    if diverged.is_empty() {
        println!("{}", "No differences found.".italic().green());
        println!();
        return false;
    }

    let rows: Vec<CompareRow> = diverged
        .iter()
        .map(|i| CompareRow {
            full_name: i.full_name.bold().to_string(),
            kind: i.kind.to_string(),
            status: match i.status {
                CompareStatus::OnlyInSource => "only in source".yellow().to_string(),
                CompareStatus::OnlyInTarget => "only in target".green().to_string(),
                CompareStatus::Modified => "modified".red().to_string(),
                CompareStatus::Equal => unreachable!("filtered above"),
            },
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
    println!(
        "{} only-in-source, {} only-in-target, {} modified, {} equal",
        result.count(CompareStatus::OnlyInSource).to_string().yellow(),
        result.count(CompareStatus::OnlyInTarget).to_string().green(),
        result.count(CompareStatus::Modified).to_string().red(),
        result.count(CompareStatus::Equal).to_string().dimmed(),
    );
    println!();
    true
}

pub fn print_baseline_summary(baseline: &Baseline) {
    println!();
    println!("{}", "BASELINE CREATED".bold().cyan());
    println!("{}  {}", baseline.name.bold(), baseline.description.clone().unwrap_or_default().dimmed());
    println!(
        "Source: {} / {}",
        baseline.source_tenant_code.blue(),
        baseline.source_environment
    );
    println!("Objects frozen: {}", baseline.total_objects.to_string().bold());
    println!();
}
