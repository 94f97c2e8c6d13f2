//! # modsync — library usage example
//!
//! Three common patterns for consuming modsync as a Rust library instead of
//! the `modsync` CLI binary:
//!
//! 1. **From a config file** — mirrors what the CLI does internally
//! 2. **Programmatic config** — build `AppConfig` in code, no TOML file needed
//! 3. **Inspect a compare result** — traverse a `CompareResult` for custom logic
//!
//! Run with a config file and a tenant directory file:
//!   cargo run --example scan_as_lib --features cli -- modsync.toml directory.toml
//!
//! Run with the built-in programmatic config (needs a local PostgreSQL):
//!   cargo run --example scan_as_lib --features cli

use anyhow::Result;
use modsync::domain::compare::CompareResult;
use modsync::domain::target::Environment;
use modsync::{AppConfig, QueueConfig, RepositoryConfig, SchedulerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match (args.get(1), args.get(2)) {
        (Some(config_path), Some(directory_path)) => from_config_file(config_path, directory_path).await,
        _ => programmatic_config().await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 1 — load config from a TOML file (same as the CLI does internally)
// ─────────────────────────────────────────────────────────────────────────────
async fn from_config_file(config_path: &str, directory_path: &str) -> Result<()> {
    println!("=== Pattern 1: from config file ({config_path}) ===\n");

    let cfg = AppConfig::load(Some(config_path))?;
    let orchestrator = modsync::build_orchestrator(&cfg, directory_path).await?;
    let log = orchestrator
        .run_full_scan(modsync::domain::scan_log::ScanTrigger::Manual, Some("scan_as_lib".into()), None, false, tokio_util::sync::CancellationToken::new())
        .await?;

    println!(
        "scan {} finished: {} objects scanned, {} changes detected",
        log.id, log.total_objects_scanned, log.total_changes_detected
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 2 — build AppConfig entirely in code, no TOML file required.
// Useful when config comes from env vars, a secrets manager, a database row.
// ─────────────────────────────────────────────────────────────────────────────
async fn programmatic_config() -> Result<()> {
    println!("=== Pattern 2: programmatic config ===\n");

    let cfg = AppConfig {
        repository: RepositoryConfig {
            driver: "postgres".into(),
            host: std::env::var("DB_HOST").unwrap_or_else(|_| "localhost".into()),
            port: 5432,
            dbname: "modsync".into(),
            user: "modsync".into(),
            password: "modsync".into(),
            schema: "public".into(),
        },
        scheduler: SchedulerConfig::default(),
        queue: QueueConfig::default(),
        custom_detection: Default::default(),
    };

    let comparator = modsync::build_comparator(&cfg).await?;
    let result = comparator
        .compare(1, Environment::Staging, 1, Environment::Production, None)
        .await?;

    inspect_result(&result);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 3 — inspect a CompareResult directly for custom logic.
// CompareResult is plain serialisable Rust data — no magic, no callbacks.
// ─────────────────────────────────────────────────────────────────────────────
fn inspect_result(result: &CompareResult) {
    println!("=== Pattern 3: inspecting the compare result ===\n");

    for item in &result.items {
        println!("{:>16}  {}  {}", item.status, item.kind, item.full_name);
    }

    println!();
    println!("only-in-source : {}", result.count(modsync::domain::compare::CompareStatus::OnlyInSource));
    println!("only-in-target : {}", result.count(modsync::domain::compare::CompareStatus::OnlyInTarget));
    println!("modified       : {}", result.count(modsync::domain::compare::CompareStatus::Modified));
    println!("equal          : {}", result.count(modsync::domain::compare::CompareStatus::Equal));

    if result.count(modsync::domain::compare::CompareStatus::OnlyInSource) > 0 {
        eprintln!("note: source has objects target does not — review before promoting.");
    }

    let json = serde_json::to_string_pretty(result).expect("CompareResult is always serialisable");
    println!("\nFull result: {} bytes of JSON", json.len());
}
