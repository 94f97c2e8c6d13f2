use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use modsync::domain::baseline::NewBaseline;
use modsync::domain::ports::ScanLogRepository;
use modsync::domain::programmable_object::ObjectKind;
use modsync::domain::scan_log::ScanTrigger;
use modsync::domain::target::Environment;
use modsync::presentation::cli_summary::{print_baseline_summary, print_compare_summary, print_scan_summary};
use modsync::presentation::writers::{all_writers, write_to_file, writer_for};
use modsync::{
    build_baseline_manager, build_comparator, build_orchestrator, connect_repository, init_tracing, AppConfig,
    LogLevel,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "modsync", about = "Tracks programmable database objects across tenants and environments, detecting drift and managing baselines.")]
struct Cli {
    /// Path to the app config file (defaults per the layered loader: ./modsync.toml, ~/.config/modsync/modsync.toml).
    #[arg(short, long)]
    config: Option<String>,

    /// Path to the tenant directory file.
    #[arg(short, long, default_value = "directory.toml")]
    directory: String,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scan. With no flags, scans every tenant and environment.
    Scan {
        #[arg(long)]
        tenant: Option<i64>,
        #[arg(long)]
        environment: Option<String>,
        /// Ignore the tracked-base-objects filter and scan every object found.
        #[arg(long)]
        all: bool,
    },
    /// Compare the latest snapshots of two targets.
    Compare {
        #[arg(long)]
        source_tenant: i64,
        #[arg(long)]
        source_environment: String,
        #[arg(long)]
        target_tenant: i64,
        #[arg(long)]
        target_environment: String,
        /// Restrict to one object kind: P, V, FN, TF, IF.
        #[arg(long)]
        kind: Option<String>,
        /// Write the result to disk using this format ("all" writes every registered writer).
        #[arg(long)]
        format: Option<String>,
        #[arg(long, default_value = "./output")]
        output_dir: String,
    },
    /// Manage immutable baselines.
    Baseline {
        #[command(subcommand)]
        action: BaselineAction,
    },
    /// Run the scheduler and scan-queue worker together until interrupted.
    Serve,
}

#[derive(Subcommand, Debug)]
enum BaselineAction {
    /// Freeze the current non-custom objects of a target under a name.
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        tenant: i64,
        #[arg(long)]
        environment: String,
        #[arg(long)]
        tenant_code: String,
        #[arg(long)]
        tenant_name: String,
    },
    /// List all baselines.
    List,
    /// Compare a frozen baseline against a live target.
    Compare {
        baseline_id: i64,
        #[arg(long)]
        tenant: i64,
        #[arg(long)]
        environment: String,
        /// The live tenant's code, used to match its by-convention custom objects.
        #[arg(long)]
        tenant_code: String,
    },
}

fn parse_environment(s: &str) -> Result<Environment> {
    Environment::from_str_loose(s).ok_or_else(|| anyhow!("unknown environment: {s}"))
}

fn parse_kind(s: &str) -> Result<ObjectKind> {
    ObjectKind::from_code(s).ok_or_else(|| anyhow!("unknown object kind: {s} (expected P, V, FN, TF, or IF)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.as_str() {
        "error" => LogLevel::Error,
        "debug" => LogLevel::Debug,
        _ => LogLevel::Info,
    };
    init_tracing(log_level);

    let cfg = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Scan { tenant, environment, all } => {
            let orchestrator = build_orchestrator(&cfg, &cli.directory).await?;
            let environment = environment.as_deref().map(parse_environment).transpose()?;
            let cancel = CancellationToken::new();

            let log = match tenant {
                Some(tenant_id) => {
                    orchestrator
                        .run_single_scan(tenant_id, environment, ScanTrigger::Manual, Some("cli".into()), all, cancel)
                        .await?
                }
                None => {
                    orchestrator
                        .run_full_scan(ScanTrigger::Manual, Some("cli".into()), None, all, cancel)
                        .await?
                }
            };

            let repository = connect_repository(&cfg.repository).await?;
            let entries = repository.list_scan_entries(log.id).await?;
            print_scan_summary(&log, &entries);
        }
        Command::Compare {
            source_tenant,
            source_environment,
            target_tenant,
            target_environment,
            kind,
            format,
            output_dir,
        } => {
            let comparator = build_comparator(&cfg).await?;
            let source_environment = parse_environment(&source_environment)?;
            let target_environment = parse_environment(&target_environment)?;
            let kind_filter = kind.as_deref().map(parse_kind).transpose()?;

            let result = comparator
                .compare(source_tenant, source_environment, target_tenant, target_environment, kind_filter)
                .await?;

            let diverged = print_compare_summary(&result);

            if let Some(format) = format {
                let stem = format!(
                    "{}-{}_vs_{}-{}",
                    source_tenant, source_environment, target_tenant, target_environment
                );
                match format.as_str() {
                    "all" => {
                        for writer in all_writers() {
                            write_to_file(&*writer, &result, &output_dir, &stem)?;
                        }
                    }
                    fmt => {
                        let writer = writer_for(fmt).ok_or_else(|| anyhow!("unknown format: {fmt}"))?;
                        write_to_file(&*writer, &result, &output_dir, &stem)?;
                    }
                }
                println!("Compare result written to {output_dir}");
            }

            if diverged {
                std::process::exit(1);
            }
        }
        Command::Baseline { action } => match action {
            BaselineAction::Create {
                name,
                description,
                tenant,
                environment,
                tenant_code,
                tenant_name,
            } => {
                let manager = build_baseline_manager(&cfg).await?;
                let environment = parse_environment(&environment)?;
                let meta = NewBaseline {
                    name,
                    description,
                    source_tenant_id: tenant,
                    source_tenant_name: tenant_name,
                    source_tenant_code: tenant_code,
                    source_environment: environment,
                    created_by: Some("cli".into()),
                };
                let (id, count) = manager.create(meta, tenant, environment).await?;
                let baseline = manager
                    .get(id)
                    .await?
                    .ok_or_else(|| anyhow!("baseline {id} vanished right after creation"))?;
                println!("Baseline {id} created with {count} objects.");
                print_baseline_summary(&baseline);
            }
            BaselineAction::List => {
                let manager = build_baseline_manager(&cfg).await?;
                for baseline in manager.list().await? {
                    print_baseline_summary(&baseline);
                }
            }
            BaselineAction::Compare { baseline_id, tenant, environment, tenant_code } => {
                let manager = build_baseline_manager(&cfg).await?;
                let environment = parse_environment(&environment)?;
                let result = manager
                    .compare_against_live(
                        baseline_id,
                        tenant,
                        environment,
                        &Default::default(),
                        &tenant_code,
                        cfg.custom_detection.by_convention,
                    )
                    .await?;
                print_compare_summary(&result);
            }
        },
        Command::Serve => {
            let orchestrator = std::sync::Arc::new(build_orchestrator(&cfg, &cli.directory).await?);
            let (queue, receiver) = modsync::ScanQueue::bounded(cfg.queue.capacity);
            let cancel = CancellationToken::new();

            let scheduler_cancel = cancel.clone();
            let scheduler_queue = queue.clone();
            let interval = std::time::Duration::from_secs(cfg.scheduler.interval_minutes * 60);
            let run_on_startup = cfg.scheduler.run_on_startup;
            let scheduler_handle =
                tokio::spawn(modsync::run_scheduler(interval, run_on_startup, scheduler_queue, scheduler_cancel));

            let worker_cancel = cancel.clone();
            let worker_handle = tokio::spawn(modsync::run_worker(receiver, orchestrator, worker_cancel));

            tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
            tracing::info!("shutting down");
            cancel.cancel();
            let _ = tokio::join!(scheduler_handle, worker_handle);
        }
    }

    Ok(())
}
