use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::any::AnyPoolOptions;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────

/// Controls the verbosity of this engine's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

/// Initialise the global `tracing` subscriber. Respects `RUST_LOG` when set,
/// falling back to `level` otherwise.
///
/// Call this **once** at application startup. Library consumers who manage
/// their own subscriber should skip this and configure tracing themselves.
/// Only available when the `cli` feature is enabled (pulls in
/// `tracing-subscriber`).
#[cfg(feature = "cli")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let default_filter = match level {
        LogLevel::Error => "modsync=error",
        LogLevel::Info => "modsync=info",
        LogLevel::Debug => "modsync=debug",
    };

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

// ─── Public API facade ─────────────────────────────────────────────────────

pub use application::baseline_manager::BaselineManager;
pub use application::comparator::Comparator;
pub use application::orchestrator::{Orchestrator, OrchestratorConfig};
pub use application::queue::{run_worker, ScanQueue, ScanQueueReceiver, ScanRequest, DEFAULT_QUEUE_CAPACITY};
pub use application::scheduler::run_scheduler;
pub use domain::baseline::NewBaseline;
pub use domain::compare::CompareResult;
pub use domain::error::ScanError;
pub use domain::scan_log::{ScanLog, ScanTrigger};
pub use domain::target::Environment;
pub use infrastructure::config::{AppConfig, QueueConfig, RepositoryConfig, SchedulerConfig};

use domain::change::DefaultChangeDetector;
use domain::ports::{CredentialDecryptor, Repository, ScanLogRepository, ScanNotifier, TenantDirectory};
use infrastructure::db::SqlxRepository;
use infrastructure::decrypt::PassthroughDecryptor;
use infrastructure::directory::ConfigTenantDirectory;
use infrastructure::extractor::SqlxObjectExtractor;
use infrastructure::notifier::LoggingNotifier;

/// Opens the Central Repository's connection pool and runs `ensure_schema`.
pub async fn connect_repository(cfg: &RepositoryConfig) -> Result<Arc<dyn Repository>> {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.url())
        .await
        .context("failed to connect to the central repository")?;
    let repository: Arc<dyn Repository> = Arc::new(SqlxRepository::new(pool));
    repository.ensure_schema().await.context("failed to ensure repository schema")?;
    Ok(repository)
}

/// Wires up an [`Orchestrator`] from application configuration and a tenant
/// directory file. Credential decryption and scan notification use the
/// bundled minimal adapters ([`PassthroughDecryptor`], [`LoggingNotifier`]);
/// deployments with real secrets-at-rest or delivery requirements should
/// construct `Orchestrator::new` directly with their own.
pub async fn build_orchestrator(cfg: &AppConfig, directory_path: &str) -> Result<Orchestrator> {
    let repository = connect_repository(&cfg.repository).await?;
    let directory: Arc<dyn TenantDirectory> = Arc::new(
        ConfigTenantDirectory::load(directory_path).context("failed to load tenant directory")?,
    );
    let extractor = Arc::new(application::instrumentation::InstrumentedExtractor::new(Arc::new(
        SqlxObjectExtractor,
    )));
    let decryptor: Arc<dyn CredentialDecryptor> = Arc::new(PassthroughDecryptor);
    let notifier: Arc<dyn ScanNotifier> = Arc::new(LoggingNotifier);

    let config = OrchestratorConfig {
        max_parallel_tenants: cfg.scheduler.max_parallel_tenants,
        connection_timeout: Duration::from_secs(cfg.scheduler.connection_timeout_seconds),
        custom_by_convention: cfg.custom_detection.by_convention,
    };

    Ok(Orchestrator::new(
        extractor,
        repository,
        Arc::new(DefaultChangeDetector),
        decryptor,
        notifier,
        directory,
        config,
    ))
}

/// Builds a [`Comparator`] sharing the same repository connection an
/// [`Orchestrator`] built from the same config would use.
pub async fn build_comparator(cfg: &AppConfig) -> Result<Comparator> {
    let repository = connect_repository(&cfg.repository).await?;
    Ok(Comparator::new(repository))
}

/// Builds a [`BaselineManager`] sharing the same repository connection an
/// [`Orchestrator`] built from the same config would use.
pub async fn build_baseline_manager(cfg: &AppConfig) -> Result<BaselineManager> {
    let repository = connect_repository(&cfg.repository).await?;
    Ok(BaselineManager::new(repository.clone(), repository))
}
