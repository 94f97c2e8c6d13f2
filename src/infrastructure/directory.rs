use std::collections::BTreeSet;

use async_trait::async_trait;
use config::Config;
use serde::Deserialize;

use crate::domain::error::ScanError;
use crate::domain::ports::{EnvironmentConfig, TenantDirectory, TenantInfo, TrackedObject};
use crate::domain::target::Environment;

/// Tenant/environment identity is explicitly out of scope for this engine's
/// own persistence: it only consumes whatever directory an
/// operator already has. This adapter reads that directory from a static
/// file using the same layered-config loader the repository/scheduler
/// settings use, rather than inventing an identity schema of our own.
#[derive(Debug, Clone, Deserialize)]
struct EnvironmentFile {
    driver: String,
    host: String,
    port: u16,
    database: String,
    user: String,
    encrypted_password: String,
    #[serde(default = "default_schema")]
    schema: String,
}

fn default_schema() -> String {
    "public".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct TenantFile {
    id: i64,
    code: String,
    name: String,
    #[serde(default)]
    development: Option<EnvironmentFile>,
    #[serde(default)]
    staging: Option<EnvironmentFile>,
    #[serde(default)]
    production: Option<EnvironmentFile>,
    #[serde(default)]
    custom_registry: BTreeSet<String>,
}

impl TenantFile {
    fn environment(&self, environment: Environment) -> Option<&EnvironmentFile> {
        match environment {
            Environment::Development => self.development.as_ref(),
            Environment::Staging => self.staging.as_ref(),
            Environment::Production => self.production.as_ref(),
        }
    }

    fn environments(&self) -> Vec<Environment> {
        [
            (Environment::Development, &self.development),
            (Environment::Staging, &self.staging),
            (Environment::Production, &self.production),
        ]
        .into_iter()
        .filter_map(|(env, cfg)| cfg.as_ref().map(|_| env))
        .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TrackedObjectFile {
    tenant_id: Option<i64>,
    full_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    tenants: Vec<TenantFile>,
    #[serde(default)]
    tracked_base_objects: Vec<TrackedObjectFile>,
}

#[derive(Debug, Clone)]
pub struct ConfigTenantDirectory {
    file: DirectoryFile,
}

impl ConfigTenantDirectory {
    pub fn load(path: &str) -> Result<Self, ScanError> {
        let file = Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .map_err(|e| ScanError::Configuration(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ScanError::Configuration(e.to_string()))?;
        Ok(Self { file })
    }

    fn find(&self, tenant_id: i64) -> Option<&TenantFile> {
        self.file.tenants.iter().find(|t| t.id == tenant_id)
    }
}

#[async_trait]
impl TenantDirectory for ConfigTenantDirectory {
    async fn list_tenants(&self) -> Result<Vec<TenantInfo>, ScanError> {
        Ok(self
            .file
            .tenants
            .iter()
            .map(|t| TenantInfo {
                id: t.id,
                code: t.code.clone(),
                name: t.name.clone(),
                environments: t.environments(),
            })
            .collect())
    }

    async fn environment_config(
        &self,
        tenant_id: i64,
        environment: Environment,
    ) -> Result<Option<EnvironmentConfig>, ScanError> {
        Ok(self.find(tenant_id).and_then(|t| t.environment(environment)).map(|e| EnvironmentConfig {
            driver: e.driver.clone(),
            host: e.host.clone(),
            port: e.port,
            database: e.database.clone(),
            user: e.user.clone(),
            encrypted_password: e.encrypted_password.clone(),
            schema: e.schema.clone(),
        }))
    }

    async fn custom_registry(&self, tenant_id: i64) -> Result<BTreeSet<String>, ScanError> {
        Ok(self.find(tenant_id).map(|t| t.custom_registry.clone()).unwrap_or_default())
    }

    async fn tracked_base_objects(&self) -> Result<Vec<TrackedObject>, ScanError> {
        Ok(self
            .file
            .tracked_base_objects
            .iter()
            .map(|t| TrackedObject {
                tenant_id: t.tenant_id,
                full_name: t.full_name.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_file() -> EnvironmentFile {
        EnvironmentFile {
            driver: "postgres".into(),
            host: "localhost".into(),
            port: 5432,
            database: "acme_dev".into(),
            user: "svc".into(),
            encrypted_password: "plain:hunter2".into(),
            schema: "public".into(),
        }
    }

    #[tokio::test]
    async fn environments_lists_only_configured_slots() {
        let tenant = TenantFile {
            id: 1,
            code: "ACME".into(),
            name: "Acme".into(),
            development: Some(env_file()),
            staging: None,
            production: Some(env_file()),
            custom_registry: BTreeSet::new(),
        };
        assert_eq!(tenant.environments(), vec![Environment::Development, Environment::Production]);
    }

    #[tokio::test]
    async fn unknown_tenant_returns_none() {
        let directory = ConfigTenantDirectory {
            file: DirectoryFile::default(),
        };
        assert!(directory.environment_config(99, Environment::Production).await.unwrap().is_none());
        assert!(directory.custom_registry(99).await.unwrap().is_empty());
    }
}
