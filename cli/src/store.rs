//! Config store of applications, environments and workloads
//!
//! Every entry is a JSON document in an SSM parameter, at the paths defined in [naming].

use crate::aws::ssm::Parameters;
use copilot_common::model::{Application, Environment, Workload};
use copilot_common::naming;
use eyre::WrapErr;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lookups of entries which are not in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StoreError {
    ApplicationNotFound(String),
    EnvironmentNotFound { app: String, env: String },
    WorkloadNotFound { app: String, name: String },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StoreError::ApplicationNotFound(app) => {
                write!(f, "Application {app} not found")
            }
            StoreError::EnvironmentNotFound { app, env } => {
                write!(f, "Environment {env} not found in application {app}")
            }
            StoreError::WorkloadNotFound { app, name } => {
                write!(f, "Workload {name} not found in application {app}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Clone)]
pub(crate) struct Store {
    parameters: Arc<dyn Parameters>,
}

impl Store {
    pub(crate) fn new(parameters: Arc<dyn Parameters>) -> Self {
        Store { parameters }
    }

    /// Create is idempotent, an existing entry is left untouched
    async fn create<T: Serialize>(
        &self,
        path: &str,
        value: &T,
        tags: BTreeMap<String, String>,
    ) -> eyre::Result<()> {
        let json = serde_json::to_string(value).wrap_err("Failed to serialize store entry")?;

        if !self.parameters.create(path, &json, &tags).await? {
            log::info!("{path} already exists in the store");
        }

        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> eyre::Result<Option<T>> {
        self.parameters
            .get(path)
            .await?
            .map(|json| {
                serde_json::from_str(&json)
                    .wrap_err_with(|| format!("Malformed store entry at {path}"))
            })
            .transpose()
    }

    async fn list<T: DeserializeOwned>(&self, path: &str) -> eyre::Result<Vec<T>> {
        self.parameters
            .list(path)
            .await?
            .iter()
            .map(|json| {
                serde_json::from_str(json)
                    .wrap_err_with(|| format!("Malformed store entry under {path}"))
            })
            .collect()
    }

    pub(crate) async fn create_application(&self, app: &Application) -> eyre::Result<()> {
        let tags = BTreeMap::from([(naming::TAG_APP.to_string(), app.name.clone())]);
        self.create(&naming::application_path(&app.name), app, tags)
            .await
    }

    pub(crate) async fn get_application(&self, name: &str) -> eyre::Result<Application> {
        self.get(&naming::application_path(name))
            .await?
            .ok_or_else(|| StoreError::ApplicationNotFound(name.to_string()).into())
    }

    pub(crate) async fn list_applications(&self) -> eyre::Result<Vec<Application>> {
        let mut apps: Vec<Application> = self.list(&naming::applications_path()).await?;
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(apps)
    }

    pub(crate) async fn delete_application(&self, name: &str) -> eyre::Result<()> {
        self.parameters
            .delete(&naming::application_path(name))
            .await
    }

    pub(crate) async fn create_environment(&self, env: &Environment) -> eyre::Result<()> {
        self.get_application(&env.app).await?;

        let tags = BTreeMap::from([
            (naming::TAG_APP.to_string(), env.app.clone()),
            (naming::TAG_ENV.to_string(), env.name.clone()),
        ]);

        self.create(&naming::environment_path(&env.app, &env.name), env, tags)
            .await
    }

    pub(crate) async fn get_environment(&self, app: &str, name: &str) -> eyre::Result<Environment> {
        self.get(&naming::environment_path(app, name))
            .await?
            .ok_or_else(|| {
                StoreError::EnvironmentNotFound {
                    app: app.to_string(),
                    env: name.to_string(),
                }
                .into()
            })
    }

    pub(crate) async fn list_environments(&self, app: &str) -> eyre::Result<Vec<Environment>> {
        let mut envs: Vec<Environment> = self.list(&naming::environments_path(app)).await?;
        envs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(envs)
    }

    pub(crate) async fn delete_environment(&self, app: &str, name: &str) -> eyre::Result<()> {
        self.parameters
            .delete(&naming::environment_path(app, name))
            .await
    }

    pub(crate) async fn create_workload(&self, workload: &Workload) -> eyre::Result<()> {
        self.get_application(&workload.app).await?;

        let tags = BTreeMap::from([
            (naming::TAG_APP.to_string(), workload.app.clone()),
            (naming::TAG_SERVICE.to_string(), workload.name.clone()),
        ]);

        self.create(
            &naming::workload_path(&workload.app, &workload.name),
            workload,
            tags,
        )
        .await
    }

    pub(crate) async fn get_workload(&self, app: &str, name: &str) -> eyre::Result<Workload> {
        self.get(&naming::workload_path(app, name))
            .await?
            .ok_or_else(|| {
                StoreError::WorkloadNotFound {
                    app: app.to_string(),
                    name: name.to_string(),
                }
                .into()
            })
    }

    pub(crate) async fn list_workloads(&self, app: &str) -> eyre::Result<Vec<Workload>> {
        let mut workloads: Vec<Workload> = self.list(&naming::workloads_path(app)).await?;
        workloads.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(workloads)
    }

    pub(crate) async fn list_services(&self, app: &str) -> eyre::Result<Vec<Workload>> {
        let mut workloads = self.list_workloads(app).await?;
        workloads.retain(|w| w.kind.is_service());
        Ok(workloads)
    }

    pub(crate) async fn list_jobs(&self, app: &str) -> eyre::Result<Vec<Workload>> {
        let mut workloads = self.list_workloads(app).await?;
        workloads.retain(|w| w.kind.is_job());
        Ok(workloads)
    }

    pub(crate) async fn delete_workload(&self, app: &str, name: &str) -> eyre::Result<()> {
        self.parameters
            .delete(&naming::workload_path(app, name))
            .await
    }
}
