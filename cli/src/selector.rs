//! Pick applications, environments and workloads, asking only when there is a choice

use crate::prompt::{Choice, Prompter};
use crate::store::Store;
use crate::workspace::Workspace;
use copilot_common::manifest::WorkloadManifest;
use copilot_common::model::Workload;
use eyre::eyre;

const NO_ENVIRONMENT: &str = "None (run in the default VPC)";
const NO_MORE_ENVIRONMENTS: &str = "[No additional environments]";

/// Pick one of the choices
///
/// Nothing to pick from is an error telling how to create one, a single choice is taken as is.
fn pick(
    prompt: &dyn Prompter,
    message: &str,
    choices: &[Choice],
    noun: &str,
    create_with: &str,
) -> eyre::Result<String> {
    match choices {
        [] => Err(eyre!(
            "No {noun} found, run `copilot {create_with}` to create one"
        )),
        [only] => {
            log::info!("Only one {noun} found, using {}", only.value);
            Ok(only.value.clone())
        }
        _ => prompt.select_one(message, choices),
    }
}

fn workload_choices<'a>(workloads: impl IntoIterator<Item = (&'a str, &'a str)>) -> Vec<Choice> {
    workloads
        .into_iter()
        .map(|(name, kind)| Choice::with_hint(name, kind))
        .collect()
}

/// Selects from the config store
pub(crate) struct Selector<'a> {
    store: &'a Store,
    prompt: &'a dyn Prompter,
}

impl<'a> Selector<'a> {
    pub(crate) fn new(store: &'a Store, prompt: &'a dyn Prompter) -> Self {
        Selector { store, prompt }
    }

    pub(crate) async fn application(&self, message: &str) -> eyre::Result<String> {
        let choices = self
            .store
            .list_applications()
            .await?
            .iter()
            .map(|a| Choice::new(&a.name))
            .collect::<Vec<_>>();

        pick(self.prompt, message, &choices, "application", "app init")
    }

    pub(crate) async fn environment(&self, message: &str, app: &str) -> eyre::Result<String> {
        let choices = self.environment_choices(app).await?;
        pick(self.prompt, message, &choices, "environment", "env init")
    }

    /// Same as [Self::environment] with an extra option of not using any
    pub(crate) async fn environment_or_none(
        &self,
        message: &str,
        app: &str,
    ) -> eyre::Result<Option<String>> {
        let mut choices = self.environment_choices(app).await?;
        choices.push(Choice::new(NO_ENVIRONMENT));

        let env = self.prompt.select_one(message, &choices)?;
        Ok((env != NO_ENVIRONMENT).then_some(env))
    }

    /// Several environments in the order they were picked
    pub(crate) async fn environments(&self, message: &str, app: &str) -> eyre::Result<Vec<String>> {
        let mut remaining = self.environment_choices(app).await?;

        if remaining.is_empty() {
            return Err(eyre!(
                "No environment found, run `copilot env init` to create one"
            ));
        }

        let mut picked = vec![];

        while !remaining.is_empty() {
            let mut choices = remaining.clone();

            if !picked.is_empty() {
                choices.push(Choice::new(NO_MORE_ENVIRONMENTS));
            }

            let env = self.prompt.select_one(message, &choices)?;

            if env == NO_MORE_ENVIRONMENTS {
                break;
            }

            remaining.retain(|c| c.value != env);
            picked.push(env);
        }

        Ok(picked)
    }

    async fn environment_choices(&self, app: &str) -> eyre::Result<Vec<Choice>> {
        Ok(self
            .store
            .list_environments(app)
            .await?
            .iter()
            .map(|e| match e.prod {
                true => Choice::with_hint(&e.name, "prod"),
                false => Choice::new(&e.name),
            })
            .collect())
    }

    pub(crate) async fn service(&self, message: &str, app: &str) -> eyre::Result<String> {
        let services = self.store.list_services(app).await?;
        self.pick_workload(message, &services, "service", "svc init")
    }

    pub(crate) async fn job(&self, message: &str, app: &str) -> eyre::Result<String> {
        let jobs = self.store.list_jobs(app).await?;
        self.pick_workload(message, &jobs, "job", "job init")
    }

    fn pick_workload(
        &self,
        message: &str,
        workloads: &[Workload],
        noun: &str,
        create_with: &str,
    ) -> eyre::Result<String> {
        let choices =
            workload_choices(workloads.iter().map(|w| (w.name.as_str(), w.kind.as_str())));

        pick(self.prompt, message, &choices, noun, create_with)
    }
}

/// Selects from the manifests in the workspace
pub(crate) struct WorkspaceSelector<'a> {
    workspace: &'a Workspace,
    prompt: &'a dyn Prompter,
}

impl<'a> WorkspaceSelector<'a> {
    pub(crate) fn new(workspace: &'a Workspace, prompt: &'a dyn Prompter) -> Self {
        WorkspaceSelector { workspace, prompt }
    }

    pub(crate) fn service(&self, message: &str) -> eyre::Result<String> {
        let services = self.workspace.services()?;
        self.pick(message, &services, "service", "svc init")
    }

    pub(crate) fn job(&self, message: &str) -> eyre::Result<String> {
        let jobs = self.workspace.jobs()?;
        self.pick(message, &jobs, "job", "job init")
    }

    /// Any workload, storage can be attached to both services and jobs
    pub(crate) fn workload(&self, message: &str) -> eyre::Result<String> {
        let workloads = self.workspace.workloads()?;
        self.pick(message, &workloads, "workload", "svc init")
    }

    fn pick(
        &self,
        message: &str,
        manifests: &[WorkloadManifest],
        noun: &str,
        create_with: &str,
    ) -> eyre::Result<String> {
        let choices =
            workload_choices(manifests.iter().map(|m| (m.name.as_str(), m.kind.as_str())));

        pick(self.prompt, message, &choices, noun, create_with)
    }
}
