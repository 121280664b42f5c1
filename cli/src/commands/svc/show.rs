use crate::commands::workload::{registered, Noun};
use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use copilot_common::manifest::WorkloadManifest;
use copilot_common::model::Workload;
use copilot_common::naming;
use copilot_common::template::workload::SERVICE_URL;
use futures::future::try_join_all;
use serde::Serialize;
use serde_json::json;
use tabled::Tabled;

#[derive(clap::Args, Clone)]
pub(crate) struct ShowCommand {
    /// Name of the service
    #[arg(short, long)]
    name: Option<String>,

    #[arg(short, long)]
    app: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

impl Runnable for ShowCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        ShowRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            target: None,
        }
    }
}

struct ShowRunner {
    command: ShowCommand,
    ctx: Context,

    /// Application and service
    target: Option<(String, String)>,
}

/// The service in one environment
#[derive(Debug, Clone, Serialize, Tabled)]
struct Deployment {
    #[tabled(rename = "Environment")]
    environment: String,

    #[tabled(rename = "Status")]
    status: String,

    #[tabled(rename = "URL")]
    url: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct Variable {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Environment")]
    environment: String,

    #[tabled(rename = "Value")]
    value: String,
}

impl ShowRunner {
    async fn deployments(&self, app: &str, name: &str) -> eyre::Result<Vec<Deployment>> {
        let envs = self.ctx.store.list_environments(app).await?;

        let stacks = envs
            .iter()
            .map(|e| naming::workload_stack(app, &e.name, name))
            .collect::<Vec<_>>();

        let described = try_join_all(stacks.iter().map(|s| self.ctx.stacks.describe(s))).await?;

        Ok(envs
            .into_iter()
            .zip(described)
            .filter_map(|(env, stack)| {
                stack.map(|stack| Deployment {
                    environment: env.name,
                    status: stack.status,
                    url: stack.outputs.get(SERVICE_URL).cloned().unwrap_or_default(),
                })
            })
            .collect())
    }

    /// Variables of the local manifest, per environment the service is deployed to
    fn variables(&self, manifest: &WorkloadManifest, deployments: &[Deployment]) -> Vec<Variable> {
        deployments
            .iter()
            .flat_map(|d| {
                let variables = manifest
                    .apply_env(&d.environment)
                    .map(|m| m.variables)
                    .unwrap_or_default();

                variables.into_iter().map(|(name, value)| Variable {
                    name,
                    environment: d.environment.clone(),
                    value,
                })
            })
            .collect()
    }
}

impl Runner for ShowRunner {
    async fn ask(&mut self) -> Result<(), Error> {
        let app = self.ctx.app_name(self.command.app.as_deref()).await?;

        let name = registered(
            &self.ctx,
            Noun::Service,
            &app,
            self.command.name.as_deref(),
            "Which service would you like to show?",
        )
        .await?;

        self.target = Some((app, name));
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some((app, name)) = self.target.clone() else {
            return Err(self.error(Some("Service name is required"), None, None));
        };

        let writer = Writer::new(self.command.json);
        let Workload { kind, .. } = self.ctx.store.get_workload(&app, &name).await?;

        let deployments = self
            .deployments(&app, &name)
            .await
            .map_err(|e| self.aws_error("Failed to describe the service stacks", e))?;

        let variables = match self.ctx.workspace().and_then(|w| w.read_workload(&name)) {
            Ok(manifest) => self.variables(&manifest, &deployments),
            Err(e) => {
                log::debug!("No local manifest of {name}: {e}");
                vec![]
            }
        };

        writer.json(json!({
            "service": name,
            "type": kind,
            "application": app,
            "deployments": deployments,
            "variables": variables,
        }))?;

        writer.text(&format!(
            "{}\n  Application: {app}\n  Name: {name}\n  Type: {kind}\n\n",
            console::style("About").bold(),
        ))?;

        if deployments.is_empty() {
            return writer.text(&format!(
                "{}\n",
                console::style(format!(
                    "{name} is not deployed yet, run `copilot svc deploy --name {name}`"
                ))
                .dim()
            ));
        }

        writer.table("Deployments", deployments)?;

        if !variables.is_empty() {
            writer.table("Variables", variables)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::Fakes;
    use copilot_common::model::WorkloadType;

    #[tokio::test]
    async fn only_envs_with_a_stack_are_shown() {
        let fakes = Fakes::new();
        fakes.app("shop").await;
        fakes.env("shop", "test").await;
        fakes.env("shop", "prod").await;
        fakes
            .workload("shop", "web", WorkloadType::LoadBalancedWebService)
            .await;
        fakes
            .stacks
            .add("shop-test-web", &[(SERVICE_URL, "http://shop-test.example.com")]);
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let runner = ShowRunner {
            command: ShowCommand {
                name: Some("web".into()),
                app: Some("shop".into()),
                json: true,
            },
            ctx: ctx.clone(),
            target: None,
        };

        let deployments = runner.deployments("shop", "web").await.unwrap();
        assert_eq!(deployments.len(), 1);
        assert_eq!(deployments[0].environment, "test");
        assert_eq!(deployments[0].url, "http://shop-test.example.com");

        let mut runner = runner;
        runner.run().await.unwrap();
    }
}
