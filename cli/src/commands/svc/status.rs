use crate::aws::ecs::DeploymentStatus;
use crate::commands::workload::{registered, Noun};
use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::stacks;
use crate::writer::Writer;
use copilot_common::naming;
use copilot_common::template::environment::CLUSTER_ID;
use copilot_common::template::workload::{SERVICE_NAME, SERVICE_URL};
use eyre::{eyre, ContextCompat, WrapErr};
use tabled::Tabled;

#[derive(clap::Args, Clone)]
pub(crate) struct StatusCommand {
    /// Name of the service
    #[arg(short, long)]
    name: Option<String>,

    /// Environment the service is deployed to
    #[arg(short, long)]
    env: Option<String>,

    #[arg(short, long)]
    app: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

impl Runnable for StatusCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        StatusRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            target: None,
        }
    }
}

struct StatusRunner {
    command: StatusCommand,
    ctx: Context,

    /// Application, service and environment
    target: Option<(String, String, String)>,
}

#[derive(Tabled)]
struct DeploymentRow {
    #[tabled(rename = "Status")]
    status: String,

    #[tabled(rename = "Rollout")]
    rollout: String,

    #[tabled(rename = "Running")]
    running: String,

    #[tabled(rename = "Task definition")]
    task_definition: String,
}

impl From<DeploymentStatus> for DeploymentRow {
    fn from(deployment: DeploymentStatus) -> Self {
        DeploymentRow {
            status: deployment.status,
            rollout: deployment.rollout,
            running: format!("{}/{}", deployment.running, deployment.desired),
            task_definition: deployment
                .task_definition
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

impl StatusRunner {
    /// Counts and rollouts of the ECS service
    async fn ecs_status(&self, writer: &Writer, app: &str, name: &str, env: &str) -> eyre::Result<()> {
        let stack = naming::workload_stack(app, env, name);

        let service = self
            .ctx
            .stacks
            .outputs(&stack)
            .await
            .wrap_err_with(|| format!("{name} is not deployed to {env}"))?
            .get(SERVICE_NAME)
            .cloned()
            .wrap_err_with(|| format!("Stack {stack} has no {SERVICE_NAME} output"))?;

        let cluster = stacks::env_outputs(&self.ctx, app, env)
            .await?
            .get(CLUSTER_ID)
            .cloned()
            .wrap_err_with(|| format!("Environment {env} has no cluster"))?;

        let status = self.ctx.ecs.service_status(&cluster, &service).await?;

        writer.json(serde_json::to_value(&status).wrap_err("Failed to serialize the status")?)?;

        writer.text(&format!(
            "{}\n  Status: {}\n  Desired: {}\n  Running: {}\n  Pending: {}\n\n",
            console::style("Service").bold(),
            status.status,
            status.desired,
            status.running,
            status.pending,
        ))?;

        writer.table(
            "Deployments",
            status.deployments.into_iter().map(DeploymentRow::from).collect(),
        )?;

        Ok(())
    }

    /// App Runner services are only known through their stack
    async fn stack_status(&self, writer: &Writer, app: &str, name: &str, env: &str) -> eyre::Result<()> {
        let stack = naming::workload_stack(app, env, name);

        let summary = self
            .ctx
            .stacks
            .describe(&stack)
            .await?
            .ok_or_else(|| eyre!("{name} is not deployed to {env}"))?;

        let url = summary.outputs.get(SERVICE_URL).cloned().unwrap_or_default();

        writer.json(serde_json::json!({
            "stack": summary.name,
            "status": summary.status,
            "url": url,
        }))?;

        writer.text(&format!(
            "{}\n  Stack: {}\n  Status: {}\n  URL: {url}\n",
            console::style("Service").bold(),
            summary.name,
            summary.status,
        ))?;

        Ok(())
    }
}

impl Runner for StatusRunner {
    async fn ask(&mut self) -> Result<(), Error> {
        let app = self.ctx.app_name(self.command.app.as_deref()).await?;

        let name = registered(
            &self.ctx,
            Noun::Service,
            &app,
            self.command.name.as_deref(),
            "Which service's status would you like to show?",
        )
        .await?;

        let env = match &self.command.env {
            Some(env) => env.clone(),
            None => {
                self.ctx
                    .selector()
                    .environment(&format!("Which environment of {name}?"), &app)
                    .await?
            }
        };

        self.target = Some((app, name, env));
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some((app, name, env)) = self.target.clone() else {
            return Err(self.error(Some("Service name is required"), None, None));
        };

        let writer = Writer::new(self.command.json);
        let workload = self.ctx.store.get_workload(&app, &name).await?;

        let result = match workload.kind.is_ecs() {
            true => self.ecs_status(&writer, &app, &name, &env).await,
            false => self.stack_status(&writer, &app, &name, &env).await,
        };

        result.map_err(|e| self.aws_error(&format!("Failed to get the status of {name}"), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::ecs::ServiceStatus;
    use crate::fakes::Fakes;
    use copilot_common::model::WorkloadType;

    fn command() -> StatusCommand {
        StatusCommand {
            name: Some("api".into()),
            env: Some("test".into()),
            app: Some("shop".into()),
            json: true,
        }
    }

    #[tokio::test]
    async fn ecs_service_is_looked_up_in_the_env_cluster() {
        let fakes = Fakes::new();
        fakes.app("shop").await;
        fakes.env("shop", "test").await;
        fakes.workload("shop", "api", WorkloadType::BackendService).await;
        fakes.stacks.add("shop-test-api", &[(SERVICE_NAME, "shop-test-api-Service")]);
        fakes.ecs.add_service(
            "shop-test-cluster",
            "shop-test-api-Service",
            ServiceStatus {
                status: "ACTIVE".into(),
                desired: 2,
                running: 2,
                ..Default::default()
            },
        );
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        command().runner(&ctx).run().await.unwrap();
    }

    #[tokio::test]
    async fn undeployed_service_is_an_error() {
        let fakes = Fakes::new();
        fakes.app("shop").await;
        fakes.env("shop", "test").await;
        fakes.workload("shop", "api", WorkloadType::RequestDrivenWebService).await;
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let error = command().runner(&ctx).run().await.unwrap_err();
        assert_eq!(error.message(), "Failed to get the status of api");
        assert!(error.details().unwrap_or_default().contains("not deployed"));
    }

    #[test]
    fn task_definition_is_shortened() {
        let row = DeploymentRow::from(DeploymentStatus {
            status: "PRIMARY".into(),
            task_definition: "arn:aws:ecs:us-west-2:1:task-definition/shop-test-api:3".into(),
            rollout: "COMPLETED".into(),
            desired: 1,
            running: 1,
        });

        assert_eq!(row.task_definition, "shop-test-api:3");
        assert_eq!(row.running, "1/1");
    }
}
