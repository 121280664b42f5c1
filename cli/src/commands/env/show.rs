use crate::commands::env::deployed_workloads;
use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use copilot_common::naming;
use serde_json::json;
use tabled::Tabled;

#[derive(clap::Args, Clone)]
pub(crate) struct ShowCommand {
    /// Name of the environment
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

    /// Application and environment
    target: Option<(String, String)>,
}

#[derive(Tabled)]
struct WorkloadRow {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Type")]
    kind: String,
}

impl Runner for ShowRunner {
    async fn ask(&mut self) -> Result<(), Error> {
        let app = self.ctx.app_name(self.command.app.as_deref()).await?;

        let env = match &self.command.name {
            Some(name) => name.clone(),
            None => {
                self.ctx
                    .selector()
                    .environment("Which environment would you like to show?", &app)
                    .await?
            }
        };

        self.target = Some((app, env));
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some((app, name)) = self.target.clone() else {
            return Err(self.error(Some("Environment name is required"), None, None));
        };

        let writer = Writer::new(self.command.json);
        let env = self.ctx.store.get_environment(&app, &name).await?;

        let outputs = self
            .ctx
            .stacks
            .describe(&naming::env_stack(&app, &name))
            .await
            .map_err(|e| self.aws_error("Failed to describe the environment stack", e))?
            .map(|stack| stack.outputs)
            .unwrap_or_default();

        let workloads = deployed_workloads(&self.ctx, &app, &name)
            .await
            .map_err(|e| self.aws_error("Failed to list the deployed workloads", e))?;

        writer.json(json!({
            "environment": env,
            "resources": outputs,
            "workloads": workloads,
        }))?;

        writer.text(&format!(
            "{}\n  Name: {}\n  Region: {}\n  Account: {}\n  Production: {}\n\n",
            console::style("About").bold(),
            env.name,
            env.region,
            env.account_id,
            env.prod,
        ))?;

        if !outputs.is_empty() {
            writer.text(&format!("{}\n", console::style("Resources").bold()))?;

            for (key, value) in &outputs {
                writer.text(&format!("  {key}: {value}\n"))?;
            }

            writer.text("\n")?;
        }

        if workloads.is_empty() {
            return writer.text(&format!(
                "{}\n",
                console::style("No workloads deployed yet").dim()
            ));
        }

        writer.table(
            "Deployed workloads",
            workloads
                .into_iter()
                .map(|w| WorkloadRow {
                    name: w.name,
                    kind: w.kind.to_string(),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::Fakes;
    use copilot_common::model::WorkloadType;

    #[tokio::test]
    async fn shows_deployed_workloads_only() {
        let fakes = Fakes::new();
        fakes.app("shop").await;
        fakes.env("shop", "test").await;
        fakes.workload("shop", "api", WorkloadType::BackendService).await;
        fakes.workload("shop", "web", WorkloadType::LoadBalancedWebService).await;
        fakes.stacks.add("shop-test-api", &[]);
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let workloads = deployed_workloads(&ctx, "shop", "test").await.unwrap();
        assert_eq!(workloads.len(), 1);
        assert_eq!(workloads[0].name, "api");

        let command = ShowCommand {
            name: Some("test".into()),
            app: Some("shop".into()),
            json: true,
        };
        command.runner(&ctx).run().await.unwrap();
    }
}
