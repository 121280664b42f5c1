use crate::commands::pipeline::app_pipelines;
use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use serde_json::json;
use tabled::Tabled;

#[derive(clap::Args, Clone)]
pub(crate) struct ShowCommand {
    /// Name of the application
    #[arg(short, long)]
    name: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

impl Runnable for ShowCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        ShowRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            name: None,
        }
    }
}

struct ShowRunner {
    command: ShowCommand,
    ctx: Context,
    name: Option<String>,
}

#[derive(Tabled)]
struct EnvRow {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Region")]
    region: String,

    #[tabled(rename = "Account")]
    account: String,
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
        self.name = Some(self.ctx.app_name(self.command.name.as_deref()).await?);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some(name) = self.name.clone() else {
            return Err(self.error(Some("Application name is required"), None, None));
        };

        let writer = Writer::new(self.command.json);
        let app = self.ctx.store.get_application(&name).await?;
        let envs = self.ctx.store.list_environments(&name).await?;
        let workloads = self.ctx.store.list_workloads(&name).await?;

        let pipelines = app_pipelines(&self.ctx, &name)
            .await
            .map_err(|e| self.aws_error("Failed to list the pipelines", e))?;

        writer.json(json!({
            "name": app.name,
            "account": app.account_id,
            "domain": app.domain,
            "environments": envs,
            "workloads": workloads,
            "pipelines": pipelines.iter().map(|p| &p.name).collect::<Vec<_>>(),
        }))?;

        writer.text(&format!(
            "{}\n  Name: {}\n  Account: {}\n{}\n",
            console::style("About").bold(),
            app.name,
            app.account_id,
            app.domain
                .map(|d| format!("  Domain: {d}\n"))
                .unwrap_or_default(),
        ))?;

        writer.table(
            "Environments",
            envs.into_iter()
                .map(|e| EnvRow {
                    name: e.name,
                    region: e.region,
                    account: e.account_id,
                })
                .collect(),
        )?;

        writer.table(
            "Workloads",
            workloads
                .into_iter()
                .map(|w| WorkloadRow {
                    name: w.name,
                    kind: w.kind.to_string(),
                })
                .collect(),
        )?;

        if !pipelines.is_empty() {
            writer.text(&format!("{}\n", console::style("Pipelines").bold()))?;

            for pipeline in pipelines {
                writer.text(&format!("  {}\n", pipeline.name))?;
            }
        }

        Ok(())
    }
}
