use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use eyre::WrapErr;
use tabled::Tabled;

#[derive(clap::Args, Clone)]
pub(crate) struct LsCommand {
    /// Application to list the environments of
    #[arg(short, long)]
    app: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

impl Runnable for LsCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        LsRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            app: None,
        }
    }
}

struct LsRunner {
    command: LsCommand,
    ctx: Context,
    app: Option<String>,
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Region")]
    region: String,

    #[tabled(rename = "Account")]
    account: String,

    #[tabled(rename = "Production")]
    prod: bool,
}

impl Runner for LsRunner {
    async fn ask(&mut self) -> Result<(), Error> {
        self.app = Some(self.ctx.app_name(self.command.app.as_deref()).await?);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some(app) = self.app.clone() else {
            return Err(self.error(Some("Application name is required"), None, None));
        };

        let writer = Writer::new(self.command.json);
        let envs = self.ctx.store.list_environments(&app).await?;

        writer.json(serde_json::to_value(&envs).wrap_err("Failed to serialize environments")?)?;

        if envs.is_empty() {
            return writer.text(&format!(
                "{}\n",
                console::style("No environments found, run `copilot env init` to create one")
                    .yellow()
            ));
        }

        writer.table(
            &format!("Environments of {app}"),
            envs.into_iter()
                .map(|e| Row {
                    name: e.name,
                    region: e.region,
                    account: e.account_id,
                    prod: e.prod,
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::Fakes;

    #[tokio::test]
    async fn missing_app_is_an_error() {
        let fakes = Fakes::new();
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));
        let command = LsCommand {
            app: None,
            json: false,
        };

        let error = command.runner(&ctx).run().await.unwrap_err();
        assert!(error.message().contains("copilot app init"));
    }

    #[tokio::test]
    async fn lists_envs_of_the_app() {
        let fakes = Fakes::new();
        fakes.app("shop").await;
        fakes.env("shop", "test").await;
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));
        let command = LsCommand {
            app: None,
            json: true,
        };

        command.runner(&ctx).run().await.unwrap();
    }
}
