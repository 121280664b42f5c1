use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use eyre::WrapErr;
use tabled::Tabled;

#[derive(clap::Args, Clone)]
pub(crate) struct LsCommand {
    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

impl Runnable for LsCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        LsRunner {
            command: self.clone(),
            ctx: ctx.clone(),
        }
    }
}

struct LsRunner {
    command: LsCommand,
    ctx: Context,
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Account")]
    account: String,

    #[tabled(rename = "Domain")]
    domain: String,
}

impl Runner for LsRunner {
    async fn execute(&mut self) -> Result<(), Error> {
        let writer = Writer::new(self.command.json);

        let apps = self
            .ctx
            .store
            .list_applications()
            .await
            .map_err(|e| self.aws_error("Failed to list applications", e))?;

        writer.json(serde_json::to_value(&apps).wrap_err("Failed to serialize applications")?)?;

        if apps.is_empty() {
            return writer.text(&format!(
                "{}\n",
                console::style("No applications found, run `copilot app init` to create one")
                    .yellow()
            ));
        }

        writer.table(
            "Applications",
            apps.into_iter()
                .map(|app| Row {
                    name: app.name,
                    account: app.account_id,
                    domain: app.domain.unwrap_or_default(),
                })
                .collect(),
        )
    }
}
