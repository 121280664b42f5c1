use crate::commands::env::deployed_workloads;
use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use copilot_common::naming;

#[derive(clap::Args, Clone)]
pub(crate) struct DeleteCommand {
    /// Name of the environment
    #[arg(short, long)]
    name: Option<String>,

    #[arg(short, long)]
    app: Option<String>,

    /// Skip the confirmation
    #[arg(long)]
    yes: bool,
}

impl Runnable for DeleteCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        DeleteRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            target: None,
        }
    }
}

struct DeleteRunner {
    command: DeleteCommand,
    ctx: Context,

    /// Application and environment
    target: Option<(String, String)>,
}

impl Runner for DeleteRunner {
    async fn ask(&mut self) -> Result<(), Error> {
        let app = self.ctx.app_name(self.command.app.as_deref()).await?;

        let env = match &self.command.name {
            Some(name) => name.clone(),
            None => {
                self.ctx
                    .selector()
                    .environment("Which environment would you like to delete?", &app)
                    .await?
            }
        };

        self.target = Some((app, env));
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some((app, env)) = self.target.clone() else {
            return Err(self.error(Some("Environment name is required"), None, None));
        };

        self.ctx.store.get_environment(&app, &env).await?;

        let workloads = deployed_workloads(&self.ctx, &app, &env)
            .await
            .map_err(|e| self.aws_error("Failed to list the deployed workloads", e))?;

        if !workloads.is_empty() {
            let names = workloads
                .iter()
                .map(|w| w.name.as_str())
                .collect::<Vec<_>>();

            return Err(self.error(
                Some("The environment still has workloads deployed"),
                Some(&format!(
                    "Delete {} first, e.g. `copilot svc delete --env {env}`",
                    names.join(", ")
                )),
                None,
            ));
        }

        let confirmed = self.command.yes
            || self.ctx.prompt.confirm(
                &format!("Are you sure you want to delete environment {env} of {app}?"),
                false,
            )?;

        if !confirmed {
            println!("{}", console::style("Deletion canceled").dim().bold());
            return Ok(());
        }

        self.ctx
            .stacks
            .delete(&naming::env_stack(&app, &env))
            .await
            .map_err(|e| self.aws_error("Failed to delete the environment stack", e))?;

        self.ctx.store.delete_environment(&app, &env).await?;

        println!(
            "{} environment {}",
            console::style("Deleted").green().bold(),
            console::style(&env).bold()
        );

        Ok(())
    }
}
