use super::deployed_pipeline;
use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use copilot_common::validate;

#[derive(clap::Args, Clone)]
pub(crate) struct DeleteCommand {
    /// Name of the pipeline
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
            name: None,
            confirmed: false,
        }
    }
}

struct DeleteRunner {
    command: DeleteCommand,
    ctx: Context,

    /// Stack of the pipeline
    name: Option<String>,
    confirmed: bool,
}

impl Runner for DeleteRunner {
    async fn validate(&mut self) -> Result<(), Error> {
        if let Some(name) = &self.command.name {
            validate::pipeline_name(name).map_err(|e| {
                self.error(Some("Invalid pipeline name"), Some(&e.to_string()), None)
            })?;
        }

        Ok(())
    }

    async fn ask(&mut self) -> Result<(), Error> {
        let app = self.ctx.app_name(self.command.app.as_deref()).await?;
        let name = deployed_pipeline(&self.ctx, &app, self.command.name.as_deref()).await?;

        self.confirmed = self.command.yes
            || self.ctx.prompt.confirm(
                &format!("Are you sure you want to delete pipeline {name} from application {app}?"),
                false,
            )?;

        self.name = Some(name);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some(name) = self.name.clone() else {
            return Err(self.error(Some("Pipeline name is required"), None, None));
        };

        if !self.confirmed {
            println!("{}", console::style("Cancelled").yellow());
            return Ok(());
        }

        self.ctx
            .stacks
            .delete(&name)
            .await
            .map_err(|e| self.aws_error(&format!("Failed to delete pipeline {name}"), e))?;

        println!("{} {name}", console::style("Deleted pipeline").green().bold());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Answer, Fakes};

    #[tokio::test]
    async fn deletes_the_pipeline_stack() {
        let fakes = Fakes::new();
        fakes.stacks.add("pipeline-shop-release", &[]);
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let command = DeleteCommand {
            name: Some("release".into()),
            app: Some("shop".into()),
            yes: true,
        };
        command.runner(&ctx).run().await.unwrap();

        assert_eq!(fakes.stacks.deleted(), vec!["pipeline-shop-release"]);
    }

    #[tokio::test]
    async fn declined_confirmation_keeps_the_stack() {
        let fakes = Fakes::new();
        fakes.stacks.add("pipeline-shop-release", &[]);
        fakes.prompt.answer(Answer::Yes(false));
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let command = DeleteCommand {
            name: Some("release".into()),
            app: Some("shop".into()),
            yes: false,
        };
        command.runner(&ctx).run().await.unwrap();

        assert!(fakes.stacks.deleted().is_empty());
        assert!(fakes.stacks.exists("pipeline-shop-release"));
    }
}
