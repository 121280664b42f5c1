use crate::commands::workload::{registered, Noun};
use crate::context::Context;
use crate::error::Error;
use crate::runner::Runner;
use copilot_common::{naming, validate};

/// Flags of `svc delete` and `job delete`
#[derive(Debug, Clone, Default)]
pub(crate) struct DeleteInput {
    pub(crate) name: Option<String>,
    pub(crate) app: Option<String>,

    /// Only remove the workload from this environment
    pub(crate) env: Option<String>,

    pub(crate) yes: bool,
}

pub(crate) struct DeleteRunner {
    noun: Noun,
    input: DeleteInput,
    ctx: Context,

    /// Application and workload
    target: Option<(String, String)>,
    confirmed: bool,
}

impl DeleteRunner {
    pub(crate) fn new(noun: Noun, input: DeleteInput, ctx: &Context) -> Self {
        DeleteRunner {
            noun,
            input,
            ctx: ctx.clone(),
            target: None,
            confirmed: false,
        }
    }
}

impl Runner for DeleteRunner {
    async fn validate(&mut self) -> Result<(), Error> {
        if let Some(name) = &self.input.name {
            validate::workload_name(name).map_err(|e| {
                self.error(
                    Some(&format!("Invalid {} name", self.noun.as_str())),
                    Some(&e.to_string()),
                    None,
                )
            })?;
        }

        if let Some(env) = &self.input.env {
            validate::env_name(env).map_err(|e| {
                self.error(Some("Invalid environment name"), Some(&e.to_string()), None)
            })?;
        }

        Ok(())
    }

    async fn ask(&mut self) -> Result<(), Error> {
        let app = self.ctx.app_name(self.input.app.as_deref()).await?;

        let name = registered(
            &self.ctx,
            self.noun,
            &app,
            self.input.name.as_deref(),
            &format!("Which {} would you like to delete?", self.noun.as_str()),
        )
        .await?;

        let question = match &self.input.env {
            Some(env) => format!("Are you sure you want to delete {name} from environment {env}?"),
            None => format!("Are you sure you want to delete {name} from application {app}?"),
        };

        self.confirmed = self.input.yes || self.ctx.prompt.confirm(&question, false)?;
        self.target = Some((app, name));
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some((app, name)) = self.target.clone() else {
            return Err(self.error(Some("Nothing to delete"), None, None));
        };

        if !self.confirmed {
            println!("{}", console::style("Deletion canceled").dim().bold());
            return Ok(());
        }

        let workload = self.ctx.store.get_workload(&app, &name).await?;

        if !self.noun.matches(workload.kind) {
            return Err(self.error(
                Some(&format!("{name} is not a {}", self.noun.as_str())),
                Some(&format!("It is a {}", workload.kind)),
                None,
            ));
        }

        let envs = match &self.input.env {
            Some(env) => vec![self.ctx.store.get_environment(&app, env).await?.name],
            None => self
                .ctx
                .store
                .list_environments(&app)
                .await?
                .into_iter()
                .map(|e| e.name)
                .collect(),
        };

        for env in &envs {
            self.ctx
                .stacks
                .delete(&naming::workload_stack(&app, env, &name))
                .await
                .map_err(|e| self.aws_error(&format!("Failed to delete {name} from {env}"), e))?;

            println!(
                "{} {} {}",
                console::style("Deleted").green().bold(),
                console::style(&name).bold(),
                console::style(format!("from {env}")).dim()
            );
        }

        // Removed from a single environment, the workload stays registered
        if self.input.env.is_some() {
            return Ok(());
        }

        self.ctx
            .registry
            .delete_repository(&naming::repository(&app, &name))
            .await
            .map_err(|e| self.aws_error("Failed to delete the image repository", e))?;

        self.ctx.store.delete_workload(&app, &name).await?;

        println!(
            "{} {} {}",
            console::style("Deleted").green().bold(),
            console::style(&name).bold(),
            console::style(format!("from application {app}")).dim()
        );

        Ok(())
    }
}
