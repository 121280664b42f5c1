use crate::aws::cloudformation::StackInput;
use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::stacks;
use crate::workspace::Workspace;
use copilot_common::model::Application;
use copilot_common::template::application::application;
use copilot_common::{naming, validate};
use std::collections::BTreeMap;

#[derive(clap::Args, Clone)]
pub(crate) struct InitCommand {
    /// Name of the application, e.g. "shop"
    #[arg()]
    name: Option<String>,

    /// Domain name registered in Route 53, kept with the application
    #[arg(long)]
    domain: Option<String>,

    /// Tags applied to the application resources, e.g. --tag team=payments
    #[arg(long = "tag", value_name = "KEY=VALUE")]
    tags: Vec<String>,
}

impl Runnable for InitCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        InitRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            name: None,
            tags: BTreeMap::new(),
        }
    }
}

struct InitRunner {
    command: InitCommand,
    ctx: Context,
    name: Option<String>,
    tags: BTreeMap<String, String>,
}

impl InitRunner {
    /// Application of the workspace the command runs in, if any
    fn workspace_app(&self) -> Option<String> {
        self.ctx
            .workspace()
            .and_then(|w| w.summary())
            .map(|s| s.application)
            .ok()
    }
}

impl Runner for InitRunner {
    async fn validate(&mut self) -> Result<(), Error> {
        if let Some(name) = &self.command.name {
            validate::app_name(name).map_err(|e| {
                self.error(Some("Invalid application name"), Some(&e.to_string()), None)
            })?;

            if let Some(existing) = self.workspace_app().filter(|app| app != name) {
                return Err(self.error(
                    Some("The workspace belongs to another application"),
                    Some(&format!(
                        "This directory is registered with application {existing}, \
                         run `copilot app init` from a different directory"
                    )),
                    None,
                ));
            }
        }

        for tag in &self.command.tags {
            let (key, value) = validate::key_value(tag)
                .map_err(|e| self.error(Some("Invalid tag"), Some(&e.to_string()), None))?;

            self.tags.insert(key, value);
        }

        Ok(())
    }

    async fn ask(&mut self) -> Result<(), Error> {
        if let Some(name) = &self.command.name {
            self.name = Some(name.clone());
            return Ok(());
        }

        if let Some(existing) = self.workspace_app() {
            log::info!("Using application {existing} of the current workspace");
            self.name = Some(existing);
            return Ok(());
        }

        let name = self.ctx.prompt.get(
            "What would you like to name your application?",
            None,
            &validate::app_name,
        )?;

        self.name = Some(name);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some(name) = self.name.clone() else {
            return Err(self.error(Some("Application name is required"), None, None));
        };

        let account_id = self
            .ctx
            .identity
            .account_id()
            .await
            .map_err(|e| self.aws_error("Failed to get the AWS account", e))?;

        self.ctx
            .store
            .create_application(&Application {
                name: name.clone(),
                account_id,
                domain: self.command.domain.clone(),
                tags: self.tags.clone(),
            })
            .await?;

        let workspace = Workspace::create(&self.ctx.dir, &name)?;

        println!(
            "{} {}",
            console::style("Created the workspace at").green(),
            console::style(workspace.root().display()).bold()
        );

        let mut tags = self.tags.clone();
        tags.extend(naming::resource_tags(&name, None, None));

        stacks::deploy(
            &self.ctx,
            &name,
            StackInput {
                name: naming::app_stack(&name),
                template: application(&name).render()?,
                template_url: None,
                tags,
            },
        )
        .await
        .map_err(|e| self.aws_error("Failed to deploy the application stack", e))?;

        println!(
            "{} {}\n{}",
            console::style("Application is ready").green().bold(),
            console::style(&name).bold(),
            console::style("Next, run `copilot env init` to create an environment").dim()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Answer, Fakes};
    use tempfile::TempDir;

    fn command(name: Option<&str>) -> InitCommand {
        InitCommand {
            name: name.map(str::to_string),
            domain: None,
            tags: vec!["team=payments".into()],
        }
    }

    #[tokio::test]
    async fn creates_store_entry_workspace_and_stack() {
        let dir = TempDir::new().unwrap();
        let fakes = Fakes::new();
        let ctx = fakes.context(dir.path());

        command(Some("shop")).runner(&ctx).run().await.unwrap();

        let app = ctx.store.get_application("shop").await.unwrap();
        assert_eq!(app.account_id, "123456789012");
        assert_eq!(app.tags.get("team").map(String::as_str), Some("payments"));

        let workspace = Workspace::find(dir.path()).unwrap();
        assert_eq!(workspace.summary().unwrap().application, "shop");

        let deployed = fakes.stacks.deployed();
        assert_eq!(deployed[0].name, "shop-infrastructure");
        assert_eq!(
            deployed[0].tags.get(naming::TAG_APP).map(String::as_str),
            Some("shop")
        );
    }

    #[tokio::test]
    async fn name_is_asked_when_missing() {
        let dir = TempDir::new().unwrap();
        let fakes = Fakes::new();
        fakes.prompt.answer(Answer::Text("blog".into()));
        let ctx = fakes.context(dir.path());

        command(None).runner(&ctx).run().await.unwrap();

        assert!(ctx.store.get_application("blog").await.is_ok());
    }

    #[tokio::test]
    async fn workspace_of_another_app_is_refused() {
        let dir = TempDir::new().unwrap();
        Workspace::create(dir.path(), "shop").unwrap();
        let fakes = Fakes::new();
        let ctx = fakes.context(dir.path());

        let error = command(Some("blog")).runner(&ctx).run().await.unwrap_err();

        assert_eq!(error.message(), "The workspace belongs to another application");
        assert!(fakes.stacks.deployed().is_empty());
    }

    #[tokio::test]
    async fn invalid_name_is_rejected_before_anything_else() {
        let dir = TempDir::new().unwrap();
        let fakes = Fakes::new();
        let ctx = fakes.context(dir.path());

        let error = command(Some("My_App")).runner(&ctx).run().await.unwrap_err();

        assert_eq!(error.message(), "Invalid application name");
        assert!(ctx.store.list_applications().await.unwrap().is_empty());
    }
}
