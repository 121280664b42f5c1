use crate::aws::cloudformation::DeployOutcome;
use crate::commands::workload::render::render;
use crate::commands::workload::{image, local, Noun, DEFAULT_TAG};
use crate::context::Context;
use crate::error::Error;
use crate::runner::Runner;
use crate::stacks;
use crate::workspace::Workspace;
use copilot_common::template::workload::SERVICE_URL;
use copilot_common::validate;
use std::collections::BTreeMap;

/// Flags of `svc deploy` and `job deploy`
#[derive(Debug, Clone, Default)]
pub(crate) struct DeployInput {
    pub(crate) name: Option<String>,
    pub(crate) env: Option<String>,
    pub(crate) tag: Option<String>,
    pub(crate) resource_tags: Vec<String>,
}

pub(crate) struct DeployRunner {
    noun: Noun,
    input: DeployInput,
    ctx: Context,
    tags: BTreeMap<String, String>,
    workspace: Option<Workspace>,

    /// Application, workload and environment
    target: Option<(String, String, String)>,
}

impl DeployRunner {
    pub(crate) fn new(noun: Noun, input: DeployInput, ctx: &Context) -> Self {
        DeployRunner {
            noun,
            input,
            ctx: ctx.clone(),
            tags: BTreeMap::new(),
            workspace: None,
            target: None,
        }
    }
}

impl Runner for DeployRunner {
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

        for tag in &self.input.resource_tags {
            let (key, value) = validate::key_value(tag).map_err(|e| {
                self.error(Some("Invalid resource tag"), Some(&e.to_string()), None)
            })?;

            self.tags.insert(key, value);
        }

        Ok(())
    }

    async fn ask(&mut self) -> Result<(), Error> {
        let workspace = self.ctx.workspace()?;
        let app = workspace.summary()?.application;

        let name = local(
            &self.ctx,
            &workspace,
            self.noun,
            self.input.name.as_deref(),
            &format!("Which {} would you like to deploy?", self.noun.as_str()),
        )?;

        let env = match &self.input.env {
            Some(env) => env.clone(),
            None => {
                self.ctx
                    .selector()
                    .environment(
                        &format!("Which environment would you like to deploy {name} to?"),
                        &app,
                    )
                    .await?
            }
        };

        self.workspace = Some(workspace);
        self.target = Some((app, name, env));
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let (Some(workspace), Some((app, name, env))) = (self.workspace.clone(), self.target.clone())
        else {
            return Err(self.error(Some("Nothing to deploy"), None, None));
        };

        let workload = self.ctx.store.get_workload(&app, &name).await?;

        if !self.noun.matches(workload.kind) {
            return Err(self.error(
                Some(&format!("{name} is not a {}", self.noun.as_str())),
                Some(&format!(
                    "Deploy it with `copilot {} deploy`",
                    match self.noun {
                        Noun::Service => Noun::Job.command(),
                        Noun::Job => Noun::Service.command(),
                    }
                )),
                None,
            ));
        }

        self.ctx.store.get_environment(&app, &env).await?;

        let manifest = workspace.read_workload(&name)?;
        let tag = self.input.tag.as_deref().unwrap_or(DEFAULT_TAG);

        let image = image(
            &self.ctx,
            &workspace,
            &app,
            &manifest.apply_env(&env)?,
            tag,
            true,
        )
        .await
        .map_err(|e| self.aws_error("Failed to publish the image", e))?;

        let rendered = render(&self.ctx, &workspace, &app, &env, &manifest, &image, &self.tags)
            .await
            .map_err(|e| {
                self.aws_error(&format!("Failed to render the {} stack", self.noun.as_str()), e)
            })?;

        if let Some(addons) = &rendered.addons {
            self.ctx
                .uploader
                .upload(&addons.bucket, &addons.key, addons.template.clone().into_bytes())
                .await
                .map_err(|e| self.aws_error("Failed to upload the addons", e))?;
        }

        println!(
            "{} {} {}",
            console::style("Deploying").green().bold(),
            console::style(&name).bold(),
            console::style(format!("to {env}")).dim()
        );

        let stack_name = rendered.stack.name.clone();

        let outcome = stacks::deploy(&self.ctx, &app, rendered.stack)
            .await
            .map_err(|e| self.aws_error(&format!("Failed to deploy {name}"), e))?;

        if outcome == DeployOutcome::Unchanged {
            println!("{}", console::style("No changes to deploy").dim());
        }

        let url = self
            .ctx
            .stacks
            .outputs(&stack_name)
            .await
            .map_err(|e| self.aws_error("Failed to read the stack outputs", e))?
            .get(SERVICE_URL)
            .cloned();

        match url {
            Some(url) => println!(
                "{} {} {}",
                console::style("Deployed").green().bold(),
                console::style(&name).bold(),
                console::style(url).underlined()
            ),
            None => println!(
                "{} {}",
                console::style("Deployed").green().bold(),
                console::style(&name).bold()
            ),
        }

        Ok(())
    }
}
