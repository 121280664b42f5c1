use crate::aws::cloudformation::{DeployOutcome, StackInput};
use crate::context::Context;
use crate::error::Error;
use crate::prompt::Choice;
use crate::runner::{Runnable, Runner};
use crate::stacks;
use crate::workspace::Workspace;
use copilot_common::naming;
use copilot_common::template::pipeline::{pipeline, PipelineProps, CONNECTION_ARN};
use copilot_common::validate;

#[derive(clap::Args, Clone)]
pub(crate) struct DeployCommand {
    /// Name of the pipeline in the workspace
    #[arg(short, long)]
    name: Option<String>,

    /// Update an existing pipeline without asking
    #[arg(long)]
    yes: bool,
}

impl Runnable for DeployCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        DeployRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            workspace: None,
            target: None,
        }
    }
}

struct DeployRunner {
    command: DeployCommand,
    ctx: Context,
    workspace: Option<Workspace>,

    /// Application and pipeline
    target: Option<(String, String)>,
}

impl Runner for DeployRunner {
    async fn validate(&mut self) -> Result<(), Error> {
        if let Some(name) = &self.command.name {
            validate::pipeline_name(name).map_err(|e| {
                self.error(Some("Invalid pipeline name"), Some(&e.to_string()), None)
            })?;
        }

        Ok(())
    }

    async fn ask(&mut self) -> Result<(), Error> {
        let workspace = self.ctx.workspace()?;
        let app = workspace.summary()?.application;

        let name = match &self.command.name {
            Some(name) => name.clone(),
            None => {
                let names = workspace.pipelines()?;

                match names.as_slice() {
                    [] => {
                        return Err(self.error(
                            Some("No pipeline in the workspace"),
                            Some("Run `copilot pipeline init` to create one"),
                            None,
                        ))
                    }
                    [only] => only.clone(),
                    _ => self.ctx.prompt.select_one(
                        "Which pipeline would you like to deploy?",
                        &names.iter().map(|n| Choice::new(n)).collect::<Vec<_>>(),
                    )?,
                }
            }
        };

        self.workspace = Some(workspace);
        self.target = Some((app, name));
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let (Some(workspace), Some((app, name))) = (self.workspace.clone(), self.target.clone())
        else {
            return Err(self.error(Some("Nothing to deploy"), None, None));
        };

        let manifest = workspace.read_pipeline(&name)?;

        for env in manifest.environments() {
            self.ctx.store.get_environment(&app, &env).await.map_err(|e| {
                self.aws_error(&format!("Stage {env} is not an environment of {app}"), e)
            })?;
        }

        let workloads = workspace
            .workloads()?
            .into_iter()
            .map(|w| w.name)
            .collect::<Vec<_>>();

        if workloads.is_empty() {
            return Err(self.error(
                Some("Nothing for the pipeline to deploy"),
                Some("Run `copilot svc init` or `copilot job init` first"),
                None,
            ));
        }

        let stack_name = naming::pipeline_stack(&app, &manifest.name);
        let exists = self.ctx.stacks.describe(&stack_name).await?.is_some();

        if exists
            && !self.command.yes
            && !self.ctx.prompt.confirm(
                &format!("Are you sure you want to update the existing pipeline {name}?"),
                false,
            )?
        {
            println!("{}", console::style("Cancelled").yellow());
            return Ok(());
        }

        let bucket = stacks::artifact_bucket(&self.ctx, &app).await?;
        let buildspec = workspace.buildspec_path(&manifest.name);

        let template = pipeline(&PipelineProps {
            app: &app,
            manifest: &manifest,
            artifact_bucket: &bucket,
            workloads: &workloads,
            buildspec: &buildspec,
        })?;

        let mut tags = naming::resource_tags(&app, None, None);
        tags.insert(naming::TAG_PIPELINE.to_string(), manifest.name.clone());

        println!(
            "{} {}",
            console::style("Deploying pipeline").green().bold(),
            console::style(&manifest.name).bold()
        );

        let outcome = stacks::deploy(
            &self.ctx,
            &app,
            StackInput {
                name: stack_name.clone(),
                template: template.render()?,
                template_url: None,
                tags,
            },
        )
        .await
        .map_err(|e| self.aws_error("Failed to deploy the pipeline", e))?;

        if outcome == DeployOutcome::Unchanged {
            println!("{}", console::style("No changes to deploy").dim());
            return Ok(());
        }

        println!(
            "{} {stack_name}",
            console::style("Deployed pipeline").green().bold()
        );

        let connection = self
            .ctx
            .stacks
            .outputs(&stack_name)
            .await?
            .get(CONNECTION_ARN)
            .cloned();

        if let (DeployOutcome::Created, Some(arn)) = (outcome, connection) {
            println!(
                "{}",
                console::style(format!(
                    "The connection {arn} is pending, activate it in the AWS console (Developer Tools > Connections) for the pipeline to run"
                ))
                .yellow()
            );
        }

        Ok(())
    }
}
