use crate::aws::cloudformation::StackInput;
use crate::aws::ecs::RunTaskInput;
use crate::context::Context;
use crate::docker::{publish, BuildInput};
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::stacks::{self, output_list};
use copilot_common::naming;
use copilot_common::template::environment::{CLUSTER_ID, PUBLIC_SUBNETS, SECURITY_GROUP};
use copilot_common::template::task::{task, TaskProps, REPOSITORY_URI, TASK_DEFINITION};
use copilot_common::validate;
use eyre::ContextCompat;
use std::collections::BTreeMap;
use std::path::Path;

const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// ECS starts at most this many tasks in one RunTask call
const MAX_TASK_COUNT: u32 = 10;

#[derive(clap::Args, Clone)]
pub(crate) struct RunCommand {
    /// Name of the task group, tasks started together share it
    #[arg(short = 'n', long)]
    group_name: Option<String>,

    /// Path to the Dockerfile, "Dockerfile" by default
    #[arg(long)]
    dockerfile: Option<String>,

    /// Prebuilt image to run instead of building one
    #[arg(long, conflicts_with = "dockerfile")]
    image: Option<String>,

    /// Number of tasks to start
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// CPU units of each task
    #[arg(long, default_value_t = 256)]
    cpu: u32,

    /// Memory of each task, in MiB
    #[arg(long, default_value_t = 512)]
    memory: u32,

    /// Environment to run the tasks in
    #[arg(long, conflicts_with = "subnets")]
    env: Option<String>,

    /// Application of the environment
    #[arg(long)]
    app: Option<String>,

    /// Subnets to run the tasks in, outside of any environment
    #[arg(long, value_delimiter = ',')]
    subnets: Vec<String>,

    /// Security groups of the tasks
    #[arg(long, value_delimiter = ',')]
    security_groups: Vec<String>,

    /// Environment variables, e.g. --env-vars LOG_LEVEL=debug,MODE=full
    #[arg(long, value_delimiter = ',', value_name = "KEY=VALUE")]
    env_vars: Vec<String>,

    /// Command to run instead of the image's default
    #[arg(long)]
    command: Option<String>,

    /// ARN of an existing role for the tasks to assume
    #[arg(long)]
    task_role: Option<String>,
}

impl Runnable for RunCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        RunRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            group: None,
            target: None,
            variables: BTreeMap::new(),
        }
    }
}

struct RunRunner {
    command: RunCommand,
    ctx: Context,
    group: Option<String>,

    /// Application and environment the tasks run in
    target: Option<(String, String)>,

    variables: BTreeMap<String, String>,
}

/// Where the tasks run
struct Network {
    cluster: Option<String>,
    subnets: Vec<String>,
    security_groups: Vec<String>,
}

impl RunRunner {
    fn dockerfile(&self) -> Option<&str> {
        match &self.command.image {
            Some(_) => None,
            None => Some(self.command.dockerfile.as_deref().unwrap_or(DEFAULT_DOCKERFILE)),
        }
    }

    /// Name of the current directory, if it makes a valid group name
    fn default_group(&self) -> Option<String> {
        self.ctx
            .dir
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .filter(|name| validate::basic_name(name).is_ok())
    }

    async fn network(&self) -> eyre::Result<Network> {
        let Some((app, env)) = &self.target else {
            return Ok(Network {
                cluster: None,
                subnets: self.command.subnets.clone(),
                security_groups: self.command.security_groups.clone(),
            });
        };

        let outputs = stacks::env_outputs(&self.ctx, app, env).await?;

        let mut security_groups = output_list(&outputs, SECURITY_GROUP);
        security_groups.extend(self.command.security_groups.iter().cloned());

        Ok(Network {
            cluster: Some(
                outputs
                    .get(CLUSTER_ID)
                    .cloned()
                    .wrap_err_with(|| format!("Environment {env} has no cluster"))?,
            ),
            subnets: output_list(&outputs, PUBLIC_SUBNETS),
            security_groups,
        })
    }
}

impl Runner for RunRunner {
    async fn validate(&mut self) -> Result<(), Error> {
        if let Some(group) = &self.command.group_name {
            validate::basic_name(group).map_err(|e| {
                self.error(Some("Invalid task group name"), Some(&e.to_string()), None)
            })?;
        }

        if !(1..=MAX_TASK_COUNT).contains(&self.command.count) {
            return Err(self.error(
                Some("Invalid task count"),
                Some(&format!(
                    "Between 1 and {MAX_TASK_COUNT} tasks can be started at once"
                )),
                None,
            ));
        }

        if self.command.cpu == 0 || self.command.memory == 0 {
            return Err(self.error(
                Some("Invalid task size"),
                Some("CPU and memory must be positive"),
                None,
            ));
        }

        if let Some(dockerfile) = self.dockerfile() {
            if !self.ctx.dir.join(dockerfile).is_file() {
                return Err(self.error(
                    Some("Dockerfile not found"),
                    Some(&format!("There is no file at {dockerfile}, pass --dockerfile or --image")),
                    None,
                ));
            }
        }

        for variable in &self.command.env_vars {
            let (key, value) = validate::key_value(variable).map_err(|e| {
                self.error(Some("Invalid environment variable"), Some(&e.to_string()), None)
            })?;

            self.variables.insert(key, value);
        }

        Ok(())
    }

    async fn ask(&mut self) -> Result<(), Error> {
        let group = match &self.command.group_name {
            Some(group) => group.clone(),
            None => {
                let default = self.default_group();

                self.ctx.prompt.get(
                    "What would you like to name the task group?",
                    default.as_deref(),
                    &validate::basic_name,
                )?
            }
        };

        self.group = Some(group);

        if !self.command.subnets.is_empty() {
            return Ok(());
        }

        let app = match &self.command.app {
            Some(app) => Some(app.clone()),
            None => self
                .ctx
                .workspace()
                .and_then(|w| w.summary())
                .map(|s| s.application)
                .ok(),
        };

        let Some(app) = app else {
            return match &self.command.env {
                Some(env) => Err(self.error(
                    Some("Application name is required"),
                    Some(&format!("Pass --app with the application of environment {env}")),
                    None,
                )),
                None => Ok(()),
            };
        };

        let env = match &self.command.env {
            Some(env) => Some(env.clone()),
            None => {
                self.ctx
                    .selector()
                    .environment_or_none("Which environment do you want to run the tasks in?", &app)
                    .await?
            }
        };

        self.target = env.map(|env| (app, env));
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some(group) = self.group.clone() else {
            return Err(self.error(Some("Task group name is required"), None, None));
        };

        if let Some((app, env)) = &self.target {
            self.ctx.store.get_environment(app, env).await?;
        }

        let network = self
            .network()
            .await
            .map_err(|e| self.aws_error("Failed to get the network of the tasks", e))?;

        if network.subnets.is_empty() {
            return Err(self.error(
                Some("No subnets to run the tasks in"),
                Some("Pass --env, or --subnets to run in the default VPC"),
                None,
            ));
        }

        let (app, env) = match &self.target {
            Some((app, env)) => (Some(app.clone()), Some(env.clone())),
            None => (None, None),
        };

        let props = TaskProps {
            group: group.clone(),
            cpu: self.command.cpu,
            memory: self.command.memory,
            image: self.command.image.clone(),
            task_role: self.command.task_role.clone(),
            variables: self.variables.clone(),
            command: self
                .command
                .command
                .as_deref()
                .map(|c| c.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            app: app.clone(),
            env: env.clone(),
        };

        let mut tags = match &app {
            Some(app) => naming::resource_tags(app, env.as_deref(), None),
            None => BTreeMap::new(),
        };
        tags.insert(naming::TAG_TASK.to_string(), group.clone());

        println!(
            "{} {}",
            console::style("Provisioning task group").green().bold(),
            console::style(&group).bold()
        );

        let stack = naming::task_stack(&group);

        self.ctx
            .stacks
            .deploy(&StackInput {
                name: stack.clone(),
                template: task(&props).render()?,
                template_url: None,
                tags,
            })
            .await
            .map_err(|e| self.aws_error("Failed to deploy the task stack", e))?;

        let outputs = self
            .ctx
            .stacks
            .outputs(&stack)
            .await
            .map_err(|e| self.aws_error("Failed to read the task stack outputs", e))?;

        let (Some(task_definition), Some(repository)) =
            (outputs.get(TASK_DEFINITION), outputs.get(REPOSITORY_URI))
        else {
            return Err(self.error(
                Some("The task stack is incomplete"),
                Some(&format!("Stack {stack} is missing its outputs")),
                None,
            ));
        };

        if let Some(dockerfile) = self.dockerfile() {
            let dockerfile = self.ctx.dir.join(dockerfile);

            let input = BuildInput {
                context: dockerfile
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.ctx.dir.clone()),
                dockerfile,
                tags: vec![format!("{repository}:latest")],
            };

            publish(self.ctx.docker.as_ref(), self.ctx.registry.as_ref(), &input)
                .await
                .map_err(|e| self.aws_error("Failed to publish the image", e))?;
        }

        let arns = self
            .ctx
            .ecs
            .run_task(&RunTaskInput {
                cluster: network.cluster,
                task_definition: task_definition.clone(),
                count: self.command.count,
                subnets: network.subnets,
                security_groups: network.security_groups,
                group: group.clone(),
            })
            .await
            .map_err(|e| self.aws_error("Failed to run the tasks", e))?;

        println!(
            "{} {} {}",
            console::style("Started").green().bold(),
            arns.len(),
            console::style(format!("task(s) of {group}")).dim()
        );

        for arn in arns {
            println!("  {arn}");
        }

        Ok(())
    }
}
