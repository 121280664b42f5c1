use crate::aws::cloudformation::StackInput;
use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::stacks;
use crate::workspace::WorkspaceError;
use copilot_common::manifest::environment::{ImportedVpc, Subnets};
use copilot_common::manifest::EnvironmentManifest;
use copilot_common::model::Environment;
use copilot_common::template::environment::{environment, EnvironmentProps};
use copilot_common::{naming, validate};

#[derive(clap::Args, Clone)]
pub(crate) struct InitCommand {
    /// Name of the environment, e.g. "test" or "prod"
    #[arg(short, long)]
    name: Option<String>,

    /// Application the environment belongs to
    #[arg(short, long)]
    app: Option<String>,

    /// Mark the environment as production
    #[arg(long)]
    prod: bool,

    /// Existing VPC to deploy into instead of creating a new one
    #[arg(long)]
    import_vpc_id: Option<String>,

    /// Public subnets of the imported VPC, comma separated
    #[arg(long, value_delimiter = ',')]
    import_public_subnets: Vec<String>,

    /// Private subnets of the imported VPC, comma separated
    #[arg(long, value_delimiter = ',')]
    import_private_subnets: Vec<String>,

    /// Create a new VPC without asking about the network
    #[arg(long, conflicts_with = "import_vpc_id")]
    default_config: bool,
}

impl Runnable for InitCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        InitRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            app: None,
            name: None,
            vpc: None,
        }
    }
}

struct InitRunner {
    command: InitCommand,
    ctx: Context,
    app: Option<String>,
    name: Option<String>,
    vpc: Option<ImportedVpc>,
}

impl InitRunner {
    fn imported_vpc(&self) -> Option<ImportedVpc> {
        let id = self.command.import_vpc_id.clone()?;

        Some(ImportedVpc {
            id,
            subnets: Subnets {
                public: self.command.import_public_subnets.clone(),
                private: self.command.import_private_subnets.clone(),
            },
        })
    }

    /// Network settings of an existing manifest in the workspace
    fn manifest_vpc(&self, name: &str) -> Option<ImportedVpc> {
        self.ctx
            .workspace()
            .ok()?
            .read_environment(name)
            .ok()??
            .imported_vpc()
            .cloned()
    }

    fn ask_vpc(&self) -> eyre::Result<Option<ImportedVpc>> {
        let use_default = self.ctx.prompt.confirm(
            "Would you like to use the default configuration for a new environment?",
            true,
        )?;

        if use_default {
            return Ok(None);
        }

        let id = self
            .ctx
            .prompt
            .get("Which VPC would you like to use?", None, &|v| {
                match v.starts_with("vpc-") {
                    true => Ok(()),
                    false => Err(eyre::eyre!("VPC IDs start with \"vpc-\"")),
                }
            })?;

        let subnets = |kind: &str| -> eyre::Result<Vec<String>> {
            let answer = self.ctx.prompt.get(
                &format!("Which {kind} subnets would you like to use? (comma separated)"),
                None,
                &|v| match v.split(',').filter(|s| !s.trim().is_empty()).count() >= 2 {
                    true => Ok(()),
                    false => Err(eyre::eyre!("At least two subnets are required")),
                },
            )?;

            Ok(answer.split(',').map(|s| s.trim().to_string()).collect())
        };

        Ok(Some(ImportedVpc {
            id,
            subnets: Subnets {
                public: subnets("public")?,
                private: subnets("private")?,
            },
        }))
    }
}

impl Runner for InitRunner {
    async fn validate(&mut self) -> Result<(), Error> {
        if let Some(name) = &self.command.name {
            validate::env_name(name).map_err(|e| {
                self.error(Some("Invalid environment name"), Some(&e.to_string()), None)
            })?;
        }

        let has_subnets = !self.command.import_public_subnets.is_empty()
            || !self.command.import_private_subnets.is_empty();

        if has_subnets && self.command.import_vpc_id.is_none() {
            return Err(self.error(
                Some("Subnets can only be imported together with a VPC"),
                Some("Pass --import-vpc-id as well"),
                None,
            ));
        }

        if let Some(vpc) = self.imported_vpc() {
            // Checks the subnets the same way a manifest would be checked
            EnvironmentManifest::new("imported", Some(vpc)).map_err(|e| {
                self.error(Some("Invalid VPC configuration"), Some(&e.to_string()), None)
            })?;
        }

        if let Some(app) = &self.command.app {
            self.ctx.store.get_application(app).await?;
        }

        Ok(())
    }

    async fn ask(&mut self) -> Result<(), Error> {
        let app = self.ctx.app_name(self.command.app.as_deref()).await?;

        let name = match &self.command.name {
            Some(name) => name.clone(),
            None => self.ctx.prompt.get(
                "What is your environment's name?",
                None,
                &validate::env_name,
            )?,
        };

        self.vpc = match self.imported_vpc().or_else(|| self.manifest_vpc(&name)) {
            Some(vpc) => Some(vpc),
            None if self.command.default_config => None,
            None => self.ask_vpc()?,
        };

        self.app = Some(app);
        self.name = Some(name);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let (Some(app), Some(name)) = (self.app.clone(), self.name.clone()) else {
            return Err(self.error(Some("Environment name is required"), None, None));
        };

        let application = self.ctx.store.get_application(&app).await?;
        let region = self.ctx.region()?.to_string();

        let account_id = self
            .ctx
            .identity
            .account_id()
            .await
            .map_err(|e| self.aws_error("Failed to get the AWS account", e))?;

        let template = environment(&EnvironmentProps {
            app: &app,
            name: &name,
            prod: self.command.prod,
            vpc: self.vpc.as_ref(),
        });

        let mut tags = application.tags.clone();
        tags.extend(naming::resource_tags(&app, Some(&name), None));

        println!(
            "{} {} {}",
            console::style("Deploying").green().bold(),
            console::style(&name).bold(),
            console::style(format!("to {region}")).dim()
        );

        stacks::deploy(
            &self.ctx,
            &app,
            StackInput {
                name: naming::env_stack(&app, &name),
                template: template.render()?,
                template_url: None,
                tags,
            },
        )
        .await
        .map_err(|e| self.aws_error("Failed to deploy the environment", e))?;

        self.ctx
            .store
            .create_environment(&Environment {
                app: app.clone(),
                name: name.clone(),
                region,
                account_id,
                prod: self.command.prod,
            })
            .await?;

        if let Ok(workspace) = self.ctx.workspace() {
            let manifest = EnvironmentManifest::new(&name, self.vpc.clone())?;

            match workspace.write_environment(&manifest) {
                Ok(path) => println!(
                    "{} {}",
                    console::style("Wrote the manifest at").green(),
                    workspace.display(&path)
                ),
                Err(e) if e.downcast_ref::<WorkspaceError>().is_some() => {
                    log::info!("Keeping the existing manifest of {name}: {e}")
                }
                Err(e) => return Err(e.into()),
            }
        }

        println!(
            "{} {}",
            console::style("Environment is ready").green().bold(),
            console::style(&name).bold()
        );

        Ok(())
    }
}
