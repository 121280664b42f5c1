use crate::commands::workload::deploy::{DeployInput, DeployRunner};
use crate::commands::workload::Noun;
use crate::context::Context;
use crate::runner::{Runnable, Runner};

#[derive(clap::Args, Clone)]
pub(crate) struct DeployCommand {
    /// Name of the job
    #[arg(short, long)]
    name: Option<String>,

    /// Environment to deploy to
    #[arg(short, long)]
    env: Option<String>,

    /// Tag of the built image, "latest" by default
    #[arg(long)]
    tag: Option<String>,

    /// Extra tags of the deployed resources, e.g. --resource-tags team=web,tier=front
    #[arg(long, value_delimiter = ',', value_name = "KEY=VALUE")]
    resource_tags: Vec<String>,
}

impl Runnable for DeployCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        DeployRunner::new(
            Noun::Job,
            DeployInput {
                name: self.name.clone(),
                env: self.env.clone(),
                tag: self.tag.clone(),
                resource_tags: self.resource_tags.clone(),
            },
            ctx,
        )
    }
}
