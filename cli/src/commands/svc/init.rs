use crate::commands::workload::init::{InitInput, InitRunner};
use crate::commands::workload::Noun;
use crate::context::Context;
use crate::runner::{Runnable, Runner};

#[derive(clap::Args, Clone)]
pub(crate) struct InitCommand {
    /// Name of the service
    #[arg(short, long)]
    name: Option<String>,

    /// Type of the service, e.g. "Load Balanced Web Service"
    #[arg(short = 't', long = "svc-type")]
    kind: Option<String>,

    /// Path to the Dockerfile, relative to the current directory
    #[arg(short, long)]
    dockerfile: Option<String>,

    /// Prebuilt image to deploy instead of building one
    #[arg(short, long, conflicts_with = "dockerfile")]
    image: Option<String>,

    /// Port the container listens on
    #[arg(long)]
    port: Option<u16>,
}

impl Runnable for InitCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        InitRunner::new(
            Noun::Service,
            InitInput {
                name: self.name.clone(),
                kind: self.kind.clone(),
                dockerfile: self.dockerfile.clone(),
                image: self.image.clone(),
                port: self.port,
                ..Default::default()
            },
            ctx,
        )
    }
}
