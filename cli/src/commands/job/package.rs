use crate::commands::workload::package::{PackageInput, PackageRunner};
use crate::commands::workload::Noun;
use crate::context::Context;
use crate::runner::{Runnable, Runner};
use std::path::PathBuf;

#[derive(clap::Args, Clone)]
pub(crate) struct PackageCommand {
    /// Name of the job
    #[arg(short, long)]
    name: Option<String>,

    /// Environment to render the template for
    #[arg(short, long)]
    env: Option<String>,

    /// Image tag the template refers to, "latest" by default
    #[arg(long)]
    tag: Option<String>,

    /// Write the templates to this directory instead of printing them
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Build and push the image and upload the addons, as a pipeline build does
    #[arg(long)]
    upload_assets: bool,
}

impl Runnable for PackageCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        PackageRunner::new(
            Noun::Job,
            PackageInput {
                name: self.name.clone(),
                env: self.env.clone(),
                tag: self.tag.clone(),
                output_dir: self.output_dir.clone(),
                upload_assets: self.upload_assets,
            },
            ctx,
        )
    }
}
