use crate::commands::workload::init::{InitInput, InitRunner};
use crate::commands::workload::Noun;
use crate::context::Context;
use crate::runner::{Runnable, Runner};

#[derive(clap::Args, Clone)]
pub(crate) struct InitCommand {
    /// Name of the job
    #[arg(short, long)]
    name: Option<String>,

    /// Type of the job, "Scheduled Job"
    #[arg(short = 't', long = "job-type")]
    kind: Option<String>,

    /// Path to the Dockerfile, relative to the current directory
    #[arg(short, long)]
    dockerfile: Option<String>,

    /// Prebuilt image to run instead of building one
    #[arg(short, long, conflicts_with = "dockerfile")]
    image: Option<String>,

    /// When to run the job: @daily, @every 30m or a cron expression
    #[arg(short, long)]
    schedule: Option<String>,

    /// How many times to retry a failed run
    #[arg(long)]
    retries: Option<u32>,

    /// Stop the job after this long, e.g. 1h30m
    #[arg(long)]
    timeout: Option<String>,
}

impl Runnable for InitCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        InitRunner::new(
            Noun::Job,
            InitInput {
                name: self.name.clone(),
                kind: self.kind.clone(),
                dockerfile: self.dockerfile.clone(),
                image: self.image.clone(),
                port: None,
                schedule: self.schedule.clone(),
                retries: self.retries,
                timeout: self.timeout.clone(),
            },
            ctx,
        )
    }
}
