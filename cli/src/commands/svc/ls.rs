use crate::commands::workload::ls::{LsInput, LsRunner};
use crate::commands::workload::Noun;
use crate::context::Context;
use crate::runner::{Runnable, Runner};

#[derive(clap::Args, Clone)]
pub(crate) struct LsCommand {
    #[arg(short, long)]
    app: Option<String>,

    /// Only the services with a manifest in the workspace
    #[arg(long)]
    local: bool,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

impl Runnable for LsCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        LsRunner::new(
            Noun::Service,
            LsInput {
                app: self.app.clone(),
                local: self.local,
                json: self.json,
            },
            ctx,
        )
    }
}
