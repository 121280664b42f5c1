use crate::commands::workload::delete::{DeleteInput, DeleteRunner};
use crate::commands::workload::Noun;
use crate::context::Context;
use crate::runner::{Runnable, Runner};

#[derive(clap::Args, Clone)]
pub(crate) struct DeleteCommand {
    /// Name of the service
    #[arg(short, long)]
    name: Option<String>,

    #[arg(short, long)]
    app: Option<String>,

    /// Only delete the service from this environment
    #[arg(short, long)]
    env: Option<String>,

    /// Skip the confirmation
    #[arg(long)]
    yes: bool,
}

impl Runnable for DeleteCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        DeleteRunner::new(
            Noun::Service,
            DeleteInput {
                name: self.name.clone(),
                app: self.app.clone(),
                env: self.env.clone(),
                yes: self.yes,
            },
            ctx,
        )
    }
}
