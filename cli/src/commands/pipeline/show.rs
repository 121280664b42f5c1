use super::deployed_pipeline;
use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use eyre::WrapErr;
use tabled::Tabled;

#[derive(clap::Args, Clone)]
pub(crate) struct ShowCommand {
    /// Name of the pipeline
    #[arg(short, long)]
    name: Option<String>,

    #[arg(short, long)]
    app: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

impl Runnable for ShowCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        ShowRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            name: None,
        }
    }
}

struct ShowRunner {
    command: ShowCommand,
    ctx: Context,

    /// Name of the CodePipeline pipeline
    name: Option<String>,
}

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "Order")]
    order: usize,

    #[tabled(rename = "Stage")]
    name: String,
}

impl Runner for ShowRunner {
    async fn ask(&mut self) -> Result<(), Error> {
        let app = self.ctx.app_name(self.command.app.as_deref()).await?;
        self.name = Some(deployed_pipeline(&self.ctx, &app, self.command.name.as_deref()).await?);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some(name) = self.name.clone() else {
            return Err(self.error(Some("Pipeline name is required"), None, None));
        };

        let writer = Writer::new(self.command.json);

        let pipeline = self
            .ctx
            .pipelines
            .get_pipeline(&name)
            .await
            .map_err(|e| self.aws_error(&format!("Failed to get pipeline {name}"), e))?;

        writer.json(serde_json::to_value(&pipeline).wrap_err("Failed to serialize the pipeline")?)?;

        let time = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string())
        };

        writer.text(&format!(
            "{}\n  Name: {}\n  Created: {}\n  Updated: {}\n\n",
            console::style("About").bold(),
            pipeline.name,
            time(pipeline.created),
            time(pipeline.updated),
        ))?;

        writer.table(
            "Stages",
            pipeline
                .stages
                .into_iter()
                .enumerate()
                .map(|(i, name)| StageRow {
                    order: i + 1,
                    name,
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pipeline::tests::{pipeline, states};
    use crate::fakes::Fakes;

    #[tokio::test]
    async fn shows_a_deployed_pipeline() {
        let fakes = Fakes::new();
        fakes.pipelines.add(pipeline("shop", "release"), states());
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let command = ShowCommand {
            name: Some("release".into()),
            app: Some("shop".into()),
            json: true,
        };

        command.runner(&ctx).run().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_pipeline_is_an_error() {
        let fakes = Fakes::new();
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let command = ShowCommand {
            name: Some("release".into()),
            app: Some("shop".into()),
            json: false,
        };

        let error = command.runner(&ctx).run().await.unwrap_err();
        assert_eq!(error.message(), "Failed to get pipeline pipeline-shop-release");
    }
}
