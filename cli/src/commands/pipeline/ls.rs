use super::app_pipelines;
use crate::aws::codepipeline::Pipeline;
use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use eyre::WrapErr;
use tabled::Tabled;

#[derive(clap::Args, Clone)]
pub(crate) struct LsCommand {
    #[arg(short, long)]
    app: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

impl Runnable for LsCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        LsRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            app: None,
            pipelines: vec![],
        }
    }
}

struct LsRunner {
    command: LsCommand,
    ctx: Context,
    app: Option<String>,
    pipelines: Vec<Pipeline>,
}

#[derive(Tabled, Debug, PartialEq)]
struct Row {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Stages")]
    stages: usize,

    #[tabled(rename = "Last updated")]
    updated: String,
}

impl From<&Pipeline> for Row {
    fn from(pipeline: &Pipeline) -> Self {
        Row {
            name: pipeline.name.clone(),
            stages: pipeline.stages.len(),
            updated: pipeline
                .updated
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        }
    }
}

impl Runner for LsRunner {
    async fn ask(&mut self) -> Result<(), Error> {
        self.app = Some(self.ctx.app_name(self.command.app.as_deref()).await?);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some(app) = self.app.clone() else {
            return Err(self.error(Some("Application is required"), None, None));
        };

        let writer = Writer::new(self.command.json);

        self.pipelines = app_pipelines(&self.ctx, &app)
            .await
            .map_err(|e| self.aws_error("Failed to list pipelines", e))?;

        writer.json(
            serde_json::to_value(&self.pipelines).wrap_err("Failed to serialize pipelines")?,
        )?;

        if self.pipelines.is_empty() {
            return writer.text(&format!(
                "{}\n",
                console::style(format!(
                    "No pipelines found in {app}, run `copilot pipeline deploy` to create one"
                ))
                .yellow()
            ));
        }

        writer.table("Pipelines", self.pipelines.iter().map(Row::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pipeline::tests::{pipeline, states};
    use crate::fakes::Fakes;

    #[tokio::test]
    async fn lists_the_app_pipelines() {
        let fakes = Fakes::new();
        fakes.app("shop").await;
        fakes.app("blog").await;
        fakes.pipelines.add(pipeline("shop", "release"), states());
        fakes.pipelines.add(pipeline("blog", "release"), states());
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let mut runner = LsRunner {
            command: LsCommand {
                app: Some("shop".into()),
                json: true,
            },
            ctx,
            app: None,
            pipelines: vec![],
        };

        runner.run().await.unwrap();

        assert_eq!(
            runner.pipelines.iter().map(Row::from).collect::<Vec<_>>(),
            vec![Row {
                name: "pipeline-shop-release".into(),
                stages: 3,
                updated: String::new(),
            }]
        );
    }

    #[tokio::test]
    async fn app_without_pipelines_is_not_an_error() {
        let fakes = Fakes::new();
        fakes.app("shop").await;
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let mut runner = LsRunner {
            command: LsCommand {
                app: Some("shop".into()),
                json: false,
            },
            ctx,
            app: None,
            pipelines: vec![],
        };

        runner.run().await.unwrap();
        assert_eq!(runner.app.as_deref(), Some("shop"));
        assert!(runner.pipelines.is_empty());
    }
}
