use super::deployed_pipeline;
use crate::aws::codepipeline::StageState;
use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use eyre::WrapErr;
use tabled::Tabled;

#[derive(clap::Args, Clone)]
pub(crate) struct StatusCommand {
    /// Name of the pipeline
    #[arg(short, long)]
    name: Option<String>,

    #[arg(short, long)]
    app: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

impl Runnable for StatusCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        StatusRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            name: None,
        }
    }
}

struct StatusRunner {
    command: StatusCommand,
    ctx: Context,
    name: Option<String>,
}

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "Stage")]
    stage: String,

    #[tabled(rename = "Transition")]
    transition: String,

    #[tabled(rename = "Status")]
    status: String,

    #[tabled(rename = "Actions")]
    actions: String,
}

impl From<StageState> for StageRow {
    fn from(state: StageState) -> Self {
        StageRow {
            transition: match state.transition_enabled {
                true => "ENABLED".into(),
                false => "DISABLED".into(),
            },
            status: match state.status.is_empty() {
                true => "-".into(),
                false => state.status,
            },
            actions: state
                .actions
                .iter()
                .map(|a| format!("{}: {}", a.name, a.status))
                .collect::<Vec<_>>()
                .join("\n"),
            stage: state.name,
        }
    }
}

impl Runner for StatusRunner {
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

        let states = self
            .ctx
            .pipelines
            .state(&name)
            .await
            .map_err(|e| self.aws_error(&format!("Failed to get the state of {name}"), e))?;

        writer.json(serde_json::json!({
            "pipeline": name,
            "stages": serde_json::to_value(&states).wrap_err("Failed to serialize the stages")?,
        }))?;

        writer.table(
            &format!("Pipeline {name}"),
            states.into_iter().map(StageRow::from).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::codepipeline::ActionState;
    use crate::commands::pipeline::tests::{pipeline, states};
    use crate::fakes::Fakes;

    #[test]
    fn stage_without_execution_shows_a_dash() {
        let row = StageRow::from(StageState {
            name: "DeployTo-prod".into(),
            status: String::new(),
            transition_enabled: false,
            actions: vec![ActionState {
                name: "CreateOrUpdate-api-prod".into(),
                status: "Succeeded".into(),
                updated: None,
            }],
        });

        assert_eq!(row.status, "-");
        assert_eq!(row.transition, "DISABLED");
        assert_eq!(row.actions, "CreateOrUpdate-api-prod: Succeeded");
    }

    #[tokio::test]
    async fn single_pipeline_is_picked_without_asking() {
        let fakes = Fakes::new();
        fakes.pipelines.add(pipeline("shop", "release"), states());
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let command = StatusCommand {
            name: None,
            app: Some("shop".into()),
            json: true,
        };

        command.runner(&ctx).run().await.unwrap();
        assert!(fakes.prompt.asked().is_empty());
    }
}
