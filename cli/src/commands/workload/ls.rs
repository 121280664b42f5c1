use crate::commands::workload::Noun;
use crate::context::Context;
use crate::error::Error;
use crate::runner::Runner;
use crate::writer::Writer;
use copilot_common::model::Workload;
use eyre::WrapErr;
use tabled::Tabled;

/// Flags of `svc ls` and `job ls`
#[derive(Debug, Clone, Default)]
pub(crate) struct LsInput {
    pub(crate) app: Option<String>,

    /// List the manifests of the workspace instead of the registered workloads
    pub(crate) local: bool,

    pub(crate) json: bool,
}

pub(crate) struct LsRunner {
    noun: Noun,
    input: LsInput,
    ctx: Context,
    app: Option<String>,
}

impl LsRunner {
    pub(crate) fn new(noun: Noun, input: LsInput, ctx: &Context) -> Self {
        LsRunner {
            noun,
            input,
            ctx: ctx.clone(),
            app: None,
        }
    }

    async fn workloads(&self, app: &str) -> eyre::Result<Vec<Workload>> {
        if !self.input.local {
            return match self.noun {
                Noun::Service => self.ctx.store.list_services(app).await,
                Noun::Job => self.ctx.store.list_jobs(app).await,
            };
        }

        Ok(self
            .ctx
            .workspace()?
            .workloads()?
            .into_iter()
            .filter(|m| self.noun.matches(m.kind))
            .map(|m| Workload {
                app: app.to_string(),
                name: m.name,
                kind: m.kind,
            })
            .collect())
    }
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Type")]
    kind: String,
}

impl Runner for LsRunner {
    async fn ask(&mut self) -> Result<(), Error> {
        self.app = Some(self.ctx.app_name(self.input.app.as_deref()).await?);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some(app) = self.app.clone() else {
            return Err(self.error(Some("Application name is required"), None, None));
        };

        let writer = Writer::new(self.input.json);
        let workloads = self.workloads(&app).await?;

        writer.json(
            serde_json::to_value(&workloads)
                .wrap_err_with(|| format!("Failed to serialize the {}s", self.noun.as_str()))?,
        )?;

        if workloads.is_empty() {
            return writer.text(&format!(
                "{}\n",
                console::style(format!(
                    "No {}s found, run `copilot {} init` to create one",
                    self.noun.as_str(),
                    self.noun.command()
                ))
                .yellow()
            ));
        }

        let title = match self.input.local {
            true => format!("Local {}s", self.noun.as_str()),
            false => format!("{}s of {app}", capitalize(self.noun.as_str())),
        };

        writer.table(
            &title,
            workloads
                .into_iter()
                .map(|w| Row {
                    name: w.name,
                    kind: w.kind.to_string(),
                })
                .collect(),
        )
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::Fakes;
    use crate::workspace::Workspace;
    use copilot_common::manifest::workload::WorkloadProps;
    use copilot_common::manifest::WorkloadManifest;
    use copilot_common::model::WorkloadType;
    use tempfile::TempDir;

    #[test]
    fn capitalized_title() {
        assert_eq!(capitalize("service"), "Service");
        assert_eq!(capitalize(""), "");
    }

    #[tokio::test]
    async fn only_workloads_of_the_noun() {
        let fakes = Fakes::new();
        fakes.app("shop").await;
        fakes.workload("shop", "api", WorkloadType::BackendService).await;
        fakes.workload("shop", "report", WorkloadType::ScheduledJob).await;
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let runner = LsRunner::new(
            Noun::Job,
            LsInput {
                app: Some("shop".into()),
                ..Default::default()
            },
            &ctx,
        );

        let jobs = runner.workloads("shop").await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "report");
    }

    #[tokio::test]
    async fn local_lists_the_manifests() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create(dir.path(), "shop").unwrap();
        workspace
            .write_workload(
                &WorkloadManifest::new(
                    WorkloadType::WorkerService,
                    &WorkloadProps {
                        name: "worker".into(),
                        image: Some("busybox".into()),
                        ..Default::default()
                    },
                )
                .unwrap(),
            )
            .unwrap();

        let fakes = Fakes::new();
        let ctx = fakes.context(dir.path());

        let mut runner = LsRunner::new(
            Noun::Service,
            LsInput {
                local: true,
                json: true,
                ..Default::default()
            },
            &ctx,
        );

        let services = runner.workloads("shop").await.unwrap();
        assert_eq!(services[0].name, "worker");

        runner.run().await.unwrap();
    }
}
