use crate::aws::{sdk_error, text};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_codepipeline::primitives::DateTime;
use aws_sdk_codepipeline::types::{ActionExecutionStatus, StageExecutionStatus};
use chrono::{TimeZone, Utc};
use eyre::{ContextCompat, WrapErr};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct Pipeline {
    pub(crate) name: String,
    pub(crate) stages: Vec<String>,
    pub(crate) tags: BTreeMap<String, String>,
    pub(crate) created: Option<chrono::DateTime<Utc>>,
    pub(crate) updated: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct StageState {
    pub(crate) name: String,

    /// Latest execution status, empty if the stage never ran
    pub(crate) status: String,

    pub(crate) transition_enabled: bool,
    pub(crate) actions: Vec<ActionState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct ActionState {
    pub(crate) name: String,
    pub(crate) status: String,
    pub(crate) updated: Option<chrono::DateTime<Utc>>,
}

#[async_trait]
pub(crate) trait Pipelines: Send + Sync {
    async fn list_pipelines(&self) -> eyre::Result<Vec<String>>;
    async fn get_pipeline(&self, name: &str) -> eyre::Result<Pipeline>;
    async fn state(&self, name: &str) -> eyre::Result<Vec<StageState>>;
}

pub(crate) struct CodePipeline {
    client: aws_sdk_codepipeline::Client,
}

impl CodePipeline {
    pub(crate) fn new(config: &SdkConfig) -> Self {
        CodePipeline {
            client: aws_sdk_codepipeline::Client::new(config),
        }
    }

    async fn tags(&self, arn: &str) -> eyre::Result<BTreeMap<String, String>> {
        let output = self
            .client
            .list_tags_for_resource()
            .resource_arn(arn)
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err_with(|| format!("Failed to list tags of {arn}"))?;

        Ok(output
            .tags()
            .iter()
            .map(|t| (text(t.key()), text(t.value())))
            .collect())
    }
}

fn timestamp<'a>(value: impl Into<Option<&'a DateTime>>) -> Option<chrono::DateTime<Utc>> {
    value
        .into()
        .and_then(|t| Utc.timestamp_opt(t.secs(), t.subsec_nanos()).single())
}

fn stage_status<'a>(value: impl Into<Option<&'a StageExecutionStatus>>) -> String {
    value
        .into()
        .map(|s| s.as_str().to_string())
        .unwrap_or_default()
}

fn action_status<'a>(value: impl Into<Option<&'a ActionExecutionStatus>>) -> String {
    value
        .into()
        .map(|s| s.as_str().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl Pipelines for CodePipeline {
    async fn list_pipelines(&self) -> eyre::Result<Vec<String>> {
        let mut names = vec![];
        let mut next_token = None;

        loop {
            let output = self
                .client
                .list_pipelines()
                .set_next_token(next_token)
                .send()
                .await
                .map_err(sdk_error)
                .wrap_err("Failed to list pipelines")?;

            names.extend(output.pipelines().iter().map(|p| text(p.name())));

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(names)
    }

    async fn get_pipeline(&self, name: &str) -> eyre::Result<Pipeline> {
        let output = self
            .client
            .get_pipeline()
            .name(name)
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err_with(|| format!("Failed to get pipeline {name}"))?;

        let declaration = output
            .pipeline()
            .wrap_err_with(|| format!("Pipeline {name} has no declaration"))?;

        let metadata = output.metadata();

        let tags = match metadata.and_then(|m| m.pipeline_arn()) {
            Some(arn) => self.tags(arn).await?,
            None => BTreeMap::new(),
        };

        Ok(Pipeline {
            name: text(declaration.name()),
            stages: declaration.stages().iter().map(|s| text(s.name())).collect(),
            tags,
            created: metadata.and_then(|m| timestamp(m.created())),
            updated: metadata.and_then(|m| timestamp(m.updated())),
        })
    }

    async fn state(&self, name: &str) -> eyre::Result<Vec<StageState>> {
        let output = self
            .client
            .get_pipeline_state()
            .name(name)
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err_with(|| format!("Failed to get the state of pipeline {name}"))?;

        Ok(output
            .stage_states()
            .iter()
            .map(|stage| StageState {
                name: text(stage.stage_name()),
                status: stage
                    .latest_execution()
                    .map(|e| stage_status(e.status()))
                    .unwrap_or_default(),
                transition_enabled: stage
                    .inbound_transition_state()
                    .and_then(|t| Into::<Option<bool>>::into(t.enabled()))
                    .unwrap_or(true),
                actions: stage
                    .action_states()
                    .iter()
                    .map(|action| ActionState {
                        name: text(action.action_name()),
                        status: action
                            .latest_execution()
                            .map(|e| action_status(e.status()))
                            .unwrap_or_default(),
                        updated: action
                            .latest_execution()
                            .and_then(|e| timestamp(e.last_status_change())),
                    })
                    .collect(),
            })
            .collect())
    }
}
