use crate::aws::{sdk_error, text};
use crate::progress::{Progress, ProgressStatus};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::types::{Capability, StackStatus, Tag};
use copilot_common::stack::{self, Status};
use eyre::{eyre, WrapErr};
use std::collections::BTreeMap;
use std::time::Duration;

const NO_UPDATES: &str = "No updates are to be performed";

/// Stack to create or update
#[derive(Debug, Clone, Default)]
pub(crate) struct StackInput {
    pub(crate) name: String,
    pub(crate) template: String,

    /// Location of the template in S3, for the ones over the inline size limit
    pub(crate) template_url: Option<String>,

    pub(crate) tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeployOutcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StackSummary {
    pub(crate) name: String,
    pub(crate) status: String,
    pub(crate) outputs: BTreeMap<String, String>,
    pub(crate) tags: BTreeMap<String, String>,
}

impl StackSummary {
    pub(crate) fn status(&self) -> Status {
        Status::from_status(&self.status)
    }
}

/// The stack does not exist
#[derive(Debug)]
pub(crate) struct StackNotFound(pub(crate) String);

impl std::fmt::Display for StackNotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Stack {} does not exist", self.0)
    }
}

impl std::error::Error for StackNotFound {}

#[async_trait]
pub(crate) trait StackDeployer: Send + Sync {
    /// Create or update the stack and wait until it settles
    async fn deploy(&self, stack: &StackInput) -> eyre::Result<DeployOutcome>;

    /// None if the stack does not exist
    async fn describe(&self, name: &str) -> eyre::Result<Option<StackSummary>>;

    /// Delete the stack and wait for it to be gone, a missing stack is not an error
    async fn delete(&self, name: &str) -> eyre::Result<()>;

    async fn outputs(&self, name: &str) -> eyre::Result<BTreeMap<String, String>> {
        match self.describe(name).await? {
            Some(stack) => Ok(stack.outputs),
            None => Err(StackNotFound(name.to_string()).into()),
        }
    }
}

pub(crate) struct CloudFormation {
    client: aws_sdk_cloudformation::Client,
    poll_interval: Duration,
}

impl CloudFormation {
    pub(crate) fn new(config: &SdkConfig, poll_interval: Duration) -> Self {
        CloudFormation {
            client: aws_sdk_cloudformation::Client::new(config),
            poll_interval,
        }
    }

    fn tags(stack: &StackInput) -> Vec<Tag> {
        stack
            .tags
            .iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect()
    }

    async fn create(&self, stack: &StackInput) -> eyre::Result<()> {
        self.client
            .create_stack()
            .stack_name(&stack.name)
            .set_template_body(stack.template_url.is_none().then(|| stack.template.clone()))
            .set_template_url(stack.template_url.clone())
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityAutoExpand)
            .set_tags(Some(Self::tags(stack)))
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err_with(|| format!("Failed to create stack {}", stack.name))?;

        Ok(())
    }

    /// Returns false when the template and tags did not change
    async fn update(&self, stack: &StackInput) -> eyre::Result<bool> {
        let result = self
            .client
            .update_stack()
            .stack_name(&stack.name)
            .set_template_body(stack.template_url.is_none().then(|| stack.template.clone()))
            .set_template_url(stack.template_url.clone())
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityAutoExpand)
            .set_tags(Some(Self::tags(stack)))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_no_updates(e.as_service_error().and_then(|e| e.message())) => Ok(false),
            Err(e) => Err(sdk_error(e)).wrap_err_with(|| format!("Failed to update stack {}", stack.name)),
        }
    }

    /// Poll the stack until it leaves the in-progress state
    ///
    /// Returns None when the stack is gone, which is how deletions end.
    async fn wait(&self, name: &str, stage: &str) -> eyre::Result<Option<StackSummary>> {
        let progress = Progress::new(name);
        progress.log_stage(stage);

        loop {
            let Some(stack) = self.describe(name).await? else {
                progress.finish(stage, ProgressStatus::Success, None);
                return Ok(None);
            };

            progress.set_message(&stack.status);

            match stack.status() {
                Status::InProgress => tokio::time::sleep(self.poll_interval).await,
                Status::Success => {
                    progress.finish(stage, ProgressStatus::Success, None);
                    return Ok(Some(stack));
                }
                Status::Failure => {
                    progress.finish(stage, ProgressStatus::Error, Some(&stack.status));
                    let reasons = self.failures(name).await.unwrap_or_default();
                    return Err(eyre!(failure_message(name, &stack.status, &reasons)));
                }
            }
        }
    }

    /// Reasons of the resources that failed during the latest operation
    async fn failures(&self, name: &str) -> eyre::Result<Vec<String>> {
        let output = self
            .client
            .describe_stack_events()
            .stack_name(name)
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err("Failed to describe stack events")?;

        let events = output.stack_events().iter().map(|event| StackEventRow {
            logical_id: text(event.logical_resource_id()),
            status: event
                .resource_status()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            reason: text(event.resource_status_reason()),
        });

        Ok(failure_reasons(name, events))
    }
}

/// What deploying over the current state of a stack takes
#[derive(Debug, PartialEq, Eq)]
enum DeployAction {
    Create,

    /// Delete the stack left by a failed create, then create it again
    Recreate,

    Update,
}

fn deploy_action(existing: Option<&StackSummary>) -> eyre::Result<DeployAction> {
    match existing {
        None => Ok(DeployAction::Create),
        Some(summary) if stack::needs_cleanup(&summary.status) => Ok(DeployAction::Recreate),
        Some(summary) if summary.status() == Status::InProgress => Err(eyre!(
            "Stack {} is in {}, wait for it to finish and try again",
            summary.name,
            summary.status
        )),
        Some(_) => Ok(DeployAction::Update),
    }
}

/// CloudFormation refuses updates which change nothing with a validation error
fn is_no_updates(message: Option<&str>) -> bool {
    message.is_some_and(|m| m.contains(NO_UPDATES))
}

struct StackEventRow {
    logical_id: String,
    status: String,
    reason: String,
}

/// Reasons of failed resources since the latest user initiated operation, oldest first
///
/// Expects the events from the newest to the oldest, the way CloudFormation returns them.
fn failure_reasons(name: &str, events: impl IntoIterator<Item = StackEventRow>) -> Vec<String> {
    let mut reasons = vec![];

    for event in events {
        if event.logical_id == name && event.reason == "User Initiated" {
            break;
        }

        if event.status.ends_with("_FAILED") && !event.reason.is_empty() {
            reasons.push(format!("{}: {}", event.logical_id, event.reason));
        }
    }

    reasons.reverse();
    reasons
}

fn failure_message(name: &str, status: &str, reasons: &[String]) -> String {
    match reasons.is_empty() {
        true => format!("Stack {name} ended in {status}"),
        false => format!("Stack {name} ended in {status}:\n{}", reasons.join("\n")),
    }
}

fn status_str<'a>(status: impl Into<Option<&'a StackStatus>>) -> String {
    status
        .into()
        .map(|s| s.as_str().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl StackDeployer for CloudFormation {
    async fn deploy(&self, stack: &StackInput) -> eyre::Result<DeployOutcome> {
        let existing = self.describe(&stack.name).await?;

        match deploy_action(existing.as_ref())? {
            DeployAction::Update => {}
            action => {
                if action == DeployAction::Recreate {
                    log::info!(
                        "Stack {} failed to create, deleting it before creating again",
                        stack.name
                    );

                    self.delete(&stack.name).await?;
                }

                self.create(stack).await?;
                self.wait(&stack.name, "Creating").await?;
                return Ok(DeployOutcome::Created);
            }
        }

        if !self.update(stack).await? {
            log::info!("Stack {} is up to date", stack.name);
            return Ok(DeployOutcome::Unchanged);
        }

        self.wait(&stack.name, "Updating").await?;
        Ok(DeployOutcome::Updated)
    }

    async fn describe(&self, name: &str) -> eyre::Result<Option<StackSummary>> {
        let result = self.client.describe_stacks().stack_name(name).send().await;

        let output = match result {
            Ok(output) => output,

            // Missing stacks are reported as a validation error
            Err(e)
                if e.as_service_error().is_some_and(|e| {
                    e.code() == Some("ValidationError")
                        && e.message().is_some_and(|m| m.contains("does not exist"))
                }) =>
            {
                return Ok(None);
            }

            Err(e) => {
                return Err(sdk_error(e)).wrap_err_with(|| format!("Failed to describe stack {name}"))
            }
        };

        let Some(stack) = output.stacks().first() else {
            return Ok(None);
        };

        Ok(Some(StackSummary {
            name: text(stack.stack_name()),
            status: status_str(stack.stack_status()),
            outputs: stack
                .outputs()
                .iter()
                .map(|o| (text(o.output_key()), text(o.output_value())))
                .collect(),
            tags: stack
                .tags()
                .iter()
                .map(|t| (text(t.key()), text(t.value())))
                .collect(),
        }))
    }

    async fn delete(&self, name: &str) -> eyre::Result<()> {
        if self.describe(name).await?.is_none() {
            log::info!("Stack {name} does not exist, nothing to delete");
            return Ok(());
        }

        self.client
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err_with(|| format!("Failed to delete stack {name}"))?;

        match self.wait(name, "Deleting").await? {
            Some(stack) if stack.status != stack::DELETE_COMPLETE => {
                Err(eyre!("Stack {name} ended in {}", stack.status))
            }
            _ => Ok(()),
        }
    }
}
