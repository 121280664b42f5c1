//! Deployments shared by the commands: oversized templates, application and environment outputs

use crate::aws::cloudformation::{DeployOutcome, StackInput};
use crate::config::build_config;
use crate::context::Context;
use copilot_common::naming;
use copilot_common::template::application::ARTIFACT_BUCKET;
use eyre::{ContextCompat, WrapErr};
use std::collections::BTreeMap;

/// Bucket of the application stack, keeps addon templates and pipeline artifacts
pub(crate) async fn artifact_bucket(ctx: &Context, app: &str) -> eyre::Result<String> {
    let stack = naming::app_stack(app);

    ctx.stacks
        .outputs(&stack)
        .await
        .wrap_err_with(|| format!("The {app} application is not deployed"))?
        .get(ARTIFACT_BUCKET)
        .cloned()
        .wrap_err_with(|| format!("Stack {stack} has no {ARTIFACT_BUCKET} output"))
}

/// Outputs of an environment stack, e.g. its cluster and subnets
pub(crate) async fn env_outputs(
    ctx: &Context,
    app: &str,
    env: &str,
) -> eyre::Result<BTreeMap<String, String>> {
    ctx.stacks
        .outputs(&naming::env_stack(app, env))
        .await
        .wrap_err_with(|| format!("The {env} environment is not deployed"))
}

/// Comma separated output of a stack, e.g. the subnets of an environment
pub(crate) fn output_list(outputs: &BTreeMap<String, String>, name: &str) -> Vec<String> {
    outputs
        .get(name)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Deploy a stack of the application
///
/// Templates over the inline limit are uploaded to the artifact bucket first.
pub(crate) async fn deploy(
    ctx: &Context,
    app: &str,
    mut stack: StackInput,
) -> eyre::Result<DeployOutcome> {
    if stack.template.len() > build_config()?.template_body_limit {
        let bucket = artifact_bucket(ctx, app).await?;
        let key = format!(
            "manifests/{}/{}.json",
            stack.name,
            sha256::digest(stack.template.as_bytes())
        );

        log::info!("Template of {} is too large, uploading to s3://{bucket}/{key}", stack.name);

        let url = ctx
            .uploader
            .upload(&bucket, &key, stack.template.clone().into_bytes())
            .await?;

        stack.template_url = Some(url);
    }

    ctx.stacks.deploy(&stack).await
}
