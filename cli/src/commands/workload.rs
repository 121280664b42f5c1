//! Logic shared by the service and job commands

pub mod delete;
pub mod deploy;
pub mod init;
pub mod ls;
pub mod package;
pub mod render;

use crate::context::Context;
use crate::docker::{publish, BuildInput};
use crate::selector::WorkspaceSelector;
use crate::workspace::Workspace;
use copilot_common::manifest::WorkloadManifest;
use copilot_common::model::WorkloadType;
use copilot_common::naming;
use eyre::WrapErr;

/// Tag of the built images when none is passed
pub(crate) const DEFAULT_TAG: &str = "latest";

/// Which kind of workload a command deals with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Noun {
    Service,
    Job,
}

impl Noun {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Noun::Service => "service",
            Noun::Job => "job",
        }
    }

    /// Name of the command group, e.g. `copilot svc`
    pub(crate) fn command(&self) -> &'static str {
        match self {
            Noun::Service => "svc",
            Noun::Job => "job",
        }
    }

    pub(crate) fn kinds(&self) -> &'static [WorkloadType] {
        match self {
            Noun::Service => &WorkloadType::SERVICES,
            Noun::Job => &WorkloadType::JOBS,
        }
    }

    pub(crate) fn matches(&self, kind: WorkloadType) -> bool {
        self.kinds().contains(&kind)
    }
}

/// Workload name from the flag, or picked among the ones registered in the application
pub(crate) async fn registered(
    ctx: &Context,
    noun: Noun,
    app: &str,
    flag: Option<&str>,
    message: &str,
) -> eyre::Result<String> {
    match (flag, noun) {
        (Some(name), _) => Ok(name.to_string()),
        (None, Noun::Service) => ctx.selector().service(message, app).await,
        (None, Noun::Job) => ctx.selector().job(message, app).await,
    }
}

/// Workload name from the flag, or picked among the manifests of the workspace
pub(crate) fn local(
    ctx: &Context,
    workspace: &Workspace,
    noun: Noun,
    flag: Option<&str>,
    message: &str,
) -> eyre::Result<String> {
    let selector = WorkspaceSelector::new(workspace, ctx.prompt.as_ref());

    match (flag, noun) {
        (Some(name), _) => Ok(name.to_string()),
        (None, Noun::Service) => selector.service(message),
        (None, Noun::Job) => selector.job(message),
    }
}

/// Image the workload runs in the environment
///
/// Workloads with a Dockerfile get their image built and pushed to the
/// repository of the workload when `build` is set.
pub(crate) async fn image(
    ctx: &Context,
    workspace: &Workspace,
    app: &str,
    manifest: &WorkloadManifest,
    tag: &str,
    build: bool,
) -> eyre::Result<String> {
    let Some(args) = &manifest.image.build else {
        return manifest
            .image
            .location
            .clone()
            .ok_or_else(|| eyre::eyre!("Manifest of {} has no image", manifest.name));
    };

    let uri = ctx
        .registry
        .repository_uri(&naming::repository(app, &manifest.name))
        .await
        .wrap_err_with(|| format!("Failed to get the repository of {}", manifest.name))?;

    let image = format!("{uri}:{tag}");

    if build {
        let input = BuildInput {
            dockerfile: workspace.root().join(args.dockerfile()),
            context: workspace.root().join(args.context()),
            tags: vec![image.clone()],
        };

        publish(ctx.docker.as_ref(), ctx.registry.as_ref(), &input).await?;
    }

    Ok(image)
}
