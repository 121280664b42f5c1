use crate::aws::cloudformation::{CloudFormation, StackDeployer};
use crate::aws::codepipeline::{CodePipeline, Pipelines};
use crate::aws::ecr::{Ecr, Registry};
use crate::aws::ecs::{Ecs, EcsClient};
use crate::aws::s3::{ArtifactUploader, S3};
use crate::aws::ssm::{SecretStore, Ssm};
use crate::aws::sts::{Identity, Sts};
use crate::config::build_config;
use crate::docker::{Docker, ImageBuilder};
use crate::prompt::{Prompter, Terminal};
use crate::selector::Selector;
use crate::store::Store;
use crate::workspace::Workspace;
use aws_config::SdkConfig;
use eyre::{ContextCompat, WrapErr};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a command talks to: the config store, AWS, docker, the terminal
///
/// Cheap to clone, runners keep their own copy.
#[derive(Clone)]
pub(crate) struct Context {
    pub(crate) store: Store,
    pub(crate) prompt: Arc<dyn Prompter>,
    pub(crate) stacks: Arc<dyn StackDeployer>,
    pub(crate) registry: Arc<dyn Registry>,
    pub(crate) uploader: Arc<dyn ArtifactUploader>,
    pub(crate) secrets: Arc<dyn SecretStore>,
    pub(crate) ecs: Arc<dyn Ecs>,
    pub(crate) pipelines: Arc<dyn Pipelines>,
    pub(crate) identity: Arc<dyn Identity>,
    pub(crate) docker: Arc<dyn ImageBuilder>,

    /// Region of the AWS config, commands deploying anything require it
    pub(crate) region: Option<String>,

    /// Directory the command was started in
    pub(crate) dir: PathBuf,
}

impl Context {
    pub(crate) fn from_aws(config: &SdkConfig) -> eyre::Result<Self> {
        let ssm = Arc::new(Ssm::new(config));

        Ok(Context {
            store: Store::new(ssm.clone()),
            prompt: Arc::new(Terminal::new()),
            stacks: Arc::new(CloudFormation::new(config, build_config()?.poll_interval)),
            registry: Arc::new(Ecr::new(config)),
            uploader: Arc::new(S3::new(config)),
            secrets: ssm,
            ecs: Arc::new(EcsClient::new(config)),
            pipelines: Arc::new(CodePipeline::new(config)),
            identity: Arc::new(Sts::new(config)),
            docker: Arc::new(Docker),
            region: config.region().map(|r| r.to_string()),
            dir: std::env::current_dir().wrap_err("Failed to get the current directory")?,
        })
    }

    pub(crate) fn region(&self) -> eyre::Result<&str> {
        self.region
            .as_deref()
            .wrap_err("No AWS region configured, pass --region or set AWS_REGION")
    }

    pub(crate) fn workspace(&self) -> eyre::Result<Workspace> {
        Workspace::find(&self.dir)
    }

    pub(crate) fn selector(&self) -> Selector<'_> {
        Selector::new(&self.store, self.prompt.as_ref())
    }

    /// Application from the flag, then the workspace, then a prompt
    pub(crate) async fn app_name(&self, flag: Option<&str>) -> eyre::Result<String> {
        if let Some(name) = flag {
            return Ok(name.to_string());
        }

        if let Ok(summary) = self.workspace().and_then(|w| w.summary()) {
            return Ok(summary.application);
        }

        self.selector()
            .application("Which application does it belong to?")
            .await
    }
}
