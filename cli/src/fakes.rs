//! In-memory stand-ins for AWS, docker and the terminal, used by unit tests

use crate::aws::cloudformation::{DeployOutcome, StackDeployer, StackInput, StackSummary};
use crate::aws::codepipeline::{Pipeline, Pipelines, StageState};
use crate::aws::ecr::{Registry, RegistryAuth};
use crate::aws::ecs::{Ecs, RunTaskInput, ServiceStatus};
use crate::aws::s3::{object_url, ArtifactUploader};
use crate::aws::ssm::{Parameters, PutOutcome, SecretExists, SecretInput, SecretStore};
use crate::aws::sts::Identity;
use crate::context::Context;
use crate::docker::{BuildInput, ImageBuilder};
use crate::prompt::{Choice, Prompter, Validator};
use crate::store::Store;
use async_trait::async_trait;
use copilot_common::model::{Application, Environment, Workload, WorkloadType};
use copilot_common::naming;
use copilot_common::template::application::ARTIFACT_BUCKET;
use copilot_common::template::environment as env_outputs;
use eyre::eyre;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub(crate) const ACCOUNT: &str = "123456789012";
pub(crate) const REGION: &str = "us-west-2";

#[derive(Default)]
pub(crate) struct MemoryParameters {
    values: Mutex<BTreeMap<String, String>>,
}

#[async_trait]
impl Parameters for MemoryParameters {
    async fn create(
        &self,
        name: &str,
        value: &str,
        _tags: &BTreeMap<String, String>,
    ) -> eyre::Result<bool> {
        let mut values = self.values.lock().unwrap();

        if values.contains_key(name) {
            return Ok(false);
        }

        values.insert(name.to_string(), value.to_string());
        Ok(true)
    }

    async fn get(&self, name: &str) -> eyre::Result<Option<String>> {
        Ok(self.values.lock().unwrap().get(name).cloned())
    }

    async fn list(&self, path: &str) -> eyre::Result<Vec<String>> {
        let prefix = format!("{path}/");

        Ok(self
            .values
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| {
                name.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .map(|(_, value)| value.clone())
            .collect())
    }

    async fn delete(&self, name: &str) -> eyre::Result<()> {
        self.values.lock().unwrap().remove(name);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Answer {
    Text(String),
    Yes(bool),
}

/// Replies with the queued answers in order, fails when a question is not expected
#[derive(Default)]
pub(crate) struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub(crate) fn answer(&self, answer: Answer) {
        self.answers.lock().unwrap().push_back(answer);
    }

    /// Messages of the questions asked so far
    pub(crate) fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    fn next(&self, message: &str) -> eyre::Result<Answer> {
        self.asked.lock().unwrap().push(message.to_string());

        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| eyre!("Unexpected question: {message}"))
    }
}

impl Prompter for ScriptedPrompter {
    fn get(
        &self,
        message: &str,
        _default: Option<&str>,
        validator: Validator,
    ) -> eyre::Result<String> {
        match self.next(message)? {
            Answer::Text(text) => validator(&text).map(|_| text),
            other => Err(eyre!("Expected text for \"{message}\", got {other:?}")),
        }
    }

    fn get_secret(&self, message: &str) -> eyre::Result<String> {
        match self.next(message)? {
            Answer::Text(text) => Ok(text),
            other => Err(eyre!("Expected text for \"{message}\", got {other:?}")),
        }
    }

    fn select_one(&self, message: &str, choices: &[Choice]) -> eyre::Result<String> {
        match self.next(message)? {
            Answer::Text(text) if choices.iter().any(|c| c.value == text) => Ok(text),
            other => Err(eyre!("{other:?} is not a choice of \"{message}\"")),
        }
    }

    fn confirm(&self, message: &str, _default: bool) -> eyre::Result<bool> {
        match self.next(message)? {
            Answer::Yes(yes) => Ok(yes),
            other => Err(eyre!("Expected yes or no for \"{message}\", got {other:?}")),
        }
    }
}

/// Stacks kept in memory, deploys settle immediately
#[derive(Default)]
pub(crate) struct FakeStacks {
    stacks: Mutex<BTreeMap<String, StackSummary>>,
    deployed: Mutex<Vec<StackInput>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeStacks {
    /// An existing stack with the outputs
    pub(crate) fn add(&self, name: &str, outputs: &[(&str, &str)]) {
        self.stacks.lock().unwrap().insert(
            name.to_string(),
            StackSummary {
                name: name.to_string(),
                status: "CREATE_COMPLETE".into(),
                outputs: outputs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                tags: BTreeMap::new(),
            },
        );
    }

    pub(crate) fn deployed(&self) -> Vec<StackInput> {
        self.deployed.lock().unwrap().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub(crate) fn exists(&self, name: &str) -> bool {
        self.stacks.lock().unwrap().contains_key(name)
    }
}

#[async_trait]
impl StackDeployer for FakeStacks {
    async fn deploy(&self, stack: &StackInput) -> eyre::Result<DeployOutcome> {
        self.deployed.lock().unwrap().push(stack.clone());
        let mut stacks = self.stacks.lock().unwrap();

        match stacks.get_mut(&stack.name) {
            Some(existing) => {
                existing.tags = stack.tags.clone();
                Ok(DeployOutcome::Updated)
            }
            None => {
                stacks.insert(
                    stack.name.clone(),
                    StackSummary {
                        name: stack.name.clone(),
                        status: "CREATE_COMPLETE".into(),
                        outputs: BTreeMap::new(),
                        tags: stack.tags.clone(),
                    },
                );
                Ok(DeployOutcome::Created)
            }
        }
    }

    async fn describe(&self, name: &str) -> eyre::Result<Option<StackSummary>> {
        Ok(self.stacks.lock().unwrap().get(name).cloned())
    }

    async fn delete(&self, name: &str) -> eyre::Result<()> {
        if self.stacks.lock().unwrap().remove(name).is_some() {
            self.deleted.lock().unwrap().push(name.to_string());
        }

        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeRegistry {
    repositories: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub(crate) fn uri(name: &str) -> String {
        format!("{ACCOUNT}.dkr.ecr.{REGION}.amazonaws.com/{name}")
    }

    pub(crate) fn repositories(&self) -> Vec<String> {
        self.repositories.lock().unwrap().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn create_repository(
        &self,
        name: &str,
        _tags: &BTreeMap<String, String>,
    ) -> eyre::Result<String> {
        let mut repositories = self.repositories.lock().unwrap();

        if !repositories.iter().any(|r| r == name) {
            repositories.push(name.to_string());
        }

        Ok(Self::uri(name))
    }

    async fn repository_uri(&self, name: &str) -> eyre::Result<String> {
        match self.repositories.lock().unwrap().iter().any(|r| r == name) {
            true => Ok(Self::uri(name)),
            false => Err(eyre!("Repository {name} not found")),
        }
    }

    async fn auth(&self) -> eyre::Result<RegistryAuth> {
        Ok(RegistryAuth {
            username: "AWS".into(),
            password: "secret".into(),
            endpoint: format!("https://{ACCOUNT}.dkr.ecr.{REGION}.amazonaws.com"),
        })
    }

    async fn delete_repository(&self, name: &str) -> eyre::Result<()> {
        self.repositories.lock().unwrap().retain(|r| r != name);
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeUploader {
    /// Bucket, key and body of every upload
    uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
    emptied: Mutex<Vec<String>>,
}

impl FakeUploader {
    pub(crate) fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }

    pub(crate) fn emptied(&self) -> Vec<String> {
        self.emptied.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactUploader for FakeUploader {
    async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>) -> eyre::Result<String> {
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), body));

        Ok(object_url(bucket, REGION, key))
    }

    async fn empty_bucket(&self, bucket: &str) -> eyre::Result<()> {
        self.emptied.lock().unwrap().push(bucket.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeSecrets {
    secrets: Mutex<BTreeMap<String, SecretInput>>,
}

impl FakeSecrets {
    pub(crate) fn get(&self, name: &str) -> Option<SecretInput> {
        self.secrets.lock().unwrap().get(name).cloned()
    }

    pub(crate) fn add(&self, name: &str, value: &str) {
        self.secrets.lock().unwrap().insert(
            name.to_string(),
            SecretInput {
                name: name.to_string(),
                value: value.to_string(),
                ..Default::default()
            },
        );
    }
}

#[async_trait]
impl SecretStore for FakeSecrets {
    async fn put(&self, secret: &SecretInput) -> eyre::Result<PutOutcome> {
        let mut secrets = self.secrets.lock().unwrap();

        let outcome = match secrets.contains_key(&secret.name) {
            false => PutOutcome::Created,
            true if secret.overwrite => PutOutcome::Updated,
            true => return Err(SecretExists(secret.name.clone()).into()),
        };

        secrets.insert(secret.name.clone(), secret.clone());
        Ok(outcome)
    }
}

#[derive(Default)]
pub(crate) struct FakeEcs {
    services: Mutex<BTreeMap<String, ServiceStatus>>,
    runs: Mutex<Vec<RunTaskInput>>,
}

impl FakeEcs {
    pub(crate) fn add_service(&self, cluster: &str, service: &str, status: ServiceStatus) {
        self.services
            .lock()
            .unwrap()
            .insert(format!("{cluster}/{service}"), status);
    }

    pub(crate) fn runs(&self) -> Vec<RunTaskInput> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Ecs for FakeEcs {
    async fn service_status(&self, cluster: &str, service: &str) -> eyre::Result<ServiceStatus> {
        self.services
            .lock()
            .unwrap()
            .get(&format!("{cluster}/{service}"))
            .cloned()
            .ok_or_else(|| eyre!("Service {service} not found in cluster {cluster}"))
    }

    async fn run_task(&self, input: &RunTaskInput) -> eyre::Result<Vec<String>> {
        self.runs.lock().unwrap().push(input.clone());

        Ok((0..input.count)
            .map(|i| format!("arn:aws:ecs:{REGION}:{ACCOUNT}:task/{}/{i}", input.group))
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakePipelines {
    pipelines: Mutex<Vec<Pipeline>>,
    states: Mutex<BTreeMap<String, Vec<StageState>>>,
}

impl FakePipelines {
    pub(crate) fn add(&self, pipeline: Pipeline, states: Vec<StageState>) {
        self.states
            .lock()
            .unwrap()
            .insert(pipeline.name.clone(), states);
        self.pipelines.lock().unwrap().push(pipeline);
    }
}

#[async_trait]
impl Pipelines for FakePipelines {
    async fn list_pipelines(&self) -> eyre::Result<Vec<String>> {
        Ok(self
            .pipelines
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.name.clone())
            .collect())
    }

    async fn get_pipeline(&self, name: &str) -> eyre::Result<Pipeline> {
        self.pipelines
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| eyre!("Pipeline {name} not found"))
    }

    async fn state(&self, name: &str) -> eyre::Result<Vec<StageState>> {
        self.states
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| eyre!("Pipeline {name} not found"))
    }
}

pub(crate) struct FakeIdentity;

#[async_trait]
impl Identity for FakeIdentity {
    async fn account_id(&self) -> eyre::Result<String> {
        Ok(ACCOUNT.to_string())
    }
}

/// Records the docker calls as "build <tags>", "login <endpoint>", "push <image>"
#[derive(Default)]
pub(crate) struct FakeDocker {
    calls: Mutex<Vec<String>>,
}

impl FakeDocker {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageBuilder for FakeDocker {
    async fn build(&self, input: &BuildInput) -> eyre::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("build {}", input.tags.join(" ")));
        Ok(())
    }

    async fn login(&self, auth: &RegistryAuth) -> eyre::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("login {}", auth.endpoint));
        Ok(())
    }

    async fn push(&self, image: &str) -> eyre::Result<()> {
        self.calls.lock().unwrap().push(format!("push {image}"));
        Ok(())
    }
}

/// Every fake together, with shortcuts to seed the store and the stacks
pub(crate) struct Fakes {
    pub(crate) parameters: Arc<MemoryParameters>,
    pub(crate) prompt: Arc<ScriptedPrompter>,
    pub(crate) stacks: Arc<FakeStacks>,
    pub(crate) registry: Arc<FakeRegistry>,
    pub(crate) uploader: Arc<FakeUploader>,
    pub(crate) secrets: Arc<FakeSecrets>,
    pub(crate) ecs: Arc<FakeEcs>,
    pub(crate) pipelines: Arc<FakePipelines>,
    pub(crate) docker: Arc<FakeDocker>,
}

impl Fakes {
    pub(crate) fn new() -> Self {
        Fakes {
            parameters: Arc::default(),
            prompt: Arc::default(),
            stacks: Arc::default(),
            registry: Arc::default(),
            uploader: Arc::default(),
            secrets: Arc::default(),
            ecs: Arc::default(),
            pipelines: Arc::default(),
            docker: Arc::default(),
        }
    }

    pub(crate) fn store(&self) -> Store {
        Store::new(self.parameters.clone())
    }

    pub(crate) fn context(&self, dir: &Path) -> Context {
        Context {
            store: self.store(),
            prompt: self.prompt.clone(),
            stacks: self.stacks.clone(),
            registry: self.registry.clone(),
            uploader: self.uploader.clone(),
            secrets: self.secrets.clone(),
            ecs: self.ecs.clone(),
            pipelines: self.pipelines.clone(),
            identity: Arc::new(FakeIdentity),
            docker: self.docker.clone(),
            region: Some(REGION.to_string()),
            dir: dir.to_path_buf(),
        }
    }

    /// A registered application with its deployed stack
    pub(crate) async fn app(&self, name: &str) {
        self.store()
            .create_application(&Application {
                name: name.to_string(),
                account_id: ACCOUNT.to_string(),
                domain: None,
                tags: BTreeMap::new(),
            })
            .await
            .unwrap();

        self.stacks.add(
            &naming::app_stack(name),
            &[(ARTIFACT_BUCKET, format!("{name}-artifacts").as_str())],
        );
    }

    /// A registered environment with its deployed stack
    pub(crate) async fn env(&self, app: &str, name: &str) {
        self.store()
            .create_environment(&Environment {
                app: app.to_string(),
                name: name.to_string(),
                region: REGION.to_string(),
                account_id: ACCOUNT.to_string(),
                prod: false,
            })
            .await
            .unwrap();

        self.stacks.add(
            &naming::env_stack(app, name),
            &[
                (env_outputs::CLUSTER_ID, format!("{app}-{name}-cluster").as_str()),
                (env_outputs::PUBLIC_SUBNETS, "subnet-1,subnet-2"),
                (env_outputs::PRIVATE_SUBNETS, "subnet-3,subnet-4"),
                (env_outputs::SECURITY_GROUP, "sg-1"),
                (env_outputs::VPC_ID, "vpc-1"),
            ],
        );
    }

    pub(crate) async fn workload(&self, app: &str, name: &str, kind: WorkloadType) {
        self.store()
            .create_workload(&Workload {
                app: app.to_string(),
                name: name.to_string(),
                kind,
            })
            .await
            .unwrap();
    }
}
