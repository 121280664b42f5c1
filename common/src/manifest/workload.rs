use super::{from_yaml, to_yaml_with_header};
use crate::model::WorkloadType;
use crate::schedule::to_aws_schedule;
use crate::validate;
use eyre::{eyre, OptionExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CPU: u32 = 256;
const DEFAULT_MEMORY: u32 = 512;
const DEFAULT_APP_RUNNER_CPU: u32 = 1024;
const DEFAULT_APP_RUNNER_MEMORY: u32 = 2048;
const DEFAULT_PORT: u16 = 80;

/// Description of a service or a job, kept in copilot/<name>/manifest.yml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadManifest {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: WorkloadType,

    pub image: Image,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<Http>,

    /// Trigger of a scheduled job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<Trigger>,

    pub cpu: u32,
    pub memory: u32,

    /// Number of tasks, services only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    /// Env var name to SSM parameter name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, String>,

    /// Per-environment overrides
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, Overrides>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildArgs>,

    /// Prebuilt image, used instead of building one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Either a path to the Dockerfile or the detailed form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildArgs {
    Path(String),
    Detailed {
        dockerfile: String,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },
}

impl BuildArgs {
    pub fn dockerfile(&self) -> &str {
        match self {
            BuildArgs::Path(path) => path,
            BuildArgs::Detailed { dockerfile, .. } => dockerfile,
        }
    }

    /// Build context, defaults to the directory of the Dockerfile
    pub fn context(&self) -> PathBuf {
        match self {
            BuildArgs::Detailed {
                context: Some(context),
                ..
            } => PathBuf::from(context),
            _ => Path::new(self.dockerfile())
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Http {
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub schedule: String,
}

/// Fields that can be changed per environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<Http>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<Trigger>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, String>,
}

/// Inputs collected by `svc init` and `job init`
#[derive(Debug, Clone, Default)]
pub struct WorkloadProps {
    pub name: String,
    pub dockerfile: Option<String>,
    pub image: Option<String>,
    pub port: Option<u16>,
    pub schedule: Option<String>,
    pub retries: Option<u32>,
    pub timeout: Option<String>,
}

impl WorkloadManifest {
    pub fn new(kind: WorkloadType, props: &WorkloadProps) -> eyre::Result<Self> {
        if props.dockerfile.is_none() && props.image.is_none() {
            return Err(eyre!("Either a Dockerfile or an image is required"));
        }

        let image = Image {
            build: props.dockerfile.clone().map(BuildArgs::Path),
            location: props.image.clone(),
            port: match kind {
                WorkloadType::LoadBalancedWebService | WorkloadType::RequestDrivenWebService => {
                    Some(props.port.unwrap_or(DEFAULT_PORT))
                }
                WorkloadType::BackendService => props.port,
                WorkloadType::WorkerService | WorkloadType::ScheduledJob => None,
            },
        };

        let (cpu, memory) = match kind {
            WorkloadType::RequestDrivenWebService => {
                (DEFAULT_APP_RUNNER_CPU, DEFAULT_APP_RUNNER_MEMORY)
            }
            _ => (DEFAULT_CPU, DEFAULT_MEMORY),
        };

        let manifest = WorkloadManifest {
            name: props.name.clone(),
            kind,
            image,
            http: matches!(kind, WorkloadType::LoadBalancedWebService).then(|| Http {
                path: "/".into(),
                healthcheck: Some("/".into()),
            }),
            on: kind
                .is_job()
                .then(|| {
                    props
                        .schedule
                        .clone()
                        .ok_or_eyre("A schedule is required for a job")
                        .map(|schedule| Trigger { schedule })
                })
                .transpose()?,
            cpu,
            memory,
            count: kind.is_service().then_some(1),
            retries: kind.is_job().then_some(props.retries.unwrap_or(0)),
            timeout: props.timeout.clone(),
            variables: BTreeMap::new(),
            secrets: BTreeMap::new(),
            environments: BTreeMap::new(),
        };

        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_yaml(content: &str) -> eyre::Result<Self> {
        from_yaml(content)
    }

    pub fn to_yaml(&self) -> eyre::Result<String> {
        let noun = if self.kind.is_job() { "job" } else { "service" };

        to_yaml_with_header(
            self,
            &format!(
                "The manifest for the \"{name}\" {noun}.\nType: {kind}\n\nOverride any field per environment under \"environments\".",
                name = self.name,
                kind = self.kind,
            ),
        )
    }

    /// Check fields that are only valid for certain workload types
    pub fn validate(&self) -> eyre::Result<()> {
        validate::workload_name(&self.name)?;

        if self.image.build.is_none() && self.image.location.is_none() {
            return Err(eyre!(
                "\"image.build\" or \"image.location\" must be set for \"{}\"",
                self.name
            ));
        }

        if self.image.build.is_some() && self.image.location.is_some() {
            return Err(eyre!(
                "\"image.build\" and \"image.location\" are mutually exclusive for \"{}\"",
                self.name
            ));
        }

        if self.kind.is_public() && self.image.port.is_none() {
            return Err(eyre!("\"image.port\" is required for a {}", self.kind));
        }

        if self.kind.is_job() {
            let trigger = self
                .on
                .as_ref()
                .ok_or_eyre("\"on.schedule\" is required for a job")?;

            to_aws_schedule(&trigger.schedule)?;
        }

        if let Some(timeout) = &self.timeout {
            validate::timeout(timeout)?;
        }

        Ok(())
    }

    /// Manifest with the overrides of an environment applied
    pub fn apply_env(&self, env: &str) -> eyre::Result<Self> {
        let mut manifest = self.clone();
        manifest.environments.clear();

        let Some(overrides) = self.environments.get(env) else {
            return Ok(manifest);
        };

        if let Some(image) = &overrides.image {
            if image.location.is_some() {
                manifest.image.location = image.location.clone();
                manifest.image.build = None;
            }

            if image.build.is_some() {
                manifest.image.build = image.build.clone();
                manifest.image.location = None;
            }

            if image.port.is_some() {
                manifest.image.port = image.port;
            }
        }

        if let Some(http) = &overrides.http {
            manifest.http = Some(http.clone());
        }

        if let Some(on) = &overrides.on {
            manifest.on = Some(on.clone());
        }

        manifest.cpu = overrides.cpu.unwrap_or(manifest.cpu);
        manifest.memory = overrides.memory.unwrap_or(manifest.memory);
        manifest.count = overrides.count.or(manifest.count);
        manifest.retries = overrides.retries.or(manifest.retries);
        manifest.timeout = overrides.timeout.clone().or(manifest.timeout);

        manifest.variables.extend(overrides.variables.clone());
        manifest.secrets.extend(overrides.secrets.clone());

        manifest.validate()?;
        Ok(manifest)
    }

    /// EventBridge schedule expression of a job
    pub fn aws_schedule(&self) -> eyre::Result<Option<String>> {
        self.on
            .as_ref()
            .map(|on| to_aws_schedule(&on.schedule))
            .transpose()
    }

    pub fn timeout(&self) -> eyre::Result<Option<Duration>> {
        self.timeout.as_deref().map(validate::timeout).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(name: &str) -> WorkloadProps {
        WorkloadProps {
            name: name.into(),
            dockerfile: Some("./api/Dockerfile".into()),
            ..Default::default()
        }
    }

    #[test]
    fn load_balanced_service_defaults() {
        let manifest = WorkloadManifest::new(WorkloadType::LoadBalancedWebService, &props("api"))
            .unwrap();

        assert_eq!(manifest.image.port, Some(80));
        assert_eq!(manifest.count, Some(1));
        assert_eq!(manifest.cpu, 256);
        assert_eq!(manifest.memory, 512);
        assert_eq!(manifest.http.as_ref().unwrap().path, "/");
        assert!(manifest.on.is_none());
    }

    #[test]
    fn request_driven_service_gets_app_runner_sizes() {
        let mut props = props("web");
        props.port = Some(8080);

        let manifest =
            WorkloadManifest::new(WorkloadType::RequestDrivenWebService, &props).unwrap();

        assert_eq!(manifest.image.port, Some(8080));
        assert_eq!((manifest.cpu, manifest.memory), (1024, 2048));
        assert!(manifest.http.is_none());
    }

    #[test]
    fn job_requires_a_valid_schedule() {
        assert!(WorkloadManifest::new(WorkloadType::ScheduledJob, &props("report")).is_err());

        let mut job = props("report");
        job.schedule = Some("@every 10s".into());
        assert!(WorkloadManifest::new(WorkloadType::ScheduledJob, &job).is_err());

        job.schedule = Some("@daily".into());
        job.timeout = Some("1h".into());
        let manifest = WorkloadManifest::new(WorkloadType::ScheduledJob, &job).unwrap();

        assert_eq!(manifest.count, None);
        assert_eq!(manifest.retries, Some(0));
        assert_eq!(
            manifest.aws_schedule().unwrap().as_deref(),
            Some("cron(0 0 * * ? *)")
        );
        assert_eq!(manifest.timeout().unwrap(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn yaml_has_a_header_and_parses_back() {
        let manifest =
            WorkloadManifest::new(WorkloadType::BackendService, &props("orders")).unwrap();

        let yaml = manifest.to_yaml().unwrap();
        assert!(yaml.starts_with("# The manifest for the \"orders\" service."));
        assert!(yaml.contains("type: Backend Service"));

        assert_eq!(WorkloadManifest::from_yaml(&yaml).unwrap(), manifest);
    }

    #[test]
    fn build_context_defaults_to_dockerfile_directory() {
        assert_eq!(
            BuildArgs::Path("api/Dockerfile".into()).context(),
            PathBuf::from("api")
        );
        assert_eq!(
            BuildArgs::Path("Dockerfile".into()).context(),
            PathBuf::from(".")
        );
        assert_eq!(
            BuildArgs::Detailed {
                dockerfile: "api/Dockerfile".into(),
                context: Some(".".into()),
            }
            .context(),
            PathBuf::from(".")
        );
    }

    #[test]
    fn environment_overrides_are_merged() {
        let yaml = r#"
name: api
type: Load Balanced Web Service
image:
  build: api/Dockerfile
  port: 8080
http:
  path: /
cpu: 256
memory: 512
count: 1
variables:
  LOG_LEVEL: info
  REGION: us-west-2
environments:
  prod:
    count: 3
    memory: 1024
    variables:
      LOG_LEVEL: warn
    image:
      location: public.ecr.aws/shop/api:stable
"#;

        let manifest = WorkloadManifest::from_yaml(yaml).unwrap();
        let prod = manifest.apply_env("prod").unwrap();

        assert_eq!(prod.count, Some(3));
        assert_eq!(prod.memory, 1024);
        assert_eq!(prod.cpu, 256);
        assert_eq!(prod.variables["LOG_LEVEL"], "warn");
        assert_eq!(prod.variables["REGION"], "us-west-2");
        assert_eq!(
            prod.image.location.as_deref(),
            Some("public.ecr.aws/shop/api:stable")
        );
        assert!(prod.image.build.is_none());
        assert_eq!(prod.image.port, Some(8080));
        assert!(prod.environments.is_empty());

        let test = manifest.apply_env("test").unwrap();
        assert_eq!(test.count, Some(1));
        assert_eq!(test.variables["LOG_LEVEL"], "info");
    }

    #[test]
    fn image_build_and_location_are_exclusive() {
        let mut manifest =
            WorkloadManifest::new(WorkloadType::WorkerService, &props("worker")).unwrap();

        manifest.image.location = Some("nginx".into());
        assert!(manifest.validate().is_err());
    }
}
