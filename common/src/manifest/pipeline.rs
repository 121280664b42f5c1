use super::{from_yaml, to_yaml_with_header};
use crate::repository::{Provider, Repository};
use crate::validate;
use eyre::eyre;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_BUILD_IMAGE: &str = "aws/codebuild/amazonlinux2-x86_64-standard:5.0";

/// Directory in the build output with the packaged templates
pub const OUTPUT_DIR: &str = "infrastructure";

/// Continuous delivery pipeline, kept in copilot/pipelines/<name>/manifest.yml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineManifest {
    pub name: String,
    pub version: u32,
    pub source: Source,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Build>,

    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub provider: Provider,
    pub properties: SourceProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProperties {
    pub repository: String,
    pub branch: String,

    /// Existing CodeStar connection to reuse
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    pub image: String,
}

/// A deployment to one environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_approval: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_commands: Vec<String>,
}

impl PipelineManifest {
    pub fn new(
        name: &str,
        repository: &Repository,
        branch: &str,
        environments: &[String],
    ) -> eyre::Result<Self> {
        let manifest = PipelineManifest {
            name: name.to_string(),
            version: 1,
            source: Source {
                provider: repository.provider,
                properties: SourceProperties {
                    repository: repository.url(),
                    branch: branch.to_string(),
                    connection_name: None,
                },
            },
            build: Some(Build {
                image: DEFAULT_BUILD_IMAGE.to_string(),
            }),
            stages: environments
                .iter()
                .map(|env| Stage {
                    name: env.clone(),
                    requires_approval: false,
                    test_commands: vec![],
                })
                .collect(),
        };

        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_yaml(content: &str) -> eyre::Result<Self> {
        let manifest: Self = from_yaml(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_yaml(&self) -> eyre::Result<String> {
        to_yaml_with_header(
            self,
            "This YAML file defines the relationship and deployment ordering of your environments.\n\
             Set \"requires_approval\" to gate a stage behind a manual approval,\n\
             and \"test_commands\" to run commands after the stage is deployed.",
        )
    }

    pub fn validate(&self) -> eyre::Result<()> {
        validate::pipeline_name(&self.name)?;

        if self.version != 1 {
            return Err(eyre!("Pipeline manifest version {} is not supported", self.version));
        }

        if self.stages.is_empty() {
            return Err(eyre!("Pipeline \"{}\" must have at least one stage", self.name));
        }

        let mut seen = HashSet::new();

        for stage in &self.stages {
            if !seen.insert(stage.name.as_str()) {
                return Err(eyre!("Stage \"{}\" is listed more than once", stage.name));
            }
        }

        let repository = self.repository()?;

        if repository.provider != self.source.provider {
            return Err(eyre!(
                "Repository {} is not a {} repository",
                self.source.properties.repository,
                self.source.provider
            ));
        }

        Ok(())
    }

    pub fn repository(&self) -> eyre::Result<Repository> {
        Repository::parse(&self.source.properties.repository)
    }

    pub fn build_image(&self) -> &str {
        self.build
            .as_ref()
            .map(|b| b.image.as_str())
            .unwrap_or(DEFAULT_BUILD_IMAGE)
    }

    pub fn environments(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.clone()).collect()
    }

    /// Build instructions that package every workload of the workspace for each stage
    pub fn buildspec(&self) -> String {
        let environments = self.environments().join(" ");

        format!(
            r#"# Buildspec runs in the build stage of the "{name}" pipeline.
version: 0.2
env:
  variables:
    # URL of a copilot release binary for linux
    COPILOT_BINARY_URL: ""
phases:
  install:
    commands:
      - curl -sSL "$COPILOT_BINARY_URL" -o /usr/local/bin/copilot
      - chmod +x /usr/local/bin/copilot
  build:
    commands:
      - TAG=$(echo $CODEBUILD_RESOLVED_SOURCE_VERSION | cut -c 1-8)
      - mkdir -p {output}
      - |
        for env in {environments}; do
          for svc in $(copilot svc ls --local --json | jq -r '.[].name'); do
            copilot svc package -n $svc -e $env --tag $TAG --output-dir {output} --upload-assets
          done
          for job in $(copilot job ls --local --json | jq -r '.[].name'); do
            copilot job package -n $job -e $env --tag $TAG --output-dir {output} --upload-assets
          done
        done
artifacts:
  files:
    - "{output}/*"
"#,
            name = self.name,
            output = OUTPUT_DIR,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> Repository {
        Repository::parse("git@github.com:acme/shop.git").unwrap()
    }

    #[test]
    fn new_pipeline_has_a_stage_per_environment() {
        let envs = vec!["test".to_string(), "prod".to_string()];
        let manifest = PipelineManifest::new("pipeline-shop-shop", &repo(), "main", &envs).unwrap();

        assert_eq!(manifest.environments(), envs);
        assert_eq!(manifest.source.provider, Provider::GitHub);
        assert_eq!(
            manifest.source.properties.repository,
            "https://github.com/acme/shop"
        );
        assert_eq!(manifest.build_image(), DEFAULT_BUILD_IMAGE);
    }

    #[test]
    fn manifest_round_trips_with_optional_fields() {
        let yaml = r#"
name: release
version: 1
source:
  provider: GitHub
  properties:
    repository: https://github.com/acme/shop
    branch: main
    connection_name: acme-github
stages:
  - name: test
    test_commands:
      - make integration
  - name: prod
    requires_approval: true
"#;

        let manifest = PipelineManifest::from_yaml(yaml).unwrap();

        assert_eq!(manifest.stages[0].test_commands, vec!["make integration"]);
        assert!(manifest.stages[1].requires_approval);
        assert!(!manifest.stages[0].requires_approval);
        assert_eq!(
            manifest.source.properties.connection_name.as_deref(),
            Some("acme-github")
        );

        let yaml = manifest.to_yaml().unwrap();
        assert!(!yaml.contains("requires_approval: false"));
        assert_eq!(PipelineManifest::from_yaml(&yaml).unwrap(), manifest);
    }

    #[test]
    fn invalid_pipelines() {
        assert!(PipelineManifest::new("release", &repo(), "main", &[]).is_err());

        let envs = vec!["test".to_string(), "test".to_string()];
        assert!(PipelineManifest::new("release", &repo(), "main", &envs).is_err());

        let mut manifest =
            PipelineManifest::new("release", &repo(), "main", &["test".to_string()]).unwrap();
        manifest.source.provider = Provider::CodeCommit;
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn buildspec_packages_every_stage() {
        let envs = vec!["test".to_string(), "prod".to_string()];
        let manifest = PipelineManifest::new("release", &repo(), "main", &envs).unwrap();
        let buildspec = manifest.buildspec();

        assert!(buildspec.contains("for env in test prod; do"));
        assert!(buildspec.contains("--output-dir infrastructure --upload-assets"));
        assert!(serde_yaml::from_str::<serde_yaml::Value>(&buildspec).is_ok());
    }
}
