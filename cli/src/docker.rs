//! Container images built and pushed with the docker CLI

use crate::aws::ecr::{Registry, RegistryAuth};
use crate::process::Process;
use async_trait::async_trait;
use eyre::{eyre, ContextCompat, WrapErr};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct BuildInput {
    pub(crate) dockerfile: PathBuf,
    pub(crate) context: PathBuf,

    /// Full image references, e.g. "<repository uri>:<tag>"
    pub(crate) tags: Vec<String>,
}

#[async_trait]
pub(crate) trait ImageBuilder: Send + Sync {
    async fn build(&self, input: &BuildInput) -> eyre::Result<()>;
    async fn login(&self, auth: &RegistryAuth) -> eyre::Result<()>;
    async fn push(&self, image: &str) -> eyre::Result<()>;
}

pub(crate) struct Docker;

impl Docker {
    /// Run docker with the output shown in one line, print all of it on failure
    async fn run(args: Vec<String>, stdin: Option<String>) -> eyre::Result<()> {
        tokio::task::spawn_blocking(move || -> eyre::Result<()> {
            log::debug!("Running docker {}", args.join(" "));

            let mut child = Command::new("docker")
                .args(&args)
                .stdin(if stdin.is_some() {
                    Stdio::piped()
                } else {
                    Stdio::null()
                })
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .wrap_err("Failed to run docker, is it installed?")?;

            if let Some(input) = stdin {
                // Dropped at the end of the block, closing the pipe
                let mut pipe = child.stdin.take().wrap_err("Failed to open docker stdin")?;
                pipe.write_all(input.as_bytes())
                    .wrap_err("Failed to write to docker stdin")?;
            }

            let mut process = Process::new(child);
            let status = process.log()?;

            if !status.success() {
                process.print_error();
                return Err(eyre!("docker {} exited with {status}", args[0]));
            }

            Ok(())
        })
        .await
        .wrap_err("Docker task panicked")?
    }
}

#[async_trait]
impl ImageBuilder for Docker {
    async fn build(&self, input: &BuildInput) -> eyre::Result<()> {
        Self::run(build_args(input), None).await
    }

    async fn login(&self, auth: &RegistryAuth) -> eyre::Result<()> {
        Self::run(
            vec![
                "login".into(),
                "--username".into(),
                auth.username.clone(),
                "--password-stdin".into(),
                auth.endpoint.clone(),
            ],
            Some(auth.password.clone()),
        )
        .await
    }

    async fn push(&self, image: &str) -> eyre::Result<()> {
        Self::run(vec!["push".into(), image.to_string()], None).await
    }
}

/// Build the image, log in to the registry and push every tag
pub(crate) async fn publish(
    docker: &dyn ImageBuilder,
    registry: &dyn Registry,
    input: &BuildInput,
) -> eyre::Result<()> {
    println!(
        "{} {}",
        console::style("Building").green().bold(),
        console::style(input.dockerfile.display()).dim()
    );

    docker.build(input).await.wrap_err("Failed to build the image")?;

    let auth = registry
        .auth()
        .await
        .wrap_err("Failed to get the registry credentials")?;

    docker.login(&auth).await.wrap_err("Failed to log in to the registry")?;

    for tag in &input.tags {
        println!("{} {tag}", console::style("Pushing").green().bold());
        docker.push(tag).await.wrap_err("Failed to push the image")?;
    }

    Ok(())
}

/// Images are always built for the platform Fargate runs on
fn build_args(input: &BuildInput) -> Vec<String> {
    let mut args = vec![
        "build".to_string(),
        "--platform".into(),
        "linux/x86_64".into(),
        "--file".into(),
        input.dockerfile.display().to_string(),
    ];

    for tag in &input.tags {
        args.push("--tag".into());
        args.push(tag.clone());
    }

    args.push(input.context.display().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeDocker, FakeRegistry};

    #[tokio::test]
    async fn publish_logs_in_before_pushing() {
        let docker = FakeDocker::default();

        publish(
            &docker,
            &FakeRegistry::default(),
            &BuildInput {
                dockerfile: "Dockerfile".into(),
                context: ".".into(),
                tags: vec!["repo:v1".into()],
            },
        )
        .await
        .unwrap();

        assert_eq!(
            docker.calls(),
            vec![
                "build repo:v1",
                "login https://123456789012.dkr.ecr.us-west-2.amazonaws.com",
                "push repo:v1"
            ]
        );
    }

    #[test]
    fn every_tag_is_passed_to_build() {
        let args = build_args(&BuildInput {
            dockerfile: "api/Dockerfile".into(),
            context: "api".into(),
            tags: vec!["repo:latest".into(), "repo:v1".into()],
        });

        assert_eq!(
            args.join(" "),
            "build --platform linux/x86_64 --file api/Dockerfile --tag repo:latest --tag repo:v1 api"
        );
    }
}
