use crate::aws::{sdk_error, text};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ecr::types::Tag;
use base64::Engine;
use eyre::{eyre, ContextCompat, WrapErr};
use std::collections::BTreeMap;

/// Docker credentials for a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegistryAuth {
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) endpoint: String,
}

#[async_trait]
pub(crate) trait Registry: Send + Sync {
    /// Create the repository unless it exists, returns its URI
    async fn create_repository(
        &self,
        name: &str,
        tags: &BTreeMap<String, String>,
    ) -> eyre::Result<String>;

    async fn repository_uri(&self, name: &str) -> eyre::Result<String>;

    async fn auth(&self) -> eyre::Result<RegistryAuth>;

    /// Delete the repository with all its images, a missing one is not an error
    async fn delete_repository(&self, name: &str) -> eyre::Result<()>;
}

/// Split the base64 "user:password" token returned by ECR
pub(crate) fn decode_token(token: &str) -> eyre::Result<(String, String)> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(token.trim())
        .wrap_err("Authorization token is not valid base64")?;

    let decoded = String::from_utf8(decoded).wrap_err("Authorization token is not valid UTF-8")?;

    decoded
        .split_once(':')
        .map(|(user, password)| (user.to_string(), password.to_string()))
        .ok_or_else(|| eyre!("Authorization token must be in the user:password form"))
}

pub(crate) struct Ecr {
    client: aws_sdk_ecr::Client,
}

impl Ecr {
    pub(crate) fn new(config: &SdkConfig) -> Self {
        Ecr {
            client: aws_sdk_ecr::Client::new(config),
        }
    }
}

#[async_trait]
impl Registry for Ecr {
    async fn create_repository(
        &self,
        name: &str,
        tags: &BTreeMap<String, String>,
    ) -> eyre::Result<String> {
        let tags = tags
            .iter()
            .map(|(key, value)| {
                Tag::builder()
                    .key(key)
                    .value(value)
                    .build()
                    .wrap_err("Failed to build AWS tag")
            })
            .collect::<eyre::Result<Vec<_>>>()?;

        let result = self
            .client
            .create_repository()
            .repository_name(name)
            .set_tags(Some(tags))
            .send()
            .await;

        match result {
            Ok(output) => {
                if let Some(uri) = output.repository().and_then(|r| r.repository_uri()) {
                    return Ok(uri.to_string());
                }
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|e| e.is_repository_already_exists_exception()) =>
            {
                log::info!("Repository {name} already exists");
            }
            Err(e) => {
                return Err(sdk_error(e))
                    .wrap_err_with(|| format!("Failed to create repository {name}"))
            }
        }

        self.repository_uri(name).await
    }

    async fn repository_uri(&self, name: &str) -> eyre::Result<String> {
        let output = self
            .client
            .describe_repositories()
            .repository_names(name)
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err_with(|| format!("Failed to describe repository {name}"))?;

        output
            .repositories()
            .first()
            .and_then(|r| r.repository_uri())
            .map(str::to_string)
            .wrap_err_with(|| format!("Repository {name} has no URI"))
    }

    async fn auth(&self) -> eyre::Result<RegistryAuth> {
        let output = self
            .client
            .get_authorization_token()
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err("Failed to get the registry authorization token")?;

        let data = output
            .authorization_data()
            .first()
            .wrap_err("No authorization data returned")?;

        let (username, password) = decode_token(&text(data.authorization_token()))?;

        Ok(RegistryAuth {
            username,
            password,
            endpoint: text(data.proxy_endpoint()),
        })
    }

    async fn delete_repository(&self, name: &str) -> eyre::Result<()> {
        let result = self
            .client
            .delete_repository()
            .repository_name(name)
            .force(true)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|e| e.is_repository_not_found_exception()) =>
            {
                Ok(())
            }
            Err(e) => {
                Err(sdk_error(e)).wrap_err_with(|| format!("Failed to delete repository {name}"))
            }
        }
    }
}
