use crate::aws::{sdk_error, text};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ssm::types::{ParameterType, ResourceTypeForTagging, Tag};
use eyre::WrapErr;
use std::collections::BTreeMap;

/// Plain parameters backing the config store
#[async_trait]
pub(crate) trait Parameters: Send + Sync {
    /// Create a parameter, returns false if it already exists
    async fn create(
        &self,
        name: &str,
        value: &str,
        tags: &BTreeMap<String, String>,
    ) -> eyre::Result<bool>;

    async fn get(&self, name: &str) -> eyre::Result<Option<String>>;

    /// Values of the parameters right under the path, not recursive
    async fn list(&self, path: &str) -> eyre::Result<Vec<String>>;

    /// Deleting a missing parameter is not an error
    async fn delete(&self, name: &str) -> eyre::Result<()>;
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SecretInput {
    /// Full parameter path
    pub(crate) name: String,

    pub(crate) value: String,
    pub(crate) overwrite: bool,
    pub(crate) tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PutOutcome {
    Created,
    Updated,
}

/// The secret exists and overwriting was not asked for
#[derive(Debug)]
pub(crate) struct SecretExists(pub(crate) String);

impl std::fmt::Display for SecretExists {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Parameter {} already exists", self.0)
    }
}

impl std::error::Error for SecretExists {}

#[async_trait]
pub(crate) trait SecretStore: Send + Sync {
    async fn put(&self, secret: &SecretInput) -> eyre::Result<PutOutcome>;
}

pub(crate) struct Ssm {
    client: aws_sdk_ssm::Client,
}

impl Ssm {
    pub(crate) fn new(config: &SdkConfig) -> Self {
        Ssm {
            client: aws_sdk_ssm::Client::new(config),
        }
    }

    fn tags(tags: &BTreeMap<String, String>) -> eyre::Result<Vec<Tag>> {
        tags.iter()
            .map(|(key, value)| {
                Tag::builder()
                    .key(key)
                    .value(value)
                    .build()
                    .wrap_err("Failed to build AWS tag")
            })
            .collect()
    }

    /// Returns false if the parameter exists
    async fn put_new(
        &self,
        name: &str,
        value: &str,
        kind: ParameterType,
        tags: &BTreeMap<String, String>,
    ) -> eyre::Result<bool> {
        let result = self
            .client
            .put_parameter()
            .name(name)
            .value(value)
            .r#type(kind)
            .overwrite(false)
            .set_tags(Some(Self::tags(tags)?))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|e| e.is_parameter_already_exists()) =>
            {
                Ok(false)
            }
            Err(e) => Err(sdk_error(e)).wrap_err_with(|| format!("Failed to put parameter {name}")),
        }
    }
}

#[async_trait]
impl Parameters for Ssm {
    async fn create(
        &self,
        name: &str,
        value: &str,
        tags: &BTreeMap<String, String>,
    ) -> eyre::Result<bool> {
        self.put_new(name, value, ParameterType::String, tags).await
    }

    async fn get(&self, name: &str) -> eyre::Result<Option<String>> {
        let result = self.client.get_parameter().name(name).send().await;

        match result {
            Ok(output) => Ok(output.parameter().map(|p| text(p.value()))),
            Err(e) if e.as_service_error().is_some_and(|e| e.is_parameter_not_found()) => Ok(None),
            Err(e) => Err(sdk_error(e)).wrap_err_with(|| format!("Failed to get parameter {name}")),
        }
    }

    async fn list(&self, path: &str) -> eyre::Result<Vec<String>> {
        let mut values = vec![];
        let mut next_token = None;

        loop {
            let output = self
                .client
                .get_parameters_by_path()
                .path(path)
                .recursive(false)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(sdk_error)
                .wrap_err_with(|| format!("Failed to list parameters under {path}"))?;

            values.extend(output.parameters().iter().map(|p| text(p.value())));

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(values)
    }

    async fn delete(&self, name: &str) -> eyre::Result<()> {
        let result = self.client.delete_parameter().name(name).send().await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.as_service_error().is_some_and(|e| e.is_parameter_not_found()) => Ok(()),
            Err(e) => Err(sdk_error(e)).wrap_err_with(|| format!("Failed to delete parameter {name}")),
        }
    }
}

#[async_trait]
impl SecretStore for Ssm {
    async fn put(&self, secret: &SecretInput) -> eyre::Result<PutOutcome> {
        let name = &secret.name;

        if self
            .put_new(name, &secret.value, ParameterType::SecureString, &secret.tags)
            .await?
        {
            return Ok(PutOutcome::Created);
        }

        if !secret.overwrite {
            return Err(SecretExists(name.clone()).into());
        }

        // Tags can't be passed together with overwrite
        self.client
            .put_parameter()
            .name(name)
            .value(&secret.value)
            .r#type(ParameterType::SecureString)
            .overwrite(true)
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err_with(|| format!("Failed to overwrite parameter {name}"))?;

        self.client
            .add_tags_to_resource()
            .resource_type(ResourceTypeForTagging::Parameter)
            .resource_id(name)
            .set_tags(Some(Self::tags(&secret.tags)?))
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err_with(|| format!("Failed to tag parameter {name}"))?;

        Ok(PutOutcome::Updated)
    }
}
