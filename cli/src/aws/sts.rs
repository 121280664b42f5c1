use crate::aws::sdk_error;
use async_trait::async_trait;
use aws_config::SdkConfig;
use eyre::{ContextCompat, WrapErr};

#[async_trait]
pub(crate) trait Identity: Send + Sync {
    /// Account of the current credentials
    async fn account_id(&self) -> eyre::Result<String>;
}

pub(crate) struct Sts {
    client: aws_sdk_sts::Client,
}

impl Sts {
    pub(crate) fn new(config: &SdkConfig) -> Self {
        Sts {
            client: aws_sdk_sts::Client::new(config),
        }
    }
}

#[async_trait]
impl Identity for Sts {
    async fn account_id(&self) -> eyre::Result<String> {
        let output = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err("Failed to get the caller identity, check your AWS credentials")?;

        output
            .account()
            .map(str::to_string)
            .wrap_err("The caller identity has no account")
    }
}
