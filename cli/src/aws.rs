//! Thin wrappers over the AWS SDK clients
//!
//! Each service sits behind a trait, commands only see the traits.

pub(crate) mod cloudformation;
pub(crate) mod codepipeline;
pub(crate) mod ecr;
pub(crate) mod ecs;
pub(crate) mod s3;
pub(crate) mod ssm;
pub(crate) mod sts;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_cloudformation::error::DisplayErrorContext;

/// Load the shared AWS config, the flags take precedence over the environment
pub(crate) async fn sdk_config(profile: Option<&str>, region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }

    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }

    loader.load().await
}

/// Owned string out of an SDK accessor, whether the member is required or optional
pub(crate) fn text<'a>(value: impl Into<Option<&'a str>>) -> String {
    value.into().unwrap_or_default().to_string()
}

/// Same as [text] for counters
pub(crate) fn count(value: impl Into<Option<i32>>) -> i64 {
    i64::from(value.into().unwrap_or_default())
}

/// Report with the service message, the plain Display of SDK errors hides it
pub(crate) fn sdk_error<E: std::error::Error>(error: E) -> eyre::Report {
    eyre::eyre!("{}", DisplayErrorContext(error))
}
