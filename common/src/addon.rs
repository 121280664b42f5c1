//! Addons are CloudFormation templates deployed as a nested stack next to a workload
//!
//! `storage init` writes them from the templates in this module,
//! users are free to add their own to copilot/<workload>/addons/.

mod aurora;
mod dynamodb;
mod merge;
mod s3;

pub use aurora::{AuroraProps, Engine};
pub use dynamodb::{Attribute, DynamoProps};
pub use merge::{merge, outputs, parameters, AddonOutput, OutputKind, Template};
pub use s3::S3Props;

use eyre::eyre;
use std::fmt;

/// Name of the file with the extra parameters passed to the addons stack
pub const PARAMETERS_FILE: &str = "addons.parameters.yml";

/// Parameters every addons stack receives
pub const RESERVED_PARAMETERS: [&str; 3] = ["App", "Env", "Name"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    DynamoDB,
    S3,
    Aurora,
}

impl StorageType {
    pub const ALL: [StorageType; 3] = [StorageType::DynamoDB, StorageType::S3, StorageType::Aurora];

    pub fn parse(value: &str) -> eyre::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or(eyre!(
                "Storage type \"{value}\" is not one of DynamoDB, S3, Aurora"
            ))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::DynamoDB => "DynamoDB",
            StorageType::S3 => "S3",
            StorageType::Aurora => "Aurora",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            StorageType::DynamoDB => "NoSQL key-value table",
            StorageType::S3 => "Objects in a bucket",
            StorageType::Aurora => "Aurora Serverless v2 SQL cluster",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage to generate a template for
#[derive(Debug, Clone)]
pub enum Storage {
    DynamoDB(DynamoProps),
    S3(S3Props),
    Aurora(AuroraProps),
}

impl Storage {
    pub fn name(&self) -> &str {
        match self {
            Storage::DynamoDB(props) => &props.name,
            Storage::S3(props) => &props.name,
            Storage::Aurora(props) => &props.name,
        }
    }

    pub fn validate(&self) -> eyre::Result<()> {
        match self {
            Storage::DynamoDB(props) => props.validate(),
            Storage::S3(props) => props.validate(),
            Storage::Aurora(props) => props.validate(),
        }
    }

    /// CloudFormation template of the addon
    pub fn template(&self) -> eyre::Result<String> {
        self.validate()?;

        Ok(match self {
            Storage::DynamoDB(props) => props.template(),
            Storage::S3(props) => props.template(),
            Storage::Aurora(props) => props.template(),
        })
    }

    /// Extra parameters to add to addons.parameters.yml
    pub fn parameters(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Storage::Aurora(_) => Some(aurora::SECURITY_GROUP_PARAMETER),
            _ => None,
        }
    }
}

/// Parameters section shared by all addon templates
fn common_parameters() -> &'static str {
    r#"Parameters:
  App:
    Type: String
    Description: Your application's name.
  Env:
    Type: String
    Description: The environment name your workload is being deployed to.
  Name:
    Type: String
    Description: The name of the workload being deployed.
"#
}
