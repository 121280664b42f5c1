use super::{from_yaml, to_yaml_with_header};
use crate::validate;
use eyre::eyre;
use serde::{Deserialize, Serialize};

/// Description of an environment, kept in copilot/environments/<name>/manifest.yml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentManifest {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub vpc: ImportedVpc,
}

/// Existing VPC used instead of creating a new one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedVpc {
    pub id: String,
    pub subnets: Subnets,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subnets {
    #[serde(default)]
    pub public: Vec<String>,

    #[serde(default)]
    pub private: Vec<String>,
}

impl EnvironmentManifest {
    pub fn new(name: &str, vpc: Option<ImportedVpc>) -> eyre::Result<Self> {
        let manifest = EnvironmentManifest {
            name: name.to_string(),
            kind: "Environment".to_string(),
            network: vpc.map(|vpc| Network { vpc }),
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
            &format!("The manifest for the \"{}\" environment.", self.name),
        )
    }

    pub fn imported_vpc(&self) -> Option<&ImportedVpc> {
        self.network.as_ref().map(|n| &n.vpc)
    }

    fn validate(&self) -> eyre::Result<()> {
        validate::env_name(&self.name)?;

        if self.kind != "Environment" {
            return Err(eyre!("Unexpected manifest type \"{}\"", self.kind));
        }

        if let Some(vpc) = self.imported_vpc() {
            // Load balancers need subnets in at least two availability zones
            if vpc.subnets.public.len() < 2 {
                return Err(eyre!("At least two public subnets must be imported"));
            }

            if vpc.subnets.private.len() < 2 {
                return Err(eyre!("At least two private subnets must be imported"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_has_no_network() {
        let manifest = EnvironmentManifest::new("test", None).unwrap();
        let yaml = manifest.to_yaml().unwrap();

        assert!(yaml.contains("type: Environment"));
        assert!(!yaml.contains("network"));
        assert_eq!(EnvironmentManifest::from_yaml(&yaml).unwrap(), manifest);
    }

    #[test]
    fn imported_vpc_needs_two_subnets_of_each_kind() {
        let vpc = ImportedVpc {
            id: "vpc-1".into(),
            subnets: Subnets {
                public: vec!["subnet-a".into(), "subnet-b".into()],
                private: vec!["subnet-c".into()],
            },
        };

        assert!(EnvironmentManifest::new("prod", Some(vpc.clone())).is_err());

        let mut vpc = vpc;
        vpc.subnets.private.push("subnet-d".into());

        let manifest = EnvironmentManifest::new("prod", Some(vpc)).unwrap();
        assert_eq!(manifest.imported_vpc().unwrap().id, "vpc-1");
    }
}
