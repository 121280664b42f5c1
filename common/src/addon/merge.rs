use super::RESERVED_PARAMETERS;
use eyre::{eyre, WrapErr};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;

/// Sections merged key by key, all others are taken from the first template declaring them
const MERGED_SECTIONS: [&str; 5] = ["Parameters", "Mappings", "Conditions", "Resources", "Outputs"];

/// An addon template read from the workspace
#[derive(Debug, Clone)]
pub struct Template {
    /// File name, used in error messages
    pub name: String,
    pub content: String,
}

/// Combine several addon templates into one nested stack template
///
/// The same logical ID may appear in several files only if it's defined identically.
pub fn merge(templates: &[Template]) -> eyre::Result<String> {
    let mut merged = Mapping::new();
    let mut origins: HashMap<String, &str> = HashMap::new();

    for template in templates {
        let value: Value = serde_yaml::from_str(&template.content)
            .wrap_err(format!("Failed to parse addon template {}", template.name))?;

        let Value::Mapping(sections) = value else {
            return Err(eyre!("Addon template {} is not a YAML mapping", template.name));
        };

        for (section, content) in sections {
            let section_name = section.as_str().unwrap_or_default().to_string();

            if !MERGED_SECTIONS.contains(&section_name.as_str()) {
                if !merged.contains_key(&section) {
                    merged.insert(section, content);
                }

                continue;
            }

            let Value::Mapping(entries) = content else {
                return Err(eyre!(
                    "Section {section_name} of addon template {} must be a mapping",
                    template.name
                ));
            };

            let Value::Mapping(target) = merged
                .entry(section)
                .or_insert(Value::Mapping(Mapping::new()))
            else {
                return Err(eyre!("Section {section_name} must be a mapping"));
            };

            for (key, value) in entries {
                let id = format!(
                    "{section_name}.{}",
                    key.as_str().unwrap_or_default()
                );

                match target.get(&key) {
                    Some(existing) if existing != &value => {
                        return Err(eyre!(
                            "{id} in {} conflicts with its definition in {}",
                            template.name,
                            origins.get(&id).copied().unwrap_or("another addon")
                        ));
                    }
                    Some(_) => {}
                    None => {
                        target.insert(key, value);
                        origins.insert(id, &template.name);
                    }
                }
            }
        }
    }

    serde_yaml::to_string(&Value::Mapping(merged)).wrap_err("Failed to serialize addons template")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Attached to the task role
    ManagedPolicy,

    /// Attached to the tasks' network configuration
    SecurityGroup,

    /// Injected into the container as a secret
    Secret,

    /// Injected into the container as an environment variable
    Variable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonOutput {
    pub name: String,
    pub kind: OutputKind,
}

/// Outputs of an addons template, classified by the type of the resource they reference
pub fn outputs(template: &str) -> eyre::Result<Vec<AddonOutput>> {
    let value: Value =
        serde_yaml::from_str(template).wrap_err("Failed to parse addons template")?;

    let Some(outputs) = value.get("Outputs").and_then(Value::as_mapping) else {
        return Ok(vec![]);
    };

    let resources = value.get("Resources").and_then(Value::as_mapping);

    Ok(outputs
        .iter()
        .filter_map(|(name, output)| {
            let name = name.as_str()?.to_string();

            let resource_type = output
                .get("Value")
                .and_then(referenced_resource)
                .and_then(|id| resources?.get(id.as_str()))
                .and_then(|resource| resource.get("Type"))
                .and_then(Value::as_str);

            let kind = match resource_type {
                Some("AWS::IAM::ManagedPolicy") => OutputKind::ManagedPolicy,
                Some("AWS::EC2::SecurityGroup") => OutputKind::SecurityGroup,
                Some("AWS::SecretsManager::Secret") => OutputKind::Secret,
                _ => OutputKind::Variable,
            };

            Some(AddonOutput { name, kind })
        })
        .collect())
}

/// Logical ID in "!Ref Id" or "{Ref: Id}"
fn referenced_resource(value: &Value) -> Option<String> {
    match value {
        Value::Tagged(tagged) if tagged.tag.to_string().trim_start_matches('!') == "Ref" => {
            tagged.value.as_str().map(str::to_string)
        }
        Value::Mapping(mapping) => mapping.get("Ref")?.as_str().map(str::to_string),
        _ => None,
    }
}

/// Extra parameters of the addons stack from addons.parameters.yml
pub fn parameters(content: &str) -> eyre::Result<Mapping> {
    let value: Value =
        serde_yaml::from_str(content).wrap_err("Failed to parse addons parameters")?;

    let parameters = match value.get("Parameters") {
        None | Some(Value::Null) => Mapping::new(),
        Some(Value::Mapping(mapping)) => mapping.clone(),
        Some(_) => return Err(eyre!("\"Parameters\" must be a mapping")),
    };

    for key in parameters.keys() {
        let key = key.as_str().unwrap_or_default();

        if RESERVED_PARAMETERS.contains(&key) {
            return Err(eyre!(
                "Parameter \"{key}\" is reserved and passed to the addons stack automatically"
            ));
        }
    }

    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(name: &str, content: &str) -> Template {
        Template {
            name: name.into(),
            content: content.into(),
        }
    }

    const TABLE: &str = r#"
Parameters:
  App:
    Type: String
Resources:
  orders:
    Type: AWS::DynamoDB::Table
  ordersAccessPolicy:
    Type: AWS::IAM::ManagedPolicy
Outputs:
  ordersName:
    Value: !Ref orders
  ordersAccessPolicy:
    Value: !Ref ordersAccessPolicy
"#;

    const BUCKET: &str = r#"
AWSTemplateFormatVersion: 2010-09-09
Parameters:
  App:
    Type: String
Resources:
  assets:
    Type: AWS::S3::Bucket
  assetsSecurityGroup:
    Type: AWS::EC2::SecurityGroup
  assetsSecret:
    Type: AWS::SecretsManager::Secret
Outputs:
  assetsName:
    Value:
      Ref: assets
  assetsSecurityGroup:
    Value: !Ref assetsSecurityGroup
  assetsSecret:
    Value: !Ref assetsSecret
  assetsArn:
    Value: !GetAtt assets.Arn
"#;

    #[test]
    fn identical_duplicates_are_merged() {
        let merged = merge(&[template("table.yml", TABLE), template("bucket.yml", BUCKET)])
            .unwrap();
        let value: Value = serde_yaml::from_str(&merged).unwrap();

        assert_eq!(value["Parameters"].as_mapping().unwrap().len(), 1);
        assert_eq!(value["Resources"].as_mapping().unwrap().len(), 5);
        assert_eq!(value["Outputs"].as_mapping().unwrap().len(), 6);
        assert!(value.get("AWSTemplateFormatVersion").is_some());
        assert!(merged.contains("!Ref orders"));
    }

    #[test]
    fn conflicting_definitions_are_rejected() {
        let other = TABLE.replace("AWS::DynamoDB::Table", "AWS::S3::Bucket");
        let err = merge(&[template("a.yml", TABLE), template("b.yml", &other)]).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Resources.orders in b.yml conflicts with its definition in a.yml"
        );
    }

    #[test]
    fn outputs_are_classified_by_resource_type() {
        let merged = merge(&[template("table.yml", TABLE), template("bucket.yml", BUCKET)])
            .unwrap();
        let outputs = outputs(&merged).unwrap();

        let kind_of = |name: &str| outputs.iter().find(|o| o.name == name).unwrap().kind;

        assert_eq!(kind_of("ordersName"), OutputKind::Variable);
        assert_eq!(kind_of("ordersAccessPolicy"), OutputKind::ManagedPolicy);
        assert_eq!(kind_of("assetsName"), OutputKind::Variable);
        assert_eq!(kind_of("assetsSecurityGroup"), OutputKind::SecurityGroup);
        assert_eq!(kind_of("assetsSecret"), OutputKind::Secret);
        assert_eq!(kind_of("assetsArn"), OutputKind::Variable);
    }

    #[test]
    fn parameters_file() {
        let params =
            parameters("Parameters:\n  ServiceSecurityGroupId: !Ref ServiceSecurityGroup\n")
                .unwrap();
        assert_eq!(params.len(), 1);

        assert!(parameters("Parameters:\n").unwrap().is_empty());
        assert!(parameters("Parameters:\n  Env: test\n").is_err());
    }
}
