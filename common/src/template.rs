//! CloudFormation templates of the stacks deployed by the CLI
//!
//! Templates are assembled from `CfnResource`s and rendered as JSON,
//! which CloudFormation (and any YAML parser) accepts as is.

pub mod application;
pub mod environment;
pub mod job;
pub mod pipeline;
pub mod sanitize;
pub mod task;
pub mod workload;

use eyre::WrapErr;
use serde_json::{json, Map, Value};
use std::fmt;

const FORMAT_VERSION: &str = "2010-09-09";

#[derive(Clone, Debug)]
pub struct CfnResource {
    pub name: String,
    pub resource: Value,
}

impl CfnResource {
    pub fn new(name: impl Into<String>, resource: Value) -> Self {
        CfnResource {
            name: name.into(),
            resource,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Template {
    description: String,
    parameters: Map<String, Value>,
    conditions: Map<String, Value>,
    resources: Map<String, Value>,
    outputs: Map<String, Value>,
}

impl Template {
    pub fn new(description: &str) -> Self {
        Template {
            description: description.to_string(),
            ..Default::default()
        }
    }

    pub fn add_parameter(&mut self, name: &str, parameter: Value) {
        self.parameters.insert(name.to_string(), parameter);
    }

    pub fn add_condition(&mut self, name: &str, condition: Value) {
        self.conditions.insert(name.to_string(), condition);
    }

    /// Add a resource to the CFN template
    pub fn add_resource(&mut self, CfnResource { name, resource }: CfnResource) {
        self.resources.insert(name, resource);
    }

    pub fn add_resources(&mut self, resources: impl IntoIterator<Item = CfnResource>) {
        for resource in resources {
            self.add_resource(resource);
        }
    }

    /// Add an output, exported under the given name when provided
    pub fn add_output(&mut self, name: &str, value: Value, export: Option<String>) {
        let mut output = json!({ "Value": value });

        if let Some(export) = export {
            output["Export"] = json!({ "Name": export });
        }

        self.outputs.insert(name.to_string(), output);
    }

    pub fn has_resource(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    pub fn value(&self) -> Value {
        let mut template = json!({
            "AWSTemplateFormatVersion": FORMAT_VERSION,
            "Description": self.description,
        });

        for (section, content) in [
            ("Parameters", &self.parameters),
            ("Conditions", &self.conditions),
            ("Resources", &self.resources),
            ("Outputs", &self.outputs),
        ] {
            if !content.is_empty() {
                template[section] = Value::Object(content.clone());
            }
        }

        template
    }

    pub fn render(&self) -> eyre::Result<String> {
        serde_json::to_string_pretty(&self.value()).wrap_err("Failed to render the template")
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Value exported by an environment stack
pub fn import(app: &str, env: &str, output: &str) -> Value {
    json!({ "Fn::ImportValue": crate::naming::env_export(app, env, output) })
}

/// Comma separated list exported by an environment stack, e.g. subnets
pub fn import_list(app: &str, env: &str, output: &str) -> Value {
    json!({ "Fn::Split": [",", import(app, env, output)] })
}

pub fn get_att(resource: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [resource, attribute] })
}

pub fn reference(resource: &str) -> Value {
    json!({ "Ref": resource })
}

/// Tags in the form CloudFormation resources accept
pub fn tags<'a>(tags: impl IntoIterator<Item = (&'a str, &'a str)>) -> Value {
    Value::Array(
        tags.into_iter()
            .map(|(key, value)| json!({ "Key": key, "Value": value }))
            .collect(),
    )
}

/// Convert a YAML value with short-form intrinsics (`!Ref X`) into its JSON form
pub fn intrinsic(value: &serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => serde_json::to_value(n).unwrap_or(Value::Null),
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(items) => Value::Array(items.iter().map(intrinsic).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .iter()
                .filter_map(|(k, v)| Some((k.as_str()?.to_string(), intrinsic(v))))
                .collect(),
        ),
        Yaml::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let tag = tag.trim_start_matches('!');
            let inner = intrinsic(&tagged.value);

            match tag {
                "Ref" => json!({ "Ref": inner }),
                "GetAtt" => match inner {
                    Value::String(path) => match path.split_once('.') {
                        Some((resource, attribute)) => get_att(resource, attribute),
                        None => json!({ "Fn::GetAtt": path }),
                    },
                    other => json!({ "Fn::GetAtt": other }),
                },
                "Condition" => json!({ "Condition": inner }),
                _ => {
                    let mut function = Map::new();
                    function.insert(format!("Fn::{tag}"), inner);
                    Value::Object(function)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sections_are_omitted() {
        let mut template = Template::new("Test stack");
        template.add_resource(CfnResource::new(
            "Bucket",
            json!({ "Type": "AWS::S3::Bucket" }),
        ));
        template.add_output("BucketName", reference("Bucket"), Some("shop-Bucket".into()));

        let value = template.value();

        assert_eq!(value["AWSTemplateFormatVersion"], "2010-09-09");
        assert!(value.get("Parameters").is_none());
        assert_eq!(value["Resources"]["Bucket"]["Type"], "AWS::S3::Bucket");
        assert_eq!(value["Outputs"]["BucketName"]["Export"]["Name"], "shop-Bucket");
        assert!(template.has_resource("Bucket"));
    }

    #[test]
    fn short_form_intrinsics_are_expanded() {
        let yaml: serde_yaml::Value = serde_yaml::from_str(
            r#"
Group: !Ref ServiceSecurityGroup
Arn: !GetAtt Queue.Arn
Name: !Sub '${App}-queue'
Plain: 42
List: [a, !Ref B]
"#,
        )
        .unwrap();

        let value = intrinsic(&yaml);

        assert_eq!(value["Group"], json!({ "Ref": "ServiceSecurityGroup" }));
        assert_eq!(value["Arn"], json!({ "Fn::GetAtt": ["Queue", "Arn"] }));
        assert_eq!(value["Name"], json!({ "Fn::Sub": "${App}-queue" }));
        assert_eq!(value["Plain"], 42);
        assert_eq!(value["List"][1], json!({ "Ref": "B" }));
    }
}
