use super::common_parameters;
use crate::template::sanitize::logical_id;
use crate::validate;
use eyre::eyre;

const MAX_LSI: usize = 5;

/// Key attribute of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,

    /// One of S, N, B
    pub kind: String,
}

impl Attribute {
    /// Parse from the "name:T" form
    pub fn parse(value: &str) -> eyre::Result<Self> {
        let (name, kind) = validate::attribute(value)?;
        Ok(Attribute { name, kind })
    }
}

#[derive(Debug, Clone)]
pub struct DynamoProps {
    pub name: String,
    pub partition_key: Attribute,
    pub sort_key: Option<Attribute>,

    /// Alternate sort keys, each becomes a local secondary index
    pub lsi: Vec<Attribute>,
}

impl DynamoProps {
    pub fn validate(&self) -> eyre::Result<()> {
        validate::dynamo_table_name(&self.name)?;

        if self.lsi.len() > MAX_LSI {
            return Err(eyre!(
                "A table can have at most {MAX_LSI} local secondary indexes"
            ));
        }

        if !self.lsi.is_empty() && self.sort_key.is_none() {
            return Err(eyre!("Local secondary indexes require a sort key"));
        }

        self.attribute_definitions().map(|_| ())
    }

    /// Unique attributes used in keys and indexes
    fn attribute_definitions(&self) -> eyre::Result<Vec<&Attribute>> {
        let mut result: Vec<&Attribute> = Vec::new();

        let all = std::iter::once(&self.partition_key)
            .chain(self.sort_key.iter())
            .chain(self.lsi.iter());

        for attribute in all {
            match result.iter().find(|a| a.name == attribute.name) {
                Some(existing) if existing.kind != attribute.kind => {
                    return Err(eyre!(
                        "Attribute \"{}\" is declared with both {} and {} types",
                        attribute.name,
                        existing.kind,
                        attribute.kind
                    ));
                }
                Some(_) => {}
                None => result.push(attribute),
            }
        }

        Ok(result)
    }

    pub fn template(&self) -> String {
        let id = logical_id(&self.name);
        let name = &self.name;
        let partition_key = &self.partition_key.name;

        let definitions = self
            .attribute_definitions()
            .unwrap_or_default()
            .iter()
            .map(|a| {
                format!(
                    "        - AttributeName: {}\n          AttributeType: {}",
                    a.name, a.kind
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut key_schema = format!(
            "        - AttributeName: {partition_key}\n          KeyType: HASH"
        );

        if let Some(sort_key) = &self.sort_key {
            key_schema.push_str(&format!(
                "\n        - AttributeName: {}\n          KeyType: RANGE",
                sort_key.name
            ));
        }

        let indexes = self
            .lsi
            .iter()
            .filter(|lsi| Some(&lsi.name) != self.sort_key.as_ref().map(|s| &s.name))
            .map(|lsi| {
                format!(
                    r#"        - IndexName: {index}
          KeySchema:
            - AttributeName: {partition_key}
              KeyType: HASH
            - AttributeName: {index}
              KeyType: RANGE
          Projection:
            ProjectionType: ALL"#,
                    index = lsi.name
                )
            })
            .collect::<Vec<_>>();

        let indexes = if indexes.is_empty() {
            String::new()
        } else {
            format!("\n      LocalSecondaryIndexes:\n{}", indexes.join("\n"))
        };

        format!(
            r#"{parameters}Resources:
  {id}:
    Metadata:
      'aws:copilot:description': 'An Amazon DynamoDB table for {name}'
    Type: AWS::DynamoDB::Table
    Properties:
      TableName: !Sub ${{App}}-${{Env}}-${{Name}}-{name}
      AttributeDefinitions:
{definitions}
      BillingMode: PAY_PER_REQUEST
      KeySchema:
{key_schema}{indexes}
  {id}AccessPolicy:
    Metadata:
      'aws:copilot:description': 'An IAM ManagedPolicy for your service to access the {name} db'
    Type: AWS::IAM::ManagedPolicy
    Properties:
      Description: !Sub
        - Grants CRUD access to the Dynamo DB table ${{Table}}
        - {{ Table: !Ref {id} }}
      PolicyDocument:
        Version: '2012-10-17'
        Statement:
          - Sid: DDBActions
            Effect: Allow
            Action:
              - dynamodb:BatchGet*
              - dynamodb:DescribeStream
              - dynamodb:DescribeTable
              - dynamodb:Get*
              - dynamodb:Query
              - dynamodb:Scan
              - dynamodb:BatchWrite*
              - dynamodb:Create*
              - dynamodb:Delete*
              - dynamodb:Update*
              - dynamodb:PutItem
            Resource: !Sub ${{{id}.Arn}}
          - Sid: DDBLSIActions
            Action:
              - dynamodb:Query
              - dynamodb:Scan
            Effect: Allow
            Resource: !Sub ${{{id}.Arn}}/index/*
Outputs:
  {id}Name:
    Description: The name of this DynamoDB table.
    Value: !Ref {id}
  {id}AccessPolicy:
    Description: The IAM::ManagedPolicy to attach to the task role.
    Value: !Ref {id}AccessPolicy
"#,
            parameters = common_parameters(),
        )
    }
}
