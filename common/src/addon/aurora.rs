use super::common_parameters;
use crate::template::sanitize::logical_id;
use crate::validate;
use eyre::eyre;
use std::fmt;

/// Parameter injected into the addons stack so that the cluster accepts the workload traffic
pub(super) const SECURITY_GROUP_PARAMETER: (&str, &str) =
    ("ServiceSecurityGroupId", "!Ref ServiceSecurityGroup");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    MySQL,
    PostgreSQL,
}

impl Engine {
    pub const ALL: [Engine; 2] = [Engine::MySQL, Engine::PostgreSQL];

    pub fn parse(value: &str) -> eyre::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.to_string().eq_ignore_ascii_case(value.trim()))
            .ok_or(eyre!(
                "Database engine \"{value}\" is not one of MySQL, PostgreSQL"
            ))
    }

    fn engine(&self) -> &'static str {
        match self {
            Engine::MySQL => "aurora-mysql",
            Engine::PostgreSQL => "aurora-postgresql",
        }
    }

    fn version(&self) -> &'static str {
        match self {
            Engine::MySQL => "8.0.mysql_aurora.3.04.0",
            Engine::PostgreSQL => "14.9",
        }
    }

    fn family(&self) -> &'static str {
        match self {
            Engine::MySQL => "aurora-mysql8.0",
            Engine::PostgreSQL => "aurora-postgresql14",
        }
    }

    fn port(&self) -> u16 {
        match self {
            Engine::MySQL => 3306,
            Engine::PostgreSQL => 5432,
        }
    }

    fn username(&self) -> &'static str {
        match self {
            Engine::MySQL => "admin",
            Engine::PostgreSQL => "postgres",
        }
    }

    fn encoding_parameter(&self) -> &'static str {
        match self {
            Engine::MySQL => "character_set_client: 'utf8'",
            Engine::PostgreSQL => "client_encoding: 'UTF8'",
        }
    }

    /// Longest allowed initial database name
    pub fn max_db_name_len(&self) -> usize {
        match self {
            Engine::MySQL => 64,
            Engine::PostgreSQL => 63,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Engine::MySQL => "MySQL",
            Engine::PostgreSQL => "PostgreSQL",
        })
    }
}

#[derive(Debug, Clone)]
pub struct AuroraProps {
    pub name: String,
    pub engine: Engine,
    pub initial_db: String,

    /// Existing cluster parameter group, a new one is created when missing
    pub parameter_group: Option<String>,
}

impl AuroraProps {
    pub fn new(
        name: &str,
        engine: Engine,
        initial_db: Option<&str>,
        parameter_group: Option<&str>,
    ) -> Self {
        AuroraProps {
            name: name.to_string(),
            engine,
            initial_db: initial_db
                .map(str::to_string)
                .unwrap_or_else(|| Self::default_db_name(name)),
            parameter_group: parameter_group.map(str::to_string),
        }
    }

    /// Cluster name stripped down to what database names allow
    pub fn default_db_name(name: &str) -> String {
        name.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
    }

    pub fn validate(&self) -> eyre::Result<()> {
        validate::aurora_cluster_name(&self.name)?;
        validate::db_name(&self.initial_db, self.engine.max_db_name_len())
    }

    pub fn template(&self) -> String {
        let id = logical_id(&self.name);
        let engine = self.engine.engine();
        let version = self.engine.version();
        let port = self.engine.port();
        let db_name = &self.initial_db;
        let (sg_parameter, _) = SECURITY_GROUP_PARAMETER;

        // Dynamic references contain braces, kept out of format! strings
        let username_ref = format!(
            "!Join [ '', [ '{}', !Ref {id}AuroraSecret, ':SecretString:username{}' ] ]",
            "{{resolve:secretsmanager:", "}}"
        );
        let password_ref = format!(
            "!Join [ '', [ '{}', !Ref {id}AuroraSecret, ':SecretString:password{}' ] ]",
            "{{resolve:secretsmanager:", "}}"
        );
        let secret_template = format!("'{{\"username\": \"{}\"}}'", self.engine.username());

        let (parameter_group_name, parameter_group) = match &self.parameter_group {
            Some(existing) => (format!("'{existing}'"), String::new()),
            None => (
                format!("!Ref {id}DBClusterParameterGroup"),
                format!(
                    r#"  {id}DBClusterParameterGroup:
    Metadata:
      'aws:copilot:description': 'A DB parameter group for engine configuration values'
    Type: 'AWS::RDS::DBClusterParameterGroup'
    Properties:
      Description: !Ref 'AWS::StackName'
      Family: '{family}'
      Parameters:
        {encoding}
"#,
                    family = self.engine.family(),
                    encoding = self.engine.encoding_parameter(),
                ),
            ),
        };

        format!(
            r#"{parameters}  {sg_parameter}:
    Type: String
    Description: The security group of the workload, allowed to reach the cluster.
Mappings:
  {id}EnvScalingConfigurationMap:
    All:
      DBMinCapacity: 0.5
      DBMaxCapacity: 8
Resources:
  {id}DBSubnetGroup:
    Type: 'AWS::RDS::DBSubnetGroup'
    Properties:
      DBSubnetGroupDescription: Group of private subnets for the Aurora Serverless v2 cluster.
      SubnetIds:
        !Split [',', {{ 'Fn::ImportValue': !Sub '${{App}}-${{Env}}-PrivateSubnets' }}]
  {id}SecurityGroup:
    Metadata:
      'aws:copilot:description': 'A security group for your workload to access the Aurora Serverless v2 cluster {id}'
    Type: 'AWS::EC2::SecurityGroup'
    Properties:
      GroupDescription: !Sub 'The Security Group for ${{Name}} to access database cluster {id}.'
      VpcId:
        Fn::ImportValue: !Sub '${{App}}-${{Env}}-VpcId'
  {id}DBClusterSecurityGroup:
    Metadata:
      'aws:copilot:description': 'A security group for your Aurora Serverless v2 cluster {id}'
    Type: AWS::EC2::SecurityGroup
    Properties:
      GroupDescription: The Security Group for the database cluster.
      SecurityGroupIngress:
        - ToPort: {port}
          FromPort: {port}
          IpProtocol: tcp
          Description: !Sub 'From the Aurora Security Group of the workload ${{Name}}.'
          SourceSecurityGroupId: !Ref {id}SecurityGroup
        - ToPort: {port}
          FromPort: {port}
          IpProtocol: tcp
          Description: !Sub 'From the service security group of ${{Name}}.'
          SourceSecurityGroupId: !Ref {sg_parameter}
      VpcId:
        Fn::ImportValue: !Sub '${{App}}-${{Env}}-VpcId'
  {id}AuroraSecret:
    Metadata:
      'aws:copilot:description': 'A Secrets Manager secret to store your DB credentials'
    Type: AWS::SecretsManager::Secret
    Properties:
      Description: !Sub Aurora main user secret for ${{AWS::StackName}}
      GenerateSecretString:
        SecretStringTemplate: {secret_template}
        GenerateStringKey: 'password'
        ExcludePunctuation: true
        IncludeSpace: false
        PasswordLength: 16
{parameter_group}  {id}DBCluster:
    Metadata:
      'aws:copilot:description': 'The {id} Aurora Serverless v2 database cluster'
    Type: 'AWS::RDS::DBCluster'
    Properties:
      MasterUsername: {username_ref}
      MasterUserPassword: {password_ref}
      DatabaseName: {db_name}
      Engine: '{engine}'
      EngineVersion: '{version}'
      DBClusterParameterGroupName: {parameter_group_name}
      DBSubnetGroupName: !Ref {id}DBSubnetGroup
      Port: {port}
      VpcSecurityGroupIds:
        - !Ref {id}DBClusterSecurityGroup
      ServerlessV2ScalingConfiguration:
        MinCapacity: !FindInMap [{id}EnvScalingConfigurationMap, All, DBMinCapacity]
        MaxCapacity: !FindInMap [{id}EnvScalingConfigurationMap, All, DBMaxCapacity]
  {id}DBWriterInstance:
    Metadata:
      'aws:copilot:description': 'The {id} Aurora Serverless v2 writer instance'
    Type: 'AWS::RDS::DBInstance'
    Properties:
      DBClusterIdentifier: !Ref {id}DBCluster
      DBInstanceClass: db.serverless
      Engine: '{engine}'
      PromotionTier: 1
      AvailabilityZone: !Select
        - 0
        - !GetAZs
          Ref: AWS::Region
  {id}SecretAuroraClusterAttachment:
    Type: AWS::SecretsManager::SecretTargetAttachment
    Properties:
      SecretId: !Ref {id}AuroraSecret
      TargetId: !Ref {id}DBCluster
      TargetType: AWS::RDS::DBCluster
Outputs:
  {id}Secret:
    Description: The JSON secret that holds the database username and password.
    Value: !Ref {id}AuroraSecret
  {id}SecurityGroup:
    Description: The security group to attach to the workload.
    Value: !Ref {id}SecurityGroup
"#,
            parameters = common_parameters(),
        )
    }
}
