use super::{get_att, reference, CfnResource, Template};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Output with the URI of the task's image repository
pub const REPOSITORY_URI: &str = "ECRRepo";

/// Output with the ARN of the task definition
pub const TASK_DEFINITION: &str = "TaskDefinitionArn";

const LOG_RETENTION_DAYS: u32 = 1;

/// One-off task started by `task run`
#[derive(Debug, Clone, Default)]
pub struct TaskProps {
    pub group: String,
    pub cpu: u32,
    pub memory: u32,

    /// Prebuilt image, the repository of the stack is used when missing
    pub image: Option<String>,

    /// Existing role assumed by the task
    pub task_role: Option<String>,

    pub variables: BTreeMap<String, String>,
    pub command: Vec<String>,

    /// Application and environment the task runs in, if any
    pub app: Option<String>,
    pub env: Option<String>,
}

impl TaskProps {
    pub fn family(&self) -> String {
        format!("copilot-{}", self.group)
    }
}

pub fn task(props: &TaskProps) -> Template {
    let family = props.family();
    let mut template = Template::new(&format!("One-off task {}.", props.group));

    let repository_uri = json!({"Fn::Join": ["", [
        {"Ref": "AWS::AccountId"},
        ".dkr.ecr.",
        {"Ref": "AWS::Region"},
        ".",
        {"Ref": "AWS::URLSuffix"},
        "/",
        reference("ECRRepo")
    ]]});

    let image = match &props.image {
        Some(image) => json!(image),
        None => json!({"Fn::Join": ["", [repository_uri, ":latest"]]}),
    };

    let mut variables: Vec<Value> = Vec::new();

    if let (Some(app), Some(env)) = (&props.app, &props.env) {
        variables.push(json!({"Name": "COPILOT_APPLICATION_NAME", "Value": app}));
        variables.push(json!({"Name": "COPILOT_ENVIRONMENT_NAME", "Value": env}));
    }

    variables.extend(
        props
            .variables
            .iter()
            .map(|(name, value)| json!({"Name": name, "Value": value})),
    );

    let task_role = match &props.task_role {
        Some(role) => json!(role),
        None => {
            template.add_resource(CfnResource::new(
                "TaskRole",
                json!({
                    "Type": "AWS::IAM::Role",
                    "Properties": {
                        "AssumeRolePolicyDocument": ecs_assume_role()
                    }
                }),
            ));

            get_att("TaskRole", "Arn")
        }
    };

    let mut container = json!({
        "Name": family,
        "Image": image,
        "Environment": variables,
        "LogConfiguration": {
            "LogDriver": "awslogs",
            "Options": {
                "awslogs-region": {"Ref": "AWS::Region"},
                "awslogs-group": reference("LogGroup"),
                "awslogs-stream-prefix": "copilot-task"
            }
        }
    });

    if !props.command.is_empty() {
        container["Command"] = json!(props.command);
    }

    template.add_resources([
        CfnResource::new(
            "ECRRepo",
            json!({
                "Type": "AWS::ECR::Repository",
                "Properties": {
                    "RepositoryName": family,
                    "EmptyOnDelete": true
                }
            }),
        ),
        CfnResource::new(
            "LogGroup",
            json!({
                "Type": "AWS::Logs::LogGroup",
                "Properties": {
                    "LogGroupName": format!("/copilot/{family}"),
                    "RetentionInDays": LOG_RETENTION_DAYS
                }
            }),
        ),
        CfnResource::new(
            "ExecutionRole",
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": ecs_assume_role(),
                    "ManagedPolicyArns": [
                        {"Fn::Sub": "arn:${AWS::Partition}:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy"}
                    ]
                }
            }),
        ),
        CfnResource::new(
            "TaskDefinition",
            json!({
                "Type": "AWS::ECS::TaskDefinition",
                "Properties": {
                    "Family": family,
                    "NetworkMode": "awsvpc",
                    "RequiresCompatibilities": ["FARGATE"],
                    "Cpu": props.cpu.to_string(),
                    "Memory": props.memory.to_string(),
                    "ExecutionRoleArn": get_att("ExecutionRole", "Arn"),
                    "TaskRoleArn": task_role,
                    "ContainerDefinitions": [container]
                }
            }),
        ),
    ]);

    template.add_output(REPOSITORY_URI, repository_uri, None);
    template.add_output(TASK_DEFINITION, reference("TaskDefinition"), None);

    template
}

fn ecs_assume_role() -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"Service": "ecs-tasks.amazonaws.com"},
            "Action": "sts:AssumeRole"
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> TaskProps {
        TaskProps {
            group: "db-migrate".into(),
            cpu: 256,
            memory: 512,
            command: vec!["./migrate".into(), "up".into()],
            ..Default::default()
        }
    }

    #[test]
    fn builds_into_its_own_repository() {
        let value = task(&props()).value();
        let container =
            &value["Resources"]["TaskDefinition"]["Properties"]["ContainerDefinitions"][0];

        assert_eq!(
            value["Resources"]["ECRRepo"]["Properties"]["RepositoryName"],
            "copilot-db-migrate"
        );
        assert_eq!(container["Image"]["Fn::Join"][1][1], ":latest");
        assert_eq!(container["Command"], json!(["./migrate", "up"]));
        assert!(value["Resources"]["TaskRole"].is_object());
        assert!(value["Outputs"].get(REPOSITORY_URI).is_some());
    }

    #[test]
    fn existing_image_and_role_are_used() {
        let mut props = props();
        props.image = Some("postgres:16".into());
        props.task_role = Some("arn:aws:iam::123456789012:role/migrator".into());
        props.app = Some("shop".into());
        props.env = Some("test".into());

        let value = task(&props).value();
        let definition = &value["Resources"]["TaskDefinition"]["Properties"];

        assert_eq!(definition["ContainerDefinitions"][0]["Image"], "postgres:16");
        assert_eq!(
            definition["TaskRoleArn"],
            "arn:aws:iam::123456789012:role/migrator"
        );
        assert!(value["Resources"].get("TaskRole").is_none());
        assert_eq!(
            definition["ContainerDefinitions"][0]["Environment"][0]["Value"],
            "shop"
        );
    }
}
