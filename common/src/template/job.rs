use super::environment::{CLUSTER_ID, PUBLIC_SUBNETS};
use super::workload::{security_groups, WorkloadStackProps};
use super::{get_att, import, import_list, reference, CfnResource, Template};
use eyre::{OptionExt, WrapErr};
use serde_json::{json, Value};

const RETRY_INTERVAL_SECONDS: u32 = 10;
const RETRY_BACKOFF_RATE: f64 = 1.5;

// Replaced with JSON lists resolved by CloudFormation
const SUBNETS_PLACEHOLDER: &str = "__Subnets__";
const SECURITY_GROUPS_PLACEHOLDER: &str = "__SecurityGroups__";

/// JSON list of strings built at deploy time, for use inside Fn::Sub
fn json_list(items: Value) -> Value {
    json!({"Fn::Join": ["", ["[\"", {"Fn::Join": ["\",\"", items]}, "\"]"]]})
}

/// Step Functions state machine running the job's task, triggered by an EventBridge rule
pub(super) fn schedule(props: &WorkloadStackProps, template: &mut Template) -> eyre::Result<()> {
    let manifest = props.manifest;

    let schedule = manifest
        .aws_schedule()?
        .ok_or_eyre("A scheduled job requires \"on.schedule\"")?;

    let mut run_task = json!({
        "Type": "Task",
        "Resource": "arn:${AWS::Partition}:states:::ecs:runTask.sync",
        "Parameters": {
            "LaunchType": "FARGATE",
            "PlatformVersion": "LATEST",
            "Cluster": "${Cluster}",
            "TaskDefinition": "${TaskDefinition}",
            "PropagateTags": "TASK_DEFINITION",
            "Group.$": "$$.Execution.Name",
            "NetworkConfiguration": {
                "AwsvpcConfiguration": {
                    "Subnets": SUBNETS_PLACEHOLDER,
                    "AssignPublicIp": "ENABLED",
                    "SecurityGroups": SECURITY_GROUPS_PLACEHOLDER
                }
            }
        },
        "End": true
    });

    if let Some(retries) = manifest.retries.filter(|r| *r > 0) {
        run_task["Retry"] = json!([{
            "ErrorEquals": ["States.ALL"],
            "IntervalSeconds": RETRY_INTERVAL_SECONDS,
            "MaxAttempts": retries,
            "BackoffRate": RETRY_BACKOFF_RATE
        }]);
    }

    if let Some(timeout) = manifest.timeout()? {
        run_task["TimeoutSeconds"] = json!(timeout.as_secs());
    }

    let definition = serde_json::to_string(&json!({
        "Version": "1.0",
        "Comment": "Run AWS Fargate task",
        "StartAt": "Run Fargate Task",
        "States": {"Run Fargate Task": run_task}
    }))
    .wrap_err("Failed to render the state machine definition")?
    .replace(&format!("\"{SUBNETS_PLACEHOLDER}\""), "${Subnets}")
    .replace(&format!("\"{SECURITY_GROUPS_PLACEHOLDER}\""), "${SecurityGroups}");

    template.add_resources([
        CfnResource::new(
            "StateMachineRole",
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": {"Service": "states.amazonaws.com"},
                            "Action": "sts:AssumeRole"
                        }]
                    },
                    "Policies": [{
                        "PolicyName": "RunTask",
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [
                                {
                                    "Effect": "Allow",
                                    "Action": "ecs:RunTask",
                                    "Resource": reference("TaskDefinition")
                                },
                                {
                                    "Effect": "Allow",
                                    "Action": ["ecs:StopTask", "ecs:DescribeTasks"],
                                    "Resource": "*"
                                },
                                {
                                    "Effect": "Allow",
                                    "Action": "iam:PassRole",
                                    "Resource": [
                                        get_att("ExecutionRole", "Arn"),
                                        get_att("TaskRole", "Arn")
                                    ]
                                },
                                {
                                    "Effect": "Allow",
                                    "Action": ["events:PutTargets", "events:PutRule", "events:DescribeRule"],
                                    "Resource": {"Fn::Sub": "arn:${AWS::Partition}:events:${AWS::Region}:${AWS::AccountId}:rule/StepFunctionsGetEventsForECSTaskRule"}
                                }
                            ]
                        }
                    }]
                }
            }),
        ),
        CfnResource::new(
            "StateMachine",
            json!({
                "Type": "AWS::StepFunctions::StateMachine",
                "Properties": {
                    "StateMachineName": format!("{}-{}-{}", props.app, props.env, manifest.name),
                    "RoleArn": get_att("StateMachineRole", "Arn"),
                    "DefinitionString": {"Fn::Sub": [definition, {
                        "Cluster": import(props.app, props.env, CLUSTER_ID),
                        "TaskDefinition": reference("TaskDefinition"),
                        "Subnets": json_list(import_list(props.app, props.env, PUBLIC_SUBNETS)),
                        "SecurityGroups": json_list(json!(security_groups(props)))
                    }]}
                }
            }),
        ),
        CfnResource::new(
            "RuleRole",
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": {"Service": "events.amazonaws.com"},
                            "Action": "sts:AssumeRole"
                        }]
                    },
                    "Policies": [{
                        "PolicyName": "StartExecution",
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [{
                                "Effect": "Allow",
                                "Action": "states:StartExecution",
                                "Resource": reference("StateMachine")
                            }]
                        }
                    }]
                }
            }),
        ),
        CfnResource::new(
            "Rule",
            json!({
                "Type": "AWS::Events::Rule",
                "Properties": {
                    "Description": format!("Triggers the {} job", manifest.name),
                    "ScheduleExpression": schedule,
                    "State": "ENABLED",
                    "Targets": [{
                        "Arn": reference("StateMachine"),
                        "Id": format!("{}StateMachine", manifest.name),
                        "RoleArn": get_att("RuleRole", "Arn")
                    }]
                }
            }),
        ),
    ]);

    Ok(())
}
