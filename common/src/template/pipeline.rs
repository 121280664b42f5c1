use super::{get_att, reference, tags, CfnResource, Template};
use crate::manifest::pipeline::{PipelineManifest, OUTPUT_DIR};
use crate::naming;
use crate::repository::Provider;
use serde_json::{json, Value};

/// Output with the ARN of the connection that must be activated in the console
pub const CONNECTION_ARN: &str = "ConnectionArn";

/// Output with the name of the CodePipeline pipeline
pub const PIPELINE_NAME: &str = "PipelineName";

const MAX_CONNECTION_NAME_LEN: usize = 32;
const SOURCE_OUTPUT: &str = "SCCheckoutArtifact";
const BUILD_OUTPUT: &str = "BuildOutput";

pub struct PipelineProps<'a> {
    pub app: &'a str,
    pub manifest: &'a PipelineManifest,

    /// Bucket of the application stack keeping the artifacts
    pub artifact_bucket: &'a str,

    /// Workloads deployed in every stage
    pub workloads: &'a [String],

    /// Path of the buildspec in the repository
    pub buildspec: &'a str,
}

impl PipelineProps<'_> {
    fn connection_name(&self) -> String {
        let mut name = self
            .manifest
            .source
            .properties
            .connection_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.app, self.manifest.name));

        name.truncate(MAX_CONNECTION_NAME_LEN);
        name
    }
}

/// CodePipeline pipeline building the workspace and deploying it to each stage in order
pub fn pipeline(props: &PipelineProps) -> eyre::Result<Template> {
    let manifest = props.manifest;
    let repository = manifest.repository()?;
    let pipeline_name = naming::pipeline_stack(props.app, &manifest.name);
    let bucket_arn = format!("arn:aws:s3:::{}", props.artifact_bucket);

    let mut template = Template::new(&format!(
        "Continuous delivery pipeline {} of the {} application.",
        manifest.name, props.app
    ));

    let source_action = match repository.provider {
        Provider::CodeCommit => json!({
            "Name": "SourceCodeFor-CodeCommit",
            "ActionTypeId": {"Category": "Source", "Owner": "AWS", "Provider": "CodeCommit", "Version": "1"},
            "Configuration": {
                "RepositoryName": repository.name,
                "BranchName": manifest.source.properties.branch,
                "PollForSourceChanges": false
            },
            "OutputArtifacts": [{"Name": SOURCE_OUTPUT}]
        }),
        provider => {
            template.add_resource(CfnResource::new(
                "SourceConnection",
                json!({
                    "Type": "AWS::CodeStarConnections::Connection",
                    "Properties": {
                        "ConnectionName": props.connection_name(),
                        "ProviderType": provider.to_string()
                    }
                }),
            ));

            template.add_output(CONNECTION_ARN, reference("SourceConnection"), None);

            json!({
                "Name": format!("SourceCodeFor-{}", repository.full_id().replace('/', "-")),
                "ActionTypeId": {
                    "Category": "Source",
                    "Owner": "AWS",
                    "Provider": "CodeStarSourceConnection",
                    "Version": "1"
                },
                "Configuration": {
                    "ConnectionArn": reference("SourceConnection"),
                    "FullRepositoryId": repository.full_id(),
                    "BranchName": manifest.source.properties.branch,
                    "OutputArtifactFormat": "CODE_ZIP"
                },
                "OutputArtifacts": [{"Name": SOURCE_OUTPUT}]
            })
        }
    };

    let mut stages = vec![
        json!({"Name": "Source", "Actions": [source_action]}),
        json!({
            "Name": "Build",
            "Actions": [{
                "Name": "Build",
                "ActionTypeId": {"Category": "Build", "Owner": "AWS", "Provider": "CodeBuild", "Version": "1"},
                "Configuration": {"ProjectName": reference("BuildProject")},
                "InputArtifacts": [{"Name": SOURCE_OUTPUT}],
                "OutputArtifacts": [{"Name": BUILD_OUTPUT}]
            }]
        }),
    ];

    for (index, stage) in manifest.stages.iter().enumerate() {
        let env = &stage.name;
        let mut actions = Vec::new();
        let mut run_order = 1;

        if stage.requires_approval {
            actions.push(json!({
                "Name": format!("ApprovePromotionTo-{env}"),
                "ActionTypeId": {"Category": "Approval", "Owner": "AWS", "Provider": "Manual", "Version": "1"},
                "RunOrder": run_order
            }));
            run_order += 1;
        }

        for workload in props.workloads {
            actions.push(json!({
                "Name": format!("CreateOrUpdate-{workload}-{env}"),
                "ActionTypeId": {"Category": "Deploy", "Owner": "AWS", "Provider": "CloudFormation", "Version": "1"},
                "Configuration": {
                    "ActionMode": "CREATE_UPDATE",
                    "StackName": naming::workload_stack(props.app, env, workload),
                    "Capabilities": "CAPABILITY_IAM,CAPABILITY_NAMED_IAM,CAPABILITY_AUTO_EXPAND",
                    "TemplatePath": format!("{BUILD_OUTPUT}::{OUTPUT_DIR}/{workload}-{env}.stack.json"),
                    "RoleArn": get_att("DeployRole", "Arn")
                },
                "InputArtifacts": [{"Name": BUILD_OUTPUT}],
                "RunOrder": run_order
            }));
        }

        if !stage.test_commands.is_empty() {
            let project = format!("TestProject{index}");

            template.add_resource(CfnResource::new(
                &project,
                build_project(
                    props.manifest.build_image(),
                    &test_buildspec(&stage.test_commands),
                ),
            ));

            actions.push(json!({
                "Name": "TestCommands",
                "ActionTypeId": {"Category": "Test", "Owner": "AWS", "Provider": "CodeBuild", "Version": "1"},
                "Configuration": {"ProjectName": reference(&project)},
                "InputArtifacts": [{"Name": SOURCE_OUTPUT}],
                "RunOrder": run_order + 1
            }));
        }

        stages.push(json!({"Name": format!("DeployTo-{env}"), "Actions": actions}));
    }

    template.add_resources([
        CfnResource::new(
            "BuildProjectRole",
            role(
                "codebuild.amazonaws.com",
                json!([
                    {
                        "Effect": "Allow",
                        "Action": ["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
                        "Resource": "*"
                    },
                    {
                        "Effect": "Allow",
                        "Action": ["s3:GetObject", "s3:GetObjectVersion", "s3:PutObject", "s3:ListBucket"],
                        "Resource": [bucket_arn, format!("{bucket_arn}/*")]
                    },
                    {
                        "Effect": "Allow",
                        "Action": [
                            "ecr:*",
                            "ssm:GetParameter",
                            "ssm:GetParametersByPath",
                            "cloudformation:DescribeStacks",
                            "sts:GetCallerIdentity"
                        ],
                        "Resource": "*"
                    }
                ]),
            ),
        ),
        CfnResource::new("BuildProject", {
            let mut project = build_project(manifest.build_image(), props.buildspec);
            project["Properties"]["Environment"]["PrivilegedMode"] = json!(true);
            project
        }),
        CfnResource::new(
            "DeployRole",
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": assume_role("cloudformation.amazonaws.com"),
                    "ManagedPolicyArns": [
                        {"Fn::Sub": "arn:${AWS::Partition}:iam::aws:policy/AdministratorAccess"}
                    ]
                }
            }),
        ),
        CfnResource::new(
            "PipelineRole",
            role(
                "codepipeline.amazonaws.com",
                json!([
                    {
                        "Effect": "Allow",
                        "Action": ["s3:*"],
                        "Resource": [bucket_arn, format!("{bucket_arn}/*")]
                    },
                    {
                        "Effect": "Allow",
                        "Action": [
                            "codebuild:BatchGetBuilds",
                            "codebuild:StartBuild",
                            "cloudformation:*",
                            "codecommit:GetBranch",
                            "codecommit:GetCommit",
                            "codecommit:UploadArchive",
                            "codecommit:GetUploadArchiveStatus",
                            "codestar-connections:UseConnection"
                        ],
                        "Resource": "*"
                    },
                    {
                        "Effect": "Allow",
                        "Action": "iam:PassRole",
                        "Resource": get_att("DeployRole", "Arn")
                    }
                ]),
            ),
        ),
        CfnResource::new(
            "Pipeline",
            json!({
                "Type": "AWS::CodePipeline::Pipeline",
                "Properties": {
                    "Name": pipeline_name,
                    "RoleArn": get_att("PipelineRole", "Arn"),
                    "RestartExecutionOnUpdate": true,
                    "ArtifactStore": {"Type": "S3", "Location": props.artifact_bucket},
                    "Stages": stages,
                    "Tags": tags([
                        (naming::TAG_APP, props.app),
                        (naming::TAG_PIPELINE, manifest.name.as_str())
                    ])
                }
            }),
        ),
    ]);

    template.add_output(PIPELINE_NAME, reference("Pipeline"), None);

    Ok(template)
}

fn assume_role(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"Service": service},
            "Action": "sts:AssumeRole"
        }]
    })
}

fn role(service: &str, statements: Value) -> Value {
    json!({
        "Type": "AWS::IAM::Role",
        "Properties": {
            "AssumeRolePolicyDocument": assume_role(service),
            "Policies": [{
                "PolicyName": "Pipeline",
                "PolicyDocument": {"Version": "2012-10-17", "Statement": statements}
            }]
        }
    })
}

fn build_project(image: &str, buildspec: &str) -> Value {
    json!({
        "Type": "AWS::CodeBuild::Project",
        "Properties": {
            "ServiceRole": get_att("BuildProjectRole", "Arn"),
            "Artifacts": {"Type": "CODEPIPELINE"},
            "Source": {"Type": "CODEPIPELINE", "BuildSpec": buildspec},
            "Environment": {
                "Type": "LINUX_CONTAINER",
                "ComputeType": "BUILD_GENERAL1_SMALL",
                "Image": image
            },
            "TimeoutInMinutes": 60
        }
    })
}

fn test_buildspec(commands: &[String]) -> String {
    let commands = commands
        .iter()
        .map(|c| format!("        - {}", super::sanitize::quoted(c)))
        .collect::<Vec<_>>()
        .join("\n");

    format!("version: 0.2\nphases:\n  build:\n    commands:\n{commands}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Repository;

    fn render(url: &str, approval: bool) -> Value {
        let repository = Repository::parse(url).unwrap();
        let mut manifest = PipelineManifest::new(
            "release",
            &repository,
            "main",
            &["test".into(), "prod".into()],
        )
        .unwrap();

        manifest.stages[0].test_commands = vec!["make test".into()];
        manifest.stages[1].requires_approval = approval;

        pipeline(&PipelineProps {
            app: "shop",
            manifest: &manifest,
            artifact_bucket: "shop-artifacts",
            workloads: &["api".into(), "report".into()],
            buildspec: "copilot/pipelines/release/buildspec.yml",
        })
        .unwrap()
        .value()
    }

    #[test]
    fn github_source_goes_through_a_connection() {
        let value = render("https://github.com/acme/shop", false);
        let resources = &value["Resources"];

        assert_eq!(
            resources["SourceConnection"]["Properties"]["ProviderType"],
            "GitHub"
        );
        assert_eq!(
            resources["Pipeline"]["Properties"]["Stages"][0]["Actions"][0]["Configuration"]
                ["FullRepositoryId"],
            "acme/shop"
        );
        assert_eq!(resources["Pipeline"]["Properties"]["Name"], "pipeline-shop-release");
        assert!(value["Outputs"].get(CONNECTION_ARN).is_some());
    }

    #[test]
    fn codecommit_needs_no_connection() {
        let value = render(
            "https://git-codecommit.us-east-1.amazonaws.com/v1/repos/shop",
            false,
        );

        assert!(value["Resources"].get("SourceConnection").is_none());
        assert_eq!(
            value["Resources"]["Pipeline"]["Properties"]["Stages"][0]["Actions"][0]
                ["Configuration"]["RepositoryName"],
            "shop"
        );
    }

    #[test]
    fn stages_deploy_every_workload_in_order() {
        let value = render("https://github.com/acme/shop", true);
        let stages = value["Resources"]["Pipeline"]["Properties"]["Stages"]
            .as_array()
            .unwrap();

        assert_eq!(stages.len(), 4);
        assert_eq!(stages[2]["Name"], "DeployTo-test");

        let test_actions = stages[2]["Actions"].as_array().unwrap();
        assert_eq!(test_actions.len(), 3);
        assert_eq!(
            test_actions[0]["Configuration"]["TemplatePath"],
            "BuildOutput::infrastructure/api-test.stack.json"
        );
        assert_eq!(
            test_actions[1]["Configuration"]["StackName"],
            "shop-test-report"
        );
        assert_eq!(test_actions[2]["RunOrder"], 2);

        let prod_actions = stages[3]["Actions"].as_array().unwrap();
        assert_eq!(
            prod_actions[0]["ActionTypeId"]["Category"],
            "Approval"
        );
        assert_eq!(prod_actions[1]["RunOrder"], 2);

        assert!(value["Resources"]["TestProject0"].is_object());
        assert_eq!(
            value["Resources"]["BuildProject"]["Properties"]["Environment"]["PrivilegedMode"],
            true
        );
    }
}
