use super::environment::{
    CLUSTER_ID, HTTP_LISTENER, LOAD_BALANCER_DNS, NAMESPACE_ID, PUBLIC_SUBNETS, SECURITY_GROUP,
    VPC_ID,
};
use super::{get_att, import, import_list, intrinsic, reference, CfnResource, Template};
use crate::addon::{AddonOutput, OutputKind, RESERVED_PARAMETERS};
use crate::manifest::WorkloadManifest;
use crate::model::WorkloadType;
use crate::naming;
use serde_json::{json, Map, Value};

/// URL of a public service
pub const SERVICE_URL: &str = "ServiceURL";

/// Name of the ECS service, used by `svc status`
pub const SERVICE_NAME: &str = "ECSServiceName";

/// ARN of the App Runner service
pub const SERVICE_ARN: &str = "ServiceArn";

/// Logical ID of the nested stack with the addons
pub const ADDONS_STACK: &str = "AddonsStack";

/// Logical ID of the security group every ECS workload gets, addons may allow it in
pub const SERVICE_SECURITY_GROUP: &str = "ServiceSecurityGroup";

const LOG_RETENTION_DAYS: u32 = 30;
const MAX_LISTENER_PRIORITY: u32 = 50_000;

/// Addons template uploaded next to the workload
#[derive(Debug, Clone, Default)]
pub struct Addons {
    pub template_url: String,

    /// Extra parameters from addons.parameters.yml
    pub parameters: serde_yaml::Mapping,

    pub outputs: Vec<AddonOutput>,
}

impl Addons {
    fn of_kind(&self, kind: OutputKind) -> impl Iterator<Item = &AddonOutput> {
        self.outputs.iter().filter(move |o| o.kind == kind)
    }
}

pub struct WorkloadStackProps<'a> {
    pub app: &'a str,
    pub env: &'a str,

    /// Manifest with the environment overrides applied
    pub manifest: &'a WorkloadManifest,

    /// Full image reference, including the tag
    pub image: &'a str,

    pub addons: Option<&'a Addons>,
}

impl WorkloadStackProps<'_> {
    fn family(&self) -> String {
        naming::workload_stack(self.app, self.env, &self.manifest.name)
    }
}

/// Stack of a service or a job in one environment
pub fn workload(props: &WorkloadStackProps) -> eyre::Result<Template> {
    let manifest = props.manifest;
    let mut template = Template::new(&format!(
        "CloudFormation template for the {} {}.",
        manifest.kind, manifest.name
    ));

    if let Some(addons) = props.addons {
        template.add_resource(addons_stack(props.app, props.env, &manifest.name, addons));
    }

    match manifest.kind {
        WorkloadType::LoadBalancedWebService
        | WorkloadType::BackendService
        | WorkloadType::WorkerService => {
            task(props, &mut template);
            service(props, &mut template);
        }
        WorkloadType::RequestDrivenWebService => app_runner(props, &mut template),
        WorkloadType::ScheduledJob => {
            task(props, &mut template);
            super::job::schedule(props, &mut template)?;
        }
    }

    Ok(template)
}

fn addons_stack(app: &str, env: &str, name: &str, addons: &Addons) -> CfnResource {
    let mut parameters = Map::new();

    for (key, value) in [("App", app), ("Env", env), ("Name", name)] {
        parameters.insert(key.to_string(), json!(value));
    }

    for (key, value) in addons.parameters.iter() {
        if let Some(key) = key.as_str().filter(|k| !RESERVED_PARAMETERS.contains(k)) {
            parameters.insert(key.to_string(), intrinsic(value));
        }
    }

    CfnResource::new(
        ADDONS_STACK,
        json!({
            "Type": "AWS::CloudFormation::Stack",
            "Properties": {
                "Parameters": parameters,
                "TemplateURL": addons.template_url
            }
        }),
    )
}

fn addon_output(name: &str) -> Value {
    get_att(ADDONS_STACK, &format!("Outputs.{name}"))
}

/// Variables every container receives, plus the manifest and addon ones
fn environment_variables(props: &WorkloadStackProps) -> Vec<Value> {
    let name = &props.manifest.name;

    let mut variables = vec![
        json!({"Name": "COPILOT_APPLICATION_NAME", "Value": props.app}),
        json!({"Name": "COPILOT_ENVIRONMENT_NAME", "Value": props.env}),
        json!({"Name": "COPILOT_SERVICE_NAME", "Value": name}),
        json!({
            "Name": "COPILOT_SERVICE_DISCOVERY_ENDPOINT",
            "Value": naming::namespace(props.app, props.env)
        }),
    ];

    variables.extend(
        props
            .manifest
            .variables
            .iter()
            .map(|(name, value)| json!({"Name": name, "Value": value})),
    );

    if let Some(addons) = props.addons {
        variables.extend(addons.of_kind(OutputKind::Variable).map(|o| {
            json!({"Name": naming::env_var_name(&o.name), "Value": addon_output(&o.name)})
        }));
    }

    variables
}

/// Secrets as (name, reference) pairs
fn secrets(props: &WorkloadStackProps) -> Vec<(String, Value)> {
    let mut secrets: Vec<(String, Value)> = props
        .manifest
        .secrets
        .iter()
        .map(|(name, parameter)| (name.clone(), json!(parameter)))
        .collect();

    if let Some(addons) = props.addons {
        secrets.extend(
            addons
                .of_kind(OutputKind::Secret)
                .map(|o| (naming::env_var_name(&o.name), addon_output(&o.name))),
        );
    }

    secrets
}

fn managed_policies(props: &WorkloadStackProps) -> Vec<Value> {
    props
        .addons
        .map(|addons| {
            addons
                .of_kind(OutputKind::ManagedPolicy)
                .map(|o| addon_output(&o.name))
                .collect()
        })
        .unwrap_or_default()
}

/// Security groups of the tasks, the environment's one first
pub(super) fn security_groups(props: &WorkloadStackProps) -> Vec<Value> {
    let mut groups = vec![
        import(props.app, props.env, SECURITY_GROUP),
        get_att(SERVICE_SECURITY_GROUP, "GroupId"),
    ];

    if let Some(addons) = props.addons {
        groups.extend(
            addons
                .of_kind(OutputKind::SecurityGroup)
                .map(|o| addon_output(&o.name)),
        );
    }

    groups
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

/// Log group, roles, task definition and security group of an ECS workload
pub(super) fn task(props: &WorkloadStackProps, template: &mut Template) {
    let manifest = props.manifest;
    let name = &manifest.name;
    let family = props.family();

    let port_mappings = manifest
        .image
        .port
        .map(|port| vec![json!({"ContainerPort": port, "Protocol": "tcp"})])
        .unwrap_or_default();

    let secrets = secrets(props)
        .into_iter()
        .map(|(name, value)| json!({"Name": name, "ValueFrom": value}))
        .collect::<Vec<_>>();

    // Only parameters and secrets tagged with the application and the environment are readable
    let tag_condition = json!({
        "StringEquals": Map::from_iter([
            (format!("aws:ResourceTag/{}", naming::TAG_APP), json!(props.app)),
            (format!("aws:ResourceTag/{}", naming::TAG_ENV), json!(props.env)),
        ])
    });

    template.add_resources([
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
                    "AssumeRolePolicyDocument": assume_role("ecs-tasks.amazonaws.com"),
                    "ManagedPolicyArns": [
                        {"Fn::Sub": "arn:${AWS::Partition}:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy"}
                    ],
                    "Policies": [{
                        "PolicyName": "ReadSecrets",
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [
                                {
                                    "Effect": "Allow",
                                    "Action": ["ssm:GetParameters"],
                                    "Resource": {"Fn::Sub": "arn:${AWS::Partition}:ssm:${AWS::Region}:${AWS::AccountId}:parameter/*"},
                                    "Condition": tag_condition
                                },
                                {
                                    "Effect": "Allow",
                                    "Action": ["secretsmanager:GetSecretValue"],
                                    "Resource": {"Fn::Sub": "arn:${AWS::Partition}:secretsmanager:${AWS::Region}:${AWS::AccountId}:secret:*"},
                                    "Condition": tag_condition
                                }
                            ]
                        }
                    }]
                }
            }),
        ),
        CfnResource::new(
            "TaskRole",
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": assume_role("ecs-tasks.amazonaws.com"),
                    "ManagedPolicyArns": managed_policies(props)
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
                    "Cpu": manifest.cpu.to_string(),
                    "Memory": manifest.memory.to_string(),
                    "ExecutionRoleArn": get_att("ExecutionRole", "Arn"),
                    "TaskRoleArn": get_att("TaskRole", "Arn"),
                    "ContainerDefinitions": [{
                        "Name": name,
                        "Image": props.image,
                        "Essential": true,
                        "PortMappings": port_mappings,
                        "Environment": environment_variables(props),
                        "Secrets": secrets,
                        "LogConfiguration": {
                            "LogDriver": "awslogs",
                            "Options": {
                                "awslogs-region": {"Ref": "AWS::Region"},
                                "awslogs-group": reference("LogGroup"),
                                "awslogs-stream-prefix": "copilot"
                            }
                        }
                    }]
                }
            }),
        ),
        CfnResource::new(
            SERVICE_SECURITY_GROUP,
            json!({
                "Type": "AWS::EC2::SecurityGroup",
                "Properties": {
                    "GroupDescription": format!("The security group of the {name} workload"),
                    "VpcId": import(props.app, props.env, VPC_ID)
                }
            }),
        ),
    ]);
}

/// Long running ECS service, behind the public load balancer for web services
fn service(props: &WorkloadStackProps, template: &mut Template) {
    let manifest = props.manifest;
    let name = &manifest.name;

    template.add_resource(CfnResource::new(
        "DiscoveryService",
        json!({
            "Type": "AWS::ServiceDiscovery::Service",
            "Properties": {
                "Description": format!("Discovery service for the {name} service"),
                "DnsConfig": {
                    "RoutingPolicy": "MULTIVALUE",
                    "DnsRecords": [{"TTL": 10, "Type": "A"}]
                },
                "HealthCheckCustomConfig": {"FailureThreshold": 1},
                "Name": name,
                "NamespaceId": import(props.app, props.env, NAMESPACE_ID)
            }
        }),
    ));

    let mut service = json!({
        "Type": "AWS::ECS::Service",
        "Properties": {
            "Cluster": import(props.app, props.env, CLUSTER_ID),
            "TaskDefinition": reference("TaskDefinition"),
            "DesiredCount": manifest.count.unwrap_or(1),
            "LaunchType": "FARGATE",
            "PropagateTags": "SERVICE",
            "EnableECSManagedTags": true,
            "DeploymentConfiguration": {
                "DeploymentCircuitBreaker": {"Enable": true, "Rollback": true},
                "MinimumHealthyPercent": 100,
                "MaximumPercent": 200
            },
            "NetworkConfiguration": {
                "AwsvpcConfiguration": {
                    "AssignPublicIp": "ENABLED",
                    "Subnets": import_list(props.app, props.env, PUBLIC_SUBNETS),
                    "SecurityGroups": security_groups(props)
                }
            },
            "ServiceRegistries": [{"RegistryArn": get_att("DiscoveryService", "Arn")}]
        }
    });

    if let (WorkloadType::LoadBalancedWebService, Some(port)) = (manifest.kind, manifest.image.port)
    {
        let http = manifest.http.clone().unwrap_or(crate::manifest::workload::Http {
            path: "/".into(),
            healthcheck: None,
        });

        template.add_resources([
            CfnResource::new(
                "TargetGroup",
                json!({
                    "Type": "AWS::ElasticLoadBalancingV2::TargetGroup",
                    "Properties": {
                        "HealthCheckPath": http.healthcheck.as_deref().unwrap_or("/"),
                        "Port": port,
                        "Protocol": "HTTP",
                        "TargetType": "ip",
                        "VpcId": import(props.app, props.env, VPC_ID),
                        "TargetGroupAttributes": [
                            {"Key": "deregistration_delay.timeout_seconds", "Value": "60"}
                        ]
                    }
                }),
            ),
            CfnResource::new(
                "HTTPListenerRule",
                json!({
                    "Type": "AWS::ElasticLoadBalancingV2::ListenerRule",
                    "Properties": {
                        "Actions": [{"TargetGroupArn": reference("TargetGroup"), "Type": "forward"}],
                        "Conditions": [{"Field": "path-pattern", "Values": path_patterns(&http.path)}],
                        "ListenerArn": import(props.app, props.env, HTTP_LISTENER),
                        "Priority": listener_priority(&props.family())
                    }
                }),
            ),
        ]);

        service["DependsOn"] = json!("HTTPListenerRule");
        service["Properties"]["HealthCheckGracePeriodSeconds"] = json!(60);
        service["Properties"]["LoadBalancers"] = json!([{
            "ContainerName": name,
            "ContainerPort": port,
            "TargetGroupArn": reference("TargetGroup")
        }]);

        template.add_output(
            SERVICE_URL,
            json!({"Fn::Join": ["", [
                "http://",
                import(props.app, props.env, LOAD_BALANCER_DNS),
                http.path
            ]]}),
            None,
        );
    }

    template.add_resource(CfnResource::new("Service", service));
    template.add_output(SERVICE_NAME, get_att("Service", "Name"), None);
}

/// Request-driven web service on App Runner
fn app_runner(props: &WorkloadStackProps, template: &mut Template) {
    let manifest = props.manifest;
    let is_private_registry = props.image.contains(".dkr.ecr.");

    let variables = environment_variables(props);

    let secrets = secrets(props)
        .into_iter()
        .map(|(name, value)| json!({"Name": name, "Value": value}))
        .collect::<Vec<_>>();

    let mut source = json!({
        "AutoDeploymentsEnabled": false,
        "ImageRepository": {
            "ImageIdentifier": props.image,
            "ImageRepositoryType": if is_private_registry { "ECR" } else { "ECR_PUBLIC" },
            "ImageConfiguration": {
                "Port": manifest.image.port.unwrap_or(80).to_string(),
                "RuntimeEnvironmentVariables": variables,
                "RuntimeEnvironmentSecrets": secrets
            }
        }
    });

    if is_private_registry {
        template.add_resource(CfnResource::new(
            "AccessRole",
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": assume_role("build.apprunner.amazonaws.com"),
                    "ManagedPolicyArns": [
                        {"Fn::Sub": "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSAppRunnerServicePolicyForECRAccess"}
                    ]
                }
            }),
        ));

        source["AuthenticationConfiguration"] =
            json!({"AccessRoleArn": get_att("AccessRole", "Arn")});
    }

    template.add_resources([
        CfnResource::new(
            "InstanceRole",
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": assume_role("tasks.apprunner.amazonaws.com"),
                    "ManagedPolicyArns": managed_policies(props)
                }
            }),
        ),
        CfnResource::new(
            "Service",
            json!({
                "Type": "AWS::AppRunner::Service",
                "Properties": {
                    "ServiceName": props.family(),
                    "SourceConfiguration": source,
                    "InstanceConfiguration": {
                        "Cpu": manifest.cpu.to_string(),
                        "Memory": manifest.memory.to_string(),
                        "InstanceRoleArn": get_att("InstanceRole", "Arn")
                    },
                    "HealthCheckConfiguration": {
                        "Path": manifest
                            .http
                            .as_ref()
                            .and_then(|h| h.healthcheck.as_deref())
                            .unwrap_or("/"),
                        "Protocol": "HTTP"
                    }
                }
            }),
        ),
    ]);

    template.add_output(
        SERVICE_URL,
        json!({"Fn::Join": ["", ["https://", get_att("Service", "ServiceUrl")]]}),
        None,
    );
    template.add_output(SERVICE_ARN, get_att("Service", "ServiceArn"), None);
}

/// Path patterns routed to a service by the load balancer
fn path_patterns(path: &str) -> Vec<String> {
    let path = path.trim_matches('/');

    if path.is_empty() {
        vec!["/*".into()]
    } else {
        vec![format!("/{path}"), format!("/{path}/*")]
    }
}

/// Stable listener rule priority derived from the stack name (FNV-1a)
fn listener_priority(family: &str) -> u32 {
    let hash = family.bytes().fold(0x811c9dc5u32, |hash, byte| {
        (hash ^ byte as u32).wrapping_mul(0x01000193)
    });

    1 + hash % (MAX_LISTENER_PRIORITY - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::workload::WorkloadProps;

    fn manifest(kind: WorkloadType) -> WorkloadManifest {
        let mut manifest = WorkloadManifest::new(
            kind,
            &WorkloadProps {
                name: "api".into(),
                dockerfile: Some("Dockerfile".into()),
                schedule: Some("@daily".into()),
                ..Default::default()
            },
        )
        .unwrap();

        manifest.variables.insert("LOG_LEVEL".into(), "info".into());
        manifest
            .secrets
            .insert("GITHUB_TOKEN".into(), "GH_TOKEN".into());
        manifest
    }

    fn addons() -> Addons {
        let mut parameters = serde_yaml::Mapping::new();
        parameters.insert(
            "ServiceSecurityGroupId".into(),
            serde_yaml::from_str("!Ref ServiceSecurityGroup").unwrap(),
        );

        Addons {
            template_url: "https://bucket.s3.us-east-1.amazonaws.com/manual/addons/api/abc.yml"
                .into(),
            parameters,
            outputs: vec![
                AddonOutput {
                    name: "ordersName".into(),
                    kind: OutputKind::Variable,
                },
                AddonOutput {
                    name: "ordersAccessPolicy".into(),
                    kind: OutputKind::ManagedPolicy,
                },
                AddonOutput {
                    name: "dbSecret".into(),
                    kind: OutputKind::Secret,
                },
                AddonOutput {
                    name: "dbSecurityGroup".into(),
                    kind: OutputKind::SecurityGroup,
                },
            ],
        }
    }

    fn render(manifest: &WorkloadManifest, addons: Option<&Addons>) -> Value {
        workload(&WorkloadStackProps {
            app: "shop",
            env: "test",
            manifest,
            image: "123456789012.dkr.ecr.us-east-1.amazonaws.com/shop/api:v1",
            addons,
        })
        .unwrap()
        .value()
    }

    #[test]
    fn load_balanced_service_is_routed_by_path() {
        let mut manifest = manifest(WorkloadType::LoadBalancedWebService);
        manifest.http.as_mut().unwrap().path = "api/".into();

        let value = render(&manifest, None);
        let resources = &value["Resources"];

        assert_eq!(
            resources["HTTPListenerRule"]["Properties"]["Conditions"][0]["Values"],
            json!(["/api", "/api/*"])
        );
        assert_eq!(
            resources["Service"]["Properties"]["LoadBalancers"][0]["ContainerPort"],
            80
        );
        assert_eq!(resources["Service"]["DependsOn"], "HTTPListenerRule");
        assert_eq!(
            resources["TaskDefinition"]["Properties"]["Family"],
            "shop-test-api"
        );
        assert!(value["Outputs"].get(SERVICE_URL).is_some());
        assert!(value["Outputs"].get(SERVICE_NAME).is_some());
    }

    #[test]
    fn backend_service_has_no_load_balancer() {
        let value = render(&manifest(WorkloadType::BackendService), None);

        assert!(value["Resources"].get("TargetGroup").is_none());
        assert!(value["Resources"]["Service"]["Properties"]
            .get("LoadBalancers")
            .is_none());
        assert!(value["Resources"]["ServiceSecurityGroup"].is_object());
        assert!(value["Outputs"].get(SERVICE_URL).is_none());
    }

    #[test]
    fn addon_outputs_are_wired_by_kind() {
        let addons = addons();
        let value = render(&manifest(WorkloadType::BackendService), Some(&addons));
        let resources = &value["Resources"];

        assert_eq!(
            resources["AddonsStack"]["Properties"]["Parameters"],
            json!({
                "App": "shop",
                "Env": "test",
                "Name": "api",
                "ServiceSecurityGroupId": {"Ref": "ServiceSecurityGroup"}
            })
        );

        let container = &resources["TaskDefinition"]["Properties"]["ContainerDefinitions"][0];
        let environment = container["Environment"].as_array().unwrap();

        assert!(environment.contains(&json!({
            "Name": "ORDERS_NAME",
            "Value": {"Fn::GetAtt": ["AddonsStack", "Outputs.ordersName"]}
        })));
        assert!(environment.contains(&json!({"Name": "LOG_LEVEL", "Value": "info"})));
        assert!(environment.contains(&json!({"Name": "COPILOT_SERVICE_DISCOVERY_ENDPOINT", "Value": "test.shop.local"})));

        assert_eq!(
            container["Secrets"],
            json!([
                {"Name": "GITHUB_TOKEN", "ValueFrom": "GH_TOKEN"},
                {"Name": "DB_SECRET", "ValueFrom": {"Fn::GetAtt": ["AddonsStack", "Outputs.dbSecret"]}}
            ])
        );

        assert_eq!(
            resources["TaskRole"]["Properties"]["ManagedPolicyArns"],
            json!([{"Fn::GetAtt": ["AddonsStack", "Outputs.ordersAccessPolicy"]}])
        );

        let groups = &resources["Service"]["Properties"]["NetworkConfiguration"]
            ["AwsvpcConfiguration"]["SecurityGroups"];
        assert_eq!(groups.as_array().unwrap().len(), 3);
        assert_eq!(
            groups[0],
            json!({"Fn::ImportValue": "shop-test-EnvironmentSecurityGroup"})
        );
    }

    #[test]
    fn request_driven_service_runs_on_app_runner() {
        let value = render(&manifest(WorkloadType::RequestDrivenWebService), None);
        let service = &value["Resources"]["Service"];

        assert_eq!(service["Type"], "AWS::AppRunner::Service");
        assert_eq!(
            service["Properties"]["SourceConfiguration"]["ImageRepository"]["ImageRepositoryType"],
            "ECR"
        );
        assert_eq!(service["Properties"]["InstanceConfiguration"]["Cpu"], "1024");
        assert!(value["Resources"]["AccessRole"].is_object());
        assert!(value["Resources"].get("TaskDefinition").is_none());
        assert!(value["Outputs"].get(SERVICE_ARN).is_some());
    }

    #[test]
    fn path_patterns_cover_the_root() {
        assert_eq!(path_patterns("/"), vec!["/*"]);
        assert_eq!(path_patterns("/admin"), vec!["/admin", "/admin/*"]);
    }

    #[test]
    fn listener_priority_is_stable_and_in_range() {
        let priority = listener_priority("shop-test-api");

        assert_eq!(priority, listener_priority("shop-test-api"));
        assert!((1..MAX_LISTENER_PRIORITY).contains(&priority));
        assert_ne!(priority, listener_priority("shop-test-web"));
    }
}
