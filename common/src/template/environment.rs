use super::{get_att, reference, tags, CfnResource, Template};
use crate::manifest::environment::ImportedVpc;
use crate::naming;
use serde_json::{json, Value};

// Outputs exported by every environment stack
pub const VPC_ID: &str = "VpcId";
pub const PUBLIC_SUBNETS: &str = "PublicSubnets";
pub const PRIVATE_SUBNETS: &str = "PrivateSubnets";
pub const CLUSTER_ID: &str = "ClusterId";
pub const SECURITY_GROUP: &str = "EnvironmentSecurityGroup";
pub const LOAD_BALANCER_DNS: &str = "PublicLoadBalancerDNSName";
pub const HTTP_LISTENER: &str = "HTTPListenerArn";
pub const NAMESPACE_ID: &str = "ServiceDiscoveryNamespaceID";

const VPC_CIDR: &str = "10.0.0.0/16";
const PUBLIC_CIDRS: [&str; 2] = ["10.0.0.0/24", "10.0.1.0/24"];
const PRIVATE_CIDRS: [&str; 2] = ["10.0.2.0/24", "10.0.3.0/24"];

pub struct EnvironmentProps<'a> {
    pub app: &'a str,
    pub name: &'a str,
    pub prod: bool,

    /// Existing network to deploy into, a new VPC is created otherwise
    pub vpc: Option<&'a ImportedVpc>,
}

/// Network, cluster, load balancer and service discovery shared by the workloads of an environment
pub fn environment(props: &EnvironmentProps) -> Template {
    let EnvironmentProps { app, name, .. } = *props;
    let mut template = Template::new(&format!(
        "The {name} environment of the {app} application."
    ));

    let resource_tags = tags([(naming::TAG_APP, app), (naming::TAG_ENV, name)]);

    let (vpc_id, public_subnets, private_subnets) = match props.vpc {
        Some(vpc) => (
            json!(vpc.id),
            json!(vpc.subnets.public),
            json!(vpc.subnets.private),
        ),
        None => {
            template.add_resources(network(&resource_tags));

            (
                reference("VPC"),
                json!(subnet_names("Public").map(|s| reference(&s))),
                json!(subnet_names("Private").map(|s| reference(&s))),
            )
        }
    };

    template.add_resources([
        CfnResource::new(
            "Cluster",
            json!({
                "Type": "AWS::ECS::Cluster",
                "Properties": {
                    "CapacityProviders": ["FARGATE", "FARGATE_SPOT"],
                    "ClusterSettings": [{
                        "Name": "containerInsights",
                        "Value": if props.prod { "enabled" } else { "disabled" }
                    }],
                    "Tags": resource_tags
                }
            }),
        ),
        CfnResource::new(
            "PublicLoadBalancerSecurityGroup",
            json!({
                "Type": "AWS::EC2::SecurityGroup",
                "Properties": {
                    "GroupDescription": "Access to the public facing load balancer",
                    "SecurityGroupIngress": [{
                        "CidrIp": "0.0.0.0/0",
                        "Description": "Allow from anyone on port 80",
                        "FromPort": 80,
                        "ToPort": 80,
                        "IpProtocol": "tcp"
                    }],
                    "VpcId": vpc_id,
                    "Tags": resource_tags
                }
            }),
        ),
        CfnResource::new(
            SECURITY_GROUP,
            json!({
                "Type": "AWS::EC2::SecurityGroup",
                "Properties": {
                    "GroupDescription": format!("{app}-{name}-{SECURITY_GROUP}"),
                    "VpcId": vpc_id,
                    "Tags": resource_tags
                }
            }),
        ),
        CfnResource::new(
            format!("{SECURITY_GROUP}IngressFromSelf"),
            json!({
                "Type": "AWS::EC2::SecurityGroupIngress",
                "Properties": {
                    "Description": "Ingress from other containers in the same security group",
                    "GroupId": reference(SECURITY_GROUP),
                    "IpProtocol": -1,
                    "SourceSecurityGroupId": reference(SECURITY_GROUP)
                }
            }),
        ),
        CfnResource::new(
            format!("{SECURITY_GROUP}IngressFromPublicALB"),
            json!({
                "Type": "AWS::EC2::SecurityGroupIngress",
                "Properties": {
                    "Description": "Ingress from the public load balancer",
                    "GroupId": reference(SECURITY_GROUP),
                    "IpProtocol": -1,
                    "SourceSecurityGroupId": reference("PublicLoadBalancerSecurityGroup")
                }
            }),
        ),
        CfnResource::new(
            "PublicLoadBalancer",
            json!({
                "Type": "AWS::ElasticLoadBalancingV2::LoadBalancer",
                "Properties": {
                    "Scheme": "internet-facing",
                    "SecurityGroups": [get_att("PublicLoadBalancerSecurityGroup", "GroupId")],
                    "Subnets": public_subnets,
                    "Type": "application",
                    "Tags": resource_tags
                }
            }),
        ),
        CfnResource::new(
            "DefaultHTTPTargetGroup",
            json!({
                "Type": "AWS::ElasticLoadBalancingV2::TargetGroup",
                "Properties": {
                    "HealthCheckIntervalSeconds": 10,
                    "HealthCheckTimeoutSeconds": 5,
                    "HealthyThresholdCount": 2,
                    "Port": 80,
                    "Protocol": "HTTP",
                    "TargetType": "ip",
                    "VpcId": vpc_id
                }
            }),
        ),
        CfnResource::new(
            "HTTPListener",
            json!({
                "Type": "AWS::ElasticLoadBalancingV2::Listener",
                "Properties": {
                    "DefaultActions": [{
                        "TargetGroupArn": reference("DefaultHTTPTargetGroup"),
                        "Type": "forward"
                    }],
                    "LoadBalancerArn": reference("PublicLoadBalancer"),
                    "Port": 80,
                    "Protocol": "HTTP"
                }
            }),
        ),
        CfnResource::new(
            "ServiceDiscoveryNamespace",
            json!({
                "Type": "AWS::ServiceDiscovery::PrivateDnsNamespace",
                "Properties": {
                    "Name": naming::namespace(app, name),
                    "Vpc": vpc_id
                }
            }),
        ),
    ]);

    let join = |subnets: Value| json!({ "Fn::Join": [",", subnets] });

    for (output, value) in [
        (VPC_ID, vpc_id.clone()),
        (PUBLIC_SUBNETS, join(public_subnets)),
        (PRIVATE_SUBNETS, join(private_subnets)),
        (CLUSTER_ID, reference("Cluster")),
        (SECURITY_GROUP, reference(SECURITY_GROUP)),
        (LOAD_BALANCER_DNS, get_att("PublicLoadBalancer", "DNSName")),
        (HTTP_LISTENER, reference("HTTPListener")),
        (NAMESPACE_ID, get_att("ServiceDiscoveryNamespace", "Id")),
    ] {
        template.add_output(output, value, Some(naming::env_export(app, name, output)));
    }

    template
}

fn subnet_names(kind: &str) -> [String; 2] {
    [0, 1].map(|i| format!("{kind}Subnet{}", i + 1))
}

/// VPC with two public and two private subnets in different availability zones
fn network(resource_tags: &Value) -> Vec<CfnResource> {
    let mut resources = vec![
        CfnResource::new(
            "VPC",
            json!({
                "Type": "AWS::EC2::VPC",
                "Properties": {
                    "CidrBlock": VPC_CIDR,
                    "EnableDnsHostnames": true,
                    "EnableDnsSupport": true,
                    "InstanceTenancy": "default",
                    "Tags": resource_tags
                }
            }),
        ),
        CfnResource::new(
            "InternetGateway",
            json!({
                "Type": "AWS::EC2::InternetGateway",
                "Properties": {"Tags": resource_tags}
            }),
        ),
        CfnResource::new(
            "InternetGatewayAttachment",
            json!({
                "Type": "AWS::EC2::VPCGatewayAttachment",
                "Properties": {
                    "InternetGatewayId": reference("InternetGateway"),
                    "VpcId": reference("VPC")
                }
            }),
        ),
        CfnResource::new(
            "PublicRouteTable",
            json!({
                "Type": "AWS::EC2::RouteTable",
                "Properties": {"VpcId": reference("VPC"), "Tags": resource_tags}
            }),
        ),
        CfnResource::new(
            "DefaultPublicRoute",
            json!({
                "Type": "AWS::EC2::Route",
                "DependsOn": "InternetGatewayAttachment",
                "Properties": {
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "GatewayId": reference("InternetGateway"),
                    "RouteTableId": reference("PublicRouteTable")
                }
            }),
        ),
    ];

    let subnets = subnet_names("Public")
        .into_iter()
        .zip(PUBLIC_CIDRS)
        .map(|subnet| (subnet, true))
        .chain(
            subnet_names("Private")
                .into_iter()
                .zip(PRIVATE_CIDRS)
                .map(|subnet| (subnet, false)),
        );

    for (zone, ((subnet, cidr), public)) in subnets.enumerate() {
        resources.push(CfnResource::new(
            subnet.clone(),
            json!({
                "Type": "AWS::EC2::Subnet",
                "Properties": {
                    "CidrBlock": cidr,
                    "VpcId": reference("VPC"),
                    "AvailabilityZone": {"Fn::Select": [zone % 2, {"Fn::GetAZs": ""}]},
                    "MapPublicIpOnLaunch": public,
                    "Tags": resource_tags
                }
            }),
        ));

        if public {
            resources.push(CfnResource::new(
                format!("{subnet}RouteTableAssociation"),
                json!({
                    "Type": "AWS::EC2::SubnetRouteTableAssociation",
                    "Properties": {
                        "RouteTableId": reference("PublicRouteTable"),
                        "SubnetId": reference(&subnet)
                    }
                }),
            ));
        }
    }

    resources
}
