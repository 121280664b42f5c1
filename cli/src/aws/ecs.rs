use crate::aws::{count, sdk_error, text};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ecs::types::{AssignPublicIp, AwsVpcConfiguration, LaunchType, NetworkConfiguration};
use eyre::{eyre, ContextCompat, WrapErr};
use serde::Serialize;

/// Cluster used by tasks started outside of any environment
pub(crate) const DEFAULT_CLUSTER: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct ServiceStatus {
    pub(crate) status: String,
    pub(crate) desired: i64,
    pub(crate) running: i64,
    pub(crate) pending: i64,
    pub(crate) deployments: Vec<DeploymentStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct DeploymentStatus {
    pub(crate) status: String,
    pub(crate) task_definition: String,
    pub(crate) rollout: String,
    pub(crate) desired: i64,
    pub(crate) running: i64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RunTaskInput {
    /// The default cluster is used when missing
    pub(crate) cluster: Option<String>,

    pub(crate) task_definition: String,
    pub(crate) count: u32,
    pub(crate) subnets: Vec<String>,
    pub(crate) security_groups: Vec<String>,

    /// Task group, the tasks can be found by it later
    pub(crate) group: String,
}

#[async_trait]
pub(crate) trait Ecs: Send + Sync {
    async fn service_status(&self, cluster: &str, service: &str) -> eyre::Result<ServiceStatus>;

    /// Start the tasks and return their ARNs
    async fn run_task(&self, input: &RunTaskInput) -> eyre::Result<Vec<String>>;
}

pub(crate) struct EcsClient {
    client: aws_sdk_ecs::Client,
}

impl EcsClient {
    pub(crate) fn new(config: &SdkConfig) -> Self {
        EcsClient {
            client: aws_sdk_ecs::Client::new(config),
        }
    }

    /// The default cluster only exists after it was used once
    async fn default_cluster(&self) -> eyre::Result<String> {
        self.client
            .create_cluster()
            .cluster_name(DEFAULT_CLUSTER)
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err("Failed to create the default cluster")?;

        Ok(DEFAULT_CLUSTER.to_string())
    }
}

#[async_trait]
impl Ecs for EcsClient {
    async fn service_status(&self, cluster: &str, service: &str) -> eyre::Result<ServiceStatus> {
        let output = self
            .client
            .describe_services()
            .cluster(cluster)
            .services(service)
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err_with(|| format!("Failed to describe service {service}"))?;

        let service = output
            .services()
            .first()
            .wrap_err_with(|| format!("Service {service} not found in cluster {cluster}"))?;

        Ok(ServiceStatus {
            status: text(service.status()),
            desired: count(service.desired_count()),
            running: count(service.running_count()),
            pending: count(service.pending_count()),
            deployments: service
                .deployments()
                .iter()
                .map(|d| DeploymentStatus {
                    status: text(d.status()),
                    task_definition: text(d.task_definition()),
                    rollout: d
                        .rollout_state()
                        .map(|r| r.as_str().to_string())
                        .unwrap_or_default(),
                    desired: count(d.desired_count()),
                    running: count(d.running_count()),
                })
                .collect(),
        })
    }

    async fn run_task(&self, input: &RunTaskInput) -> eyre::Result<Vec<String>> {
        let cluster = match &input.cluster {
            Some(cluster) => cluster.clone(),
            None => self.default_cluster().await?,
        };

        let vpc = AwsVpcConfiguration::builder()
            .set_subnets(Some(input.subnets.clone()))
            .set_security_groups((!input.security_groups.is_empty()).then(|| input.security_groups.clone()))
            .assign_public_ip(AssignPublicIp::Enabled)
            .build()
            .wrap_err("Failed to build network configuration")?;

        let output = self
            .client
            .run_task()
            .cluster(&cluster)
            .task_definition(&input.task_definition)
            .count(input.count as i32)
            .launch_type(LaunchType::Fargate)
            .group(&input.group)
            .network_configuration(NetworkConfiguration::builder().awsvpc_configuration(vpc).build())
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err("Failed to run tasks")?;

        if let Some(failure) = output.failures().first() {
            return Err(eyre!(
                "Failed to run tasks: {} {}",
                text(failure.arn()),
                text(failure.reason())
            ));
        }

        Ok(output
            .tasks()
            .iter()
            .map(|t| text(t.task_arn()))
            .collect())
    }
}
