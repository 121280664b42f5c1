use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Top-level grouping of environments and workloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,

    #[serde(rename = "account")]
    pub account_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Extra tags applied to every stack of the application
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// A deployment stage of an application, e.g. "test" or "prod"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub app: String,
    pub name: String,
    pub region: String,

    #[serde(rename = "accountID")]
    pub account_id: String,

    #[serde(default)]
    pub prod: bool,
}

/// A service or a job registered in an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub app: String,
    pub name: String,

    #[serde(rename = "type")]
    pub kind: WorkloadType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadType {
    #[serde(rename = "Load Balanced Web Service")]
    LoadBalancedWebService,

    #[serde(rename = "Backend Service")]
    BackendService,

    #[serde(rename = "Request-Driven Web Service")]
    RequestDrivenWebService,

    #[serde(rename = "Worker Service")]
    WorkerService,

    #[serde(rename = "Scheduled Job")]
    ScheduledJob,
}

impl WorkloadType {
    pub const SERVICES: [WorkloadType; 4] = [
        WorkloadType::RequestDrivenWebService,
        WorkloadType::LoadBalancedWebService,
        WorkloadType::BackendService,
        WorkloadType::WorkerService,
    ];

    pub const JOBS: [WorkloadType; 1] = [WorkloadType::ScheduledJob];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadType::LoadBalancedWebService => "Load Balanced Web Service",
            WorkloadType::BackendService => "Backend Service",
            WorkloadType::RequestDrivenWebService => "Request-Driven Web Service",
            WorkloadType::WorkerService => "Worker Service",
            WorkloadType::ScheduledJob => "Scheduled Job",
        }
    }

    /// Short description shown next to the type in prompts
    pub fn help(&self) -> &'static str {
        match self {
            WorkloadType::LoadBalancedWebService => {
                "Internet to ECS on Fargate behind an Application Load Balancer"
            }
            WorkloadType::BackendService => "ECS on Fargate, reachable only from inside the VPC",
            WorkloadType::RequestDrivenWebService => "Internet to AWS App Runner",
            WorkloadType::WorkerService => "ECS on Fargate, processing messages off a queue",
            WorkloadType::ScheduledJob => "ECS task triggered on a schedule",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::SERVICES
            .iter()
            .chain(Self::JOBS.iter())
            .find(|t| t.as_str().eq_ignore_ascii_case(value.trim()))
            .copied()
    }

    pub fn is_service(&self) -> bool {
        !self.is_job()
    }

    pub fn is_job(&self) -> bool {
        matches!(self, WorkloadType::ScheduledJob)
    }

    /// Services exposed to the internet get a URL
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            WorkloadType::LoadBalancedWebService | WorkloadType::RequestDrivenWebService
        )
    }

    /// Runs on ECS, as opposed to App Runner
    pub fn is_ecs(&self) -> bool {
        !matches!(self, WorkloadType::RequestDrivenWebService)
    }
}

impl fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_type_round_trips_through_its_label() {
        for kind in WorkloadType::SERVICES.iter().chain(WorkloadType::JOBS.iter()) {
            assert_eq!(WorkloadType::parse(kind.as_str()), Some(*kind));
        }

        assert_eq!(
            WorkloadType::parse("backend service"),
            Some(WorkloadType::BackendService)
        );
        assert_eq!(WorkloadType::parse("Lambda"), None);
    }

    #[test]
    fn environment_serializes_with_store_field_names() {
        let env = Environment {
            app: "shop".into(),
            name: "test".into(),
            region: "us-west-2".into(),
            account_id: "123456789012".into(),
            prod: false,
        };

        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["accountID"], "123456789012");
        assert_eq!(json["prod"], false);

        let back: Environment = serde_json::from_value(json).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn workload_kind_is_stored_as_type() {
        let json = r#"{"app":"shop","name":"api","type":"Scheduled Job"}"#;
        let workload: Workload = serde_json::from_str(json).unwrap();

        assert_eq!(workload.kind, WorkloadType::ScheduledJob);
        assert!(workload.kind.is_job());
        assert!(!workload.kind.is_service());
    }
}
