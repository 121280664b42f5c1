//! Names of the resources created on behalf of the user
//!
//! Every stack, repository and parameter is derived from the application,
//! environment and workload names, so that any command can find what another one created.

use std::collections::BTreeMap;

pub const TAG_APP: &str = "copilot-application";
pub const TAG_ENV: &str = "copilot-environment";
pub const TAG_SERVICE: &str = "copilot-service";
pub const TAG_TASK: &str = "copilot-task";
pub const TAG_PIPELINE: &str = "copilot-pipeline";

/// Root of all parameters kept in SSM
pub const SSM_ROOT: &str = "/copilot";

/// Tags of a resource belonging to an application, and optionally to an environment and a workload
pub fn resource_tags(app: &str, env: Option<&str>, workload: Option<&str>) -> BTreeMap<String, String> {
    [
        (TAG_APP, Some(app)),
        (TAG_ENV, env),
        (TAG_SERVICE, workload),
    ]
    .into_iter()
    .filter_map(|(key, value)| Some((key.to_string(), value?.to_string())))
    .collect()
}

pub fn app_stack(app: &str) -> String {
    format!("{app}-infrastructure")
}

pub fn env_stack(app: &str, env: &str) -> String {
    format!("{app}-{env}")
}

pub fn workload_stack(app: &str, env: &str, name: &str) -> String {
    format!("{app}-{env}-{name}")
}

pub fn task_stack(group: &str) -> String {
    format!("task-{group}")
}

pub fn pipeline_stack(app: &str, name: &str) -> String {
    let prefix = format!("pipeline-{app}-");

    if name.starts_with(&prefix) {
        name.to_string()
    } else {
        format!("{prefix}{name}")
    }
}

pub fn repository(app: &str, name: &str) -> String {
    format!("{app}/{name}")
}

/// Cloud Map namespace of an environment
pub fn namespace(app: &str, env: &str) -> String {
    format!("{env}.{app}.local")
}

/// Name of the CloudFormation export shared by an environment stack
pub fn env_export(app: &str, env: &str, output: &str) -> String {
    format!("{app}-{env}-{output}")
}

pub fn applications_path() -> String {
    format!("{SSM_ROOT}/applications")
}

pub fn application_path(app: &str) -> String {
    format!("{SSM_ROOT}/applications/{app}")
}

pub fn environments_path(app: &str) -> String {
    format!("{}/environments", application_path(app))
}

pub fn environment_path(app: &str, env: &str) -> String {
    format!("{}/{env}", environments_path(app))
}

pub fn workloads_path(app: &str) -> String {
    format!("{}/components", application_path(app))
}

pub fn workload_path(app: &str, name: &str) -> String {
    format!("{}/{name}", workloads_path(app))
}

pub fn secret_path(app: &str, env: &str, name: &str) -> String {
    format!("{SSM_ROOT}/{app}/{env}/secrets/{name}")
}

/// Environment variable injected into a container for an addon output,
/// e.g. "ordersTableName" becomes "ORDERS_TABLE_NAME"
pub fn env_var_name(output: &str) -> String {
    let mut result = String::with_capacity(output.len() + 4);
    let chars: Vec<char> = output.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !result.ends_with('_') && !result.is_empty() {
                result.push('_');
            }
            continue;
        }

        let prev_lower =
            i > 0 && (chars[i - 1].is_ascii_lowercase() || chars[i - 1].is_ascii_digit());
        let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
        let prev_upper = i > 0 && chars[i - 1].is_ascii_uppercase();

        if c.is_ascii_uppercase()
            && !result.is_empty()
            && !result.ends_with('_')
            && (prev_lower || (prev_upper && next_lower))
        {
            result.push('_');
        }

        result.push(c.to_ascii_uppercase());
    }

    result.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_names_follow_the_hierarchy() {
        assert_eq!(app_stack("shop"), "shop-infrastructure");
        assert_eq!(env_stack("shop", "test"), "shop-test");
        assert_eq!(workload_stack("shop", "test", "api"), "shop-test-api");
        assert_eq!(task_stack("db-migrate"), "task-db-migrate");
    }

    #[test]
    fn tags_skip_missing_levels() {
        let tags = resource_tags("shop", None, Some("api"));

        assert_eq!(tags.get(TAG_APP).map(String::as_str), Some("shop"));
        assert_eq!(tags.get(TAG_SERVICE).map(String::as_str), Some("api"));
        assert!(!tags.contains_key(TAG_ENV));
    }

    #[test]
    fn pipeline_stack_is_prefixed_once() {
        assert_eq!(pipeline_stack("shop", "release"), "pipeline-shop-release");
        assert_eq!(
            pipeline_stack("shop", "pipeline-shop-frontend"),
            "pipeline-shop-frontend"
        );
    }

    #[test]
    fn parameter_paths() {
        assert_eq!(application_path("shop"), "/copilot/applications/shop");
        assert_eq!(
            environment_path("shop", "test"),
            "/copilot/applications/shop/environments/test"
        );
        assert_eq!(
            workload_path("shop", "api"),
            "/copilot/applications/shop/components/api"
        );
        assert_eq!(
            secret_path("shop", "test", "DB_PASSWORD"),
            "/copilot/shop/test/secrets/DB_PASSWORD"
        );
    }

    #[test]
    fn env_var_names_are_screaming_snake_case() {
        assert_eq!(env_var_name("ordersName"), "ORDERS_NAME");
        assert_eq!(env_var_name("DBSecret"), "DB_SECRET");
        assert_eq!(env_var_name("bucket2Name"), "BUCKET2_NAME");
        assert_eq!(env_var_name("already_snake"), "ALREADY_SNAKE");
    }
}
