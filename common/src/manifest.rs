pub mod environment;
pub mod pipeline;
pub mod workload;

pub use environment::EnvironmentManifest;
pub use pipeline::PipelineManifest;
pub use workload::WorkloadManifest;

use eyre::WrapErr;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize a manifest with a leading comment block
fn to_yaml_with_header<T: Serialize>(value: &T, header: &str) -> eyre::Result<String> {
    let body = serde_yaml::to_string(value).wrap_err("Failed to serialize manifest")?;

    let header = header
        .lines()
        .map(|line| format!("# {line}").trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!("{header}\n\n{body}"))
}

fn from_yaml<T: DeserializeOwned>(content: &str) -> eyre::Result<T> {
    serde_yaml::from_str(content).wrap_err("Failed to parse manifest")
}
