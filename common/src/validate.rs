use eyre::eyre;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;
use std::time::Duration;

static BASIC_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9\-]*$").unwrap());
static SECRET_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.\-]+$").unwrap());
static DYNAMO_TABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.\-]+$").unwrap());
static S3_BUCKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9.\-]*[a-z0-9]$").unwrap());
static AURORA_CLUSTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9]*$").unwrap());
static DB_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").unwrap());

static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z0-9_.\-]+):([sSnNbB])$").unwrap());

const MAX_NAME_LEN: usize = 255;
const MAX_PIPELINE_NAME_LEN: usize = 100;
const MAX_SECRET_NAME_LEN: usize = 2048;

/// Names of applications, environments and workloads
///
/// They end up in stack names, ECR repositories and DNS names,
/// so only lowercase letters, digits and single hyphens are allowed.
pub fn basic_name(value: &str) -> eyre::Result<()> {
    if value.is_empty() {
        return Err(eyre!("value must not be empty"));
    }

    if value.len() > MAX_NAME_LEN {
        return Err(eyre!("value must not exceed {MAX_NAME_LEN} characters"));
    }

    if !BASIC_NAME.is_match(value) || value.contains("--") || value.ends_with('-') {
        return Err(eyre!(
            "value must start with a letter, contain only lower-case letters, numbers, and hyphens, and have no consecutive or trailing hyphen"
        ));
    }

    Ok(())
}

pub fn app_name(value: &str) -> eyre::Result<()> {
    basic_name(value)
}

pub fn env_name(value: &str) -> eyre::Result<()> {
    basic_name(value)
}

pub fn workload_name(value: &str) -> eyre::Result<()> {
    basic_name(value)
}

pub fn pipeline_name(value: &str) -> eyre::Result<()> {
    if value.len() > MAX_PIPELINE_NAME_LEN {
        return Err(eyre!(
            "value must not exceed {MAX_PIPELINE_NAME_LEN} characters"
        ));
    }

    basic_name(value)
}

pub fn port(value: &str) -> eyre::Result<u16> {
    match value.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(eyre!("port must be a number between 1 and 65535")),
        Ok(port) => Ok(port),
    }
}

pub fn secret_name(value: &str) -> eyre::Result<()> {
    if value.is_empty() || value.len() > MAX_SECRET_NAME_LEN {
        return Err(eyre!(
            "secret name must be between 1 and {MAX_SECRET_NAME_LEN} characters"
        ));
    }

    if !SECRET_NAME.is_match(value) {
        return Err(eyre!(
            "secret name can only contain letters, numbers, periods, hyphens and underscores"
        ));
    }

    Ok(())
}

pub fn dynamo_table_name(value: &str) -> eyre::Result<()> {
    if value.len() < 3 || value.len() > 255 {
        return Err(eyre!("value must be between 3 and 255 characters"));
    }

    if !DYNAMO_TABLE.is_match(value) {
        return Err(eyre!(
            "value can only contain letters, numbers, underscores, hyphens and periods"
        ));
    }

    Ok(())
}

pub fn s3_bucket_name(value: &str) -> eyre::Result<()> {
    if value.len() < 3 || value.len() > 63 {
        return Err(eyre!("value must be between 3 and 63 characters"));
    }

    if !S3_BUCKET.is_match(value) {
        return Err(eyre!(
            "value must contain only lowercase letters, numbers, periods and hyphens, and start and end with a letter or a number"
        ));
    }

    if value.contains("..") {
        return Err(eyre!("value must not contain consecutive periods"));
    }

    if value.parse::<Ipv4Addr>().is_ok() {
        return Err(eyre!("value must not be formatted as an IP address"));
    }

    Ok(())
}

pub fn aurora_cluster_name(value: &str) -> eyre::Result<()> {
    if value.len() > 63 || !AURORA_CLUSTER.is_match(value) {
        return Err(eyre!(
            "value must start with a letter and contain only letters and numbers, up to 63 characters"
        ));
    }

    Ok(())
}

/// Initial database name, limits differ between engines
pub fn db_name(value: &str, max_len: usize) -> eyre::Result<()> {
    if value.is_empty() || value.len() > max_len {
        return Err(eyre!("database name must be between 1 and {max_len} characters"));
    }

    if !DB_NAME.is_match(value) {
        return Err(eyre!(
            "database name must start with a letter and contain only letters, numbers and underscores"
        ));
    }

    Ok(())
}

/// DynamoDB attribute in the "name:type" form, returns both parts
pub fn attribute(value: &str) -> eyre::Result<(String, String)> {
    let captures = ATTRIBUTE.captures(value.trim()).ok_or(eyre!(
        "value must be of the form <name>:<T> where T is one of S, N or B"
    ))?;

    Ok((captures[1].to_string(), captures[2].to_uppercase()))
}

/// Duration of a job run, e.g. "1h30m"
pub fn timeout(value: &str) -> eyre::Result<Duration> {
    let duration = humantime::parse_duration(value.trim())
        .map_err(|e| eyre!("timeout must be a duration like 30m or 1h30m: {e}"))?;

    if duration < Duration::from_secs(1) {
        return Err(eyre!("timeout must be at least 1 second"));
    }

    Ok(duration)
}

/// Key-value pairs in the "key=value" form, used by tags and env vars flags
pub fn key_value(value: &str) -> eyre::Result<(String, String)> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), val.trim().to_string()))
        }
        _ => Err(eyre!("\"{value}\" must be of the form key=value")),
    }
}
