use eyre::WrapErr;
use once_cell::sync::OnceCell;
use std::time::Duration;

/// Settings shared by all commands
#[derive(Debug)]
pub(crate) struct Config {
    /// Directory with manifests and addons, at the root of the user's repository
    pub(crate) workspace_dir: &'static str,

    /// How many parent directories to look through for the workspace
    pub(crate) max_search_depth: usize,

    /// Delay between two checks of a stack being deployed
    pub(crate) poll_interval: Duration,

    /// Largest template accepted inline, bigger ones go through S3
    pub(crate) template_body_limit: usize,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

pub(crate) fn build_config() -> eyre::Result<&'static Config> {
    CONFIG.get_or_try_init(|| {
        let poll_interval = match std::env::var("COPILOT_POLL_INTERVAL") {
            Ok(value) => parse_interval(&value)?,
            Err(_) => Duration::from_secs(3),
        };

        Ok(Config {
            workspace_dir: "copilot",
            max_search_depth: 5,
            poll_interval,
            template_body_limit: 51_200,
        })
    })
}

/// Accept either plain seconds or a humantime duration
fn parse_interval(value: &str) -> eyre::Result<Duration> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    humantime::parse_duration(value.trim())
        .wrap_err_with(|| format!("Invalid COPILOT_POLL_INTERVAL \"{value}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_in_seconds_or_duration() {
        assert_eq!(parse_interval("5").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_interval("1m").unwrap(), Duration::from_secs(60));
        assert!(parse_interval("soon").is_err());
    }
}
