use eyre::eyre;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static GITHUB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https://|ssh://)?(?:[^@/]+@)?github\.com[:/]([^/]+)/([^/]+?)(?:\.git)?/?$")
        .unwrap()
});

static BITBUCKET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https://|ssh://)?(?:[^@/]+@)?bitbucket\.org[:/]([^/]+)/([^/]+?)(?:\.git)?/?$")
        .unwrap()
});

static CODECOMMIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https|ssh)://(?:[^@/]+@)?git-codecommit\.([a-z0-9\-]+)\.amazonaws\.com/v1/repos/([^/]+?)/?$")
        .unwrap()
});

static CODECOMMIT_GRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^codecommit::([a-z0-9\-]+)://(?:[^@/]+@)?([^/]+)$").unwrap());

static CODECOMMIT_CONSOLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://([a-z0-9\-]+)\.console\.aws\.amazon\.com/codesuite/codecommit/repositories/([^/]+)")
        .unwrap()
});

const MAX_PIPELINE_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    GitHub,
    CodeCommit,
    Bitbucket,
}

impl Provider {
    /// Third-party providers are reached through a CodeStar connection
    pub fn needs_connection(&self) -> bool {
        !matches!(self, Provider::CodeCommit)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Provider::GitHub => "GitHub",
            Provider::CodeCommit => "CodeCommit",
            Provider::Bitbucket => "Bitbucket",
        })
    }
}

/// A source code repository a pipeline is triggered from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub provider: Provider,

    /// Owner of the repository, the region for CodeCommit
    pub owner: String,

    pub name: String,
}

impl Repository {
    /// Parse any of the https, ssh and git-remote-codecommit URL forms
    pub fn parse(url: &str) -> eyre::Result<Self> {
        let url = url.trim();

        let patterns: [(&Regex, Provider); 5] = [
            (&GITHUB, Provider::GitHub),
            (&BITBUCKET, Provider::Bitbucket),
            (&CODECOMMIT, Provider::CodeCommit),
            (&CODECOMMIT_GRC, Provider::CodeCommit),
            (&CODECOMMIT_CONSOLE, Provider::CodeCommit),
        ];

        patterns
            .iter()
            .find_map(|(regex, provider)| {
                regex.captures(url).map(|captures| Repository {
                    provider: *provider,
                    owner: captures[1].to_string(),
                    name: captures[2].to_string(),
                })
            })
            .ok_or(eyre!(
                "Repository URL \"{url}\" is not a GitHub, Bitbucket or CodeCommit repository"
            ))
    }

    /// Canonical https URL
    pub fn url(&self) -> String {
        match self.provider {
            Provider::GitHub => format!("https://github.com/{}/{}", self.owner, self.name),
            Provider::Bitbucket => format!("https://bitbucket.org/{}/{}", self.owner, self.name),
            Provider::CodeCommit => format!(
                "https://git-codecommit.{}.amazonaws.com/v1/repos/{}",
                self.owner, self.name
            ),
        }
    }

    /// Repository id as expected by the CodeStar source action, "owner/name"
    pub fn full_id(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Default pipeline name for an application built from this repository
    pub fn default_pipeline_name(&self, app: &str) -> String {
        let mut name = String::new();

        for c in format!("pipeline-{app}-{}", self.name).chars() {
            let c = c.to_ascii_lowercase();

            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                name.push(c);
            } else if !name.ends_with('-') {
                name.push('-');
            }
        }

        name.truncate(MAX_PIPELINE_NAME_LEN);
        name.trim_end_matches('-').to_string()
    }
}

/// Unique repository URLs out of the `git remote -v` output
pub fn parse_remotes(output: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    for line in output.lines() {
        let mut parts = line.split_whitespace();

        let (Some(_remote), Some(url)) = (parts.next(), parts.next()) else {
            continue;
        };

        if parts.next().is_some_and(|kind| kind != "(fetch)") {
            continue;
        }

        if let Ok(repo) = Repository::parse(url) {
            let url = repo.url();

            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }

    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_urls() {
        for url in [
            "https://github.com/acme/shop",
            "https://github.com/acme/shop.git",
            "git@github.com:acme/shop.git",
            "ssh://git@github.com/acme/shop",
        ] {
            let repo = Repository::parse(url).unwrap();
            assert_eq!(repo.provider, Provider::GitHub, "{url}");
            assert_eq!(repo.full_id(), "acme/shop", "{url}");
            assert_eq!(repo.url(), "https://github.com/acme/shop");
        }
    }

    #[test]
    fn bitbucket_urls() {
        let repo = Repository::parse("https://jane@bitbucket.org/acme/shop.git").unwrap();
        assert_eq!(repo.provider, Provider::Bitbucket);
        assert_eq!(repo.url(), "https://bitbucket.org/acme/shop");
        assert!(repo.provider.needs_connection());
    }

    #[test]
    fn codecommit_urls() {
        for url in [
            "https://git-codecommit.us-west-2.amazonaws.com/v1/repos/shop",
            "ssh://git-codecommit.us-west-2.amazonaws.com/v1/repos/shop",
            "codecommit::us-west-2://shop",
            "https://us-west-2.console.aws.amazon.com/codesuite/codecommit/repositories/shop/browse",
        ] {
            let repo = Repository::parse(url).unwrap();
            assert_eq!(repo.provider, Provider::CodeCommit, "{url}");
            assert_eq!(repo.owner, "us-west-2", "{url}");
            assert_eq!(repo.name, "shop", "{url}");
        }

        assert!(!Provider::CodeCommit.needs_connection());
    }

    #[test]
    fn unsupported_url() {
        assert!(Repository::parse("https://gitlab.com/acme/shop").is_err());
    }

    #[test]
    fn remotes_are_deduplicated() {
        let output = "origin\tgit@github.com:acme/shop.git (fetch)\n\
                      origin\tgit@github.com:acme/shop.git (push)\n\
                      mirror\thttps://github.com/acme/shop (fetch)\n\
                      work\thttps://gitlab.com/acme/shop (fetch)\n\
                      cc\tcodecommit::eu-west-1://shop (fetch)\n";

        assert_eq!(
            parse_remotes(output),
            vec![
                "https://github.com/acme/shop".to_string(),
                "https://git-codecommit.eu-west-1.amazonaws.com/v1/repos/shop".to_string(),
            ]
        );
    }

    #[test]
    fn default_pipeline_name_is_sanitized() {
        let repo = Repository::parse("https://github.com/acme/My_Shop.Web").unwrap();
        assert_eq!(repo.default_pipeline_name("shop"), "pipeline-shop-my-shop-web");

        let repo = Repository {
            provider: Provider::GitHub,
            owner: "acme".into(),
            name: "r".repeat(120),
        };
        assert_eq!(repo.default_pipeline_name("shop").len(), 100);
    }
}
