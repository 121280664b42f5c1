use crate::aws::ssm::{PutOutcome, SecretExists, SecretInput};
use crate::context::Context;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use copilot_common::{naming, validate};
use eyre::WrapErr;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Secret name to its value in each environment
type Secrets = BTreeMap<String, BTreeMap<String, String>>;

#[derive(clap::Args, Clone)]
pub(crate) struct InitCommand {
    /// Name of the secret, also the name of the variable it is injected as
    #[arg(short, long)]
    name: Option<String>,

    /// Values per environment, e.g. --values test=abc,prod=xyz
    #[arg(long, value_delimiter = ',', value_name = "ENV=VALUE")]
    values: Vec<String>,

    /// YAML file mapping secret names to their values per environment
    #[arg(long, conflicts_with_all = ["name", "values"])]
    input_file: Option<PathBuf>,

    /// Replace the values of existing secrets
    #[arg(long)]
    overwrite: bool,

    #[arg(short, long)]
    app: Option<String>,
}

impl Runnable for InitCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        InitRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            app: None,
            secrets: Secrets::new(),
        }
    }
}

struct InitRunner {
    command: InitCommand,
    ctx: Context,
    app: Option<String>,
    secrets: Secrets,
}

impl InitRunner {
    fn read_input_file(&self, path: &Path) -> eyre::Result<Secrets> {
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;

        serde_yaml::from_str(&content).wrap_err_with(|| {
            format!(
                "{} must map secret names to their values per environment",
                path.display()
            )
        })
    }

    fn values(&self) -> eyre::Result<BTreeMap<String, String>> {
        self.command
            .values
            .iter()
            .map(|v| validate::key_value(v))
            .collect()
    }

    /// Ask for the value in every environment, an empty answer skips it
    fn ask_values(&self, name: &str, envs: &[String]) -> eyre::Result<BTreeMap<String, String>> {
        let mut values = BTreeMap::new();

        for env in envs {
            let value = self.ctx.prompt.get_secret(&format!(
                "What is the value of {name} in {env}? (leave empty to skip)"
            ))?;

            if !value.is_empty() {
                values.insert(env.clone(), value);
            }
        }

        Ok(values)
    }

    async fn put(&self, app: &str, name: &str, env: &str, value: &str) -> eyre::Result<Option<PutOutcome>> {
        let secret = SecretInput {
            name: naming::secret_path(app, env, name),
            value: value.to_string(),
            overwrite: self.command.overwrite,
            tags: naming::resource_tags(app, Some(env), None),
        };

        match self.ctx.secrets.put(&secret).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) if e.downcast_ref::<SecretExists>().is_some() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Runner for InitRunner {
    async fn validate(&mut self) -> Result<(), Error> {
        if let Some(path) = self.command.input_file.clone() {
            self.secrets = self.read_input_file(&path).map_err(|e| {
                self.error(Some("Invalid input file"), Some(&format!("{e:#}")), None)
            })?;

            if self.secrets.is_empty() {
                return Err(self.error(
                    Some("Invalid input file"),
                    Some(&format!("{} has no secrets", path.display())),
                    None,
                ));
            }
        }

        let names = self
            .command
            .name
            .iter()
            .chain(self.secrets.keys())
            .collect::<Vec<_>>();

        for name in names {
            validate::secret_name(name).map_err(|e| {
                self.error(
                    Some("Invalid secret name"),
                    Some(&format!("{name}: {e}")),
                    None,
                )
            })?;
        }

        self.values().map_err(|e| {
            self.error(Some("Invalid secret values"), Some(&e.to_string()), None)
        })?;

        Ok(())
    }

    async fn ask(&mut self) -> Result<(), Error> {
        let app = self.ctx.app_name(self.command.app.as_deref()).await?;

        let envs = self
            .ctx
            .store
            .list_environments(&app)
            .await?
            .into_iter()
            .map(|e| e.name)
            .collect::<Vec<_>>();

        if self.command.input_file.is_none() {
            let name = match &self.command.name {
                Some(name) => name.clone(),
                None => self.ctx.prompt.get(
                    "What would you like to name this secret?",
                    None,
                    &validate::secret_name,
                )?,
            };

            let values = match self.command.values.is_empty() {
                true => self.ask_values(&name, &envs)?,
                false => self.values()?,
            };

            self.secrets.insert(name, values);
        }

        for (name, values) in &self.secrets {
            if let Some(env) = values.keys().find(|env| !envs.contains(env)) {
                return Err(self.error(
                    Some(&format!("Environment {env} doesn't exist")),
                    Some(&format!(
                        "Secret {name} has a value for {env}, which is not an environment of {app}"
                    )),
                    None,
                ));
            }
        }

        if self.secrets.values().all(BTreeMap::is_empty) {
            return Err(self.error(Some("No values to store"), None, None));
        }

        self.app = Some(app);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let Some(app) = self.app.clone() else {
            return Err(self.error(Some("Application is required"), None, None));
        };

        let mut failures = vec![];

        for (name, values) in &self.secrets {
            for (env, value) in values {
                match self.put(&app, name, env, value).await {
                    Ok(Some(PutOutcome::Created)) => println!(
                        "{} {name} in {env}",
                        console::style("Created").green().bold()
                    ),
                    Ok(Some(PutOutcome::Updated)) => println!(
                        "{} {name} in {env}",
                        console::style("Updated").green().bold()
                    ),
                    Ok(None) => println!(
                        "{} {name} already exists in {env}, pass --overwrite to replace it",
                        console::style("Skipped").yellow().bold()
                    ),
                    Err(e) => {
                        log::debug!("Failed to put {name} in {env}: {e:?}");
                        failures.push(format!("{name} in {env}: {e:#}"));
                    }
                }
            }
        }

        if !failures.is_empty() {
            return Err(self.error(
                Some(&format!("Failed to store {} secret value(s)", failures.len())),
                Some(&failures.join("\n")),
                None,
            ));
        }

        println!(
            "{}",
            console::style(format!(
                "Reference the secrets under `secrets` in a manifest, e.g. {0}: /copilot/{app}/${{COPILOT_ENVIRONMENT_NAME}}/secrets/{0}",
                self.secrets.keys().next().cloned().unwrap_or_default()
            ))
            .dim()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Answer, Fakes};
    use tempfile::TempDir;

    fn command() -> InitCommand {
        InitCommand {
            name: Some("DB_PASSWORD".into()),
            values: vec!["test=abc".into(), "prod=xyz".into()],
            input_file: None,
            overwrite: false,
            app: Some("shop".into()),
        }
    }

    async fn fakes() -> Fakes {
        let fakes = Fakes::new();
        fakes.app("shop").await;
        fakes.env("shop", "test").await;
        fakes.env("shop", "prod").await;
        fakes
    }

    #[tokio::test]
    async fn values_are_stored_per_environment() {
        let fakes = fakes().await;
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        command().runner(&ctx).run().await.unwrap();

        let secret = fakes
            .secrets
            .get("/copilot/shop/prod/secrets/DB_PASSWORD")
            .unwrap();
        assert_eq!(secret.value, "xyz");
        assert_eq!(
            secret.tags.get(naming::TAG_ENV).map(String::as_str),
            Some("prod")
        );
        assert!(fakes.secrets.get("/copilot/shop/test/secrets/DB_PASSWORD").is_some());
    }

    #[tokio::test]
    async fn existing_secrets_are_kept_without_overwrite() {
        let fakes = fakes().await;
        fakes.secrets.add("/copilot/shop/test/secrets/DB_PASSWORD", "old");
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        command().runner(&ctx).run().await.unwrap();

        let secret = fakes
            .secrets
            .get("/copilot/shop/test/secrets/DB_PASSWORD")
            .unwrap();
        assert_eq!(secret.value, "old");
    }

    #[tokio::test]
    async fn overwrite_replaces_the_value() {
        let fakes = fakes().await;
        fakes.secrets.add("/copilot/shop/test/secrets/DB_PASSWORD", "old");
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let mut command = command();
        command.overwrite = true;
        command.runner(&ctx).run().await.unwrap();

        let secret = fakes
            .secrets
            .get("/copilot/shop/test/secrets/DB_PASSWORD")
            .unwrap();
        assert_eq!(secret.value, "abc");
    }

    #[tokio::test]
    async fn unknown_environment_is_rejected() {
        let fakes = fakes().await;
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let mut command = command();
        command.values = vec!["staging=abc".into()];

        let error = command.runner(&ctx).run().await.unwrap_err();
        assert_eq!(error.message(), "Environment staging doesn't exist");
        assert!(fakes.secrets.get("/copilot/shop/staging/secrets/DB_PASSWORD").is_none());
    }

    #[tokio::test]
    async fn secrets_are_read_from_the_input_file() {
        let fakes = fakes().await;
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.yml");
        fs::write(&path, "API_KEY:\n  test: t-key\nTOKEN:\n  prod: p-token\n").unwrap();

        let command = InitCommand {
            name: None,
            values: vec![],
            input_file: Some(path),
            overwrite: false,
            app: Some("shop".into()),
        };

        command.runner(&ctx).run().await.unwrap();

        assert_eq!(
            fakes.secrets.get("/copilot/shop/test/secrets/API_KEY").unwrap().value,
            "t-key"
        );
        assert_eq!(
            fakes.secrets.get("/copilot/shop/prod/secrets/TOKEN").unwrap().value,
            "p-token"
        );
    }

    #[tokio::test]
    async fn empty_answers_skip_the_environment() {
        let fakes = fakes().await;
        fakes.prompt.answer(Answer::Text("".into()));
        fakes.prompt.answer(Answer::Text("abc".into()));
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let mut command = command();
        command.values = vec![];
        command.runner(&ctx).run().await.unwrap();

        let stored = ["prod", "test"]
            .into_iter()
            .filter(|env| {
                fakes
                    .secrets
                    .get(&format!("/copilot/shop/{env}/secrets/DB_PASSWORD"))
                    .is_some()
            })
            .count();

        assert_eq!(stored, 1);
        assert_eq!(fakes.prompt.asked().len(), 2);
    }

    #[tokio::test]
    async fn invalid_name_is_rejected() {
        let fakes = Fakes::new();
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let mut command = command();
        command.name = Some("db password".into());

        let error = command.runner(&ctx).run().await.unwrap_err();
        assert_eq!(error.message(), "Invalid secret name");
    }
}
