use crate::context::Context;
use crate::error::Error;
use crate::git;
use crate::prompt::Choice;
use crate::runner::{Runnable, Runner};
use crate::workspace::{Workspace, WorkspaceError};
use copilot_common::manifest::PipelineManifest;
use copilot_common::repository::Repository;
use copilot_common::validate;

const DEFAULT_BRANCH: &str = "main";

#[derive(clap::Args, Clone)]
pub(crate) struct InitCommand {
    /// Name of the pipeline, derived from the repository by default
    #[arg(short, long)]
    name: Option<String>,

    /// URL of the GitHub, Bitbucket or CodeCommit repository
    #[arg(short, long)]
    url: Option<String>,

    /// Branch that triggers the pipeline
    #[arg(short, long)]
    branch: Option<String>,

    /// Environments to deploy to, in order
    #[arg(short, long, value_delimiter = ',')]
    environments: Vec<String>,
}

impl Runnable for InitCommand {
    fn runner(&self, ctx: &Context) -> impl Runner {
        InitRunner {
            command: self.clone(),
            ctx: ctx.clone(),
            workspace: None,
            manifest: None,
        }
    }
}

struct InitRunner {
    command: InitCommand,
    ctx: Context,
    workspace: Option<Workspace>,
    manifest: Option<PipelineManifest>,
}

impl InitRunner {
    fn ask_repository(&self, workspace: &Workspace) -> eyre::Result<Repository> {
        if let Some(url) = &self.command.url {
            return Repository::parse(url);
        }

        let remotes = git::remotes(workspace.root())?
            .into_iter()
            .filter(|url| Repository::parse(url).is_ok())
            .collect::<Vec<_>>();

        let url = match remotes.as_slice() {
            [] => {
                return Err(eyre::eyre!(
                    "No GitHub, Bitbucket or CodeCommit remote found, pass the repository with --url"
                ))
            }
            [only] => {
                log::info!("Using the only remote {only}");
                only.clone()
            }
            _ => self.ctx.prompt.select_one(
                "Which repository would you like to use for your pipeline?",
                &remotes.iter().map(|r| Choice::new(r)).collect::<Vec<_>>(),
            )?,
        };

        Repository::parse(&url)
    }

    fn branch(&self, workspace: &Workspace) -> String {
        if let Some(branch) = &self.command.branch {
            return branch.clone();
        }

        match git::current_branch(workspace.root()) {
            Ok(branch) if !branch.is_empty() && branch != "HEAD" => branch,
            Ok(_) => DEFAULT_BRANCH.to_string(),
            Err(e) => {
                log::warn!("Couldn't find the current branch, using {DEFAULT_BRANCH}: {e}");
                DEFAULT_BRANCH.to_string()
            }
        }
    }
}

impl Runner for InitRunner {
    async fn validate(&mut self) -> Result<(), Error> {
        if let Some(name) = &self.command.name {
            validate::pipeline_name(name).map_err(|e| {
                self.error(Some("Invalid pipeline name"), Some(&e.to_string()), None)
            })?;
        }

        if let Some(url) = &self.command.url {
            Repository::parse(url).map_err(|e| {
                self.error(Some("Invalid repository URL"), Some(&e.to_string()), None)
            })?;
        }

        let mut seen = vec![];

        for env in &self.command.environments {
            validate::env_name(env).map_err(|e| {
                self.error(Some("Invalid environment name"), Some(&e.to_string()), None)
            })?;

            if seen.contains(&env) {
                return Err(self.error(
                    Some("Duplicate environment"),
                    Some(&format!("{env} is listed more than once")),
                    None,
                ));
            }

            seen.push(env);
        }

        Ok(())
    }

    async fn ask(&mut self) -> Result<(), Error> {
        let workspace = self.ctx.workspace()?;
        let app = workspace.summary()?.application;

        let repository = self.ask_repository(&workspace).map_err(|e| {
            self.error(Some("Failed to find the repository"), Some(&e.to_string()), None)
        })?;

        let branch = self.branch(&workspace);

        let name = match &self.command.name {
            Some(name) => name.clone(),
            None => self.ctx.prompt.get(
                "What would you like to name this pipeline?",
                Some(&repository.default_pipeline_name(&app)),
                &validate::pipeline_name,
            )?,
        };

        let environments = match self.command.environments.is_empty() {
            false => self.command.environments.clone(),
            true => {
                self.ctx
                    .selector()
                    .environments(
                        "Which environment would you like to add to your pipeline?",
                        &app,
                    )
                    .await?
            }
        };

        for env in &environments {
            self.ctx.store.get_environment(&app, env).await?;
        }

        let manifest = PipelineManifest::new(&name, &repository, &branch, &environments)
            .map_err(|e| self.error(Some("Invalid pipeline"), Some(&e.to_string()), None))?;

        self.workspace = Some(workspace);
        self.manifest = Some(manifest);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let (Some(workspace), Some(manifest)) = (&self.workspace, &self.manifest) else {
            return Err(self.error(Some("Nothing to write"), None, None));
        };

        let (manifest_path, buildspec_path) = match workspace.write_pipeline(manifest) {
            Ok(paths) => paths,
            Err(e) if e.downcast_ref::<WorkspaceError>().is_some() => {
                return Err(self.error(
                    Some(&format!("Pipeline {} already exists", manifest.name)),
                    Some(&e.to_string()),
                    None,
                ));
            }
            Err(e) => return Err(e.into()),
        };

        for path in [&manifest_path, &buildspec_path] {
            println!(
                "{} {}",
                console::style("Wrote").green().bold(),
                workspace.display(path)
            );
        }

        println!(
            "{}",
            console::style(format!(
                "Commit and push the copilot/ directory, then run `copilot pipeline deploy --name {}`",
                manifest.name
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
    use copilot_common::repository::Provider;
    use tempfile::TempDir;

    fn command() -> InitCommand {
        InitCommand {
            name: Some("release".into()),
            url: Some("git@github.com:acme/shop.git".into()),
            branch: Some("main".into()),
            environments: vec!["test".into(), "prod".into()],
        }
    }

    async fn setup() -> (TempDir, Workspace, Fakes) {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create(dir.path(), "shop").unwrap();
        let fakes = Fakes::new();
        fakes.app("shop").await;
        fakes.env("shop", "test").await;
        fakes.env("shop", "prod").await;
        (dir, workspace, fakes)
    }

    #[tokio::test]
    async fn manifest_and_buildspec_are_written() {
        let (dir, workspace, fakes) = setup().await;
        let ctx = fakes.context(dir.path());

        command().runner(&ctx).run().await.unwrap();

        let manifest = workspace.read_pipeline("release").unwrap();
        assert_eq!(manifest.environments(), vec!["test", "prod"]);
        assert_eq!(manifest.source.provider, Provider::GitHub);
        assert_eq!(manifest.source.properties.branch, "main");
        assert!(dir
            .path()
            .join("copilot/pipelines/release/buildspec.yml")
            .is_file());
    }

    #[tokio::test]
    async fn environments_are_asked_in_order() {
        let (dir, workspace, fakes) = setup().await;
        fakes.prompt.answer(Answer::Text("prod".into()));
        fakes.prompt.answer(Answer::Text("test".into()));
        let ctx = fakes.context(dir.path());

        let mut command = command();
        command.environments = vec![];
        command.runner(&ctx).run().await.unwrap();

        let manifest = workspace.read_pipeline("release").unwrap();
        assert_eq!(manifest.environments(), vec!["prod", "test"]);
    }

    #[tokio::test]
    async fn unknown_environment_is_rejected() {
        let (dir, workspace, fakes) = setup().await;
        let ctx = fakes.context(dir.path());

        let mut command = command();
        command.environments = vec!["staging".into()];

        assert!(command.runner(&ctx).run().await.is_err());
        assert!(workspace.pipelines().unwrap().is_empty());
    }

    #[tokio::test]
    async fn existing_pipeline_is_not_overwritten() {
        let (dir, _workspace, fakes) = setup().await;
        let ctx = fakes.context(dir.path());

        command().runner(&ctx).run().await.unwrap();
        let error = command().runner(&ctx).run().await.unwrap_err();

        assert_eq!(error.message(), "Pipeline release already exists");
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let fakes = Fakes::new();
        let ctx = fakes.context(std::path::Path::new("/nonexistent"));

        let mut command = command();
        command.url = Some("https://gitlab.com/acme/shop".into());

        let error = command.runner(&ctx).run().await.unwrap_err();
        assert_eq!(error.message(), "Invalid repository URL");
    }
}
