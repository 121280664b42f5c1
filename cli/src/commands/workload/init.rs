use crate::commands::workload::Noun;
use crate::context::Context;
use crate::error::Error;
use crate::prompt::Choice;
use crate::runner::Runner;
use crate::workspace::{Workspace, WorkspaceError};
use copilot_common::manifest::workload::WorkloadProps;
use copilot_common::manifest::WorkloadManifest;
use copilot_common::model::{Workload, WorkloadType};
use copilot_common::schedule::to_aws_schedule;
use copilot_common::{naming, validate};
use eyre::WrapErr;
use std::fs;
use std::path::Path;

/// Picked instead of a Dockerfile to deploy a prebuilt image
const USE_IMAGE: &str = "Use an existing image instead";

/// Directories below the workspace root searched for Dockerfiles
const DOCKERFILE_SEARCH_DEPTH: usize = 2;

/// Flags of `svc init` and `job init`
#[derive(Debug, Clone, Default)]
pub(crate) struct InitInput {
    pub(crate) name: Option<String>,
    pub(crate) kind: Option<String>,
    pub(crate) dockerfile: Option<String>,
    pub(crate) image: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) schedule: Option<String>,
    pub(crate) retries: Option<u32>,
    pub(crate) timeout: Option<String>,
}

pub(crate) struct InitRunner {
    noun: Noun,
    input: InitInput,
    ctx: Context,
    workspace: Option<Workspace>,
    kind: Option<WorkloadType>,
    props: WorkloadProps,
}

impl InitRunner {
    pub(crate) fn new(noun: Noun, input: InitInput, ctx: &Context) -> Self {
        InitRunner {
            noun,
            input,
            ctx: ctx.clone(),
            workspace: None,
            kind: None,
            props: WorkloadProps::default(),
        }
    }

    fn parse_kind(&self, value: &str) -> Result<WorkloadType, Error> {
        WorkloadType::parse(value)
            .filter(|kind| self.noun.matches(*kind))
            .ok_or_else(|| {
                let valid = self
                    .noun
                    .kinds()
                    .iter()
                    .map(|k| format!("\"{k}\""))
                    .collect::<Vec<_>>()
                    .join(", ");

                self.error(
                    Some(&format!("Invalid {} type", self.noun.as_str())),
                    Some(&format!("Must be one of {valid}")),
                    None,
                )
            })
    }

    fn ask_kind(&self) -> eyre::Result<WorkloadType> {
        if let [only] = self.noun.kinds() {
            return Ok(*only);
        }

        let choices = self
            .noun
            .kinds()
            .iter()
            .map(|k| Choice::with_hint(k.as_str(), k.help()))
            .collect::<Vec<_>>();

        let picked = self.ctx.prompt.select_one(
            &format!("Which type of {} would you like to create?", self.noun.as_str()),
            &choices,
        )?;

        WorkloadType::parse(&picked).ok_or_else(|| eyre::eyre!("Unknown type {picked}"))
    }

    /// Either a Dockerfile found in the workspace or a prebuilt image
    fn ask_source(&self, workspace: &Workspace, name: &str) -> eyre::Result<(Option<String>, Option<String>)> {
        let dockerfiles = find_dockerfiles(workspace.root())?;

        if !dockerfiles.is_empty() {
            let mut choices = dockerfiles.iter().map(|d| Choice::new(d)).collect::<Vec<_>>();
            choices.push(Choice::new(USE_IMAGE));

            let picked = self.ctx.prompt.select_one(
                &format!("Which Dockerfile would you like to use for {name}?"),
                &choices,
            )?;

            if picked != USE_IMAGE {
                return Ok((Some(picked), None));
            }
        }

        let image = self.ctx.prompt.get(
            &format!("What image would you like to use for {name}?"),
            None,
            &|v| match v.trim().is_empty() {
                true => Err(eyre::eyre!("The image location is required")),
                false => Ok(()),
            },
        )?;

        Ok((None, Some(image)))
    }

    fn ask_port(&self, root: &Path, kind: WorkloadType) -> eyre::Result<Option<u16>> {
        if self.input.port.is_some() || !kind.is_public() {
            return Ok(self.input.port);
        }

        if let Some(port) = self
            .props
            .dockerfile
            .as_deref()
            .and_then(|d| fs::read_to_string(root.join(d)).ok())
            .and_then(|content| exposed_port(&content))
        {
            log::info!("Using port {port} exposed by the Dockerfile");
            return Ok(Some(port));
        }

        let answer = self.ctx.prompt.get(
            "Which port do you want the service to listen on?",
            Some("80"),
            &|v| validate::port(v).map(|_| ()),
        )?;

        Ok(Some(validate::port(&answer)?))
    }

    /// Dockerfile path relative to the workspace root, as the manifest keeps it
    fn dockerfile_in_workspace(&self, root: &Path, dockerfile: &str) -> String {
        let path = self.ctx.dir.join(dockerfile);

        path.strip_prefix(root)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| dockerfile.to_string())
    }
}

impl Runner for InitRunner {
    async fn validate(&mut self) -> Result<(), Error> {
        if let Some(name) = &self.input.name {
            validate::workload_name(name).map_err(|e| {
                self.error(
                    Some(&format!("Invalid {} name", self.noun.as_str())),
                    Some(&e.to_string()),
                    None,
                )
            })?;
        }

        if let Some(kind) = self.input.kind.clone() {
            self.kind = Some(self.parse_kind(&kind)?);
        }

        if self.input.dockerfile.is_some() && self.input.image.is_some() {
            return Err(self.error(
                Some("A Dockerfile and an image can't be used together"),
                Some("Pass either --dockerfile or --image"),
                None,
            ));
        }

        if let Some(dockerfile) = &self.input.dockerfile {
            if !self.ctx.dir.join(dockerfile).is_file() {
                return Err(self.error(
                    Some("Dockerfile not found"),
                    Some(&format!("There is no file at {dockerfile}")),
                    None,
                ));
            }
        }

        if let Some(schedule) = &self.input.schedule {
            to_aws_schedule(schedule).map_err(|e| {
                self.error(Some("Invalid schedule"), Some(&e.to_string()), None)
            })?;
        }

        if let Some(timeout) = &self.input.timeout {
            validate::timeout(timeout)
                .map_err(|e| self.error(Some("Invalid timeout"), Some(&e.to_string()), None))?;
        }

        Ok(())
    }

    async fn ask(&mut self) -> Result<(), Error> {
        let workspace = self.ctx.workspace()?;

        let kind = match self.kind {
            Some(kind) => kind,
            None => self.ask_kind()?,
        };

        let name = match &self.input.name {
            Some(name) => name.clone(),
            None => self.ctx.prompt.get(
                &format!("What do you want to name this {}?", self.noun.as_str()),
                None,
                &validate::workload_name,
            )?,
        };

        let (dockerfile, image) = match (&self.input.dockerfile, &self.input.image) {
            (Some(dockerfile), _) => (
                Some(self.dockerfile_in_workspace(workspace.root(), dockerfile)),
                None,
            ),
            (None, Some(image)) => (None, Some(image.clone())),
            (None, None) => self.ask_source(&workspace, &name)?,
        };

        self.props = WorkloadProps {
            name,
            dockerfile,
            image,
            port: None,
            schedule: None,
            retries: self.input.retries,
            timeout: self.input.timeout.clone(),
        };

        self.props.port = self.ask_port(workspace.root(), kind)?;

        if kind.is_job() {
            self.props.schedule = Some(match &self.input.schedule {
                Some(schedule) => schedule.clone(),
                None => self.ctx.prompt.get(
                    "How would you like to schedule this job? (@daily, @every 2h or a cron expression)",
                    Some("@daily"),
                    &|v| to_aws_schedule(v).map(|_| ()),
                )?,
            });
        }

        self.kind = Some(kind);
        self.workspace = Some(workspace);
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let (Some(workspace), Some(kind)) = (self.workspace.clone(), self.kind) else {
            return Err(self.error(Some("Workspace is required"), None, None));
        };

        let app = workspace.summary()?.application;
        let name = self.props.name.clone();

        // Fails early if the application was deleted in the meantime
        self.ctx.store.get_application(&app).await?;

        let manifest = WorkloadManifest::new(kind, &self.props).map_err(|e| {
            self.error(
                Some(&format!("Invalid {} configuration", self.noun.as_str())),
                Some(&e.to_string()),
                None,
            )
        })?;

        match workspace.write_workload(&manifest) {
            Ok(path) => println!(
                "{} {}",
                console::style("Wrote the manifest at").green(),
                workspace.display(&path)
            ),
            Err(e) if matches!(
                e.downcast_ref::<WorkspaceError>(),
                Some(WorkspaceError::FileExists(_))
            ) =>
            {
                println!(
                    "{}",
                    console::style(format!("Manifest of {name} already exists, keeping it")).dim()
                )
            }
            Err(e) => return Err(e.into()),
        }

        let uri = self
            .ctx
            .registry
            .create_repository(
                &naming::repository(&app, &name),
                &naming::resource_tags(&app, None, Some(&name)),
            )
            .await
            .map_err(|e| self.aws_error("Failed to create the image repository", e))?;

        log::info!("Images of {name} go to {uri}");

        self.ctx
            .store
            .create_workload(&Workload {
                app,
                name: name.clone(),
                kind,
            })
            .await?;

        println!(
            "{} {} {}\n{}",
            console::style("Created").green().bold(),
            console::style(&name).bold(),
            console::style(format!("({kind})")).dim(),
            console::style(format!(
                "Next, run `copilot {} deploy --name {name}` to deploy it",
                self.noun.command()
            ))
            .dim()
        );

        Ok(())
    }
}

/// Dockerfiles under the root, relative to it, closest first
fn find_dockerfiles(root: &Path) -> eyre::Result<Vec<String>> {
    let mut found = vec![];
    let mut dirs = vec![(root.to_path_buf(), 0)];

    while let Some((dir, depth)) = dirs.pop() {
        let entries =
            fs::read_dir(&dir).wrap_err_with(|| format!("Failed to read {}", dir.display()))?;

        for entry in entries.flatten() {
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();

            if path.is_dir() {
                if depth < DOCKERFILE_SEARCH_DEPTH && !is_skipped(&file_name) {
                    dirs.push((path, depth + 1));
                }
            } else if file_name == "Dockerfile" {
                found.push(relative(root, &path));
            }
        }
    }

    found.sort_by_key(|path| (path.matches('/').count(), path.clone()));
    Ok(found)
}

fn is_skipped(dir: &str) -> bool {
    dir.starts_with('.') || matches!(dir, "copilot" | "node_modules" | "target")
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}

/// First port in an EXPOSE instruction, e.g. "EXPOSE 8080/tcp"
fn exposed_port(dockerfile: &str) -> Option<u16> {
    dockerfile.lines().find_map(|line| {
        let mut words = line.split_whitespace();

        match words.next() {
            Some(instruction) if instruction.eq_ignore_ascii_case("EXPOSE") => words
                .next()
                .and_then(|port| port.split('/').next())
                .and_then(|port| port.parse().ok()),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Answer, Fakes};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Workspace, Fakes) {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create(dir.path(), "shop").unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM nginx\nEXPOSE 8080/tcp\n").unwrap();
        (dir, workspace, Fakes::new())
    }

    #[test]
    fn port_from_expose() {
        assert_eq!(exposed_port("FROM x\nexpose 3000\n"), Some(3000));
        assert_eq!(exposed_port("FROM x\n"), None);
    }

    #[test]
    fn dockerfiles_closest_first() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("api")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("api/Dockerfile"), "").unwrap();
        fs::write(dir.path().join("Dockerfile"), "").unwrap();
        fs::write(dir.path().join(".git/Dockerfile"), "").unwrap();

        assert_eq!(
            find_dockerfiles(dir.path()).unwrap(),
            vec!["Dockerfile", "api/Dockerfile"]
        );
    }

    #[tokio::test]
    async fn service_from_flags_without_questions() {
        let (dir, workspace, fakes) = setup();
        fakes.app("shop").await;
        let ctx = fakes.context(dir.path());

        let input = InitInput {
            name: Some("api".into()),
            kind: Some("Load Balanced Web Service".into()),
            dockerfile: Some("Dockerfile".into()),
            ..Default::default()
        };

        InitRunner::new(Noun::Service, input, &ctx).run().await.unwrap();

        let manifest = workspace.read_workload("api").unwrap();
        assert_eq!(manifest.kind, WorkloadType::LoadBalancedWebService);
        assert_eq!(manifest.image.port, Some(8080));
        assert_eq!(fakes.registry.repositories(), vec!["shop/api"]);
        assert_eq!(
            ctx.store.get_workload("shop", "api").await.unwrap().kind,
            WorkloadType::LoadBalancedWebService
        );
        assert!(fakes.prompt.asked().is_empty());
    }

    #[tokio::test]
    async fn job_type_is_not_a_service() {
        let (dir, _workspace, fakes) = setup();
        let ctx = fakes.context(dir.path());

        let input = InitInput {
            kind: Some("Scheduled Job".into()),
            ..Default::default()
        };

        let error = InitRunner::new(Noun::Service, input, &ctx).run().await.unwrap_err();
        assert_eq!(error.message(), "Invalid service type");
    }

    #[tokio::test]
    async fn job_asks_for_the_missing_values() {
        let (dir, workspace, fakes) = setup();
        fakes.app("shop").await;
        fakes.prompt.answer(Answer::Text("report".into()));
        fakes.prompt.answer(Answer::Text(USE_IMAGE.into()));
        fakes.prompt.answer(Answer::Text("busybox".into()));
        fakes.prompt.answer(Answer::Text("@weekly".into()));
        let ctx = fakes.context(dir.path());

        InitRunner::new(Noun::Job, InitInput::default(), &ctx)
            .run()
            .await
            .unwrap();

        let manifest = workspace.read_workload("report").unwrap();
        assert_eq!(manifest.kind, WorkloadType::ScheduledJob);
        assert_eq!(manifest.image.location.as_deref(), Some("busybox"));
        assert_eq!(manifest.on.unwrap().schedule, "@weekly");
    }

    #[tokio::test]
    async fn invalid_schedule_is_rejected() {
        let (dir, _workspace, fakes) = setup();
        let ctx = fakes.context(dir.path());

        let input = InitInput {
            schedule: Some("every now and then".into()),
            ..Default::default()
        };

        let error = InitRunner::new(Noun::Job, input, &ctx).run().await.unwrap_err();
        assert_eq!(error.message(), "Invalid schedule");
    }
}
