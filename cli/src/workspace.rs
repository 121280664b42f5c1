//! Local files of an application: manifests, addons and pipelines
//!
//! Everything lives in the copilot/ directory at the root of the user's repository:
//!
//! ```text
//! copilot/
//!   .workspace
//!   api/manifest.yml
//!   api/addons/orders.yml
//!   environments/test/manifest.yml
//!   pipelines/release/manifest.yml
//!   pipelines/release/buildspec.yml
//! ```

use crate::config::build_config;
use copilot_common::addon::{self, PARAMETERS_FILE};
use copilot_common::manifest::{EnvironmentManifest, PipelineManifest, WorkloadManifest};
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SUMMARY_FILE: &str = ".workspace";
const MANIFEST_FILE: &str = "manifest.yml";
const BUILDSPEC_FILE: &str = "buildspec.yml";
const ENVIRONMENTS_DIR: &str = "environments";
const PIPELINES_DIR: &str = "pipelines";
const ADDONS_DIR: &str = "addons";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WorkspaceError {
    /// No copilot/ directory in the current directory or its parents
    NotFound,

    /// The workspace exists but is not linked to an application
    Uninitialized,

    /// The workspace belongs to a different application
    AppMismatch { existing: String },

    FileExists(PathBuf),
    WorkloadNotFound(String),
    PipelineNotFound(String),
}

impl std::fmt::Display for WorkspaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            WorkspaceError::NotFound => write!(
                f,
                "Couldn't find a copilot workspace, run `copilot app init` to create one"
            ),
            WorkspaceError::Uninitialized => write!(
                f,
                "The workspace is not linked to an application, run `copilot app init`"
            ),
            WorkspaceError::AppMismatch { existing } => write!(
                f,
                "The workspace is already registered with application {existing}"
            ),
            WorkspaceError::FileExists(path) => {
                write!(f, "File {} already exists", path.display())
            }
            WorkspaceError::WorkloadNotFound(name) => {
                write!(f, "Couldn't find a manifest for {name} in the workspace")
            }
            WorkspaceError::PipelineNotFound(name) => {
                write!(f, "Couldn't find a manifest for pipeline {name} in the workspace")
            }
        }
    }
}

impl std::error::Error for WorkspaceError {}

/// Contents of copilot/.workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Summary {
    pub(crate) application: String,
}

#[derive(Debug, Clone)]
pub(crate) struct Workspace {
    /// The copilot/ directory itself
    dir: PathBuf,
}

impl Workspace {
    /// Look for copilot/ in the directory and up to a few of its parents
    pub(crate) fn find(from: &Path) -> eyre::Result<Self> {
        let config = build_config()?;
        let mut current = Some(from);

        for _ in 0..=config.max_search_depth {
            let Some(dir) = current else {
                break;
            };

            let candidate = dir.join(config.workspace_dir);

            if candidate.is_dir() {
                log::debug!("Found workspace at {}", candidate.display());
                return Ok(Workspace { dir: candidate });
            }

            current = dir.parent();
        }

        Err(WorkspaceError::NotFound.into())
    }

    /// Create copilot/ in the directory, or reuse the existing one
    ///
    /// Linking the workspace to another application is not allowed.
    pub(crate) fn create(root: &Path, app: &str) -> eyre::Result<Self> {
        let workspace = match Self::find(root) {
            Ok(workspace) => workspace,
            Err(_) => {
                let dir = root.join(build_config()?.workspace_dir);

                fs::create_dir_all(&dir)
                    .wrap_err_with(|| format!("Failed to create {}", dir.display()))?;

                Workspace { dir }
            }
        };

        match workspace.summary() {
            Ok(summary) if summary.application == app => Ok(workspace),
            Ok(summary) => Err(WorkspaceError::AppMismatch {
                existing: summary.application,
            }
            .into()),
            Err(_) => {
                let summary = serde_yaml::to_string(&Summary {
                    application: app.to_string(),
                })
                .wrap_err("Failed to serialize workspace summary")?;

                write(&workspace.dir.join(SUMMARY_FILE), &summary)?;
                Ok(workspace)
            }
        }
    }

    pub(crate) fn summary(&self) -> eyre::Result<Summary> {
        let path = self.dir.join(SUMMARY_FILE);

        if !path.is_file() {
            return Err(WorkspaceError::Uninitialized.into());
        }

        let content = read(&path)?;
        serde_yaml::from_str(&content).wrap_err("Malformed workspace summary")
    }

    pub(crate) fn delete_summary(&self) -> eyre::Result<()> {
        let path = self.dir.join(SUMMARY_FILE);

        if path.is_file() {
            fs::remove_file(&path)
                .wrap_err_with(|| format!("Failed to remove {}", path.display()))?;
        }

        Ok(())
    }

    /// Directory that contains copilot/, paths in manifests are relative to it
    pub(crate) fn root(&self) -> &Path {
        self.dir.parent().unwrap_or(&self.dir)
    }

    /// Path as shown to the user
    pub(crate) fn display(&self, path: &Path) -> String {
        path.strip_prefix(self.root())
            .unwrap_or(path)
            .display()
            .to_string()
    }

    fn workload_manifest_path(&self, name: &str) -> PathBuf {
        self.dir.join(name).join(MANIFEST_FILE)
    }

    /// All the workload manifests of the workspace
    pub(crate) fn workloads(&self) -> eyre::Result<Vec<WorkloadManifest>> {
        let mut manifests = vec![];

        let entries = fs::read_dir(&self.dir)
            .wrap_err_with(|| format!("Failed to read {}", self.dir.display()))?;

        for entry in entries {
            let entry = entry.wrap_err("Failed to read workspace entry")?;
            let name = entry.file_name().to_string_lossy().to_string();

            if name == ENVIRONMENTS_DIR || name == PIPELINES_DIR || !entry.path().is_dir() {
                continue;
            }

            let path = entry.path().join(MANIFEST_FILE);

            if !path.is_file() {
                continue;
            }

            let manifest = WorkloadManifest::from_yaml(&read(&path)?)
                .wrap_err_with(|| format!("Invalid manifest {}", self.display(&path)))?;

            manifests.push(manifest);
        }

        manifests.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(manifests)
    }

    pub(crate) fn services(&self) -> eyre::Result<Vec<WorkloadManifest>> {
        let mut workloads = self.workloads()?;
        workloads.retain(|w| w.kind.is_service());
        Ok(workloads)
    }

    pub(crate) fn jobs(&self) -> eyre::Result<Vec<WorkloadManifest>> {
        let mut workloads = self.workloads()?;
        workloads.retain(|w| w.kind.is_job());
        Ok(workloads)
    }

    pub(crate) fn read_workload(&self, name: &str) -> eyre::Result<WorkloadManifest> {
        let path = self.workload_manifest_path(name);

        if !path.is_file() {
            return Err(WorkspaceError::WorkloadNotFound(name.to_string()).into());
        }

        WorkloadManifest::from_yaml(&read(&path)?)
            .wrap_err_with(|| format!("Invalid manifest {}", self.display(&path)))
    }

    pub(crate) fn write_workload(&self, manifest: &WorkloadManifest) -> eyre::Result<PathBuf> {
        let path = self.workload_manifest_path(&manifest.name);
        write_new(&path, &manifest.to_yaml()?)?;
        Ok(path)
    }

    pub(crate) fn read_environment(&self, name: &str) -> eyre::Result<Option<EnvironmentManifest>> {
        let path = self.dir.join(ENVIRONMENTS_DIR).join(name).join(MANIFEST_FILE);

        if !path.is_file() {
            return Ok(None);
        }

        EnvironmentManifest::from_yaml(&read(&path)?).map(Some)
    }

    pub(crate) fn write_environment(&self, manifest: &EnvironmentManifest) -> eyre::Result<PathBuf> {
        let path = self
            .dir
            .join(ENVIRONMENTS_DIR)
            .join(&manifest.name)
            .join(MANIFEST_FILE);

        write_new(&path, &manifest.to_yaml()?)?;
        Ok(path)
    }

    fn pipeline_dir(&self, name: &str) -> PathBuf {
        self.dir.join(PIPELINES_DIR).join(name)
    }

    /// Names of the pipelines with a manifest in the workspace
    pub(crate) fn pipelines(&self) -> eyre::Result<Vec<String>> {
        let dir = self.dir.join(PIPELINES_DIR);

        if !dir.is_dir() {
            return Ok(vec![]);
        }

        let mut names = vec![];

        for entry in fs::read_dir(&dir).wrap_err("Failed to read pipelines")? {
            let entry = entry.wrap_err("Failed to read pipeline entry")?;

            if entry.path().join(MANIFEST_FILE).is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    pub(crate) fn read_pipeline(&self, name: &str) -> eyre::Result<PipelineManifest> {
        let path = self.pipeline_dir(name).join(MANIFEST_FILE);

        if !path.is_file() {
            return Err(WorkspaceError::PipelineNotFound(name.to_string()).into());
        }

        PipelineManifest::from_yaml(&read(&path)?)
            .wrap_err_with(|| format!("Invalid manifest {}", self.display(&path)))
    }

    /// Write the manifest and the buildspec, returns their paths
    pub(crate) fn write_pipeline(
        &self,
        manifest: &PipelineManifest,
    ) -> eyre::Result<(PathBuf, PathBuf)> {
        let dir = self.pipeline_dir(&manifest.name);
        let manifest_path = dir.join(MANIFEST_FILE);
        let buildspec_path = dir.join(BUILDSPEC_FILE);

        write_new(&manifest_path, &manifest.to_yaml()?)?;
        write_new(&buildspec_path, &manifest.buildspec())?;

        Ok((manifest_path, buildspec_path))
    }

    /// Path of the buildspec relative to the repository root, as CodeBuild sees it
    pub(crate) fn buildspec_path(&self, name: &str) -> String {
        self.display(&self.pipeline_dir(name).join(BUILDSPEC_FILE))
    }

    fn addons_dir(&self, workload: &str) -> PathBuf {
        self.dir.join(workload).join(ADDONS_DIR)
    }

    pub(crate) fn write_addon(
        &self,
        workload: &str,
        name: &str,
        content: &str,
    ) -> eyre::Result<PathBuf> {
        let path = self.addons_dir(workload).join(format!("{name}.yml"));
        write_new(&path, content)?;
        Ok(path)
    }

    /// Add parameters to addons.parameters.yml, keeping the existing ones
    ///
    /// A parameter already set to a different value is an error.
    pub(crate) fn write_addon_parameters(
        &self,
        workload: &str,
        parameters: &[(&str, &str)],
    ) -> eyre::Result<PathBuf> {
        let path = self.addons_dir(workload).join(PARAMETERS_FILE);

        let mut merged = match path.is_file() {
            true => addon::parameters(&read(&path)?)
                .wrap_err_with(|| format!("Invalid {}", self.display(&path)))?,
            false => Mapping::new(),
        };

        for (key, value) in parameters {
            let value: Value = serde_yaml::from_str(value)
                .wrap_err_with(|| format!("Invalid value of parameter {key}"))?;

            match merged.get(*key) {
                None => {
                    merged.insert(Value::from(*key), value);
                }
                Some(existing) if *existing == value => {}
                Some(_) => {
                    return Err(eyre::eyre!(
                        "Parameter {key} is already set to a different value in {}",
                        self.display(&path)
                    ))
                }
            }
        }

        let mut document = Mapping::new();
        document.insert(Value::from("Parameters"), Value::Mapping(merged));

        let content = serde_yaml::to_string(&document)
            .wrap_err("Failed to serialize addons parameters")?;

        write(&path, &content)?;
        Ok(path)
    }

    /// Every addon template of a workload, parameters file excluded
    pub(crate) fn addons(&self, workload: &str) -> eyre::Result<Vec<addon::Template>> {
        let dir = self.addons_dir(workload);

        if !dir.is_dir() {
            return Ok(vec![]);
        }

        let mut paths = vec![];

        for entry in fs::read_dir(&dir).wrap_err("Failed to read addons")? {
            let path = entry.wrap_err("Failed to read addon entry")?.path();
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            let is_yaml = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml") | Some("yaml")
            );

            if is_yaml && file_name != PARAMETERS_FILE {
                paths.push(path);
            }
        }

        paths.sort();

        paths
            .iter()
            .map(|path| {
                Ok(addon::Template {
                    name: self.display(path),
                    content: read(path)?,
                })
            })
            .collect()
    }

    pub(crate) fn addon_parameters(&self, workload: &str) -> eyre::Result<Option<String>> {
        let path = self.addons_dir(workload).join(PARAMETERS_FILE);

        if !path.is_file() {
            return Ok(None);
        }

        read(&path).map(Some)
    }
}

fn read(path: &Path) -> eyre::Result<String> {
    fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {}", path.display()))
}

fn write(path: &Path, content: &str) -> eyre::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
    }

    fs::write(path, content).wrap_err_with(|| format!("Failed to write {}", path.display()))
}

/// Write a file which must not exist yet
fn write_new(path: &Path, content: &str) -> eyre::Result<()> {
    if path.exists() {
        return Err(WorkspaceError::FileExists(path.to_path_buf()).into());
    }

    write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use copilot_common::manifest::workload::WorkloadProps;
    use copilot_common::model::WorkloadType;
    use tempfile::TempDir;

    fn manifest(name: &str, kind: WorkloadType) -> WorkloadManifest {
        WorkloadManifest::new(
            kind,
            &WorkloadProps {
                name: name.into(),
                image: Some("nginx".into()),
                schedule: kind.is_job().then(|| "@daily".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn found_from_nested_directory() {
        let dir = TempDir::new().unwrap();
        Workspace::create(dir.path(), "shop").unwrap();

        let nested = dir.path().join("src/api/handlers");
        fs::create_dir_all(&nested).unwrap();

        let workspace = Workspace::find(&nested).unwrap();
        assert_eq!(workspace.summary().unwrap().application, "shop");
        assert_eq!(workspace.root(), dir.path());
    }

    #[test]
    fn not_found_beyond_max_depth() {
        let dir = TempDir::new().unwrap();
        Workspace::create(dir.path(), "shop").unwrap();

        let nested = dir.path().join("a/b/c/d/e/f");
        fs::create_dir_all(&nested).unwrap();

        let error = Workspace::find(&nested).unwrap_err();
        assert_eq!(
            error.downcast_ref::<WorkspaceError>(),
            Some(&WorkspaceError::NotFound)
        );
    }

    #[test]
    fn cannot_be_linked_to_another_app() {
        let dir = TempDir::new().unwrap();
        Workspace::create(dir.path(), "shop").unwrap();
        Workspace::create(dir.path(), "shop").unwrap();

        let error = Workspace::create(dir.path(), "blog").unwrap_err();
        assert!(matches!(
            error.downcast_ref::<WorkspaceError>(),
            Some(WorkspaceError::AppMismatch { existing }) if existing == "shop"
        ));
    }

    #[test]
    fn workloads_are_listed_by_kind() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create(dir.path(), "shop").unwrap();

        workspace
            .write_workload(&manifest("api", WorkloadType::LoadBalancedWebService))
            .unwrap();
        workspace
            .write_workload(&manifest("report", WorkloadType::ScheduledJob))
            .unwrap();
        workspace
            .write_environment(&EnvironmentManifest::new("test", None).unwrap())
            .unwrap();

        let services = workspace.services().unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "api");
        assert_eq!(workspace.jobs().unwrap()[0].name, "report");
        assert!(workspace.read_environment("test").unwrap().is_some());
    }

    #[test]
    fn manifests_are_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create(dir.path(), "shop").unwrap();
        let api = manifest("api", WorkloadType::BackendService);

        workspace.write_workload(&api).unwrap();
        let error = workspace.write_workload(&api).unwrap_err();

        assert!(matches!(
            error.downcast_ref::<WorkspaceError>(),
            Some(WorkspaceError::FileExists(_))
        ));
    }

    #[test]
    fn addons_skip_the_parameters_file() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create(dir.path(), "shop").unwrap();

        workspace
            .write_addon("api", "orders", "Resources: {}\n")
            .unwrap();
        workspace
            .write_addon_parameters("api", &[("ServiceSecurityGroupId", "!Ref ServiceSecurityGroup")])
            .unwrap();

        let addons = workspace.addons("api").unwrap();
        assert_eq!(addons.len(), 1);
        assert_eq!(addons[0].name, "copilot/api/addons/orders.yml");
        assert!(workspace.addon_parameters("api").unwrap().is_some());
    }

    #[test]
    fn addon_parameters_are_merged() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create(dir.path(), "shop").unwrap();

        workspace
            .write_addon_parameters("api", &[("ServiceSecurityGroupId", "!Ref ServiceSecurityGroup")])
            .unwrap();
        workspace
            .write_addon_parameters(
                "api",
                &[
                    ("ServiceSecurityGroupId", "!Ref ServiceSecurityGroup"),
                    ("Stage", "beta"),
                ],
            )
            .unwrap();

        let content = workspace.addon_parameters("api").unwrap().unwrap();
        assert!(content.contains("ServiceSecurityGroupId: !Ref ServiceSecurityGroup"));
        assert!(content.contains("Stage: beta"));

        assert!(workspace
            .write_addon_parameters("api", &[("Stage", "gamma")])
            .is_err());
    }
}
