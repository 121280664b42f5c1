use crate::commands::workload::render::render;
use crate::commands::workload::{image, local, Noun, DEFAULT_TAG};
use crate::context::Context;
use crate::error::Error;
use crate::runner::Runner;
use crate::workspace::Workspace;
use copilot_common::validate;
use eyre::WrapErr;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Flags of `svc package` and `job package`
#[derive(Debug, Clone, Default)]
pub(crate) struct PackageInput {
    pub(crate) name: Option<String>,
    pub(crate) env: Option<String>,
    pub(crate) tag: Option<String>,
    pub(crate) output_dir: Option<PathBuf>,

    /// Build and push the image, upload the addons
    pub(crate) upload_assets: bool,
}

pub(crate) struct PackageRunner {
    noun: Noun,
    input: PackageInput,
    ctx: Context,
    workspace: Option<Workspace>,

    /// Application, workload and environment
    target: Option<(String, String, String)>,
}

impl PackageRunner {
    pub(crate) fn new(noun: Noun, input: PackageInput, ctx: &Context) -> Self {
        PackageRunner {
            noun,
            input,
            ctx: ctx.clone(),
            workspace: None,
            target: None,
        }
    }
}

impl Runner for PackageRunner {
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

        if let Some(dir) = &self.input.output_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(self.error(
                    Some("Invalid output directory"),
                    Some(&format!("{} is not a directory", dir.display())),
                    None,
                ));
            }
        }

        Ok(())
    }

    async fn ask(&mut self) -> Result<(), Error> {
        let workspace = self.ctx.workspace()?;
        let app = workspace.summary()?.application;

        let name = local(
            &self.ctx,
            &workspace,
            self.noun,
            self.input.name.as_deref(),
            &format!("Which {} would you like to package?", self.noun.as_str()),
        )?;

        let env = match &self.input.env {
            Some(env) => env.clone(),
            None => {
                self.ctx
                    .selector()
                    .environment("Which environment would you like to package for?", &app)
                    .await?
            }
        };

        self.workspace = Some(workspace);
        self.target = Some((app, name, env));
        Ok(())
    }

    async fn execute(&mut self) -> Result<(), Error> {
        let (Some(workspace), Some((app, name, env))) = (self.workspace.clone(), self.target.clone())
        else {
            return Err(self.error(Some("Nothing to package"), None, None));
        };

        self.ctx.store.get_environment(&app, &env).await?;

        let manifest = workspace.read_workload(&name)?;

        if !self.noun.matches(manifest.kind) {
            return Err(self.error(
                Some(&format!("{name} is not a {}", self.noun.as_str())),
                Some(&format!("It is a {}", manifest.kind)),
                None,
            ));
        }

        let tag = self.input.tag.as_deref().unwrap_or(DEFAULT_TAG);

        let build = self.input.upload_assets;

        let image = image(&self.ctx, &workspace, &app, &manifest.apply_env(&env)?, tag, build)
            .await
            .map_err(|e| self.aws_error("Failed to get the image", e))?;

        let rendered = render(&self.ctx, &workspace, &app, &env, &manifest, &image, &BTreeMap::new())
            .await
            .map_err(|e| {
                self.aws_error(&format!("Failed to render the {} stack", self.noun.as_str()), e)
            })?;

        if let (true, Some(addons)) = (self.input.upload_assets, &rendered.addons) {
            self.ctx
                .uploader
                .upload(&addons.bucket, &addons.key, addons.template.clone().into_bytes())
                .await
                .map_err(|e| self.aws_error("Failed to upload the addons", e))?;
        }

        let Some(dir) = &self.input.output_dir else {
            println!("{}", rendered.stack.template);

            if let Some(addons) = &rendered.addons {
                println!("---\n{}", addons.template);
            }

            return Ok(());
        };

        fs::create_dir_all(dir)
            .wrap_err_with(|| format!("Failed to create {}", dir.display()))?;

        let mut files = vec![(
            dir.join(format!("{name}-{env}.stack.json")),
            rendered.stack.template,
        )];

        if let Some(addons) = rendered.addons {
            files.push((dir.join(format!("{name}.addons.stack.yml")), addons.template));
        }

        for (path, content) in files {
            fs::write(&path, content)
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;

            println!(
                "{} {}",
                console::style("Wrote").green().bold(),
                path.display()
            );
        }

        Ok(())
    }
}
