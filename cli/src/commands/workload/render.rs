use crate::aws::cloudformation::StackInput;
use crate::aws::s3::object_url;
use crate::context::Context;
use crate::stacks;
use crate::workspace::Workspace;
use copilot_common::addon;
use copilot_common::manifest::WorkloadManifest;
use copilot_common::naming;
use copilot_common::template::workload::{workload, Addons, WorkloadStackProps};
use eyre::WrapErr;
use std::collections::BTreeMap;

/// Merged addons of a workload and their location in the artifact bucket
#[derive(Debug, Clone)]
pub(crate) struct AddonsUpload {
    pub(crate) bucket: String,
    pub(crate) key: String,
    pub(crate) template: String,
}

/// Everything needed to deploy a workload to an environment
#[derive(Debug, Clone)]
pub(crate) struct Rendered {
    pub(crate) stack: StackInput,
    pub(crate) addons: Option<AddonsUpload>,
}

/// Stack of the workload in the environment, with the addons of the workspace nested in it
///
/// The addons location is derived from their content, so that it's known before the upload.
pub(crate) async fn render(
    ctx: &Context,
    workspace: &Workspace,
    app: &str,
    env: &str,
    manifest: &WorkloadManifest,
    image: &str,
    extra_tags: &BTreeMap<String, String>,
) -> eyre::Result<Rendered> {
    let manifest = manifest
        .apply_env(env)
        .wrap_err_with(|| format!("Invalid overrides of environment {env}"))?;

    let templates = workspace.addons(&manifest.name)?;

    let upload = match templates.is_empty() {
        true => None,
        false => {
            let template = addon::merge(&templates)?;
            let bucket = stacks::artifact_bucket(ctx, app).await?;
            let key = format!(
                "manifests/{app}/{}/addons/{}.yml",
                manifest.name,
                sha256::digest(template.as_bytes())
            );

            Some(AddonsUpload {
                bucket,
                key,
                template,
            })
        }
    };

    let addons = match &upload {
        None => None,
        Some(upload) => {
            let parameters = workspace
                .addon_parameters(&manifest.name)?
                .map(|content| addon::parameters(&content))
                .transpose()?
                .unwrap_or_default();

            Some(Addons {
                template_url: object_url(&upload.bucket, ctx.region()?, &upload.key),
                parameters,
                outputs: addon::outputs(&upload.template)?,
            })
        }
    };

    let template = workload(&WorkloadStackProps {
        app,
        env,
        manifest: &manifest,
        image,
        addons: addons.as_ref(),
    })?;

    let mut tags = extra_tags.clone();
    tags.extend(naming::resource_tags(app, Some(env), Some(&manifest.name)));

    Ok(Rendered {
        stack: StackInput {
            name: naming::workload_stack(app, env, &manifest.name),
            template: template.render()?,
            template_url: None,
            tags,
        },
        addons: upload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::Fakes;
    use copilot_common::manifest::workload::WorkloadProps;
    use copilot_common::model::WorkloadType;
    use tempfile::TempDir;

    fn manifest() -> WorkloadManifest {
        WorkloadManifest::new(
            WorkloadType::BackendService,
            &WorkloadProps {
                name: "api".into(),
                image: Some("nginx".into()),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn without_addons_nothing_is_uploaded() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create(dir.path(), "shop").unwrap();
        let fakes = Fakes::new();
        let ctx = fakes.context(dir.path());

        let rendered = render(&ctx, &workspace, "shop", "test", &manifest(), "nginx", &BTreeMap::new())
            .await
            .unwrap();

        assert!(rendered.addons.is_none());
        assert_eq!(rendered.stack.name, "shop-test-api");
        assert_eq!(
            rendered.stack.tags.get(naming::TAG_ENV).map(String::as_str),
            Some("test")
        );
        assert!(!rendered.stack.template.contains("AddonsStack"));
    }

    #[tokio::test]
    async fn addons_are_merged_and_nested() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create(dir.path(), "shop").unwrap();
        workspace
            .write_addon(
                "api",
                "orders",
                "Parameters:\n  App:\n    Type: String\nResources:\n  OrdersTable:\n    Type: AWS::DynamoDB::Table\nOutputs:\n  ordersName:\n    Value: !Ref OrdersTable\n",
            )
            .unwrap();
        let fakes = Fakes::new();
        fakes.app("shop").await;
        let ctx = fakes.context(dir.path());

        let rendered = render(&ctx, &workspace, "shop", "test", &manifest(), "nginx", &BTreeMap::new())
            .await
            .unwrap();

        let upload = rendered.addons.unwrap();
        assert_eq!(upload.bucket, "shop-artifacts");
        assert!(upload.key.starts_with("manifests/shop/api/addons/"));
        assert!(upload.template.contains("OrdersTable"));

        assert!(rendered.stack.template.contains("AddonsStack"));
        assert!(rendered.stack.template.contains(&upload.key));
        assert!(rendered.stack.template.contains("ORDERS_NAME"));
    }
}
