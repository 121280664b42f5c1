use crate::aws::{sdk_error, text};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use eyre::WrapErr;

#[async_trait]
pub(crate) trait ArtifactUploader: Send + Sync {
    /// Upload an object and return its HTTPS URL
    async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>) -> eyre::Result<String>;

    /// Delete every object and version, so that the bucket itself can be deleted
    async fn empty_bucket(&self, bucket: &str) -> eyre::Result<()>;
}

/// Virtual-hosted style URL, the form CloudFormation accepts for templates
pub(crate) fn object_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
}

pub(crate) struct S3 {
    client: aws_sdk_s3::Client,
    region: String,
}

impl S3 {
    pub(crate) fn new(config: &SdkConfig) -> Self {
        S3 {
            client: aws_sdk_s3::Client::new(config),
            region: config
                .region()
                .map(|r| r.to_string())
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl ArtifactUploader for S3 {
    async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>) -> eyre::Result<String> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(sdk_error)
            .wrap_err_with(|| format!("Failed to upload {key} to {bucket}"))?;

        Ok(object_url(bucket, &self.region, key))
    }

    async fn empty_bucket(&self, bucket: &str) -> eyre::Result<()> {
        let mut key_marker: Option<String> = None;
        let mut version_marker: Option<String> = None;

        loop {
            let result = self
                .client
                .list_object_versions()
                .bucket(bucket)
                .set_key_marker(key_marker.clone())
                .set_version_id_marker(version_marker.clone())
                .send()
                .await;

            let output = match result {
                Ok(output) => output,
                Err(e) if e.as_service_error().and_then(|e| e.code()) == Some("NoSuchBucket") => {
                    log::info!("Bucket {bucket} does not exist, nothing to empty");
                    return Ok(());
                }
                Err(e) => {
                    return Err(sdk_error(e))
                        .wrap_err_with(|| format!("Failed to list objects of {bucket}"))
                }
            };

            let versions = output
                .versions()
                .iter()
                .map(|v| (text(v.key()), v.version_id().map(str::to_string)))
                .chain(
                    output
                        .delete_markers()
                        .iter()
                        .map(|m| (text(m.key()), m.version_id().map(str::to_string))),
                );

            let objects = versions
                .map(|(key, version)| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .set_version_id(version)
                        .build()
                        .wrap_err("Failed to build object identifier")
                })
                .collect::<eyre::Result<Vec<_>>>()?;

            if !objects.is_empty() {
                log::debug!("Deleting {} objects from {bucket}", objects.len());

                let delete = Delete::builder()
                    .set_objects(Some(objects))
                    .quiet(true)
                    .build()
                    .wrap_err("Failed to build delete request")?;

                self.client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(sdk_error)
                    .wrap_err_with(|| format!("Failed to delete objects of {bucket}"))?;
            }

            let truncated: Option<bool> = output.is_truncated().into();

            if !truncated.unwrap_or(false) {
                break;
            }

            key_marker = output.next_key_marker().map(str::to_string);
            version_marker = output.next_version_id_marker().map(str::to_string);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_virtual_hosted() {
        assert_eq!(
            object_url("shop-artifacts", "eu-west-1", "manifests/api/abc.yml"),
            "https://shop-artifacts.s3.eu-west-1.amazonaws.com/manifests/api/abc.yml"
        );
    }
}
