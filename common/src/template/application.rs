use super::{reference, tags, CfnResource, Template};
use crate::naming;
use serde_json::json;

/// Output with the name of the bucket keeping addon templates and pipeline artifacts
pub const ARTIFACT_BUCKET: &str = "ArtifactBucket";

/// Stack shared by all environments of an application
pub fn application(app: &str) -> Template {
    let mut template = Template::new(&format!(
        "Infrastructure shared by the environments of the {app} application."
    ));

    template.add_resource(CfnResource::new(
        ARTIFACT_BUCKET,
        json!({
            "Type": "AWS::S3::Bucket",
            "Properties": {
                "VersioningConfiguration": {"Status": "Enabled"},
                "BucketEncryption": {
                    "ServerSideEncryptionConfiguration": [{
                        "ServerSideEncryptionByDefault": {"SSEAlgorithm": "AES256"}
                    }]
                },
                "PublicAccessBlockConfiguration": {
                    "BlockPublicAcls": true,
                    "BlockPublicPolicy": true,
                    "IgnorePublicAcls": true,
                    "RestrictPublicBuckets": true
                },
                "OwnershipControls": {
                    "Rules": [{"ObjectOwnership": "BucketOwnerEnforced"}]
                },
                "Tags": tags([(naming::TAG_APP, app)])
            }
        }),
    ));

    template.add_resource(CfnResource::new(
        format!("{ARTIFACT_BUCKET}Policy"),
        json!({
            "Type": "AWS::S3::BucketPolicy",
            "Properties": {
                "Bucket": reference(ARTIFACT_BUCKET),
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Sid": "ForceHTTPS",
                        "Effect": "Deny",
                        "Principal": "*",
                        "Action": "s3:*",
                        "Resource": [
                            {"Fn::Sub": format!("${{{ARTIFACT_BUCKET}.Arn}}")},
                            {"Fn::Sub": format!("${{{ARTIFACT_BUCKET}.Arn}}/*")}
                        ],
                        "Condition": {"Bool": {"aws:SecureTransport": false}}
                    }]
                }
            }
        }),
    ));

    template.add_output(
        ARTIFACT_BUCKET,
        reference(ARTIFACT_BUCKET),
        Some(format!("{app}-{ARTIFACT_BUCKET}")),
    );

    template
}
