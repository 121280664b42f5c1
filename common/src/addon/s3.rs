use super::common_parameters;
use crate::template::sanitize::logical_id;
use crate::validate;

#[derive(Debug, Clone)]
pub struct S3Props {
    pub name: String,
}

impl S3Props {
    pub fn validate(&self) -> eyre::Result<()> {
        validate::s3_bucket_name(&self.name)
    }

    pub fn template(&self) -> String {
        let id = logical_id(&self.name);
        let name = &self.name;

        format!(
            r#"{parameters}Resources:
  {id}:
    Metadata:
      'aws:copilot:description': 'An Amazon S3 bucket, {name}, for storing and retrieving objects'
    Type: AWS::S3::Bucket
    DeletionPolicy: Retain
    UpdateReplacePolicy: Retain
    Properties:
      VersioningConfiguration:
        Status: Enabled
      BucketEncryption:
        ServerSideEncryptionConfiguration:
          - ServerSideEncryptionByDefault:
              SSEAlgorithm: AES256
      PublicAccessBlockConfiguration:
        BlockPublicAcls: true
        BlockPublicPolicy: true
        IgnorePublicAcls: true
        RestrictPublicBuckets: true
      OwnershipControls:
        Rules:
          - ObjectOwnership: BucketOwnerEnforced
  {id}BucketPolicy:
    Metadata:
      'aws:copilot:description': 'A bucket policy to deny unencrypted access to the bucket and its contents'
    Type: AWS::S3::BucketPolicy
    DeletionPolicy: Retain
    Properties:
      PolicyDocument:
        Version: '2012-10-17'
        Statement:
          - Sid: ForceHTTPS
            Effect: Deny
            Principal: '*'
            Action: 's3:*'
            Resource:
              - !Sub ${{{id}.Arn}}/*
              - !Sub ${{{id}.Arn}}
            Condition:
              Bool:
                'aws:SecureTransport': false
      Bucket: !Ref {id}
  {id}AccessPolicy:
    Metadata:
      'aws:copilot:description': 'An IAM ManagedPolicy for your service to access the {name} bucket'
    Type: AWS::IAM::ManagedPolicy
    Properties:
      Description: !Sub
        - Grants CRUD access to the S3 bucket ${{Bucket}}
        - {{ Bucket: !Ref {id} }}
      PolicyDocument:
        Version: '2012-10-17'
        Statement:
          - Sid: S3ObjectActions
            Effect: Allow
            Action:
              - s3:GetObject
              - s3:PutObject
              - s3:PutObjectTagging
              - s3:DeleteObject
              - s3:RestoreObject
            Resource: !Sub ${{{id}.Arn}}/*
          - Sid: S3ListAction
            Effect: Allow
            Action: s3:ListBucket
            Resource: !Sub ${{{id}.Arn}}
Outputs:
  {id}Name:
    Description: The name of a user-defined bucket.
    Value: !Ref {id}
  {id}AccessPolicy:
    Description: The IAM::ManagedPolicy to attach to the task role.
    Value: !Ref {id}AccessPolicy
"#,
            parameters = common_parameters(),
        )
    }
}
