//! S3 buckets, grants and bucket deployments

use crate::construct_id;
use crate::iam::{PolicyDocument, PolicyStatement, Principal, Role};
use crate::lambda::{Code, Function, FunctionProps, Runtime};
use stackflow_core::{
    AssetSource, LogicalId, PseudoParameter, RemovalPolicy, ResourceDraft, ResourceHandle, Result, StackBuilder,
    StackError, Value,
};
use std::path::PathBuf;
use std::time::Duration;

/// Actions granted by [`Bucket::grant_read`]
pub const READ_ACTIONS: &[&str] = &["s3:GetObject*", "s3:GetBucket*", "s3:List*"];

/// Actions granted by [`Bucket::grant_read_write`] on top of the read actions
pub const WRITE_ACTIONS: &[&str] = &[
    "s3:DeleteObject*",
    "s3:PutObject",
    "s3:PutObjectLegalHold",
    "s3:PutObjectRetention",
    "s3:PutObjectTagging",
    "s3:PutObjectVersionTagging",
    "s3:Abort*",
];

/// Actions the auto-delete provider gets through the bucket policy
pub const AUTO_DELETE_ACTIONS: &[&str] = &[
    "s3:PutBucketPolicy",
    "s3:GetBucket*",
    "s3:List*",
    "s3:DeleteObject*",
];

/// Stack-wide provider shared by every auto-delete bucket
pub const AUTO_DELETE_PROVIDER_ID: &str = "CustomS3AutoDeleteObjectsCustomResourceProviderHandler";

const AUTO_DELETE_HANDLER: &str = r#"import boto3
import cfnresponse


def handler(event, context):
    try:
        if event["RequestType"] == "Delete":
            bucket = event["ResourceProperties"]["BucketName"]
            boto3.resource("s3").Bucket(bucket).object_versions.delete()
        cfnresponse.send(event, context, cfnresponse.SUCCESS, {})
    except Exception as e:
        cfnresponse.send(event, context, cfnresponse.FAILED, {"Error": str(e)})
"#;

/// Public access block settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPublicAccess {
    BlockAll,
    BlockAcls,
}

impl BlockPublicAccess {
    fn to_value(self) -> Value {
        let (acls, policy) = match self {
            BlockPublicAccess::BlockAll => (true, true),
            BlockPublicAccess::BlockAcls => (true, false),
        };
        Value::map([
            ("BlockPublicAcls", Value::bool(acls)),
            ("BlockPublicPolicy", Value::bool(policy)),
            ("IgnorePublicAcls", Value::bool(acls)),
            ("RestrictPublicBuckets", Value::bool(policy)),
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct BucketProps {
    pub bucket_name: Option<String>,
    pub block_public_access: Option<BlockPublicAccess>,
    /// Defaults to `Retain`
    pub removal_policy: Option<RemovalPolicy>,
    pub versioned: bool,
    /// Empty the bucket before deletion. Requires `RemovalPolicy::Destroy`.
    pub auto_delete_objects: bool,
}

/// `AWS::S3::Bucket`
#[derive(Debug, Clone)]
pub struct Bucket {
    handle: ResourceHandle,
}

impl Bucket {
    pub fn new(builder: &mut StackBuilder, id: &str, props: BucketProps) -> Result<Self> {
        let removal_policy = props.removal_policy.unwrap_or(RemovalPolicy::Retain);
        if props.auto_delete_objects && removal_policy != RemovalPolicy::Destroy {
            return Err(StackError::validation(
                id,
                "auto_delete_objects requires RemovalPolicy::Destroy",
            ));
        }

        let versioning = props
            .versioned
            .then(|| Value::map([("Status", Value::string("Enabled"))]));

        let draft = ResourceDraft::new(id, "AWS::S3::Bucket")
            .property_opt("BucketName", props.bucket_name)
            .property_opt(
                "PublicAccessBlockConfiguration",
                props.block_public_access.map(BlockPublicAccess::to_value),
            )
            .property_opt("VersioningConfiguration", versioning)
            .removal_policy(removal_policy);

        let bucket = Self {
            handle: builder.add(draft)?,
        };
        if props.auto_delete_objects {
            bucket.enable_auto_delete(builder)?;
        }
        Ok(bucket)
    }

    /// Adds `<id>Policy` granting the shared provider access, and
    /// `<id>AutoDeleteObjectsCustomResource` which empties the bucket when
    /// the stack deletes it.
    fn enable_auto_delete(&self, builder: &mut StackBuilder) -> Result<()> {
        let (service_token, provider_role_arn) = auto_delete_provider(builder)?;

        let policy_id = construct_id(&[self.id().as_str(), "Policy"]);
        let statement = PolicyStatement::allow(
            AUTO_DELETE_ACTIONS.iter().copied(),
            [self.arn(), self.arn_for_objects("*")],
        )
        .with_principal(Principal::Aws(provider_role_arn));
        builder.add(
            ResourceDraft::new(policy_id.as_str(), "AWS::S3::BucketPolicy")
                .property("Bucket", self.name())
                .property("PolicyDocument", PolicyDocument::new(vec![statement]).to_value()),
        )?;

        builder.add(
            ResourceDraft::new(
                construct_id(&[self.id().as_str(), "AutoDeleteObjectsCustomResource"]),
                "Custom::S3AutoDeleteObjects",
            )
            .property("ServiceToken", service_token)
            .property("BucketName", self.name())
            .depends_on(policy_id)
            .removal_policy(RemovalPolicy::Destroy),
        )?;

        tracing::debug!(bucket = %self.id(), "Enabled auto delete objects");
        Ok(())
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn id(&self) -> &LogicalId {
        self.handle.id()
    }

    pub fn arn(&self) -> Value {
        self.handle.attribute("Arn")
    }

    /// Bucket name (`Ref`)
    pub fn name(&self) -> Value {
        self.handle.reference()
    }

    /// `<bucket arn>/<pattern>`
    pub fn arn_for_objects(&self, pattern: &str) -> Value {
        Value::join(
            "",
            vec![self.arn(), Value::string(format!("/{}", pattern))],
        )
    }

    pub fn grant_read(&self, builder: &mut StackBuilder, role: &Role) -> Result<()> {
        self.grant(builder, role, READ_ACTIONS.to_vec())
    }

    /// Read/write on the bucket and every object in it, as a statement in
    /// the role's default policy.
    pub fn grant_read_write(&self, builder: &mut StackBuilder, role: &Role) -> Result<()> {
        let mut actions = READ_ACTIONS.to_vec();
        actions.extend_from_slice(WRITE_ACTIONS);
        self.grant(builder, role, actions)
    }

    fn grant(&self, builder: &mut StackBuilder, role: &Role, actions: Vec<&str>) -> Result<()> {
        let statement =
            PolicyStatement::allow(actions, [self.arn(), self.arn_for_objects("*")]);
        role.add_to_policy(builder, statement)?;
        tracing::debug!(bucket = %self.id(), role = %role.id(), "Granted bucket access");
        Ok(())
    }
}

/// Provider function ARN and its role ARN, created on first use
fn auto_delete_provider(builder: &mut StackBuilder) -> Result<(Value, Value)> {
    let role_id = construct_id(&[AUTO_DELETE_PROVIDER_ID, "ServiceRole"]);
    if let (Some(function), Some(role)) = (
        builder.handle(AUTO_DELETE_PROVIDER_ID),
        builder.handle(&role_id),
    ) {
        return Ok((function.attribute("Arn"), role.attribute("Arn")));
    }

    let mut handler = FunctionProps::new(
        Runtime::Python312,
        Code::from_inline(AUTO_DELETE_HANDLER),
        "index.handler",
    );
    handler.timeout = Some(Duration::from_secs(900));
    handler.memory_size = Some(128);
    handler.description = Some("Empties S3 buckets before the stack deletes them".to_string());
    let provider = Function::new(builder, AUTO_DELETE_PROVIDER_ID, handler)?;
    Ok((provider.arn(), provider.role().arn()))
}

/// Properties for [`BucketDeployment::new`]
#[derive(Debug, Clone)]
pub struct BucketDeploymentProps {
    /// Local directories or files uploaded to the destination bucket
    pub sources: Vec<PathBuf>,
    /// Code of the function that copies staged assets into the bucket
    pub handler_code: Code,
    pub destination_key_prefix: Option<String>,
    /// Delete objects in the destination that are not in the sources
    pub prune: bool,
}

impl BucketDeploymentProps {
    pub fn new(sources: Vec<PathBuf>, handler_code: Code) -> Self {
        Self {
            sources,
            handler_code,
            destination_key_prefix: None,
            prune: true,
        }
    }
}

/// Uploads local content into a bucket at deploy time.
///
/// Registers one asset per source, a provider function and a
/// `Custom::CDKBucketDeployment` resource that drives it.
#[derive(Debug, Clone)]
pub struct BucketDeployment {
    handle: ResourceHandle,
    provider: Function,
    bucket: Bucket,
}

impl BucketDeployment {
    pub fn new(
        builder: &mut StackBuilder,
        id: &str,
        destination: &Bucket,
        props: BucketDeploymentProps,
    ) -> Result<Self> {
        let mut handler = FunctionProps::new(
            Runtime::Python39,
            props.handler_code,
            "index.handler",
        );
        handler.timeout = Some(Duration::from_secs(900));
        handler.memory_size = Some(128);
        let provider = Function::new(
            builder,
            &construct_id(&[id, "CustomResourceHandler"]),
            handler,
        )?;

        let mut bucket_names = Vec::new();
        let mut object_keys = Vec::new();
        for (index, source) in props.sources.into_iter().enumerate() {
            let asset = builder.add_asset(AssetSource::zip(
                construct_id(&[id, "Asset", &(index + 1).to_string()]),
                source,
            ))?;
            bucket_names.push(asset.bucket_name());
            object_keys.push(asset.object_key());
        }

        let staging_arns = bucket_names.iter().flat_map(|name| {
            let bucket_arn = Value::join(
                "",
                vec![
                    Value::string("arn:"),
                    Value::Pseudo(PseudoParameter::Partition),
                    Value::string(":s3:::"),
                    name.clone(),
                ],
            );
            let objects = Value::join("", vec![bucket_arn.clone(), Value::string("/*")]);
            [bucket_arn, objects]
        });
        provider.add_to_role_policy(
            builder,
            PolicyStatement::allow(READ_ACTIONS.to_vec(), staging_arns),
        )?;
        destination.grant_read_write(builder, provider.role())?;

        let draft = ResourceDraft::new(id, "Custom::CDKBucketDeployment")
            .property("ServiceToken", provider.arn())
            .property("SourceBucketNames", Value::List(bucket_names))
            .property("SourceObjectKeys", Value::List(object_keys))
            .property("DestinationBucketName", destination.name())
            .property_opt("DestinationBucketKeyPrefix", props.destination_key_prefix)
            .property("Prune", props.prune)
            .depends_on(construct_id(&[provider.role().id().as_str(), "DefaultPolicy"]));

        let handle = builder.add(draft)?;
        Ok(Self {
            handle,
            provider,
            bucket: destination.clone(),
        })
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn id(&self) -> &LogicalId {
        self.handle.id()
    }

    pub fn provider(&self) -> &Function {
        &self.provider
    }

    /// Name of the destination bucket. Consumers that need the uploaded
    /// objects must also depend on [`BucketDeployment::id`].
    pub fn deployed_bucket_name(&self) -> Value {
        self.bucket.name()
    }
}
