//! CloudFormation template synthesis
//!
//! Resolves every deferred value of an assembled stack in one explicit pass:
//!
//! - `Ref` / `GetAtt` references become `Ref` / `Fn::GetAtt`
//! - pseudo parameters become literals when the environment is concrete
//! - `Join` values merge adjacent literal parts, collapsing to a string when
//!   nothing deferred is left
//! - asset parts become the staging bucket name and `<hash>.zip` key

use crate::assets::AssetEntry;
use crate::error::{Result, SynthError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json, json};
use stackflow_core::graph::topological_order;
use stackflow_core::{
    AssetPart, Attribute, Descriptor, Edge, Environment, LogicalId, PseudoParameter, Stack,
    StackState, Value,
};
use std::collections::{BTreeSet, HashMap};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Default bootstrap qualifier
pub const DEFAULT_QUALIFIER: &str = "hnb659fds";

/// A synthesized CloudFormation template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Resources in declaration order
    #[serde(default)]
    pub resources: IndexMap<String, TemplateResource>,
    /// Assets referenced by the resources (not part of the template body)
    #[serde(skip)]
    pub assets: Vec<AssetEntry>,
}

/// A single entry of `Resources`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateResource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Json>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
}

impl Template {
    pub fn new(description: Option<String>) -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description,
            resources: IndexMap::new(),
            assets: Vec::new(),
        }
    }

    pub fn resource(&self, logical_id: &str) -> Option<&TemplateResource> {
        self.resources.get(logical_id)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Dependency edges recovered from `Ref`, `Fn::GetAtt` and `DependsOn`
    pub fn edges(&self) -> BTreeSet<Edge> {
        let mut edges = BTreeSet::new();
        for (id, resource) in &self.resources {
            let mut targets = BTreeSet::new();
            for value in resource.properties.values() {
                collect_targets(value, &mut targets);
            }
            targets.extend(resource.depends_on.iter().cloned());

            for target in targets {
                if target != *id && self.resources.contains_key(&target) {
                    edges.insert(Edge::new(id.as_str(), target));
                }
            }
        }
        edges
    }

    /// Provisioning levels; resources in the same wave have no dependency
    /// on each other.
    pub fn waves(&self) -> Result<Vec<Vec<String>>> {
        let nodes: Vec<LogicalId> = self.resources.keys().map(|id| LogicalId::new(id.as_str())).collect();
        let order = topological_order(&nodes, &self.edges()).map_err(|cycle| {
            SynthError::InvalidTemplate(format!(
                "Circular dependency: {}",
                cycle.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(" -> ")
            ))
        })?;
        Ok(order
            .waves
            .into_iter()
            .map(|wave| wave.into_iter().map(|id| id.to_string()).collect())
            .collect())
    }
}

fn collect_targets(value: &Json, out: &mut BTreeSet<String>) {
    match value {
        Json::Object(map) => {
            if let Some(Json::String(target)) = map.get("Ref")
                && map.len() == 1
                && !target.starts_with("AWS::")
            {
                out.insert(target.clone());
                return;
            }
            if let Some(Json::Array(parts)) = map.get("Fn::GetAtt")
                && map.len() == 1
                && let Some(Json::String(target)) = parts.first()
            {
                out.insert(target.clone());
                return;
            }
            for nested in map.values() {
                collect_targets(nested, out);
            }
        }
        Json::Array(items) => {
            for item in items {
                collect_targets(item, out);
            }
        }
        _ => {}
    }
}

/// Turns an assembled stack into a deployable template
pub trait Synthesizer {
    fn synthesize(&self, stack: &Stack) -> Result<Template>;
}

/// CloudFormation synthesizer using the default bootstrap staging bucket
#[derive(Debug, Clone)]
pub struct CloudFormationSynthesizer {
    qualifier: String,
}

impl Default for CloudFormationSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudFormationSynthesizer {
    pub fn new() -> Self {
        Self {
            qualifier: DEFAULT_QUALIFIER.to_string(),
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    /// `cdk-<qualifier>-assets-${AWS::AccountId}-${AWS::Region}`
    pub fn staging_bucket_template(&self) -> String {
        format!(
            "cdk-{}-assets-${{AWS::AccountId}}-${{AWS::Region}}",
            self.qualifier
        )
    }

    fn staging_bucket(&self, environment: &Environment) -> Json {
        match (&environment.account, &environment.region) {
            (Some(account), Some(region)) => Json::String(format!(
                "cdk-{}-assets-{}-{}",
                self.qualifier, account, region
            )),
            _ => json!({ "Fn::Sub": self.staging_bucket_template() }),
        }
    }
}

impl Synthesizer for CloudFormationSynthesizer {
    #[tracing::instrument(skip_all, fields(stack = %stack.name()))]
    fn synthesize(&self, stack: &Stack) -> Result<Template> {
        // a stack is synthesized exactly once
        if stack.state() != StackState::Assembled {
            return Err(SynthError::InvalidState {
                stack: stack.name().to_string(),
                state: stack.state().to_string(),
            });
        }

        let mut template = Template::new(stack.description().map(str::to_string));

        let mut assets = HashMap::new();
        for source in stack.assets() {
            let entry = AssetEntry::from_source(source)?;
            tracing::debug!(asset = %entry.id, hash = %entry.hash, "Hashed asset");
            assets.insert(entry.id.clone(), entry);
        }

        let resolver = Resolver {
            environment: stack.environment(),
            assets: &assets,
            staging_bucket: self.staging_bucket(stack.environment()),
        };

        for descriptor in stack.descriptors() {
            let resource = resolver.resource(stack, descriptor)?;
            template
                .resources
                .insert(descriptor.logical_id().to_string(), resource);
        }

        template.assets = stack
            .assets()
            .filter_map(|source| assets.get(&source.id).cloned())
            .collect();

        tracing::info!(
            resources = template.resources.len(),
            assets = template.assets.len(),
            "Template synthesized"
        );
        Ok(template)
    }
}

struct Resolver<'a> {
    environment: &'a Environment,
    assets: &'a HashMap<String, AssetEntry>,
    staging_bucket: Json,
}

impl Resolver<'_> {
    fn resource(&self, stack: &Stack, descriptor: &Descriptor) -> Result<TemplateResource> {
        let id = descriptor.logical_id();

        let mut properties = Map::new();
        for (key, value) in descriptor.properties() {
            properties.insert(key.clone(), self.resolve(id, value)?);
        }

        // DependsOn only carries edges that no reference already implies
        let referenced: BTreeSet<&LogicalId> =
            descriptor.references().into_iter().map(|r| &r.target).collect();
        let depends_on = stack
            .dependencies_of(id)
            .filter(|target| !referenced.contains(target))
            .map(|target| target.to_string())
            .collect();

        let policy = descriptor.removal_policy().map(|p| p.cfn_value().to_string());

        Ok(TemplateResource {
            resource_type: descriptor.kind().to_string(),
            properties,
            depends_on,
            deletion_policy: policy.clone(),
            update_replace_policy: policy,
        })
    }

    fn resolve(&self, id: &LogicalId, value: &Value) -> Result<Json> {
        Ok(match value {
            Value::Literal(json) => json.clone(),
            Value::Deferred(reference) => match &reference.attribute {
                Attribute::Ref => json!({ "Ref": reference.target.as_str() }),
                Attribute::GetAtt(name) => {
                    json!({ "Fn::GetAtt": [reference.target.as_str(), name] })
                }
            },
            Value::Pseudo(parameter) => self.pseudo(*parameter),
            Value::Asset(asset) => {
                let entry = self.assets.get(&asset.asset).ok_or_else(|| {
                    SynthError::UnknownAsset {
                        asset: asset.asset.clone(),
                        logical_id: id.to_string(),
                    }
                })?;
                match asset.part {
                    AssetPart::BucketName => self.staging_bucket.clone(),
                    AssetPart::ObjectKey => Json::String(entry.object_key()),
                }
            }
            Value::List(items) => Json::Array(
                items
                    .iter()
                    .map(|item| self.resolve(id, item))
                    .collect::<Result<_>>()?,
            ),
            Value::Map(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(key, item)| Ok((key.clone(), self.resolve(id, item)?)))
                    .collect::<Result<_>>()?,
            ),
            Value::Join { separator, parts } => {
                let parts = parts
                    .iter()
                    .map(|part| self.resolve(id, part))
                    .collect::<Result<Vec<_>>>()?;
                join(separator, parts)
            }
        })
    }

    fn pseudo(&self, parameter: PseudoParameter) -> Json {
        let concrete = match parameter {
            PseudoParameter::AccountId => self.environment.account.clone(),
            PseudoParameter::Region => self.environment.region.clone(),
            PseudoParameter::Partition => self
                .environment
                .region
                .as_deref()
                .map(|region| partition_for(region).to_string()),
            PseudoParameter::UrlSuffix => self.environment.region.as_deref().map(|region| {
                if region.starts_with("cn-") {
                    "amazonaws.com.cn".to_string()
                } else {
                    "amazonaws.com".to_string()
                }
            }),
            PseudoParameter::StackName => None,
        };
        match concrete {
            Some(value) => Json::String(value),
            None => json!({ "Ref": parameter.cfn_name() }),
        }
    }
}

fn partition_for(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else {
        "aws"
    }
}

/// Adjacent literal parts are merged; a fully literal join becomes a string.
fn join(separator: &str, parts: Vec<Json>) -> Json {
    let mut merged: Vec<Json> = Vec::new();
    for part in parts {
        if let (Some(Json::String(previous)), Json::String(next)) = (merged.last_mut(), &part) {
            previous.push_str(separator);
            previous.push_str(next);
            continue;
        }
        merged.push(part);
    }

    match merged.as_slice() {
        [] => Json::String(String::new()),
        [Json::String(single)] => Json::String(single.clone()),
        _ => json!({ "Fn::Join": [separator, merged] }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_core::{AssetSource, RemovalPolicy, ResourceDraft, StackBuilder};

    fn function(id: &str) -> ResourceDraft {
        ResourceDraft::new(id, "AWS::Lambda::Function")
            .property("Runtime", "python3.9")
            .property("Handler", "index.lambda_handler")
            .property("Code", Value::map([("ZipFile", Value::string("pass"))]))
    }

    #[test]
    fn test_references_and_depends_on() {
        let mut builder = StackBuilder::new("Demo", Environment::agnostic());
        let role = builder
            .add(ResourceDraft::new("Role", "AWS::IAM::Role").property(
                "AssumeRolePolicyDocument",
                Value::map([("Statement", Value::List(vec![]))]),
            ))
            .unwrap();
        builder
            .add(ResourceDraft::new("Logs", "AWS::Logs::LogGroup"))
            .unwrap();
        builder
            .add(
                function("Fn")
                    .property("Role", role.attribute("Arn"))
                    .depends_on("Role")
                    .depends_on("Logs"),
            )
            .unwrap();

        let stack = builder.assemble().unwrap();
        let template = CloudFormationSynthesizer::new().synthesize(&stack).unwrap();

        let resource = template.resource("Fn").unwrap();
        assert_eq!(resource.properties["Role"], json!({ "Fn::GetAtt": ["Role", "Arn"] }));
        assert_eq!(resource.depends_on, vec!["Logs".to_string()]);
        assert_eq!(
            template.resources.keys().collect::<Vec<_>>(),
            vec!["Role", "Logs", "Fn"]
        );
    }

    #[test]
    fn test_pseudo_parameters() {
        let agnostic = Resolver {
            environment: &Environment::agnostic(),
            assets: &HashMap::new(),
            staging_bucket: Json::Null,
        };
        assert_eq!(agnostic.pseudo(PseudoParameter::Region), json!({ "Ref": "AWS::Region" }));

        let environment = Environment::new("123456789012", "cn-north-1");
        let concrete = Resolver {
            environment: &environment,
            assets: &HashMap::new(),
            staging_bucket: Json::Null,
        };
        assert_eq!(concrete.pseudo(PseudoParameter::Region), json!("cn-north-1"));
        assert_eq!(concrete.pseudo(PseudoParameter::Partition), json!("aws-cn"));
        assert_eq!(
            concrete.pseudo(PseudoParameter::StackName),
            json!({ "Ref": "AWS::StackName" })
        );
    }

    #[test]
    fn test_join_collapses_literals() {
        let mut builder = StackBuilder::new("Demo", Environment::new("123456789012", "us-east-1"));
        let role = builder
            .add(ResourceDraft::new("Role", "AWS::IAM::Role").property(
                "AssumeRolePolicyDocument",
                Value::map([("Statement", Value::List(vec![]))]),
            ))
            .unwrap();
        let literal = Value::join(
            "",
            vec![Value::string("arn:"), builder.partition(), Value::string(":s3:::bucket")],
        );
        let deferred = Value::join("/", vec![Value::string("role"), role.reference()]);
        builder
            .add(
                ResourceDraft::new("Policy", "AWS::IAM::Policy")
                    .property("PolicyDocument", literal)
                    .property("PolicyName", deferred),
            )
            .unwrap();

        let stack = builder.assemble().unwrap();
        let template = CloudFormationSynthesizer::new().synthesize(&stack).unwrap();
        let policy = template.resource("Policy").unwrap();

        assert_eq!(policy.properties["PolicyDocument"], json!("arn:aws:s3:::bucket"));
        assert_eq!(
            policy.properties["PolicyName"],
            json!({ "Fn::Join": ["/", ["role", { "Ref": "Role" }]] })
        );
    }

    #[test]
    fn test_removal_policy() {
        let mut builder = StackBuilder::new("Demo", Environment::agnostic());
        builder
            .add(ResourceDraft::new("Bucket", "AWS::S3::Bucket").removal_policy(RemovalPolicy::Destroy))
            .unwrap();

        let stack = builder.assemble().unwrap();
        let template = CloudFormationSynthesizer::new().synthesize(&stack).unwrap();
        let bucket = template.resource("Bucket").unwrap();
        assert_eq!(bucket.deletion_policy.as_deref(), Some("Delete"));
        assert_eq!(bucket.update_replace_policy.as_deref(), Some("Delete"));

        let json: Json = serde_json::from_str(&template.to_json().unwrap()).unwrap();
        assert_eq!(json["AWSTemplateFormatVersion"], "2010-09-09");
        assert!(json["Resources"]["Bucket"].get("Properties").is_none());
    }

    #[test]
    fn test_assets_resolve_to_staging_location() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.py"), "def lambda_handler(e, c): pass").unwrap();

        let mut builder = StackBuilder::new("Demo", Environment::agnostic());
        let asset = builder.add_asset(AssetSource::zip("FnCode", dir.path())).unwrap();
        builder
            .add(
                ResourceDraft::new("Fn", "AWS::Lambda::Function")
                    .property("Runtime", "python3.9")
                    .property("Handler", "index.lambda_handler")
                    .property(
                        "Code",
                        Value::map([("S3Bucket", asset.bucket_name()), ("S3Key", asset.object_key())]),
                    ),
            )
            .unwrap();

        let stack = builder.assemble().unwrap();
        let template = CloudFormationSynthesizer::new().synthesize(&stack).unwrap();
        let hash = &template.assets[0].hash;

        assert_eq!(
            template.resource("Fn").unwrap().properties["Code"],
            json!({
                "S3Bucket": { "Fn::Sub": "cdk-hnb659fds-assets-${AWS::AccountId}-${AWS::Region}" },
                "S3Key": format!("{}.zip", hash),
            })
        );
    }

    #[test]
    fn test_synthesized_stack_is_rejected() {
        let mut builder = StackBuilder::new("Demo", Environment::agnostic());
        builder.add(function("Fn")).unwrap();
        let mut stack = builder.assemble().unwrap();

        let synthesizer = CloudFormationSynthesizer::new();
        synthesizer.synthesize(&stack).unwrap();
        stack.mark_synthesized().unwrap();

        let err = synthesizer.synthesize(&stack).unwrap_err();
        assert!(matches!(
            err,
            SynthError::InvalidState { ref state, .. } if state == "synthesized"
        ));
    }

    #[test]
    fn test_missing_asset_path_fails() {
        let mut builder = StackBuilder::new("Demo", Environment::agnostic());
        builder
            .add_asset(AssetSource::zip("FnCode", "/definitely/not/here"))
            .unwrap();
        let stack = builder.assemble().unwrap();

        let err = CloudFormationSynthesizer::new().synthesize(&stack).unwrap_err();
        assert!(matches!(err, SynthError::AssetNotFound(_)));
    }

    #[test]
    fn test_template_edges_and_waves() {
        let mut builder = StackBuilder::new("Demo", Environment::agnostic());
        let first = builder.add(function("First")).unwrap();
        builder
            .add(function("Second").property("Environment", first.attribute("Arn")))
            .unwrap();
        builder.add(function("Third").depends_on("Second")).unwrap();

        let stack = builder.assemble().unwrap();
        let template = CloudFormationSynthesizer::new().synthesize(&stack).unwrap();

        assert_eq!(template.edges().len(), 2);
        assert_eq!(
            template.waves().unwrap(),
            vec![vec!["First".to_string()], vec!["Second".to_string()], vec!["Third".to_string()]]
        );

        let reparsed = Template::from_json(&template.to_json().unwrap()).unwrap();
        assert_eq!(reparsed.edges(), template.edges());
    }
}
