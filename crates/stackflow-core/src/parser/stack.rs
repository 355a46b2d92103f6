//! スタックノードのパース

use super::value::{
    first_string, kdl_to_json, named_entries, node_to_json, parse_value, string_arguments,
};
use crate::error::{Result, StackError};
use crate::model::{
    BlueprintDefinition, Environment, LogicalId, RemovalPolicy, ResourceDraft, StackDefinition,
    StackItem,
};
use kdl::KdlNode;

/// env ノードをパース
///
/// 例: `env account="123456789012" region="us-east-1"`
pub fn parse_env(node: &KdlNode) -> Environment {
    let mut env = Environment::default();
    for (key, value) in named_entries(node) {
        match key {
            "account" => env.account = value.as_string().map(|s| s.to_string()),
            "region" => env.region = value.as_string().map(|s| s.to_string()),
            _ => {}
        }
    }
    // 子ノード形式にも対応: env { account "..."; region "..." }
    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "account" => env.account = first_string(child).map(|s| s.to_string()),
                "region" => env.region = first_string(child).map(|s| s.to_string()),
                _ => {}
            }
        }
    }
    env
}

/// stack ノードをパース
pub fn parse_stack(node: &KdlNode) -> Result<StackDefinition> {
    let name = first_string(node)
        .ok_or_else(|| StackError::InvalidConfig("stack requires a name".to_string()))?
        .to_string();

    let mut stack = StackDefinition::new(name);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "description" => {
                    stack.description = first_string(child).map(|s| s.to_string());
                }
                "env" => {
                    stack.environment = parse_env(child);
                }
                "resource" => {
                    stack.items.push(StackItem::Resource(parse_resource(child)?));
                }
                "blueprint" => {
                    stack.items.push(StackItem::Blueprint(parse_blueprint(child)?));
                }
                other => {
                    tracing::debug!(stack = %stack.name, node = %other, "Skipping unknown stack node");
                }
            }
        }
    }

    Ok(stack)
}

/// resource ノードをパース
///
/// 例:
/// ```kdl
/// resource "lexLogGroup" type="AWS::Logs::LogGroup" {
///     removal-policy "destroy"
///     properties {
///         RetentionInDays 7
///     }
/// }
/// ```
pub fn parse_resource(node: &KdlNode) -> Result<ResourceDraft> {
    let id = first_string(node)
        .ok_or_else(|| StackError::InvalidConfig("resource requires a logical id".to_string()))?;
    let kind = named_entries(node)
        .into_iter()
        .find(|(k, _)| *k == "type")
        .and_then(|(_, v)| v.as_string())
        .ok_or_else(|| {
            StackError::InvalidConfig(format!("resource '{}' requires type=\"...\"", id))
        })?;

    let mut draft = ResourceDraft::new(id, kind);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "depends-on" | "depends_on" => {
                    for target in string_arguments(child) {
                        draft.depends_on.insert(LogicalId::new(target));
                    }
                }
                "removal-policy" | "removal_policy" => {
                    let policy = first_string(child).ok_or_else(|| {
                        StackError::InvalidConfig(format!(
                            "resource '{}': removal-policy requires a value",
                            id
                        ))
                    })?;
                    draft.removal_policy = Some(
                        policy
                            .parse::<RemovalPolicy>()
                            .map_err(|e| StackError::InvalidConfig(format!("resource '{}': {}", id, e)))?,
                    );
                }
                "properties" => {
                    if let Some(props) = child.children() {
                        for prop in props.nodes() {
                            draft
                                .properties
                                .insert(prop.name().value().to_string(), parse_value(prop)?);
                        }
                    }
                }
                // その他の子ノードはプロパティとして扱う
                other => {
                    draft
                        .properties
                        .insert(other.to_string(), parse_value(child)?);
                }
            }
        }
    }

    Ok(draft)
}

/// blueprint ノードをパース
pub fn parse_blueprint(node: &KdlNode) -> Result<BlueprintDefinition> {
    let kind = first_string(node)
        .ok_or_else(|| StackError::InvalidConfig("blueprint requires a name".to_string()))?;

    let mut definition = BlueprintDefinition::new(kind);
    for (key, value) in named_entries(node) {
        definition.params.insert(key.to_string(), kdl_to_json(value));
    }
    if let Some(children) = node.children() {
        for child in children.nodes() {
            definition
                .params
                .insert(child.name().value().to_string(), node_to_json(child));
        }
    }
    Ok(definition)
}
