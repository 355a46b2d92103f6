//! プロパティ値ノードのパース
//!
//! - 引数1つ → スカラー、複数 → リスト
//! - 子ノード → マップ（全て `-` ならリスト）
//! - 子ノードが組み込み関数1つだけ → 遅延値（ref / get-att / join / pseudo / asset）

use crate::error::{Result, StackError};
use crate::model::{
    AssetPart, AssetReference, Attribute, LogicalId, PseudoParameter, Reference, Value,
};
use kdl::{KdlEntry, KdlNode, KdlValue};
use std::collections::BTreeMap;

const LIST_ITEM: &str = "-";
const INTRINSICS: &[&str] = &["ref", "get-att", "join", "pseudo", "asset"];

/// KDLの値をJSON値に変換
pub(crate) fn kdl_to_json(value: &KdlValue) -> serde_json::Value {
    match value {
        KdlValue::String(s) => serde_json::Value::String(s.clone()),
        KdlValue::Integer(i) => match i64::try_from(*i) {
            Ok(n) => serde_json::Value::from(n),
            Err(_) => serde_json::Value::String(i.to_string()),
        },
        KdlValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        KdlValue::Bool(b) => serde_json::Value::Bool(*b),
        KdlValue::Null => serde_json::Value::Null,
    }
}

/// 位置引数（名前なしエントリ）
pub(crate) fn arguments(node: &KdlNode) -> Vec<&KdlEntry> {
    node.entries().iter().filter(|e| e.name().is_none()).collect()
}

/// 名前付きプロパティ
pub(crate) fn named_entries(node: &KdlNode) -> Vec<(&str, &KdlValue)> {
    node.entries()
        .iter()
        .filter_map(|e| e.name().map(|n| (n.value(), e.value())))
        .collect()
}

/// 最初の位置引数を文字列として取得
pub(crate) fn first_string(node: &KdlNode) -> Option<&str> {
    arguments(node).first().and_then(|e| e.value().as_string())
}

/// 全ての位置引数を文字列として取得
pub(crate) fn string_arguments(node: &KdlNode) -> Vec<String> {
    arguments(node)
        .iter()
        .filter_map(|e| e.value().as_string().map(|s| s.to_string()))
        .collect()
}

fn child_nodes(node: &KdlNode) -> &[KdlNode] {
    node.children().map(|c| c.nodes()).unwrap_or(&[])
}

fn is_intrinsic(node: &KdlNode) -> bool {
    INTRINSICS.contains(&node.name().value())
}

/// プロパティノードを値に変換
pub fn parse_value(node: &KdlNode) -> Result<Value> {
    let args = arguments(node);
    let named = named_entries(node);

    if let Some(children) = node.children() {
        let nodes = children.nodes();

        if nodes.len() == 1 && is_intrinsic(&nodes[0]) && args.is_empty() && named.is_empty() {
            return parse_intrinsic(&nodes[0]);
        }

        if !nodes.is_empty() && nodes.iter().all(|n| n.name().value() == LIST_ITEM) {
            let items = nodes.iter().map(parse_value).collect::<Result<Vec<_>>>()?;
            return Ok(Value::List(items));
        }

        let mut map = BTreeMap::new();
        for (key, value) in named {
            map.insert(key.to_string(), Value::Literal(kdl_to_json(value)));
        }
        for child in nodes {
            map.insert(child.name().value().to_string(), parse_value(child)?);
        }
        return Ok(Value::Map(map));
    }

    if !named.is_empty() && args.is_empty() {
        let map = named
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::Literal(kdl_to_json(v))))
            .collect();
        return Ok(Value::Map(map));
    }

    match args.as_slice() {
        [] => Ok(Value::null()),
        [single] => Ok(Value::Literal(kdl_to_json(single.value()))),
        many => Ok(Value::List(
            many.iter()
                .map(|e| Value::Literal(kdl_to_json(e.value())))
                .collect(),
        )),
    }
}

/// 組み込み関数ノードを遅延値に変換
fn parse_intrinsic(node: &KdlNode) -> Result<Value> {
    let args = string_arguments(node);
    match node.name().value() {
        "ref" => {
            let [target] = args.as_slice() else {
                return Err(invalid(node, "ref requires exactly one target"));
            };
            if let Some(pseudo) = PseudoParameter::from_cfn_name(target) {
                return Ok(Value::Pseudo(pseudo));
            }
            Ok(Value::Deferred(Reference {
                target: LogicalId::new(target.as_str()),
                attribute: Attribute::Ref,
            }))
        }
        "get-att" => {
            let (target, attribute) = match args.as_slice() {
                [target, attribute] => (target.clone(), attribute.clone()),
                [dotted] => match dotted.split_once('.') {
                    Some((t, a)) => (t.to_string(), a.to_string()),
                    None => return Err(invalid(node, "get-att requires a target and an attribute")),
                },
                _ => return Err(invalid(node, "get-att requires a target and an attribute")),
            };
            Ok(Value::Deferred(Reference {
                target: LogicalId::new(target),
                attribute: Attribute::GetAtt(attribute),
            }))
        }
        "join" => {
            let separator = args.first().cloned().unwrap_or_default();
            let parts = child_nodes(node)
                .iter()
                .map(|child| {
                    if is_intrinsic(child) {
                        parse_intrinsic(child)
                    } else {
                        parse_value(child)
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::join(separator, parts))
        }
        "pseudo" => {
            let name = args
                .first()
                .ok_or_else(|| invalid(node, "pseudo requires a parameter name"))?;
            PseudoParameter::from_cfn_name(name)
                .map(Value::Pseudo)
                .ok_or_else(|| invalid(node, &format!("unknown pseudo parameter: {}", name)))
        }
        "asset" => {
            let (asset, part) = match args.as_slice() {
                [asset] => (asset.clone(), AssetPart::ObjectKey),
                [asset, part] => {
                    let part = match part.as_str() {
                        "object-key" | "key" => AssetPart::ObjectKey,
                        "bucket-name" | "bucket" => AssetPart::BucketName,
                        other => {
                            return Err(invalid(node, &format!("unknown asset part: {}", other)));
                        }
                    };
                    (asset.clone(), part)
                }
                _ => return Err(invalid(node, "asset requires an asset id")),
            };
            Ok(Value::Asset(AssetReference { asset, part }))
        }
        other => Err(invalid(node, &format!("unknown intrinsic: {}", other))),
    }
}

/// ノードをJSON値に変換（ブループリントのパラメータ用）
pub(crate) fn node_to_json(node: &KdlNode) -> serde_json::Value {
    let args = arguments(node);
    let children = child_nodes(node);

    if !children.is_empty() {
        if children.iter().all(|n| n.name().value() == LIST_ITEM) {
            return serde_json::Value::Array(children.iter().map(node_to_json).collect());
        }
        let mut map = serde_json::Map::new();
        for (key, value) in named_entries(node) {
            map.insert(key.to_string(), kdl_to_json(value));
        }
        for child in children {
            map.insert(child.name().value().to_string(), node_to_json(child));
        }
        return serde_json::Value::Object(map);
    }

    let named = named_entries(node);
    if !named.is_empty() && args.is_empty() {
        return serde_json::Value::Object(
            named
                .into_iter()
                .map(|(k, v)| (k.to_string(), kdl_to_json(v)))
                .collect(),
        );
    }

    match args.as_slice() {
        [] => serde_json::Value::Bool(true),
        [single] => kdl_to_json(single.value()),
        many => serde_json::Value::Array(many.iter().map(|e| kdl_to_json(e.value())).collect()),
    }
}

fn invalid(node: &KdlNode, message: &str) -> StackError {
    StackError::InvalidConfig(format!("{}: {}", node.name().value(), message))
}
