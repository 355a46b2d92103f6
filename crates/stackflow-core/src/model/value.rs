//! プロパティ値
//!
//! プロビジョニング後にしか決まらない値（Deferred Reference）を
//! リテラル値と同じツリーの中でタグ付きバリアントとして表現します。

use super::descriptor::LogicalId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// リソースのプロパティバッグ
pub type Properties = BTreeMap<String, Value>;

/// プロパティ値
///
/// Deferred / Pseudo / Asset は合成時（synthesis）に一度だけ解決されます。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// その場で確定している値
    Literal(serde_json::Value),
    /// 別リソースの属性への遅延参照
    Deferred(Reference),
    /// アカウントIDやリージョンなどの擬似パラメータ
    Pseudo(PseudoParameter),
    /// アセット（Lambdaコードなど）のステージング先
    Asset(AssetReference),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// 区切り文字で連結される値（ARNの組み立てなど）
    Join { separator: String, parts: Vec<Value> },
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Literal(serde_json::Value::String(s.into()))
    }

    pub fn bool(b: bool) -> Self {
        Value::Literal(serde_json::Value::Bool(b))
    }

    pub fn int(n: i64) -> Self {
        Value::Literal(serde_json::Value::from(n))
    }

    pub fn null() -> Self {
        Value::Literal(serde_json::Value::Null)
    }

    /// 任意の `Serialize` 型からリテラル値を作成
    pub fn from_serialize<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        serde_json::to_value(value).map(Value::Literal)
    }

    pub fn join(separator: impl Into<String>, parts: Vec<Value>) -> Self {
        Value::Join {
            separator: separator.into(),
            parts,
        }
    }

    /// キーと値のペアからマップを作成
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Literal(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// 値がプロビジョニング前に確定しているか
    pub fn is_resolved(&self) -> bool {
        match self {
            Value::Literal(_) => true,
            Value::Deferred(_) | Value::Pseudo(_) | Value::Asset(_) => false,
            Value::List(items) => items.iter().all(Value::is_resolved),
            Value::Map(entries) => entries.values().all(Value::is_resolved),
            Value::Join { parts, .. } => parts.iter().all(Value::is_resolved),
        }
    }

    /// ネストした値も含め、全ての遅延参照を列挙
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Value::Deferred(reference) => out.push(reference),
            Value::List(items) | Value::Join { parts: items, .. } => {
                for item in items {
                    item.collect_references(out);
                }
            }
            Value::Map(entries) => {
                for value in entries.values() {
                    value.collect_references(out);
                }
            }
            Value::Literal(_) | Value::Pseudo(_) | Value::Asset(_) => {}
        }
    }

    /// ネストした値も含め、全てのアセット参照を列挙
    pub fn assets(&self) -> Vec<&AssetReference> {
        let mut out = Vec::new();
        self.collect_assets(&mut out);
        out
    }

    fn collect_assets<'a>(&'a self, out: &mut Vec<&'a AssetReference>) {
        match self {
            Value::Asset(asset) => out.push(asset),
            Value::List(items) | Value::Join { parts: items, .. } => {
                for item in items {
                    item.collect_assets(out);
                }
            }
            Value::Map(entries) => {
                for value in entries.values() {
                    value.collect_assets(out);
                }
            }
            Value::Literal(_) | Value::Pseudo(_) | Value::Deferred(_) => {}
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Literal(serde_json::Value::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Literal(serde_json::Value::from(n))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Literal(v)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::Deferred(r)
    }
}

impl From<PseudoParameter> for Value {
    fn from(p: PseudoParameter) -> Self {
        Value::Pseudo(p)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// 遅延参照: 「リソースYの属性X」
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// 参照先リソース
    pub target: LogicalId,
    /// 参照する属性
    pub attribute: Attribute,
}

/// 参照する属性
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// リソースの主識別子（CloudFormation の `Ref`）
    Ref,
    /// 名前付き属性（CloudFormation の `Fn::GetAtt`）
    GetAtt(String),
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.attribute {
            Attribute::Ref => write!(f, "{}", self.target),
            Attribute::GetAtt(name) => write!(f, "{}.{}", self.target, name),
        }
    }
}

/// 擬似パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PseudoParameter {
    AccountId,
    Region,
    Partition,
    StackName,
    UrlSuffix,
}

impl PseudoParameter {
    /// CloudFormation 上の名前（`AWS::Region` など）
    pub fn cfn_name(&self) -> &'static str {
        match self {
            PseudoParameter::AccountId => "AWS::AccountId",
            PseudoParameter::Region => "AWS::Region",
            PseudoParameter::Partition => "AWS::Partition",
            PseudoParameter::StackName => "AWS::StackName",
            PseudoParameter::UrlSuffix => "AWS::URLSuffix",
        }
    }

    pub fn from_cfn_name(name: &str) -> Option<Self> {
        match name {
            "AWS::AccountId" => Some(PseudoParameter::AccountId),
            "AWS::Region" => Some(PseudoParameter::Region),
            "AWS::Partition" => Some(PseudoParameter::Partition),
            "AWS::StackName" => Some(PseudoParameter::StackName),
            "AWS::URLSuffix" => Some(PseudoParameter::UrlSuffix),
            _ => None,
        }
    }
}

/// アセットのステージング先への参照
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetReference {
    pub asset: String,
    pub part: AssetPart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetPart {
    /// ステージングバケット名
    BucketName,
    /// バケット内のオブジェクトキー
    ObjectKey,
}
