//! リソース記述子

use super::value::{Properties, Reference, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// CloudFormation の論理ID上限
const MAX_LOGICAL_ID_LEN: usize = 255;

/// スタック内で一意なリソースの論理ID
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 英数字のみ・255文字以内であることを検証
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.0.is_empty() {
            return Err("論理IDが空です".to_string());
        }
        if self.0.len() > MAX_LOGICAL_ID_LEN {
            return Err(format!(
                "論理IDは{}文字以内である必要があります（{}文字）",
                MAX_LOGICAL_ID_LEN,
                self.0.len()
            ));
        }
        if let Some(c) = self.0.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(format!("論理IDに使用できない文字が含まれています: '{}'", c));
        }
        Ok(())
    }
}

impl std::fmt::Display for LogicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for LogicalId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// スタック削除・置換時のリソースの扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    Destroy,
    Retain,
    Snapshot,
}

impl RemovalPolicy {
    /// `DeletionPolicy` / `UpdateReplacePolicy` の値
    pub fn cfn_value(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Snapshot => "Snapshot",
        }
    }
}

impl std::str::FromStr for RemovalPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "destroy" | "delete" => Ok(RemovalPolicy::Destroy),
            "retain" => Ok(RemovalPolicy::Retain),
            "snapshot" => Ok(RemovalPolicy::Snapshot),
            other => Err(format!("不明な削除ポリシー: {}", other)),
        }
    }
}

/// 登録前のリソース定義
///
/// `StackBuilder::add` に渡すと検証され、不変な [`Descriptor`] になります。
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDraft {
    pub logical_id: LogicalId,
    pub kind: String,
    pub properties: Properties,
    pub depends_on: BTreeSet<LogicalId>,
    pub removal_policy: Option<RemovalPolicy>,
}

impl ResourceDraft {
    pub fn new(logical_id: impl Into<LogicalId>, kind: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind: kind.into(),
            properties: Properties::new(),
            depends_on: BTreeSet::new(),
            removal_policy: None,
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// `None` の場合はプロパティを設定しない
    pub fn property_opt(self, key: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.property(key, v),
            None => self,
        }
    }

    pub fn depends_on(mut self, target: impl Into<LogicalId>) -> Self {
        self.depends_on.insert(target.into());
        self
    }

    pub fn removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }
}

/// 1つのクラウドリソースの不変な記述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    logical_id: LogicalId,
    kind: String,
    properties: Properties,
    depends_on: BTreeSet<LogicalId>,
    removal_policy: Option<RemovalPolicy>,
}

impl Descriptor {
    pub(crate) fn from_draft(draft: ResourceDraft) -> Self {
        Self {
            logical_id: draft.logical_id,
            kind: draft.kind,
            properties: draft.properties,
            depends_on: draft.depends_on,
            removal_policy: draft.removal_policy,
        }
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    /// リソース種別（`AWS::Lambda::Function` など）
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// 明示的に宣言された依存先
    pub fn depends_on(&self) -> &BTreeSet<LogicalId> {
        &self.depends_on
    }

    pub fn removal_policy(&self) -> Option<RemovalPolicy> {
        self.removal_policy
    }

    /// プロパティ内の全ての遅延参照
    pub fn references(&self) -> Vec<&Reference> {
        self.properties.values().flat_map(Value::references).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_id_validation() {
        assert!(LogicalId::new("lexCodeHook").validate().is_ok());
        assert!(LogicalId::new("Bucket01").validate().is_ok());
        assert!(LogicalId::new("").validate().is_err());
        assert!(LogicalId::new("lex-role").validate().is_err());
        assert!(LogicalId::new("a".repeat(256)).validate().is_err());
    }

    #[test]
    fn test_removal_policy_parse() {
        assert_eq!("destroy".parse::<RemovalPolicy>(), Ok(RemovalPolicy::Destroy));
        assert_eq!("Retain".parse::<RemovalPolicy>(), Ok(RemovalPolicy::Retain));
        assert!("keep".parse::<RemovalPolicy>().is_err());
        assert_eq!(RemovalPolicy::Destroy.cfn_value(), "Delete");
    }

    #[test]
    fn test_draft_collects_references() {
        let draft = ResourceDraft::new("Bot", "AWS::Lex::Bot").property(
            "RoleArn",
            Value::Deferred(Reference {
                target: LogicalId::new("BotRole"),
                attribute: super::super::value::Attribute::GetAtt("Arn".to_string()),
            }),
        );
        let descriptor = Descriptor::from_draft(draft);
        let refs = descriptor.references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target.as_str(), "BotRole");
    }
}
