//! プロジェクト定義（KDLから読み込まれる宣言）

use super::descriptor::ResourceDraft;
use super::stack::Environment;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// プロジェクト - 複数のスタック宣言をまとめたもの
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectDefinition {
    /// アプリ名
    pub app: String,
    /// プロジェクト共通のデプロイ先
    pub environment: Environment,
    /// プロジェクト共通の変数
    pub variables: HashMap<String, String>,
    /// 宣言順のスタック
    pub stacks: Vec<StackDefinition>,
}

impl ProjectDefinition {
    pub fn stack(&self, name: &str) -> Option<&StackDefinition> {
        self.stacks.iter().find(|s| s.name == name)
    }
}

/// スタック宣言
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackDefinition {
    pub name: String,
    pub description: Option<String>,
    /// スタック固有のデプロイ先（未指定項目はプロジェクト設定で補完）
    pub environment: Environment,
    /// 宣言順の要素
    pub items: Vec<StackItem>,
}

impl StackDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceDraft> {
        self.items.iter().filter_map(|item| match item {
            StackItem::Resource(draft) => Some(draft),
            StackItem::Blueprint(_) => None,
        })
    }

    pub fn blueprints(&self) -> impl Iterator<Item = &BlueprintDefinition> {
        self.items.iter().filter_map(|item| match item {
            StackItem::Blueprint(bp) => Some(bp),
            StackItem::Resource(_) => None,
        })
    }
}

/// スタック内の宣言要素
#[derive(Debug, Clone, PartialEq)]
pub enum StackItem {
    /// 生のリソース宣言
    Resource(ResourceDraft),
    /// ブループリントの展開
    Blueprint(BlueprintDefinition),
}

/// ブループリント呼び出し
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlueprintDefinition {
    /// ブループリント名（lex-va など）
    pub kind: String,
    /// パラメータ（KDLのプロパティと子ノード）
    pub params: BTreeMap<String, serde_json::Value>,
}

impl BlueprintDefinition {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// パラメータを型付きで取得
    pub fn get_param<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.params
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
