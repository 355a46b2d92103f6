//! ブループリント
//!
//! 名前付き・パラメータ付きのリソース群をスタックに追加する仕組み。
//! 実装は `stackflow-aws` などの外部クレートが提供します。

use crate::builder::StackBuilder;
use crate::error::{Result, StackError};
use crate::model::BlueprintDefinition;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// ブループリント展開時のコンテキスト
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// 相対パス（アセットなど）の基準ディレクトリ
    pub project_root: PathBuf,
}

impl BuildContext {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// プロジェクトルート基準でパスを解決
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}

/// ブループリントの抽象
pub trait Blueprint: Send + Sync {
    /// KDLの `blueprint "<name>"` で使う名前
    fn name(&self) -> &str;

    /// 説明（一覧表示用）
    fn description(&self) -> &str;

    /// リソースをビルダーに追加
    fn expand(
        &self,
        builder: &mut StackBuilder,
        definition: &BlueprintDefinition,
        context: &BuildContext,
    ) -> Result<()>;
}

/// 名前で引けるブループリントの集合
#[derive(Default)]
pub struct BlueprintRegistry {
    blueprints: BTreeMap<String, Box<dyn Blueprint>>,
}

impl BlueprintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, blueprint: impl Blueprint + 'static) {
        self.blueprints
            .insert(blueprint.name().to_string(), Box::new(blueprint));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Blueprint> {
        self.blueprints.get(name).map(|b| b.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blueprints.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Blueprint> {
        self.blueprints.values().map(|b| b.as_ref())
    }

    /// 定義に対応するブループリントを展開
    pub fn expand(
        &self,
        builder: &mut StackBuilder,
        definition: &BlueprintDefinition,
        context: &BuildContext,
    ) -> Result<()> {
        let blueprint = self
            .get(&definition.kind)
            .ok_or_else(|| StackError::UnknownBlueprint(definition.kind.clone()))?;
        tracing::debug!(blueprint = %definition.kind, stack = %builder.name(), "Expanding blueprint");
        blueprint.expand(builder, definition, context)
    }
}

impl std::fmt::Debug for BlueprintRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlueprintRegistry")
            .field("blueprints", &self.blueprints.keys().collect::<Vec<_>>())
            .finish()
    }
}
