//! スタック定義

use super::descriptor::{Descriptor, LogicalId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// デプロイ先のアカウント・リージョン
///
/// 未指定の値は合成時に擬似パラメータとして出力されます（環境非依存スタック）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Environment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            region: Some(region.into()),
        }
    }

    /// アカウント・リージョンとも未確定
    pub fn agnostic() -> Self {
        Self::default()
    }

    pub fn is_agnostic(&self) -> bool {
        self.account.is_none() && self.region.is_none()
    }

    /// 未設定の項目を `other` で補完
    pub fn or(self, other: &Environment) -> Self {
        Self {
            account: self.account.or_else(|| other.account.clone()),
            region: self.region.or_else(|| other.region.clone()),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region")
        )
    }
}

/// アセットのパッケージング方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Packaging {
    /// ディレクトリをzipにまとめる
    Zip,
    /// ファイルをそのままアップロード
    File,
}

/// ローカルファイルから作られるアセット
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSource {
    pub id: String,
    pub path: PathBuf,
    pub packaging: Packaging,
}

impl AssetSource {
    pub fn zip(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            packaging: Packaging::Zip,
        }
    }

    pub fn file(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            packaging: Packaging::File,
        }
    }
}

/// 依存エッジ: `from` は `to` のプロビジョニング完了後に作られる
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: LogicalId,
    pub to: LogicalId,
}

impl Edge {
    pub fn new(from: impl Into<LogicalId>, to: impl Into<LogicalId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// スタックのライフサイクル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackState {
    Unbuilt,
    Assembled,
    Synthesized,
}

impl std::fmt::Display for StackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackState::Unbuilt => write!(f, "unbuilt"),
            StackState::Assembled => write!(f, "assembled"),
            StackState::Synthesized => write!(f, "synthesized"),
        }
    }
}

/// 組み立て済みのスタック
///
/// `StackBuilder::assemble` だけが作成でき、全ての参照が解決済みで
/// 依存グラフが非巡回であることが保証されています。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stack {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) environment: Environment,
    pub(crate) descriptors: IndexMap<LogicalId, Descriptor>,
    pub(crate) edges: BTreeSet<Edge>,
    pub(crate) assets: IndexMap<String, AssetSource>,
    pub(crate) order: Vec<LogicalId>,
    pub(crate) waves: Vec<Vec<LogicalId>>,
    pub(crate) warnings: Vec<String>,
    pub(crate) state: StackState,
}

impl Stack {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn state(&self) -> StackState {
        self.state
    }

    /// 宣言順の記述子
    pub fn descriptors(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.values()
    }

    pub fn descriptor(&self, id: &str) -> Option<&Descriptor> {
        self.descriptors.get(&LogicalId::new(id))
    }

    pub fn contains(&self, id: &LogicalId) -> bool {
        self.descriptors.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn edges(&self) -> &BTreeSet<Edge> {
        &self.edges
    }

    /// `id` が直接依存しているリソース
    pub fn dependencies_of<'a>(&'a self, id: &'a LogicalId) -> impl Iterator<Item = &'a LogicalId> {
        self.edges.iter().filter(move |e| &e.from == id).map(|e| &e.to)
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetSource> {
        self.assets.values()
    }

    pub fn asset(&self, id: &str) -> Option<&AssetSource> {
        self.assets.get(id)
    }

    /// プロビジョニング順（トポロジカル順）
    pub fn deployment_order(&self) -> &[LogicalId] {
        &self.order
    }

    /// 並列にプロビジョニング可能なリソースのまとまり
    pub fn waves(&self) -> &[Vec<LogicalId>] {
        &self.waves
    }

    /// 組み立て時に記録された警告（未知の属性名など）
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// 合成済みとしてマーク（一度だけ遷移可能）
    pub fn mark_synthesized(&mut self) -> std::result::Result<(), StackState> {
        match self.state {
            StackState::Assembled => {
                self.state = StackState::Synthesized;
                Ok(())
            }
            other => Err(other),
        }
    }
}
