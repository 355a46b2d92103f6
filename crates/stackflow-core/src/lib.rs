//! StackFlow Core
//!
//! 宣言的なAWSリソースグラフを組み立てるためのコアクレート。
//!
//! - [`model`]: 記述子、遅延参照、スタック
//! - [`builder`]: 参照解決と依存グラフの検証（`StackBuilder` → `Stack`）
//! - [`parser`] / [`loader`]: KDLプロジェクト定義の読み込み

pub mod blueprint;
pub mod builder;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod kind;
pub mod loader;
pub mod model;
pub mod parser;
pub mod template;

pub use blueprint::{Blueprint, BlueprintRegistry, BuildContext};
pub use builder::{AssetHandle, ResourceHandle, StackBuilder};
pub use discovery::{DiscoveredFiles, discover_files, find_project_root};
pub use error::{Result, StackError};
pub use kind::{KindRegistry, KindSchema};
pub use loader::{build_named_stack, build_stack, build_stacks, load_project, load_project_from_root};
pub use model::*;
pub use parser::{parse_kdl_file, parse_kdl_string};
pub use template::TemplateProcessor;
