//! KDLパーサー
//!
//! StackFlowのKDL設定ファイルをパースします。
//! 各ノードタイプのパース処理はモジュールに分離されています。

mod stack;
mod value;

use stack::{parse_env, parse_stack};

// 外部クレートから再利用可能なパース関数
pub use stack::{parse_blueprint, parse_resource};
pub use value::parse_value;
pub(crate) use value::kdl_to_json;

use crate::error::Result;
use crate::model::{ProjectDefinition, StackDefinition};
use kdl::KdlDocument;
use std::fs;
use std::path::Path;

/// KDLファイルをパースしてProjectDefinitionを生成
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<ProjectDefinition> {
    let content = fs::read_to_string(path.as_ref())?;
    let name = path
        .as_ref()
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_kdl_string(&content, name)
}

/// KDL文字列をパース
pub fn parse_kdl_string(content: &str, default_name: String) -> Result<ProjectDefinition> {
    let doc: KdlDocument = content.parse()?;

    let mut project = ProjectDefinition {
        app: default_name,
        ..Default::default()
    };

    for node in doc.nodes() {
        match node.name().value() {
            "app" => {
                if let Some(app_name) = node.entries().first().and_then(|e| e.value().as_string())
                {
                    project.app = app_name.to_string();
                }
            }
            "env" => {
                let env = parse_env(node);
                project.environment = env.or(&project.environment);
            }
            "variables" => {
                // プロジェクトレベルの共通変数
                if let Some(vars) = node.children() {
                    for var in vars.nodes() {
                        let key = var.name().value().to_string();
                        let value = match var.entries().first().map(|e| e.value()) {
                            Some(v) => match kdl_to_json(v) {
                                serde_json::Value::String(s) => s,
                                other => other.to_string(),
                            },
                            None => String::new(),
                        };
                        project.variables.insert(key, value);
                    }
                }
            }
            "stack" => {
                let stack = parse_stack(node)?;
                merge_stack(&mut project.stacks, stack);
            }
            other => {
                // 不明なノードはスキップ
                tracing::debug!(node = %other, "Skipping unknown top-level node");
            }
        }
    }

    Ok(project)
}

/// 同名スタックは後勝ちでマージ（stack.local.kdl による上書き用）
fn merge_stack(stacks: &mut Vec<StackDefinition>, stack: StackDefinition) {
    let Some(existing) = stacks.iter_mut().find(|s| s.name == stack.name) else {
        stacks.push(stack);
        return;
    };

    if stack.description.is_some() {
        existing.description = stack.description;
    }
    existing.environment = stack.environment.or(&existing.environment);
    existing.items.extend(stack.items);
}

#[cfg(test)]
mod tests;
