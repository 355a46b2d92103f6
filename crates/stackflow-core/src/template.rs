//! テンプレート展開機能
//!
//! Teraを使用してKDLファイルの `{{ VAR }}` を展開します。

use crate::error::{Result, StackError};
use crate::parser::kdl_to_json;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use tera::{Context, Tera};
use tracing::{debug, info};

/// 環境変数から取り込むプレフィックス
///
/// - STACKFLOW_*: StackFlow専用
/// - CDK_*: CDK互換（CDK_DEFAULT_ACCOUNT など）
/// - CI_*: CI/CD環境
const ALLOWED_ENV_PREFIXES: &[&str] = &["STACKFLOW_", "CDK_", "CI_"];

static VARIABLES_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?:^|\n)\s*variables\s*\{(?P<content>.*?)\n\s*\}")
        .expect("variables pattern is valid")
});

/// 変数コンテキスト
pub type Variables = HashMap<String, serde_json::Value>;

/// テンプレートプロセッサ
pub struct TemplateProcessor {
    tera: Tera,
    context: Context,
}

impl TemplateProcessor {
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
            context: Context::new(),
        }
    }

    /// 変数を追加
    pub fn add_variable(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.context.insert(key.into(), &value);
    }

    /// 複数の変数を追加
    pub fn add_variables(&mut self, variables: Variables) {
        for (key, value) in variables {
            self.context.insert(key, &value);
        }
    }

    /// 許可されたプレフィックスの環境変数を追加
    #[tracing::instrument(skip(self))]
    pub fn add_env_variables(&mut self) {
        let mut count = 0;
        for (key, value) in std::env::vars() {
            if ALLOWED_ENV_PREFIXES
                .iter()
                .any(|prefix| key.starts_with(prefix))
            {
                debug!(key = %key, "Adding environment variable");
                self.context.insert(key, &serde_json::Value::String(value));
                count += 1;
            }
        }
        info!(env_var_count = count, "Added filtered environment variables");
    }

    /// .env ファイルから変数を読み込んで追加
    ///
    /// .env の変数はプレフィックス制限なしで全て読み込まれます。
    #[tracing::instrument(skip(self))]
    pub fn add_env_file_variables(&mut self, env_file_path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(env_file_path).map_err(|e| StackError::IoError {
            path: env_file_path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut count = 0;
        for (key, value) in parse_env_file(&content) {
            self.context.insert(key, &serde_json::Value::String(value));
            count += 1;
        }

        info!(
            env_file = %env_file_path.display(),
            variable_count = count,
            "Loaded variables from .env file"
        );
        Ok(())
    }

    /// 文字列をテンプレートとして展開
    pub fn render_str(&mut self, template: &str) -> Result<String> {
        self.tera
            .render_str(template, &self.context)
            .map_err(|e| StackError::TemplateRenderError(extract_tera_error_detail(&e)))
    }

    /// ファイルを読み込んでテンプレート展開
    pub fn render_file(&mut self, path: &Path) -> Result<String> {
        let content = std::fs::read_to_string(path).map_err(|e| StackError::IoError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        self.render_str(&content).map_err(|e| match e {
            StackError::TemplateRenderError(message) => StackError::TemplateError {
                file: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// 複数のファイルを順に展開して結合
    pub fn render_files(&mut self, paths: &[impl AsRef<Path>]) -> Result<String> {
        let mut result = String::new();
        for path in paths {
            result.push_str(&self.render_file(path.as_ref())?);
            result.push('\n');
        }
        Ok(result)
    }
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// KDLファイルから `variables { ... }` ブロックを抽出
///
/// テンプレート展開前の内容は `{{ ... }}` を含みKDLとして不正なことがあるため、
/// ブロック部分だけを切り出してパースします。
pub fn extract_variables(kdl_content: &str) -> Result<Variables> {
    let mut vars = HashMap::new();

    for cap in VARIABLES_BLOCK.captures_iter(kdl_content) {
        let Some(body) = cap.name("content") else {
            continue;
        };
        let wrapped = format!("variables {{\n{}\n}}", body.as_str());
        let doc: kdl::KdlDocument = wrapped.parse().map_err(|e| {
            StackError::InvalidConfig(format!("KDL パースエラー (variables ブロック): {}", e))
        })?;

        if let Some(node) = doc.nodes().first()
            && let Some(children) = node.children()
        {
            for var in children.nodes() {
                if let Some(entry) = var.entries().first() {
                    vars.insert(var.name().value().to_string(), kdl_to_json(entry.value()));
                }
            }
        }
    }

    Ok(vars)
}

/// `KEY=VALUE` 形式を解析（空行と `#` コメントは無視）
fn parse_env_file(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let key = key.trim().trim_start_matches("export ").trim();
            (key.to_string(), strip_quotes(value.trim()).to_string())
        })
        .collect()
}

fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Teraエラーから未定義変数などの情報を取り出す
fn extract_tera_error_detail(e: &tera::Error) -> String {
    use std::error::Error;

    let mut details = vec![e.to_string()];
    let mut source = e.source();
    while let Some(err) = source {
        details.push(err.to_string());
        source = err.source();
    }
    let full_error = details.join(" | ");

    if let Some(start) = full_error.find("Variable `")
        && let Some(end) = full_error[start..].find("` not found")
    {
        let var_name = &full_error[start + "Variable `".len()..start + end];
        return format!(
            "未定義の変数: `{}`\nヒント: variables ブロックで定義するか、.env ファイルに追加してください",
            var_name
        );
    }

    full_error
}
