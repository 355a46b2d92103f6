use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("検証エラー: リソース '{logical_id}'\n理由: {reason}")]
    Validation { logical_id: String, reason: String },

    #[error("循環依存が検出されました: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("未解決の参照: '{from}' が参照する '{target}' はスタック '{stack}' に存在しません")]
    UnresolvedReference {
        from: String,
        target: String,
        stack: String,
    },

    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO エラー: {path}\n理由: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("テンプレートエラー: {file}\n理由: {message}")]
    TemplateError { file: PathBuf, message: String },

    #[error("テンプレート展開エラー: {0}")]
    TemplateRenderError(String),

    #[error(
        "プロジェクトルートが見つかりません\n探索開始位置: {0}\nヒント: stack.kdl ファイルを含むディレクトリで実行してください"
    )]
    ProjectRootNotFound(PathBuf),

    #[error("スタックが見つかりません: {0}")]
    StackNotFound(String),

    #[error("未知のブループリント: {0}")]
    UnknownBlueprint(String),
}

impl StackError {
    pub fn validation(logical_id: impl Into<String>, reason: impl Into<String>) -> Self {
        StackError::Validation {
            logical_id: logical_id.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StackError>;
