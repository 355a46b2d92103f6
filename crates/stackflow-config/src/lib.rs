pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use stackflow_core::Environment;
use std::path::{Path, PathBuf};

const STACK_FILE_CANDIDATES: &[&str] = &["stack.local.kdl", "stack.kdl"];

const ACCOUNT_VARS: &[&str] = &["CDK_DEFAULT_ACCOUNT", "AWS_ACCOUNT_ID"];
const REGION_VARS: &[&str] = &["CDK_DEFAULT_REGION", "AWS_REGION", "AWS_DEFAULT_REGION"];

/// StackFlowの設定ディレクトリを取得（なければ作成）
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("stackflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// プロジェクトのstack.kdlファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 STACKFLOW_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: stack.local.kdl, stack.kdl
/// 3. ./.stackflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/stackflow/stack.kdl (グローバル設定)
pub fn find_stack_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("STACKFLOW_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "STACKFLOW_CONFIG_PATH does not exist, falling back");
    }

    let current_dir = std::env::current_dir()?;
    if let Some(path) = find_stack_file_in(&current_dir) {
        return Ok(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("stackflow").join("stack.kdl");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::StackFileNotFound)
}

/// 指定ディレクトリとその `.stackflow/` からスタック定義ファイルを探す
pub fn find_stack_file_in(dir: &Path) -> Option<PathBuf> {
    let hidden = dir.join(".stackflow");
    [dir.to_path_buf(), hidden]
        .iter()
        .flat_map(|base| STACK_FILE_CANDIDATES.iter().map(move |name| base.join(name)))
        .find(|path| path.is_file())
}

/// 環境変数からデプロイ先のアカウントとリージョンを解決
///
/// 見つからない項目は `None` のまま（環境非依存のテンプレートになる）。
pub fn resolve_environment() -> Environment {
    Environment {
        account: first_env(ACCOUNT_VARS),
        region: first_env(REGION_VARS),
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

/// ユーザー設定 (~/.config/stackflow/config.yaml)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// クラウドアセンブリの出力先
    pub output_dir: PathBuf,
    /// テンプレート形式 (json / yaml)
    pub format: String,
    /// 環境変数で決まらない場合のリージョン
    pub default_region: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("cdk.out"),
            format: "json".to_string(),
            default_region: None,
        }
    }
}

impl Settings {
    /// 設定ディレクトリの config.yaml を読み込む（なければデフォルト）
    pub fn load() -> Result<Self> {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(Self::default());
        };
        Self::load_from(&config_dir.join("stackflow").join("config.yaml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::InvalidSettings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// 環境変数の解決結果に設定のリージョンを補完
    pub fn environment(&self) -> Environment {
        let mut env = resolve_environment();
        if env.region.is_none() {
            env.region = self.default_region.clone();
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with("stackflow"));
        assert!(config_dir.exists());
    }

    #[test]
    fn test_find_stack_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// global").unwrap();
        fs::write(temp_dir.path().join("stack.local.kdl"), "// local").unwrap();

        let result = find_stack_file_in(temp_dir.path()).unwrap();
        assert!(result.ends_with("stack.local.kdl"));
    }

    #[test]
    fn test_find_stack_file_in_hidden_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let hidden = temp_dir.path().join(".stackflow");
        fs::create_dir(&hidden).unwrap();
        fs::write(hidden.join("stack.kdl"), "// hidden").unwrap();

        let result = find_stack_file_in(temp_dir.path()).unwrap();
        assert!(result.ends_with(".stackflow/stack.kdl"));
    }

    #[test]
    fn test_find_stack_file_in_empty_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(find_stack_file_in(temp_dir.path()).is_none());
    }

    #[test]
    #[serial]
    fn test_find_stack_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// test").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset("STACKFLOW_CONFIG_PATH", find_stack_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("stack.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_stack_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.kdl");
        fs::write(&config_path, "// custom").unwrap();

        let result = temp_env::with_var(
            "STACKFLOW_CONFIG_PATH",
            Some(config_path.as_os_str()),
            find_stack_file,
        );
        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    #[serial]
    fn test_resolve_environment_prefers_cdk_vars() {
        temp_env::with_vars(
            [
                ("CDK_DEFAULT_ACCOUNT", Some("111111111111")),
                ("AWS_ACCOUNT_ID", Some("222222222222")),
                ("CDK_DEFAULT_REGION", None),
                ("AWS_REGION", Some("us-west-2")),
                ("AWS_DEFAULT_REGION", Some("eu-west-1")),
            ],
            || {
                let env = resolve_environment();
                assert_eq!(env.account.as_deref(), Some("111111111111"));
                assert_eq!(env.region.as_deref(), Some("us-west-2"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_resolve_environment_agnostic() {
        temp_env::with_vars_unset(
            [
                "CDK_DEFAULT_ACCOUNT",
                "AWS_ACCOUNT_ID",
                "CDK_DEFAULT_REGION",
                "AWS_REGION",
                "AWS_DEFAULT_REGION",
            ],
            || {
                assert!(resolve_environment().is_agnostic());
            },
        );
    }

    #[test]
    #[serial]
    fn test_settings_default_region() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "output-dir: out\nformat: yaml\ndefault-region: ap-northeast-1\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("out"));
        assert_eq!(settings.format, "yaml");

        temp_env::with_vars_unset(
            ["CDK_DEFAULT_REGION", "AWS_REGION", "AWS_DEFAULT_REGION"],
            || {
                assert_eq!(
                    settings.environment().region.as_deref(),
                    Some("ap-northeast-1")
                );
            },
        );
    }

    #[test]
    fn test_settings_missing_file_is_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&temp_dir.path().join("none.yaml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_settings_invalid_yaml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "output-dir: [unclosed").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(ConfigError::InvalidSettings { .. })
        ));
    }
}
