//! ファイル自動発見機能
//!
//! 規約ベースのディレクトリ構造からKDLファイルを発見します。
//!
//! ```text
//! <project>/
//! ├── stack.kdl            (または .stackflow/stack.kdl)
//! ├── stacks/**/*.kdl
//! ├── variables/**/*.kdl
//! ├── stack.local.kdl      (ローカル上書き)
//! └── .env
//! ```

use crate::error::{Result, StackError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// ルートファイル名
pub const ROOT_FILE: &str = "stack.kdl";
/// ローカル上書きファイル名
pub const LOCAL_OVERRIDE_FILE: &str = "stack.local.kdl";
/// 隠しディレクトリ
pub const HIDDEN_DIR: &str = ".stackflow";

/// 発見されたファイル群
#[derive(Debug, Clone, Default)]
pub struct DiscoveredFiles {
    /// ルートファイル (stack.kdl)
    pub root: Option<PathBuf>,
    /// スタック定義ファイル (stacks/**/*.kdl)
    pub stacks: Vec<PathBuf>,
    /// 変数定義ファイル (variables/**/*.kdl)
    pub variables: Vec<PathBuf>,
    /// ローカルオーバーライドファイル (stack.local.kdl)
    pub local_override: Option<PathBuf>,
    /// 環境変数ファイル (.env)
    pub env_file: Option<PathBuf>,
}

impl DiscoveredFiles {
    /// 読み込み順に並べたKDLファイル（変数 → ルート → スタック → ローカル上書き）
    pub fn kdl_files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = self.variables.iter().map(PathBuf::as_path).collect();
        files.extend(self.root.as_deref());
        files.extend(self.stacks.iter().map(PathBuf::as_path));
        files.extend(self.local_override.as_deref());
        files
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.stacks.is_empty() && self.local_override.is_none()
    }
}

fn has_root_file(dir: &Path) -> bool {
    dir.join(ROOT_FILE).exists() || dir.join(HIDDEN_DIR).join(ROOT_FILE).exists()
}

/// プロジェクトルートを検出
///
/// 以下の優先順位で検索:
/// 1. 環境変数 STACKFLOW_PROJECT_ROOT
/// 2. カレントディレクトリから上に向かって stack.kdl / .stackflow/stack.kdl を探す
#[tracing::instrument]
pub fn find_project_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var("STACKFLOW_PROJECT_ROOT") {
        let path = PathBuf::from(&root);
        debug!(env_root = %root, "Checking STACKFLOW_PROJECT_ROOT");
        if has_root_file(&path) {
            info!(project_root = %path.display(), "Found project root from environment variable");
            return Ok(path);
        }
    }

    let start_dir = std::env::current_dir()?;
    find_project_root_from(&start_dir)
}

/// 指定ディレクトリから上に向かってプロジェクトルートを探す
pub fn find_project_root_from(start_dir: &Path) -> Result<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        if has_root_file(&current) {
            info!(project_root = %current.display(), "Found project root");
            return Ok(current);
        }
        if !current.pop() {
            break;
        }
    }

    warn!(start_dir = %start_dir.display(), "Project root not found");
    Err(StackError::ProjectRootNotFound(start_dir.to_path_buf()))
}

/// プロジェクトルートからファイルを自動発見
#[tracing::instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn discover_files(project_root: &Path) -> Result<DiscoveredFiles> {
    let hidden = project_root.join(HIDDEN_DIR);
    let mut discovered = DiscoveredFiles {
        root: first_existing(&[project_root.join(ROOT_FILE), hidden.join(ROOT_FILE)]),
        local_override: first_existing(&[
            project_root.join(LOCAL_OVERRIDE_FILE),
            hidden.join(LOCAL_OVERRIDE_FILE),
        ]),
        env_file: first_existing(&[project_root.join(".env"), hidden.join(".env")]),
        ..Default::default()
    };

    discovered.stacks = discover_kdl_files(&project_root.join("stacks"))?;
    discovered.variables = discover_kdl_files(&project_root.join("variables"))?;

    info!(
        root = discovered.root.is_some(),
        stack_files = discovered.stacks.len(),
        variable_files = discovered.variables.len(),
        local_override = discovered.local_override.is_some(),
        "Discovered project files"
    );

    Ok(discovered)
}

fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.is_file()).cloned()
}

/// ディレクトリ配下の .kdl ファイルを再帰的に発見（アルファベット順）
fn discover_kdl_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let pattern = dir.join("**").join("*.kdl");
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern).map_err(|e| StackError::IoError {
        path: dir.to_path_buf(),
        message: format!("globパターンが不正です: {}", e),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StackError::IoError {
            path: e.path().to_path_buf(),
            message: format!("ディレクトリエントリの読み込みに失敗: {}", e.error()),
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    debug!(dir = %dir.display(), count = files.len(), "Discovered kdl files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn create_test_project(base: &Path) -> Result<()> {
        fs::write(base.join("stack.kdl"), "// root")?;

        fs::create_dir_all(base.join("stacks/lex"))?;
        fs::write(base.join("stacks/storage.kdl"), "stack \"Storage\"")?;
        fs::write(base.join("stacks/lex/bot.kdl"), "stack \"Bot\"")?;

        fs::create_dir_all(base.join("variables"))?;
        fs::write(base.join("variables/common.kdl"), "variables {}")?;

        fs::write(base.join("stack.local.kdl"), "// local override")?;
        fs::write(base.join(".env"), "CDK_DEFAULT_REGION=us-east-1")?;
        Ok(())
    }

    #[test]
    fn test_discover_files() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path();
        create_test_project(root)?;

        let discovered = discover_files(root)?;
        assert!(discovered.root.is_some());
        assert_eq!(discovered.stacks.len(), 2);
        assert!(discovered.stacks[0].ends_with("stacks/lex/bot.kdl"));
        assert!(discovered.stacks[1].ends_with("stacks/storage.kdl"));
        assert_eq!(discovered.variables.len(), 1);
        assert!(discovered.local_override.is_some());
        assert!(discovered.env_file.is_some());

        let order = discovered.kdl_files();
        assert!(order[0].ends_with("variables/common.kdl"));
        assert!(order[1].ends_with("stack.kdl"));
        assert!(order[4].ends_with("stack.local.kdl"));
        Ok(())
    }

    #[test]
    fn test_discover_files_minimal() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path();
        fs::write(root.join("stack.kdl"), "// root")?;

        let discovered = discover_files(root)?;
        assert!(discovered.root.is_some());
        assert!(discovered.stacks.is_empty());
        assert!(discovered.variables.is_empty());
        assert!(discovered.local_override.is_none());
        assert!(discovered.env_file.is_none());
        Ok(())
    }

    #[test]
    fn test_hidden_dir_and_priority() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".stackflow"))?;
        fs::write(root.join(".stackflow/stack.kdl"), "// hidden")?;

        let discovered = discover_files(root)?;
        assert!(discovered.root.as_ref().unwrap().ends_with(".stackflow/stack.kdl"));

        fs::write(root.join("stack.kdl"), "// root")?;
        let discovered = discover_files(root)?;
        let found = discovered.root.unwrap();
        assert!(!found.to_string_lossy().contains(".stackflow"));
        Ok(())
    }

    #[test]
    fn test_find_project_root_from_subdir() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path();
        fs::write(root.join("stack.kdl"), "// root")?;
        let nested = root.join("lambda/lex-codehook");
        fs::create_dir_all(&nested)?;

        let found = find_project_root_from(&nested)?;
        assert_eq!(found, root);
        Ok(())
    }

    #[test]
    fn test_find_project_root_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = find_project_root_from(temp_dir.path());
        assert!(matches!(result, Err(StackError::ProjectRootNotFound(_))));
    }
}
