use colored::Colorize;
use stackflow_config::Settings;
use stackflow_core::{BuildContext, ProjectDefinition, Stack, StackError};
use std::path::PathBuf;

/// 読み込んだプロジェクト定義
pub struct LoadedProject {
    pub root: PathBuf,
    pub definition: ProjectDefinition,
    /// stack.kdl が見つからず、組み込みのデモスタックを使っている
    pub demo: bool,
}

impl LoadedProject {
    /// プロジェクトルートから stack.kdl を読み込む
    ///
    /// ルートが見つからない場合はカレントディレクトリを基準に
    /// デモスタック (DemoLexVaCicdStack) を使う。
    pub fn load(settings: &Settings) -> anyhow::Result<Self> {
        match stackflow_core::find_project_root() {
            Ok(root) => {
                let mut definition = stackflow_core::load_project_from_root(&root)?;
                definition.environment = definition.environment.clone().or(&settings.environment());
                Ok(Self {
                    root,
                    definition,
                    demo: false,
                })
            }
            Err(StackError::ProjectRootNotFound(_)) => {
                let root = std::env::current_dir()?;
                tracing::info!(root = %root.display(), "No stack.kdl found, using demo stack");
                Ok(Self {
                    root,
                    definition: stackflow_aws::demo_project(settings.environment()),
                    demo: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// スタックを組み立てる（名前指定なしなら全スタック）
    pub fn build(&self, stack: Option<&str>) -> anyhow::Result<Vec<Stack>> {
        let registry = stackflow_aws::default_registry();
        let context = BuildContext::new(self.root.clone());
        let stacks = match stack {
            Some(name) => vec![stackflow_core::build_named_stack(
                &self.definition,
                name,
                &registry,
                &context,
            )?],
            None => stackflow_core::build_stacks(&self.definition, &registry, &context)?,
        };
        Ok(stacks)
    }

    /// 読み込んだ定義の出どころを表示
    pub fn print_source(&self) {
        if self.demo {
            println!(
                "📄 stack.kdl が見つからないため、デモスタックを使用します ({})",
                self.root.display().to_string().cyan()
            );
        } else {
            println!(
                "📄 プロジェクトルート: {}",
                self.root.display().to_string().cyan()
            );
        }
    }
}
