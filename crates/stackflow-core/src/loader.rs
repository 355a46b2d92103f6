//! 統合ローダー
//!
//! ファイル発見、テンプレート展開、パース、スタック組み立てを統合

use crate::blueprint::{BlueprintRegistry, BuildContext};
use crate::builder::StackBuilder;
use crate::discovery::{DiscoveredFiles, discover_files, find_project_root};
use crate::error::{Result, StackError};
use crate::model::{ProjectDefinition, Stack, StackDefinition, StackItem};
use crate::parser::parse_kdl_string;
use crate::template::{TemplateProcessor, Variables, extract_variables};
use std::path::Path;
use tracing::{debug, info, instrument};

/// プロジェクト全体をロード
///
/// 1. プロジェクトルートの検出
/// 2. ファイルの自動発見
/// 3. 変数の収集
/// 4. テンプレート展開
/// 5. KDLパース
#[instrument]
pub fn load_project() -> Result<ProjectDefinition> {
    let project_root = find_project_root()?;
    load_project_from_root(&project_root)
}

/// 指定されたルートディレクトリからプロジェクトをロード
#[instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn load_project_from_root(project_root: &Path) -> Result<ProjectDefinition> {
    debug!("Step 1: Discovering files");
    let discovered = discover_files(project_root)?;
    if discovered.is_empty() {
        return Err(StackError::ProjectRootNotFound(project_root.to_path_buf()));
    }

    debug!("Step 2: Preparing template processor");
    let mut processor = prepare_template_processor(&discovered, project_root)?;

    debug!("Step 3: Expanding templates");
    let expanded = processor.render_files(&discovered.kdl_files())?;
    info!(content_size = expanded.len(), "Template expansion complete");

    debug!("Step 4: Parsing KDL");
    let name = project_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let project = parse_kdl_string(&expanded, name)?;
    info!(
        app = %project.app,
        stacks = project.stacks.len(),
        "Project loaded successfully"
    );

    Ok(project)
}

/// テンプレートプロセッサを準備
///
/// 優先順位（後勝ち）: .env → 環境変数 → variables ブロック
fn prepare_template_processor(
    discovered: &DiscoveredFiles,
    project_root: &Path,
) -> Result<TemplateProcessor> {
    let mut processor = TemplateProcessor::new();
    let mut all_variables = Variables::new();

    processor.add_variable(
        "PROJECT_ROOT",
        serde_json::Value::String(project_root.to_string_lossy().to_string()),
    );

    for file in discovered.variables.iter().chain(discovered.root.iter()) {
        let content = std::fs::read_to_string(file).map_err(|e| StackError::IoError {
            path: file.clone(),
            message: e.to_string(),
        })?;
        all_variables.extend(extract_variables(&content)?);
    }

    if let Some(env_file) = &discovered.env_file {
        processor.add_env_file_variables(env_file)?;
    }
    processor.add_env_variables();

    debug!(count = all_variables.len(), "Adding collected variables");
    processor.add_variables(all_variables);

    Ok(processor)
}

/// プロジェクトの全スタックを組み立てる
#[instrument(skip_all, fields(app = %project.app))]
pub fn build_stacks(
    project: &ProjectDefinition,
    blueprints: &BlueprintRegistry,
    context: &BuildContext,
) -> Result<Vec<Stack>> {
    project
        .stacks
        .iter()
        .map(|definition| build_stack(project, definition, blueprints, context))
        .collect()
}

/// 名前を指定して1つのスタックを組み立てる
pub fn build_named_stack(
    project: &ProjectDefinition,
    name: &str,
    blueprints: &BlueprintRegistry,
    context: &BuildContext,
) -> Result<Stack> {
    let definition = project
        .stack(name)
        .ok_or_else(|| StackError::StackNotFound(name.to_string()))?;
    build_stack(project, definition, blueprints, context)
}

/// スタック宣言を StackBuilder に流して組み立てる
///
/// 要素は宣言順に追加されるため、参照先は参照元より前に宣言する必要があります。
#[instrument(skip_all, fields(stack = %definition.name))]
pub fn build_stack(
    project: &ProjectDefinition,
    definition: &StackDefinition,
    blueprints: &BlueprintRegistry,
    context: &BuildContext,
) -> Result<Stack> {
    let environment = definition.environment.clone().or(&project.environment);
    let mut builder = StackBuilder::new(&definition.name, environment);
    if let Some(description) = &definition.description {
        builder = builder.with_description(description);
    }

    for item in &definition.items {
        match item {
            StackItem::Resource(draft) => {
                builder.add(draft.clone())?;
            }
            StackItem::Blueprint(blueprint) => {
                blueprints.expand(&mut builder, blueprint, context)?;
            }
        }
    }

    let stack = builder.assemble()?;
    info!(
        resources = stack.len(),
        edges = stack.edges().len(),
        "Stack assembled"
    );
    Ok(stack)
}
