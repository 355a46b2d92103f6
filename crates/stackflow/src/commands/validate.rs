use crate::project::LoadedProject;
use colored::Colorize;
use stackflow_config::Settings;

pub async fn handle(settings: &Settings, stack: Option<&str>) -> anyhow::Result<()> {
    println!("{}", "設定を検証中...".blue());

    let project = match LoadedProject::load(settings) {
        Ok(project) => project,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 設定ファイルを読み込めません".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };
    project.print_source();

    match project.build(stack) {
        Ok(stacks) => {
            println!("{}", "✓ リソースグラフは正常です！".green().bold());
            println!();
            println!("サマリー:");
            println!("  アプリ: {}", project.definition.app.cyan());
            println!("  スタック: {}個", stacks.len());
            for stack in &stacks {
                println!(
                    "    - {} ({}個のリソース, {}段, {})",
                    stack.name().cyan(),
                    stack.len(),
                    stack.waves().len(),
                    stack.environment()
                );
                for asset in stack.assets() {
                    if !asset.path.exists() {
                        println!(
                            "      {} アセット {} のパスが存在しません: {}",
                            "⚠".yellow(),
                            asset.id,
                            asset.path.display()
                        );
                    }
                }
                for warning in stack.warnings() {
                    println!("      {} {}", "⚠".yellow(), warning);
                }
            }
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 設定エラー".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
