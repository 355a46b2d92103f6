use crate::project::LoadedProject;
use colored::Colorize;
use stackflow_config::Settings;
use stackflow_synth::{CloudAssemblyWriter, CloudFormationSynthesizer, OutputFormat, Synthesizer};
use std::path::Path;

pub async fn handle(
    settings: &Settings,
    stack: Option<&str>,
    outdir: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let project = LoadedProject::load(settings)?;
    project.print_source();

    let stacks = project.build(stack)?;
    let synthesizer = CloudFormationSynthesizer::new();
    let writer = CloudAssemblyWriter::new(outdir, format).with_synthesizer(synthesizer.clone());

    println!("{}", "スタックを合成中...".blue());
    for mut stack in stacks {
        let template = synthesizer.synthesize(&stack)?;
        let output = writer.write(&stack, &template).await?;
        if let Err(state) = stack.mark_synthesized() {
            anyhow::bail!("スタック {} は合成できない状態です: {}", stack.name(), state);
        }

        println!(
            "  {} {} ({}個のリソース)",
            "✓".green(),
            stack.name().cyan(),
            template.resources.len()
        );
        println!("    テンプレート: {}", output.template_path.display());
        if !output.staged_assets.is_empty() {
            println!("    アセット: {}個", output.staged_assets.len());
        }
        if let Some(backup) = &output.backup_path {
            println!("    バックアップ: {}", backup.display().to_string().dimmed());
        }
        for warning in stack.warnings() {
            println!("    {} {}", "⚠".yellow(), warning);
        }
    }

    println!();
    println!(
        "{}",
        format!("✓ クラウドアセンブリを書き出しました: {}", outdir.display())
            .green()
            .bold()
    );
    Ok(())
}
