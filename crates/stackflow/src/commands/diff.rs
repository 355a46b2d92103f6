use crate::project::LoadedProject;
use colored::Colorize;
use stackflow_config::Settings;
use stackflow_synth::{
    ActionType, CloudAssemblyWriter, CloudFormationSynthesizer, OutputFormat, Plan, Synthesizer,
};
use std::path::Path;

pub async fn handle(settings: &Settings, stack: Option<&str>, outdir: &Path) -> anyhow::Result<()> {
    let project = LoadedProject::load(settings)?;
    let synthesizer = CloudFormationSynthesizer::new();
    // read_template は json / yaml の両方を探す
    let writer = CloudAssemblyWriter::new(outdir, OutputFormat::default());

    for stack in project.build(stack)? {
        let template = synthesizer.synthesize(&stack)?;
        let previous = writer.read_template(stack.name()).await?;
        let plan = Plan::diff(previous.as_ref(), &template)?;

        println!("{}", stack.name().cyan().bold());
        if previous.is_none() {
            println!("  {}", "(書き出し済みのテンプレートはありません)".dimmed());
        }

        for action in &plan.actions {
            let line = format!("{} [{}]", action.logical_id, action.resource_type);
            match action.action_type {
                ActionType::Create => println!("  {} {}", "+".green(), line.green()),
                ActionType::Update => {
                    println!("  {} {}", "~".yellow(), line.yellow());
                    for change in &action.changes {
                        println!("      {}", change.dimmed());
                    }
                }
                ActionType::Delete => println!("  {} {}", "-".red(), line.red()),
                ActionType::NoOp => {}
            }
        }

        if plan.has_changes {
            println!("  {}", plan.summary().to_string().bold());
        } else {
            println!("  {}", "✓ 差分はありません".green());
        }
        println!();
    }

    Ok(())
}
