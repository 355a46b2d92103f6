use crate::project::LoadedProject;
use colored::Colorize;
use stackflow_config::Settings;

pub async fn handle(settings: &Settings) -> anyhow::Result<()> {
    let project = LoadedProject::load(settings)?;

    println!("{}", "スタック一覧:".bold());
    for definition in &project.definition.stacks {
        let environment = definition
            .environment
            .clone()
            .or(&project.definition.environment);
        println!("  {} ({})", definition.name.cyan(), environment);
        if let Some(description) = &definition.description {
            println!("    {}", description.dimmed());
        }
        for draft in definition.resources() {
            println!("    • {} [{}]", draft.logical_id, draft.kind);
        }
        for blueprint in definition.blueprints() {
            println!("    • blueprint {}", blueprint.kind.green());
        }
    }

    Ok(())
}
