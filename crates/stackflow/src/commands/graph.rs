use crate::project::LoadedProject;
use colored::Colorize;
use stackflow_config::Settings;

pub async fn handle(settings: &Settings, stack: Option<&str>) -> anyhow::Result<()> {
    let project = LoadedProject::load(settings)?;

    for stack in project.build(stack)? {
        println!("{} ({})", stack.name().cyan().bold(), stack.environment());

        println!("  依存関係:");
        for descriptor in stack.descriptors() {
            let id = descriptor.logical_id();
            let targets: Vec<String> = stack.dependencies_of(id).map(|t| t.to_string()).collect();
            if targets.is_empty() {
                println!("    {} [{}]", id, descriptor.kind().dimmed());
            } else {
                println!(
                    "    {} [{}] → {}",
                    id,
                    descriptor.kind().dimmed(),
                    targets.join(", ")
                );
            }
        }

        println!("  プロビジョニング順序:");
        for (index, wave) in stack.waves().iter().enumerate() {
            let ids: Vec<String> = wave.iter().map(|id| id.to_string()).collect();
            println!("    {}. {}", index + 1, ids.join(", "));
        }
        println!();
    }

    Ok(())
}
