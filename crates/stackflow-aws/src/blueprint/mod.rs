//! Built-in blueprints

mod lex_va;

pub use lex_va::{BotSource, LexVaBlueprint, LexVaProps};

use stackflow_core::{
    BlueprintDefinition, BlueprintRegistry, Environment, ProjectDefinition, StackDefinition,
    StackItem,
};

/// Name of the stack used when no project file exists
pub const DEMO_STACK_NAME: &str = "DemoLexVaCicdStack";

/// Registry with every blueprint shipped in this crate
pub fn default_registry() -> BlueprintRegistry {
    let mut registry = BlueprintRegistry::new();
    registry.register(LexVaBlueprint);
    registry
}

/// Single-stack project deploying the banking demo bot with an inline
/// definition.
pub fn demo_project(environment: Environment) -> ProjectDefinition {
    let mut stack = StackDefinition::new(DEMO_STACK_NAME);
    stack.description = Some("Lex V2 banking demo bot with a Lambda code hook".to_string());
    stack
        .items
        .push(StackItem::Blueprint(BlueprintDefinition::new(LexVaBlueprint::NAME)));

    ProjectDefinition {
        app: "lex-va".to_string(),
        environment,
        variables: Default::default(),
        stacks: vec![stack],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = default_registry();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["lex-va"]);
    }

    #[test]
    fn test_demo_project() {
        let project = demo_project(Environment::agnostic());
        let stack = project.stack(DEMO_STACK_NAME).unwrap();
        assert_eq!(stack.blueprints().count(), 1);
        assert_eq!(stack.resources().count(), 0);
    }
}
