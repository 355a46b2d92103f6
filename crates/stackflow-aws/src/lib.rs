//! AWS constructs for StackFlow
//!
//! Typed builders over [`stackflow_core::StackBuilder`] for the resources a
//! Lex V2 assistant needs, and the blueprints that combine them.
//!
//! # Constructs
//!
//! - [`lambda::Function`] with its execution role and code asset
//! - [`s3::Bucket`] and [`s3::BucketDeployment`]
//! - [`logs::LogGroup`]
//! - [`iam::Role`] with inline and default policies
//! - [`lex::Bot`], [`lex::BotVersion`], [`lex::BotAlias`]
//!
//! # Example
//!
//! ```ignore
//! use stackflow_aws::lambda::{Code, Function, FunctionProps, Runtime};
//! use stackflow_core::{Environment, StackBuilder};
//!
//! let mut builder = StackBuilder::new("Demo", Environment::agnostic());
//! let props = FunctionProps::new(
//!     Runtime::Python39,
//!     Code::from_asset("resources/lexBot"),
//!     "index.lambda_handler",
//! );
//! Function::new(&mut builder, "lexCodeHook", props)?;
//! let stack = builder.assemble()?;
//! ```

pub mod arn;
pub mod blueprint;
pub mod iam;
pub mod lambda;
pub mod lex;
pub mod logs;
pub mod s3;

pub use blueprint::{
    BotSource, DEMO_STACK_NAME, LexVaBlueprint, LexVaProps, default_registry, demo_project,
};

/// Logical id from construct path segments, keeping ASCII alphanumerics only
/// (`["lexCodeHook", "Lex Invocation"]` → `lexCodeHookLexInvocation`).
pub(crate) fn construct_id(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.chars())
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_id() {
        assert_eq!(
            construct_id(&["lexCodeHook", "Lex Invocation"]),
            "lexCodeHookLexInvocation"
        );
        assert_eq!(construct_id(&["my-bot", "Config_Bucket"]), "mybotConfigBucket");
    }
}
