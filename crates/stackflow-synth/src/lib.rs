//! CloudFormation synthesis for StackFlow
//!
//! Turns assembled [`stackflow_core::Stack`]s into CloudFormation templates
//! and writes them as a cloud assembly.
//!
//! # Example
//!
//! ```ignore
//! use stackflow_synth::{CloudAssemblyWriter, CloudFormationSynthesizer, OutputFormat, Synthesizer};
//!
//! let template = CloudFormationSynthesizer::new().synthesize(&stack)?;
//! let writer = CloudAssemblyWriter::new("cdk.out", OutputFormat::Json);
//! writer.write(&stack, &template).await?;
//! ```

pub mod assembly;
pub mod assets;
pub mod error;
pub mod plan;
pub mod template;

pub use assembly::{AssemblyOutput, CloudAssemblyWriter, OutputFormat};
pub use assets::AssetEntry;
pub use error::{Result, SynthError};
pub use plan::{Action, ActionType, Plan, PlanSummary};
pub use template::{CloudFormationSynthesizer, Synthesizer, Template, TemplateResource};
