//! # Ports Layer (Middle Hexagon)
//!
//! Trait definitions for the router step.
//! These are the interfaces between the domain and the outside world.
//!
//! - **Driving Ports (Inbound)**: `RouterStepApi`
//! - **Driven Ports (Outbound)**: `RouterGenerator`, `SolidityCompiler`,
//!   `StepRuntime` (`ArtifactReporter` + `SignerProvider`)
//! - No concrete implementations in this module

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
