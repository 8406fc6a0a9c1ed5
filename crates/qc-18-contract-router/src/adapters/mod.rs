//! # Adapters Layer (Outer Hexagon)
//!
//! Concrete implementations of the driven ports.
//!
//! - `SolidityRouterGenerator`: router source generation
//! - `SolcCompiler`: compilation through a native `solc`
//! - `SimulatedChain`: in-memory artifact store, signers and deployments

pub mod generator;
pub mod simulated_chain;
pub mod solc;

pub use generator::*;
pub use simulated_chain::*;
pub use solc::*;
