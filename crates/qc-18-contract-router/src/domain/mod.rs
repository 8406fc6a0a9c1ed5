//! # Domain Layer (Inner Hexagon)
//!
//! Pure business logic for router synthesis.
//! NO I/O, NO async, NO external dependencies.
//!
//! - This is the **inner layer** of the hexagonal architecture.
//! - Dependencies point INWARD only (adapters depend on this, not vice versa).

pub mod abi;
pub mod entities;
pub mod invariants;
pub mod services;
pub mod template;
pub mod value_objects;

pub use abi::*;
pub use entities::*;
pub use invariants::*;
pub use services::*;
pub use template::*;
pub use value_objects::*;
