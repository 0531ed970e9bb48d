//! # Recall Common
//!
//! Shared error taxonomy and collaborator types for the Recall engine.
//!
//! ## Errors
//!
//! - [`RecallError`]: unified error with validation, not-found and state families
//! - [`RecallError::NoMatchingProductions`]: quiescence sentinel of the rule engine
//!
//! ## Types
//!
//! - [`WorkingMemoryItem`]: a fact matched by production conditions
//! - [`Goal`]: an entry on the goal stack

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ErrorKind, NotFoundError, RecallError, Result, StateError, ValidationError};
pub use types::{
    goal::{Goal, GoalStatus},
    working_memory::WorkingMemoryItem,
};

/// Recall version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
