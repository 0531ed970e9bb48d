//! Collaborator backends
//!
//! Traits the production system reads and writes through, with in-memory
//! implementations.

pub mod goal_stack;
pub mod working_memory;
