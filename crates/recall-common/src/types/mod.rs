//! Collaborator data types shared by the engine crates

pub mod goal;
pub mod working_memory;
