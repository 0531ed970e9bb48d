//! Production-system domain logic
//!
//! Condition and action model, matching, conflict resolution, refraction,
//! firing history and chunk learning.

pub mod action;
pub mod condition;
pub mod conflict;
pub mod history;
pub mod ids;
pub mod learning;
pub mod matching;
pub mod production;
pub mod refraction;
pub mod system;
