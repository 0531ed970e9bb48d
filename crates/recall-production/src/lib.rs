//! # Recall Production
//!
//! Forward-chaining production-rule engine for agent decision making.
//!
//! Productions are condition → action rules matched against an external
//! working memory. Each cycle selects one production by weighted conflict
//! resolution and fires it; refraction keeps a production from firing twice
//! against the same items. Successful firing sequences can be compressed into
//! learned "chunks".
//!
//! ## Key Concepts
//!
//! - **Condition**: typed test of one attribute of working-memory items
//! - **Action**: working-memory or goal-stack change, or a pass-through signal
//! - **Conflict set**: every enabled, non-refracted production that matches
//! - **Chunk**: first production's conditions with the last one's actions
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    ProductionSystem                      │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐       │
//! │  │    Match    │─▶│   Resolve   │─▶│    Fire     │       │
//! │  │ (conditions)│  │  (scoring)  │  │  (actions)  │       │
//! │  └──────┬──────┘  └─────────────┘  └──────┬──────┘       │
//! │         │                                 │              │
//! │  ┌──────┴─────────────────────────────────┴──────┐       │
//! │  │        WorkingMemory      GoalStack           │       │
//! │  └───────────────────────────────────────────────┘       │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod domain;
pub mod infra;

pub use config::ProductionConfig;
pub use domain::action::{Action, ActionContext, GoalRef, ItemRef, Signal, SignalKind};
pub use domain::condition::{Attribute, AttributeValue, Comparator, Condition, Operand};
pub use domain::conflict::ConflictStrategy;
pub use domain::history::FiringRecord;
pub use domain::ids::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use domain::matching::{Bindings, MatchResult};
pub use domain::production::{Production, ProductionSource};
pub use domain::system::{ProductionSystem, RunSummary, SystemStats};
pub use infra::goal_stack::{GoalStack, InMemoryGoalStack};
pub use infra::working_memory::{InMemoryWorkingMemory, WorkingMemory};
