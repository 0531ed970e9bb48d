//! Production Actions
//!
//! Right-hand side of a production. Memory and goal actions go through the
//! collaborator traits; `InvokeAgent`, `Emit`, `Log` and `Halt` only produce
//! a [`Signal`] for registered callbacks.

use recall_common::{Goal, NotFoundError, Result, StateError, WorkingMemoryItem};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::matching::Bindings;
use crate::infra::goal_stack::GoalStack;
use crate::infra::working_memory::WorkingMemory;

/// Reference to a working-memory item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRef {
    Id(String),
    /// A bound variable holding an item ID
    Variable(String),
    /// The n-th item in the sorted matched set
    Matched(usize),
}

/// Reference to a goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalRef {
    Current,
    Id(String),
    Variable(String),
}

/// One step of a production's right-hand side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    AddItem {
        content_type: String,
        content: String,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    RemoveItem {
        target: ItemRef,
    },
    ModifyItem {
        target: ItemRef,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        activation: Option<f64>,
        #[serde(default)]
        salience: Option<f64>,
        /// Merged into the existing metadata
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    PushGoal {
        description: String,
        priority: f64,
    },
    CompleteGoal {
        goal: GoalRef,
    },
    InvokeAgent {
        agent: String,
        #[serde(default)]
        payload: Value,
    },
    Emit {
        event: String,
        #[serde(default)]
        payload: Value,
    },
    Log {
        message: String,
    },
    Halt {
        #[serde(default)]
        reason: String,
    },
}

impl Action {
    pub fn add_item(content_type: impl Into<String>, content: impl Into<String>) -> Self {
        Action::AddItem {
            content_type: content_type.into(),
            content: content.into(),
            metadata: Map::new(),
        }
    }

    pub fn remove_item(target: ItemRef) -> Self {
        Action::RemoveItem { target }
    }

    /// Set an item's activation
    pub fn set_activation(target: ItemRef, activation: f64) -> Self {
        Action::ModifyItem {
            target,
            content: None,
            activation: Some(activation),
            salience: None,
            metadata: Map::new(),
        }
    }

    pub fn push_goal(description: impl Into<String>, priority: f64) -> Self {
        Action::PushGoal {
            description: description.into(),
            priority,
        }
    }

    pub fn complete_goal(goal: GoalRef) -> Self {
        Action::CompleteGoal { goal }
    }

    pub fn invoke_agent(agent: impl Into<String>, payload: Value) -> Self {
        Action::InvokeAgent {
            agent: agent.into(),
            payload,
        }
    }

    pub fn emit(event: impl Into<String>, payload: Value) -> Self {
        Action::Emit {
            event: event.into(),
            payload,
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        Action::Log {
            message: message.into(),
        }
    }

    pub fn halt(reason: impl Into<String>) -> Self {
        Action::Halt {
            reason: reason.into(),
        }
    }

    /// Run the action against the collaborators
    ///
    /// Returns the signal to deliver for pass-through actions.
    pub fn execute(&self, ctx: &ActionContext<'_>) -> Result<Option<Signal>> {
        match self {
            Action::AddItem {
                content_type,
                content,
                metadata,
            } => {
                let mut item = WorkingMemoryItem::new(content_type.clone(), content.clone());
                item.metadata = metadata.clone();
                ctx.working_memory.add(item)?;
                Ok(None)
            }
            Action::RemoveItem { target } => {
                let id = ctx.resolve_item(target)?;
                ctx.working_memory.remove(&id)?;
                Ok(None)
            }
            Action::ModifyItem {
                target,
                content,
                activation,
                salience,
                metadata,
            } => {
                let id = ctx.resolve_item(target)?;
                let mut item = ctx
                    .working_memory
                    .get(&id)
                    .ok_or(NotFoundError::WorkingMemoryItem(id))?;
                if let Some(content) = content {
                    item.content = content.clone();
                }
                if let Some(activation) = activation {
                    item.activation = *activation;
                }
                if let Some(salience) = salience {
                    item.salience = *salience;
                }
                for (k, v) in metadata {
                    item.metadata.insert(k.clone(), v.clone());
                }
                ctx.working_memory.update(item)?;
                Ok(None)
            }
            Action::PushGoal {
                description,
                priority,
            } => {
                ctx.goal_stack
                    .push(Goal::new(description.clone()).priority(*priority))?;
                Ok(None)
            }
            Action::CompleteGoal { goal } => {
                let id = ctx.resolve_goal(goal)?;
                ctx.goal_stack.complete(&id)?;
                Ok(None)
            }
            Action::InvokeAgent { agent, payload } => Ok(Some(ctx.signal(SignalKind::InvokeAgent {
                agent: agent.clone(),
                payload: payload.clone(),
            }))),
            Action::Emit { event, payload } => Ok(Some(ctx.signal(SignalKind::Emit {
                event: event.clone(),
                payload: payload.clone(),
            }))),
            Action::Log { message } => Ok(Some(ctx.signal(SignalKind::Log {
                message: message.clone(),
            }))),
            Action::Halt { reason } => Ok(Some(ctx.signal(SignalKind::Halt {
                reason: reason.clone(),
            }))),
        }
    }
}

/// Pass-through notification produced by a fired action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub production_id: String,
    pub kind: SignalKind,
    pub bindings: Bindings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalKind {
    InvokeAgent { agent: String, payload: Value },
    Emit { event: String, payload: Value },
    Log { message: String },
    Halt { reason: String },
}

/// What an action can see while it runs
pub struct ActionContext<'a> {
    pub production_id: &'a str,
    /// Sorted IDs of the items the production matched
    pub matched_items: &'a [String],
    pub bindings: &'a Bindings,
    pub working_memory: &'a dyn WorkingMemory,
    pub goal_stack: &'a dyn GoalStack,
}

impl ActionContext<'_> {
    fn variable(&self, name: &str) -> Result<String> {
        match self.bindings.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(NotFoundError::Variable(name.to_string()).into()),
        }
    }

    fn resolve_item(&self, target: &ItemRef) -> Result<String> {
        match target {
            ItemRef::Id(id) => Ok(id.clone()),
            ItemRef::Variable(name) => self.variable(name),
            ItemRef::Matched(n) => self.matched_items.get(*n).cloned().ok_or_else(|| {
                NotFoundError::WorkingMemoryItem(format!("matched[{}]", n)).into()
            }),
        }
    }

    fn resolve_goal(&self, goal: &GoalRef) -> Result<String> {
        match goal {
            GoalRef::Current => self
                .goal_stack
                .current()
                .map(|g| g.id)
                .ok_or_else(|| StateError::EmptyGoalStack.into()),
            GoalRef::Id(id) => Ok(id.clone()),
            GoalRef::Variable(name) => self.variable(name),
        }
    }

    fn signal(&self, kind: SignalKind) -> Signal {
        Signal {
            production_id: self.production_id.to_string(),
            kind,
            bindings: self.bindings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::goal_stack::InMemoryGoalStack;
    use crate::infra::working_memory::InMemoryWorkingMemory;
    use recall_common::RecallError;
    use serde_json::json;

    struct Fixture {
        wm: InMemoryWorkingMemory,
        goals: InMemoryGoalStack,
        matched: Vec<String>,
        bindings: Bindings,
    }

    impl Fixture {
        fn new() -> Self {
            let wm = InMemoryWorkingMemory::new();
            wm.add(WorkingMemoryItem::with_id("wm-1", "task", "draft reply")).unwrap();
            let mut bindings = Bindings::new();
            bindings.insert("task".into(), json!("wm-1"));
            Self {
                wm,
                goals: InMemoryGoalStack::new(),
                matched: vec!["wm-1".into()],
                bindings,
            }
        }

        fn ctx(&self) -> ActionContext<'_> {
            ActionContext {
                production_id: "prod-1",
                matched_items: &self.matched,
                bindings: &self.bindings,
                working_memory: &self.wm,
                goal_stack: &self.goals,
            }
        }
    }

    #[test]
    fn test_memory_actions() {
        let f = Fixture::new();

        Action::add_item("note", "reply drafted").execute(&f.ctx()).unwrap();
        assert_eq!(f.wm.len(), 2);

        Action::set_activation(ItemRef::Variable("task".into()), 0.1)
            .execute(&f.ctx())
            .unwrap();
        assert_eq!(f.wm.get("wm-1").unwrap().activation, 0.1);

        Action::remove_item(ItemRef::Matched(0)).execute(&f.ctx()).unwrap();
        assert!(f.wm.get("wm-1").is_none());
    }

    #[test]
    fn test_goal_actions() {
        let f = Fixture::new();

        Action::push_goal("send reply", 0.9).execute(&f.ctx()).unwrap();
        assert_eq!(f.goals.current().unwrap().description, "send reply");

        Action::complete_goal(GoalRef::Current).execute(&f.ctx()).unwrap();
        assert!(f.goals.current().is_none());

        let err = Action::complete_goal(GoalRef::Current)
            .execute(&f.ctx())
            .unwrap_err();
        assert!(matches!(err, RecallError::State(StateError::EmptyGoalStack)));
    }

    #[test]
    fn test_signal_actions() {
        let f = Fixture::new();

        let signal = Action::emit("reply.ready", json!({"id": 1}))
            .execute(&f.ctx())
            .unwrap()
            .unwrap();
        assert_eq!(signal.production_id, "prod-1");
        assert!(matches!(signal.kind, SignalKind::Emit { ref event, .. } if event == "reply.ready"));
        assert_eq!(signal.bindings.get("task"), Some(&json!("wm-1")));

        assert!(Action::halt("done").execute(&f.ctx()).unwrap().is_some());
        assert_eq!(f.wm.len(), 1);
    }

    #[test]
    fn test_unbound_variable_is_not_found() {
        let f = Fixture::new();
        let err = Action::remove_item(ItemRef::Variable("missing".into()))
            .execute(&f.ctx())
            .unwrap_err();
        assert!(matches!(err, RecallError::NotFound(NotFoundError::Variable(_))));
    }

    #[test]
    fn test_action_serde_shape() {
        let action = Action::log("hello");
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json, json!({"type": "log", "message": "hello"}));
    }
}
