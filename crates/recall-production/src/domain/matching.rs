//! Matching
//!
//! Evaluates a production's conditions against a working-memory snapshot.
//! Every cycle re-evaluates everything; there is no incremental network.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use recall_common::{Result, ValidationError, WorkingMemoryItem};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::condition::Operand;
use super::production::Production;
use super::refraction::RefractionKey;

/// Variable name → captured attribute value
pub type Bindings = BTreeMap<String, Value>;

/// A production eligible to fire, with what it matched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// Snapshot of the production at match time
    pub production: Production,
    /// Sorted IDs of items satisfying the positive conditions
    pub matched_items: Vec<String>,
    pub bindings: Bindings,
    /// Conflict-resolution score
    pub score: f64,
}

impl MatchResult {
    pub fn production_id(&self) -> &str {
        &self.production.id
    }

    pub fn refraction_key(&self) -> RefractionKey {
        RefractionKey::new(&self.production.id, &self.matched_items)
    }
}

/// Outcome of testing one production
#[derive(Debug, Clone, PartialEq)]
pub struct Instantiation {
    pub matched_items: Vec<String>,
    pub bindings: Bindings,
}

/// A production with its regex patterns compiled
#[derive(Debug, Clone)]
pub struct CompiledProduction {
    pub production: Production,
    patterns: Vec<Option<Regex>>,
}

impl CompiledProduction {
    /// Validate operands and variable usage, and compile patterns
    pub fn compile(production: Production) -> Result<Self> {
        let mut bound: HashSet<&str> = HashSet::new();
        for condition in &production.conditions {
            if let Operand::Variable(name) = &condition.operand {
                if !bound.contains(name.as_str()) {
                    return Err(ValidationError::InvalidParameter(format!(
                        "variable '{}' is used before a condition binds it",
                        name
                    ))
                    .into());
                }
            }
            if let Some(name) = &condition.bind {
                if condition.is_negative() {
                    return Err(ValidationError::InvalidParameter(format!(
                        "negative condition cannot bind '{}'",
                        name
                    ))
                    .into());
                }
                bound.insert(name.as_str());
            }
        }

        let patterns = production
            .conditions
            .iter()
            .map(|c| c.compile())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            production,
            patterns,
        })
    }

    /// Test every condition against the snapshot
    ///
    /// Positive conditions need at least one satisfying item; negative ones
    /// need none. A bind captures the first satisfying item's value.
    pub fn instantiate(&self, items: &[WorkingMemoryItem]) -> Option<Instantiation> {
        let mut matched: BTreeSet<&str> = BTreeSet::new();
        let mut bindings = Bindings::new();

        for (condition, pattern) in self.production.conditions.iter().zip(&self.patterns) {
            let operand = match &condition.operand {
                Operand::Literal(value) => value.clone(),
                Operand::Variable(name) => bindings.get(name)?.clone(),
            };

            let mut satisfying = items.iter().filter(|item| {
                condition.comparator.apply(
                    &condition.attribute.read(item),
                    &operand,
                    pattern.as_ref(),
                )
            });

            if condition.is_negative() {
                if satisfying.next().is_some() {
                    return None;
                }
                continue;
            }

            let hits: Vec<&WorkingMemoryItem> = satisfying.collect();
            let first = hits.first()?;
            if let Some(name) = &condition.bind {
                bindings.insert(name.clone(), condition.attribute.read(first).to_json());
            }
            matched.extend(hits.into_iter().map(|item| item.id.as_str()));
        }

        Some(Instantiation {
            matched_items: matched.into_iter().map(str::to_string).collect(),
            bindings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::Action;
    use crate::domain::condition::{Attribute, Comparator, Condition};
    use serde_json::json;

    fn create_test_items() -> Vec<WorkingMemoryItem> {
        vec![
            WorkingMemoryItem::with_id("b", "task", "write report").meta("owner", "ana"),
            WorkingMemoryItem::with_id("a", "task", "review code").meta("owner", "li"),
            WorkingMemoryItem::with_id("c", "person", "Ana Silva").meta("handle", "ana"),
        ]
    }

    fn compile(production: Production) -> CompiledProduction {
        CompiledProduction::compile(production.then(Action::log("x"))).unwrap()
    }

    #[test]
    fn test_positive_conditions_collect_sorted_items() {
        let p = compile(Production::new("tasks").when(Condition::equals(Attribute::ContentType, "task")));
        let inst = p.instantiate(&create_test_items()).unwrap();
        assert_eq!(inst.matched_items, vec!["a", "b"]);
    }

    #[test]
    fn test_conjunction_fails_on_any_condition() {
        let p = compile(
            Production::new("both")
                .when(Condition::equals(Attribute::ContentType, "task"))
                .when(Condition::equals(Attribute::ContentType, "robot")),
        );
        assert!(p.instantiate(&create_test_items()).is_none());
    }

    #[test]
    fn test_negative_conditions() {
        let blocked = compile(
            Production::new("no people")
                .when(Condition::equals(Attribute::ContentType, "person").negate()),
        );
        assert!(blocked.instantiate(&create_test_items()).is_none());

        let absent = compile(
            Production::new("no deadline").when(Condition::not_exists(Attribute::Metadata("deadline".into()))),
        );
        let inst = absent.instantiate(&create_test_items()).unwrap();
        assert!(inst.matched_items.is_empty());
    }

    #[test]
    fn test_variable_binding_joins_conditions() {
        let p = compile(
            Production::new("owner present")
                .when(Condition::type_match(Attribute::Metadata("handle".into()), "string").bind("who"))
                .when(Condition::against(Attribute::Metadata("owner".into()), Comparator::Equals, "who")),
        );
        let inst = p.instantiate(&create_test_items()).unwrap();
        assert_eq!(inst.bindings.get("who"), Some(&json!("ana")));
        assert_eq!(inst.matched_items, vec!["b", "c"]);
    }

    #[test]
    fn test_unbound_variable_rejected_at_compile() {
        let result = CompiledProduction::compile(
            Production::new("bad").when(Condition::against(Attribute::Content, Comparator::Equals, "nope")),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_memory_only_matches_negative_rules() {
        let p = compile(Production::new("tasks").when(Condition::exists(Attribute::Id)));
        assert!(p.instantiate(&[]).is_none());

        let q = compile(Production::new("idle").when(Condition::not_exists(Attribute::Id)));
        assert!(q.instantiate(&[]).is_some());
    }
}
