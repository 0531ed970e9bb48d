//! Production System
//!
//! Forward-chaining recognize-act loop over an external working memory:
//! Match → ResolveConflict → Fire.
//!
//! All mutable state sits behind one `parking_lot::RwLock`. Actions run
//! against the collaborators with the lock released, and registered
//! callbacks are invoked only after every guard is dropped, so a callback
//! may call back into the system.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use recall_common::{NotFoundError, RecallError, Result, StateError, ValidationError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::action::{ActionContext, Signal};
use super::conflict::{rank, score};
use super::history::{FiringHistory, FiringRecord};
use super::ids::{IdGenerator, SequentialIdGenerator};
use super::learning::synthesize_chunk;
use super::matching::{CompiledProduction, MatchResult};
use super::production::Production;
use super::refraction::RefractionSet;
use crate::config::ProductionConfig;
use crate::infra::goal_stack::{GoalStack, InMemoryGoalStack};
use crate::infra::working_memory::{InMemoryWorkingMemory, WorkingMemory};

/// Called after every firing, successful or not
pub type FiredHook = Arc<dyn Fn(&FiringRecord) + Send + Sync>;
/// Called with the ranked conflict set and its winner
pub type ConflictHook = Arc<dyn Fn(&[MatchResult], &MatchResult) + Send + Sync>;
/// Called with each newly learned chunk
pub type LearnedHook = Arc<dyn Fn(&Production) + Send + Sync>;
/// Called with each pass-through signal
pub type SignalHook = Arc<dyn Fn(&Signal) + Send + Sync>;

#[derive(Clone, Default)]
struct Hooks {
    fired: Vec<FiredHook>,
    conflict: Vec<ConflictHook>,
    learned: Vec<LearnedHook>,
    signal: Vec<SignalHook>,
}

#[derive(Debug, Default)]
struct Counters {
    cycles: u64,
    fires: u64,
    successful_fires: u64,
    failed_fires: u64,
    chunks_learned: u64,
}

struct SystemState {
    productions: HashMap<String, CompiledProduction>,
    /// Insertion order; defines match order
    order: Vec<String>,
    refraction: RefractionSet,
    history: FiringHistory,
    learning_enabled: bool,
    counters: Counters,
}

/// Outcome of [`ProductionSystem::run`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Cycles that fired a production
    pub cycles: usize,
    /// Fired production IDs, in order
    pub fired: Vec<String>,
    /// Stopped because nothing matched
    pub quiescent: bool,
}

/// Statistics about the production system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_productions: usize,
    pub enabled_productions: usize,
    pub learned_productions: usize,
    pub refraction_entries: usize,
    pub history_len: usize,
    pub cycles: u64,
    pub fires: u64,
    pub successful_fires: u64,
    pub failed_fires: u64,
    pub chunks_learned: u64,
}

/// Rule engine over a working memory and goal stack
pub struct ProductionSystem {
    config: ProductionConfig,
    working_memory: Arc<dyn WorkingMemory>,
    goal_stack: Arc<dyn GoalStack>,
    ids: Arc<dyn IdGenerator>,
    state: RwLock<SystemState>,
    hooks: RwLock<Hooks>,
}

impl ProductionSystem {
    /// Create a production system over the given collaborators
    pub fn new(
        config: ProductionConfig,
        working_memory: Arc<dyn WorkingMemory>,
        goal_stack: Arc<dyn GoalStack>,
    ) -> Result<Self> {
        config.validate()?;

        let state = SystemState {
            productions: HashMap::new(),
            order: Vec::new(),
            refraction: RefractionSet::new(config.refraction_enabled),
            history: FiringHistory::new(config.max_history),
            learning_enabled: config.learning_enabled,
            counters: Counters::default(),
        };

        Ok(Self {
            config,
            working_memory,
            goal_stack,
            ids: Arc::new(SequentialIdGenerator::new()),
            state: RwLock::new(state),
            hooks: RwLock::new(Hooks::default()),
        })
    }

    /// Create a production system with in-memory collaborators
    pub fn in_memory(config: ProductionConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(InMemoryWorkingMemory::new()),
            Arc::new(InMemoryGoalStack::new()),
        )
    }

    /// Replace the ID generator
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn working_memory(&self) -> &Arc<dyn WorkingMemory> {
        &self.working_memory
    }

    pub fn goal_stack(&self) -> &Arc<dyn GoalStack> {
        &self.goal_stack
    }

    /// Get current configuration
    pub fn config(&self) -> &ProductionConfig {
        &self.config
    }

    // ============ PRODUCTION TABLE ============

    /// Add a production; assigns an ID when it has none
    #[instrument(skip(self, production), fields(name = %production.name))]
    pub fn add_production(&self, mut production: Production) -> Result<String> {
        if production.actions.is_empty() {
            return Err(ValidationError::MissingField("actions").into());
        }
        if production.id.is_empty() {
            production.id = self.ids.next_id("prod");
        }
        production.specificity = production.conditions.len();

        let compiled = CompiledProduction::compile(production)?;
        let id = compiled.production.id.clone();

        let mut state = self.state.write();
        Self::insert(&mut state, compiled, self.config.max_productions)?;

        debug!(id = %id, total = state.order.len(), "Production added");
        Ok(id)
    }

    /// Delete a production and its refraction keys
    #[instrument(skip(self))]
    pub fn remove_production(&self, id: &str) -> Result<Production> {
        let mut state = self.state.write();
        let compiled = state
            .productions
            .remove(id)
            .ok_or_else(|| NotFoundError::Production(id.to_string()))?;
        state.order.retain(|p| p != id);
        state.refraction.purge(id);

        debug!(total = state.order.len(), "Production removed");
        Ok(compiled.production)
    }

    pub fn enable(&self, id: &str) -> Result<()> {
        self.set_enabled(id, true)
    }

    pub fn disable(&self, id: &str) -> Result<()> {
        self.set_enabled(id, false)
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let mut state = self.state.write();
        let compiled = state
            .productions
            .get_mut(id)
            .ok_or_else(|| NotFoundError::Production(id.to_string()))?;
        compiled.production.enabled = enabled;
        debug!(id, enabled, "Production toggled");
        Ok(())
    }

    pub fn get_production(&self, id: &str) -> Option<Production> {
        self.state
            .read()
            .productions
            .get(id)
            .map(|c| c.production.clone())
    }

    /// Every production, in insertion order
    pub fn snapshot(&self) -> Vec<Production> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.productions.get(id))
            .map(|c| c.production.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.state.read().order.len()
    }

    // ============ RECOGNIZE-ACT ============

    /// Eligible productions in insertion order, scored
    ///
    /// Fails with [`RecallError::NoMatchingProductions`] when none match.
    pub fn match_productions(&self) -> Result<Vec<MatchResult>> {
        let matches = self.collect_matches();
        if matches.is_empty() {
            return Err(RecallError::NoMatchingProductions);
        }
        Ok(matches)
    }

    /// Ranked conflict set; empty when nothing matches
    pub fn get_conflict_set(&self) -> Vec<MatchResult> {
        let mut matches = self.collect_matches();
        rank(&mut matches);
        matches
    }

    /// Pick the highest-scoring match
    pub fn resolve_conflict(&self, matches: &[MatchResult]) -> Result<MatchResult> {
        let mut ranked = matches.to_vec();
        rank(&mut ranked);
        let winner = ranked
            .first()
            .cloned()
            .ok_or(RecallError::NoMatchingProductions)?;

        let hooks = self.hooks.read().conflict.clone();
        for hook in &hooks {
            hook(&ranked, &winner);
        }
        Ok(winner)
    }

    /// Fire a matched production
    ///
    /// Actions run in order. A failing action stops the sequence and its
    /// error is returned; earlier side effects are not rolled back.
    #[instrument(skip(self, matched), fields(id = %matched.production.id))]
    pub fn fire(&self, matched: &MatchResult) -> Result<FiringRecord> {
        let production_id = matched.production.id.clone();

        let (actions, fired_at) = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let compiled = state
                .productions
                .get_mut(&production_id)
                .ok_or_else(|| NotFoundError::Production(production_id.clone()))?;
            if !compiled.production.enabled {
                return Err(StateError::ProductionDisabled(production_id).into());
            }

            let fired_at = Utc::now();
            compiled.production.fire_count += 1;
            compiled.production.last_fired = Some(fired_at);
            let actions = compiled.production.actions.clone();

            state.refraction.mark(matched.refraction_key());
            state.counters.fires += 1;
            (actions, fired_at)
        };

        let goal_id = self.goal_stack.current().map(|g| g.id);
        let ctx = ActionContext {
            production_id: &production_id,
            matched_items: &matched.matched_items,
            bindings: &matched.bindings,
            working_memory: self.working_memory.as_ref(),
            goal_stack: self.goal_stack.as_ref(),
        };

        let mut signals = Vec::new();
        let mut failure = None;
        for action in &actions {
            match action.execute(&ctx) {
                Ok(Some(signal)) => signals.push(signal),
                Ok(None) => {}
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let record = FiringRecord {
            production_id: production_id.clone(),
            timestamp: fired_at,
            success: failure.is_none(),
            matched_items: matched.matched_items.clone(),
            bindings: matched.bindings.clone(),
            goal_id,
        };

        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            if record.success {
                if let Some(compiled) = state.productions.get_mut(&production_id) {
                    compiled.production.success_count += 1;
                }
                state.counters.successful_fires += 1;
            } else {
                state.counters.failed_fires += 1;
            }
            state.history.push(record.clone());
        }

        debug!(
            success = record.success,
            signals = signals.len(),
            "Production fired"
        );

        let hooks = self.hooks.read().clone();
        for signal in &signals {
            for hook in &hooks.signal {
                hook(signal);
            }
        }
        for hook in &hooks.fired {
            hook(&record);
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(record),
        }
    }

    /// One recognize-act cycle
    pub fn cycle(&self) -> Result<FiringRecord> {
        let matches = self.match_productions()?;
        let winner = self.resolve_conflict(&matches)?;
        self.state.write().counters.cycles += 1;
        self.fire(&winner)
    }

    /// Cycle until quiescence, an error, or `max_cycles`
    #[instrument(skip(self))]
    pub fn run(&self, max_cycles: usize) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        while summary.cycles < max_cycles {
            match self.cycle() {
                Ok(record) => {
                    summary.cycles += 1;
                    summary.fired.push(record.production_id);
                }
                Err(e) if e.is_no_match() => {
                    summary.quiescent = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            cycles = summary.cycles,
            quiescent = summary.quiescent,
            "Run finished"
        );
        Ok(summary)
    }

    // ============ REFRACTION ============

    pub fn clear_refraction(&self) {
        self.state.write().refraction.clear();
    }

    pub fn set_refraction_enabled(&self, enabled: bool) {
        self.state.write().refraction.set_enabled(enabled);
    }

    pub fn is_refraction_enabled(&self) -> bool {
        self.state.read().refraction.is_enabled()
    }

    // ============ LEARNING ============

    pub fn set_learning_enabled(&self, enabled: bool) {
        self.state.write().learning_enabled = enabled;
    }

    pub fn is_learning_enabled(&self) -> bool {
        self.state.read().learning_enabled
    }

    /// Compress a sequence of productions into a learned chunk
    #[instrument(skip(self, sequence), fields(len = sequence.len()))]
    pub fn learn_chunk(&self, name: &str, sequence: &[String]) -> Result<Production> {
        let chunk = {
            let mut state = self.state.write();
            self.learn_locked(&mut state, name, sequence)?
        };
        self.notify_learned(&chunk);
        Ok(chunk)
    }

    /// Learn a chunk from the last `length` successful firings
    #[instrument(skip(self))]
    pub fn learn_from_history(&self, name: &str, length: usize) -> Result<Production> {
        let chunk = {
            let mut state = self.state.write();
            let sequence = state.history.recent_successful(length);
            self.learn_locked(&mut state, name, &sequence)?
        };
        self.notify_learned(&chunk);
        Ok(chunk)
    }

    fn learn_locked(
        &self,
        state: &mut SystemState,
        name: &str,
        sequence: &[String],
    ) -> Result<Production> {
        if !state.learning_enabled {
            return Err(StateError::LearningDisabled.into());
        }
        let min = self.config.min_chunk_length;
        if sequence.len() < min {
            return Err(StateError::SequenceTooShort {
                len: sequence.len(),
                min,
            }
            .into());
        }

        let steps = sequence
            .iter()
            .map(|id| {
                state
                    .productions
                    .get(id)
                    .map(|c| &c.production)
                    .ok_or_else(|| RecallError::from(NotFoundError::Production(id.clone())))
            })
            .collect::<Result<Vec<&Production>>>()?;

        let mut chunk = synthesize_chunk(name, &steps).ok_or(StateError::SequenceTooShort {
            len: sequence.len(),
            min,
        })?;
        chunk.id = self.ids.next_id("chunk");

        let compiled = CompiledProduction::compile(chunk.clone())?;
        Self::insert(state, compiled, self.config.max_productions)?;
        state.counters.chunks_learned += 1;

        info!(id = %chunk.id, name, "Chunk learned");
        Ok(chunk)
    }

    // ============ OBSERVATION ============

    /// Firing records, oldest first
    pub fn firing_history(&self) -> Vec<FiringRecord> {
        self.state.read().history.records()
    }

    /// Get statistics about the production system
    pub fn get_stats(&self) -> SystemStats {
        let state = self.state.read();
        let productions = || state.productions.values().map(|c| &c.production);
        SystemStats {
            total_productions: state.order.len(),
            enabled_productions: productions().filter(|p| p.enabled).count(),
            learned_productions: productions().filter(|p| p.is_learned()).count(),
            refraction_entries: state.refraction.len(),
            history_len: state.history.len(),
            cycles: state.counters.cycles,
            fires: state.counters.fires,
            successful_fires: state.counters.successful_fires,
            failed_fires: state.counters.failed_fires,
            chunks_learned: state.counters.chunks_learned,
        }
    }

    // ============ HOOKS ============

    pub fn on_production_fired<F>(&self, hook: F)
    where
        F: Fn(&FiringRecord) + Send + Sync + 'static,
    {
        self.hooks.write().fired.push(Arc::new(hook));
    }

    pub fn on_conflict<F>(&self, hook: F)
    where
        F: Fn(&[MatchResult], &MatchResult) + Send + Sync + 'static,
    {
        self.hooks.write().conflict.push(Arc::new(hook));
    }

    pub fn on_learned<F>(&self, hook: F)
    where
        F: Fn(&Production) + Send + Sync + 'static,
    {
        self.hooks.write().learned.push(Arc::new(hook));
    }

    pub fn on_signal<F>(&self, hook: F)
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.hooks.write().signal.push(Arc::new(hook));
    }

    // ============ INTERNALS ============

    fn insert(state: &mut SystemState, compiled: CompiledProduction, max: usize) -> Result<()> {
        if state.order.len() >= max {
            return Err(StateError::CapacityReached { max }.into());
        }
        let id = compiled.production.id.clone();
        if state.productions.contains_key(&id) {
            return Err(ValidationError::DuplicateId(id).into());
        }
        state.productions.insert(id.clone(), compiled);
        state.order.push(id);
        Ok(())
    }

    fn collect_matches(&self) -> Vec<MatchResult> {
        // Snapshot before taking our lock
        let items = self.working_memory.get_all();
        let now = Utc::now();

        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.productions.get(id))
            .filter(|c| c.production.enabled)
            .filter_map(|c| {
                let inst = c.instantiate(&items)?;
                let matched = MatchResult {
                    score: score(&c.production, &self.config.strategies, now),
                    production: c.production.clone(),
                    matched_items: inst.matched_items,
                    bindings: inst.bindings,
                };
                (!state.refraction.blocks(&matched.refraction_key())).then_some(matched)
            })
            .collect()
    }

    fn notify_learned(&self, chunk: &Production) {
        let hooks = self.hooks.read().learned.clone();
        for hook in &hooks {
            hook(chunk);
        }
    }
}
