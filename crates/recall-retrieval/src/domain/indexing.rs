//! Exact Indices
//!
//! Hash-map postings by agent, tier and task signature, plus the set of
//! successful experiences. Postings keep insertion order.

use std::collections::{HashMap, HashSet};

use super::experience::ExperienceTuple;

/// Candidate pool for a query
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// Every stored experience
    All,
    /// Only these IDs
    Ids(HashSet<String>),
}

impl Scope {
    pub fn contains(&self, id: &str) -> bool {
        match self {
            Scope::All => true,
            Scope::Ids(ids) => ids.contains(id),
        }
    }
}

/// Multi-index for exact lookups
#[derive(Debug, Default)]
pub struct ExactIndex {
    /// Index by agent
    by_agent: HashMap<String, Vec<String>>,
    /// Index by tier
    by_tier: HashMap<u32, Vec<String>>,
    /// Index by task signature
    by_task_signature: HashMap<String, Vec<String>>,
    /// Successful experiences only
    successful: HashSet<String>,
}

impl ExactIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an experience to every posting list
    pub fn add(&mut self, experience: &ExperienceTuple) {
        let id = experience.id.clone();

        self.by_agent
            .entry(experience.agent_id.clone())
            .or_default()
            .push(id.clone());

        self.by_tier
            .entry(experience.tier_id)
            .or_default()
            .push(id.clone());

        if !experience.task_signature.is_empty() {
            self.by_task_signature
                .entry(experience.task_signature.clone())
                .or_default()
                .push(id.clone());
        }

        if experience.success {
            self.successful.insert(id);
        }
    }

    /// Remove an experience from every posting list
    pub fn remove(&mut self, experience: &ExperienceTuple) {
        let id = experience.id.as_str();

        Self::remove_from(&mut self.by_agent, &experience.agent_id, id);
        Self::remove_from(&mut self.by_tier, &experience.tier_id, id);
        Self::remove_from(&mut self.by_task_signature, &experience.task_signature, id);
        self.successful.remove(id);
    }

    fn remove_from<K>(map: &mut HashMap<K, Vec<String>>, key: &K, id: &str)
    where
        K: std::hash::Hash + Eq,
    {
        if let Some(ids) = map.get_mut(key) {
            ids.retain(|i| i != id);
            if ids.is_empty() {
                map.remove(key);
            }
        }
    }

    pub fn by_agent(&self, agent_id: &str) -> &[String] {
        self.by_agent.get(agent_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn by_tier(&self, tier_id: u32) -> &[String] {
        self.by_tier.get(&tier_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn by_task_signature(&self, signature: &str) -> &[String] {
        self.by_task_signature
            .get(signature)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_successful(&self, id: &str) -> bool {
        self.successful.contains(id)
    }

    /// Resolve the candidate pool for agent/tier filters
    ///
    /// With an agent: that agent's experiences, widened by the tier's
    /// experiences when `include_tier`, or to everything when
    /// `include_collective`. Without an agent: the tier if given, else all.
    pub fn scope(
        &self,
        agent_id: Option<&str>,
        tier_id: Option<u32>,
        include_tier: bool,
        include_collective: bool,
    ) -> Scope {
        match agent_id {
            Some(_) if include_collective => Scope::All,
            Some(agent) => {
                let mut ids: HashSet<String> = self.by_agent(agent).iter().cloned().collect();
                if include_tier {
                    if let Some(tier) = tier_id {
                        ids.extend(self.by_tier(tier).iter().cloned());
                    }
                }
                Scope::Ids(ids)
            }
            None => match tier_id {
                Some(tier) => Scope::Ids(self.by_tier(tier).iter().cloned().collect()),
                None => Scope::All,
            },
        }
    }

    /// Get statistics about the index
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            unique_agents: self.by_agent.len(),
            unique_tiers: self.by_tier.len(),
            unique_task_signatures: self.by_task_signature.len(),
            successful_experiences: self.successful.len(),
        }
    }

    pub fn clear(&mut self) {
        self.by_agent.clear();
        self.by_tier.clear();
        self.by_task_signature.clear();
        self.successful.clear();
    }
}

/// Statistics about the exact indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexStats {
    pub unique_agents: usize,
    pub unique_tiers: usize,
    pub unique_task_signatures: usize,
    pub successful_experiences: usize,
}
