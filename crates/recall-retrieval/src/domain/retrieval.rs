//! Sub-linear Retrieval
//!
//! Orchestrates the exact indices (agent, tier, task signature) and the two
//! approximate indices (LSH, HNSW) behind a single reader-writer lock.
//!
//! Query routing:
//! 1. task signature present → exact lookup, pre-screened by a Bloom filter
//! 2. embedding present → semantic search: LSH candidates unioned with HNSW
//!    neighbors, scored by fitness × cosine similarity. A query scoped to an
//!    agent or tier scans that pool exactly instead, since the approximate
//!    indices are global and may return only out-of-scope neighbors.
//! 3. otherwise → attribute filtering over the exact maps
//!
//! Every path applies the agent/tier scope and the fitness floor before
//! truncating to top-k. An empty result is not an error.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use recall_common::{NotFoundError, RecallError, Result, ValidationError};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::bloom::BloomFilter;
use super::experience::ExperienceTuple;
use super::hnsw::HnswGraph;
use super::indexing::{ExactIndex, IndexStats, Scope};
use super::lsh::LshIndex;
use super::vector::cosine_similarity;
use crate::config::RetrieverConfig;

/// Retrieval query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryContext {
    /// Restrict to one agent's experiences
    pub agent_id: Option<String>,
    /// Restrict to (or, with `include_tier`, widen by) a tier
    pub tier_id: Option<u32>,
    /// Exact task signature; selects the exact path
    pub task_signature: Option<String>,
    /// Query embedding; selects the semantic path when no signature is given
    pub embedding: Option<Vec<f32>>,
    /// Maximum number of results; 0 uses the configured default
    pub top_k: usize,
    /// Experiences below this fitness are never returned
    pub min_fitness_score: f64,
    /// Widen an agent query with every experience of `tier_id`
    pub include_tier: bool,
    /// Widen an agent query to all experiences
    pub include_collective: bool,
    /// Only return successful experiences
    pub successful_only: bool,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn tier(mut self, tier_id: u32) -> Self {
        self.tier_id = Some(tier_id);
        self
    }

    pub fn task_signature(mut self, signature: impl Into<String>) -> Self {
        self.task_signature = Some(signature.into());
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn min_fitness(mut self, min_fitness_score: f64) -> Self {
        self.min_fitness_score = min_fitness_score;
        self
    }

    pub fn include_tier(mut self, include: bool) -> Self {
        self.include_tier = include;
        self
    }

    pub fn include_collective(mut self, include: bool) -> Self {
        self.include_collective = include;
        self
    }

    pub fn successful_only(mut self, only: bool) -> Self {
        self.successful_only = only;
        self
    }
}

/// Which path answered a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMethod {
    Exact,
    Semantic,
    Attribute,
}

impl RetrievalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMethod::Exact => "exact",
            RetrievalMethod::Semantic => "semantic",
            RetrievalMethod::Attribute => "attribute",
        }
    }
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retrieved experience with its ranking data
#[derive(Debug, Clone)]
pub struct RetrievedExperience {
    /// The retrieved experience
    pub experience: ExperienceTuple,
    /// Cosine similarity to the query embedding (1.0 on non-semantic paths)
    pub similarity: f32,
    /// Ranking score, descending across the result
    pub score: f64,
    /// Rank in the result set
    pub rank: usize,
}

/// Answer to a retrieval query
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub experiences: Vec<RetrievedExperience>,
    pub method: RetrievalMethod,
    /// Candidates examined before filtering and truncation
    pub candidates_considered: usize,
    pub elapsed: Duration,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.experiences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiences.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.experiences
            .iter()
            .map(|r| r.experience.id.as_str())
            .collect()
    }
}

/// Statistics about the retriever
#[derive(Debug, Clone)]
pub struct RetrieverStats {
    pub total_experiences: usize,
    pub index: IndexStats,
    pub lsh_postings: usize,
    /// Unique IDs held by the LSH index
    pub lsh_items: usize,
    pub hnsw_nodes: usize,
    pub hnsw_max_level: usize,
    pub bloom_insertions: usize,
    pub bloom_estimated_fpr: f64,
}

#[derive(Debug)]
struct StoredExperience {
    experience: ExperienceTuple,
    /// Insertion sequence, used for deterministic tie-breaking
    seq: u64,
}

struct RetrieverState {
    experiences: HashMap<String, StoredExperience>,
    index: ExactIndex,
    /// Task signatures ever added since the last clear
    signatures: BloomFilter,
    lsh: LshIndex,
    hnsw: HnswGraph,
    next_seq: u64,
}

/// Experience retriever with exact, semantic and attribute paths
pub struct SubLinearRetriever {
    config: RetrieverConfig,
    state: RwLock<RetrieverState>,
}

impl SubLinearRetriever {
    /// Create a retriever; the embedding dimension is fixed from here on
    pub fn new(config: RetrieverConfig) -> Result<Self> {
        config.validate()?;

        let lsh = LshIndex::new(
            config.lsh.num_tables,
            config.lsh.hash_width,
            config.dimension,
            config.seed,
        )?;
        let mut hnsw = HnswGraph::new(
            config.dimension,
            config.hnsw.m,
            config.hnsw.ef_construction,
            config.seed.wrapping_add(1),
        )?;
        hnsw.set_ef_search(config.hnsw.ef_search);
        let signatures =
            BloomFilter::new_optimal(config.bloom.expected_items, config.bloom.false_positive_rate);

        Ok(Self {
            state: RwLock::new(RetrieverState {
                experiences: HashMap::new(),
                index: ExactIndex::new(),
                signatures,
                lsh,
                hnsw,
                next_seq: 0,
            }),
            config,
        })
    }

    /// Add an experience to every index
    #[instrument(skip(self, experience), fields(id = %experience.id, agent = %experience.agent_id))]
    pub fn add(&self, experience: ExperienceTuple) -> Result<()> {
        if experience.id.is_empty() {
            return Err(ValidationError::MissingField("id").into());
        }
        if experience.agent_id.is_empty() {
            return Err(ValidationError::MissingField("agent_id").into());
        }
        self.check_dimension(&experience.embedding)?;

        let mut state = self.state.write();
        if state.experiences.contains_key(&experience.id) {
            return Err(ValidationError::DuplicateId(experience.id).into());
        }

        state.hnsw.add(&experience.id, &experience.embedding)?;
        state.lsh.add(&experience.id, &experience.embedding)?;
        state.index.add(&experience);
        if !experience.task_signature.is_empty() {
            state.signatures.add(&experience.task_signature);
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state
            .experiences
            .insert(experience.id.clone(), StoredExperience { experience, seq });

        debug!(size = state.experiences.len(), "Experience added");
        Ok(())
    }

    /// Remove an experience from every index
    #[instrument(skip(self))]
    pub fn remove(&self, id: &str) -> Result<ExperienceTuple> {
        let mut state = self.state.write();

        let stored = state
            .experiences
            .remove(id)
            .ok_or_else(|| NotFoundError::Experience(id.to_string()))?;

        state.index.remove(&stored.experience);
        state.lsh.remove(id);
        state.hnsw.remove(id);

        debug!(size = state.experiences.len(), "Experience removed");
        Ok(stored.experience)
    }

    /// Answer a query via the exact, semantic or attribute path
    #[instrument(skip(self, query), fields(agent = ?query.agent_id, tier = ?query.tier_id))]
    pub fn retrieve(&self, query: &QueryContext) -> Result<RetrievalResult> {
        if let Some(embedding) = &query.embedding {
            self.check_dimension(embedding)?;
        }

        let started = Instant::now();
        let top_k = if query.top_k == 0 {
            self.config.default_top_k
        } else {
            query.top_k
        };

        let state = self.state.read();
        let scope = state.index.scope(
            query.agent_id.as_deref(),
            query.tier_id,
            query.include_tier,
            query.include_collective,
        );

        let (method, candidates_considered, mut scored) =
            if let Some(signature) = query.task_signature.as_deref() {
                let ids = Self::exact_candidates(&state, signature);
                let scored = Self::score_by_fitness(&state, ids.iter().map(String::as_str), &scope, query);
                (RetrievalMethod::Exact, ids.len(), scored)
            } else if let Some(embedding) = query.embedding.as_deref() {
                let (considered, scored) = match &scope {
                    Scope::All => {
                        let ids = self.semantic_candidates(&state, embedding, top_k)?;
                        let ids_iter = ids.iter().map(String::as_str);
                        (ids.len(), Self::score_by_similarity(&state, ids_iter, embedding, &scope, query))
                    }
                    Scope::Ids(ids) => {
                        let ids_iter = ids.iter().map(String::as_str);
                        (ids.len(), Self::score_by_similarity(&state, ids_iter, embedding, &scope, query))
                    }
                };
                (RetrievalMethod::Semantic, considered, scored)
            } else {
                let ids: Vec<&str> = match &scope {
                    Scope::All => state.experiences.keys().map(String::as_str).collect(),
                    Scope::Ids(ids) => ids.iter().map(String::as_str).collect(),
                };
                let considered = ids.len();
                let scored = Self::score_by_fitness(&state, ids.into_iter(), &scope, query);
                (RetrievalMethod::Attribute, considered, scored)
            };

        // Descending score; equal scores keep insertion order, except the
        // attribute path which prefers the most recent experience
        match method {
            RetrievalMethod::Attribute => scored.sort_by_key(|(stored, _, score)| {
                (
                    Reverse(OrderedFloat(*score)),
                    Reverse(stored.experience.timestamp),
                    stored.seq,
                )
            }),
            _ => scored.sort_by_key(|(stored, _, score)| (Reverse(OrderedFloat(*score)), stored.seq)),
        }
        scored.truncate(top_k);

        let experiences: Vec<RetrievedExperience> = scored
            .into_iter()
            .enumerate()
            .map(|(rank, (stored, similarity, score))| RetrievedExperience {
                experience: stored.experience.clone(),
                similarity,
                score,
                rank,
            })
            .collect();

        debug!(
            method = %method,
            candidates = candidates_considered,
            returned = experiences.len(),
            "Retrieval complete"
        );

        Ok(RetrievalResult {
            experiences,
            method,
            candidates_considered,
            elapsed: started.elapsed(),
        })
    }

    /// Experiences recorded by an agent, in insertion order
    pub fn get_by_agent(&self, agent_id: &str) -> Vec<ExperienceTuple> {
        let state = self.state.read();
        Self::collect(&state, state.index.by_agent(agent_id))
    }

    /// Experiences recorded at a tier, in insertion order
    pub fn get_by_tier(&self, tier_id: u32) -> Vec<ExperienceTuple> {
        let state = self.state.read();
        Self::collect(&state, state.index.by_tier(tier_id))
    }

    pub fn get(&self, id: &str) -> Option<ExperienceTuple> {
        self.state
            .read()
            .experiences
            .get(id)
            .map(|s| s.experience.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().experiences.contains_key(id)
    }

    /// Live experience count
    pub fn size(&self) -> usize {
        self.state.read().experiences.len()
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Get current configuration
    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Get statistics about the retriever
    pub fn stats(&self) -> RetrieverStats {
        let state = self.state.read();
        RetrieverStats {
            total_experiences: state.experiences.len(),
            index: state.index.stats(),
            lsh_postings: state.lsh.size(),
            lsh_items: state.lsh.len(),
            hnsw_nodes: state.hnsw.len(),
            hnsw_max_level: state.hnsw.max_level(),
            bloom_insertions: state.signatures.len(),
            bloom_estimated_fpr: state.signatures.estimated_false_positive_rate(),
        }
    }

    /// Drop every experience and reset the Bloom filter
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.experiences.clear();
        state.index.clear();
        state.signatures.clear();
        state.lsh.clear();
        state.hnsw.clear();
        debug!("Retriever cleared");
    }

    fn exact_candidates(state: &RetrieverState, signature: &str) -> Vec<String> {
        // Definitely-absent signatures skip the map lookup
        if !state.signatures.may_contain(signature) {
            return Vec::new();
        }
        state.index.by_task_signature(signature).to_vec()
    }

    fn semantic_candidates(
        &self,
        state: &RetrieverState,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<String>> {
        let fetch = top_k
            .saturating_mul(self.config.semantic_overfetch.max(1))
            .min(state.experiences.len());
        if fetch == 0 {
            return Ok(Vec::new());
        }

        let mut ids = state.lsh.query(embedding, fetch)?;
        let mut seen: HashSet<String> = ids.iter().cloned().collect();
        for id in state.hnsw.search_ids(embedding, fetch)? {
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn passes_filters(
        state: &RetrieverState,
        stored: &StoredExperience,
        scope: &Scope,
        query: &QueryContext,
    ) -> bool {
        let exp = &stored.experience;
        scope.contains(&exp.id)
            && exp.fitness_score >= query.min_fitness_score
            && (!query.successful_only || state.index.is_successful(&exp.id))
    }

    fn score_by_fitness<'a, 's>(
        state: &'s RetrieverState,
        ids: impl Iterator<Item = &'a str>,
        scope: &Scope,
        query: &QueryContext,
    ) -> Vec<(&'s StoredExperience, f32, f64)> {
        ids.filter_map(|id| state.experiences.get(id))
            .filter(|stored| Self::passes_filters(state, stored, scope, query))
            .map(|stored| (stored, 1.0, stored.experience.fitness_score))
            .collect()
    }

    fn score_by_similarity<'a, 's>(
        state: &'s RetrieverState,
        ids: impl Iterator<Item = &'a str>,
        embedding: &[f32],
        scope: &Scope,
        query: &QueryContext,
    ) -> Vec<(&'s StoredExperience, f32, f64)> {
        ids.filter_map(|id| state.experiences.get(id))
            .filter(|stored| Self::passes_filters(state, stored, scope, query))
            .map(|stored| {
                let similarity = cosine_similarity(embedding, &stored.experience.embedding);
                let score = stored.experience.fitness_score * similarity as f64;
                (stored, similarity, score)
            })
            .collect()
    }

    fn collect(state: &RetrieverState, ids: &[String]) -> Vec<ExperienceTuple> {
        ids.iter()
            .filter_map(|id| state.experiences.get(id))
            .map(|s| s.experience.clone())
            .collect()
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.config.dimension {
            return Err(RecallError::dimension_mismatch(
                self.config.dimension,
                embedding.len(),
            ));
        }
        Ok(())
    }
}
