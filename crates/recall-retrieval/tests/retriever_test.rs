//! Integration tests for the retriever
//!
//! Exercises the public API end to end:
//! - exact lookups through the Bloom pre-screen
//! - add/remove bookkeeping across every index
//! - ranking, truncation and fitness-floor properties of every path
//! - index consistency under concurrent writers and readers

use std::collections::HashSet;

use proptest::prelude::*;
use recall_common::{RecallError, ValidationError};
use recall_retrieval::{
    ExperienceTuple, QueryContext, RetrievalMethod, RetrieverConfig, SubLinearRetriever,
};

const DIM: usize = 8;

fn create_test_retriever() -> SubLinearRetriever {
    SubLinearRetriever::new(RetrieverConfig::with_dimension(DIM)).unwrap()
}

fn unit(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[axis % DIM] = 1.0;
    v
}

fn experience(id: &str, agent: &str, tier: u32, signature: &str, fitness: f64, embedding: Vec<f32>) -> ExperienceTuple {
    ExperienceTuple::builder(id, agent)
        .tier(tier)
        .task_signature(signature)
        .outcome(fitness >= 0.5, fitness)
        .embedding(embedding)
        .build()
        .unwrap()
}

// ============================================================================
// Strategies
// ============================================================================

/// Generate a non-degenerate embedding.
fn arb_embedding() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-1.0f32..=1.0, DIM)
        .prop_filter("non-zero", |v| v.iter().any(|x| x.abs() > 1e-3))
}

/// Generate (agent index, tier, fitness, embedding) tuples.
fn arb_experiences() -> impl Strategy<Value = Vec<(usize, u32, f64, Vec<f32>)>> {
    prop::collection::vec((0usize..4, 0u32..3, 0.0f64..=1.0, arb_embedding()), 1..40)
}

#[cfg(test)]
mod exact_tests {
    use super::*;

    /// Three signatures for one agent: an exact query hits exactly one
    #[test]
    fn test_exact_signature_returns_one_result() {
        let retriever = create_test_retriever();
        retriever.add(experience("e1", "A1", 1, "classify:email", 0.7, unit(0))).unwrap();
        retriever.add(experience("e2", "A1", 1, "classify:invoice", 0.8, unit(1))).unwrap();
        retriever.add(experience("e3", "A1", 1, "extract:table", 0.9, unit(2))).unwrap();

        let result = retriever
            .retrieve(
                &QueryContext::new()
                    .agent("A1")
                    .tier(1)
                    .task_signature("classify:invoice")
                    .top_k(5),
            )
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.method.as_str(), "exact");
        assert_eq!(result.experiences[0].experience.id, "e2");
    }

    /// The signature path wins even when an embedding is supplied
    #[test]
    fn test_signature_takes_precedence_over_embedding() {
        let retriever = create_test_retriever();
        retriever.add(experience("e1", "A1", 1, "sig", 0.7, unit(0))).unwrap();

        let result = retriever
            .retrieve(&QueryContext::new().task_signature("sig").embedding(unit(3)))
            .unwrap();
        assert_eq!(result.method, RetrievalMethod::Exact);
        assert_eq!(result.ids(), vec!["e1"]);
    }

    /// Exact hits are ranked by fitness
    #[test]
    fn test_exact_ranked_by_fitness() {
        let retriever = create_test_retriever();
        retriever.add(experience("low", "A1", 1, "sig", 0.2, unit(0))).unwrap();
        retriever.add(experience("high", "A2", 1, "sig", 0.9, unit(1))).unwrap();
        retriever.add(experience("mid", "A3", 1, "sig", 0.5, unit(2))).unwrap();

        let result = retriever.retrieve(&QueryContext::new().task_signature("sig")).unwrap();
        assert_eq!(result.ids(), vec!["high", "mid", "low"]);
    }
}

#[cfg(test)]
mod semantic_tests {
    use super::*;

    /// The nearest neighbor of an indexed vector is itself
    #[test]
    fn test_semantic_finds_self() {
        let retriever = create_test_retriever();
        for axis in 0..DIM {
            retriever
                .add(experience(&format!("e{}", axis), "A1", 1, "", 1.0, unit(axis)))
                .unwrap();
        }

        let result = retriever
            .retrieve(&QueryContext::new().embedding(unit(5)).top_k(1))
            .unwrap();
        assert_eq!(result.method, RetrievalMethod::Semantic);
        assert_eq!(result.ids(), vec!["e5"]);
        assert!((result.experiences[0].similarity - 1.0).abs() < 1e-5);
    }

    /// Agent scope applies to semantic results
    #[test]
    fn test_semantic_respects_agent_scope() {
        let retriever = create_test_retriever();
        retriever.add(experience("mine", "A1", 1, "", 0.9, unit(0))).unwrap();
        retriever.add(experience("theirs", "A2", 1, "", 0.9, unit(0))).unwrap();

        let result = retriever
            .retrieve(&QueryContext::new().agent("A1").embedding(unit(0)))
            .unwrap();
        assert_eq!(result.ids(), vec!["mine"]);
    }

    /// A crowd of other agents' near neighbors cannot hide the scoped agent's item
    #[test]
    fn test_scoped_semantic_finds_off_axis_item() {
        let retriever = create_test_retriever();
        for i in 0..50 {
            let mut v = unit(0);
            v[1] = 0.001 * i as f32;
            retriever.add(experience(&format!("b{}", i), "B", 1, "", 0.9, v)).unwrap();
        }
        retriever.add(experience("a-only", "A", 1, "", 0.9, unit(3))).unwrap();

        let result = retriever
            .retrieve(&QueryContext::new().agent("A").embedding(unit(0)).top_k(1))
            .unwrap();
        assert_eq!(result.method, RetrievalMethod::Semantic);
        assert_eq!(result.ids(), vec!["a-only"]);
    }

    /// An unbounded top-k returns every live experience without overflow
    #[test]
    fn test_semantic_unbounded_top_k() {
        let retriever = create_test_retriever();
        for axis in 0..DIM {
            retriever
                .add(experience(&format!("e{}", axis), "A1", 1, "", 0.8, unit(axis)))
                .unwrap();
        }

        let result = retriever
            .retrieve(&QueryContext::new().embedding(unit(2)).top_k(usize::MAX))
            .unwrap();
        assert_eq!(result.experiences[0].experience.id, "e2");
        assert!(result.len() <= DIM);

        let scoped = retriever
            .retrieve(&QueryContext::new().agent("A1").embedding(unit(2)).top_k(usize::MAX))
            .unwrap();
        assert_eq!(scoped.len(), DIM);
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    const WRITERS: usize = 4;
    const ROUNDS: usize = 40;

    fn embedding_for(writer: usize, i: usize) -> Vec<f32> {
        let mut v = unit(writer);
        v[(writer + 1 + i) % DIM] += 0.1 * (i % 7) as f32;
        v
    }

    /// Writers churn their own IDs while readers query every path
    #[test]
    fn test_concurrent_add_remove_retrieve_stays_consistent() {
        let retriever = create_test_retriever();

        std::thread::scope(|scope| {
            for writer in 0..WRITERS {
                let retriever = &retriever;
                scope.spawn(move || {
                    let agent = format!("agent-{}", writer);
                    for i in 0..ROUNDS {
                        let stable = format!("w{}-stable-{}", writer, i);
                        let churn = format!("w{}-churn-{}", writer, i);
                        let signature = format!("task-{}", i % 5);
                        retriever
                            .add(experience(&stable, &agent, writer as u32, &signature, 0.8, embedding_for(writer, i)))
                            .unwrap();
                        retriever
                            .add(experience(&churn, &agent, writer as u32, &signature, 0.6, embedding_for(writer, i + 3)))
                            .unwrap();
                        retriever.remove(&churn).unwrap();
                    }
                });
            }

            for reader in 0..WRITERS {
                let retriever = &retriever;
                scope.spawn(move || {
                    let agent = format!("agent-{}", reader);
                    for i in 0..ROUNDS {
                        let queries = [
                            QueryContext::new().embedding(unit(reader)).top_k(10),
                            QueryContext::new().agent(agent.clone()).embedding(unit(reader)).top_k(10),
                            QueryContext::new().task_signature(format!("task-{}", i % 5)).top_k(10),
                            QueryContext::new().agent(agent.clone()).top_k(10),
                        ];
                        for query in &queries {
                            let result = retriever.retrieve(query).unwrap();
                            assert!(result.len() <= 10);

                            let ids: HashSet<&str> = result.ids().into_iter().collect();
                            assert_eq!(ids.len(), result.len(), "duplicate IDs in result");
                            for r in &result.experiences {
                                assert!(r.experience.id.starts_with('w'));
                                if let Some(agent_id) = &query.agent_id {
                                    assert_eq!(&r.experience.agent_id, agent_id);
                                }
                            }
                            for pair in result.experiences.windows(2) {
                                assert!(pair[0].score >= pair[1].score);
                            }
                        }
                    }
                });
            }
        });

        let expected = WRITERS * ROUNDS;
        assert_eq!(retriever.size(), expected);

        let stats = retriever.stats();
        assert_eq!(stats.total_experiences, expected);
        assert_eq!(stats.hnsw_nodes, expected);
        assert_eq!(stats.lsh_items, expected);
        assert_eq!(stats.lsh_postings, expected * retriever.config().lsh.num_tables);

        for writer in 0..WRITERS {
            let agent = format!("agent-{}", writer);
            let owned = retriever.get_by_agent(&agent);
            assert_eq!(owned.len(), ROUNDS);
            assert!(owned.iter().all(|e| e.id.contains("stable")));

            // every live experience is still reachable through each index
            for (i, e) in owned.iter().enumerate() {
                let exact = retriever
                    .retrieve(&QueryContext::new().agent(agent.clone()).task_signature(e.task_signature.clone()).top_k(ROUNDS))
                    .unwrap();
                assert!(exact.ids().contains(&e.id.as_str()));

                if i % 10 == 0 {
                    let semantic = retriever
                        .retrieve(&QueryContext::new().agent(agent.clone()).embedding(e.embedding.clone()).top_k(ROUNDS))
                        .unwrap();
                    assert!(semantic.ids().contains(&e.id.as_str()));
                }
            }
        }
        for i in 0..ROUNDS {
            assert!(!retriever.contains(&format!("w0-churn-{}", i)));
        }
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_dimension_fixed_at_construction() {
        let retriever = create_test_retriever();
        assert_eq!(retriever.dimension(), DIM);

        let err = retriever
            .add(experience("e1", "A1", 1, "", 0.5, vec![1.0; DIM + 1]))
            .unwrap_err();
        assert!(matches!(
            err,
            RecallError::Validation(ValidationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_retriever_returns_empty_result() {
        let retriever = create_test_retriever();
        for query in [
            QueryContext::new().task_signature("x"),
            QueryContext::new().embedding(unit(0)),
            QueryContext::new(),
        ] {
            let result = retriever.retrieve(&query).unwrap();
            assert!(result.is_empty());
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = RetrieverConfig::with_dimension(DIM);
        config.hnsw.m = 1;
        assert!(matches!(
            SubLinearRetriever::new(config),
            Err(RecallError::Config(_))
        ));
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Adding then removing every experience restores an empty retriever
    #[test]
    fn add_then_remove_restores_size(items in arb_experiences()) {
        let retriever = create_test_retriever();
        for (i, (agent, tier, fitness, embedding)) in items.iter().enumerate() {
            retriever
                .add(experience(&format!("e{}", i), &format!("A{}", agent), *tier, "", *fitness, embedding.clone()))
                .unwrap();
        }
        prop_assert_eq!(retriever.size(), items.len());

        for (i, (agent, tier, _, _)) in items.iter().enumerate() {
            let id = format!("e{}", i);
            retriever.remove(&id).unwrap();
            prop_assert!(!retriever.contains(&id));
            let agent_id = format!("A{}", agent);
            prop_assert!(retriever.get_by_agent(&agent_id).iter().all(|e| e.id != id));
            prop_assert!(retriever.get_by_tier(*tier).iter().all(|e| e.id != id));
        }

        prop_assert_eq!(retriever.size(), 0);
        let stats = retriever.stats();
        prop_assert_eq!(stats.hnsw_nodes, 0);
        prop_assert_eq!(stats.lsh_postings, 0);
    }

    /// Results never exceed top_k, are score-descending and respect the fitness floor
    #[test]
    fn retrieval_bounded_ordered_and_filtered(
        items in arb_experiences(),
        query in arb_embedding(),
        top_k in 1usize..10,
        min_fitness in 0.0f64..=1.0,
    ) {
        let retriever = create_test_retriever();
        for (i, (agent, tier, fitness, embedding)) in items.iter().enumerate() {
            retriever
                .add(experience(&format!("e{}", i), &format!("A{}", agent), *tier, "", *fitness, embedding.clone()))
                .unwrap();
        }

        for ctx in [
            QueryContext::new().embedding(query.clone()),
            QueryContext::new().agent("A0"),
            QueryContext::new().tier(1),
        ] {
            let result = retriever.retrieve(&ctx.top_k(top_k).min_fitness(min_fitness)).unwrap();
            prop_assert!(result.len() <= top_k);
            for pair in result.experiences.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            for r in &result.experiences {
                prop_assert!(r.experience.fitness_score >= min_fitness);
            }
        }
    }
}
