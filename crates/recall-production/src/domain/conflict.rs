//! Conflict Resolution
//!
//! Each eligible production is scored as Σ weight_i × metric_i over the
//! ordered strategy list, weight_i = 1/(i+1). Ranking is a stable descending
//! sort, so equal scores keep match order.

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::matching::MatchResult;
use super::production::Production;

/// Elapsed time below this counts as this for recency
const MIN_RECENCY_ELAPSED_MS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Number of conditions
    Specificity,
    /// Static priority
    Priority,
    /// Success rate × priority, or priority if never fired
    Utility,
    /// 1 / seconds since last fired, 0 if never fired
    Recency,
}

impl ConflictStrategy {
    pub fn default_order() -> Vec<Self> {
        vec![
            ConflictStrategy::Priority,
            ConflictStrategy::Specificity,
            ConflictStrategy::Utility,
            ConflictStrategy::Recency,
        ]
    }

    /// Parse a comma-separated list, e.g. `"specificity,priority"`
    pub fn parse_list(list: &str) -> anyhow::Result<Vec<Self>> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<Self>().map_err(anyhow::Error::msg))
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::Specificity => "specificity",
            ConflictStrategy::Priority => "priority",
            ConflictStrategy::Utility => "utility",
            ConflictStrategy::Recency => "recency",
        }
    }

    /// Raw metric for one production
    pub fn metric(&self, production: &Production, now: DateTime<Utc>) -> f64 {
        match self {
            ConflictStrategy::Specificity => production.specificity as f64,
            ConflictStrategy::Priority => production.priority,
            ConflictStrategy::Utility => production
                .success_rate()
                .map(|rate| rate * production.priority)
                .unwrap_or(production.priority),
            ConflictStrategy::Recency => match production.last_fired {
                Some(last) => {
                    let elapsed_ms = (now - last).num_milliseconds().max(MIN_RECENCY_ELAPSED_MS);
                    1000.0 / elapsed_ms as f64
                }
                None => 0.0,
            },
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "specificity" => Ok(ConflictStrategy::Specificity),
            "priority" => Ok(ConflictStrategy::Priority),
            "utility" => Ok(ConflictStrategy::Utility),
            "recency" => Ok(ConflictStrategy::Recency),
            other => Err(format!("unknown conflict strategy: {}", other)),
        }
    }
}

/// Weighted score over the strategy list
pub fn score(production: &Production, strategies: &[ConflictStrategy], now: DateTime<Utc>) -> f64 {
    strategies
        .iter()
        .enumerate()
        .map(|(i, strategy)| strategy.metric(production, now) / (i + 1) as f64)
        .sum()
}

/// Sort descending by score; ties keep their current order
pub fn rank(conflict_set: &mut [MatchResult]) {
    conflict_set.sort_by_key(|m| Reverse(OrderedFloat(m.score)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::matching::Bindings;
    use chrono::Duration;

    fn create_test_production(id: &str, priority: f64, specificity: usize) -> Production {
        let mut p = Production::new(id).with_id(id).priority(priority);
        p.specificity = specificity;
        p
    }

    fn create_test_match(production: Production, strategies: &[ConflictStrategy]) -> MatchResult {
        MatchResult {
            score: score(&production, strategies, Utc::now()),
            production,
            matched_items: vec![],
            bindings: Bindings::new(),
        }
    }

    #[test]
    fn test_weighted_score() {
        let p = create_test_production("p", 0.8, 3);
        let strategies = [ConflictStrategy::Specificity, ConflictStrategy::Priority];
        // 3/1 + 0.8/2
        assert!((score(&p, &strategies, Utc::now()) - 3.4).abs() < 1e-9);
    }

    #[test]
    fn test_utility_uses_success_rate() {
        let mut p = create_test_production("p", 0.8, 1);
        let now = Utc::now();
        assert_eq!(ConflictStrategy::Utility.metric(&p, now), 0.8);

        p.fire_count = 4;
        p.success_count = 2;
        assert!((ConflictStrategy::Utility.metric(&p, now) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_recency() {
        let mut p = create_test_production("p", 0.5, 1);
        let now = Utc::now();
        assert_eq!(ConflictStrategy::Recency.metric(&p, now), 0.0);

        p.last_fired = Some(now - Duration::seconds(2));
        assert!((ConflictStrategy::Recency.metric(&p, now) - 0.5).abs() < 1e-9);

        // clamped at 1 ms
        p.last_fired = Some(now);
        assert_eq!(ConflictStrategy::Recency.metric(&p, now), 1000.0);
    }

    #[test]
    fn test_rank_is_stable() {
        let strategies = ConflictStrategy::default_order();
        let mut set = vec![
            create_test_match(create_test_production("first", 0.5, 1), &strategies),
            create_test_match(create_test_production("high", 0.9, 1), &strategies),
            create_test_match(create_test_production("second", 0.5, 1), &strategies),
        ];

        rank(&mut set);
        let ids: Vec<&str> = set.iter().map(|m| m.production_id()).collect();
        assert_eq!(ids, vec!["high", "first", "second"]);
    }

    #[test]
    fn test_parse_list() {
        let parsed = ConflictStrategy::parse_list("Specificity, recency").unwrap();
        assert_eq!(parsed, vec![ConflictStrategy::Specificity, ConflictStrategy::Recency]);
        assert!(ConflictStrategy::parse_list("specificity,loudness").is_err());
    }
}
