//! Ranking engine - scores and orders candidates.
//!
//! ```text
//! score = w_recent·SRr + w_global·SRg + w_validator·V + w_latency·L
//!         − w_newness·N (+ w_domain·D when a target domain is requested)
//! ```
//!
//! Ranking is a pure function of the candidate snapshots: the input order
//! never influences the result.

use serde::{Deserialize, Serialize};

use agentroute_core::{CapabilitySnapshot, RankedCandidate, ScoreBreakdown};

use crate::resolver::Candidate;

/// Tunable weights and thresholds of the scoring formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub recent_success: f64,
    pub global_success: f64,
    pub validator_score: f64,
    pub latency: f64,
    pub newness_penalty: f64,
    pub domain_match: f64,

    /// Latency at or above which the latency term is 0.
    pub latency_ceiling_ms: f64,

    /// Agents with fewer validations than this take the newness penalty.
    pub newness_threshold: u64,

    /// Scores closer than this are tie-broken.
    pub tie_epsilon: f64,

    /// Latency term used before any execution was observed.
    pub unknown_latency_score: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            recent_success: 0.30,
            global_success: 0.20,
            validator_score: 0.20,
            latency: 0.15,
            newness_penalty: 0.05,
            domain_match: 0.10,
            latency_ceiling_ms: 5000.0,
            newness_threshold: 50,
            tie_epsilon: 0.05,
            unknown_latency_score: 0.5,
        }
    }
}

/// Score one snapshot. `domain_match` is `None` when no target domain was
/// requested.
pub fn score(
    snapshot: &CapabilitySnapshot,
    domain_match: Option<bool>,
    weights: &RankingWeights,
) -> ScoreBreakdown {
    let recent = snapshot.recent_success_rate;
    let global = snapshot.success_rate;
    let validator = snapshot.average_validator_score.unwrap_or(global);
    let latency = match snapshot.average_latency_ms {
        Some(ms) if weights.latency_ceiling_ms > 0.0 => {
            (1.0 - ms / weights.latency_ceiling_ms).max(0.0)
        }
        Some(_) => 0.0,
        None => weights.unknown_latency_score,
    };
    let newness = if snapshot.validation_count < weights.newness_threshold {
        1.0
    } else {
        0.0
    };
    let domain = domain_match.map(|m| if m { 1.0 } else { 0.0 });

    let total = weights.recent_success * recent
        + weights.global_success * global
        + weights.validator_score * validator
        + weights.latency * latency
        - weights.newness_penalty * newness
        + domain.map(|d| weights.domain_match * d).unwrap_or(0.0);

    ScoreBreakdown {
        recent,
        global,
        validator,
        latency,
        newness,
        domain,
        total,
    }
}

/// Score and order candidates, best first.
///
/// Candidates are first put in a total order (score descending, then slug),
/// then adjacent candidates whose scores differ by less than
/// `tie_epsilon` are reordered to prefer more validations, then lower latency.
pub fn rank(
    candidates: &[Candidate],
    requested_domain: Option<&str>,
    weights: &RankingWeights,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .iter()
        .map(|c| {
            let domain_match = requested_domain.map(|d| c.record.descriptor.in_domain(d));
            RankedCandidate {
                agent_id: c.record.descriptor.id.clone(),
                slug: c.record.descriptor.slug.clone(),
                validation_count: c.snapshot.validation_count,
                average_latency_ms: c.snapshot.average_latency_ms,
                breakdown: score(&c.snapshot, domain_match, weights),
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score()
            .total_cmp(&a.score())
            .then_with(|| a.slug.cmp(&b.slug))
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });

    // Every swap removes one inversion of the tie-break order, so this ends.
    loop {
        let mut swapped = false;
        for i in 1..ranked.len() {
            if wins_tie(&ranked[i], &ranked[i - 1], weights.tie_epsilon) {
                ranked.swap(i, i - 1);
                swapped = true;
            }
        }
        if !swapped {
            break;
        }
    }

    ranked
}

/// Whether `challenger` should move ahead of `incumbent`.
fn wins_tie(challenger: &RankedCandidate, incumbent: &RankedCandidate, epsilon: f64) -> bool {
    if (challenger.score() - incumbent.score()).abs() >= epsilon {
        return false;
    }
    if challenger.validation_count != incumbent.validation_count {
        return challenger.validation_count > incumbent.validation_count;
    }
    match (challenger.average_latency_ms, incumbent.average_latency_ms) {
        (Some(c), Some(i)) => c < i,
        (Some(_), None) => true,
        _ => false,
    }
}
