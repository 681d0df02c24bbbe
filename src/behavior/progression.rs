//! Stage attempt and outcome decisions.
//!
//! Both the willingness to attempt and the success odds are piecewise
//! functions of the power ratio (team power / stage requirement) — an
//! under-powered team tries less and wins less, in steps.

use rand::Rng;

use crate::rng::{chance, weighted_index};

/// Power ratio against a stage requirement; a missing requirement counts
/// as trivially beatable.
pub fn power_ratio(team_power: i64, required_power: i64) -> f64 {
    if required_power <= 0 {
        return 1.0;
    }
    team_power as f64 / required_power as f64
}

/// Whether the agent is willing to attempt the next stage.
pub fn should_attempt_stage(ratio: f64, rng: &mut impl Rng) -> bool {
    if ratio >= 1.2 {
        true
    } else if ratio >= 1.0 {
        chance(rng, 0.80)
    } else if ratio >= 0.8 {
        chance(rng, 0.40)
    } else {
        chance(rng, 0.10)
    }
}

/// Probability the attempt succeeds.
pub fn success_probability(ratio: f64) -> f64 {
    if ratio >= 1.3 {
        0.98
    } else if ratio >= 1.1 {
        0.85
    } else if ratio >= 1.0 {
        0.70
    } else if ratio >= 0.9 {
        0.45
    } else if ratio >= 0.8 {
        0.25
    } else {
        0.10
    }
}

/// Resolve a stage attempt. `Some(stars)` on success (1-3, correlated with
/// the power ratio), `None` on defeat.
pub fn stage_result(ratio: f64, rng: &mut impl Rng) -> Option<u32> {
    if !chance(rng, success_probability(ratio)) {
        return None;
    }
    let stars = if ratio >= 1.3 {
        3
    } else if ratio >= 1.1 {
        if chance(rng, 0.7) {
            3
        } else {
            2
        }
    } else {
        // Scraped through: usually 2 stars, sometimes 1 or 3.
        [1, 2, 3][weighted_index(rng, &[0.3, 0.5, 0.2])]
    };
    Some(stars)
}
