//! Return/churn decisions.
//!
//! The base curve is the archetype's two-phase exponential decay; the
//! modifier chain multiplies in install-source quality, experiment effects,
//! and engagement signals, then clamps before a single Bernoulli draw.
//! Permanent churn is a separate, lower-probability roll made only on days
//! the agent does not return — a skipped day is not churn.

use rand::Rng;

use crate::behavior::{clamp_probability, experiments};
use crate::config::SimulationConfig;
use crate::models::{AgentProfile, AgentState};
use crate::rng::chance;

/// Retention penalty after more than this many consecutive stage losses.
const LOSS_STREAK_THRESHOLD: u32 = 3;
const LOSS_STREAK_PENALTY: f64 = 0.85;
const RECENT_LEGENDARY_BONUS: f64 = 1.15;
const GUILD_MEMBER_BONUS: f64 = 1.10;
const BOT_RETENTION_PENALTY: f64 = 0.3;

/// Base retention probability for an archetype on `day` since install,
/// before any modifiers. Day 0 is the install day and always returns 1.0.
pub fn retention_probability(cfg: &SimulationConfig, profile: &AgentProfile, day: u32) -> f64 {
    cfg.archetype(profile.archetype).retention.probability(day)
}

/// Composed probability that the agent opens the game today.
pub fn composed_return_probability(
    cfg: &SimulationConfig,
    profile: &AgentProfile,
    state: &AgentState,
    day: u32,
) -> f64 {
    let base = retention_probability(cfg, profile, day);

    let mut modifiers = profile.source_retention_mod;
    modifiers *= experiments::compose_effects(cfg, profile, "retention", day);

    if state.consecutive_losses > LOSS_STREAK_THRESHOLD {
        modifiers *= LOSS_STREAK_PENALTY;
    }
    if state.legendary_recently {
        modifiers *= RECENT_LEGENDARY_BONUS;
    }
    if state.guild_id.is_some() {
        modifiers *= GUILD_MEMBER_BONUS;
    }
    if profile.is_bot {
        modifiers *= BOT_RETENTION_PENALTY;
    }

    clamp_probability(base * modifiers)
}

/// One Bernoulli draw against the composed return probability.
pub fn will_return_today(
    cfg: &SimulationConfig,
    profile: &AgentProfile,
    state: &AgentState,
    day: u32,
    rng: &mut impl Rng,
) -> bool {
    if state.lifecycle.is_churned() {
        return false;
    }
    chance(rng, composed_return_probability(cfg, profile, state, day))
}

/// Probability the agent abandons the game for good, given it did not
/// return today. Long-tenured absences churn harder.
pub fn permanent_churn_probability(day: u32) -> f64 {
    if day <= 7 {
        0.1
    } else if day <= 30 {
        0.3
    } else if day <= 60 {
        0.5
    } else {
        0.7
    }
}

pub fn rolls_permanent_churn(day: u32, rng: &mut impl Rng) -> bool {
    chance(rng, permanent_churn_probability(day))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::AgentFactory;
    use crate::rng::RandomStream;

    fn setup() -> (SimulationConfig, AgentProfile, AgentState) {
        let cfg = SimulationConfig::default();
        let streams = RandomStream::new(cfg.seed);
        let mut factory = AgentFactory::new();
        let (profile, state) =
            factory.create_agent(&cfg, &streams, cfg.start_date, "google_ads", (1.0, 1.0), false);
        (cfg, profile, state)
    }

    #[test]
    fn test_install_day_always_returns() {
        let (cfg, profile, _) = setup();
        assert_eq!(retention_probability(&cfg, &profile, 0), 1.0);
    }

    #[test]
    fn test_base_retention_non_increasing() {
        let (cfg, profile, _) = setup();
        let mut previous = retention_probability(&cfg, &profile, 1);
        for day in 2..=180 {
            let p = retention_probability(&cfg, &profile, day);
            assert!(
                p <= previous + 1e-12,
                "retention increased at day {}: {} > {}",
                day,
                p,
                previous
            );
            previous = p;
        }
    }

    #[test]
    fn test_composed_probability_clamped() {
        let (mut cfg, mut profile, mut state) = setup();
        // Push everything up: perfect base retention, guild, legendary.
        for params in cfg.archetypes.values_mut() {
            params.retention.d1 = 1.0;
            params.retention.early_decay = 0.0;
            params.retention.late_decay = 0.0;
            params.retention.floor = 1.0;
        }
        profile.source_retention_mod = 1.5;
        state.guild_id = Some("guild_0001".to_string());
        state.legendary_recently = true;

        let p = composed_return_probability(&cfg, &profile, &state, 3);
        assert_eq!(p, crate::behavior::MAX_COMPOSED_PROBABILITY);
    }

    #[test]
    fn test_loss_streak_and_guild_modifiers() {
        let (cfg, profile, mut state) = setup();
        let baseline = composed_return_probability(&cfg, &profile, &state, 5);

        state.consecutive_losses = 5;
        let punished = composed_return_probability(&cfg, &profile, &state, 5);
        assert!(punished < baseline);

        state.consecutive_losses = 0;
        state.guild_id = Some("guild_0001".to_string());
        let boosted = composed_return_probability(&cfg, &profile, &state, 5);
        assert!(boosted > baseline);
    }

    #[test]
    fn test_bot_penalty() {
        let (cfg, mut profile, state) = setup();
        let baseline = composed_return_probability(&cfg, &profile, &state, 2);
        profile.is_bot = true;
        let bot = composed_return_probability(&cfg, &profile, &state, 2);
        assert!(bot < baseline * 0.5);
    }

    #[test]
    fn test_churned_agent_never_returns() {
        let (cfg, profile, mut state) = setup();
        state.lifecycle = crate::models::Lifecycle::Churned {
            on: cfg.start_date,
        };
        let mut rng = RandomStream::new(1).derive("test", "churned");
        for _ in 0..100 {
            assert!(!will_return_today(&cfg, &profile, &state, 1, &mut rng));
        }
    }

    #[test]
    fn test_permanent_churn_tiers() {
        assert_eq!(permanent_churn_probability(3), 0.1);
        assert_eq!(permanent_churn_probability(20), 0.3);
        assert_eq!(permanent_churn_probability(45), 0.5);
        assert_eq!(permanent_churn_probability(120), 0.7);
    }
}
