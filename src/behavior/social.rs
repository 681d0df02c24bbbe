//! Guild and arena participation decisions.
//!
//! Independent gated Bernoulli draws on the archetype's engagement
//! parameters, gated by the player-level feature unlocks. Leaving a guild
//! is a small constant probability, independent of engagement.

use rand::Rng;

use crate::config::SimulationConfig;
use crate::models::{AgentProfile, AgentState};
use crate::rng::chance;

/// Fraction of guild engagement expressed as a daily join probability.
const GUILD_JOIN_RATE: f64 = 0.3;

/// Chance a paying player buys an extra arena attempt once the free ones
/// are gone.
const PAID_ARENA_ATTEMPT_RATE: f64 = 0.2;

pub fn should_join_guild(
    cfg: &SimulationConfig,
    profile: &AgentProfile,
    state: &AgentState,
    rng: &mut impl Rng,
) -> bool {
    if state.guild_id.is_some() {
        return false;
    }
    if state.player_level < cfg.progression.unlocks.guild {
        return false;
    }
    let engagement = cfg.archetype(profile.archetype).guild_engagement;
    chance(rng, engagement * GUILD_JOIN_RATE)
}

pub fn should_leave_guild(
    cfg: &SimulationConfig,
    state: &AgentState,
    rng: &mut impl Rng,
) -> bool {
    state.guild_id.is_some() && chance(rng, cfg.social.guilds.leave_probability)
}

pub fn should_attack_guild_boss(
    cfg: &SimulationConfig,
    profile: &AgentProfile,
    state: &AgentState,
    rng: &mut impl Rng,
) -> bool {
    if state.guild_id.is_none() || state.daily.guild_boss_done {
        return false;
    }
    chance(rng, cfg.archetype(profile.archetype).guild_engagement)
}

pub fn should_do_arena(
    cfg: &SimulationConfig,
    profile: &AgentProfile,
    state: &AgentState,
    rng: &mut impl Rng,
) -> bool {
    if state.player_level < cfg.progression.unlocks.arena {
        return false;
    }
    if state.daily.arena_attempts_left == 0 {
        // Out of free attempts: spenders sometimes buy one.
        if profile.archetype.is_spender() && state.gems >= cfg.social.arena.attempt_cost_gems {
            return chance(rng, PAID_ARENA_ATTEMPT_RATE);
        }
        return false;
    }
    chance(rng, cfg.archetype(profile.archetype).arena_engagement)
}

/// Win probability against an opponent, piecewise in the power ratio.
pub fn arena_win_probability(ratio: f64) -> f64 {
    if ratio >= 1.2 {
        0.85
    } else if ratio >= 1.0 {
        0.60
    } else if ratio >= 0.8 {
        0.35
    } else {
        0.15
    }
}

pub fn arena_battle_won(ratio: f64, rng: &mut impl Rng) -> bool {
    chance(rng, arena_win_probability(ratio))
}

/// Elo-style rating change.
pub fn arena_rating_change(k: f64, rating: i32, opponent_rating: i32, won: bool) -> i32 {
    let expected = 1.0 / (1.0 + 10f64.powf((opponent_rating - rating) as f64 / 400.0));
    let actual = if won { 1.0 } else { 0.0 };
    (k * (actual - expected)) as i32
}

/// Rank derived from rating; better rating, smaller rank number.
pub fn arena_rank_for_rating(rating: i32) -> u32 {
    (2000 - rating / 10).max(1) as u32
}
