//! In-app purchase trigger decisions and product selection.

use rand::Rng;

use crate::behavior::{clamp_probability, experiments};
use crate::config::SimulationConfig;
use crate::models::{AgentProfile, AgentState, Archetype};
use crate::rng::chance;

/// Hard gate: free archetypes convert at 0.1% regardless of trigger.
const FREE_CONVERSION_GATE: f64 = 0.001;

/// Situations that put a purchase in front of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseTrigger {
    StarterPackOffer,
    OutOfGemsGacha,
    OutOfEnergy,
    PityClose,
    LimitedBannerEnding,
    StuckProgression,
    MonthlyPassReminder,
    LateGameOffer,
}

impl PurchaseTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseTrigger::StarterPackOffer => "starter_pack_offer",
            PurchaseTrigger::OutOfGemsGacha => "out_of_gems_gacha",
            PurchaseTrigger::OutOfEnergy => "out_of_energy",
            PurchaseTrigger::PityClose => "pity_close",
            PurchaseTrigger::LimitedBannerEnding => "limited_banner_ending",
            PurchaseTrigger::StuckProgression => "stuck_progression",
            PurchaseTrigger::MonthlyPassReminder => "monthly_pass_reminder",
            PurchaseTrigger::LateGameOffer => "late_game_offer",
        }
    }

    /// Base conversion probability before any multipliers.
    pub fn base_probability(&self) -> f64 {
        match self {
            PurchaseTrigger::StarterPackOffer => 0.15,
            PurchaseTrigger::OutOfGemsGacha => 0.08,
            PurchaseTrigger::OutOfEnergy => 0.03,
            PurchaseTrigger::PityClose => 0.12,
            PurchaseTrigger::LimitedBannerEnding => 0.10,
            PurchaseTrigger::StuckProgression => 0.05,
            PurchaseTrigger::MonthlyPassReminder => 0.20,
            PurchaseTrigger::LateGameOffer => 0.10,
        }
    }
}

/// Composed probability that the agent goes through with a purchase for
/// this trigger, before the free-archetype gate.
pub fn composed_purchase_probability(
    cfg: &SimulationConfig,
    profile: &AgentProfile,
    trigger: PurchaseTrigger,
    day: u32,
) -> f64 {
    let mut p = trigger.base_probability();
    p *= cfg.archetype(profile.archetype).iap_multiplier;
    p *= profile.source_monetization_mod;
    p *= experiments::compose_effects(cfg, profile, "iap", day);
    p *= experiments::compose_effects(cfg, profile, &format!("iap.{}", trigger.as_str()), day);
    clamp_probability(p)
}

/// Decide whether the agent attempts the purchase.
pub fn should_attempt_purchase(
    cfg: &SimulationConfig,
    profile: &AgentProfile,
    trigger: PurchaseTrigger,
    day: u32,
    rng: &mut impl Rng,
) -> bool {
    if profile.archetype.is_free() && !chance(rng, FREE_CONVERSION_GATE) {
        return false;
    }
    chance(rng, composed_purchase_probability(cfg, profile, trigger, day))
}

/// Which product the agent buys: first-purchase and subscription
/// completion come first, then an archetype-tiered gem pack.
pub fn select_product(
    profile: &AgentProfile,
    state: &AgentState,
    trigger: PurchaseTrigger,
    rng: &mut impl Rng,
) -> &'static str {
    if trigger == PurchaseTrigger::StarterPackOffer && !state.bought_starter_pack {
        return "starter_pack";
    }
    if trigger == PurchaseTrigger::MonthlyPassReminder && state.monthly_pass.is_none() {
        return "monthly_pass";
    }

    match profile.archetype {
        Archetype::Whale => ["gems_tier4", "gems_tier5"][rng.gen_range(0..2)],
        Archetype::Dolphin => ["gems_tier2", "gems_tier3", "gems_tier4"][rng.gen_range(0..3)],
        _ => ["gems_tier1", "gems_tier2"][rng.gen_range(0..2)],
    }
}

/// Whether the agent takes a rewarded-ad opportunity. Gated by the daily
/// cap; a gem-rich agent cares less.
pub fn should_watch_ad(
    cfg: &SimulationConfig,
    profile: &AgentProfile,
    state: &AgentState,
    day: u32,
    rng: &mut impl Rng,
) -> bool {
    if state.daily.ads_watched_today >= cfg.shop.ads.max_per_day {
        return false;
    }
    let mut p = cfg.archetype(profile.archetype).ad_watch_probability;
    p *= experiments::compose_effects(cfg, profile, "ad_watch", day);
    if state.gems > 1000 {
        p *= 0.7;
    }
    chance(rng, clamp_probability(p))
}

/// Price after experiment effects. Only the starter pack is price-tested
/// in the default experiment set, but any product can carry a
/// `price.<product>` parameter.
pub fn effective_price(
    cfg: &SimulationConfig,
    profile: &AgentProfile,
    product_id: &str,
    base_price: f64,
    day: u32,
) -> f64 {
    let parameter = format!("price.{}", product_id);
    let multiplier = experiments::compose_effects(cfg, profile, &parameter, day);
    (base_price * multiplier * 100.0).round() / 100.0
}
