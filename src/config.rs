//! Typed, immutable simulation configuration.
//!
//! The external loader owns parsing and merging; the core receives this
//! structure fully built and never re-parses anything at decision time.
//! `verify_contract` re-checks the invariants the loader promised (weight
//! sums, pity ordering, retention monotonicity, required keys) and refuses
//! to run on a violation — silently renormalizing would change agreed
//! semantics.
//!
//! `SimulationConfig::default()` reproduces the reference parameter set and
//! is what the test suite runs against.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ContractError, Result};
use crate::models::{Archetype, Rarity};

/// Tolerance for weight tables that must sum to 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

// =============================================================================
// TOP LEVEL
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    pub start_date: NaiveDate,
    pub duration_days: u32,
    pub installs: InstallConfig,
    pub archetypes: BTreeMap<Archetype, ArchetypeParams>,
    pub economy: EconomyConfig,
    pub gacha: GachaConfig,
    pub shop: ShopConfig,
    pub vip: VipConfig,
    pub progression: ProgressionConfig,
    pub heroes: HeroesConfig,
    pub social: SocialConfig,
    pub experiments: Vec<Experiment>,
    pub scenarios: ScenarioConfig,
    pub devices: DeviceConfig,
}

// =============================================================================
// INSTALLS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Total organic installs over the whole run (scenario overlays add more).
    pub total: u32,
    pub curve: InstallCurve,
    pub sources: BTreeMap<String, InstallSource>,
}

/// How installs are spread across the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallCurve {
    Uniform,
    /// Exponential decay: day `d` gets weight `exp(-rate * d)`.
    Decay { rate: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallSource {
    pub share: f64,
    pub retention_modifier: f64,
    pub monetization_modifier: f64,
}

// =============================================================================
// ARCHETYPES
// =============================================================================

/// Behavioral parameter record for one player archetype.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchetypeParams {
    /// Share of the install population.
    pub share: f64,
    pub retention: RetentionCurve,
    /// [min, max] sessions on a day the agent returns.
    pub sessions_per_day: (u32, u32),
    /// [min, max] session length in minutes.
    pub session_duration_min: (u32, u32),
    /// Base per-action desire to open the gacha.
    pub gacha_desire: f64,
    pub ad_watch_probability: f64,
    pub guild_engagement: f64,
    pub arena_engagement: f64,
    /// Multiplier on monetization trigger probabilities.
    pub iap_multiplier: f64,
}

/// Two-phase exponential retention decay.
///
/// `p(day) = d1 * exp(-rate * (day - 1))`, with `early_decay` through day 7
/// and `late_decay` after, floored at `floor`. Day 0 (install day) is 1.0.
/// Monotonicity across the phase switch requires `late >= 6/7 * early`;
/// `verify_contract` checks the realized curve rather than the algebra.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetentionCurve {
    pub d1: f64,
    pub early_decay: f64,
    pub late_decay: f64,
    pub floor: f64,
}

impl RetentionCurve {
    /// Base probability of returning on `day` since install, no modifiers.
    pub fn probability(&self, day: u32) -> f64 {
        if day == 0 {
            return 1.0;
        }
        let rate = if day <= 7 {
            self.early_decay
        } else {
            self.late_decay
        };
        let p = self.d1 * (-rate * (day as f64 - 1.0)).exp();
        p.max(self.floor)
    }
}

// =============================================================================
// ECONOMY
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyConfig {
    pub initial: InitialBalances,
    pub energy: EnergyConfig,
    pub stage_rewards: StageRewards,
    pub idle_rewards: IdleRewards,
    pub hero_levelup: HeroLevelupCost,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InitialBalances {
    pub gold: i64,
    pub gems: i64,
    pub summon_tickets: i64,
    pub energy: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EnergyConfig {
    pub max: i64,
    /// Minutes to regenerate one point of energy.
    pub regen_minutes: i64,
    pub stage_cost: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StageRewards {
    pub gold_base: i64,
    pub gold_per_chapter: i64,
    pub exp_base: u64,
    pub exp_per_chapter: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IdleRewards {
    pub gold_per_hour_base: f64,
    pub gold_per_stage_mult: f64,
    pub max_hours: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeroLevelupCost {
    pub gold_base: f64,
    pub gold_per_level_mult: f64,
}

// =============================================================================
// GACHA
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GachaConfig {
    pub single_gems: i64,
    pub multi_gems: i64,
    pub rates: RarityTable<f64>,
    pub pity: PityConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PityConfig {
    /// Hard pity: the pull at which a legendary is guaranteed.
    pub threshold: u32,
    /// Soft pity: pull count past which the legendary weight climbs.
    pub soft_pity_start: u32,
    /// Added legendary weight per pull past soft_pity_start.
    pub soft_pity_rate_boost: f64,
}

/// A value per hero rarity tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RarityTable<T> {
    pub common: T,
    pub rare: T,
    pub epic: T,
    pub legendary: T,
}

impl<T: Copy> RarityTable<T> {
    pub fn get(&self, rarity: Rarity) -> T {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Rare => self.rare,
            Rarity::Epic => self.epic,
            Rarity::Legendary => self.legendary,
        }
    }
}

// =============================================================================
// SHOP / MONETIZATION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopConfig {
    pub products: BTreeMap<String, Product>,
    pub ads: AdConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub display_name: String,
    pub price_usd: f64,
    #[serde(default)]
    pub gems: i64,
    #[serde(default)]
    pub summon_tickets: i64,
    /// Monthly pass only: gems granted up front and per day.
    #[serde(default)]
    pub gems_immediate: i64,
    #[serde(default)]
    pub gems_daily: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdConfig {
    pub reward_gems: i64,
    pub max_per_day: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VipConfig {
    /// Spend thresholds in USD, ascending; VIP level = count of thresholds met.
    pub thresholds: Vec<f64>,
}

impl VipConfig {
    pub fn level_for_spend(&self, total_spent_usd: f64) -> u32 {
        self.thresholds
            .iter()
            .take_while(|t| total_spent_usd >= **t)
            .count() as u32
    }
}

// =============================================================================
// PROGRESSION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    pub chapters: u32,
    pub stages_per_chapter: u32,
    pub stage_power: StagePower,
    pub player_level: PlayerLevelCurve,
    pub unlocks: FeatureUnlocks,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StagePower {
    pub base: f64,
    pub per_stage_mult: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlayerLevelCurve {
    pub exp_base: f64,
    pub exp_mult: f64,
    pub max: u32,
}

/// Player level at which each feature opens up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureUnlocks {
    pub daily_quests: u32,
    pub arena: u32,
    pub guild: u32,
}

impl FeatureUnlocks {
    /// Features that unlock exactly at `level`, for the level-up event.
    pub fn unlocked_at(&self, level: u32) -> Vec<&'static str> {
        let mut unlocked = Vec::new();
        if self.daily_quests == level {
            unlocked.push("daily_quests");
        }
        if self.arena == level {
            unlocked.push("arena");
        }
        if self.guild == level {
            unlocked.push("guild");
        }
        unlocked
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroesConfig {
    /// Catalog size per rarity.
    pub pool: RarityTable<u32>,
    pub base_power: RarityTable<i64>,
}

// =============================================================================
// SOCIAL
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    pub arena: ArenaConfig,
    pub guilds: GuildConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArenaConfig {
    pub daily_attempts: u32,
    pub attempt_cost_gems: i64,
    pub rating_start: i32,
    pub rating_k_factor: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GuildConfig {
    pub count: u32,
    pub max_members: u32,
    /// Daily probability of leaving, independent of engagement.
    pub leave_probability: f64,
}

// =============================================================================
// EXPERIMENTS
// =============================================================================

/// An A/B test: named variants with weights, each carrying multiplicative
/// effects on named behavior parameters. New experiments are pure data —
/// no code path changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub name: String,
    pub enabled: bool,
    pub variants: Vec<Variant>,
    /// Effects apply only from this day since install onward.
    #[serde(default)]
    pub activation_day: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

/// A multiplicative effect on one behavior parameter, optionally scoped to
/// a window of days since install (inclusive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Effect {
    pub parameter: String,
    pub multiplier: f64,
    #[serde(default)]
    pub day_range: Option<(u32, u32)>,
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub bad_traffic: Option<BadTraffic>,
}

/// Scripted low-quality traffic injection on a single day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadTraffic {
    /// Day number (1-based) the traffic lands on.
    pub day: u32,
    pub source_name: String,
    pub volume: u32,
    pub retention_modifier: f64,
    pub monetization_modifier: f64,
    pub bot_ratio: f64,
}

// =============================================================================
// DEVICES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Share of installs on iOS; the rest are Android.
    pub ios_share: f64,
    /// (country code, share) pairs summing to 1.0.
    pub countries: Vec<(String, f64)>,
    pub ios_models: Vec<String>,
    pub android_models: Vec<String>,
    /// (version, share) pairs summing to 1.0.
    pub app_versions: Vec<(String, f64)>,
}

// =============================================================================
// CONTRACT VERIFICATION
// =============================================================================

impl SimulationConfig {
    /// Re-check the loader's guarantees. Runs once before any day is
    /// simulated; a violation aborts the run with no output.
    pub fn verify_contract(&self) -> Result<()> {
        if self.duration_days == 0 {
            return Err(ContractError::BadValue {
                table: "simulation".to_string(),
                detail: "duration_days must be at least 1".to_string(),
            });
        }

        self.check_weight_sum(
            "archetypes",
            self.archetypes.values().map(|a| a.share),
        )?;
        self.check_weight_sum(
            "installs.sources",
            self.installs.sources.values().map(|s| s.share),
        )?;
        self.check_weight_sum(
            "devices.countries",
            self.devices.countries.iter().map(|(_, s)| *s),
        )?;
        self.check_weight_sum(
            "devices.app_versions",
            self.devices.app_versions.iter().map(|(_, s)| *s),
        )?;

        let rates = &self.gacha.rates;
        self.check_weight_sum(
            "gacha.rates",
            [rates.common, rates.rare, rates.epic, rates.legendary].into_iter(),
        )?;

        for experiment in self.experiments.iter().filter(|e| e.enabled) {
            if experiment.variants.is_empty() {
                return Err(ContractError::EmptyTable {
                    table: format!("experiments.{}", experiment.name),
                });
            }
            self.check_weight_sum(
                &format!("experiments.{}.weights", experiment.name),
                experiment.variants.iter().map(|v| v.weight),
            )?;
        }

        let pity = self.gacha.pity;
        if pity.soft_pity_start >= pity.threshold {
            return Err(ContractError::PityOrder {
                soft_start: pity.soft_pity_start,
                threshold: pity.threshold,
            });
        }

        for archetype in Archetype::all() {
            let params =
                self.archetypes
                    .get(&archetype)
                    .ok_or_else(|| ContractError::MissingKey {
                        table: "archetypes".to_string(),
                        key: archetype.as_str().to_string(),
                    })?;
            self.check_retention_monotone(archetype, &params.retention)?;
            let (min, max) = params.sessions_per_day;
            if min == 0 || max < min {
                return Err(ContractError::BadValue {
                    table: format!("archetypes.{}", archetype.as_str()),
                    detail: format!("sessions_per_day [{}, {}] is not a valid range", min, max),
                });
            }
        }

        for key in [
            "starter_pack",
            "monthly_pass",
            "gems_tier1",
            "gems_tier2",
            "gems_tier3",
            "gems_tier4",
            "gems_tier5",
        ] {
            if !self.shop.products.contains_key(key) {
                return Err(ContractError::MissingKey {
                    table: "shop.products".to_string(),
                    key: key.to_string(),
                });
            }
        }

        if self.heroes.pool.common == 0 || self.heroes.pool.legendary == 0 {
            return Err(ContractError::EmptyTable {
                table: "heroes.pool".to_string(),
            });
        }

        if self.installs.sources.is_empty() {
            return Err(ContractError::EmptyTable {
                table: "installs.sources".to_string(),
            });
        }

        Ok(())
    }

    fn check_weight_sum(
        &self,
        table: &str,
        weights: impl Iterator<Item = f64>,
    ) -> Result<()> {
        let total: f64 = weights.sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ContractError::WeightSum {
                table: table.to_string(),
                total,
            });
        }
        Ok(())
    }

    /// Evaluate the curve over the horizon rather than trusting the
    /// rate algebra: the phase switch at day 7 can introduce an upward
    /// jump if late decay is too shallow.
    fn check_retention_monotone(
        &self,
        archetype: Archetype,
        curve: &RetentionCurve,
    ) -> Result<()> {
        let mut previous = curve.probability(1);
        for day in 2..=120 {
            let p = curve.probability(day);
            if p > previous + 1e-12 {
                return Err(ContractError::RetentionNotMonotone {
                    archetype: archetype.as_str().to_string(),
                    day,
                });
            }
            previous = p;
        }
        Ok(())
    }

    pub fn archetype(&self, archetype: Archetype) -> &ArchetypeParams {
        // verify_contract guarantees every archetype is present.
        &self.archetypes[&archetype]
    }
}

// =============================================================================
// DEFAULTS
// =============================================================================

impl Default for SimulationConfig {
    fn default() -> Self {
        let mut archetypes = BTreeMap::new();
        archetypes.insert(
            Archetype::Whale,
            ArchetypeParams {
                share: 0.02,
                retention: RetentionCurve {
                    d1: 0.80,
                    early_decay: 0.050,
                    late_decay: 0.045,
                    floor: 0.15,
                },
                sessions_per_day: (3, 6),
                session_duration_min: (15, 45),
                gacha_desire: 0.70,
                ad_watch_probability: 0.10,
                guild_engagement: 0.80,
                arena_engagement: 0.70,
                iap_multiplier: 3.0,
            },
        );
        archetypes.insert(
            Archetype::Dolphin,
            ArchetypeParams {
                share: 0.08,
                retention: RetentionCurve {
                    d1: 0.70,
                    early_decay: 0.070,
                    late_decay: 0.062,
                    floor: 0.10,
                },
                sessions_per_day: (2, 5),
                session_duration_min: (12, 35),
                gacha_desire: 0.50,
                ad_watch_probability: 0.30,
                guild_engagement: 0.70,
                arena_engagement: 0.60,
                iap_multiplier: 1.5,
            },
        );
        archetypes.insert(
            Archetype::Minnow,
            ArchetypeParams {
                share: 0.15,
                retention: RetentionCurve {
                    d1: 0.60,
                    early_decay: 0.090,
                    late_decay: 0.080,
                    floor: 0.06,
                },
                sessions_per_day: (2, 4),
                session_duration_min: (10, 30),
                gacha_desire: 0.35,
                ad_watch_probability: 0.50,
                guild_engagement: 0.50,
                arena_engagement: 0.50,
                iap_multiplier: 0.8,
            },
        );
        archetypes.insert(
            Archetype::FreeEngaged,
            ArchetypeParams {
                share: 0.25,
                retention: RetentionCurve {
                    d1: 0.55,
                    early_decay: 0.100,
                    late_decay: 0.088,
                    floor: 0.04,
                },
                sessions_per_day: (2, 4),
                session_duration_min: (10, 30),
                gacha_desire: 0.30,
                ad_watch_probability: 0.60,
                guild_engagement: 0.60,
                arena_engagement: 0.55,
                iap_multiplier: 0.1,
            },
        );
        archetypes.insert(
            Archetype::FreeCasual,
            ArchetypeParams {
                share: 0.30,
                retention: RetentionCurve {
                    d1: 0.40,
                    early_decay: 0.140,
                    late_decay: 0.125,
                    floor: 0.02,
                },
                sessions_per_day: (1, 3),
                session_duration_min: (5, 15),
                gacha_desire: 0.20,
                ad_watch_probability: 0.50,
                guild_engagement: 0.30,
                arena_engagement: 0.30,
                iap_multiplier: 0.05,
            },
        );
        archetypes.insert(
            Archetype::FreeChurner,
            ArchetypeParams {
                share: 0.20,
                retention: RetentionCurve {
                    d1: 0.25,
                    early_decay: 0.250,
                    late_decay: 0.220,
                    floor: 0.01,
                },
                sessions_per_day: (1, 2),
                session_duration_min: (3, 10),
                gacha_desire: 0.10,
                ad_watch_probability: 0.30,
                guild_engagement: 0.10,
                arena_engagement: 0.20,
                iap_multiplier: 0.02,
            },
        );

        let mut sources = BTreeMap::new();
        sources.insert(
            "organic".to_string(),
            InstallSource {
                share: 0.30,
                retention_modifier: 1.10,
                monetization_modifier: 1.00,
            },
        );
        sources.insert(
            "google_ads".to_string(),
            InstallSource {
                share: 0.25,
                retention_modifier: 1.00,
                monetization_modifier: 1.00,
            },
        );
        sources.insert(
            "facebook_ads".to_string(),
            InstallSource {
                share: 0.20,
                retention_modifier: 0.95,
                monetization_modifier: 1.10,
            },
        );
        sources.insert(
            "unity_ads".to_string(),
            InstallSource {
                share: 0.15,
                retention_modifier: 0.85,
                monetization_modifier: 0.70,
            },
        );
        sources.insert(
            "influencer".to_string(),
            InstallSource {
                share: 0.10,
                retention_modifier: 1.05,
                monetization_modifier: 1.20,
            },
        );

        let mut products = BTreeMap::new();
        products.insert(
            "starter_pack".to_string(),
            Product {
                display_name: "Starter Pack".to_string(),
                price_usd: 2.99,
                gems: 300,
                summon_tickets: 5,
                gems_immediate: 0,
                gems_daily: 0,
            },
        );
        products.insert(
            "monthly_pass".to_string(),
            Product {
                display_name: "Monthly Pass".to_string(),
                price_usd: 4.99,
                gems: 0,
                summon_tickets: 0,
                gems_immediate: 300,
                gems_daily: 100,
            },
        );
        for (id, name, price, gems) in [
            ("gems_tier1", "Pile of Gems", 0.99, 100),
            ("gems_tier2", "Bag of Gems", 4.99, 550),
            ("gems_tier3", "Chest of Gems", 9.99, 1200),
            ("gems_tier4", "Vault of Gems", 19.99, 2600),
            ("gems_tier5", "Treasury of Gems", 49.99, 7000),
        ] {
            products.insert(
                id.to_string(),
                Product {
                    display_name: name.to_string(),
                    price_usd: price,
                    gems,
                    summon_tickets: 0,
                    gems_immediate: 0,
                    gems_daily: 0,
                },
            );
        }

        let experiments = vec![
            Experiment {
                name: "onboarding_length".to_string(),
                enabled: true,
                activation_day: None,
                variants: vec![
                    Variant {
                        name: "control".to_string(),
                        weight: 0.34,
                        effects: vec![],
                    },
                    Variant {
                        name: "short".to_string(),
                        weight: 0.33,
                        effects: vec![Effect {
                            parameter: "retention".to_string(),
                            multiplier: 1.05,
                            day_range: Some((1, 1)),
                        }],
                    },
                    Variant {
                        name: "extended".to_string(),
                        weight: 0.33,
                        effects: vec![Effect {
                            parameter: "retention".to_string(),
                            multiplier: 1.02,
                            day_range: Some((2, 7)),
                        }],
                    },
                ],
            },
            Experiment {
                name: "energy_regen_rate".to_string(),
                enabled: true,
                activation_day: None,
                variants: vec![
                    Variant {
                        name: "control".to_string(),
                        weight: 0.5,
                        effects: vec![],
                    },
                    Variant {
                        name: "fast".to_string(),
                        weight: 0.5,
                        effects: vec![Effect {
                            parameter: "sessions_per_day".to_string(),
                            multiplier: 1.15,
                            day_range: None,
                        }],
                    },
                ],
            },
            Experiment {
                name: "gacha_pity_display".to_string(),
                enabled: true,
                activation_day: None,
                variants: vec![
                    Variant {
                        name: "hidden".to_string(),
                        weight: 0.5,
                        effects: vec![],
                    },
                    Variant {
                        name: "visible".to_string(),
                        weight: 0.5,
                        effects: vec![Effect {
                            parameter: "gacha_desire".to_string(),
                            multiplier: 1.3,
                            day_range: None,
                        }],
                    },
                ],
            },
            Experiment {
                name: "starter_pack_price".to_string(),
                enabled: true,
                activation_day: None,
                variants: vec![
                    Variant {
                        name: "low".to_string(),
                        weight: 0.33,
                        effects: vec![
                            Effect {
                                parameter: "iap.starter_pack_offer".to_string(),
                                multiplier: 1.3,
                                day_range: None,
                            },
                            Effect {
                                parameter: "price.starter_pack".to_string(),
                                multiplier: 0.67,
                                day_range: None,
                            },
                        ],
                    },
                    Variant {
                        name: "base".to_string(),
                        weight: 0.34,
                        effects: vec![],
                    },
                    Variant {
                        name: "high".to_string(),
                        weight: 0.33,
                        effects: vec![
                            Effect {
                                parameter: "iap.starter_pack_offer".to_string(),
                                multiplier: 0.75,
                                day_range: None,
                            },
                            Effect {
                                parameter: "price.starter_pack".to_string(),
                                multiplier: 1.67,
                                day_range: None,
                            },
                        ],
                    },
                ],
            },
            Experiment {
                name: "ad_reward_amount".to_string(),
                enabled: true,
                activation_day: None,
                variants: vec![
                    Variant {
                        name: "control".to_string(),
                        weight: 0.5,
                        effects: vec![],
                    },
                    Variant {
                        name: "double".to_string(),
                        weight: 0.5,
                        effects: vec![
                            Effect {
                                parameter: "ad_reward".to_string(),
                                multiplier: 2.0,
                                day_range: None,
                            },
                            Effect {
                                parameter: "ad_watch".to_string(),
                                multiplier: 1.2,
                                day_range: None,
                            },
                            Effect {
                                parameter: "iap".to_string(),
                                multiplier: 0.9,
                                day_range: None,
                            },
                        ],
                    },
                ],
            },
            Experiment {
                name: "late_game_offer".to_string(),
                enabled: true,
                activation_day: Some(30),
                variants: vec![
                    Variant {
                        name: "control".to_string(),
                        weight: 0.5,
                        effects: vec![],
                    },
                    Variant {
                        name: "discount".to_string(),
                        weight: 0.5,
                        effects: vec![
                            Effect {
                                parameter: "retention".to_string(),
                                multiplier: 1.05,
                                day_range: Some((30, 60)),
                            },
                            Effect {
                                parameter: "iap.late_game_offer".to_string(),
                                multiplier: 1.4,
                                day_range: None,
                            },
                        ],
                    },
                ],
            },
        ];

        Self {
            seed: 20250101,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
            duration_days: 90,
            installs: InstallConfig {
                total: 50_000,
                curve: InstallCurve::Decay { rate: 0.02 },
                sources,
            },
            archetypes,
            economy: EconomyConfig {
                initial: InitialBalances {
                    gold: 1000,
                    gems: 100,
                    summon_tickets: 5,
                    energy: 120,
                },
                energy: EnergyConfig {
                    max: 120,
                    regen_minutes: 6,
                    stage_cost: 6,
                },
                stage_rewards: StageRewards {
                    gold_base: 100,
                    gold_per_chapter: 50,
                    exp_base: 20,
                    exp_per_chapter: 10,
                },
                idle_rewards: IdleRewards {
                    gold_per_hour_base: 500.0,
                    gold_per_stage_mult: 0.05,
                    max_hours: 12.0,
                },
                hero_levelup: HeroLevelupCost {
                    gold_base: 100.0,
                    gold_per_level_mult: 1.15,
                },
            },
            gacha: GachaConfig {
                single_gems: 300,
                multi_gems: 2700,
                rates: RarityTable {
                    common: 0.55,
                    rare: 0.30,
                    epic: 0.13,
                    legendary: 0.02,
                },
                pity: PityConfig {
                    threshold: 90,
                    soft_pity_start: 75,
                    soft_pity_rate_boost: 0.05,
                },
            },
            shop: ShopConfig {
                products,
                ads: AdConfig {
                    reward_gems: 30,
                    max_per_day: 5,
                },
            },
            vip: VipConfig {
                thresholds: vec![
                    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0,
                ],
            },
            progression: ProgressionConfig {
                chapters: 20,
                stages_per_chapter: 10,
                stage_power: StagePower {
                    base: 100.0,
                    per_stage_mult: 1.08,
                },
                player_level: PlayerLevelCurve {
                    exp_base: 100.0,
                    exp_mult: 1.12,
                    max: 100,
                },
                unlocks: FeatureUnlocks {
                    daily_quests: 5,
                    arena: 10,
                    guild: 15,
                },
            },
            heroes: HeroesConfig {
                pool: RarityTable {
                    common: 20,
                    rare: 15,
                    epic: 10,
                    legendary: 5,
                },
                base_power: RarityTable {
                    common: 100,
                    rare: 200,
                    epic: 400,
                    legendary: 800,
                },
            },
            social: SocialConfig {
                arena: ArenaConfig {
                    daily_attempts: 5,
                    attempt_cost_gems: 50,
                    rating_start: 1000,
                    rating_k_factor: 32.0,
                },
                guilds: GuildConfig {
                    count: 200,
                    max_members: 30,
                    leave_probability: 0.005,
                },
            },
            experiments,
            scenarios: ScenarioConfig::default(),
            devices: DeviceConfig {
                ios_share: 0.45,
                countries: vec![
                    ("US".to_string(), 0.25),
                    ("JP".to_string(), 0.12),
                    ("KR".to_string(), 0.10),
                    ("DE".to_string(), 0.08),
                    ("BR".to_string(), 0.10),
                    ("RU".to_string(), 0.07),
                    ("other".to_string(), 0.28),
                ],
                ios_models: vec![
                    "iPhone 12".to_string(),
                    "iPhone 13".to_string(),
                    "iPhone 14".to_string(),
                    "iPhone 15".to_string(),
                    "iPad Air".to_string(),
                ],
                android_models: vec![
                    "Samsung Galaxy S21".to_string(),
                    "Samsung Galaxy S23".to_string(),
                    "Pixel 6".to_string(),
                    "Pixel 8".to_string(),
                    "Xiaomi Mi 11".to_string(),
                    "OnePlus 9".to_string(),
                ],
                app_versions: vec![
                    ("1.8.0".to_string(), 0.05),
                    ("1.9.0".to_string(), 0.15),
                    ("2.0.0".to_string(), 0.30),
                    ("2.1.0".to_string(), 0.50),
                ],
            },
        }
    }
}
