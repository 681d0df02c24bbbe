//! Agent data model: closed enums, the immutable install-time profile, and
//! the mutable per-agent state.
//!
//! The profile/state split keeps everything fixed at install (identity,
//! archetype, experiment assignments) out of the mutation path, and the
//! `Lifecycle` tag makes the churn transition explicit — a churned agent
//! cannot be "partially active".

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// =============================================================================
// CLOSED ENUMS
// =============================================================================

/// Player archetype. Closed set; every archetype maps to a typed parameter
/// record in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Whale,
    Dolphin,
    Minnow,
    FreeEngaged,
    FreeCasual,
    FreeChurner,
}

impl Archetype {
    pub fn all() -> [Archetype; 6] {
        [
            Archetype::Whale,
            Archetype::Dolphin,
            Archetype::Minnow,
            Archetype::FreeEngaged,
            Archetype::FreeCasual,
            Archetype::FreeChurner,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Whale => "whale",
            Archetype::Dolphin => "dolphin",
            Archetype::Minnow => "minnow",
            Archetype::FreeEngaged => "free_engaged",
            Archetype::FreeCasual => "free_casual",
            Archetype::FreeChurner => "free_churner",
        }
    }

    /// Free archetypes almost never convert to paying.
    pub fn is_free(&self) -> bool {
        matches!(
            self,
            Archetype::FreeEngaged | Archetype::FreeCasual | Archetype::FreeChurner
        )
    }

    /// Paying archetypes willing to drop gems on multi-pulls and arena.
    pub fn is_spender(&self) -> bool {
        matches!(self, Archetype::Whale | Archetype::Dolphin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn all() -> [Rarity; 4] {
        [Rarity::Common, Rarity::Rare, Rarity::Epic, Rarity::Legendary]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeroClass {
    Warrior,
    Mage,
    Archer,
    Healer,
    Tank,
}

impl HeroClass {
    pub fn all() -> [HeroClass; 5] {
        [
            HeroClass::Warrior,
            HeroClass::Mage,
            HeroClass::Archer,
            HeroClass::Healer,
            HeroClass::Tank,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Ios,
    Android,
}

/// Spendable currencies. Energy is a currency for ledger purposes: it has
/// sources (regen), sinks (stage entry), and a non-negative balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    Gold,
    Gems,
    SummonTickets,
    Energy,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Gold => "gold",
            Currency::Gems => "gems",
            Currency::SummonTickets => "summon_tickets",
            Currency::Energy => "energy",
        }
    }
}

// =============================================================================
// PROFILE (immutable)
// =============================================================================

/// Everything fixed at install time.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub user_id: String,
    pub device_id: String,
    pub archetype: Archetype,
    pub install_date: NaiveDate,
    pub install_source: String,
    pub platform: Platform,
    pub device_model: String,
    pub os_version: String,
    pub app_version: String,
    pub country: String,
    pub language: String,
    pub is_bot: bool,
    /// Quality modifiers inherited from the install source (or a scenario
    /// overlay for injected traffic).
    pub source_retention_mod: f64,
    pub source_monetization_mod: f64,
    /// Experiment name -> assigned variant. Deterministic in
    /// (seed, experiment, user) and fixed for the agent's lifetime.
    pub experiments: BTreeMap<String, String>,
}

impl AgentProfile {
    pub fn days_since_install(&self, date: NaiveDate) -> u32 {
        (date - self.install_date).num_days().max(0) as u32
    }

    pub fn variant(&self, experiment: &str) -> Option<&str> {
        self.experiments.get(experiment).map(String::as_str)
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Agent lifecycle tag. Agents are created `Active` at install;
/// `Churned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Churned { on: NaiveDate },
}

impl Lifecycle {
    pub fn is_churned(&self) -> bool {
        matches!(self, Lifecycle::Churned { .. })
    }
}

// =============================================================================
// HEROES
// =============================================================================

/// A hero owned by an agent. Template data (rarity, base power) lives in
/// the world catalog; power derives from level and stars.
#[derive(Debug, Clone)]
pub struct HeroInstance {
    pub hero_id: String,
    pub level: u32,
    pub stars: u32,
    pub duplicates: u32,
}

pub const POWER_PER_HERO_LEVEL: i64 = 10;
pub const STAR_POWER_MULTIPLIER: f64 = 1.2;
pub const TEAM_SIZE: usize = 5;
pub const MAX_HERO_LEVEL: u32 = 100;

impl HeroInstance {
    pub fn new(hero_id: String) -> Self {
        Self {
            hero_id,
            level: 1,
            stars: 1,
            duplicates: 0,
        }
    }

    pub fn power(&self, base_power: i64) -> i64 {
        let level_bonus = (self.level as i64 - 1) * POWER_PER_HERO_LEVEL;
        let star_bonus = STAR_POWER_MULTIPLIER.powi(self.stars as i32 - 1);
        ((base_power + level_bonus) as f64 * star_bonus) as i64
    }

    /// Duplicates consumed by the next star-up.
    pub fn duplicates_for_next_star(&self) -> u32 {
        1 << (self.stars - 1)
    }
}

// =============================================================================
// DAILY STATE
// =============================================================================

/// Counters reset at the start of each simulated day.
#[derive(Debug, Clone, Default)]
pub struct DailyCounters {
    pub sessions_today: u32,
    pub ads_watched_today: u32,
    pub arena_attempts_left: u32,
    pub guild_boss_done: bool,
    pub daily_login_claimed: bool,
    pub idle_claimed: bool,
    pub quests: Vec<QuestProgress>,
}

#[derive(Debug, Clone)]
pub struct QuestProgress {
    pub quest_id: &'static str,
    pub name: &'static str,
    pub target: u32,
    pub current: u32,
    pub completed: bool,
    pub reward_currency: Currency,
    pub reward_amount: i64,
}

#[derive(Debug, Clone)]
pub struct MonthlyPass {
    pub started: NaiveDate,
    pub days_claimed: u32,
}

// =============================================================================
// AGENT STATE (mutable)
// =============================================================================

/// The full mutable state of one agent.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub lifecycle: Lifecycle,

    // Progression
    pub player_level: u32,
    pub player_exp: u64,
    pub current_chapter: u32,
    pub current_stage: u32,
    pub max_chapter: u32,
    pub max_stage: u32,
    pub total_stages_cleared: u64,
    pub tutorial_completed: bool,

    // Currencies
    pub gold: i64,
    pub gems: i64,
    pub summon_tickets: i64,
    pub energy: i64,
    pub energy_last_update: Option<NaiveDateTime>,

    // Monetization
    pub total_spent_usd: f64,
    pub vip_level: u32,
    pub vip_points: u64,
    pub purchase_count: u32,
    pub bought_starter_pack: bool,
    pub monthly_pass: Option<MonthlyPass>,

    // Heroes
    pub heroes: BTreeMap<String, HeroInstance>,
    pub team: Vec<String>,
    pub team_power: i64,

    // Gacha
    pub pity_counter: u32,
    pub total_gacha_pulls: u64,

    // Social
    pub guild_id: Option<String>,
    pub guild_joined: Option<NaiveDate>,
    pub arena_rank: u32,
    pub arena_rating: i32,

    // Daily
    pub daily: DailyCounters,

    // Engagement
    pub total_sessions: u64,
    pub total_playtime_sec: u64,
    pub last_session_date: Option<NaiveDate>,
    pub last_session_end: Option<NaiveDateTime>,
    pub login_streak: u32,
    pub consecutive_losses: u32,
    pub legendary_recently: bool,

    /// Lifetime count of events emitted for this agent; drives
    /// deterministic event ids.
    pub events_emitted: u64,
}

impl AgentState {
    pub fn new(gold: i64, gems: i64, summon_tickets: i64, energy: i64, arena_rating: i32) -> Self {
        Self {
            lifecycle: Lifecycle::Active,
            player_level: 1,
            player_exp: 0,
            current_chapter: 1,
            current_stage: 1,
            max_chapter: 1,
            max_stage: 1,
            total_stages_cleared: 0,
            tutorial_completed: false,
            gold,
            gems,
            summon_tickets,
            energy,
            energy_last_update: None,
            total_spent_usd: 0.0,
            vip_level: 0,
            vip_points: 0,
            purchase_count: 0,
            bought_starter_pack: false,
            monthly_pass: None,
            heroes: BTreeMap::new(),
            team: Vec::new(),
            team_power: 0,
            pity_counter: 0,
            total_gacha_pulls: 0,
            guild_id: None,
            guild_joined: None,
            arena_rank: 0,
            arena_rating,
            daily: DailyCounters::default(),
            total_sessions: 0,
            total_playtime_sec: 0,
            last_session_date: None,
            last_session_end: None,
            login_streak: 0,
            consecutive_losses: 0,
            legendary_recently: false,
            events_emitted: 0,
        }
    }

    pub fn balance(&self, currency: Currency) -> i64 {
        match currency {
            Currency::Gold => self.gold,
            Currency::Gems => self.gems,
            Currency::SummonTickets => self.summon_tickets,
            Currency::Energy => self.energy,
        }
    }

    /// Credit `amount` and return the post-transaction balance.
    pub fn credit(&mut self, currency: Currency, amount: i64) -> i64 {
        debug_assert!(amount >= 0);
        let slot = self.balance_mut(currency);
        *slot += amount;
        *slot
    }

    /// Debit `amount` if affordable and return the post-transaction
    /// balance; `None` means the sink was rejected and nothing changed.
    /// Balances can never go negative through this path.
    pub fn try_debit(&mut self, currency: Currency, amount: i64) -> Option<i64> {
        debug_assert!(amount >= 0);
        let slot = self.balance_mut(currency);
        if *slot < amount {
            return None;
        }
        *slot -= amount;
        Some(*slot)
    }

    fn balance_mut(&mut self, currency: Currency) -> &mut i64 {
        match currency {
            Currency::Gold => &mut self.gold,
            Currency::Gems => &mut self.gems,
            Currency::SummonTickets => &mut self.summon_tickets,
            Currency::Energy => &mut self.energy,
        }
    }

    /// Reset daily counters. Runs once per simulated day before sessions.
    pub fn reset_daily(&mut self, arena_attempts: u32) {
        self.daily = DailyCounters {
            sessions_today: 0,
            ads_watched_today: 0,
            arena_attempts_left: arena_attempts,
            guild_boss_done: false,
            daily_login_claimed: false,
            idle_claimed: false,
            quests: Vec::new(),
        };
        self.legendary_recently = false;
    }

    /// Add a hero to the collection; returns whether it was new.
    /// Duplicates stack on the existing instance. New heroes fill the team
    /// while there is room.
    pub fn add_hero(&mut self, hero_id: &str) -> bool {
        if let Some(existing) = self.heroes.get_mut(hero_id) {
            existing.duplicates += 1;
            return false;
        }
        self.heroes
            .insert(hero_id.to_string(), HeroInstance::new(hero_id.to_string()));
        if self.team.len() < TEAM_SIZE {
            self.team.push(hero_id.to_string());
        }
        true
    }

    pub fn heroes_by_rarity_counts(
        &self,
        rarity_of: impl Fn(&str) -> Option<Rarity>,
    ) -> BTreeMap<&'static str, u32> {
        let mut counts: BTreeMap<&'static str, u32> = BTreeMap::new();
        for rarity in Rarity::all() {
            counts.insert(rarity.as_str(), 0);
        }
        for hero_id in self.heroes.keys() {
            if let Some(rarity) = rarity_of(hero_id) {
                *counts.entry(rarity.as_str()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn max_hero_level(&self) -> u32 {
        self.heroes.values().map(|h| h.level).max().unwrap_or(0)
    }

    pub fn max_hero_stars(&self) -> u32 {
        self.heroes.values().map(|h| h.stars).max().unwrap_or(0)
    }

    /// Current max stage as a flat stage number across chapters.
    pub fn max_stage_number(&self, stages_per_chapter: u32) -> u32 {
        (self.max_chapter - 1) * stages_per_chapter + self.max_stage
    }
}

/// Formats a stage as the canonical `chXX_stYY` identifier used in events.
pub fn stage_id(chapter: u32, stage: u32) -> String {
    format!("ch{:02}_st{:02}", chapter, stage)
}
