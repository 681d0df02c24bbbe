//! Shared world state: hero catalog, gacha banners, guild registry, and the
//! stage/economy formulas.
//!
//! The world is read-only while agents are being simulated. Agent-caused
//! changes (guild membership, boss damage) accumulate in a [`DayLedger`]
//! and are applied once at the end-of-day barrier by the orchestrator, so
//! per-agent results never depend on the order agents run in.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::SimulationConfig;
use crate::models::{HeroClass, Rarity};
use crate::rng::RandomStream;

/// Days each limited banner stays up before rotating.
const BANNER_ROTATION_DAYS: i64 = 14;

// =============================================================================
// CATALOG TYPES
// =============================================================================

/// Static template for one hero in the catalog.
#[derive(Debug, Clone)]
pub struct HeroTemplate {
    pub hero_id: String,
    pub name: String,
    pub rarity: Rarity,
    pub class: HeroClass,
    pub base_power: i64,
}

#[derive(Debug, Clone)]
pub struct Guild {
    pub guild_id: String,
    pub name: String,
    pub member_count: u32,
    pub max_members: u32,
    pub boss_level: u32,
    pub boss_hp_remaining_pct: f64,
}

impl Guild {
    pub fn is_full(&self) -> bool {
        self.member_count >= self.max_members
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Standard,
    Limited,
}

impl BannerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BannerKind::Standard => "standard",
            BannerKind::Limited => "limited",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Banner {
    pub banner_id: String,
    pub kind: BannerKind,
    pub featured_hero_id: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Banner {
    pub fn is_active(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn days_remaining(&self, date: NaiveDate) -> i64 {
        (self.end_date - date).num_days()
    }
}

// =============================================================================
// WORLD STATE
// =============================================================================

#[derive(Debug, Clone)]
pub struct WorldState {
    pub current_date: NaiveDate,
    pub day_number: u32,
    pub heroes: BTreeMap<String, HeroTemplate>,
    pub guilds: Vec<Guild>,
    pub banners: Vec<Banner>,
}

const HERO_NAMES: &[(&str, HeroClass)] = &[
    ("Blade Master", HeroClass::Warrior),
    ("Iron Knight", HeroClass::Warrior),
    ("War Chief", HeroClass::Warrior),
    ("Crusader", HeroClass::Warrior),
    ("Frost Witch", HeroClass::Mage),
    ("Storm Caller", HeroClass::Mage),
    ("Archmage", HeroClass::Mage),
    ("Void Walker", HeroClass::Mage),
    ("Eagle Eye", HeroClass::Archer),
    ("Swift Arrow", HeroClass::Archer),
    ("Shadow Hunter", HeroClass::Archer),
    ("Marksman", HeroClass::Archer),
    ("Life Keeper", HeroClass::Healer),
    ("Holy Priest", HeroClass::Healer),
    ("Soul Mender", HeroClass::Healer),
    ("Seraph", HeroClass::Healer),
    ("Stone Wall", HeroClass::Tank),
    ("Bulwark", HeroClass::Tank),
    ("Juggernaut", HeroClass::Tank),
    ("Colossus", HeroClass::Tank),
];

const GUILD_PREFIXES: &[&str] = &[
    "Royal", "Shadow", "Dragon", "Phoenix", "Iron", "Golden", "Silver", "Dark", "Light", "Storm",
    "Fire", "Ice", "Thunder", "Crystal", "Ancient",
];

const GUILD_SUFFIXES: &[&str] = &[
    "Knights", "Legion", "Order", "Guard", "Warriors", "Hunters", "Raiders", "Champions",
    "Defenders", "Alliance", "Brigade", "Battalion", "Corps", "Squad", "Force",
];

impl WorldState {
    /// Build the world from configuration using derived substreams, so the
    /// catalog is identical for a given seed no matter when it is built.
    pub fn initialize(cfg: &SimulationConfig, streams: &RandomStream) -> Self {
        let mut world = Self {
            current_date: cfg.start_date,
            day_number: 1,
            heroes: BTreeMap::new(),
            guilds: Vec::new(),
            banners: Vec::new(),
        };
        world.generate_heroes(cfg, &mut streams.derive("world", "heroes"));
        world.generate_guilds(cfg, &mut streams.derive("world", "guilds"));
        world.generate_banners(cfg, &mut streams.derive("world", "banners"));
        world
    }

    fn generate_heroes(&mut self, cfg: &SimulationConfig, rng: &mut impl Rng) {
        for rarity in Rarity::all() {
            let count = cfg.heroes.pool.get(rarity);
            let base_power = cfg.heroes.base_power.get(rarity);
            for i in 1..=count {
                let (name, class) = HERO_NAMES[rng.gen_range(0..HERO_NAMES.len())];
                let hero_id = format!("hero_{}_{:03}", rarity.as_str(), i);
                let display_name = format!("{} ({})", name, rarity.as_str());
                self.heroes.insert(
                    hero_id.clone(),
                    HeroTemplate {
                        hero_id,
                        name: display_name,
                        rarity,
                        class,
                        base_power,
                    },
                );
            }
        }
    }

    fn generate_guilds(&mut self, cfg: &SimulationConfig, rng: &mut impl Rng) {
        for i in 1..=cfg.social.guilds.count {
            let prefix = GUILD_PREFIXES[rng.gen_range(0..GUILD_PREFIXES.len())];
            let suffix = GUILD_SUFFIXES[rng.gen_range(0..GUILD_SUFFIXES.len())];
            self.guilds.push(Guild {
                guild_id: format!("guild_{:04}", i),
                name: format!("{} {}", prefix, suffix),
                member_count: 0,
                max_members: cfg.social.guilds.max_members,
                boss_level: 1,
                boss_hp_remaining_pct: 100.0,
            });
        }
    }

    fn generate_banners(&mut self, cfg: &SimulationConfig, rng: &mut impl Rng) {
        let start = cfg.start_date;
        let end = start + Duration::days(cfg.duration_days as i64);

        self.banners.push(Banner {
            banner_id: "standard_banner".to_string(),
            kind: BannerKind::Standard,
            featured_hero_id: None,
            start_date: start,
            end_date: end,
        });

        let legendary_ids: Vec<&String> = self
            .heroes
            .values()
            .filter(|h| h.rarity == Rarity::Legendary)
            .map(|h| &h.hero_id)
            .collect();
        if legendary_ids.is_empty() {
            return;
        }

        let mut current = start;
        let mut banner_num = 1;
        while current < end {
            let featured = legendary_ids[rng.gen_range(0..legendary_ids.len())].clone();
            let banner_end = (current + Duration::days(BANNER_ROTATION_DAYS)).min(end);
            self.banners.push(Banner {
                banner_id: format!("limited_banner_{:03}", banner_num),
                kind: BannerKind::Limited,
                featured_hero_id: Some(featured),
                start_date: current,
                end_date: banner_end,
            });
            current = banner_end + Duration::days(1);
            banner_num += 1;
        }
    }

    // ── Lookups ─────────────────────────────────────────────────────────

    pub fn hero(&self, hero_id: &str) -> Option<&HeroTemplate> {
        self.heroes.get(hero_id)
    }

    pub fn heroes_of_rarity(&self, rarity: Rarity) -> Vec<&HeroTemplate> {
        self.heroes.values().filter(|h| h.rarity == rarity).collect()
    }

    pub fn standard_banner(&self) -> &Banner {
        // Always generated first in initialize().
        &self.banners[0]
    }

    pub fn limited_banner(&self) -> Option<&Banner> {
        self.banners
            .iter()
            .find(|b| b.kind == BannerKind::Limited && b.is_active(self.current_date))
    }

    pub fn guild(&self, guild_id: &str) -> Option<&Guild> {
        self.guilds.iter().find(|g| g.guild_id == guild_id)
    }

    /// A random guild with open slots, as of the start of the day.
    pub fn random_open_guild(&self, rng: &mut impl Rng) -> Option<&Guild> {
        let open: Vec<&Guild> = self.guilds.iter().filter(|g| !g.is_full()).collect();
        open.choose(rng).copied()
    }

    /// Team power an agent needs for a stage.
    pub fn stage_power_requirement(&self, cfg: &SimulationConfig, chapter: u32, stage: u32) -> i64 {
        let stage_num = (chapter - 1) * cfg.progression.stages_per_chapter + stage;
        let power = cfg.progression.stage_power;
        (power.base * power.per_stage_mult.powi(stage_num as i32 - 1)) as i64
    }

    /// (gold, exp) for clearing a stage.
    pub fn stage_rewards(&self, cfg: &SimulationConfig, chapter: u32) -> (i64, u64) {
        let rewards = cfg.economy.stage_rewards;
        (
            rewards.gold_base + (chapter as i64 - 1) * rewards.gold_per_chapter,
            rewards.exp_base + (chapter as u64 - 1) * rewards.exp_per_chapter,
        )
    }

    /// (gold, exp, capped hours) for an idle reward claim.
    pub fn idle_rewards(
        &self,
        cfg: &SimulationConfig,
        max_stage_number: u32,
        hours: f64,
    ) -> (i64, u64, f64) {
        let idle = cfg.economy.idle_rewards;
        let hours = hours.min(idle.max_hours);
        let gold = (idle.gold_per_hour_base
            * (1.0 + max_stage_number as f64 * idle.gold_per_stage_mult)
            * hours) as i64;
        let exp = (gold as f64 * 0.1) as u64;
        (gold, exp, hours)
    }

    pub fn hero_levelup_cost(&self, cfg: &SimulationConfig, current_level: u32) -> i64 {
        let cost = cfg.economy.hero_levelup;
        (cost.gold_base * cost.gold_per_level_mult.powi(current_level as i32 - 1)) as i64
    }

    pub fn exp_for_level(&self, cfg: &SimulationConfig, level: u32) -> u64 {
        let curve = cfg.progression.player_level;
        (curve.exp_base * curve.exp_mult.powi(level as i32 - 1)) as u64
    }

    // ── Day boundary ────────────────────────────────────────────────────

    /// Apply a day's deferred mutations and roll to the next day.
    /// Single-writer: only the orchestrator calls this, after all agents
    /// for the day are done.
    pub fn advance_day(&mut self, ledger: DayLedger) {
        for (guild_id, delta) in ledger.member_deltas {
            if let Some(guild) = self.guilds.iter_mut().find(|g| g.guild_id == guild_id) {
                let next = guild.member_count as i64 + delta;
                guild.member_count = next.clamp(0, guild.max_members as i64) as u32;
            }
        }
        for (guild_id, damage_pct) in ledger.boss_damage {
            if let Some(guild) = self.guilds.iter_mut().find(|g| g.guild_id == guild_id) {
                if damage_pct >= guild.boss_hp_remaining_pct {
                    guild.boss_level += 1;
                }
            }
        }
        // Boss HP resets every day regardless of outcome.
        for guild in &mut self.guilds {
            guild.boss_hp_remaining_pct = 100.0;
        }

        self.current_date += Duration::days(1);
        self.day_number += 1;
    }
}

// =============================================================================
// DAY LEDGER
// =============================================================================

/// Deferred world mutations accumulated while agents run.
#[derive(Debug, Clone, Default)]
pub struct DayLedger {
    /// Net membership change per guild (joins minus leaves).
    pub member_deltas: BTreeMap<String, i64>,
    /// Total boss damage (in % of HP) per guild.
    pub boss_damage: BTreeMap<String, f64>,
}

impl DayLedger {
    pub fn record_join(&mut self, guild_id: &str) {
        *self.member_deltas.entry(guild_id.to_string()).or_insert(0) += 1;
    }

    pub fn record_leave(&mut self, guild_id: &str) {
        *self.member_deltas.entry(guild_id.to_string()).or_insert(0) -= 1;
    }

    pub fn record_boss_damage(&mut self, guild_id: &str, damage_pct: f64) {
        *self
            .boss_damage
            .entry(guild_id.to_string())
            .or_insert(0.0) += damage_pct;
    }
}
