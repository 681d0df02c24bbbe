//! Agent creation at install time.
//!
//! The factory rolls everything fixed for an agent's lifetime — archetype,
//! device, country, experiment variants — from the agent's own derived
//! substream, then builds the initial mutable state from the economy
//! configuration. Agent identity is the install counter, so ids are stable
//! across runs.

use chrono::NaiveDate;
use rand::Rng;

use crate::behavior::experiments;
use crate::config::SimulationConfig;
use crate::models::{AgentProfile, AgentState, Archetype, Platform};
use crate::rng::{weighted_index, RandomStream};

pub struct AgentFactory {
    counter: u64,
}

impl AgentFactory {
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    pub fn agents_created(&self) -> u64 {
        self.counter
    }

    /// Create a new agent installed on `install_date` from `source`.
    /// `source_mods` are the (retention, monetization) modifiers to stamp
    /// on the profile — normally the source's configured values, but
    /// scenario overlays substitute their own.
    pub fn create_agent(
        &mut self,
        cfg: &SimulationConfig,
        streams: &RandomStream,
        install_date: NaiveDate,
        source: &str,
        source_mods: (f64, f64),
        is_bot: bool,
    ) -> (AgentProfile, AgentState) {
        self.counter += 1;
        let user_id = format!("u_{:06}", self.counter);
        let device_id = format!("d_{:06}", self.counter);

        let mut rng = streams.derive("install", &user_id);

        let archetype = if is_bot {
            // Bots masquerade as the least valuable archetype.
            Archetype::FreeChurner
        } else {
            select_archetype(cfg, &mut rng)
        };

        let (platform, device_model, os_version) = select_device(cfg, &mut rng);
        let country = select_country(cfg, &mut rng);
        let app_version = select_app_version(cfg, &mut rng);
        let language = language_for_country(&country);

        let assignments = experiments::assign_all(cfg, &user_id);

        let profile = AgentProfile {
            user_id,
            device_id,
            archetype,
            install_date,
            install_source: source.to_string(),
            platform,
            device_model,
            os_version,
            app_version,
            country,
            language: language.to_string(),
            is_bot,
            source_retention_mod: source_mods.0,
            source_monetization_mod: source_mods.1,
            experiments: assignments,
        };

        let initial = cfg.economy.initial;
        let state = AgentState::new(
            initial.gold,
            initial.gems,
            initial.summon_tickets,
            initial.energy,
            cfg.social.arena.rating_start,
        );

        (profile, state)
    }
}

impl Default for AgentFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn select_archetype(cfg: &SimulationConfig, rng: &mut impl Rng) -> Archetype {
    let entries: Vec<(Archetype, f64)> = cfg
        .archetypes
        .iter()
        .map(|(archetype, params)| (*archetype, params.share))
        .collect();
    let weights: Vec<f64> = entries.iter().map(|(_, share)| *share).collect();
    entries[weighted_index(rng, &weights)].0
}

fn select_device(cfg: &SimulationConfig, rng: &mut impl Rng) -> (Platform, String, String) {
    if rng.gen::<f64>() < cfg.devices.ios_share {
        let model = cfg.devices.ios_models[rng.gen_range(0..cfg.devices.ios_models.len())].clone();
        let os_version = format!("{}.{}", rng.gen_range(15..=17), rng.gen_range(0..=5));
        (Platform::Ios, model, os_version)
    } else {
        let model =
            cfg.devices.android_models[rng.gen_range(0..cfg.devices.android_models.len())].clone();
        let os_version = format!("{}", rng.gen_range(11..=14));
        (Platform::Android, model, os_version)
    }
}

fn select_country(cfg: &SimulationConfig, rng: &mut impl Rng) -> String {
    let weights: Vec<f64> = cfg.devices.countries.iter().map(|(_, s)| *s).collect();
    cfg.devices.countries[weighted_index(rng, &weights)].0.clone()
}

fn select_app_version(cfg: &SimulationConfig, rng: &mut impl Rng) -> String {
    let weights: Vec<f64> = cfg.devices.app_versions.iter().map(|(_, s)| *s).collect();
    cfg.devices.app_versions[weighted_index(rng, &weights)]
        .0
        .clone()
}

fn language_for_country(country: &str) -> &'static str {
    match country {
        "RU" => "ru",
        "DE" => "de",
        "BR" => "pt",
        "JP" => "ja",
        "KR" => "ko",
        _ => "en",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (SimulationConfig, RandomStream) {
        let cfg = SimulationConfig::default();
        let streams = RandomStream::new(cfg.seed);
        (cfg, streams)
    }

    #[test]
    fn test_agent_ids_are_sequential() {
        let (cfg, streams) = setup();
        let mut factory = AgentFactory::new();
        let date = cfg.start_date;
        let (first, _) = factory.create_agent(&cfg, &streams, date, "organic", (1.0, 1.0), false);
        let (second, _) = factory.create_agent(&cfg, &streams, date, "organic", (1.0, 1.0), false);
        assert_eq!(first.user_id, "u_000001");
        assert_eq!(second.user_id, "u_000002");
        assert_eq!(second.device_id, "d_000002");
    }

    #[test]
    fn test_initial_state_matches_economy_config() {
        let (cfg, streams) = setup();
        let mut factory = AgentFactory::new();
        let (_, state) =
            factory.create_agent(&cfg, &streams, cfg.start_date, "organic", (1.0, 1.0), false);
        assert_eq!(state.gold, cfg.economy.initial.gold);
        assert_eq!(state.gems, cfg.economy.initial.gems);
        assert_eq!(state.summon_tickets, cfg.economy.initial.summon_tickets);
        assert_eq!(state.energy, cfg.economy.initial.energy);
        assert_eq!(state.arena_rating, cfg.social.arena.rating_start);
        assert!(!state.lifecycle.is_churned());
    }

    #[test]
    fn test_profile_is_deterministic_per_counter() {
        let (cfg, streams) = setup();
        let mut a = AgentFactory::new();
        let mut b = AgentFactory::new();
        let date = cfg.start_date;
        for _ in 0..20 {
            let (pa, _) = a.create_agent(&cfg, &streams, date, "organic", (1.0, 1.0), false);
            let (pb, _) = b.create_agent(&cfg, &streams, date, "organic", (1.0, 1.0), false);
            assert_eq!(pa.archetype, pb.archetype);
            assert_eq!(pa.country, pb.country);
            assert_eq!(pa.device_model, pb.device_model);
            assert_eq!(pa.experiments, pb.experiments);
        }
    }

    #[test]
    fn test_bots_are_free_churners() {
        let (cfg, streams) = setup();
        let mut factory = AgentFactory::new();
        let (profile, _) =
            factory.create_agent(&cfg, &streams, cfg.start_date, "fake_network", (0.3, 0.1), true);
        assert!(profile.is_bot);
        assert_eq!(profile.archetype, Archetype::FreeChurner);
        assert_eq!(profile.source_retention_mod, 0.3);
    }

    #[test]
    fn test_archetype_distribution_follows_shares() {
        let (cfg, streams) = setup();
        let mut factory = AgentFactory::new();
        let mut whales = 0;
        let mut casuals = 0;
        for _ in 0..2000 {
            let (profile, _) =
                factory.create_agent(&cfg, &streams, cfg.start_date, "organic", (1.0, 1.0), false);
            match profile.archetype {
                Archetype::Whale => whales += 1,
                Archetype::FreeCasual => casuals += 1,
                _ => {}
            }
        }
        // Whale share is 2%, free_casual 30%.
        assert!(whales < 150, "whales: {}", whales);
        assert!(casuals > 400, "casuals: {}", casuals);
    }

    #[test]
    fn test_language_follows_country() {
        let (cfg, streams) = setup();
        let mut factory = AgentFactory::new();
        for _ in 0..200 {
            let (profile, _) =
                factory.create_agent(&cfg, &streams, cfg.start_date, "organic", (1.0, 1.0), false);
            match profile.country.as_str() {
                "JP" => assert_eq!(profile.language, "ja"),
                "US" | "other" => assert_eq!(profile.language, "en"),
                _ => {}
            }
        }
    }
}
