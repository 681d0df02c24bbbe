//! The day/session orchestration loop.
//!
//! Per day: create the day's installs (each with its first session), then
//! walk every previously-installed live agent — a return roll plays the
//! day's sessions, a miss rolls the lower-probability permanent-churn die.
//! World mutations accumulate in a [`DayLedger`] and land once at the end
//! of the day, so per-agent output is independent of iteration order; a
//! caller may re-chunk or parallelize the per-agent phase without changing
//! any agent's event sequence.

use chrono::{Duration, NaiveDate};
use rand::Rng;

use crate::behavior::{cadence, retention};
use crate::config::{InstallCurve, SimulationConfig};
use crate::error::Result;
use crate::events::{EventEmitter, EventPayload, EventSink};
use crate::factory::AgentFactory;
use crate::models::{AgentProfile, AgentState, Lifecycle};
use crate::rng::{weighted_index, RandomStream};
use crate::session::{self, SessionCtx};
use crate::world::{DayLedger, WorldState};

/// One simulated player: immutable profile plus mutable state.
#[derive(Debug, Clone)]
pub struct Agent {
    pub profile: AgentProfile,
    pub state: AgentState,
}

/// Counters reported after a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub days_simulated: u32,
    pub total_installs: u64,
    pub total_events: u64,
    pub churned_agents: u64,
}

/// The simulation engine.
pub struct Simulator {
    cfg: SimulationConfig,
    streams: RandomStream,
    world: WorldState,
    factory: AgentFactory,
    agents: Vec<Agent>,
    installs_per_day: Vec<u32>,
}

impl Simulator {
    /// Build a simulator; the configuration contract is checked here, so a
    /// bad table aborts before any event is produced.
    pub fn new(cfg: SimulationConfig) -> Result<Self> {
        cfg.verify_contract()?;
        let streams = RandomStream::new(cfg.seed);
        let world = WorldState::initialize(&cfg, &streams);
        let installs_per_day = install_schedule(&cfg);
        Ok(Self {
            cfg,
            streams,
            world,
            factory: AgentFactory::new(),
            agents: Vec::new(),
            installs_per_day,
        })
    }

    /// Same, with the configured seed overridden.
    pub fn with_seed(mut cfg: SimulationConfig, seed: u64) -> Result<Self> {
        cfg.seed = seed;
        Self::new(cfg)
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Run the full simulation, pushing every event to `sink`.
    pub fn run(&mut self, sink: &mut dyn EventSink) -> RunSummary {
        let mut emitter = EventEmitter::new(self.cfg.seed, sink);

        for day_index in 0..self.cfg.duration_days {
            let date = self.cfg.start_date + Duration::days(day_index as i64);
            let day_number = day_index + 1;
            let mut ledger = DayLedger::default();

            self.create_installs(day_number, date, &mut ledger, &mut emitter);
            self.simulate_existing_agents(date, &mut ledger, &mut emitter);

            self.world.advance_day(ledger);
        }

        RunSummary {
            days_simulated: self.cfg.duration_days,
            total_installs: self.factory.agents_created(),
            total_events: emitter.total_emitted(),
            churned_agents: self
                .agents
                .iter()
                .filter(|a| a.state.lifecycle.is_churned())
                .count() as u64,
        }
    }

    /// Create the day's installs and play each agent's first session.
    fn create_installs(
        &mut self,
        day_number: u32,
        date: NaiveDate,
        ledger: &mut DayLedger,
        emitter: &mut EventEmitter<'_>,
    ) {
        let scheduled = self.installs_per_day[day_number as usize - 1];

        let bad_traffic = self
            .cfg
            .scenarios
            .bad_traffic
            .as_ref()
            .filter(|bt| bt.day == day_number)
            .cloned();
        let bad_volume = bad_traffic.as_ref().map(|bt| bt.volume).unwrap_or(0);
        let normal = scheduled.saturating_sub(bad_volume);

        let mut source_rng = self
            .streams
            .derive("installs", &format!("day{}", day_number));

        for _ in 0..normal {
            let source = select_install_source(&self.cfg, &mut source_rng);
            let mods = {
                let src = &self.cfg.installs.sources[&source];
                (src.retention_modifier, src.monetization_modifier)
            };
            let (profile, state) =
                self.factory
                    .create_agent(&self.cfg, &self.streams, date, &source, mods, false);
            let mut agent = Agent { profile, state };
            simulate_install_session(
                &self.cfg,
                &self.streams,
                &self.world,
                ledger,
                &mut agent,
                emitter,
                date,
            );
            self.agents.push(agent);
        }

        if let Some(bt) = bad_traffic {
            for _ in 0..bt.volume {
                let is_bot = source_rng.gen::<f64>() < bt.bot_ratio;
                let (profile, state) = self.factory.create_agent(
                    &self.cfg,
                    &self.streams,
                    date,
                    &bt.source_name,
                    (bt.retention_modifier, bt.monetization_modifier),
                    is_bot,
                );
                let mut agent = Agent { profile, state };
                simulate_install_session(
                    &self.cfg,
                    &self.streams,
                    &self.world,
                    ledger,
                    &mut agent,
                    emitter,
                    date,
                );
                self.agents.push(agent);
            }
        }
    }

    /// Walk agents installed before today: return, idle, or churn.
    fn simulate_existing_agents(
        &mut self,
        date: NaiveDate,
        ledger: &mut DayLedger,
        emitter: &mut EventEmitter<'_>,
    ) {
        for agent in &mut self.agents {
            if agent.state.lifecycle.is_churned() || agent.profile.install_date >= date {
                continue;
            }
            let day = agent.profile.days_since_install(date);
            let key = format!("{}:{}", agent.profile.user_id, day);

            let mut retention_rng = self.streams.derive("retention", &key);
            if retention::will_return_today(
                &self.cfg,
                &agent.profile,
                &agent.state,
                day,
                &mut retention_rng,
            ) {
                simulate_agent_day(
                    &self.cfg,
                    &self.streams,
                    &self.world,
                    ledger,
                    &agent.profile,
                    &mut agent.state,
                    emitter,
                    date,
                );
            } else {
                let mut churn_rng = self.streams.derive("churn", &key);
                if retention::rolls_permanent_churn(day, &mut churn_rng) {
                    agent.state.lifecycle = Lifecycle::Churned { on: date };
                }
            }
        }
    }
}

/// Spread the configured install total over the run.
fn install_schedule(cfg: &SimulationConfig) -> Vec<u32> {
    let total = cfg.installs.total;
    let duration = cfg.duration_days as usize;
    let mut schedule = match cfg.installs.curve {
        InstallCurve::Uniform => {
            let daily = total / duration as u32;
            let mut schedule = vec![daily; duration];
            let remainder = total - daily * duration as u32;
            for slot in schedule.iter_mut().take(remainder as usize) {
                *slot += 1;
            }
            schedule
        }
        InstallCurve::Decay { rate } => {
            let weights: Vec<f64> = (0..duration).map(|d| (-rate * d as f64).exp()).collect();
            let weight_total: f64 = weights.iter().sum();
            let mut schedule: Vec<u32> = weights
                .iter()
                .map(|w| (total as f64 * w / weight_total) as u32)
                .collect();
            // Rounding correction so the total lands exactly.
            let mut diff = total as i64 - schedule.iter().map(|&n| n as i64).sum::<i64>();
            let mut index = 0;
            while diff != 0 {
                if diff > 0 {
                    schedule[index % duration] += 1;
                    diff -= 1;
                } else if schedule[index % duration] > 0 {
                    schedule[index % duration] -= 1;
                    diff += 1;
                }
                index += 1;
            }
            schedule
        }
    };

    if let Some(bt) = &cfg.scenarios.bad_traffic {
        let day_index = bt.day as usize - 1;
        if day_index < schedule.len() {
            schedule[day_index] += bt.volume;
        }
    }
    schedule
}

fn select_install_source(cfg: &SimulationConfig, rng: &mut impl Rng) -> String {
    let entries: Vec<(&String, f64)> = cfg
        .installs
        .sources
        .iter()
        .map(|(name, src)| (name, src.share))
        .collect();
    let weights: Vec<f64> = entries.iter().map(|(_, share)| *share).collect();
    entries[weighted_index(rng, &weights)].0.clone()
}

/// Play the install-day first session (tutorial, starting heroes, first
/// login claim).
pub fn simulate_install_session(
    cfg: &SimulationConfig,
    streams: &RandomStream,
    world: &WorldState,
    ledger: &mut DayLedger,
    agent: &mut Agent,
    emitter: &mut EventEmitter<'_>,
    date: NaiveDate,
) {
    let key = format!("{}:0", agent.profile.user_id);
    let mut cadence_rng = streams.derive("cadence", &key);
    let mut session_rng = streams.derive("session", &key);

    agent.state.reset_daily(cfg.social.arena.daily_attempts);
    agent.state.login_streak = 1;

    let start = cadence::session_start_times(date, 1, &mut cadence_rng)[0];
    let duration =
        cadence::session_duration_minutes(cfg, &agent.profile, 1, &mut cadence_rng);

    let mut ctx = SessionCtx {
        cfg,
        world,
        ledger,
        date,
        day: 0,
    };
    session::run_session(
        &mut ctx,
        &agent.profile,
        &mut agent.state,
        emitter,
        start,
        duration,
        1,
        true,
        &mut session_rng,
    );
}

/// Play one returned day for one agent: daily reset, quests, cadence, the
/// day's sessions, and the state snapshot. Draws only from substreams
/// derived for this (agent, day), so the result is independent of when —
/// or on which worker — it runs.
#[allow(clippy::too_many_arguments)]
pub fn simulate_agent_day(
    cfg: &SimulationConfig,
    streams: &RandomStream,
    world: &WorldState,
    ledger: &mut DayLedger,
    profile: &AgentProfile,
    state: &mut AgentState,
    emitter: &mut EventEmitter<'_>,
    date: NaiveDate,
) {
    let day = profile.days_since_install(date);
    let key = format!("{}:{}", profile.user_id, day);

    state.reset_daily(cfg.social.arena.daily_attempts);

    // Login streak continues only across consecutive days.
    state.login_streak = match state.last_session_date {
        Some(last) if (date - last).num_days() == 1 => state.login_streak + 1,
        _ => 1,
    };

    state.daily.quests = session::daily_quests(cfg, state);

    let mut cadence_rng = streams.derive("cadence", &key);
    let session_count = cadence::sessions_today(cfg, profile, date, day, &mut cadence_rng);
    let start_times = cadence::session_start_times(date, session_count, &mut cadence_rng);

    // Daily snapshot: the state entering the day, stamped at first launch.
    emitter.emit(
        profile,
        state,
        date,
        start_times[0],
        snapshot_payload(world, state, date),
    );

    let mut session_rng = streams.derive("session", &key);
    for (index, start) in start_times.iter().enumerate() {
        let session_number_today = index as u32 + 1;
        let duration = cadence::session_duration_minutes(
            cfg,
            profile,
            session_number_today,
            &mut session_rng,
        );
        let mut ctx = SessionCtx {
            cfg,
            world,
            ledger,
            date,
            day,
        };
        session::run_session(
            &mut ctx,
            profile,
            state,
            emitter,
            *start,
            duration,
            session_number_today,
            false,
            &mut session_rng,
        );
    }
}

fn snapshot_payload(world: &WorldState, state: &AgentState, date: NaiveDate) -> EventPayload {
    let heroes_by_rarity = state
        .heroes_by_rarity_counts(|hero_id| world.hero(hero_id).map(|t| t.rarity))
        .into_iter()
        .map(|(rarity, count)| (rarity.to_string(), count))
        .collect();

    EventPayload::PlayerStateSnapshot {
        snapshot_date: date,
        player_level: state.player_level,
        vip_level: state.vip_level,
        total_spent_usd: (state.total_spent_usd * 100.0).round() / 100.0,
        gold_balance: state.gold,
        gems_balance: state.gems,
        energy_balance: state.energy,
        summon_tickets_balance: state.summon_tickets,
        heroes_count: state.heroes.len() as u32,
        heroes_by_rarity,
        max_hero_level: state.max_hero_level(),
        max_hero_stars: state.max_hero_stars(),
        team_power: state.team_power,
        max_chapter: state.max_chapter,
        max_stage: state.max_stage,
        total_stages_cleared: state.total_stages_cleared,
        arena_rank: (state.arena_rank > 0).then_some(state.arena_rank),
        arena_rating: (state.arena_rank > 0).then_some(state.arena_rating),
        guild_id: state.guild_id.clone(),
        total_sessions: state.total_sessions,
        total_playtime_sec: state.total_playtime_sec,
        total_gacha_pulls: state.total_gacha_pulls,
        pity_counter: state.pity_counter,
        last_active_date: date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::VecSink;

    fn small_config() -> SimulationConfig {
        let mut cfg = SimulationConfig::default();
        cfg.installs.total = 60;
        cfg.duration_days = 6;
        cfg.installs.curve = InstallCurve::Uniform;
        cfg
    }

    #[test]
    fn test_uniform_schedule_sums_to_total() {
        let cfg = small_config();
        let schedule = install_schedule(&cfg);
        assert_eq!(schedule.len(), 6);
        assert_eq!(schedule.iter().sum::<u32>(), 60);
    }

    #[test]
    fn test_decay_schedule_front_loads_and_sums() {
        let mut cfg = small_config();
        cfg.installs.curve = InstallCurve::Decay { rate: 0.3 };
        let schedule = install_schedule(&cfg);
        assert_eq!(schedule.iter().sum::<u32>(), 60);
        assert!(schedule[0] > schedule[5]);
    }

    #[test]
    fn test_bad_traffic_adds_volume_on_its_day() {
        let mut cfg = small_config();
        cfg.scenarios.bad_traffic = Some(crate::config::BadTraffic {
            day: 3,
            source_name: "fake_network".to_string(),
            volume: 40,
            retention_modifier: 0.3,
            monetization_modifier: 0.1,
            bot_ratio: 0.4,
        });
        let schedule = install_schedule(&cfg);
        assert_eq!(schedule[2], 10 + 40);
        assert_eq!(schedule.iter().sum::<u32>(), 100);
    }

    #[test]
    fn test_run_creates_agents_and_events() {
        let cfg = small_config();
        let mut sink = VecSink::new();
        let mut simulator = Simulator::new(cfg).unwrap();
        let summary = simulator.run(&mut sink);

        assert_eq!(summary.days_simulated, 6);
        assert_eq!(summary.total_installs, 60);
        assert_eq!(summary.total_events, sink.events.len() as u64);
        assert!(summary.total_events > 60 * 3);

        // Every agent got an install-day session_start.
        let first_sessions = sink
            .events
            .iter()
            .filter(|e| {
                matches!(
                    &e.event_properties,
                    EventPayload::SessionStart {
                        is_first_session: true,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(first_sessions, 60);
    }

    #[test]
    fn test_bad_config_aborts_before_running() {
        let mut cfg = small_config();
        cfg.gacha.rates.common = 0.9;
        assert!(Simulator::new(cfg).is_err());
    }

    #[test]
    fn test_churned_agents_stay_inert() {
        let cfg = small_config();
        let mut sink = VecSink::new();
        let mut simulator = Simulator::new(cfg).unwrap();
        simulator.run(&mut sink);

        for agent in simulator.agents() {
            if let Lifecycle::Churned { on } = agent.state.lifecycle {
                // No event for this agent may postdate its churn day.
                for event in sink
                    .events
                    .iter()
                    .filter(|e| e.user_id == agent.profile.user_id)
                {
                    assert!(
                        event.event_timestamp.date() <= on,
                        "churned agent {} emitted after churn",
                        agent.profile.user_id
                    );
                }
            }
        }
    }

    #[test]
    fn test_with_seed_overrides_config_seed() {
        let cfg = small_config();
        let mut sink_a = VecSink::new();
        let mut sink_b = VecSink::new();
        Simulator::with_seed(cfg.clone(), 7).unwrap().run(&mut sink_a);
        Simulator::with_seed(cfg, 8).unwrap().run(&mut sink_b);
        // Different seeds, different streams.
        assert_ne!(sink_a.events, sink_b.events);
    }
}
