//! Session cadence: how many sessions today, when they start, how long
//! they run.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rand::Rng;

use crate::behavior::experiments;
use crate::config::SimulationConfig;
use crate::models::AgentProfile;
use crate::rng::{triangular, weighted_index};

/// Time-of-day buckets for session starts: (start hour, end hour, weight).
/// Weights sum to 1.0.
pub const SESSION_TIME_BUCKETS: [(u32, u32, f64); 7] = [
    (0, 7, 0.05),   // night
    (7, 9, 0.15),   // morning commute
    (9, 12, 0.10),  // work morning
    (12, 14, 0.20), // lunch
    (14, 18, 0.10), // work afternoon
    (18, 21, 0.25), // evening peak
    (21, 24, 0.15), // late evening
];

const WEEKEND_SESSION_MULT: f64 = 1.2;

/// Number of sessions for a day the agent returns. Always at least 1.
pub fn sessions_today(
    cfg: &SimulationConfig,
    profile: &AgentProfile,
    date: NaiveDate,
    day: u32,
    rng: &mut impl Rng,
) -> u32 {
    if profile.is_bot {
        return rng.gen_range(1..=2);
    }

    let (min, max) = cfg.archetype(profile.archetype).sessions_per_day;
    // Skewed toward the low end of the archetype range.
    let mut base = triangular(rng, min as f64, max as f64, min as f64 * 1.2);

    if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        base *= WEEKEND_SESSION_MULT;
    }
    base *= experiments::compose_effects(cfg, profile, "sessions_per_day", day);

    (base.round() as u32).max(1)
}

/// Session start times for the day, sorted ascending.
pub fn session_start_times(date: NaiveDate, count: u32, rng: &mut impl Rng) -> Vec<NaiveDateTime> {
    let weights: Vec<f64> = SESSION_TIME_BUCKETS.iter().map(|(_, _, w)| *w).collect();
    let mut times: Vec<NaiveDateTime> = (0..count)
        .map(|_| {
            let (start_hour, end_hour, _) = SESSION_TIME_BUCKETS[weighted_index(rng, &weights)];
            let hour = rng.gen_range(start_hour..end_hour);
            let minute = rng.gen_range(0..60);
            let second = rng.gen_range(0..60);
            let time = NaiveTime::from_hms_opt(hour, minute, second).expect("valid time of day");
            NaiveDateTime::new(date, time)
        })
        .collect();
    times.sort();
    times
}

/// Session length in minutes. The first session of the day runs long
/// (idle and daily claims); later sessions are shorter and tighter.
pub fn session_duration_minutes(
    cfg: &SimulationConfig,
    profile: &AgentProfile,
    session_number_today: u32,
    rng: &mut impl Rng,
) -> u32 {
    if profile.is_bot {
        return rng.gen_range(2..=5);
    }

    let (min, max) = cfg.archetype(profile.archetype).session_duration_min;
    let (min, max) = (min as f64, max as f64);
    let base = if session_number_today == 1 {
        triangular(rng, min, max, max * 0.7)
    } else {
        triangular(rng, min, max * 0.7, min * 1.3)
    };

    (base.round() as u32).max(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::AgentFactory;
    use crate::rng::RandomStream;

    fn setup() -> (SimulationConfig, AgentProfile) {
        let cfg = SimulationConfig::default();
        let streams = RandomStream::new(cfg.seed);
        let mut factory = AgentFactory::new();
        let (profile, _) =
            factory.create_agent(&cfg, &streams, cfg.start_date, "organic", (1.0, 1.0), false);
        (cfg, profile)
    }

    #[test]
    fn test_bucket_weights_sum_to_one() {
        let total: f64 = SESSION_TIME_BUCKETS.iter().map(|(_, _, w)| *w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sessions_within_archetype_range() {
        let (cfg, profile) = setup();
        let (_, max) = cfg.archetype(profile.archetype).sessions_per_day;
        let mut rng = RandomStream::new(1).derive("test", "sessions");
        // A weekday with no experiment boost stays within [1, max * 1.2].
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(); // Monday
        for _ in 0..500 {
            let n = sessions_today(&cfg, &profile, date, 5, &mut rng);
            assert!(n >= 1);
            assert!(n <= (max as f64 * 1.2).ceil() as u32 + 1, "n = {}", n);
        }
    }

    #[test]
    fn test_weekend_raises_average() {
        let (cfg, profile) = setup();
        let mut rng = RandomStream::new(1).derive("test", "weekend");
        let monday = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2025, 1, 4).unwrap();

        let weekday_total: u32 = (0..2000)
            .map(|_| sessions_today(&cfg, &profile, monday, 5, &mut rng))
            .sum();
        let weekend_total: u32 = (0..2000)
            .map(|_| sessions_today(&cfg, &profile, saturday, 5, &mut rng))
            .sum();
        assert!(weekend_total > weekday_total);
    }

    #[test]
    fn test_start_times_sorted_and_in_day() {
        let (_, _) = setup();
        let mut rng = RandomStream::new(1).derive("test", "times");
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let times = session_start_times(date, 6, &mut rng);
        assert_eq!(times.len(), 6);
        for pair in times.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        for t in &times {
            assert_eq!(t.date(), date);
        }
    }

    #[test]
    fn test_first_session_runs_longer_on_average() {
        let (cfg, profile) = setup();
        let mut rng = RandomStream::new(1).derive("test", "duration");
        let first_total: u32 = (0..2000)
            .map(|_| session_duration_minutes(&cfg, &profile, 1, &mut rng))
            .sum();
        let later_total: u32 = (0..2000)
            .map(|_| session_duration_minutes(&cfg, &profile, 3, &mut rng))
            .sum();
        assert!(first_total > later_total);
    }

    #[test]
    fn test_duration_floor() {
        let (cfg, mut profile) = setup();
        profile.is_bot = true;
        let mut rng = RandomStream::new(1).derive("test", "bot_duration");
        for _ in 0..200 {
            let d = session_duration_minutes(&cfg, &profile, 1, &mut rng);
            assert!((2..=5).contains(&d));
        }
    }
}
