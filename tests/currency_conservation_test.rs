//! Integration test: currency conservation.
//!
//! For every agent, at every point in the stream,
//! `balance = initial + sum(sources) - sum(sinks)`, the reported
//! `balance_after` matches the replayed ledger, and no balance ever goes
//! negative.

use std::collections::BTreeMap;

use cohort::config::InstallCurve;
use cohort::events::VecSink;
use cohort::models::Currency;
use cohort::{EventPayload, SimulationConfig, Simulator};

fn run_config() -> SimulationConfig {
    let mut cfg = SimulationConfig::default();
    cfg.installs.total = 150;
    cfg.duration_days = 12;
    cfg.installs.curve = InstallCurve::Uniform;
    cfg
}

#[test]
fn test_replayed_ledger_matches_reported_balances() {
    let cfg = run_config();
    let initial = cfg.economy.initial;
    let mut sink = VecSink::new();
    Simulator::new(cfg).unwrap().run(&mut sink);
    assert!(!sink.events.is_empty());

    // Per (agent, currency) running balance, seeded with the initials.
    let mut balances: BTreeMap<(String, Currency), i64> = BTreeMap::new();
    let starting = |currency: Currency| match currency {
        Currency::Gold => initial.gold,
        Currency::Gems => initial.gems,
        Currency::SummonTickets => initial.summon_tickets,
        Currency::Energy => initial.energy,
    };

    let mut movements = 0u64;
    for event in &sink.events {
        let (currency, delta, balance_after) = match &event.event_properties {
            EventPayload::EconomySource {
                currency,
                amount,
                balance_after,
                ..
            } => (*currency, *amount, *balance_after),
            EventPayload::EconomySink {
                currency,
                amount,
                balance_after,
                ..
            } => (*currency, -*amount, *balance_after),
            _ => continue,
        };
        movements += 1;

        let key = (event.user_id.clone(), currency);
        let balance = balances.entry(key).or_insert_with(|| starting(currency));
        *balance += delta;

        assert!(
            *balance >= 0,
            "agent {} drove {:?} negative at {}",
            event.user_id,
            currency,
            event.event_timestamp
        );
        assert_eq!(
            *balance, balance_after,
            "agent {} {:?} ledger drift at {}",
            event.user_id, currency, event.event_timestamp
        );
    }

    assert!(movements > 1000, "expected a busy economy, saw {}", movements);
}

#[test]
fn test_amounts_are_never_negative() {
    let mut sink = VecSink::new();
    Simulator::new(run_config()).unwrap().run(&mut sink);

    for event in &sink.events {
        match &event.event_properties {
            EventPayload::EconomySource { amount, .. } => assert!(*amount >= 0),
            EventPayload::EconomySink { amount, .. } => assert!(*amount >= 0),
            _ => {}
        }
    }
}
