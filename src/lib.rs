//! cohort - deterministic synthetic player-population simulator.
//!
//! Simulates the day-by-day behavior of a large population of mobile-game
//! player agents and produces a typed analytics event stream. Everything is
//! reproducible from a single seed: each stochastic decision draws from a
//! substream derived from (seed, purpose, agent/day key), so per-agent
//! trajectories are bit-identical across runs regardless of processing
//! order.
//!
//! The crate is the simulation core only. Configuration file loading, CLI,
//! on-disk serialization, and warehouse tooling are the caller's concern;
//! events are handed over through the [`events::EventSink`] trait.

pub mod behavior;
pub mod config;
pub mod error;
pub mod events;
pub mod factory;
pub mod models;
pub mod orchestrator;
pub mod rng;
pub mod session;
pub mod world;

pub use config::SimulationConfig;
pub use error::{ContractError, Result};
pub use events::{Event, EventPayload, EventSink, VecSink};
pub use models::{AgentProfile, AgentState, Archetype, Lifecycle};
pub use orchestrator::{RunSummary, Simulator};
pub use rng::RandomStream;
pub use world::WorldState;
