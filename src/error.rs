//! Fatal configuration-contract errors.
//!
//! The configuration reaching the core is assumed pre-validated by an
//! external loader, but the core still checks the contract up front and
//! refuses to run on a violation rather than silently renormalizing or
//! producing an inconsistent dataset. Recoverable outcomes (an agent that
//! cannot afford an action, a clamped probability) are ordinary values and
//! never surface here.

use std::fmt;

/// Result type for simulation setup and runs.
pub type Result<T> = std::result::Result<T, ContractError>;

/// A configuration-contract violation. Each variant names the offending
/// table so the diagnostic points straight at the bad input.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractError {
    /// A weight/share table does not sum to 1.0 (within tolerance).
    WeightSum { table: String, total: f64 },
    /// A key the simulation contract requires is absent.
    MissingKey { table: String, key: String },
    /// A table that must have at least one entry is empty.
    EmptyTable { table: String },
    /// Soft pity must start strictly before the hard pity threshold.
    PityOrder { soft_start: u32, threshold: u32 },
    /// The retention curve for an archetype increases somewhere.
    RetentionNotMonotone { archetype: String, day: u32 },
    /// A numeric parameter is outside its legal range.
    BadValue { table: String, detail: String },
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractError::WeightSum { table, total } => {
                write!(f, "{} weights sum to {:.4}, expected 1.0", table, total)
            }
            ContractError::MissingKey { table, key } => {
                write!(f, "{} is missing required key '{}'", table, key)
            }
            ContractError::EmptyTable { table } => {
                write!(f, "{} must not be empty", table)
            }
            ContractError::PityOrder {
                soft_start,
                threshold,
            } => write!(
                f,
                "gacha.pity soft_pity_start ({}) must be < threshold ({})",
                soft_start, threshold
            ),
            ContractError::RetentionNotMonotone { archetype, day } => write!(
                f,
                "retention curve for '{}' increases at day {}",
                archetype, day
            ),
            ContractError::BadValue { table, detail } => {
                write!(f, "{}: {}", table, detail)
            }
        }
    }
}

impl std::error::Error for ContractError {}
