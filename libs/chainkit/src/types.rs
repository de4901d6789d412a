//! Request/response envelopes exchanged with the state-machine driver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase a manager drives modules through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    InitGenesis,
    BeginPhase,
    EndPhase,
    ExportGenesis,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InitGenesis => "init_genesis",
            Self::BeginPhase => "begin_phase",
            Self::EndPhase => "end_phase",
            Self::ExportGenesis => "export_genesis",
        })
    }
}

/// Read-only facts about the step being executed.
///
/// Passed to every phase call and to invariant checks. Carries no storage
/// access: modules reach their own state through the keepers they were
/// built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCtx {
    pub chain_id: String,
    pub height: u64,
    pub time: DateTime<Utc>,
}

impl StepCtx {
    pub fn new(chain_id: impl Into<String>, height: u64, time: DateTime<Utc>) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            time,
        }
    }

    /// Context used before the first block (genesis, offline checks).
    pub fn genesis(chain_id: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self::new(chain_id, 0, time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginPhaseRequest {
    pub height: u64,
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndPhaseRequest {
    pub height: u64,
}

/// Change of one consensus participant's voting power. Power 0 removes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: String,
    pub power: i64,
}

/// Typed event emitted by a module during a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.push((key.into(), value.to_string()));
        self
    }
}

/// What one module returns from `begin_phase`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseResult {
    pub events: Vec<Event>,
}

impl PhaseResult {
    pub fn with_events(events: Vec<Event>) -> Self {
        Self { events }
    }
}

/// What one module returns from `end_phase`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndPhaseResult {
    pub events: Vec<Event>,
    pub validator_updates: Vec<ValidatorUpdate>,
}

/// Event together with the module that emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEvent {
    pub module: String,
    #[serde(flatten)]
    pub event: Event,
}

/// Aggregate of a whole begin phase, events in call order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginPhaseResponse {
    pub events: Vec<ModuleEvent>,
}

/// Aggregate of a whole end phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndPhaseResponse {
    pub events: Vec<ModuleEvent>,
    pub validator_updates: Vec<ValidatorUpdate>,
}
