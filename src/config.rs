use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::opponent::{HeuristicOpponent, Opponent, RemoteOpponent, SolverOpponent, Transport};
use crate::types::FirstMover;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000";

/// Which opponent implementation a session is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpponentMode {
    /// Highest-row-first heuristic, answered in-process.
    #[default]
    Heuristic,
    /// The endpoint's solver, answered in-process.
    Solver,
    /// The opponent-move endpoint over a transport.
    Remote,
}

/// Session configuration. Every field is optional in the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Who moves first, unless the session already stores a choice.
    pub first_mover: FirstMover,
    /// Opponent skill, unless the session already stores a choice.
    pub skill: u8,
    pub opponent: OpponentMode,
    /// Base URL of the opponent-move endpoint.
    pub endpoint: String,
    /// `tracing_subscriber::EnvFilter` directives.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            first_mover: FirstMover::User,
            skill: 1,
            opponent: OpponentMode::Heuristic,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Builds the configured opponent. `Remote` requires a transport.
    pub fn build_opponent(
        &self,
        transport: Option<Box<dyn Transport>>,
    ) -> Result<Box<dyn Opponent>, ConfigError> {
        Ok(match self.opponent {
            OpponentMode::Heuristic => Box::new(HeuristicOpponent),
            OpponentMode::Solver => Box::new(SolverOpponent::default()),
            OpponentMode::Remote => Box::new(RemoteOpponent::new(
                transport.ok_or(ConfigError::MissingTransport)?,
            )),
        })
    }
}
