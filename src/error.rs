use thiserror::Error;

/// A pile set that violates the layout rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PileError {
    #[error("rows must consist of exactly 5 digits, got {0}")]
    Length(usize),
    #[error("rows must consist of digits in 0..5, got {0:?}")]
    NotADigit(char),
    #[error("row at index {row} must contain <= {max} matches")]
    RowTooLarge { row: usize, max: u8 },
    #[error("rows must contain at least 1 match")]
    NoMatches,
}

/// A response body that does not follow the move protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("response is not valid JSON: {0}")]
    Json(String),
    #[error("response carries neither `gameContinues` nor `error`")]
    MissingFields,
    #[error("`gameContinues` must be -1, 0 or 1, got {0}")]
    BadContinuation(i64),
    #[error("move response lacks `{0}`")]
    MissingMoveField(&'static str),
}

/// Endpoint-side solver failures. Their text is what the endpoint reports in
/// the `error` field of a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error(transparent)]
    Piles(#[from] PileError),
    #[error("skill must be 0 or 1, got {0}")]
    UnsupportedSkill(u8),
}

/// Why the opponent failed to produce a usable move.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpponentError {
    #[error("opponent reported an error: {0}")]
    Remote(String),
    #[error("malformed opponent response: {0}")]
    Malformed(#[from] ProtocolError),
    #[error("opponent chose an illegal move: {0}")]
    IllegalMove(String),
    #[error("opponent request failed: {0}")]
    Transport(String),
    #[error("opponent could not compute a move: {0}")]
    Solver(#[from] SolverError),
}

/// Persistence backend failures. The state store logs these and keeps going.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend rejected slot `{slot}`: {reason}")]
    Backend { slot: String, reason: String },
    #[error("slot `{slot}` could not be encoded: {source}")]
    Encode {
        slot: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("session storage is unavailable")]
    Unavailable,
}

/// Configuration that could not be decoded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration object: {0}")]
    Object(String),
    #[error("opponent mode `remote` needs a transport")]
    MissingTransport,
}
