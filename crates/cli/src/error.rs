//! CLI failure categories and the exit code each one produces.
//!
//! | code | category |
//! |------|----------|
//! | 0    | success |
//! | 2    | clap rejected the arguments |
//! | 10   | field error: unknown field kind, malformed field data |
//! | 11   | output file could not be written |
//! | 12   | bad input: `--params` JSON, dimensions, sampling names, config values, `--dt` |
//! | 13   | JSON output could not be serialized |

use flowviz_core::FlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// The requested field cannot be built (exit 10).
    #[error(transparent)]
    Field(FlowError),
    /// Writing a PNG failed (exit 11).
    #[error("{0}")]
    Output(String),
    /// A flag or parameter value was rejected (exit 12).
    #[error("{0}")]
    Input(String),
    /// Exit 13.
    #[error("cannot serialize output: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Field(_) => 10,
            CliError::Output(_) => 11,
            CliError::Input(_) => 12,
            CliError::Serialization(_) => 13,
        }
    }
}

/// Configuration values come from the command line, so they route to
/// [`CliError::Input`].
impl From<FlowError> for CliError {
    fn from(e: FlowError) -> Self {
        match e {
            FlowError::Io(msg) => CliError::Output(msg),
            e @ (FlowError::InvalidDimensions
            | FlowError::InvalidConfig(_)
            | FlowError::UnknownSampling(_)) => CliError::Input(e.to_string()),
            e @ (FlowError::UnknownKind(_)
            | FlowError::LengthMismatch { .. }
            | FlowError::OutOfRange { .. }) => CliError::Field(e),
        }
    }
}
