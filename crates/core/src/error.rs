//! Error types for the flowviz core.

use thiserror::Error;

/// Errors produced by field construction and component configuration.
///
/// Integration and convolution passes never fail; their outcomes are reported
/// through flags on the result types instead.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Width or height was zero (or their product overflowed) when creating a field or texture.
    #[error("invalid dimensions: width and height must be non-zero")]
    InvalidDimensions,

    /// A data buffer did not hold the number of elements the grid needs.
    #[error("buffer length mismatch: expected {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// An indexed grid lookup was outside `[0, width) x [0, height)`.
    #[error("index ({x}, {y}) out of range for field of size ({width}, {height})")]
    OutOfRange {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    /// A field generator name was not in the registered set.
    #[error("unknown field kind: {0}")]
    UnknownKind(String),

    /// A sampling mode name was not recognized.
    #[error("unknown sampling mode: {0}")]
    UnknownSampling(String),

    /// A component configuration value was out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Writing an output artifact failed.
    #[error("i/o error: {0}")]
    Io(String),
}
