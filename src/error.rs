use thiserror::Error;

/// Errors produced by codec construction and per-block operations.
///
/// Per-block failures are returned as values and never abort the process.
/// The rare-symbol path is in-band data, not an error, and an
/// incompressible block is transparently stored raw, so neither appears
/// here.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The source distribution cannot train a dictionary.
    #[error("invalid source distribution: {0}")]
    InvalidDistribution(String),

    /// A configuration field is outside the accepted range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Grouping and purging left fewer than two usable alphabet entries.
    #[error("alphabet too small after purge: {kept} usable symbols")]
    AlphabetTooSmall { kept: usize },

    /// The caller handed an output buffer smaller than the input block.
    #[error("output buffer too small: need {needed} bytes, got {available}")]
    InsufficientBuffer { needed: usize, available: usize },

    /// The encoded block does not parse as a valid frame.
    #[error("malformed frame: {0}")]
    Frame(&'static str),

    /// The configuration falls outside the decoder dispatch matrix.
    #[error("unsupported configuration: {0}")]
    Unsupported(String),
}
