use thiserror::Error;

/// Raised when `mtr --raw` output deviates from the `<tag> <hop> <payload>`
/// line format. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: truncated record {record:?}")]
    Truncated { line: usize, record: String },

    #[error("line {line}: invalid {field} {value:?}")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: invalid host address {value:?}")]
    InvalidAddress { line: usize, value: String },

    #[error("line {line}: hop {hop_number} has more timing samples than the {rounds} requested rounds")]
    TooManySamples {
        line: usize,
        hop_number: u32,
        rounds: u32,
    },
}
