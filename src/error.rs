// =============================================================================
// Core error taxonomy
// =============================================================================
//
// Only structural malformation of the input series raises. Numeric
// indeterminacy inside an indicator is represented per data point as `None`
// and never reaches this type.

use thiserror::Error;

/// Structural validation errors raised before any indicator is computed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeriesError {
    #[error("price series is empty")]
    Empty,

    #[error("row {index} has neither a close nor a price value")]
    MissingPriceColumn { index: usize },

    #[error("row {index}: field '{field}' must be finite")]
    NonFinitePrice { index: usize, field: &'static str },

    #[error("row {index}: field '{field}' must be non-negative, got {value}")]
    NegativePrice {
        index: usize,
        field: &'static str,
        value: f64,
    },

    #[error("row {index}: timestamp {timestamp} is not after the previous row ({previous})")]
    NonMonotonicTimestamp {
        index: usize,
        timestamp: i64,
        previous: i64,
    },

    #[error("unknown indicator '{name}'")]
    UnknownIndicator { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_row() {
        let err = SeriesError::NegativePrice {
            index: 3,
            field: "low",
            value: -1.5,
        };
        assert_eq!(err.to_string(), "row 3: field 'low' must be non-negative, got -1.5");

        let err = SeriesError::UnknownIndicator { name: "FOO".into() };
        assert_eq!(err.to_string(), "unknown indicator 'FOO'");
    }
}
