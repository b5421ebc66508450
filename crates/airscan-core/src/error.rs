use thiserror::Error;

/// Reasons a single snapshot row cannot become a `Target` or `Client`.
///
/// These never escape a snapshot parse: the offending row is dropped and the
/// parse continues with the next one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("Expected at least {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("Malformed MAC address: {0:?}")]
    InvalidMac(String),

    #[error("Column {column} is not an integer: {value:?}")]
    InvalidNumber { column: &'static str, value: String },

    #[error("Ignoring target with negative-one channel")]
    NegativeChannel,

    #[error("Ignoring broadcast BSSID")]
    BroadcastBssid,
}
