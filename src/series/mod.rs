//! Per-entity monthly count series: parsing, keyed join and aggregation.
//!
//! Line format: `entity_key count_1 count_2 ... count_M`, where M is fixed
//! for a run. A row with any other number of counts aborts the run.
pub mod aggregate;
pub mod join;

use std::fmt;
use std::io::{self, Write};

use thiserror::Error;

pub use aggregate::Aggregator;
pub use join::{JoinStats, JoinedRecord, TimeSeriesJoiner};

#[derive(Error, Debug)]
pub enum SeriesError {
    #[error("expected {expected} counts for {key:?}, found {found}")]
    LengthMismatch {
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid count {value:?} for {key:?}")]
    InvalidCount { key: String, value: String },

    #[error("entity key {key:?} is not a numeric id")]
    InvalidId { key: String },

    #[error("count overflow while summing {key}")]
    Overflow { key: String },

    #[error("cannot merge aggregations of {expected} and {found} months")]
    ShardMismatch { expected: usize, found: usize },

    #[error("line {line}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<SeriesError>,
    },

    #[error("failed to read time series")]
    Io(#[from] io::Error),
}

impl SeriesError {
    pub(crate) fn at_line(self, line: usize) -> Self {
        SeriesError::AtLine {
            line,
            source: Box::new(self),
        }
    }
}

/// One parsed time-series row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSeriesVector<'a> {
    pub key: &'a str,
    pub counts: Vec<u64>,
    /// The text after the key separator, exactly as read.
    pub values: &'a str,
}

impl<'a> TimeSeriesVector<'a> {
    /// Parse a row that must carry exactly `month_count` counts.
    pub fn parse(line: &'a str, month_count: usize) -> Result<Self, SeriesError> {
        let line = line.trim_start();
        let (key, values) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        let mut counts = Vec::with_capacity(month_count);
        for field in values.split_whitespace() {
            let count = field.parse().map_err(|_| SeriesError::InvalidCount {
                key: key.to_string(),
                value: field.to_string(),
            })?;
            counts.push(count);
        }

        if counts.len() != month_count {
            return Err(SeriesError::LengthMismatch {
                key: key.to_string(),
                expected: month_count,
                found: counts.len(),
            });
        }
        Ok(Self {
            key,
            counts,
            values,
        })
    }
}

/// Space-separated counts, as used by every time-series output.
pub struct Counts<'a>(pub &'a [u64]);

impl fmt::Display for Counts<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, count) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{count}")?;
        }
        Ok(())
    }
}

/// Write one `key count_1 ... count_M` row.
pub fn write_row<W, K>(sink: &mut W, key: K, counts: &[u64]) -> io::Result<()>
where
    W: Write + ?Sized,
    K: fmt::Display,
{
    writeln!(sink, "{key} {}", Counts(counts))
}
