use std::fmt;
use std::io::BufRead;

use super::{SeriesError, TimeSeriesVector};
use crate::io::{Lines, lines};
use crate::models::EntityId;
use crate::resolver::KeyMap;

/// A series row re-keyed by canonical id.
///
/// Displays as the id followed by the row's original count text, so the
/// vector is written out exactly as it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRecord {
    pub id: EntityId,
    pub counts: Vec<u64>,
    pub values: String,
}

impl fmt::Display for JoinedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.values)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JoinStats {
    pub read: usize,
    pub joined: usize,
    pub dropped: usize,
}

/// Inner join of time-series rows against a key map.
///
/// Rows whose key is unknown are dropped; everything else keeps its counts
/// and gets the mapped id as its key.
pub struct TimeSeriesJoiner<'k, K: KeyMap + ?Sized> {
    key_map: &'k K,
    month_count: usize,
}

impl<'k, K: KeyMap + ?Sized> TimeSeriesJoiner<'k, K> {
    pub fn new(key_map: &'k K, month_count: usize) -> Self {
        Self {
            key_map,
            month_count,
        }
    }

    /// Join a single parsed row.
    pub fn join_one(&self, row: TimeSeriesVector<'_>) -> Option<JoinedRecord> {
        self.key_map.lookup(row.key).map(|id| JoinedRecord {
            id,
            counts: row.counts,
            values: row.values.to_string(),
        })
    }

    /// Stream rows from `reader`, one line at a time.
    ///
    /// The iterator yields the first fatal error (I/O, malformed row) and
    /// then stops.
    pub fn join<R: BufRead>(&self, reader: R) -> Join<'_, 'k, K, R> {
        Join {
            joiner: self,
            lines: lines(reader),
            line_no: 0,
            stats: JoinStats::default(),
            failed: false,
        }
    }
}

pub struct Join<'j, 'k, K: KeyMap + ?Sized, R> {
    joiner: &'j TimeSeriesJoiner<'k, K>,
    lines: Lines<R>,
    line_no: usize,
    stats: JoinStats,
    failed: bool,
}

impl<K: KeyMap + ?Sized, R> Join<'_, '_, K, R> {
    pub fn stats(&self) -> JoinStats {
        self.stats
    }
}

impl<K: KeyMap + ?Sized, R: BufRead> Iterator for Join<'_, '_, K, R> {
    type Item = Result<JoinedRecord, SeriesError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            self.stats.read += 1;

            let row = match TimeSeriesVector::parse(&line, self.joiner.month_count) {
                Ok(row) => row,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.at_line(self.line_no)));
                }
            };
            match self.joiner.join_one(row) {
                Some(record) => {
                    self.stats.joined += 1;
                    return Some(Ok(record));
                }
                None => self.stats.dropped += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;

    fn key_map(pairs: &[(&str, EntityId)]) -> HashMap<String, EntityId> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_inner_join_drops_unknown_keys() {
        let map = key_map(&[("A", 1)]);
        let joiner = TimeSeriesJoiner::new(&map, 2);
        let mut join = joiner.join(Cursor::new("A 1 2\nX 5 5\n"));
        let records: Vec<JoinedRecord> = join.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(
            records,
            vec![JoinedRecord {
                id: 1,
                counts: vec![1, 2],
                values: "1 2".to_string(),
            }]
        );
        assert_eq!(
            join.stats(),
            JoinStats {
                read: 2,
                joined: 1,
                dropped: 1
            }
        );
    }

    #[test]
    fn test_output_keys_come_from_map() {
        let map = key_map(&[("Paris", 10), ("Rome", 20)]);
        let joiner = TimeSeriesJoiner::new(&map, 1);
        let input = "Paris 3\nBerlin 4\nRome 5\nParis 6\n";
        for record in joiner.join(Cursor::new(input)) {
            let record = record.unwrap();
            assert!(map.values().any(|&id| id == record.id));
        }
        let ids: Vec<EntityId> = joiner
            .join(Cursor::new(input))
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(ids, vec![10, 20, 10]);
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let map = key_map(&[("A", 1)]);
        let joiner = TimeSeriesJoiner::new(&map, 2);
        let results: Vec<_> = joiner
            .join(Cursor::new("A 1 2\nA 1 2 3\nA 4 5\n"))
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(SeriesError::AtLine { line: 2, .. })
        ));
    }

    #[test]
    fn test_counts_written_verbatim() {
        let map = key_map(&[("A", 1)]);
        let joiner = TimeSeriesJoiner::new(&map, 3);
        let record = joiner
            .join(Cursor::new("A 007  0 12\n"))
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(record.counts, vec![7, 0, 12]);
        assert_eq!(record.to_string(), "1 007  0 12");
    }

    #[test]
    fn test_blank_lines_ignored() {
        let map = key_map(&[("A", 1)]);
        let joiner = TimeSeriesJoiner::new(&map, 1);
        let records: Vec<_> = joiner
            .join(Cursor::new("\nA 7\n\n"))
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].to_string(), "1 7");
    }
}
