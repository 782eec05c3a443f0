//! Stage runners wiring line sources and sinks to the core components.
//!
//! Each runner makes a single pass over its streamed input, returns the
//! stage statistics, and fails the whole run on the first fatal error.
//! Output already written at that point is not retracted.
use std::collections::HashSet;
use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::TimeWindow;
use crate::extractor::{LinkExtractor, revision_anchors};
use crate::io::lines;
use crate::models::{EntityId, RevisionRecord, normalize_title, repair_anchor_line};
use crate::resolver::{CanonicalMap, IdentifierDictionary, KeyMap, RedirectResolver, ResolveStats};
use crate::series::{
    Aggregator, JoinStats, SeriesError, TimeSeriesJoiner, TimeSeriesVector, write_row,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnchorStats {
    pub revisions: usize,
    pub anchors: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TitleStats {
    pub revisions: usize,
    pub titles: usize,
    pub untitled: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SampleStats {
    pub revisions: usize,
    pub kept: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairStats {
    pub read: usize,
    pub repaired: usize,
    pub dropped: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregateStats {
    pub read: usize,
    pub entities: usize,
}

/// Call `f` for every non-blank revision line, parsed.
fn for_each_revision<R, F>(reader: R, mut f: F) -> Result<usize>
where
    R: BufRead,
    F: FnMut(&str, &RevisionRecord) -> Result<()>,
{
    let mut count = 0;
    for (idx, line) in lines(reader).enumerate() {
        let line = line.context("failed to read revisions")?;
        if line.trim().is_empty() {
            continue;
        }
        let revision = RevisionRecord::from_json(&line)
            .with_context(|| format!("revision line {}", idx + 1))?;
        f(&line, &revision)?;
        count += 1;
    }
    Ok(count)
}

/// Revision JSON lines → anchor record lines.
pub fn extract_anchors<R: BufRead, W: Write>(reader: R, sink: &mut W) -> Result<AnchorStats> {
    let extractor = LinkExtractor::new();
    let mut stats = AnchorStats::default();

    stats.revisions = for_each_revision(reader, |_, revision| {
        for record in revision_anchors(&extractor, revision) {
            writeln!(sink, "{record}")?;
            stats.anchors += 1;
        }
        Ok(())
    })?;
    sink.flush()?;

    info!(
        "Extracted {} anchors from {} revisions",
        stats.anchors, stats.revisions
    );
    Ok(stats)
}

/// Revision JSON lines → distinct `title<TAB>page_id` dictionary lines.
///
/// Titles are written with underscores for spaces so that they match the
/// space-delimited keys of time-series files.
pub fn extract_titles<R: BufRead, W: Write>(reader: R, sink: &mut W) -> Result<TitleStats> {
    let mut seen: HashSet<(EntityId, String)> = HashSet::new();
    let mut stats = TitleStats::default();

    stats.revisions = for_each_revision(reader, |_, revision| {
        let Some(title) = revision.title.as_deref() else {
            stats.untitled += 1;
            return Ok(());
        };
        let title = normalize_title(title);
        if seen.insert((revision.page_id, title.clone())) {
            writeln!(sink, "{title}\t{}", revision.page_id)?;
            stats.titles += 1;
        }
        Ok(())
    })?;
    sink.flush()?;

    info!(
        "Extracted {} titles from {} revisions ({} untitled)",
        stats.titles, stats.revisions, stats.untitled
    );
    Ok(stats)
}

/// Copy the revision lines whose timestamp falls inside `window`.
pub fn sample_revisions<R: BufRead, W: Write>(
    reader: R,
    window: TimeWindow,
    sink: &mut W,
) -> Result<SampleStats> {
    let mut stats = SampleStats::default();

    stats.revisions = for_each_revision(reader, |line, revision| {
        if window.contains(revision.timestamp) {
            writeln!(sink, "{line}")?;
            stats.kept += 1;
        }
        Ok(())
    })?;
    sink.flush()?;

    info!("Sampled {} of {} revisions", stats.kept, stats.revisions);
    Ok(stats)
}

/// Rewrite legacy anchor lines into the six-field format.
pub fn repair_anchors<R: BufRead, W: Write>(reader: R, sink: &mut W) -> Result<RepairStats> {
    let mut stats = RepairStats::default();
    for line in lines(reader) {
        let line = line.context("failed to read anchors")?;
        stats.read += 1;
        match repair_anchor_line(&line) {
            Some(fixed) => {
                if fixed != line {
                    stats.repaired += 1;
                }
                writeln!(sink, "{fixed}")?;
            }
            None => stats.dropped += 1,
        }
    }
    sink.flush()?;

    info!(
        "Read {} anchor lines: {} repaired, {} dropped",
        stats.read, stats.repaired, stats.dropped
    );
    Ok(stats)
}

/// Load the dictionary and redirect tables and build the canonical map.
pub fn build_canonical_map<D: BufRead, E: BufRead>(
    dictionary: D,
    redirects: E,
    max_hops: usize,
) -> Result<CanonicalMap> {
    let dictionary = IdentifierDictionary::load(dictionary).context("failed to read dictionary")?;
    debug!(
        "Dictionary loaded: {} titles, {} lines skipped",
        dictionary.len(),
        dictionary.skipped()
    );
    let resolver = RedirectResolver::load(redirects, max_hops).context("failed to read redirects")?;
    debug!("Redirects loaded: {:?}", resolver.stats());
    Ok(CanonicalMap::build(&dictionary, &resolver))
}

/// Dictionary + redirects → canonical mapping lines.
pub fn resolve_redirects<D: BufRead, E: BufRead, W: Write>(
    dictionary: D,
    redirects: E,
    max_hops: usize,
    sink: &mut W,
) -> Result<ResolveStats> {
    let map = build_canonical_map(dictionary, redirects, max_hops)?;
    map.write(sink).context("failed to write canonical mapping")?;
    sink.flush()?;

    let stats = map.stats();
    info!(
        "Resolved {} of {} titles ({} without alias, {} cycles, {} dangling, {} collisions)",
        stats.resolved,
        stats.titles,
        stats.unaliased,
        stats.cycles,
        stats.dangling,
        stats.collisions
    );
    Ok(stats)
}

/// Time-series rows keyed by title → rows keyed by canonical id.
pub fn join_series<R, K, W>(
    series: R,
    key_map: &K,
    month_count: usize,
    sink: &mut W,
) -> Result<JoinStats>
where
    R: BufRead,
    K: KeyMap + ?Sized,
    W: Write,
{
    let joiner = TimeSeriesJoiner::new(key_map, month_count);
    let mut join = joiner.join(series);
    for record in join.by_ref() {
        let record = record.context("join aborted")?;
        writeln!(sink, "{record}")?;
    }
    sink.flush()?;

    let stats = join.stats();
    info!(
        "Joined {} of {} rows ({} without a key)",
        stats.joined, stats.read, stats.dropped
    );
    Ok(stats)
}

/// Rows keyed by canonical id → one summed row per id, ascending.
pub fn aggregate_series<R: BufRead, W: Write>(
    series: R,
    month_count: usize,
    sink: &mut W,
) -> Result<AggregateStats> {
    let mut aggregator: Aggregator = Aggregator::new(month_count);
    let mut stats = AggregateStats::default();

    for (idx, line) in lines(series).enumerate() {
        let line = line.context("failed to read time series")?;
        if line.trim().is_empty() {
            continue;
        }
        stats.read += 1;
        add_row(&mut aggregator, &line)
            .map_err(|e| e.at_line(idx + 1))
            .context("aggregation aborted")?;
    }

    for (id, counts) in aggregator.iter() {
        write_row(sink, id, counts)?;
    }
    sink.flush()?;

    stats.entities = aggregator.len();
    info!(
        "Aggregated {} rows into {} entities",
        stats.read, stats.entities
    );
    Ok(stats)
}

fn add_row(aggregator: &mut Aggregator, line: &str) -> Result<(), SeriesError> {
    let row = TimeSeriesVector::parse(line, aggregator.month_count())?;
    let id: EntityId = row.key.parse().map_err(|_| SeriesError::InvalidId {
        key: row.key.to_string(),
    })?;
    aggregator.add(id, &row.counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnchorRecord;
    use std::io::Cursor;

    fn run<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    const REVISIONS: &str = concat!(
        r#"{"page_id": 1, "page_title": "France", "timestamp": 1300000000000, "rev_id": 10, "text": "[[Paris|capital]] and [[Lyon]]"}"#,
        "\n",
        r#"{"page_id": 1, "page_title": "France", "timestamp": 1400000000000, "rev_id": 11, "parent_id": 10, "text": "[[Paris]]"}"#,
        "\n\n",
        r#"{"page_id": 2, "timestamp": 1200000000000, "rev_id": 20, "text": ""}"#,
        "\n",
    );

    #[test]
    fn test_extract_anchors() {
        let mut stats = AnchorStats::default();
        let out = run(|sink| {
            stats = extract_anchors(Cursor::new(REVISIONS), sink)?;
            Ok(())
        });
        assert_eq!(
            out,
            "1300000000000\t1\t10\t0\tcapital\tParis\n\
             1300000000000\t1\t10\t0\tLyon\tLyon\n\
             1400000000000\t1\t11\t10\tParis\tParis\n"
        );
        assert_eq!(
            stats,
            AnchorStats {
                revisions: 3,
                anchors: 3
            }
        );
    }

    #[test]
    fn test_anchor_lines_parse_back() {
        let revision = r#"{"page_id": 3, "timestamp": 5, "rev_id": 6, "text": "[[P|a\tb]][[R]]"}"#;
        let out = run(|sink| {
            extract_anchors(Cursor::new(revision), sink)?;
            Ok(())
        });
        assert_eq!(out, "5\t3\t6\t0\tR\tR\n");
        assert!(out.lines().all(|l| AnchorRecord::parse_line(l).is_some()));
    }

    #[test]
    fn test_malformed_revision_is_fatal() {
        let mut out = Vec::new();
        let err = extract_anchors(Cursor::new("{\"page_id\": 1}\n"), &mut out).unwrap_err();
        assert!(format!("{err:#}").contains("revision line 1"));
    }

    #[test]
    fn test_extract_titles_deduplicates() {
        let mut stats = TitleStats::default();
        let out = run(|sink| {
            stats = extract_titles(Cursor::new(REVISIONS), sink)?;
            Ok(())
        });
        assert_eq!(out, "France\t1\n");
        assert_eq!(stats.titles, 1);
        assert_eq!(stats.untitled, 1);
    }

    #[test]
    fn test_sample_window() {
        let window = TimeWindow {
            begin_ms: 1_250_000_000_000,
            end_ms: 1_400_000_000_000,
        };
        let out = run(|sink| {
            let stats = sample_revisions(Cursor::new(REVISIONS), window, sink)?;
            assert_eq!(stats.kept, 1);
            Ok(())
        });
        assert!(out.contains("\"rev_id\": 10"));
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn test_repair_anchors() {
        let input = "130000000000012\t99\t98\tCapital\tParis\n\
                     1300000000000\t12\t99\t98\tCapital\tParis\n\
                     junk\n";
        let mut stats = RepairStats::default();
        let out = run(|sink| {
            stats = repair_anchors(Cursor::new(input), sink)?;
            Ok(())
        });
        assert_eq!(out.lines().count(), 2);
        assert!(out.lines().all(|l| l == "1300000000000\t12\t99\t98\tCapital\tParis"));
        assert_eq!(
            stats,
            RepairStats {
                read: 3,
                repaired: 1,
                dropped: 1
            }
        );
    }

    #[test]
    fn test_resolve_redirects() {
        let dictionary = "UK\t10\nUnited Kingdom\t20\nbroken line\n";
        let redirects = "UK\tBritain\t1\nBritain\tUnited Kingdom\t-1\nX\tY\t3\n";
        let out = run(|sink| {
            let stats =
                resolve_redirects(Cursor::new(dictionary), Cursor::new(redirects), 1, sink)?;
            assert_eq!(stats.resolved, 1);
            Ok(())
        });
        assert_eq!(out, "UK\t20\nUnited_Kingdom 20\n");
    }

    #[test]
    fn test_extracted_titles_join_multi_word_keys() {
        let revisions = r#"{"page_id": 7, "page_title": "New York", "timestamp": 1, "rev_id": 1}"#;
        let dictionary = run(|sink| {
            extract_titles(Cursor::new(revisions), sink)?;
            Ok(())
        });
        assert_eq!(dictionary, "New_York\t7\n");

        let dict = IdentifierDictionary::load(Cursor::new(dictionary)).unwrap();
        let mut stats = JoinStats::default();
        let joined = run(|sink| {
            stats = join_series(Cursor::new("New_York 1 2\n"), &dict, 2, sink)?;
            Ok(())
        });
        assert_eq!(joined, "7 1 2\n");
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_join_then_aggregate() {
        let map =
            CanonicalMap::load(Cursor::new("UK\t20\nUnited_Kingdom 20\nFrance 1\n")).unwrap();
        let joined = run(|sink| {
            join_series(
                Cursor::new("UK 1 2\nUnited_Kingdom 3 4\nAtlantis 9 9\nFrance 0 1\n"),
                &map,
                2,
                sink,
            )?;
            Ok(())
        });
        assert_eq!(joined, "20 1 2\n20 3 4\n1 0 1\n");

        let aggregated = run(|sink| {
            let stats = aggregate_series(Cursor::new(joined.as_str()), 2, sink)?;
            assert_eq!(stats.entities, 2);
            Ok(())
        });
        assert_eq!(aggregated, "1 0 1\n20 4 6\n");
    }

    #[test]
    fn test_aggregate_mismatch_is_fatal() {
        let mut out = Vec::new();
        let err = aggregate_series(Cursor::new("1 1 2\n1 1 2 3\n"), 2, &mut out).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("line 2"), "{msg}");
        assert!(msg.contains("expected 2 counts"), "{msg}");
        assert!(out.is_empty());
    }

    #[test]
    fn test_aggregate_rejects_textual_keys() {
        let mut out = Vec::new();
        assert!(aggregate_series(Cursor::new("Paris 1\n"), 1, &mut out).is_err());
    }
}
