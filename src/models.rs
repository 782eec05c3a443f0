//! Record types exchanged between pipeline stages.
//!
//! Each record kind is validated once at its parse boundary; nothing
//! downstream sees a partially filled record.
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Stable numeric identifier of a wiki page/entity.
pub type EntityId = u64;

/// Titles are compared with spaces and underscores treated alike.
pub fn normalize_title(title: &str) -> String {
    title.replace(' ', "_")
}

// ── RevisionRecord ───────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RevisionError {
    #[error("invalid revision record: {0}")]
    Json(#[from] serde_json::Error),
}

/// One revision of one page, as found in the JSON revision dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRecord {
    pub page_id: EntityId,
    pub title: Option<String>,
    /// Epoch milliseconds.
    pub timestamp: u64,
    pub rev_id: u64,
    /// 0 when the revision has no parent.
    pub parent_id: u64,
    pub text: String,
}

#[derive(Deserialize)]
struct RawRevision {
    #[serde(deserialize_with = "de_u64")]
    page_id: u64,
    #[serde(default)]
    page_title: Option<String>,
    #[serde(deserialize_with = "de_u64")]
    timestamp: u64,
    #[serde(deserialize_with = "de_u64")]
    rev_id: u64,
    #[serde(default, deserialize_with = "de_opt_u64")]
    parent_id: Option<u64>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn into_u64<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("not a non-negative integer: {s:?}"))),
        }
    }
}

fn de_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    NumberOrString::deserialize(d)?.into_u64()
}

fn de_opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Option::<NumberOrString>::deserialize(d)?
        .map(|v| v.into_u64::<D::Error>())
        .transpose()
}

impl RevisionRecord {
    /// Parse one line of the JSON revision dump.
    pub fn from_json(line: &str) -> Result<Self, RevisionError> {
        let raw: RawRevision = serde_json::from_str(line)?;
        Ok(Self {
            page_id: raw.page_id,
            title: raw.page_title.filter(|t| !t.is_empty()),
            timestamp: raw.timestamp,
            rev_id: raw.rev_id,
            parent_id: raw.parent_id.unwrap_or(0),
            text: raw.text.unwrap_or_default(),
        })
    }
}

// ── AnchorRecord ─────────────────────────────────────────────────────

/// One extracted link, tied to the revision it was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorRecord<'a> {
    pub timestamp: u64,
    pub source_id: EntityId,
    pub rev_id: u64,
    pub parent_id: u64,
    pub anchor: &'a str,
    pub target: &'a str,
}

impl<'a> AnchorRecord<'a> {
    /// Parse `timestamp\tsource\trev\tparent\tanchor\ttarget`.
    ///
    /// Returns `None` for lines that do not have exactly six fields or whose
    /// first four fields are not integers.
    pub fn parse_line(line: &'a str) -> Option<Self> {
        let mut fields = line.split('\t');
        let timestamp = fields.next()?.parse().ok()?;
        let source_id = fields.next()?.parse().ok()?;
        let rev_id = fields.next()?.parse().ok()?;
        let parent_id = fields.next()?.parse().ok()?;
        let anchor = fields.next()?;
        let target = fields.next()?;
        if fields.next().is_some() || target.is_empty() {
            return None;
        }
        Some(Self {
            timestamp,
            source_id,
            rev_id,
            parent_id,
            anchor,
            target,
        })
    }
}

impl fmt::Display for AnchorRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.timestamp, self.source_id, self.rev_id, self.parent_id, self.anchor, self.target
        )
    }
}

// Timestamp (13 digits of epoch ms) glued to the source page id.
static FUSED_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{13})(\d+)$").expect("static regex"));

/// Repair an anchor line written by older extractors that forgot the tab
/// between timestamp and source id.
///
/// Well-formed lines come back unchanged; lines that are neither
/// well-formed nor repairable yield `None`.
pub fn repair_anchor_line(line: &str) -> Option<String> {
    if AnchorRecord::parse_line(line).is_some() {
        return Some(line.to_string());
    }
    let (head, rest) = line.split_once('\t')?;
    let caps = FUSED_PREFIX.captures(head)?;
    let repaired = format!("{}\t{}\t{}", &caps[1], &caps[2], rest);
    if AnchorRecord::parse_line(&repaired).is_some() {
        Some(repaired)
    } else {
        None
    }
}
