use std::collections::{HashMap, HashSet};
use std::io::{self, BufRead};

use crate::io::lines;
use crate::models::{EntityId, normalize_title};

/// Role of a redirect edge, taken from its direction marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Marker `-1`: the source title is an alias of the target title.
    Alias,
    /// Marker `1`: the source title should resolve to the target title.
    Request,
}

impl Direction {
    pub fn from_marker(marker: i64) -> Option<Self> {
        match marker {
            -1 => Some(Direction::Alias),
            1 => Some(Direction::Request),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectEdge {
    pub source: String,
    pub target: String,
    pub direction: Direction,
}

/// Why a redirect line produced no edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRejection {
    Malformed,
    UnknownMarker,
}

impl RedirectEdge {
    /// Parse `source<TAB>target<TAB>marker`.
    pub fn parse_line(line: &str) -> Result<Self, EdgeRejection> {
        let (head, marker) = line.rsplit_once('\t').ok_or(EdgeRejection::Malformed)?;
        let (source, target) = head.split_once('\t').ok_or(EdgeRejection::Malformed)?;
        let marker: i64 = marker
            .trim()
            .parse()
            .map_err(|_| EdgeRejection::Malformed)?;
        let direction = Direction::from_marker(marker).ok_or(EdgeRejection::UnknownMarker)?;
        if source.is_empty() || target.is_empty() {
            return Err(EdgeRejection::Malformed);
        }
        Ok(Self {
            source: normalize_title(source),
            target: normalize_title(target),
            direction,
        })
    }
}

/// Outcome of resolving one title through the redirect tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The title carries no redirect request.
    NoRedirect,
    Resolved(EntityId),
    /// The request target is not a known alias.
    NoAlias,
    /// The alias walk revisits a title.
    Cycle,
    /// The alias walk ends at a title missing from the dictionary.
    Dangling,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RedirectLoadStats {
    pub aliases: usize,
    pub requests: usize,
    pub malformed: usize,
    pub ignored: usize,
}

/// Alias and request tables built from the redirect file.
///
/// All titles are stored normalized (underscores for spaces).
#[derive(Debug, Clone)]
pub struct RedirectResolver {
    aliases: HashMap<String, String>,
    requests: HashMap<String, String>,
    max_hops: usize,
    stats: RedirectLoadStats,
}

impl RedirectResolver {
    pub fn new(max_hops: usize) -> Self {
        Self {
            aliases: HashMap::new(),
            requests: HashMap::new(),
            max_hops,
            stats: RedirectLoadStats::default(),
        }
    }

    pub fn from_edges<I>(edges: I, max_hops: usize) -> Self
    where
        I: IntoIterator<Item = RedirectEdge>,
    {
        let mut resolver = Self::new(max_hops);
        for edge in edges {
            resolver.add_edge(edge);
        }
        resolver
    }

    pub fn from_lines<I, S>(input: I, max_hops: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolver = Self::new(max_hops);
        for line in input {
            resolver.push_line(line.as_ref());
        }
        resolver
    }

    /// Stream a redirect file. Only I/O errors abort the load.
    pub fn load<R: BufRead>(reader: R, max_hops: usize) -> io::Result<Self> {
        let mut resolver = Self::new(max_hops);
        for line in lines(reader) {
            resolver.push_line(&line?);
        }
        Ok(resolver)
    }

    fn push_line(&mut self, line: &str) {
        match RedirectEdge::parse_line(line) {
            Ok(edge) => self.add_edge(edge),
            Err(EdgeRejection::Malformed) => self.stats.malformed += 1,
            Err(EdgeRejection::UnknownMarker) => self.stats.ignored += 1,
        }
    }

    pub fn add_edge(&mut self, edge: RedirectEdge) {
        match edge.direction {
            Direction::Alias => {
                self.stats.aliases += 1;
                self.aliases.insert(edge.source, edge.target);
            }
            Direction::Request => {
                self.stats.requests += 1;
                self.requests.insert(edge.source, edge.target);
            }
        }
    }

    pub fn stats(&self) -> RedirectLoadStats {
        self.stats
    }

    /// Resolve a normalized title against a normalized title → id index.
    ///
    /// Only titles with a redirect request are resolved, and only through the
    /// alias table: the request target must itself be an alias, and the walk
    /// follows at most `max_hops` alias edges from it.
    pub fn resolve(&self, title: &str, index: &HashMap<String, EntityId>) -> Resolution {
        let Some(target) = self.requests.get(title).map(String::as_str) else {
            return Resolution::NoRedirect;
        };
        let Some(first) = self.aliases.get(target).map(String::as_str) else {
            return Resolution::NoAlias;
        };

        let mut visited: HashSet<&str> = HashSet::from([title, target]);
        if !visited.insert(first) {
            return Resolution::Cycle;
        }
        let mut current = first;
        for _ in 1..self.max_hops {
            let Some(next) = self.aliases.get(current).map(String::as_str) else {
                break;
            };
            if !visited.insert(next) {
                return Resolution::Cycle;
            }
            current = next;
        }

        match index.get(current) {
            Some(&id) => Resolution::Resolved(id),
            None => Resolution::Dangling,
        }
    }
}
