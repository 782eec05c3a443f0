use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, BufRead, Write};

use tracing::debug;

use super::dictionary::IdentifierDictionary;
use super::redirect::{RedirectResolver, Resolution};
use crate::io::lines;
use crate::models::{EntityId, normalize_title};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedId {
    pub original: EntityId,
    pub canonical: EntityId,
    /// True when a redirect replaced the original id.
    pub resolved: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveStats {
    pub titles: usize,
    pub resolved: usize,
    /// Requests whose target is not an alias.
    pub unaliased: usize,
    pub cycles: usize,
    pub dangling: usize,
    /// Dictionary titles folded into an earlier title by normalization.
    pub collisions: usize,
}

/// Normalized title → canonical id, plus the id-level redirect table.
#[derive(Debug, Default, Clone)]
pub struct CanonicalMap {
    titles: BTreeMap<String, MappedId>,
    redirected: HashMap<EntityId, EntityId>,
    stats: ResolveStats,
}

impl CanonicalMap {
    /// Resolve every dictionary title through the redirect tables.
    pub fn build(dictionary: &IdentifierDictionary, resolver: &RedirectResolver) -> Self {
        // Sorted so that titles colliding after normalization resolve the
        // same way on every run. The last verbatim spelling wins.
        let mut verbatim: Vec<(&str, EntityId)> = dictionary.iter().collect();
        verbatim.sort_unstable();
        let mut map = Self::default();
        let mut index: HashMap<String, EntityId> = HashMap::with_capacity(verbatim.len());
        for (title, id) in verbatim {
            if index.insert(normalize_title(title), id).is_some() {
                map.stats.collisions += 1;
            }
        }

        for (title, &original) in &index {
            let canonical = match resolver.resolve(title, &index) {
                Resolution::NoRedirect => None,
                Resolution::Resolved(id) => Some(id),
                Resolution::Cycle => {
                    map.stats.cycles += 1;
                    None
                }
                Resolution::NoAlias => {
                    map.stats.unaliased += 1;
                    None
                }
                Resolution::Dangling => {
                    map.stats.dangling += 1;
                    None
                }
            };
            let mapped = match canonical {
                Some(id) if id != original => {
                    map.stats.resolved += 1;
                    map.redirected.insert(original, id);
                    MappedId {
                        original,
                        canonical: id,
                        resolved: true,
                    }
                }
                _ => MappedId {
                    original,
                    canonical: original,
                    resolved: false,
                },
            };
            map.titles.insert(title.clone(), mapped);
        }

        // Two titles sharing an id can leave a canonical id that is itself
        // redirected; drop those so id resolution stays a fixed point.
        let sources: HashSet<EntityId> = map.redirected.keys().copied().collect();
        map.redirected.retain(|_, canonical| !sources.contains(canonical));

        map.stats.titles = map.titles.len();
        debug!(
            "Canonical map built: {} titles, {} resolved",
            map.stats.titles, map.stats.resolved
        );
        map
    }

    /// Read a canonical mapping file written by [`CanonicalMap::write`].
    ///
    /// The last space or tab separates title and id; a tab marks a resolved
    /// entry. Unparsable lines are skipped.
    pub fn load<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut map = Self::default();
        for line in lines(reader) {
            let line = line?;
            let Some(sep) = line.rfind([' ', '\t']) else {
                continue;
            };
            let (title, id) = (&line[..sep], &line[sep + 1..]);
            let Ok(id) = id.trim().parse::<EntityId>() else {
                continue;
            };
            if title.is_empty() {
                continue;
            }
            let resolved = line.as_bytes()[sep] == b'\t';
            if resolved {
                map.stats.resolved += 1;
            }
            map.titles.insert(
                normalize_title(title),
                MappedId {
                    original: id,
                    canonical: id,
                    resolved,
                },
            );
        }
        map.stats.titles = map.titles.len();
        Ok(map)
    }

    /// Write `title id` for unresolved and `title<TAB>id` for resolved
    /// entries, sorted by title.
    pub fn write<W: Write>(&self, sink: &mut W) -> io::Result<usize> {
        for (title, mapped) in &self.titles {
            if mapped.resolved {
                writeln!(sink, "{title}\t{}", mapped.canonical)?;
            } else {
                writeln!(sink, "{title} {}", mapped.original)?;
            }
        }
        Ok(self.titles.len())
    }

    /// Canonical id for a title, spaces and underscores treated alike.
    pub fn lookup_title(&self, title: &str) -> Option<EntityId> {
        let key: Cow<'_, str> = if title.contains(' ') {
            Cow::Owned(normalize_title(title))
        } else {
            Cow::Borrowed(title)
        };
        self.titles.get(key.as_ref()).map(|m| m.canonical)
    }

    pub fn get(&self, title: &str) -> Option<&MappedId> {
        self.titles.get(title)
    }

    /// Canonical id for an id. Ids without a redirect map to themselves.
    pub fn resolve_id(&self, id: EntityId) -> EntityId {
        self.redirected.get(&id).copied().unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn stats(&self) -> ResolveStats {
        self.stats
    }
}
