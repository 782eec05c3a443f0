use std::collections::HashMap;
use std::io::{self, BufRead};

use crate::io::lines;
use crate::models::EntityId;

/// Title → numeric id table, loaded once per run and read-only afterwards.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdentifierDictionary {
    entries: HashMap<String, EntityId>,
    skipped: usize,
}

impl IdentifierDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `title<TAB>id` lines.
    ///
    /// The last tab separates the id, so titles may contain anything else.
    /// Lines without a tab, with an empty title or a non-integer id are
    /// skipped. A repeated title keeps the id of its last line.
    pub fn from_lines<I, S>(input: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dict = Self::new();
        for line in input {
            dict.push_line(line.as_ref());
        }
        dict
    }

    /// Stream a dictionary file. Only I/O errors abort the load.
    pub fn load<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut dict = Self::new();
        for line in lines(reader) {
            dict.push_line(&line?);
        }
        Ok(dict)
    }

    fn push_line(&mut self, line: &str) {
        match parse_entry(line) {
            Some((title, id)) => self.insert(title, id),
            None => self.skipped += 1,
        }
    }

    pub fn insert(&mut self, title: &str, id: EntityId) {
        self.entries.insert(title.to_string(), id);
    }

    pub fn get(&self, title: &str) -> Option<EntityId> {
        self.entries.get(title).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of input lines rejected while loading.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, EntityId)> {
        self.entries.iter().map(|(t, &id)| (t.as_str(), id))
    }
}

fn parse_entry(line: &str) -> Option<(&str, EntityId)> {
    let (title, id) = line.rsplit_once('\t')?;
    if title.is_empty() {
        return None;
    }
    let id = id.trim().parse().ok()?;
    Some((title, id))
}
