use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default number of bars on display.
pub const MAX_DISPLAY: usize = 15;

/// One key and its count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: u64,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: u64) -> Self {
        Entry {
            key: key.into(),
            value,
        }
    }
}

/// Top-N entries sorted by value, highest first, with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ranking(Vec<Entry>);

/// A ranking together with the largest value of the full result set it was cut from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub ranking: Ranking,
    pub largest_value: u64,
}

/// Both ends of an animated transition.
///
/// `old` lists the keys of `new`, in `new`'s order, carrying the value each
/// key had before; keys that were not displayed before start from zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub old: Vec<Entry>,
    pub new: Ranking,
    pub largest_value: u64,
}

impl Ranking {
    pub fn empty() -> Self {
        Ranking(Vec::new())
    }

    /// Sort `counts` descending and keep the first `max_display`.
    ///
    /// Repeated keys are summed first; ties are ordered by key so the result
    /// does not depend on the order the service returned records in.
    pub fn top(counts: Vec<Entry>, max_display: usize) -> Tally {
        let mut totals: HashMap<String, u64> = HashMap::with_capacity(counts.len());
        for entry in counts {
            *totals.entry(entry.key).or_insert(0) += entry.value;
        }
        let largest_value = totals.values().copied().max().unwrap_or(0);
        let mut entries: Vec<Entry> = totals
            .into_iter()
            .map(|(key, value)| Entry { key, value })
            .collect();
        entries.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.key.cmp(&b.key)));
        entries.truncate(max_display);
        Tally {
            ranking: Ranking(entries),
            largest_value,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn value_of(&self, key: &str) -> Option<u64> {
        self.0.iter().find(|entry| entry.key == key).map(|entry| entry.value)
    }
}

impl<'a> IntoIterator for &'a Ranking {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Pair the previously displayed ranking with a freshly fetched one.
pub fn merge(old: &Ranking, new: Tally) -> Merged {
    let previous: HashMap<&str, u64> = old
        .iter()
        .map(|entry| (entry.key.as_str(), entry.value))
        .collect();
    let old = new
        .ranking
        .iter()
        .map(|entry| Entry {
            key: entry.key.clone(),
            value: previous.get(entry.key.as_str()).copied().unwrap_or(0),
        })
        .collect();
    Merged {
        old,
        new: new.ranking,
        largest_value: new.largest_value,
    }
}
