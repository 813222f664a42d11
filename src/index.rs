//! Identity indexing across the whole corpus.
//!
//! Builds four independent indices over all parsed entries, one per
//! identity dimension: citation key (verbatim, case-sensitive), normalized
//! title, DOI (case-folded), and ISBN (hyphens and whitespace stripped).
//! Any bucket with two or more members yields a [`DuplicateGroup`] tagged
//! with the dimension that produced it. An entry can sit in several groups
//! at once; overlapping groups are reported independently, never merged.
//!
//! An entry missing a field is simply absent from that dimension's index.
//! Absence only becomes a finding later, in validation.

use crate::regex::Regex;
use crate::{DuplicateGroup, Entry, EntryRef, MatchKind};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

static NON_TITLE_CHARS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s]").unwrap());

static WHITESPACE_RUN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// The four per-dimension indices over one corpus of entries.
#[derive(Debug)]
pub struct CorpusIndex<'a> {
    entries: &'a [Entry],
    by_key: HashMap<String, Vec<usize>>,
    by_title: HashMap<String, Vec<usize>>,
    by_doi: HashMap<String, Vec<usize>>,
    by_isbn: HashMap<String, Vec<usize>>,
}

/// Corpus-level counts, for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub total_entries: usize,
    pub unique_titles: usize,
    pub unique_dois: usize,
    pub unique_isbns: usize,
}

impl<'a> CorpusIndex<'a> {
    /// Indexes every entry by each identity dimension it carries a value
    /// for. Entries must already be in corpus scan order; bucket members
    /// keep that order.
    #[must_use]
    pub fn build(entries: &'a [Entry]) -> Self {
        let by_key = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.key.clone(), i))
            .into_group_map();

        let by_title = entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.field("title").map(|t| (normalize_title(t), i)))
            .filter(|(t, _)| !t.is_empty())
            .into_group_map();

        let by_doi = entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.field("doi").map(|d| (d.to_lowercase(), i)))
            .filter(|(d, _)| !d.is_empty())
            .into_group_map();

        let by_isbn = entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.field("isbn").map(|n| (normalize_isbn(n), i)))
            .filter(|(n, _)| !n.is_empty())
            .into_group_map();

        Self {
            entries,
            by_key,
            by_title,
            by_doi,
            by_isbn,
        }
    }

    /// Every bucket with two or more members, as one group per bucket.
    ///
    /// Groups are sorted by dimension and shared value so the report is
    /// reproducible across runs.
    #[must_use]
    pub fn duplicate_groups(&self) -> Vec<DuplicateGroup> {
        let dimensions = [
            (MatchKind::CitationKey, &self.by_key),
            (MatchKind::Title, &self.by_title),
            (MatchKind::Doi, &self.by_doi),
            (MatchKind::Isbn, &self.by_isbn),
        ];

        dimensions
            .into_iter()
            .flat_map(|(kind, map)| {
                map.iter()
                    .filter(|(_, members)| members.len() >= 2)
                    .sorted_by(|a, b| a.0.cmp(b.0))
                    .map(move |(value, members)| DuplicateGroup {
                        match_kind: kind,
                        value: value.clone(),
                        members: members
                            .iter()
                            .map(|&i| EntryRef::of(&self.entries[i]))
                            .collect(),
                    })
            })
            .collect()
    }

    #[must_use]
    pub fn summary(&self) -> CorpusSummary {
        CorpusSummary {
            total_entries: self.entries.len(),
            unique_titles: self.by_title.len(),
            unique_dois: self.by_doi.len(),
            unique_isbns: self.by_isbn.len(),
        }
    }
}

/// Normalizes a title for comparison: lowercase, strip everything outside
/// `[a-z0-9\s]`, collapse whitespace runs, trim.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = NON_TITLE_CHARS_REGEX.replace_all(&lowered, "");
    WHITESPACE_RUN_REGEX
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}

/// Normalizes an ISBN for comparison: strip hyphens and whitespace only,
/// preserving digits and the check character.
#[must_use]
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}
