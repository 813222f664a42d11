//! A library for keeping tiered BibTeX bibliographies internally consistent.
//!
//! `bibtier` parses loosely-formatted BibTeX files, detects duplicate entries
//! across several identity dimensions, reconciles citation-key conflicts using
//! tier precedence, validates entries against a per-type field policy, and
//! safely rewrites source files with backups.
//!
//! # Key Features
//!
//! - **Tolerant Parsing**: Regex-based scanning of `@type{key, ...}` blocks
//!   that recovers from malformed entries instead of aborting the file.
//! - **Multi-Key Duplicate Detection**:
//!   - Citation key (exact, case-sensitive)
//!   - Normalized title
//!   - DOI and ISBN
//! - **Tier-Aware Resolution**: duplicate citation keys are resolved in favor
//!   of the entry from the highest-precedence tier file; other dimensions are
//!   reported for human review, never auto-removed.
//! - **Policy Validation**: per-type required fields, classification tags,
//!   ISBN/DOI format checks, and abstract length rules.
//! - **Safe Rewriting**: duplicate removal preserves surviving entries
//!   byte-for-byte and writes a backup before touching any file.
//!
//! # Basic Usage
//!
//! ```rust
//! use bibtier::bibtex::parse_file;
//!
//! let input = r#"@book{knuth1984,
//!   title = {The TeXbook},
//!   author = {Knuth, Donald E.},
//!   year = {1984},
//!   publisher = {Addison-Wesley}
//! }"#;
//!
//! let parsed = parse_file(input, "tier1-core.bib");
//! assert_eq!(parsed.entries.len(), 1);
//! assert_eq!(parsed.entries[0].key, "knuth1984");
//! ```
//!
//! # Running a Whole-Corpus Pass
//!
//! ```rust,no_run
//! use bibtier::corpus::{RunConfig, run};
//!
//! let config = RunConfig {
//!     dir: "bibliography".into(),
//!     dry_run: true,
//!     strict: false,
//! };
//!
//! let report = run(&config).unwrap();
//! for decision in &report.decisions {
//!     println!("{} retained from {}", decision.key, decision.retained.file);
//! }
//! assert!(!report.failed(config.strict));
//! ```
//!
//! # Error Handling
//!
//! Recoverable problems (malformed entries, policy violations, advisory
//! duplicate groups) are accumulated into the run report rather than returned
//! as `Err`. Only I/O failures surface through the crate [`Result`]; a backup
//! that cannot be written aborts that one file's rewrite and leaves the
//! original untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

pub mod bibtex;
pub mod corpus;
pub mod index;
mod regex;
pub mod resolve;
pub mod rewrite;
pub mod validate;

// Reexports
pub use bibtex::{ParseIssue, ParsedFile};
pub use corpus::{RunConfig, RunReport};
pub use index::CorpusIndex;
pub use resolve::resolve;
pub use rewrite::Rewriter;
pub use validate::{ValidationOutcome, Validator};

/// A specialized Result type for bibliography operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an operation rather than being accumulated in a report.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no .bib files found in {}", .0.display())]
    NoBibFiles(PathBuf),

    #[error("refusing to overwrite existing backup: {}", .0.display())]
    BackupExists(PathBuf),
}

static TIER_REGEX: LazyLock<crate::regex::Regex> =
    LazyLock::new(|| crate::regex::Regex::new(r"(?i)\bt(?:ier)?[\s_-]?([0-9]+)").unwrap());

/// Precedence ordinal derived from a source file's name.
///
/// Lower ordinals win: an entry from a tier-1 file beats the same citation
/// key in a tier-2 file. Files whose name carries no recognizable tier
/// marker sort after every ranked tier.
///
/// # Examples
///
/// ```
/// use bibtier::Tier;
///
/// assert_eq!(Tier::from_file_name("tier1-core.bib"), Tier(1));
/// assert_eq!(Tier::from_file_name("refs-T3.bib"), Tier(3));
/// assert_eq!(Tier::from_file_name("scratch.bib"), Tier::UNRANKED);
/// assert!(Tier(1) < Tier(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tier(pub u32);

impl Tier {
    /// Lowest possible precedence, assigned when a file name encodes no tier.
    pub const UNRANKED: Tier = Tier(u32::MAX);

    /// Derives the tier ordinal from a file name.
    ///
    /// Recognizes `tier1`, `tier 1`, `tier-1`, `T1` and similar markers,
    /// case-insensitively. The first marker in the name wins.
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        TIER_REGEX
            .captures(name)
            .and_then(|caps| caps[1].parse().ok())
            .map_or(Self::UNRANKED, Tier)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::UNRANKED {
            write!(f, "unranked")
        } else {
            write!(f, "tier {}", self.0)
        }
    }
}

/// Category of a bibliography entry.
///
/// Open-ended: types the crate has no policy for fall into
/// [`EntryType::Unknown`], which keeps the raw type name and is validated
/// like `misc` (title only).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    Article,
    Book,
    InProceedings,
    Thesis,
    Report,
    Manual,
    Misc,
    Unknown(String),
}

impl EntryType {
    /// Maps a raw BibTeX type name (case-insensitive) to its category.
    ///
    /// `phdthesis` and `mastersthesis` both map to [`EntryType::Thesis`];
    /// `techreport` maps to [`EntryType::Report`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "article" => Self::Article,
            "book" => Self::Book,
            "inproceedings" | "in-proceedings" | "conference" => Self::InProceedings,
            "phdthesis" | "mastersthesis" | "thesis" => Self::Thesis,
            "techreport" | "report" => Self::Report,
            "manual" => Self::Manual,
            "misc" => Self::Misc,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Article => write!(f, "article"),
            Self::Book => write!(f, "book"),
            Self::InProceedings => write!(f, "inproceedings"),
            Self::Thesis => write!(f, "thesis"),
            Self::Report => write!(f, "report"),
            Self::Manual => write!(f, "manual"),
            Self::Misc => write!(f, "misc"),
            Self::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

/// One bibliography entry with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Category of the entry
    pub entry_type: EntryType,
    /// Citation key, unique within a well-formed corpus
    pub key: String,
    /// Field name (lowercased) to raw value
    pub fields: HashMap<String, String>,
    /// Name of the file the entry was read from
    pub source_file: String,
    /// Precedence derived from the source file name
    pub tier: Tier,
}

impl Entry {
    /// Looks up a field by its lowercased name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Whether the entry has a non-empty value for the field.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some_and(|v| !v.trim().is_empty())
    }
}

/// A lightweight reference to an entry, used in reports and decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRef {
    /// Citation key of the referenced entry
    pub key: String,
    /// File the entry was read from
    pub file: String,
    /// Tier of that file
    pub tier: Tier,
}

impl EntryRef {
    #[must_use]
    pub fn of(entry: &Entry) -> Self {
        Self {
            key: entry.key.clone(),
            file: entry.source_file.clone(),
            tier: entry.tier,
        }
    }
}

/// Identity dimension that produced a duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    CitationKey,
    Title,
    Doi,
    Isbn,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CitationKey => write!(f, "citation_key"),
            Self::Title => write!(f, "title"),
            Self::Doi => write!(f, "doi"),
            Self::Isbn => write!(f, "isbn"),
        }
    }
}

/// Two or more entries sharing one identity dimension.
///
/// Groups from different dimensions are independent even when they overlap
/// in membership; they are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Which dimension the members collide on
    pub match_kind: MatchKind,
    /// The shared (normalized) value
    pub value: String,
    /// Members in corpus scan order
    pub members: Vec<EntryRef>,
}

/// The outcome of reconciling one citation-key duplicate group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionDecision {
    /// The duplicated citation key
    pub key: String,
    /// The single entry kept
    pub retained: EntryRef,
    /// Every other group member, marked for removal
    pub removals: Vec<Removal>,
}

/// One entry slated for removal from its source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Removal {
    /// File holding the entry to remove
    pub file: String,
    /// Citation key of the entry to remove
    pub key: String,
}

/// How seriously a validation rule failure should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// One rule failure attached to an entry during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub severity: Severity,
    pub message: String,
}

impl Violation {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("tier1-core.bib", Tier(1))]
    #[case("tier2-applied.bib", Tier(2))]
    #[case("tier 3 emerging.bib", Tier(3))]
    #[case("refs-T2.bib", Tier(2))]
    #[case("T1.bib", Tier(1))]
    #[case("Tier_4.bib", Tier(4))]
    #[case("scratch.bib", Tier::UNRANKED)]
    #[case("item1.bib", Tier::UNRANKED)]
    fn test_tier_from_file_name(#[case] name: &str, #[case] expected: Tier) {
        assert_eq!(Tier::from_file_name(name), expected);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier(1) < Tier(2));
        assert!(Tier(3) < Tier::UNRANKED);
    }

    #[rstest]
    #[case("article", EntryType::Article)]
    #[case("Book", EntryType::Book)]
    #[case("InProceedings", EntryType::InProceedings)]
    #[case("phdthesis", EntryType::Thesis)]
    #[case("mastersthesis", EntryType::Thesis)]
    #[case("techreport", EntryType::Report)]
    #[case("misc", EntryType::Misc)]
    #[case("patent", EntryType::Unknown("patent".to_string()))]
    fn test_entry_type_parse(#[case] raw: &str, #[case] expected: EntryType) {
        assert_eq!(EntryType::parse(raw), expected);
    }

    #[test]
    fn test_violation_constructors() {
        let v = Violation::error("missing required field: title");
        assert_eq!(v.severity, Severity::Error);
        assert!(Violation::warning("missing ISBN").severity < v.severity);
    }
}
