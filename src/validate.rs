//! Per-entry policy validation.
//!
//! Applies the required-field table for each entry type plus format rules
//! for ISBNs, DOIs, abstracts, and the mandatory classification tag. The
//! validator is purely a reporter: errors block a run, warnings never do,
//! and nothing here touches disk.
//!
//! The validator tracks citation keys seen within one pass so it can flag
//! cross-file key collisions on its own, without the duplicate pipeline
//! having run first. That overlap with the indexer is deliberate.
//!
//! # Example
//!
//! ```
//! use bibtier::bibtex::parse_file;
//! use bibtier::validate::Validator;
//!
//! let parsed = parse_file(
//!     "@book{b1, title = {T}, author = {A}, year = {2020}}",
//!     "tier1-core.bib",
//! );
//!
//! let mut validator = Validator::new();
//! let outcome = validator.validate(&parsed.entries[0]);
//! // publisher, abstract, and classification tag are all missing
//! assert!(!outcome.is_valid());
//! ```

use crate::index::normalize_isbn;
use crate::regex::Regex;
use crate::{Entry, EntryType, Severity, Violation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Abstracts shorter than this are flagged as suspiciously short.
pub const MIN_ABSTRACT_LEN: usize = 50;

static DOI_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^10\.[0-9]{4,9}/[-._;()/:a-zA-Z0-9]+$").unwrap());

static ISBN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9]{9}[0-9X]|[0-9]{13})$").unwrap());

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"TAG:[A-Z][A-Z0-9]*").unwrap());

/// The validation result for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// File the entry came from
    pub file: String,
    /// Citation key of the entry
    pub key: String,
    /// Every rule failure, errors and warnings alike
    pub violations: Vec<Violation>,
}

impl ValidationOutcome {
    /// An entry is valid when it has zero error-severity violations;
    /// warnings never block.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .count()
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.violations.len() - self.error_count()
    }
}

/// Stateful validator for one pass over a corpus.
///
/// The only state is the set of citation keys seen so far, used to flag
/// cross-file collisions. Construct a fresh validator per pass.
#[derive(Debug, Default)]
pub struct Validator {
    seen_keys: HashSet<String>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every policy rule to one entry.
    ///
    /// A repeated citation key short-circuits: the collision is the only
    /// violation reported for the later copy, since its remaining findings
    /// would duplicate the first copy's.
    pub fn validate(&mut self, entry: &Entry) -> ValidationOutcome {
        let mut outcome = ValidationOutcome {
            file: entry.source_file.clone(),
            key: entry.key.clone(),
            violations: Vec::new(),
        };

        if !self.seen_keys.insert(entry.key.clone()) {
            outcome
                .violations
                .push(Violation::error("duplicate citation key"));
            return outcome;
        }

        check_required_fields(entry, &mut outcome.violations);
        check_classification_tag(entry, &mut outcome.violations);
        check_isbn(entry, &mut outcome.violations);
        check_doi(entry, &mut outcome.violations);
        check_abstract(entry, &mut outcome.violations);

        outcome
    }
}

/// Required fields per entry type, beyond the either/or cases handled
/// separately.
fn required_fields(entry_type: &EntryType) -> &'static [&'static str] {
    match entry_type {
        EntryType::Book => &["title", "author", "year", "publisher"],
        EntryType::Article => &["title", "author", "year", "journal"],
        EntryType::InProceedings => &["title", "author", "year", "booktitle"],
        EntryType::Thesis => &["title", "author", "year"],
        EntryType::Report => &["title", "author", "year", "institution"],
        EntryType::Manual | EntryType::Misc | EntryType::Unknown(_) => &["title"],
    }
}

fn check_required_fields(entry: &Entry, violations: &mut Vec<Violation>) {
    for field in required_fields(&entry.entry_type) {
        if !entry.has_field(field) {
            violations.push(Violation::error(format!(
                "missing required field: {field}"
            )));
        }
    }

    // A thesis may name its granting body in either field.
    if entry.entry_type == EntryType::Thesis
        && !entry.has_field("institution")
        && !entry.has_field("school")
    {
        violations.push(Violation::error(
            "missing required field: institution/school",
        ));
    }
}

/// Every entry must carry a `TAG:<CODE>` classification marker in its
/// keywords; its absence is a hallmark of an unreviewed entry. A present
/// but malformed marker is reported as its own error, not as missing.
fn check_classification_tag(entry: &Entry, violations: &mut Vec<Violation>) {
    let keywords = entry.field("keywords").unwrap_or("");
    if !keywords.contains("TAG:") {
        violations.push(Violation::error("missing classification tag"));
    } else if !TAG_REGEX.is_match(keywords) {
        violations.push(Violation::error("malformed classification tag"));
    }
}

fn check_isbn(entry: &Entry, violations: &mut Vec<Violation>) {
    match entry.field("isbn") {
        Some(isbn) if !isbn.trim().is_empty() => {
            if !ISBN_REGEX.is_match(&normalize_isbn(isbn)) {
                violations.push(Violation::error("malformed ISBN"));
            }
        }
        _ => {
            if entry.entry_type == EntryType::Book {
                violations.push(Violation::warning("missing ISBN"));
            }
        }
    }
}

fn check_doi(entry: &Entry, violations: &mut Vec<Violation>) {
    match entry.field("doi") {
        Some(doi) if !doi.trim().is_empty() => {
            if !DOI_REGEX.is_match(doi.trim()) {
                violations.push(Violation::error("malformed DOI"));
            }
        }
        _ => {
            if matches!(
                entry.entry_type,
                EntryType::Article | EntryType::InProceedings
            ) {
                violations.push(Violation::warning("missing DOI"));
            }
        }
    }
}

fn check_abstract(entry: &Entry, violations: &mut Vec<Violation>) {
    let abstract_required = matches!(
        entry.entry_type,
        EntryType::Book | EntryType::Article | EntryType::InProceedings
    );

    match entry.field("abstract") {
        Some(text) if !text.trim().is_empty() => {
            if text.chars().count() < MIN_ABSTRACT_LEN {
                violations.push(Violation::warning("short abstract (< 50 chars)"));
            }
        }
        _ => {
            if abstract_required {
                violations.push(Violation::error("missing abstract"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bibtex::parse_file;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const LONG_ABSTRACT: &str =
        "A sufficiently long abstract that comfortably clears the fifty character minimum.";

    fn entry(input: &str) -> Entry {
        let parsed = parse_file(input, "tier1-core.bib");
        assert!(parsed.issues.is_empty(), "fixture must parse cleanly");
        parsed.entries.into_iter().next().expect("one entry")
    }

    fn validate_one(input: &str) -> ValidationOutcome {
        Validator::new().validate(&entry(input))
    }

    fn messages(outcome: &ValidationOutcome, severity: Severity) -> Vec<&str> {
        outcome
            .violations
            .iter()
            .filter(|v| v.severity == severity)
            .map(|v| v.message.as_str())
            .collect()
    }

    #[test]
    fn test_complete_book_is_valid() {
        let outcome = validate_one(&format!(
            r#"@book{{good2020,
  title = {{A Good Book}},
  author = {{Author, Ann}},
  year = {{2020}},
  publisher = {{Fine Press}},
  isbn = {{0-201-13447-0}},
  abstract = {{{LONG_ABSTRACT}}},
  keywords = {{systems, TAG:CO}}
}}"#
        ));

        assert_eq!(outcome.violations, Vec::new());
        assert!(outcome.is_valid());
    }

    #[test]
    fn test_book_missing_publisher_and_isbn() {
        let outcome = validate_one(&format!(
            r#"@book{{b1,
  title = {{T}},
  author = {{A}},
  year = {{2020}},
  abstract = {{{LONG_ABSTRACT}}},
  keywords = {{TAG:DE}}
}}"#
        ));

        assert_eq!(
            messages(&outcome, Severity::Error),
            vec!["missing required field: publisher"]
        );
        assert_eq!(messages(&outcome, Severity::Warning), vec!["missing ISBN"]);
    }

    #[rstest]
    #[case("article", "journal")]
    #[case("inproceedings", "booktitle")]
    #[case("techreport", "institution")]
    fn test_type_specific_required_field(#[case] entry_type: &str, #[case] field: &str) {
        let outcome = validate_one(&format!(
            "@{entry_type}{{x1, title = {{T}}, author = {{A}}, year = {{2020}}, keywords = {{TAG:RE}}}}"
        ));

        let expected = format!("missing required field: {field}");
        assert!(
            messages(&outcome, Severity::Error).contains(&expected.as_str()),
            "expected {expected:?} in {:?}",
            outcome.violations
        );
    }

    #[rstest]
    #[case("institution = {MIT}")]
    #[case("school = {MIT}")]
    fn test_thesis_accepts_institution_or_school(#[case] granting: &str) {
        let outcome = validate_one(&format!(
            "@phdthesis{{t1, title = {{T}}, author = {{A}}, year = {{2020}}, {granting}, keywords = {{TAG:SY}}}}"
        ));

        assert!(
            !messages(&outcome, Severity::Error)
                .iter()
                .any(|m| m.contains("institution")),
            "unexpected violations: {:?}",
            outcome.violations
        );
    }

    #[test]
    fn test_thesis_missing_both_institution_and_school() {
        let outcome = validate_one(
            "@mastersthesis{t1, title = {T}, author = {A}, year = {2020}, keywords = {TAG:SY}}",
        );

        assert!(
            messages(&outcome, Severity::Error)
                .contains(&"missing required field: institution/school")
        );
    }

    #[test]
    fn test_unknown_type_requires_only_title() {
        let outcome = validate_one("@patent{p1, keywords = {TAG:IN}}");

        assert_eq!(
            messages(&outcome, Severity::Error),
            vec!["missing required field: title"]
        );
    }

    #[rstest]
    #[case("keywords = {systems}", "missing classification tag")]
    #[case("keywords = {TAG: CO}", "malformed classification tag")]
    #[case("keywords = {TAG:co}", "malformed classification tag")]
    fn test_classification_tag_rules(#[case] keywords: &str, #[case] expected: &str) {
        let outcome = validate_one(&format!("@misc{{m1, title = {{T}}, {keywords}}}"));

        assert_eq!(messages(&outcome, Severity::Error), vec![expected]);
    }

    #[test]
    fn test_missing_keywords_field_is_missing_tag() {
        let outcome = validate_one("@misc{m1, title = {T}}");

        assert_eq!(
            messages(&outcome, Severity::Error),
            vec!["missing classification tag"]
        );
    }

    #[rstest]
    #[case("0-201-13447-0", true)] // ISBN-10, hyphenated
    #[case("020113447X", true)] // ISBN-10, X check digit
    #[case("978-0-201-13447-6", true)] // ISBN-13
    #[case("12345", false)]
    #[case("0-201-13447-Y", false)]
    #[case("97802011344761", false)] // 14 digits
    fn test_isbn_format(#[case] isbn: &str, #[case] ok: bool) {
        let outcome = validate_one(&format!(
            "@misc{{m1, title = {{T}}, isbn = {{{isbn}}}, keywords = {{TAG:P}}}}"
        ));

        assert_eq!(
            !messages(&outcome, Severity::Error).contains(&"malformed ISBN"),
            ok,
            "isbn {isbn:?}: {:?}",
            outcome.violations
        );
    }

    #[rstest]
    #[case("10.1234/dl.2020.001", true)]
    #[case("10.123456789/x", true)]
    #[case("10.1/bad", false)] // registrant too short
    #[case("10.1234/bad doi", false)] // space not allowed
    #[case("doi.org/10.1234/x", false)]
    fn test_doi_format(#[case] doi: &str, #[case] ok: bool) {
        let outcome = validate_one(&format!(
            "@misc{{m1, title = {{T}}, doi = {{{doi}}}, keywords = {{TAG:P}}}}"
        ));

        assert_eq!(
            !messages(&outcome, Severity::Error).contains(&"malformed DOI"),
            ok,
            "doi {doi:?}: {:?}",
            outcome.violations
        );
    }

    #[test]
    fn test_missing_doi_warns_for_article_only() {
        let article = validate_one(&format!(
            "@article{{a1, title = {{T}}, author = {{A}}, year = {{2020}}, journal = {{J}}, abstract = {{{LONG_ABSTRACT}}}, keywords = {{TAG:CO}}}}"
        ));
        assert_eq!(messages(&article, Severity::Warning), vec!["missing DOI"]);

        let misc = validate_one("@misc{m1, title = {T}, keywords = {TAG:CO}}");
        assert!(!messages(&misc, Severity::Warning).contains(&"missing DOI"));
    }

    #[test]
    fn test_short_abstract_warns_missing_abstract_errors() {
        let short = validate_one(
            "@article{a1, title = {T}, author = {A}, year = {2020}, journal = {J}, doi = {10.1234/x}, abstract = {Too short.}, keywords = {TAG:CO}}",
        );
        assert_eq!(
            messages(&short, Severity::Warning),
            vec!["short abstract (< 50 chars)"]
        );

        let missing = validate_one(
            "@article{a2, title = {T}, author = {A}, year = {2020}, journal = {J}, doi = {10.1234/x}, keywords = {TAG:CO}}",
        );
        assert!(messages(&missing, Severity::Error).contains(&"missing abstract"));
    }

    #[test]
    fn test_abstract_not_required_for_misc() {
        let outcome = validate_one("@misc{m1, title = {T}, keywords = {TAG:CO}}");
        assert!(outcome.is_valid());
    }

    #[test]
    fn test_cross_file_duplicate_key_short_circuits() {
        let first = entry("@misc{dup1, title = {T}, keywords = {TAG:CO}}");
        let mut second = entry("@misc{dup1, title = {T}}");
        second.source_file = "tier2-applied.bib".to_string();

        let mut validator = Validator::new();
        assert!(validator.validate(&first).is_valid());

        let outcome = validator.validate(&second);
        assert_eq!(
            outcome.violations,
            vec![Violation::error("duplicate citation key")]
        );
        assert_eq!(outcome.file, "tier2-applied.bib");
    }
}
