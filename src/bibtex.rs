//! BibTeX file parsing.
//!
//! Scans `@type{key, field = {value}, ...}` blocks out of raw file text and
//! produces structured [`Entry`] values alongside recoverable
//! [`ParseIssue`]s. The scanner is deliberately regex-based and does not
//! support nested braces inside field values: a value ends at the first
//! unescaped `}`. Supporting deeper nesting would change the accepted
//! grammar, so the restriction is kept explicit here rather than fixed.
//!
//! Malformed structure (unbalanced braces at file scope, repeated citation
//! keys within one file) is flagged, not fatal; parsing continues
//! best-effort and returns every entry that did parse.
//!
//! # Example
//!
//! ```
//! use bibtier::bibtex::parse_file;
//!
//! let parsed = parse_file("@misc{note2021, title = {A Note}}", "tier2-applied.bib");
//! assert_eq!(parsed.entries[0].field("title"), Some("A Note"));
//! assert!(parsed.issues.is_empty());
//! ```

use crate::regex::Regex;
use crate::{Entry, EntryType, Severity, Tier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::LazyLock;

// Headers are matched at line starts only, so a stray `@` inside a field
// value (an email address, say) cannot start a new entry.
static HEADER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^@([A-Za-z]+)\s*\{\s*([^,\s{}]+)\s*,").unwrap());

static FIELD_START_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z][A-Za-z0-9_-]*)\s*=\s*\{").unwrap());

static RAW_HEADER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^@[A-Za-z]+\s*\{").unwrap());

/// The result of parsing one file: every entry that parsed, plus any
/// structural problems found along the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedFile {
    /// Entries in the order they appear in the file
    pub entries: Vec<Entry>,
    /// Recoverable structural problems
    pub issues: Vec<ParseIssue>,
}

/// A recoverable structural problem found while parsing.
///
/// Attributed to a specific entry when one is identifiable, otherwise to
/// the file as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseIssue {
    /// File the problem was found in
    pub file: String,
    /// Citation key of the offending entry, when attributable
    pub key: Option<String>,
    pub severity: Severity,
    pub message: String,
}

impl ParseIssue {
    fn file_scope(file: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            key: None,
            severity,
            message: message.into(),
        }
    }

    fn entry_scope(file: &str, key: &str, message: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            key: Some(key.to_string()),
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

/// Parses the raw text of one bibliography file.
///
/// The file name is recorded on every entry and used to derive its
/// [`Tier`]. Field names are lowercased on storage; a field name repeated
/// within one entry keeps the last occurrence. An entry whose citation key
/// already appeared earlier in the same file is dropped and flagged, since
/// same-file collisions are an integrity violation rather than a
/// cross-file duplicate.
#[must_use]
pub fn parse_file(content: &str, file_name: &str) -> ParsedFile {
    let mut parsed = ParsedFile::default();

    if content.trim().is_empty() {
        parsed.issues.push(ParseIssue::file_scope(
            file_name,
            Severity::Error,
            "file is empty",
        ));
        return parsed;
    }

    let open = content.matches('{').count();
    let close = content.matches('}').count();
    if open != close {
        parsed.issues.push(ParseIssue::file_scope(
            file_name,
            Severity::Error,
            format!("unbalanced braces ({open} opening, {close} closing)"),
        ));
    }

    let tier = Tier::from_file_name(file_name);
    let headers: Vec<_> = HEADER_REGEX.captures_iter(content).collect();

    let raw_header_count = RAW_HEADER_REGEX.find_iter(content).count();
    if raw_header_count == 0 {
        parsed.issues.push(ParseIssue::file_scope(
            file_name,
            Severity::Warning,
            "no bibliography entries found",
        ));
    } else if raw_header_count > headers.len() {
        parsed.issues.push(ParseIssue::file_scope(
            file_name,
            Severity::Error,
            format!(
                "{} malformed entry header(s) skipped",
                raw_header_count - headers.len()
            ),
        ));
    }

    let mut seen_keys = HashSet::new();
    for (i, caps) in headers.iter().enumerate() {
        let key = caps.get(2).map_or("", |m| m.as_str());
        if !seen_keys.insert(key.to_string()) {
            parsed.issues.push(ParseIssue::entry_scope(
                file_name,
                key,
                "citation key repeated within this file",
            ));
            continue;
        }

        let body_start = caps.get(0).map_or(0, |m| m.end());
        let body_end = headers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(content.len(), |m| m.start());

        parsed.entries.push(Entry {
            entry_type: EntryType::parse(&caps[1]),
            key: key.to_string(),
            fields: parse_fields(&content[body_start..body_end]),
            source_file: file_name.to_string(),
            tier,
        });
    }

    parsed
}

/// Extracts `name = {value}` pairs from an entry body.
///
/// A value runs from its opening brace to the first unescaped `}`, which
/// may span multiple lines. Field ordering is irrelevant.
fn parse_fields(body: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    let mut cursor = 0;

    while let Some(caps) = FIELD_START_REGEX.captures_at(body, cursor) {
        let name = caps[1].to_lowercase();
        let value_start = caps.get(0).map_or(body.len(), |m| m.end());

        match find_unescaped_close(&body[value_start..]) {
            Some(len) => {
                let value = body[value_start..value_start + len].trim().to_string();
                // Last occurrence wins for repeated field names.
                fields.insert(name, value);
                cursor = value_start + len + 1;
            }
            None => break,
        }
    }

    fields
}

/// Byte offset of the first `}` not preceded by a backslash.
fn find_unescaped_close(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut from = 0;
    loop {
        let rel = text[from..].find('}')?;
        let pos = from + rel;
        if pos == 0 || bytes[pos - 1] != b'\\' {
            return Some(pos);
        }
        from = pos + 1;
    }
}
