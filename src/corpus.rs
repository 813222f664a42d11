//! Whole-corpus orchestration.
//!
//! One [`run`] loads every `.bib` file under the target directory in
//! lexicographic name order, parses each file independently, and then runs
//! the aggregation passes over the complete entry set: index, resolve,
//! validate, rewrite. Duplicate detection is never partial; every entry is
//! materialized before any group is judged complete.
//!
//! All context lives in the [`RunConfig`] and the returned [`RunReport`].
//! There is no shared module state, so concurrent runs against different
//! directories cannot interfere.

use crate::bibtex::{ParseIssue, parse_file};
use crate::index::{CorpusIndex, CorpusSummary};
use crate::resolve::resolve;
use crate::rewrite::{RewriteOutcome, Rewriter};
use crate::validate::{ValidationOutcome, Validator};
use crate::{DuplicateGroup, Entry, Error, ResolutionDecision, Result, Severity};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

/// Configuration for one run, constructed explicitly and passed through;
/// nothing global.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory holding the `.bib` files
    pub dir: PathBuf,
    /// Compute and report every decision without touching disk
    pub dry_run: bool,
    /// Fail the run on warnings as well as errors
    pub strict: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("bibliography"),
            dry_run: false,
            strict: false,
        }
    }
}

/// An I/O problem that sank one file's processing while the run continued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoFailure {
    pub file: String,
    pub message: String,
}

/// Everything one run found and did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Corpus-level counts
    pub summary: CorpusSummary,
    /// Structural problems found while parsing
    pub parse_issues: Vec<ParseIssue>,
    /// Every duplicate group, across all four dimensions
    pub groups: Vec<DuplicateGroup>,
    /// Auto-resolutions of citation-key groups
    pub decisions: Vec<ResolutionDecision>,
    /// Validation outcomes that carry at least one violation
    pub validations: Vec<ValidationOutcome>,
    /// What the rewriter did (or would do, under dry run)
    pub rewrites: Vec<RewriteOutcome>,
    /// Files whose processing failed; the run went on without them
    pub io_failures: Vec<IoFailure>,
}

impl RunReport {
    #[must_use]
    pub fn error_count(&self) -> usize {
        let parse_errors = self
            .parse_issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
        let violation_errors: usize = self
            .validations
            .iter()
            .map(ValidationOutcome::error_count)
            .sum();
        parse_errors + violation_errors
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        let parse_warnings = self
            .parse_issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count();
        let violation_warnings: usize = self
            .validations
            .iter()
            .map(ValidationOutcome::warning_count)
            .sum();
        parse_warnings + violation_warnings
    }

    /// Whether the run should exit non-zero.
    ///
    /// Errors and I/O failures always fail the run; warnings fail it only
    /// under `strict`.
    #[must_use]
    pub fn failed(&self, strict: bool) -> bool {
        !self.io_failures.is_empty()
            || self.error_count() > 0
            || (strict && self.warning_count() > 0)
    }
}

/// Runs the full pipeline over the configured directory.
///
/// # Errors
///
/// Returns [`Error::NoBibFiles`] when the directory holds no `.bib` files
/// and [`Error::Io`] when the directory itself cannot be read. Per-file
/// failures do not abort the run; they land in
/// [`RunReport::io_failures`].
pub fn run(config: &RunConfig) -> Result<RunReport> {
    let mut report = RunReport::default();

    // Lexicographic name order makes the scan (and with it every
    // tie-break downstream) reproducible.
    let files = bib_files(config)?;

    let mut entries: Vec<Entry> = Vec::new();
    for (name, path) in &files {
        match fs::read_to_string(path) {
            Ok(content) => {
                let parsed = parse_file(&content, name);
                entries.extend(parsed.entries);
                report.parse_issues.extend(parsed.issues);
            }
            Err(err) => report.io_failures.push(IoFailure {
                file: name.clone(),
                message: err.to_string(),
            }),
        }
    }

    let index = CorpusIndex::build(&entries);
    report.summary = index.summary();
    report.groups = index.duplicate_groups();

    let resolution = resolve(&report.groups);
    report.decisions = resolution.decisions;

    let removed: HashSet<(&str, &str)> = report
        .decisions
        .iter()
        .flat_map(|d| d.removals.iter())
        .map(|r| (r.file.as_str(), r.key.as_str()))
        .collect();

    // Entries the resolver is about to remove are skipped here so the
    // validation report never names a record that no longer exists once
    // the rewrite lands.
    let mut validator = Validator::new();
    for entry in &entries {
        if removed.contains(&(entry.source_file.as_str(), entry.key.as_str())) {
            continue;
        }
        let outcome = validator.validate(entry);
        if !outcome.violations.is_empty() {
            report.validations.push(outcome);
        }
    }

    let by_file = report
        .decisions
        .iter()
        .flat_map(|d| d.removals.iter())
        .map(|r| (r.file.clone(), r.key.clone()))
        .into_group_map();

    let rewriter = Rewriter::with_dry_run(config.dry_run);
    for (name, keys) in by_file.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
        let path = config.dir.join(&name);
        match rewriter.apply(&path, &keys) {
            Ok(outcome) => report.rewrites.push(outcome),
            Err(err) => report.io_failures.push(IoFailure {
                file: name,
                message: err.to_string(),
            }),
        }
    }

    Ok(report)
}

/// The `.bib` files in the target directory, sorted by file name.
fn bib_files(config: &RunConfig) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for dir_entry in fs::read_dir(&config.dir)? {
        let path = dir_entry?.path();
        if path.extension().is_some_and(|ext| ext == "bib") {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                files.push((name.to_string(), path.clone()));
            }
        }
    }

    if files.is_empty() {
        return Err(Error::NoBibFiles(config.dir.clone()));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}
