//! Safe removal of entries from bibliography files.
//!
//! Given the keys a resolution pass marked for removal, the rewriter
//! excises each `@type{key, ...}` block from the file text and leaves
//! every other byte untouched. The whole result is computed in memory
//! first; only then does anything reach disk, and never before an
//! unmodified backup of the original sits next to the file. If the backup
//! cannot be written the original is not touched.
//!
//! Rewriting is idempotent: keys that are no longer present are skipped,
//! so applying the same decisions twice is a no-op, not an error.
//!
//! Concurrent runs against one directory are not supported. A pre-existing
//! backup file is treated as evidence of exactly that (or of an earlier
//! run nobody cleaned up) and the rewrite for that file is refused rather
//! than silently overwriting the only recovery copy.

use crate::regex::Regex;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix appended to a file's name to form its backup sibling.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Applies removal decisions to on-disk files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rewriter {
    dry_run: bool,
}

/// What one file's rewrite did (or, under dry run, would have done).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteOutcome {
    /// The rewritten file
    pub file: PathBuf,
    /// Keys whose blocks were actually found and removed
    pub removed: Vec<String>,
    /// Backup written alongside the file, when one was
    pub backup: Option<PathBuf>,
}

impl Rewriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// In dry-run mode everything is computed and reported but no write
    /// touches disk.
    #[must_use]
    pub fn with_dry_run(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Removes the targeted keys from one file, backup first.
    ///
    /// Keys not present in the file are skipped. When nothing is removed
    /// the file is left alone entirely and no backup is written.
    ///
    /// # Errors
    ///
    /// [`Error::BackupExists`] if a backup sibling already exists, and
    /// [`Error::Io`] if the file cannot be read or either write fails. A
    /// failed backup write aborts before the original is modified.
    pub fn apply(&self, path: &Path, keys: &[String]) -> Result<RewriteOutcome> {
        let original = fs::read_to_string(path)?;
        let (rewritten, removed) = remove_entries(&original, keys);

        if removed.is_empty() {
            return Ok(RewriteOutcome {
                file: path.to_path_buf(),
                removed,
                backup: None,
            });
        }

        if self.dry_run {
            return Ok(RewriteOutcome {
                file: path.to_path_buf(),
                removed,
                backup: None,
            });
        }

        let backup = backup_path(path);
        if backup.exists() {
            return Err(Error::BackupExists(backup));
        }
        fs::write(&backup, &original)?;
        fs::write(path, &rewritten)?;

        Ok(RewriteOutcome {
            file: path.to_path_buf(),
            removed,
            backup: Some(backup),
        })
    }
}

/// The backup sibling for a file: `refs.bib` -> `refs.bib.backup`.
#[must_use]
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Pure in-memory removal: returns the rewritten text and the keys whose
/// blocks were found. Everything outside the removed spans is preserved
/// byte-for-byte.
#[must_use]
pub fn remove_entries(content: &str, keys: &[String]) -> (String, Vec<String>) {
    let mut result = content.to_string();
    let mut removed = Vec::new();

    for key in keys {
        if let Some(span) = find_entry_span(&result, key) {
            result.replace_range(span, "");
            removed.push(key.clone());
        }
    }

    (result, removed)
}

/// Locates the byte span of `@type{key, ...}` including its balanced
/// closing brace and one trailing newline.
fn find_entry_span(content: &str, key: &str) -> Option<std::ops::Range<usize>> {
    let header = Regex::new(&format!(
        r"(?m)^@[A-Za-z]+\s*\{{\s*{}\s*,",
        regex_escape(key)
    ))
    .ok()?;
    let m = header.find(content)?;

    // Depth 1 after the header's opening brace; walk to its match.
    let mut depth = 1usize;
    let mut prev = 0u8;
    for (offset, byte) in content[m.end()..].bytes().enumerate() {
        match byte {
            b'{' if prev != b'\\' => depth += 1,
            b'}' if prev != b'\\' => {
                depth -= 1;
                if depth == 0 {
                    let mut end = m.end() + offset + 1;
                    if content[end..].starts_with('\n') {
                        end += 1;
                    } else if content[end..].starts_with("\r\n") {
                        end += 2;
                    }
                    return Some(m.start()..end);
                }
            }
            _ => {}
        }
        prev = byte;
    }

    // Unterminated block: refuse to guess at a span.
    None
}

/// Escapes regex metacharacters in a citation key.
fn regex_escape(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for c in key.chars() {
        if c.is_ascii() && !c.is_ascii_alphanumeric() {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
