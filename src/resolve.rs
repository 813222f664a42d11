//! Reconciliation of duplicate groups.
//!
//! Only citation-key collisions are safe to resolve automatically: two
//! entries with the same key are the same logical reference, so the copy
//! from the highest-precedence tier wins and the rest are removed. Title,
//! DOI, and ISBN collisions may be legitimate near-duplicates that need a
//! human call, so those groups are passed through as advisories and never
//! acted on.
//!
//! Ties on equal tier keep whichever copy was scanned first. Scan order is
//! lexicographic file-name order, then in-file order, so resolution is
//! reproducible for an unchanged corpus.

use crate::{DuplicateGroup, MatchKind, Removal, ResolutionDecision};
use serde::{Deserialize, Serialize};

/// The split outcome of a resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// One decision per citation-key group: a single retained entry and
    /// the members to remove
    pub decisions: Vec<ResolutionDecision>,
    /// Title/DOI/ISBN groups, surfaced for human review
    pub advisories: Vec<DuplicateGroup>,
}

/// Partitions duplicate groups into decisions and advisories.
///
/// Guarantees exactly one surviving entry per duplicated citation key;
/// every other group member becomes a [`Removal`] naming its file and key.
#[must_use]
pub fn resolve(groups: &[DuplicateGroup]) -> Resolution {
    let mut resolution = Resolution::default();

    for group in groups {
        if group.match_kind != MatchKind::CitationKey {
            resolution.advisories.push(group.clone());
            continue;
        }

        // min_by_key keeps the first of equal minimums, which is the
        // first-scanned member since groups hold members in scan order.
        let Some(retained) = group.members.iter().min_by_key(|m| m.tier) else {
            continue;
        };

        let removals = group
            .members
            .iter()
            .filter(|m| !std::ptr::eq(*m, retained))
            .map(|m| Removal {
                file: m.file.clone(),
                key: m.key.clone(),
            })
            .collect();

        resolution.decisions.push(ResolutionDecision {
            key: group.value.clone(),
            retained: retained.clone(),
            removals,
        });
    }

    resolution
}
