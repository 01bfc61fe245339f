//! Path classification
//!
//! Pure set algebra over the two enumerated trees.

use mirrorsync_types::{ClassificationResult, FileSet, RelativePath};
use tracing::debug;

/// Split `source ∪ replica` into paths to create, compare and delete
pub fn classify(source: &FileSet, replica: &FileSet) -> ClassificationResult {
    let result = ClassificationResult {
        to_create: source.difference(replica),
        common: source.intersection(replica),
        to_delete: replica.difference(source),
    };

    debug!(
        "Classified {} new, {} common, {} orphaned",
        result.to_create.len(),
        result.common.len(),
        result.to_delete.len()
    );
    result
}

/// Like [`classify`], but never schedules a deletion beneath one of
/// `protected`
///
/// `protected` holds source directories that could not be listed: their files
/// are missing from `source` only because they were unreadable, so their
/// replica copies must survive the pass.
pub fn classify_with_exclusions(
    source: &FileSet,
    replica: &FileSet,
    protected: &[RelativePath],
) -> ClassificationResult {
    let mut result = classify(source, replica);
    if !protected.is_empty() {
        result
            .to_delete
            .retain(|path| !protected.iter().any(|dir| path.starts_with(dir)));
    }
    result
}
