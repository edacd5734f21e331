//! Run summary types.

use super::result::UpdateResult;
use serde::Serialize;

/// Summary of a complete run: the ordered per-repository outcomes plus
/// aggregate counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Number of Dockerfiles the search matched.
    pub files_matched: usize,

    /// Number of distinct repositories forked.
    pub repositories_forked: usize,

    /// Number of repositories updated with a pull request opened.
    pub repositories_updated: usize,

    /// Number of repositories skipped during the update phase.
    pub repositories_skipped: usize,

    /// Number of repositories whose update failed.
    pub repositories_failed: usize,

    /// Per-repository outcomes in processing order.
    pub results: Vec<UpdateResult>,
}

impl RunSummary {
    /// Creates a new empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an outcome and updates the aggregate counts.
    pub fn record(&mut self, result: UpdateResult) {
        match &result {
            UpdateResult::Updated { .. } => self.repositories_updated += 1,
            UpdateResult::Skipped { .. } => self.repositories_skipped += 1,
            UpdateResult::Failed { .. } => self.repositories_failed += 1,
        }
        self.results.push(result);
    }

    /// Returns true if any failures occurred.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.repositories_failed > 0
    }

    /// Returns true if every attempted repository succeeded.
    #[must_use]
    pub fn all_success(&self) -> bool {
        self.repositories_failed == 0
    }
}
