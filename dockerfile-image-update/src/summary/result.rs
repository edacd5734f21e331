//! Per-repository outcome types.

use serde::Serialize;

/// Outcome of processing a single repository.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateResult {
    /// The Dockerfile was updated and a pull request opened upstream.
    Updated {
        /// Fork that received the commit.
        repository: String,
        /// Upstream repository the pull request targets.
        parent: String,
    },

    /// The repository was skipped.
    Skipped {
        /// Repository full name.
        repository: String,
        /// Reason for skipping.
        reason: String,
    },

    /// The update failed.
    Failed {
        /// Repository full name.
        repository: String,
        /// Error message.
        error: String,
    },
}
