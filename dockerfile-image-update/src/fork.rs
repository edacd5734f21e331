//! Forks every repository owning a matched Dockerfile.

use crate::forge::{ContentSet, ForgeClient, ForgeError};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};

/// Maps an owning repository's full name to the Dockerfile path found in it.
///
/// Built once during the fork pass, read-only afterwards.
pub type OwnerPathMap = BTreeMap<String, String>;

/// A fork request that failed, aborting the batch.
#[derive(Debug, Error)]
#[error("failed to fork {repository}: {source}")]
pub struct ForkError {
    /// Repository that could not be forked.
    pub repository: String,

    /// Underlying client error.
    #[source]
    pub source: ForgeError,
}

/// Forks every distinct repository in `contents` and returns the owner→path
/// map for the batch.
///
/// Forking is deliberately separated from the content edits: a fresh fork's
/// content replication lags repository creation, so the whole batch is
/// forked up front and edits only begin afterwards. Each owner is recorded
/// in the map before its fork call is issued, and fork responses are
/// discarded: the forge renames colliding forks, so the real fork list is
/// re-derived later by listing the user's repositories.
///
/// # Errors
///
/// Returns [`ForkError`] on the first fork request that fails; the phases
/// that follow need the map to be complete, so a partial batch is fatal.
pub async fn fork_all(
    client: &dyn ForgeClient,
    contents: &ContentSet,
) -> Result<OwnerPathMap, ForkError> {
    let span = info_span!("fork_all");

    async {
        info!("Forking repositories");
        let mut owner_paths = OwnerPathMap::new();

        for matched in &contents.matches {
            if owner_paths.contains_key(&matched.repository) {
                debug!(repo = %matched.repository, "Owner already recorded");
                continue;
            }

            owner_paths.insert(matched.repository.clone(), matched.path.clone());
            info!(repo = %matched.repository, "Forking");
            client
                .fork_repository(&matched.repository)
                .await
                .map_err(|source| ForkError {
                    repository: matched.repository.clone(),
                    source,
                })?;
        }

        info!(count = owner_paths.len(), "Forked repositories");
        Ok(owner_paths)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::{FailOn, MockForge, MockOperation};
    use crate::forge::ContentMatch;

    fn content_set(matches: &[(&str, &str)]) -> ContentSet {
        ContentSet {
            total: matches.len(),
            matches: matches
                .iter()
                .map(|(repository, path)| ContentMatch {
                    repository: repository.to_string(),
                    path: path.to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn forks_once_per_distinct_owner() {
        let forge = MockForge::new();
        let contents = content_set(&[
            ("acme/service", "Dockerfile"),
            ("acme/service", "docker/Dockerfile"),
            ("acme/worker", "Dockerfile"),
        ]);

        let owner_paths = fork_all(&forge, &contents).await.unwrap();

        assert_eq!(owner_paths.len(), 2);
        // The first matched path wins for an owner with several matches.
        assert_eq!(owner_paths["acme/service"], "Dockerfile");
        assert_eq!(owner_paths["acme/worker"], "Dockerfile");

        let forks: Vec<_> = forge
            .operations()
            .into_iter()
            .filter(|op| matches!(op, MockOperation::Fork { .. }))
            .collect();
        assert_eq!(forks.len(), 2);
    }

    #[tokio::test]
    async fn fork_failure_aborts_the_batch() {
        let forge = MockForge::new();
        forge.fail_on(FailOn::Fork {
            repository: "acme/service".to_string(),
            error: ForgeError::Api("boom".to_string()),
        });
        let contents = content_set(&[
            ("acme/service", "Dockerfile"),
            ("acme/worker", "Dockerfile"),
        ]);

        let error = fork_all(&forge, &contents).await.unwrap_err();
        assert_eq!(error.repository, "acme/service");

        // No further forks are attempted after the failure.
        let forks: Vec<_> = forge
            .operations()
            .into_iter()
            .filter(|op| matches!(op, MockOperation::Fork { .. }))
            .collect();
        assert_eq!(forks.len(), 1);
    }
}
