//! Applies the image update to a resolved fork and opens the pull request.

use crate::forge::{ForgeClient, ForgeError, RepositoryHandle};
use crate::image::ImageReference;
use thiserror::Error;
use tracing::{info, info_span, Instrument};

/// A per-repository update failure.
///
/// Collected by the run coordinator; never fatal to the run on its own.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Re-fetching the repository for parent linkage failed.
    #[error("failed to resolve {repository}: {source}")]
    Resolve {
        repository: String,
        #[source]
        source: ForgeError,
    },

    /// Fetching the Dockerfile failed.
    #[error("failed to fetch {path} from {repository}: {source}")]
    ContentFetch {
        repository: String,
        path: String,
        #[source]
        source: ForgeError,
    },

    /// Committing the rewritten Dockerfile failed.
    #[error("failed to commit update to {repository}: {source}")]
    Commit {
        repository: String,
        #[source]
        source: ForgeError,
    },

    /// Opening the pull request failed.
    #[error("failed to open pull request against {repository}: {source}")]
    PullRequest {
        repository: String,
        #[source]
        source: ForgeError,
    },
}

impl UpdateError {
    /// Full name of the repository the failure belongs to.
    #[must_use]
    pub fn repository(&self) -> &str {
        match self {
            Self::Resolve { repository, .. }
            | Self::ContentFetch { repository, .. }
            | Self::Commit { repository, .. }
            | Self::PullRequest { repository, .. } => repository,
        }
    }
}

/// Caller-supplied knobs for the update phase.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Branch to update instead of the fork's default branch.
    pub branch: Option<String>,

    /// Title for the pull requests that are opened.
    pub pull_request_message: Option<String>,

    /// Commit message for the Dockerfile change.
    pub commit_comment: Option<String>,
}

/// Chooses the branch to update: the caller override when given, the fork's
/// default branch otherwise.
fn target_branch<'a>(options: &'a UpdateOptions, fork: &'a RepositoryHandle) -> &'a str {
    options.branch.as_deref().unwrap_or(&fork.default_branch)
}

/// Updates the Dockerfile on `fork` and opens a pull request back to
/// `parent`.
///
/// The steps form one unit: fetch the file at `path`, rewrite and commit
/// the image reference, then open the pull request from the fork's branch
/// back to the same branch on the parent. A failure in any step surfaces as
/// a single [`UpdateError`] for this repository.
pub async fn apply_update(
    client: &dyn ForgeClient,
    fork: &RepositoryHandle,
    parent: &RepositoryHandle,
    path: &str,
    image: &ImageReference,
    options: &UpdateOptions,
) -> Result<(), UpdateError> {
    let span = info_span!("apply_update", repo = %fork.full_name, parent = %parent.full_name);

    async {
        let branch = target_branch(options, fork);
        info!(branch, path, "Fixing Dockerfile");

        let content = client
            .get_file_content(fork, path, branch)
            .await
            .map_err(|source| UpdateError::ContentFetch {
                repository: fork.full_name.clone(),
                path: path.to_string(),
                source,
            })?;

        client
            .update_file_content(&content, branch, image, options.commit_comment.as_deref())
            .await
            .map_err(|source| UpdateError::Commit {
                repository: fork.full_name.clone(),
                source,
            })?;

        client
            .open_pull_request(parent, branch, fork, options.pull_request_message.as_deref())
            .await
            .map_err(|source| UpdateError::PullRequest {
                repository: parent.full_name.clone(),
                source,
            })?;

        Ok(())
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::{FailOn, MockForge, MockOperation};

    fn fork_handle() -> RepositoryHandle {
        RepositoryHandle {
            full_name: "user/service".to_string(),
            fork: true,
            parent: None,
            default_branch: "main".to_string(),
        }
    }

    fn parent_handle() -> RepositoryHandle {
        RepositoryHandle {
            full_name: "acme/service".to_string(),
            fork: false,
            parent: None,
            default_branch: "main".to_string(),
        }
    }

    fn image() -> ImageReference {
        ImageReference::new("library/ubuntu", "24.04")
    }

    #[test]
    fn default_branch_is_used_without_an_override() {
        let options = UpdateOptions::default();
        assert_eq!(target_branch(&options, &fork_handle()), "main");
    }

    #[test]
    fn branch_override_wins_over_default_branch() {
        let options = UpdateOptions {
            branch: Some("release".to_string()),
            ..Default::default()
        };
        assert_eq!(target_branch(&options, &fork_handle()), "release");
    }

    #[tokio::test]
    async fn runs_all_steps_against_the_chosen_branch() {
        let forge = MockForge::new();
        forge.put_file("user/service", "Dockerfile", "release", "FROM library/ubuntu:22.04\n");
        let options = UpdateOptions {
            branch: Some("release".to_string()),
            ..Default::default()
        };

        apply_update(
            &forge,
            &fork_handle(),
            &parent_handle(),
            "Dockerfile",
            &image(),
            &options,
        )
        .await
        .unwrap();

        assert_eq!(
            forge.operations(),
            vec![
                MockOperation::GetFile {
                    repository: "user/service".to_string(),
                    path: "Dockerfile".to_string(),
                    branch: "release".to_string(),
                },
                MockOperation::UpdateFile {
                    repository: "user/service".to_string(),
                    path: "Dockerfile".to_string(),
                    branch: "release".to_string(),
                    image: "library/ubuntu:24.04".to_string(),
                },
                MockOperation::OpenPullRequest {
                    parent: "acme/service".to_string(),
                    head: "user/service".to_string(),
                    branch: "release".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn commit_failure_is_reported_as_a_single_unit() {
        let forge = MockForge::new();
        forge.put_file("user/service", "Dockerfile", "main", "FROM library/ubuntu:22.04\n");
        forge.fail_on(FailOn::UpdateFile {
            repository: "user/service".to_string(),
            error: ForgeError::Api("boom".to_string()),
        });

        let error = apply_update(
            &forge,
            &fork_handle(),
            &parent_handle(),
            "Dockerfile",
            &image(),
            &UpdateOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, UpdateError::Commit { .. }));
        assert_eq!(error.repository(), "user/service");

        // No pull request is opened after a failed commit.
        assert!(!forge
            .operations()
            .iter()
            .any(|op| matches!(op, MockOperation::OpenPullRequest { .. })));
    }

    #[tokio::test]
    async fn missing_file_fails_the_fetch_step() {
        let forge = MockForge::new();

        let error = apply_update(
            &forge,
            &fork_handle(),
            &parent_handle(),
            "Dockerfile",
            &image(),
            &UpdateOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, UpdateError::ContentFetch { .. }));
    }
}
