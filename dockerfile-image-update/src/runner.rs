//! Orchestrates a full image update run.

use crate::applier::{apply_update, UpdateError, UpdateOptions};
use crate::forge::{ForgeClient, ForgeError, GitHubClient};
use crate::fork::{fork_all, ForkError};
use crate::image::ImageReference;
use crate::locator::{locate_images, LocateOutcome};
use crate::resolver::{repositories_for_user, resolve, Resolution, SkipReason};
use crate::summary::{RunSummary, UpdateResult};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Configuration for a full update run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Name of the base image to update references to.
    image: String,
    /// Tag the image should be moved to.
    tag: String,
    /// Full name of the repository holding the image-to-tag store.
    store: String,
    /// GitHub token used for API calls.
    token: String,
    /// Restrict the search to a single organization.
    org: Option<String>,
    /// Branch to update instead of each fork's default branch.
    branch: Option<String>,
    /// Title for the pull requests that are opened.
    pull_request_message: Option<String>,
    /// Commit message used when rewriting Dockerfiles.
    commit_comment: Option<String>,
}

impl RunnerConfig {
    /// Creates a new configuration for a run.
    pub fn new(
        image: impl Into<String>,
        tag: impl Into<String>,
        store: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            image: image.into(),
            tag: tag.into(),
            store: store.into(),
            token: token.into(),
            org: None,
            branch: None,
            pull_request_message: None,
            commit_comment: None,
        }
    }

    /// Restricts the search to an organization.
    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }

    /// Sets an explicit branch to update on every fork.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Sets the pull request title.
    pub fn with_pull_request_message(mut self, message: impl Into<String>) -> Self {
        self.pull_request_message = Some(message.into());
        self
    }

    /// Sets the commit message used for the Dockerfile change.
    pub fn with_commit_comment(mut self, comment: impl Into<String>) -> Self {
        self.commit_comment = Some(comment.into());
        self
    }

    /// Returns the image name.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Returns the target tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the store repository full name.
    pub fn store(&self) -> &str {
        &self.store
    }

    /// Returns the configured token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the organization scope, if any.
    pub fn org(&self) -> Option<&str> {
        self.org.as_deref()
    }

    /// Returns the branch override, if any.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    fn image_reference(&self) -> ImageReference {
        ImageReference::new(&self.image, &self.tag)
    }

    fn update_options(&self) -> UpdateOptions {
        UpdateOptions {
            branch: self.branch.clone(),
            pull_request_message: self.pull_request_message.clone(),
            commit_comment: self.commit_comment.clone(),
        }
    }
}

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The authenticated user could not be determined.
    #[error("could not retrieve the authenticated user")]
    Auth,

    /// A fatal client failure outside the per-repository loop (store update,
    /// search, listing).
    #[error(transparent)]
    Forge(#[from] ForgeError),

    /// A fork request failed; the owner map would be incomplete, so no
    /// update is attempted.
    #[error(transparent)]
    Fork(#[from] ForkError),

    /// One or more repositories failed to update. The first failure stands
    /// in for the batch; the count covers all of them.
    #[error("{failed} repositories failed to update: {source}")]
    Updates {
        failed: usize,
        #[source]
        source: UpdateError,
    },
}

/// Orchestrates a full update run.
pub struct Runner {
    config: RunnerConfig,
    client: Arc<dyn ForgeClient>,
}

impl Runner {
    /// Builds a runner backed by the GitHub API.
    pub fn new(config: RunnerConfig) -> Result<Self, RunnerError> {
        let client = GitHubClient::new(config.token().to_string())?;
        Ok(Self {
            config,
            client: Arc::new(client),
        })
    }

    /// Builds a runner against an arbitrary forge client.
    pub fn with_client(config: RunnerConfig, client: Arc<dyn ForgeClient>) -> Self {
        Self { config, client }
    }

    /// Executes the full orchestration flow.
    ///
    /// The store is updated first so later runs observe the new tag even if
    /// this run fails. Then: locate, fork-all, resolve and apply per
    /// repository. Per-repository failures are collected locally; every
    /// candidate is attempted exactly once before the run reports failure
    /// with the first collected error as representative.
    pub async fn run(&self) -> Result<RunSummary, RunnerError> {
        let client = self.client.as_ref();
        let image = self.config.image_reference();
        let mut summary = RunSummary::new();

        info!(store = %self.config.store(), image = %image, "Updating store");
        client.update_store(self.config.store(), &image).await?;

        info!("Finding Dockerfiles with the given image");
        let contents = match locate_images(client, self.config.image(), self.config.org()).await? {
            LocateOutcome::Found(contents) => contents,
            LocateOutcome::NotFound => return Ok(summary),
        };
        summary.files_matched = contents.total;

        let owner_paths = fork_all(client, &contents).await?;
        summary.repositories_forked = owner_paths.len();

        let user = client
            .get_authenticated_user()
            .await?
            .ok_or(RunnerError::Auth)?;
        let repositories = repositories_for_user(client, &owner_paths, &user).await?;

        let options = self.config.update_options();
        let mut failures: Vec<UpdateError> = Vec::new();

        for repository in &repositories {
            match resolve(client, repository, &owner_paths).await {
                Ok(Resolution::Candidate { fork, parent }) => {
                    // Present by construction: resolution only admits parents
                    // that are keys of the map.
                    let Some(path) = owner_paths.get(&parent.full_name) else {
                        continue;
                    };

                    match apply_update(client, &fork, &parent, path, &image, &options).await {
                        Ok(()) => summary.record(UpdateResult::Updated {
                            repository: fork.full_name.clone(),
                            parent: parent.full_name.clone(),
                        }),
                        Err(e) => {
                            error!(repo = %fork.full_name, error = %e, "Failed to update Dockerfile");
                            summary.record(UpdateResult::Failed {
                                repository: fork.full_name.clone(),
                                error: e.to_string(),
                            });
                            failures.push(e);
                        }
                    }
                }
                Ok(Resolution::Skip(SkipReason::Vanished)) => {
                    summary.record(UpdateResult::Skipped {
                        repository: repository.full_name.clone(),
                        reason: "repository disappeared between listing and resolution".to_string(),
                    });
                }
                Ok(Resolution::Skip(reason)) => {
                    debug!(repo = %repository.full_name, ?reason, "Skipping repository");
                }
                Err(e) => {
                    let failure = UpdateError::Resolve {
                        repository: repository.full_name.clone(),
                        source: e,
                    };
                    error!(repo = %repository.full_name, error = %failure, "Failed to resolve repository");
                    summary.record(UpdateResult::Failed {
                        repository: repository.full_name.clone(),
                        error: failure.to_string(),
                    });
                    failures.push(failure);
                }
            }
        }

        if !failures.is_empty() {
            info!(
                count = failures.len(),
                "There were errors while changing Dockerfiles"
            );
            return Err(RunnerError::Updates {
                failed: failures.len(),
                source: failures.remove(0),
            });
        }
        Ok(summary)
    }
}
