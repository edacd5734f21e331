//! Forge client trait and the data carriers it exchanges.
//!
//! The orchestration core never talks to a concrete forge API. Everything it
//! needs is expressed through [`ForgeClient`]; the GitHub adapter lives in
//! [`super::github`] and a deterministic in-memory implementation for tests
//! in [`super::mock`].

use crate::image::ImageReference;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from forge operations.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Authentication failed (invalid token, expired, insufficient scope).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The requested resource does not exist (or was deleted).
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// A repository name that is not in `owner/name` form.
    #[error("invalid repository name: {0}")]
    InvalidName(String),

    /// Any other API failure.
    #[error("API error: {0}")]
    Api(String),
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserHandle {
    /// Account login name.
    pub login: String,
}

/// A single file matched by the content search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMatch {
    /// Full name (`owner/name`) of the repository owning the file.
    pub repository: String,

    /// Path of the matched file inside the repository.
    pub path: String,
}

/// Result set of a content search.
#[derive(Debug, Clone, Default)]
pub struct ContentSet {
    /// Total number of matches the forge reports for the query.
    pub total: usize,

    /// Collected matches, possibly capped below `total`.
    pub matches: Vec<ContentMatch>,
}

impl ContentSet {
    /// Whether the search found nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// A remote repository reference.
///
/// List results do not embed parent linkage; `parent` is only populated when
/// the repository was fetched individually by full name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    /// Full name in `owner/name` form.
    pub full_name: String,

    /// Whether the repository is a fork.
    pub fork: bool,

    /// Upstream repository, when known.
    pub parent: Option<Box<RepositoryHandle>>,

    /// Default branch name (e.g. `main`).
    pub default_branch: String,
}

/// A file fetched from a repository, with the blob identity needed to commit
/// a replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    /// Full name of the repository the file was fetched from.
    pub repository: String,

    /// Path of the file inside the repository.
    pub path: String,

    /// Blob sha of the fetched revision.
    pub sha: String,

    /// Decoded file text.
    pub text: String,
}

/// Abstract client for a source-code forge.
///
/// Implementations must be `Send + Sync`; all operations are remote calls
/// and may fail with [`ForgeError`].
#[async_trait]
pub trait ForgeClient: Send + Sync {
    /// Searches for Dockerfiles referencing `image`, optionally scoped to an
    /// organization. Reports the forge's total match count alongside the
    /// collected matches.
    async fn search_content_by_image(
        &self,
        image: &str,
        org: Option<&str>,
    ) -> Result<ContentSet, ForgeError>;

    /// Returns the authenticated user, or `None` when the identity cannot be
    /// established.
    async fn get_authenticated_user(&self) -> Result<Option<UserHandle>, ForgeError>;

    /// Forks `full_name` under the acting user.
    ///
    /// The created fork is intentionally not returned: the forge may rename
    /// a fork whose name collides with an existing repository, so callers
    /// must re-derive the actual fork list by listing.
    async fn fork_repository(&self, full_name: &str) -> Result<(), ForgeError>;

    /// Lists all repositories owned by `user`.
    async fn list_repositories_for_user(
        &self,
        user: &UserHandle,
    ) -> Result<Vec<RepositoryHandle>, ForgeError>;

    /// Fetches a repository by full name, including parent linkage.
    ///
    /// # Errors
    ///
    /// [`ForgeError::NotFound`] when the repository was deleted.
    async fn get_repository_by_full_name(
        &self,
        full_name: &str,
    ) -> Result<RepositoryHandle, ForgeError>;

    /// Fetches a file from `repo` at `path` on `branch`.
    async fn get_file_content(
        &self,
        repo: &RepositoryHandle,
        path: &str,
        branch: &str,
    ) -> Result<FileContent, ForgeError>;

    /// Rewrites the image reference inside `content` to `image` and commits
    /// the result to `branch`, using `comment` as the commit message when
    /// given.
    async fn update_file_content(
        &self,
        content: &FileContent,
        branch: &str,
        image: &ImageReference,
        comment: Option<&str>,
    ) -> Result<(), ForgeError>;

    /// Opens a pull request from `head`'s `branch` back to the same branch
    /// on `parent`, titled with `message` when given.
    async fn open_pull_request(
        &self,
        parent: &RepositoryHandle,
        branch: &str,
        head: &RepositoryHandle,
        message: Option<&str>,
    ) -> Result<(), ForgeError>;

    /// Records `image` in the external image-to-tag store.
    async fn update_store(&self, store: &str, image: &ImageReference) -> Result<(), ForgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_set_emptiness_follows_total() {
        assert!(ContentSet::default().is_empty());

        let set = ContentSet {
            total: 3,
            matches: vec![],
        };
        assert!(!set.is_empty());
    }

    #[test]
    fn forge_error_display() {
        assert_eq!(
            format!("{}", ForgeError::Auth("bad credentials".into())),
            "authentication failed: bad credentials"
        );
        assert_eq!(
            format!("{}", ForgeError::NotFound("user/repo".into())),
            "not found: user/repo"
        );
        assert_eq!(format!("{}", ForgeError::RateLimited), "rate limited");
        assert_eq!(
            format!("{}", ForgeError::InvalidName("norepo".into())),
            "invalid repository name: norepo"
        );
    }
}
