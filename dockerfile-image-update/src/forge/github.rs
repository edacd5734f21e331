//! GitHub-backed forge client.
//!
//! Wraps octocrab behind [`ForgeClient`]: code search with pagination and a
//! proactive rate-limit guard, fork/list/get repository plumbing, contents
//! API commits and pull request creation.

use super::traits::{
    ContentMatch, ContentSet, FileContent, ForgeClient, ForgeError, RepositoryHandle, UserHandle,
};
use crate::dockerfile;
use crate::image::ImageReference;
use crate::store::ImageTagStore;
use async_trait::async_trait;
use octocrab::Octocrab;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Maximum results taken from the code search API.
const MAX_SEARCH_RESULTS: usize = 1000;

/// Results per page for code search.
const RESULTS_PER_PAGE: u8 = 100;

/// Minimum remaining requests before proactively waiting for the window reset.
const MIN_REMAINING_THRESHOLD: u32 = 5;

/// Maximum time to wait for a rate limit reset (1 hour).
const MAX_WAIT_SECS: u64 = 3600;

/// File holding the image-to-tag mapping inside the store repository.
const STORE_FILE: &str = "store.json";

/// Default pull request title when the caller supplies no message.
const DEFAULT_PULL_REQUEST_TITLE: &str = "Update Dockerfile base image";

/// GitHub implementation of [`ForgeClient`].
pub struct GitHubClient {
    octocrab: Octocrab,
}

impl GitHubClient {
    /// Builds a client from a personal access token.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError`] if the underlying client cannot be constructed.
    pub fn new(token: String) -> Result<Self, ForgeError> {
        let octocrab = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(map_api_error)?;
        Ok(Self { octocrab })
    }

    /// Wraps an already-configured octocrab instance.
    #[must_use]
    pub fn from_octocrab(octocrab: Octocrab) -> Self {
        Self { octocrab }
    }

    /// Waits for the search rate limit window when remaining quota is low.
    async fn ensure_search_quota(&self) -> Result<(), ForgeError> {
        let limits = self.octocrab.ratelimit().get().await.map_err(map_api_error)?;
        let search = &limits.resources.search;
        wait_for_quota(search.remaining as u32, search.reset).await;
        Ok(())
    }

    /// Waits for the core rate limit window when remaining quota is low.
    async fn ensure_core_quota(&self) -> Result<(), ForgeError> {
        let limits = self.octocrab.ratelimit().get().await.map_err(map_api_error)?;
        let core = &limits.resources.core;
        wait_for_quota(core.remaining as u32, core.reset).await;
        Ok(())
    }
}

#[async_trait]
impl ForgeClient for GitHubClient {
    async fn search_content_by_image(
        &self,
        image: &str,
        org: Option<&str>,
    ) -> Result<ContentSet, ForgeError> {
        self.ensure_search_quota().await?;

        let query = build_search_query(image, org);
        debug!(query = %query, "Executing code search");

        let mut page = self
            .octocrab
            .search()
            .code(&query)
            .per_page(RESULTS_PER_PAGE)
            .send()
            .await
            .map_err(map_api_error)?;

        let total = page.total_count.unwrap_or(0) as usize;
        let mut matches = extract_matches(&page);

        while let Some(next) = self
            .octocrab
            .get_page::<octocrab::models::Code>(&page.next)
            .await
            .map_err(map_api_error)?
        {
            if matches.len() >= MAX_SEARCH_RESULTS {
                warn!(max = MAX_SEARCH_RESULTS, "Reached maximum search results limit");
                break;
            }

            self.ensure_search_quota().await?;
            matches.extend(extract_matches(&next));
            page.next = next.next;

            if page.next.is_none() {
                break;
            }
        }

        Ok(ContentSet { total, matches })
    }

    async fn get_authenticated_user(&self) -> Result<Option<UserHandle>, ForgeError> {
        match self.octocrab.current().user().await {
            Ok(user) => Ok(Some(UserHandle { login: user.login })),
            Err(e) => match map_api_error(e) {
                ForgeError::Auth(_) | ForgeError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn fork_repository(&self, full_name: &str) -> Result<(), ForgeError> {
        let (owner, name) = split_full_name(full_name)?;
        self.ensure_core_quota().await?;

        // The response body is discarded: on a name collision GitHub renames
        // the created fork, so the caller re-derives the actual fork list by
        // listing the user's repositories.
        self.octocrab
            .repos(owner, name)
            .create_fork()
            .send()
            .await
            .map_err(map_api_error)?;
        Ok(())
    }

    async fn list_repositories_for_user(
        &self,
        _user: &UserHandle,
    ) -> Result<Vec<RepositoryHandle>, ForgeError> {
        self.ensure_core_quota().await?;

        let page = self
            .octocrab
            .current()
            .list_repos_for_authenticated_user()
            .type_("owner")
            .per_page(100)
            .send()
            .await
            .map_err(map_api_error)?;

        let repos = self.octocrab.all_pages(page).await.map_err(map_api_error)?;
        Ok(repos.into_iter().map(handle_from_repository).collect())
    }

    async fn get_repository_by_full_name(
        &self,
        full_name: &str,
    ) -> Result<RepositoryHandle, ForgeError> {
        let (owner, name) = split_full_name(full_name)?;
        let repo = self
            .octocrab
            .repos(owner, name)
            .get()
            .await
            .map_err(map_api_error)?;
        Ok(handle_from_repository(repo))
    }

    async fn get_file_content(
        &self,
        repo: &RepositoryHandle,
        path: &str,
        branch: &str,
    ) -> Result<FileContent, ForgeError> {
        let (owner, name) = split_full_name(&repo.full_name)?;
        self.ensure_core_quota().await?;

        let contents = self
            .octocrab
            .repos(owner, name)
            .get_content()
            .path(path)
            .r#ref(branch)
            .send()
            .await
            .map_err(map_api_error)?;

        let item = contents
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ForgeError::NotFound(format!("{}:{path}", repo.full_name)))?;

        let text = item.decoded_content().ok_or_else(|| {
            ForgeError::Api(format!("no content returned for {}:{path}", repo.full_name))
        })?;

        Ok(FileContent {
            repository: repo.full_name.clone(),
            path: item.path,
            sha: item.sha,
            text,
        })
    }

    async fn update_file_content(
        &self,
        content: &FileContent,
        branch: &str,
        image: &ImageReference,
        comment: Option<&str>,
    ) -> Result<(), ForgeError> {
        let (owner, name) = split_full_name(&content.repository)?;

        let (rewritten, changed) = dockerfile::rewrite_image(&content.text, image);
        if !changed {
            // The search index can lag behind pushes; a file that no longer
            // references the image is not an error.
            info!(
                repo = %content.repository,
                path = %content.path,
                "No image reference to rewrite, skipping commit"
            );
            return Ok(());
        }

        let message = comment
            .map(str::to_string)
            .unwrap_or_else(|| format!("Update {} to {image}", content.path));

        self.ensure_core_quota().await?;
        self.octocrab
            .repos(owner, name)
            .update_file(&content.path, &message, &rewritten, &content.sha)
            .branch(branch)
            .send()
            .await
            .map_err(map_api_error)?;
        Ok(())
    }

    async fn open_pull_request(
        &self,
        parent: &RepositoryHandle,
        branch: &str,
        head: &RepositoryHandle,
        message: Option<&str>,
    ) -> Result<(), ForgeError> {
        let (owner, name) = split_full_name(&parent.full_name)?;
        let (head_owner, _) = split_full_name(&head.full_name)?;
        let title = message.unwrap_or(DEFAULT_PULL_REQUEST_TITLE);

        self.ensure_core_quota().await?;
        let result = self
            .octocrab
            .pulls(owner, name)
            .create(title, format!("{head_owner}:{branch}"), branch)
            .body("This pull request updates the Dockerfile base image reference.")
            .send()
            .await;

        match result {
            Ok(pr) => {
                info!(repo = %parent.full_name, number = pr.number, "Pull request opened");
                Ok(())
            }
            Err(e) if is_duplicate_pull_request(&e) => {
                info!(repo = %parent.full_name, "Pull request already exists, skipping");
                Ok(())
            }
            Err(e) => Err(map_api_error(e)),
        }
    }

    async fn update_store(&self, store: &str, image: &ImageReference) -> Result<(), ForgeError> {
        let (owner, name) = split_full_name(store)?;

        let repo = self
            .octocrab
            .repos(owner, name)
            .get()
            .await
            .map_err(map_api_error)?;
        let branch = repo.default_branch.unwrap_or_else(|| "main".to_string());

        self.ensure_core_quota().await?;
        let existing = self
            .octocrab
            .repos(owner, name)
            .get_content()
            .path(STORE_FILE)
            .r#ref(&branch)
            .send()
            .await;

        let message = format!("Update {} to {}", image.name, image.tag);
        match existing {
            Ok(contents) => {
                let item = contents.items.into_iter().next().ok_or_else(|| {
                    ForgeError::NotFound(format!("{store}:{STORE_FILE}"))
                })?;
                let raw = item.decoded_content().unwrap_or_default();
                let mut document = ImageTagStore::parse(&raw)
                    .map_err(|e| ForgeError::Api(format!("malformed {STORE_FILE}: {e}")))?;

                if !document.set(image) {
                    debug!(store, "Store already up to date");
                    return Ok(());
                }

                let serialized = document
                    .to_json()
                    .map_err(|e| ForgeError::Api(e.to_string()))?;
                self.octocrab
                    .repos(owner, name)
                    .update_file(STORE_FILE, &message, &serialized, &item.sha)
                    .branch(&branch)
                    .send()
                    .await
                    .map_err(map_api_error)?;
            }
            Err(e) => {
                let mapped = map_api_error(e);
                let ForgeError::NotFound(_) = mapped else {
                    return Err(mapped);
                };

                let mut document = ImageTagStore::default();
                document.set(image);
                let serialized = document
                    .to_json()
                    .map_err(|e| ForgeError::Api(e.to_string()))?;
                self.octocrab
                    .repos(owner, name)
                    .create_file(STORE_FILE, &message, &serialized)
                    .branch(&branch)
                    .send()
                    .await
                    .map_err(map_api_error)?;
            }
        }
        Ok(())
    }
}

/// Builds a GitHub code search query for Dockerfiles referencing `image`.
fn build_search_query(image: &str, org: Option<&str>) -> String {
    let mut query = format!("\"{image}\" in:file filename:Dockerfile");
    if let Some(org) = org {
        query.push_str(&format!(" org:{org}"));
    }
    query
}

/// Extracts matches from a code search response page.
fn extract_matches(page: &octocrab::Page<octocrab::models::Code>) -> Vec<ContentMatch> {
    page.items
        .iter()
        .filter_map(|item| {
            let repo = &item.repository;
            let owner = repo.owner.as_ref()?.login.clone();
            Some(ContentMatch {
                repository: format!("{}/{}", owner, repo.name),
                path: item.path.clone(),
            })
        })
        .collect()
}

/// Maps an octocrab repository model onto a [`RepositoryHandle`].
fn handle_from_repository(repo: octocrab::models::Repository) -> RepositoryHandle {
    let full_name = repo.full_name.unwrap_or_else(|| repo.name.clone());
    let parent = repo
        .parent
        .map(|parent| Box::new(handle_from_repository(*parent)));

    RepositoryHandle {
        full_name,
        fork: repo.fork.unwrap_or(false),
        parent,
        default_branch: repo.default_branch.unwrap_or_else(|| "main".to_string()),
    }
}

/// Splits an `owner/name` pair.
fn split_full_name(full_name: &str) -> Result<(&str, &str), ForgeError> {
    full_name
        .split_once('/')
        .ok_or_else(|| ForgeError::InvalidName(full_name.to_string()))
}

/// Classifies octocrab errors into the forge taxonomy.
///
/// Octocrab does not expose a stable structured error surface across
/// endpoints, so classification goes through the rendered message.
fn map_api_error(error: octocrab::Error) -> ForgeError {
    let text = error.to_string();
    let lower = text.to_lowercase();

    if lower.contains("404") || lower.contains("not found") {
        ForgeError::NotFound(text)
    } else if lower.contains("401") || lower.contains("bad credentials") || lower.contains("unauthorized") {
        ForgeError::Auth(text)
    } else if lower.contains("rate limit") {
        ForgeError::RateLimited
    } else {
        ForgeError::Api(text)
    }
}

/// Detects GitHub's validation failure for a pull request that already
/// exists for this head, and the no-commits case a no-op rewrite produces.
fn is_duplicate_pull_request(error: &octocrab::Error) -> bool {
    let lower = error.to_string().to_lowercase();
    lower.contains("already exists") || lower.contains("no commits between")
}

/// Sleeps until the rate limit window resets when remaining quota is below
/// the threshold; returns whether a wait happened.
async fn wait_for_quota(remaining: u32, reset: u64) -> bool {
    if remaining >= MIN_REMAINING_THRESHOLD {
        return false;
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    if reset <= now {
        return false;
    }

    let wait_secs = (reset - now).min(MAX_WAIT_SECS);
    info!(remaining, wait_secs, "Rate limit low, waiting for reset");
    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
    true
}
