//! In-memory forge implementation for deterministic testing.
//!
//! Stores the remote state (search matches, user, repositories, files) in
//! memory, records every operation for call-contract assertions, and allows
//! injecting failures per operation and repository.

use super::traits::{
    ContentMatch, ContentSet, FileContent, ForgeClient, ForgeError, RepositoryHandle, UserHandle,
};
use crate::image::ImageReference;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock forge for tests.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and keep another for assertions.
#[derive(Debug, Clone, Default)]
pub struct MockForge {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    matches: Vec<ContentMatch>,
    empty_searches: usize,
    user: Option<UserHandle>,
    repositories: Vec<RepositoryHandle>,
    details: HashMap<String, RepositoryHandle>,
    files: HashMap<(String, String, String), FileContent>,
    fail_on: Vec<FailOn>,
    operations: Vec<MockOperation>,
}

/// Failure injection: which operation should fail, for which repository.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail `fork_repository` for the given repository.
    Fork {
        repository: String,
        error: ForgeError,
    },
    /// Fail `get_repository_by_full_name` for the given repository.
    GetRepository {
        repository: String,
        error: ForgeError,
    },
    /// Fail `get_file_content` for the given repository.
    GetFile {
        repository: String,
        error: ForgeError,
    },
    /// Fail `update_file_content` for the given repository.
    UpdateFile {
        repository: String,
        error: ForgeError,
    },
    /// Fail `open_pull_request` against the given parent.
    OpenPullRequest { parent: String, error: ForgeError },
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Search {
        image: String,
        org: Option<String>,
    },
    Fork {
        repository: String,
    },
    ListRepositories,
    GetRepository {
        repository: String,
    },
    GetFile {
        repository: String,
        path: String,
        branch: String,
    },
    UpdateFile {
        repository: String,
        path: String,
        branch: String,
        image: String,
    },
    OpenPullRequest {
        parent: String,
        head: String,
        branch: String,
    },
    UpdateStore {
        store: String,
        image: String,
    },
}

impl MockForge {
    /// Creates an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the authenticated user.
    pub fn set_user(&self, login: &str) {
        self.inner.lock().unwrap().user = Some(UserHandle {
            login: login.to_string(),
        });
    }

    /// Adds a search match.
    pub fn add_match(&self, repository: &str, path: &str) {
        self.inner.lock().unwrap().matches.push(ContentMatch {
            repository: repository.to_string(),
            path: path.to_string(),
        });
    }

    /// Makes the first `count` searches report an empty result set.
    pub fn set_empty_searches(&self, count: usize) {
        self.inner.lock().unwrap().empty_searches = count;
    }

    /// Adds a repository to the user's listing.
    pub fn add_repository(&self, handle: RepositoryHandle) {
        self.inner.lock().unwrap().repositories.push(handle);
    }

    /// Registers the handle returned by `get_repository_by_full_name`.
    pub fn add_detail(&self, handle: RepositoryHandle) {
        self.inner
            .lock()
            .unwrap()
            .details
            .insert(handle.full_name.clone(), handle);
    }

    /// Seeds a file at `(repository, path, branch)`.
    pub fn put_file(&self, repository: &str, path: &str, branch: &str, text: &str) {
        let content = FileContent {
            repository: repository.to_string(),
            path: path.to_string(),
            sha: format!("sha:{path}@{branch}"),
            text: text.to_string(),
        };
        self.inner.lock().unwrap().files.insert(
            (
                repository.to_string(),
                path.to_string(),
                branch.to_string(),
            ),
            content,
        );
    }

    /// Arms a failure.
    pub fn fail_on(&self, failure: FailOn) {
        self.inner.lock().unwrap().fail_on.push(failure);
    }

    /// Snapshot of every recorded operation.
    #[must_use]
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Drains the recorded operations, returning them in order.
    ///
    /// Useful for asserting call contracts per run when the same mock backs
    /// several runs.
    #[must_use]
    pub fn take_operations(&self) -> Vec<MockOperation> {
        std::mem::take(&mut self.inner.lock().unwrap().operations)
    }

    fn record(&self, operation: MockOperation) {
        self.inner.lock().unwrap().operations.push(operation);
    }
}

#[async_trait]
impl ForgeClient for MockForge {
    async fn search_content_by_image(
        &self,
        image: &str,
        org: Option<&str>,
    ) -> Result<ContentSet, ForgeError> {
        self.record(MockOperation::Search {
            image: image.to_string(),
            org: org.map(str::to_string),
        });

        let mut inner = self.inner.lock().unwrap();
        if inner.empty_searches > 0 {
            inner.empty_searches -= 1;
            return Ok(ContentSet::default());
        }
        Ok(ContentSet {
            total: inner.matches.len(),
            matches: inner.matches.clone(),
        })
    }

    async fn get_authenticated_user(&self) -> Result<Option<UserHandle>, ForgeError> {
        Ok(self.inner.lock().unwrap().user.clone())
    }

    async fn fork_repository(&self, full_name: &str) -> Result<(), ForgeError> {
        self.record(MockOperation::Fork {
            repository: full_name.to_string(),
        });

        let inner = self.inner.lock().unwrap();
        for failure in &inner.fail_on {
            if let FailOn::Fork { repository, error } = failure {
                if repository == full_name {
                    return Err(error.clone());
                }
            }
        }
        Ok(())
    }

    async fn list_repositories_for_user(
        &self,
        _user: &UserHandle,
    ) -> Result<Vec<RepositoryHandle>, ForgeError> {
        self.record(MockOperation::ListRepositories);
        Ok(self.inner.lock().unwrap().repositories.clone())
    }

    async fn get_repository_by_full_name(
        &self,
        full_name: &str,
    ) -> Result<RepositoryHandle, ForgeError> {
        self.record(MockOperation::GetRepository {
            repository: full_name.to_string(),
        });

        let inner = self.inner.lock().unwrap();
        for failure in &inner.fail_on {
            if let FailOn::GetRepository { repository, error } = failure {
                if repository == full_name {
                    return Err(error.clone());
                }
            }
        }
        inner
            .details
            .get(full_name)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(full_name.to_string()))
    }

    async fn get_file_content(
        &self,
        repo: &RepositoryHandle,
        path: &str,
        branch: &str,
    ) -> Result<FileContent, ForgeError> {
        self.record(MockOperation::GetFile {
            repository: repo.full_name.clone(),
            path: path.to_string(),
            branch: branch.to_string(),
        });

        let inner = self.inner.lock().unwrap();
        for failure in &inner.fail_on {
            if let FailOn::GetFile { repository, error } = failure {
                if *repository == repo.full_name {
                    return Err(error.clone());
                }
            }
        }
        inner
            .files
            .get(&(
                repo.full_name.clone(),
                path.to_string(),
                branch.to_string(),
            ))
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("{}:{path}", repo.full_name)))
    }

    async fn update_file_content(
        &self,
        content: &FileContent,
        branch: &str,
        image: &ImageReference,
        _comment: Option<&str>,
    ) -> Result<(), ForgeError> {
        self.record(MockOperation::UpdateFile {
            repository: content.repository.clone(),
            path: content.path.clone(),
            branch: branch.to_string(),
            image: image.to_string(),
        });

        let inner = self.inner.lock().unwrap();
        for failure in &inner.fail_on {
            if let FailOn::UpdateFile { repository, error } = failure {
                if *repository == content.repository {
                    return Err(error.clone());
                }
            }
        }
        Ok(())
    }

    async fn open_pull_request(
        &self,
        parent: &RepositoryHandle,
        branch: &str,
        head: &RepositoryHandle,
        _message: Option<&str>,
    ) -> Result<(), ForgeError> {
        self.record(MockOperation::OpenPullRequest {
            parent: parent.full_name.clone(),
            head: head.full_name.clone(),
            branch: branch.to_string(),
        });

        let inner = self.inner.lock().unwrap();
        for failure in &inner.fail_on {
            if let FailOn::OpenPullRequest { parent: name, error } = failure {
                if *name == parent.full_name {
                    return Err(error.clone());
                }
            }
        }
        Ok(())
    }

    async fn update_store(&self, store: &str, image: &ImageReference) -> Result<(), ForgeError> {
        self.record(MockOperation::UpdateStore {
            store: store.to_string(),
            image: image.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fork_handle(full_name: &str) -> RepositoryHandle {
        RepositoryHandle {
            full_name: full_name.to_string(),
            fork: true,
            parent: None,
            default_branch: "main".to_string(),
        }
    }

    #[tokio::test]
    async fn records_operations_in_order() {
        let forge = MockForge::new();
        forge.add_match("acme/service", "Dockerfile");

        forge
            .search_content_by_image("library/ubuntu", None)
            .await
            .unwrap();
        forge.fork_repository("acme/service").await.unwrap();

        let ops = forge.take_operations();
        assert_eq!(
            ops,
            vec![
                MockOperation::Search {
                    image: "library/ubuntu".to_string(),
                    org: None,
                },
                MockOperation::Fork {
                    repository: "acme/service".to_string(),
                },
            ]
        );
        assert!(forge.operations().is_empty());
    }

    #[tokio::test]
    async fn empty_searches_run_out() {
        let forge = MockForge::new();
        forge.add_match("acme/service", "Dockerfile");
        forge.set_empty_searches(2);

        for _ in 0..2 {
            let set = forge
                .search_content_by_image("library/ubuntu", None)
                .await
                .unwrap();
            assert!(set.is_empty());
        }
        let set = forge
            .search_content_by_image("library/ubuntu", None)
            .await
            .unwrap();
        assert_eq!(set.total, 1);
    }

    #[tokio::test]
    async fn injected_failures_match_by_repository() {
        let forge = MockForge::new();
        forge.fail_on(FailOn::Fork {
            repository: "acme/service".to_string(),
            error: ForgeError::Api("boom".to_string()),
        });

        assert!(forge.fork_repository("acme/service").await.is_err());
        assert!(forge.fork_repository("acme/other").await.is_ok());
    }

    #[tokio::test]
    async fn missing_detail_reports_not_found() {
        let forge = MockForge::new();
        forge.add_detail(fork_handle("acme/service"));

        assert!(forge
            .get_repository_by_full_name("acme/service")
            .await
            .is_ok());
        assert!(matches!(
            forge.get_repository_by_full_name("acme/gone").await,
            Err(ForgeError::NotFound(_))
        ));
    }
}
