//! Resolves the user's repositories back to the upstreams this run forked.

use crate::forge::{ForgeClient, ForgeError, RepositoryHandle, UserHandle};
use crate::fork::OwnerPathMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Maximum listing attempts while waiting for fresh forks to appear.
const LIST_ATTEMPTS: u32 = 5;

/// Delay between listing attempts.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Why a listed repository was skipped during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a fork; only forks are candidates for update.
    NotFork,

    /// Deleted between the listing and the re-fetch.
    Vanished,

    /// Fork with no resolvable parent.
    NoParent,

    /// Parent is not one of the repositories this run forked.
    UnrelatedParent,
}

/// Result of resolving a single listed repository.
#[derive(Debug)]
pub enum Resolution {
    /// A fork of an upstream this run is responsible for.
    Candidate {
        /// The fork, re-fetched with parent linkage.
        fork: RepositoryHandle,
        /// The upstream repository.
        parent: RepositoryHandle,
    },

    /// Not a candidate; never an error.
    Skip(SkipReason),
}

/// Fetches the authenticated user's repositories.
///
/// Freshly created forks take a moment to show up in the listing, so the
/// call is retried until the listing carries at least as many forks as
/// `owner_paths` expects. The check is count-based: forge-side fork renaming
/// makes name matching unreliable. After the final attempt the listing is
/// returned as-is; per-repository resolution tolerates stragglers.
///
/// # Errors
///
/// Returns [`ForgeError`] if a listing call fails.
pub async fn repositories_for_user(
    client: &dyn ForgeClient,
    owner_paths: &OwnerPathMap,
    user: &UserHandle,
) -> Result<Vec<RepositoryHandle>, ForgeError> {
    info!(user = %user.login, "Listing repositories");
    let mut repositories = client.list_repositories_for_user(user).await?;
    let mut attempt = 1;

    while fork_count(&repositories) < owner_paths.len() && attempt < LIST_ATTEMPTS {
        debug!(
            attempt,
            listed = fork_count(&repositories),
            expected = owner_paths.len(),
            "Fork listing incomplete, retrying"
        );
        sleep(RETRY_DELAY).await;
        repositories = client.list_repositories_for_user(user).await?;
        attempt += 1;
    }

    if fork_count(&repositories) < owner_paths.len() {
        warn!(
            listed = fork_count(&repositories),
            expected = owner_paths.len(),
            "Listing still misses some forks, continuing with what the forge reports"
        );
    }
    Ok(repositories)
}

fn fork_count(repositories: &[RepositoryHandle]) -> usize {
    repositories.iter().filter(|repo| repo.fork).count()
}

/// Re-resolves a listed repository to find its upstream parent.
///
/// Listing results do not embed parent linkage, so forks are re-fetched by
/// full name. A re-fetch reporting not-found is a recoverable skip: the
/// listing can be up to a minute staler than a deletion, and the owner map
/// already contains everything the run needs.
///
/// # Errors
///
/// Returns [`ForgeError`] on re-fetch failures other than not-found; the
/// caller treats those as a per-repository failure.
pub async fn resolve(
    client: &dyn ForgeClient,
    repository: &RepositoryHandle,
    owner_paths: &OwnerPathMap,
) -> Result<Resolution, ForgeError> {
    if !repository.fork {
        return Ok(Resolution::Skip(SkipReason::NotFork));
    }

    debug!(repo = %repository.full_name, "Re-fetching repository for parent linkage");
    let resolved = match client.get_repository_by_full_name(&repository.full_name).await {
        Ok(repo) => repo,
        Err(ForgeError::NotFound(_)) => {
            warn!(
                repo = %repository.full_name,
                "Repository no longer exists; the listing must be stale, ignoring"
            );
            return Ok(Resolution::Skip(SkipReason::Vanished));
        }
        Err(e) => return Err(e),
    };

    let parent = match resolved.parent.as_ref() {
        Some(parent) => (**parent).clone(),
        None => return Ok(Resolution::Skip(SkipReason::NoParent)),
    };
    if !owner_paths.contains_key(&parent.full_name) {
        return Ok(Resolution::Skip(SkipReason::UnrelatedParent));
    }

    Ok(Resolution::Candidate {
        fork: resolved,
        parent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::MockForge;

    fn handle(full_name: &str, fork: bool, parent: Option<&str>) -> RepositoryHandle {
        RepositoryHandle {
            full_name: full_name.to_string(),
            fork,
            parent: parent.map(|name| Box::new(handle(name, false, None))),
            default_branch: "main".to_string(),
        }
    }

    fn owner_paths(owners: &[&str]) -> OwnerPathMap {
        owners
            .iter()
            .map(|owner| (owner.to_string(), "Dockerfile".to_string()))
            .collect()
    }

    #[tokio::test]
    async fn non_forks_are_skipped_without_a_refetch() {
        let forge = MockForge::new();
        let repository = handle("user/homepage", false, None);

        let resolution = resolve(&forge, &repository, &owner_paths(&[]))
            .await
            .unwrap();

        assert!(matches!(resolution, Resolution::Skip(SkipReason::NotFork)));
        assert!(forge.operations().is_empty());
    }

    #[tokio::test]
    async fn vanished_repository_is_a_silent_skip() {
        let forge = MockForge::new();
        let repository = handle("user/service", true, None);

        let resolution = resolve(&forge, &repository, &owner_paths(&["acme/service"]))
            .await
            .unwrap();

        assert!(matches!(resolution, Resolution::Skip(SkipReason::Vanished)));
    }

    #[tokio::test]
    async fn unrelated_fork_is_skipped() {
        let forge = MockForge::new();
        forge.add_detail(handle("user/other", true, Some("elsewhere/other")));
        let repository = handle("user/other", true, None);

        let resolution = resolve(&forge, &repository, &owner_paths(&["acme/service"]))
            .await
            .unwrap();

        assert!(matches!(
            resolution,
            Resolution::Skip(SkipReason::UnrelatedParent)
        ));
    }

    #[tokio::test]
    async fn mapped_fork_resolves_to_a_candidate() {
        let forge = MockForge::new();
        forge.add_detail(handle("user/service", true, Some("acme/service")));
        let repository = handle("user/service", true, None);

        let resolution = resolve(&forge, &repository, &owner_paths(&["acme/service"]))
            .await
            .unwrap();

        match resolution {
            Resolution::Candidate { fork, parent } => {
                assert_eq!(fork.full_name, "user/service");
                assert_eq!(parent.full_name, "acme/service");
            }
            other => panic!("expected candidate, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn listing_is_retried_until_the_forks_appear() {
        let forge = MockForge::new();
        let user = UserHandle {
            login: "user".to_string(),
        };

        // The mock listing stays empty, so all attempts are spent.
        let repositories = repositories_for_user(&forge, &owner_paths(&["acme/service"]), &user)
            .await
            .unwrap();

        assert!(repositories.is_empty());
        assert_eq!(forge.operations().len(), LIST_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn listing_returns_immediately_when_complete() {
        let forge = MockForge::new();
        forge.add_repository(handle("user/service", true, None));
        let user = UserHandle {
            login: "user".to_string(),
        };

        let repositories = repositories_for_user(&forge, &owner_paths(&["acme/service"]), &user)
            .await
            .unwrap();

        assert_eq!(repositories.len(), 1);
        assert_eq!(forge.operations().len(), 1);
    }
}
