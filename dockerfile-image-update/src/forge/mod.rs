//! Forge client abstraction and implementations.

pub mod github;
pub mod mock;
mod traits;

pub use github::GitHubClient;
pub use traits::{
    ContentMatch, ContentSet, FileContent, ForgeClient, ForgeError, RepositoryHandle, UserHandle,
};
