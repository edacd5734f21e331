#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

pub mod applier;
pub mod dockerfile;
pub mod forge;
pub mod fork;
pub mod image;
pub mod locator;
pub mod resolver;
pub mod runner;
pub mod store;
pub mod summary;

pub use applier::{apply_update, UpdateError, UpdateOptions};
pub use forge::{
    ContentMatch, ContentSet, FileContent, ForgeClient, ForgeError, GitHubClient,
    RepositoryHandle, UserHandle,
};
pub use fork::{fork_all, ForkError, OwnerPathMap};
pub use image::ImageReference;
pub use locator::{locate_images, LocateOutcome};
pub use resolver::{repositories_for_user, resolve, Resolution, SkipReason};
pub use runner::{Runner, RunnerConfig, RunnerError};
pub use store::ImageTagStore;
pub use summary::{RunSummary, UpdateResult};
