//! Base image reference.

use serde::Serialize;
use std::fmt;

/// A base image name and tag pair, immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReference {
    /// Image name, e.g. `library/ubuntu`.
    pub name: String,

    /// Tag the image should be moved to.
    pub tag: String,
}

impl ImageReference {
    /// Creates a new image reference.
    #[must_use]
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}
