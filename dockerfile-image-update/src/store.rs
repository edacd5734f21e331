//! Image-to-tag store document.
//!
//! The store is a JSON file kept in a dedicated repository; each run records
//! the image and tag it was asked to roll out so that later runs can observe
//! the latest mapping.

use crate::image::ImageReference;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parsed contents of the store file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTagStore {
    /// Image name to tag mapping.
    #[serde(default)]
    pub images: BTreeMap<String, String>,
}

impl ImageTagStore {
    /// Parses the store document, treating blank input as an empty store.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }

    /// Records `image`, returning whether the document changed.
    pub fn set(&mut self, image: &ImageReference) -> bool {
        let previous = self.images.insert(image.name.clone(), image.tag.clone());
        previous.as_deref() != Some(image.tag.as_str())
    }

    /// Serializes the document for committing back to the store repository.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_parses_to_empty_store() {
        let store = ImageTagStore::parse("").unwrap();
        assert!(store.images.is_empty());

        let store = ImageTagStore::parse("  \n").unwrap();
        assert!(store.images.is_empty());
    }

    #[test]
    fn set_reports_change() {
        let mut store = ImageTagStore::default();
        let image = ImageReference::new("library/ubuntu", "24.04");

        assert!(store.set(&image));
        assert!(!store.set(&image));
        assert!(store.set(&ImageReference::new("library/ubuntu", "25.04")));
    }

    #[test]
    fn round_trips_through_json() {
        let mut store = ImageTagStore::default();
        store.set(&ImageReference::new("library/ubuntu", "24.04"));
        store.set(&ImageReference::new("library/alpine", "3.20"));

        let json = store.to_json().unwrap();
        let parsed = ImageTagStore::parse(&json).unwrap();
        assert_eq!(parsed, store);
    }

    #[test]
    fn rejects_malformed_document() {
        assert!(ImageTagStore::parse("not json").is_err());
    }
}
