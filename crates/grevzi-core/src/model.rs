//! Content records as the content store returns them
//!
//! Field names follow the store's projection (`_id`, `nftCollectionName`,
//! `slug { current }`, ...) so records decode without a mapping layer.
//! Records are read-only once fetched.

use serde::{Deserialize, Serialize};
use std::fmt;

/// URL-safe unique identifier of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slug {
    current: String,
}

impl Slug {
    pub fn new(current: impl Into<String>) -> Self {
        Self { current: current.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.current
    }

    /// Lowercase ASCII letters, digits and single dashes only
    pub fn is_url_safe(&self) -> bool {
        !self.current.is_empty()
            && !self.current.starts_with('-')
            && !self.current.ends_with('-')
            && !self.current.contains("--")
            && self
                .current
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.current)
    }
}

/// Pointer to an image asset in the content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub asset: AssetRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    #[serde(rename = "_ref")]
    pub reference: String,
}

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            asset: AssetRef { reference: reference.into() },
        }
    }

    /// Raw reference, e.g. `image-Tb9Ew8CXIwaY6R1kjMvI0uRR-2000x3000-jpg`
    pub fn reference(&self) -> &str {
        &self.asset.reference
    }
}

/// Creator of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub address: String,
    pub slug: Slug,
}

/// A drop collection as published in the content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Drop contract address
    pub address: String,
    pub nft_collection_name: String,
    pub main_image: ImageRef,
    pub preview_image: ImageRef,
    pub slug: Slug,
    pub creator: Creator,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "_id": "3b1c",
        "title": "Papa Apes",
        "address": "0x2fd4c8a1e5B8A3a6c2F54D1BBb0F1e0C7b2b13F0",
        "description": "Twenty-one hand drawn apes",
        "nftCollectionName": "Papa Apes",
        "mainImage": { "asset": { "_ref": "image-abc123-2000x3000-jpg", "_type": "reference" } },
        "previewImage": { "asset": { "_ref": "image-def456-800x800-png", "_type": "reference" } },
        "slug": { "current": "papa-apes" },
        "creator": {
            "_id": "c-1",
            "name": "Grev",
            "address": "0x8ba1f109551bD432803012645Ac136ddd64DBA72",
            "slug": { "current": "grev" }
        }
    }"#;

    #[test]
    fn test_decode_store_projection() {
        let collection: Collection = serde_json::from_str(SAMPLE).unwrap();

        assert_eq!(collection.id, "3b1c");
        assert_eq!(collection.slug.as_str(), "papa-apes");
        assert_eq!(collection.nft_collection_name, "Papa Apes");
        assert_eq!(collection.main_image.reference(), "image-abc123-2000x3000-jpg");
        assert_eq!(collection.creator.name, "Grev");
    }

    #[test]
    fn test_missing_description_defaults_empty() {
        let mut value: serde_json::Value = serde_json::from_str(SAMPLE).unwrap();
        value.as_object_mut().unwrap().remove("description");

        let collection: Collection = serde_json::from_value(value).unwrap();
        assert!(collection.description.is_empty());
    }

    #[test]
    fn test_slug_url_safety() {
        assert!(Slug::new("papa-apes").is_url_safe());
        assert!(Slug::new("drop2").is_url_safe());
        assert!(!Slug::new("Papa Apes").is_url_safe());
        assert!(!Slug::new("-apes").is_url_safe());
        assert!(!Slug::new("a--b").is_url_safe());
        assert!(!Slug::new("").is_url_safe());
    }
}
