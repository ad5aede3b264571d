//! Content sources
//!
//! The storefront never writes content; it only asks for all collections or
//! for one collection by slug. Two sources are provided:
//!
//! - [`SanityClient`]: GROQ queries over the Sanity HTTP query API
//! - [`StaticCatalog`]: records loaded from a YAML/JSON file

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

use crate::model::{Collection, ImageRef, Slug};
use crate::{Error, Result};

/// Projection shared by the list and detail queries
const COLLECTION_PROJECTION: &str = r#"{
  _id,
  title,
  address,
  description,
  nftCollectionName,
  mainImage { asset },
  previewImage { asset },
  slug { current },
  creator -> {
    _id,
    name,
    address,
    slug { current }
  }
}"#;

/// All records of the collection type
pub fn all_collections_query() -> String {
    format!(r#"*[_type == "collection"]{}"#, COLLECTION_PROJECTION)
}

/// Exactly one record by slug, bound to `$id`
pub fn collection_by_slug_query() -> String {
    format!(
        r#"*[_type == "collection" && slug.current == $id][0]{}"#,
        COLLECTION_PROJECTION
    )
}

/// Read-only query contract over the content store
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &str;

    /// Every published collection, in store order. Empty is not an error.
    async fn fetch_collections(&self) -> Result<Vec<Collection>>;

    /// One collection, or `None` when no record has this slug
    async fn fetch_collection_by_slug(&self, slug: &str) -> Result<Option<Collection>>;

    /// Fully-qualified URL for an image reference
    fn resolve_image_url(&self, image: &ImageRef) -> Result<String>;
}

/// Pure transform from image references to CDN URLs
#[derive(Debug, Clone)]
pub struct ImageResolver {
    project_id: String,
    dataset: String,
    base_url: String,
}

impl ImageResolver {
    pub const DEFAULT_BASE_URL: &'static str = "https://cdn.sanity.io";

    pub fn new(project_id: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset: dataset.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `image-<id>-<w>x<h>-<fmt>` → `<base>/images/<project>/<dataset>/<id>-<w>x<h>.<fmt>`
    ///
    /// References that are already absolute URLs pass through unchanged.
    pub fn resolve(&self, image: &ImageRef) -> Result<String> {
        let reference = image.reference();
        if reference.starts_with("https://") || reference.starts_with("http://") {
            return Ok(reference.to_string());
        }

        let invalid = || Error::InvalidImageRef(reference.to_string());

        let body = reference.strip_prefix("image-").ok_or_else(invalid)?;
        let mut parts = body.rsplitn(3, '-');
        let format = parts.next().ok_or_else(invalid)?;
        let dimensions = parts.next().ok_or_else(invalid)?;
        let id = parts.next().ok_or_else(invalid)?;

        let (width, height) = dimensions.split_once('x').ok_or_else(invalid)?;
        let width: u32 = width.parse().map_err(|_| invalid())?;
        let height: u32 = height.parse().map_err(|_| invalid())?;

        if id.is_empty() || format.is_empty() || !format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }

        Ok(format!(
            "{}/images/{}/{}/{}-{}x{}.{}",
            self.base_url, self.project_id, self.dataset, id, width, height, format
        ))
    }
}

/// Envelope returned by the query endpoint
#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: Option<T>,
}

fn decode_result<T: DeserializeOwned>(body: &str) -> Result<Option<T>> {
    let response: QueryResponse<T> = serde_json::from_str(body)?;
    Ok(response.result)
}

/// GROQ client for a Sanity project
pub struct SanityClient {
    http: reqwest::Client,
    project_id: String,
    dataset: String,
    api_version: String,
    use_cdn: bool,
    token: Option<String>,
    images: ImageResolver,
}

impl SanityClient {
    pub const DEFAULT_API_VERSION: &'static str = "2021-10-21";

    pub fn new(project_id: impl Into<String>, dataset: impl Into<String>) -> Self {
        let project_id = project_id.into();
        let dataset = dataset.into();
        Self {
            http: reqwest::Client::new(),
            images: ImageResolver::new(project_id.clone(), dataset.clone()),
            project_id,
            dataset,
            api_version: Self::DEFAULT_API_VERSION.to_string(),
            use_cdn: true,
            token: None,
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_cdn(mut self, use_cdn: bool) -> Self {
        self.use_cdn = use_cdn;
        self
    }

    /// Bearer token for private datasets
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Query endpoint for this project and dataset
    pub fn query_url(&self) -> String {
        let host = if self.use_cdn { "apicdn" } else { "api" };
        format!(
            "https://{}.{}.sanity.io/v{}/data/query/{}",
            self.project_id,
            host,
            self.api_version.trim_start_matches('v'),
            self.dataset
        )
    }

    /// Run a GROQ query. Parameters are JSON-encoded as the API expects.
    async fn query<T: DeserializeOwned>(&self, groq: &str, params: &[(&str, &str)]) -> Result<Option<T>> {
        let mut pairs = vec![("query".to_string(), groq.to_string())];
        for (name, value) in params {
            pairs.push((format!("${}", name), serde_json::to_string(value)?));
        }

        let mut request = self.http.get(self.query_url()).query(&pairs);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!("Content query failed with {}", status);
            return Err(Error::Content(format!("{}: {}", status, body)));
        }

        decode_result(&body)
    }
}

#[async_trait]
impl ContentSource for SanityClient {
    fn name(&self) -> &str {
        "sanity"
    }

    async fn fetch_collections(&self) -> Result<Vec<Collection>> {
        let collections: Option<Vec<Collection>> = self.query(&all_collections_query(), &[]).await?;
        let collections = collections.unwrap_or_default();
        tracing::debug!("Fetched {} collections", collections.len());
        Ok(collections)
    }

    async fn fetch_collection_by_slug(&self, slug: &str) -> Result<Option<Collection>> {
        self.query(&collection_by_slug_query(), &[("id", slug)]).await
    }

    fn resolve_image_url(&self, image: &ImageRef) -> Result<String> {
        self.images.resolve(image)
    }
}

/// Collections held in memory, loaded from a fixture file
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    collections: Vec<Collection>,
    images: ImageResolver,
}

impl StaticCatalog {
    pub fn new(collections: Vec<Collection>, images: ImageResolver) -> Self {
        Self { collections, images }
    }

    /// Load from `.yaml`/`.yml` or `.json`
    pub fn load(path: &Path, images: ImageResolver) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let collections = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&raw)?,
            _ => serde_yaml::from_str(&raw)
                .map_err(|e| Error::Content(format!("{}: {}", path.display(), e)))?,
        };
        Ok(Self::new(collections, images))
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }
}

#[async_trait]
impl ContentSource for StaticCatalog {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_collections(&self) -> Result<Vec<Collection>> {
        Ok(self.collections.clone())
    }

    async fn fetch_collection_by_slug(&self, slug: &str) -> Result<Option<Collection>> {
        let wanted = Slug::new(slug);
        Ok(self.collections.iter().find(|c| c.slug == wanted).cloned())
    }

    fn resolve_image_url(&self, image: &ImageRef) -> Result<String> {
        self.images.resolve(image)
    }
}
