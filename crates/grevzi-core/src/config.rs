//! Storefront configuration
//!
//! Loaded from YAML (default) or JSON by file extension. Every section has
//! defaults so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::content::{ContentSource, ImageResolver, SanityClient, StaticCatalog};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorefrontConfig {
    pub server: ServerConfig,
    pub content: ContentConfig,
    /// Simulated drop contracts, by address
    pub drops: Vec<DropConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Idle page views are discarded after this many seconds
    pub view_ttl_secs: u64,
    /// Success/failure notifications stay up this long
    pub notification_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            view_ttl_secs: 30 * 60,
            notification_ttl_secs: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ContentConfig {
    Sanity {
        project_id: String,
        #[serde(default = "default_dataset")]
        dataset: String,
        #[serde(default = "default_api_version")]
        api_version: String,
        #[serde(default = "default_true")]
        use_cdn: bool,
        #[serde(default)]
        token: Option<String>,
    },
    Static {
        path: PathBuf,
        #[serde(default)]
        project_id: String,
        #[serde(default = "default_dataset")]
        dataset: String,
    },
}

fn default_dataset() -> String {
    "production".to_string()
}

fn default_api_version() -> String {
    SanityClient::DEFAULT_API_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self::Static {
            path: PathBuf::from("collections.yaml"),
            project_id: String::new(),
            dataset: default_dataset(),
        }
    }
}

impl ContentConfig {
    /// Build the configured content source
    pub fn build(&self) -> Result<Arc<dyn ContentSource>> {
        match self {
            Self::Sanity { project_id, dataset, api_version, use_cdn, token } => {
                if project_id.is_empty() {
                    return Err(Error::Config("content.project_id is required for sanity".into()));
                }
                let client = SanityClient::new(project_id.as_str(), dataset.as_str())
                    .with_api_version(api_version.as_str())
                    .with_cdn(*use_cdn)
                    .with_token(token.clone());
                Ok(Arc::new(client))
            }
            Self::Static { path, project_id, dataset } => {
                let images = ImageResolver::new(project_id.as_str(), dataset.as_str());
                Ok(Arc::new(StaticCatalog::load(path, images)?))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropConfig {
    pub address: String,
    pub name: String,
    pub total_supply: u64,
    #[serde(default)]
    pub claimed: u64,
    pub price: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Simulated mining time
    #[serde(default)]
    pub claim_delay_ms: u64,
}

fn default_currency() -> String {
    "ETH".to_string()
}

impl StorefrontConfig {
    /// `~/.config/grevzi/storefront.yaml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("grevzi")
            .join("storefront.yaml")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&raw)?,
            _ => serde_yaml::from_str(&raw)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the default location, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load(&path)
                } else {
                    tracing::debug!("No config at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.view_ttl_secs == 0 {
            return Err(Error::Config("server.view_ttl_secs must be positive".into()));
        }
        for drop in &self.drops {
            if drop.claimed > drop.total_supply {
                return Err(Error::Config(format!(
                    "drop {}: claimed {} exceeds total supply {}",
                    drop.address, drop.claimed, drop.total_supply
                )));
            }
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
server:
  bind: "0.0.0.0:8080"
content:
  source: sanity
  project_id: abcd1234
drops:
  - address: "0x2fd4c8a1e5B8A3a6c2F54D1BBb0F1e0C7b2b13F0"
    name: Papa Apes
    total_supply: 21
    claimed: 13
    price: "0.01"
"#;

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storefront.yaml");
        std::fs::write(&path, YAML).unwrap();

        let config = StorefrontConfig::load(&path).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.server.view_ttl_secs, 1800);
        assert_eq!(config.drops[0].currency, "ETH");
        assert!(matches!(
            &config.content,
            ContentConfig::Sanity { dataset, use_cdn: true, .. } if dataset == "production"
        ));
    }

    #[test]
    fn test_empty_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "{}").unwrap();

        assert_eq!(StorefrontConfig::load(&path).unwrap(), StorefrontConfig::default());
    }

    #[test]
    fn test_reject_oversold_drop() {
        let mut config = StorefrontConfig::default();
        config.drops.push(DropConfig {
            address: "0x01".into(),
            name: "Broken".into(),
            total_supply: 5,
            claimed: 6,
            price: "0.01".into(),
            currency: "ETH".into(),
            claim_delay_ms: 0,
        });
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_sanity_requires_project() {
        let content = ContentConfig::Sanity {
            project_id: String::new(),
            dataset: default_dataset(),
            api_version: default_api_version(),
            use_cdn: true,
            token: None,
        };
        assert!(content.build().is_err());
    }

    #[test]
    fn test_yaml_roundtrip_of_defaults() {
        let yaml = StorefrontConfig::default().to_yaml().unwrap();
        let parsed: StorefrontConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, StorefrontConfig::default());
    }
}
