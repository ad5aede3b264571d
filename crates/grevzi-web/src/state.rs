//! Application state for the storefront

use chrono::{DateTime, Utc};
use grevzi_core::{
    ClaimController, Collection, ContentSource, ContractProvider, DropRegistry, LocalWallet,
    ServerConfig, StorefrontConfig,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Where collections come from
    pub content: Arc<dyn ContentSource>,
    /// Drop contract lookup by collection address
    pub contracts: Arc<dyn ContractProvider>,
    /// Open detail page views
    pub views: PageViews,
    pub server: ServerConfig,
    /// Server start time
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        content: Arc<dyn ContentSource>,
        contracts: Arc<dyn ContractProvider>,
        server: ServerConfig,
    ) -> Self {
        Self {
            content,
            contracts,
            views: PageViews::new(),
            server,
            started_at: Utc::now(),
        }
    }

    /// Build content source and drop registry from configuration
    pub fn from_config(config: &StorefrontConfig) -> grevzi_core::Result<Self> {
        let content = config.content.build()?;
        let contracts = Arc::new(DropRegistry::from_config(&config.drops));
        Ok(Self::new(content, contracts, config.server.clone()))
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    pub fn view_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.server.view_ttl_secs as i64)
    }

    pub fn notification_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.server.notification_ttl_secs as i64)
    }
}

/// One rendering of a detail page and the claim state it owns
pub struct PageView {
    pub collection: Collection,
    pub wallet: Arc<LocalWallet>,
    pub controller: Arc<Mutex<ClaimController>>,
    touched_at: DateTime<Utc>,
}

impl PageView {
    pub fn new(collection: Collection, wallet: Arc<LocalWallet>, controller: ClaimController) -> Self {
        Self {
            collection,
            wallet,
            controller: Arc::new(Mutex::new(controller)),
            touched_at: Utc::now(),
        }
    }
}

/// Handle to a live page view
#[derive(Clone)]
pub struct PageViewHandle {
    pub id: Uuid,
    pub collection: Collection,
    pub wallet: Arc<LocalWallet>,
    pub controller: Arc<Mutex<ClaimController>>,
}

/// Registry of open page views; the only owner of their controllers
#[derive(Clone, Default)]
pub struct PageViews {
    views: Arc<RwLock<HashMap<Uuid, PageView>>>,
}

impl PageViews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, view: PageView) -> Uuid {
        let id = Uuid::new_v4();
        self.views
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, view);
        id
    }

    /// Look up a view of the collection with this slug and mark it touched
    pub fn get(&self, id: Uuid, slug: &str) -> Option<PageViewHandle> {
        let mut views = self.views.write().unwrap_or_else(PoisonError::into_inner);
        let view = views.get_mut(&id)?;
        if view.collection.slug.as_str() != slug {
            return None;
        }
        view.touched_at = Utc::now();
        Some(PageViewHandle {
            id,
            collection: view.collection.clone(),
            wallet: view.wallet.clone(),
            controller: view.controller.clone(),
        })
    }

    /// Drop views idle for at least `ttl`; returns how many went
    pub fn evict_idle(&self, ttl: chrono::Duration) -> usize {
        let cutoff = Utc::now() - ttl;
        let mut views = self.views.write().unwrap_or_else(PoisonError::into_inner);
        let before = views.len();
        views.retain(|_, view| view.touched_at > cutoff);
        before - views.len()
    }

    pub fn len(&self) -> usize {
        self.views.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
