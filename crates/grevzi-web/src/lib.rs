//! GREVZI Drop Storefront Web
//!
//! Server-rendered pages with HTMX partials for the claim panel.
//!
//! ## Layout
//!
//! - **Collection list** at `/`, one card per collection
//! - **Detail page** at `/nft/:slug`, which opens a page view
//! - **Page views** own one wallet session and one claim controller each;
//!   the panel polls its own partial, so supply and notifications stay live
//! - **JSON API** under `/api` for health, collections and view snapshots

pub mod templates;
pub mod state;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, PageView, PageViewHandle, PageViews};

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Pages
        .route("/", get(handlers::index))
        .route("/nft/:slug", get(handlers::collection_detail))

        // HTMX partials, scoped to one page view
        .route("/nft/:slug/views/:view/panel", get(handlers::claim_panel))
        .route("/nft/:slug/views/:view/refresh", post(handlers::refresh_supply))
        .route("/nft/:slug/views/:view/claim", post(handlers::claim))
        .route("/nft/:slug/views/:view/wallet", post(handlers::wallet_connect))
        .route(
            "/nft/:slug/views/:view/wallet/disconnect",
            post(handlers::wallet_disconnect),
        )

        // API endpoints
        .route("/api/health", get(handlers::health))
        .route("/api/collections", get(handlers::api_collections))
        .route("/api/nft/:slug/views/:view", get(handlers::api_view))

        // Static assets
        .route("/static/style.css", get(handlers::style_css))

        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the web server. Idle page views are swept once a minute.
pub async fn serve(state: Arc<AppState>, addr: &str) -> std::io::Result<()> {
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let evicted = sweeper.views.evict_idle(sweeper.view_ttl());
            if evicted > 0 {
                tracing::debug!("Evicted {} idle page views", evicted);
            }
        }
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("GREVZI storefront listening on http://{}", addr);

    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use grevzi_core::{
        ClaimCondition, Collection, Creator, CurrencyValue, DropRegistry, ImageRef, ImageResolver,
        ServerConfig, SimulatedDrop, Slug, StaticCatalog,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    const DROP_ADDRESS: &str = "0x2fd4c8a1e5B8A3a6c2F54D1BBb0F1e0C7b2b13F0";
    const BUYER: &str = "0x8ba1f109551bD432803012645Ac136ddd64DBA72";

    fn collection(slug: &str, title: &str, address: &str) -> Collection {
        Collection {
            id: format!("id-{}", slug),
            title: title.to_string(),
            description: "Hand drawn apes".to_string(),
            address: address.to_string(),
            nft_collection_name: format!("{} Collection", title),
            main_image: ImageRef::new("image-main123-2000x3000-jpg"),
            preview_image: ImageRef::new("image-prev456-800x800-png"),
            slug: Slug::new(slug),
            creator: Creator {
                id: "creator-1".to_string(),
                name: "Grev".to_string(),
                address: BUYER.to_string(),
                slug: Slug::new("grev"),
            },
        }
    }

    fn state_with(collections: Vec<Collection>) -> (Arc<AppState>, Arc<SimulatedDrop>) {
        let catalog = StaticCatalog::new(collections, ImageResolver::new("abcd1234", "production"));

        let condition = ClaimCondition::open(CurrencyValue::new("0.01", "ETH"));
        let drop = Arc::new(
            SimulatedDrop::new(DROP_ADDRESS, "Papa Apes", 21, condition)
                .with_claimed(13)
                .with_claim_delay(Duration::from_millis(20)),
        );
        let mut registry = DropRegistry::new();
        registry.register(drop.clone());

        let state = AppState::new(Arc::new(catalog), Arc::new(registry), ServerConfig::default());
        (Arc::new(state), drop)
    }

    fn test_state() -> (Arc<AppState>, Arc<SimulatedDrop>) {
        state_with(vec![
            collection("papa-apes", "Papa Apes", DROP_ADDRESS),
            collection("moon-cats", "Moon Cats", "0x0000000000000000000000000000000000000001"),
        ])
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, String, Option<String>) {
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let view = response
            .headers()
            .get("x-page-view")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap(), view)
    }

    async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, String, Option<String>) {
        send(state, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post(state: &Arc<AppState>, uri: &str, form: &str) -> (StatusCode, String) {
        let request = Request::post(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap();
        let (status, body, _) = send(state, request).await;
        (status, body)
    }

    /// Open a page view and wait for its initial supply and price reads
    async fn open_view(state: &Arc<AppState>) -> String {
        let (status, _, view) = get(state, "/nft/papa-apes").await;
        assert_eq!(status, StatusCode::OK);
        let base = format!("/nft/papa-apes/views/{}", view.unwrap());

        for _ in 0..100 {
            let snap = snapshot(state, &base).await;
            if snap["state"] == "supply_known" && !snap["price"].is_null() {
                return base;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("page view {} never finished loading", base);
    }

    async fn snapshot(state: &Arc<AppState>, base: &str) -> serde_json::Value {
        let (status, body, _) = get(state, &format!("/api{}", base)).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_str(&body).unwrap()
    }

    async fn wait_for_state(state: &Arc<AppState>, base: &str, name: &str) -> serde_json::Value {
        for _ in 0..100 {
            let snap = snapshot(state, base).await;
            if snap["state"] == name {
                return snap;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("page view never reached {}", name);
    }

    #[tokio::test]
    async fn test_index_lists_collections() {
        let (state, _) = test_state();
        let (status, body, _) = get(&state, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Papa Apes"));
        assert!(body.contains("Moon Cats"));
        assert!(body.contains(r#"href="/nft/papa-apes""#));
        assert!(body.contains("https://cdn.sanity.io/images/abcd1234/production/main123-2000x3000.jpg"));
    }

    #[tokio::test]
    async fn test_every_card_links_to_a_detail_page() {
        let (state, _) = test_state();
        for slug in ["papa-apes", "moon-cats"] {
            let (status, body, _) = get(&state, &format!("/nft/{}", slug)).await;
            assert_eq!(status, StatusCode::OK, "{}", slug);
            assert!(body.contains("claim-panel"));
        }
    }

    #[tokio::test]
    async fn test_detail_page_shows_supply() {
        let (state, _) = test_state();
        let (status, body, view) = get(&state, "/nft/papa-apes").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Papa Apes Collection"));
        assert!(body.contains("Loading Supply Count..."));
        assert!(body.contains(" disabled>"));

        let base = format!("/nft/papa-apes/views/{}", view.unwrap());
        let snap = wait_for_state(&state, &base, "supply_known").await;
        assert_eq!(snap["claimed"], 13);
        assert_eq!(snap["total"], 21);

        let (_, body, _) = get(&state, &format!("{}/panel", base)).await;
        assert!(body.contains("13 / 21 NFT&#39;s claimed"));
        assert!(body.contains("Sign in to Mint"));
        assert!(body.contains(" disabled>"));
    }

    #[tokio::test]
    async fn test_stalled_price_does_not_hold_the_page() {
        let (state, drop) = test_state();
        drop.set_price_delay(Duration::from_secs(3600));

        let response = tokio::time::timeout(Duration::from_secs(1), get(&state, "/nft/papa-apes")).await;
        let (status, _, view) = response.expect("detail page waited on the price read");
        assert_eq!(status, StatusCode::OK);

        let base = format!("/nft/papa-apes/views/{}", view.unwrap());
        let snap = wait_for_state(&state, &base, "supply_known").await;
        assert_eq!(snap["claimed"], 13);
        assert!(snap["price"].is_null());

        post(&state, &format!("{}/wallet", base), &format!("address={}", BUYER)).await;
        assert_eq!(snapshot(&state, &base).await["action"], "Mint NFT");
    }

    #[tokio::test]
    async fn test_slug_needing_encoding_round_trips() {
        let (state, _) = state_with(vec![collection("papa apes", "Papa Apes", DROP_ADDRESS)]);

        let (_, body, _) = get(&state, "/").await;
        assert!(body.contains(r#"href="/nft/papa%20apes""#));

        let (status, _, view) = get(&state, "/nft/papa%20apes").await;
        assert_eq!(status, StatusCode::OK);

        let base = format!("/nft/papa%20apes/views/{}", view.unwrap());
        let (status, body, _) = get(&state, &format!("{}/panel", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/nft/papa%20apes/views/"));
    }

    #[tokio::test]
    async fn test_detail_without_contract() {
        let (state, _) = test_state();
        let (status, body, _) = get(&state, "/nft/moon-cats").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Drop contract unavailable"));
        assert!(body.contains("Loading..."));
    }

    #[tokio::test]
    async fn test_unknown_slug_is_not_found() {
        let (state, _) = test_state();
        let (status, body, view) = get(&state, "/nft/no-such-drop").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(view.is_none());
        assert!(body.contains("no-such-drop"));
        assert!(state.views.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_view_is_not_found() {
        let (state, _) = test_state();
        let base = format!("/nft/papa-apes/views/{}", uuid::Uuid::new_v4());

        let (status, _, _) = get(&state, &format!("{}/panel", base)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = post(&state, &format!("{}/claim", base), "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = get(&state, &format!("/api{}", base)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_view_is_scoped_to_its_collection() {
        let (state, _) = test_state();
        let base = open_view(&state).await;
        let other = base.replace("papa-apes", "moon-cats");

        let (status, _, _) = get(&state, &format!("{}/panel", other)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wallet_sign_in_and_out() {
        let (state, _) = test_state();
        let base = open_view(&state).await;

        let (status, body) = post(&state, &format!("{}/wallet", base), "address=not-a-wallet").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"class="error""#));
        assert!(body.contains("Sign in to Mint"));

        let (_, body) = post(&state, &format!("{}/wallet", base), &format!("address={}", BUYER)).await;
        assert!(body.contains("0x8ba...DBA72"));
        assert!(body.contains("Mint NFT (0.01 ETH)"));

        let (_, body) = post(&state, &format!("{}/wallet/disconnect", base), "").await;
        assert!(body.contains("Sign in to Mint"));
    }

    #[tokio::test]
    async fn test_claim_without_wallet_is_a_no_op() {
        let (state, drop) = test_state();
        let base = open_view(&state).await;

        let (status, body) = post(&state, &format!("{}/claim", base), "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("Minting..."));
        assert_eq!(drop.claimed_count(), 13);
    }

    #[tokio::test]
    async fn test_claim_mints_and_refreshes_supply() {
        let (state, drop) = test_state();
        let base = open_view(&state).await;
        post(&state, &format!("{}/wallet", base), &format!("address={}", BUYER)).await;

        let (status, body) = post(&state, &format!("{}/claim", base), "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Minting..."));
        assert!(body.contains(r#"data-state="claiming""#));

        let snap = wait_for_state(&state, &base, "supply_known").await;
        assert_eq!(snap["claimed"], 14);
        assert_eq!(snap["total"], 21);
        assert_eq!(drop.claimed_count(), 14);

        let (_, body, _) = get(&state, &format!("{}/panel", base)).await;
        assert!(body.contains("14 / 21 NFT&#39;s claimed"));
        assert!(body.contains("HOORAY.. You successfully minted!"));
        assert!(!body.contains("Minting..."));
    }

    #[tokio::test]
    async fn test_rejected_claim_keeps_counts() {
        let (state, drop) = test_state();
        let base = open_view(&state).await;
        post(&state, &format!("{}/wallet", base), &format!("address={}", BUYER)).await;

        drop.reject_next_claim();
        post(&state, &format!("{}/claim", base), "").await;

        let snap = wait_for_state(&state, &base, "claim_failed").await;
        assert_eq!(snap["claimed"], 13);
        assert_eq!(snap["action"], "Mint NFT (0.01 ETH)");
        assert_eq!(drop.claimed_count(), 13);

        let (_, body, _) = get(&state, &format!("{}/panel", base)).await;
        assert!(body.contains("Whoops... Something went wrong!"));
    }

    #[tokio::test]
    async fn test_refresh_rereads_supply() {
        let (state, drop) = test_state();
        let base = open_view(&state).await;

        drop.set_fail_reads(true);
        let (_, body) = post(&state, &format!("{}/refresh", base), "").await;
        assert!(body.contains("Supply count unavailable"));

        drop.set_fail_reads(false);
        let (_, body) = post(&state, &format!("{}/refresh", base), "").await;
        assert!(body.contains("13 / 21 NFT&#39;s claimed"));
    }

    #[tokio::test]
    async fn test_page_views_are_independent() {
        let (state, _) = test_state();
        let first = open_view(&state).await;
        let second = open_view(&state).await;
        assert_ne!(first, second);

        post(&state, &format!("{}/wallet", first), &format!("address={}", BUYER)).await;

        assert_eq!(snapshot(&state, &first).await["action"], "Mint NFT (0.01 ETH)");
        assert_eq!(snapshot(&state, &second).await["action"], "Sign in to Mint");
    }

    #[tokio::test]
    async fn test_api_collections() {
        let (state, _) = test_state();
        let (status, body, _) = get(&state, "/api/collections").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["count"], 2);
        assert_eq!(json["collections"][0]["slug"], "papa-apes");
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = test_state();
        let (status, body, _) = get(&state, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["content_source"], "static");
    }

    #[tokio::test]
    async fn test_stylesheet() {
        let (state, _) = test_state();
        let (status, body, _) = get(&state, "/static/style.css").await;

        assert_eq!(status, StatusCode::OK);
        assert!(!body.is_empty());
    }
}
