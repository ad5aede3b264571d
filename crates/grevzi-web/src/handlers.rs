//! Route handlers for the storefront

use axum::{
    extract::{Form, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use grevzi_core::{
    ClaimController, ClaimTicket, ContentSource, ImageRef, LocalWallet, PriceTicket,
    RefreshTicket, WalletAddress, WalletSession,
};
use serde::Deserialize;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::state::{AppState, PageView, PageViewHandle};
use crate::templates::{self, CollectionCard, DetailPage, PanelContext};

fn image_url(content: &dyn ContentSource, image: &ImageRef) -> String {
    content.resolve_image_url(image).unwrap_or_else(|e| {
        tracing::warn!("Unresolvable image: {}", e);
        String::new()
    })
}

fn not_found(what: &str) -> Response {
    (StatusCode::NOT_FOUND, Html(templates::not_found_html(what))).into_response()
}

fn content_failure(e: grevzi_core::Error) -> Response {
    tracing::error!("Content source failed: {}", e);
    (
        StatusCode::BAD_GATEWAY,
        Html(templates::error_html("The collection catalog is unavailable right now.")),
    )
        .into_response()
}

fn lookup(state: &AppState, slug: &str, view: Uuid) -> Result<PageViewHandle, Response> {
    state
        .views
        .get(view, slug)
        .ok_or_else(|| not_found("This page view has expired. Reload the collection page."))
}

async fn render_panel(state: &AppState, view: &PageViewHandle, error: Option<&str>) -> String {
    let mut controller = view.controller.lock().await;
    controller.expire_notifications(state.notification_ttl());
    let snapshot = controller.snapshot();

    templates::claim_panel_html(&PanelContext {
        slug: view.collection.slug.as_str(),
        view: view.id,
        has_contract: controller.has_contract(),
        snapshot: &snapshot,
        wallet_short: view.wallet.address().map(|a| a.short()),
        error,
    })
}

// ============== Page Handlers ==============

/// Collection list
pub async fn index(State(state): State<Arc<AppState>>) -> Response {
    let collections = match state.content.fetch_collections().await {
        Ok(collections) => collections,
        Err(e) => return content_failure(e),
    };

    for c in collections.iter().filter(|c| !c.slug.is_url_safe()) {
        tracing::warn!("Collection {} has a slug that needs encoding: {:?}", c.id, c.slug.as_str());
    }

    let cards: Vec<CollectionCard> = collections
        .iter()
        .map(|c| CollectionCard {
            slug: c.slug.to_string(),
            title: c.title.clone(),
            description: c.description.clone(),
            image_url: image_url(state.content.as_ref(), &c.main_image),
        })
        .collect();

    Html(templates::index_html(&cards)).into_response()
}

/// Collection detail. Every render opens a fresh page view with its own
/// wallet session and claim controller. The page is served while supply
/// and price are still loading; the panel picks them up on its next poll.
pub async fn collection_detail(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Response {
    let collection = match state.content.fetch_collection_by_slug(&slug).await {
        Ok(Some(collection)) => collection,
        Ok(None) => return not_found(&format!("No collection named \"{}\".", slug)),
        Err(e) => return content_failure(e),
    };

    let wallet = Arc::new(LocalWallet::new());
    let mut controller = ClaimController::new(wallet.clone());
    let (refresh, price) = match state.contracts.contract_for(&collection.address) {
        Some(contract) => {
            controller.bind_contract(contract);
            (controller.begin_refresh(), controller.begin_price())
        }
        None => {
            tracing::warn!(
                "No drop contract at {} for collection {}",
                collection.address,
                collection.slug
            );
            (None, None)
        }
    };

    let page = DetailPage {
        title: collection.title.clone(),
        collection_name: collection.nft_collection_name.clone(),
        description: collection.description.clone(),
        main_image_url: image_url(state.content.as_ref(), &collection.main_image),
        preview_image_url: image_url(state.content.as_ref(), &collection.preview_image),
        creator_name: collection.creator.name.clone(),
    };
    let snapshot = controller.snapshot();
    let has_contract = controller.has_contract();

    let page_view = PageView::new(collection, wallet, controller);
    let shared = Arc::downgrade(&page_view.controller);
    let view = state.views.insert(page_view);
    tracing::debug!("Opened page view {} for {}", view, slug);

    let panel = templates::claim_panel_html(&PanelContext {
        slug: &slug,
        view,
        has_contract,
        snapshot: &snapshot,
        wallet_short: None,
        error: None,
    });

    if let Some(refresh) = refresh {
        spawn_supply_read(shared.clone(), refresh);
    }
    if let Some(price) = price {
        spawn_price_read(shared, price);
    }

    (
        [("x-page-view", view.to_string())],
        Html(templates::detail_html(&page, &panel)),
    )
        .into_response()
}

/// Run a supply read with the controller unlocked
fn spawn_supply_read(controller: Weak<Mutex<ClaimController>>, refresh: RefreshTicket) {
    tokio::spawn(async move {
        let supply = refresh.read().await;
        match controller.upgrade() {
            Some(controller) => controller.lock().await.apply_supply(refresh.epoch(), supply),
            None => tracing::debug!("Page view closed before supply read resolved"),
        }
    });
}

/// Run a price read with the controller unlocked
fn spawn_price_read(controller: Weak<Mutex<ClaimController>>, price: PriceTicket) {
    tokio::spawn(async move {
        let result = price.read().await;
        match controller.upgrade() {
            Some(controller) => controller.lock().await.apply_price(price.binding(), result),
            None => tracing::debug!("Page view closed before price read resolved"),
        }
    });
}

// ============== HTMX Partial Handlers ==============

/// Claim panel partial
pub async fn claim_panel(
    State(state): State<Arc<AppState>>,
    Path((slug, view)): Path<(String, Uuid)>,
) -> Response {
    match lookup(&state, &slug, view) {
        Ok(view) => Html(render_panel(&state, &view, None).await).into_response(),
        Err(response) => response,
    }
}

/// Re-run supply reconciliation
pub async fn refresh_supply(
    State(state): State<Arc<AppState>>,
    Path((slug, view)): Path<(String, Uuid)>,
) -> Response {
    let view = match lookup(&state, &slug, view) {
        Ok(view) => view,
        Err(response) => return response,
    };

    let refresh = view.controller.lock().await.begin_refresh();
    if let Some(refresh) = refresh {
        let supply = refresh.read().await;
        view.controller.lock().await.apply_supply(refresh.epoch(), supply);
    }

    Html(render_panel(&state, &view, None).await).into_response()
}

/// Trigger a claim. A disabled control makes this a no-op.
pub async fn claim(
    State(state): State<Arc<AppState>>,
    Path((slug, view)): Path<(String, Uuid)>,
) -> Response {
    let view = match lookup(&state, &slug, view) {
        Ok(view) => view,
        Err(response) => return response,
    };

    let ticket = view.controller.lock().await.begin_claim();
    if let Some(ticket) = ticket {
        spawn_claim(Arc::downgrade(&view.controller), ticket);
    }

    Html(render_panel(&state, &view, None).await).into_response()
}

/// Run the claim transaction with the controller unlocked, then commit.
/// If the page view is gone by then the result is dropped.
fn spawn_claim(controller: Weak<Mutex<ClaimController>>, ticket: ClaimTicket) {
    tokio::spawn(async move {
        let result = ticket.submit().await;

        let Some(controller) = controller.upgrade() else {
            tracing::debug!("Page view closed before claim resolved; result discarded");
            return;
        };

        let completion = controller.lock().await.complete_claim(ticket, result);
        tracing::debug!("Claim finished: {:?}", completion.outcome);

        if let Some(refresh) = completion.refresh {
            let supply = refresh.read().await;
            controller.lock().await.apply_supply(refresh.epoch(), supply);
        }
    });
}

#[derive(Deserialize)]
pub struct WalletInput {
    pub address: String,
}

/// Connect a wallet to this page view
pub async fn wallet_connect(
    State(state): State<Arc<AppState>>,
    Path((slug, view)): Path<(String, Uuid)>,
    Form(input): Form<WalletInput>,
) -> Response {
    let view = match lookup(&state, &slug, view) {
        Ok(view) => view,
        Err(response) => return response,
    };

    match WalletAddress::parse(&input.address) {
        Ok(address) => {
            view.wallet.connect(address);
            Html(render_panel(&state, &view, None).await).into_response()
        }
        Err(e) => Html(render_panel(&state, &view, Some(&e.to_string())).await).into_response(),
    }
}

/// Disconnect the wallet of this page view
pub async fn wallet_disconnect(
    State(state): State<Arc<AppState>>,
    Path((slug, view)): Path<(String, Uuid)>,
) -> Response {
    let view = match lookup(&state, &slug, view) {
        Ok(view) => view,
        Err(response) => return response,
    };

    view.wallet.disconnect();
    Html(render_panel(&state, &view, None).await).into_response()
}

// ============== API Handlers ==============

/// Health check
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "grevzi-web",
        "version": env!("CARGO_PKG_VERSION"),
        "content_source": state.content.name(),
        "uptime_secs": state.uptime_secs(),
        "page_views": state.views.len()
    }))
}

/// Collection list as JSON
pub async fn api_collections(State(state): State<Arc<AppState>>) -> Response {
    let collections = match state.content.fetch_collections().await {
        Ok(collections) => collections,
        Err(e) => {
            tracing::error!("Content source failed: {}", e);
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": "content source unavailable" })),
            )
                .into_response();
        }
    };

    let results: Vec<serde_json::Value> = collections
        .iter()
        .map(|c| {
            serde_json::json!({
                "id": c.id,
                "slug": c.slug.as_str(),
                "title": c.title,
                "description": c.description,
                "address": c.address,
                "nft_collection_name": c.nft_collection_name,
                "creator": c.creator.name,
                "main_image_url": image_url(state.content.as_ref(), &c.main_image),
                "preview_image_url": image_url(state.content.as_ref(), &c.preview_image)
            })
        })
        .collect();

    Json(serde_json::json!({
        "count": results.len(),
        "collections": results
    }))
    .into_response()
}

/// Claim state of one page view
pub async fn api_view(
    State(state): State<Arc<AppState>>,
    Path((slug, view)): Path<(String, Uuid)>,
) -> Response {
    match state.views.get(view, &slug) {
        Some(view) => Json(view.controller.lock().await.snapshot()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "page view not found" })),
        )
            .into_response(),
    }
}

// ============== Static Assets ==============

/// CSS stylesheet
pub async fn style_css() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], templates::STYLE_CSS)
}
