//! HTML rendering
//!
//! Pages are plain strings. The claim panel is an HTMX partial that polls
//! itself so progress and outcome notifications show up without a reload.

use grevzi_core::{ClaimSnapshot, NotificationKind};
use uuid::Uuid;

/// One card on the collection list
pub struct CollectionCard {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
}

/// Everything the detail page shows outside the claim panel
pub struct DetailPage {
    pub title: String,
    pub collection_name: String,
    pub description: String,
    pub main_image_url: String,
    pub preview_image_url: String,
    pub creator_name: String,
}

/// Claim panel inputs
pub struct PanelContext<'a> {
    pub slug: &'a str,
    pub view: Uuid,
    pub has_contract: bool,
    pub snapshot: &'a ClaimSnapshot,
    pub wallet_short: Option<String>,
    pub error: Option<&'a str>,
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode one URL path segment
pub fn path_segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <link rel="stylesheet" href="/static/style.css">
    <script src="https://unpkg.com/htmx.org@1.9.10"></script>
</head>
<body>
{}
</body>
</html>"#,
        escape(title),
        body
    )
}

fn brand() -> &'static str {
    r#"<a class="brand" href="/">The <span class="brand-mark">GREVZI</span> NFT Market Place</a>"#
}

/// Collection list
pub fn index_html(cards: &[CollectionCard]) -> String {
    let mut grid = String::new();
    for card in cards {
        grid.push_str(&format!(
            r#"
        <a class="card" href="/nft/{slug}">
            <img src="{image}" alt="{title}">
            <div class="card-body">
                <h2>{title}</h2>
                <p>{description}</p>
            </div>
        </a>"#,
            slug = escape(&path_segment(&card.slug)),
            image = escape(&card.image_url),
            title = escape(&card.title),
            description = escape(&card.description),
        ));
    }

    let body = format!(
        r#"<div class="page">
    <header>{}</header>
    <hr>
    <main class="grid">{}
    </main>
</div>"#,
        brand(),
        grid
    );
    layout("NFT Drop Collections", &body)
}

/// Collection detail with its claim panel
pub fn detail_html(page: &DetailPage, panel: &str) -> String {
    let body = format!(
        r#"<div class="detail">
    <aside class="hero">
        <div class="preview"><img src="{preview}" alt="{name}"></div>
        <h1>{name}</h1>
        <h2>{description}</h2>
    </aside>
    <section class="mint">
        <header>{brand}</header>
        <hr>
        <div class="showcase">
            <img src="{main}" alt="{title}">
            <h2>{title}</h2>
            <p class="creator">by {creator}</p>
        </div>
        {panel}
    </section>
</div>"#,
        preview = escape(&page.preview_image_url),
        main = escape(&page.main_image_url),
        name = escape(&page.collection_name),
        description = escape(&page.description),
        title = escape(&page.title),
        creator = escape(&page.creator_name),
        brand = brand(),
        panel = panel,
    );
    layout(&page.title, &body)
}

/// Claim panel partial
pub fn claim_panel_html(ctx: &PanelContext<'_>) -> String {
    let base = format!("/nft/{}/views/{}", escape(&path_segment(ctx.slug)), ctx.view);
    let snapshot = ctx.snapshot;

    let wallet = match &ctx.wallet_short {
        Some(short) => format!(
            r##"<p class="wallet">You're logged in with wallet {}</p>
        <button class="sign" hx-post="{}/wallet/disconnect" hx-target="#claim-panel" hx-swap="outerHTML">Sign Out</button>"##,
            escape(short),
            base
        ),
        None => format!(
            r##"<form class="wallet-form" hx-post="{}/wallet" hx-target="#claim-panel" hx-swap="outerHTML">
            <input name="address" placeholder="0x..." autocomplete="off">
            <button class="sign" type="submit">Sign In</button>
        </form>"##,
            base
        ),
    };

    let error = ctx
        .error
        .map(|e| format!(r#"<p class="error">{}</p>"#, escape(e)))
        .unwrap_or_default();

    let supply = if ctx.has_contract {
        escape(&snapshot.supply_caption)
    } else {
        "Drop contract unavailable".to_string()
    };

    let mut toasts = String::new();
    for notification in &snapshot.notifications {
        toasts.push_str(&format!(
            r#"<div class="toast toast-{}">{}</div>"#,
            notification.kind.as_str(),
            escape(&notification.message)
        ));
    }
    let busy = snapshot
        .notifications
        .iter()
        .any(|n| n.kind == NotificationKind::Progress);

    let disabled = if snapshot.action_enabled { "" } else { " disabled" };

    format!(
        r##"<div id="claim-panel" hx-get="{base}/panel" hx-trigger="every 2s" hx-swap="outerHTML" data-state="{state}">
        {wallet}
        {error}
        <p class="supply{loading}">{supply}</p>
        <button class="mint-button" hx-post="{base}/claim" hx-target="#claim-panel" hx-swap="outerHTML"{disabled}>{action}</button>
        <div class="toasts{busy}">{toasts}</div>
    </div>"##,
        base = base,
        state = snapshot.state,
        wallet = wallet,
        error = error,
        loading = if snapshot.loading { " loading" } else { "" },
        supply = supply,
        disabled = disabled,
        action = escape(&snapshot.action),
        busy = if busy { " busy" } else { "" },
        toasts = toasts,
    )
}

pub fn not_found_html(what: &str) -> String {
    let body = format!(
        r#"<div class="page">
    <header>{}</header>
    <hr>
    <main class="message"><h1>404</h1><p>{}</p><a href="/">Back to collections</a></main>
</div>"#,
        brand(),
        escape(what)
    );
    layout("Not Found", &body)
}

pub fn error_html(message: &str) -> String {
    let body = format!(
        r#"<div class="page">
    <header>{}</header>
    <hr>
    <main class="message"><h1>Something went wrong</h1><p>{}</p></main>
</div>"#,
        brand(),
        escape(message)
    );
    layout("Error", &body)
}

pub const STYLE_CSS: &str = r#"
:root {
    --rose: #fb7185;
    --red: #dc2626;
    --slate: #f1f5f9;
    --muted: #9ca3af;
}
* { box-sizing: border-box; }
body { margin: 0; font-family: system-ui, sans-serif; color: #111827; }
a { color: inherit; text-decoration: none; }
hr { margin: 0.5rem 0; border: 1px solid #e5e7eb; }
.page { max-width: 80rem; margin: 0 auto; padding: 5rem 2.5rem; min-height: 100vh; }
header { display: flex; align-items: center; justify-content: space-between; }
.brand { font-size: 1.75rem; font-weight: 200; }
.brand-mark { font-weight: 800; text-decoration: underline; text-decoration-color: rgba(219, 39, 119, 0.5); }
.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(16rem, 1fr)); gap: 1rem;
        background: var(--slate); padding: 2.5rem; margin-top: 1.25rem; border-radius: 1rem; }
.card { display: flex; flex-direction: column; align-items: center; transition: transform 200ms; }
.card:hover { transform: scale(1.05); }
.card img { height: 24rem; width: 15rem; object-fit: cover; border-radius: 1rem; }
.card-body { padding: 1.25rem; }
.card-body p { color: var(--muted); font-size: 0.875rem; }
.detail { display: grid; grid-template-columns: 2fr 3fr; min-height: 100vh; }
.hero { background: linear-gradient(to bottom right, #155e75, #f43f5e); display: flex; flex-direction: column;
        align-items: center; justify-content: center; color: white; text-align: center; padding: 1.25rem; }
.preview { background: linear-gradient(to bottom right, #facc15, #9333ea); padding: 0.5rem; border-radius: 0.75rem; }
.preview img { width: 18rem; height: 24rem; object-fit: cover; border-radius: 0.75rem; }
.mint { display: flex; flex-direction: column; padding: 3rem; }
.showcase { display: flex; flex-direction: column; align-items: center; text-align: center; margin-top: 2.5rem; }
.showcase img { width: 20rem; height: 10rem; object-fit: cover; }
.creator { color: var(--muted); }
.wallet { text-align: center; color: var(--rose); font-size: 0.875rem; }
.sign { border-radius: 9999px; background: var(--rose); color: white; font-weight: 700; border: 0; padding: 0.5rem 1rem; }
.supply { color: #22c55e; font-size: 1.25rem; text-align: center; }
.supply.loading { animation: pulse 1.5s infinite; }
.mint-button { margin-top: 2.5rem; height: 4rem; width: 100%; background: var(--red); color: white;
               border: 0; border-radius: 9999px; font-weight: 700; }
.mint-button:disabled { background: #9ca3af; }
.toasts { position: fixed; top: 1rem; left: 50%; transform: translateX(-50%); }
.toast { padding: 1rem 1.5rem; margin-bottom: 0.5rem; border-radius: 0.5rem; color: white; font-weight: 700; }
.toast-progress { background: #475569; }
.toast-success { background: #16a34a; }
.toast-failure { background: var(--red); }
.error { color: var(--red); text-align: center; }
.message { text-align: center; padding: 5rem 0; }
@keyframes pulse { 50% { opacity: 0.5; } }
@media (max-width: 1024px) { .detail { display: flex; flex-direction: column; } }
"#;
