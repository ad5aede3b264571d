//! # GREVZI Drop Storefront Core
//!
//! Everything the storefront needs below the HTTP layer:
//!
//! ```text
//! CONTENT SOURCE (Sanity / static catalog)
//!       │
//!       └── Collection ──address──► CONTRACT PROVIDER
//!                                        │
//!                                        └── DROP CONTRACT
//!                                               │
//!   WALLET SESSION ──────────────────► CLAIM CONTROLLER ──► NOTIFICATIONS
//!                                        │
//!                                        └── ClaimState (one per page view)
//! ```
//!
//! The content source and the drop contract are external collaborators and
//! are consumed through traits. The claim controller is the only component
//! with state of its own.

pub mod model;
pub mod content;
pub mod contract;
pub mod wallet;
pub mod notify;
pub mod claim;
pub mod config;

pub use model::{Collection, Creator, ImageRef, Slug};
pub use content::{ContentSource, ImageResolver, SanityClient, StaticCatalog};
pub use contract::{
    ClaimCondition, ClaimResult, ContractProvider, CurrencyValue, DropContract, DropRegistry,
    SimulatedDrop, Token, TokenMetadata, TransactionReceipt,
};
pub use wallet::{LocalWallet, WalletAddress, WalletSession};
pub use notify::{Notification, NotificationId, NotificationKind, Notifications};
pub use claim::{
    read_price, read_supply, ClaimAction, ClaimCompletion, ClaimController, ClaimOutcome,
    ClaimSnapshot, ClaimState, ClaimTicket, PriceTicket, RefreshTicket, Supply, CLAIM_QUANTITY,
};
pub use config::{ContentConfig, DropConfig, ServerConfig, StorefrontConfig};

/// Result type for storefront operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from storefront operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Content query failed: {0}")]
    Content(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid image reference: {0}")]
    InvalidImageRef(String),

    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Contract read failed: {0}")]
    ContractRead(String),

    #[error("Claim failed: {0}")]
    ClaimFailed(String),

    #[error("Drop is sold out")]
    SoldOut,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
