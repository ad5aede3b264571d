//! Claim controller
//!
//! Owns the claim state of one detail page view and drives the mint
//! workflow around the drop contract's single side-effecting call.
//!
//! ```text
//! Uninitialized ──bind──► SupplyLoading ──read ok──► SupplyKnown ◄──────────┐
//!                              │    ▲                  │                    │
//!                          read err │               begin_claim             │
//!                              ▼    │                  ▼                    │
//!                    SupplyUnavailable │           Claiming ──err──► ClaimFailed
//!                                      │               │
//!                                      └─────ok────────┘
//! ```
//!
//! Every step that awaits the contract is split in two (`begin_*` returns a
//! ticket, `apply_*`/`complete_*` commits its result) so a caller sharing
//! the controller behind a lock can release it while the call is in flight.
//! The composed `start`, `refresh_supply` and `claim` methods do both halves
//! for callers that own the controller outright.

use serde::Serialize;
use std::sync::Arc;

use crate::contract::{ClaimResult, CurrencyValue, DropContract, Token};
use crate::notify::{
    Notification, NotificationId, NotificationKind, Notifications, MINTED_MESSAGE,
    MINTING_MESSAGE, MINT_FAILED_MESSAGE,
};
use crate::wallet::{WalletAddress, WalletSession};
use crate::Result;

/// Tokens requested per claim
pub const CLAIM_QUANTITY: u64 = 1;

/// Claimed and total supply from one pair of token reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Supply {
    claimed: u64,
    total: u64,
}

impl Supply {
    /// None if `claimed > total`
    pub fn new(claimed: u64, total: u64) -> Option<Self> {
        (claimed <= total).then_some(Self { claimed, total })
    }

    pub fn from_tokens(claimed: &[Token], unclaimed: &[Token]) -> Self {
        let claimed = claimed.len() as u64;
        Self {
            claimed,
            total: claimed + unclaimed.len() as u64,
        }
    }

    pub fn claimed(&self) -> u64 {
        self.claimed
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn remaining(&self) -> u64 {
        self.total - self.claimed
    }

    pub fn is_sold_out(&self) -> bool {
        self.claimed == self.total
    }
}

/// Claim state of one page view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimState {
    /// No contract bound yet
    Uninitialized,
    /// Supply read in flight; counts unknown
    SupplyLoading { price: Option<CurrencyValue> },
    SupplyKnown { supply: Supply, price: Option<CurrencyValue> },
    /// Last supply read failed; counts unknown
    SupplyUnavailable { price: Option<CurrencyValue> },
    /// Claim transaction in flight
    Claiming { supply: Option<Supply>, price: Option<CurrencyValue> },
    /// Last claim failed; counts are the pre-attempt ones
    ClaimFailed { supply: Option<Supply>, price: Option<CurrencyValue> },
}

impl ClaimState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::SupplyLoading { .. } => "supply_loading",
            Self::SupplyKnown { .. } => "supply_known",
            Self::SupplyUnavailable { .. } => "supply_unavailable",
            Self::Claiming { .. } => "claiming",
            Self::ClaimFailed { .. } => "claim_failed",
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            Self::Uninitialized | Self::SupplyLoading { .. } | Self::Claiming { .. }
        )
    }

    /// Known counts, if any
    pub fn supply(&self) -> Option<Supply> {
        match self {
            Self::SupplyKnown { supply, .. } => Some(*supply),
            Self::Claiming { supply, .. } | Self::ClaimFailed { supply, .. } => *supply,
            _ => None,
        }
    }

    pub fn price(&self) -> Option<&CurrencyValue> {
        match self {
            Self::Uninitialized => None,
            Self::SupplyLoading { price }
            | Self::SupplyUnavailable { price }
            | Self::SupplyKnown { price, .. }
            | Self::Claiming { price, .. }
            | Self::ClaimFailed { price, .. } => price.as_ref(),
        }
    }

    fn price_slot(&mut self) -> Option<&mut Option<CurrencyValue>> {
        match self {
            Self::Uninitialized => None,
            Self::SupplyLoading { price }
            | Self::SupplyUnavailable { price }
            | Self::SupplyKnown { price, .. }
            | Self::Claiming { price, .. }
            | Self::ClaimFailed { price, .. } => Some(price),
        }
    }
}

/// What the action control shows, highest priority first
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimAction {
    Loading,
    SoldOut,
    SignInRequired,
    Mint { price: Option<CurrencyValue> },
}

impl ClaimAction {
    pub fn caption(&self) -> String {
        match self {
            Self::Loading => "Loading...".to_string(),
            Self::SoldOut => "SOLD OUT".to_string(),
            Self::SignInRequired => "Sign in to Mint".to_string(),
            Self::Mint { price: Some(price) } => format!("Mint NFT ({})", price),
            Self::Mint { price: None } => "Mint NFT".to_string(),
        }
    }

    /// Only the call-to-action is clickable
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Mint { .. })
    }
}

/// Permission to run one claim, issued by [`ClaimController::begin_claim`]
pub struct ClaimTicket {
    contract: Arc<dyn DropContract>,
    to: WalletAddress,
    quantity: u64,
    progress: NotificationId,
}

impl ClaimTicket {
    pub fn requester(&self) -> &WalletAddress {
        &self.to
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    /// Send the claim transaction
    pub async fn submit(&self) -> Result<Vec<ClaimResult>> {
        self.contract.claim(&self.to, self.quantity).await
    }
}

/// Permission to run one supply read, issued by [`ClaimController::begin_refresh`]
pub struct RefreshTicket {
    contract: Arc<dyn DropContract>,
    epoch: u64,
}

impl RefreshTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub async fn read(&self) -> Result<Supply> {
        read_supply(self.contract.as_ref()).await
    }
}

/// Permission to run one price read, issued by [`ClaimController::begin_price`]
pub struct PriceTicket {
    contract: Arc<dyn DropContract>,
    binding: u64,
}

impl PriceTicket {
    /// Contract binding this read belongs to
    pub fn binding(&self) -> u64 {
        self.binding
    }

    pub async fn read(&self) -> Result<Option<CurrencyValue>> {
        read_price(self.contract.as_ref()).await
    }
}

/// Result of one finished claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ClaimOutcome {
    Succeeded {
        token_ids: Vec<u64>,
        transaction_hash: Option<String>,
    },
    Failed,
    /// The ticket no longer matched the controller
    Discarded,
}

/// Claim completion plus the follow-up supply read, if one is due
pub struct ClaimCompletion {
    pub outcome: ClaimOutcome,
    pub refresh: Option<RefreshTicket>,
}

/// Serializable view of a controller
#[derive(Debug, Clone, Serialize)]
pub struct ClaimSnapshot {
    pub state: &'static str,
    pub loading: bool,
    pub claimed: Option<u64>,
    pub total: Option<u64>,
    pub price: Option<String>,
    pub supply_caption: String,
    pub action: String,
    pub action_enabled: bool,
    pub wallet: Option<String>,
    pub notifications: Vec<Notification>,
}

/// Both token sets from one contract state
pub async fn read_supply(contract: &dyn DropContract) -> Result<Supply> {
    let (claimed, unclaimed) = contract.get_token_sets().await?;
    Ok(Supply::from_tokens(&claimed, &unclaimed))
}

/// Display price of the first active claim condition
pub async fn read_price(contract: &dyn DropContract) -> Result<Option<CurrencyValue>> {
    let conditions = contract.get_active_claim_conditions().await?;
    Ok(conditions.into_iter().next().map(|c| c.currency))
}

/// Claim state machine for one page view
pub struct ClaimController {
    contract: Option<Arc<dyn DropContract>>,
    wallet: Arc<dyn WalletSession>,
    state: ClaimState,
    notifications: Notifications,
    in_flight: Option<NotificationId>,
    epoch: u64,
    binding: u64,
}

impl ClaimController {
    pub fn new(wallet: Arc<dyn WalletSession>) -> Self {
        Self {
            contract: None,
            wallet,
            state: ClaimState::Uninitialized,
            notifications: Notifications::new(),
            in_flight: None,
            epoch: 0,
            binding: 0,
        }
    }

    pub fn state(&self) -> &ClaimState {
        &self.state
    }

    pub fn wallet(&self) -> &Arc<dyn WalletSession> {
        &self.wallet
    }

    pub fn has_contract(&self) -> bool {
        self.contract.is_some()
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    /// Contract became available. Counts go back to unknown.
    pub fn bind_contract(&mut self, contract: Arc<dyn DropContract>) {
        tracing::debug!("Bound drop contract {}", contract.address());
        self.contract = Some(contract);
        if let Some(progress) = self.in_flight.take() {
            self.notifications.dismiss(progress);
        }
        self.epoch += 1;
        self.binding += 1;
        self.state = ClaimState::SupplyLoading { price: None };
    }

    /// Initial supply and price reads. Each result is committed as soon as
    /// it arrives, so a stalled price read never holds back the counts.
    pub async fn start(&mut self) {
        let Some(price) = self.begin_price() else {
            return;
        };
        let Some(refresh) = self.begin_refresh() else {
            return;
        };

        let supply_read = refresh.read();
        let price_read = price.read();
        tokio::pin!(supply_read, price_read);

        let (mut supply_done, mut price_done) = (false, false);
        while !(supply_done && price_done) {
            tokio::select! {
                supply = &mut supply_read, if !supply_done => {
                    supply_done = true;
                    self.apply_supply(refresh.epoch, supply);
                }
                result = &mut price_read, if !price_done => {
                    price_done = true;
                    self.apply_price(price.binding, result);
                }
            }
        }
    }

    /// Start a price read for the bound contract
    pub fn begin_price(&self) -> Option<PriceTicket> {
        let contract = self.contract.clone()?;
        Some(PriceTicket { contract, binding: self.binding })
    }

    /// Start a supply read. Refused while a claim is in flight; the claim
    /// schedules its own read once it resolves.
    pub fn begin_refresh(&mut self) -> Option<RefreshTicket> {
        if matches!(self.state, ClaimState::Claiming { .. }) {
            return None;
        }
        self.start_read()
    }

    fn start_read(&mut self) -> Option<RefreshTicket> {
        let contract = self.contract.clone()?;
        let price = self.state.price().cloned();
        self.epoch += 1;
        self.state = ClaimState::SupplyLoading { price };
        Some(RefreshTicket { contract, epoch: self.epoch })
    }

    /// Commit a supply read. Results from superseded reads are dropped.
    pub fn apply_supply(&mut self, epoch: u64, result: Result<Supply>) {
        if epoch != self.epoch || !matches!(self.state, ClaimState::SupplyLoading { .. }) {
            tracing::debug!("Discarding stale supply read (epoch {} vs {})", epoch, self.epoch);
            return;
        }

        let price = self.state.price().cloned();
        self.state = match result {
            Ok(supply) => {
                tracing::debug!("Supply reconciled: {} / {}", supply.claimed(), supply.total());
                ClaimState::SupplyKnown { supply, price }
            }
            Err(e) => {
                tracing::warn!("Supply read failed: {}", e);
                ClaimState::SupplyUnavailable { price }
            }
        };
    }

    /// Commit a price read. A failure leaves the price unknown; a read
    /// for an earlier contract binding is dropped.
    pub fn apply_price(&mut self, binding: u64, result: Result<Option<CurrencyValue>>) {
        if binding != self.binding {
            tracing::debug!("Discarding price read for binding {} (now {})", binding, self.binding);
            return;
        }
        match result {
            Ok(price) => {
                if let Some(slot) = self.state.price_slot() {
                    *slot = price;
                }
            }
            Err(e) => tracing::warn!("Price read failed: {}", e),
        }
    }

    pub async fn refresh_supply(&mut self) {
        if let Some(refresh) = self.begin_refresh() {
            let supply = refresh.read().await;
            self.apply_supply(refresh.epoch, supply);
        }
    }

    /// Resolved caption for the action control
    pub fn action(&self) -> ClaimAction {
        if self.state.is_loading() {
            return ClaimAction::Loading;
        }
        if self.state.supply().map(|s| s.is_sold_out()).unwrap_or(false) {
            return ClaimAction::SoldOut;
        }
        if self.wallet.address().is_none() {
            return ClaimAction::SignInRequired;
        }
        ClaimAction::Mint {
            price: self.state.price().cloned(),
        }
    }

    pub fn supply_caption(&self) -> String {
        if self.state.is_loading() && !matches!(self.state, ClaimState::Claiming { .. }) {
            return "Loading Supply Count...".to_string();
        }
        match self.state.supply() {
            Some(supply) => format!("{} / {} NFT's claimed", supply.claimed(), supply.total()),
            None => "Supply count unavailable".to_string(),
        }
    }

    /// Enter `Claiming`. Returns None, and changes nothing, unless the
    /// action control is enabled and a contract is bound.
    pub fn begin_claim(&mut self) -> Option<ClaimTicket> {
        let Some(contract) = self.contract.clone() else {
            tracing::debug!("Claim ignored: no contract bound");
            return None;
        };
        if !self.action().is_enabled() {
            tracing::debug!("Claim ignored: control disabled ({})", self.state.name());
            return None;
        }
        let to = self.wallet.address()?;

        let supply = self.state.supply();
        let price = self.state.price().cloned();
        self.state = ClaimState::Claiming { supply, price };

        let progress = self.notifications.raise(NotificationKind::Progress, MINTING_MESSAGE);
        self.in_flight = Some(progress);

        tracing::info!("Claiming {} token(s) to {}", CLAIM_QUANTITY, to.short());
        Some(ClaimTicket {
            contract,
            to,
            quantity: CLAIM_QUANTITY,
            progress,
        })
    }

    /// Commit a claim result. Success schedules a fresh supply read;
    /// failure restores the pre-attempt counts.
    pub fn complete_claim(
        &mut self,
        ticket: ClaimTicket,
        result: Result<Vec<ClaimResult>>,
    ) -> ClaimCompletion {
        if self.in_flight != Some(ticket.progress) {
            tracing::debug!("Discarding result of a superseded claim");
            return ClaimCompletion {
                outcome: ClaimOutcome::Discarded,
                refresh: None,
            };
        }

        self.in_flight = None;
        self.notifications.dismiss(ticket.progress);

        let (supply, price) = match &self.state {
            ClaimState::Claiming { supply, price } => (*supply, price.clone()),
            other => (other.supply(), other.price().cloned()),
        };

        match result {
            Ok(results) => {
                for claimed in &results {
                    tracing::info!(
                        "Minted token {} in tx {} (block {})",
                        claimed.token_id,
                        claimed.receipt.transaction_hash,
                        claimed.receipt.block_number
                    );
                }
                self.notifications.raise(NotificationKind::Success, MINTED_MESSAGE);

                let refresh = self.start_read();

                ClaimCompletion {
                    outcome: ClaimOutcome::Succeeded {
                        token_ids: results.iter().map(|r| r.token_id).collect(),
                        transaction_hash: results.first().map(|r| r.receipt.transaction_hash.clone()),
                    },
                    refresh,
                }
            }
            Err(e) => {
                tracing::warn!("Claim to {} failed: {}", ticket.to.short(), e);
                self.notifications.raise(NotificationKind::Failure, MINT_FAILED_MESSAGE);
                self.state = ClaimState::ClaimFailed { supply, price };

                ClaimCompletion {
                    outcome: ClaimOutcome::Failed,
                    refresh: None,
                }
            }
        }
    }

    /// Whole claim workflow. Failures are absorbed into state and
    /// notifications; None means the control was disabled.
    pub async fn claim(&mut self) -> Option<ClaimOutcome> {
        let ticket = self.begin_claim()?;
        let result = ticket.submit().await;
        let completion = self.complete_claim(ticket, result);

        if let Some(refresh) = completion.refresh {
            let supply = refresh.read().await;
            self.apply_supply(refresh.epoch, supply);
        }
        Some(completion.outcome)
    }

    /// Drop finished notifications older than `max_age`
    pub fn expire_notifications(&mut self, max_age: chrono::Duration) {
        self.notifications.expire(max_age);
    }

    pub fn snapshot(&self) -> ClaimSnapshot {
        let supply = self.state.supply();
        let action = self.action();
        ClaimSnapshot {
            state: self.state.name(),
            loading: self.state.is_loading(),
            claimed: supply.map(|s| s.claimed()),
            total: supply.map(|s| s.total()),
            price: self.state.price().map(|p| p.to_string()),
            supply_caption: self.supply_caption(),
            action: action.caption(),
            action_enabled: action.is_enabled(),
            wallet: self.wallet.address().map(|a| a.to_string()),
            notifications: self.notifications.active().to_vec(),
        }
    }
}
