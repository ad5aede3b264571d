//! Drop contracts
//!
//! A drop contract holds a fixed supply of tokens, some already claimed.
//! The storefront only ever reads the two token sets and the active claim
//! conditions, and submits claims.
//!
//! ## On-Chain vs Simulated
//!
//! - [`DropContract`] is the seam a chain client plugs into
//! - [`SimulatedDrop`] keeps the ledger in memory (demo runs and tests)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::DropConfig;
use crate::wallet::WalletAddress;
use crate::{Error, Result};

/// Off-chain token metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub description: String,
    pub image: Option<String>,
}

/// One token of a drop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: u64,
    pub owner: Option<String>,
    pub metadata: TokenMetadata,
}

/// Display-formatted currency amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyValue {
    pub symbol: String,
    /// Already formatted, e.g. `0.01`
    pub display_value: String,
}

impl CurrencyValue {
    pub fn new(display_value: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            display_value: display_value.into(),
        }
    }
}

impl fmt::Display for CurrencyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.display_value, self.symbol)
    }
}

/// Rule set governing claims during a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimCondition {
    pub start_time: DateTime<Utc>,
    pub currency: CurrencyValue,
    /// Per-transaction limit enforced by the contract (None = unlimited)
    pub quantity_limit_per_transaction: Option<u64>,
}

impl ClaimCondition {
    pub fn open(currency: CurrencyValue) -> Self {
        Self {
            start_time: Utc::now(),
            currency,
            quantity_limit_per_transaction: None,
        }
    }
}

/// Confirmation data of a mined claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub block_number: u64,
    pub from: String,
    pub to: String,
}

/// Deferred metadata fetch attached to a claim result
pub type MetadataLoader = Arc<dyn Fn() -> BoxFuture<'static, Result<TokenMetadata>> + Send + Sync>;

/// Per-token result of a claim
#[derive(Clone)]
pub struct ClaimResult {
    pub receipt: TransactionReceipt,
    pub token_id: u64,
    loader: MetadataLoader,
}

impl ClaimResult {
    pub fn new(receipt: TransactionReceipt, token_id: u64, loader: MetadataLoader) -> Self {
        Self { receipt, token_id, loader }
    }

    /// Fetch full token metadata (not loaded until asked for)
    pub async fn metadata(&self) -> Result<TokenMetadata> {
        (self.loader)().await
    }
}

impl fmt::Debug for ClaimResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimResult")
            .field("receipt", &self.receipt)
            .field("token_id", &self.token_id)
            .finish_non_exhaustive()
    }
}

/// A drop contract as the storefront sees it
#[async_trait]
pub trait DropContract: Send + Sync {
    /// Contract address
    fn address(&self) -> &str;

    async fn get_claimed_tokens(&self) -> Result<Vec<Token>>;

    async fn get_unclaimed_tokens(&self) -> Result<Vec<Token>>;

    /// Claimed and unclaimed tokens from one contract state. Clients that
    /// can read both sets atomically should override this.
    async fn get_token_sets(&self) -> Result<(Vec<Token>, Vec<Token>)> {
        tokio::try_join!(self.get_claimed_tokens(), self.get_unclaimed_tokens())
    }

    async fn get_active_claim_conditions(&self) -> Result<Vec<ClaimCondition>>;

    /// Claim `quantity` tokens to `to`. The one side-effecting call.
    async fn claim(&self, to: &WalletAddress, quantity: u64) -> Result<Vec<ClaimResult>>;
}

/// Resolves a collection's contract address to a client
pub trait ContractProvider: Send + Sync {
    fn contract_for(&self, address: &str) -> Option<Arc<dyn DropContract>>;
}

/// In-memory provider keyed by lowercase address
#[derive(Default, Clone)]
pub struct DropRegistry {
    drops: HashMap<String, Arc<dyn DropContract>>,
}

impl DropRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build simulated drops from configuration
    pub fn from_config(drops: &[DropConfig]) -> Self {
        let mut registry = Self::new();
        for drop in drops {
            let condition = ClaimCondition::open(CurrencyValue::new(&drop.price, &drop.currency));
            let simulated = SimulatedDrop::new(&drop.address, &drop.name, drop.total_supply, condition)
                .with_claimed(drop.claimed)
                .with_claim_delay(Duration::from_millis(drop.claim_delay_ms));
            registry.register(Arc::new(simulated));
        }
        tracing::info!("Registered {} drop contracts", registry.len());
        registry
    }

    pub fn register(&mut self, contract: Arc<dyn DropContract>) {
        self.drops.insert(contract.address().to_lowercase(), contract);
    }

    pub fn len(&self) -> usize {
        self.drops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drops.is_empty()
    }
}

impl ContractProvider for DropRegistry {
    fn contract_for(&self, address: &str) -> Option<Arc<dyn DropContract>> {
        self.drops.get(&address.to_lowercase()).cloned()
    }
}

/// Ledger behind a simulated drop
struct DropLedger {
    tokens: BTreeMap<u64, Token>,
    conditions: Vec<ClaimCondition>,
    block_number: u64,
    reject_next_claim: bool,
    fail_reads: bool,
    fail_price_reads: bool,
    price_delay: Duration,
}

/// Drop contract simulated in memory
pub struct SimulatedDrop {
    address: String,
    claim_delay: Duration,
    ledger: Mutex<DropLedger>,
}

/// Owner recorded for tokens claimed before the simulation starts
const GENESIS_OWNER: &str = "0x000000000000000000000000000000000000dEaD";

impl SimulatedDrop {
    pub fn new(address: &str, name: &str, total_supply: u64, condition: ClaimCondition) -> Self {
        let tokens = (0..total_supply)
            .map(|id| {
                let token = Token {
                    id,
                    owner: None,
                    metadata: TokenMetadata {
                        name: format!("{} #{}", name, id),
                        description: format!("Token {} of {}", id, name),
                        image: None,
                    },
                };
                (id, token)
            })
            .collect();

        Self {
            address: address.to_string(),
            claim_delay: Duration::ZERO,
            ledger: Mutex::new(DropLedger {
                tokens,
                conditions: vec![condition],
                block_number: 1,
                reject_next_claim: false,
                fail_reads: false,
                fail_price_reads: false,
                price_delay: Duration::ZERO,
            }),
        }
    }

    /// Mark the first `count` tokens as already claimed
    pub fn with_claimed(self, count: u64) -> Self {
        {
            let mut ledger = self.ledger();
            for token in ledger.tokens.values_mut().take(count as usize) {
                token.owner = Some(GENESIS_OWNER.to_string());
            }
        }
        self
    }

    /// Time a claim takes to "mine"
    pub fn with_claim_delay(mut self, delay: Duration) -> Self {
        self.claim_delay = delay;
        self
    }

    /// Replace the active claim conditions
    pub fn set_conditions(&self, conditions: Vec<ClaimCondition>) {
        self.ledger().conditions = conditions;
    }

    /// The next claim fails as if the wallet rejected it
    pub fn reject_next_claim(&self) {
        self.ledger().reject_next_claim = true;
    }

    /// Make every read fail until cleared
    pub fn set_fail_reads(&self, fail: bool) {
        self.ledger().fail_reads = fail;
    }

    /// Make claim-condition reads fail until cleared; token reads still work
    pub fn set_fail_price_reads(&self, fail: bool) {
        self.ledger().fail_price_reads = fail;
    }

    /// Stall claim-condition reads
    pub fn set_price_delay(&self, delay: Duration) {
        self.ledger().price_delay = delay;
    }

    pub fn claimed_count(&self) -> usize {
        self.ledger().tokens.values().filter(|t| t.owner.is_some()).count()
    }

    fn ledger(&self) -> MutexGuard<'_, DropLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_tokens(&self, claimed: bool) -> Result<Vec<Token>> {
        let ledger = self.ledger();
        self.check_reads(&ledger)?;
        Ok(Self::tokens_where(&ledger, claimed))
    }

    fn check_reads(&self, ledger: &DropLedger) -> Result<()> {
        if ledger.fail_reads {
            return Err(Error::ContractRead(format!("{}: RPC unavailable", self.address)));
        }
        Ok(())
    }

    fn tokens_where(ledger: &DropLedger, claimed: bool) -> Vec<Token> {
        ledger
            .tokens
            .values()
            .filter(|t| t.owner.is_some() == claimed)
            .cloned()
            .collect()
    }

    fn receipt(&self, to: &WalletAddress, token_id: u64, block_number: u64) -> TransactionReceipt {
        let mut hasher = Sha256::new();
        hasher.update(b"grevzi-claim:");
        hasher.update(self.address.as_bytes());
        hasher.update(to.as_str().as_bytes());
        hasher.update(token_id.to_le_bytes());
        hasher.update(block_number.to_le_bytes());

        TransactionReceipt {
            transaction_hash: format!("0x{}", hex::encode(hasher.finalize())),
            block_number,
            from: to.to_string(),
            to: self.address.clone(),
        }
    }
}

#[async_trait]
impl DropContract for SimulatedDrop {
    fn address(&self) -> &str {
        &self.address
    }

    async fn get_claimed_tokens(&self) -> Result<Vec<Token>> {
        self.read_tokens(true)
    }

    async fn get_unclaimed_tokens(&self) -> Result<Vec<Token>> {
        self.read_tokens(false)
    }

    async fn get_token_sets(&self) -> Result<(Vec<Token>, Vec<Token>)> {
        let ledger = self.ledger();
        self.check_reads(&ledger)?;
        Ok((Self::tokens_where(&ledger, true), Self::tokens_where(&ledger, false)))
    }

    async fn get_active_claim_conditions(&self) -> Result<Vec<ClaimCondition>> {
        let delay = self.ledger().price_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let ledger = self.ledger();
        self.check_reads(&ledger)?;
        if ledger.fail_price_reads {
            return Err(Error::ContractRead(format!("{}: claim conditions unavailable", self.address)));
        }
        let now = Utc::now();
        Ok(ledger
            .conditions
            .iter()
            .filter(|c| c.start_time <= now)
            .cloned()
            .collect())
    }

    async fn claim(&self, to: &WalletAddress, quantity: u64) -> Result<Vec<ClaimResult>> {
        if !self.claim_delay.is_zero() {
            tokio::time::sleep(self.claim_delay).await;
        }

        let mut ledger = self.ledger();

        if std::mem::take(&mut ledger.reject_next_claim) {
            return Err(Error::ClaimFailed("user rejected transaction".into()));
        }
        if quantity == 0 {
            return Err(Error::ClaimFailed("quantity must be at least 1".into()));
        }

        let now = Utc::now();
        let condition = ledger
            .conditions
            .iter()
            .find(|c| c.start_time <= now)
            .cloned()
            .ok_or_else(|| Error::ClaimFailed("no active claim condition".into()))?;
        if let Some(limit) = condition.quantity_limit_per_transaction {
            if quantity > limit {
                return Err(Error::ClaimFailed(format!("quantity {} exceeds limit {}", quantity, limit)));
            }
        }

        let ids: Vec<u64> = ledger
            .tokens
            .values()
            .filter(|t| t.owner.is_none())
            .map(|t| t.id)
            .take(quantity as usize)
            .collect();
        if (ids.len() as u64) < quantity {
            return Err(Error::SoldOut);
        }

        ledger.block_number += 1;
        let block_number = ledger.block_number;

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let metadata = match ledger.tokens.get_mut(&id) {
                Some(token) => {
                    token.owner = Some(to.to_string());
                    token.metadata.clone()
                }
                None => continue,
            };
            let loader: MetadataLoader = Arc::new(move || {
                let metadata = metadata.clone();
                Box::pin(async move { Ok(metadata) })
            });
            results.push(ClaimResult::new(self.receipt(to, id, block_number), id, loader));
        }

        tracing::info!(
            "Claimed {} token(s) from {} to {} in block {}",
            results.len(),
            self.address,
            to.short(),
            block_number
        );
        Ok(results)
    }
}
