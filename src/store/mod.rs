//! Round persistence and the wagering ledger.
//!
//! A transition is committed as one `RoundCommit`: the new round version,
//! the balance movement and the ledger row land together or not at all.
//! Both backends enforce the same checks through [`check_commit`].

pub mod memory;
pub mod rocks;

pub use memory::MemoryRoundStore;
pub use rocks::RocksRoundStore;

use crate::errors::{EngineError, EngineResult, StateError};
use crate::games::round::Round;
use crate::games::types::{Amount, LedgerEntry, TransactionKind};
use uuid::Uuid;

/// Balance movement applied with a round transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceChange {
    None,
    Debit(Amount),
    Credit(Amount),
}

/// Ledger row to append; id, balance and timestamp are filled in on commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub kind: TransactionKind,
    pub amount: Amount,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct RoundCommit {
    pub round: Round,
    /// `None` inserts a new round; `Some(v)` requires the stored version to be `v`
    pub expected_version: Option<u64>,
    pub balance_change: BalanceChange,
    pub entry: Option<PendingEntry>,
}

/// What the store actually wrote
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    pub round: Round,
    pub balance: Amount,
    pub entry: Option<LedgerEntry>,
}

pub trait RoundStore: Send + Sync {
    fn load(&self, round_id: &str) -> EngineResult<Option<Round>>;

    /// The player's single ACTIVE round, if any
    fn active_round(&self, player_id: &str) -> EngineResult<Option<Round>>;

    /// Newest first
    fn history(&self, player_id: &str, limit: usize) -> EngineResult<Vec<Round>>;

    /// Compare-and-swap the round and apply its ledger effects atomically
    fn commit(&self, commit: RoundCommit) -> EngineResult<CommitReceipt>;
}

pub trait WagerLedger: Send + Sync {
    /// Zero for unknown players
    fn balance(&self, player_id: &str) -> EngineResult<Amount>;

    /// Credit outside of a round
    fn deposit(&self, player_id: &str, amount: Amount, description: &str) -> EngineResult<LedgerEntry>;

    /// Newest first
    fn transactions(&self, player_id: &str, limit: usize) -> EngineResult<Vec<LedgerEntry>>;
}

/// A store that is also the ledger, so commits can span both
pub trait Backend: RoundStore + WagerLedger {}

impl<T: RoundStore + WagerLedger> Backend for T {}

/// Validate `commit` against current stored state and return the balance
/// after it is applied. Nothing is written here.
pub(crate) fn check_commit(
    commit: &RoundCommit,
    stored: Option<&Round>,
    active_round_id: Option<&str>,
    balance: Amount,
) -> EngineResult<Amount> {
    let round = &commit.round;

    match (commit.expected_version, stored) {
        (None, Some(existing)) => {
            return Err(StateError::Conflict {
                round_id: round.id.clone(),
                expected: 0,
                found: existing.version,
            }
            .into());
        }
        (None, None) => {
            if let Some(active_id) = active_round_id {
                return Err(StateError::ActiveRoundExists {
                    player_id: round.player_id.clone(),
                    round_id: active_id.to_string(),
                }
                .into());
            }
        }
        (Some(_), None) => return Err(StateError::RoundNotFound(round.id.clone()).into()),
        (Some(expected), Some(existing)) => {
            if existing.version != expected {
                return Err(StateError::Conflict {
                    round_id: round.id.clone(),
                    expected,
                    found: existing.version,
                }
                .into());
            }
            if existing.player_id != round.player_id {
                return Err(StateError::NotOwner {
                    round_id: round.id.clone(),
                    player_id: round.player_id.clone(),
                }
                .into());
            }
        }
    }

    let next_version = commit.expected_version.map_or(1, |v| v + 1);
    if round.version != next_version {
        return Err(EngineError::persistence(format!(
            "round {} carries version {}, expected {}",
            round.id, round.version, next_version
        )));
    }

    match commit.balance_change {
        BalanceChange::None => Ok(balance),
        BalanceChange::Debit(amount) => balance.checked_sub(amount).ok_or(EngineError::Funds {
            available: balance,
            required: amount,
        }),
        BalanceChange::Credit(amount) => balance
            .checked_add(amount)
            .ok_or_else(|| EngineError::persistence(format!("balance overflow for {}", round.player_id))),
    }
}

/// Materialise the ledger row for a validated commit
pub(crate) fn build_entry(commit: &RoundCommit, balance_after: Amount) -> Option<LedgerEntry> {
    commit.entry.as_ref().map(|pending| LedgerEntry {
        id: Uuid::new_v4().to_string(),
        player_id: commit.round.player_id.clone(),
        round_id: Some(commit.round.id.clone()),
        kind: pending.kind,
        amount: pending.amount,
        balance_after,
        description: pending.description.clone(),
        timestamp: commit.round.updated_at,
    })
}

pub(crate) fn deposit_entry(player_id: &str, amount: Amount, balance_after: Amount, description: &str) -> LedgerEntry {
    LedgerEntry {
        id: Uuid::new_v4().to_string(),
        player_id: player_id.to_string(),
        round_id: None,
        kind: TransactionKind::Deposit,
        amount,
        balance_after,
        description: description.to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
    }
}

pub(crate) fn validate_deposit(player_id: &str, amount: Amount) -> EngineResult<()> {
    if player_id.trim().is_empty() {
        return Err(EngineError::validation("player id must not be empty"));
    }
    if amount.is_zero() {
        return Err(EngineError::validation("deposit amount must be positive"));
    }
    Ok(())
}
