//! RocksDB backend.
//!
//! Key layout (player scopes are length-prefixed so ids cannot collide):
//!
//! | key | value |
//! |---|---|
//! | `round:id:<round_id>` | round JSON |
//! | `round:active:<player>` | ACTIVE round id |
//! | `round:player:<len>:<player>:<inv_seq>` | round id, newest first |
//! | `round:seq:<player>` | rounds created (u64 BE) |
//! | `ledger:balance:<player>` | cents (u64 BE) |
//! | `ledger:tx:<len>:<player>:<inv_seq>` | entry JSON, newest first |
//! | `ledger:seq:<player>` | entries written (u64 BE) |
//!
//! Commits are serialised by a process-wide lock and written as one
//! `WriteBatch`, so readers never observe a round without its ledger row.

use super::{
    build_entry, check_commit, deposit_entry, validate_deposit, CommitReceipt, RoundCommit, RoundStore, WagerLedger,
};
use crate::errors::{EngineError, EngineResult};
use crate::games::round::Round;
use crate::games::types::{Amount, LedgerEntry};
use crate::storage::OptimizedStorage;
use rocksdb::WriteBatch;
use std::path::Path;
use std::sync::Mutex;

const ROUND_PREFIX: &str = "round:id:";
const ACTIVE_PREFIX: &str = "round:active:";
const HISTORY_PREFIX: &str = "round:player:";
const ROUND_SEQ_PREFIX: &str = "round:seq:";
const BALANCE_PREFIX: &str = "ledger:balance:";
const TX_PREFIX: &str = "ledger:tx:";
const TX_SEQ_PREFIX: &str = "ledger:seq:";

fn round_key(round_id: &str) -> Vec<u8> {
    format!("{}{}", ROUND_PREFIX, round_id).into_bytes()
}

fn active_key(player_id: &str) -> Vec<u8> {
    format!("{}{}", ACTIVE_PREFIX, player_id).into_bytes()
}

fn balance_key(player_id: &str) -> Vec<u8> {
    format!("{}{}", BALANCE_PREFIX, player_id).into_bytes()
}

fn sequence_key(prefix: &str, player_id: &str) -> Vec<u8> {
    format!("{}{}", prefix, player_id).into_bytes()
}

/// `prefix<len>:<player>:`
pub(crate) fn player_scope(prefix: &str, player_id: &str) -> Vec<u8> {
    format!("{}{}:{}:", prefix, player_id.len(), player_id).into_bytes()
}

/// Newest-first index key: inverted sequence sorts later writes first
fn indexed_key(prefix: &str, player_id: &str, sequence: u64) -> Vec<u8> {
    let mut key = player_scope(prefix, player_id);
    key.extend_from_slice(&(u64::MAX - sequence).to_be_bytes());
    key
}

fn decode_u64(bytes: &[u8], what: &str) -> EngineResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| EngineError::persistence(format!("corrupted {}: {} bytes", what, bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

pub struct RocksRoundStore {
    storage: OptimizedStorage,
    commit_lock: Mutex<()>,
}

impl RocksRoundStore {
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        Ok(Self::with_storage(OptimizedStorage::new(path)?))
    }

    /// Wipe any existing data first (testing only!)
    pub fn open_cleared<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        Ok(Self::with_storage(OptimizedStorage::new_cleared(path)?))
    }

    pub fn with_storage(storage: OptimizedStorage) -> Self {
        Self {
            storage,
            commit_lock: Mutex::new(()),
        }
    }

    fn read_sequence(&self, prefix: &str, player_id: &str) -> EngineResult<u64> {
        match self.storage.get(&sequence_key(prefix, player_id))? {
            Some(bytes) => decode_u64(&bytes, "sequence"),
            None => Ok(0),
        }
    }

    fn read_balance(&self, player_id: &str) -> EngineResult<Amount> {
        match self.storage.get(&balance_key(player_id))? {
            Some(bytes) => Ok(Amount::from_cents(decode_u64(&bytes, "balance")?)),
            None => Ok(Amount::ZERO),
        }
    }

    fn read_active_id(&self, player_id: &str) -> EngineResult<Option<String>> {
        Ok(self
            .storage
            .get(&active_key(player_id))?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Stage a ledger row and bump the player's entry sequence
    fn stage_entry(&self, batch: &mut WriteBatch, entry: &LedgerEntry) -> EngineResult<()> {
        let sequence = self.read_sequence(TX_SEQ_PREFIX, &entry.player_id)? + 1;
        batch.put(
            indexed_key(TX_PREFIX, &entry.player_id, sequence),
            serde_json::to_vec(entry)?,
        );
        batch.put(sequence_key(TX_SEQ_PREFIX, &entry.player_id), sequence.to_be_bytes());
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.commit_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RoundStore for RocksRoundStore {
    fn load(&self, round_id: &str) -> EngineResult<Option<Round>> {
        match self.storage.get(&round_key(round_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn active_round(&self, player_id: &str) -> EngineResult<Option<Round>> {
        let Some(round_id) = self.read_active_id(player_id)? else {
            return Ok(None);
        };
        // Index and round are read separately; a round that ended in between is dropped
        Ok(self.load(&round_id)?.filter(Round::is_active))
    }

    fn history(&self, player_id: &str, limit: usize) -> EngineResult<Vec<Round>> {
        let rows = self
            .storage
            .scan_prefix(&player_scope(HISTORY_PREFIX, player_id), limit)?;
        let mut rounds = Vec::with_capacity(rows.len());
        for (_key, value) in rows {
            let round_id = String::from_utf8_lossy(&value);
            match self.load(&round_id)? {
                Some(round) => rounds.push(round),
                None => tracing::warn!(round_id = %round_id, "history index points at a missing round"),
            }
        }
        Ok(rounds)
    }

    fn commit(&self, commit: RoundCommit) -> EngineResult<CommitReceipt> {
        let _guard = self.lock();
        let player_id = commit.round.player_id.clone();
        let round_id = commit.round.id.clone();

        let stored = self.load(&round_id)?;
        let active_id = self.read_active_id(&player_id)?;
        let balance = self.read_balance(&player_id)?;
        let new_balance = check_commit(&commit, stored.as_ref(), active_id.as_deref(), balance)?;
        let entry = build_entry(&commit, new_balance);

        let mut batch = WriteBatch::default();
        batch.put(round_key(&round_id), serde_json::to_vec(&commit.round)?);

        if commit.expected_version.is_none() {
            let sequence = self.read_sequence(ROUND_SEQ_PREFIX, &player_id)? + 1;
            batch.put(indexed_key(HISTORY_PREFIX, &player_id, sequence), round_id.as_bytes());
            batch.put(sequence_key(ROUND_SEQ_PREFIX, &player_id), sequence.to_be_bytes());
        }
        if commit.round.is_active() {
            batch.put(active_key(&player_id), round_id.as_bytes());
        } else if active_id.as_deref() == Some(round_id.as_str()) {
            batch.delete(active_key(&player_id));
        }
        if new_balance != balance {
            batch.put(balance_key(&player_id), new_balance.cents().to_be_bytes());
        }
        if let Some(entry) = &entry {
            self.stage_entry(&mut batch, entry)?;
        }

        self.storage.write(batch)?;
        tracing::debug!(
            round_id = %round_id,
            version = commit.round.version,
            status = %commit.round.status,
            "Round committed"
        );

        Ok(CommitReceipt {
            round: commit.round,
            balance: new_balance,
            entry,
        })
    }
}

impl WagerLedger for RocksRoundStore {
    fn balance(&self, player_id: &str) -> EngineResult<Amount> {
        self.read_balance(player_id)
    }

    fn deposit(&self, player_id: &str, amount: Amount, description: &str) -> EngineResult<LedgerEntry> {
        validate_deposit(player_id, amount)?;
        let _guard = self.lock();
        let balance = self.read_balance(player_id)?;
        let new_balance = balance
            .checked_add(amount)
            .ok_or_else(|| EngineError::persistence(format!("balance overflow for {}", player_id)))?;
        let entry = deposit_entry(player_id, amount, new_balance, description);

        let mut batch = WriteBatch::default();
        batch.put(balance_key(player_id), new_balance.cents().to_be_bytes());
        self.stage_entry(&mut batch, &entry)?;
        self.storage.write(batch)?;
        Ok(entry)
    }

    fn transactions(&self, player_id: &str, limit: usize) -> EngineResult<Vec<LedgerEntry>> {
        let rows = self.storage.scan_prefix(&player_scope(TX_PREFIX, player_id), limit)?;
        rows.into_iter()
            .map(|(_key, value)| serde_json::from_slice(&value).map_err(EngineError::from))
            .collect()
    }
}
