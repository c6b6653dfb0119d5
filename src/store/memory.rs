//! In-process backend. One mutex guards rounds and balances together, so a
//! commit is atomic with respect to every other operation.

use super::{
    build_entry, check_commit, deposit_entry, validate_deposit, CommitReceipt, RoundCommit, RoundStore, WagerLedger,
};
use crate::errors::{EngineError, EngineResult};
use crate::games::round::Round;
use crate::games::types::{Amount, LedgerEntry};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    rounds: HashMap<String, Round>,
    /// player -> ACTIVE round id
    active: HashMap<String, String>,
    /// player -> round ids in creation order
    history: HashMap<String, Vec<String>>,
    balances: HashMap<String, Amount>,
    /// player -> entries in append order
    entries: HashMap<String, Vec<LedgerEntry>>,
}

#[derive(Default)]
pub struct MemoryRoundStore {
    state: Mutex<MemoryState>,
}

impl MemoryRoundStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RoundStore for MemoryRoundStore {
    fn load(&self, round_id: &str) -> EngineResult<Option<Round>> {
        Ok(self.lock().rounds.get(round_id).cloned())
    }

    fn active_round(&self, player_id: &str) -> EngineResult<Option<Round>> {
        let state = self.lock();
        Ok(state
            .active
            .get(player_id)
            .and_then(|id| state.rounds.get(id))
            .cloned())
    }

    fn history(&self, player_id: &str, limit: usize) -> EngineResult<Vec<Round>> {
        let state = self.lock();
        let Some(ids) = state.history.get(player_id) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| state.rounds.get(id).cloned())
            .collect())
    }

    fn commit(&self, commit: RoundCommit) -> EngineResult<CommitReceipt> {
        let mut state = self.lock();
        let player_id = commit.round.player_id.clone();
        let round_id = commit.round.id.clone();

        let balance = state.balances.get(&player_id).copied().unwrap_or(Amount::ZERO);
        let new_balance = check_commit(
            &commit,
            state.rounds.get(&round_id),
            state.active.get(&player_id).map(String::as_str),
            balance,
        )?;
        let entry = build_entry(&commit, new_balance);

        if commit.expected_version.is_none() {
            state.history.entry(player_id.clone()).or_default().push(round_id.clone());
        }
        if commit.round.is_active() {
            state.active.insert(player_id.clone(), round_id.clone());
        } else if state.active.get(&player_id) == Some(&round_id) {
            state.active.remove(&player_id);
        }
        state.balances.insert(player_id.clone(), new_balance);
        if let Some(entry) = &entry {
            state.entries.entry(player_id).or_default().push(entry.clone());
        }
        state.rounds.insert(round_id, commit.round.clone());

        Ok(CommitReceipt {
            round: commit.round,
            balance: new_balance,
            entry,
        })
    }
}

impl WagerLedger for MemoryRoundStore {
    fn balance(&self, player_id: &str) -> EngineResult<Amount> {
        Ok(self.lock().balances.get(player_id).copied().unwrap_or(Amount::ZERO))
    }

    fn deposit(&self, player_id: &str, amount: Amount, description: &str) -> EngineResult<LedgerEntry> {
        validate_deposit(player_id, amount)?;
        let mut state = self.lock();
        let balance = state.balances.get(player_id).copied().unwrap_or(Amount::ZERO);
        let new_balance = balance
            .checked_add(amount)
            .ok_or_else(|| EngineError::persistence(format!("balance overflow for {}", player_id)))?;
        let entry = deposit_entry(player_id, amount, new_balance, description);
        state.balances.insert(player_id.to_string(), new_balance);
        state
            .entries
            .entry(player_id.to_string())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    fn transactions(&self, player_id: &str, limit: usize) -> EngineResult<Vec<LedgerEntry>> {
        let state = self.lock();
        Ok(state
            .entries
            .get(player_id)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
