//! Round engine: the four player operations plus ledger queries.
//!
//! Every mutating operation follows the same shape: load the current round
//! version, derive the next one with the pure transitions in
//! [`crate::games::round`], then commit it with the expected version. A
//! failed check leaves storage untouched; a version mismatch surfaces as a
//! conflict and is never retried here.

use crate::config::{EngineConfig, LedgerConfig};
use crate::errors::{EngineError, EngineResult, StateError};
use crate::games::{
    multiplier::MultiplierPolicy,
    policy::TerminationPolicy,
    random::RandomSource,
    round::{validate_cell_index, validate_hazard_count, RevealEffect, Round, RoundRules},
    types::{
        Amount, CashOutOutcome, LedgerEntry, PublicRound, RevealOutcome, RoundEnding, RoundStatus, StartRoundOutcome,
        TransactionKind,
    },
};
use crate::metrics::EngineMetrics;
use crate::store::{Backend, BalanceChange, PendingEntry, RoundCommit, RoundStore, WagerLedger};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default page size for history and ledger queries
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Upper bound for history and ledger queries
pub const MAX_QUERY_LIMIT: usize = 500;

pub struct RoundEngine {
    backend: Arc<dyn Backend>,
    random: Arc<dyn RandomSource>,
    multiplier: MultiplierPolicy,
    termination: TerminationPolicy,
    metrics: Arc<EngineMetrics>,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_QUERY_LIMIT).clamp(1, MAX_QUERY_LIMIT)
}

fn require_player(player_id: &str) -> EngineResult<()> {
    if player_id.trim().is_empty() {
        return Err(EngineError::validation("player id must not be empty"));
    }
    Ok(())
}

impl RoundEngine {
    /// Engine with the default multiplier curve and termination rules
    pub fn new(backend: Arc<dyn Backend>, random: Arc<dyn RandomSource>) -> Self {
        Self {
            backend,
            random,
            multiplier: MultiplierPolicy::default(),
            termination: TerminationPolicy::default(),
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    pub fn from_config(config: &EngineConfig, backend: Arc<dyn Backend>, random: Arc<dyn RandomSource>) -> Self {
        Self::new(backend, random)
            .with_multiplier(MultiplierPolicy::new(
                config.game.house_edge,
                config.game.min_step,
                config.game.max_multiplier,
            ))
            .with_termination(TerminationPolicy::from_config(&config.termination))
    }

    pub fn with_multiplier(mut self, multiplier: MultiplierPolicy) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_termination(mut self, termination: TerminationPolicy) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    fn rules(&self) -> RoundRules<'_> {
        RoundRules {
            multiplier: &self.multiplier,
            termination: &self.termination,
            random: self.random.as_ref(),
        }
    }

    /// Count and log failures that happen after validation passed
    fn observe<T>(&self, operation: &'static str, round_id: &str, result: EngineResult<T>) -> EngineResult<T> {
        if let Err(err) = &result {
            match err {
                EngineError::Persistence(msg) => {
                    self.metrics.record_persistence_failure();
                    error!(operation, round_id = %round_id, error = %msg, "Commit failed; round state unknown");
                }
                err if err.is_conflict() => {
                    self.metrics.record_conflict();
                    warn!(operation, round_id = %round_id, "Concurrent modification rejected");
                }
                _ => {}
            }
        }
        result
    }

    fn load_owned(&self, player_id: &str, round_id: &str) -> EngineResult<Round> {
        let round = self
            .backend
            .load(round_id)?
            .ok_or_else(|| StateError::RoundNotFound(round_id.to_string()))?;
        round.ensure_playable(player_id)?;
        Ok(round)
    }

    /// Debit the stake and open a round with freshly placed hazards
    pub fn start_round(&self, player_id: &str, bet_amount: Amount, hazard_count: u32) -> EngineResult<StartRoundOutcome> {
        require_player(player_id)?;
        if bet_amount.is_zero() {
            return Err(EngineError::validation("bet amount must be positive"));
        }
        let hazard_count = validate_hazard_count(hazard_count)?;

        if let Some(active) = self.backend.active_round(player_id)? {
            return Err(StateError::ActiveRoundExists {
                player_id: player_id.to_string(),
                round_id: active.id,
            }
            .into());
        }
        let available = self.backend.balance(player_id)?;
        if available < bet_amount {
            return Err(EngineError::Funds {
                available,
                required: bet_amount,
            });
        }

        let round = Round::open(
            Uuid::new_v4().to_string(),
            player_id.to_string(),
            bet_amount,
            hazard_count,
            &self.rules(),
            now_millis(),
        )?;
        let round_id = round.id.clone();

        let receipt = self.observe(
            "start_round",
            &round_id,
            self.backend.commit(RoundCommit {
                round,
                expected_version: None,
                balance_change: BalanceChange::Debit(bet_amount),
                entry: Some(PendingEntry {
                    kind: TransactionKind::Bet,
                    amount: bet_amount,
                    description: format!("mines bet ({} hazards)", hazard_count),
                }),
            }),
        )?;

        self.metrics.record_round_started(bet_amount);
        info!(
            round_id = %round_id,
            player = %player_id,
            bet = %bet_amount,
            hazards = hazard_count,
            "Round started"
        );

        Ok(StartRoundOutcome {
            round: receipt.round.to_public(),
            new_balance: receipt.balance,
        })
    }

    /// Open one cell of the player's active round
    pub fn reveal_tile(&self, player_id: &str, round_id: &str, cell_index: u32) -> EngineResult<RevealOutcome> {
        require_player(player_id)?;
        validate_cell_index(cell_index)?;
        let current = self.load_owned(player_id, round_id)?;
        let (next, effect) = current.reveal(cell_index, &self.rules(), now_millis())?;

        let entry = match next.ending {
            Some(RoundEnding::HazardHit { cell }) => Some(PendingEntry {
                kind: TransactionKind::Loss,
                amount: next.bet_amount,
                description: format!("mines loss: hazard at cell {}", cell),
            }),
            Some(RoundEnding::ForcedTermination { .. }) => Some(PendingEntry {
                kind: TransactionKind::Loss,
                amount: next.bet_amount,
                description: "mines loss: forced termination".to_string(),
            }),
            _ => None,
        };

        let receipt = self.observe(
            "reveal_tile",
            round_id,
            self.backend.commit(RoundCommit {
                round: next,
                expected_version: Some(current.version),
                balance_change: BalanceChange::None,
                entry,
            }),
        )?;
        let round = receipt.round;

        match effect {
            RevealEffect::Safe { reshuffles } => {
                self.metrics.record_safe_reveal();
                info!(
                    round_id = %round_id,
                    cell = cell_index,
                    reveals = round.revealed_positions.len(),
                    multiplier = round.current_multiplier,
                    reshuffles,
                    "Safe reveal"
                );
            }
            RevealEffect::HazardHit | RevealEffect::ForcedTermination => {
                let forced = effect == RevealEffect::ForcedTermination;
                self.metrics.record_explosion(forced);
                info!(round_id = %round_id, cell = cell_index, forced, "Round exploded");
            }
        }

        let active = round.is_active();
        Ok(RevealOutcome {
            round_id: round.id.clone(),
            status: round.status,
            current_multiplier: active.then_some(round.current_multiplier),
            potential_payout: active.then_some(round.potential_payout),
            hazard_positions: (!active).then(|| round.hazard_positions.clone()),
            revealed_positions: round.revealed_positions,
            ending: round.ending,
        })
    }

    /// Close the round and credit the locked-in payout
    pub fn cash_out(&self, player_id: &str, round_id: &str) -> EngineResult<CashOutOutcome> {
        require_player(player_id)?;
        let current = self.load_owned(player_id, round_id)?;
        let next = current.cash_out(now_millis())?;
        let payout = current.potential_payout;

        let receipt = self.observe(
            "cash_out",
            round_id,
            self.backend.commit(RoundCommit {
                round: next,
                expected_version: Some(current.version),
                balance_change: BalanceChange::Credit(payout),
                entry: Some(PendingEntry {
                    kind: TransactionKind::Payout,
                    amount: payout,
                    description: format!(
                        "mines payout at {:.4}x after {} reveals",
                        current.current_multiplier,
                        current.revealed_positions.len()
                    ),
                }),
            }),
        )?;

        self.metrics.record_cash_out(payout);
        info!(round_id = %round_id, player = %player_id, payout = %payout, "Round cashed out");

        Ok(CashOutOutcome {
            round_id: receipt.round.id.clone(),
            status: RoundStatus::CashedOut,
            final_payout: payout,
            new_balance: receipt.balance,
            hazard_positions: receipt.round.hazard_positions,
        })
    }

    pub fn get_active_round(&self, player_id: &str) -> EngineResult<Option<PublicRound>> {
        require_player(player_id)?;
        Ok(self.backend.active_round(player_id)?.map(|round| round.to_public()))
    }

    /// Newest first; active rounds stay redacted
    pub fn round_history(&self, player_id: &str, limit: Option<usize>) -> EngineResult<Vec<PublicRound>> {
        require_player(player_id)?;
        Ok(self
            .backend
            .history(player_id, clamp_limit(limit))?
            .iter()
            .map(Round::to_public)
            .collect())
    }

    pub fn balance(&self, player_id: &str) -> EngineResult<Amount> {
        require_player(player_id)?;
        self.backend.balance(player_id)
    }

    pub fn transactions(&self, player_id: &str, limit: Option<usize>) -> EngineResult<Vec<LedgerEntry>> {
        require_player(player_id)?;
        self.backend.transactions(player_id, clamp_limit(limit))
    }

    /// Credit opening balances to players with no ledger history yet.
    /// Returns how many players were funded.
    pub fn seed_balances(&self, ledger: &LedgerConfig) -> EngineResult<usize> {
        let mut funded = 0;
        for (player_id, balance) in &ledger.seed_balances {
            let amount = Amount::from_decimal(*balance)
                .ok_or_else(|| EngineError::validation(format!("invalid seed balance for {}", player_id)))?;
            if amount.is_zero() || !self.backend.transactions(player_id, 1)?.is_empty() {
                continue;
            }
            self.deposit(player_id, amount, "opening balance")?;
            funded += 1;
        }
        Ok(funded)
    }

    pub fn deposit(&self, player_id: &str, amount: Amount, description: &str) -> EngineResult<LedgerEntry> {
        let entry = self.backend.deposit(player_id, amount, description)?;
        info!(player = %player_id, amount = %amount, balance = %entry.balance_after, "Deposit credited");
        Ok(entry)
    }
}
