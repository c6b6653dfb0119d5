//! Round aggregate and its pure state transitions.
//!
//! A `Round` value is never mutated in place by the engine: every operation
//! derives the next version from the current one, and the store only accepts
//! it if the stored version is still the one it was derived from.

use super::{
    multiplier::MultiplierPolicy,
    policy::{minimum_moves, TerminationPolicy},
    random::RandomSource,
    types::{Amount, PublicRound, RoundEnding, RoundStatus, GRID_SIZE, MAX_HAZARDS, MIN_HAZARDS},
};
use crate::errors::{EngineError, EngineResult, StateError};
use serde::{Deserialize, Serialize};

/// Collaborators a transition needs
#[derive(Clone, Copy)]
pub struct RoundRules<'a> {
    pub multiplier: &'a MultiplierPolicy,
    pub termination: &'a TerminationPolicy,
    pub random: &'a dyn RandomSource,
}

/// What a reveal did to the round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealEffect {
    /// Cell was safe and the round continues
    Safe { reshuffles: u8 },
    /// Cell held a hazard
    HazardHit,
    /// Reveal count reached the hidden forced-loss turn
    ForcedTermination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: String,
    pub player_id: String,
    pub bet_amount: Amount,
    pub hazard_count: u8,
    /// Sorted; never sent to the client while active
    pub hazard_positions: Vec<u8>,
    /// In reveal order
    pub revealed_positions: Vec<u8>,
    /// Hidden reveal count at which the round is ended as a loss
    pub forced_loss_turn: Option<u8>,
    pub current_multiplier: f64,
    pub potential_payout: Amount,
    pub status: RoundStatus,
    #[serde(default)]
    pub ending: Option<RoundEnding>,
    pub version: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

pub fn validate_hazard_count(hazard_count: u32) -> EngineResult<u8> {
    if !(MIN_HAZARDS as u32..=MAX_HAZARDS as u32).contains(&hazard_count) {
        return Err(EngineError::validation(format!(
            "hazard count must be between {} and {}, got {}",
            MIN_HAZARDS, MAX_HAZARDS, hazard_count
        )));
    }
    Ok(hazard_count as u8)
}

pub fn validate_cell_index(cell_index: u32) -> EngineResult<u8> {
    if cell_index >= GRID_SIZE as u32 {
        return Err(EngineError::validation(format!(
            "cell index must be between 0 and {}, got {}",
            GRID_SIZE - 1,
            cell_index
        )));
    }
    Ok(cell_index as u8)
}

/// Place `count` hazards among `candidates`, returned sorted
fn place_hazards(random: &dyn RandomSource, candidates: &[u8], count: u8) -> EngineResult<Vec<u8>> {
    let mut positions = random.sample_distinct(candidates, count as usize);
    if positions.len() != count as usize {
        return Err(EngineError::persistence(format!(
            "cannot place {} hazards among {} candidate cells",
            count,
            candidates.len()
        )));
    }
    positions.sort_unstable();
    Ok(positions)
}

impl Round {
    /// Build a fresh active round. Hazards are sampled over the whole board.
    pub fn open(
        id: String,
        player_id: String,
        bet_amount: Amount,
        hazard_count: u8,
        rules: &RoundRules<'_>,
        now: i64,
    ) -> EngineResult<Self> {
        if bet_amount.is_zero() {
            return Err(EngineError::validation("bet amount must be positive"));
        }
        validate_hazard_count(hazard_count as u32)?;

        let board: Vec<u8> = (0..GRID_SIZE).collect();
        let hazard_positions = place_hazards(rules.random, &board, hazard_count)?;
        let forced_loss_turn = rules.termination.draw_forced_loss_turn(rules.random);

        Ok(Self {
            id,
            player_id,
            bet_amount,
            hazard_count,
            hazard_positions,
            revealed_positions: Vec::new(),
            forced_loss_turn,
            current_multiplier: 1.0,
            potential_payout: bet_amount,
            status: RoundStatus::Active,
            ending: None,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == RoundStatus::Active
    }

    /// Ownership and status checks shared by reveal and cash-out
    pub fn ensure_playable(&self, player_id: &str) -> EngineResult<()> {
        if self.player_id != player_id {
            return Err(StateError::NotOwner {
                round_id: self.id.clone(),
                player_id: player_id.to_string(),
            }
            .into());
        }
        self.ensure_active()
    }

    fn ensure_active(&self) -> EngineResult<()> {
        if !self.is_active() {
            return Err(StateError::NotActive {
                round_id: self.id.clone(),
                status: self.status,
            }
            .into());
        }
        Ok(())
    }

    /// Open `cell` and derive the next version of the round
    pub fn reveal(&self, cell_index: u32, rules: &RoundRules<'_>, now: i64) -> EngineResult<(Round, RevealEffect)> {
        self.ensure_active()?;
        let cell = validate_cell_index(cell_index)?;
        if self.revealed_positions.contains(&cell) {
            return Err(EngineError::validation(format!("cell {} is already revealed", cell)));
        }

        let mut next = self.successor(now);

        if self.hazard_positions.contains(&cell) {
            next.explode(RoundEnding::HazardHit { cell });
            return Ok((next, RevealEffect::HazardHit));
        }

        let reveals_before = next.revealed_positions.len();
        next.revealed_positions.push(cell);
        next.current_multiplier = rules
            .multiplier
            .advance(self.hazard_count, reveals_before, self.current_multiplier);
        next.potential_payout = MultiplierPolicy::payout(self.bet_amount, next.current_multiplier);

        if rules
            .termination
            .is_forced_termination(self.forced_loss_turn, next.revealed_positions.len())
        {
            next.explode(RoundEnding::ForcedTermination { cell });
            return Ok((next, RevealEffect::ForcedTermination));
        }

        let passes = rules.termination.draw_reshuffle_passes(rules.random);
        if passes > 0 {
            let unrevealed: Vec<u8> = (0..GRID_SIZE)
                .filter(|c| !next.revealed_positions.contains(c))
                .collect();
            for _ in 0..passes {
                next.hazard_positions = place_hazards(rules.random, &unrevealed, self.hazard_count)?;
            }
        }

        Ok((next, RevealEffect::Safe { reshuffles: passes }))
    }

    /// Close the round and lock in the current payout
    pub fn cash_out(&self, now: i64) -> EngineResult<Round> {
        self.ensure_active()?;

        let required = minimum_moves(self.hazard_count);
        let current = self.revealed_positions.len();
        if current < required {
            return Err(EngineError::Policy { current, required });
        }

        let mut next = self.successor(now);
        next.status = RoundStatus::CashedOut;
        next.ending = Some(RoundEnding::CashedOut {
            payout: self.potential_payout,
        });
        Ok(next)
    }

    /// Client view; hazards are withheld while the round is active
    pub fn to_public(&self) -> PublicRound {
        PublicRound {
            round_id: self.id.clone(),
            player_id: self.player_id.clone(),
            bet_amount: self.bet_amount,
            hazard_count: self.hazard_count,
            revealed_positions: self.revealed_positions.clone(),
            current_multiplier: self.current_multiplier,
            potential_payout: self.potential_payout,
            status: self.status,
            hazard_positions: self.status.is_terminal().then(|| self.hazard_positions.clone()),
            ending: self.ending,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn successor(&self, now: i64) -> Round {
        let mut next = self.clone();
        next.version += 1;
        next.updated_at = now;
        next
    }

    fn explode(&mut self, ending: RoundEnding) {
        self.status = RoundStatus::Exploded;
        self.potential_payout = Amount::ZERO;
        self.ending = Some(ending);
    }
}
