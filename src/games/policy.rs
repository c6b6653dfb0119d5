//! Round termination rules: the hidden forced-loss turn, the hazard
//! reshuffle after each surviving reveal, and the cash-out minimums.
//!
//! These rules are deliberately kept apart from the multiplier math so they
//! can be configured and tested on their own. Defaults reproduce the live
//! game: a forced loss on reveal 2, 3 or 4 and 2 to 4 full hazard
//! re-placements after every safe reveal.

use super::random::RandomSource;
use crate::config::TerminationConfig;

/// Inclusive range drawn uniformly by the random source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRange {
    pub low: u8,
    pub high: u8,
}

impl DrawRange {
    pub const fn new(low: u8, high: u8) -> Self {
        Self { low, high }
    }

    pub fn draw(&self, random: &dyn RandomSource) -> u8 {
        random.uniform_inclusive(self.low, self.high)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationPolicy {
    /// `None` disables forced termination
    forced_loss_turns: Option<DrawRange>,
    /// `None` disables reshuffling
    reshuffle_passes: Option<DrawRange>,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            forced_loss_turns: Some(DrawRange::new(2, 4)),
            reshuffle_passes: Some(DrawRange::new(2, 4)),
        }
    }
}

impl TerminationPolicy {
    pub fn new(forced_loss_turns: Option<DrawRange>, reshuffle_passes: Option<DrawRange>) -> Self {
        Self {
            forced_loss_turns,
            reshuffle_passes,
        }
    }

    /// Neither rule applied; rounds end only on a hazard or a cash-out
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    pub fn from_config(config: &TerminationConfig) -> Self {
        let forced = config
            .forced_loss_enabled
            .then(|| DrawRange::new(config.forced_loss_min_turn, config.forced_loss_max_turn));
        let reshuffle = config
            .reshuffle_enabled
            .then(|| DrawRange::new(config.reshuffle_min_passes, config.reshuffle_max_passes));
        Self::new(forced, reshuffle)
    }

    /// Pick the hidden turn at round start
    pub fn draw_forced_loss_turn(&self, random: &dyn RandomSource) -> Option<u8> {
        self.forced_loss_turns.map(|range| range.draw(random))
    }

    /// Number of hazard re-placements after a surviving reveal
    pub fn draw_reshuffle_passes(&self, random: &dyn RandomSource) -> u8 {
        self.reshuffle_passes.map_or(0, |range| range.draw(random))
    }

    pub fn is_forced_termination(&self, forced_loss_turn: Option<u8>, reveals: usize) -> bool {
        forced_loss_turn.map_or(false, |turn| reveals >= turn as usize)
    }
}

/// Safe reveals required before a cash-out is accepted
pub fn minimum_moves(hazard_count: u8) -> usize {
    match hazard_count {
        0..=5 => 3,
        6..=15 => 2,
        _ => 1,
    }
}
