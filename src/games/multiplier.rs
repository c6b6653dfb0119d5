//! Payout multiplier formula.
//!
//! Each safe reveal multiplies the running multiplier by the inverse of the
//! probability of having drawn a safe cell (without replacement), discounted
//! by the house edge. The result never grows by less than `min_step`.

use super::types::{Amount, GRID_SIZE};

pub const DEFAULT_HOUSE_EDGE: f64 = 0.99;
pub const DEFAULT_MIN_STEP: f64 = 1.01;
pub const DEFAULT_MAX_MULTIPLIER: f64 = 50.0;

/// Absorbs float noise when flooring payouts to whole cents
const PAYOUT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiplierPolicy {
    house_edge: f64,
    min_step: f64,
    ceiling: f64,
}

impl Default for MultiplierPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_HOUSE_EDGE, DEFAULT_MIN_STEP, DEFAULT_MAX_MULTIPLIER)
    }
}

impl MultiplierPolicy {
    pub fn new(house_edge: f64, min_step: f64, ceiling: f64) -> Self {
        Self {
            house_edge,
            min_step,
            ceiling,
        }
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Next multiplier for a grid of `grid_size` cells with `hazard_count`
    /// hazards, given `reveals_before` safe reveals prior to this turn.
    pub fn next(&self, grid_size: u8, hazard_count: u8, reveals_before: usize, current: f64) -> f64 {
        let total = grid_size as i64;
        let remaining_cells = total - reveals_before as i64;
        let remaining_safe = total - hazard_count as i64 - reveals_before as i64;
        if remaining_safe <= 0 {
            return current;
        }

        let step = remaining_cells as f64 / remaining_safe as f64;
        let candidate = current * step * self.house_edge;
        candidate.max(current * self.min_step)
    }

    /// `next` on the standard board, clamped to the ceiling
    pub fn advance(&self, hazard_count: u8, reveals_before: usize, current: f64) -> f64 {
        self.next(GRID_SIZE, hazard_count, reveals_before, current)
            .min(self.ceiling)
    }

    /// `floor(bet * multiplier * 100) / 100`, expressed in cents
    pub fn payout(bet: Amount, multiplier: f64) -> Amount {
        let cents = (bet.cents() as f64 * multiplier + PAYOUT_EPSILON).floor();
        Amount::from_cents(cents.max(0.0) as u64)
    }
}
