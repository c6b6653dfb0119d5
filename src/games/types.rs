use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of cells on the 5x5 board
pub const GRID_SIZE: u8 = 25;

/// Smallest hazard count a round may be started with
pub const MIN_HAZARDS: u8 = 1;

/// Largest hazard count a round may be started with (one safe cell left)
pub const MAX_HAZARDS: u8 = GRID_SIZE - 1;

/// Money in minor units (cents). All balances, bets and payouts use two decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Parse a decimal amount such as `12.5`. Rejects NaN, negatives and
    /// values with more than two decimal places.
    pub fn from_decimal(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let scaled = value * 100.0;
        let cents = scaled.round();
        if (scaled - cents).abs() > 1e-6 || cents >= u64::MAX as f64 {
            return None;
        }
        Some(Self(cents as u64))
    }

    pub fn to_decimal(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{}.{:02}", self.0 / 100, self.0 % 100))
    }
}

/// Round lifecycle status. `Exploded` and `CashedOut` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    Active,
    Exploded,
    CashedOut,
}

impl RoundStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RoundStatus::Active)
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundStatus::Active => write!(f, "ACTIVE"),
            RoundStatus::Exploded => write!(f, "EXPLODED"),
            RoundStatus::CashedOut => write!(f, "CASHED_OUT"),
        }
    }
}

/// Why a round left the active state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RoundEnding {
    /// The opened cell held a hazard
    HazardHit { cell: u8 },
    /// The reveal count reached the hidden forced-loss turn
    ForcedTermination { cell: u8 },
    /// The player collected the payout
    CashedOut { payout: Amount },
}

/// Client-facing view of a round. Hazard positions are only populated once
/// the round is terminal; the forced-loss turn is never included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicRound {
    pub round_id: String,
    pub player_id: String,
    pub bet_amount: Amount,
    pub hazard_count: u8,
    pub revealed_positions: Vec<u8>,
    pub current_multiplier: f64,
    pub potential_payout: Amount,
    pub status: RoundStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hazard_positions: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ending: Option<RoundEnding>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Ledger entry kinds written by the engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Stake debited at round start
    Bet,
    /// Round lost; no balance movement
    Loss,
    /// Cash-out credited
    Payout,
    /// Operator credit outside of a round
    Deposit,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Bet => write!(f, "bet"),
            TransactionKind::Loss => write!(f, "loss"),
            TransactionKind::Payout => write!(f, "payout"),
            TransactionKind::Deposit => write!(f, "deposit"),
        }
    }
}

/// Append-only transaction log row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub id: String,
    pub player_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_id: Option<String>,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub balance_after: Amount,
    pub description: String,
    pub timestamp: i64,
}

/// Result of a successful `start_round`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRoundOutcome {
    pub round: PublicRound,
    pub new_balance: Amount,
}

/// Result of a successful `reveal_tile`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealOutcome {
    pub round_id: String,
    pub status: RoundStatus,
    pub current_multiplier: Option<f64>,
    pub potential_payout: Option<Amount>,
    pub revealed_positions: Vec<u8>,
    pub hazard_positions: Option<Vec<u8>>,
    pub ending: Option<RoundEnding>,
}

/// Result of a successful `cash_out`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashOutOutcome {
    pub round_id: String,
    pub status: RoundStatus,
    pub final_payout: Amount,
    pub new_balance: Amount,
    pub hazard_positions: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_from_decimal() {
        assert_eq!(Amount::from_decimal(100.0), Some(Amount::from_cents(10_000)));
        assert_eq!(Amount::from_decimal(0.1), Some(Amount::from_cents(10)));
        assert_eq!(Amount::from_decimal(12.34), Some(Amount::from_cents(1_234)));
        assert_eq!(Amount::from_decimal(1.005), None);
        assert_eq!(Amount::from_decimal(-1.0), None);
        assert_eq!(Amount::from_decimal(f64::NAN), None);
    }

    #[test]
    fn test_amount_from_decimal_rejects_overflow() {
        // Scales to exactly 2^64 cents, one past u64::MAX
        assert_eq!(Amount::from_decimal(u64::MAX as f64 / 100.0), None);
        assert_eq!(Amount::from_decimal(1e18), None);
    }

    #[test]
    fn test_amount_display() {
        assert_eq!(Amount::from_cents(11_250).to_string(), "112.50");
        assert_eq!(Amount::from_cents(7).to_string(), "0.07");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
        assert_eq!(format!("{:>7}", Amount::from_cents(150)), "   1.50");
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&RoundStatus::CashedOut).unwrap();
        assert_eq!(json, "\"CASHED_OUT\"");
        assert!(RoundStatus::Exploded.is_terminal());
        assert!(!RoundStatus::Active.is_terminal());
    }

    #[test]
    fn test_ending_is_tagged() {
        let json = serde_json::to_value(RoundEnding::ForcedTermination { cell: 7 }).unwrap();
        assert_eq!(json["reason"], "forced_termination");
        assert_eq!(json["cell"], 7);
    }
}
