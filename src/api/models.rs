//! API request and response models.
//!
//! Money crosses the wire as decimal numbers with two places; the engine's
//! cent amounts are converted here and nowhere else.

use crate::games::types::{
    Amount, CashOutOutcome, LedgerEntry, PublicRound, RevealOutcome, RoundEnding, RoundStatus, StartRoundOutcome,
    TransactionKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn decimal(amount: Amount) -> f64 {
    amount.to_decimal()
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

/// POST /api/mines/start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRoundRequest {
    pub player_id: String,
    pub bet_amount: f64,
    pub hazard_count: i64,
}

/// POST /api/mines/reveal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealRequest {
    pub player_id: String,
    pub round_id: String,
    pub cell_index: i64,
}

/// POST /api/mines/cashout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashOutRequest {
    pub player_id: String,
    pub round_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Why a round ended, with money in decimal units
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndingView {
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<f64>,
}

impl From<RoundEnding> for EndingView {
    fn from(ending: RoundEnding) -> Self {
        match ending {
            RoundEnding::HazardHit { cell } => Self {
                reason: "hazard_hit".to_string(),
                cell: Some(cell),
                payout: None,
            },
            RoundEnding::ForcedTermination { cell } => Self {
                reason: "forced_termination".to_string(),
                cell: Some(cell),
                payout: None,
            },
            RoundEnding::CashedOut { payout } => Self {
                reason: "cashed_out".to_string(),
                cell: None,
                payout: Some(decimal(payout)),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRoundResponse {
    pub round_id: String,
    pub hazard_count: u8,
    pub bet_amount: f64,
    pub current_multiplier: f64,
    pub potential_payout: f64,
    pub new_balance: f64,
}

impl From<StartRoundOutcome> for StartRoundResponse {
    fn from(outcome: StartRoundOutcome) -> Self {
        Self {
            round_id: outcome.round.round_id,
            hazard_count: outcome.round.hazard_count,
            bet_amount: decimal(outcome.round.bet_amount),
            current_multiplier: outcome.round.current_multiplier,
            potential_payout: decimal(outcome.round.potential_payout),
            new_balance: decimal(outcome.new_balance),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealResponse {
    pub round_id: String,
    pub status: RoundStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potential_payout: Option<f64>,
    pub revealed_positions: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hazard_positions: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ending: Option<EndingView>,
}

impl From<RevealOutcome> for RevealResponse {
    fn from(outcome: RevealOutcome) -> Self {
        Self {
            round_id: outcome.round_id,
            status: outcome.status,
            current_multiplier: outcome.current_multiplier,
            potential_payout: outcome.potential_payout.map(decimal),
            revealed_positions: outcome.revealed_positions,
            hazard_positions: outcome.hazard_positions,
            ending: outcome.ending.map(EndingView::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashOutResponse {
    pub round_id: String,
    pub status: RoundStatus,
    pub final_payout: f64,
    pub new_balance: f64,
    pub hazard_positions: Vec<u8>,
}

impl From<CashOutOutcome> for CashOutResponse {
    fn from(outcome: CashOutOutcome) -> Self {
        Self {
            round_id: outcome.round_id,
            status: outcome.status,
            final_payout: decimal(outcome.final_payout),
            new_balance: decimal(outcome.new_balance),
            hazard_positions: outcome.hazard_positions,
        }
    }
}

/// Round as shown to its owner; hazards only once terminal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundView {
    pub round_id: String,
    pub player_id: String,
    pub bet_amount: f64,
    pub hazard_count: u8,
    pub revealed_positions: Vec<u8>,
    pub current_multiplier: f64,
    pub potential_payout: f64,
    pub status: RoundStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hazard_positions: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ending: Option<EndingView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PublicRound> for RoundView {
    fn from(round: PublicRound) -> Self {
        Self {
            round_id: round.round_id,
            player_id: round.player_id,
            bet_amount: decimal(round.bet_amount),
            hazard_count: round.hazard_count,
            revealed_positions: round.revealed_positions,
            current_multiplier: round.current_multiplier,
            potential_payout: decimal(round.potential_payout),
            status: round.status,
            hazard_positions: round.hazard_positions,
            ending: round.ending.map(EndingView::from),
            created_at: timestamp(round.created_at),
            updated_at: timestamp(round.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub player_id: String,
    pub rounds: Vec<RoundView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_id: Option<String>,
    pub kind: TransactionKind,
    pub amount: f64,
    pub balance_after: f64,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl From<LedgerEntry> for TransactionView {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            round_id: entry.round_id,
            kind: entry.kind,
            amount: decimal(entry.amount),
            balance_after: decimal(entry.balance_after),
            description: entry.description,
            timestamp: timestamp(entry.timestamp),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerResponse {
    pub player_id: String,
    pub balance: f64,
    pub transactions: Vec<TransactionView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exploded_reveal_omits_multiplier() {
        let response = RevealResponse::from(RevealOutcome {
            round_id: "r-1".to_string(),
            status: RoundStatus::Exploded,
            current_multiplier: None,
            potential_payout: None,
            revealed_positions: vec![3],
            hazard_positions: Some(vec![1, 2, 4]),
            ending: Some(RoundEnding::HazardHit { cell: 4 }),
        });
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("current_multiplier").is_none());
        assert!(json.get("potential_payout").is_none());
        assert_eq!(json["status"], "EXPLODED");
        assert_eq!(json["ending"]["reason"], "hazard_hit");
        assert_eq!(json["hazard_positions"], serde_json::json!([1, 2, 4]));
    }

    #[test]
    fn test_cash_out_amounts_are_decimal() {
        let response = CashOutResponse::from(CashOutOutcome {
            round_id: "r-1".to_string(),
            status: RoundStatus::CashedOut,
            final_payout: Amount::from_cents(11_250),
            new_balance: Amount::from_cents(101_250),
            hazard_positions: vec![0, 1, 2],
        });
        assert_eq!(response.final_payout, 112.5);
        assert_eq!(response.new_balance, 1_012.5);
    }

    #[test]
    fn test_ending_view_for_cash_out() {
        let view = EndingView::from(RoundEnding::CashedOut {
            payout: Amount::from_cents(250),
        });
        assert_eq!(view.reason, "cashed_out");
        assert_eq!(view.payout, Some(2.5));
        assert_eq!(view.cell, None);
    }
}
