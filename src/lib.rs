//! Mines - wagering round engine for a 5x5 reveal-and-cash-out game
//!
//! A player stakes a bet, hidden hazards are placed on the board, and each
//! safe reveal grows the payout multiplier until the player cashes out or
//! the round explodes. Round transitions are pure values committed with an
//! optimistic version check, together with their ledger effects.

pub mod api;
pub mod config;
pub mod engine;
pub mod errors;
pub mod games;
pub mod metrics;
pub mod storage;
pub mod store;

pub use config::EngineConfig;
pub use engine::RoundEngine;
pub use errors::{EngineError, EngineResult, StateError};
pub use games::types::{Amount, RoundStatus};
pub use store::{Backend, MemoryRoundStore, RocksRoundStore};
