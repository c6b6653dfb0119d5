//! Print a player's rounds and ledger rows from a RocksDB round store.
//!
//! Usage: inspect_rounds <db_path> <player_id> [limit]

use mines_engine::store::{RocksRoundStore, RoundStore, WagerLedger};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let (Some(db_path), Some(player_id)) = (args.next(), args.next()) else {
        return Err("Usage: inspect_rounds <db_path> <player_id> [limit]".into());
    };
    let limit: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(20);

    println!("Opening database: {}", db_path);
    let store = RocksRoundStore::open(&db_path)?;

    println!("Balance for {}: {}", player_id, store.balance(&player_id)?);

    match store.active_round(&player_id)? {
        Some(round) => println!(
            "Active round {}: {} hazards, {} reveals, {:.4}x (v{})",
            round.id,
            round.hazard_count,
            round.revealed_positions.len(),
            round.current_multiplier,
            round.version
        ),
        None => println!("No active round"),
    }

    println!("\nRounds (newest first):");
    for round in store.history(&player_id, limit)? {
        println!(
            "  {} {:<10} bet {:>10} hazards {:>2} reveals {:>2} payout {:>10} {}",
            round.id,
            round.status.to_string(),
            round.bet_amount,
            round.hazard_count,
            round.revealed_positions.len(),
            round.potential_payout,
            if round.status.is_terminal() {
                format!("hazards@{:?}", round.hazard_positions)
            } else {
                String::new()
            }
        );
    }

    println!("\nLedger (newest first):");
    for entry in store.transactions(&player_id, limit)? {
        println!(
            "  {} {:<8} {:>10} -> {:>10}  {}",
            entry.timestamp,
            entry.kind.to_string(),
            entry.amount,
            entry.balance_after,
            entry.description
        );
    }

    Ok(())
}
