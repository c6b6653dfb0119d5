//! Engine counters with Prometheus text export

use crate::games::types::Amount;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Lock-free counters updated by the round engine
pub struct EngineMetrics {
    start_time: Instant,
    rounds_started: AtomicU64,
    tiles_revealed: AtomicU64,
    rounds_exploded: AtomicU64,
    forced_terminations: AtomicU64,
    rounds_cashed_out: AtomicU64,
    cas_conflicts: AtomicU64,
    persistence_failures: AtomicU64,
    wagered_cents: AtomicU64,
    paid_out_cents: AtomicU64,
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub rounds_started: u64,
    pub tiles_revealed: u64,
    pub rounds_exploded: u64,
    pub forced_terminations: u64,
    pub rounds_cashed_out: u64,
    pub cas_conflicts: u64,
    pub persistence_failures: u64,
    pub wagered_cents: u64,
    pub paid_out_cents: u64,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            rounds_started: AtomicU64::new(0),
            tiles_revealed: AtomicU64::new(0),
            rounds_exploded: AtomicU64::new(0),
            forced_terminations: AtomicU64::new(0),
            rounds_cashed_out: AtomicU64::new(0),
            cas_conflicts: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            wagered_cents: AtomicU64::new(0),
            paid_out_cents: AtomicU64::new(0),
        }
    }

    pub fn record_round_started(&self, bet: Amount) {
        self.rounds_started.fetch_add(1, Ordering::Relaxed);
        self.wagered_cents.fetch_add(bet.cents(), Ordering::Relaxed);
    }

    pub fn record_safe_reveal(&self) {
        self.tiles_revealed.fetch_add(1, Ordering::Relaxed);
    }

    /// `forced` distinguishes a forced-loss turn from a hazard hit
    pub fn record_explosion(&self, forced: bool) {
        self.rounds_exploded.fetch_add(1, Ordering::Relaxed);
        if forced {
            self.forced_terminations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_cash_out(&self, payout: Amount) {
        self.rounds_cashed_out.fetch_add(1, Ordering::Relaxed);
        self.paid_out_cents.fetch_add(payout.cents(), Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.cas_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            rounds_started: self.rounds_started.load(Ordering::Relaxed),
            tiles_revealed: self.tiles_revealed.load(Ordering::Relaxed),
            rounds_exploded: self.rounds_exploded.load(Ordering::Relaxed),
            forced_terminations: self.forced_terminations.load(Ordering::Relaxed),
            rounds_cashed_out: self.rounds_cashed_out.load(Ordering::Relaxed),
            cas_conflicts: self.cas_conflicts.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            wagered_cents: self.wagered_cents.load(Ordering::Relaxed),
            paid_out_cents: self.paid_out_cents.load(Ordering::Relaxed),
        }
    }

    /// Render in Prometheus text exposition format
    pub fn to_prometheus_format(&self) -> String {
        let snapshot = self.snapshot();
        let counters: [(&str, &str, u64); 9] = [
            ("mines_rounds_started_total", "Rounds opened", snapshot.rounds_started),
            ("mines_tiles_revealed_total", "Safe reveals committed", snapshot.tiles_revealed),
            ("mines_rounds_exploded_total", "Rounds lost", snapshot.rounds_exploded),
            (
                "mines_forced_terminations_total",
                "Rounds lost on the forced-loss turn",
                snapshot.forced_terminations,
            ),
            ("mines_rounds_cashed_out_total", "Rounds cashed out", snapshot.rounds_cashed_out),
            (
                "mines_cas_conflicts_total",
                "Transitions rejected by a concurrent version change",
                snapshot.cas_conflicts,
            ),
            (
                "mines_persistence_failures_total",
                "Commits that failed in the storage layer",
                snapshot.persistence_failures,
            ),
            ("mines_wagered_cents_total", "Total stakes debited", snapshot.wagered_cents),
            ("mines_paid_out_cents_total", "Total payouts credited", snapshot.paid_out_cents),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            output.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n\n"
            ));
        }
        output.push_str(&format!(
            "# HELP mines_uptime_seconds Seconds since the engine started\n\
             # TYPE mines_uptime_seconds gauge\n\
             mines_uptime_seconds {}\n",
            snapshot.uptime_seconds
        ));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = EngineMetrics::new();
        metrics.record_round_started(Amount::from_cents(500));
        metrics.record_round_started(Amount::from_cents(250));
        metrics.record_safe_reveal();
        metrics.record_explosion(true);
        metrics.record_explosion(false);
        metrics.record_cash_out(Amount::from_cents(900));
        metrics.record_conflict();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rounds_started, 2);
        assert_eq!(snapshot.wagered_cents, 750);
        assert_eq!(snapshot.rounds_exploded, 2);
        assert_eq!(snapshot.forced_terminations, 1);
        assert_eq!(snapshot.paid_out_cents, 900);
        assert_eq!(snapshot.cas_conflicts, 1);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = EngineMetrics::new();
        metrics.record_round_started(Amount::from_cents(100));
        let text = metrics.to_prometheus_format();
        assert!(text.contains("# TYPE mines_rounds_started_total counter"));
        assert!(text.contains("mines_rounds_started_total 1\n"));
        assert!(text.contains("mines_wagered_cents_total 100\n"));
        assert!(text.contains("mines_uptime_seconds"));
    }
}
