//! End-to-end round lifecycle against the in-memory backend

use mines_engine::{
    errors::{EngineError, StateError},
    games::{
        multiplier::MultiplierPolicy,
        random::{RandomSource, ScriptedRandom, SeededRandom},
        types::{LedgerEntry, RoundEnding, TransactionKind, GRID_SIZE},
        TerminationPolicy,
    },
    games::Round,
    store::{CommitReceipt, MemoryRoundStore, RoundCommit, RoundStore, WagerLedger},
    Amount, EngineResult, RoundEngine, RoundStatus,
};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

fn setup(random: Arc<dyn RandomSource>, termination: TerminationPolicy) -> (RoundEngine, Arc<MemoryRoundStore>) {
    let store = Arc::new(MemoryRoundStore::new());
    let engine = RoundEngine::new(store.clone(), random).with_termination(termination);
    engine.deposit("alice", Amount::from_cents(100_000), "seed").unwrap();
    (engine, store)
}

fn dollars(value: f64) -> Amount {
    Amount::from_decimal(value).unwrap()
}

#[test]
fn example_a_first_safe_reveal_with_three_hazards() {
    // Hazards away from cell 10, forced turn 4, two reshuffle passes
    let random = Arc::new(ScriptedRandom::new(vec![vec![20, 21, 22]], vec![4, 2]));
    let (engine, _) = setup(random, TerminationPolicy::default());

    let started = engine.start_round("alice", dollars(100.0), 3).unwrap();
    assert_eq!(started.new_balance, dollars(900.0));
    assert_eq!(started.round.current_multiplier, 1.0);
    assert_eq!(started.round.potential_payout, dollars(100.0));
    assert!(started.round.hazard_positions.is_none());

    let outcome = engine.reveal_tile("alice", &started.round.round_id, 10).unwrap();
    assert_eq!(outcome.status, RoundStatus::Active);
    let multiplier = outcome.current_multiplier.unwrap();
    assert!((multiplier - 1.125).abs() < 1e-9, "multiplier {}", multiplier);
    assert_eq!(outcome.potential_payout, Some(dollars(112.50)));
    assert_eq!(outcome.revealed_positions, vec![10]);
    assert!(outcome.hazard_positions.is_none());
}

#[test]
fn example_b_forced_termination_on_second_reveal() {
    // Every placement lands on 20..=22, so cells 0 and 5 are safe
    let random = Arc::new(ScriptedRandom::new(
        vec![vec![20, 21, 22], vec![20, 21, 22], vec![20, 21, 22]],
        vec![2, 2],
    ));
    let (engine, store) = setup(random, TerminationPolicy::default());
    let started = engine.start_round("alice", dollars(50.0), 3).unwrap();
    let round_id = started.round.round_id;

    let first = engine.reveal_tile("alice", &round_id, 0).unwrap();
    assert_eq!(first.status, RoundStatus::Active);

    let second = engine.reveal_tile("alice", &round_id, 5).unwrap();
    assert_eq!(second.status, RoundStatus::Exploded);
    assert_eq!(second.current_multiplier, None);
    assert_eq!(second.potential_payout, None);
    assert_eq!(second.ending, Some(RoundEnding::ForcedTermination { cell: 5 }));
    assert_eq!(second.hazard_positions, Some(vec![20, 21, 22]));

    let stored = store.load(&round_id).unwrap().unwrap();
    assert_eq!(stored.potential_payout, Amount::ZERO);
    assert!(engine.get_active_round("alice").unwrap().is_none());

    let txs = engine.transactions("alice", Some(1)).unwrap();
    assert_eq!(txs[0].kind, TransactionKind::Loss);
    assert!(txs[0].description.contains("forced termination"));
    assert_eq!(engine.balance("alice").unwrap(), dollars(950.0));
}

#[test]
fn example_c_cash_out_before_minimum_moves() {
    let random = Arc::new(ScriptedRandom::new(vec![(0..10).collect()], vec![]));
    let (engine, _) = setup(random, TerminationPolicy::disabled());
    let started = engine.start_round("alice", dollars(10.0), 10).unwrap();
    let round_id = started.round.round_id;

    engine.reveal_tile("alice", &round_id, 20).unwrap();
    let err = engine.cash_out("alice", &round_id).unwrap_err();
    assert!(matches!(err, EngineError::Policy { current: 1, required: 2 }));
    assert!(err.to_string().contains("need 2 moves, have 1"));

    // Rejection left the round playable and the balance untouched
    assert_eq!(engine.get_active_round("alice").unwrap().unwrap().status, RoundStatus::Active);
    assert_eq!(engine.balance("alice").unwrap(), dollars(990.0));
}

#[test]
fn example_d_second_start_while_active() {
    let (engine, _) = setup(Arc::new(SeededRandom::new(9)), TerminationPolicy::default());
    let first = engine.start_round("alice", dollars(25.0), 5).unwrap();

    let err = engine.start_round("alice", dollars(25.0), 5).unwrap_err();
    match err {
        EngineError::State(StateError::ActiveRoundExists { round_id, .. }) => {
            assert_eq!(round_id, first.round.round_id)
        }
        other => panic!("expected active-round error, got {:?}", other),
    }
    assert_eq!(engine.balance("alice").unwrap(), dollars(975.0));
    assert_eq!(engine.round_history("alice", None).unwrap().len(), 1);
}

#[test]
fn cash_out_credits_payout_and_reveals_hazards() {
    let random = Arc::new(ScriptedRandom::new(vec![vec![0, 1, 2]], vec![]));
    let (engine, store) = setup(random, TerminationPolicy::disabled());
    let started = engine.start_round("alice", dollars(100.0), 3).unwrap();
    let round_id = started.round.round_id;

    let policy = MultiplierPolicy::default();
    let mut expected = 1.0;
    for (turn, cell) in [10u32, 11, 12].into_iter().enumerate() {
        expected = policy.advance(3, turn, expected);
        let outcome = engine.reveal_tile("alice", &round_id, cell).unwrap();
        assert!((outcome.current_multiplier.unwrap() - expected).abs() < 1e-12);
    }
    let payout = MultiplierPolicy::payout(dollars(100.0), expected);

    let cashed = engine.cash_out("alice", &round_id).unwrap();
    assert_eq!(cashed.status, RoundStatus::CashedOut);
    assert_eq!(cashed.final_payout, payout);
    assert_eq!(cashed.new_balance, dollars(900.0).checked_add(payout).unwrap());
    assert_eq!(cashed.hazard_positions, vec![0, 1, 2]);

    let stored = store.load(&round_id).unwrap().unwrap();
    assert_eq!(stored.ending, Some(RoundEnding::CashedOut { payout }));
    assert!(engine.get_active_round("alice").unwrap().is_none());

    let txs = engine.transactions("alice", None).unwrap();
    assert_eq!(txs[0].kind, TransactionKind::Payout);
    assert_eq!(txs[0].amount, payout);
    assert_eq!(txs[1].kind, TransactionKind::Bet);

    // A terminal round accepts no further transitions
    assert!(matches!(
        engine.cash_out("alice", &round_id),
        Err(EngineError::State(StateError::NotActive { .. }))
    ));
    assert!(matches!(
        engine.reveal_tile("alice", &round_id, 13),
        Err(EngineError::State(StateError::NotActive { .. }))
    ));
}

#[test]
fn rounds_uphold_board_and_multiplier_invariants() {
    for seed in 0..60u64 {
        let (engine, store) = setup(Arc::new(SeededRandom::new(seed)), TerminationPolicy::default());
        let hazards = 1 + (seed % 24) as u32;
        let before = engine.balance("alice").unwrap();

        let started = engine.start_round("alice", dollars(10.0), hazards).unwrap();
        assert_eq!(before.checked_sub(started.new_balance), Some(dollars(10.0)));
        let round_id = started.round.round_id;

        let mut previous = 1.0;
        for cell in 0..GRID_SIZE as u32 {
            let stored = store.load(&round_id).unwrap().unwrap();
            if stored.status != RoundStatus::Active {
                break;
            }
            let distinct: HashSet<_> = stored.hazard_positions.iter().collect();
            assert_eq!(distinct.len(), hazards as usize);
            assert!(stored.hazard_positions.iter().all(|h| !stored.revealed_positions.contains(h)));
            let forced_turn = stored.forced_loss_turn.unwrap() as usize;
            assert!(stored.revealed_positions.len() < forced_turn);

            let outcome = engine.reveal_tile("alice", &round_id, cell).unwrap();
            match outcome.status {
                RoundStatus::Active => {
                    let current = outcome.current_multiplier.unwrap();
                    if current < MultiplierPolicy::default().ceiling() {
                        assert!(current >= previous * 1.01 - 1e-12);
                    }
                    assert_eq!(
                        outcome.potential_payout,
                        Some(MultiplierPolicy::payout(dollars(10.0), current))
                    );
                    assert!(outcome.revealed_positions.len() < forced_turn);
                    previous = current;
                }
                RoundStatus::Exploded => {
                    assert!(outcome.hazard_positions.is_some());
                    assert!(outcome.revealed_positions.len() <= forced_turn);
                }
                RoundStatus::CashedOut => unreachable!("reveal never cashes out"),
            }
        }

        let final_round = store.load(&round_id).unwrap().unwrap();
        assert_eq!(final_round.status, RoundStatus::Exploded);
    }
}

#[test]
fn racing_cash_outs_settle_exactly_once() {
    for seed in 0..20u64 {
        let (engine, store) = setup(Arc::new(SeededRandom::new(seed)), TerminationPolicy::disabled());
        let engine = Arc::new(engine);
        let started = engine.start_round("alice", dollars(10.0), 1).unwrap();
        let round_id = started.round.round_id;

        let hazard = store.load(&round_id).unwrap().unwrap().hazard_positions[0];
        let safe: Vec<u32> = (0..GRID_SIZE).filter(|c| *c != hazard).take(3).map(u32::from).collect();
        for cell in safe {
            engine.reveal_tile("alice", &round_id, cell).unwrap();
        }

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let engine = engine.clone();
                let barrier = barrier.clone();
                let round_id = round_id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    engine.cash_out("alice", &round_id)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "seed {}", seed);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, EngineError::State(_))));

        let payouts = engine
            .transactions("alice", None)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == TransactionKind::Payout)
            .count();
        assert_eq!(payouts, 1);
    }
}

/// Holds every `load` at a barrier so two callers always read the same version
struct GatedStore {
    inner: Arc<MemoryRoundStore>,
    gate: Barrier,
}

impl RoundStore for GatedStore {
    fn load(&self, round_id: &str) -> EngineResult<Option<Round>> {
        let round = self.inner.load(round_id);
        self.gate.wait();
        round
    }

    fn active_round(&self, player_id: &str) -> EngineResult<Option<Round>> {
        self.inner.active_round(player_id)
    }

    fn history(&self, player_id: &str, limit: usize) -> EngineResult<Vec<Round>> {
        self.inner.history(player_id, limit)
    }

    fn commit(&self, commit: RoundCommit) -> EngineResult<CommitReceipt> {
        self.inner.commit(commit)
    }
}

impl WagerLedger for GatedStore {
    fn balance(&self, player_id: &str) -> EngineResult<Amount> {
        self.inner.balance(player_id)
    }

    fn deposit(&self, player_id: &str, amount: Amount, description: &str) -> EngineResult<LedgerEntry> {
        self.inner.deposit(player_id, amount, description)
    }

    fn transactions(&self, player_id: &str, limit: usize) -> EngineResult<Vec<LedgerEntry>> {
        self.inner.transactions(player_id, limit)
    }
}

enum Move {
    Reveal(u32),
    CashOut,
}

/// Open a round with hazards on 0..=2, make `warmup` safe reveals, then run
/// both moves concurrently through an engine whose loads are gated.
fn race(warmup: &[u32], moves: [Move; 2]) -> (Vec<EngineResult<()>>, Arc<MemoryRoundStore>, String) {
    let random = Arc::new(ScriptedRandom::new(vec![vec![0, 1, 2]], vec![]));
    let (engine, store) = setup(random, TerminationPolicy::disabled());
    let round_id = engine.start_round("alice", dollars(10.0), 3).unwrap().round.round_id;
    for cell in warmup {
        engine.reveal_tile("alice", &round_id, *cell).unwrap();
    }

    let gated = Arc::new(GatedStore {
        inner: store.clone(),
        gate: Barrier::new(2),
    });
    let racing = Arc::new(
        RoundEngine::new(gated, Arc::new(ScriptedRandom::new(vec![], vec![])))
            .with_termination(TerminationPolicy::disabled()),
    );
    let handles: Vec<_> = moves
        .into_iter()
        .map(|next| {
            let engine = racing.clone();
            let round_id = round_id.clone();
            thread::spawn(move || match next {
                Move::Reveal(cell) => engine.reveal_tile("alice", &round_id, cell).map(|_| ()),
                Move::CashOut => engine.cash_out("alice", &round_id).map(|_| ()),
            })
        })
        .collect();
    let results = handles.into_iter().map(|h| h.join().unwrap()).collect();
    (results, store, round_id)
}

fn settlement_rows(store: &MemoryRoundStore) -> usize {
    store
        .transactions("alice", 100)
        .unwrap()
        .into_iter()
        .filter(|t| matches!(t.kind, TransactionKind::Payout | TransactionKind::Loss))
        .count()
}

#[test]
fn racing_reveals_commit_exactly_one() {
    let (results, store, round_id) = race(&[10], [Move::Reveal(11), Move::Reveal(12)]);

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(loser, EngineError::State(StateError::Conflict { .. })), "{:?}", loser);

    let round = store.load(&round_id).unwrap().unwrap();
    assert_eq!(round.status, RoundStatus::Active);
    assert_eq!(round.revealed_positions.len(), 2);
    assert_eq!(round.version, 3);
    assert_eq!(settlement_rows(&store), 0);
}

#[test]
fn racing_reveal_and_cash_out_commit_exactly_one() {
    let (results, store, round_id) = race(&[10, 11, 12], [Move::Reveal(13), Move::CashOut]);

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(loser, EngineError::State(StateError::Conflict { .. })), "{:?}", loser);

    let round = store.load(&round_id).unwrap().unwrap();
    assert_eq!(round.version, 5);
    if results[0].is_ok() {
        assert_eq!(round.status, RoundStatus::Active);
        assert_eq!(round.revealed_positions.len(), 4);
        assert_eq!(settlement_rows(&store), 0);
        assert_eq!(store.balance("alice").unwrap(), dollars(990.0));
    } else {
        assert_eq!(round.status, RoundStatus::CashedOut);
        assert_eq!(round.revealed_positions.len(), 3);
        assert_eq!(settlement_rows(&store), 1);
        assert_eq!(store.balance("alice").unwrap(), dollars(990.0).checked_add(round.potential_payout).unwrap());
    }
}

#[test]
fn history_and_ledger_track_every_round() {
    let (engine, _) = setup(Arc::new(SeededRandom::new(77)), TerminationPolicy::default());
    for _ in 0..4 {
        let started = engine.start_round("alice", dollars(1.0), 24).unwrap();
        // Either cell 0 is the single safe cell or the round explodes
        let outcome = engine.reveal_tile("alice", &started.round.round_id, 0).unwrap();
        if outcome.status == RoundStatus::Active {
            engine.cash_out("alice", &started.round.round_id).unwrap();
        }
    }

    let history = engine.round_history("alice", Some(3)).unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|r| r.status.is_terminal()));
    assert!(history.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    let bets = engine
        .transactions("alice", None)
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Bet)
        .count();
    assert_eq!(bets, 4);
    assert!(engine.metrics().snapshot().rounds_started >= 4);
}
