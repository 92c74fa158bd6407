use arenaview::domain::{Address, Amount, Game, GameId, PlayerRecord, Round};
use arenaview::engine::{Gain, PayoutSearchConfig, ProjectionAnomaly};
use arenaview::ledger::{MockFailure, MockLedger};
use arenaview::orchestration::{GameStatus, Orchestrator};
use std::sync::Arc;

const ROUND_END: i64 = 5_000;

fn addr(n: u8) -> Address {
    Address::new(format!("0x{:040x}", n))
}

fn live_game(id: u64) -> Game {
    Game {
        id: GameId(id),
        total_rounds: 4,
        current_round: 2,
        start_time: 1_000,
        finalized: false,
        cancelled: false,
        entry_fee: Amount::new(100),
        player_count: 6,
        prize_pool: Amount::ZERO,
    }
}

fn live_round(alive: u32, cutoff: u32) -> Round {
    Round {
        number: 2,
        start_time: 3_000,
        end_time: ROUND_END,
        alive_count_at_start: alive,
        cutoff_rank: cutoff,
        finalized: false,
    }
}

fn alive(n: u8) -> PlayerRecord {
    PlayerRecord {
        address: addr(n),
        square_index: u32::from(n),
        alive: true,
        elimination_round: 0,
    }
}

/// Five alive players starting round 2 at 1000, with player 6 out in round 1.
fn five_alive(alive_count: u32, cutoff: u32, balances: [u128; 5]) -> MockLedger {
    let id = GameId(2);
    let mut ledger = MockLedger::new()
        .with_game(live_game(2))
        .with_round(
            id,
            Round {
                number: 1,
                start_time: 1_000,
                end_time: 2_000,
                alive_count_at_start: 6,
                cutoff_rank: 5,
                finalized: true,
            },
        )
        .with_round(id, live_round(alive_count, cutoff))
        .with_player(
            id,
            PlayerRecord {
                address: addr(6),
                square_index: 6,
                alive: false,
                elimination_round: 1,
            },
        );

    for (i, balance) in balances.iter().enumerate() {
        let n = i as u8 + 1;
        ledger = ledger
            .with_player(id, alive(n))
            .with_start_balance(id, 1, &addr(n), 1_000)
            .with_end_balance(id, 1, &addr(n), 1_000)
            .with_start_balance(id, 2, &addr(n), 1_000)
            .with_current_balance(&addr(n), *balance);
    }
    ledger
}

fn orchestrator(ledger: MockLedger) -> Orchestrator {
    Orchestrator::new(Arc::new(ledger), PayoutSearchConfig::default())
}

#[tokio::test]
async fn test_projects_bottom_ranks_for_elimination() {
    let ledger = five_alive(5, 3, [1_100, 900, 1_300, 1_000, 800]);
    let view = orchestrator(ledger)
        .build_view_at(GameId(2), ROUND_END + 1)
        .await
        .unwrap();

    assert_eq!(view.status, GameStatus::Live);
    let projection = view.projection.unwrap();
    assert_eq!(projection.round, 2);
    assert_eq!(projection.effective_cutoff, 3);
    assert!(projection.anomalies.is_empty());
    assert!(projection.approximate);
    assert!(!projection.game_ends_after_round);

    let order: Vec<Address> = projection.ranking.iter().map(|e| e.player.clone()).collect();
    assert_eq!(order, vec![addr(3), addr(1), addr(4), addr(2), addr(5)]);
    assert_eq!(projection.ranking[0].gain, Gain::Value(3_000));
    assert_eq!(projection.eliminated, vec![addr(2), addr(5)]);
}

#[tokio::test]
async fn test_no_projection_before_round_timer() {
    let ledger = five_alive(5, 3, [1_100, 900, 1_300, 1_000, 800]);
    let view = orchestrator(ledger)
        .build_view_at(GameId(2), ROUND_END - 1)
        .await
        .unwrap();

    assert!(view.projection.is_none());
    // Round 1 standings are still published.
    assert_eq!(view.rounds.len(), 1);
    assert_eq!(view.rounds[0].eliminated, vec![addr(6)]);
}

#[tokio::test]
async fn test_full_tie_eliminates_nobody() {
    let ledger = five_alive(5, 3, [1_000; 5]);
    let projection = orchestrator(ledger)
        .build_view_at(GameId(2), ROUND_END)
        .await
        .unwrap()
        .projection
        .unwrap();

    assert!(projection.full_tie);
    assert!(projection.eliminated.is_empty());
    // Ties break on registration order.
    assert_eq!(projection.ranking[0].player, addr(1));
}

#[tokio::test]
async fn test_alive_count_mismatch_withholds_eliminations() {
    let ledger = five_alive(6, 3, [1_100, 900, 1_300, 1_000, 800]);
    let projection = orchestrator(ledger)
        .build_view_at(GameId(2), ROUND_END)
        .await
        .unwrap()
        .projection
        .unwrap();

    assert!(projection.eliminated.is_empty());
    assert_eq!(
        projection.anomalies,
        vec![ProjectionAnomaly::AliveCountMismatch {
            ledger: 6,
            scanned: 5
        }]
    );
}

#[tokio::test]
async fn test_cutoff_at_alive_count_keeps_one_eliminated() {
    let ledger = five_alive(5, 5, [1_100, 900, 1_300, 1_000, 800]);
    let projection = orchestrator(ledger)
        .build_view_at(GameId(2), ROUND_END)
        .await
        .unwrap()
        .projection
        .unwrap();

    assert_eq!(projection.effective_cutoff, 4);
    assert_eq!(projection.eliminated, vec![addr(5)]);
    assert_eq!(
        projection.anomalies,
        vec![ProjectionAnomaly::CutoffNotBelowAlive { cutoff: 5, alive: 5 }]
    );
}

#[tokio::test]
async fn test_unreadable_balance_withholds_eliminations() {
    let ledger = five_alive(5, 3, [1_100, 900, 1_300, 1_000, 800])
        .with_failure(MockFailure::CurrentBalance(addr(3)));
    let projection = orchestrator(ledger)
        .build_view_at(GameId(2), ROUND_END)
        .await
        .unwrap()
        .projection
        .unwrap();

    let last = projection.ranking.last().unwrap();
    assert_eq!(last.player, addr(3));
    assert_eq!(last.gain, Gain::Unavailable);
    // A failed read is not evidence of a low balance.
    assert!(projection.eliminated.is_empty());
    assert_eq!(
        projection.anomalies,
        vec![ProjectionAnomaly::BalanceUnavailable { player: addr(3) }]
    );
}
