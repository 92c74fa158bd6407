//! Background refresh of watched games.
//!
//! Every refresh gets a generation number. A newer refresh for the same game
//! aborts the older task, and a result that finishes after being superseded
//! is dropped instead of published. Timer ticks skip a game whose cycle is
//! still running, so a slow ledger delays a view instead of starving it.

use super::orchestrator::{GameView, Orchestrator};
use crate::domain::GameId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct Published {
    generation: u64,
    view: Arc<GameView>,
}

/// Latest complete view per game.
#[derive(Debug, Clone, Default)]
pub struct ViewStore {
    inner: Arc<RwLock<HashMap<GameId, Published>>>,
}

impl ViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, game_id: GameId) -> Option<Arc<GameView>> {
        self.inner
            .read()
            .await
            .get(&game_id)
            .map(|p| p.view.clone())
    }

    pub async fn generation(&self, game_id: GameId) -> Option<u64> {
        self.inner.read().await.get(&game_id).map(|p| p.generation)
    }

    /// Replace the stored view unless it comes from an older generation.
    pub async fn publish(&self, game_id: GameId, generation: u64, view: GameView) -> bool {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.get(&game_id) {
            if existing.generation >= generation {
                return false;
            }
        }
        inner.insert(
            game_id,
            Published {
                generation,
                view: Arc::new(view),
            },
        );
        true
    }
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Periodically rebuilds views for a set of games.
#[derive(Debug)]
pub struct ViewPoller {
    orchestrator: Arc<Orchestrator>,
    store: ViewStore,
    next_generation: AtomicU64,
    /// Newest cycle per game. Generation and handle change together.
    inflight: Mutex<HashMap<GameId, InFlight>>,
}

impl ViewPoller {
    pub fn new(orchestrator: Arc<Orchestrator>, store: ViewStore) -> Self {
        Self {
            orchestrator,
            store,
            next_generation: AtomicU64::new(0),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &ViewStore {
        &self.store
    }

    /// Start a new poll cycle for a game, superseding any in flight.
    /// Returns the cycle's generation.
    pub fn refresh(self: &Arc<Self>, game_id: GameId) -> u64 {
        let mut inflight = match self.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run_cycle(game_id, generation).await });

        let previous = inflight.insert(game_id, InFlight { generation, handle });
        if let Some(previous) = previous {
            if previous.generation < generation && !previous.handle.is_finished() {
                warn!(
                    game=%game_id,
                    superseded = previous.generation,
                    generation,
                    "Poll cycle superseded before publishing"
                );
                previous.handle.abort();
            }
        }
        generation
    }

    /// Like [`refresh`](Self::refresh), but leaves a cycle that is still
    /// running alone. Returns None when nothing was started.
    pub fn refresh_if_idle(self: &Arc<Self>, game_id: GameId) -> Option<u64> {
        let running = self
            .inflight
            .lock()
            .ok()
            .and_then(|inflight| {
                inflight
                    .get(&game_id)
                    .filter(|f| !f.handle.is_finished())
                    .map(|f| f.generation)
            });
        if let Some(generation) = running {
            warn!(game=%game_id, generation, "Previous poll cycle still running; skipping tick");
            return None;
        }
        Some(self.refresh(game_id))
    }

    fn is_current(&self, game_id: GameId, generation: u64) -> bool {
        self.inflight
            .lock()
            .map(|inflight| inflight.get(&game_id).map(|f| f.generation) == Some(generation))
            .unwrap_or(false)
    }

    async fn run_cycle(&self, game_id: GameId, generation: u64) {
        match self.orchestrator.build_view(game_id).await {
            Ok(view) => {
                if !self.is_current(game_id, generation) {
                    debug!(game=%game_id, generation, "Discarding superseded view");
                    return;
                }
                let fingerprint = view.fingerprint.clone();
                if self.store.publish(game_id, generation, view).await {
                    debug!(game=%game_id, generation, fingerprint=%fingerprint, "Published view");
                }
            }
            Err(e) => warn!(game=%game_id, generation, error=%e, "Poll cycle failed"),
        }
    }

    /// Refresh every game on a fixed cadence. Never returns.
    pub async fn run(self: Arc<Self>, games: Vec<GameId>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            info!(games = games.len(), "Starting poll cycle");
            for game_id in &games {
                self.refresh_if_idle(*game_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amount, Game};
    use crate::engine::PayoutSearchConfig;
    use crate::ledger::MockLedger;

    fn ledger() -> MockLedger {
        MockLedger::new().with_game(Game {
            id: GameId(1),
            total_rounds: 1,
            current_round: 0,
            start_time: 0,
            finalized: false,
            cancelled: false,
            entry_fee: Amount::ZERO,
            player_count: 0,
            prize_pool: Amount::ZERO,
        })
    }

    async fn view(orchestrator: &Orchestrator) -> GameView {
        orchestrator.build_view(GameId(1)).await.unwrap()
    }

    #[tokio::test]
    async fn test_store_rejects_older_generation() {
        let orchestrator = Orchestrator::new(Arc::new(ledger()), PayoutSearchConfig::default());
        let store = ViewStore::new();

        assert!(store.publish(GameId(1), 2, view(&orchestrator).await).await);
        assert!(!store.publish(GameId(1), 1, view(&orchestrator).await).await);
        assert!(!store.publish(GameId(1), 2, view(&orchestrator).await).await);
        assert_eq!(store.generation(GameId(1)).await, Some(2));
    }

    #[tokio::test]
    async fn test_newer_refresh_supersedes_in_flight() {
        let slow = ledger().with_latency(Duration::from_millis(50));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(slow),
            PayoutSearchConfig::default(),
        ));
        let poller = Arc::new(ViewPoller::new(orchestrator, ViewStore::new()));

        let first = poller.refresh(GameId(1));
        let second = poller.refresh(GameId(1));
        assert!(second > first);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(poller.store().generation(GameId(1)).await, Some(second));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refreshes_publish_newest() {
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(ledger().with_latency(Duration::from_millis(2))),
            PayoutSearchConfig::default(),
        ));
        let poller = Arc::new(ViewPoller::new(orchestrator, ViewStore::new()));

        for _ in 0..40 {
            let a = tokio::spawn({
                let poller = poller.clone();
                async move { poller.refresh(GameId(1)) }
            });
            let b = tokio::spawn({
                let poller = poller.clone();
                async move { poller.refresh(GameId(1)) }
            });
            let newest = a.await.unwrap().max(b.await.unwrap());

            tokio::time::sleep(Duration::from_millis(40)).await;
            assert_eq!(poller.store().generation(GameId(1)).await, Some(newest));
        }
    }

    #[tokio::test]
    async fn test_tick_does_not_abort_running_cycle() {
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(ledger().with_latency(Duration::from_millis(50))),
            PayoutSearchConfig::default(),
        ));
        let poller = Arc::new(ViewPoller::new(orchestrator, ViewStore::new()));

        let first = poller.refresh_if_idle(GameId(1)).unwrap();
        assert_eq!(poller.refresh_if_idle(GameId(1)), None);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(poller.store().generation(GameId(1)).await, Some(first));

        // Idle again once the cycle has published.
        assert!(poller.refresh_if_idle(GameId(1)).is_some());
    }

    #[tokio::test]
    async fn test_stale_cycle_is_not_current() {
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(ledger().with_latency(Duration::from_millis(50))),
            PayoutSearchConfig::default(),
        ));
        let poller = Arc::new(ViewPoller::new(orchestrator, ViewStore::new()));

        let first = poller.refresh(GameId(1));
        let second = poller.refresh(GameId(1));
        assert!(!poller.is_current(GameId(1), first));
        assert!(poller.is_current(GameId(1), second));
    }
}
