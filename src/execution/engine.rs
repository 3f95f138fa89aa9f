//! Async front door of the engine.
//!
//! A router task owns one evaluator actor per pair. Candles for a pair are
//! processed strictly in submission order; different pairs run concurrently
//! and only meet at the shared global protection ledger.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::execution::{CandleReport, PairEvaluator};
use crate::models::{Candle, TradeOutcome};
use crate::risk::{GlobalProtection, ProtectionLock};
use crate::strategy::Strategy;

const COMMAND_BUFFER: usize = 256;

/// What the engine tells the execution side
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Report { pair: String, report: CandleReport },
    CandleRejected { pair: String, error: String },
    LocksApplied { pair: String, locks: Vec<ProtectionLock> },
}

enum PairCommand {
    Candle(Candle),
    Acknowledge(Uuid),
    Reject(Uuid),
    Outcome(TradeOutcome),
}

enum RouterCommand {
    Pair { pair: String, command: PairCommand },
    Shutdown(oneshot::Sender<()>),
}

/// Cheap, cloneable handle for feeding the engine
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<RouterCommand>,
}

impl EngineHandle {
    pub async fn submit_candle(&self, candle: Candle) -> Result<()> {
        let pair = candle.pair.clone();
        self.send(pair, PairCommand::Candle(candle)).await
    }

    /// Confirm that a provisional entry was filled
    pub async fn acknowledge_entry(&self, pair: &str, id: Uuid) -> Result<()> {
        self.send(pair.to_string(), PairCommand::Acknowledge(id)).await
    }

    /// Report that a provisional entry could not be filled
    pub async fn reject_entry(&self, pair: &str, id: Uuid) -> Result<()> {
        self.send(pair.to_string(), PairCommand::Reject(id)).await
    }

    /// Feed a closed trade into the protection ledgers
    pub async fn report_outcome(&self, outcome: TradeOutcome) -> Result<()> {
        let pair = outcome.pair.clone();
        self.send(pair, PairCommand::Outcome(outcome)).await
    }

    /// Drain queued commands, stop every pair actor and wait for them
    pub async fn shutdown(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(RouterCommand::Shutdown(done_tx))
            .await
            .map_err(|_| EngineError::EngineClosed)?;
        done_rx.await.map_err(|_| EngineError::EngineClosed)
    }

    async fn send(&self, pair: String, command: PairCommand) -> Result<()> {
        self.tx
            .send(RouterCommand::Pair { pair, command })
            .await
            .map_err(|_| EngineError::EngineClosed)
    }
}

pub struct Engine;

impl Engine {
    /// Validate `config` and spawn the router.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: EngineConfig,
    ) -> Result<(EngineHandle, mpsc::UnboundedReceiver<EngineEvent>)> {
        let strategy = config.strategy.build();
        Self::start_with_strategy(config, strategy)
    }

    /// Like [`Engine::start`] but with a caller-supplied rule set
    pub fn start_with_strategy(
        config: EngineConfig,
        strategy: Arc<dyn Strategy>,
    ) -> Result<(EngineHandle, mpsc::UnboundedReceiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let router = Router {
            strategy,
            config,
            global: Arc::new(GlobalProtection::new()),
            pairs: HashMap::new(),
            tasks: Vec::new(),
            events: event_tx,
        };

        tracing::info!("🚀 Engine starting with strategy {}", router.strategy.name());
        tokio::spawn(router.run(rx));

        Ok((EngineHandle { tx }, event_rx))
    }
}

struct Router {
    config: EngineConfig,
    strategy: Arc<dyn Strategy>,
    global: Arc<GlobalProtection>,
    pairs: HashMap<String, mpsc::Sender<PairCommand>>,
    tasks: Vec<JoinHandle<()>>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl Router {
    async fn run(mut self, mut rx: mpsc::Receiver<RouterCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                RouterCommand::Pair { pair, command } => self.dispatch(pair, command).await,
                RouterCommand::Shutdown(done) => {
                    self.stop().await;
                    let _ = done.send(());
                    return;
                }
            }
        }

        // Every handle dropped
        self.stop().await;
    }

    async fn dispatch(&mut self, pair: String, command: PairCommand) {
        if !self.pairs.contains_key(&pair) {
            if !matches!(command, PairCommand::Candle(_)) {
                tracing::warn!("{}: command for a pair that has never seen a candle", pair);
                return;
            }
            self.spawn_pair(&pair);
        }

        let Some(tx) = self.pairs.get(&pair) else {
            return;
        };
        if tx.send(command).await.is_err() {
            tracing::error!("{}: pair actor is gone", pair);
            self.pairs.remove(&pair);
        }
    }

    fn spawn_pair(&mut self, pair: &str) {
        tracing::info!("➕ Tracking new pair {}", pair);

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let evaluator = PairEvaluator::new(
            pair,
            &self.config,
            Arc::clone(&self.strategy),
            Arc::clone(&self.global),
        );
        let handle = tokio::spawn(pair_actor(evaluator, rx, self.events.clone()));

        self.pairs.insert(pair.to_string(), tx);
        self.tasks.push(handle);
    }

    async fn stop(&mut self) {
        // Closing the senders lets each actor drain its queue and exit
        self.pairs.clear();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!("Pair actor panicked: {}", e);
            }
        }
        tracing::info!("✅ Engine stopped");
    }
}

async fn pair_actor(
    mut evaluator: PairEvaluator,
    mut rx: mpsc::Receiver<PairCommand>,
    events: mpsc::UnboundedSender<EngineEvent>,
) {
    let pair = evaluator.pair().to_string();

    while let Some(command) = rx.recv().await {
        let event = match command {
            PairCommand::Candle(candle) => match evaluator.on_candle(candle) {
                Ok(report) => Some(EngineEvent::Report {
                    pair: pair.clone(),
                    report,
                }),
                Err(e) => Some(EngineEvent::CandleRejected {
                    pair: pair.clone(),
                    error: e.to_string(),
                }),
            },
            PairCommand::Acknowledge(id) => {
                evaluator.acknowledge_entry(id);
                None
            }
            PairCommand::Reject(id) => {
                evaluator.reject_entry(id);
                None
            }
            PairCommand::Outcome(outcome) => {
                let locks = evaluator.record_outcome(outcome);
                (!locks.is_empty()).then(|| EngineEvent::LocksApplied {
                    pair: pair.clone(),
                    locks,
                })
            }
        };

        if let Some(event) = event {
            // Nobody listening is not a reason to stop evaluating
            let _ = events.send(event);
        }
    }

    tracing::debug!("{} actor stopped", pair);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn candle(pair: &str, i: i64) -> Candle {
        Candle {
            pair: pair.to_string(),
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(i * 5),
            open: 100.0,
            high: 100.5,
            low: 99.5,
            close: 100.0,
            volume: 1000.0,
        }
    }

    #[tokio::test]
    async fn test_invalid_config_refused() {
        let config = EngineConfig {
            window_size: 10,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Engine::start(config),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_reports_in_order_per_pair() {
        let (handle, mut events) = Engine::start(EngineConfig::default()).unwrap();

        for i in 0..5 {
            handle.submit_candle(candle("SOL", i)).await.unwrap();
            handle.submit_candle(candle("JUP", i)).await.unwrap();
        }
        handle.shutdown().await.unwrap();

        let mut sol = Vec::new();
        while let Some(event) = events.recv().await {
            if let EngineEvent::Report { pair, report } = event {
                if pair == "SOL" {
                    sol.push(report.signal.open_time);
                }
            }
        }
        assert_eq!(sol.len(), 5);
        assert!(sol.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_rejected_candle_event() {
        let (handle, mut events) = Engine::start(EngineConfig::default()).unwrap();

        handle.submit_candle(candle("SOL", 3)).await.unwrap();
        handle.submit_candle(candle("SOL", 1)).await.unwrap();
        handle.shutdown().await.unwrap();

        let mut rejected = 0;
        while let Some(event) = events.recv().await {
            if matches!(event, EngineEvent::CandleRejected { .. }) {
                rejected += 1;
            }
        }
        assert_eq!(rejected, 1);
    }

    #[tokio::test]
    async fn test_closed_after_shutdown() {
        let (handle, _events) = Engine::start(EngineConfig::default()).unwrap();
        handle.shutdown().await.unwrap();

        // Router has exited, so the channel is closed
        tokio::task::yield_now().await;
        assert!(matches!(
            handle.submit_candle(candle("SOL", 0)).await,
            Err(EngineError::EngineClosed)
        ));
    }
}
