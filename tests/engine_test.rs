use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::mpsc::UnboundedReceiver;

use tradeguard::execution::ExitReason;
use tradeguard::indicators::{IndicatorEngine, IndicatorSnapshot};
use tradeguard::risk::{EntryRejection, LockScope, ProtectionConfig, StoplossGuard};
use tradeguard::strategy::{Decision, Strategy};
use tradeguard::{Candle, CandleReport, Engine, EngineConfig, EngineEvent};

/// Enters whenever flat; keeps the tests independent of indicator tuning
struct AlwaysEnter {
    engine: IndicatorEngine,
}

impl Strategy for AlwaysEnter {
    fn name(&self) -> &str {
        "Always Enter"
    }

    fn indicators(&self) -> &IndicatorEngine {
        &self.engine
    }

    fn evaluate(&self, _history: &[IndicatorSnapshot]) -> Decision {
        Decision::entry("always")
    }
}

fn t(i: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(i * 5)
}

fn candle(pair: &str, i: i64, close: f64) -> Candle {
    Candle {
        pair: pair.to_string(),
        open_time: t(i),
        open: close,
        high: close * 1.001,
        low: close * 0.999,
        close,
        volume: 1000.0,
    }
}

fn global_guard_config() -> EngineConfig {
    EngineConfig {
        protections: ProtectionConfig {
            stoploss_guard: Some(StoplossGuard {
                trade_limit: 2,
                lookback_period_candles: 60,
                stop_duration_candles: 20,
                only_per_pair: false,
                required_profit: 0.0,
            }),
            max_drawdown: None,
            cooldown_period: None,
        },
        ..EngineConfig::default()
    }
}

fn start(config: EngineConfig) -> (tradeguard::EngineHandle, UnboundedReceiver<EngineEvent>) {
    let strategy = Arc::new(AlwaysEnter {
        engine: IndicatorEngine::new(config.strategy.indicators().clone()),
    });
    Engine::start_with_strategy(config, strategy).unwrap()
}

async fn next_report(events: &mut UnboundedReceiver<EngineEvent>, pair: &str) -> CandleReport {
    loop {
        match events.recv().await.expect("engine stopped early") {
            EngineEvent::Report { pair: p, report } if p == pair => return report,
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_entry_ack_stop_and_global_lock() {
    tradeguard::logging::try_setup_logging();

    let (handle, mut events) = start(global_guard_config());

    // Warm both pairs up to the first entry
    for pair in ["SOL", "JUP"] {
        for i in 0..69 {
            handle.submit_candle(candle(pair, i, 100.0)).await.unwrap();
            let report = next_report(&mut events, pair).await;
            assert!(report.entry.is_none());
        }
        handle.submit_candle(candle(pair, 69, 100.0)).await.unwrap();
        let (id, entry) = next_report(&mut events, pair).await.entry.expect("entry");
        assert_eq!(entry.pair, pair);
        handle.acknowledge_entry(pair, id).await.unwrap();
    }

    // Both positions stop out; each outcome goes back to the ledger
    for pair in ["SOL", "JUP"] {
        handle.submit_candle(candle(pair, 70, 99.0)).await.unwrap();
        let report = next_report(&mut events, pair).await;
        let close = report.close.expect("stop-loss close");
        assert_eq!(close.exit_reason, ExitReason::StopLoss);
        handle.report_outcome(report.outcome.unwrap()).await.unwrap();
    }

    // Second stop-loss across pairs trips the global guard
    let locks = loop {
        match events.recv().await.unwrap() {
            EngineEvent::LocksApplied { locks, .. } => break locks,
            _ => continue,
        }
    };
    assert_eq!(locks[0].scope, LockScope::Global);

    // Every pair is now blocked
    for pair in ["SOL", "JUP"] {
        handle.submit_candle(candle(pair, 71, 99.0)).await.unwrap();
        let report = next_report(&mut events, pair).await;
        assert!(report.entry.is_none());
        assert!(matches!(
            report.suppressed,
            Some(EntryRejection::Locked { scope: LockScope::Global, .. })
        ));
    }

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_provisional_entry_is_not_exited() {
    let (handle, mut events) = start(EngineConfig::default());

    for i in 0..69 {
        handle.submit_candle(candle("SOL", i, 100.0)).await.unwrap();
    }
    handle.submit_candle(candle("SOL", 69, 100.0)).await.unwrap();
    // Deep drop, but the fill was never acknowledged
    handle.submit_candle(candle("SOL", 70, 90.0)).await.unwrap();
    handle.shutdown().await.unwrap();

    let mut reports = Vec::new();
    while let Some(event) = events.recv().await {
        if let EngineEvent::Report { report, .. } = event {
            reports.push(report);
        }
    }

    assert_eq!(reports.len(), 71);
    assert!(reports[69].entry.is_some());
    assert!(reports[70].close.is_none());
    assert_eq!(reports[70].suppressed, Some(EntryRejection::PositionOpen));
}

#[tokio::test]
async fn test_rejected_entry_frees_the_slot() {
    let (handle, mut events) = start(EngineConfig::default());

    for i in 0..69 {
        handle.submit_candle(candle("SOL", i, 100.0)).await.unwrap();
        next_report(&mut events, "SOL").await;
    }
    handle.submit_candle(candle("SOL", 69, 100.0)).await.unwrap();
    let (id, _) = next_report(&mut events, "SOL").await.entry.unwrap();
    handle.reject_entry("SOL", id).await.unwrap();

    handle.submit_candle(candle("SOL", 70, 100.0)).await.unwrap();
    let report = next_report(&mut events, "SOL").await;
    assert!(report.entry.is_some());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_default_strategy_engine_runs_synthetic_feed() {
    use tradeguard::backtest::{MarketScenario, SyntheticDataGenerator};

    let (handle, mut events) = Engine::start(EngineConfig::default()).unwrap();
    let mut gen = SyntheticDataGenerator::new(3);
    let candles = gen.generate("SOL", MarketScenario::Volatile, 300, 5);

    for candle in candles {
        handle.submit_candle(candle).await.unwrap();
    }
    handle.shutdown().await.unwrap();

    let mut reports = 0;
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::Report { .. } => reports += 1,
            EngineEvent::CandleRejected { error, .. } => panic!("unexpected rejection: {}", error),
            EngineEvent::LocksApplied { .. } => {}
        }
    }
    assert_eq!(reports, 300);
}
