use chrono::{DateTime, Duration, TimeZone, Utc};

use tradeguard::indicators::IndicatorSnapshot;
use tradeguard::models::SignalKind;
use tradeguard::strategy::{
    MeanReversionStrategy, Strategy, TrendCrossoverStrategy, TrendFollowingStrategy,
};

fn t(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(i as i64 * 5)
}

/// Calm market: price at the mid band, neutral momentum, average volume
fn neutral(i: usize) -> IndicatorSnapshot {
    IndicatorSnapshot {
        pair: "SOL".to_string(),
        open_time: t(i),
        close: 100.0,
        high: 100.5,
        low: 99.5,
        volume: 1000.0,
        ema_fast: 100.0,
        ema_medium: 100.0,
        ema_slow: 100.0,
        rsi: 50.0,
        macd: 0.0,
        macd_signal: 0.0,
        macd_hist: 0.0,
        bb_upper: 102.0,
        bb_mid: 100.0,
        bb_lower: 98.0,
        bb_width: 0.04,
        bb_width_typical: 0.04,
        squeeze: false,
        keltner_upper: 103.0,
        keltner_lower: 97.0,
        atr: 1.0,
        adx: 15.0,
        plus_di: 20.0,
        minus_di: 20.0,
        volume_mean: 1000.0,
    }
}

/// Run `strategy` over every two-snapshot history and collect the decisions
fn decisions(
    strategy: &dyn Strategy,
    series: &[IndicatorSnapshot],
) -> Vec<(usize, SignalKind, &'static str)> {
    series
        .windows(strategy.history_required())
        .enumerate()
        .map(|(i, history)| {
            let decision = strategy.evaluate(history);
            (i + strategy.history_required() - 1, decision.kind, decision.rule_id)
        })
        .collect()
}

#[test]
fn test_ema_cross_fires_exactly_at_candle_20() {
    let series: Vec<IndicatorSnapshot> = (0..40)
        .map(|i| {
            let mut s = neutral(i);
            s.ema_fast = 98.05 + 0.1 * i as f64;
            s.ema_medium = 100.0;
            s.ema_slow = 95.0;
            s.rsi = 50.0;
            s.volume = 2000.0;
            s
        })
        .collect();

    let strategy = TrendCrossoverStrategy::default();
    let entries: Vec<usize> = decisions(&strategy, &series)
        .into_iter()
        .filter(|(_, kind, _)| *kind == SignalKind::EntryLong)
        .map(|(i, _, _)| i)
        .collect();

    assert_eq!(entries, vec![20]);
}

#[test]
fn test_cross_down_is_exit_not_entry() {
    let series: Vec<IndicatorSnapshot> = (0..30)
        .map(|i| {
            let mut s = neutral(i);
            s.ema_fast = 101.95 - 0.1 * i as f64;
            s.ema_slow = 95.0;
            s.volume = 2000.0;
            s
        })
        .collect();

    let strategy = TrendCrossoverStrategy::default();
    let all = decisions(&strategy, &series);

    assert!(all.iter().all(|(_, kind, _)| *kind != SignalKind::EntryLong));
    let exits: Vec<_> = all
        .iter()
        .filter(|(_, kind, _)| *kind == SignalKind::ExitLong)
        .collect();
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].0, 20);
    assert_eq!(exits[0].2, "ema_cross_down");
}

#[test]
fn test_mean_reversion_touch_then_recovery() {
    let mut series: Vec<IndicatorSnapshot> = (0..4).map(neutral).collect();

    // Oversold touch of the lower band in a trending, positive-MACD market
    series[2].close = 97.8;
    series[2].rsi = 25.0;
    series[2].macd = 0.3;
    series[2].macd_signal = 0.1;
    series[2].adx = 28.0;

    // Overbought at the upper band
    series[3].close = 102.4;
    series[3].rsi = 75.0;
    series[3].macd = 0.5;
    series[3].macd_signal = 0.2;

    let strategy = MeanReversionStrategy::default();
    let all = decisions(&strategy, &series);

    assert_eq!(all[1], (2, SignalKind::EntryLong, "oversold_lower_band"));
    assert_eq!(all[2], (3, SignalKind::ExitLong, "overbought_upper_band"));
}

#[test]
fn test_trend_following_needs_full_ema_stack() {
    let build = |stacked: bool| {
        let mut prev = neutral(0);
        prev.macd = -0.1;
        prev.macd_signal = 0.0;

        let mut cur = neutral(1);
        cur.macd = 0.2;
        cur.macd_signal = 0.0;
        cur.ema_fast = 103.0;
        cur.ema_medium = 102.0;
        cur.ema_slow = if stacked { 101.0 } else { 104.0 };
        cur.close = 103.5;
        cur.volume = 2000.0;
        cur.rsi = 60.0;
        cur.adx = 30.0;
        vec![prev, cur]
    };

    let strategy = TrendFollowingStrategy::default();
    assert_eq!(strategy.evaluate(&build(true)).kind, SignalKind::EntryLong);
    assert_ne!(strategy.evaluate(&build(false)).kind, SignalKind::EntryLong);
}
