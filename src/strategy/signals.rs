use serde::Serialize;

use crate::models::SignalKind;

/// Direction of a crossover between two series at the current candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cross {
    Above,
    Below,
    None,
}

/// Classify the crossover of `a` against `b` between the prior and current candle.
///
/// A crossover requires the sign of `a - b` to flip strictly: a tie on either
/// candle is not a crossover.
pub fn crossover(prev_a: f64, prev_b: f64, a: f64, b: f64) -> Cross {
    let prev = prev_a - prev_b;
    let cur = a - b;

    if prev < 0.0 && cur > 0.0 {
        Cross::Above
    } else if prev > 0.0 && cur < 0.0 {
        Cross::Below
    } else {
        Cross::None
    }
}

pub fn crossed_above(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    crossover(prev_a, prev_b, a, b) == Cross::Above
}

pub fn crossed_below(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    crossover(prev_a, prev_b, a, b) == Cross::Below
}

/// Outcome of a rule evaluation before it is stamped with pair and candle time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub kind: SignalKind,
    pub rule_id: &'static str,
}

impl Decision {
    pub const INSUFFICIENT_DATA: &'static str = "insufficient_data";
    pub const NO_RULE: &'static str = "no_rule";

    pub fn entry(rule_id: &'static str) -> Self {
        Self {
            kind: SignalKind::EntryLong,
            rule_id,
        }
    }

    pub fn exit(rule_id: &'static str) -> Self {
        Self {
            kind: SignalKind::ExitLong,
            rule_id,
        }
    }

    pub fn hold() -> Self {
        Self {
            kind: SignalKind::None,
            rule_id: Self::NO_RULE,
        }
    }

    pub fn insufficient_data() -> Self {
        Self {
            kind: SignalKind::None,
            rule_id: Self::INSUFFICIENT_DATA,
        }
    }
}
