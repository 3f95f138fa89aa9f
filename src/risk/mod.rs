// Risk management module
pub mod circuit_breakers;
pub mod protection;
pub mod sizing;

pub use circuit_breakers::{
    cumulative_drawdown, CooldownPeriod, LockScope, MaxDrawdown, ProtectionGuard, ProtectionLock,
    StoplossGuard,
};
pub use protection::{GlobalProtection, ProtectionConfig, ProtectionManager, ProtectionState};
pub use sizing::{
    EntryRejection, ExitCheck, PositionSizer, RiskConfig, RoiStep, RoiTable, SizingDecision,
    TrailingStopConfig,
};
