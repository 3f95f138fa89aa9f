// Candle intake, per-pair evaluation and the async engine
pub mod candle_buffer;
pub mod engine;
pub mod executor;
pub mod position_manager;

pub use candle_buffer::CandleBuffer;
pub use engine::{Engine, EngineEvent, EngineHandle};
pub use executor::{CandleReport, PairEvaluator};
pub use position_manager::{
    ClosedPosition, Exit, ExitContext, ExitReason, Position, PositionManager, PositionStatus,
};
