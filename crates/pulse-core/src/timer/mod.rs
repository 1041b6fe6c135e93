mod engine;
mod phase;
mod state;

pub use engine::{TimerEngine, Transition};
pub use phase::{next_phase, TimerPhase};
pub use state::{ContextRequest, StartRequest, TimerState, TimerStatus};
