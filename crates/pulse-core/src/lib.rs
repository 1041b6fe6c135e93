//! # Pulse Core Library
//!
//! This library provides the core business logic for the pulse focus timer.
//! It follows a CLI-first philosophy: every operation is available through the
//! standalone `pulse` binary, and any graphical shell is a thin layer over the
//! same [`PulseApp`] handle.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine. There is no ticking
//!   thread; every command is stamped by a [`Clock`] and an interval that ran out
//!   is closed lazily on the next command or read
//! - **Storage**: SQLite session log, projects/tags and timer checkpoint, plus
//!   TOML-based settings
//! - **Stats**: Summaries, streaks and daily series over calendar-date ranges
//! - **Export**: CSV and JSON renderings of a range
//!
//! ## Key Components
//!
//! - [`PulseApp`]: Owned application handle and command surface
//! - [`TimerEngine`]: Core timer state machine
//! - [`Database`]: Session and catalog persistence
//! - [`SessionAnalyzer`]: Analytics over stored sessions

pub mod app;
pub mod clock;
pub mod error;
pub mod events;
pub mod export;
pub mod stats;
pub mod storage;
pub mod timer;

pub use app::{PulseApp, ResetAllResult};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use export::{ExportBundle, ExportResult};
pub use stats::{AnalyticsSummary, RangeQuery, SessionAnalyzer, TimeseriesPoint};
pub use storage::{
    AppSettings, AppSettingsPatch, Database, NewSession, Project, ProjectInput, ResetCounts,
    SessionQuery, SessionRecord, Tag, TagInput,
};
pub use timer::{
    next_phase, ContextRequest, StartRequest, TimerEngine, TimerPhase, TimerState, TimerStatus,
};
