//! The application handle: one timer, one store, one clock.
//!
//! Timer commands run inside the model lock. Each one works on a copy of the
//! engine, commits whatever intervals closed together with the resulting timer
//! state, and adopts the copy only after the commit succeeded. Analytics, history
//! and export never touch the model lock; they read the store directly.
//!
//! Lock order is always model, then store connection.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::events::{timestamp, Event};
use crate::export::{self, ExportResult};
use crate::stats::{end_of_day, AnalyticsSummary, RangeQuery, SessionAnalyzer, TimeseriesPoint};
use crate::storage::{
    data_dir, select_projects, select_sessions, select_tags, AppSettings, AppSettingsPatch,
    Database, Project, ProjectInput, ResetCounts, SessionQuery, SessionRecord, Tag, TagInput,
};
use crate::timer::{ContextRequest, StartRequest, TimerEngine, TimerState, Transition};

const EVENT_QUEUE_CAPACITY: usize = 256;

/// Result of [`PulseApp::reset_all_data`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetAllResult {
    pub cleared: ResetCounts,
    pub settings: AppSettings,
    pub timer: TimerState,
}

struct Model {
    settings: AppSettings,
    engine: TimerEngine,
    events: VecDeque<Event>,
}

impl Model {
    fn push_events(&mut self, events: Vec<Event>) {
        for event in events {
            if self.events.len() == EVENT_QUEUE_CAPACITY {
                self.events.pop_front();
            }
            self.events.push_back(event);
        }
    }
}

/// Owned handle over the timer, the session store and the settings file.
///
/// Analytics bucket days in `Tz`, the system's local zone unless replaced with
/// [`PulseApp::with_timezone`].
pub struct PulseApp<Tz = Local> {
    db: Database,
    config_path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
    analyzer: SessionAnalyzer<Tz>,
    model: Mutex<Model>,
}

impl PulseApp<Local> {
    /// Open the default data directory with the system clock.
    pub fn open() -> Result<Self> {
        Self::open_in(&data_dir()?, Arc::new(SystemClock))
    }

    /// Open `pulse.db` and `config.toml` inside `dir`.
    pub fn open_in(dir: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let db = Database::open_at(&dir.join("pulse.db"))?;
        let config_path = dir.join("config.toml");
        let settings = AppSettings::load_from(&config_path)?;
        Self::from_parts(db, settings, Some(config_path), clock)
    }

    /// A throwaway instance: in-memory store, default settings, nothing on disk.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        Self::from_parts(Database::open_memory()?, AppSettings::default(), None, clock)
    }

    fn from_parts(
        db: Database,
        settings: AppSettings,
        config_path: Option<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let engine = match db.load_timer_state()? {
            Some(state) => TimerEngine::from_state(state, &settings),
            None => TimerEngine::new(&settings),
        };
        debug!(status = %engine.status(), phase = %engine.state().phase, "timer loaded");

        Ok(Self {
            db,
            config_path,
            clock,
            analyzer: SessionAnalyzer::default(),
            model: Mutex::new(Model {
                settings,
                engine,
                events: VecDeque::new(),
            }),
        })
    }
}

impl<Tz: TimeZone> PulseApp<Tz> {
    /// Bucket analytics by calendar days in `tz` instead of the local zone.
    pub fn with_timezone<T: TimeZone>(self, tz: T) -> PulseApp<T> {
        PulseApp {
            db: self.db,
            config_path: self.config_path,
            clock: self.clock,
            analyzer: SessionAnalyzer::new(tz),
            model: self.model,
        }
    }

    /// Direct access to the session store.
    pub fn database(&self) -> &Database {
        &self.db
    }

    // The model is only replaced after a successful commit, so a poisoned lock
    // still guards a consistent value.
    fn lock_model(&self) -> MutexGuard<'_, Model> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `command` on a copy of the engine and adopt it once persisted.
    fn run_timer<F>(&self, command: F) -> Result<TimerState>
    where
        F: FnOnce(&mut TimerEngine, &AppSettings, i64) -> Result<Transition>,
    {
        let now = self.clock.now_ts();
        let mut model = self.lock_model();
        let mut engine = model.engine.clone();
        let transition = command(&mut engine, &model.settings, now)?;
        self.commit(&mut model, engine, transition)?;
        Ok(model.engine.snapshot(now))
    }

    fn commit(&self, model: &mut Model, engine: TimerEngine, transition: Transition) -> Result<()> {
        let records = self.db.commit_interval(&transition.closed, engine.state())?;
        for record in &records {
            info!(
                id = record.id,
                phase = %record.phase,
                duration_sec = record.duration_sec,
                completed = record.completed,
                "session recorded"
            );
        }
        model.engine = engine;
        model.push_events(transition.events);
        Ok(())
    }

    /// Log context ids that do not resolve. Binding to them is still allowed.
    fn check_context(&self, context: &ContextRequest) {
        if let Some(Some(id)) = context.project_id {
            if !self.db.project_exists(id).unwrap_or(true) {
                warn!(project_id = id, "binding timer to unknown project");
            }
        }
        if let Some(Some(id)) = context.tag_id {
            if !self.db.tag_exists(id).unwrap_or(true) {
                warn!(tag_id = id, "binding timer to unknown tag");
            }
        }
    }

    // ── Timer ────────────────────────────────────────────────────────

    pub fn timer_start(&self, request: Option<StartRequest>) -> Result<TimerState> {
        if let Some(request) = &request {
            self.check_context(&request.context);
        }
        self.run_timer(|engine, settings, now| engine.start(request, settings, now))
    }

    pub fn timer_pause(&self) -> Result<TimerState> {
        self.run_timer(|engine, settings, now| engine.pause(settings, now))
    }

    pub fn timer_resume(&self, request: Option<ContextRequest>) -> Result<TimerState> {
        if let Some(request) = &request {
            self.check_context(request);
        }
        self.run_timer(|engine, settings, now| engine.resume(request, settings, now))
    }

    pub fn timer_skip(&self) -> Result<TimerState> {
        self.run_timer(|engine, settings, now| engine.skip(settings, now))
    }

    /// Back to the first focus of a fresh cycle. Elapsed time is recorded first.
    pub fn timer_reset(&self) -> Result<TimerState> {
        let state = self.run_timer(|engine, settings, now| Ok(engine.reset(settings, now)))?;
        info!("timer reset");
        Ok(state)
    }

    /// Current timer with the live countdown applied.
    ///
    /// Persists only when settling closed an interval.
    pub fn timer_get_state(&self) -> Result<TimerState> {
        let now = self.clock.now_ts();
        let mut model = self.lock_model();
        let mut engine = model.engine.clone();
        let transition = engine.settle(&model.settings, now);
        if !transition.closed.is_empty() {
            self.commit(&mut model, engine, transition)?;
        }
        Ok(model.engine.snapshot(now))
    }

    pub fn timer_set_context(&self, request: ContextRequest) -> Result<TimerState> {
        self.check_context(&request);
        self.run_timer(|engine, settings, now| Ok(engine.set_context(&request, settings, now)))
    }

    /// Drain queued events, oldest first.
    pub fn take_events(&self) -> Vec<Event> {
        self.lock_model().events.drain(..).collect()
    }

    // ── Analytics ────────────────────────────────────────────────────

    pub fn analytics_get_summary(&self, range: &RangeQuery) -> Result<AnalyticsSummary> {
        range.validate()?;
        let now = self.clock.now_ts();
        let tz = self.analyzer.timezone();
        let in_range = range.session_query(tz);
        let anchor = self.analyzer.streak_anchor(range, now);
        let up_to_anchor = SessionQuery {
            from: None,
            until: Some(end_of_day(anchor, tz)),
            project_id: range.project_id,
            tag_id: range.tag_id,
        };

        let (sessions, history) = self.db.read(|conn| {
            Ok((
                select_sessions(conn, &in_range)?,
                select_sessions(conn, &up_to_anchor)?,
            ))
        })?;
        Ok(self.analyzer.summary(range, &sessions, &history, now))
    }

    pub fn analytics_get_timeseries(&self, range: &RangeQuery) -> Result<Vec<TimeseriesPoint>> {
        let sessions = self.session_history(range)?;
        Ok(self.analyzer.timeseries(range, &sessions))
    }

    /// Sessions that ended inside `range`, oldest first.
    pub fn session_history(&self, range: &RangeQuery) -> Result<Vec<SessionRecord>> {
        range.validate()?;
        self.db.query_sessions(&range.session_query(self.analyzer.timezone()))
    }

    // ── Export ───────────────────────────────────────────────────────

    pub fn export_csv(&self, range: &RangeQuery) -> Result<ExportResult> {
        let sessions = self.session_history(range)?;
        Ok(export::render_csv(range, &sessions))
    }

    pub fn export_json(&self, range: &RangeQuery) -> Result<ExportResult> {
        range.validate()?;
        let query = range.session_query(self.analyzer.timezone());
        let (sessions, projects, tags) = self.db.read(|conn| {
            Ok((
                select_sessions(conn, &query)?,
                select_projects(conn)?,
                select_tags(conn)?,
            ))
        })?;
        export::render_json(range, projects, tags, sessions)
    }

    // ── Projects & tags ──────────────────────────────────────────────

    pub fn projects_list(&self) -> Result<Vec<Project>> {
        self.db.list_projects()
    }

    pub fn projects_upsert(&self, input: &ProjectInput) -> Result<Project> {
        self.db.upsert_project(input, self.clock.now_ts())
    }

    pub fn projects_delete(&self, id: i64) -> Result<()> {
        self.db.delete_project(id)
    }

    pub fn tags_list(&self) -> Result<Vec<Tag>> {
        self.db.list_tags()
    }

    pub fn tags_upsert(&self, input: &TagInput) -> Result<Tag> {
        self.db.upsert_tag(input, self.clock.now_ts())
    }

    pub fn tags_delete(&self, id: i64) -> Result<()> {
        self.db.delete_tag(id)
    }

    // ── Settings ─────────────────────────────────────────────────────

    pub fn settings_get(&self) -> AppSettings {
        self.lock_model().settings.clone()
    }

    pub fn settings_update(&self, patch: AppSettingsPatch) -> Result<AppSettings> {
        let mut model = self.lock_model();
        let mut settings = model.settings.clone();
        settings.apply_patch(patch);
        self.replace_settings(&mut model, settings)
    }

    /// Set one key (`focus_min`, `autoAdvance`, ...) from its string form.
    pub fn settings_set(&self, key: &str, value: &str) -> Result<AppSettings> {
        let mut model = self.lock_model();
        let mut settings = model.settings.clone();
        settings.set(key, value)?;
        self.replace_settings(&mut model, settings)
    }

    pub fn settings_reset(&self) -> Result<AppSettings> {
        let mut model = self.lock_model();
        self.replace_settings(&mut model, AppSettings::default())
    }

    fn replace_settings(&self, model: &mut Model, settings: AppSettings) -> Result<AppSettings> {
        let mut engine = model.engine.clone();
        engine.sync_settings(&settings);
        self.save_settings_then(&settings, || self.db.save_timer_state(engine.state()))?;

        model.engine = engine;
        model.settings = settings;
        debug!(settings = ?model.settings, "settings updated");
        Ok(model.settings.clone())
    }

    /// Write `settings` to the config file, then run `persist`. If `persist` fails
    /// the previous file contents are put back.
    fn save_settings_then<T>(
        &self,
        settings: &AppSettings,
        persist: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let Some(path) = &self.config_path else {
            return persist();
        };
        let previous = match std::fs::read(path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        settings.save_to(path)?;

        match persist() {
            Ok(value) => Ok(value),
            Err(e) => {
                let restored = match previous {
                    Some(content) => std::fs::write(path, content),
                    None => std::fs::remove_file(path),
                };
                if let Err(restore) = restored {
                    warn!(error = %restore, path = %path.display(), "config file not restored");
                }
                Err(e)
            }
        }
    }

    // ── Reset ────────────────────────────────────────────────────────

    /// Delete every session, project and tag, and restore default settings and a
    /// fresh timer. The in-progress interval is discarded, not recorded.
    pub fn reset_all_data(&self) -> Result<ResetAllResult> {
        let now = self.clock.now_ts();
        let mut model = self.lock_model();

        let settings = AppSettings::default();
        let engine = TimerEngine::new(&settings);
        let cleared = self.save_settings_then(&settings, || self.db.reset_all(engine.state()))?;

        model.settings = settings;
        model.engine = engine;
        model.events.clear();
        model.push_events(vec![Event::DataReset { at: timestamp(now) }]);
        info!(
            sessions = cleared.sessions,
            projects = cleared.projects,
            tags = cleared.tags,
            "all data reset"
        );

        Ok(ResetAllResult {
            cleared,
            settings: model.settings.clone(),
            timer: model.engine.snapshot(now),
        })
    }
}
