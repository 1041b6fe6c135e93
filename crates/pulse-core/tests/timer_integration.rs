//! Integration tests for the timer workflow.
//!
//! Drives `PulseApp` end to end with a manual clock: commands, the session log they
//! produce, restarts from disk and failure of the store mid-close.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::Utc;
use pulse_core::{
    AppSettingsPatch, ContextRequest, CoreError, Event, ManualClock, PulseApp, SessionQuery,
    StartRequest, TimerPhase, TimerStatus,
};

const T0: i64 = 1_717_200_000;

fn app() -> (PulseApp<Utc>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let app = PulseApp::in_memory(clock.clone()).unwrap().with_timezone(Utc);
    (app, clock)
}

#[test]
fn test_seven_skips_walk_a_full_cycle() {
    let (app, _clock) = app();
    let first = app.timer_start(None).unwrap();
    assert_eq!((first.phase, first.cycle_index), (TimerPhase::Focus, 0));

    let mut visited = vec![(first.phase, first.cycle_index)];
    for _ in 0..7 {
        let state = app.timer_skip().unwrap();
        visited.push((state.phase, state.cycle_index));
    }

    use TimerPhase::*;
    assert_eq!(
        visited,
        vec![
            (Focus, 0),
            (ShortBreak, 1),
            (Focus, 1),
            (ShortBreak, 2),
            (Focus, 2),
            (ShortBreak, 3),
            (Focus, 3),
            (LongBreak, 0),
        ]
    );

    let sessions = app.database().query_sessions(&SessionQuery::default()).unwrap();
    assert_eq!(sessions.len(), 7);
    assert!(sessions.iter().all(|s| !s.completed && s.duration_sec == 0));
}

#[test]
fn test_pause_ten_minutes_resume_five_then_skip() {
    let (app, clock) = app();
    app.timer_start(None).unwrap();

    clock.advance(10 * 60);
    let paused = app.timer_pause().unwrap();
    assert_eq!(paused.remaining_seconds, 900);
    assert_eq!(paused.status, TimerStatus::Paused);
    assert_eq!(paused.started_at, None);

    clock.advance(5 * 60);
    app.timer_resume(None).unwrap();
    app.timer_skip().unwrap();

    let sessions = app.database().query_sessions(&SessionQuery::default()).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].duration_sec, 600);
    assert_eq!(sessions[0].interruptions, 1);
    assert_eq!(sessions[0].started_at, T0);
    assert_eq!(sessions[0].ended_at, T0 + 15 * 60);
}

#[test]
fn test_natural_completion_without_auto_advance() {
    let (app, clock) = app();
    app.settings_update(AppSettingsPatch {
        auto_advance: Some(false),
        ..AppSettingsPatch::default()
    })
    .unwrap();
    app.timer_start(None).unwrap();

    clock.advance(2 * 3600);
    let state = app.timer_get_state().unwrap();
    assert_eq!(state.status, TimerStatus::Idle);
    assert_eq!(state.phase, TimerPhase::ShortBreak);
    assert_eq!(state.remaining_seconds, 5 * 60);

    let sessions = app.database().query_sessions(&SessionQuery::default()).unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].completed);
    assert_eq!(sessions[0].duration_sec, 25 * 60);
    assert_eq!(sessions[0].ended_at, T0 + 25 * 60);

    let events = app.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::PhaseCompleted {
            completed_phase: TimerPhase::Focus,
            skipped: false,
            ..
        }
    )));
}

#[test]
fn test_context_binding_flows_into_records() {
    let (app, clock) = app();
    let project = app
        .projects_upsert(&pulse_core::ProjectInput {
            name: "Thesis".into(),
            ..Default::default()
        })
        .unwrap();

    let start = StartRequest::from(ContextRequest::bind(Some(project.id), Some(99)));
    let state = app.timer_start(Some(start)).unwrap();
    assert_eq!(state.project_id, Some(project.id));
    assert_eq!(state.tag_id, Some(99));

    // An absent field keeps the binding, an explicit null clears it.
    let request: ContextRequest = serde_json::from_str(r#"{"tagId":null}"#).unwrap();
    clock.advance(30);
    let state = app.timer_set_context(request).unwrap();
    assert_eq!(state.project_id, Some(project.id));
    assert_eq!(state.tag_id, None);
    assert_eq!(state.remaining_seconds, 25 * 60 - 30);

    app.timer_skip().unwrap();
    let sessions = app.database().query_sessions(&SessionQuery::default()).unwrap();
    assert_eq!(sessions[0].project_id, Some(project.id));
    assert_eq!(sessions[0].tag_id, None);
}

#[test]
fn test_reset_flushes_then_returns_to_first_focus() {
    let (app, clock) = app();
    app.timer_start(None).unwrap();
    app.timer_skip().unwrap();
    clock.advance(120);

    let state = app.timer_reset().unwrap();
    assert_eq!(state.status, TimerStatus::Idle);
    assert_eq!(state.phase, TimerPhase::Focus);
    assert_eq!(state.cycle_index, 0);

    let sessions = app.database().query_sessions(&SessionQuery::default()).unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[1].phase, TimerPhase::ShortBreak);
    assert_eq!(sessions[1].duration_sec, 120);
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    {
        let app = PulseApp::open_in(dir.path(), clock.clone()).unwrap();
        app.timer_start(None).unwrap();
        clock.advance(300);
        app.timer_pause().unwrap();
    }

    clock.advance(3600);
    let app = PulseApp::open_in(dir.path(), clock.clone()).unwrap();
    let state = app.timer_get_state().unwrap();
    assert_eq!(state.status, TimerStatus::Paused);
    assert_eq!(state.remaining_seconds, 25 * 60 - 300);
    assert_eq!(state.interruptions, 1);
    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_running_timer_expires_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    {
        let app = PulseApp::open_in(dir.path(), clock.clone()).unwrap();
        app.timer_start(None).unwrap();
    }

    clock.advance(8 * 3600);
    let app = PulseApp::open_in(dir.path(), clock.clone()).unwrap();
    let state = app.timer_get_state().unwrap();

    // The focus interval is recorded once; the break starts when the expiry was noticed.
    let sessions = app.database().query_sessions(&SessionQuery::default()).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].ended_at, T0 + 25 * 60);
    assert_eq!(state.phase, TimerPhase::ShortBreak);
    assert_eq!(state.started_at, Some(T0 + 8 * 3600));
}

#[test]
fn test_store_failure_keeps_pre_close_state() {
    let (app, clock) = app();
    app.timer_start(None).unwrap();
    clock.advance(200);
    let before = app.timer_get_state().unwrap();
    app.take_events();

    app.database()
        .conn()
        .unwrap()
        .execute_batch("DROP TABLE sessions")
        .unwrap();

    let err = app.timer_skip().unwrap_err();
    assert!(err.is_persistence());
    assert!(matches!(err, CoreError::Database(_)));

    let after = app.timer_get_state().unwrap();
    assert_eq!(after, before);
    assert!(app.take_events().is_empty());
}

#[test]
fn test_invalid_transitions_report_status() {
    let (app, _clock) = app();
    let err = app.timer_resume(None).unwrap_err();
    assert_eq!(err.to_string(), "cannot resume while timer is idle");
    assert!(matches!(
        app.timer_skip(),
        Err(CoreError::InvalidTransition { action: "skip", .. })
    ));
}

/// Run `command` on `threads` threads released at the same moment.
fn race<T, F>(app: &Arc<PulseApp<Utc>>, threads: usize, command: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize, &PulseApp<Utc>) -> T + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(threads));
    let command = Arc::new(command);
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let app = Arc::clone(app);
            let barrier = Arc::clone(&barrier);
            let command = Arc::clone(&command);
            thread::spawn(move || {
                barrier.wait();
                command(i, &app)
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn test_racing_commands_close_an_expired_interval_once() {
    let (app, clock) = app();
    app.settings_update(AppSettingsPatch {
        auto_advance: Some(false),
        ..AppSettingsPatch::default()
    })
    .unwrap();
    app.timer_start(None).unwrap();
    clock.advance(25 * 60 + 90);
    let app = Arc::new(app);

    let answered = race(&app, 8, |i, app| {
        if i % 2 == 1 {
            app.timer_get_state().unwrap();
            return false;
        }
        match app.timer_skip() {
            Ok(_) => true,
            Err(CoreError::InvalidTransition {
                action: "skip",
                status: TimerStatus::Idle,
            }) => false,
            Err(e) => panic!("unexpected error: {e}"),
        }
    });
    assert!(answered.iter().filter(|ok| **ok).count() <= 1);

    let sessions = app.database().query_sessions(&SessionQuery::default()).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].phase, TimerPhase::Focus);
    assert!(sessions[0].completed);
    assert_eq!(sessions[0].ended_at, T0 + 25 * 60);

    let state = app.timer_get_state().unwrap();
    assert_eq!(state.status, TimerStatus::Idle);
    assert_eq!(state.phase, TimerPhase::ShortBreak);
}

#[test]
fn test_racing_reads_auto_advance_exactly_once() {
    let (app, clock) = app();
    app.timer_start(None).unwrap();
    clock.advance(25 * 60 + 30);
    let app = Arc::new(app);

    let states = race(&app, 8, |_, app| app.timer_get_state().unwrap());
    assert!(states.iter().all(|s| s.phase == TimerPhase::ShortBreak));
    assert!(states.iter().all(|s| s.started_at == Some(T0 + 25 * 60 + 30)));

    let sessions = app.database().query_sessions(&SessionQuery::default()).unwrap();
    let mut keys: Vec<(TimerPhase, i64)> = sessions.iter().map(|s| (s.phase, s.ended_at)).collect();
    keys.dedup();
    assert_eq!(keys, vec![(TimerPhase::Focus, T0 + 25 * 60)]);
    assert_eq!(sessions.len(), 1);
}
