use std::time::Duration;

use crate::io::kv::KvStore;
use crate::io::recovery::RecoveryCategory;
use crate::io::state::{SESSION_KEY, read_blob, remove_blob, write_blob};
use crate::model::list::ALL_LIST_ID;
use crate::model::session::{BREAK_WARNING_SECS, FocusSession, SessionState, cycle_count_for};
use crate::ops::ticker::Ticker;

/// Read-only view of the task store that the focus machine depends on.
/// The dependency runs one way: the store never sees the focus machine.
pub trait TaskDirectory {
    fn active_list_id(&self) -> &str;
    fn task_list_id(&self, task_id: &str) -> Option<&str>;

    fn contains_task(&self, task_id: &str) -> bool {
        self.task_list_id(task_id).is_some()
    }
}

/// Which sound a tick asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chime {
    Transition,
    Warning,
}

/// What a single tick did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    /// No session, or the session is paused
    Idle,
    /// Elapsed time updated, same phase
    Counting,
    /// Work/break boundary crossed; carries the new state
    PhaseChanged(SessionState),
    /// Break is about to end
    Warning,
    /// Final break finished
    Completed,
    /// The phase clock ran past a whole extra phase (process was not
    /// running to tick it); the session is dropped
    Expired,
}

impl TickEvent {
    pub fn chime(self) -> Option<Chime> {
        match self {
            TickEvent::PhaseChanged(_) | TickEvent::Completed => Some(Chime::Transition),
            TickEvent::Warning => Some(Chime::Warning),
            TickEvent::Idle | TickEvent::Counting | TickEvent::Expired => None,
        }
    }
}

/// Result of advancing a session snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    pub session: Option<FocusSession>,
    /// One-shot break warning flag after this tick
    pub warned: bool,
    pub event: TickEvent,
}

/// Compute the next session snapshot from the previous one and the clock.
///
/// Pure: the caller owns persistence and chimes. A paused session comes
/// back unchanged.
pub fn advance(prev: &FocusSession, warned: bool, now_ms: i64) -> Advance {
    if !prev.is_active {
        return Advance {
            session: Some(prev.clone()),
            warned,
            event: TickEvent::Idle,
        };
    }

    let elapsed = (now_ms.saturating_sub(prev.start_time).max(0) / 1000) as u64;
    let phase = prev.phase_duration();

    if elapsed >= phase && prev.is_break && prev.current_cycle >= prev.cycle_count {
        return Advance {
            session: None,
            warned: false,
            event: TickEvent::Completed,
        };
    }

    if elapsed >= 2 * phase {
        return Advance {
            session: None,
            warned: false,
            event: TickEvent::Expired,
        };
    }

    if elapsed >= phase {
        let mut next = prev.clone();
        if prev.is_break {
            next.is_break = false;
            next.current_cycle += 1;
        } else {
            next.is_break = true;
        }
        next.elapsed_seconds = 0;
        next.start_time = now_ms;
        return Advance {
            event: TickEvent::PhaseChanged(next.state()),
            session: Some(next),
            warned: false,
        };
    }

    let mut next = prev.clone();
    next.elapsed_seconds = elapsed;
    let warn_now = prev.is_break && !warned && phase - elapsed <= BREAK_WARNING_SECS;
    Advance {
        session: Some(next),
        warned: warned || warn_now,
        event: if warn_now {
            TickEvent::Warning
        } else {
            TickEvent::Counting
        },
    }
}

/// Read the persisted session. A snapshot outside its cycle or phase bounds
/// is preserved in the recovery log and removed.
fn read_session<K: KvStore>(kv: &K) -> Option<FocusSession> {
    let session: FocusSession = read_blob(kv, SESSION_KEY)?;
    if session.is_consistent() {
        return Some(session);
    }
    tracing::warn!(task = %session.task_id, "discarding inconsistent focus session");
    if let Some(raw) = kv.get(SESSION_KEY) {
        kv.preserve(
            RecoveryCategory::Malformed,
            SESSION_KEY,
            &raw,
            "focus session outside its cycle or phase bounds",
        );
    }
    remove_blob(kv, SESSION_KEY);
    None
}

/// Owner of the (at most one) focus session.
pub struct FocusMachine<K: KvStore> {
    kv: K,
    session: Option<FocusSession>,
    warned: bool,
}

impl<K: KvStore> FocusMachine<K> {
    pub fn load(kv: K) -> Self {
        let session = read_session(&kv);
        FocusMachine {
            kv,
            session,
            warned: false,
        }
    }

    /// Pick up a session written by another process. Returns true if the
    /// snapshot changed.
    pub fn reload(&mut self) -> bool {
        let fresh = read_session(&self.kv);
        if fresh == self.session {
            return false;
        }
        let same_phase = match (&fresh, &self.session) {
            (Some(a), Some(b)) => a.task_id == b.task_id && a.state() == b.state(),
            _ => false,
        };
        if !same_phase {
            self.warned = false;
        }
        self.session = fresh;
        true
    }

    pub fn session(&self) -> Option<&FocusSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> SessionState {
        SessionState::of(self.session.as_ref())
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_active)
    }

    /// Start a new session, replacing any existing one. Sessions start paused.
    pub fn start_session(
        &mut self,
        task_id: &str,
        task_color: Option<String>,
        duration_minutes: u32,
        now_ms: i64,
    ) {
        let session = FocusSession {
            task_id: task_id.to_string(),
            task_color,
            duration_minutes,
            elapsed_seconds: 0,
            is_break: false,
            cycle_count: cycle_count_for(duration_minutes),
            current_cycle: 1,
            is_active: false,
            start_time: now_ms,
        };
        tracing::info!(
            task = task_id,
            minutes = duration_minutes,
            cycles = session.cycle_count,
            "focus session started"
        );
        self.warned = false;
        self.replace(Some(session));
    }

    pub fn stop_session(&mut self) {
        if self.session.is_some() {
            tracing::info!("focus session stopped");
        }
        self.warned = false;
        self.replace(None);
    }

    pub fn pause_session(&mut self) -> bool {
        let Some(mut session) = self.session.clone() else {
            return false;
        };
        session.is_active = false;
        self.replace(Some(session));
        true
    }

    /// Resume so that elapsed time continues from where it stopped, however
    /// long the pause was.
    pub fn resume_session(&mut self, now_ms: i64) -> bool {
        let Some(mut session) = self.session.clone() else {
            return false;
        };
        session.is_active = true;
        let elapsed_ms = i64::try_from(session.elapsed_seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        session.start_time = now_ms.saturating_sub(elapsed_ms);
        self.replace(Some(session));
        true
    }

    pub fn tick(&mut self, now_ms: i64) -> TickEvent {
        let Some(prev) = self.session.as_ref() else {
            return TickEvent::Idle;
        };
        if !prev.is_active {
            return TickEvent::Idle;
        }
        let Advance {
            session,
            warned,
            event,
        } = advance(prev, self.warned, now_ms);
        match event {
            TickEvent::PhaseChanged(state) => tracing::info!(?state, "focus phase changed"),
            TickEvent::Completed => tracing::info!("focus session completed"),
            TickEvent::Expired => tracing::warn!("focus session expired while not running"),
            _ => {}
        }
        self.warned = warned;
        self.replace(session);
        event
    }

    /// Stop a running session whose task lives outside the newly active
    /// list. The catch-all list keeps every session.
    pub fn on_active_list_changed(&mut self, tasks: &dyn TaskDirectory) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        if !session.is_active {
            return false;
        }
        let active = tasks.active_list_id();
        if active == ALL_LIST_ID {
            return false;
        }
        match tasks.task_list_id(&session.task_id) {
            Some(list_id) if list_id != active => {
                tracing::info!(list = active, "focus task not in active list");
                self.stop_session();
                true
            }
            _ => false,
        }
    }

    /// Whole-snapshot replacement plus persistence
    fn replace(&mut self, session: Option<FocusSession>) {
        self.session = session;
        match &self.session {
            Some(s) => write_blob(&self.kv, SESSION_KEY, s),
            None => remove_blob(&self.kv, SESSION_KEY),
        }
    }
}

/// Stop a session that points at a task which no longer exists. Called by
/// consumers after loading and after deleting tasks or lists.
pub fn reconcile_session<K: KvStore>(focus: &mut FocusMachine<K>, tasks: &dyn TaskDirectory) -> bool {
    let dangling = focus
        .session()
        .is_some_and(|s| !tasks.contains_task(&s.task_id));
    if dangling {
        tracing::info!("focus task no longer exists");
        focus.stop_session();
    }
    dangling
}

/// Current wall clock in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Drives a `FocusMachine` from a `Ticker`.
///
/// The ticker only exists while the session is active. Every operation
/// that can change activity re-syncs it, so pausing or stopping cancels
/// the timer before the next tick.
pub struct FocusRunner<K: KvStore> {
    machine: FocusMachine<K>,
    ticker: Option<Ticker>,
    period: Duration,
    clock: fn() -> i64,
}

impl<K: KvStore> FocusRunner<K> {
    pub fn new(machine: FocusMachine<K>, period: Duration) -> Self {
        let mut runner = FocusRunner {
            machine,
            ticker: None,
            period,
            clock: now_millis,
        };
        runner.sync_ticker();
        runner
    }

    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn machine(&self) -> &FocusMachine<K> {
        &self.machine
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn pause(&mut self) -> bool {
        let changed = self.machine.pause_session();
        self.sync_ticker();
        changed
    }

    pub fn resume(&mut self) -> bool {
        let changed = self.machine.resume_session((self.clock)());
        self.sync_ticker();
        changed
    }

    pub fn stop(&mut self) {
        self.machine.stop_session();
        self.sync_ticker();
    }

    /// Re-read the persisted session, e.g. after another process wrote it
    pub fn reload(&mut self) -> bool {
        let changed = self.machine.reload();
        self.sync_ticker();
        changed
    }

    pub fn on_active_list_changed(&mut self, tasks: &dyn TaskDirectory) -> bool {
        let stopped = self.machine.on_active_list_changed(tasks);
        self.sync_ticker();
        stopped
    }

    pub fn reconcile(&mut self, tasks: &dyn TaskDirectory) -> bool {
        let stopped = reconcile_session(&mut self.machine, tasks);
        self.sync_ticker();
        stopped
    }

    /// Block up to `timeout` for the ticker. Returns true when a tick is
    /// due; without a running session this just sleeps.
    pub fn wait_tick(&self, timeout: Duration) -> bool {
        let Some(ticker) = &self.ticker else {
            std::thread::sleep(timeout);
            return false;
        };
        if ticker.recv_timeout(timeout).is_none() {
            return false;
        }
        // ticks that queued up while we were busy collapse into one
        ticker.drain();
        true
    }

    /// Advance the session to the current clock
    pub fn tick(&mut self) -> TickEvent {
        let event = self.machine.tick((self.clock)());
        self.sync_ticker();
        event
    }

    fn sync_ticker(&mut self) {
        match (self.machine.is_active(), self.ticker.is_some()) {
            (true, false) => self.ticker = Some(Ticker::start(self.period)),
            (false, true) => {
                if let Some(t) = self.ticker.take() {
                    t.cancel();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::kv::MemoryKvStore;
    use crate::model::session::{BREAK_PHASE_SECS, WORK_PHASE_SECS};
    use pretty_assertions::assert_eq;

    const T0: i64 = 1_700_000_000_000;

    fn at(secs: u64) -> i64 {
        T0 + (secs as i64) * 1000
    }

    fn machine() -> FocusMachine<MemoryKvStore> {
        FocusMachine::load(MemoryKvStore::new())
    }

    struct Dir {
        active: &'static str,
        tasks: Vec<(&'static str, &'static str)>,
    }

    impl TaskDirectory for Dir {
        fn active_list_id(&self) -> &str {
            self.active
        }

        fn task_list_id(&self, task_id: &str) -> Option<&str> {
            self.tasks
                .iter()
                .find(|(id, _)| *id == task_id)
                .map(|(_, list)| *list)
        }
    }

    #[test]
    fn start_is_paused_with_cycle_count() {
        let mut m = machine();
        m.start_session("t1", Some("rose".into()), 60, T0);
        let s = m.session().unwrap();
        assert!(!s.is_active);
        assert_eq!(s.cycle_count, 2);
        assert_eq!(s.current_cycle, 1);
        assert_eq!(s.elapsed_seconds, 0);
        assert_eq!(m.state(), SessionState::Working(1));
        // paused sessions don't move
        assert_eq!(m.tick(at(100)), TickEvent::Idle);
        assert_eq!(m.session().unwrap().elapsed_seconds, 0);
    }

    #[test]
    fn pause_resume_does_not_drift() {
        let mut m = machine();
        m.start_session("t1", None, 30, T0);
        m.resume_session(at(0));
        assert_eq!(m.tick(at(10)), TickEvent::Counting);
        m.pause_session();
        // 50 s pass while paused
        m.resume_session(at(60));
        m.tick(at(65));
        assert_eq!(m.session().unwrap().elapsed_seconds, 15);
    }

    #[test]
    fn sixty_minute_session_end_to_end() {
        let mut m = machine();
        m.start_session("t1", None, 60, T0);
        m.resume_session(at(0));

        let mut now = 0;
        let mut events = Vec::new();
        while m.session().is_some() {
            now += 1;
            let event = m.tick(at(now));
            if event != TickEvent::Counting {
                events.push((now, event));
            }
            assert!(now < 10_000, "session never finished");
        }

        let work = WORK_PHASE_SECS;
        let brk = BREAK_PHASE_SECS;
        assert_eq!(
            events,
            vec![
                (work, TickEvent::PhaseChanged(SessionState::Break(1))),
                (work + brk - 30, TickEvent::Warning),
                (work + brk, TickEvent::PhaseChanged(SessionState::Working(2))),
                (2 * work + brk, TickEvent::PhaseChanged(SessionState::Break(2))),
                (2 * work + 2 * brk - 30, TickEvent::Warning),
                (2 * work + 2 * brk, TickEvent::Completed),
            ]
        );
        assert_eq!(m.state(), SessionState::Idle);
        assert!(m.kv.get(SESSION_KEY).is_none());
    }

    #[test]
    fn warning_fires_once_per_break() {
        let mut m = machine();
        m.start_session("t1", None, 30, T0);
        m.resume_session(at(0));
        m.tick(at(WORK_PHASE_SECS));
        let break_start = WORK_PHASE_SECS;
        assert_eq!(m.tick(at(break_start + 271)), TickEvent::Warning);
        assert_eq!(m.tick(at(break_start + 272)), TickEvent::Counting);
        assert_eq!(m.tick(at(break_start + 280)), TickEvent::Counting);
    }

    #[test]
    fn long_gap_expires_instead_of_fast_forwarding() {
        let mut m = machine();
        m.start_session("t1", None, 120, T0);
        m.resume_session(at(0));
        assert_eq!(m.tick(at(3 * WORK_PHASE_SECS)), TickEvent::Expired);
        assert!(m.session().is_none());
        assert_eq!(TickEvent::Expired.chime(), None);
    }

    #[test]
    fn final_break_completes_even_after_a_long_gap() {
        let mut m = machine();
        m.start_session("t1", None, 30, T0);
        m.resume_session(at(0));
        assert_eq!(
            m.tick(at(WORK_PHASE_SECS)),
            TickEvent::PhaseChanged(SessionState::Break(1))
        );
        // more than twice the break length passes with nothing ticking
        let late = WORK_PHASE_SECS + 2 * BREAK_PHASE_SECS + 100;
        assert_eq!(m.tick(at(late)), TickEvent::Completed);
        assert!(m.session().is_none());
    }

    #[test]
    fn out_of_bounds_session_is_discarded_on_load() {
        let kv = MemoryKvStore::new();
        let raw = r#"{"taskId":"t1","durationMinutes":30,"elapsedSeconds":100000000000000000,"isBreak":false,"cycleCount":1,"currentCycle":1,"isActive":false,"startTime":1700000000000}"#;
        kv.set(SESSION_KEY, raw).unwrap();

        let mut m = FocusMachine::load(kv.clone());
        assert!(m.session().is_none());
        assert!(kv.get(SESSION_KEY).is_none());
        assert!(!m.resume_session(T0));
    }

    #[test]
    fn out_of_bounds_session_is_ignored_on_reload() {
        let kv = MemoryKvStore::new();
        let mut m = FocusMachine::load(kv.clone());
        m.start_session("t1", None, 60, T0);

        // another writer leaves a cycle past the session's end
        let raw = r#"{"taskId":"t1","durationMinutes":60,"elapsedSeconds":0,"isBreak":false,"cycleCount":2,"currentCycle":7,"isActive":true,"startTime":1700000000000}"#;
        kv.set(SESSION_KEY, raw).unwrap();
        assert!(m.reload());
        assert!(m.session().is_none());
        assert!(kv.get(SESSION_KEY).is_none());
    }

    #[test]
    fn out_of_bounds_session_is_preserved_in_recovery_log() {
        use crate::io::kv::FileKvStore;
        use crate::io::recovery::read_recovery_entries;

        let tmp = tempfile::TempDir::new().unwrap();
        let kv = FileKvStore::open(tmp.path()).unwrap();
        let raw = r#"{"taskId":"t1","durationMinutes":90,"elapsedSeconds":0,"isBreak":false,"cycleCount":9,"currentCycle":1,"isActive":false,"startTime":1700000000000}"#;
        kv.set(SESSION_KEY, raw).unwrap();

        let m = FocusMachine::load(kv);
        assert!(m.session().is_none());
        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Malformed);
        assert_eq!(entries[0].body.trim_end(), raw);
    }

    #[test]
    fn resume_saturates_instead_of_overflowing() {
        let mut m = machine();
        m.session = Some(FocusSession {
            task_id: "t1".into(),
            task_color: None,
            duration_minutes: 30,
            elapsed_seconds: u64::MAX,
            is_break: false,
            cycle_count: 1,
            current_cycle: 1,
            is_active: false,
            start_time: T0,
        });
        assert!(m.resume_session(T0));
        assert_eq!(m.session().unwrap().start_time, T0 - i64::MAX);
    }

    #[test]
    fn clock_going_backwards_counts_as_zero() {
        let mut m = machine();
        m.start_session("t1", None, 30, at(100));
        m.resume_session(at(100));
        assert_eq!(m.tick(at(50)), TickEvent::Counting);
        assert_eq!(m.session().unwrap().elapsed_seconds, 0);
    }

    #[test]
    fn session_persists_and_reloads() {
        let kv = MemoryKvStore::new();
        let mut a = FocusMachine::load(kv.clone());
        a.start_session("t1", Some("teal".into()), 45, T0);

        let mut b = FocusMachine::load(kv.clone());
        assert_eq!(b.session(), a.session());

        a.resume_session(at(5));
        assert!(b.reload());
        assert!(b.is_active());
        assert!(!b.reload());

        a.stop_session();
        assert!(b.reload());
        assert!(b.session().is_none());
    }

    #[test]
    fn switching_list_stops_running_session_for_other_list() {
        let mut m = machine();
        m.start_session("t1", None, 30, T0);
        m.resume_session(at(0));

        let dir = Dir {
            active: "all",
            tasks: vec![("t1", "work")],
        };
        assert!(!m.on_active_list_changed(&dir));

        let dir = Dir {
            active: "work",
            ..dir
        };
        assert!(!m.on_active_list_changed(&dir));

        let dir = Dir {
            active: "personal",
            ..dir
        };
        assert!(m.on_active_list_changed(&dir));
        assert!(m.session().is_none());
    }

    #[test]
    fn switching_list_leaves_paused_session_alone() {
        let mut m = machine();
        m.start_session("t1", None, 30, T0);
        let dir = Dir {
            active: "personal",
            tasks: vec![("t1", "work")],
        };
        assert!(!m.on_active_list_changed(&dir));
        assert!(m.session().is_some());
    }

    #[test]
    fn reconcile_stops_dangling_session() {
        let mut m = machine();
        m.start_session("gone", None, 30, T0);
        let dir = Dir {
            active: "all",
            tasks: vec![("t1", "work")],
        };
        assert!(reconcile_session(&mut m, &dir));
        assert!(m.session().is_none());
        assert!(!reconcile_session(&mut m, &dir));
    }

    #[test]
    fn chimes() {
        assert_eq!(
            TickEvent::PhaseChanged(SessionState::Break(1)).chime(),
            Some(Chime::Transition)
        );
        assert_eq!(TickEvent::Completed.chime(), Some(Chime::Transition));
        assert_eq!(TickEvent::Warning.chime(), Some(Chime::Warning));
        assert_eq!(TickEvent::Counting.chime(), None);
    }

    fn fixed_clock() -> i64 {
        T0 + 3_000
    }

    #[test]
    fn runner_ticks_only_while_active() {
        let mut m = machine();
        m.start_session("t1", None, 30, T0);
        let mut runner = FocusRunner::new(m, Duration::from_millis(5)).with_clock(fixed_clock);
        assert!(!runner.is_ticking());

        runner.resume();
        assert!(runner.is_ticking());
        assert!(runner.wait_tick(Duration::from_secs(2)));
        assert_eq!(runner.tick(), TickEvent::Counting);

        runner.pause();
        assert!(!runner.is_ticking());
        assert!(!runner.wait_tick(Duration::from_millis(1)));

        runner.resume();
        runner.stop();
        assert!(!runner.is_ticking());
        assert!(runner.machine().session().is_none());
    }
}
