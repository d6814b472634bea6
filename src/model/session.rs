use serde::{Deserialize, Serialize};

/// Length of a work phase in seconds
pub const WORK_PHASE_SECS: u64 = 25 * 60;
/// Length of a break phase in seconds
pub const BREAK_PHASE_SECS: u64 = 5 * 60;
/// How long before the end of a break the warning chime fires
pub const BREAK_WARNING_SECS: u64 = 30;
/// Minutes of configured duration covered by one work+break cycle
pub const CYCLE_MINUTES: u32 = 30;

/// The singleton focus session, persisted as a whole object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub task_id: String,
    /// Snapshot of the list color at start; not kept in sync afterwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_color: Option<String>,
    pub duration_minutes: u32,
    /// Seconds into the current phase as of the last tick
    pub elapsed_seconds: u64,
    pub is_break: bool,
    pub cycle_count: u32,
    /// 1-based
    pub current_cycle: u32,
    pub is_active: bool,
    /// Phase start, milliseconds since the Unix epoch
    pub start_time: i64,
}

/// Where a session stands, derived from the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Working(u32),
    Break(u32),
}

impl SessionState {
    pub fn of(session: Option<&FocusSession>) -> SessionState {
        match session {
            None => SessionState::Idle,
            Some(s) if s.is_break => SessionState::Break(s.current_cycle),
            Some(s) => SessionState::Working(s.current_cycle),
        }
    }
}

impl FocusSession {
    pub fn phase_duration(&self) -> u64 {
        if self.is_break {
            BREAK_PHASE_SECS
        } else {
            WORK_PHASE_SECS
        }
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.phase_duration().saturating_sub(self.elapsed_seconds)
    }

    pub fn state(&self) -> SessionState {
        SessionState::of(Some(self))
    }

    /// Whether the snapshot satisfies the cycle and phase bounds a session
    /// built by the focus machine always keeps.
    pub fn is_consistent(&self) -> bool {
        self.cycle_count == cycle_count_for(self.duration_minutes)
            && (1..=self.cycle_count).contains(&self.current_cycle)
            && self.elapsed_seconds < self.phase_duration()
    }
}

/// Number of work+break cycles for a configured duration: `ceil(minutes / 30)`,
/// never less than one.
pub fn cycle_count_for(duration_minutes: u32) -> u32 {
    duration_minutes.div_ceil(CYCLE_MINUTES).max(1)
}
