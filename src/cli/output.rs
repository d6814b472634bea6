use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::model::list::{ListSlug, TaskList};
use crate::model::prefs::{SortOption, Theme};
use crate::model::session::{FocusSession, SessionState};
use crate::model::task::{Priority, Task};
use crate::ops::focus::TickEvent;
use crate::ops::interpret::Effect;
use crate::ops::reminders::Reminder;
use crate::util::unicode::{pad_to_width, single_line, truncate_to_width};

/// Titles wider than this are cut in one-line listings
const TITLE_WIDTH: usize = 60;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub list_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
    pub created_at: String,
    pub reminder_sent: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<NoteJson>,
}

#[derive(Serialize)]
pub struct NoteJson {
    pub id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct ListingJson {
    pub list_id: String,
    pub list_name: String,
    pub sort: SortOption,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub search: String,
    pub show_completed: bool,
    pub tasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct ListJson {
    pub id: String,
    pub name: String,
    pub slug: ListSlug,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub builtin: bool,
    pub active: bool,
    pub open: usize,
    pub done: usize,
}

#[derive(Serialize)]
pub struct ViewJson {
    pub active_list: String,
    pub search: String,
    pub sort: SortOption,
    pub show_completed: bool,
    pub theme: Theme,
}

#[derive(Serialize)]
pub struct SessionJson {
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub phase: &'static str,
    pub cycle: u32,
    pub cycle_count: u32,
    pub elapsed_seconds: u64,
    pub remaining_seconds: u64,
    pub running: bool,
}

/// One line of `tn focus run --json` output
#[derive(Serialize)]
pub struct FocusEventJson {
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionJson>,
}

#[derive(Serialize)]
pub struct ReminderJson {
    pub task_id: String,
    pub title: String,
    pub body: String,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub fn task_to_json(task: &Task, list_name: Option<&str>) -> TaskJson {
    TaskJson {
        id: task.id.clone(),
        title: task.title.clone(),
        description: task.description.clone(),
        completed: task.completed,
        priority: task.priority,
        due_date: task.due_date.as_ref().map(iso),
        list_id: task.list_id.clone(),
        list_name: list_name.map(str::to_string),
        created_at: iso(&task.created_at),
        reminder_sent: task.reminder_sent(),
        notes: task
            .notes
            .iter()
            .map(|n| NoteJson {
                id: n.id.clone(),
                content: n.content.clone(),
                created_at: iso(&n.created_at),
                updated_at: iso(&n.updated_at),
            })
            .collect(),
    }
}

pub fn session_to_json(session: &FocusSession, task_title: Option<&str>) -> SessionJson {
    SessionJson {
        task_id: session.task_id.clone(),
        task_title: task_title.map(str::to_string),
        color: session.task_color.clone(),
        phase: phase_name(session),
        cycle: session.current_cycle,
        cycle_count: session.cycle_count,
        elapsed_seconds: session.elapsed_seconds,
        remaining_seconds: session.remaining_seconds(),
        running: session.is_active,
    }
}

pub fn event_name(event: TickEvent) -> &'static str {
    match event {
        TickEvent::Idle => "idle",
        TickEvent::Counting => "tick",
        TickEvent::PhaseChanged(SessionState::Break(_)) => "break",
        TickEvent::PhaseChanged(_) => "work",
        TickEvent::Warning => "break-ending",
        TickEvent::Completed => "completed",
        TickEvent::Expired => "expired",
    }
}

pub fn reminder_to_json(reminder: &Reminder) -> ReminderJson {
    ReminderJson {
        task_id: reminder.task_id.clone(),
        title: reminder.title.clone(),
        body: reminder.body.clone(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// First eight characters; enough to be a unique prefix in practice
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub fn format_time<Tz>(dt: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    dt.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string()
}

fn checkbox(task: &Task) -> &'static str {
    if task.completed { "[x]" } else { "[ ]" }
}

/// One-line summary: `[ ] 1a2b3c4d Buy milk !high due 2025-06-01 12:00 @Personal`
pub fn format_task_line<Tz>(task: &Task, list_name: Option<&str>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut line = format!(
        "{} {} {}",
        checkbox(task),
        short_id(&task.id),
        truncate_to_width(&single_line(&task.title), TITLE_WIDTH)
    );
    if task.priority != Priority::Medium {
        line.push_str(&format!(" !{}", task.priority.as_str()));
    }
    if let Some(due) = &task.due_date {
        line.push_str(&format!(" due {}", format_time(due, tz)));
    }
    if !task.notes.is_empty() {
        line.push_str(&format!(" +{}n", task.notes.len()));
    }
    if let Some(name) = list_name {
        line.push_str(&format!(" @{}", name));
    }
    line
}

/// Full task view with description and notes
pub fn format_task_detail<Tz>(task: &Task, list_name: Option<&str>, tz: &Tz) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut lines = vec![format!("{} {} {}", checkbox(task), task.id, task.title)];
    lines.push(format!("list: {}", list_name.unwrap_or(&task.list_id)));
    lines.push(format!("priority: {}", task.priority.as_str()));
    if let Some(due) = &task.due_date {
        let reminded = if task.reminder_sent() { " (reminded)" } else { "" };
        lines.push(format!("due: {}{}", format_time(due, tz), reminded));
    }
    lines.push(format!("created: {}", format_time(&task.created_at, tz)));

    if let Some(desc) = &task.description {
        lines.push("description:".to_string());
        for l in desc.lines() {
            lines.push(format!("  {}", l));
        }
    }
    if !task.notes.is_empty() {
        lines.push("notes:".to_string());
        for note in &task.notes {
            lines.push(format!(
                "  {} {}  {}",
                short_id(&note.id),
                format_time(&note.created_at, tz),
                single_line(&note.content)
            ));
        }
    }
    lines
}

/// Heading for `tn ls`, naming the filters in effect
pub fn format_listing_header(list_name: &str, sort: SortOption, search: &str, show_completed: bool) -> String {
    let mut header = format!("== {} ==", list_name);
    if sort != SortOption::Manual {
        header.push_str(&format!("  sort: {}", sort.as_str()));
    }
    if !search.is_empty() {
        header.push_str(&format!("  search: \"{}\"", search));
    }
    if show_completed {
        header.push_str("  +completed");
    }
    header
}

/// Row for `tn lists`; `*` marks the active list
pub fn format_list_row(list: &TaskList, active: bool, open: usize, done: usize, name_width: usize) -> String {
    let marker = if active { "*" } else { " " };
    let color = list
        .color
        .as_deref()
        .map(|c| format!("  [{}]", c))
        .unwrap_or_default();
    format!(
        "{} {}  {}  {} open, {} done{}",
        marker,
        pad_to_width(&list.name, name_width),
        short_id(&list.id),
        open,
        done,
        color
    )
}

fn phase_name(session: &FocusSession) -> &'static str {
    if session.is_break { "break" } else { "work" }
}

/// `mm:ss`
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// `work 1/2  24:10 left  Buy milk (paused)`
pub fn format_session(session: &FocusSession, task_title: Option<&str>) -> String {
    let mut line = format!(
        "{} {}/{}  {} left",
        phase_name(session),
        session.current_cycle,
        session.cycle_count,
        format_clock(session.remaining_seconds())
    );
    if let Some(title) = task_title {
        line.push_str("  ");
        line.push_str(&truncate_to_width(&single_line(title), TITLE_WIDTH));
    }
    if !session.is_active {
        line.push_str(" (paused)");
    }
    line
}

pub fn format_effect(effect: &Effect) -> String {
    match effect {
        Effect::TaskCreated { id, title, list_id } => {
            format!("created {} {} @{}", short_id(id), title, list_id)
        }
        Effect::SearchSet { query } if query.is_empty() => "search cleared".to_string(),
        Effect::SearchSet { query } => format!("search: \"{}\"", query),
        Effect::ListCreated { id, name, color } => match color {
            Some(c) => format!("created list {} {} [{}]", short_id(id), name, c),
            None => format!("created list {} {}", short_id(id), name),
        },
        Effect::TasksCompleted { ids } => format!("completed {} task(s)", ids.len()),
        Effect::TasksDeleted { ids } => format!("deleted {} task(s)", ids.len()),
        Effect::AwaitingConfirmation { message } => {
            format!("{}\nrun `tn confirm` to proceed or `tn cancel` to drop it", message)
        }
        Effect::Advisory { message } => message.clone(),
    }
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

pub fn parse_priority(s: &str) -> Result<Priority, String> {
    Priority::parse(&s.to_lowercase())
        .ok_or_else(|| format!("unknown priority '{}' (expected: low, medium, high)", s))
}

pub fn parse_sort(s: &str) -> Result<SortOption, String> {
    SortOption::parse(&s.to_lowercase()).ok_or_else(|| {
        format!(
            "unknown sort mode '{}' (expected: manual, time-asc, time-desc, priority)",
            s
        )
    })
}

pub fn parse_theme(s: &str) -> Result<Theme, String> {
    Theme::parse(&s.to_lowercase()).ok_or_else(|| format!("unknown theme '{}' (expected: light, dark)", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::list::default_lists;
    use crate::model::task::Note;
    use insta::assert_snapshot;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, d, h, m, 0).unwrap()
    }

    fn task() -> Task {
        let mut t = Task::new("Write report".into(), "work".into(), Priority::Medium, Some(at(1, 12, 0)), at(1, 8, 0));
        t.id = "1a2b3c4d-0000-4000-8000-000000000000".into();
        t
    }

    #[test]
    fn task_line_variants() {
        let mut t = task();
        assert_snapshot!(format_task_line(&t, Some("Work"), &Utc), @"[ ] 1a2b3c4d Write report due 2025-06-01 12:00 @Work");

        t.completed = true;
        t.priority = Priority::High;
        t.due_date = None;
        t.title = "A very long title that keeps going well past the sixty cell limit of a row".into();
        assert_snapshot!(format_task_line(&t, None, &Utc), @"[x] 1a2b3c4d A very long title that keeps going well past the sixty cell… !high");
    }

    #[test]
    fn task_detail() {
        let mut t = task();
        t.completed = true;
        t.reminder_sent = Some(true);
        t.description = Some("first line\nsecond line".into());
        let mut note = Note::new("check the  figures".into(), at(1, 9, 30));
        note.id = "n1".into();
        t.notes.push(note);

        assert_snapshot!(format_task_detail(&t, Some("Work"), &Utc).join("\n"), @r"
        [x] 1a2b3c4d-0000-4000-8000-000000000000 Write report
        list: Work
        priority: medium
        due: 2025-06-01 12:00 (reminded)
        created: 2025-06-01 08:00
        description:
          first line
          second line
        notes:
          n1 2025-06-01 09:30  check the figures
        ");
    }

    #[test]
    fn listing_header_names_filters() {
        assert_eq!(format_listing_header("All Tasks", SortOption::Manual, "", false), "== All Tasks ==");
        assert_eq!(
            format_listing_header("Work", SortOption::TimeDesc, "rep", true),
            "== Work ==  sort: time-desc  search: \"rep\"  +completed"
        );
    }

    #[test]
    fn list_rows_align() {
        let mut lists = default_lists();
        lists.push(TaskList {
            id: "e5f6a7b8-1111".into(),
            name: "Errands".into(),
            slug: ListSlug::Custom,
            color: Some("teal".into()),
        });
        let rows: Vec<String> = lists
            .iter()
            .enumerate()
            .map(|(i, l)| format_list_row(l, i == 3, i, 0, 9))
            .collect();
        assert_snapshot!(rows.join("\n"), @r"
          All Tasks  all  0 open, 0 done
          Personal   personal  1 open, 0 done
          Work       work  2 open, 0 done
        * Errands    e5f6a7b8  3 open, 0 done  [teal]
        ");
    }

    #[test]
    fn session_line() {
        let session = FocusSession {
            task_id: "t1".into(),
            task_color: None,
            duration_minutes: 60,
            elapsed_seconds: 290,
            is_break: false,
            cycle_count: 2,
            current_cycle: 1,
            is_active: false,
            start_time: 0,
        };
        assert_eq!(format_session(&session, Some("Write report")), "work 1/2  20:10 left  Write report (paused)");
        assert_eq!(format_clock(65), "01:05");
    }

    #[test]
    fn effect_lines() {
        assert_eq!(
            format_effect(&Effect::TaskCreated {
                id: "1a2b3c4d-9".into(),
                title: "Buy milk".into(),
                list_id: "personal".into()
            }),
            "created 1a2b3c4d Buy milk @personal"
        );
        assert_eq!(format_effect(&Effect::SearchSet { query: String::new() }), "search cleared");
        assert_eq!(format_effect(&Effect::TasksDeleted { ids: vec!["a".into(), "b".into()] }), "deleted 2 task(s)");
    }

    #[test]
    fn tick_event_names() {
        assert_eq!(event_name(TickEvent::PhaseChanged(SessionState::Break(1))), "break");
        assert_eq!(event_name(TickEvent::PhaseChanged(SessionState::Working(2))), "work");
        assert_eq!(event_name(TickEvent::Warning), "break-ending");
    }

    #[test]
    fn parse_args() {
        assert_eq!(parse_priority("HIGH"), Ok(Priority::High));
        assert!(parse_priority("urgent").is_err());
        assert_eq!(parse_sort("time-desc"), Ok(SortOption::TimeDesc));
        assert_eq!(parse_theme("dark"), Ok(Theme::Dark));
    }

    #[test]
    fn task_json_shape() {
        let json = serde_json::to_value(task_to_json(&task(), Some("Work"))).unwrap();
        assert_eq!(json["due_date"], "2025-06-01T12:00:00Z");
        assert_eq!(json["priority"], "medium");
        assert_eq!(json["list_name"], "Work");
        assert!(json.get("notes").is_none());
    }
}
