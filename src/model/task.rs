use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task priority. Ordered so that `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Sort weight used by the priority view (high = 3, low = 1)
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Priority> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// A timestamped note attached to a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(content: String, now: DateTime<Utc>) -> Self {
        Note {
            id: new_id(),
            content,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A single task, as persisted in the `tasks` blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub list_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Vec<Note>,
    /// Set once by the due-date notifier; absent until then
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_sent: Option<bool>,
}

impl Task {
    /// Create a fresh, incomplete task with a new identifier
    pub fn new(
        title: String,
        list_id: String,
        priority: Priority,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Task {
            id: new_id(),
            title,
            description: None,
            completed: false,
            priority,
            due_date,
            list_id,
            created_at: now,
            notes: Vec::new(),
            reminder_sent: None,
        }
    }

    pub fn reminder_sent(&self) -> bool {
        self.reminder_sent.unwrap_or(false)
    }
}

/// A partial update for `TaskStore::update_task`.
///
/// Each `Some` field overwrites the task's value. Nested options
/// (`Some(None)`) clear an optional field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub list_id: Option<String>,
    pub notes: Option<Vec<Note>>,
    pub reminder_sent: Option<Option<bool>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }

    /// Merge the set fields into `task`. No cross-field fixups happen here:
    /// moving the due date leaves `reminder_sent` alone.
    pub fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(list_id) = self.list_id {
            task.list_id = list_id;
        }
        if let Some(notes) = self.notes {
            task.notes = notes;
        }
        if let Some(reminder_sent) = self.reminder_sent {
            task.reminder_sent = reminder_sent;
        }
    }
}

/// Generate an opaque unique identifier
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parse a user- or interpreter-supplied due date.
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD HH:MM` (or with a `T`) in local
/// time, and bare `YYYY-MM-DD`, which means local midnight.
pub fn parse_due_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return local_to_utc(naive);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    local_to_utc(date.and_hms_opt(0, 0, 0)?)
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn priority_ordering_and_rank() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::High.rank(), 3);
        assert_eq!(Priority::parse("low"), Some(Priority::Low));
        assert_eq!(Priority::parse("urgent"), None);
    }

    #[test]
    fn task_json_uses_camel_case_and_iso_dates() {
        let mut task = Task::new("Write report".into(), "work".into(), Priority::High, Some(ts(0)), ts(60));
        task.id = "t1".into();
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["listId"], "work");
        assert_eq!(json["dueDate"], "1970-01-01T00:00:00Z");
        assert_eq!(json["createdAt"], "1970-01-01T00:01:00Z");
        assert_eq!(json["priority"], "high");
        assert!(json.get("reminderSent").is_none());
        assert!(json.get("description").is_none());
    }

    #[test]
    fn task_parses_browser_style_timestamps() {
        let raw = r#"{
            "id": "abc",
            "title": "Buy milk",
            "completed": false,
            "priority": "low",
            "dueDate": "2025-03-01T09:30:00.000Z",
            "listId": "personal",
            "createdAt": "2025-02-28T18:00:00.000Z",
            "notes": []
        }"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert_eq!(task.due_date, Some(Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap()));
        assert!(!task.reminder_sent());
    }

    #[test]
    fn patch_clears_and_sets_fields() {
        let mut task = Task::new("a".into(), "personal".into(), Priority::Medium, Some(ts(10)), ts(0));
        task.reminder_sent = Some(true);
        TaskPatch {
            due_date: Some(None),
            title: Some("b".into()),
            ..Default::default()
        }
        .apply_to(&mut task);
        assert_eq!(task.title, "b");
        assert_eq!(task.due_date, None);
        // untouched
        assert_eq!(task.reminder_sent, Some(true));
    }

    #[test]
    fn empty_patch_is_empty() {
        assert!(TaskPatch::default().is_empty());
        assert!(
            !TaskPatch {
                completed: Some(true),
                ..Default::default()
            }
            .is_empty()
        );
    }

    #[test]
    fn parse_due_date_formats() {
        assert_eq!(
            parse_due_date("2025-03-01T09:30:00.000Z"),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap())
        );
        assert_eq!(
            parse_due_date("2025-03-01T10:30:00+01:00"),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap())
        );

        let local = Local.with_ymd_and_hms(2025, 3, 1, 17, 45, 0).unwrap().with_timezone(&Utc);
        assert_eq!(parse_due_date("2025-03-01 17:45"), Some(local));
        assert_eq!(parse_due_date("2025-03-01T17:45"), Some(local));

        let midnight = Local.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap().with_timezone(&Utc);
        assert_eq!(parse_due_date(" 2025-03-01 "), Some(midnight));

        assert_eq!(parse_due_date("tomorrow"), None);
        assert_eq!(parse_due_date("2025-13-01"), None);
    }
}
