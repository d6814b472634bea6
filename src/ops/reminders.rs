use chrono::{DateTime, Utc};

use crate::io::kv::KvStore;
use crate::model::task::{Task, TaskPatch};
use crate::ops::store::TaskStore;

/// A notification about a task that has come due
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub task_id: String,
    pub title: String,
    pub body: String,
}

impl Reminder {
    fn for_task(task: &Task) -> Self {
        Reminder {
            task_id: task.id.clone(),
            title: format!("Task Due: {}", task.title),
            body: task
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| "This task is due now!".to_string()),
        }
    }
}

/// Delivers reminders to the user. Returns whether delivery worked; a task
/// is only marked as reminded when it did.
pub trait Notifier {
    fn notify(&mut self, reminder: &Reminder) -> bool;
}

/// Incomplete tasks whose due date has passed and that haven't been
/// reminded yet, in store order.
pub fn due_reminders(tasks: &[Task], now: DateTime<Utc>) -> Vec<Reminder> {
    tasks
        .iter()
        .filter(|t| !t.completed && !t.reminder_sent())
        .filter(|t| t.due_date.is_some_and(|due| due <= now))
        .map(Reminder::for_task)
        .collect()
}

/// One notifier poll: deliver every due reminder and set `reminderSent` on
/// each delivered task. Returns the number delivered.
pub fn run_reminder_pass<K: KvStore>(
    store: &mut TaskStore<K>,
    notifier: &mut dyn Notifier,
    now: DateTime<Utc>,
) -> usize {
    let mut delivered = 0;
    for reminder in due_reminders(store.tasks(), now) {
        if !notifier.notify(&reminder) {
            tracing::warn!(task = %reminder.task_id, "reminder not delivered");
            continue;
        }
        store.update_task(
            &reminder.task_id,
            TaskPatch {
                reminder_sent: Some(Some(true)),
                ..Default::default()
            },
        );
        delivered += 1;
    }
    if delivered > 0 {
        tracing::info!(delivered, "reminders sent");
    }
    delivered
}
