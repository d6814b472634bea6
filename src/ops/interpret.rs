use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::io::kv::KvStore;
use crate::io::state::{PENDING_ACTION_KEY, read_blob, remove_blob, write_blob};
use crate::model::list::PERSONAL_LIST_ID;
use crate::model::task::{Priority, TaskPatch, parse_due_date};
use crate::ops::store::TaskStore;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z]*").expect("fence pattern is valid"));

/// Errors for command-interpreter input that can't be read at all.
/// Problems with individual actions become advisories instead.
#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error("no actions given")]
    Empty,
    #[error("actions are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("expected an action object or an array of them")]
    NotActions,
}

/// The fixed action vocabulary a command interpreter may produce
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    CreateTask {
        title: String,
        #[serde(default, rename = "listId")]
        list_id: Option<String>,
        #[serde(default)]
        priority: Option<Priority>,
        #[serde(default, rename = "dueDate")]
        due_date: Option<String>,
    },
    SearchTasks {
        #[serde(default)]
        query: String,
    },
    CreateList {
        name: String,
        #[serde(default)]
        color: Option<String>,
    },
    CompleteTask {
        #[serde(default, rename = "taskQuery")]
        task_query: String,
        #[serde(default, rename = "requiresConfirmation")]
        requires_confirmation: Option<bool>,
    },
    #[serde(alias = "delete_tasks")]
    DeleteTask {
        #[serde(default, rename = "taskQuery")]
        task_query: String,
        #[serde(default, rename = "requiresConfirmation")]
        requires_confirmation: Option<bool>,
    },
    Unknown {
        #[serde(default)]
        message: String,
    },
}

const ACTION_TYPES: &[&str] = &[
    "create_task",
    "search_tasks",
    "create_list",
    "complete_task",
    "delete_task",
    "delete_tasks",
    "unknown",
];

/// Read interpreter output into actions.
///
/// Markdown code fences are stripped and a lone object is treated as a
/// one-element array. Each element is decoded separately; elements that
/// don't decode come back as `Err(advisory)`.
pub fn parse_actions(input: &str) -> Result<Vec<Result<Action, String>>, InterpretError> {
    let cleaned = FENCE_RE.replace_all(input, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(InterpretError::Empty);
    }

    let items = match serde_json::from_str::<Value>(cleaned)? {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => return Err(InterpretError::NotActions),
    };
    Ok(items.into_iter().map(decode_action).collect())
}

fn decode_action(item: Value) -> Result<Action, String> {
    let kind = item
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string);
    match kind {
        None => Err("action without a type".to_string()),
        Some(k) if !ACTION_TYPES.contains(&k.as_str()) => {
            Err(format!("unsupported action type \"{}\"", k))
        }
        Some(k) => serde_json::from_value(item).map_err(|e| format!("bad {} action: {}", k, e)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    CompleteTask,
    DeleteTask,
}

impl PendingKind {
    fn verb(self) -> &'static str {
        match self {
            PendingKind::CompleteTask => "complete",
            PendingKind::DeleteTask => "delete",
        }
    }
}

/// A destructive action held until the user confirms or cancels it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    #[serde(rename = "type")]
    pub kind: PendingKind,
    pub task_ids: Vec<String>,
    pub message: String,
}

/// What applying one action did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    TaskCreated {
        id: String,
        title: String,
        list_id: String,
    },
    SearchSet {
        query: String,
    },
    ListCreated {
        id: String,
        name: String,
        color: Option<String>,
    },
    TasksCompleted {
        ids: Vec<String>,
    },
    TasksDeleted {
        ids: Vec<String>,
    },
    AwaitingConfirmation {
        message: String,
    },
    Advisory {
        message: String,
    },
}

/// Applies interpreter actions to a task store and holds the confirmation
/// state for destructive ones.
pub struct Interpreter<K: KvStore> {
    kv: K,
    pending: Option<PendingAction>,
    palette: Vec<String>,
}

impl<K: KvStore> Interpreter<K> {
    pub fn load(kv: K, palette: Vec<String>) -> Self {
        let pending = read_blob(&kv, PENDING_ACTION_KEY);
        Interpreter {
            kv,
            pending,
            palette,
        }
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    /// Parse `input` and apply every action in order
    pub fn apply<S: KvStore>(
        &mut self,
        store: &mut TaskStore<S>,
        input: &str,
    ) -> Result<Vec<Effect>, InterpretError> {
        let actions = parse_actions(input)?;
        let mut effects = Vec::with_capacity(actions.len());
        for action in actions {
            match action {
                Ok(action) => self.apply_action(store, action, &mut effects),
                Err(message) => effects.push(Effect::Advisory { message }),
            }
        }
        Ok(effects)
    }

    fn apply_action<S: KvStore>(
        &mut self,
        store: &mut TaskStore<S>,
        action: Action,
        effects: &mut Vec<Effect>,
    ) {
        match action {
            Action::CreateTask {
                title,
                list_id,
                priority,
                due_date,
            } => {
                let due = match due_date.as_deref() {
                    Some(raw) => {
                        let parsed = parse_due_date(raw);
                        if parsed.is_none() {
                            effects.push(Effect::Advisory {
                                message: format!("Ignored unreadable due date \"{}\"", raw),
                            });
                        }
                        parsed
                    }
                    None => None,
                };
                let list_id = list_id.unwrap_or_else(|| PERSONAL_LIST_ID.to_string());
                let created = store.add_task(&title, &list_id, priority.unwrap_or_default(), due);
                match created.and_then(|id| store.task(&id)) {
                    Some(task) => effects.push(Effect::TaskCreated {
                        id: task.id.clone(),
                        title: task.title.clone(),
                        list_id: task.list_id.clone(),
                    }),
                    None => effects.push(Effect::Advisory {
                        message: "Skipped a task with an empty title".to_string(),
                    }),
                }
            }
            Action::SearchTasks { query } => {
                store.set_search_query(&query);
                effects.push(Effect::SearchSet { query });
            }
            Action::CreateList { name, color } => {
                let color = color.or_else(|| store.next_list_color(&self.palette));
                match store.add_list(&name, color.as_deref()) {
                    Some(id) => effects.push(Effect::ListCreated {
                        id,
                        name: name.trim().to_string(),
                        color,
                    }),
                    None => effects.push(Effect::Advisory {
                        message: "Skipped a list with an empty name".to_string(),
                    }),
                }
            }
            Action::CompleteTask {
                task_query,
                requires_confirmation,
            } => self.destructive(
                store,
                PendingKind::CompleteTask,
                &task_query,
                requires_confirmation != Some(false),
                effects,
            ),
            Action::DeleteTask {
                task_query,
                requires_confirmation,
            } => self.destructive(
                store,
                PendingKind::DeleteTask,
                &task_query,
                requires_confirmation != Some(false),
                effects,
            ),
            Action::Unknown { message } => effects.push(Effect::Advisory { message }),
        }
    }

    fn destructive<S: KvStore>(
        &mut self,
        store: &mut TaskStore<S>,
        kind: PendingKind,
        task_query: &str,
        confirm_first: bool,
        effects: &mut Vec<Effect>,
    ) {
        let query = task_query.to_lowercase();
        let matching: Vec<(String, String)> = store
            .tasks()
            .iter()
            .filter(|t| !t.completed && t.title.to_lowercase().contains(&query))
            .map(|t| (t.id.clone(), t.title.clone()))
            .collect();

        if matching.is_empty() {
            effects.push(Effect::Advisory {
                message: format!("No tasks found matching \"{}\"", task_query),
            });
            return;
        }

        let task_ids: Vec<String> = matching.iter().map(|(id, _)| id.clone()).collect();
        if confirm_first {
            let titles: Vec<&str> = matching.iter().map(|(_, t)| t.as_str()).collect();
            let pending = PendingAction {
                kind,
                message: format!(
                    "Are you sure you want to {} {} task(s)? ({})",
                    kind.verb(),
                    task_ids.len(),
                    titles.join(", ")
                ),
                task_ids,
            };
            effects.push(Effect::AwaitingConfirmation {
                message: pending.message.clone(),
            });
            self.set_pending(Some(pending));
        } else {
            effects.push(execute(store, kind, task_ids));
        }
    }

    /// Run the held action by identifier list and clear it
    pub fn confirm<S: KvStore>(&mut self, store: &mut TaskStore<S>) -> Option<Effect> {
        let pending = self.pending.clone()?;
        self.set_pending(None);
        tracing::info!(kind = ?pending.kind, count = pending.task_ids.len(), "pending action confirmed");
        Some(execute(store, pending.kind, pending.task_ids))
    }

    /// Drop the held action without running it
    pub fn cancel(&mut self) -> Option<PendingAction> {
        let pending = self.pending.clone()?;
        self.set_pending(None);
        Some(pending)
    }

    fn set_pending(&mut self, pending: Option<PendingAction>) {
        self.pending = pending;
        match &self.pending {
            Some(p) => write_blob(&self.kv, PENDING_ACTION_KEY, p),
            None => remove_blob(&self.kv, PENDING_ACTION_KEY),
        }
    }
}

/// Apply a destructive action to whichever of `ids` still exist
fn execute<S: KvStore>(store: &mut TaskStore<S>, kind: PendingKind, ids: Vec<String>) -> Effect {
    match kind {
        PendingKind::CompleteTask => {
            let ids = ids
                .into_iter()
                .filter(|id| {
                    store.update_task(
                        id,
                        TaskPatch {
                            completed: Some(true),
                            ..Default::default()
                        },
                    )
                })
                .collect();
            Effect::TasksCompleted { ids }
        }
        PendingKind::DeleteTask => {
            let ids = ids.into_iter().filter(|id| store.delete_task(id)).collect();
            Effect::TasksDeleted { ids }
        }
    }
}
