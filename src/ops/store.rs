use chrono::{DateTime, Utc};

use crate::io::kv::KvStore;
use crate::io::recovery::RecoveryCategory;
use crate::io::state::{
    LISTS_KEY, SORT_KEY, TASKS_KEY, THEME_KEY, VIEW_KEY, read_blob, remove_blob, write_blob,
};
use crate::model::list::{ALL_LIST_ID, PERSONAL_LIST_ID, TaskList, default_lists};
use crate::model::prefs::{SortOption, Theme, ViewState};
use crate::model::task::{Note, Priority, Task, TaskPatch};
use crate::ops::focus::TaskDirectory;
use crate::ops::reorder::reorder_subset;
use crate::ops::view::{ViewFilter, visible_tasks};

/// Owner of the task and list collections plus the view filters.
///
/// Every mutation writes the affected blobs through the key-value store
/// before returning. Operations on unknown ids are no-ops that report
/// `false` (or `None`); nothing here returns an error.
pub struct TaskStore<K: KvStore> {
    kv: K,
    tasks: Vec<Task>,
    lists: Vec<TaskList>,
    view: ViewState,
    theme: Theme,
    sort_by: SortOption,
    clock: fn() -> DateTime<Utc>,
}

impl<K: KvStore> TaskStore<K> {
    /// Load persisted state, falling back to defaults for anything absent or
    /// unreadable. Seeds the built-in lists on first run.
    pub fn load(kv: K) -> Self {
        let tasks: Vec<Task> = read_blob(&kv, TASKS_KEY).unwrap_or_default();
        let lists = read_blob(&kv, LISTS_KEY);
        let first_run = lists.is_none();
        let lists: Vec<TaskList> = lists.unwrap_or_else(default_lists);
        let mut view: ViewState = read_blob(&kv, VIEW_KEY).unwrap_or_default();
        if !lists.iter().any(|l| l.id == view.active_list_id) {
            view.active_list_id = ALL_LIST_ID.to_string();
        }

        let store = TaskStore {
            theme: read_blob(&kv, THEME_KEY).unwrap_or_default(),
            sort_by: read_blob(&kv, SORT_KEY).unwrap_or_default(),
            kv,
            tasks,
            lists,
            view,
            clock: Utc::now,
        };
        if first_run {
            store.save_lists();
        }
        tracing::debug!(
            tasks = store.tasks.len(),
            lists = store.lists.len(),
            "task store loaded"
        );
        store
    }

    /// Replace the wall clock used for creation and note timestamps
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn lists(&self) -> &[TaskList] {
        &self.lists
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn list(&self, id: &str) -> Option<&TaskList> {
        self.lists.iter().find(|l| l.id == id)
    }

    pub fn active_list_id(&self) -> &str {
        &self.view.active_list_id
    }

    pub fn search_query(&self) -> &str {
        &self.view.search_query
    }

    pub fn show_completed(&self) -> bool {
        self.view.show_completed
    }

    pub fn sort_by(&self) -> SortOption {
        self.sort_by
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn view_filter(&self) -> ViewFilter<'_> {
        ViewFilter {
            active_list_id: &self.view.active_list_id,
            search_query: &self.view.search_query,
            sort_by: self.sort_by,
            show_completed: self.view.show_completed,
        }
    }

    /// The tasks the current filters show, in display order
    pub fn visible_tasks(&self) -> Vec<&Task> {
        visible_tasks(&self.tasks, &self.view_filter())
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Add a task at the head of the collection and return its id.
    /// Blank titles are ignored. Tasks aimed at the catch-all list, or at a
    /// list that doesn't exist, land in `personal`.
    pub fn add_task(
        &mut self,
        title: &str,
        list_id: &str,
        priority: Priority,
        due_date: Option<DateTime<Utc>>,
    ) -> Option<String> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        let list_id = if list_id == ALL_LIST_ID || self.list(list_id).is_none() {
            PERSONAL_LIST_ID
        } else {
            list_id
        };

        let task = Task::new(
            title.to_string(),
            list_id.to_string(),
            priority,
            due_date,
            (self.clock)(),
        );
        let id = task.id.clone();
        tracing::info!(id = %id, list = list_id, "task added");
        self.tasks.insert(0, task);
        self.save_tasks();
        Some(id)
    }

    pub fn toggle_task(&mut self, id: &str) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        task.completed = !task.completed;
        tracing::info!(id, completed = task.completed, "task toggled");
        self.save_tasks();
        true
    }

    /// Merge `patch` into the task. No validation across fields.
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        patch.apply_to(task);
        tracing::debug!(id, "task updated");
        self.save_tasks();
        true
    }

    pub fn delete_task(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return false;
        }
        tracing::info!(id, "task deleted");
        self.save_tasks();
        true
    }

    /// Position-preserving partial reorder; see `reorder_subset`.
    /// Unknown or repeated ids leave the collection untouched.
    pub fn reorder_tasks(&mut self, new_ordered_ids: &[String]) -> bool {
        if !reorder_subset(&mut self.tasks, new_ordered_ids, |t| t.id.as_str()) {
            tracing::warn!(count = new_ordered_ids.len(), "reorder refused");
            return false;
        }
        self.save_tasks();
        true
    }

    // -----------------------------------------------------------------------
    // Notes
    // -----------------------------------------------------------------------

    pub fn add_note(&mut self, task_id: &str, content: &str) -> Option<String> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let note = Note::new(content.to_string(), (self.clock)());
        let note_id = note.id.clone();
        let mut notes = self.task(task_id)?.notes.clone();
        notes.push(note);
        self.update_task(
            task_id,
            TaskPatch {
                notes: Some(notes),
                ..Default::default()
            },
        )
        .then_some(note_id)
    }

    pub fn edit_note(&mut self, task_id: &str, note_id: &str, content: &str) -> bool {
        let content = content.trim();
        let now = (self.clock)();
        let Some(mut notes) = self.task(task_id).map(|t| t.notes.clone()) else {
            return false;
        };
        let Some(note) = notes.iter_mut().find(|n| n.id == note_id) else {
            return false;
        };
        if content.is_empty() {
            return false;
        }
        note.content = content.to_string();
        note.updated_at = now;
        self.update_task(
            task_id,
            TaskPatch {
                notes: Some(notes),
                ..Default::default()
            },
        )
    }

    pub fn delete_note(&mut self, task_id: &str, note_id: &str) -> bool {
        let Some(task) = self.task(task_id) else {
            return false;
        };
        if !task.notes.iter().any(|n| n.id == note_id) {
            return false;
        }
        let notes = task.notes.iter().filter(|n| n.id != note_id).cloned().collect();
        self.update_task(
            task_id,
            TaskPatch {
                notes: Some(notes),
                ..Default::default()
            },
        )
    }

    // -----------------------------------------------------------------------
    // Lists
    // -----------------------------------------------------------------------

    /// Append a custom list and make it the active one
    pub fn add_list(&mut self, name: &str, color: Option<&str>) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let list = TaskList::custom(name.to_string(), color.map(str::to_string));
        let id = list.id.clone();
        tracing::info!(id = %id, name, "list added");
        self.lists.push(list);
        self.save_lists();
        self.view.active_list_id = id.clone();
        self.save_view();
        Some(id)
    }

    /// Delete a custom list and every task in it. Built-in lists stay.
    pub fn delete_list(&mut self, id: &str) -> bool {
        match self.list(id) {
            Some(list) if !list.is_builtin() => {}
            _ => return false,
        }
        self.lists.retain(|l| l.id != id);
        let before = self.tasks.len();
        self.tasks.retain(|t| t.list_id != id);
        tracing::info!(id, removed_tasks = before - self.tasks.len(), "list deleted");
        if self.view.active_list_id == id {
            self.view.active_list_id = ALL_LIST_ID.to_string();
            self.save_view();
        }
        self.save_lists();
        self.save_tasks();
        true
    }

    /// First palette color no list uses yet; cycles by list count once every
    /// color is taken.
    pub fn next_list_color(&self, palette: &[String]) -> Option<String> {
        if palette.is_empty() {
            return None;
        }
        let unused = palette
            .iter()
            .find(|c| !self.lists.iter().any(|l| l.color.as_deref() == Some(c.as_str())));
        let color = match unused {
            Some(c) => c,
            None => &palette[self.lists.len() % palette.len()],
        };
        Some(color.clone())
    }

    /// Display color of a task, taken from its list
    pub fn task_color(&self, task_id: &str) -> Option<&str> {
        let task = self.task(task_id)?;
        self.list(&task.list_id)?.color.as_deref()
    }

    // -----------------------------------------------------------------------
    // View state and preferences
    // -----------------------------------------------------------------------

    pub fn set_active_list(&mut self, id: &str) -> bool {
        if self.list(id).is_none() {
            return false;
        }
        if self.view.active_list_id != id {
            self.view.active_list_id = id.to_string();
            self.save_view();
        }
        true
    }

    pub fn set_search_query(&mut self, query: &str) {
        self.view.search_query = query.to_string();
        self.save_view();
    }

    pub fn toggle_show_completed(&mut self) -> bool {
        self.view.show_completed = !self.view.show_completed;
        self.save_view();
        self.view.show_completed
    }

    pub fn set_sort_by(&mut self, sort_by: SortOption) {
        self.sort_by = sort_by;
        write_blob(&self.kv, SORT_KEY, &self.sort_by);
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        write_blob(&self.kv, THEME_KEY, &self.theme);
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.set_theme(self.theme.toggled());
        self.theme
    }

    /// Reset tasks and lists to first-run state. Theme and sort preference
    /// are kept. The erased blobs are preserved in the recovery area.
    pub fn clear_all_data(&mut self) {
        for key in [TASKS_KEY, LISTS_KEY] {
            if let Some(raw) = self.kv.get(key) {
                self.kv
                    .preserve(RecoveryCategory::Delete, key, &raw, "cleared all data");
            }
            remove_blob(&self.kv, key);
        }
        self.tasks.clear();
        self.lists = default_lists();
        self.view.active_list_id = ALL_LIST_ID.to_string();
        self.view.search_query.clear();
        self.save_view();
        tracing::info!("all task data cleared");
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn save_tasks(&self) {
        write_blob(&self.kv, TASKS_KEY, &self.tasks);
    }

    fn save_lists(&self) {
        write_blob(&self.kv, LISTS_KEY, &self.lists);
    }

    fn save_view(&self) {
        write_blob(&self.kv, VIEW_KEY, &self.view);
    }
}

impl<K: KvStore> TaskDirectory for TaskStore<K> {
    fn active_list_id(&self) -> &str {
        &self.view.active_list_id
    }

    fn task_list_id(&self, task_id: &str) -> Option<&str> {
        self.task(task_id).map(|t| t.list_id.as_str())
    }
}
