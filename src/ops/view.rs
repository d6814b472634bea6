use std::cmp::Ordering;

use crate::model::list::ALL_LIST_ID;
use crate::model::prefs::SortOption;
use crate::model::task::Task;

/// Everything that decides which tasks are shown, and in what order
#[derive(Debug, Clone, Copy)]
pub struct ViewFilter<'a> {
    pub active_list_id: &'a str,
    pub search_query: &'a str,
    pub sort_by: SortOption,
    pub show_completed: bool,
}

/// Filter and sort `tasks` for display. Never mutates the store: manual
/// order is store order verbatim, other modes sort a copy (stably).
pub fn visible_tasks<'a>(tasks: &'a [Task], filter: &ViewFilter<'_>) -> Vec<&'a Task> {
    let query = filter.search_query.to_lowercase();
    let mut shown: Vec<&Task> = tasks
        .iter()
        .filter(|t| query.is_empty() || t.title.to_lowercase().contains(&query))
        .filter(|t| filter.active_list_id == ALL_LIST_ID || t.list_id == filter.active_list_id)
        .filter(|t| filter.show_completed || !t.completed)
        .collect();

    match filter.sort_by {
        SortOption::Manual => {}
        SortOption::Priority => shown.sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank())),
        SortOption::TimeAsc => shown.sort_by(|a, b| due_ascending(a, b)),
        SortOption::TimeDesc => shown.sort_by(|a, b| due_descending(a, b)),
    }
    shown
}

/// Earliest first, undated last
fn due_ascending(a: &Task, b: &Task) -> Ordering {
    match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Undated first, then latest first
fn due_descending(a: &Task, b: &Task) -> Ordering {
    match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// The id sequence after dragging the item at `from` to `to` within a view.
/// Out-of-range indices are clamped.
pub fn move_in_view(ids: &[String], from: usize, to: usize) -> Vec<String> {
    let mut out = ids.to_vec();
    if out.is_empty() || from >= out.len() {
        return out;
    }
    let item = out.remove(from);
    let to = to.min(out.len());
    out.insert(to, item);
    out
}
