use serde::{Deserialize, Serialize};

/// Identifier of the catch-all list. Tasks never belong to it directly.
pub const ALL_LIST_ID: &str = "all";
pub const PERSONAL_LIST_ID: &str = "personal";
pub const WORK_LIST_ID: &str = "work";

/// Distinguishes the seeded lists from user-created ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListSlug {
    All,
    Personal,
    Work,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: String,
    pub name: String,
    pub slug: ListSlug,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl TaskList {
    /// A new user-created list with a fresh identifier
    pub fn custom(name: String, color: Option<String>) -> Self {
        TaskList {
            id: crate::model::task::new_id(),
            name,
            slug: ListSlug::Custom,
            color,
        }
    }

    /// Built-in lists can't be deleted
    pub fn is_builtin(&self) -> bool {
        self.slug != ListSlug::Custom
    }
}

/// The three lists seeded on first run
pub fn default_lists() -> Vec<TaskList> {
    vec![
        TaskList {
            id: ALL_LIST_ID.to_string(),
            name: "All Tasks".to_string(),
            slug: ListSlug::All,
            color: None,
        },
        TaskList {
            id: PERSONAL_LIST_ID.to_string(),
            name: "Personal".to_string(),
            slug: ListSlug::Personal,
            color: None,
        },
        TaskList {
            id: WORK_LIST_ID.to_string(),
            name: "Work".to_string(),
            slug: ListSlug::Work,
            color: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lists_are_builtin() {
        let lists = default_lists();
        assert_eq!(lists.len(), 3);
        assert!(lists.iter().all(|l| l.is_builtin()));
        assert_eq!(lists[0].id, ALL_LIST_ID);
    }

    #[test]
    fn custom_list_is_deletable() {
        let list = TaskList::custom("Errands".into(), Some("teal".into()));
        assert!(!list.is_builtin());
        assert_eq!(list.slug, ListSlug::Custom);
        assert_ne!(list.id, ALL_LIST_ID);
    }

    #[test]
    fn list_json_shape() {
        let json = serde_json::to_string(&default_lists()[1]).unwrap();
        assert_eq!(json, r#"{"id":"personal","name":"Personal","slug":"personal"}"#);
    }
}
