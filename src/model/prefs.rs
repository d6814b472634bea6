use serde::{Deserialize, Serialize};

use crate::model::list::ALL_LIST_ID;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(s: &str) -> Option<Theme> {
        match s {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

/// How the task view is ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOption {
    /// Store order, the only mode in which reordering is allowed
    #[default]
    Manual,
    TimeAsc,
    TimeDesc,
    Priority,
}

impl SortOption {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOption::Manual => "manual",
            SortOption::TimeAsc => "time-asc",
            SortOption::TimeDesc => "time-desc",
            SortOption::Priority => "priority",
        }
    }

    pub fn parse(s: &str) -> Option<SortOption> {
        match s {
            "manual" => Some(SortOption::Manual),
            "time-asc" => Some(SortOption::TimeAsc),
            "time-desc" => Some(SortOption::TimeDesc),
            "priority" => Some(SortOption::Priority),
            _ => None,
        }
    }
}

/// Filter state that outlives a single command invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    #[serde(default = "default_active_list")]
    pub active_list_id: String,
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub show_completed: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            active_list_id: default_active_list(),
            search_query: String::new(),
            show_completed: false,
        }
    }
}

fn default_active_list() -> String {
    ALL_LIST_ID.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_option_wire_names() {
        assert_eq!(serde_json::to_string(&SortOption::TimeAsc).unwrap(), "\"time-asc\"");
        assert_eq!(
            serde_json::from_str::<SortOption>("\"time-desc\"").unwrap(),
            SortOption::TimeDesc
        );
        for opt in [SortOption::Manual, SortOption::TimeAsc, SortOption::TimeDesc, SortOption::Priority] {
            assert_eq!(SortOption::parse(opt.as_str()), Some(opt));
        }
    }

    #[test]
    fn theme_toggles() {
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::Dark.toggled().toggled(), Theme::Dark);
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"dark\"");
    }

    #[test]
    fn view_state_defaults_on_empty_object() {
        let state: ViewState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, ViewState::default());
        assert_eq!(state.active_list_id, "all");
    }
}
