//! Filter criteria for the task list endpoint.
//!
//! The client translates criteria into query parameters; the server
//! evaluates them against its task table. The match predicate lives
//! here so both sides agree on the semantics.

use serde::{Deserialize, Serialize};

use crate::task::Task;

/// Completion-status filter for the list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// No restriction on completion state.
    #[default]
    All,
    /// Only completed tasks.
    Complete,
    /// Only incomplete tasks.
    Incomplete,
}

impl StatusFilter {
    /// Parses the query-parameter spelling. Unrecognized values fall
    /// back to `All`, matching the server's lenient handling.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "complete" => Self::Complete,
            "incomplete" => Self::Incomplete,
            _ => Self::All,
        }
    }

    /// The query-parameter spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Complete => "complete",
            Self::Incomplete => "incomplete",
        }
    }
}

/// User filter input for a fetch. Absent criteria mean "no
/// restriction"; the empty value fetches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Case-insensitive substring match against title or description.
    #[serde(default)]
    pub search: Option<String>,
    /// Exact category match.
    #[serde(default)]
    pub category: Option<String>,
    /// Completion-status restriction.
    #[serde(default)]
    pub status: Option<StatusFilter>,
}

impl FilterCriteria {
    /// True when no criterion is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.search.is_none() && self.category.is_none() && self.status.is_none()
    }

    /// Translates the criteria into `(key, value)` query pairs for the
    /// list request. Unset criteria produce no pair.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        pairs
    }

    /// Server-side evaluation of the criteria against one task.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_description = task
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_title && !in_description {
                return false;
            }
        }
        if let Some(category) = &self.category
            && task.category.as_deref() != Some(category.as_str())
        {
            return false;
        }
        match self.status.unwrap_or_default() {
            StatusFilter::All => true,
            StatusFilter::Complete => task.completed,
            StatusFilter::Incomplete => !task.completed,
        }
    }
}
