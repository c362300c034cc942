//! Priority classification of event type names
//!
//! A classification table is an ordered list of rules. Each rule holds a set of
//! substrings; the first rule with any substring contained in the event name
//! decides the priority. Names matching no rule are `Medium`.

use super::event::Priority;
use serde::{Deserialize, Serialize};

/// One classification rule: any pattern contained in the event name selects `priority`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub priority: Priority,
    pub patterns: Vec<String>,
}

impl ClassificationRule {
    pub fn new<I, S>(priority: Priority, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            priority,
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    fn matches(&self, event_type: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| event_type.contains(pattern.as_str()))
    }
}

/// Ordered rule set evaluated first-match-wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationTable {
    rules: Vec<ClassificationRule>,
}

impl ClassificationTable {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify an event type name. Pure and deterministic.
    pub fn classify(&self, event_type: &str) -> Priority {
        self.rules
            .iter()
            .find(|rule| rule.matches(event_type))
            .map(|rule| rule.priority)
            .unwrap_or(Priority::Medium)
    }
}

impl Default for ClassificationTable {
    fn default() -> Self {
        Self::new(vec![
            ClassificationRule::new(
                Priority::High,
                [
                    "job_saved",
                    "application_generated",
                    "install_click",
                    "error",
                    "profile_saved",
                    "data_export",
                    "data_import",
                    "system_alert",
                    "goal_created",
                    "goal_completed",
                    "goal_deleted",
                    "goal_updated",
                ],
            ),
            ClassificationRule::new(
                Priority::Medium,
                [
                    "generate_click",
                    "tab_switch",
                    "view_details",
                    "interview_prep_click",
                ],
            ),
            ClassificationRule::new(
                Priority::Low,
                [
                    "scroll_depth",
                    "time_on_site",
                    "page_view",
                    "mouse_movement",
                    "card_view",
                ],
            ),
        ])
    }
}
