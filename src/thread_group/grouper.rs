use regex::Regex;

use crate::event::Event;

#[derive(Debug, Clone)]
struct GroupingRule {
    pattern: Regex,
    group: String,
}

/// Maps an event to the thread group it belongs to
///
/// Without rules every thread is its own group. Rules are tried in order;
/// the first whose pattern matches the thread name wins, and its group
/// template may refer to capture groups (`$1`, `${name}`).
#[derive(Debug, Clone, Default)]
pub struct ThreadGrouper {
    rules: Vec<GroupingRule>,
}

impl ThreadGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule
    ///
    /// # Errors
    /// Returns the regex compile error for an invalid pattern.
    pub fn with_rule(mut self, pattern: &str, group: impl Into<String>) -> Result<Self, regex::Error> {
        self.rules.push(GroupingRule {
            pattern: Regex::new(pattern)?,
            group: group.into(),
        });
        Ok(self)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Group key for a thread name
    pub fn group_name(&self, thread: &str) -> String {
        for rule in &self.rules {
            if let Some(caps) = rule.pattern.captures(thread) {
                let mut group = String::new();
                caps.expand(&rule.group, &mut group);
                return group;
            }
        }
        thread.to_string()
    }

    /// Group key for an event; events without a thread have none
    pub fn group_of(&self, event: &Event) -> Option<String> {
        event.thread_name().map(|thread| self.group_name(thread))
    }
}
