//! Declarative event routing.
//!
//! Routes are data: an `EventPattern` describes which state-change events a
//! rule accepts, a `NotificationFilter` describes which created objects fire a
//! store notification. The `EventRouter` only evaluates them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::events::{ObjectCreated, StateChangeEvent};

/// Exact-match predicate over event source, type and detail fields.
///
/// An empty list means "any value" for that attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPattern {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<String>,
    #[serde(rename = "detail-type", default, skip_serializing_if = "Vec::is_empty")]
    pub detail_type: Vec<String>,
    /// Dotted field path into the detail document → accepted values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub detail: BTreeMap<String, Vec<String>>,
}

impl EventPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source.push(source.into());
        self
    }

    pub fn with_detail_type(mut self, detail_type: impl Into<String>) -> Self {
        self.detail_type.push(detail_type.into());
        self
    }

    pub fn with_detail(mut self, path: impl Into<String>, values: &[&str]) -> Self {
        self.detail
            .entry(path.into())
            .or_default()
            .extend(values.iter().map(|v| v.to_string()));
        self
    }

    pub fn matches(&self, event: &StateChangeEvent) -> bool {
        if !self.source.is_empty() && !self.source.contains(&event.source) {
            return false;
        }
        if !self.detail_type.is_empty() && !self.detail_type.contains(&event.detail_type) {
            return false;
        }
        self.detail.iter().all(|(path, accepted)| {
            event
                .detail_field(path)
                .and_then(Value::as_str)
                .map(|actual| accepted.iter().any(|v| v == actual))
                .unwrap_or(false)
        })
    }
}

/// A named rule dispatching matching events to a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub name: String,
    pub event_pattern: EventPattern,
    pub target: String,
}

/// Object store notification: fires `target` for created objects whose key
/// matches the optional prefix and suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    pub bucket: String,
    /// Event names, `ObjectCreated:*` style wildcards allowed.
    pub events: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    pub target: String,
}

impl NotificationFilter {
    pub fn matches(&self, event: &ObjectCreated) -> bool {
        if event.bucket != self.bucket {
            return false;
        }
        if !self
            .events
            .iter()
            .any(|pattern| event_name_matches(pattern, &event.event_name))
        {
            return false;
        }
        if let Some(prefix) = &self.prefix {
            if !event.key.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(suffix) = &self.suffix {
            if !event.key.ends_with(suffix.as_str()) {
                return false;
            }
        }
        true
    }
}

/// `ObjectCreated:*` matches `ObjectCreated:Put`; anything else is exact.
fn event_name_matches(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

/// Result of routing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Functions to invoke, each at most once.
    Targets(Vec<String>),
    /// No rule or notification matched.
    Unrouted,
}

impl Route {
    fn from_targets(targets: Vec<String>) -> Self {
        if targets.is_empty() {
            Route::Unrouted
        } else {
            Route::Targets(targets)
        }
    }

    pub fn targets(&self) -> &[String] {
        match self {
            Route::Targets(targets) => targets,
            Route::Unrouted => &[],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventRouter {
    rules: Vec<Rule>,
    notifications: Vec<NotificationFilter>,
}

impl EventRouter {
    pub fn new(rules: Vec<Rule>, notifications: Vec<NotificationFilter>) -> Self {
        Self {
            rules,
            notifications,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn notifications(&self) -> &[NotificationFilter] {
        &self.notifications
    }

    pub fn route_object(&self, event: &ObjectCreated) -> Route {
        let targets = self
            .notifications
            .iter()
            .filter(|n| n.matches(event))
            .map(|n| n.target.clone());
        Route::from_targets(dedup(targets))
    }

    pub fn route_event(&self, event: &StateChangeEvent) -> Route {
        let targets = self
            .rules
            .iter()
            .filter(|r| r.event_pattern.matches(event))
            .map(|r| r.target.clone());
        Route::from_targets(dedup(targets))
    }
}

fn dedup(targets: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for target in targets {
        if !out.contains(&target) {
            out.push(target);
        }
    }
    out
}
