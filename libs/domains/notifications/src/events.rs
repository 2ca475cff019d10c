//! Event envelopes published on the `email` and `notification` channels.
//!
//! Both envelopes are flat camelCase JSON records. Empty strings are
//! treated as absent so producers can send `""` for unset fields.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Closed set of domain event types, serialized as their dotted wire tag.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(try_from = "String", into = "&'static str")]
pub enum EventType {
    #[strum(serialize = "task.created")]
    TaskCreated,
    #[strum(serialize = "task.updated")]
    TaskUpdated,
    #[strum(serialize = "task.completed")]
    TaskCompleted,
    #[strum(serialize = "task.deleted")]
    TaskDeleted,
    #[strum(serialize = "task.node.executor.changed")]
    NodeExecutorChanged,
    #[strum(serialize = "task.node.deleted")]
    NodeDeleted,
    #[strum(serialize = "task.deadline.reminder")]
    DeadlineReminder,
    #[strum(serialize = "task.slow.progress")]
    SlowProgress,
    #[strum(serialize = "handover.notification")]
    HandoverNotification,
    #[strum(serialize = "handover.completed")]
    HandoverCompleted,
    #[strum(serialize = "employee.leave")]
    EmployeeLeave,
    #[strum(serialize = "department.notice")]
    DepartmentNotice,
    #[strum(serialize = "company.notice")]
    CompanyNotice,
}

impl EventType {
    /// Dotted wire tag, e.g. `task.node.executor.changed`.
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    pub fn all() -> impl Iterator<Item = EventType> {
        EventType::iter()
    }
}

impl TryFrom<String> for EventType {
    type Error = String;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        tag.parse()
            .map_err(|_| format!("unknown event type '{}'", tag))
    }
}

/// Business identifiers the resolver and generator walk from.
///
/// Never delivered verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correlation {
    pub task_id: Option<String>,
    pub node_id: Option<String>,
    pub employee_id: Option<String>,
    pub employee_ids: Vec<String>,
    pub related_id: Option<String>,
}

impl Correlation {
    /// Task id, falling back to `related_id`.
    pub fn task_ref(&self) -> Option<&str> {
        self.task_id.as_deref().or(self.related_id.as_deref())
    }

    /// Node id, falling back to `related_id`.
    pub fn node_ref(&self) -> Option<&str> {
        self.node_id.as_deref().or(self.related_id.as_deref())
    }

    pub fn related_ref(&self) -> Option<&str> {
        self.related_id.as_deref()
    }

    pub fn employee_ref(&self) -> Option<&str> {
        self.employee_id.as_deref()
    }
}

/// In-app notification event (`notification.<eventType>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub event_type: EventType,
    /// Explicit recipients. When non-empty, resolution is skipped.
    #[serde(default)]
    pub employee_ids: Vec<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<i32>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub related_type: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
}

impl NotificationEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            employee_ids: Vec::new(),
            title: None,
            content: None,
            notification_type: None,
            category: None,
            priority: None,
            related_id: None,
            related_type: None,
            task_id: None,
            node_id: None,
            employee_id: None,
        }
    }

    pub fn with_recipients<I, S>(mut self, employee_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.employee_ids = employee_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_employee(mut self, employee_id: impl Into<String>) -> Self {
        self.employee_id = Some(employee_id.into());
        self
    }

    pub fn with_related(mut self, related_id: impl Into<String>, related_type: impl Into<String>) -> Self {
        self.related_id = Some(related_id.into());
        self.related_type = Some(related_type.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>, notification_type: i32, priority: i32) -> Self {
        self.category = Some(category.into());
        self.notification_type = Some(notification_type);
        self.priority = Some(priority);
        self
    }

    /// Explicit recipients with blanks dropped and duplicates collapsed.
    pub fn explicit_recipients(&self) -> BTreeSet<String> {
        non_blank(&self.employee_ids)
    }

    /// `employeeIds` is the recipient list here, so it is not correlation.
    pub fn correlation(&self) -> Correlation {
        Correlation {
            task_id: self.task_id.clone(),
            node_id: self.node_id.clone(),
            employee_id: self.employee_id.clone(),
            employee_ids: Vec::new(),
            related_id: self.related_id.clone(),
        }
    }
}

/// Outbound email event (`email.<eventType>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailEvent {
    pub event_type: EventType,
    /// Explicit recipient addresses. When non-empty, resolution is skipped.
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub is_html: bool,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub employee_ids: Vec<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
}

impl EmailEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            to: Vec::new(),
            subject: None,
            body: None,
            is_html: false,
            task_id: None,
            node_id: None,
            employee_id: None,
            employee_ids: Vec::new(),
            related_id: None,
        }
    }

    pub fn with_to<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.to = addresses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>, is_html: bool) -> Self {
        self.body = Some(body.into());
        self.is_html = is_html;
        self
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_employee(mut self, employee_id: impl Into<String>) -> Self {
        self.employee_id = Some(employee_id.into());
        self
    }

    pub fn with_employees<I, S>(mut self, employee_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.employee_ids = employee_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_related(mut self, related_id: impl Into<String>) -> Self {
        self.related_id = Some(related_id.into());
        self
    }

    pub fn explicit_recipients(&self) -> BTreeSet<String> {
        non_blank(&self.to)
    }

    pub fn correlation(&self) -> Correlation {
        Correlation {
            task_id: self.task_id.clone(),
            node_id: self.node_id.clone(),
            employee_id: self.employee_id.clone(),
            employee_ids: non_blank(&self.employee_ids).into_iter().collect(),
            related_id: self.related_id.clone(),
        }
    }
}

fn non_blank(ids: &[String]) -> BTreeSet<String> {
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_wire_tags_roundtrip_through_strum() {
        for event_type in EventType::all() {
            let parsed: EventType = event_type.as_str().parse().unwrap();
            assert_eq!(parsed, event_type);
        }
        assert_eq!(EventType::NodeExecutorChanged.to_string(), "task.node.executor.changed");
    }

    #[test]
    fn test_unknown_event_type_fails_decoding() {
        let result: Result<NotificationEvent, _> =
            serde_json::from_str(r#"{"eventType":"task.exploded"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_notification_event_wire_shape() {
        let json = r#"{
            "eventType": "task.node.executor.changed",
            "employeeIds": [],
            "title": "", "content": "",
            "type": 3, "category": "handover", "priority": 2,
            "relatedId": "node-123", "relatedType": "task",
            "taskId": "", "nodeId": "node-123"
        }"#;

        let event: NotificationEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, EventType::NodeExecutorChanged);
        assert!(event.explicit_recipients().is_empty());
        assert_eq!(event.title, None);
        assert_eq!(event.content, None);
        assert_eq!(event.task_id, None);
        assert_eq!(event.notification_type, Some(3));
        assert_eq!(event.category.as_deref(), Some("handover"));
        assert_eq!(event.correlation().node_ref(), Some("node-123"));
    }

    #[test]
    fn test_decode_email_event_wire_shape() {
        let json = r#"{
            "eventType": "task.deadline.reminder",
            "to": [], "subject": "", "body": "", "isHtml": true,
            "taskId": "", "nodeId": "node-123", "employeeId": "",
            "employeeIds": [], "relatedId": ""
        }"#;

        let event: EmailEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, EventType::DeadlineReminder);
        assert!(event.is_html);
        assert_eq!(event.subject, None);
        let correlation = event.correlation();
        assert_eq!(correlation.node_id.as_deref(), Some("node-123"));
        assert_eq!(correlation.employee_id, None);
        assert_eq!(correlation.related_id, None);
    }

    #[test]
    fn test_minimal_envelope_decodes_with_defaults() {
        let event: EmailEvent = serde_json::from_str(r#"{"eventType":"employee.leave"}"#).unwrap();
        assert!(event.to.is_empty());
        assert!(!event.is_html);
    }

    #[test]
    fn test_serialized_event_uses_wire_tag() {
        let event = NotificationEvent::new(EventType::TaskCompleted).with_task("task-1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "task.completed");
        assert_eq!(json["taskId"], "task-1");
        assert!(json.get("title").is_none());
    }

    #[test]
    fn test_explicit_recipients_drop_blanks_and_duplicates() {
        let event = NotificationEvent::new(EventType::EmployeeLeave)
            .with_recipients(["emp-2", "", "emp-1", "emp-2", "  "]);
        let recipients: Vec<_> = event.explicit_recipients().into_iter().collect();
        assert_eq!(recipients, vec!["emp-1".to_string(), "emp-2".to_string()]);
    }

    #[test]
    fn test_correlation_fallbacks() {
        let correlation = Correlation {
            related_id: Some("rel-1".to_string()),
            ..Correlation::default()
        };
        assert_eq!(correlation.task_ref(), Some("rel-1"));
        assert_eq!(correlation.node_ref(), Some("rel-1"));

        let correlation = Correlation {
            task_id: Some("task-1".to_string()),
            related_id: Some("rel-1".to_string()),
            ..Correlation::default()
        };
        assert_eq!(correlation.task_ref(), Some("task-1"));
    }
}
