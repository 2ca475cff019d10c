//! Event registry: one row per event type naming its recipient rule,
//! content rule and notification defaults.

use crate::channels::Channel;
use crate::error::{NotificationError, NotificationResult};
use crate::events::EventType;
use crate::templates::TemplateEngine;
use tracing::info;

/// How recipients are derived when the event names none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientRule {
    /// Task creator ∪ every node leader ∪ every node executor.
    TaskParticipants,
    /// The named employee if given, else the node leader.
    NodeLeaderOrNamed,
    NodeLeaderAndExecutor,
    NodeExecutor,
    /// Both handover parties, or only the side the event names.
    HandoverParties,
    /// Exactly the employees the event lists. No traversal.
    ExplicitEmployees,
    DepartmentMembers,
    CompanyMembers,
}

/// Which data record content generation assembles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRule {
    Task,
    Node,
    Handover,
    Employee,
    Department,
    Company,
}

/// Notification metadata used when the event omits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationDefaults {
    pub notification_type: i32,
    pub category: &'static str,
    pub priority: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRules {
    pub event_type: EventType,
    pub recipients: RecipientRule,
    pub content: ContentRule,
    pub defaults: NotificationDefaults,
}

const TASK: NotificationDefaults = NotificationDefaults {
    notification_type: 1,
    category: "task",
    priority: 1,
};
const REMINDER: NotificationDefaults = NotificationDefaults {
    notification_type: 2,
    category: "reminder",
    priority: 2,
};
const HANDOVER: NotificationDefaults = NotificationDefaults {
    notification_type: 3,
    category: "handover",
    priority: 2,
};
const EMPLOYEE: NotificationDefaults = NotificationDefaults {
    notification_type: 4,
    category: "employee",
    priority: 2,
};
const NOTICE: NotificationDefaults = NotificationDefaults {
    notification_type: 5,
    category: "notice",
    priority: 1,
};

const fn row(
    event_type: EventType,
    recipients: RecipientRule,
    content: ContentRule,
    defaults: NotificationDefaults,
) -> EventRules {
    EventRules {
        event_type,
        recipients,
        content,
        defaults,
    }
}

/// The dispatch table.
pub const EVENT_RULES: &[EventRules] = &[
    row(EventType::TaskCreated, RecipientRule::TaskParticipants, ContentRule::Task, TASK),
    row(EventType::TaskUpdated, RecipientRule::TaskParticipants, ContentRule::Task, TASK),
    row(EventType::TaskCompleted, RecipientRule::TaskParticipants, ContentRule::Task, TASK),
    row(EventType::TaskDeleted, RecipientRule::TaskParticipants, ContentRule::Task, TASK),
    row(EventType::NodeExecutorChanged, RecipientRule::NodeLeaderOrNamed, ContentRule::Node, HANDOVER),
    row(EventType::NodeDeleted, RecipientRule::NodeLeaderAndExecutor, ContentRule::Node, TASK),
    row(
        EventType::DeadlineReminder,
        RecipientRule::NodeExecutor,
        ContentRule::Node,
        NotificationDefaults { priority: 3, ..REMINDER },
    ),
    row(EventType::SlowProgress, RecipientRule::NodeLeaderAndExecutor, ContentRule::Node, REMINDER),
    row(EventType::HandoverNotification, RecipientRule::HandoverParties, ContentRule::Handover, HANDOVER),
    row(EventType::HandoverCompleted, RecipientRule::HandoverParties, ContentRule::Handover, HANDOVER),
    row(EventType::EmployeeLeave, RecipientRule::ExplicitEmployees, ContentRule::Employee, EMPLOYEE),
    row(EventType::DepartmentNotice, RecipientRule::DepartmentMembers, ContentRule::Department, NOTICE),
    row(EventType::CompanyNotice, RecipientRule::CompanyMembers, ContentRule::Company, NOTICE),
];

/// Lookup over the dispatch table.
#[derive(Debug, Clone)]
pub struct EventRegistry {
    rules: Vec<EventRules>,
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::from_rules(EVENT_RULES.to_vec())
    }

    pub fn from_rules(rules: Vec<EventRules>) -> Self {
        Self { rules }
    }

    pub fn rules(&self, event_type: EventType) -> Option<&EventRules> {
        self.rules.iter().find(|r| r.event_type == event_type)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check that every event type has exactly one row and a template on
    /// both channels. Run once at startup, before any consumer starts.
    pub fn validate(&self, templates: &TemplateEngine) -> NotificationResult<()> {
        let mut problems = Vec::new();

        for event_type in EventType::all() {
            match self.rules.iter().filter(|r| r.event_type == event_type).count() {
                0 => problems.push(format!("{} has no rules", event_type)),
                1 => {}
                n => problems.push(format!("{} has {} rule rows", event_type, n)),
            }

            for channel in Channel::ALL {
                if !templates.has_template(channel, event_type) {
                    problems.push(format!(
                        "template {} is not registered",
                        channel.template_name(event_type)
                    ));
                }
            }
        }

        if !problems.is_empty() {
            return Err(NotificationError::Registry(problems.join("; ")));
        }

        info!(event_types = self.rules.len(), "Event registry validated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_validates() {
        let templates = TemplateEngine::new().unwrap();
        assert!(EventRegistry::new().validate(&templates).is_ok());
    }

    #[test]
    fn test_every_event_type_has_rules() {
        let registry = EventRegistry::new();
        for event_type in EventType::all() {
            let rules = registry.rules(event_type).unwrap();
            assert_eq!(rules.event_type, event_type);
        }
        assert_eq!(registry.len(), EventType::all().count());
    }

    #[test]
    fn test_missing_row_fails_validation() {
        let templates = TemplateEngine::new().unwrap();
        let rules = EVENT_RULES
            .iter()
            .copied()
            .filter(|r| r.event_type != EventType::CompanyNotice)
            .collect();

        let err = EventRegistry::from_rules(rules)
            .validate(&templates)
            .unwrap_err();
        assert!(err.to_string().contains("company.notice has no rules"));
    }

    #[test]
    fn test_duplicate_row_fails_validation() {
        let templates = TemplateEngine::new().unwrap();
        let mut rules = EVENT_RULES.to_vec();
        rules.push(EVENT_RULES[0]);

        let err = EventRegistry::from_rules(rules)
            .validate(&templates)
            .unwrap_err();
        assert!(err.to_string().contains("task.created has 2 rule rows"));
    }

    #[test]
    fn test_missing_template_fails_validation() {
        let mut templates = TemplateEngine::new().unwrap();
        templates.unregister(Channel::Email, EventType::HandoverCompleted);

        let err = EventRegistry::new().validate(&templates).unwrap_err();
        assert!(
            err.to_string()
                .contains("template email.handover.completed is not registered")
        );
    }

    #[test]
    fn test_executor_changed_defaults_match_wire_example() {
        let rules = EventRegistry::new()
            .rules(EventType::NodeExecutorChanged)
            .copied()
            .unwrap();
        assert_eq!(rules.recipients, RecipientRule::NodeLeaderOrNamed);
        assert_eq!(rules.defaults.notification_type, 3);
        assert_eq!(rules.defaults.category, "handover");
        assert_eq!(rules.defaults.priority, 2);
    }

    #[test]
    fn test_employee_leave_never_traverses() {
        let rules = EventRegistry::new().rules(EventType::EmployeeLeave).copied().unwrap();
        assert_eq!(rules.recipients, RecipientRule::ExplicitEmployees);
    }
}
