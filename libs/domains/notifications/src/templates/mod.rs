//! Handlebars templates for generated titles, subjects and bodies.
//!
//! Every `(channel, event type)` pair is registered as two templates,
//! `<channel>.<eventType>.subject` and `<channel>.<eventType>.body`.
//! Subjects and notification bodies are plain text and rendered without
//! escaping; email bodies are HTML, wrapped in a shared layout and escaped.
//! Both registries run in strict mode so a missing field is a render error.

use crate::channels::Channel;
use crate::error::TemplateError;
use crate::events::EventType;
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

/// Rendered subject/title and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Template engine for generated content.
pub struct TemplateEngine {
    text: Handlebars<'static>,
    html: Handlebars<'static>,
}

impl TemplateEngine {
    /// Engine with the built-in templates for every event type on both channels.
    pub fn new() -> Result<Self, TemplateError> {
        let mut engine = Self::empty();
        for event_type in EventType::all() {
            let (subject, body) = default_template(event_type);
            for channel in Channel::ALL {
                engine.register(channel, event_type, subject, body)?;
            }
        }
        Ok(engine)
    }

    /// Engine with no templates registered.
    pub fn empty() -> Self {
        let mut text = Handlebars::new();
        text.set_strict_mode(true);
        text.register_escape_fn(handlebars::no_escape);

        let mut html = Handlebars::new();
        html.set_strict_mode(true);

        Self { text, html }
    }

    /// Register (or replace) the subject and body templates for one channel.
    pub fn register(
        &mut self,
        channel: Channel,
        event_type: EventType,
        subject: &str,
        body: &str,
    ) -> Result<(), TemplateError> {
        let name = channel.template_name(event_type);
        let subject_name = subject_key(&name);
        let body_name = body_key(&name);

        self.text
            .register_template_string(&subject_name, subject)
            .map_err(|e| TemplateError::Register {
                name: subject_name.clone(),
                details: e.to_string(),
            })?;

        let registered = match channel {
            Channel::Email => self.html.register_template_string(
                &body_name,
                format!("{}{}{}", EMAIL_LAYOUT_OPEN, body, EMAIL_LAYOUT_CLOSE),
            ),
            Channel::Notification => self.text.register_template_string(&body_name, body),
        };
        registered.map_err(|e| TemplateError::Register {
            name: body_name,
            details: e.to_string(),
        })?;

        debug!(template = %name, "Registered template");
        Ok(())
    }

    pub fn unregister(&mut self, channel: Channel, event_type: EventType) {
        let name = channel.template_name(event_type);
        self.text.unregister_template(&subject_key(&name));
        self.body_registry_mut(channel)
            .unregister_template(&body_key(&name));
    }

    pub fn has_template(&self, channel: Channel, event_type: EventType) -> bool {
        let name = channel.template_name(event_type);
        self.text.has_template(&subject_key(&name))
            && self.body_registry(channel).has_template(&body_key(&name))
    }

    /// Whether rendered bodies on this channel are HTML.
    pub fn body_is_html(&self, channel: Channel) -> bool {
        matches!(channel, Channel::Email)
    }

    /// Render subject and body for `(channel, event_type)`.
    ///
    /// Rendering is deterministic: the same data always yields the same text.
    pub fn render<T: Serialize>(
        &self,
        channel: Channel,
        event_type: EventType,
        data: &T,
    ) -> Result<RenderedMessage, TemplateError> {
        let name = channel.template_name(event_type);
        if !self.has_template(channel, event_type) {
            return Err(TemplateError::NotFound(name));
        }

        let subject = self
            .text
            .render(&subject_key(&name), data)
            .map_err(|e| TemplateError::Render {
                name: subject_key(&name),
                details: e.to_string(),
            })?;
        let body = self
            .body_registry(channel)
            .render(&body_key(&name), data)
            .map_err(|e| TemplateError::Render {
                name: body_key(&name),
                details: e.to_string(),
            })?;

        Ok(RenderedMessage {
            subject: subject.trim().to_string(),
            body,
        })
    }

    fn body_registry(&self, channel: Channel) -> &Handlebars<'static> {
        match channel {
            Channel::Email => &self.html,
            Channel::Notification => &self.text,
        }
    }

    fn body_registry_mut(&mut self, channel: Channel) -> &mut Handlebars<'static> {
        match channel {
            Channel::Email => &mut self.html,
            Channel::Notification => &mut self.text,
        }
    }
}

fn subject_key(name: &str) -> String {
    format!("{}.subject", name)
}

fn body_key(name: &str) -> String {
    format!("{}.body", name)
}

/// Built-in `(subject, body)` source for each event type.
fn default_template(event_type: EventType) -> (&'static str, &'static str) {
    match event_type {
        EventType::TaskCreated => (TASK_CREATED_SUBJECT, TASK_CREATED_BODY),
        EventType::TaskUpdated => (TASK_UPDATED_SUBJECT, TASK_UPDATED_BODY),
        EventType::TaskCompleted => (TASK_COMPLETED_SUBJECT, TASK_COMPLETED_BODY),
        EventType::TaskDeleted => (TASK_DELETED_SUBJECT, TASK_DELETED_BODY),
        EventType::NodeExecutorChanged => (EXECUTOR_CHANGED_SUBJECT, EXECUTOR_CHANGED_BODY),
        EventType::NodeDeleted => (NODE_DELETED_SUBJECT, NODE_DELETED_BODY),
        EventType::DeadlineReminder => (DEADLINE_REMINDER_SUBJECT, DEADLINE_REMINDER_BODY),
        EventType::SlowProgress => (SLOW_PROGRESS_SUBJECT, SLOW_PROGRESS_BODY),
        EventType::HandoverNotification => (HANDOVER_SUBJECT, HANDOVER_BODY),
        EventType::HandoverCompleted => (HANDOVER_COMPLETED_SUBJECT, HANDOVER_COMPLETED_BODY),
        EventType::EmployeeLeave => (EMPLOYEE_LEAVE_SUBJECT, EMPLOYEE_LEAVE_BODY),
        EventType::DepartmentNotice => (DEPARTMENT_NOTICE_SUBJECT, DEPARTMENT_NOTICE_BODY),
        EventType::CompanyNotice => (COMPANY_NOTICE_SUBJECT, COMPANY_NOTICE_BODY),
    }
}

const EMAIL_LAYOUT_OPEN: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333;">
<div style="max-width: 600px; margin: 0 auto; padding: 20px; white-space: pre-line;">"#;

const EMAIL_LAYOUT_CLOSE: &str = r#"</div>
<p style="color: #999; font-size: 12px; text-align: center;">This is an automated message. Please do not reply.</p>
</body>
</html>"#;

const TASK_CREATED_SUBJECT: &str = "New task: {{task_title}}";
const TASK_CREATED_BODY: &str = r#"Task "{{task_title}}" has been created{{#if creator_name}} by {{creator_name}}{{/if}}.
It currently has {{node_count}} node(s)."#;

const TASK_UPDATED_SUBJECT: &str = "Task updated: {{task_title}}";
const TASK_UPDATED_BODY: &str =
    r#"Task "{{task_title}}" has been updated. Please review the latest changes."#;

const TASK_COMPLETED_SUBJECT: &str = "Task completed: {{task_title}}";
const TASK_COMPLETED_BODY: &str = r#"Task "{{task_title}}" has been completed.
Thank you for your work on its {{node_count}} node(s)."#;

const TASK_DELETED_SUBJECT: &str = "Task deleted: {{task_title}}";
const TASK_DELETED_BODY: &str = r#"Task "{{task_title}}"{{#if creator_name}} created by {{creator_name}}{{/if}} has been deleted."#;

const EXECUTOR_CHANGED_SUBJECT: &str = "Executor changed: {{node_name}}";
const EXECUTOR_CHANGED_BODY: &str = r#"The executor of node "{{node_name}}"{{#if task_title}} in task "{{task_title}}"{{/if}} has changed.
{{#if executor_name}}The node is now assigned to {{executor_name}}.{{else}}The node currently has no executor.{{/if}}"#;

const NODE_DELETED_SUBJECT: &str = "Node deleted: {{node_name}}";
const NODE_DELETED_BODY: &str =
    r#"Node "{{node_name}}"{{#if task_title}} in task "{{task_title}}"{{/if}} has been deleted."#;

const DEADLINE_REMINDER_SUBJECT: &str = "Deadline approaching: {{node_name}}";
const DEADLINE_REMINDER_BODY: &str = r#"Node "{{node_name}}"{{#if task_title}} in task "{{task_title}}"{{/if}} is due{{#if deadline}} on {{deadline}}{{/if}}.
Current progress: {{progress}}%."#;

const SLOW_PROGRESS_SUBJECT: &str = "Slow progress: {{node_name}}";
const SLOW_PROGRESS_BODY: &str = r#"Node "{{node_name}}"{{#if task_title}} in task "{{task_title}}"{{/if}} is behind schedule at {{progress}}%{{#if deadline}}, due {{deadline}}{{/if}}."#;

const HANDOVER_SUBJECT: &str = "Handover from {{from_name}} to {{to_name}}";
const HANDOVER_BODY: &str = r#"{{from_name}} is handing over work to {{to_name}}{{#if task_title}} for task "{{task_title}}"{{/if}}.
{{#if remark}}Remark: {{remark}}{{/if}}"#;

const HANDOVER_COMPLETED_SUBJECT: &str = "Handover completed";
const HANDOVER_COMPLETED_BODY: &str = r#"The handover from {{from_name}} to {{to_name}}{{#if task_title}} for task "{{task_title}}"{{/if}} has been completed."#;

const EMPLOYEE_LEAVE_SUBJECT: &str = "Employee leaving: {{employee_name}}";
const EMPLOYEE_LEAVE_BODY: &str = r#"{{employee_name}}{{#if department_name}} of {{department_name}}{{/if}} is leaving.
Please arrange a handover of their open work."#;

const DEPARTMENT_NOTICE_SUBJECT: &str = "Notice for {{name}}";
const DEPARTMENT_NOTICE_BODY: &str =
    "A new notice has been issued for department {{name}}. Please check the notice board.";

const COMPANY_NOTICE_SUBJECT: &str = "Company notice";
const COMPANY_NOTICE_BODY: &str = "A new company-wide notice has been issued to {{department_count}} department(s). Please check the notice board.";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_engine_creation() {
        let engine = TemplateEngine::new();
        assert!(engine.is_ok());
    }

    #[test]
    fn test_every_event_type_has_templates_on_both_channels() {
        let engine = TemplateEngine::new().unwrap();
        for event_type in EventType::all() {
            for channel in Channel::ALL {
                assert!(
                    engine.has_template(channel, event_type),
                    "missing {}",
                    channel.template_name(event_type)
                );
            }
        }
    }

    #[test]
    fn test_render_notification_is_unescaped_text() {
        let engine = TemplateEngine::new().unwrap();
        let data = json!({
            "task_id": "task-1",
            "task_title": "Q3 \"launch\" & review",
            "creator_name": null,
            "node_count": 2
        });

        let rendered = engine
            .render(Channel::Notification, EventType::TaskCompleted, &data)
            .unwrap();
        assert_eq!(rendered.subject, "Task completed: Q3 \"launch\" & review");
        assert!(rendered.body.contains("Task \"Q3 \"launch\" & review\" has been completed."));
        assert!(!rendered.body.contains("<html>"));
    }

    #[test]
    fn test_render_email_body_is_escaped_html() {
        let engine = TemplateEngine::new().unwrap();
        let data = json!({
            "task_id": "task-1",
            "task_title": "<script>",
            "creator_name": "Ada",
            "node_count": 1
        });

        let rendered = engine
            .render(Channel::Email, EventType::TaskCreated, &data)
            .unwrap();
        assert_eq!(rendered.subject, "New task: <script>");
        assert!(rendered.body.contains("&lt;script&gt;"));
        assert!(rendered.body.contains("by Ada"));
        assert!(rendered.body.starts_with("<!DOCTYPE html>"));
        assert!(engine.body_is_html(Channel::Email));
        assert!(!engine.body_is_html(Channel::Notification));
    }

    #[test]
    fn test_render_is_deterministic() {
        let engine = TemplateEngine::new().unwrap();
        let data = json!({
            "task_id": "task-1",
            "task_title": "Audit",
            "node_id": "node-1",
            "node_name": "Collect receipts",
            "leader_name": "Lin",
            "executor_name": "Sam",
            "deadline": "2026-03-01 17:00",
            "progress": 40
        });

        let first = engine
            .render(Channel::Email, EventType::DeadlineReminder, &data)
            .unwrap();
        let second = engine
            .render(Channel::Email, EventType::DeadlineReminder, &data)
            .unwrap();
        assert_eq!(first, second);
        assert!(first.body.contains("due on 2026-03-01 17:00"));
        assert!(first.body.contains("Current progress: 40%."));
    }

    #[test]
    fn test_strict_mode_rejects_missing_fields() {
        let engine = TemplateEngine::new().unwrap();
        let result = engine.render(
            Channel::Notification,
            EventType::TaskCompleted,
            &json!({ "task_id": "task-1" }),
        );
        assert!(matches!(result, Err(TemplateError::Render { .. })));
    }

    #[test]
    fn test_unregistered_template_is_not_found() {
        let mut engine = TemplateEngine::new().unwrap();
        engine.unregister(Channel::Email, EventType::SlowProgress);

        assert!(!engine.has_template(Channel::Email, EventType::SlowProgress));
        assert!(engine.has_template(Channel::Notification, EventType::SlowProgress));
        assert_eq!(
            engine.render(Channel::Email, EventType::SlowProgress, &json!({})),
            Err(TemplateError::NotFound("email.task.slow.progress".to_string()))
        );
    }

    #[test]
    fn test_register_rejects_malformed_template() {
        let mut engine = TemplateEngine::empty();
        let result = engine.register(
            Channel::Notification,
            EventType::CompanyNotice,
            "{{#if}}",
            "body",
        );
        assert!(matches!(result, Err(TemplateError::Register { .. })));
    }

    #[test]
    fn test_register_overrides_default() {
        let mut engine = TemplateEngine::new().unwrap();
        engine
            .register(
                Channel::Notification,
                EventType::CompanyNotice,
                "Heads up",
                "{{department_count}} departments notified",
            )
            .unwrap();

        let rendered = engine
            .render(
                Channel::Notification,
                EventType::CompanyNotice,
                &json!({ "department_count": 3 }),
            )
            .unwrap();
        assert_eq!(rendered.subject, "Heads up");
        assert_eq!(rendered.body, "3 departments notified");
    }
}
