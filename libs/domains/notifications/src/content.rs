//! Content generation with the fallback order explicit → template → skip.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::channels::Channel;
use crate::error::NotificationResult;
use crate::events::{Correlation, EventType};
use crate::models::Employee;
use crate::registry::ContentRule;
use crate::repository::EntityStore;
use crate::templates::{RenderedMessage, TemplateEngine};

const DEADLINE_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskEventData {
    pub task_id: String,
    pub task_title: String,
    pub creator_name: Option<String>,
    pub node_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeEventData {
    pub task_id: String,
    pub task_title: Option<String>,
    pub node_id: String,
    pub node_name: String,
    pub leader_name: Option<String>,
    pub executor_name: Option<String>,
    pub deadline: Option<String>,
    pub progress: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandoverEventData {
    pub handover_id: String,
    pub from_name: String,
    pub to_name: String,
    pub task_title: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeEventData {
    pub employee_id: String,
    pub employee_name: String,
    pub department_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationEventData {
    pub target_id: String,
    /// Department name, or the company id for company-wide notices.
    pub name: String,
    pub department_count: usize,
}

/// Template data, one typed record per event family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    Task(TaskEventData),
    Node(NodeEventData),
    Handover(HandoverEventData),
    Employee(EmployeeEventData),
    Organization(OrganizationEventData),
}

/// Why nothing will be delivered for an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoContentReason {
    #[error("template {0} is not registered")]
    TemplateMissing(String),

    #[error("{0} not found")]
    EntityNotFound(&'static str),

    #[error("entity store failed: {0}")]
    StoreFailed(String),

    #[error("render failed: {0}")]
    RenderFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedContent {
    Content(RenderedMessage),
    NoContent(NoContentReason),
}

/// Explicit subject/title and body/content carried on the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitContent<'a> {
    pub subject: Option<&'a str>,
    pub body: Option<&'a str>,
}

impl ExplicitContent<'_> {
    fn complete(&self) -> Option<RenderedMessage> {
        match (self.subject, self.body) {
            (Some(subject), Some(body)) => Some(RenderedMessage {
                subject: subject.to_string(),
                body: body.to_string(),
            }),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct ContentGenerator {
    store: Arc<dyn EntityStore>,
    templates: Arc<TemplateEngine>,
}

impl ContentGenerator {
    pub fn new(store: Arc<dyn EntityStore>, templates: Arc<TemplateEngine>) -> Self {
        Self { store, templates }
    }

    /// Explicit content when complete, otherwise generated content with any
    /// single explicit part overriding the generated part of the same kind.
    pub async fn resolve(
        &self,
        channel: Channel,
        event_type: EventType,
        rule: ContentRule,
        correlation: &Correlation,
        explicit: ExplicitContent<'_>,
    ) -> GeneratedContent {
        if let Some(message) = explicit.complete() {
            return GeneratedContent::Content(message);
        }

        match self.generate(channel, event_type, rule, correlation).await {
            GeneratedContent::Content(mut message) => {
                if let Some(subject) = explicit.subject {
                    message.subject = subject.to_string();
                }
                if let Some(body) = explicit.body {
                    message.body = body.to_string();
                }
                GeneratedContent::Content(message)
            }
            skipped => skipped,
        }
    }

    /// Render `<channel>.<eventType>` against data assembled from the
    /// correlated entities. Never fails; problems become `NoContent`.
    pub async fn generate(
        &self,
        channel: Channel,
        event_type: EventType,
        rule: ContentRule,
        correlation: &Correlation,
    ) -> GeneratedContent {
        if !self.templates.has_template(channel, event_type) {
            return GeneratedContent::NoContent(NoContentReason::TemplateMissing(
                channel.template_name(event_type),
            ));
        }

        let data = match self.assemble(rule, correlation).await {
            Ok(Ok(data)) => data,
            Ok(Err(missing)) => {
                return GeneratedContent::NoContent(NoContentReason::EntityNotFound(missing));
            }
            Err(e) => {
                warn!(event_type = %event_type, error = %e, "Entity lookup failed during content generation");
                return GeneratedContent::NoContent(NoContentReason::StoreFailed(e.to_string()));
            }
        };

        match self.templates.render(channel, event_type, &data) {
            Ok(message) => {
                debug!(event_type = %event_type, channel = channel.as_str(), "Generated content");
                GeneratedContent::Content(message)
            }
            Err(e) => GeneratedContent::NoContent(NoContentReason::RenderFailed(e.to_string())),
        }
    }

    /// Outer error: store failure. Inner error: the entity that is missing.
    async fn assemble(
        &self,
        rule: ContentRule,
        correlation: &Correlation,
    ) -> NotificationResult<Result<EventData, &'static str>> {
        match rule {
            ContentRule::Task => {
                let Some(task) = (match correlation.task_ref() {
                    Some(id) => self.store.find_task(id).await?,
                    None => None,
                }) else {
                    return Ok(Err("task"));
                };
                let node_count = self.store.find_task_nodes_by_task_id(&task.id).await?.len();
                let creator_name = self.employee_name(task.creator_id.as_deref()).await?;
                Ok(Ok(EventData::Task(TaskEventData {
                    task_id: task.id,
                    task_title: task.title,
                    creator_name,
                    node_count,
                })))
            }
            ContentRule::Node => {
                let Some(node) = (match correlation.node_ref() {
                    Some(id) => self.store.find_task_node(id).await?,
                    None => None,
                }) else {
                    return Ok(Err("task node"));
                };
                let task_title = self.store.find_task(&node.task_id).await?.map(|t| t.title);
                let leader_name = self.employee_name(node.leader_id.as_deref()).await?;
                let executor_name = self.employee_name(node.executor_id.as_deref()).await?;
                Ok(Ok(EventData::Node(NodeEventData {
                    task_id: node.task_id,
                    task_title,
                    node_id: node.id,
                    node_name: node.name,
                    leader_name,
                    executor_name,
                    deadline: node.deadline.map(|d| d.format(DEADLINE_FORMAT).to_string()),
                    progress: node.progress,
                })))
            }
            ContentRule::Handover => {
                let Some(handover) = (match correlation.related_ref() {
                    Some(id) => self.store.find_handover(id).await?,
                    None => None,
                }) else {
                    return Ok(Err("handover"));
                };
                let from_name = self
                    .employee_name(Some(&handover.from_employee_id))
                    .await?
                    .unwrap_or_else(|| handover.from_employee_id.clone());
                let to_name = self
                    .employee_name(Some(&handover.to_employee_id))
                    .await?
                    .unwrap_or_else(|| handover.to_employee_id.clone());
                let task_title = match handover.task_id.as_deref() {
                    Some(task_id) => self.store.find_task(task_id).await?.map(|t| t.title),
                    None => None,
                };
                Ok(Ok(EventData::Handover(HandoverEventData {
                    handover_id: handover.id,
                    from_name,
                    to_name,
                    task_title,
                    remark: handover.remark,
                })))
            }
            ContentRule::Employee => {
                // The departing employee is the related id; the recipients are the employee ids.
                let Some(employee) = self.employee(correlation.related_ref()).await? else {
                    return Ok(Err("employee"));
                };
                let department_name = match employee.department_id.as_deref() {
                    Some(id) => self.store.find_department(id).await?.map(|d| d.name),
                    None => None,
                };
                Ok(Ok(EventData::Employee(EmployeeEventData {
                    employee_id: employee.id,
                    employee_name: employee.real_name,
                    department_name,
                })))
            }
            ContentRule::Department => {
                let Some(department) = (match correlation.related_ref() {
                    Some(id) => self.store.find_department(id).await?,
                    None => None,
                }) else {
                    return Ok(Err("department"));
                };
                Ok(Ok(EventData::Organization(OrganizationEventData {
                    target_id: department.id,
                    name: department.name,
                    department_count: 1,
                })))
            }
            ContentRule::Company => {
                let Some(company_id) = correlation.related_ref() else {
                    return Ok(Err("company"));
                };
                let departments = self.store.find_departments_by_company_id(company_id).await?;
                if departments.is_empty() {
                    return Ok(Err("company"));
                }
                Ok(Ok(EventData::Organization(OrganizationEventData {
                    target_id: company_id.to_string(),
                    name: company_id.to_string(),
                    department_count: departments.len(),
                })))
            }
        }
    }

    /// Employee by internal id, then by business code.
    async fn employee(&self, id: Option<&str>) -> NotificationResult<Option<Employee>> {
        let Some(id) = id else {
            return Ok(None);
        };
        match self.store.find_employee(id).await? {
            Some(employee) => Ok(Some(employee)),
            None => self.store.find_employee_by_code(id).await,
        }
    }

    async fn employee_name(&self, id: Option<&str>) -> NotificationResult<Option<String>> {
        Ok(self.employee(id).await?.map(|e| e.real_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use crate::models::{Employee, Task, TaskNode};
    use crate::repository::MockEntityStore;
    use chrono::{TimeZone, Utc};

    fn task_store() -> MockEntityStore {
        let mut store = MockEntityStore::new();
        store.expect_find_task().returning(|id| {
            Ok((id == "task-1").then(|| Task {
                id: "task-1".to_string(),
                title: "Quarterly audit".to_string(),
                creator_id: Some("emp-1".to_string()),
            }))
        });
        store
            .expect_find_task_nodes_by_task_id()
            .returning(|_| Ok(vec![]));
        store.expect_find_employee().returning(|id| {
            Ok((id == "emp-1").then(|| Employee {
                id: "emp-1".to_string(),
                code: None,
                real_name: "Ada Park".to_string(),
                email: None,
                department_id: None,
            }))
        });
        store.expect_find_employee_by_code().returning(|_| Ok(None));
        store
    }

    fn correlation(task_id: &str) -> Correlation {
        Correlation {
            task_id: Some(task_id.to_string()),
            ..Correlation::default()
        }
    }

    #[tokio::test]
    async fn test_generates_from_template() {
        let generator = ContentGenerator::new(
            Arc::new(task_store()),
            Arc::new(TemplateEngine::new().unwrap()),
        );

        let content = generator
            .generate(
                Channel::Notification,
                EventType::TaskCreated,
                ContentRule::Task,
                &correlation("task-1"),
            )
            .await;

        let GeneratedContent::Content(message) = content else {
            panic!("expected content, got {:?}", content);
        };
        assert_eq!(message.subject, "New task: Quarterly audit");
        assert!(message.body.contains("by Ada Park"));
    }

    #[tokio::test]
    async fn test_explicit_content_skips_generation() {
        let mut store = MockEntityStore::new();
        store.expect_find_task().never();

        let generator = ContentGenerator::new(Arc::new(store), Arc::new(TemplateEngine::new().unwrap()));
        let content = generator
            .resolve(
                Channel::Email,
                EventType::TaskCompleted,
                ContentRule::Task,
                &correlation("task-1"),
                ExplicitContent {
                    subject: Some("X"),
                    body: Some("Y"),
                },
            )
            .await;

        assert_eq!(
            content,
            GeneratedContent::Content(RenderedMessage {
                subject: "X".to_string(),
                body: "Y".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_single_explicit_part_overrides_generated_part() {
        let generator = ContentGenerator::new(
            Arc::new(task_store()),
            Arc::new(TemplateEngine::new().unwrap()),
        );

        let content = generator
            .resolve(
                Channel::Notification,
                EventType::TaskCompleted,
                ContentRule::Task,
                &correlation("task-1"),
                ExplicitContent {
                    subject: Some("Audit wrapped up"),
                    body: None,
                },
            )
            .await;

        let GeneratedContent::Content(message) = content else {
            panic!("expected content");
        };
        assert_eq!(message.subject, "Audit wrapped up");
        assert!(message.body.contains("\"Quarterly audit\" has been completed"));
    }

    #[tokio::test]
    async fn test_missing_template_is_no_content() {
        let mut store = MockEntityStore::new();
        store.expect_find_task().never();

        let generator = ContentGenerator::new(Arc::new(store), Arc::new(TemplateEngine::empty()));
        let content = generator
            .generate(
                Channel::Email,
                EventType::TaskCompleted,
                ContentRule::Task,
                &correlation("task-1"),
            )
            .await;

        assert_eq!(
            content,
            GeneratedContent::NoContent(NoContentReason::TemplateMissing(
                "email.task.completed".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_missing_entity_is_no_content() {
        let generator = ContentGenerator::new(
            Arc::new(task_store()),
            Arc::new(TemplateEngine::new().unwrap()),
        );

        let content = generator
            .generate(
                Channel::Notification,
                EventType::TaskDeleted,
                ContentRule::Task,
                &correlation("task-gone"),
            )
            .await;

        assert_eq!(
            content,
            GeneratedContent::NoContent(NoContentReason::EntityNotFound("task"))
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_no_content() {
        let mut store = MockEntityStore::new();
        store
            .expect_find_task_node()
            .returning(|_| Err(NotificationError::DatabaseError("connection closed".to_string())));

        let generator = ContentGenerator::new(Arc::new(store), Arc::new(TemplateEngine::new().unwrap()));
        let content = generator
            .generate(
                Channel::Email,
                EventType::SlowProgress,
                ContentRule::Node,
                &Correlation {
                    node_id: Some("n1".to_string()),
                    ..Correlation::default()
                },
            )
            .await;

        assert!(matches!(
            content,
            GeneratedContent::NoContent(NoContentReason::StoreFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_node_data_formats_deadline() {
        let mut store = MockEntityStore::new();
        store.expect_find_task_node().returning(|_| {
            Ok(Some(TaskNode {
                id: "n1".to_string(),
                task_id: "task-1".to_string(),
                name: "Collect receipts".to_string(),
                leader_id: None,
                executor_id: None,
                deadline: Some(Utc.with_ymd_and_hms(2026, 3, 1, 17, 0, 0).unwrap()),
                progress: 35,
            }))
        });
        store.expect_find_task().returning(|_| Ok(None));

        let generator = ContentGenerator::new(Arc::new(store), Arc::new(TemplateEngine::new().unwrap()));
        let content = generator
            .generate(
                Channel::Notification,
                EventType::DeadlineReminder,
                ContentRule::Node,
                &Correlation {
                    node_id: Some("n1".to_string()),
                    ..Correlation::default()
                },
            )
            .await;

        let GeneratedContent::Content(message) = content else {
            panic!("expected content");
        };
        assert_eq!(message.subject, "Deadline approaching: Collect receipts");
        assert_eq!(
            message.body,
            "Node \"Collect receipts\" is due on 2026-03-01 17:00.\nCurrent progress: 35%."
        );
    }
}
