use async_trait::async_trait;

use crate::error::{DeliveryError, NotificationResult};
use crate::models::{Department, Employee, Handover, NewNotification, Notification, Task, TaskNode};

/// Read-only access to the entity graph the pipeline walks.
///
/// "Not found" is `Ok(None)` / an empty `Vec`, never an error. Errors mean
/// the store itself failed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_task(&self, id: &str) -> NotificationResult<Option<Task>>;

    async fn find_task_nodes_by_task_id(&self, task_id: &str) -> NotificationResult<Vec<TaskNode>>;

    async fn find_task_node(&self, id: &str) -> NotificationResult<Option<TaskNode>>;

    /// Find an employee by internal primary key
    async fn find_employee(&self, id: &str) -> NotificationResult<Option<Employee>>;

    /// Find an employee by external business code
    async fn find_employee_by_code(&self, code: &str) -> NotificationResult<Option<Employee>>;

    async fn find_handover(&self, id: &str) -> NotificationResult<Option<Handover>>;

    async fn find_department(&self, id: &str) -> NotificationResult<Option<Department>>;

    async fn find_departments_by_company_id(&self, company_id: &str) -> NotificationResult<Vec<Department>>;

    async fn find_employees_by_department_id(&self, department_id: &str) -> NotificationResult<Vec<Employee>>;
}

/// Persists in-app notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Insert one notification row. Duplicate rows on redelivery are accepted.
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, DeliveryError>;

    fn name(&self) -> &'static str;
}
