//! In-process entity store and notification sink.
//!
//! Used by tests and by `BROKER=memory` local runs.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::error::{DeliveryError, NotificationError, NotificationResult};
use crate::models::{Department, Employee, Handover, NewNotification, Notification, Task, TaskNode};
use crate::repository::{EntityStore, NotificationSink};

/// Entity graph held in maps. Build it with the `with_*` methods.
#[derive(Default)]
pub struct InMemoryEntityStore {
    tasks: HashMap<String, Task>,
    nodes: HashMap<String, TaskNode>,
    employees: HashMap<String, Employee>,
    handovers: HashMap<String, Handover>,
    departments: HashMap<String, Department>,
    unavailable: AtomicBool,
    lookups: AtomicUsize,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.insert(task.id.clone(), task);
        self
    }

    pub fn with_node(mut self, node: TaskNode) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    pub fn with_employee(mut self, employee: Employee) -> Self {
        self.employees.insert(employee.id.clone(), employee);
        self
    }

    pub fn with_handover(mut self, handover: Handover) -> Self {
        self.handovers.insert(handover.id.clone(), handover);
        self
    }

    pub fn with_department(mut self, department: Department) -> Self {
        self.departments.insert(department.id.clone(), department);
        self
    }

    /// Make every lookup fail with a database error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of lookups served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check(&self) -> NotificationResult<()> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(NotificationError::DatabaseError(
                "entity store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn find_task(&self, id: &str) -> NotificationResult<Option<Task>> {
        self.check()?;
        Ok(self.tasks.get(id).cloned())
    }

    async fn find_task_nodes_by_task_id(&self, task_id: &str) -> NotificationResult<Vec<TaskNode>> {
        self.check()?;
        let mut nodes: Vec<TaskNode> = self
            .nodes
            .values()
            .filter(|n| n.task_id == task_id)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    async fn find_task_node(&self, id: &str) -> NotificationResult<Option<TaskNode>> {
        self.check()?;
        Ok(self.nodes.get(id).cloned())
    }

    async fn find_employee(&self, id: &str) -> NotificationResult<Option<Employee>> {
        self.check()?;
        Ok(self.employees.get(id).cloned())
    }

    async fn find_employee_by_code(&self, code: &str) -> NotificationResult<Option<Employee>> {
        self.check()?;
        Ok(self
            .employees
            .values()
            .find(|e| e.code.as_deref() == Some(code))
            .cloned())
    }

    async fn find_handover(&self, id: &str) -> NotificationResult<Option<Handover>> {
        self.check()?;
        Ok(self.handovers.get(id).cloned())
    }

    async fn find_department(&self, id: &str) -> NotificationResult<Option<Department>> {
        self.check()?;
        Ok(self.departments.get(id).cloned())
    }

    async fn find_departments_by_company_id(&self, company_id: &str) -> NotificationResult<Vec<Department>> {
        self.check()?;
        let mut departments: Vec<Department> = self
            .departments
            .values()
            .filter(|d| d.company_id == company_id)
            .cloned()
            .collect();
        departments.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(departments)
    }

    async fn find_employees_by_department_id(&self, department_id: &str) -> NotificationResult<Vec<Employee>> {
        self.check()?;
        let mut employees: Vec<Employee> = self
            .employees
            .values()
            .filter(|e| e.department_id.as_deref() == Some(department_id))
            .cloned()
            .collect();
        employees.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(employees)
    }
}

/// Notification sink that keeps rows in memory and can be scripted to fail.
#[derive(Default)]
pub struct InMemoryNotificationSink {
    rows: Mutex<Vec<Notification>>,
    failures: Mutex<VecDeque<DeliveryError>>,
    attempts: AtomicUsize,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next insert with `error`. Queued failures are used in order.
    pub async fn fail_next(&self, error: DeliveryError) {
        self.failures.lock().await.push_back(error);
    }

    pub async fn inserted(&self) -> Vec<Notification> {
        self.rows.lock().await.clone()
    }

    pub async fn inserted_count(&self) -> usize {
        self.rows.lock().await.len()
    }

    /// Inserts attempted, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }

        let row = notification.into_notification();
        self.rows.lock().await.push(row.clone());
        Ok(row)
    }

    fn name(&self) -> &'static str {
        "InMemory"
    }
}
