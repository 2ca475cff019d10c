use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, SqlErr,
};

use crate::{
    entity::{departments, employees, handovers, notifications, task_nodes, tasks},
    error::{DeliveryError, NotificationResult},
    models::{Department, Employee, Handover, NewNotification, Notification, Task, TaskNode},
    repository::{EntityStore, NotificationSink},
};

/// Entity lookups against PostgreSQL.
#[derive(Clone)]
pub struct PgEntityStore {
    db: DatabaseConnection,
}

impl PgEntityStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn find_task(&self, id: &str) -> NotificationResult<Option<Task>> {
        let model = tasks::Entity::find_by_id(id.to_string()).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn find_task_nodes_by_task_id(&self, task_id: &str) -> NotificationResult<Vec<TaskNode>> {
        let models = task_nodes::Entity::find()
            .filter(task_nodes::Column::TaskId.eq(task_id))
            .order_by_asc(task_nodes::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn find_task_node(&self, id: &str) -> NotificationResult<Option<TaskNode>> {
        let model = task_nodes::Entity::find_by_id(id.to_string()).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn find_employee(&self, id: &str) -> NotificationResult<Option<Employee>> {
        let model = employees::Entity::find_by_id(id.to_string()).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn find_employee_by_code(&self, code: &str) -> NotificationResult<Option<Employee>> {
        let model = employees::Entity::find()
            .filter(employees::Column::Code.eq(code))
            .one(&self.db)
            .await?;
        Ok(model.map(Into::into))
    }

    async fn find_handover(&self, id: &str) -> NotificationResult<Option<Handover>> {
        let model = handovers::Entity::find_by_id(id.to_string()).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn find_department(&self, id: &str) -> NotificationResult<Option<Department>> {
        let model = departments::Entity::find_by_id(id.to_string()).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn find_departments_by_company_id(&self, company_id: &str) -> NotificationResult<Vec<Department>> {
        let models = departments::Entity::find()
            .filter(departments::Column::CompanyId.eq(company_id))
            .order_by_asc(departments::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn find_employees_by_department_id(&self, department_id: &str) -> NotificationResult<Vec<Employee>> {
        let models = employees::Entity::find()
            .filter(employees::Column::DepartmentId.eq(department_id))
            .order_by_asc(employees::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }
}

/// Notification rows in PostgreSQL.
#[derive(Clone)]
pub struct PgNotificationSink {
    db: DatabaseConnection,
}

impl PgNotificationSink {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Constraint violations concern the row being written; anything else is the database.
fn classify_insert_error(employee_id: &str, err: DbErr) -> DeliveryError {
    match err.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(details)) | Some(SqlErr::UniqueConstraintViolation(details)) => {
            DeliveryError::recipient(employee_id, details)
        }
        _ => DeliveryError::unavailable(format!("Database error: {}", err)),
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, DeliveryError> {
        let employee_id = notification.employee_id.clone();
        let active_model: notifications::ActiveModel = notification.into();

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(|e| classify_insert_error(&employee_id, e))?;

        tracing::debug!(notification_id = %model.id, employee_id = %employee_id, "Inserted notification");
        Ok(model.into())
    }

    fn name(&self) -> &'static str {
        "Postgres"
    }
}
