use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

/// One row per (event, recipient)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub employee_id: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub notification_type: i32,
    pub category: String,
    pub priority: i32,
    pub is_read: bool,
    pub read_at: Option<DateTimeWithTimeZone>,
    pub related_id: Option<String>,
    pub related_type: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::Notification {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            employee_id: model.employee_id,
            title: model.title,
            content: model.content,
            notification_type: model.notification_type,
            category: model.category,
            priority: model.priority,
            is_read: model.is_read,
            read_at: model.read_at.map(Into::into),
            related_id: model.related_id,
            related_type: model.related_type,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<crate::models::NewNotification> for ActiveModel {
    fn from(input: crate::models::NewNotification) -> Self {
        let now = chrono::Utc::now();
        ActiveModel {
            id: Set(Uuid::now_v7()),
            employee_id: Set(input.employee_id),
            title: Set(input.title),
            content: Set(input.content),
            notification_type: Set(input.notification_type),
            category: Set(input.category),
            priority: Set(input.priority),
            is_read: Set(false),
            read_at: Set(None),
            related_id: Set(input.related_id),
            related_type: Set(input.related_type),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
    }
}
