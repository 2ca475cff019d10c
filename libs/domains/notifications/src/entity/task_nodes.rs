use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "task_nodes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub task_id: String,
    pub name: String,
    pub leader_id: Option<String>,
    pub executor_id: Option<String>,
    pub deadline: Option<DateTimeWithTimeZone>,
    pub progress: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::TaskNode {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            task_id: model.task_id,
            name: model.name,
            leader_id: model.leader_id,
            executor_id: model.executor_id,
            deadline: model.deadline.map(Into::into),
            progress: model.progress,
        }
    }
}
