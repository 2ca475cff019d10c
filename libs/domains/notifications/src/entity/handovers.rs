use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "handovers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub from_employee_id: String,
    pub to_employee_id: String,
    pub task_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub remark: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::Handover {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            from_employee_id: model.from_employee_id,
            to_employee_id: model.to_employee_id,
            task_id: model.task_id,
            remark: model.remark,
        }
    }
}
