use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Business employee code, unique when present
    #[sea_orm(unique)]
    pub code: Option<String>,
    pub real_name: String,
    pub email: Option<String>,
    pub department_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for crate::models::Employee {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            real_name: model.real_name,
            email: model.email,
            department_id: model.department_id,
        }
    }
}
