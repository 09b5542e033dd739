//! `SeaORM` Entity for client_group_entities table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "client_group_entities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub client_group_id: Uuid,
    pub entity_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::client_groups::Entity",
        from = "Column::ClientGroupId",
        to = "super::client_groups::Column::Id"
    )]
    ClientGroups,
}

impl Related<super::client_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClientGroups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
