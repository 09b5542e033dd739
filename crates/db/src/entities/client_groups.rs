//! `SeaORM` Entity for client_groups table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "client_groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::client_group_entities::Entity")]
    ClientGroupEntities,
    #[sea_orm(has_many = "super::client_group_memberships::Entity")]
    ClientGroupMemberships,
}

impl Related<super::client_group_entities::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClientGroupEntities.def()
    }
}

impl Related<super::client_group_memberships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClientGroupMemberships.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
