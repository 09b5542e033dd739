//! `SeaORM` Entity for entities table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "entities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub entity_type: String,
    pub status: String,
    pub ein: Option<String>,
    pub tax_type: Option<String>,
    pub source_type: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::qbo_connections::Entity")]
    QboConnections,
}

impl Related<super::qbo_connections::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QboConnections.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
