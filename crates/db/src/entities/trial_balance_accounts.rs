//! `SeaORM` Entity for trial_balance_accounts table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "trial_balance_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub entity_id: Uuid,
    pub external_account_id: Option<String>,
    pub name: String,
    pub account_type: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::trial_balance_lines::Entity")]
    TrialBalanceLines,
}

impl Related<super::trial_balance_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrialBalanceLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
