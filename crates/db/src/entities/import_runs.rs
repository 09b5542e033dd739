//! `SeaORM` Entity for import_runs table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::ImportRunStatusDb;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "import_runs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub entity_id: Uuid,
    pub client_group_id: Option<Uuid>,
    pub client_group_tax_year_id: Option<Uuid>,
    pub tax_year: i32,
    pub period_end_date: Date,
    pub status: ImportRunStatusDb,
    pub started_at: Option<DateTimeWithTimeZone>,
    pub finished_at: Option<DateTimeWithTimeZone>,
    pub triggered_by_user_id: Option<Uuid>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_text: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::trial_balance_snapshots::Entity")]
    TrialBalanceSnapshots,
}

impl Related<super::trial_balance_snapshots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrialBalanceSnapshots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
