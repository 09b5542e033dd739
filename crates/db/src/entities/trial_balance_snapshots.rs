//! `SeaORM` Entity for trial_balance_snapshots table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "trial_balance_snapshots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub entity_id: Uuid,
    pub import_run_id: Uuid,
    pub tax_year: i32,
    pub period_end_date: Date,
    pub snapshot_type: String,
    pub source: String,
    pub run_type: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::import_runs::Entity",
        from = "Column::ImportRunId",
        to = "super::import_runs::Column::Id"
    )]
    ImportRuns,
    #[sea_orm(has_many = "super::trial_balance_lines::Entity")]
    TrialBalanceLines,
}

impl Related<super::import_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ImportRuns.def()
    }
}

impl Related<super::trial_balance_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrialBalanceLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
