//! `SeaORM` Entity for trial_balance_lines table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "trial_balance_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub snapshot_id: Uuid,
    pub account_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((18, 2)))")]
    pub amount: Decimal,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::trial_balance_snapshots::Entity",
        from = "Column::SnapshotId",
        to = "super::trial_balance_snapshots::Column::Id"
    )]
    TrialBalanceSnapshots,
    #[sea_orm(
        belongs_to = "super::trial_balance_accounts::Entity",
        from = "Column::AccountId",
        to = "super::trial_balance_accounts::Column::Id"
    )]
    TrialBalanceAccounts,
}

impl Related<super::trial_balance_snapshots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrialBalanceSnapshots.def()
    }
}

impl Related<super::trial_balance_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrialBalanceAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
