//! `SeaORM` active enums.

use ledgerbridge_core::import::ImportRunStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Postgres `import_run_status` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "import_run_status")]
#[serde(rename_all = "lowercase")]
pub enum ImportRunStatusDb {
    #[sea_orm(string_value = "queued")]
    Queued,
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl From<ImportRunStatus> for ImportRunStatusDb {
    fn from(status: ImportRunStatus) -> Self {
        match status {
            ImportRunStatus::Queued => Self::Queued,
            ImportRunStatus::Running => Self::Running,
            ImportRunStatus::Success => Self::Success,
            ImportRunStatus::Failed => Self::Failed,
        }
    }
}

impl From<ImportRunStatusDb> for ImportRunStatus {
    fn from(status: ImportRunStatusDb) -> Self {
        match status {
            ImportRunStatusDb::Queued => Self::Queued,
            ImportRunStatusDb::Running => Self::Running,
            ImportRunStatusDb::Success => Self::Success,
            ImportRunStatusDb::Failed => Self::Failed,
        }
    }
}
