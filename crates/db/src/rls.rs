//! Row-Level Security (RLS) context management.
//!
//! Every tenant-scoped table has `FORCE ROW LEVEL SECURITY` with a policy
//! comparing `tenant_id` to the `app.current_tenant_id` setting. This
//! module opens the transaction that carries that setting.
//!
//! # Usage
//!
//! ```ignore
//! use ledgerbridge_db::rls::RlsConnection;
//!
//! let rls = RlsConnection::new(&db, tenant_id).await?;
//! let rows = entities::Entity::find()
//!     .filter(entities::Column::TenantId.eq(tenant_id.0))
//!     .all(rls.transaction())
//!     .await?;
//! rls.commit().await?;
//! ```

use ledgerbridge_shared::types::TenantId;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, Statement,
    TransactionTrait, Value,
};

/// Name of the session setting read by the tenant isolation policies.
pub const TENANT_SETTING: &str = "app.current_tenant_id";

/// A transaction bound to one tenant.
///
/// The setting is applied with `set_config(.., true)`, the function form of
/// `SET LOCAL`, so it ends with the transaction. Dropping the handle without
/// committing rolls the transaction back.
pub struct RlsConnection {
    txn: DatabaseTransaction,
    tenant_id: TenantId,
}

impl RlsConnection {
    /// Begins a transaction and sets the tenant context.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or the RLS
    /// context cannot be set.
    pub async fn new(db: &DatabaseConnection, tenant_id: TenantId) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        set_rls_context(&txn, tenant_id).await?;
        Ok(Self { txn, tenant_id })
    }

    /// Returns the transaction to run queries on.
    #[must_use]
    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Returns the tenant this transaction is bound to.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls back the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// Extension trait for `DatabaseConnection` to open tenant-bound transactions.
#[async_trait::async_trait]
pub trait RlsExt {
    /// Opens an RLS transaction for the tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the RLS connection cannot be created.
    async fn with_rls(&self, tenant_id: TenantId) -> Result<RlsConnection, DbErr>;
}

#[async_trait::async_trait]
impl RlsExt for DatabaseConnection {
    async fn with_rls(&self, tenant_id: TenantId) -> Result<RlsConnection, DbErr> {
        RlsConnection::new(self, tenant_id).await
    }
}

/// Sets the tenant context on an existing transaction.
///
/// # Errors
///
/// Returns an error if the RLS context cannot be set.
pub async fn set_rls_context(txn: &DatabaseTransaction, tenant_id: TenantId) -> Result<(), DbErr> {
    txn.execute(context_statement(tenant_id)).await?;
    Ok(())
}

fn context_statement(tenant_id: TenantId) -> Statement {
    Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT set_config($1, $2, true)",
        [Value::from(TENANT_SETTING), Value::from(tenant_id.to_string())],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_context_statement_is_parameterized() {
        let tenant = TenantId::from_uuid(
            Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
        );
        let stmt = context_statement(tenant);

        assert_eq!(stmt.sql, "SELECT set_config($1, $2, true)");
        let values = stmt.values.unwrap().0;
        assert_eq!(values[0], Value::from(TENANT_SETTING));
        assert_eq!(
            values[1],
            Value::from("550e8400-e29b-41d4-a716-446655440000")
        );
    }
}
