//! Shared setup for the database integration tests.
//!
//! Tests run against `DATABASE_URL` and return early when it is unset.

#![allow(dead_code)]

use ledgerbridge_core::access::{CLIENT_ROLE_SLUG, VisibilityScope};
use ledgerbridge_db::migration::Migrator;
use ledgerbridge_db::repositories::{CreateEntityInput, RoleSpec};
use ledgerbridge_db::{EntityRepository, RoleRepository, TenantRepository, UserRepository};
use ledgerbridge_shared::types::{EntityId, RoleId, TenantId, UserId};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tokio::sync::Mutex;
use uuid::Uuid;

static PREPARED: Mutex<bool> = Mutex::const_new(false);

/// Connects and migrates once per test binary. `None` without `DATABASE_URL`.
pub async fn database() -> Option<DatabaseConnection> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let db = ledgerbridge_db::connect(&url, 5, 1)
        .await
        .expect("Failed to connect");

    let mut prepared = PREPARED.lock().await;
    if !*prepared {
        Migrator::up(&db, None).await.expect("Failed to migrate");
        let roles = RoleRepository::new(db.clone());
        for (slug, name) in [(CLIENT_ROLE_SLUG, "Client"), ("accountant", "Accountant")] {
            roles
                .ensure(RoleSpec {
                    slug,
                    name,
                    description: None,
                    tenant_id: None,
                })
                .await
                .expect("Failed to ensure role");
        }
        *prepared = true;
    }
    drop(prepared);

    Some(db)
}

/// Creates a tenant with a unique slug.
pub async fn tenant(db: &DatabaseConnection) -> TenantId {
    let slug = format!("tenant-{}", Uuid::new_v4());
    let row = TenantRepository::new(db.clone())
        .create("Test Tenant", &slug)
        .await
        .expect("Failed to create tenant");
    TenantId::from_uuid(row.id)
}

/// Creates a user with a unique email.
pub async fn user(db: &DatabaseConnection) -> UserId {
    let email = format!("user-{}@example.com", Uuid::new_v4());
    let row = UserRepository::new(db.clone())
        .create(&email, Some("Test User"))
        .await
        .expect("Failed to create user");
    UserId::from_uuid(row.id)
}

/// Adds a user to a tenant with the role of the given slug.
pub async fn member(db: &DatabaseConnection, tenant_id: TenantId, user_id: UserId, role_slug: &str) {
    let role = RoleRepository::new(db.clone())
        .find_by_slug(role_slug)
        .await
        .expect("Failed to load role")
        .expect("Role missing");
    TenantRepository::new(db.clone())
        .add_member(tenant_id, user_id, Some(RoleId::from_uuid(role.id)), false)
        .await
        .expect("Failed to add member");
}

/// Creates an entity.
pub async fn entity(db: &DatabaseConnection, tenant_id: TenantId, name: &str) -> EntityId {
    let row = EntityRepository::new(db.clone())
        .create(
            tenant_id,
            CreateEntityInput {
                name: name.to_string(),
                entity_type: None,
                status: None,
                ein: None,
                tax_type: None,
                source_type: None,
                notes: None,
            },
        )
        .await
        .expect("Failed to create entity");
    EntityId::from_uuid(row.id)
}

/// Staff scope shorthand.
pub const STAFF: VisibilityScope = VisibilityScope::Unrestricted;
