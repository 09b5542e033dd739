//! Integration tests for tenant isolation and client visibility.
//!
//! Requires `DATABASE_URL`; every test returns early without it.

mod common;

use common::STAFF;
use ledgerbridge_core::access::{CLIENT_ROLE_SLUG, VisibilityScope};
use ledgerbridge_core::tenant::{TenantError, check_access};
use ledgerbridge_db::repositories::visibility::{resolve_scope, visible_entity_ids};
use ledgerbridge_db::repositories::{
    CreateClientGroupInput, CreateImportRunInput, CreateMembershipInput, ImportRunFilter,
};
use ledgerbridge_db::{
    ClientGroupRepository, EntityRepository, ImportRunRepository, RepoError, RlsConnection,
    TenantRepository,
};
use ledgerbridge_shared::types::{ClientGroupId, EntityId, PageRequest, TenantId, UserId};
use sea_orm::DatabaseConnection;

async fn group(groups: &ClientGroupRepository, tenant_id: TenantId, name: &str) -> ClientGroupId {
    let row = groups
        .create(
            tenant_id,
            CreateClientGroupInput {
                name: name.to_string(),
                description: None,
            },
        )
        .await
        .expect("Failed to create group");
    ClientGroupId::from_uuid(row.id)
}


async fn join(
    groups: &ClientGroupRepository,
    tenant_id: TenantId,
    group_id: ClientGroupId,
    user_id: UserId,
    is_active: bool,
) {
    groups
        .add_membership(
            tenant_id,
            group_id,
            CreateMembershipInput {
                user_id,
                role_slug: None,
                is_active: Some(is_active),
            },
        )
        .await
        .expect("Failed to add membership");
}

/// Resolves the caller's scope and materializes their entity set.
async fn visible(
    db: &DatabaseConnection,
    tenant_id: TenantId,
    user_id: UserId,
) -> (VisibilityScope, Vec<EntityId>) {
    let rls = RlsConnection::new(db, tenant_id).await.unwrap();
    let scope = resolve_scope(rls.transaction(), tenant_id, user_id, None)
        .await
        .unwrap();
    let ids = visible_entity_ids(rls.transaction(), tenant_id, scope)
        .await
        .unwrap();
    rls.commit().await.unwrap();
    (scope, ids)
}

/// Entity ids listed through the scoped repository query, sorted.
async fn listed(db: &DatabaseConnection, tenant_id: TenantId, scope: VisibilityScope) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = EntityRepository::new(db.clone())
        .list(tenant_id, scope)
        .await
        .unwrap()
        .into_iter()
        .map(|row| EntityId::from_uuid(row.id))
        .collect();
    ids.sort();
    ids
}

fn sorted(mut ids: Vec<EntityId>) -> Vec<EntityId> {
    ids.sort();
    ids
}

#[tokio::test]
async fn test_entities_never_cross_tenants() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant_a = common::tenant(&db).await;
    let tenant_b = common::tenant(&db).await;
    let acme = common::entity(&db, tenant_a, "Acme").await;
    common::entity(&db, tenant_b, "Acme").await;

    let repo = EntityRepository::new(db.clone());

    let listed_b = repo.list(tenant_b, STAFF).await.unwrap();
    assert_eq!(listed_b.len(), 1);
    assert_ne!(listed_b[0].id, acme.0);

    let err = repo.find(tenant_b, STAFF, acme).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound("Entity")));

    let err = repo.delete(tenant_b, acme).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
    assert!(repo.find(tenant_a, STAFF, acme).await.is_ok());
}

#[tokio::test]
async fn test_entity_names_are_unique_per_tenant() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    common::entity(&db, tenant, "Acme").await;

    let err = EntityRepository::new(db.clone())
        .create(
            tenant,
            ledgerbridge_db::repositories::CreateEntityInput {
                name: "Acme".into(),
                entity_type: None,
                status: None,
                ein: None,
                tax_type: None,
                source_type: None,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));
}

#[tokio::test]
async fn test_client_sees_group_reach_and_direct_grants_only() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let client = common::user(&db).await;
    common::member(&db, tenant, client, CLIENT_ROLE_SLUG).await;

    let via_group = common::entity(&db, tenant, "Via Group").await;
    let direct = common::entity(&db, tenant, "Direct").await;
    let inactive_only = common::entity(&db, tenant, "Inactive Group").await;
    let hidden = common::entity(&db, tenant, "Hidden").await;

    let groups = ClientGroupRepository::new(db.clone());
    let active_group = group(&groups, tenant, "Active").await;
    let dormant_group = group(&groups, tenant, "Dormant").await;
    group(&groups, tenant, "Unrelated").await;

    groups.assign_entity(tenant, active_group, via_group).await.unwrap();
    groups.assign_entity(tenant, dormant_group, inactive_only).await.unwrap();
    groups
        .add_membership(
            tenant,
            active_group,
            CreateMembershipInput {
                user_id: client,
                role_slug: None,
                is_active: None,
            },
        )
        .await
        .unwrap();
    groups
        .add_membership(
            tenant,
            dormant_group,
            CreateMembershipInput {
                user_id: client,
                role_slug: None,
                is_active: Some(false),
            },
        )
        .await
        .unwrap();
    TenantRepository::new(db.clone())
        .grant_entity(tenant, client, direct)
        .await
        .unwrap();

    let (scope, materialized) = visible(&db, tenant, client).await;
    assert_eq!(scope, VisibilityScope::Client(client));

    let expected = sorted(vec![via_group, direct]);
    assert_eq!(materialized, expected);

    let entities = listed(&db, tenant, scope).await;
    assert_eq!(entities, expected);
    assert!(!entities.contains(&inactive_only));
    assert!(!entities.contains(&hidden));

    let visible_groups: Vec<_> = groups
        .list(tenant, scope)
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.name)
        .collect();
    assert_eq!(visible_groups, vec!["Active".to_string(), "Dormant".to_string()]);
}

#[tokio::test]
async fn test_second_active_client_membership_conflicts() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let client = common::user(&db).await;
    let groups = ClientGroupRepository::new(db.clone());
    let first = group(&groups, tenant, "First").await;
    let second = group(&groups, tenant, "Second").await;

    let membership = |is_active| CreateMembershipInput {
        user_id: client,
        role_slug: None,
        is_active: Some(is_active),
    };

    groups.add_membership(tenant, first, membership(true)).await.unwrap();

    let err = groups
        .add_membership(tenant, second, membership(true))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));

    let err = groups
        .add_membership(tenant, first, membership(false))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));

    groups
        .add_membership(tenant, second, membership(false))
        .await
        .expect("inactive memberships do not count");
}

#[tokio::test]
async fn test_unknown_role_slug_is_invalid() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let user = common::user(&db).await;
    let groups = ClientGroupRepository::new(db.clone());
    let target = group(&groups, tenant, "Target").await;

    let err = groups
        .add_membership(
            tenant,
            target,
            CreateMembershipInput {
                user_id: user,
                role_slug: Some("no-such-role".into()),
                is_active: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Invalid(_)));
}

#[tokio::test]
async fn test_duplicate_assignment_conflicts() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let acme = common::entity(&db, tenant, "Acme").await;
    let groups = ClientGroupRepository::new(db.clone());
    let target = group(&groups, tenant, "Target").await;

    groups.assign_entity(tenant, target, acme).await.unwrap();
    let err = groups.assign_entity(tenant, target, acme).await.unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));

    groups.unassign_entity(tenant, target, acme).await.unwrap();
    let err = groups.unassign_entity(tenant, target, acme).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
}

#[tokio::test]
async fn test_caller_access_reflects_suspension_and_role() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let staff = common::user(&db).await;
    let outsider = common::user(&db).await;
    common::member(&db, tenant, staff, "accountant").await;

    let tenants = TenantRepository::new(db.clone());

    let access = tenants.caller_access(tenant, staff).await.unwrap();
    assert_eq!(access.role_slug.as_deref(), Some("accountant"));
    assert_eq!(check_access(access.tenant, access.membership), Ok(()));

    let outsider_access = tenants.caller_access(tenant, outsider).await.unwrap();
    assert_eq!(
        check_access(outsider_access.tenant, outsider_access.membership),
        Err(TenantError::NotMember)
    );

    tenants.set_suspended(tenant, Some("billing")).await.unwrap();
    let suspended = tenants.caller_access(tenant, staff).await.unwrap();
    assert_eq!(
        check_access(suspended.tenant, suspended.membership),
        Err(TenantError::Inaccessible)
    );
}

#[tokio::test]
async fn test_client_without_memberships_sees_nothing() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let client = common::user(&db).await;
    common::member(&db, tenant, client, CLIENT_ROLE_SLUG).await;

    let acme = common::entity(&db, tenant, "Acme").await;
    let groups = ClientGroupRepository::new(db.clone());
    let family = group(&groups, tenant, "Family").await;
    groups.assign_entity(tenant, family, acme).await.unwrap();

    let (scope, ids) = visible(&db, tenant, client).await;
    assert_eq!(scope, VisibilityScope::Client(client));
    assert!(ids.is_empty());
    assert!(listed(&db, tenant, scope).await.is_empty());
    assert!(groups.list(tenant, scope).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_group_only_client_sees_group_entities_and_their_runs() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let client = common::user(&db).await;
    let sibling = common::user(&db).await;
    common::member(&db, tenant, client, CLIENT_ROLE_SLUG).await;
    common::member(&db, tenant, sibling, CLIENT_ROLE_SLUG).await;

    let holdings = common::entity(&db, tenant, "Holdings").await;
    let rentals = common::entity(&db, tenant, "Rentals").await;
    let other = common::entity(&db, tenant, "Other Family Co").await;

    let groups = ClientGroupRepository::new(db.clone());
    let family = group(&groups, tenant, "Family").await;
    let neighbours = group(&groups, tenant, "Neighbours").await;
    groups.assign_entity(tenant, family, holdings).await.unwrap();
    groups.assign_entity(tenant, family, rentals).await.unwrap();
    groups.assign_entity(tenant, neighbours, other).await.unwrap();
    join(&groups, tenant, family, client, true).await;
    join(&groups, tenant, neighbours, sibling, true).await;
    TenantRepository::new(db.clone())
        .grant_entity(tenant, sibling, holdings)
        .await
        .unwrap();

    let (scope, ids) = visible(&db, tenant, client).await;
    let expected = sorted(vec![holdings, rentals]);
    assert_eq!(ids, expected);
    assert_eq!(listed(&db, tenant, scope).await, expected);

    let runs = ImportRunRepository::new(db.clone());
    for entity_id in [holdings, other] {
        runs.create(
            tenant,
            CreateImportRunInput {
                entity_id,
                client_group_id: None,
                tax_year: 2024,
                period_end_date: chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
                triggered_by: None,
            },
        )
        .await
        .unwrap();
    }
    let (visible_runs, total) = runs
        .list(tenant, scope, ImportRunFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(visible_runs[0].entity_id, holdings.0);

    let (_, staff_total) = runs
        .list(tenant, STAFF, ImportRunFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(staff_total, 2);
}

#[tokio::test]
async fn test_direct_grant_only_client_sees_granted_entity() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let client = common::user(&db).await;
    common::member(&db, tenant, client, CLIENT_ROLE_SLUG).await;

    let granted = common::entity(&db, tenant, "Granted").await;
    common::entity(&db, tenant, "Not Granted").await;
    TenantRepository::new(db.clone())
        .grant_entity(tenant, client, granted)
        .await
        .unwrap();

    let (scope, ids) = visible(&db, tenant, client).await;
    assert_eq!(ids, vec![granted]);
    assert_eq!(listed(&db, tenant, scope).await, vec![granted]);
    assert!(
        ClientGroupRepository::new(db.clone())
            .list(tenant, scope)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_staff_sees_every_entity_in_their_tenant() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let other_tenant = common::tenant(&db).await;
    let staff = common::user(&db).await;
    common::member(&db, tenant, staff, "accountant").await;

    let acme = common::entity(&db, tenant, "Acme").await;
    let globex = common::entity(&db, tenant, "Globex").await;
    let foreign = common::entity(&db, other_tenant, "Acme").await;

    let groups = ClientGroupRepository::new(db.clone());
    let family = group(&groups, tenant, "Family").await;
    groups.assign_entity(tenant, family, acme).await.unwrap();

    let (scope, ids) = visible(&db, tenant, staff).await;
    assert_eq!(scope, VisibilityScope::Unrestricted);
    let expected = sorted(vec![acme, globex]);
    assert_eq!(ids, expected);
    assert!(!ids.contains(&foreign));
    assert_eq!(listed(&db, tenant, scope).await, expected);
    assert_eq!(groups.list(tenant, scope).await.unwrap().len(), 1);
}
