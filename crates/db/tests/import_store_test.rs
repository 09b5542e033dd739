//! Integration tests for import runs, connections and snapshots.
//!
//! Requires `DATABASE_URL`; every test returns early without it.

mod common;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use common::STAFF;
use ledgerbridge_core::import::types::{
    RUN_TYPE_IMPORT, SNAPSHOT_SOURCE_QBO_IMPORTED, SNAPSHOT_TYPE_MONTH_ACTIVITY,
};
use ledgerbridge_core::import::{ImportRunStatus, ImportStore, NewSnapshot};
use ledgerbridge_core::qbo::{NormalizedLine, TokenSet};
use ledgerbridge_db::repositories::{CreateClientGroupInput, CreateImportRunInput, ImportRunFilter};
use ledgerbridge_db::{
    ClientGroupRepository, ImportRunRepository, QboConnectionRepository, RepoError,
    SeaImportStore, TrialBalanceRepository,
};
use ledgerbridge_shared::types::{ClientGroupId, EntityId, ImportRunId, PageRequest, TenantId};
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;

fn year_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
}

fn line(external_id: Option<&str>, name: &str, amount: rust_decimal::Decimal) -> NormalizedLine {
    NormalizedLine {
        external_account_id: external_id.map(str::to_string),
        account_name: name.to_string(),
        account_type: None,
        amount,
    }
}

fn snapshot(
    tenant_id: TenantId,
    entity_id: EntityId,
    run_id: ImportRunId,
    lines: Vec<NormalizedLine>,
) -> NewSnapshot {
    NewSnapshot {
        tenant_id,
        entity_id,
        import_run_id: run_id,
        tax_year: 2024,
        period_end_date: year_end(),
        snapshot_type: SNAPSHOT_TYPE_MONTH_ACTIVITY,
        source: SNAPSHOT_SOURCE_QBO_IMPORTED,
        run_type: RUN_TYPE_IMPORT,
        lines,
    }
}

async fn queue_run(
    db: &DatabaseConnection,
    tenant_id: TenantId,
    entity_id: EntityId,
    client_group_id: Option<ClientGroupId>,
) -> ImportRunId {
    let run = ImportRunRepository::new(db.clone())
        .create(
            tenant_id,
            CreateImportRunInput {
                entity_id,
                client_group_id,
                tax_year: 2024,
                period_end_date: year_end(),
                triggered_by: None,
            },
        )
        .await
        .expect("Failed to create run");
    ImportRunId::from_uuid(run.id)
}

#[tokio::test]
async fn test_run_lifecycle_through_store() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let entity = common::entity(&db, tenant, "Acme").await;
    let run_id = queue_run(&db, tenant, entity, None).await;
    let store = SeaImportStore::new(db.clone());

    let run = store.load_run(tenant, run_id).await.unwrap().unwrap();
    assert_eq!(run.status, ImportRunStatus::Queued);
    assert_eq!(run.entity_id, entity);

    let started = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
    store.mark_running(tenant, run_id, started).await.unwrap();
    store
        .mark_failed(tenant, run_id, started + Duration::seconds(5), "Token refresh failed")
        .await
        .unwrap();

    let failed = ImportRunRepository::new(db.clone())
        .find(tenant, STAFF, run_id)
        .await
        .unwrap();
    assert_eq!(ImportRunStatus::from(failed.status), ImportRunStatus::Failed);
    assert_eq!(failed.error_text.as_deref(), Some("Token refresh failed"));
    assert!(failed.finished_at.is_some());

    store.mark_running(tenant, run_id, started).await.unwrap();
    store
        .mark_success(tenant, run_id, started + Duration::seconds(10))
        .await
        .unwrap();
    let done = ImportRunRepository::new(db.clone())
        .find(tenant, STAFF, run_id)
        .await
        .unwrap();
    assert_eq!(ImportRunStatus::from(done.status), ImportRunStatus::Success);
    assert_eq!(done.error_text, None);

    let other_tenant = common::tenant(&db).await;
    assert!(store.load_run(other_tenant, run_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unfinished_runs_are_recovered_as_first_attempts() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let entity = common::entity(&db, tenant, "Acme").await;
    let store = SeaImportStore::new(db.clone());
    let started = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();

    let queued = queue_run(&db, tenant, entity, None).await;
    let running = queue_run(&db, tenant, entity, None).await;
    store.mark_running(tenant, running, started).await.unwrap();
    let finished = queue_run(&db, tenant, entity, None).await;
    store.mark_running(tenant, finished, started).await.unwrap();
    store
        .mark_success(tenant, finished, started + Duration::seconds(3))
        .await
        .unwrap();

    let other_tenant = common::tenant(&db).await;
    let other_entity = common::entity(&db, other_tenant, "Globex").await;
    let foreign = queue_run(&db, other_tenant, other_entity, None).await;

    let jobs = ImportRunRepository::new(db.clone())
        .unfinished_jobs()
        .await
        .unwrap();

    let ours: Vec<_> = jobs.iter().filter(|job| job.tenant_id == tenant).collect();
    assert_eq!(ours.len(), 2);
    assert_eq!(ours[0].run_id, queued);
    assert_eq!(ours[1].run_id, running);
    assert!(ours.iter().all(|job| job.attempt == 1));

    let theirs: Vec<_> = jobs
        .iter()
        .filter(|job| job.tenant_id == other_tenant)
        .collect();
    assert_eq!(theirs.len(), 1);
    assert_eq!(theirs[0].run_id, foreign);
}

#[tokio::test]
async fn test_runs_share_tax_year_context() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let entity = common::entity(&db, tenant, "Acme").await;
    let group = ClientGroupRepository::new(db.clone())
        .create(
            tenant,
            CreateClientGroupInput {
                name: "Family".into(),
                description: None,
            },
        )
        .await
        .unwrap();
    let group_id = ClientGroupId::from_uuid(group.id);

    let first = queue_run(&db, tenant, entity, Some(group_id)).await;
    let second = queue_run(&db, tenant, entity, Some(group_id)).await;

    let runs = ImportRunRepository::new(db.clone());
    let first = runs.find(tenant, STAFF, first).await.unwrap();
    let second = runs.find(tenant, STAFF, second).await.unwrap();
    assert!(first.client_group_tax_year_id.is_some());
    assert_eq!(first.client_group_tax_year_id, second.client_group_tax_year_id);

    let (listed, total) = runs
        .list(
            tenant,
            STAFF,
            ImportRunFilter {
                client_group_id: Some(group_id),
                ..ImportRunFilter::default()
            },
            PageRequest {
                page: 1,
                per_page: 1,
            },
        )
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, second.id);
}

#[tokio::test]
async fn test_run_for_foreign_entity_is_rejected() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let other = common::tenant(&db).await;
    let foreign = common::entity(&db, other, "Elsewhere").await;

    let err = ImportRunRepository::new(db.clone())
        .create(
            tenant,
            CreateImportRunInput {
                entity_id: foreign,
                client_group_id: None,
                tax_year: 2024,
                period_end_date: year_end(),
                triggered_by: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound("Entity")));
}

#[tokio::test]
async fn test_snapshots_are_appended_and_accounts_reused() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let entity = common::entity(&db, tenant, "Acme").await;
    let first_run = queue_run(&db, tenant, entity, None).await;
    let second_run = queue_run(&db, tenant, entity, None).await;
    let store = SeaImportStore::new(db.clone());

    store
        .write_snapshot(&snapshot(
            tenant,
            entity,
            first_run,
            vec![
                NormalizedLine {
                    account_type: Some("Bank".into()),
                    ..line(Some("35"), "Checking", dec!(1200.50))
                },
                line(None, "Owner Draws", dec!(-300.00)),
            ],
        ))
        .await
        .unwrap();
    store
        .write_snapshot(&snapshot(
            tenant,
            entity,
            second_run,
            vec![
                line(Some("35"), "Checking (renamed)", dec!(1500.00)),
                line(None, "Owner Draws", dec!(-450.25)),
            ],
        ))
        .await
        .unwrap();

    let snapshots = TrialBalanceRepository::new(db.clone());
    let first = snapshots.list_for_run(tenant, STAFF, first_run).await.unwrap();
    let second = snapshots.list_for_run(tenant, STAFF, second_run).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first[0].snapshot.id, second[0].snapshot.id);

    let first_lines = &first[0].lines;
    let second_lines = &second[0].lines;
    assert_eq!(first_lines.len(), 2);
    assert_eq!(first_lines[0].line.amount, dec!(1200.50));
    assert_eq!(second_lines[1].line.amount, dec!(-450.25));

    // Same external id and same name resolve to the same accounts.
    assert_eq!(first_lines[0].line.account_id, second_lines[0].line.account_id);
    assert_eq!(first_lines[1].line.account_id, second_lines[1].line.account_id);
    let checking = first_lines[0].account.as_ref().unwrap();
    assert_eq!(checking.external_account_id.as_deref(), Some("35"));
    assert_eq!(checking.account_type.as_deref(), Some("Bank"));
    let draws = first_lines[1].account.as_ref().unwrap();
    assert_eq!(draws.account_type, None);
}

#[tokio::test]
async fn test_empty_snapshot_is_written() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let entity = common::entity(&db, tenant, "Dormant").await;
    let run_id = queue_run(&db, tenant, entity, None).await;

    SeaImportStore::new(db.clone())
        .write_snapshot(&snapshot(tenant, entity, run_id, Vec::new()))
        .await
        .unwrap();

    let stored = TrialBalanceRepository::new(db.clone())
        .list_for_run(tenant, STAFF, run_id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].lines.is_empty());
}

#[tokio::test]
async fn test_connection_tokens_round_trip() {
    let Some(db) = common::database().await else {
        return;
    };
    let tenant = common::tenant(&db).await;
    let entity = common::entity(&db, tenant, "Acme").await;
    let connections = QboConnectionRepository::new(db.clone());
    let expires_at = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();

    connections
        .upsert_for_entity(
            tenant,
            entity,
            "9130350",
            &TokenSet {
                access_token: "access-1".into(),
                refresh_token: Some("refresh-1".into()),
                expires_at: Some(expires_at),
            },
        )
        .await
        .unwrap();

    let store = SeaImportStore::new(db.clone());
    let record = store.load_connection(tenant, entity).await.unwrap().unwrap();
    assert_eq!(record.realm_id, "9130350");
    assert_eq!(record.tokens.expires_at, Some(expires_at));

    let rotated = TokenSet {
        access_token: "access-2".into(),
        refresh_token: Some("refresh-2".into()),
        expires_at: Some(expires_at + Duration::hours(1)),
    };
    store.save_tokens(tenant, record.id, &rotated).await.unwrap();

    let reloaded = store.load_connection(tenant, entity).await.unwrap().unwrap();
    assert_eq!(reloaded.id, record.id);
    assert_eq!(reloaded.tokens.access_token, "access-2");
    assert_eq!(reloaded.tokens.refresh_token.as_deref(), Some("refresh-2"));

    connections
        .upsert_for_entity(tenant, entity, "9130351", &rotated)
        .await
        .unwrap();
    let relinked = store.load_connection(tenant, entity).await.unwrap().unwrap();
    assert_eq!(relinked.id, record.id);
    assert_eq!(relinked.realm_id, "9130351");
}
