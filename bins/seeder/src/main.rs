//! Database seeder for LedgerBridge development and testing.
//!
//! Seeds the platform roles, a demo tenant with a staff owner and a client
//! user, one entity and one client group that grants the client access to it.
//! Every step is idempotent; re-running the seeder leaves existing rows alone.

use anyhow::Context;
use ledgerbridge_core::access::VisibilityScope;
use ledgerbridge_db::entities::{client_groups, entities, tenants, users};
use ledgerbridge_db::repositories::{
    CreateClientGroupInput, CreateEntityInput, CreateMembershipInput, RoleSpec,
};
use ledgerbridge_db::{
    ClientGroupRepository, EntityRepository, RepoError, RoleRepository, TenantRepository,
    UserRepository, connect,
};
use ledgerbridge_shared::types::{ClientGroupId, EntityId, RoleId, TenantId, UserId};
use sea_orm::DatabaseConnection;

const PLATFORM_ROLES: [RoleSpec<'static>; 3] = [
    RoleSpec {
        slug: "admin",
        name: "Administrator",
        description: Some("Full access to every tenant resource"),
        tenant_id: None,
    },
    RoleSpec {
        slug: "accountant",
        name: "Accountant",
        description: Some("Staff member preparing client returns"),
        tenant_id: None,
    },
    RoleSpec {
        slug: "client",
        name: "Client",
        description: Some("Sees only the entities of their client groups"),
        tenant_id: None,
    },
];

const DEMO_TENANT_SLUG: &str = "demo-firm";
const DEMO_ENTITY_NAME: &str = "Demo Holdings LLC";
const DEMO_GROUP_NAME: &str = "Demo Family";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("LEDGERBRIDGE__DATABASE__URL"))
        .context("DATABASE_URL must be set")?;

    println!("Connecting to database...");
    let db = connect(&database_url, 5, 1).await?;

    println!("Seeding roles...");
    let staff_role = seed_roles(&db).await?;

    println!("Seeding demo tenant...");
    let tenant = seed_tenant(&db).await?;
    let tenant_id = TenantId::from_uuid(tenant.id);

    println!("Seeding users...");
    let owner = seed_member(&db, tenant_id, "owner@ledgerbridge.dev", "Demo Owner", staff_role, true)
        .await?;
    let client_role = RoleRepository::new(db.clone())
        .find_by_slug("client")
        .await?
        .map(|role| RoleId::from_uuid(role.id));
    let client = seed_member(&db, tenant_id, "client@ledgerbridge.dev", "Demo Client", client_role, false)
        .await?;

    println!("Seeding entity and client group...");
    let entity = seed_entity(&db, tenant_id).await?;
    let group = seed_client_group(&db, tenant_id).await?;
    seed_group_access(
        &db,
        tenant_id,
        ClientGroupId::from_uuid(group.id),
        EntityId::from_uuid(entity.id),
        UserId::from_uuid(client.id),
    )
    .await?;

    println!();
    println!("Seeding complete.");
    println!("  Tenant:  {} ({})", tenant.name, tenant.id);
    println!("  Owner:   {} ({})", owner.email, owner.id);
    println!("  Client:  {} ({})", client.email, client.id);
    println!("  Entity:  {} ({})", entity.name, entity.id);
    println!("  Group:   {} ({})", group.name, group.id);
    Ok(())
}

/// Ensures the platform roles and returns the staff role used for the owner.
async fn seed_roles(db: &DatabaseConnection) -> anyhow::Result<Option<RoleId>> {
    let repo = RoleRepository::new(db.clone());
    let mut admin = None;
    for spec in PLATFORM_ROLES {
        let role = repo.ensure(spec).await?;
        println!("  Role ready: {}", role.slug);
        if role.slug == "admin" {
            admin = Some(RoleId::from_uuid(role.id));
        }
    }
    Ok(admin)
}

async fn seed_tenant(db: &DatabaseConnection) -> anyhow::Result<tenants::Model> {
    let repo = TenantRepository::new(db.clone());
    if let Some(existing) = repo.find_by_slug(DEMO_TENANT_SLUG).await? {
        println!("  Demo tenant already exists, skipping...");
        return Ok(existing);
    }
    let tenant = repo.create("Demo Firm", DEMO_TENANT_SLUG).await?;
    println!("  Created tenant: {}", tenant.name);
    Ok(tenant)
}

async fn seed_member(
    db: &DatabaseConnection,
    tenant_id: TenantId,
    email: &str,
    full_name: &str,
    role_id: Option<RoleId>,
    is_owner: bool,
) -> anyhow::Result<users::Model> {
    let user = UserRepository::new(db.clone())
        .ensure(email, Some(full_name))
        .await?;

    match TenantRepository::new(db.clone())
        .add_member(tenant_id, UserId::from_uuid(user.id), role_id, is_owner)
        .await
    {
        Ok(_) => println!("  Added member: {email}"),
        Err(RepoError::Conflict(_)) => println!("  Member {email} already exists, skipping..."),
        Err(e) => return Err(e.into()),
    }
    Ok(user)
}

async fn seed_entity(db: &DatabaseConnection, tenant_id: TenantId) -> anyhow::Result<entities::Model> {
    let repo = EntityRepository::new(db.clone());
    let input = CreateEntityInput {
        name: DEMO_ENTITY_NAME.to_string(),
        entity_type: Some("LLC".to_string()),
        status: None,
        ein: None,
        tax_type: Some("1065".to_string()),
        source_type: Some("QBO".to_string()),
        notes: None,
    };
    match repo.create(tenant_id, input).await {
        Ok(entity) => {
            println!("  Created entity: {}", entity.name);
            Ok(entity)
        }
        Err(RepoError::Conflict(_)) => {
            println!("  Demo entity already exists, skipping...");
            repo.list(tenant_id, VisibilityScope::Unrestricted)
                .await?
                .into_iter()
                .find(|e| e.name == DEMO_ENTITY_NAME)
                .context("demo entity conflicts but cannot be found")
        }
        Err(e) => Err(e.into()),
    }
}

async fn seed_client_group(
    db: &DatabaseConnection,
    tenant_id: TenantId,
) -> anyhow::Result<client_groups::Model> {
    let repo = ClientGroupRepository::new(db.clone());
    let input = CreateClientGroupInput {
        name: DEMO_GROUP_NAME.to_string(),
        description: Some("Seeded client group".to_string()),
    };
    match repo.create(tenant_id, input).await {
        Ok(group) => {
            println!("  Created client group: {}", group.name);
            Ok(group)
        }
        Err(RepoError::Conflict(_)) => {
            println!("  Demo client group already exists, skipping...");
            repo.list(tenant_id, VisibilityScope::Unrestricted)
                .await?
                .into_iter()
                .find(|g| g.name == DEMO_GROUP_NAME)
                .context("demo client group conflicts but cannot be found")
        }
        Err(e) => Err(e.into()),
    }
}

/// Assigns the entity to the group and makes the client an active member.
async fn seed_group_access(
    db: &DatabaseConnection,
    tenant_id: TenantId,
    group_id: ClientGroupId,
    entity_id: EntityId,
    client_id: UserId,
) -> anyhow::Result<()> {
    let repo = ClientGroupRepository::new(db.clone());
    match repo.assign_entity(tenant_id, group_id, entity_id).await {
        Ok(_) => println!("  Assigned entity to client group"),
        Err(RepoError::Conflict(_)) => println!("  Entity already assigned, skipping..."),
        Err(e) => return Err(e.into()),
    }

    let membership = CreateMembershipInput {
        user_id: client_id,
        role_slug: None,
        is_active: None,
    };
    match repo.add_membership(tenant_id, group_id, membership).await {
        Ok(_) => println!("  Added client to client group"),
        Err(RepoError::Conflict(_)) => println!("  Client membership already exists, skipping..."),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
