//! 账户存储集成测试
//!
//! 需要 PostgreSQL 实例：设置 `DATABASE_URL` 后运行 `cargo test -- --ignored`。

use std::collections::HashSet;
use std::sync::Arc;

use account_store::domain::{
    AuthorizationLookup, CredentialKind, Dimension, ResolveError, UnitOfWorkFactory,
    WildcardPermission,
};
use account_store::{DefaultAccountStore, PostgresUnitOfWorkFactory};
use chrono::{TimeZone, Utc};
use sqlx::PgPool;
use warden_adapter_postgres::AccessMode;
use warden_errors::AppError;

fn store(pool: PgPool) -> DefaultAccountStore {
    warden_telemetry::init_test_tracing();
    DefaultAccountStore::with_default_resolvers(Arc::new(PostgresUnitOfWorkFactory::new(pool)))
}

fn descriptors<'a>(permissions: impl IntoIterator<Item = &'a WildcardPermission>) -> HashSet<String> {
    permissions.into_iter().map(ToString::to_string).collect()
}

#[sqlx::test(migrations = "./migrations", fixtures("lebowski"))]
#[ignore] // 需要 PostgreSQL 实例
async fn test_u1_permissions(pool: PgPool) {
    let store = store(pool);

    let permissions = store
        .get_authorization_permissions("u1")
        .await
        .unwrap()
        .unwrap();

    let domains: HashSet<Dimension> = permissions.keys().cloned().collect();
    assert_eq!(
        domains,
        HashSet::from([Dimension::named("leatherduffelbag"), Dimension::named("money")])
    );
    assert_eq!(
        descriptors(permissions.values().flatten()),
        HashSet::from([
            "leatherduffelbag:transport:theringer".to_string(),
            "money:write:bankcheck_19911109069".to_string(),
        ])
    );
}

#[sqlx::test(migrations = "./migrations", fixtures("lebowski"))]
#[ignore] // 需要 PostgreSQL 实例
async fn test_u1_roles(pool: PgPool) {
    let store = store(pool);

    let roles = store.get_authorization_roles("u1").await.unwrap().unwrap();
    let titles: HashSet<String> = roles.into_iter().map(|r| r.title).collect();

    assert_eq!(
        titles,
        HashSet::from(["courier".to_string(), "tenant".to_string()])
    );
}

#[sqlx::test(migrations = "./migrations", fixtures("lebowski"))]
#[ignore] // 需要 PostgreSQL 实例
async fn test_user_without_roles(pool: PgPool) {
    let store = store(pool);

    assert!(store.get_authorization_permissions("u2").await.unwrap().is_none());
    assert!(store.get_authorization_roles("u2").await.unwrap().is_none());
    assert!(store.get_authentication_info("u2").await.unwrap().is_some());
}

#[sqlx::test(migrations = "./migrations", fixtures("lebowski"))]
#[ignore] // 需要 PostgreSQL 实例
async fn test_actions_collapse_per_domain_and_resource(pool: PgPool) {
    let store = store(pool);

    let donny = store
        .get_authorization_permissions("donny")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        descriptors(donny.values().flatten()),
        HashSet::from(["money:access,deposit:ransom".to_string()])
    );

    let marty = store
        .get_authorization_permissions("marty")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        descriptors(marty.values().flatten()),
        HashSet::from(["money:deposit,withdrawal:*".to_string()])
    );
}

#[sqlx::test(migrations = "./migrations", fixtures("lebowski"))]
#[ignore] // 需要 PostgreSQL 实例
async fn test_union_across_roles_without_duplicates(pool: PgPool) {
    let store = store(pool);

    // courier 与 thief 都授予 leatherduffelbag:transport:theringer
    let permissions = store
        .get_authorization_permissions("bunny")
        .await
        .unwrap()
        .unwrap();

    let all: Vec<&WildcardPermission> = permissions.values().flatten().collect();
    assert_eq!(all.len(), 2);
    assert_eq!(
        descriptors(all),
        HashSet::from([
            "leatherduffelbag:open,transport:theringer".to_string(),
            "money:access:ransom".to_string(),
        ])
    );
}

#[sqlx::test(migrations = "./migrations", fixtures("lebowski"))]
#[ignore] // 需要 PostgreSQL 实例
async fn test_null_domain_is_wildcard_not_literal_star(pool: PgPool) {
    let store = store(pool);

    let permissions = store
        .get_authorization_permissions("maude")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        descriptors(&permissions[&Dimension::Any]),
        HashSet::from(["*:paint:*".to_string()])
    );
    assert_eq!(
        descriptors(&permissions[&Dimension::named("*")]),
        HashSet::from(["\\*:paint:*".to_string()])
    );

    let any_domain: WildcardPermission = "*:paint:*".parse().unwrap();
    assert!(any_domain.implies(&"money:paint:ransom".parse().unwrap()));
    let literal: WildcardPermission = "\\*:paint:*".parse().unwrap();
    assert!(!literal.implies(&"money:paint:ransom".parse().unwrap()));
}

#[sqlx::test(migrations = "./migrations", fixtures("lebowski"))]
#[ignore] // 需要 PostgreSQL 实例
async fn test_null_role_title_is_unresolvable(pool: PgPool) {
    let store = store(pool);

    assert_eq!(
        store.lookup_authorization_roles("nihilist").await.unwrap(),
        AuthorizationLookup::Unresolvable(ResolveError::MissingField("title"))
    );
    assert!(store.get_authorization_roles("nihilist").await.unwrap().is_none());
    assert!(store.get_authorization_permissions("nihilist").await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations", fixtures("lebowski"))]
#[ignore] // 需要 PostgreSQL 实例
async fn test_authentication_info(pool: PgPool) {
    let store = store(pool);

    let dude = store.get_authentication_info("thedude").await.unwrap().unwrap();
    assert_eq!(dude.credential_count(), 2);
    assert_eq!(dude.credentials_of(&CredentialKind::TotpKey).len(), 1);
    assert_eq!(dude.phone_number.as_deref(), Some("+13105550199"));
    assert!(!dude.is_locked());

    // 只有密码凭证时不加载手机号
    let u2 = store.get_authentication_info("u2").await.unwrap().unwrap();
    assert_eq!(u2.phone_number, None);

    let larry = store.get_authentication_info("larry").await.unwrap().unwrap();
    assert_eq!(
        larry.locked_at.map(|t| t.timestamp_millis()),
        Some(1_500_000_000_000)
    );

    assert!(store.get_authentication_info("jesus").await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations", fixtures("lebowski"))]
#[ignore] // 需要 PostgreSQL 实例
async fn test_lock_and_unlock_are_idempotent(pool: PgPool) {
    let store = store(pool.clone());
    let locked_at = Utc.with_ymd_and_hms(1998, 3, 6, 12, 0, 0).unwrap();

    store.lock_account("walter", locked_at).await.unwrap();
    store.lock_account("walter", locked_at).await.unwrap();

    let stored: Option<i64> =
        sqlx::query_scalar(r#"SELECT account_lock_millis FROM "user" WHERE identifier = $1"#)
            .bind("walter")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(stored, Some(locked_at.timestamp_millis()));

    let walter = store.get_authentication_info("walter").await.unwrap().unwrap();
    assert_eq!(walter.locked_at, Some(locked_at));

    store.unlock_account("walter").await.unwrap();
    store.unlock_account("walter").await.unwrap();
    let walter = store.get_authentication_info("walter").await.unwrap().unwrap();
    assert!(!walter.is_locked());
}

#[sqlx::test(migrations = "./migrations", fixtures("lebowski"))]
#[ignore] // 需要 PostgreSQL 实例
async fn test_authorization_info_and_account(pool: PgPool) {
    let store = store(pool);

    let info = store.get_authorization_info("thedude").await.unwrap().unwrap();
    assert_eq!(info.roles.len(), 3);
    assert_eq!(
        descriptors(&info.permissions),
        HashSet::from([
            "leatherduffelbag:transport:theringer".to_string(),
            "money:write:bankcheck_19911109069".to_string(),
            "money:deposit:*".to_string(),
        ])
    );

    let account = store.get_account("thedude").await.unwrap().unwrap();
    assert!(account.authentication.is_some());
    assert_eq!(account.roles.as_ref().map(Vec::len), Some(3));
    assert!(store.get_account("jesus").await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations", fixtures("lebowski"))]
#[ignore] // 需要 PostgreSQL 实例
async fn test_uncommitted_unit_of_work_rolls_back(pool: PgPool) {
    let factory = PostgresUnitOfWorkFactory::new(pool.clone());

    let uow = factory.begin(AccessMode::ReadWrite).await.unwrap();
    let updated = uow
        .accounts()
        .set_account_lock("thedude", Some(1))
        .await
        .unwrap();
    assert_eq!(updated, 1);
    drop(uow);

    let uow = factory.begin(AccessMode::ReadWrite).await.unwrap();
    uow.accounts()
        .set_account_lock("thedude", Some(2))
        .await
        .unwrap();
    uow.rollback().await.unwrap();

    let stored: Option<i64> =
        sqlx::query_scalar(r#"SELECT account_lock_millis FROM "user" WHERE identifier = $1"#)
            .bind("thedude")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(stored, None);
}

#[sqlx::test(migrations = "./migrations", fixtures("lebowski"))]
#[ignore] // 需要 PostgreSQL 实例
async fn test_read_only_unit_of_work_rejects_writes(pool: PgPool) {
    let factory = PostgresUnitOfWorkFactory::new(pool);

    let uow = factory.begin(AccessMode::ReadOnly).await.unwrap();
    let result = uow.accounts().set_account_lock("thedude", Some(1)).await;

    assert!(matches!(result, Err(AppError::Internal(_))));
}
