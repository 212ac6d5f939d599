//! Postgres-backed store and identity provider.
//!
//! These need a running Postgres reachable with `configuration.yaml` (or
//! `APP_DATABASE__*`), so they are ignored by default:
//! `cargo test --test postgres_store -- --ignored`

use rentapp_auth::auth::{
    NewRefreshToken, PgRefreshTokenStore, RefreshTokenStore, TokenManager,
};
use rentapp_auth::configuration::{get_configuration, DatabaseSettings};
use rentapp_auth::error::{AppError, DatabaseError, ValidationError};
use rentapp_auth::identity::{Identity, IdentityProvider, PgIdentityProvider};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

struct TestDb {
    pool: PgPool,
    identity: Identity,
}

async fn setup() -> TestDb {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = Uuid::new_v4().to_string();
    let pool = configure_database(&configuration.database).await;

    let identity = PgIdentityProvider::new(pool.clone())
        .create_identity("Test User", "a@b.com", "SecurePass123")
        .await
        .expect("Failed to create user");

    TestDb { pool, identity }
}

fn new_token(user_id: Uuid, value: &str) -> NewRefreshToken {
    NewRefreshToken::new(Uuid::new_v4().to_string(), value.to_string(), user_id, 3600)
}

#[tokio::test]
#[ignore]
async fn created_token_is_found_by_value_but_stored_hashed() {
    let db = setup().await;
    let store = PgRefreshTokenStore::new(db.pool.clone());

    let created = store
        .create(new_token(db.identity.id, "AbCdEfGhIjKlMnOpQrStUvW"))
        .await
        .expect("create failed");
    let found = store
        .find_by_value("AbCdEfGhIjKlMnOpQrStUvW")
        .await
        .unwrap()
        .expect("record not found");

    assert_eq!(found.id, created.id);
    assert_eq!(found.jwt_id, created.jwt_id);
    assert_eq!(found.user_id, db.identity.id);
    assert!(!found.is_used && !found.is_revoked);

    let (stored,): (String,) = sqlx::query_as("SELECT token_hash FROM refresh_tokens WHERE id = $1")
        .bind(created.id)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_ne!(stored, "AbCdEfGhIjKlMnOpQrStUvW");
    assert_eq!(stored.len(), 64);
}

#[tokio::test]
#[ignore]
async fn duplicate_value_is_a_conflict() {
    let db = setup().await;
    let store = PgRefreshTokenStore::new(db.pool.clone());

    store
        .create(new_token(db.identity.id, "duplicate-value"))
        .await
        .unwrap();
    let err = store
        .create(new_token(db.identity.id, "duplicate-value"))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
}

#[tokio::test]
#[ignore]
async fn try_mark_used_wins_once() {
    let db = setup().await;
    let store = PgRefreshTokenStore::new(db.pool.clone());
    let record = store
        .create(new_token(db.identity.id, "single-use"))
        .await
        .unwrap();

    assert!(store.try_mark_used(record.id).await.unwrap());
    assert!(!store.try_mark_used(record.id).await.unwrap());

    let found = store.find_by_value("single-use").await.unwrap().unwrap();
    assert!(found.is_used);
}

#[tokio::test]
#[ignore]
async fn revoked_token_cannot_be_marked_used() {
    let db = setup().await;
    let store = PgRefreshTokenStore::new(db.pool.clone());
    let record = store
        .create(new_token(db.identity.id, "to-revoke"))
        .await
        .unwrap();

    store.revoke(record.id).await.unwrap();

    assert!(!store.try_mark_used(record.id).await.unwrap());
    let found = store.find_by_value("to-revoke").await.unwrap().unwrap();
    assert!(found.is_revoked);
    assert!(!found.is_used);
}

#[tokio::test]
#[ignore]
async fn updates_on_unknown_id_are_not_found() {
    let db = setup().await;
    let store = PgRefreshTokenStore::new(db.pool.clone());

    assert!(matches!(
        store.mark_used(999_999).await,
        Err(AppError::Database(DatabaseError::NotFound(_)))
    ));
    assert!(matches!(
        store.revoke(999_999).await,
        Err(AppError::Database(DatabaseError::NotFound(_)))
    ));
}

#[tokio::test]
#[ignore]
async fn duplicate_email_is_rejected() {
    let db = setup().await;
    let identities = PgIdentityProvider::new(db.pool.clone());

    let err = identities
        .create_identity("Other", "a@b.com", "SecurePass123")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Validation(ValidationError::EmailAlreadyExists)
    ));
}

#[tokio::test]
#[ignore]
async fn identity_lookup_and_password_check() {
    let db = setup().await;
    let identities = PgIdentityProvider::new(db.pool.clone());

    let by_email = identities
        .find_identity_by_email("a@b.com")
        .await
        .unwrap()
        .expect("identity by email");
    let by_id = identities
        .find_identity_by_id(db.identity.id)
        .await
        .unwrap()
        .expect("identity by id");

    assert_eq!(by_email, by_id);
    assert!(identities.verify_password(&by_email, "SecurePass123").await.unwrap());
    assert!(!identities.verify_password(&by_email, "WrongPass123").await.unwrap());
}

#[tokio::test]
#[ignore]
async fn rotation_against_postgres() {
    let db = setup().await;
    let configuration = get_configuration().expect("Failed to read configuration.");
    let manager = TokenManager::new(
        &configuration.jwt,
        Arc::new(PgRefreshTokenStore::new(db.pool.clone())),
        Arc::new(PgIdentityProvider::new(db.pool.clone())),
    )
    .expect("Failed to build token manager");

    let first = manager.issue(&db.identity).await.unwrap();
    let second = manager
        .rotate(&first.access_token, &first.refresh_token)
        .await
        .unwrap();

    assert_ne!(first.refresh_token, second.refresh_token);
    assert!(manager
        .rotate(&first.access_token, &first.refresh_token)
        .await
        .is_err());
}

#[tokio::test]
#[ignore]
async fn redeem_and_replace_is_all_or_nothing() {
    let db = setup().await;
    let store = PgRefreshTokenStore::new(db.pool.clone());
    let old = store
        .create(new_token(db.identity.id, "old-value"))
        .await
        .unwrap();
    store
        .create(new_token(db.identity.id, "taken-value"))
        .await
        .unwrap();

    let err = store
        .redeem_and_replace(old.id, new_token(db.identity.id, "taken-value"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    let untouched = store.find_by_value("old-value").await.unwrap().unwrap();
    assert!(!untouched.is_used, "a failed insert rolls the claim back");

    let replacement = store
        .redeem_and_replace(old.id, new_token(db.identity.id, "new-value"))
        .await
        .unwrap()
        .expect("first redeem wins");
    assert_eq!(
        store.find_by_value("new-value").await.unwrap().map(|r| r.id),
        Some(replacement.id)
    );
    assert!(store.find_by_value("old-value").await.unwrap().unwrap().is_used);

    let again = store
        .redeem_and_replace(old.id, new_token(db.identity.id, "other-value"))
        .await
        .unwrap();
    assert_eq!(again, None);
    assert_eq!(store.find_by_value("other-value").await.unwrap(), None);
}
