//! Backend environment composition
//!
//! The backend always runs on RelStorage over PostgreSQL. What changes with
//! a managed database is where the DSN points and whether credentials come
//! from the CloudNativePG application Secret.

use crate::database::{DatabaseRef, DATABASE_NAME};
use crate::k8s::EnvVar;

/// Env var holding the database user, resolved from the cluster Secret
pub const SECRET_USERNAME_VAR: &str = "SECRET_POSTGRESQL_USERNAME";

/// Env var holding the database password, resolved from the cluster Secret
pub const SECRET_PASSWORD_VAR: &str = "SECRET_POSTGRESQL_PASSWORD";

/// Env var carrying the RelStorage PostgreSQL DSN
pub const DSN_VAR: &str = "INSTANCE_db_relstorage_postgresql_dsn";

/// DSN used when no managed database is generated. Must be edited for
/// production.
pub const PLACEHOLDER_DSN: &str = "host='db-host' dbname='plone' user='plone' password='secret'";

/// Compose the backend environment.
///
/// With a database, the two secret-indirection entries come first so the
/// DSN's `$(VAR)` references resolve when the container starts.
pub fn compile(database: Option<&DatabaseRef>) -> Vec<EnvVar> {
    match database {
        Some(db) => compile_managed(db),
        None => compile_placeholder(),
    }
}

fn compile_managed(db: &DatabaseRef) -> Vec<EnvVar> {
    let username = EnvVar::from_secret(SECRET_USERNAME_VAR, &db.secret_name, "username");
    let password = EnvVar::from_secret(SECRET_PASSWORD_VAR, &db.secret_name, "password");

    let dsn = format!(
        "host='{}' dbname='{}' user='{}' password='{}'",
        db.service_name,
        DATABASE_NAME,
        username.interpolation_token(),
        password.interpolation_token(),
    );

    let mut env = vec![username, password];
    env.extend(storage_entries());
    env.push(EnvVar::literal(DSN_VAR, dsn));
    env
}

fn compile_placeholder() -> Vec<EnvVar> {
    let mut env = storage_entries();
    env.push(EnvVar::literal(DSN_VAR, PLACEHOLDER_DSN));
    env
}

fn storage_entries() -> Vec<EnvVar> {
    vec![
        EnvVar::literal("INSTANCE_db_storage", "relstorage"),
        EnvVar::literal("INSTANCE_db_blob_mode", "cache"),
        EnvVar::literal("INSTANCE_db_relstorage", "postgresql"),
    ]
}
