//! Engine adapters: one module per supported [`EngineKind`], each
//! implementing the four-operation contract described in the design notes
//! (`open`, `ping`, `collect`, `close`).
//!
//! The teacher crate modeled its Postgres-only collectors as a closed enum
//! generated by a `register_collectors!` macro, because every collector
//! shared one `PgPool` connection type. Here each engine owns a distinct
//! connection type, so the same "one place lists every variant, dispatch by
//! match rather than `dyn Trait`" shape is expressed directly as
//! [`AdapterHandle`] plus four dispatching functions, instead of forcing a
//! single macro-generated trait impl over incompatible handle types.

pub mod decimal;
mod dameng;
mod kingbase;
mod mongodb;
mod mssql;
mod mysql;
mod oracle;
mod postgresql;

use crate::model::{EngineKind, Instance, Metrics};
use anyhow::{Context, Result};

/// The open connection/session for one instance. Variant chosen by
/// [`Instance::kind`] at adapter-open time; never constructed dynamically.
pub enum AdapterHandle {
    Mysql(sqlx::MySqlPool),
    Postgresql(sqlx::PgPool),
    Kingbase(sqlx::PgPool),
    Oracle(oracle::OracleHandle),
    Mssql(deadpool_tiberius::Pool),
    Mongodb(::mongodb::Client),
    Dameng(dameng::DamengHandle),
}

/// The names of every supported engine, kept in the same enumeration order
/// as [`EngineKind`]. Used by the CLI to validate `--kind` style filters and
/// by tests that must iterate every adapter.
pub const ENGINE_NAMES: &[&str] = &[
    "mysql",
    "postgresql",
    "oracle",
    "mssql",
    "mongodb",
    "dm",
    "kb",
];

/// Open a connection/session for `instance`. Each variant applies its own
/// connect and query timeout from [`Instance::connect_timeout`].
pub async fn open(instance: &Instance) -> Result<AdapterHandle> {
    match instance.kind {
        EngineKind::Mysql => mysql::open(instance).await.map(AdapterHandle::Mysql),
        EngineKind::Postgresql => postgresql::open(instance)
            .await
            .map(AdapterHandle::Postgresql),
        EngineKind::Kingbase => kingbase::open(instance)
            .await
            .map(AdapterHandle::Kingbase),
        EngineKind::Oracle => oracle::open(instance).await.map(AdapterHandle::Oracle),
        EngineKind::Mssql => mssql::open(instance).await.map(AdapterHandle::Mssql),
        EngineKind::Mongodb => mongodb::open(instance).await.map(AdapterHandle::Mongodb),
        EngineKind::Dameng => dameng::open(instance).await.map(AdapterHandle::Dameng),
    }
    .with_context(|| format!("failed to open connection to instance '{}'", instance.name))
}

/// Minimal round-trip check, independent of the full `collect` sub-probe
/// sequence. Backs the `test-connection` subcommand (C11).
pub async fn ping(handle: &AdapterHandle) -> Result<bool> {
    match handle {
        AdapterHandle::Mysql(pool) => mysql::ping(pool).await,
        AdapterHandle::Postgresql(pool) | AdapterHandle::Kingbase(pool) => {
            postgresql::ping(pool).await
        }
        AdapterHandle::Oracle(h) => oracle::ping(h).await,
        AdapterHandle::Mssql(pool) => mssql::ping(pool).await,
        AdapterHandle::Mongodb(client) => mongodb::ping(client).await,
        AdapterHandle::Dameng(h) => dameng::ping(h).await,
    }
}

/// Run the full eight-sub-probe collection sequence described in the design
/// notes. Each sub-probe is isolated internally by the engine module: a
/// failure there becomes a `None` field rather than an error returned here.
pub async fn collect(handle: &AdapterHandle, instance: &Instance) -> Result<Metrics> {
    match handle {
        AdapterHandle::Mysql(pool) => mysql::collect(pool).await,
        AdapterHandle::Postgresql(pool) => postgresql::collect(pool).await,
        AdapterHandle::Kingbase(pool) => kingbase::collect(pool).await,
        AdapterHandle::Oracle(h) => oracle::collect(h).await,
        AdapterHandle::Mssql(pool) => mssql::collect(pool).await,
        AdapterHandle::Mongodb(client) => mongodb::collect(client, &instance.database).await,
        AdapterHandle::Dameng(h) => dameng::collect(h).await,
    }
}

/// Release any adapter-owned resources. Pools close on drop; this exists as
/// an explicit lifecycle step for adapters that hold a single session
/// (Oracle, Dameng) rather than a pool.
pub async fn close(handle: AdapterHandle) {
    match handle {
        AdapterHandle::Mysql(pool) => pool.close().await,
        AdapterHandle::Postgresql(pool) | AdapterHandle::Kingbase(pool) => pool.close().await,
        AdapterHandle::Oracle(h) => oracle::close(h).await,
        AdapterHandle::Mssql(_pool) => {}
        AdapterHandle::Mongodb(_client) => {}
        AdapterHandle::Dameng(h) => dameng::close(h).await,
    }
}
