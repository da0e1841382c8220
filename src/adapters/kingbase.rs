//! KingbaseES adapter. KingbaseES is wire-compatible with PostgreSQL
//! (`original_source/database/kb/kb_monitor.py` talks to it via the same
//! `pg_stat_activity` catalog used by the PostgreSQL monitor), so this
//! adapter reuses the PostgreSQL sub-probes directly rather than
//! reimplementing them.

use super::postgresql;
use crate::model::{Instance, Metrics};
use anyhow::Result;
use sqlx::PgPool;

pub async fn open(instance: &Instance) -> Result<PgPool> {
    postgresql::open(instance).await
}

pub async fn ping(pool: &PgPool) -> Result<bool> {
    postgresql::ping(pool).await
}

pub async fn collect(pool: &PgPool) -> Result<Metrics> {
    postgresql::collect(pool).await
}
