//! Sink Writer (C7): creates `monitor_main`/`monitor_alerts` if absent and
//! inserts a batch of [`IngestRecord`]s in one connection, one transaction,
//! single commit-or-rollback, matching `monitor_to_db.py::DatabaseWriter`'s
//! "one cursor, one commit per batch, rollback on any failure" pattern.
//!
//! KingbaseES shares PostgreSQL's DDL dialect (it is PG-wire-compatible);
//! Dameng shares Oracle's (its SQL dialect follows Oracle's V$ catalog
//! style). The original monitor grouped both with MySQL regardless of this,
//! which the DDL below does not reproduce — see `DESIGN.md`.

mod mongo;
mod mssql;
mod oracle_like;
mod sql;

use crate::config::IngestionConfig;
use crate::ingest::record::IngestRecord;
use crate::model::EngineKind;
use anyhow::Result;

/// The DDL/placeholder family a given engine inserts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
    Oracle,
    Mssql,
    Mongo,
}

impl Dialect {
    #[must_use]
    pub const fn for_engine(kind: EngineKind) -> Self {
        match kind {
            EngineKind::Mysql => Self::MySql,
            EngineKind::Postgresql | EngineKind::Kingbase => Self::Postgres,
            EngineKind::Oracle | EngineKind::Dameng => Self::Oracle,
            EngineKind::Mssql => Self::Mssql,
            EngineKind::Mongodb => Self::Mongo,
        }
    }
}

/// Ensures `monitor_main`/`monitor_alerts` (or their Mongo collection
/// equivalents) exist, then inserts `records` in a single pass. Returns the
/// number of main-table rows written.
pub async fn write_batch(config: &IngestionConfig, records: &[IngestRecord]) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    match Dialect::for_engine(config.db_type) {
        Dialect::MySql => sql::write_batch_mysql(config, records).await,
        Dialect::Postgres => sql::write_batch_postgres(config, records).await,
        Dialect::Mssql => mssql::write_batch(config, records).await,
        Dialect::Oracle => oracle_like::write_batch(config, records).await,
        Dialect::Mongo => mongo::write_batch(config, records).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kingbase_shares_the_postgres_dialect() {
        assert_eq!(Dialect::for_engine(EngineKind::Kingbase), Dialect::Postgres);
    }

    #[test]
    fn dameng_shares_the_oracle_dialect() {
        assert_eq!(Dialect::for_engine(EngineKind::Dameng), Dialect::Oracle);
    }
}
