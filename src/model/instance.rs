use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// The closed set of database engines this monitor understands.
///
/// `Dameng` and `KingbaseES` are domestic Chinese RDBMS products that mimic,
/// respectively, Oracle's catalog views and PostgreSQL's wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Mysql,
    Postgresql,
    Oracle,
    Mssql,
    Mongodb,
    #[serde(rename = "dm")]
    Dameng,
    #[serde(rename = "kb")]
    Kingbase,
}

impl EngineKind {
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Mysql => 3306,
            Self::Postgresql => 5432,
            Self::Oracle => 1521,
            Self::Mssql => 1433,
            Self::Mongodb => 27017,
            Self::Dameng => 5236,
            Self::Kingbase => 54321,
        }
    }

    #[must_use]
    pub const fn default_user(self) -> &'static str {
        match self {
            Self::Mysql => "root",
            Self::Postgresql => "postgres",
            Self::Oracle => "system",
            Self::Mssql => "sa",
            Self::Mongodb => "admin",
            Self::Dameng => "SYSDBA",
            Self::Kingbase => "system",
        }
    }
}

/// Connection credentials. The password is held in a [`SecretString`] end to
/// end so it never appears in a `Debug` or log line by accident.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub user: String,
    pub password: SecretString,
}

/// One configured database instance to be polled.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Instance {
    pub name: String,
    pub kind: EngineKind,
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    /// Database name (MySQL/Postgres/Mongo/Dameng/Kingbase) or service name.
    pub database: String,
    /// Oracle SID; unused by other engines.
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_true() -> bool {
    true
}

impl Instance {
    #[must_use]
    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(10)
    }

    #[must_use]
    pub fn query_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(30)
    }
}
