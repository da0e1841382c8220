use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl AlertLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

/// One threshold breach raised by the threshold engine for a given instance.
///
/// `value` and `threshold` are carried as strings: the sink writer inserts
/// them verbatim to avoid truncation/cast errors across heterogeneous
/// column types (mirrors the original monitor's decision to stringify these
/// two fields before insert).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub instance_name: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: AlertLevel,
    pub metric: String,
    pub message: String,
    pub value: String,
    pub threshold: String,
}
