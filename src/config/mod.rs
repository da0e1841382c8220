//! Typed configuration: the instance registry (what the monitor polls) and
//! the ingestion sink config, both grounded in `original_source/database/scheduler/`
//! (`scheduler.py`'s `config.json` and `monitor_to_db.py`'s
//! `monitor_to_db_config.json`).

mod ingestion;
mod registry;

pub use ingestion::IngestionConfig;
pub use registry::InstanceRegistry;
