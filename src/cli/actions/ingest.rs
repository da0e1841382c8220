use std::path::PathBuf;

/// What the `ingest` binary was asked to do, resolved from its CLI args.
#[derive(Debug, Clone)]
pub enum IngestAction {
    /// Run the ledger/discover/parse/write pipeline once, or repeatedly
    /// until a shutdown signal arrives.
    Run { config_path: PathBuf, once: bool },
}
