//! Taxdump ingestion: fetch the archive, parse the dump files, bulk load
//! them into a [`SqliteStore`].

mod archive;
mod dump;
mod error;
mod fetch;

pub use archive::{read_taxdump, read_taxdump_file, TaxDump};
pub use dump::{parse_name_line, parse_names, parse_node_line, parse_nodes, split_fields, NameEntry};
pub use error::IngestError;
pub use fetch::{fetcher_for, FileFetcher, Fetcher, HttpFetcher};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use crate::config::IngestConfig;
use crate::storage::SqliteStore;

/// Metadata key of the archive location.
pub const META_SOURCE: &str = "source";
/// Metadata key of the archive checksum.
pub const META_SHA256: &str = "sha256";
/// Metadata key of the load timestamp (RFC 3339).
pub const META_LOADED_AT: &str = "loaded_at";

/// Rows written by [`load_dump`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadCounts {
    pub nodes: usize,
    pub names: usize,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub source: String,
    pub sha256: String,
    pub archive_bytes: usize,
    pub nodes: usize,
    pub names: usize,
}

/// Fetches a taxdump archive and loads it into a store.
pub struct Ingestor {
    config: IngestConfig,
    fetcher: Box<dyn Fetcher>,
}

impl Ingestor {
    /// Creates an ingestor for the configured archive location.
    pub fn new(config: IngestConfig) -> Result<Self, IngestError> {
        let fetcher = fetcher_for(&config.archive_url, &config)?;
        Ok(Self { config, fetcher })
    }

    /// Creates an ingestor with a custom fetcher.
    pub fn with_fetcher(config: IngestConfig, fetcher: Box<dyn Fetcher>) -> Self {
        Self { config, fetcher }
    }

    pub fn source(&self) -> &str {
        self.fetcher.source()
    }

    /// Replaces the node and name tables of `store` with a fresh download.
    #[instrument(skip_all, fields(source = %self.fetcher.source()))]
    pub async fn run(&self, store: &SqliteStore) -> Result<IngestStats, IngestError> {
        let bytes = self.fetcher.fetch().await?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        info!("Fetched {} bytes (sha256 {})", bytes.len(), sha256);

        let dump = read_taxdump(&bytes, &self.config)?;
        info!(
            "Parsed {} nodes and {} names",
            dump.nodes.len(),
            dump.names.len()
        );

        let counts = load_dump(store, &dump, self.config.batch_size)?;

        store.set_meta(META_SOURCE, self.fetcher.source())?;
        store.set_meta(META_SHA256, &sha256)?;
        store.set_meta(META_LOADED_AT, &Utc::now().to_rfc3339())?;

        Ok(IngestStats {
            source: self.fetcher.source().to_string(),
            sha256,
            archive_bytes: bytes.len(),
            nodes: counts.nodes,
            names: counts.names,
        })
    }
}

/// Recreates the schema of `store` and writes `dump` in batches of
/// `batch_size` rows, one transaction per batch.
#[instrument(skip_all, fields(nodes = dump.nodes.len(), names = dump.names.len()))]
pub fn load_dump(
    store: &SqliteStore,
    dump: &TaxDump,
    batch_size: usize,
) -> Result<LoadCounts, IngestError> {
    let batch_size = batch_size.max(1);
    store.create_schema(true)?;

    let mut counts = LoadCounts::default();
    for batch in dump.nodes.chunks(batch_size) {
        counts.nodes += store.insert_nodes(batch)?;
        info!("Loaded {}/{} nodes", counts.nodes, dump.nodes.len());
    }
    for batch in dump.names.chunks(batch_size) {
        counts.names += store.insert_names(batch)?;
        info!("Loaded {}/{} names", counts.names, dump.names.len());
    }

    Ok(counts)
}
