//! Default values for taxondb configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Database Defaults
// ============================================================================

/// Default SQLite database file.
pub const DEFAULT_DB_PATH: &str = "taxonomy.sqlite";

/// Project-local config file name.
pub const DEFAULT_CONFIG_FILE: &str = "taxondb.toml";

/// Directory name under the user config dir.
pub const DEFAULT_CONFIG_DIR: &str = "taxondb";

// ============================================================================
// Query Defaults
// ============================================================================

/// Levels of interest, general to specific.
pub const DEFAULT_LEVELS: &[&str] = &[
    "superkingdom",
    "kingdom",
    "phylum",
    "class",
    "order",
    "family",
    "genus",
    "species",
];

/// Upper bound on parent hops in a single ancestor walk.
///
/// NCBI lineages are well under 100 hops deep.
pub const DEFAULT_MAX_DEPTH: usize = 4096;

/// Log batch classification progress every N identifiers.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1000;

// ============================================================================
// Ingestion Defaults
// ============================================================================

/// NCBI taxonomy dump archive.
pub const DEFAULT_ARCHIVE_URL: &str = "https://ftp.ncbi.nlm.nih.gov/pub/taxonomy/taxdump.tar.gz";

/// Archive member holding node records.
pub const DEFAULT_NODES_FILE: &str = "nodes.dmp";

/// Archive member holding name records.
pub const DEFAULT_NAMES_FILE: &str = "names.dmp";

/// Only names of this class are loaded.
pub const DEFAULT_NAME_CLASS: &str = "scientific name";

/// Connect timeout for the archive download.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;

/// Retries after the first failed download attempt.
pub const DEFAULT_FETCH_RETRIES: u32 = 0;

/// Pause between download attempts.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

/// Rows per insert transaction during bulk load.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
