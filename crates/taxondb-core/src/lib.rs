pub mod classify;
pub mod config;
pub mod finder;
pub mod index;
pub mod ingest;
pub mod models;
pub mod resolver;
pub mod storage;

pub use classify::{classify, classify_parallel, Classification, Row, Table};
pub use config::{Config, ConfigError, LookupMode, QueryConfig};
pub use finder::{Clade, CladeInfo, FinderError, TaxonomyFinder};
pub use index::{build_index, ParentLink, TreeIndex};
pub use ingest::{IngestError, IngestStats, Ingestor};
pub use models::{Levels, Lineage, NameRecord, NodeRecord, TaxId, TaxonNode};
pub use resolver::{ResolveError, Resolver, WalkStrategy};
pub use storage::{RemoteDatabase, SqliteStore, StorageError, TaxonStore, TaxonTable};
