mod error;
mod remote;
mod sqlite;

pub use error::StorageError;
pub use remote::{s3_object_store, RemoteDatabase, BUCKET_ENV};
pub use sqlite::SqliteStore;

use std::fmt;
use std::str::FromStr;

use crate::models::{TaxId, TaxonNode};

/// Read access to the node and name relations.
///
/// Resolvers only ever read through this trait: point lookups for direct
/// ancestor walks and name resolution, a full scan for index builds.
/// Implementations must be shareable across threads so a batch can fan out.
pub trait TaxonStore: Send + Sync {
    /// Whether the backing database is open.
    fn is_connected(&self) -> bool;

    /// Looks up a single node.
    fn node(&self, id: TaxId) -> Result<Option<TaxonNode>, StorageError>;

    /// Looks up the preferred name of a node.
    fn name(&self, id: TaxId) -> Result<Option<String>, StorageError>;

    /// Visits every node once. Returns the number of nodes visited.
    fn scan_nodes(&self, visit: &mut dyn FnMut(TaxonNode)) -> Result<usize, StorageError>;

    /// Number of node records.
    fn node_count(&self) -> Result<usize, StorageError>;
}

impl<T: TaxonStore + ?Sized> TaxonStore for &T {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn node(&self, id: TaxId) -> Result<Option<TaxonNode>, StorageError> {
        (**self).node(id)
    }

    fn name(&self, id: TaxId) -> Result<Option<String>, StorageError> {
        (**self).name(id)
    }

    fn scan_nodes(&self, visit: &mut dyn FnMut(TaxonNode)) -> Result<usize, StorageError> {
        (**self).scan_nodes(visit)
    }

    fn node_count(&self) -> Result<usize, StorageError> {
        (**self).node_count()
    }
}

/// The two source tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonTable {
    Nodes,
    Names,
}

impl TaxonTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonTable::Nodes => "taxon_nodes",
            TaxonTable::Names => "taxon_names",
        }
    }
}

impl fmt::Display for TaxonTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaxonTable {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nodes" | "taxon_nodes" => Ok(TaxonTable::Nodes),
            "names" | "taxon_names" => Ok(TaxonTable::Names),
            other => Err(StorageError::MissingTable(other.to_string())),
        }
    }
}
