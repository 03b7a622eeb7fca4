use thiserror::Error;

use crate::models::TaxId;
use crate::storage::StorageError;

/// Errors raised while walking the hierarchy.
///
/// An unknown starting id is not an error; lookups report it as `None`.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Storage error: {0}")]
    Store(#[from] StorageError),

    #[error("Cycle detected walking from {start}: reached {at} twice")]
    CycleDetected { start: TaxId, at: TaxId },

    #[error("Broken lineage: node {id} points at missing parent {parent}")]
    BrokenLineage { id: TaxId, parent: TaxId },

    #[error("Descendant lookups need an indexed resolver")]
    IndexRequired,
}
