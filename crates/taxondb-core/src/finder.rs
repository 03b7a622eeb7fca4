use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::classify::{classify, classify_parallel, Classification};
use crate::config::{LookupMode, QueryConfig};
use crate::index::TreeIndex;
use crate::models::{Levels, Lineage, TaxId, UNCLASSIFIED_ID};
use crate::resolver::{ResolveError, Resolver};
use crate::storage::{StorageError, TaxonStore};

/// Lineage queries over a store, with a lazily built index snapshot.
///
/// The snapshot is shared as an `Arc`: rebuilding swaps in a new one while
/// queries already running keep the index they started with.
pub struct TaxonomyFinder<S: TaxonStore> {
    store: S,
    config: QueryConfig,
    index: RwLock<Option<Arc<TreeIndex>>>,
}

impl<S: TaxonStore> TaxonomyFinder<S> {
    /// Creates a finder over `store`. No index is built until first needed.
    pub fn new(store: S, config: QueryConfig) -> Self {
        Self {
            store,
            config,
            index: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Consumes the finder and returns the store.
    pub fn into_store(self) -> S {
        self.store
    }

    // ------------------------------------------------------------------
    // Index snapshot
    // ------------------------------------------------------------------

    /// Current index snapshot, building it on first use.
    pub fn snapshot(&self) -> Result<Arc<TreeIndex>, FinderError> {
        if let Some(index) = self.index.read().as_ref() {
            return Ok(Arc::clone(index));
        }

        let mut slot = self.index.write();
        if let Some(index) = slot.as_ref() {
            return Ok(Arc::clone(index));
        }
        let index = Arc::new(TreeIndex::build(&self.store)?);
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Builds a fresh snapshot and swaps it in.
    pub fn rebuild_index(&self) -> Result<Arc<TreeIndex>, FinderError> {
        let index = Arc::new(TreeIndex::build(&self.store)?);
        *self.index.write() = Some(Arc::clone(&index));
        info!("Rebuilt tree index with {} nodes", index.len());
        Ok(index)
    }

    /// Drops the cached snapshot.
    pub fn clear_index(&self) {
        if self.index.write().take().is_some() {
            debug!("Cleared tree index");
        }
    }

    pub fn has_index(&self) -> bool {
        self.index.read().is_some()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Resolver walking `index`.
    pub fn resolver<'a>(&'a self, index: &'a TreeIndex) -> Resolver<'a> {
        Resolver::indexed(&self.store, index).with_max_depth(self.config.max_depth)
    }

    /// Resolver that reads parent links straight from the store.
    pub fn direct_resolver(&self) -> Resolver<'_> {
        Resolver::direct(&self.store).with_max_depth(self.config.max_depth)
    }

    fn with_resolver<T>(
        &self,
        mode: LookupMode,
        query: impl FnOnce(&Resolver<'_>) -> Result<T, ResolveError>,
    ) -> Result<T, FinderError> {
        match mode {
            LookupMode::Index => {
                let index = self.snapshot()?;
                Ok(query(&self.resolver(&index))?)
            }
            LookupMode::Direct => Ok(query(&self.direct_resolver())?),
        }
    }

    /// Ancestors of `id` using the configured strategy.
    ///
    /// `levels` defaults to the configured level list.
    pub fn find_ancestors(
        &self,
        id: TaxId,
        levels: Option<&Levels>,
    ) -> Result<Option<Lineage>, FinderError> {
        let levels = levels.unwrap_or(&self.config.levels);
        self.with_resolver(self.config.strategy, |r| r.find_ancestors(id, levels))
    }

    /// Ancestors of `id` without touching the index.
    pub fn find_ancestors_direct(
        &self,
        id: TaxId,
        levels: Option<&Levels>,
    ) -> Result<Option<Lineage>, FinderError> {
        let levels = levels.unwrap_or(&self.config.levels);
        self.with_resolver(LookupMode::Direct, |r| r.find_ancestors(id, levels))
    }

    /// Every node below `id`. Always uses the index.
    pub fn find_descendants(&self, id: TaxId) -> Result<HashSet<TaxId>, FinderError> {
        self.with_resolver(LookupMode::Index, |r| r.find_descendants(id))
    }

    /// Classifies a batch, in parallel when configured.
    pub fn classify(
        &self,
        ids: &[TaxId],
        levels: Option<&Levels>,
        match_input: bool,
    ) -> Result<Classification, FinderError> {
        let levels = levels.unwrap_or(&self.config.levels);
        let parallel = self.config.parallel;
        self.with_resolver(self.config.strategy, |r| {
            if parallel {
                classify_parallel(r, ids, levels, match_input)
            } else {
                classify(r, ids, levels, match_input)
            }
        })
    }

    /// Id and name of `id`'s ancestor at every level.
    ///
    /// Unlike [`find_ancestors`](Self::find_ancestors) an unknown id is an
    /// error here, and so is a level the lineage does not reach.
    pub fn clade_info(&self, id: TaxId, levels: &Levels) -> Result<CladeInfo, FinderError> {
        let lineage = self
            .find_ancestors(id, Some(levels))?
            .ok_or(FinderError::TaxonNotFound(id))?;

        let clades = levels
            .iter()
            .map(|level| {
                let tax_id = lineage.id_at(level).ok_or_else(|| FinderError::LevelMissing {
                    id,
                    level: level.to_string(),
                })?;
                Ok(Clade {
                    level: level.to_string(),
                    tax_id,
                    name: lineage.name_of(tax_id).map(str::to_string),
                })
            })
            .collect::<Result<Vec<_>, FinderError>>()?;

        Ok(CladeInfo { tax_id: id, clades })
    }

    /// Pipe separated FASTA-style header for `id`.
    ///
    /// `<id>|<id at last level>|...|<id at second level>|<accession>`. The first
    /// level is left out and levels the lineage misses render as `0`.
    pub fn sequence_header(
        &self,
        id: TaxId,
        accession: &str,
        levels: &Levels,
    ) -> Result<String, FinderError> {
        let lineage = self
            .find_ancestors(id, Some(levels))?
            .ok_or(FinderError::TaxonNotFound(id))?;

        let finer: Vec<&str> = levels.iter().skip(1).collect();
        let mut header = id.to_string();
        for level in finer.into_iter().rev() {
            header.push('|');
            header.push_str(&lineage.id_at(level).unwrap_or(UNCLASSIFIED_ID).to_string());
        }
        header.push('|');
        header.push_str(accession);
        Ok(header)
    }
}

/// One level of a [`CladeInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clade {
    pub level: String,
    pub tax_id: TaxId,
    pub name: Option<String>,
}

/// Per-level ancestors of one node, in level order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CladeInfo {
    pub tax_id: TaxId,
    pub clades: Vec<Clade>,
}

impl CladeInfo {
    pub fn get(&self, level: &str) -> Option<&Clade> {
        self.clades.iter().find(|c| c.level == level)
    }
}

/// Errors that can occur in TaxonomyFinder operations.
#[derive(Debug, Error)]
pub enum FinderError {
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Storage error: {0}")]
    Store(#[from] StorageError),

    #[error("Cannot find taxonomy id {0} in database")]
    TaxonNotFound(TaxId),

    #[error("Taxonomy id {id} has no ancestor at level '{level}'")]
    LevelMissing { id: TaxId, level: String },
}
