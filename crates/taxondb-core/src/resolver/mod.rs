//! Ancestor and descendant lookups.
//!
//! A [`Resolver`] walks parent links either through a prebuilt
//! [`TreeIndex`] or by asking the store one node at a time. Both strategies
//! share one walk, so they agree on every input.

mod error;

pub use error::ResolveError;

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::config::DEFAULT_MAX_DEPTH;
use crate::index::TreeIndex;
use crate::models::{Levels, Lineage, TaxId, ROOT_LEVEL, ROOT_NAME};
use crate::storage::TaxonStore;

/// Where parent links are read from.
#[derive(Debug, Clone, Copy)]
pub enum WalkStrategy<'a> {
    /// Reverse map of an index snapshot.
    Indexed(&'a TreeIndex),
    /// One store lookup per step.
    Direct,
}

/// Lineage queries against one store.
///
/// Cheap to construct and `Sync`, so one resolver can be shared by a
/// parallel batch.
pub struct Resolver<'a> {
    store: &'a dyn TaxonStore,
    strategy: WalkStrategy<'a>,
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn TaxonStore, strategy: WalkStrategy<'a>) -> Self {
        Self {
            store,
            strategy,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Resolver reading parent links from `index`.
    pub fn indexed(store: &'a dyn TaxonStore, index: &'a TreeIndex) -> Self {
        Self::new(store, WalkStrategy::Indexed(index))
    }

    /// Resolver issuing one store lookup per step.
    pub fn direct(store: &'a dyn TaxonStore) -> Self {
        Self::new(store, WalkStrategy::Direct)
    }

    /// Bounds the number of parent hops a single walk may take.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn strategy(&self) -> WalkStrategy<'a> {
        self.strategy
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self.strategy, WalkStrategy::Indexed(_))
    }

    pub fn store(&self) -> &'a dyn TaxonStore {
        self.store
    }

    /// Parent and rank of `id`, or `None` if the node does not exist.
    fn step(&self, id: TaxId) -> Result<Option<(TaxId, Cow<'a, str>)>, ResolveError> {
        match self.strategy {
            WalkStrategy::Indexed(index) => Ok(index
                .parent_link(id)
                .map(|link| (link.parent, Cow::Borrowed(link.rank.as_str())))),
            WalkStrategy::Direct => Ok(self
                .store
                .node(id)?
                .map(|node| (node.parent_id, Cow::Owned(node.rank)))),
        }
    }

    /// Finds the ancestors of `id` (itself included) holding the requested ranks.
    ///
    /// Returns `Ok(None)` if `id` does not exist. When a rank occurs more than
    /// once on the path, the most general node wins. Requesting the `root`
    /// level always maps it to the root of the tree, named `root`.
    pub fn find_ancestors(
        &self,
        id: TaxId,
        levels: &Levels,
    ) -> Result<Option<Lineage>, ResolveError> {
        let (mut parent, mut rank) = match self.step(id)? {
            Some(step) => step,
            None => return Ok(None),
        };

        let wants_root = levels.wants_root();
        let mut current = id;
        let mut visited = HashSet::new();
        let mut hops = 0usize;
        let mut level_ids: HashMap<String, TaxId> = HashMap::new();

        loop {
            if !visited.insert(current) || hops > self.max_depth {
                return Err(ResolveError::CycleDetected { start: id, at: current });
            }

            if levels.contains(&rank) {
                level_ids.insert(rank.to_string(), current);
            }

            if parent == current {
                break;
            }

            match self.step(parent)? {
                Some((next_parent, next_rank)) => {
                    hops += 1;
                    current = parent;
                    parent = next_parent;
                    rank = next_rank;
                }
                None => {
                    return Err(ResolveError::BrokenLineage {
                        id: current,
                        parent,
                    })
                }
            }
        }

        let mut names = HashMap::with_capacity(level_ids.len() + 1);
        for &matched in level_ids.values() {
            if names.contains_key(&matched) {
                continue;
            }
            let name = self.store.name(matched)?;
            if name.is_none() {
                warn!("No name recorded for taxon {}", matched);
            }
            names.insert(matched, name);
        }

        if wants_root {
            level_ids.insert(ROOT_LEVEL.to_string(), current);
            names.insert(current, Some(ROOT_NAME.to_string()));
        }

        Ok(Some(Lineage { level_ids, names }))
    }

    /// Every node below `id`. Needs an indexed resolver.
    pub fn find_descendants(&self, id: TaxId) -> Result<HashSet<TaxId>, ResolveError> {
        match self.strategy {
            WalkStrategy::Indexed(index) => index.descendants(id),
            WalkStrategy::Direct => Err(ResolveError::IndexRequired),
        }
    }
}
