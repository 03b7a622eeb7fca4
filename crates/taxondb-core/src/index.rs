//! In-memory parent/child index over the node relation.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument, warn};

use crate::models::TaxId;
use crate::resolver::ResolveError;
use crate::storage::{StorageError, TaxonStore};

/// Reverse edge of the index: a node's parent and its own rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub parent: TaxId,
    pub rank: String,
}

/// Read-only snapshot of the hierarchy.
///
/// Built from one full scan of the store. Rebuilding produces a new value;
/// nothing is merged into an existing index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeIndex {
    children: HashMap<TaxId, HashSet<TaxId>>,
    parents: HashMap<TaxId, ParentLink>,
    root: Option<TaxId>,
}

impl TreeIndex {
    /// Scans every node in `store` and builds the forward and reverse maps.
    #[instrument(skip_all)]
    pub fn build<S: TaxonStore + ?Sized>(store: &S) -> Result<Self, StorageError> {
        if !store.is_connected() {
            return Err(StorageError::NotConnected);
        }

        let mut index = TreeIndex::default();
        let scanned = store.scan_nodes(&mut |node| {
            if node.is_root() {
                match index.root {
                    None => index.root = Some(node.id),
                    Some(root) => warn!(
                        "Ignoring extra self-referencing node {} (root is {})",
                        node.id, root
                    ),
                }
            } else {
                index.children.entry(node.parent_id).or_default().insert(node.id);
            }
            index.parents.insert(
                node.id,
                ParentLink {
                    parent: node.parent_id,
                    rank: node.rank,
                },
            );
        })?;

        if index.root.is_none() && scanned > 0 {
            warn!("No self-referencing root among {} nodes", scanned);
        }
        debug!(
            "Built tree index: {} nodes, {} parents with children",
            index.parents.len(),
            index.children.len()
        );
        Ok(index)
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn root(&self) -> Option<TaxId> {
        self.root
    }

    pub fn contains(&self, id: TaxId) -> bool {
        self.parents.contains_key(&id)
    }

    pub fn parent_link(&self, id: TaxId) -> Option<&ParentLink> {
        self.parents.get(&id)
    }

    /// Direct children of `id`. `None` for leaves and unknown ids.
    pub fn children(&self, id: TaxId) -> Option<&HashSet<TaxId>> {
        self.children.get(&id)
    }

    /// Every node below `id`, excluding `id` itself.
    ///
    /// Leaves and unknown ids yield an empty set. Reaching a node twice can
    /// only happen through a cycle and fails with `CycleDetected`.
    pub fn descendants(&self, id: TaxId) -> Result<HashSet<TaxId>, ResolveError> {
        let mut found = HashSet::new();
        let mut stack: Vec<TaxId> = match self.children.get(&id) {
            Some(kids) => kids.iter().copied().collect(),
            None => return Ok(found),
        };

        while let Some(current) = stack.pop() {
            if current == id || !found.insert(current) {
                return Err(ResolveError::CycleDetected {
                    start: id,
                    at: current,
                });
            }
            if let Some(kids) = self.children.get(&current) {
                stack.extend(kids.iter().copied());
            }
        }

        Ok(found)
    }
}

/// Builds a fresh [`TreeIndex`] snapshot from `store`.
pub fn build_index<S: TaxonStore + ?Sized>(store: &S) -> Result<TreeIndex, StorageError> {
    TreeIndex::build(store)
}
