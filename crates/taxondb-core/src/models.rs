//! Taxonomy records and lineage query types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::config::DEFAULT_LEVELS;

/// Taxonomy node identifier.
pub type TaxId = i64;

/// Identifier emitted for a level that could not be resolved.
pub const UNCLASSIFIED_ID: TaxId = 0;

/// Pseudo level that always resolves to the root of the tree.
pub const ROOT_LEVEL: &str = "root";

/// Display name reported for the root.
pub const ROOT_NAME: &str = "root";

/// Seed name for classification rows before any level is resolved.
pub const NA_NAME: &str = "NA";

/// Prefix of synthesized names for unresolved levels.
pub const UNCLASSIFIED_PREFIX: &str = "unclassified ";

/// A node of the hierarchy as the resolvers see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonNode {
    pub id: TaxId,
    pub parent_id: TaxId,
    pub rank: String,
}

impl TaxonNode {
    pub fn new(id: TaxId, parent_id: TaxId, rank: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            rank: rank.into(),
        }
    }

    /// The root is the node that is its own parent.
    pub fn is_root(&self) -> bool {
        self.id == self.parent_id
    }
}

/// A full row of the node table, as loaded from `nodes.dmp`.
///
/// Only `id`, `parent_id` and `rank` are read back by queries; the rest is
/// carried through so the database mirrors the dump.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: TaxId,
    pub parent_id: TaxId,
    pub rank: String,
    pub embl_code: Option<String>,
    pub division_id: Option<i64>,
    pub inherited_div_flag: bool,
    pub genetic_code_id: Option<i64>,
    pub inherited_gc_flag: bool,
    pub mito_genetic_code_id: Option<i64>,
    pub inherited_mgc_flag: bool,
    pub genbank_hidden_flag: bool,
    pub hidden_subtree_root_flag: bool,
}

impl NodeRecord {
    /// Minimal record with empty passthrough columns.
    pub fn new(id: TaxId, parent_id: TaxId, rank: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            rank: rank.into(),
            ..Default::default()
        }
    }

    pub fn node(&self) -> TaxonNode {
        TaxonNode::new(self.id, self.parent_id, self.rank.clone())
    }
}

/// The preferred (scientific) name of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    pub id: TaxId,
    pub name: String,
    pub unique_name: Option<String>,
}

impl NameRecord {
    pub fn new(id: TaxId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            unique_name: None,
        }
    }
}

/// Ordered rank labels of interest, general to specific.
///
/// The order matters: batch classification derives placeholder names for
/// unresolved levels from the closest coarser level that was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Levels(Vec<String>);

impl Levels {
    pub fn new<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(levels.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, level: &str) -> bool {
        self.0.iter().any(|l| l == level)
    }

    /// Whether the root pseudo level was requested.
    pub fn wants_root(&self) -> bool {
        self.contains(ROOT_LEVEL)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for Levels {
    fn default() -> Self {
        Self::new(DEFAULT_LEVELS.iter().copied())
    }
}

/// Parses a comma separated list; an empty list yields the default levels.
impl FromStr for Levels {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let levels: Vec<&str> = s
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        if levels.is_empty() {
            Ok(Self::default())
        } else {
            Ok(Self::new(levels))
        }
    }
}

impl fmt::Display for Levels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

impl<'a> IntoIterator for &'a Levels {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Ancestors of one node at the requested levels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lineage {
    /// Level label to the ancestor holding that rank.
    pub level_ids: HashMap<String, TaxId>,
    /// Names of the matched ancestors. `None` when the node has no name record.
    pub names: HashMap<TaxId, Option<String>>,
}

impl Lineage {
    pub fn id_at(&self, level: &str) -> Option<TaxId> {
        self.level_ids.get(level).copied()
    }

    pub fn name_of(&self, id: TaxId) -> Option<&str> {
        self.names.get(&id).and_then(|n| n.as_deref())
    }

    pub fn name_at(&self, level: &str) -> Option<&str> {
        self.id_at(level).and_then(|id| self.name_of(id))
    }

    pub fn is_empty(&self) -> bool {
        self.level_ids.is_empty()
    }
}
