use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, instrument, warn};

use crate::models::{NameRecord, NodeRecord, TaxId, TaxonNode};

use super::error::StorageError;
use super::{TaxonStore, TaxonTable};

const NODES_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS taxon_nodes (
        id INTEGER PRIMARY KEY,
        parent_id INTEGER NOT NULL,
        rank TEXT NOT NULL,
        embl_code TEXT,
        division_id INTEGER,
        inherited_div_flag INTEGER NOT NULL DEFAULT 0,
        genetic_code_id INTEGER,
        inherited_gc_flag INTEGER NOT NULL DEFAULT 0,
        mito_genetic_code_id INTEGER,
        inherited_mgc_flag INTEGER NOT NULL DEFAULT 0,
        genbank_hidden_flag INTEGER NOT NULL DEFAULT 0,
        hidden_subtree_root_flag INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_taxon_nodes_parent ON taxon_nodes (parent_id);
"#;

const NAMES_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS taxon_names (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        unique_name TEXT
    );
"#;

const META_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS taxon_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

const NODE_COLUMNS: &str = "id, parent_id, rank, embl_code, division_id, inherited_div_flag, \
     genetic_code_id, inherited_gc_flag, mito_genetic_code_id, inherited_mgc_flag, \
     genbank_hidden_flag, hidden_subtree_root_flag";

/// SQLite-backed node and name store.
///
/// The connection lives behind a mutex so one store can serve a parallel
/// batch. After [`close`](SqliteStore::close) every operation fails with
/// [`StorageError::NotConnected`].
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (or creates) a database file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        debug!("Opened taxonomy database at {}", path.display());

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens an in-memory database (useful for testing).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        debug!("Opened in-memory taxonomy database");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: None,
        })
    }

    /// Database file path; `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Closes the connection. Closing twice is a no-op.
    pub fn close(&self) -> Result<(), StorageError> {
        if let Some(conn) = self.conn.lock().take() {
            conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
            debug!("Closed taxonomy database");
        }
        Ok(())
    }

    /// Folds the write-ahead log back into the database file.
    pub fn checkpoint(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
            Ok(())
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(StorageError::NotConnected)?;
        f(conn)
    }

    fn with_conn_mut<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StorageError::NotConnected)?;
        f(conn)
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    /// Creates the node and name tables.
    ///
    /// With `overwrite` existing tables are dropped first. Without it, tables
    /// that already exist are kept and a warning is logged. Returns whether
    /// any table was (re)created.
    #[instrument(skip(self))]
    pub fn create_schema(&self, overwrite: bool) -> Result<bool, StorageError> {
        let mut created = false;
        for table in [TaxonTable::Nodes, TaxonTable::Names] {
            created |= self.create_table(table, overwrite)?;
        }
        self.with_conn(|conn| Ok(conn.execute_batch(META_SCHEMA)?))?;
        Ok(created)
    }

    /// Creates one table. See [`create_schema`](SqliteStore::create_schema).
    pub fn create_table(&self, table: TaxonTable, overwrite: bool) -> Result<bool, StorageError> {
        if !overwrite && self.table_exists(table)? {
            warn!(
                "Table {} already exists. Use overwrite to create a new table.",
                table
            );
            return Ok(false);
        }

        self.with_conn(|conn| {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", table))?;
            conn.execute_batch(Self::table_schema(table))?;
            Ok(())
        })?;
        debug!("Created table {}", table);
        Ok(true)
    }

    fn table_schema(table: TaxonTable) -> &'static str {
        match table {
            TaxonTable::Nodes => NODES_SCHEMA,
            TaxonTable::Names => NAMES_SCHEMA,
        }
    }

    /// Checks whether a table exists.
    pub fn table_exists(&self, table: TaxonTable) -> Result<bool, StorageError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                params![table.as_str()],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Number of rows in a table.
    pub fn row_count(&self, table: TaxonTable) -> Result<usize, StorageError> {
        if !self.table_exists(table)? {
            return Err(StorageError::MissingTable(table.to_string()));
        }
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            Ok(count as usize)
        })
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Inserts node rows in a single transaction. Returns rows written.
    pub fn insert_nodes(&self, nodes: &[NodeRecord]) -> Result<usize, StorageError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let written = Self::write_nodes(&tx, nodes)?;
            tx.commit()?;
            Ok(written)
        })
    }

    /// Inserts name rows in a single transaction. Returns rows written.
    pub fn insert_names(&self, names: &[NameRecord]) -> Result<usize, StorageError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let written = Self::write_names(&tx, names)?;
            tx.commit()?;
            Ok(written)
        })
    }

    fn write_nodes(conn: &Connection, nodes: &[NodeRecord]) -> Result<usize, StorageError> {
        let mut stmt = conn.prepare_cached(&format!(
            "INSERT OR REPLACE INTO taxon_nodes ({}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            NODE_COLUMNS
        ))?;
        for n in nodes {
            stmt.execute(params![
                n.id,
                n.parent_id,
                n.rank,
                n.embl_code,
                n.division_id,
                n.inherited_div_flag,
                n.genetic_code_id,
                n.inherited_gc_flag,
                n.mito_genetic_code_id,
                n.inherited_mgc_flag,
                n.genbank_hidden_flag,
                n.hidden_subtree_root_flag,
            ])?;
        }
        Ok(nodes.len())
    }

    fn write_names(conn: &Connection, names: &[NameRecord]) -> Result<usize, StorageError> {
        let mut stmt = conn.prepare_cached(
            "INSERT OR REPLACE INTO taxon_names (id, name, unique_name) VALUES (?1, ?2, ?3)",
        )?;
        for n in names {
            stmt.execute(params![n.id, n.name, n.unique_name])?;
        }
        Ok(names.len())
    }

    /// Stores an ingestion metadata entry.
    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute_batch(META_SCHEMA)?;
            conn.execute(
                "INSERT OR REPLACE INTO taxon_meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
    }

    /// Reads an ingestion metadata entry.
    pub fn meta(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_conn(|conn| {
            conn.execute_batch(META_SCHEMA)?;
            let value = conn
                .query_row(
                    "SELECT value FROM taxon_meta WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    // -----------------------------------------------------------------------
    // Bulk reads and table copy
    // -----------------------------------------------------------------------

    /// All node rows, ordered by id.
    pub fn node_records(&self) -> Result<Vec<NodeRecord>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM taxon_nodes ORDER BY id",
                NODE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], Self::node_record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All name rows, ordered by id.
    pub fn name_records(&self) -> Result<Vec<NameRecord>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, unique_name FROM taxon_names ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(NameRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        unique_name: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn node_record_from_row(row: &Row<'_>) -> rusqlite::Result<NodeRecord> {
        Ok(NodeRecord {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            rank: row.get(2)?,
            embl_code: row.get(3)?,
            division_id: row.get(4)?,
            inherited_div_flag: row.get(5)?,
            genetic_code_id: row.get(6)?,
            inherited_gc_flag: row.get(7)?,
            mito_genetic_code_id: row.get(8)?,
            inherited_mgc_flag: row.get(9)?,
            genbank_hidden_flag: row.get(10)?,
            hidden_subtree_root_flag: row.get(11)?,
        })
    }

    /// Replaces `table` in this store with a copy of the same table in `source`.
    ///
    /// The drop, create and inserts run in one transaction, so a failed copy
    /// leaves the previous table in place. Returns rows copied.
    #[instrument(skip(self, source))]
    pub fn copy_table_from(
        &self,
        source: &SqliteStore,
        table: TaxonTable,
    ) -> Result<usize, StorageError> {
        if !self.is_connected() || !source.is_connected() {
            return Err(StorageError::NotConnected);
        }
        if !source.table_exists(table)? {
            return Err(StorageError::MissingTable(table.to_string()));
        }

        // Read fully before locking the target: source may be this store.
        let copied = match table {
            TaxonTable::Nodes => {
                let rows = source.node_records()?;
                self.replace_table(table, |tx| Self::write_nodes(tx, &rows))?
            }
            TaxonTable::Names => {
                let rows = source.name_records()?;
                self.replace_table(table, |tx| Self::write_names(tx, &rows))?
            }
        };

        debug!("Copied {} rows into {}", copied, table);
        Ok(copied)
    }

    fn replace_table(
        &self,
        table: TaxonTable,
        fill: impl FnOnce(&Connection) -> Result<usize, StorageError>,
    ) -> Result<usize, StorageError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", table))?;
            tx.execute_batch(Self::table_schema(table))?;
            let written = fill(&tx)?;
            tx.commit()?;
            Ok(written)
        })
    }
}

impl TaxonStore for SqliteStore {
    fn is_connected(&self) -> bool {
        self.conn.lock().is_some()
    }

    fn node(&self, id: TaxId) -> Result<Option<TaxonNode>, StorageError> {
        self.with_conn(|conn| {
            let node = conn
                .query_row(
                    "SELECT id, parent_id, rank FROM taxon_nodes WHERE id = ?1",
                    params![id],
                    |row| Ok(TaxonNode::new(row.get(0)?, row.get(1)?, row.get::<_, String>(2)?)),
                )
                .optional()?;
            Ok(node)
        })
    }

    fn name(&self, id: TaxId) -> Result<Option<String>, StorageError> {
        self.with_conn(|conn| {
            let name = conn
                .query_row(
                    "SELECT name FROM taxon_names WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(name)
        })
    }

    fn scan_nodes(&self, visit: &mut dyn FnMut(TaxonNode)) -> Result<usize, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, parent_id, rank FROM taxon_nodes")?;
            let mut rows = stmt.query([])?;
            let mut count = 0;
            while let Some(row) = rows.next()? {
                visit(TaxonNode::new(row.get(0)?, row.get(1)?, row.get::<_, String>(2)?));
                count += 1;
            }
            Ok(count)
        })
    }

    fn node_count(&self) -> Result<usize, StorageError> {
        self.row_count(TaxonTable::Nodes)
    }
}
