mod common;

use taxondb_core::storage::{SqliteStore, StorageError, TaxonStore, TaxonTable};
use taxondb_core::{NameRecord, NodeRecord};
use tempfile::TempDir;

#[test]
fn test_open_file_store_persists() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("taxonomy.sqlite");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.create_schema(true).unwrap();
        common::load(&store, common::HUMAN_LINEAGE);
        store.close().unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.path(), Some(path.as_path()));
    assert_eq!(store.node_count().unwrap(), common::HUMAN_LINEAGE.len());
    assert_eq!(store.name(9606).unwrap().as_deref(), Some("Homo sapiens"));
}

#[test]
fn test_insert_replaces_existing_rows() {
    let store = common::human_store();
    store
        .insert_names(&[NameRecord::new(9606, "Homo sapiens sapiens")])
        .unwrap();

    assert_eq!(
        store.name(9606).unwrap().as_deref(),
        Some("Homo sapiens sapiens")
    );
    assert_eq!(
        store.row_count(TaxonTable::Names).unwrap(),
        common::HUMAN_LINEAGE.len()
    );
}

#[test]
fn test_copy_table_between_stores() {
    let source = common::human_store();
    let target = SqliteStore::open_memory().unwrap();
    target.create_schema(true).unwrap();
    target.insert_nodes(&[NodeRecord::new(42, 42, "no rank")]).unwrap();

    let copied = target.copy_table_from(&source, TaxonTable::Nodes).unwrap();

    assert_eq!(copied, common::HUMAN_LINEAGE.len());
    assert_eq!(target.node(42).unwrap(), None);
    assert_eq!(target.node(9606).unwrap().unwrap().parent_id, 9605);
    // Names were not part of the copy.
    assert_eq!(target.row_count(TaxonTable::Names).unwrap(), 0);
}

#[test]
fn test_copy_table_requires_connections() {
    let source = common::human_store();
    let target = SqliteStore::open_memory().unwrap();
    source.close().unwrap();

    assert!(matches!(
        target.copy_table_from(&source, TaxonTable::Names),
        Err(StorageError::NotConnected)
    ));
}

#[test]
fn test_copy_missing_table() {
    let source = SqliteStore::open_memory().unwrap();
    let target = SqliteStore::open_memory().unwrap();

    assert!(matches!(
        target.copy_table_from(&source, TaxonTable::Names),
        Err(StorageError::MissingTable(_))
    ));
}

#[test]
fn test_table_names_parse() {
    assert_eq!("nodes".parse::<TaxonTable>().unwrap(), TaxonTable::Nodes);
    assert_eq!("taxon_names".parse::<TaxonTable>().unwrap(), TaxonTable::Names);
    assert!("edges".parse::<TaxonTable>().is_err());
}

#[test]
fn test_row_count_of_missing_table() {
    let store = SqliteStore::open_memory().unwrap();
    assert!(!store.table_exists(TaxonTable::Nodes).unwrap());
    assert!(matches!(
        store.row_count(TaxonTable::Nodes),
        Err(StorageError::MissingTable(_))
    ));
}
