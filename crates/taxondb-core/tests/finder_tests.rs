mod common;

use std::collections::HashSet;
use std::sync::Arc;

use taxondb_core::{
    FinderError, Levels, LookupMode, QueryConfig, SqliteStore, TaxonomyFinder,
};

fn create_test_finder(config: QueryConfig) -> TaxonomyFinder<SqliteStore> {
    TaxonomyFinder::new(common::human_store(), config)
}

#[test]
fn test_snapshot_is_built_once() {
    let finder = create_test_finder(QueryConfig::default());
    assert!(!finder.has_index());

    let first = finder.snapshot().unwrap();
    let second = finder.snapshot().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_rebuild_swaps_snapshot() {
    let finder = create_test_finder(QueryConfig::default());
    let old = finder.snapshot().unwrap();

    common::load(finder.store(), &[common::METAZOA_ONLY]);
    // The cached snapshot does not see the new node until rebuilt.
    assert!(finder.find_descendants(common::METAZOA_ONLY.0).unwrap().is_empty());
    assert!(!old.contains(common::METAZOA_ONLY.0));

    let new = finder.rebuild_index().unwrap();
    assert!(!Arc::ptr_eq(&old, &new));
    assert!(new.contains(common::METAZOA_ONLY.0));
    assert!(finder
        .find_descendants(33208)
        .unwrap()
        .contains(&common::METAZOA_ONLY.0));

    finder.clear_index();
    assert!(!finder.has_index());
}

#[test]
fn test_direct_mode_never_builds_index() {
    let config = QueryConfig {
        strategy: LookupMode::Direct,
        ..QueryConfig::default()
    };
    let finder = create_test_finder(config);

    let lineage = finder.find_ancestors(9606, None).unwrap().unwrap();
    assert_eq!(lineage.id_at("genus"), Some(9605));
    assert!(!finder.has_index());

    finder.classify(&[9606, 9605], None, true).unwrap();
    assert!(!finder.has_index());
}

#[test]
fn test_descendants_always_use_index() {
    let config = QueryConfig {
        strategy: LookupMode::Direct,
        ..QueryConfig::default()
    };
    let finder = create_test_finder(config);

    assert_eq!(
        finder.find_descendants(9605).unwrap(),
        HashSet::from([741158, 1425170, 63221, 9606])
    );
    assert!(finder.has_index());
}

#[test]
fn test_configured_levels_are_default() {
    let config = QueryConfig {
        levels: Levels::new(["family"]),
        ..QueryConfig::default()
    };
    let finder = create_test_finder(config);

    let lineage = finder.find_ancestors_direct(9606, None).unwrap().unwrap();
    assert_eq!(lineage.level_ids.len(), 1);
    assert_eq!(lineage.name_at("family"), Some("Hominidae"));
}

#[test]
fn test_parallel_classify() {
    let config = QueryConfig {
        parallel: true,
        ..QueryConfig::default()
    };
    let finder = create_test_finder(config);

    let result = finder.classify(&[63221, 404, 9606], None, true).unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(result.ids.cell(63221, "species"), Some(&9606));
}

#[test]
fn test_clade_info() {
    let finder = create_test_finder(QueryConfig::default());
    let info = finder.clade_info(9606, &Levels::default()).unwrap();

    assert_eq!(info.tax_id, 9606);
    assert_eq!(info.clades.len(), 8);
    assert_eq!(info.clades[0].level, "superkingdom");
    let genus = info.get("genus").unwrap();
    assert_eq!(genus.tax_id, 9605);
    assert_eq!(genus.name.as_deref(), Some("Homo"));
}

#[test]
fn test_clade_info_errors() {
    let finder = create_test_finder(QueryConfig::default());

    assert!(matches!(
        finder.clade_info(404, &Levels::default()),
        Err(FinderError::TaxonNotFound(404))
    ));
    assert!(matches!(
        finder.clade_info(9605, &Levels::default()),
        Err(FinderError::LevelMissing { id: 9605, ref level }) if level == "species"
    ));
}

#[test]
fn test_sequence_header() {
    let finder = create_test_finder(QueryConfig::default());

    let header = finder
        .sequence_header(9606, "NC_012920.1", &Levels::default())
        .unwrap();
    assert_eq!(
        header,
        "9606|9606|9605|9604|9443|40674|7711|33208|NC_012920.1"
    );

    let partial = finder
        .sequence_header(9605, "", &Levels::new(["kingdom", "genus", "species"]))
        .unwrap();
    assert_eq!(partial, "9605|0|9605|");

    assert!(matches!(
        finder.sequence_header(404, "x", &Levels::default()),
        Err(FinderError::TaxonNotFound(404))
    ));
}
