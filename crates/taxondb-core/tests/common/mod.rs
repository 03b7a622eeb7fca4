#![allow(dead_code)]

use taxondb_core::{NameRecord, NodeRecord, SqliteStore, TaxId};

/// Human lineage from the root down, plus two subspecies and a sister species.
pub const HUMAN_LINEAGE: &[(TaxId, TaxId, &str, &str)] = &[
    (1, 1, "no rank", "root"),
    (131567, 1, "no rank", "cellular organisms"),
    (2759, 131567, "superkingdom", "Eukaryota"),
    (33154, 2759, "clade", "Opisthokonta"),
    (33208, 33154, "kingdom", "Metazoa"),
    (6072, 33208, "clade", "Eumetazoa"),
    (33213, 6072, "clade", "Bilateria"),
    (33511, 33213, "clade", "Deuterostomia"),
    (7711, 33511, "phylum", "Chordata"),
    (89593, 7711, "subphylum", "Craniata"),
    (7742, 89593, "clade", "Vertebrata"),
    (32523, 7742, "clade", "Tetrapoda"),
    (40674, 32523, "class", "Mammalia"),
    (9347, 40674, "clade", "Eutheria"),
    (9443, 9347, "order", "Primates"),
    (9526, 9443, "parvorder", "Catarrhini"),
    (9604, 9526, "family", "Hominidae"),
    (9605, 9604, "genus", "Homo"),
    (9606, 9605, "species", "Homo sapiens"),
    (63221, 9606, "subspecies", "Homo sapiens neanderthalensis"),
    (741158, 9606, "subspecies", "Homo sapiens subsp. 'Denisova'"),
    (1425170, 9605, "species", "Homo heidelbergensis"),
];

/// A node whose only resolvable default level is `kingdom`.
pub const METAZOA_ONLY: (TaxId, TaxId, &str, &str) = (880001, 33208, "no rank", "Metazoa incertae sedis");

/// Two nodes pointing at each other, detached from the root.
pub const CYCLE: &[(TaxId, TaxId, &str, &str)] = &[
    (500, 501, "genus", "Loopus"),
    (501, 500, "family", "Loopidae"),
];

pub fn store_with(rows: &[(TaxId, TaxId, &str, &str)]) -> SqliteStore {
    let store = SqliteStore::open_memory().unwrap();
    store.create_schema(true).unwrap();
    load(&store, rows);
    store
}

pub fn load(store: &SqliteStore, rows: &[(TaxId, TaxId, &str, &str)]) {
    let nodes: Vec<NodeRecord> = rows
        .iter()
        .map(|(id, parent, rank, _)| NodeRecord::new(*id, *parent, *rank))
        .collect();
    let names: Vec<NameRecord> = rows
        .iter()
        .map(|(id, _, _, name)| NameRecord::new(*id, *name))
        .collect();
    store.insert_nodes(&nodes).unwrap();
    store.insert_names(&names).unwrap();
}

/// In-memory store holding the human lineage.
pub fn human_store() -> SqliteStore {
    store_with(HUMAN_LINEAGE)
}

/// Renders rows in taxdump format: `(nodes.dmp, names.dmp)`.
pub fn dump_text(rows: &[(TaxId, TaxId, &str, &str)]) -> (String, String) {
    let mut nodes = String::new();
    let mut names = String::new();
    for (id, parent, rank, name) in rows {
        nodes.push_str(&format!(
            "{}\t|\t{}\t|\t{}\t|\t\t|\t0\t|\t0\t|\t1\t|\t0\t|\t1\t|\t0\t|\t0\t|\t0\t|\t\t|\n",
            id, parent, rank
        ));
        names.push_str(&format!("{}\t|\t{}\t|\t\t|\tscientific name\t|\n", id, name));
        names.push_str(&format!("{}\t|\t{} (synonym)\t|\t\t|\tsynonym\t|\n", id, name));
    }
    (nodes, names)
}

/// Gzipped taxdump tarball of `rows`.
pub fn taxdump_tar_gz(rows: &[(TaxId, TaxId, &str, &str)]) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let (nodes, names) = dump_text(rows);
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (member, body) in [("nodes.dmp", nodes), ("names.dmp", names), ("gc.prt", String::new())] {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, member, body.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}
