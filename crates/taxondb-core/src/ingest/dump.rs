//! Parsers for the `.dmp` files of an NCBI taxdump.
//!
//! Records are one per line, fields separated by `\t|\t`, each line closed
//! by a trailing `\t|`.

use std::io::BufRead;

use crate::models::{NameRecord, NodeRecord, TaxId};

use super::error::IngestError;

const FIELD_SEPARATOR: &str = "\t|\t";
const LINE_TERMINATOR: &str = "\t|";

/// Splits one dump line into its fields.
pub fn split_fields(line: &str) -> Vec<&str> {
    let line = line.trim_end_matches(['\r', '\n']);
    let line = line.strip_suffix(LINE_TERMINATOR).unwrap_or(line);
    line.split(FIELD_SEPARATOR).collect()
}

/// A names.dmp row together with its name class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    pub record: NameRecord,
    pub name_class: String,
}

struct Fields<'a> {
    file: &'a str,
    line: usize,
    values: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    fn new(file: &'a str, line: usize, text: &'a str, min: usize) -> Result<Self, IngestError> {
        let values = split_fields(text);
        if values.len() < min {
            return Err(IngestError::parse(
                file,
                line,
                format!("expected at least {} fields, found {}", min, values.len()),
            ));
        }
        Ok(Self { file, line, values })
    }

    fn text(&self, idx: usize) -> &'a str {
        self.values.get(idx).copied().map(str::trim).unwrap_or("")
    }

    fn opt_text(&self, idx: usize) -> Option<String> {
        Some(self.text(idx)).filter(|v| !v.is_empty()).map(str::to_string)
    }

    fn id(&self, idx: usize, what: &str) -> Result<TaxId, IngestError> {
        self.text(idx).parse().map_err(|_| {
            IngestError::parse(
                self.file,
                self.line,
                format!("invalid {}: {:?}", what, self.text(idx)),
            )
        })
    }

    fn opt_int(&self, idx: usize, what: &str) -> Result<Option<i64>, IngestError> {
        match self.text(idx) {
            "" => Ok(None),
            _ => self.id(idx, what).map(Some),
        }
    }

    fn flag(&self, idx: usize, what: &str) -> Result<bool, IngestError> {
        match self.text(idx) {
            "" | "0" => Ok(false),
            "1" => Ok(true),
            other => Err(IngestError::parse(
                self.file,
                self.line,
                format!("invalid {} flag: {:?}", what, other),
            )),
        }
    }
}

/// Parses one nodes.dmp line. `line` is 1-based and only used in errors.
pub fn parse_node_line(file: &str, line: usize, text: &str) -> Result<NodeRecord, IngestError> {
    let f = Fields::new(file, line, text, 3)?;
    let rank = f.text(2);
    if rank.is_empty() {
        return Err(IngestError::parse(file, line, "empty rank"));
    }

    Ok(NodeRecord {
        id: f.id(0, "tax_id")?,
        parent_id: f.id(1, "parent tax_id")?,
        rank: rank.to_string(),
        embl_code: f.opt_text(3),
        division_id: f.opt_int(4, "division id")?,
        inherited_div_flag: f.flag(5, "inherited div")?,
        genetic_code_id: f.opt_int(6, "genetic code id")?,
        inherited_gc_flag: f.flag(7, "inherited GC")?,
        mito_genetic_code_id: f.opt_int(8, "mitochondrial genetic code id")?,
        inherited_mgc_flag: f.flag(9, "inherited MGC")?,
        genbank_hidden_flag: f.flag(10, "GenBank hidden")?,
        hidden_subtree_root_flag: f.flag(11, "hidden subtree root")?,
    })
}

/// Parses one names.dmp line.
pub fn parse_name_line(file: &str, line: usize, text: &str) -> Result<NameEntry, IngestError> {
    let f = Fields::new(file, line, text, 4)?;
    let name = f.text(1);
    if name.is_empty() {
        return Err(IngestError::parse(file, line, "empty name"));
    }

    Ok(NameEntry {
        record: NameRecord {
            id: f.id(0, "tax_id")?,
            name: name.to_string(),
            unique_name: f.opt_text(2),
        },
        name_class: f.text(3).to_string(),
    })
}

/// Parses every node line of `reader`. Blank lines are skipped.
pub fn parse_nodes<R: BufRead>(reader: R, file: &str) -> Result<Vec<NodeRecord>, IngestError> {
    let mut nodes = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        nodes.push(parse_node_line(file, idx + 1, &line)?);
    }
    Ok(nodes)
}

/// Parses the name lines of `reader`, keeping only `name_class` entries.
pub fn parse_names<R: BufRead>(
    reader: R,
    file: &str,
    name_class: &str,
) -> Result<Vec<NameRecord>, IngestError> {
    let mut names = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = parse_name_line(file, idx + 1, &line)?;
        if entry.name_class == name_class {
            names.push(entry.record);
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fields_strips_terminator() {
        assert_eq!(split_fields("1\t|\t1\t|\tno rank\t|"), vec!["1", "1", "no rank"]);
        assert_eq!(split_fields("9606\t|\t\t|\r\n"), vec!["9606", ""]);
    }

    #[test]
    fn test_parse_full_node_line() {
        let line = "9606\t|\t9605\t|\tspecies\t|\tHS\t|\t5\t|\t1\t|\t1\t|\t1\t|\t2\t|\t1\t|\t1\t|\t0\t|\t\t|";
        let node = parse_node_line("nodes.dmp", 1, line).unwrap();

        assert_eq!(node.node().id, 9606);
        assert_eq!(node.parent_id, 9605);
        assert_eq!(node.rank, "species");
        assert_eq!(node.embl_code.as_deref(), Some("HS"));
        assert_eq!(node.division_id, Some(5));
        assert!(node.inherited_div_flag);
        assert_eq!(node.mito_genetic_code_id, Some(2));
        assert!(node.genbank_hidden_flag);
        assert!(!node.hidden_subtree_root_flag);
    }

    #[test]
    fn test_parse_short_node_line() {
        let node = parse_node_line("nodes.dmp", 1, "1\t|\t1\t|\tno rank\t|").unwrap();
        assert!(node.node().is_root());
        assert_eq!(node.embl_code, None);
        assert_eq!(node.division_id, None);
    }

    #[test]
    fn test_malformed_node_line_reports_position() {
        let err = parse_node_line("nodes.dmp", 7, "abc\t|\t1\t|\tgenus\t|").unwrap_err();
        match err {
            IngestError::Parse { file, line, .. } => {
                assert_eq!(file, "nodes.dmp");
                assert_eq!(line, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(parse_node_line("nodes.dmp", 1, "1\t|\t1").is_err());
    }

    #[test]
    fn test_parse_names_filters_class() {
        let text = "9606\t|\tHomo sapiens\t|\t\t|\tscientific name\t|\n\
                    9606\t|\thuman\t|\t\t|\tgenbank common name\t|\n\
                    \n\
                    9605\t|\tHomo\t|\tHomo <primates>\t|\tscientific name\t|\n";
        let names = parse_names(text.as_bytes(), "names.dmp", "scientific name").unwrap();

        assert_eq!(names.len(), 2);
        assert_eq!(names[0], NameRecord::new(9606, "Homo sapiens"));
        assert_eq!(names[1].unique_name.as_deref(), Some("Homo <primates>"));
    }
}
