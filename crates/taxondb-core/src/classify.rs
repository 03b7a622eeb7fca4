//! Batch classification of identifiers against an ordered level list.

use std::fmt::{self, Display, Write as _};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::DEFAULT_PROGRESS_INTERVAL;
use crate::models::{Levels, TaxId, NA_NAME, UNCLASSIFIED_ID, UNCLASSIFIED_PREFIX};
use crate::resolver::{ResolveError, Resolver};

/// Leading column of every classification table.
pub const TAX_ID_COLUMN: &str = "tax_id";

/// One input identifier and its per-level cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row<T> {
    pub tax_id: TaxId,
    pub cells: Vec<Option<T>>,
}

/// Rows sharing one column layout: `tax_id` followed by the levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table<T> {
    pub columns: Vec<String>,
    pub rows: Vec<Row<T>>,
}

impl<T> Table<T> {
    fn with_levels(levels: &Levels, capacity: usize) -> Self {
        let mut columns = Vec::with_capacity(levels.len() + 1);
        columns.push(TAX_ID_COLUMN.to_string());
        columns.extend(levels.iter().map(str::to_string));
        Self {
            columns,
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell of `tax_id`'s first row in `column`.
    pub fn cell(&self, tax_id: TaxId, column: &str) -> Option<&T> {
        let idx = self.columns.iter().position(|c| c == column)?.checked_sub(1)?;
        self.rows
            .iter()
            .find(|row| row.tax_id == tax_id)
            .and_then(|row| row.cells.get(idx))
            .and_then(Option::as_ref)
    }
}

impl<T: Display> Table<T> {
    /// Tab separated rendering with a header line. Missing cells are empty.
    pub fn to_tsv(&self) -> String {
        let mut out = self.columns.join("\t");
        out.push('\n');
        for row in &self.rows {
            let _ = write!(out, "{}", row.tax_id);
            for cell in &row.cells {
                out.push('\t');
                if let Some(value) = cell {
                    let _ = write!(out, "{}", value);
                }
            }
            out.push('\n');
        }
        out
    }
}

impl<T: Display> Display for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_tsv())
    }
}

/// Paired id and name tables for one batch, rows in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub ids: Table<TaxId>,
    pub names: Table<String>,
}

impl Classification {
    fn new(levels: &Levels, capacity: usize) -> Self {
        Self {
            ids: Table::with_levels(levels, capacity),
            names: Table::with_levels(levels, capacity),
        }
    }

    fn push(&mut self, (ids, names): (Row<TaxId>, Row<String>)) {
        self.ids.rows.push(ids);
        self.names.rows.push(names);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

type RowPair = (Row<TaxId>, Row<String>);

/// Classifies `ids` one after another.
///
/// Unknown ids produce an all-empty row when `match_input` is set and no row
/// otherwise. Structural errors (cycles, broken lineages, a closed store)
/// abort the whole batch.
pub fn classify(
    resolver: &Resolver<'_>,
    ids: &[TaxId],
    levels: &Levels,
    match_input: bool,
) -> Result<Classification, ResolveError> {
    let levels = levels.clone();
    let mut out = Classification::new(&levels, ids.len());

    for (done, &id) in ids.iter().enumerate() {
        if let Some(pair) = classify_one(resolver, id, &levels, match_input)? {
            out.push(pair);
        }
        report_progress(done + 1, ids.len());
    }

    info!("Classified {} of {} identifiers", out.len(), ids.len());
    Ok(out)
}

/// Same output as [`classify`], resolving identifiers on the rayon pool.
pub fn classify_parallel(
    resolver: &Resolver<'_>,
    ids: &[TaxId],
    levels: &Levels,
    match_input: bool,
) -> Result<Classification, ResolveError> {
    let levels = levels.clone();
    let done = AtomicUsize::new(0);

    let pairs = ids
        .par_iter()
        .map(|&id| {
            let pair = classify_one(resolver, id, &levels, match_input);
            report_progress(done.fetch_add(1, Ordering::Relaxed) + 1, ids.len());
            pair
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Classification::new(&levels, ids.len());
    for pair in pairs.into_iter().flatten() {
        out.push(pair);
    }

    info!("Classified {} of {} identifiers", out.len(), ids.len());
    Ok(out)
}

fn report_progress(done: usize, total: usize) {
    if done % DEFAULT_PROGRESS_INTERVAL == 0 {
        info!("Processed {}/{} identifiers", done, total);
    }
}

fn classify_one(
    resolver: &Resolver<'_>,
    id: TaxId,
    levels: &Levels,
    match_input: bool,
) -> Result<Option<RowPair>, ResolveError> {
    let lineage = match resolver.find_ancestors(id, levels)? {
        Some(lineage) => lineage,
        None if match_input => {
            return Ok(Some((
                Row {
                    tax_id: id,
                    cells: vec![None; levels.len()],
                },
                Row {
                    tax_id: id,
                    cells: vec![None; levels.len()],
                },
            )))
        }
        None => return Ok(None),
    };

    let mut id_cells = Vec::with_capacity(levels.len());
    let mut name_cells = Vec::with_capacity(levels.len());
    let mut last_name = NA_NAME.to_string();

    for (position, level) in levels.iter().enumerate() {
        match lineage.id_at(level) {
            Some(level_id) => {
                id_cells.push(Some(level_id));
                match lineage.name_of(level_id) {
                    Some(name) => {
                        last_name = name.to_string();
                        name_cells.push(Some(last_name.clone()));
                    }
                    None => name_cells.push(None),
                }
            }
            None => {
                id_cells.push(Some(UNCLASSIFIED_ID));
                if position == 0 {
                    name_cells.push(Some(last_name.clone()));
                } else {
                    name_cells.push(Some(format!("{}{}", UNCLASSIFIED_PREFIX, last_name)));
                }
            }
        }
    }

    Ok(Some((
        Row {
            tax_id: id,
            cells: id_cells,
        },
        Row {
            tax_id: id,
            cells: name_cells,
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_tsv_leaves_missing_cells_empty() {
        let table = Table {
            columns: vec!["tax_id".into(), "genus".into(), "species".into()],
            rows: vec![
                Row {
                    tax_id: 9606,
                    cells: vec![Some(9605), Some(9606)],
                },
                Row {
                    tax_id: 42,
                    cells: vec![None, None],
                },
            ],
        };

        assert_eq!(table.to_tsv(), "tax_id\tgenus\tspecies\n9606\t9605\t9606\n42\t\t\n");
        assert_eq!(table.cell(9606, "genus"), Some(&9605));
        assert_eq!(table.cell(9606, "tax_id"), None);
        assert_eq!(table.cell(42, "species"), None);
    }

    #[test]
    fn test_columns_follow_levels() {
        let table: Table<TaxId> = Table::with_levels(&Levels::new(["kingdom", "genus"]), 0);
        assert_eq!(table.columns, ["tax_id", "kingdom", "genus"]);
        assert!(table.is_empty());
    }
}
