use super::RawTable;
use crate::config::{Config, HeaderPolicy};

pub type Row = Vec<Option<String>>;

/// Which schema the rows below the header follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Header row with an "ELEMENT" / "CATEGORY" cell.
    Standard,
    /// Header row with a "T.A.E." cell.
    Tae,
    /// No header: name, current, ideal by position.
    Positional { tae: bool },
}

impl TableKind {
    pub fn is_tae(&self) -> bool {
        matches!(self, TableKind::Tae | TableKind::Positional { tae: true })
    }
}

/// Column index per semantic role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub name: Option<usize>,
    pub current: Option<usize>,
    pub ideal: Option<usize>,
    pub unit: Option<usize>,
}

#[derive(Debug)]
pub struct ClassifiedTable<'a> {
    pub kind: TableKind,
    pub columns: ColumnMap,
    /// Rows after the header, or every row for positional tables.
    pub data_rows: &'a [Row],
}

const TAE_HEADER_MARKER: &str = "T.A.E.";

/// Classify a located table, or `None` when it cannot hold nutrient data.
pub fn classify<'a>(table: &'a RawTable, cfg: &Config) -> Option<ClassifiedTable<'a>> {
    let rows = &table.rows;
    if rows.len() < 2 || rows[0].len() < cfg.extraction.min_table_columns {
        return None;
    }

    match find_header(rows) {
        Some((header_idx, kind)) => {
            let header = &rows[header_idx];
            let mut columns = map_columns(header, &cfg.header);
            // TAE headers label the name column with the marker itself
            if kind == TableKind::Tae && columns.name.is_none() {
                columns.name = header
                    .iter()
                    .position(|c| c.as_deref().is_some_and(|c| c.to_uppercase().contains(TAE_HEADER_MARKER)));
            }
            Some(ClassifiedTable {
                kind,
                columns,
                data_rows: &rows[header_idx + 1..],
            })
        }
        None => Some(ClassifiedTable {
            kind: TableKind::Positional {
                tae: has_marker(rows, &cfg.extraction.tae_table_markers),
            },
            columns: ColumnMap {
                name: Some(0),
                current: Some(1),
                ideal: Some(2),
                unit: None,
            },
            data_rows: rows,
        }),
    }
}

/// Top-down header scan. An ELEMENT/CATEGORY row stops the scan at once;
/// within a row it beats a T.A.E. cell.
pub fn find_header(rows: &[Row]) -> Option<(usize, TableKind)> {
    for (i, row) in rows.iter().enumerate() {
        let cells = || row.iter().flatten().map(|c| c.to_uppercase());
        if cells().any(|c| c.contains("ELEMENT") || c.contains("CATEGORY")) {
            return Some((i, TableKind::Standard));
        }
        if cells().any(|c| c.contains(TAE_HEADER_MARKER)) {
            return Some((i, TableKind::Tae));
        }
    }
    None
}

/// Assign column roles by case-insensitive substring. Each cell takes at most
/// one role, checked in name, current, ideal, unit order.
pub fn map_columns(header: &Row, policy: &HeaderPolicy) -> ColumnMap {
    let mut map = ColumnMap::default();

    for (idx, cell) in header.iter().enumerate() {
        let Some(cell) = cell else { continue };
        let cell_l = cell.trim().to_lowercase();
        if cell_l.is_empty() {
            continue;
        }

        let slot = if cell_l.contains("element") || cell_l.contains("category") {
            &mut map.name
        } else if cell_l.contains("your level") || cell_l.contains("level") {
            &mut map.current
        } else if cell_l.contains("acceptable range") || cell_l.contains("range") {
            &mut map.ideal
        } else if cell_l.contains("unit") {
            &mut map.unit
        } else {
            continue;
        };

        if policy.last_match_wins || slot.is_none() {
            *slot = Some(idx);
        }
    }

    map
}

fn has_marker(rows: &[Row], markers: &[String]) -> bool {
    rows.iter().flatten().flatten().any(|cell| {
        let upper = cell.to_uppercase();
        markers.iter().any(|m| upper.contains(&m.to_uppercase()))
    })
}
