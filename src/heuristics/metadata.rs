use super::{AnalysisInfo, RawTable, UNKNOWN};
use crate::config::MetadataPolicy;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static DATE_AT_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}").unwrap());
static DATE_ANYWHERE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{2}/\d{2}/\d{4}").unwrap());
static PADDOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)PADDOCK:\s*([\w\-\s]+)").unwrap());
static CROP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)CROP:\s*([\w\-\s]+)").unwrap());
static LOCATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)LOCATION:\s*([\w\-\s]+)").unwrap());
static TRAILING_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:paddock|crop|location|date)$").unwrap());

/// Recover crop/paddock/date/location for the analysis built from
/// `tables[table_idx]`.
///
/// Positional guesses come first (the small header table right before the
/// nutrient table), then labelled text anywhere in tables `0..=table_idx`.
pub fn associate(tables: &[RawTable], table_idx: usize, policy: &MetadataPolicy) -> AnalysisInfo {
    let page = tables.get(table_idx).map_or(table_idx + 1, |t| t.page);
    let mut info = AnalysisInfo::new(format!("Analysis {}", table_idx + 1), page);

    if table_idx > 0 {
        if let Some(rows) = tables.get(table_idx - 1).and_then(context_rows) {
            apply_positional(&mut info, &rows, false);
        }
    }

    for table in tables.iter().take(table_idx + 1) {
        if policy.positional_rescan {
            if let Some(rows) = context_rows(table) {
                apply_positional(&mut info, &rows, true);
            }
        }
        for row in &table.rows {
            let row_text = row.iter().flatten().map(String::as_str).collect::<Vec<_>>().join(" ");
            if row_text.is_empty() {
                continue;
            }
            apply_explicit(&mut info, &row_text, policy);
        }
    }

    debug!(?info, "Analysis metadata");
    info
}

/// First-column values of a crop/paddock/date header table: 3-4 non-empty
/// first cells.
fn context_rows(table: &RawTable) -> Option<Vec<String>> {
    let rows: Vec<String> = table
        .rows
        .iter()
        .filter_map(|r| r.first().cloned().flatten())
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    (3..=4).contains(&rows.len()).then_some(rows)
}

/// row0 = crop, row1 = paddock, row2 = date. With `only_unknown` the guess
/// only fills fields nobody has set yet.
fn apply_positional(info: &mut AnalysisInfo, rows: &[String], only_unknown: bool) {
    let open = |field: &str| !only_unknown || field == UNKNOWN;

    if open(&info.crop) && !DATE_AT_START.is_match(&rows[0]) {
        info.crop = rows[0].clone();
    }
    if info.paddock == UNKNOWN && !DATE_AT_START.is_match(&rows[1]) && rows[1] != info.crop {
        info.paddock = rows[1].clone();
    }
    if open(&info.date) {
        if let Some(date) = rows.get(2).filter(|r| DATE_AT_START.is_match(r)) {
            info.date = date.clone();
        }
    }
}

fn apply_explicit(info: &mut AnalysisInfo, row_text: &str, policy: &MetadataPolicy) {
    let overwrite = |field: &str| policy.explicit_last_wins || field == UNKNOWN;

    if let Some(v) = labelled(&PADDOCK, row_text) {
        if overwrite(&info.paddock) {
            info.paddock = v;
        }
    }
    if let Some(v) = labelled(&CROP, row_text) {
        if overwrite(&info.crop) {
            info.crop = v;
        }
    }
    if let Some(v) = labelled(&LOCATION, row_text) {
        if overwrite(&info.location) {
            info.location = v;
        }
    }
    if info.date == UNKNOWN {
        if let Some(m) = DATE_ANYWHERE.find(row_text) {
            info.date = m.as_str().to_string();
        }
    }
}

/// Value after a label. When the capture ran into the next label's colon
/// ("PADDOCK: North CROP: Wheat"), that label's keyword is dropped.
fn labelled(re: &Regex, row_text: &str) -> Option<String> {
    let m = re.captures(row_text)?.get(1)?;
    let mut value = m.as_str().trim_end();
    if row_text[m.end()..].starts_with(':') {
        if let Some(last) = TRAILING_LABEL.find(value) {
            value = &value[..last.start()];
        }
    }
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nutrient_table(index: usize) -> RawTable {
        RawTable::from_strs(
            1,
            index,
            &[
                &["Element", "Your Level", "Range", "Unit"],
                &["Calcium", "1500", "1200 - 1800", "ppm"],
            ],
        )
    }

    #[test]
    fn test_positional_header_table() {
        let tables = vec![
            RawTable::from_strs(1, 0, &[&["Lucerne"], &["Home Paddock"], &["05/02/2024"]]),
            nutrient_table(1),
        ];
        let info = associate(&tables, 1, &MetadataPolicy::default());
        assert_eq!(info.name, "Analysis 2");
        assert_eq!(info.crop, "Lucerne");
        assert_eq!(info.paddock, "Home Paddock");
        assert_eq!(info.date, "05/02/2024");
        assert_eq!(info.location, UNKNOWN);
    }

    #[test]
    fn test_paddock_equal_to_crop_or_date_rejected() {
        let tables = vec![
            RawTable::from_strs(1, 0, &[&["Wheat"], &["Wheat"], &["not a date"]]),
            nutrient_table(1),
        ];
        let info = associate(&tables, 1, &MetadataPolicy::default());
        assert_eq!(info.crop, "Wheat");
        assert_eq!(info.paddock, UNKNOWN);
        assert_eq!(info.date, UNKNOWN);
    }

    #[test]
    fn test_explicit_labels_override_positional() {
        let tables = vec![
            RawTable::from_strs(1, 0, &[&["PADDOCK: River Flat", "CROP: Maize"], &["LOCATION: Gympie"]]),
            RawTable::from_strs(1, 1, &[&["Lucerne"], &["Home Paddock"], &["05/02/2024"]]),
            nutrient_table(2),
        ];
        let info = associate(&tables, 2, &MetadataPolicy::default());
        // labels are scanned after the positional guess, so they win
        assert_eq!(info.paddock, "River Flat");
        assert_eq!(info.crop, "Maize");
        assert_eq!(info.location, "Gympie");
        assert_eq!(info.date, "05/02/2024");
    }

    #[test]
    fn test_last_label_wins_but_first_date_kept() {
        let tables = vec![
            RawTable::from_strs(1, 0, &[&["PADDOCK: North 12"], &["Sampled 01/01/2023"]]),
            RawTable::from_strs(2, 1, &[&["PADDOCK: South 3"], &["Reported 02/02/2023"]]),
            nutrient_table(2),
        ];
        let info = associate(&tables, 2, &MetadataPolicy::default());
        assert_eq!(info.paddock, "South 3");
        assert_eq!(info.date, "01/01/2023");
        assert_eq!(info.page, 1);

        let keep_first = MetadataPolicy {
            positional_rescan: true,
            explicit_last_wins: false,
        };
        assert_eq!(associate(&tables, 2, &keep_first).paddock, "North 12");
    }

    #[test]
    fn test_label_value_may_contain_keyword() {
        let tables = vec![
            RawTable::from_strs(1, 0, &[&["PADDOCK: Home Paddock"], &["CROP: Oats LOCATION: Dalby"]]),
            nutrient_table(1),
        ];
        let info = associate(&tables, 1, &MetadataPolicy::default());
        assert_eq!(info.paddock, "Home Paddock");
        assert_eq!(info.crop, "Oats");
        assert_eq!(info.location, "Dalby");
    }

    #[test]
    fn test_later_tables_not_scanned() {
        let tables = vec![
            nutrient_table(0),
            RawTable::from_strs(1, 1, &[&["PADDOCK: Too Late"], &["x"]]),
        ];
        let info = associate(&tables, 0, &MetadataPolicy::default());
        assert_eq!(info.paddock, UNKNOWN);
    }
}
