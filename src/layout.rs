// src/layout.rs

//! Positioned text runs from page content streams, and the cell grids
//! recovered from their alignment.

use crate::heuristics::RawTable;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};

/// Average glyph advance as a share of the font size. Glyph widths are not
/// read from the font, so every run width is an estimate.
const CHAR_WIDTH_RATIO: f32 = 0.5;
/// Runs whose baselines differ by at most this many points share a line.
const LINE_TOLERANCE: f32 = 2.0;
/// A horizontal gap wider than this many font sizes starts a new cell.
const CELL_GAP_RATIO: f32 = 1.0;
/// A gap wider than this many font sizes inside a cell gets a space.
const WORD_GAP_RATIO: f32 = 0.15;
/// A vertical gap wider than this many font sizes ends a table.
const BLOCK_GAP_RATIO: f32 = 2.0;
/// Slack in points when matching a cell against a column span.
const COLUMN_PAD: f32 = 1.0;

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// A run of text at a page position, in user-space points. `y` grows upward.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub size: f32,
    pub text: String,
}

/// `m` applied first, then `n`.
fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn translation(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    for (slot, obj) in out.iter_mut().zip(operands) {
        *slot = number(obj)?;
    }
    (operands.len() >= N).then_some(out)
}

/// UTF-16BE when the string carries a byte-order mark, Latin-1 otherwise.
fn decode_string(bytes: &[u8]) -> String {
    if let [0xFE, 0xFF, rest @ ..] = bytes {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

#[derive(Debug, Clone)]
struct TextState {
    ctm: Matrix,
    saved: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font_size: f32,
    leading: f32,
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            saved: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            font_size: 0.0,
            leading: 0.0,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
        }
    }
}

impl TextState {
    fn next_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply(&translation(tx, ty), &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// Horizontal advance in text space for `text`.
    fn advance(&self, text: &str) -> f32 {
        text.chars()
            .map(|ch| {
                let glyph = self.font_size * CHAR_WIDTH_RATIO + self.char_spacing;
                let word = if ch == ' ' { self.word_spacing } else { 0.0 };
                (glyph + word) * self.horiz_scale
            })
            .sum()
    }

    fn device(&self) -> Matrix {
        multiply(&self.text_matrix, &self.ctm)
    }

    fn effective_size(&self) -> f32 {
        let m = self.device();
        (self.font_size * (m[2] * m[2] + m[3] * m[3]).sqrt()).abs()
    }

    fn move_x(&mut self, dx: f32) {
        self.text_matrix = multiply(&translation(dx, 0.0), &self.text_matrix);
    }
}

/// Accumulates one run of shown text, starting at the pen position.
struct Run {
    x: f32,
    y: f32,
    size: f32,
    text: String,
}

impl Run {
    fn start(state: &TextState) -> Self {
        let m = state.device();
        Self {
            x: m[4],
            y: m[5],
            size: state.effective_size(),
            text: String::new(),
        }
    }

    fn finish(self, state: &TextState, out: &mut Vec<Fragment>) {
        let text = self.text.trim_end();
        if text.trim().is_empty() {
            return;
        }
        let m = state.device();
        let width = (m[4] - self.x).abs();
        out.push(Fragment {
            x: self.x,
            y: self.y,
            width,
            size: self.size,
            text: text.to_string(),
        });
    }
}

fn show(text: &str, state: &mut TextState, out: &mut Vec<Fragment>) {
    let mut run = Run::start(state);
    run.text.push_str(text);
    state.move_x(state.advance(text));
    run.finish(state, out);
}

/// `TJ`: strings interleaved with adjustments in thousandths of a text-space
/// unit. A large enough shift becomes a space, a cell-sized one a new run.
fn show_array(items: &[Object], state: &mut TextState, out: &mut Vec<Fragment>) {
    let mut run = Run::start(state);
    for item in items {
        if let Object::String(bytes, _) = item {
            let text = decode_string(bytes);
            if run.text.is_empty() {
                run = Run::start(state);
            }
            run.text.push_str(&text);
            state.move_x(state.advance(&text));
        } else if let Some(adj) = number(item) {
            let dx = -adj / 1000.0 * state.font_size * state.horiz_scale;
            if dx > state.font_size * CELL_GAP_RATIO && !run.text.is_empty() {
                let done = std::mem::replace(&mut run, Run::start(state));
                done.finish(state, out);
            } else if dx > state.font_size * WORD_GAP_RATIO && !run.text.is_empty() {
                run.text.push(' ');
            }
            state.move_x(dx);
        }
    }
    run.finish(state, out);
}

/// Walk content operators, tracking the text and graphics matrices, and
/// collect every shown string with its starting position.
pub fn fragments_from_operations(operations: &[Operation]) -> Vec<Fragment> {
    let mut state = TextState::default();
    let mut out = Vec::new();

    for op in operations {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "q" => state.saved.push(state.ctm),
            "Q" => {
                if let Some(ctm) = state.saved.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = numbers::<6>(operands) {
                    state.ctm = multiply(&m, &state.ctm);
                }
            }
            "BT" => {
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(number) {
                    state.font_size = size;
                }
            }
            "Tm" => {
                if let Some(m) = numbers::<6>(operands) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    state.next_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    state.leading = -ty;
                    state.next_line(tx, ty);
                }
            }
            "T*" => state.next_line(0.0, -state.leading),
            "TL" => {
                if let Some([v]) = numbers::<1>(operands) {
                    state.leading = v;
                }
            }
            "Tc" => {
                if let Some([v]) = numbers::<1>(operands) {
                    state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some([v]) = numbers::<1>(operands) {
                    state.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some([v]) = numbers::<1>(operands) {
                    state.horiz_scale = v / 100.0;
                }
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    show(&decode_string(bytes), &mut state, &mut out);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    show_array(items, &mut state, &mut out);
                }
            }
            "'" => {
                state.next_line(0.0, -state.leading);
                if let Some(Object::String(bytes, _)) = operands.first() {
                    show(&decode_string(bytes), &mut state, &mut out);
                }
            }
            "\"" => {
                if let Some([aw, ac]) = numbers::<2>(operands) {
                    state.word_spacing = aw;
                    state.char_spacing = ac;
                }
                state.next_line(0.0, -state.leading);
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    show(&decode_string(bytes), &mut state, &mut out);
                }
            }
            _ => {}
        }
    }

    out
}

/// Decoded text runs of one page.
pub fn page_fragments(doc: &Document, page_id: ObjectId) -> Result<Vec<Fragment>, lopdf::Error> {
    let raw = doc.get_page_content(page_id)?;
    let content = Content::decode(&raw)?;
    Ok(fragments_from_operations(&content.operations))
}

#[derive(Debug, Clone)]
struct Cell {
    x0: f32,
    x1: f32,
    text: String,
}

#[derive(Debug, Clone)]
struct Line {
    y: f32,
    size: f32,
    cells: Vec<Cell>,
}

/// Top-to-bottom lines, each split into cells left to right.
fn group_lines(mut fragments: Vec<Fragment>) -> Vec<Line> {
    fragments.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut rows: Vec<Vec<Fragment>> = Vec::new();
    for frag in fragments {
        match rows.last_mut() {
            Some(row) if (row[0].y - frag.y).abs() <= LINE_TOLERANCE.max(row[0].size * 0.3) => row.push(frag),
            _ => rows.push(vec![frag]),
        }
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.x.total_cmp(&b.x));
            let y = row[0].y;
            let size = row.iter().map(|f| f.size).fold(0.0, f32::max);
            let mut cells: Vec<Cell> = Vec::new();
            for frag in row {
                let gap_limit = frag.size * CELL_GAP_RATIO;
                match cells.last_mut() {
                    Some(cell) if frag.x - cell.x1 < gap_limit => {
                        if frag.x - cell.x1 > frag.size * WORD_GAP_RATIO {
                            cell.text.push(' ');
                        }
                        cell.text.push_str(&frag.text);
                        cell.x1 = cell.x1.max(frag.x + frag.width);
                    }
                    _ => cells.push(Cell {
                        x0: frag.x,
                        x1: frag.x + frag.width,
                        text: frag.text,
                    }),
                }
            }
            Line { y, size, cells }
        })
        .collect()
}

/// Column spans from the union of cell extents on multi-cell lines.
/// Single-cell lines (titles, captions) do not widen any column.
fn column_spans(lines: &[Line]) -> Vec<(f32, f32)> {
    let mut extents: Vec<(f32, f32)> = lines
        .iter()
        .filter(|l| l.cells.len() >= 2)
        .flat_map(|l| l.cells.iter().map(|c| (c.x0, c.x1)))
        .collect();
    if extents.is_empty() {
        return vec![(f32::MIN, f32::MAX)];
    }
    extents.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut spans: Vec<(f32, f32)> = Vec::new();
    for (x0, x1) in extents {
        match spans.last_mut() {
            Some(span) if x0 <= span.1 + COLUMN_PAD => span.1 = span.1.max(x1),
            _ => spans.push((x0, x1)),
        }
    }
    spans
}

fn column_of(spans: &[(f32, f32)], x: f32) -> usize {
    spans
        .iter()
        .position(|&(x0, x1)| x >= x0 - COLUMN_PAD && x <= x1 + COLUMN_PAD)
        .or_else(|| spans.iter().rposition(|&(x0, _)| x0 <= x))
        .unwrap_or(0)
}

fn block_to_rows(lines: &[Line]) -> Vec<Vec<Option<String>>> {
    let spans = column_spans(lines);
    lines
        .iter()
        .map(|line| {
            let mut row: Vec<Option<String>> = vec![None; spans.len()];
            for cell in &line.cells {
                let slot = &mut row[column_of(&spans, cell.x0)];
                match slot {
                    Some(existing) => {
                        existing.push(' ');
                        existing.push_str(&cell.text);
                    }
                    None => *slot = Some(cell.text.clone()),
                }
            }
            row
        })
        .collect()
}

/// Runs of lines without a wide vertical gap become tables when they hold
/// two or more lines. Cells are placed by column alignment across the run.
pub fn grid_tables(page: usize, fragments: Vec<Fragment>, next_index: &mut usize) -> Vec<RawTable> {
    let lines = group_lines(fragments);

    let mut blocks: Vec<Vec<Line>> = Vec::new();
    for line in lines {
        match blocks.last_mut() {
            Some(block)
                if block.last().is_some_and(|prev| {
                    prev.y - line.y <= BLOCK_GAP_RATIO * prev.size.max(line.size)
                }) =>
            {
                block.push(line)
            }
            _ => blocks.push(vec![line]),
        }
    }

    blocks
        .into_iter()
        .filter(|block| block.len() >= 2)
        .map(|block| {
            let table = RawTable::new(page, *next_index, block_to_rows(&block));
            *next_index += 1;
            table
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;
    use pretty_assertions::assert_eq;

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    fn text(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
    }

    fn frag(x: f32, y: f32, s: &str) -> Fragment {
        Fragment {
            x,
            y,
            width: s.chars().count() as f32 * 5.0,
            size: 10.0,
            text: s.to_string(),
        }
    }

    fn cells(row: &[Option<String>]) -> Vec<&str> {
        row.iter().map(|c| c.as_deref().unwrap_or("")).collect()
    }

    #[test]
    fn test_positions_follow_td_and_tm() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            op("Td", vec![50.into(), 700.into()]),
            op("Tj", vec![text("Calcium")]),
            op("Td", vec![100.into(), 0.into()]),
            op("Tj", vec![text("1500")]),
            op("ET", vec![]),
            op("BT", vec![]),
            op("Tm", vec![1.into(), 0.into(), 0.into(), 1.into(), 50.into(), 688.into()]),
            op("Tj", vec![text("Magnesium")]),
            op("ET", vec![]),
        ];
        let frags = fragments_from_operations(&ops);
        assert_eq!(frags.len(), 3);
        assert_eq!((frags[0].x, frags[0].y), (50.0, 700.0));
        assert_eq!((frags[1].x, frags[1].y), (150.0, 700.0));
        assert_eq!(frags[1].text, "1500");
        assert_eq!((frags[2].x, frags[2].y), (50.0, 688.0));
        assert_eq!(frags[0].width, 35.0);
    }

    #[test]
    fn test_cm_scales_positions_and_size() {
        let ops = vec![
            op("q", vec![]),
            op("cm", vec![2.into(), 0.into(), 0.into(), 2.into(), 10.into(), 20.into()]),
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 6.into()]),
            op("Td", vec![5.into(), 5.into()]),
            op("Tj", vec![text("Zinc")]),
            op("ET", vec![]),
            op("Q", vec![]),
            op("BT", vec![]),
            op("Td", vec![5.into(), 5.into()]),
            op("Tj", vec![text("Iron")]),
            op("ET", vec![]),
        ];
        let frags = fragments_from_operations(&ops);
        assert_eq!((frags[0].x, frags[0].y, frags[0].size), (20.0, 30.0, 12.0));
        assert_eq!((frags[1].x, frags[1].y), (5.0, 5.0));
    }

    #[test]
    fn test_tj_array_splits_on_wide_shifts() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            op("TL", vec![14.into()]),
            op("Td", vec![0.into(), 500.into()]),
            op(
                "TJ",
                vec![Object::Array(vec![
                    text("Cal"),
                    Object::Integer(-20),
                    text("cium"),
                    Object::Integer(-300),
                    text("ppm"),
                    Object::Integer(-5000),
                    text("1500"),
                ])],
            ),
            op("'", vec![text("next")]),
            op("ET", vec![]),
        ];
        let frags = fragments_from_operations(&ops);
        let texts: Vec<&str> = frags.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["Calcium ppm", "1500", "next"]);
        assert_eq!(frags[2].y, 486.0);
        assert_eq!(frags[2].x, 0.0);
    }

    #[test]
    fn test_utf16_strings_decode() {
        assert_eq!(decode_string(&[0xFE, 0xFF, 0x00, 0x42, 0x00, 0xB5]), "Bµ");
        assert_eq!(decode_string(b"Cu"), "Cu");
    }

    #[test]
    fn test_aligned_runs_form_columns() {
        let frags = vec![
            frag(50.0, 700.0, "Element"),
            frag(150.0, 700.0, "Your Level"),
            frag(270.0, 700.0, "Acceptable Range"),
            frag(420.0, 700.0, "Unit"),
            frag(50.0, 686.0, "Calcium"),
            // right-aligned number starts further right than the header
            frag(165.0, 686.0, "1500"),
            frag(270.0, 686.0, "1200 - 1800"),
            frag(420.0, 686.0, "ppm"),
            frag(50.0, 672.0, "Boron"),
            frag(270.0, 672.0, "0.5 - 2"),
        ];
        let mut next = 0;
        let tables = grid_tables(1, frags, &mut next);
        assert_eq!(tables.len(), 1);
        let rows = &tables[0].rows;
        assert_eq!(cells(&rows[0]), vec!["Element", "Your Level", "Acceptable Range", "Unit"]);
        assert_eq!(cells(&rows[1]), vec!["Calcium", "1500", "1200 - 1800", "ppm"]);
        assert_eq!(cells(&rows[2]), vec!["Boron", "", "0.5 - 2", ""]);
    }

    #[test]
    fn test_vertical_gaps_split_tables() {
        let frags = vec![
            frag(50.0, 760.0, "Wheat"),
            frag(50.0, 748.0, "North Block"),
            frag(50.0, 700.0, "Element"),
            frag(150.0, 700.0, "Level"),
            frag(50.0, 688.0, "Calcium"),
            frag(150.0, 688.0, "1500"),
            frag(50.0, 600.0, "Page 1 of 2"),
        ];
        let mut next = 4;
        let tables = grid_tables(2, frags, &mut next);
        assert_eq!(tables.len(), 2);
        assert_eq!(next, 6);
        assert_eq!(tables[0].index, 4);
        assert_eq!(tables[0].page, 2);
        assert_eq!(cells(&tables[0].rows[1]), vec!["North Block"]);
        assert_eq!(cells(&tables[1].rows[1]), vec!["Calcium", "1500"]);
    }

    #[test]
    fn test_words_within_a_cell_are_joined() {
        let frags = vec![
            frag(50.0, 700.0, "Calcium"),
            frag(87.0, 700.0, "(Mehlich)"),
            frag(200.0, 700.0, "1500"),
            frag(50.0, 688.0, "Sodium"),
            frag(200.0, 688.0, "40"),
        ];
        let mut next = 0;
        let tables = grid_tables(1, frags, &mut next);
        assert_eq!(cells(&tables[0].rows[0]), vec!["Calcium (Mehlich)", "1500"]);
    }
}
