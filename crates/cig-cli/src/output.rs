//! Formatted output helpers for CLI commands.

/// Renders a left-aligned table: header row first, columns padded to
/// the widest cell, two spaces between columns.
#[must_use]
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut out = String::new();
    render_row(&mut out, headers.iter().copied(), &widths);
    for row in rows {
        out.push('\n');
        render_row(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn render_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let mut first = true;
    for (cell, width) in cells.zip(widths) {
        if !first {
            out.push_str("  ");
        }
        first = false;
        out.push_str(cell);
        for _ in cell.len()..*width {
            out.push(' ');
        }
    }
    // Trailing pad on the last column is noise.
    while out.ends_with(' ') {
        let _ = out.pop();
    }
}
