//! Styled terminal output.

use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table as TextTable};
use liteorm::{Record, Value};

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("  {} {}", "⚠".yellow().bold(), msg);
}

/// Render rows under the given column headers. Cells missing from a row are
/// left blank.
pub fn rows_table(columns: &[&str], rows: &[Record]) -> TextTable {
    let mut table = TextTable::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(columns.iter().map(|c| {
            Cell::new(c)
                .add_attribute(Attribute::Bold)
                .fg(Color::Cyan)
        }));

    for row in rows {
        table.add_row(columns.iter().map(|c| match row.get(c) {
            Some(Value::Null) => Cell::new("NULL").fg(Color::DarkGrey),
            Some(value) => Cell::new(cell_text(value)),
            None => Cell::new(""),
        }));
    }
    table
}

pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(n) => n.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
        Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}
