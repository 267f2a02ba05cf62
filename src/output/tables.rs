use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

/// Share of failing runs a pattern covers: the higher, the more urgent.
pub fn color_coded_failure_share_cell(fraction: f64) -> Cell {
    let text = format!("{:.1}%", fraction * 100.0);
    if fraction >= 0.5 {
        Cell::new(text).fg(TableColor::Red)
    } else if fraction >= 0.2 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Green)
    }
}

/// Share of successful runs showing the same pattern: the lower, the more
/// discriminative the pattern.
pub fn color_coded_baseline_cell(fraction: Option<f64>) -> Cell {
    let Some(fraction) = fraction else {
        return Cell::new("absent").fg(TableColor::Green);
    };
    let text = format!("{:.1}%", fraction * 100.0);
    if fraction >= 0.25 {
        Cell::new(text).fg(TableColor::Red)
    } else if fraction >= 0.1 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Green)
    }
}

pub fn count_cell(count: usize) -> Cell {
    if count == 0 {
        Cell::new(count).fg(TableColor::DarkGrey)
    } else {
        Cell::new(count)
    }
}
