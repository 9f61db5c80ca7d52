use super::escape::escape_html;
use super::palette::cell_color;
use crate::grid::{split_lines, Cell, Row, ScopeGrid};
use std::fmt::Write;

/// Source/debug visibility. Changing these never requires rebuilding a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayFlags {
    pub show_source: bool,
    pub show_debug: bool,
}

impl Default for DisplayFlags {
    fn default() -> Self {
        Self {
            show_source: true,
            show_debug: false,
        }
    }
}

const CELL_STYLE: &str = "white-space: pre; vertical-align: top; min-width: 20px; \
     background-clip: border-box; padding: 0; border: none;";

fn cell_text(cell: &Cell) -> String {
    if cell.text.is_empty() {
        "&nbsp;".to_string()
    } else {
        escape_html(&cell.text)
    }
}

fn write_row(html: &mut String, source_line: &str, row: &Row, flags: DisplayFlags) {
    let source_display = if flags.show_source { "table-cell" } else { "none" };

    html.push_str("<tr>");
    let _ = write!(
        html,
        "<td class=\"code-col\" style=\"white-space: pre; border-right: 1px solid #ccc; \
         border-bottom: 1px solid #ccc; padding: 0; vertical-align: top; \
         background-color: #f5f5f5; display: {}; background-clip: border-box;\">\
         <div style=\"padding: 5px\">{}</div></td>",
        source_display,
        escape_html(source_line)
    );

    for cell in &row.cells {
        let _ = write!(
            html,
            "<td class=\"trace-col\" colspan=\"{}\" data-column=\"{}\" \
             style=\"{} background-color: {};\"><div style=\"padding: 5px\">{}</div></td>",
            cell.span,
            cell.column,
            CELL_STYLE,
            cell_color(row, cell),
            cell_text(cell)
        );
    }
    html.push_str("</tr>");
}

/// The aligned source/trace table.
pub fn render_table(grid: &ScopeGrid, source: &str, flags: DisplayFlags) -> String {
    let source_lines = split_lines(source);
    let mut html = String::from(
        "<table class=\"trace-table\" style=\"width:100%; border-collapse: collapse; \
         border: 1px solid #ccc;\">",
    );

    for (i, row) in grid.rows().iter().enumerate() {
        let source_line = source_lines.get(i).copied().unwrap_or("");
        write_row(&mut html, source_line, row, flags);
    }

    html.push_str("</table>");
    html
}

/// Collapsible copy of the untouched tracer output.
pub fn render_debug_panel(trace: &str, flags: DisplayFlags) -> String {
    let display = if flags.show_debug { "block" } else { "none" };
    format!(
        "<div id=\"debug-output\" style=\"display: {}; margin-top: 20px; padding: 10px; \
         background-color: #eee; border: 1px solid #999; white-space: pre-wrap; \
         font-family: monospace;\"><h3>Raw Trace Output:</h3>{}</div>",
        display,
        escape_html(trace)
    )
}

/// Interpreter label plus the two toggle checkboxes.
pub fn render_footer(interpreter: &str, flags: DisplayFlags) -> String {
    let debug_checked = if flags.show_debug { "checked" } else { "" };
    let source_checked = if flags.show_source { "checked" } else { "" };
    format!(
        "<div style=\"margin-top: 5px; padding: 5px 5px 0 5px; background-color: #f0f0f0; \
         border-top: 1px solid #ccc; font-size: 12px; white-space: normal;\">\
         <div style=\"margin-bottom: 10px;\"><strong>Python Path: {}</strong></div>\
         <div style=\"display: flex; gap: 10px; margin-bottom: 0;\">\
         <label style=\"cursor: pointer;\"><input type=\"checkbox\" id=\"cb-show-debug\" {} \
         style=\"vertical-align: middle;\"> Debug Mode</label>\
         <label style=\"cursor: pointer;\"><input type=\"checkbox\" id=\"cb-show-source\" {} \
         style=\"vertical-align: middle;\"> Show Source Code</label></div></div>",
        escape_html(interpreter),
        debug_checked,
        source_checked
    )
}
