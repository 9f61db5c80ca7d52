mod escape;
mod page;
mod palette;
mod table;

pub use escape::{escape_html, escape_script_data};
pub use page::{new_token, render_body, render_page, GridRenderer, Panel, PanelState};
pub use palette::{cell_color, column_color, NEUTRAL, PALETTE};
pub use table::{render_debug_panel, render_footer, render_table, DisplayFlags};
