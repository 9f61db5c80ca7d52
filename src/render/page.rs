use super::escape::{escape_html, escape_script_data};
use super::table::{render_debug_panel, render_footer, render_table, DisplayFlags};
use crate::attribution::VariablePlacement;
use crate::grid::ScopeGrid;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Pixel height of one rendered row, used for scroll sync.
const ROW_HEIGHT_PX: usize = 19;

const LANDING: &str = "<br><p style=\"font-size:14px\">Start typing or make a change and \
    your code will be traced.</p>\
    <p style=\"font-size:14px\"><b style=\"color:red\">WARNING:</b> code is run WHILE YOU TYPE. \
    Don't try deleting files or folders!</p>\
    <p>Running on every edit can be turned off or delayed in the settings.</p>";

/// What the output slot currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
    Landing,
    Trace {
        grid: ScopeGrid,
        source: String,
        trace: String,
        interpreter: String,
    },
    /// The tracer could not be started at all.
    Failure { message: String, interpreter: String },
    InstallPrompt { message: String },
}

/// A panel plus the page-level extras that ride along with it.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelState {
    pub panel: Panel,
    pub scroll_line: usize,
    pub variables: Option<VariablePlacement>,
}

impl PanelState {
    pub fn new(panel: Panel) -> Self {
        Self {
            panel,
            scroll_line: 0,
            variables: None,
        }
    }
}

/// Fresh anti-caching token; doubles as the script nonce.
pub fn new_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn toggle_script(token: &str) -> String {
    format!(
        r#"<script nonce="{token}">
(function() {{
    const host = typeof acquireVsCodeApi === "function" ? acquireVsCodeApi() : window.parent;
    const post = (message) => {{ if (host && host.postMessage) host.postMessage(message, "*"); }};
    const cbSource = document.getElementById("cb-show-source");
    const cbDebug = document.getElementById("cb-show-debug");
    if (cbSource) {{
        cbSource.addEventListener("change", (e) => {{
            const checked = e.target.checked;
            document.querySelectorAll(".code-col").forEach(el => el.style.display = checked ? "table-cell" : "none");
            post({{ command: "toggleSource", value: checked }});
        }});
    }}
    if (cbDebug) {{
        cbDebug.addEventListener("change", (e) => {{
            const checked = e.target.checked;
            const debugDiv = document.getElementById("debug-output");
            if (debugDiv) debugDiv.style.display = checked ? "block" : "none";
            post({{ command: "toggleDebug", value: checked }});
        }});
    }}
}})();
</script>"#
    )
}

fn scroll_script(token: &str, line: usize) -> String {
    format!(
        r#"<script nonce="{token}">
(function() {{
    const scroll = (line) => window.scrollTo(0, {ROW_HEIGHT_PX} * line);
    window.addEventListener("message", event => {{
        if (event.data && typeof event.data.line === "number") scroll(event.data.line);
    }});
    if (document.readyState === "loading") {{
        window.addEventListener("DOMContentLoaded", () => scroll({line}), {{ once: true }});
    }} else {{
        scroll({line});
    }}
}})();
</script>"#
    )
}

fn install_prompt(message: &str, token: &str) -> String {
    format!(
        r#"<div class="install-missing"><p>{}</p>
<button id="install-tracer" style="margin-top:8px;padding:6px 12px;">Install tracer</button>
<script nonce="{token}">
(function() {{
    const host = typeof acquireVsCodeApi === "function" ? acquireVsCodeApi() : window.parent;
    const btn = document.getElementById("install-tracer");
    if (btn && host && host.postMessage) {{
        btn.addEventListener("click", () => host.postMessage({{ command: "install" }}, "*"));
    }}
}})();
</script></div>"#,
        escape_html(message)
    )
}

fn variables_block(placement: &VariablePlacement, token: &str) -> String {
    let json = placement.to_json();
    let plain = serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string());
    let inline = escape_script_data(json.to_string());
    format!(
        "<pre id=\"results-plain\" class=\"vars-plain\">{}</pre>\
         <script nonce=\"{}\">window.userVars = {};</script>",
        escape_html(plain),
        token,
        inline
    )
}

/// Body markup for a panel. Pure: same inputs, same bytes.
pub fn render_body(state: &PanelState, flags: DisplayFlags, token: &str) -> String {
    let mut body = match &state.panel {
        Panel::Landing => LANDING.to_string(),
        Panel::Trace {
            grid,
            source,
            trace,
            interpreter,
        } => {
            let mut html = render_table(grid, source, flags);
            html.push_str(&render_debug_panel(trace, flags));
            html.push_str(&render_footer(interpreter, flags));
            html.push_str(&toggle_script(token));
            html
        }
        Panel::Failure {
            message,
            interpreter,
        } => {
            let mut html = format!(
                "<div id=\"error\" class=\"infrastructure-error\" style=\"white-space: pre-wrap;\">{}</div>",
                escape_html(message)
            );
            html.push_str(&render_footer(interpreter, flags));
            html.push_str(&toggle_script(token));
            html
        }
        Panel::InstallPrompt { message } => install_prompt(message, token),
    };

    if let Some(placement) = &state.variables {
        body.push_str(&variables_block(placement, token));
    }
    body.push_str(&scroll_script(token, state.scroll_line));
    body
}

/// Full document around a body fragment.
pub fn render_page(body: &str, token: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="Content-Security-Policy" content="default-src 'none'; img-src https:; script-src 'nonce-{token}'; style-src 'unsafe-inline';">
<title>live trace</title>
</head>
<body>
{body}
<div id="{token}" style="display:none"></div>
</body>
</html>"#
    )
}

/// Holds the two display flags and the rotating token. Rendering reads the
/// grid; it never rebuilds or mutates it.
#[derive(Debug, Clone)]
pub struct GridRenderer {
    flags: DisplayFlags,
    token: String,
}

impl GridRenderer {
    pub fn new(flags: DisplayFlags) -> Self {
        Self {
            flags,
            token: new_token(),
        }
    }

    pub fn flags(&self) -> DisplayFlags {
        self.flags
    }

    pub fn set_show_source(&mut self, show: bool) {
        self.flags.show_source = show;
    }

    pub fn set_show_debug(&mut self, show: bool) {
        self.flags.show_debug = show;
    }

    /// Token used by the most recent render.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Render a full page with a fresh token.
    pub fn render(&mut self, state: &PanelState) -> String {
        let token = new_token();
        let html = self.render_with_token(state, &token);
        self.token = token;
        html
    }

    pub fn render_with_token(&self, state: &PanelState, token: &str) -> String {
        render_page(&render_body(state, self.flags, token), token)
    }
}
