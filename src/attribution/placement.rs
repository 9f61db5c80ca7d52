use super::map::LineAttributionMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

static LINE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)line\s+(\d+)").expect("line key pattern"));

/// Variable dump entries grouped by the source line they belong to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariablePlacement {
    pub lines: BTreeMap<usize, Vec<(String, Value)>>,
    /// Index of the last source line (0 for an empty document).
    pub last_line: usize,
}

impl VariablePlacement {
    pub fn entries_at(&self, line: usize) -> &[(String, Value)] {
        self.lines.get(&line).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `{"<line>": [{label: value}, ...], ..., "nlines": last_line}`
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (line, entries) in &self.lines {
            let list = entries
                .iter()
                .map(|(label, value)| {
                    let mut entry = Map::new();
                    entry.insert(label.clone(), value.clone());
                    Value::Object(entry)
                })
                .collect();
            out.insert(line.to_string(), Value::Array(list));
        }
        out.insert("nlines".to_string(), Value::from(self.last_line));
        Value::Object(out)
    }
}

/// Assign each dumped variable to a line.
///
/// Keys carrying an explicit `line N` (1-based) go to line `N - 1`; the rest
/// are placed with the attribution map and its fallback line.
pub fn place_variables(text: &str, vars: &Map<String, Value>) -> VariablePlacement {
    let map = LineAttributionMap::build(text);
    let mut placement = VariablePlacement {
        lines: BTreeMap::new(),
        last_line: map.fallback_line(),
    };

    for (key, value) in vars {
        let (line, label) = match LINE_KEY.captures(key) {
            Some(caps) => {
                let line = caps
                    .get(1)
                    .and_then(|m| m.as_str().parse::<usize>().ok())
                    .unwrap_or(0)
                    .saturating_sub(1);
                let stripped = LINE_KEY.replace(key, "");
                let stripped = stripped.trim();
                let label = if stripped.is_empty() {
                    key.clone()
                } else {
                    stripped.to_string()
                };
                (line, label)
            }
            None => (map.line_for(key), key.clone()),
        };

        placement
            .lines
            .entry(line)
            .or_default()
            .push((label, value.clone()));
    }

    placement
}
