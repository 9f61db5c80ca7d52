use once_cell::sync::Lazy;
use regex::Regex;

/// `name`, optional `[subscript]`, then an assignment operator.
/// Longer operators come first so `//=` is not read as `/=`.
static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*(?:\[[^\]]*\]\s*)?(?:\+=|-=|\*\*=|\*=|//=|/=|%=|=)")
        .expect("assignment pattern")
});

/// `for a, b, c` loop targets.
static FOR_TARGETS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bfor\s+([A-Za-z_][A-Za-z0-9_]*(?:\s*,\s*[A-Za-z_][A-Za-z0-9_]*)*)\b")
        .expect("for-target pattern")
});

/// Names bound by assignment-like statements on one line, in match order.
///
/// A match directly followed by another `=` is a comparison (`x == 1`) and is
/// skipped; scanning resumes one character after where it started.
pub fn assigned_names(line: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut pos = 0usize;

    while pos <= line.len() {
        let Some(caps) = ASSIGNMENT.captures_at(line, pos) else {
            break;
        };
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };

        if line[whole.end()..].starts_with('=') {
            let step = line[whole.start()..]
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(1);
            pos = whole.start() + step;
        } else {
            names.push(name.as_str());
            pos = whole.end();
        }
    }

    names
}

/// Names bound as `for` loop targets on one line.
pub fn loop_targets(line: &str) -> Vec<&str> {
    FOR_TARGETS
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .flat_map(|group| group.as_str().split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}
