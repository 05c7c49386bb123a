//! Low-level text scanning primitives used by every section parser.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Byte range of the shortest balanced region starting at the first `open`.
///
/// Only the bracket family of `open` is tracked (`[`/`]` or `{`/`}`); any
/// other character, including the other family, is ignored. Returns `None`
/// when `open` never occurs or its region never closes.
pub fn balanced_span(text: &str, open: char) -> Option<Range<usize>> {
    let close = match open {
        '[' => ']',
        '{' => '}',
        _ => return None,
    };
    let start = text.find(open)?;
    let mut depth = 0usize;
    for (offset, c) in text[start..].char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(start..start + offset + c.len_utf8());
            }
        }
    }
    None
}

/// The balanced region found by [`balanced_span`], or `""`.
pub fn find_balanced(text: &str, open: char) -> &str {
    balanced_span(text, open)
        .map(|range| &text[range])
        .unwrap_or_default()
}

/// Text between `start_marker` and `end_marker`, trimmed.
///
/// - start marker absent -> `""` (the section is missing)
/// - end marker empty or absent -> everything after the start marker
pub fn slice_section<'a>(text: &'a str, start_marker: &str, end_marker: &str) -> &'a str {
    if end_marker.is_empty() {
        slice_between_any(text, &[start_marker], &[])
    } else {
        slice_between_any(text, &[start_marker], &[end_marker])
    }
}

/// Like [`slice_section`], with alternatives on both sides.
///
/// The first start marker (in list order) present in `text` opens the
/// section; it closes at the earliest following occurrence of any end marker.
pub fn slice_between_any<'a>(text: &'a str, start_markers: &[&str], end_markers: &[&str]) -> &'a str {
    let Some(begin) = start_markers
        .iter()
        .find_map(|marker| text.find(marker).map(|at| at + marker.len()))
    else {
        return "";
    };
    let rest = &text[begin..];
    let end = end_markers
        .iter()
        .filter(|marker| !marker.is_empty())
        .filter_map(|marker| rest.find(marker))
        .min()
        .unwrap_or(rest.len());
    rest[..end].trim()
}

/// Integer value of a JSON number or numeric string.
///
/// Integral floats (`30.0`, `"30.0"`) are accepted; anything else that does
/// not convert cleanly yields `None`.
pub fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => parse_int(s),
        _ => None,
    }
}

pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(integral))
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

/// Finite float value of a JSON number or numeric string.
pub fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float(s),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

pub fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Label words the model drops or rephrases ("Daily Mood Score" vs "Mood").
const STEM_NOISE_WORDS: &[&str] = &["daily", "level", "score", "scores"];

/// One way of locating the number that belongs to a label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreRule {
    /// `Daily Mood Score: 7`
    ExactLabel,
    /// `Daily Mood Score 7`
    LabelWithoutColon,
    /// `Mood: 7/10`, `Mood (Score: [7]/10)`
    LabelStem,
}

/// Rules tried in order by [`extract_labeled_score`]; first match wins.
pub const SCORE_RULES: [ScoreRule; 3] = [
    ScoreRule::ExactLabel,
    ScoreRule::LabelWithoutColon,
    ScoreRule::LabelStem,
];

impl ScoreRule {
    fn pattern(self, label: &str) -> Option<String> {
        const NUMBER: &str = r"(\d+(?:\.\d+)?)";
        match self {
            ScoreRule::ExactLabel => Some(format!(r"{}\s*{NUMBER}", regex::escape(label))),
            ScoreRule::LabelWithoutColon => {
                let bare = label.trim_end().trim_end_matches(':');
                (bare != label.trim_end())
                    .then(|| format!(r"{}\s*{NUMBER}", regex::escape(bare)))
            }
            ScoreRule::LabelStem => {
                let stem = label_stem(label);
                // the number must not be a "/10" denominator
                (!stem.is_empty()).then(|| {
                    format!(
                        r"(?i){}(?:[^\d]*[^\d/])?{NUMBER}",
                        regex::escape(&stem)
                    )
                })
            }
        }
    }

    /// Number matched by this rule alone.
    pub fn apply(self, section: &str, label: &str) -> Option<f64> {
        let pattern = self.pattern(label)?;
        let re = Regex::new(&pattern).ok()?;
        re.captures(section)
            .and_then(|caps| caps.get(1))
            .and_then(|m| parse_float(m.as_str()))
    }
}

fn label_stem(label: &str) -> String {
    label
        .split(|c: char| c.is_whitespace() || c == ':')
        .filter(|w| !w.is_empty())
        .filter(|w| !STEM_NOISE_WORDS.contains(&w.to_ascii_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Number following `label` in `section`, or `None` when absent.
///
/// `None` is distinct from an explicit zero so callers can apply their own
/// default or derivation.
pub fn extract_labeled_score(section: &str, label: &str) -> Option<f64> {
    SCORE_RULES
        .iter()
        .find_map(|rule| rule.apply(section, label))
}

/// Strip `//` comments outside string literals and trailing commas.
///
/// Used for a single retry when an embedded JSON payload fails to decode.
pub fn repair_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                while chars.peek().is_some_and(|&next| next != '\n') {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }
    trailing_comma_regex().replace_all(&out, "$1").into_owned()
}

fn trailing_comma_regex() -> &'static Regex {
    static TRAILING_COMMA_RE: OnceLock<Regex> = OnceLock::new();
    TRAILING_COMMA_RE
        .get_or_init(|| Regex::new(r",\s*([\]}])").expect("trailing comma regex must compile"))
}

/// Decode `text` as JSON, retrying once after [`repair_json`].
///
/// The error of the first attempt is returned when both fail.
pub fn decode_lenient(text: &str) -> Result<Value, serde_json::Error> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(first) => serde_json::from_str(&repair_json(text)).map_err(|_| first),
    }
}

/// JSON objects embedded in free text.
///
/// A balanced array of objects wins; otherwise every successive balanced
/// `{...}` region that decodes to an object is collected.
pub fn json_objects(text: &str) -> Vec<Map<String, Value>> {
    let array = find_balanced(text, '[');
    if let Ok(Value::Array(items)) = decode_lenient(array) {
        let objects: Vec<_> = items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        if !objects.is_empty() {
            return objects;
        }
    }

    let mut objects = Vec::new();
    let mut rest = text;
    while let Some(range) = balanced_span(rest, '{') {
        if let Ok(Value::Object(map)) = decode_lenient(&rest[range.clone()]) {
            objects.push(map);
        }
        rest = &rest[range.end..];
    }
    objects
}

/// Display text of a scalar JSON value; `None` for null and containers.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Drop a leading list bullet and surrounding markdown emphasis.
pub fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
        .unwrap_or(line);
    line.trim().trim_matches('*').trim()
}
