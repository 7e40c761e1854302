//! Input sanitization applied to every inbound request before verification.
//!
//! String values lose `<script>`/`<style>` blocks, all other tags, and
//! control characters other than line breaks and tabs. A `<` that does not
//! open a tag is escaped as `&lt;`. Keys carrying [`DOTTED_KEY_MARKER`] get
//! their dots back.

use formgate_sdk::params::{ParamValue, Params};

/// Stand-in for `.` in parameter keys. Some front-ends rewrite dots in
/// field names before submitting; formgate restores them.
pub const DOTTED_KEY_MARKER: &str = "_dot_";

const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

/// Sanitize a whole parameter map: keys and (recursively) values.
pub fn sanitize_params(params: Params) -> Params {
    params
        .into_iter()
        .map(|(key, value)| (restore_key(&key), sanitize_value(value)))
        .collect()
}

pub fn sanitize_value(value: ParamValue) -> ParamValue {
    match value {
        ParamValue::Text(s) => ParamValue::Text(sanitize_text(&s)),
        ParamValue::List(items) => {
            ParamValue::List(items.into_iter().map(sanitize_value).collect())
        }
        ParamValue::Map(map) => ParamValue::Map(sanitize_params(map)),
    }
}

pub fn restore_key(key: &str) -> String {
    key.replace(DOTTED_KEY_MARKER, ".")
}

pub fn sanitize_text(input: &str) -> String {
    let without_blocks = strip_raw_text_elements(input);
    let without_tags = strip_tags(&without_blocks);
    without_tags
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Remove `<script>…</script>` and `<style>…</style>` including content.
/// An unterminated block swallows the rest of the input.
fn strip_raw_text_elements(input: &str) -> String {
    let mut out = input.to_owned();
    for element in RAW_TEXT_ELEMENTS {
        let open = format!("<{element}");
        let close = format!("</{element}");
        loop {
            // ASCII lowercasing keeps byte offsets valid for `out`.
            let lower = out.to_ascii_lowercase();
            let Some(start) = lower.find(&open) else {
                break;
            };
            let end = match lower[start..].find(&close) {
                Some(rel) => {
                    let close_start = start + rel;
                    lower[close_start..]
                        .find('>')
                        .map_or(out.len(), |gt| close_start + gt + 1)
                }
                None => out.len(),
            };
            out.replace_range(start..end, "");
        }
    }
    out
}

fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '<' {
            out.push(c);
            continue;
        }
        let opens_tag = chars
            .peek()
            .is_some_and(|n| n.is_ascii_alphabetic() || matches!(n, '/' | '!' | '?'));
        if !opens_tag {
            out.push_str("&lt;");
            continue;
        }
        for inner in chars.by_ref() {
            if inner == '>' {
                break;
            }
        }
    }
    out
}
