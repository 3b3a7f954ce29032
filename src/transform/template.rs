//! `$token$` expansion for `.pp` source files.

use std::collections::BTreeMap;

/// Distinct token names in `text`, lowercased, in first-seen order.
pub fn token_names(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    for (_, name) in tokens(text) {
        let name = name.to_ascii_lowercase();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Replace every `$token$` whose lowercased name is in `values`; unknown
/// tokens are left untouched.
pub fn expand(text: &str, values: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    for (start, name) in tokens(text) {
        if let Some(value) = values.get(&name.to_ascii_lowercase()) {
            out.push_str(&text[copied..start]);
            out.push_str(value);
            copied = start + name.len() + 2;
        }
    }
    out.push_str(&text[copied..]);
    out
}

/// `(byte offset of the opening '$', token name)` for each well-formed token.
fn tokens(text: &str) -> Vec<(usize, &str)> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        let name_start = i + 1;
        let name_len = bytes[name_start..]
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
            .count();
        let close = name_start + name_len;
        if name_len > 0 && bytes.get(close) == Some(&b'$') {
            found.push((i, &text[name_start..close]));
            i = close + 1;
        } else {
            // The '$' may open the next token.
            i = name_start.max(close);
        }
    }
    found
}
