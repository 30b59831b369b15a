//! Descriptor codecs for both on-disk layouts.
//!
//! # Formats
//!
//! Layout 1 (`spark.json`): the descriptor record as a JSON object, with the
//! registry `id` stripped.
//!
//! Layout 2 (`library.properties`): one `key: value` pair per line.
//!
//! ```text
//! name: neopixel
//! version: 1.0.0
//! license: MIT
//! author: Ada
//! sentence: LED driver
//! ```

use std::collections::BTreeMap;

use crate::library::LibraryMetadata;

/// Legacy (layout 1) descriptor file name
pub const SPARK_JSON: &str = "spark.json";

/// Current (layout 2) descriptor file name
pub const LIBRARY_PROPERTIES: &str = "library.properties";

/// Serialize a descriptor in layout 1 form.
pub fn build_v1_descriptor(metadata: &LibraryMetadata) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&metadata.without_id())
}

/// Parse a layout 1 descriptor. The name is not checked here.
pub fn parse_v1_descriptor(content: &str) -> serde_json::Result<LibraryMetadata> {
    serde_json::from_str(content)
}

/// Serialize a descriptor in layout 2 form.
///
/// Fields are emitted in the order name, version, license, author, sentence;
/// fields without a value produce no line. There is no trailing newline.
pub fn build_v2_descriptor(metadata: &LibraryMetadata) -> String {
    let name = Some(metadata.name.as_str()).filter(|n| !n.is_empty());
    let fields = [
        ("name", name),
        ("version", metadata.version.as_deref()),
        ("license", metadata.license.as_deref()),
        ("author", metadata.author.as_deref()),
        ("sentence", metadata.description.as_deref()),
    ];

    fields
        .iter()
        .filter_map(|(key, value)| value.map(|v| format!("{}: {}", key, escape_value(v))))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a layout 2 descriptor. The name is not checked here.
///
/// `sentence` takes precedence over a literal `description` key. Keys that
/// are not part of the record land in `extra`.
pub fn parse_v2_descriptor(content: &str) -> LibraryMetadata {
    let mut properties = parse_properties(content);
    let mut metadata = LibraryMetadata::new(properties.remove("name").unwrap_or_default());

    metadata.version = properties.remove("version");
    metadata.license = properties.remove("license");
    metadata.author = properties.remove("author");
    let description = properties.remove("description");
    metadata.description = properties.remove("sentence").or(description);

    metadata.extra = properties
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect();

    metadata
}

/// Parse a properties-style document into key/value pairs.
///
/// Follows the `.properties` grammar:
/// - blank lines and lines whose first non-blank character is `#` or `!`
///   are ignored
/// - a line ending in an odd number of `\` continues on the next line,
///   whose leading whitespace is dropped
/// - the key ends at the first unescaped `=`, `:` or whitespace; whitespace
///   around the separator is skipped, and whitespace alone also separates
/// - `\t`, `\n`, `\r`, `\f`, `\uXXXX` are decoded and any other escaped
///   character stands for itself
///
/// Trailing whitespace of a value is trimmed. Later duplicates win.
pub fn parse_properties(content: &str) -> BTreeMap<String, String> {
    logical_lines(content)
        .iter()
        .map(|line| {
            let (key, value) = split_key_value(line);
            (unescape(key), unescape(value.trim_end()))
        })
        .collect()
}

/// Join continued lines and drop comments and blank lines
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for raw in content.lines() {
        let trimmed = raw.trim_start();
        let mut line = match pending.take() {
            Some(mut continued) => {
                continued.push_str(trimmed);
                continued
            }
            None if trimmed.is_empty() || trimmed.starts_with(['#', '!']) => continue,
            None => trimmed.to_string(),
        };

        if continues(&line) {
            line.pop();
            pending = Some(line);
        } else {
            lines.push(line);
        }
    }

    lines.extend(pending);
    lines
}

fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;

    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..idx], line[idx + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[idx..].trim_start();
                let value = rest.strip_prefix(['=', ':']).unwrap_or(rest);
                return (&line[..idx], value.trim_start());
            }
            _ => {}
        }
    }

    (line, "")
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                let decoded = (hex.len() == 4 && hex.chars().all(|h| h.is_ascii_hexdigit()))
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(decoded) => {
                        out.push(decoded);
                        chars.nth(3);
                    }
                    None => out.push('u'),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}

/// Escape a value so [`parse_properties`] reads it back unchanged
fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (idx, c) in value.char_indices() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            ' ' if idx == 0 => out.push_str("\\ "),
            c => out.push(c),
        }
    }
    out
}
