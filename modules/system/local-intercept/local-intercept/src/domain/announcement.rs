//! Provider announcement files.
//!
//! A provider running on this machine drops a small properties file into the
//! announcement directory. Each entry maps `interface[-group]$port` to an
//! opaque provider label.

use std::collections::BTreeMap;
use std::time::SystemTime;

/// Separator between the service part and the port in an announcement key.
pub const PORT_SEPARATOR: char = '$';

/// One parsed announcement file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// File name inside the announcement directory.
    pub file: String,
    /// Modification time observed when the file was parsed.
    pub modified: SystemTime,
    /// Parsed `key -> label` entries.
    pub entries: BTreeMap<String, String>,
}

impl Announcement {
    #[must_use]
    pub fn parse(file: impl Into<String>, modified: SystemTime, text: &str) -> Self {
        Self {
            file: file.into(),
            modified,
            entries: parse_properties(text),
        }
    }

    /// Whether this announcement covers `service_key`.
    ///
    /// Labels are compared first, as providers historically did. Keys match
    /// when they equal the service key, with or without the `$port` suffix.
    #[must_use]
    pub fn matches(&self, service_key: &str) -> bool {
        self.entries.values().any(|label| label == service_key)
            || self.entries.keys().any(|key| {
                key == service_key
                    || key
                        .rsplit_once(PORT_SEPARATOR)
                        .is_some_and(|(service, _port)| service == service_key)
            })
    }
}

fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

/// Parse Java-properties style `key=value` text.
///
/// Later duplicates win. Malformed escapes are kept verbatim.
#[must_use]
pub fn parse_properties(text: &str) -> BTreeMap<String, String> {
    logical_lines(text)
        .iter()
        .map(|line| {
            let (key, value) = split_entry(line);
            (unescape(key), unescape(value))
        })
        .collect()
}

fn ends_with_odd_backslashes(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut continuing = false;

    for raw in text.lines() {
        let line = raw.trim_start_matches(is_ws);
        if !continuing && (line.is_empty() || line.starts_with(['#', '!'])) {
            continue;
        }
        if ends_with_odd_backslashes(line) {
            current.push_str(&line[..line.len() - 1]);
            continuing = true;
        } else {
            current.push_str(line);
            lines.push(std::mem::take(&mut current));
            continuing = false;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == '=' || c == ':' || is_ws(c) {
            key_end = i;
            break;
        }
    }

    let mut rest = line[key_end..].trim_start_matches(is_ws);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches(is_ws);
    }
    (&line[..key_end], rest)
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
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
