//! ---
//! ss_section: "14-licensing-system"
//! ss_subsection: "module"
//! ss_type: "source"
//! ss_scope: "code"
//! ss_description: "Flat JSV object reader and writer for license records."
//! ss_version: "v0.0.0-prealpha"
//! ss_owner: "tbd"
//! ---
//! Issued keys carry their record as a JSV object (`{Key:value,...}`), so
//! this module only handles flat objects with scalar values. Nested values
//! are kept verbatim as raw text.

use crate::error::{LicenseError, Result};

const ESCAPE_CHARS: [char; 6] = ['"', ',', '{', '}', '[', ']'];

/// Render `fields` as a JSV object, quoting values where required.
pub(crate) fn write_object(fields: &[(&str, &str)]) -> String {
    let mut out = String::from("{");
    for (index, (key, value)) in fields.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(key);
        out.push(':');
        write_value(&mut out, value);
    }
    out.push('}');
    out
}

fn write_value(out: &mut String, value: &str) {
    let needs_quotes = value.is_empty()
        || value.trim() != value
        || value.contains(|ch: char| ESCAPE_CHARS.contains(&ch));
    if needs_quotes {
        out.push('"');
        out.push_str(&value.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(value);
    }
}

/// Parse a flat JSV object into ordered key/value pairs.
pub(crate) fn read_object(text: &str) -> Result<Vec<(String, String)>> {
    let body = text
        .trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| malformed("record must be wrapped in braces"))?;

    let mut fields = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        let colon = rest
            .find(':')
            .ok_or_else(|| malformed("field is missing ':' separator"))?;
        let key = unquote_key(&rest[..colon])?;
        let (value, remaining) = read_value(&rest[colon + 1..])?;
        fields.push((key, value));
        rest = match remaining.strip_prefix(',') {
            Some(next) if next.is_empty() => return Err(malformed("trailing ',' in record")),
            Some(next) => next,
            None if remaining.is_empty() => remaining,
            None => return Err(malformed("expected ',' between fields")),
        };
    }
    Ok(fields)
}

fn unquote_key(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let key = raw
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(raw);
    if key.is_empty() {
        return Err(malformed("empty field name"));
    }
    Ok(key.to_owned())
}

/// Returns the decoded value and whatever follows it.
fn read_value(input: &str) -> Result<(String, &str)> {
    if let Some(quoted) = input.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = quoted.char_indices().peekable();
        while let Some((idx, ch)) = chars.next() {
            if ch != '"' {
                value.push(ch);
                continue;
            }
            if matches!(chars.peek(), Some((_, '"'))) {
                chars.next();
                value.push('"');
                continue;
            }
            return Ok((value, &quoted[idx + 1..]));
        }
        return Err(malformed("unterminated quoted value"));
    }

    let mut depth = 0usize;
    for (idx, ch) in input.char_indices() {
        match ch {
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed("unbalanced brackets in value"))?;
            }
            ',' if depth == 0 => return Ok((input[..idx].to_owned(), &input[idx..])),
            _ => {}
        }
    }
    if depth != 0 {
        return Err(malformed("unbalanced brackets in value"));
    }
    Ok((input.to_owned(), ""))
}

fn malformed(detail: &str) -> LicenseError {
    LicenseError::InvalidFormat(format!("malformed license record: {detail}"))
}
