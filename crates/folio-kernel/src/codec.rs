//! `.tid` file format.
//!
//! A self-describing entry file is a block of `name: value` header lines, a
//! blank line, then the body:
//!
//! ```text
//! title: HelloThere
//! tags: greeting
//! type: text/vnd.tiddlywiki
//!
//! Hello!
//! ```
//!
//! Sidecar metadata files use the same header block with no body.

use folio_types::Entry;
use folio_types::entry::{TEXT_FIELD, TITLE_FIELD};

/// Render an entry's fields as header lines, `title` first.
///
/// Fails if a field name or value cannot be represented on a single header line.
pub fn render_fields(entry: &Entry) -> Result<String, String> {
    let mut out = String::new();
    push_field(&mut out, TITLE_FIELD, &entry.title)?;
    for (name, value) in &entry.fields {
        push_field(&mut out, name, value)?;
    }
    Ok(out)
}

/// Render a complete `.tid` file.
pub fn render_tid(entry: &Entry) -> Result<String, String> {
    let mut out = render_fields(entry)?;
    out.push('\n');
    out.push_str(&entry.text);
    Ok(out)
}

fn push_field(out: &mut String, name: &str, value: &str) -> Result<(), String> {
    if name.is_empty() || name.contains(':') || name.chars().any(char::is_whitespace) {
        return Err(format!("field name {name:?} cannot be stored in a header line"));
    }
    if value.contains('\n') || value.contains('\r') {
        return Err(format!("field {name} spans multiple lines"));
    }
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
    Ok(())
}

/// Parse a header block into an entry. Lines after the first blank line are
/// ignored.
///
/// `fallback_title` is used when the block carries no `title` field.
pub fn parse_fields(content: &str, fallback_title: &str) -> Result<Entry, String> {
    let (entry, _) = parse_header(content, fallback_title)?;
    Ok(entry)
}

/// Parse a complete `.tid` file.
pub fn parse_tid(content: &str, fallback_title: &str) -> Result<Entry, String> {
    let (mut entry, body) = parse_header(content, fallback_title)?;
    entry.text = body.to_string();
    Ok(entry)
}

fn parse_header<'a>(content: &'a str, fallback_title: &str) -> Result<(Entry, &'a str), String> {
    let mut entry = Entry::new(fallback_title);
    let mut rest = content;

    while !rest.is_empty() {
        let (line, next) = match rest.find('\n') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        rest = next;

        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            break;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| format!("malformed header line {line:?}"))?;
        let name = name.trim();
        if name.is_empty() || name == TEXT_FIELD {
            return Err(format!("malformed header line {line:?}"));
        }
        entry.set_field(name, value.trim());
    }

    if entry.title.is_empty() {
        return Err("entry has no title".to_string());
    }
    Ok((entry, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_tid_layout() {
        let entry = Entry::new("HelloThere")
            .with_type("text/vnd.tiddlywiki")
            .with_field("tags", "greeting")
            .with_text("Hello!");

        assert_eq!(
            render_tid(&entry).unwrap(),
            "title: HelloThere\ntags: greeting\ntype: text/vnd.tiddlywiki\n\nHello!"
        );
    }

    #[test]
    fn test_parse_tid() {
        let entry = parse_tid("title: A\nmodified: 20240101\n\nbody\nline two\n", "ignored").unwrap();
        assert_eq!(entry.title, "A");
        assert_eq!(entry.field("modified"), Some("20240101"));
        assert_eq!(entry.text, "body\nline two\n");
    }

    #[test]
    fn test_parse_crlf() {
        let entry = parse_tid("title: A\r\ntags: x\r\n\r\nbody", "ignored").unwrap();
        assert_eq!(entry.title, "A");
        assert_eq!(entry.field("tags"), Some("x"));
        assert_eq!(entry.text, "body");
    }

    #[test]
    fn test_value_keeps_inner_colons() {
        let entry = parse_fields("title: A\nurl: https://example.com:8080/x\n", "ignored").unwrap();
        assert_eq!(entry.field("url"), Some("https://example.com:8080/x"));
    }

    #[test]
    fn test_fallback_title() {
        let entry = parse_tid("tags: x\n\nbody", "FromFileName").unwrap();
        assert_eq!(entry.title, "FromFileName");
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(parse_tid("title: A\nthis is not a header\n\nbody", "x").is_err());
        assert!(parse_tid(": value\n\n", "x").is_err());
    }

    #[test]
    fn test_missing_title_rejected() {
        assert!(parse_tid("tags: x\n\nbody", "").is_err());
    }

    #[test]
    fn test_multiline_value_not_renderable() {
        let entry = Entry::new("A").with_field("caption", "two\nlines");
        assert!(render_fields(&entry).is_err());
    }

    #[test]
    fn test_render_then_parse_preserves_entry() {
        let entry = Entry::new("Привет мир")
            .with_type("text/vnd.tiddlywiki")
            .with_field("tags", "[[a b]] c")
            .with_text("line one\n\nline three");
        let parsed = parse_tid(&render_tid(&entry).unwrap(), "x").unwrap();
        assert_eq!(parsed, entry);
    }
}
