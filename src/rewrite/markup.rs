// src/rewrite/markup.rs
//! Textual helpers for working on start tags without a parse tree
//!
//! Pattern-mode rules operate on one start tag at a time: the tag is split
//! into attribute spans, edited, and spliced back so that everything the rule
//! does not touch keeps its original bytes.

use quick_xml::escape::{partial_escape, unescape};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::ops::Range;
use std::sync::LazyLock;

/// Start or empty-element tag whose attributes are all well quoted
///
/// Quoted values may contain `>`, which appears in legacy domains
/// (`('qty', '>', 0)`).
pub(crate) static START_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<([A-Za-z_][\w:.-]*)((?:\s+[^\s=/>"'<]+(?:\s*=\s*(?:"[^"]*"|'[^']*'))?)*)\s*(/?)>"#,
    )
    .unwrap()
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+([^\s=/>"'<]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// One attribute inside a start tag
#[derive(Debug, Clone)]
pub(crate) struct AttrSpan<'a> {
    pub name: &'a str,
    /// Raw (still escaped) value
    pub raw: &'a str,
    /// Byte range within the tag text, including the leading whitespace
    pub span: Range<usize>,
}

impl AttrSpan<'_> {
    /// Value with XML entities resolved
    pub fn value(&self) -> Cow<'_, str> {
        unescape_attr(self.raw)
    }
}

/// A start tag split into its parts
#[derive(Debug, Clone)]
pub(crate) struct StartTag<'a> {
    pub text: &'a str,
    pub name: &'a str,
    pub attrs: Vec<AttrSpan<'a>>,
    pub self_closing: bool,
}

impl<'a> StartTag<'a> {
    pub fn from_captures(caps: &Captures<'a>) -> Option<Self> {
        let whole = caps.get(0)?;
        let name = caps.get(1)?.as_str();
        let attrs_offset = caps.get(2).map(|m| m.start() - whole.start()).unwrap_or(0);
        let attrs_text = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        let attrs = ATTRIBUTE
            .captures_iter(attrs_text)
            .filter_map(|c| {
                let m = c.get(0)?;
                let raw = c.get(2).or_else(|| c.get(3))?.as_str();
                Some(AttrSpan {
                    name: c.get(1)?.as_str(),
                    raw,
                    span: (attrs_offset + m.start())..(attrs_offset + m.end()),
                })
            })
            .collect();

        Some(Self {
            text: whole.as_str(),
            name,
            attrs,
            self_closing: caps.get(3).is_some_and(|m| !m.as_str().is_empty()),
        })
    }

    pub fn attr(&self, name: &str) -> Option<&AttrSpan<'a>> {
        self.attrs.iter().find(|a| a.name == name)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Rebuild the tag with some attribute spans replaced
    ///
    /// Each edit is `(span, replacement)`; replacements for removed
    /// attributes are empty strings. Spans must not overlap.
    pub fn splice(&self, mut edits: Vec<(Range<usize>, String)>) -> String {
        edits.sort_by_key(|(span, _)| span.start);
        let mut out = String::with_capacity(self.text.len() + 32);
        let mut cursor = 0;
        for (span, replacement) in edits {
            out.push_str(&self.text[cursor..span.start]);
            out.push_str(&replacement);
            cursor = span.end;
        }
        out.push_str(&self.text[cursor..]);
        out
    }
}

/// What a tag-level rule decided for one tag
pub(crate) enum TagEdit {
    Keep,
    Replace(String),
    /// Drop the whole element, together with its indentation
    Remove,
}

/// Run `edit` over every start tag in `content`
///
/// `Remove` only makes sense for self-closing tags; callers must not return
/// it for tags with content.
pub(crate) fn rewrite_start_tags<F>(content: &str, mut edit: F) -> String
where
    F: FnMut(&StartTag<'_>) -> TagEdit,
{
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;

    for caps in START_TAG.captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(tag) = StartTag::from_captures(&caps) else { continue };

        match edit(&tag) {
            TagEdit::Keep => continue,
            TagEdit::Replace(text) => {
                out.push_str(&content[cursor..whole.start()]);
                out.push_str(&text);
            }
            TagEdit::Remove => {
                out.push_str(&content[cursor..whole.start()]);
                trim_line_indent(&mut out);
            }
        }
        cursor = whole.end();
    }

    out.push_str(&content[cursor..]);
    out
}

/// Drop trailing indentation, and the line break too if the line is now empty
pub(crate) fn trim_line_indent(out: &mut String) {
    let trimmed_len = out.trim_end_matches([' ', '\t']).len();
    let line_was_blank = trimmed_len == 0 || out[..trimmed_len].ends_with('\n');
    if line_was_blank {
        out.truncate(trimmed_len);
        if out.ends_with('\n') {
            out.pop();
            if out.ends_with('\r') {
                out.pop();
            }
        }
    }
}

/// Resolve entities in an attribute value, falling back to the raw text
pub(crate) fn unescape_attr(raw: &str) -> Cow<'_, str> {
    unescape(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Escape text for a double-quoted attribute value
pub(crate) fn escape_attr(value: &str) -> String {
    partial_escape(value).replace('"', "&quot;")
}

/// Render a `name="value"` pair with a leading space
pub(crate) fn attribute(name: &str, value: &str) -> String {
    format!(" {}=\"{}\"", name, escape_attr(value))
}

/// True when `class` (a space separated list) holds `token`
pub(crate) fn has_class_token(class: &str, token: &str) -> bool {
    class.split_whitespace().any(|c| c == token)
}
