// src/rewrite/source.rs
//! `view_mode` values outside view definitions
//!
//! Window actions list the view types they open, either in Python
//! (`'view_mode': 'tree,form'`) or in action records
//! (`<field name="view_mode">tree,form</field>`). Once `tree` views are
//! renamed, those values must say `list`.

use super::tally::{FileTally, RuleId};
use regex::{Captures, Regex};
use std::sync::LazyLock;

struct Patterns {
    python: Regex,
    record: Regex,
    tree_mode: Regex,
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    python: Regex::new(r#"(['"]view_mode['"]\s*:\s*|\bview_mode\s*=\s*)(['"])([^'"\n]*)(['"])"#).unwrap(),
    record: Regex::new(r#"(<field\s+name\s*=\s*["']view_mode["']\s*>)([^<]*)(</field\s*>)"#).unwrap(),
    tree_mode: Regex::new(r"\btree\b").unwrap(),
});

/// Replace the `tree` mode in one comma separated value, counting it
fn rewrite_modes(value: &str, hits: &mut u64) -> String {
    if PATTERNS.tree_mode.is_match(value) {
        *hits += 1;
        PATTERNS.tree_mode.replace_all(value, "list").into_owned()
    } else {
        value.to_string()
    }
}

/// Rewrite `view_mode` values in Python source
pub(crate) fn rewrite_python(content: &str, tally: &mut FileTally) -> String {
    if !content.contains("view_mode") {
        return content.to_string();
    }
    let mut hits = 0u64;
    let out = PATTERNS
        .python
        .replace_all(content, |caps: &Captures<'_>| {
            format!(
                "{}{}{}{}",
                &caps[1],
                &caps[2],
                rewrite_modes(&caps[3], &mut hits),
                &caps[4]
            )
        })
        .into_owned();
    record(tally, hits);
    out
}

/// Rewrite `view_mode` fields of action records in markup
pub(crate) fn rewrite_records(content: &str, tally: &mut FileTally) -> String {
    if !content.contains("view_mode") {
        return content.to_string();
    }
    let mut hits = 0u64;
    let out = PATTERNS
        .record
        .replace_all(content, |caps: &Captures<'_>| {
            format!(
                "{}{}{}",
                &caps[1],
                rewrite_modes(&caps[2], &mut hits),
                &caps[3]
            )
        })
        .into_owned();
    record(tally, hits);
    out
}

fn record(tally: &mut FileTally, hits: u64) {
    if hits > 0 {
        tally.found(RuleId::SourceViewMode, hits);
        tally.changed(RuleId::SourceViewMode, hits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_python_dict_and_kwarg() {
        let content = r#"return {
    'type': 'ir.actions.act_window',
    'view_mode': 'tree,form',
}
action = dict(view_mode="form,tree", name='tree')
"#;
        let mut tally = FileTally::new();
        let out = rewrite_python(content, &mut tally);
        assert!(out.contains("'view_mode': 'list,form'"));
        assert!(out.contains(r#"view_mode="form,list""#));
        assert!(out.contains("name='tree'"));
        assert_eq!(tally.changes(RuleId::SourceViewMode), 2);
    }

    #[test]
    fn test_rewrite_records() {
        let content = r#"<field name="view_mode">tree,kanban,form</field>
<field name="mode">tree</field>"#;
        let mut tally = FileTally::new();
        let out = rewrite_records(content, &mut tally);
        assert_eq!(
            out,
            r#"<field name="view_mode">list,kanban,form</field>
<field name="mode">tree</field>"#
        );
        assert_eq!(tally.changes(RuleId::SourceViewMode), 1);
    }

    #[test]
    fn test_view_mode_without_tree_is_untouched() {
        let content = "'view_mode': 'form,treeview'";
        let mut tally = FileTally::new();
        assert_eq!(rewrite_python(content, &mut tally), content);
        assert!(tally.is_empty());
    }
}
