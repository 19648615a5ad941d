// src/rewrite/pattern.rs
//! Textual rewrite rules
//!
//! These rules work on the raw buffer and never need it to parse, which makes
//! them the fallback for damaged markup and the reconciliation pass after the
//! tree rules. Each rule checks its own postcondition, so running the whole
//! pass twice changes nothing the second time.

use super::chatter;
use super::markup::{attribute, rewrite_start_tags, StartTag, TagEdit};
use super::settings;
use super::tally::{FileTally, RuleId};
use crate::domain::{self, ConditionParsing};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

struct Patterns {
    /// `<tree` followed by well-formed attributes and the tag end
    tree_open: Regex,
    tree_close: Regex,
    /// Any `<tree` element start, whatever its attributes look like
    tree_loose: Regex,
    tree_residual: Regex,
    range_end_key: Regex,
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    tree_open: Regex::new(r#"<tree((?:\s+[\w:.-]+\s*=\s*(?:"[^"]*"|'[^']*'))*\s*/?>)"#).unwrap(),
    tree_close: Regex::new(r"</tree(\s*)>").unwrap(),
    tree_loose: Regex::new(r"<tree([\s/>])").unwrap(),
    tree_residual: Regex::new(r"<tree(?:[\s/>]|$)").unwrap(),
    range_end_key: Regex::new(r"\brelated_end_date\b").unwrap(),
});

/// Attributes an `attrs` dict can expand into
const EXPRESSION_ATTRS: [&str; 4] = ["invisible", "readonly", "required", "column_invisible"];

/// Rule 1: rename `<tree>` elements to `<list>`
pub(crate) fn rename_tree_tags(content: &str, tally: &mut FileTally) -> String {
    if !content.contains("<tree") && !content.contains("</tree") {
        return content.to_string();
    }

    let strict = PATTERNS.tree_open.find_iter(content).count() as u64;
    let text = PATTERNS.tree_open.replace_all(content, "<list$1");
    let text = PATTERNS.tree_close.replace_all(&text, "</list$1>");

    let loose = PATTERNS.tree_loose.find_iter(&text).count() as u64;
    let text = if loose > 0 {
        debug!("Renaming {} tree tag(s) with malformed attributes", loose);
        PATTERNS.tree_loose.replace_all(&text, "<list$1").into_owned()
    } else {
        text.into_owned()
    };

    let renamed = strict + loose;
    if renamed > 0 {
        tally.found(RuleId::TreeToList, renamed);
        tally.changed(RuleId::TreeToList, renamed);
    }

    let residual = PATTERNS.tree_residual.find_iter(&text).count();
    if residual > 0 {
        warn!("{} tree element start(s) could not be renamed", residual);
        for _ in 0..residual {
            tally.warning(RuleId::TreeToList);
        }
    }
    text
}

/// Rule 2: expand `attrs="{...}"` into one expression attribute per key
pub(crate) fn convert_attrs(content: &str, mode: ConditionParsing, tally: &mut FileTally) -> String {
    if !content.contains("attrs") {
        return content.to_string();
    }

    rewrite_start_tags(content, |tag| {
        let Some(attrs) = tag.attr("attrs") else {
            return TagEdit::Keep;
        };

        let value = attrs.value();
        let entries = match domain::split_dict(&value) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Leaving attrs on <{}> unconverted: {}", tag.name, e);
                tally.unconverted(RuleId::AttrsConversion);
                return TagEdit::Keep;
            }
        };

        if let Some((key, _)) = entries.iter().find(|(key, _)| tag.has_attr(key)) {
            warn!(
                "<{}> already has a '{}' attribute next to attrs, leaving it alone",
                tag.name, key
            );
            tally.warning(RuleId::AttrsConversion);
            return TagEdit::Keep;
        }

        let mut expanded = String::new();
        for (key, domain_text) in &entries {
            if !EXPRESSION_ATTRS.contains(&key.as_str()) {
                debug!("attrs key '{}' on <{}> is not a standard modifier", key, tag.name);
            }
            match domain::translate_domain(domain_text, mode) {
                Ok(expr) => expanded.push_str(&attribute(key, &expr)),
                Err(e) => {
                    debug!("Leaving attrs on <{}> unconverted ({}): {}", tag.name, key, e);
                    tally.unconverted(RuleId::AttrsConversion);
                    return TagEdit::Keep;
                }
            }
        }

        tally.hit(RuleId::AttrsConversion);
        TagEdit::Replace(tag.splice(vec![(attrs.span.clone(), expanded)]))
    })
}

/// Visibility expression equivalent to a `states` list
fn states_expression(states: &[&str]) -> String {
    match states {
        [single] => format!("state != '{}'", single),
        many => {
            let quoted: Vec<String> = many.iter().map(|s| format!("'{}'", s)).collect();
            format!("state not in ({})", quoted.join(", "))
        }
    }
}

/// Rule 3: turn `states="a,b"` into an `invisible` expression
pub(crate) fn convert_states(content: &str, tally: &mut FileTally) -> String {
    if !content.contains("states") {
        return content.to_string();
    }

    rewrite_start_tags(content, |tag| {
        let Some(states) = tag.attr("states") else {
            return TagEdit::Keep;
        };

        let value = states.value();
        let names: Vec<&str> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if names.is_empty() {
            warn!("<{}> has an empty states attribute, leaving it alone", tag.name);
            tally.warning(RuleId::StatesConversion);
            return TagEdit::Keep;
        }

        let condition = states_expression(&names);
        let edits = match tag.attr("invisible") {
            Some(existing) => {
                let combined = format!("({}) or {}", existing.value().trim(), condition);
                vec![
                    (existing.span.clone(), attribute("invisible", &combined)),
                    (states.span.clone(), String::new()),
                ]
            }
            None => vec![(states.span.clone(), attribute("invisible", &condition))],
        };

        tally.hit(RuleId::StatesConversion);
        TagEdit::Replace(tag.splice(edits))
    })
}

fn is_daterange_field(tag: &StartTag<'_>) -> bool {
    tag.name == "field" && tag.attr("widget").is_some_and(|w| w.value().trim() == "daterange")
}

/// Rule 4: rename the daterange end-date option and drop the companion field
pub(crate) fn update_daterange(content: &str, tally: &mut FileTally) -> String {
    if !content.contains("daterange") {
        return content.to_string();
    }

    rewrite_start_tags(content, |tag| {
        if !is_daterange_field(tag) {
            return TagEdit::Keep;
        }
        let Some(options) = tag.attr("options") else {
            return TagEdit::Keep;
        };

        if PATTERNS.range_end_key.is_match(options.raw) {
            let renamed = PATTERNS
                .range_end_key
                .replace_all(&tag.text[options.span.clone()], "end_date_field")
                .into_owned();
            tally.hit(RuleId::DaterangeUpdate);
            return TagEdit::Replace(tag.splice(vec![(options.span.clone(), renamed)]));
        }

        // a field holding the end key is the range itself, never the companion
        let is_companion = options.raw.contains("related_start_date")
            && !options.raw.contains("end_date_field");
        if is_companion {
            if tag.self_closing {
                tally.hit(RuleId::DaterangeUpdate);
                return TagEdit::Remove;
            }
            warn!("daterange companion field has content, keeping it");
            tally.warning(RuleId::DaterangeUpdate);
        }
        TagEdit::Keep
    })
}

/// Rule 6, textual part: settings blocks are only restructured on a tree,
/// so any marker left here is reported
pub(crate) fn check_settings(content: &str, tally: &mut FileTally) {
    let residual = settings::residual_markers(content);
    if residual > 0 {
        warn!("{} settings block(s) left in legacy layout", residual);
        for _ in 0..residual {
            tally.warning(RuleId::SettingsStructure);
        }
    }
}

/// Run rules 1 to 6 in catalogue order
pub(crate) fn apply_all(content: &str, mode: ConditionParsing, tally: &mut FileTally) -> String {
    let text = rename_tree_tags(content, tally);
    let text = convert_attrs(&text, mode, tally);
    let text = convert_states(&text, tally);
    let text = update_daterange(&text, tally);
    let text = chatter::collapse_in_text(&text, tally);
    check_settings(&text, tally);
    text
}
