// src/rewrite/chatter.rs
//! Discussion panel collapse
//!
//! Legacy form views end with a `div.oe_chatter` holding the followers,
//! activities and messages widgets. The new syntax is a single `<chatter/>`
//! element. A panel is only collapsed when nothing would be lost: the div
//! carries no attribute besides its class, and its children are distinct
//! discussion fields with at most a `widget` attribute each.

use super::tally::{FileTally, RuleId};
use super::tree::{Document, NodeId, NodeKind, TreeError};
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};

const PANEL_CLASS: &str = "oe_chatter";
const FOLLOWERS: &str = "message_follower_ids";
const ACTIVITIES: &str = "activity_ids";
const MESSAGES: &str = "message_ids";
const REPLACEMENT: &str = "<chatter/>";

/// Outcome of inspecting a candidate panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PanelVerdict {
    /// Safe to replace with `<chatter/>`
    Collapse,
    /// Looks like a panel but holds something we would drop
    Ambiguous(String),
    NotPanel,
}

/// Check a `div` against the panel signature
pub(crate) fn classify(doc: &Document, div: NodeId) -> PanelVerdict {
    let Some(el) = doc.element(div) else {
        return PanelVerdict::NotPanel;
    };
    if el.name != "div" || !doc.has_class(div, PANEL_CLASS) {
        return PanelVerdict::NotPanel;
    }
    if let Some(extra) = el.attrs.iter().find(|a| a.name != "class") {
        return PanelVerdict::Ambiguous(format!("panel carries attribute '{}'", extra.name));
    }

    let mut seen = HashSet::new();
    for &child in doc.children(div) {
        match doc.kind(child) {
            NodeKind::Text(text) if text.trim().is_empty() => continue,
            NodeKind::Text(_) => return PanelVerdict::Ambiguous("panel holds text".into()),
            NodeKind::Raw(_) => {
                return PanelVerdict::Ambiguous("panel holds a comment or raw markup".into());
            }
            NodeKind::Document => return PanelVerdict::NotPanel,
            NodeKind::Element(field) => {
                if field.name != "field" {
                    return PanelVerdict::Ambiguous(format!("panel holds <{}>", field.name));
                }
                if let Some(extra) = field.attrs.iter().find(|a| a.name != "name" && a.name != "widget") {
                    return PanelVerdict::Ambiguous(format!(
                        "panel field carries attribute '{}'",
                        extra.name
                    ));
                }
                let has_content = doc
                    .children(child)
                    .iter()
                    .any(|&c| !matches!(doc.kind(c), NodeKind::Text(t) if t.trim().is_empty()));
                if has_content {
                    return PanelVerdict::Ambiguous("panel field has content".into());
                }
                let name = doc.attr(child, "name").unwrap_or_default();
                if ![FOLLOWERS, ACTIVITIES, MESSAGES].contains(&name.as_str()) {
                    return PanelVerdict::Ambiguous(format!("unknown panel field '{}'", name));
                }
                if !seen.insert(name.clone()) {
                    return PanelVerdict::Ambiguous(format!("duplicate panel field '{}'", name));
                }
            }
        }
    }

    if !seen.contains(MESSAGES) || seen.len() < 2 {
        return PanelVerdict::Ambiguous("panel is missing discussion fields".into());
    }
    PanelVerdict::Collapse
}

/// Collapse every confidently recognized panel in a parsed document
///
/// Ambiguous panels are left for the textual pass, which reports them.
pub(crate) fn collapse_in_tree(doc: &mut Document, tally: &mut FileTally) -> Result<bool, TreeError> {
    let panels: Vec<NodeId> = doc
        .elements()
        .into_iter()
        .filter(|&id| classify(doc, id) == PanelVerdict::Collapse)
        .collect();

    for &panel in &panels {
        let chatter = doc.new_element("chatter", &[]);
        doc.replace(panel, chatter)?;
        tally.hit(RuleId::ChatterSimplified);
    }
    if !panels.is_empty() {
        debug!("Collapsed {} discussion panel(s) in tree", panels.len());
    }
    Ok(!panels.is_empty())
}

struct PanelPatterns {
    /// (a) canonical order, self-closing
    canonical: Regex,
    /// (b) three children, any order, verbose closings
    verbose: Regex,
    /// (c) three self-closing children in another order
    reordered: Regex,
    /// (d) followers and messages only
    reduced: Regex,
    /// Any remaining panel fragment
    fragment: Regex,
}

const PANEL_OPEN: &str = r#"<div\s+class\s*=\s*["']oe_chatter["']\s*>"#;
const PANEL_CLOSE: &str = r"\s*</div>";
const WIDGET: &str = r#"(?:\s+widget\s*=\s*["'][^"']*["'])?"#;

fn field(name: &str, closing: &str) -> String {
    format!(r#"\s*<field\s+name\s*=\s*["']({name})["']{WIDGET}\s*{closing}"#)
}

static PANELS: LazyLock<PanelPatterns> = LazyLock::new(|| {
    let any = "message_follower_ids|activity_ids|message_ids";
    let self_closing = "/>";
    let verbose = r">\s*</field>";

    let canonical = format!(
        "{PANEL_OPEN}{}{}{}{PANEL_CLOSE}",
        field(FOLLOWERS, self_closing),
        field(ACTIVITIES, self_closing),
        field(MESSAGES, self_closing),
    );
    let verbose_any = format!(
        "{PANEL_OPEN}{}{}{}{PANEL_CLOSE}",
        field(any, verbose),
        field(any, verbose),
        field(any, verbose),
    );
    let reordered = format!(
        "{PANEL_OPEN}{}{}{}{PANEL_CLOSE}",
        field(any, self_closing),
        field(any, self_closing),
        field(any, self_closing),
    );
    let either = r"(?:/>|>\s*</field>)";
    let reduced = format!(
        "{PANEL_OPEN}{}{}{PANEL_CLOSE}",
        field("message_follower_ids|message_ids", either),
        field("message_follower_ids|message_ids", either),
    );

    PanelPatterns {
        canonical: Regex::new(&canonical).unwrap(),
        verbose: Regex::new(&verbose_any).unwrap(),
        reordered: Regex::new(&reordered).unwrap(),
        reduced: Regex::new(&reduced).unwrap(),
        fragment: Regex::new(r"<div\b[^>]*\boe_chatter\b[^>]*>(?s:.*?)</div>").unwrap(),
    }
});

/// Captured field names are distinct and include the messages field
fn distinct_fields(caps: &Captures<'_>) -> bool {
    let names: Vec<&str> = caps.iter().skip(1).flatten().map(|m| m.as_str()).collect();
    let unique: HashSet<&str> = names.iter().copied().collect();
    unique.len() == names.len() && unique.contains(MESSAGES)
}

/// Collapse panels textually: the four explicit variants, then a
/// per-fragment signature check for whatever is left
pub(crate) fn collapse_in_text(content: &str, tally: &mut FileTally) -> String {
    if !content.contains(PANEL_CLASS) {
        return content.to_string();
    }

    let mut text = content.to_string();
    for (variant, pattern) in [
        ("canonical", &PANELS.canonical),
        ("verbose", &PANELS.verbose),
        ("reordered", &PANELS.reordered),
        ("reduced", &PANELS.reduced),
    ] {
        let mut hits = 0u64;
        let replaced = pattern.replace_all(&text, |caps: &Captures<'_>| {
            if distinct_fields(caps) {
                hits += 1;
                REPLACEMENT.to_string()
            } else {
                caps[0].to_string()
            }
        });
        if hits > 0 {
            debug!("Collapsed {} discussion panel(s) ({} variant)", hits, variant);
            text = replaced.into_owned();
            tally.found(RuleId::ChatterSimplified, hits);
            tally.changed(RuleId::ChatterSimplified, hits);
        }
    }

    if !text.contains(PANEL_CLASS) {
        return text;
    }

    PANELS
        .fragment
        .replace_all(&text, |caps: &Captures<'_>| {
            let fragment = &caps[0];
            match classify_fragment(fragment) {
                PanelVerdict::Collapse => {
                    tally.hit(RuleId::ChatterSimplified);
                    REPLACEMENT.to_string()
                }
                PanelVerdict::Ambiguous(reason) => {
                    warn!("Keeping discussion panel: {}", reason);
                    tally.warning(RuleId::ChatterSimplified);
                    fragment.to_string()
                }
                PanelVerdict::NotPanel => fragment.to_string(),
            }
        })
        .into_owned()
}

fn classify_fragment(fragment: &str) -> PanelVerdict {
    let doc = match Document::parse(fragment) {
        Ok(doc) => doc,
        Err(e) => return PanelVerdict::Ambiguous(format!("panel does not parse: {}", e)),
    };
    match doc.elements().first() {
        Some(&div) => classify(&doc, div),
        None => PanelVerdict::NotPanel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collapse(content: &str) -> (String, FileTally) {
        let mut tally = FileTally::new();
        let out = collapse_in_text(content, &mut tally);
        (out, tally)
    }

    #[test]
    fn test_canonical_variant() {
        let content = r#"<form>
    <div class="oe_chatter">
        <field name="message_follower_ids" widget="mail_followers"/>
        <field name="activity_ids" widget="mail_activity"/>
        <field name="message_ids" widget="mail_thread"/>
    </div>
</form>"#;
        let (out, tally) = collapse(content);
        assert_eq!(out, "<form>\n    <chatter/>\n</form>");
        assert_eq!(tally.changes(RuleId::ChatterSimplified), 1);
    }

    #[test]
    fn test_verbose_variant_any_order() {
        let content = r#"<div class="oe_chatter">
    <field name="message_ids"></field>
    <field name="message_follower_ids"></field>
    <field name="activity_ids"></field>
</div>"#;
        let (out, tally) = collapse(content);
        assert_eq!(out, "<chatter/>");
        assert_eq!(tally.changes(RuleId::ChatterSimplified), 1);
    }

    #[test]
    fn test_reordered_variant() {
        let content = r#"<div class='oe_chatter'><field name="activity_ids"/><field name="message_ids"/><field name="message_follower_ids"/></div>"#;
        let (out, tally) = collapse(content);
        assert_eq!(out, "<chatter/>");
        assert_eq!(tally.changes(RuleId::ChatterSimplified), 1);
    }

    #[test]
    fn test_reduced_variant() {
        let content = r#"<div class="oe_chatter">
    <field name="message_follower_ids"/>
    <field name="message_ids"/>
</div>"#;
        let (out, tally) = collapse(content);
        assert_eq!(out, "<chatter/>");
        assert_eq!(tally.changes(RuleId::ChatterSimplified), 1);
    }

    #[test]
    fn test_fragment_fallback_handles_extra_classes() {
        let content = r#"<div class="oe_chatter o_extra">
    <field widget="mail_followers" name="message_follower_ids"/>
    <field name="message_ids" widget="mail_thread"/>
</div>"#;
        let (out, tally) = collapse(content);
        assert_eq!(out, "<chatter/>");
        assert_eq!(tally.get(RuleId::ChatterSimplified).changed, 1);
        assert_eq!(tally.get(RuleId::ChatterSimplified).warnings, 0);
    }

    #[test]
    fn test_ambiguous_panel_is_kept_with_warning() {
        let content = r#"<div class="oe_chatter">
    <field name="message_follower_ids"/>
    <field name="message_ids" options="{'post_refresh': 'always'}"/>
</div>"#;
        let (out, tally) = collapse(content);
        assert_eq!(out, content);
        assert_eq!(tally.get(RuleId::ChatterSimplified).changed, 0);
        assert_eq!(tally.get(RuleId::ChatterSimplified).warnings, 1);
    }

    #[test]
    fn test_duplicate_fields_are_not_collapsed() {
        let content = r#"<div class="oe_chatter"><field name="message_ids"/><field name="message_ids"/></div>"#;
        let (out, tally) = collapse(content);
        assert_eq!(out, content);
        assert_eq!(tally.get(RuleId::ChatterSimplified).warnings, 1);
    }

    #[test]
    fn test_collapse_is_idempotent() {
        let content = r#"<div class="oe_chatter"><field name="message_follower_ids"/><field name="message_ids"/></div>"#;
        let (once, _) = collapse(content);
        let (twice, tally) = collapse(&once);
        assert_eq!(once, twice);
        assert!(tally.is_empty());
    }

    #[test]
    fn test_tree_collapse() {
        let content = r#"<form><sheet/><div class="oe_chatter">
    <field name="message_follower_ids"/>
    <field name="activity_ids"/>
    <field name="message_ids"/>
</div><div class="oe_chatter" id="x"><field name="message_ids"/></div></form>"#;
        let mut doc = Document::parse(content).unwrap();
        let mut tally = FileTally::new();
        assert!(collapse_in_tree(&mut doc, &mut tally).unwrap());
        assert_eq!(
            doc.to_markup(),
            r#"<form><sheet/><chatter/><div class="oe_chatter" id="x"><field name="message_ids"/></div></form>"#
        );
        assert_eq!(tally.changes(RuleId::ChatterSimplified), 1);
        assert_eq!(tally.get(RuleId::ChatterSimplified).warnings, 0);
    }
}
