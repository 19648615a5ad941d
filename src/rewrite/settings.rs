// src/rewrite/settings.rs
//! Settings block restructuring
//!
//! Configuration forms used to lay out their options as nested divs:
//!
//! ```text
//! <div class="app_settings_block" data-string="Sales" data-key="sale">
//!     <h2>Pricing</h2>
//!     <div class="row o_settings_container">
//!         <div class="o_setting_box"> label, help text, fields </div>
//!     </div>
//! </div>
//! ```
//!
//! The new syntax expresses the same thing as `<app>`, `<block>` and
//! `<setting>` elements. Fields are moved, never copied, so everything a
//! field carries (options, nested views) survives unchanged.

use super::markup::has_class_token;
use super::tally::{FileTally, RuleId};
use super::tree::{Document, NodeId, NodeKind, TreeError};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

const APP_CLASS: &str = "app_settings_block";
const CONTAINER_CLASS: &str = "o_settings_container";
const BOX_CLASS: &str = "o_setting_box";
const HELP_CLASS: &str = "text-muted";
const INDENT_STEP: &str = "    ";

/// Elements moved into a `<setting>`
const SETTING_CONTENT: [&str; 3] = ["field", "button", "widget"];

/// Box attributes copied onto its `<setting>`; `attrs` and `states` are
/// translated later by the pattern pass
const CARRIED_ATTRS: [&str; 5] = ["id", "groups", "invisible", "attrs", "states"];

/// Legacy settings markers left in text
static RESIDUAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<div\b[^>]*(?:\bclass\s*=\s*["'][^"']*\bapp_settings_block\b|\sdata-key\s*=)"#)
        .unwrap()
});

fn is_app_block(doc: &Document, id: NodeId) -> bool {
    doc.is_element(id, "div") && (doc.has_class(id, APP_CLASS) || doc.attr(id, "data-key").is_some())
}

/// Restructure every outermost settings block in the document
pub(crate) fn restructure(doc: &mut Document, tally: &mut FileTally) -> Result<bool, TreeError> {
    let blocks: Vec<NodeId> = doc
        .elements()
        .into_iter()
        .filter(|&id| is_app_block(doc, id) && !has_app_ancestor(doc, id))
        .collect();

    for &block in &blocks {
        let app = build_app(doc, block, tally);
        doc.replace(block, app)?;
        tally.hit(RuleId::SettingsStructure);
    }
    if !blocks.is_empty() {
        debug!("Restructured {} settings block(s)", blocks.len());
    }
    Ok(!blocks.is_empty())
}

fn has_app_ancestor(doc: &Document, id: NodeId) -> bool {
    let mut current = doc.parent(id);
    while let Some(node) = current {
        if is_app_block(doc, node) {
            return true;
        }
        current = doc.parent(node);
    }
    false
}

/// Count legacy settings markers still present in text
pub(crate) fn residual_markers(content: &str) -> usize {
    if !content.contains(APP_CLASS) && !content.contains("data-key") {
        return 0;
    }
    RESIDUAL.find_iter(content).count()
}

/// Child placement that keeps the output indented like the input
struct Builder {
    base: String,
}

impl Builder {
    fn indent(&self, depth: usize) -> String {
        format!("{}{}", self.base, INDENT_STEP.repeat(depth))
    }

    fn push(&self, doc: &mut Document, parent: NodeId, child: NodeId, depth: usize) {
        let spacing = doc.new_text(format!("\n{}", self.indent(depth)));
        doc.append_child(parent, spacing);
        doc.append_child(parent, child);
    }

    fn close(&self, doc: &mut Document, parent: NodeId, depth: usize) {
        if !doc.children(parent).is_empty() {
            let spacing = doc.new_text(format!("\n{}", self.indent(depth)));
            doc.append_child(parent, spacing);
        }
    }
}

fn build_app(doc: &mut Document, block: NodeId, tally: &mut FileTally) -> NodeId {
    let string = doc
        .attr(block, "string")
        .or_else(|| doc.attr(block, "data-string"));
    let name = doc.attr(block, "data-key");

    let mut attrs: Vec<(&str, &str)> = Vec::new();
    if let Some(string) = string.as_deref() {
        attrs.push(("string", string));
    }
    if let Some(name) = name.as_deref() {
        attrs.push(("name", name));
    }
    let app = doc.new_element("app", &attrs);

    let builder = Builder {
        base: doc.indent_of(block),
    };
    // (node, depth of its children)
    let mut current = (app, 1);

    for child in doc.children(block).to_vec() {
        match doc.kind(child) {
            NodeKind::Text(text) if text.trim().is_empty() => continue,
            NodeKind::Element(_) if doc.is_element(child, "h2") => {
                let title = doc.text_content(child).trim().to_string();
                let section = doc.new_element("block", &[("title", title.as_str())]);
                if current.0 != app {
                    builder.close(doc, current.0, 1);
                }
                builder.push(doc, app, section, 1);
                current = (section, 2);
            }
            NodeKind::Element(_) if doc.is_element(child, "div") && doc.has_class(child, CONTAINER_CLASS) => {
                convert_container(doc, &builder, child, current, tally);
            }
            _ => builder.push(doc, current.0, child, current.1),
        }
    }

    if current.0 != app {
        builder.close(doc, current.0, 1);
    }
    builder.close(doc, app, 0);
    app
}

fn convert_container(
    doc: &mut Document,
    builder: &Builder,
    container: NodeId,
    (parent, depth): (NodeId, usize),
    tally: &mut FileTally,
) {
    if setting_content(doc, container).is_empty() {
        warn!("Keeping settings container without fields");
        tally.warning(RuleId::SettingsStructure);
        builder.push(doc, parent, container, depth);
        return;
    }

    let boxes: Vec<NodeId> = doc
        .descendants(container)
        .into_iter()
        .filter(|&id| doc.has_class(id, BOX_CLASS))
        .collect();
    let units = if boxes.is_empty() { vec![container] } else { boxes };

    for unit in units {
        let content = setting_content(doc, unit);
        if content.is_empty() {
            warn!("Keeping settings box without fields");
            tally.warning(RuleId::SettingsStructure);
            builder.push(doc, parent, unit, depth);
            continue;
        }

        let label = setting_label(doc, unit);
        let help = setting_help(doc, unit);
        if loses_markup(doc, unit, &content, label, help) {
            warn!("Keeping settings box whose markup would be lost");
            tally.warning(RuleId::SettingsStructure);
            builder.push(doc, parent, unit, depth);
            continue;
        }

        let label = label.and_then(|id| label_text(doc, id));
        let help = help
            .map(|id| doc.text_content(id).trim().to_string())
            .filter(|s| !s.is_empty());
        let carried: Vec<(&str, String)> = CARRIED_ATTRS
            .iter()
            .filter_map(|&name| doc.attr(unit, name).map(|value| (name, value)))
            .collect();

        let mut attrs: Vec<(&str, &str)> = Vec::new();
        if let Some(label) = label.as_deref() {
            attrs.push(("string", label));
        }
        if let Some(help) = help.as_deref() {
            attrs.push(("help", help));
        }
        attrs.extend(carried.iter().map(|(name, value)| (*name, value.as_str())));

        let setting = doc.new_element("setting", &attrs);
        for node in content {
            builder.push(doc, setting, node, depth + 1);
        }
        builder.close(doc, setting, depth);
        builder.push(doc, parent, setting, depth);
    }
}

/// Fields and actions below `unit`, outermost only, in document order
fn setting_content(doc: &Document, unit: NodeId) -> Vec<NodeId> {
    let mut found: Vec<NodeId> = Vec::new();
    for id in doc.descendants(unit) {
        let wanted = doc
            .name(id)
            .is_some_and(|name| SETTING_CONTENT.contains(&name));
        if wanted && !found.iter().any(|&outer| is_ancestor(doc, outer, id)) {
            found.push(id);
        }
    }
    found
}

fn is_ancestor(doc: &Document, ancestor: NodeId, id: NodeId) -> bool {
    let mut current = doc.parent(id);
    while let Some(node) = current {
        if node == ancestor {
            return true;
        }
        current = doc.parent(node);
    }
    false
}

fn setting_label(doc: &Document, unit: NodeId) -> Option<NodeId> {
    doc.descendants(unit)
        .into_iter()
        .find(|&id| doc.is_element(id, "label"))
}

fn label_text(doc: &Document, label: NodeId) -> Option<String> {
    doc.attr(label, "string")
        .or_else(|| Some(doc.text_content(label).trim().to_string()))
        .filter(|s| !s.is_empty())
}

fn setting_help(doc: &Document, unit: NodeId) -> Option<NodeId> {
    doc.descendants(unit).into_iter().find(|&id| {
        doc.attr(id, "class")
            .is_some_and(|c| has_class_token(&c, HELP_CLASS))
    })
}

fn has_only_class(doc: &Document, id: NodeId) -> bool {
    doc.element(id)
        .is_some_and(|el| el.attrs.iter().all(|a| a.name == "class"))
}

/// True when turning `unit` into a `<setting>` would drop anything besides
/// layout divs: extra box attributes, attributed wrappers, or elements that
/// are neither moved nor read for the label and help text
fn loses_markup(
    doc: &Document,
    unit: NodeId,
    content: &[NodeId],
    label: Option<NodeId>,
    help: Option<NodeId>,
) -> bool {
    let unit_extra = doc.element(unit).is_some_and(|el| {
        el.attrs
            .iter()
            .any(|a| a.name != "class" && !CARRIED_ATTRS.contains(&a.name.as_str()))
    });
    if unit_extra {
        return true;
    }

    let kept: Vec<NodeId> = content.iter().copied().chain(label).chain(help).collect();
    doc.descendants(unit).into_iter().any(|id| {
        if doc.element(id).is_none() {
            return false;
        }
        if kept.iter().any(|&k| k == id || is_ancestor(doc, k, id)) {
            return false;
        }
        if kept.iter().any(|&k| is_ancestor(doc, id, k)) {
            // wrapper around moved content
            return !has_only_class(doc, id);
        }
        let empty = doc.element_children(id).is_empty() && doc.text_content(id).trim().is_empty();
        !(empty && has_only_class(doc, id))
    })
}
