// src/rewrite/tree.rs
//! Lenient markup tree used by tree-mode rules
//!
//! The buffer is wrapped in a synthetic root element and read with
//! `quick-xml` with end-name checks turned off. The builder recovers from the
//! usual damage found in hand-edited view files:
//!
//! - a mismatched end tag closes the nearest open element with that name
//! - an end tag with no open element is kept as raw text
//! - elements still open at end of input are closed implicitly
//!
//! Every node keeps the exact text it was parsed from, so serializing an
//! unmodified document reproduces the input byte for byte. Only elements a
//! rule created or edited are rendered from their parts.

use super::markup::{escape_attr, unescape_attr};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Name of the synthetic wrapper element
const ROOT_TAG: &str = "viewmig-root";

pub type NodeId = usize;

/// Errors raised when the buffer cannot be read as a tree
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("markup parse error at offset {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("node {0} is not attached to the document")]
    Detached(NodeId),
}

/// Attribute with its value kept escaped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub raw: String,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<Attr>,
    /// Source text of the start tag, cleared when the element is edited
    raw_start: Option<String>,
    /// Source text of the end tag, if the source had one
    raw_end: Option<String>,
    self_closing: bool,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element(Element),
    /// Character data, kept escaped
    Text(String),
    /// Comments, CDATA, processing instructions, stray end tags
    Raw(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed node graph
///
/// Detached nodes stay in the arena but are no longer reachable from the
/// document node.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    /// XML declaration and anything before it, re-emitted verbatim
    prolog: String,
}

impl Document {
    /// Document node id
    pub const ROOT: NodeId = 0;

    /// Parse `content` leniently
    pub fn parse(content: &str) -> Result<Self, TreeError> {
        let (prolog, body) = split_prolog(content);
        let wrapped = format!("<{ROOT_TAG}>{body}</{ROOT_TAG}>");

        let mut reader = Reader::from_str(&wrapped);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        let mut doc = Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            prolog: prolog.to_string(),
        };
        let mut open: Vec<NodeId> = vec![Self::ROOT];

        loop {
            let start = reader.buffer_position() as usize;
            let event = reader.read_event().map_err(|e| TreeError::Parse {
                position: (reader.buffer_position() as usize).saturating_sub(ROOT_TAG.len() + 2),
                message: e.to_string(),
            })?;
            let end = reader.buffer_position() as usize;
            let raw = wrapped.get(start..end).unwrap_or_default().to_string();
            let parent = open.last().copied().unwrap_or(Self::ROOT);

            match event {
                Event::Start(e) => {
                    let element = element_from(&e, raw, false)?;
                    let id = doc.push(NodeKind::Element(element), parent);
                    open.push(id);
                }
                Event::Empty(e) => {
                    let element = element_from(&e, raw, true)?;
                    doc.push(NodeKind::Element(element), parent);
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let matching = open
                        .iter()
                        .rposition(|&id| doc.name(id) == Some(name.as_str()));
                    match matching {
                        Some(depth) if depth > 0 => {
                            let id = open[depth];
                            if let NodeKind::Element(el) = &mut doc.nodes[id].kind {
                                el.raw_end = Some(raw);
                            }
                            open.truncate(depth);
                        }
                        _ => {
                            doc.push(NodeKind::Raw(raw), parent);
                        }
                    }
                }
                Event::Text(_) => {
                    doc.push(NodeKind::Text(raw), parent);
                }
                Event::Eof => break,
                _ => {
                    doc.push(NodeKind::Raw(raw), parent);
                }
            }
        }

        Ok(doc)
    }

    fn push(&mut self, kind: NodeKind, parent: NodeId) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// The synthetic wrapper element
    pub fn wrapper(&self) -> Option<NodeId> {
        self.nodes[Self::ROOT]
            .children
            .iter()
            .copied()
            .find(|&id| self.name(id) == Some(ROOT_TAG))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    pub fn is_element(&self, id: NodeId, name: &str) -> bool {
        self.name(id) == Some(name)
    }

    /// Attribute value with entities resolved
    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.element(id)?
            .attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| unescape_attr(&a.raw).into_owned())
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|c| super::markup::has_class_token(&c, class))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
            .collect()
    }

    /// All descendants of `id` in document order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Element descendants of the document in document order
    pub fn elements(&self) -> Vec<NodeId> {
        let wrapper = self.wrapper();
        self.descendants(Self::ROOT)
            .into_iter()
            .filter(|&id| self.element(id).is_some() && Some(id) != wrapper)
            .collect()
    }

    /// Concatenated character data below `id`, entities resolved
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            if let NodeKind::Text(raw) = &self.nodes[node].kind {
                out.push_str(&unescape_attr(raw));
            }
        }
        out
    }

    /// Whitespace on the line before `id`, taken from its preceding text node
    pub fn indent_of(&self, id: NodeId) -> String {
        let Some(parent) = self.parent(id) else {
            return String::new();
        };
        let siblings = self.children(parent);
        let Some(pos) = siblings.iter().position(|&s| s == id) else {
            return String::new();
        };
        match pos.checked_sub(1).map(|p| &self.nodes[siblings[p]].kind) {
            Some(NodeKind::Text(text)) => match text.rfind('\n') {
                Some(nl) if text[nl + 1..].chars().all(|c| c == ' ' || c == '\t') => {
                    text[nl + 1..].to_string()
                }
                _ => String::new(),
            },
            _ => String::new(),
        }
    }

    /// Create a detached element; attribute values are given unescaped
    pub fn new_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        let element = Element {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(n, v)| Attr {
                    name: n.to_string(),
                    raw: escape_attr(v),
                })
                .collect(),
            raw_start: None,
            raw_end: None,
            self_closing: true,
        };
        self.new_node(NodeKind::Element(element))
    }

    /// Create a detached text node from already-escaped text
    pub fn new_text(&mut self, raw: impl Into<String>) -> NodeId {
        self.new_node(NodeKind::Text(raw.into()))
    }

    fn new_node(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Unlink `id` from its parent
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    /// Move `child` to the end of `parent`'s children
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    /// Put `new` where `old` is and detach `old`
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<(), TreeError> {
        let parent = self.nodes[old].parent.ok_or(TreeError::Detached(old))?;
        self.detach(new);
        let pos = self.nodes[parent]
            .children
            .iter()
            .position(|&c| c == old)
            .ok_or(TreeError::Detached(old))?;
        self.nodes[parent].children[pos] = new;
        self.nodes[new].parent = Some(parent);
        self.nodes[old].parent = None;
        Ok(())
    }

    /// Serialize back to text, without the synthetic wrapper
    pub fn to_markup(&self) -> String {
        let mut out = String::with_capacity(self.nodes.len() * 16);
        self.write_node(Self::ROOT, &mut out);

        let open = format!("<{ROOT_TAG}>");
        let close = format!("</{ROOT_TAG}>");
        let body = out.strip_prefix(open.as_str()).unwrap_or(&out);
        let body = body.strip_suffix(close.as_str()).unwrap_or(body);
        format!("{}{}", self.prolog, body)
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id];
        match &node.kind {
            NodeKind::Document => {
                for &child in &node.children {
                    self.write_node(child, out);
                }
            }
            NodeKind::Text(raw) | NodeKind::Raw(raw) => out.push_str(raw),
            NodeKind::Element(el) => {
                let has_children = !node.children.is_empty();
                let verbatim_start = el
                    .raw_start
                    .as_deref()
                    .filter(|_| !(el.self_closing && has_children));

                let closed_in_start = match verbatim_start {
                    Some(raw) => {
                        out.push_str(raw);
                        el.self_closing
                    }
                    None => {
                        out.push('<');
                        out.push_str(&el.name);
                        for attr in &el.attrs {
                            // values read from single-quoted attributes may hold '"'
                            let raw = attr.raw.replace('"', "&quot;");
                            out.push_str(&format!(" {}=\"{}\"", attr.name, raw));
                        }
                        if has_children {
                            out.push('>');
                        } else {
                            out.push_str("/>");
                        }
                        !has_children
                    }
                };

                for &child in &node.children {
                    self.write_node(child, out);
                }

                if closed_in_start {
                    return;
                }
                match (&el.raw_end, verbatim_start) {
                    (Some(raw), _) => out.push_str(raw),
                    // Created or reshaped element
                    (None, None) => out.push_str(&format!("</{}>", el.name)),
                    // Never closed in the source; keep it that way
                    (None, Some(_)) => {}
                }
            }
        }
    }
}

fn element_from(e: &BytesStart<'_>, raw: String, self_closing: bool) -> Result<Element, TreeError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|err| TreeError::Parse {
            position: 0,
            message: format!("bad attribute in <{}>: {}", name, err),
        })?;
        attrs.push(Attr {
            name: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            raw: String::from_utf8_lossy(&attr.value).into_owned(),
        });
    }
    Ok(Element {
        name,
        attrs,
        raw_start: Some(raw),
        raw_end: None,
        self_closing,
    })
}

/// Split off a leading XML declaration
fn split_prolog(content: &str) -> (&str, &str) {
    let trimmed = content.trim_start_matches(['\u{feff}', ' ', '\t', '\r', '\n']);
    if trimmed.starts_with("<?xml") {
        if let Some(end) = content.find("?>") {
            return content.split_at(end + 2);
        }
    }
    ("", content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<odoo>
    <!-- form view -->
    <record id="view_form" model="ir.ui.view">
        <field name="arch" type="xml">
            <form string='Order'>
                <field name="name" attrs="{'invisible': [('qty', '&gt;', 0)]}"/>
                <group></group>
            </form>
        </field>
    </record>
</odoo>
"#;

    #[test]
    fn test_roundtrip_is_byte_exact() {
        let doc = Document::parse(VIEW).unwrap();
        assert_eq!(doc.to_markup(), VIEW);
    }

    #[test]
    fn test_lenient_recovery() {
        // unclosed <div>, stray </span>
        let content = "<form><div class=\"a\"><field name=\"x\"/></span></form>";
        let doc = Document::parse(content).unwrap();
        assert_eq!(doc.to_markup(), content);

        let fields: Vec<_> = doc
            .elements()
            .into_iter()
            .filter(|&id| doc.is_element(id, "field"))
            .collect();
        assert_eq!(fields.len(), 1);
        assert!(doc.is_element(doc.parent(fields[0]).unwrap(), "div"));
    }

    #[test]
    fn test_unparseable_markup_is_rejected() {
        assert!(Document::parse("<form><!-- never closed </form>").is_err());
    }

    #[test]
    fn test_queries() {
        let doc = Document::parse(VIEW).unwrap();
        let form = doc
            .elements()
            .into_iter()
            .find(|&id| doc.is_element(id, "form"))
            .unwrap();
        assert_eq!(doc.attr(form, "string").as_deref(), Some("Order"));
        assert_eq!(doc.element_children(form).len(), 2);
        assert_eq!(doc.indent_of(form), "            ");

        let field = doc.element_children(form)[0];
        assert_eq!(
            doc.attr(field, "attrs").as_deref(),
            Some("{'invisible': [('qty', '>', 0)]}")
        );
    }

    #[test]
    fn test_replace_and_render_new_elements() {
        let mut doc = Document::parse("<form><div class=\"x\">old</div></form>").unwrap();
        let div = doc
            .elements()
            .into_iter()
            .find(|&id| doc.is_element(id, "div"))
            .unwrap();

        let block = doc.new_element("block", &[("title", "A \"quoted\" title")]);
        let leaf = doc.new_element("setting", &[]);
        doc.append_child(block, leaf);
        doc.replace(div, block).unwrap();
        assert!(matches!(doc.replace(div, leaf), Err(TreeError::Detached(_))));

        assert_eq!(
            doc.to_markup(),
            "<form><block title=\"A &quot;quoted&quot; title\"><setting/></block></form>"
        );
    }
}
