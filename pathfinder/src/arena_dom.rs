//! Arena-based DOM built by html5ever.
//!
//! Both the sanitizer and the content walker operate on this representation:
//! - **indextree Arena**: all nodes in one contiguous arena, parent/child links by index
//! - **StrTendril**: text and attribute values share buffers with the parser's input
//! - **Fragment roots**: markup is parsed inside a container `<div>` so a fragment has
//!   exactly one root to walk

use html5ever::tree_builder::{ElemName, ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, LocalName, QualName, parse_document};
use indexmap::IndexMap;
use indextree::{Arena, NodeEdge, NodeId};
use std::borrow::Cow;
use std::cell::RefCell;
use tendril::{StrTendril, TendrilSink};

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";
const SVG_NS: &str = "http://www.w3.org/2000/svg";
const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";

/// A parsed document or fragment.
#[derive(Debug, Clone)]
pub struct Document {
    /// All nodes live here
    pub arena: Arena<NodeData>,

    /// `<html>` for documents, the container `<div>` for fragments
    pub root: NodeId,
}

impl Document {
    /// Get immutable reference to node data
    pub fn get(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    /// Get mutable reference to node data
    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.arena[id].get_mut()
    }

    /// Iterate children of a node
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Element children only
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
            .filter(move |&child| self.element(child).is_some())
    }

    /// Descendants in document order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena).skip(1)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    /// Get the `<body>` element if present
    pub fn body(&self) -> Option<NodeId> {
        self.root
            .children(&self.arena)
            .find(|&id| self.tag(id) == Some("body"))
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.get(id).kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.get_mut(id).kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    /// Local name of an element node
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|elem| elem.tag.as_ref())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|elem| elem.attr(name))
    }

    /// `attr` with empty values treated as absent
    pub fn non_empty_attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attr(id, name).filter(|value| !value.is_empty())
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|elem| elem.has_class(class))
    }

    /// First descendant element matching `pred`
    pub fn find_descendant(&self, id: NodeId, pred: impl Fn(&Self, NodeId) -> bool) -> Option<NodeId> {
        self.descendants(id)
            .find(|&node| self.element(node).is_some() && pred(self, node))
    }

    /// All descendant elements matching `pred`, in document order
    pub fn find_descendants(&self, id: NodeId, pred: impl Fn(&Self, NodeId) -> bool) -> Vec<NodeId> {
        self.descendants(id)
            .filter(|&node| self.element(node).is_some() && pred(self, node))
            .collect()
    }

    /// Concatenated text of every descendant text node
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in id.descendants(&self.arena) {
            if let NodeKind::Text(text) = &self.get(node).kind {
                out.push_str(text.as_ref());
            }
        }
        out
    }

    /// Serialize a node and its subtree
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_node(&mut out, id);
        out
    }

    /// Serialize the children of a node
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in id.children(&self.arena) {
            self.serialize_node(&mut out, child);
        }
        out
    }

    /// Detach a node (and its subtree) from the tree
    pub fn remove(&mut self, id: NodeId) {
        id.detach(&mut self.arena);
    }

    /// Replace an element with its children
    pub fn unwrap_node(&mut self, id: NodeId) {
        let children: Vec<NodeId> = id.children(&self.arena).collect();
        for child in children {
            child.detach(&mut self.arena);
            id.insert_before(child, &mut self.arena);
        }
        id.detach(&mut self.arena);
    }

    /// Walks start/end edges instead of recursing, so nesting depth is not
    /// bounded by the stack.
    fn serialize_node(&self, out: &mut String, node_id: NodeId) {
        for edge in node_id.traverse(&self.arena) {
            match edge {
                NodeEdge::Start(id) => self.open_node(out, id),
                NodeEdge::End(id) => self.close_node(out, id),
            }
        }
    }

    fn open_node(&self, out: &mut String, id: NodeId) {
        match &self.get(id).kind {
            NodeKind::Document => {}
            NodeKind::Element(elem) => {
                out.push('<');
                out.push_str(elem.tag.as_ref());
                for (name, value) in &elem.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_attr(out, value.as_ref());
                    out.push('"');
                }
                out.push('>');
            }
            NodeKind::Text(text) => {
                let raw = self
                    .parent(id)
                    .and_then(|parent| self.tag(parent))
                    .is_some_and(is_raw_text_element);
                if raw {
                    out.push_str(text.as_ref());
                } else {
                    escape_text(out, text.as_ref());
                }
            }
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text.as_ref());
                out.push_str("-->");
            }
        }
    }

    fn close_node(&self, out: &mut String, id: NodeId) {
        if let Some(tag) = self.tag(id)
            && !is_void_element(tag)
        {
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

/// HTML5 void elements that never have closing tags
fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_raw_text_element(tag: &str) -> bool {
    matches!(
        tag,
        "script" | "style" | "xmp" | "iframe" | "noembed" | "noframes" | "plaintext"
    )
}

/// What goes in each arena slot
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    pub ns: Namespace,
}

/// Node types
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Document root (invisible, parent of `<html>`)
    Document,
    /// Element with tag and attributes
    Element(ElementData),
    /// Text content (StrTendril is refcounted - cheap to clone)
    Text(StrTendril),
    /// HTML comment
    Comment(StrTendril),
}

/// Element data (tag + attributes)
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Local name as html5ever produced it (lowercase for HTML, adjusted case for SVG)
    pub tag: StrTendril,

    /// Attributes in source order. Keys are String to avoid clippy's
    /// mutable_key_type lint on tendrils.
    pub attrs: IndexMap<String, StrTendril>,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|value| value.as_ref())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        self.attrs
            .insert(name.to_owned(), StrTendril::from(value));
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<StrTendril> {
        self.attrs.shift_remove(name)
    }

    /// Whitespace-separated class token match
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }
}

/// XML namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Html,
    Svg,
    MathMl,
}

impl Namespace {
    pub fn from_url(url: &str) -> Self {
        match url {
            SVG_NS => Namespace::Svg,
            MATHML_NS => Namespace::MathMl,
            _ => Namespace::Html,
        }
    }

    pub fn url(&self) -> &'static str {
        match self {
            Namespace::Html => HTML_NS,
            Namespace::Svg => SVG_NS,
            Namespace::MathMl => MATHML_NS,
        }
    }
}

/// Parse a full HTML document
pub fn parse(html: &str) -> Document {
    let sink = ArenaSink::new();
    let tendril = StrTendril::from(html);
    parse_document(sink, Default::default()).one(tendril)
}

/// Parse markup as the content of a container `<div>`.
///
/// The returned document's `root` is the container. A stray `</div>` in the
/// input closes the container early; whatever html5ever then placed after it
/// in `<body>` is moved back inside so nothing is silently lost. Returns
/// `None` when no container element came out of the parse.
pub fn parse_fragment(html: &str) -> Option<Document> {
    let mut doc = parse(&format!("<div>{html}</div>"));
    let body = doc.body()?;
    let container = doc
        .children(body)
        .find(|&id| doc.tag(id) == Some("div"))?;

    let trailing: Vec<NodeId> = container.following_siblings(&doc.arena).skip(1).collect();
    for node in trailing {
        node.detach(&mut doc.arena);
        container.append(node, &mut doc.arena);
    }

    doc.root = container;
    Some(doc)
}

/// Owned element name wrapper
#[derive(Debug, Clone)]
struct OwnedElemName(QualName);

impl ElemName for OwnedElemName {
    fn ns(&self) -> &html5ever::Namespace {
        &self.0.ns
    }

    fn local_name(&self) -> &LocalName {
        &self.0.local
    }
}

/// TreeSink implementation for building the arena DOM
struct ArenaSink {
    /// Wrapped in RefCell for interior mutability, TreeSink takes `&self`
    arena: RefCell<Arena<NodeData>>,

    /// Document node (parent of `<html>`)
    document: NodeId,
}

impl ArenaSink {
    fn new() -> Self {
        let mut arena = Arena::new();
        let document = arena.new_node(NodeData {
            kind: NodeKind::Document,
            ns: Namespace::Html,
        });

        ArenaSink {
            arena: RefCell::new(arena),
            document,
        }
    }
}

impl TreeSink for ArenaSink {
    type Handle = NodeId;
    type Output = Document;
    type ElemName<'a>
        = OwnedElemName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        let arena = self.arena.into_inner();

        // Root element is usually <html>
        let root = self
            .document
            .children(&arena)
            .find(|&id| matches!(arena[id].get().kind, NodeKind::Element(_)))
            .unwrap_or(self.document);

        Document { arena, root }
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {
        // html5ever recovers on its own; browsers do the same
    }

    fn get_document(&self) -> Self::Handle {
        self.document
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn same_node(&self, a: &Self::Handle, b: &Self::Handle) -> bool {
        a == b
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> OwnedElemName {
        let arena = self.arena.borrow();
        let node = arena[*target].get();

        let (ns, local) = match &node.kind {
            NodeKind::Element(elem) => (node.ns.url(), elem.tag.as_ref()),
            _ => (HTML_NS, ""),
        };
        OwnedElemName(QualName::new(
            None,
            html5ever::Namespace::from(ns),
            LocalName::from(local),
        ))
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let tag = StrTendril::from(name.local.as_ref());
        let ns = Namespace::from_url(name.ns.as_ref());

        let attr_map: IndexMap<_, _> = attrs
            .into_iter()
            .map(|attr| (attr.name.local.to_string(), attr.value))
            .collect();

        self.arena.borrow_mut().new_node(NodeData {
            kind: NodeKind::Element(ElementData {
                tag,
                attrs: attr_map,
            }),
            ns,
        })
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        self.arena.borrow_mut().new_node(NodeData {
            kind: NodeKind::Comment(text),
            ns: Namespace::Html,
        })
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        self.arena.borrow_mut().new_node(NodeData {
            kind: NodeKind::Comment(StrTendril::new()),
            ns: Namespace::Html,
        })
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => {
                parent.append(node, &mut *arena);
            }
            NodeOrText::AppendText(text) => {
                // Merge with a preceding text node, as html5ever expects
                if let Some(last_child) = parent.children(&arena).next_back()
                    && let NodeKind::Text(existing) = &mut arena[last_child].get_mut().kind
                {
                    existing.push_tendril(&text);
                    return;
                }

                let text_node = arena.new_node(NodeData {
                    kind: NodeKind::Text(text),
                    ns: Namespace::Html,
                });
                parent.append(text_node, &mut arena);
            }
        }
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match new_node {
            NodeOrText::AppendNode(node) => {
                sibling.insert_before(node, &mut *arena);
            }
            NodeOrText::AppendText(text) => {
                let text_node = arena.new_node(NodeData {
                    kind: NodeKind::Text(text),
                    ns: Namespace::Html,
                });
                sibling.insert_before(text_node, &mut *arena);
            }
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = self.arena.borrow()[*element].parent().is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        // Template contents stay inline; the sanitizer never admits <template>
        *target
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        let mut arena = self.arena.borrow_mut();
        if let NodeKind::Element(elem) = &mut arena[*target].get_mut().kind {
            for attr in attrs {
                elem.attrs
                    .entry(attr.name.local.to_string())
                    .or_insert(attr.value);
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        target.detach(&mut self.arena.borrow_mut());
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut arena = self.arena.borrow_mut();
        let children: Vec<NodeId> = node.children(&*arena).collect();
        for child in children {
            child.detach(&mut *arena);
            new_parent.append(child, &mut *arena);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    // facet_testhelpers::test unavailable offline; std #[test] is used instead

    #[test]
    fn test_parse_simple_html() {
        let doc = parse("<html><body><p>Hello</p></body></html>");
        assert_eq!(doc.tag(doc.root), Some("html"));

        let body = doc.body().expect("should have body");
        let p = doc.children(body).next().expect("body should have child");
        assert_eq!(doc.tag(p), Some("p"));
        assert_eq!(doc.text_content(p), "Hello");
    }

    #[test]
    fn test_fragment_root_is_container() {
        let doc = parse_fragment(r#"<p class="lead intro">One</p><p>Two</p>"#)
            .expect("fragment should parse");
        assert_eq!(doc.tag(doc.root), Some("div"));
        let paragraphs: Vec<_> = doc.element_children(doc.root).collect();
        assert_eq!(paragraphs.len(), 2);
        assert!(doc.has_class(paragraphs[0], "intro"));
        assert!(!doc.has_class(paragraphs[0], "intr"));
    }

    #[test]
    fn test_fragment_keeps_content_after_stray_close() {
        let doc = parse_fragment("<p>a</p></div><p>b</p>").expect("fragment should parse");
        assert_eq!(doc.text_content(doc.root), "ab");
    }

    #[test]
    fn test_serialization_escapes() {
        let doc = parse_fragment(r#"<a title="x &quot;y&quot;">1 &lt; 2 &amp; 3</a><br>"#)
            .expect("fragment should parse");
        assert_eq!(
            doc.inner_html(doc.root),
            r#"<a title="x &quot;y&quot;">1 &lt; 2 &amp; 3</a><br>"#
        );
    }

    #[test]
    fn test_unwrap_keeps_children_in_place() {
        let mut doc = parse_fragment("<p>a<font>b<i>c</i></font>d</p>").expect("fragment should parse");
        let font = doc
            .find_descendant(doc.root, |d, id| d.tag(id) == Some("font"))
            .expect("font element");
        doc.unwrap_node(font);
        assert_eq!(doc.inner_html(doc.root), "<p>ab<i>c</i>d</p>");
    }

    #[test]
    fn test_svg_names_keep_case() {
        let doc = parse_fragment(r#"<svg viewBox="0 0 1 1"><foreignObject></foreignObject></svg>"#)
            .expect("fragment should parse");
        let svg = doc.element_children(doc.root).next().expect("svg");
        assert_eq!(doc.get(svg).ns, Namespace::Svg);
        assert_eq!(doc.attr(svg, "viewBox"), Some("0 0 1 1"));
        let inner = doc.element_children(svg).next().expect("foreignObject");
        assert_eq!(doc.tag(inner), Some("foreignObject"));
    }
}
