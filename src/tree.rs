//! Arena-backed template tree.
//!
//! Nodes live in a flat store keyed by [`NodeId`]. Parent and child links are
//! plain ids; the parent link is for navigation only and never owns anything.
//! A node is the child of at most one parent: attaching a node that already has
//! a parent detaches it first.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Index;

use crate::data::ContentKind;
use crate::expr::Expr;
use crate::id::{IdGenerator, NodeId};

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE LOCATIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub line: u32,
    pub column: u32,
}

impl Point {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Shifts the point, clamping at line/column 1.
    pub fn offset(self, lines: i32, columns: i32) -> Self {
        Self {
            line: shift(self.line, lines),
            column: shift(self.column, columns),
        }
    }

    pub fn as_location(self, file_path: &str) -> SourceLocation {
        SourceLocation {
            file_path: file_path.to_string(),
            begin: self,
            end: self,
        }
    }
}

fn shift(value: u32, by: i32) -> u32 {
    let shifted = i64::from(value) + i64::from(by);
    shifted.clamp(1, i64::from(u32::MAX)) as u32
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file_path: String,
    pub begin: Point,
    pub end: Point,
}

impl SourceLocation {
    pub fn new(file_path: &str, begin: Point, end: Point) -> Self {
        Self {
            file_path: file_path.to_string(),
            begin,
            end,
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn begin_point(&self) -> Point {
        self.begin
    }

    pub fn end_point(&self) -> Point {
        self.end
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE KINDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Whether a file belongs to the unit being compiled or is a dependency that
/// was compiled (and instrumented) on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Src,
    Dep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quotes {
    Double,
    Single,
    None,
}

impl Quotes {
    pub fn as_str(self) -> &'static str {
        match self {
            Quotes::Double => "\"",
            Quotes::Single => "'",
            Quotes::None => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VeLogNode {
    pub name: String,
    /// Assigned from the logging configuration before instrumentation.
    #[serde(default)]
    pub logging_id: Option<i64>,
    #[serde(default)]
    pub config: Option<Expr>,
    #[serde(default)]
    pub logonly: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NodeKind {
    FileSet,
    File {
        path: String,
        file_kind: FileKind,
    },
    Template {
        name: String,
        content_kind: ContentKind,
    },
    RawText {
        text: String,
    },
    Print {
        expr: Expr,
        implicit: bool,
    },
    /// Children are the tag's attributes and any control flow around them.
    HtmlOpenTag {
        tag_name: String,
        self_closing: bool,
    },
    HtmlCloseTag {
        tag_name: String,
    },
    /// Children: the name node, then the optional value node.
    HtmlAttribute,
    HtmlAttributeValue {
        quotes: Quotes,
    },
    If,
    IfCond {
        condition: Expr,
    },
    IfElse,
    LetContent {
        var_name: String,
    },
    VeLog(VeLogNode),
}

impl NodeKind {
    pub fn is_html_open_tag(&self) -> bool {
        matches!(self, NodeKind::HtmlOpenTag { .. })
    }

    pub fn is_template(&self) -> bool {
        matches!(self, NodeKind::Template { .. })
    }

    /// Expressions held directly by this node (not by its children).
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            NodeKind::Print { expr, .. } => vec![expr],
            NodeKind::IfCond { condition } => vec![condition],
            NodeKind::VeLog(v) => v.config.iter().chain(v.logonly.iter()).collect(),
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub location: SourceLocation,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREE
// ═══════════════════════════════════════════════════════════════════════════════

/// One compilation unit: the file-set root, every node reachable from it, and
/// the id generator that numbers them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoyTree {
    root: NodeId,
    nodes: BTreeMap<NodeId, Node>,
    id_gen: IdGenerator,
}

impl Default for SoyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SoyTree {
    pub fn new() -> Self {
        let mut id_gen = IdGenerator::new();
        let root = id_gen.gen_id();
        let mut nodes = BTreeMap::new();
        nodes.insert(
            root,
            Node {
                id: root,
                location: SourceLocation::unknown(),
                parent: None,
                children: vec![],
                kind: NodeKind::FileSet,
            },
        );
        Self {
            root,
            nodes,
            id_gen,
        }
    }

    /// Deserializes a tree and checks its links. The id generator is moved past
    /// the largest id in use, whatever `nextId` the payload carried.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut tree: SoyTree = serde_json::from_str(json)?;
        if let Some(problem) = tree.link_problem() {
            return Err(serde::de::Error::custom(problem));
        }
        let max_id = tree.nodes.keys().next_back().map_or(0, |id| id.0);
        let next = max_id
            .checked_add(1)
            .ok_or_else(|| <serde_json::Error as serde::de::Error>::custom("node ids exhausted"))?;
        tree.id_gen = IdGenerator::starting_at(next.max(tree.id_gen.peek().0));
        Ok(tree)
    }

    // Return Option, not Result: the first broken link found, if any.
    fn link_problem(&self) -> Option<String> {
        match self.nodes.get(&self.root) {
            None => return Some(format!("root {:?} is not in the node table", self.root)),
            Some(root) if root.parent.is_some() => {
                return Some(format!("root {:?} has a parent", self.root));
            }
            Some(_) => {}
        }
        for (key, node) in &self.nodes {
            if *key != node.id {
                return Some(format!("node {:?} is stored under key {:?}", node.id, key));
            }
            if let Some(parent) = node.parent {
                let listed = self
                    .nodes
                    .get(&parent)
                    .is_some_and(|p| p.children.contains(key));
                if !listed {
                    return Some(format!(
                        "node {key:?} names parent {parent:?}, which does not list it"
                    ));
                }
            }
            for child in &node.children {
                let points_back = self
                    .nodes
                    .get(child)
                    .is_some_and(|c| c.parent == Some(*key));
                if !points_back {
                    return Some(format!(
                        "node {key:?} lists child {child:?}, which is missing or detached"
                    ));
                }
            }
        }
        None
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn id_generator(&self) -> &IdGenerator {
        &self.id_gen
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self[id].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> Option<&mut NodeKind> {
        self.nodes.get_mut(&id).map(|n| &mut n.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Construction & mutation
    // ───────────────────────────────────────────────────────────────────────────

    /// Creates a detached node with a fresh id.
    pub fn create(&mut self, kind: NodeKind, location: SourceLocation) -> NodeId {
        let id = self.id_gen.gen_id();
        self.nodes.insert(
            id,
            Node {
                id,
                location,
                parent: None,
                children: vec![],
                kind,
            },
        );
        id
    }

    /// Creates a node and appends it to `parent`.
    pub fn append(&mut self, parent: NodeId, kind: NodeKind, location: SourceLocation) -> NodeId {
        let id = self.create(kind, location);
        self.add_child(parent, id);
        id
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child);
    }

    /// Inserts `child` at `index` among `parent`'s children, detaching it from
    /// its current parent first. `index` is clamped to the child count.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        debug_assert!(
            !self.is_ancestor_or_self(child, parent),
            "inserting {} under {} would create a cycle",
            child,
            parent
        );
        self.detach(child);
        if let Some(p) = self.nodes.get_mut(&parent) {
            let index = index.min(p.children.len());
            p.children.insert(index, child);
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
    }

    /// Removes `id` from its parent's child list. The node stays in the arena.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(n) = self.nodes.get_mut(&id) {
            n.parent = None;
        }
    }

    /// Puts `new` in `old`'s position. `old` is left detached in the arena.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        self.detach(new);
        let Some(index) = self.child_index(parent, old) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children[index] = new;
        }
        if let Some(n) = self.nodes.get_mut(&new) {
            n.parent = Some(parent);
        }
        if let Some(o) = self.nodes.get_mut(&old) {
            o.parent = None;
        }
    }

    /// Detaches `id` and drops it and its descendants from the arena.
    pub fn remove_subtree(&mut self, id: NodeId) {
        self.detach(id);
        for node in self.descendants(id) {
            self.nodes.remove(&node);
        }
    }

    /// Replaces `id` by its children, in order, within its parent.
    pub fn unwrap_node(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let Some(index) = self.child_index(parent, id) else {
            return;
        };
        let children = self.children(id).to_vec();
        for (offset, child) in children.into_iter().enumerate() {
            self.insert_child(parent, index + 1 + offset, child);
        }
        self.remove_subtree(id);
    }

    /// Deep-copies the subtree rooted at `id`. The copy is detached, every copied
    /// node gets a fresh id, and locations are copied by value.
    pub fn copy_subtree(&mut self, id: NodeId) -> Option<NodeId> {
        let mut id_gen = std::mem::take(&mut self.id_gen);
        let copy = self.copy_with(id, &mut id_gen);
        self.id_gen = id_gen;
        copy
    }

    fn copy_with(&mut self, id: NodeId, id_gen: &mut IdGenerator) -> Option<NodeId> {
        let original = self.get(id)?.clone();
        let copy_id = id_gen.gen_id();
        let mut children = Vec::with_capacity(original.children.len());
        for child in &original.children {
            if let Some(child_copy) = self.copy_with(*child, id_gen) {
                if let Some(n) = self.nodes.get_mut(&child_copy) {
                    n.parent = Some(copy_id);
                }
                children.push(child_copy);
            }
        }
        self.nodes.insert(
            copy_id,
            Node {
                id: copy_id,
                location: original.location,
                parent: None,
                children,
                kind: original.kind,
            },
        );
        Some(copy_id)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Queries
    // ───────────────────────────────────────────────────────────────────────────

    /// `id` and all of its descendants in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if self.get(next).is_none() {
                continue;
            }
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn find_all(&self, from: NodeId, pred: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
        self.descendants(from)
            .into_iter()
            .filter(|id| pred(self.kind(*id)))
            .collect()
    }

    /// Closest proper ancestor of `id` whose kind matches `pred`.
    pub fn nearest_ancestor(&self, id: NodeId, pred: impl Fn(&NodeKind) -> bool) -> Option<NodeId> {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if pred(self.kind(p)) {
                return Some(p);
            }
            current = self.parent(p);
        }
        None
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == candidate {
                return true;
            }
            current = self.parent(c);
        }
        false
    }
}

impl Index<NodeId> for SoyTree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        match self.nodes.get(&id) {
            Some(node) => node,
            None => panic!("node {} is not in this tree", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(tree: &mut SoyTree, parent: NodeId, text: &str) -> NodeId {
        tree.append(
            parent,
            NodeKind::RawText {
                text: text.to_string(),
            },
            SourceLocation::unknown(),
        )
    }

    #[test]
    fn test_reparenting_detaches_from_old_parent() {
        let mut tree = SoyTree::new();
        let root = tree.root();
        let a = tree.append(root, NodeKind::If, SourceLocation::unknown());
        let b = tree.append(root, NodeKind::If, SourceLocation::unknown());
        let text = raw(&mut tree, a, "x");

        tree.add_child(b, text);

        assert!(tree.children(a).is_empty());
        assert_eq!(tree.children(b), &[text]);
        assert_eq!(tree.parent(text), Some(b));
    }

    #[test]
    fn test_copy_assigns_fresh_ids_and_keeps_locations() {
        let mut tree = SoyTree::new();
        let root = tree.root();
        let loc = SourceLocation::new("a.soy", Point::new(3, 4), Point::new(3, 9));
        let tag = tree.append(
            root,
            NodeKind::HtmlOpenTag {
                tag_name: "div".to_string(),
                self_closing: false,
            },
            loc.clone(),
        );
        let text = raw(&mut tree, tag, "hi");

        let copy = tree.copy_subtree(tag).unwrap();

        assert_ne!(copy, tag);
        assert_eq!(tree[copy].location, loc);
        assert_eq!(tree.parent(copy), None);
        let copied_child = tree.children(copy)[0];
        assert_ne!(copied_child, text);
        assert_eq!(tree.parent(copied_child), Some(copy));
        assert_eq!(tree.kind(copied_child), tree.kind(text));
    }

    #[test]
    fn test_unwrap_splices_children_in_place() {
        let mut tree = SoyTree::new();
        let root = tree.root();
        let first = raw(&mut tree, root, "1");
        let wrapper = tree.append(root, NodeKind::If, SourceLocation::unknown());
        let last = raw(&mut tree, root, "4");
        let a = raw(&mut tree, wrapper, "2");
        let b = raw(&mut tree, wrapper, "3");

        tree.unwrap_node(wrapper);

        assert_eq!(tree.children(root), &[first, a, b, last]);
        assert!(tree.get(wrapper).is_none());
        assert_eq!(tree.parent(a), Some(root));
    }

    #[test]
    fn test_replace_child_and_remove_subtree() {
        let mut tree = SoyTree::new();
        let root = tree.root();
        let old = tree.append(root, NodeKind::If, SourceLocation::unknown());
        let inner = raw(&mut tree, old, "x");
        let new = tree.create(NodeKind::IfElse, SourceLocation::unknown());

        tree.replace_child(root, old, new);
        tree.remove_subtree(old);

        assert_eq!(tree.children(root), &[new]);
        assert!(tree.get(old).is_none());
        assert!(tree.get(inner).is_none());
    }

    #[test]
    fn test_nearest_ancestor() {
        let mut tree = SoyTree::new();
        let root = tree.root();
        let tag = tree.append(
            root,
            NodeKind::HtmlOpenTag {
                tag_name: "a".to_string(),
                self_closing: false,
            },
            SourceLocation::unknown(),
        );
        let cond = tree.append(tag, NodeKind::If, SourceLocation::unknown());
        let text = raw(&mut tree, cond, "x");
        assert_eq!(tree.nearest_ancestor(text, NodeKind::is_html_open_tag), Some(tag));
        assert_eq!(tree.nearest_ancestor(tag, NodeKind::is_html_open_tag), None);
    }

    #[test]
    fn test_point_offset_clamps() {
        assert_eq!(Point::new(2, 10).offset(0, -2), Point::new(2, 8));
        assert_eq!(Point::new(1, 1).offset(0, -2), Point::new(1, 1));
    }

    #[test]
    fn test_json_round_trip_preserves_generator() {
        let mut tree = SoyTree::new();
        let root = tree.root();
        raw(&mut tree, root, "x");
        let restored = SoyTree::from_json(&tree.to_json().unwrap()).unwrap();
        assert_eq!(restored, tree);
        assert_eq!(restored.id_generator().peek(), tree.id_generator().peek());
    }

    #[test]
    fn test_stale_next_id_is_moved_past_existing_nodes() {
        let mut tree = SoyTree::new();
        let root = tree.root();
        let a = raw(&mut tree, root, "a");
        let b = raw(&mut tree, root, "b");
        let mut value: serde_json::Value =
            serde_json::from_str(&tree.to_json().unwrap()).unwrap();
        value["idGen"]["nextId"] = serde_json::json!(1);

        let mut restored = SoyTree::from_json(&value.to_string()).unwrap();
        assert!(restored.id_generator().peek() > b);

        let c = raw(&mut restored, root, "c");
        assert!(c != a && c != b);
        assert_eq!(restored.children(root), &[a, b, c]);
        assert_eq!(restored.kind(a), &NodeKind::RawText { text: "a".to_string() });
        assert_eq!(restored.kind(b), &NodeKind::RawText { text: "b".to_string() });
    }

    #[test]
    fn test_from_json_rejects_broken_links() {
        let mut tree = SoyTree::new();
        let root = tree.root();
        let a = raw(&mut tree, root, "a");
        let json: serde_json::Value = serde_json::from_str(&tree.to_json().unwrap()).unwrap();

        let mut dangling = json.clone();
        dangling["nodes"][root.0.to_string()]["children"] = serde_json::json!([a.0, 99]);
        assert!(SoyTree::from_json(&dangling.to_string()).is_err());

        let mut orphaned = json.clone();
        orphaned["nodes"][a.0.to_string()]["parent"] = serde_json::json!(42);
        assert!(SoyTree::from_json(&orphaned.to_string()).is_err());

        let mut rootless = json;
        rootless["root"] = serde_json::json!(a.0 + 10);
        assert!(SoyTree::from_json(&rootless.to_string()).is_err());
    }
}
