use crate::id::NodeId;
use crate::tree::{NodeKind, SoyTree};
use crate::validate::CompilerError;

pub type VisitResult = Result<(), CompilerError>;

/// The SoyTreeVisitor trait defines the single authoritative traversal mechanism for template
/// trees.
///
/// Rules:
/// 1. Traversal order is pre-order and fixed.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers MUST call `walk_*` functions to continue traversal unless pruning is intended.
/// 4. Child lists are snapshotted before iteration. A visitor may insert siblings
///    or append children while a parent is being walked; nodes added that way
///    are not visited in the same walk, and nodes removed are skipped.
pub trait SoyTreeVisitor {
    fn visit_node(&mut self, tree: &mut SoyTree, id: NodeId) -> VisitResult {
        walk_node(self, tree, id)
    }

    fn visit_file(&mut self, tree: &mut SoyTree, id: NodeId) -> VisitResult {
        walk_children(self, tree, id)
    }

    fn visit_template(&mut self, tree: &mut SoyTree, id: NodeId) -> VisitResult {
        walk_children(self, tree, id)
    }

    fn visit_html_open_tag(&mut self, tree: &mut SoyTree, id: NodeId) -> VisitResult {
        walk_children(self, tree, id)
    }

    fn visit_html_attribute(&mut self, tree: &mut SoyTree, id: NodeId) -> VisitResult {
        walk_children(self, tree, id)
    }

    fn visit_velog(&mut self, tree: &mut SoyTree, id: NodeId) -> VisitResult {
        walk_children(self, tree, id)
    }

    fn visit_children(&mut self, tree: &mut SoyTree, id: NodeId) -> VisitResult {
        walk_children(self, tree, id)
    }
}

#[derive(Clone, Copy)]
enum Dispatch {
    File,
    Template,
    HtmlOpenTag,
    HtmlAttribute,
    VeLog,
    Other,
}

fn dispatch_of(kind: &NodeKind) -> Dispatch {
    match kind {
        NodeKind::File { .. } => Dispatch::File,
        NodeKind::Template { .. } => Dispatch::Template,
        NodeKind::HtmlOpenTag { .. } => Dispatch::HtmlOpenTag,
        NodeKind::HtmlAttribute => Dispatch::HtmlAttribute,
        NodeKind::VeLog(_) => Dispatch::VeLog,
        _ => Dispatch::Other,
    }
}

pub fn walk_root<V: SoyTreeVisitor + ?Sized>(visitor: &mut V, tree: &mut SoyTree) -> VisitResult {
    let root = tree.root();
    visitor.visit_children(tree, root)
}

pub fn walk_node<V: SoyTreeVisitor + ?Sized>(
    visitor: &mut V,
    tree: &mut SoyTree,
    id: NodeId,
) -> VisitResult {
    let Some(node) = tree.get(id) else {
        return Ok(());
    };
    match dispatch_of(&node.kind) {
        Dispatch::File => visitor.visit_file(tree, id),
        Dispatch::Template => visitor.visit_template(tree, id),
        Dispatch::HtmlOpenTag => visitor.visit_html_open_tag(tree, id),
        Dispatch::HtmlAttribute => visitor.visit_html_attribute(tree, id),
        Dispatch::VeLog => visitor.visit_velog(tree, id),
        Dispatch::Other => visitor.visit_children(tree, id),
    }
}

pub fn walk_children<V: SoyTreeVisitor + ?Sized>(
    visitor: &mut V,
    tree: &mut SoyTree,
    id: NodeId,
) -> VisitResult {
    let snapshot = tree.children(id).to_vec();
    for child in snapshot {
        if tree.get(child).is_some() {
            visitor.visit_node(tree, child)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::SourceLocation;

    /// Appends a sibling after every raw text node it sees.
    struct SiblingInserter {
        seen: Vec<String>,
    }

    impl SoyTreeVisitor for SiblingInserter {
        fn visit_node(&mut self, tree: &mut SoyTree, id: NodeId) -> VisitResult {
            if let NodeKind::RawText { text } = tree.kind(id) {
                self.seen.push(text.clone());
                let parent = tree.parent(id).unwrap();
                tree.append(
                    parent,
                    NodeKind::RawText {
                        text: format!("{}'", text),
                    },
                    SourceLocation::unknown(),
                );
                return Ok(());
            }
            walk_node(self, tree, id)
        }
    }

    #[test]
    fn test_insertions_during_walk_are_not_revisited() {
        let mut tree = SoyTree::new();
        let root = tree.root();
        for text in ["a", "b"] {
            tree.append(
                root,
                NodeKind::RawText {
                    text: text.to_string(),
                },
                SourceLocation::unknown(),
            );
        }

        let mut visitor = SiblingInserter { seen: vec![] };
        walk_root(&mut visitor, &mut tree).unwrap();

        assert_eq!(visitor.seen, vec!["a", "b"]);
        assert_eq!(tree.children(root).len(), 4);
    }
}
