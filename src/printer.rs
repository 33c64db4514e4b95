//! Renders a tree back to template source, for diagnostics and tests.

use crate::data::ContentKind;
use crate::id::NodeId;
use crate::tree::{FileKind, NodeKind, SoyTree};

pub fn to_source_string(tree: &SoyTree, id: NodeId) -> String {
    let mut out = String::new();
    write_node(tree, id, &mut out);
    out
}

fn write_children(tree: &SoyTree, id: NodeId, out: &mut String) {
    for child in tree.children(id) {
        write_node(tree, *child, out);
    }
}

fn write_node(tree: &SoyTree, id: NodeId, out: &mut String) {
    let Some(node) = tree.get(id) else {
        return;
    };
    match &node.kind {
        NodeKind::FileSet => {
            for (i, child) in node.children.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                write_node(tree, *child, out);
            }
        }
        NodeKind::File { path, file_kind } => {
            let marker = match file_kind {
                FileKind::Src => "",
                FileKind::Dep => " (dep)",
            };
            out.push_str(&format!("// {}{}\n", path, marker));
            write_children(tree, id, out);
        }
        NodeKind::Template { name, content_kind } => {
            out.push_str(&format!("{{template {}", name));
            if *content_kind != ContentKind::Html {
                out.push_str(&format!(" kind=\"{}\"", content_kind_name(*content_kind)));
            }
            out.push('}');
            write_children(tree, id, out);
            out.push_str("{/template}");
        }
        NodeKind::RawText { text } => out.push_str(text),
        NodeKind::Print { expr, implicit } => {
            if *implicit {
                out.push_str(&format!("{{{}}}", expr.to_source_string()));
            } else {
                out.push_str(&format!("{{print {}}}", expr.to_source_string()));
            }
        }
        NodeKind::HtmlOpenTag {
            tag_name,
            self_closing,
        } => {
            out.push('<');
            out.push_str(tag_name);
            for child in &node.children {
                out.push(' ');
                write_node(tree, *child, out);
            }
            out.push_str(if *self_closing { "/>" } else { ">" });
        }
        NodeKind::HtmlCloseTag { tag_name } => out.push_str(&format!("</{}>", tag_name)),
        NodeKind::HtmlAttribute => {
            if let Some(name) = tree.child(id, 0) {
                write_node(tree, name, out);
            }
            if let Some(value) = tree.child(id, 1) {
                out.push('=');
                write_node(tree, value, out);
            }
        }
        NodeKind::HtmlAttributeValue { quotes } => {
            out.push_str(quotes.as_str());
            write_children(tree, id, out);
            out.push_str(quotes.as_str());
        }
        NodeKind::If => {
            write_children(tree, id, out);
            out.push_str("{/if}");
        }
        NodeKind::IfCond { condition } => {
            let is_first = tree
                .parent(id)
                .and_then(|p| tree.child(p, 0))
                .map(|first| first == id)
                .unwrap_or(true);
            let keyword = if is_first { "if" } else { "elseif" };
            out.push_str(&format!("{{{} {}}}", keyword, condition.to_source_string()));
            write_children(tree, id, out);
        }
        NodeKind::IfElse => {
            out.push_str("{else}");
            write_children(tree, id, out);
        }
        NodeKind::LetContent { var_name } => {
            out.push_str(&format!("{{let ${}}}", var_name));
            write_children(tree, id, out);
            out.push_str("{/let}");
        }
        NodeKind::VeLog(data) => {
            out.push_str(&format!("{{velog {}", data.name));
            if let Some(config) = &data.config {
                out.push_str(&format!(" data=\"{}\"", config.to_source_string()));
            }
            if let Some(logonly) = &data.logonly {
                out.push_str(&format!(" logonly=\"{}\"", logonly.to_source_string()));
            }
            out.push('}');
            write_children(tree, id, out);
            out.push_str("{/velog}");
        }
    }
}

fn content_kind_name(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Html => "html",
        ContentKind::Attributes => "attributes",
        ContentKind::Js => "js",
        ContentKind::Uri => "uri",
        ContentKind::TrustedResourceUri => "trusted_resource_uri",
        ContentKind::Css => "css",
        ContentKind::Text => "text",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::tree::{SourceLocation, VeLogNode};

    #[test]
    fn test_velog_source_string() {
        let mut tree = SoyTree::new();
        let root = tree.root();
        let velog = tree.append(
            root,
            NodeKind::VeLog(VeLogNode {
                name: "Bar".to_string(),
                logging_id: Some(1),
                config: Some(Expr::ProtoInit {
                    type_name: "soy.test.Foo".to_string(),
                    fields: vec![],
                }),
                logonly: Some(Expr::Bool { value: false }),
            }),
            SourceLocation::unknown(),
        );
        tree.append(
            velog,
            NodeKind::HtmlOpenTag {
                tag_name: "div".to_string(),
                self_closing: false,
            },
            SourceLocation::unknown(),
        );
        tree.append(
            velog,
            NodeKind::HtmlCloseTag {
                tag_name: "div".to_string(),
            },
            SourceLocation::unknown(),
        );

        assert_eq!(
            to_source_string(&tree, velog),
            "{velog Bar data=\"soy.test.Foo()\" logonly=\"false\"}<div></div>{/velog}"
        );
    }
}
