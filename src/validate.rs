use serde::{Deserialize, Serialize};

use crate::expr::{Expr, LoggingFunction};
use crate::id::NodeId;
use crate::tree::{FileKind, NodeKind, SoyTree};

// ═══════════════════════════════════════════════════════════════════════════════
// INVARIANT CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const INV_VELOG_FIRST_CHILD: &str = "VELOG001";
pub const INV_MULTIPLE_LOGGING_FUNCTIONS: &str = "VELOG002";
pub const INV_MISSING_LOGGING_ID: &str = "VELOG003";
pub const INV_ATTRIBUTE_WITHOUT_NAME: &str = "VELOG004";
pub const INV_NO_INSERTION_TARGET: &str = "VELOG005";

// ═══════════════════════════════════════════════════════════════════════════════
// GUARANTEES
// ═══════════════════════════════════════════════════════════════════════════════

fn get_guarantee(code: &str) -> &'static str {
    match code {
        INV_VELOG_FIRST_CHILD => "The first child of a {velog} block is an HTML open tag.",
        INV_MULTIPLE_LOGGING_FUNCTIONS => {
            "An HTML attribute value contains at most one logging function call."
        }
        INV_MISSING_LOGGING_ID => {
            "Every {velog} block has a logging id assigned from the logging configuration."
        }
        INV_ATTRIBUTE_WITHOUT_NAME => "Every HTML attribute has a name.",
        INV_NO_INSERTION_TARGET => {
            "A logging function attribute is always inside an open tag or a template."
        }
        _ => "Unknown invariant.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// An upstream contract was broken. These are internal faults: the validation
/// passes that run before instrumentation reject every authoring error, so a
/// `CompilerError` here means a compiler bug, not a template bug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{code}: {message} ({file}:{line}:{column})")]
pub struct CompilerError {
    pub code: String,
    pub error_type: String,
    pub message: String,
    pub guarantee: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub context: Option<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        Self::with_context(code, message, file, line, column, None)
    }

    pub fn with_context(
        code: &str,
        message: &str,
        file: &str,
        line: u32,
        column: u32,
        context: Option<String>,
    ) -> Self {
        CompilerError {
            code: code.to_string(),
            error_type: "INTERNAL_COMPILER_FAULT".to_string(),
            message: message.to_string(),
            guarantee: get_guarantee(code).to_string(),
            file: file.to_string(),
            line,
            column,
            context,
        }
    }

    /// Error positioned at `node`'s start.
    pub fn at_node(code: &str, message: &str, tree: &SoyTree, node: NodeId) -> Self {
        let location = &tree[node].location;
        Self::with_context(
            code,
            message,
            &location.file_path,
            location.begin.line,
            location.begin.column,
            Some(crate::printer::to_source_string(tree, node)),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOGGING FUNCTION LOOKUP
// ═══════════════════════════════════════════════════════════════════════════════

/// A logging function call found in an attribute value.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingCall {
    pub function: LoggingFunction,
    pub args: Vec<Expr>,
}

/// The value node of an attribute, when it has one.
pub fn attribute_value(tree: &SoyTree, attribute: NodeId) -> Option<NodeId> {
    tree.child(attribute, 1)
}

/// Every logging function call in the expressions of `attribute`'s value
/// subtree, in document order.
pub fn logging_calls_in_value(tree: &SoyTree, attribute: NodeId) -> Vec<LoggingCall> {
    let Some(value) = attribute_value(tree, attribute) else {
        return vec![];
    };
    let mut calls = Vec::new();
    for node in tree.descendants(value) {
        for expr in tree.kind(node).exprs() {
            for (function, args) in expr.logging_calls() {
                calls.push(LoggingCall {
                    function: function.clone(),
                    args: args.to_vec(),
                });
            }
        }
    }
    calls
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION FUNCTIONS (Return Option, not Result)
// ═══════════════════════════════════════════════════════════════════════════════

fn validate_velog(tree: &SoyTree, velog: NodeId) -> Option<CompilerError> {
    let NodeKind::VeLog(data) = tree.kind(velog) else {
        return None;
    };
    if data.logging_id.is_none() {
        return Some(CompilerError::at_node(
            INV_MISSING_LOGGING_ID,
            &format!("{{velog {}}} has no logging id.", data.name),
            tree,
            velog,
        ));
    }
    let first_is_open_tag = tree
        .child(velog, 0)
        .map(|c| tree.kind(c).is_html_open_tag())
        .unwrap_or(false);
    if !first_is_open_tag {
        return Some(CompilerError::at_node(
            INV_VELOG_FIRST_CHILD,
            &format!(
                "The first child of {{velog {}}} is not an HTML open tag.",
                data.name
            ),
            tree,
            velog,
        ));
    }
    None
}

fn validate_attribute(tree: &SoyTree, attribute: NodeId) -> Option<CompilerError> {
    let calls = logging_calls_in_value(tree, attribute);
    if calls.is_empty() {
        return None;
    }
    if calls.len() > 1 {
        let names: Vec<&str> = calls.iter().map(|c| c.function.name.as_str()).collect();
        return Some(CompilerError::at_node(
            INV_MULTIPLE_LOGGING_FUNCTIONS,
            &format!(
                "Attribute value calls {} logging functions: {}.",
                calls.len(),
                names.join(", ")
            ),
            tree,
            attribute,
        ));
    }
    if tree.child(attribute, 0).is_none() {
        return Some(CompilerError::at_node(
            INV_ATTRIBUTE_WITHOUT_NAME,
            "Attribute with a logging function has no name.",
            tree,
            attribute,
        ));
    }
    let has_target = tree
        .nearest_ancestor(attribute, |k| k.is_html_open_tag() || k.is_template())
        .is_some();
    if !has_target {
        return Some(CompilerError::at_node(
            INV_NO_INSERTION_TARGET,
            "Logging function attribute is outside any open tag or template.",
            tree,
            attribute,
        ));
    }
    None
}

/// Checks every contract the instrumentation pass relies on, across all source
/// files, before anything is mutated. Dependency files are not inspected.
pub fn validate_instrumentable(tree: &SoyTree) -> Option<CompilerError> {
    for file in tree.children(tree.root()) {
        if let NodeKind::File {
            file_kind: FileKind::Dep,
            ..
        } = tree.kind(*file)
        {
            continue;
        }
        for node in tree.descendants(*file) {
            let error = match tree.kind(node) {
                NodeKind::VeLog(_) => validate_velog(tree, node),
                NodeKind::HtmlAttribute => validate_attribute(tree, node),
                _ => None,
            };
            if error.is_some() {
                return error;
            }
        }
    }
    None
}
