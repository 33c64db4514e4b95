//! # Logging Instrumentation Pass
//!
//! Rewrites `{velog}` blocks and attribute-embedded logging function calls into
//! ordinary nodes that every backend already understands.
//!
//! ```text
//! {velog Bar data="$cfg"}<div>...</div>{/velog}
//!   => <div {if $$hasLoggingMetadata()}{'data-' + xid('soylog')}={$$makeLoggingMarker(1, $cfg)}{/if}>...</div>
//!
//! <a href="{track(1)}">
//!   => <a href="<placeholder>" {if $$hasLoggingMetadata()}{'data-' + xid('soyloggingfunction-') + '0'}=
//!        {$$renderLoggingAttribute('track', [1], 'href')}{/if}>
//! ```
//!
//! ## Invariants
//!
//! 1. Only `Src` files are rewritten. `Dep` files were instrumented when they
//!    were compiled themselves.
//! 2. Every contract the pass relies on is checked by
//!    [`validate_instrumentable`] before the first mutation, so a unit is either
//!    fully rewritten or returned untouched.
//! 3. The synthetic counter resets on every template and nowhere else, so all
//!    synthetic names within one template are distinct.
//! 4. Logging function arguments are copied into the synthetic call and
//!    evaluated again at render time. They must be side-effect free; this is not
//!    checked.
//! 5. `{velog}` wrappers are removed after rewriting. A second run over an
//!    instrumented tree finds nothing to do.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, trace};

use crate::expr::{BuiltinFunction, Expr};
use crate::id::{NodeId, SyntheticCounter};
use crate::tree::{FileKind, NodeKind, Quotes, SoyTree, SourceLocation};
use crate::validate::{
    attribute_value, logging_calls_in_value, validate_instrumentable, CompilerError,
    INV_ATTRIBUTE_WITHOUT_NAME, INV_MISSING_LOGGING_ID, INV_NO_INSERTION_TARGET,
    INV_VELOG_FIRST_CHILD,
};
use crate::visitor::{walk_children, walk_root, SoyTreeVisitor, VisitResult};

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstrumentOptions {
    /// Prefix of every synthetic attribute name.
    pub data_attribute_prefix: String,
    /// xid key of the attribute carrying the velog marker.
    pub marker_key: String,
    /// xid key of logging function attributes; the counter value is appended.
    pub logging_function_key: String,
    /// Name prefix of let variables holding computed attribute names.
    pub let_variable_prefix: String,
}

impl Default for InstrumentOptions {
    fn default() -> Self {
        Self {
            data_attribute_prefix: "data-".to_string(),
            marker_key: "soylog".to_string(),
            logging_function_key: "soyloggingfunction-".to_string(),
            let_variable_prefix: "soy_logging_function_attribute_".to_string(),
        }
    }
}

impl InstrumentOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentReport {
    pub files_instrumented: usize,
    pub velog_blocks: usize,
    pub logging_function_attributes: usize,
    pub let_bindings: usize,
}

impl InstrumentReport {
    pub fn is_noop(&self) -> bool {
        self.velog_blocks == 0 && self.logging_function_attributes == 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Instruments every source file of one compilation unit.
pub fn instrument_file_set(
    tree: &mut SoyTree,
    options: &InstrumentOptions,
) -> Result<InstrumentReport, CompilerError> {
    let span = info_span!("instrument_file_set", files = tree.children(tree.root()).len());
    let _enter = span.enter();

    if let Some(error) = validate_instrumentable(tree) {
        debug!(code = %error.code, "preflight rejected file set");
        return Err(error);
    }

    let mut visitor = VeLogInstrumentationVisitor::new(options);
    walk_root(&mut visitor, tree)?;

    let report = visitor.report;
    info!(
        files = report.files_instrumented,
        velog_blocks = report.velog_blocks,
        logging_function_attributes = report.logging_function_attributes,
        "instrumentation finished"
    );
    Ok(report)
}

/// Instruments independent compilation units in parallel. Each unit owns its
/// tree and id generator, so no state is shared between workers.
pub fn instrument_file_sets_parallel(
    units: &mut [SoyTree],
    options: &InstrumentOptions,
) -> Vec<Result<InstrumentReport, CompilerError>> {
    units
        .par_iter_mut()
        .map(|tree| instrument_file_set(tree, options))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// VISITOR
// ═══════════════════════════════════════════════════════════════════════════════

struct VeLogInstrumentationVisitor<'a> {
    options: &'a InstrumentOptions,
    /// Source of unique synthetic names within the current template.
    counter: SyntheticCounter,
    report: InstrumentReport,
}

impl<'a> VeLogInstrumentationVisitor<'a> {
    fn new(options: &'a InstrumentOptions) -> Self {
        Self {
            options,
            counter: SyntheticCounter::default(),
            report: InstrumentReport::default(),
        }
    }

    fn xid(&self, key: &str) -> Expr {
        Expr::builtin(BuiltinFunction::Xid, vec![Expr::string(key)])
    }

    /// Adds the velog marker attribute to the block's root open tag.
    fn instrument_velog(&mut self, tree: &mut SoyTree, velog: NodeId) -> VisitResult {
        let NodeKind::VeLog(data) = tree.kind(velog).clone() else {
            return Ok(());
        };
        let Some(logging_id) = data.logging_id else {
            return Err(CompilerError::at_node(
                INV_MISSING_LOGGING_ID,
                &format!("{{velog {}}} has no logging id.", data.name),
                tree,
                velog,
            ));
        };
        let (tag, self_closing) = match tree.child(velog, 0).map(|c| (c, tree.kind(c))) {
            Some((c, NodeKind::HtmlOpenTag { self_closing, .. })) => (c, *self_closing),
            _ => {
                return Err(CompilerError::at_node(
                    INV_VELOG_FIRST_CHILD,
                    &format!(
                        "The first child of {{velog {}}} is not an HTML open tag.",
                        data.name
                    ),
                    tree,
                    velog,
                ))
            }
        };

        // Just before `/>` or `>`.
        let tag_location = &tree[tag].location;
        let insertion = tag_location
            .end_point()
            .offset(0, if self_closing { -2 } else { -1 })
            .as_location(&tag_location.file_path);

        let mut args = vec![Expr::int(logging_id), data.config.unwrap_or(Expr::Null)];
        if let Some(logonly) = data.logonly {
            args.push(logonly);
        }
        let marker = Expr::builtin(BuiltinFunction::MakeLoggingMarker, args);
        let name = Expr::plus(
            Expr::string(&self.options.data_attribute_prefix),
            self.xid(&self.options.marker_key),
        );

        let attribute = create_html_attribute(tree, name, marker, &insertion);
        let if_node = create_if_has_metadata(tree, attribute, &insertion);
        tree.add_child(tag, if_node);

        self.report.velog_blocks += 1;
        debug!(name = %data.name, logging_id, tag = %tag, "instrumented velog block");
        Ok(())
    }

    /// Replaces a logging function call in an attribute value with its
    /// placeholder and appends the synthetic attribute carrying the real call.
    fn instrument_attribute(&mut self, tree: &mut SoyTree, attribute: NodeId) -> VisitResult {
        let Some(value) = attribute_value(tree, attribute) else {
            return Ok(());
        };
        // At most one call per attribute value; validated before the walk.
        let Some(call) = logging_calls_in_value(tree, attribute).into_iter().next() else {
            return Ok(());
        };
        let Some(name_node) = tree.child(attribute, 0) else {
            return Err(CompilerError::at_node(
                INV_ATTRIBUTE_WITHOUT_NAME,
                "Attribute with a logging function has no name.",
                tree,
                attribute,
            ));
        };
        let location = tree[attribute].location.clone();
        let open_tag = tree.nearest_ancestor(attribute, NodeKind::is_html_open_tag);
        let Some(target) =
            open_tag.or_else(|| tree.nearest_ancestor(attribute, NodeKind::is_template))
        else {
            return Err(CompilerError::at_node(
                INV_NO_INSERTION_TARGET,
                "Logging function attribute is outside any open tag or template.",
                tree,
                attribute,
            ));
        };

        let counter = self.counter.post_increment();

        let literal_name = match tree.kind(name_node) {
            NodeKind::RawText { text } => Some(text.clone()),
            _ => None,
        };
        let attribute_name = match literal_name {
            Some(text) => Expr::string(text),
            None => {
                let var_name = format!("{}{}", self.options.let_variable_prefix, counter);
                self.hoist_attribute_name(
                    tree,
                    attribute,
                    name_node,
                    open_tag,
                    &var_name,
                    &location,
                );
                Expr::var(var_name)
            }
        };

        let render_call = Expr::builtin(
            BuiltinFunction::RenderLoggingAttribute,
            vec![
                Expr::string(&call.function.name),
                Expr::list(call.args),
                attribute_name,
            ],
        );
        let name = Expr::plus(
            Expr::string(&self.options.data_attribute_prefix),
            Expr::plus(
                self.xid(&self.options.logging_function_key),
                Expr::string(counter.to_string()),
            ),
        );
        let synthetic = create_html_attribute(tree, name, render_call, &location);
        let if_node = create_if_has_metadata(tree, synthetic, &location);
        tree.add_child(target, if_node);

        let placeholder = tree.create(
            NodeKind::HtmlAttributeValue {
                quotes: Quotes::Double,
            },
            location.clone(),
        );
        tree.append(
            placeholder,
            NodeKind::RawText {
                text: call.function.placeholder.clone(),
            },
            location,
        );
        tree.replace_child(attribute, value, placeholder);
        tree.remove_subtree(value);

        self.report.logging_function_attributes += 1;
        debug!(
            function = %call.function.name,
            attribute = %attribute,
            counter,
            "instrumented logging function attribute"
        );
        Ok(())
    }

    /// Moves a computed attribute name into a let binding placed before the
    /// enclosing open tag (or before the attribute when there is none) and makes
    /// the attribute print the variable instead.
    fn hoist_attribute_name(
        &mut self,
        tree: &mut SoyTree,
        attribute: NodeId,
        name_node: NodeId,
        open_tag: Option<NodeId>,
        var_name: &str,
        location: &SourceLocation,
    ) {
        let let_location = tree[name_node].location.clone();
        let let_node = tree.create(
            NodeKind::LetContent {
                var_name: var_name.to_string(),
            },
            let_location,
        );
        let reference = tree.create(
            NodeKind::Print {
                expr: Expr::var(var_name),
                implicit: true,
            },
            location.clone(),
        );
        tree.replace_child(attribute, name_node, reference);
        tree.add_child(let_node, name_node);

        let anchor = open_tag.unwrap_or(attribute);
        if let Some(parent) = tree.parent(anchor) {
            let index = tree.child_index(parent, anchor).unwrap_or(0);
            tree.insert_child(parent, index, let_node);
        }
        self.report.let_bindings += 1;
    }
}

impl SoyTreeVisitor for VeLogInstrumentationVisitor<'_> {
    fn visit_file(&mut self, tree: &mut SoyTree, id: NodeId) -> VisitResult {
        if let NodeKind::File {
            path,
            file_kind: FileKind::Dep,
        } = tree.kind(id)
        {
            trace!(path = %path, "skipping dependency file");
            return Ok(());
        }
        self.report.files_instrumented += 1;
        walk_children(self, tree, id)
    }

    fn visit_template(&mut self, tree: &mut SoyTree, id: NodeId) -> VisitResult {
        self.counter.reset();
        walk_children(self, tree, id)
    }

    fn visit_velog(&mut self, tree: &mut SoyTree, id: NodeId) -> VisitResult {
        self.instrument_velog(tree, id)?;
        walk_children(self, tree, id)?;
        tree.unwrap_node(id);
        Ok(())
    }

    fn visit_html_attribute(&mut self, tree: &mut SoyTree, id: NodeId) -> VisitResult {
        self.instrument_attribute(tree, id)?;
        walk_children(self, tree, id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE BUILDERS
// ═══════════════════════════════════════════════════════════════════════════════

/// `{name}={value}` with both sides printed implicitly and the value unquoted.
fn create_html_attribute(
    tree: &mut SoyTree,
    name: Expr,
    value: Expr,
    location: &SourceLocation,
) -> NodeId {
    let attribute = tree.create(NodeKind::HtmlAttribute, location.clone());
    tree.append(
        attribute,
        NodeKind::Print {
            expr: name,
            implicit: true,
        },
        location.clone(),
    );
    let value_node = tree.append(
        attribute,
        NodeKind::HtmlAttributeValue {
            quotes: Quotes::None,
        },
        location.clone(),
    );
    tree.append(
        value_node,
        NodeKind::Print {
            expr: value,
            implicit: true,
        },
        location.clone(),
    );
    attribute
}

/// `{if $$hasLoggingMetadata()}<body>{/if}`
fn create_if_has_metadata(tree: &mut SoyTree, body: NodeId, location: &SourceLocation) -> NodeId {
    let if_node = tree.create(NodeKind::If, location.clone());
    let cond = tree.append(
        if_node,
        NodeKind::IfCond {
            condition: Expr::builtin(BuiltinFunction::HasLoggingMetadata, vec![]),
        },
        location.clone(),
    );
    tree.add_child(cond, body);
    if_node
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSON ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Compiler(#[from] CompilerError),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentOutput<'a> {
    tree: &'a SoyTree,
    report: InstrumentReport,
}

/// Instruments a JSON-serialized tree. `options_json` may be `None` for
/// defaults. Returns `{"tree": ..., "report": ...}`.
pub fn instrument_file_set_json(
    tree_json: &str,
    options_json: Option<&str>,
) -> Result<String, BridgeError> {
    let mut tree = SoyTree::from_json(tree_json)?;
    let options = match options_json {
        Some(json) => InstrumentOptions::from_json(json)?,
        None => InstrumentOptions::default(),
    };
    let report = instrument_file_set(&mut tree, &options)?;
    Ok(serde_json::to_string(&InstrumentOutput {
        tree: &tree,
        report,
    })?)
}
