//! # Velog Instrumentation Ground Truth
//!
//! ## Instrumentation Invariants
//!
//! 1. **Source Only**: only `Src` files of a file set are rewritten. `Dep` files are
//!    never touched.
//!
//! 2. **Velog Desugaring**: every `{velog}` block gains a
//!    `{if $$hasLoggingMetadata()}` attribute on its root open tag carrying
//!    `$$makeLoggingMarker(id, config|null[, logonly])`, and the wrapper is then removed.
//!
//! 3. **Logging Function Attributes**: a logging function call in an attribute value is
//!    replaced by its placeholder text. The real call moves into a synthetic attribute
//!    `'data-' + (xid('soyloggingfunction-') + 'N')` on the same tag.
//!
//! 4. **Synthetic Names**: `N` starts at 0 in every template and grows by one per
//!    rewritten attribute. Computed attribute names are bound to
//!    `$soy_logging_function_attribute_N` just before the tag.
//!
//! 5. **Atomicity**: a unit that breaks any upstream contract (VELOG001..VELOG005) is
//!    rejected before the first mutation.
//!
//! 6. **Idempotence**: instrumenting an instrumented tree changes nothing and consumes
//!    no node ids.
//!
//! ## Render-Time Directives
//!
//! Streaming transforms produce the same bytes as their whole-string forms no matter
//! how the input is split across appends. HTML input keeps its kind and direction.

mod appendable;
mod bidi;
mod data;
mod directives;
mod expr;
mod functions;
mod id;
mod instrument;
mod logging_config;
mod printer;
mod renaming;
mod tree;
mod validate;
mod visitor;


// Instrumentation
pub use instrument::{
    instrument_file_set, instrument_file_set_json, instrument_file_sets_parallel, BridgeError,
    InstrumentOptions, InstrumentReport,
};
pub use logging_config::{
    assign_logging_ids, LoggableElement, LoggingConfig, LoggingConfigError,
    ValidatedLoggingConfig,
};
pub use validate::*;

// Tree model
pub use expr::{BuiltinFunction, Expr, LoggingFunction, SoyFunction};
pub use id::{IdGenerator, NodeId, SyntheticCounter};
pub use printer::to_source_string;
pub use tree::{FileKind, Node, NodeKind, Point, Quotes, SoyTree, SourceLocation, VeLogNode};
pub use visitor::{walk_children, walk_node, walk_root, SoyTreeVisitor, VisitResult};

// Render time
pub use appendable::{
    AppendError, AppendResult, LogStatement, LoggingAdvisingAppendable,
    LoggingFunctionInvocation, WriterAppendable,
};
pub use bidi::{bidi_span_wrap, estimate_direction};
pub use data::{BidiGlobalDir, ContentKind, Dir, SanitizedContent, SoyValue};
pub use directives::{
    change_newline_to_br, change_newline_to_br_streaming, insert_word_breaks, truncate,
    NewlineToBrAppendable,
};
pub use functions::{augment_map, ceil, floor, keys, max, min, parse_float, parse_int, round};
pub use renaming::{hashed_xid, IdRenamingMap, XidFallback};
