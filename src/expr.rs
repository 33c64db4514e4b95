//! Expression trees attached to print, conditional and logging nodes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::SoyValue;
use crate::functions;
use crate::renaming::IdRenamingMap;

// ═══════════════════════════════════════════════════════════════════════════════
// FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Functions known to the compiler. The instrumentation capabilities are
/// resolved by the runtime environment; the compiler only emits calls to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuiltinFunction {
    Xid,
    HasLoggingMetadata,
    MakeLoggingMarker,
    RenderLoggingAttribute,
    AugmentMap,
    Ceil,
    Floor,
    Keys,
    Max,
    Min,
    ParseFloat,
    ParseInt,
    Round,
}

impl BuiltinFunction {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinFunction::Xid => "xid",
            BuiltinFunction::HasLoggingMetadata => "$$hasLoggingMetadata",
            BuiltinFunction::MakeLoggingMarker => "$$makeLoggingMarker",
            BuiltinFunction::RenderLoggingAttribute => "$$renderLoggingAttribute",
            BuiltinFunction::AugmentMap => "augmentMap",
            BuiltinFunction::Ceil => "ceiling",
            BuiltinFunction::Floor => "floor",
            BuiltinFunction::Keys => "keys",
            BuiltinFunction::Max => "max",
            BuiltinFunction::Min => "min",
            BuiltinFunction::ParseFloat => "parseFloat",
            BuiltinFunction::ParseInt => "parseInt",
            BuiltinFunction::Round => "round",
        }
    }
}

/// A function whose call in an attribute value is deferred to render time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingFunction {
    pub name: String,
    /// Emitted statically in place of the call until the runtime substitutes it.
    pub placeholder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "function", rename_all = "camelCase")]
pub enum SoyFunction {
    Builtin(BuiltinFunction),
    Logging(LoggingFunction),
    User(String),
}

impl SoyFunction {
    pub fn name(&self) -> &str {
        match self {
            SoyFunction::Builtin(b) => b.name(),
            SoyFunction::Logging(l) => &l.name,
            SoyFunction::User(name) => name,
        }
    }

    pub fn as_logging_function(&self) -> Option<&LoggingFunction> {
        match self {
            SoyFunction::Logging(l) => Some(l),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Expr {
    Null,
    Bool {
        value: bool,
    },
    Integer {
        value: i64,
    },
    Float {
        value: f64,
    },
    Str {
        value: String,
    },
    VarRef {
        name: String,
    },
    List {
        items: Vec<Expr>,
    },
    /// Structured metadata literal such as `soy.test.Foo(intField: 1)`.
    ProtoInit {
        type_name: String,
        fields: Vec<(String, Expr)>,
    },
    Plus {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: SoyFunction,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Integer { value }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Str {
            value: value.into(),
        }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::VarRef { name: name.into() }
    }

    pub fn list(items: Vec<Expr>) -> Self {
        Expr::List { items }
    }

    pub fn plus(left: Expr, right: Expr) -> Self {
        Expr::Plus {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn builtin(function: BuiltinFunction, args: Vec<Expr>) -> Self {
        Expr::Call {
            function: SoyFunction::Builtin(function),
            args,
        }
    }

    pub fn logging_call(name: &str, placeholder: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            function: SoyFunction::Logging(LoggingFunction {
                name: name.to_string(),
                placeholder: placeholder.to_string(),
            }),
            args,
        }
    }

    fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::List { items } => items.iter().collect(),
            Expr::ProtoInit { fields, .. } => fields.iter().map(|(_, e)| e).collect(),
            Expr::Plus { left, right } => vec![left.as_ref(), right.as_ref()],
            Expr::Call { args, .. } => args.iter().collect(),
            _ => vec![],
        }
    }

    /// Pre-order walk over every call in this expression.
    pub fn for_each_call<'a>(&'a self, f: &mut dyn FnMut(&'a SoyFunction, &'a [Expr])) {
        if let Expr::Call { function, args } = self {
            f(function, args);
        }
        for child in self.children() {
            child.for_each_call(f);
        }
    }

    /// Every logging-function call in this expression, in pre-order.
    pub fn logging_calls(&self) -> Vec<(&LoggingFunction, &[Expr])> {
        let mut calls = Vec::new();
        self.for_each_call(&mut |function, args| {
            if let SoyFunction::Logging(l) = function {
                calls.push((l, args));
            }
        });
        calls
    }

    pub fn to_source_string(&self) -> String {
        match self {
            Expr::Null => "null".to_string(),
            Expr::Bool { value } => value.to_string(),
            Expr::Integer { value } => value.to_string(),
            Expr::Float { value } => value.to_string(),
            Expr::Str { value } => format!("'{}'", value.replace('\'', "\\'")),
            Expr::VarRef { name } => format!("${}", name),
            Expr::List { items } => format!("[{}]", join_source(items.iter())),
            Expr::ProtoInit { type_name, fields } => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(name, e)| format!("{}: {}", name, e.to_source_string()))
                    .collect();
                format!("{}({})", type_name, parts.join(", "))
            }
            Expr::Plus { left, right } => {
                format!("{} + {}", left.to_source_string(), right.to_source_string())
            }
            Expr::Call { function, args } => {
                format!("{}({})", function.name(), join_source(args.iter()))
            }
        }
    }

    /// Folds an expression built only from literals, `+`, lists, `xid` and the
    /// pure basic functions. Returns `None` for anything needing runtime state.
    pub fn eval_constant(&self, renaming: &IdRenamingMap) -> Option<SoyValue> {
        match self {
            Expr::Null => Some(SoyValue::Null),
            Expr::Bool { value } => Some(SoyValue::Bool(*value)),
            Expr::Integer { value } => Some(SoyValue::Integer(*value)),
            Expr::Float { value } => Some(SoyValue::Float(*value)),
            Expr::Str { value } => Some(SoyValue::String(value.clone())),
            Expr::List { items } => items
                .iter()
                .map(|e| e.eval_constant(renaming))
                .collect::<Option<Vec<_>>>()
                .map(SoyValue::List),
            Expr::ProtoInit { fields, .. } => {
                let mut map = BTreeMap::new();
                for (name, e) in fields {
                    map.insert(name.clone(), e.eval_constant(renaming)?);
                }
                Some(SoyValue::Map(map))
            }
            Expr::Plus { left, right } => {
                let l = left.eval_constant(renaming)?;
                let r = right.eval_constant(renaming)?;
                Some(plus(&l, &r))
            }
            Expr::Call {
                function: SoyFunction::Builtin(builtin),
                args,
            } => {
                let values = args
                    .iter()
                    .map(|e| e.eval_constant(renaming))
                    .collect::<Option<Vec<_>>>()?;
                eval_builtin(*builtin, &values, renaming)
            }
            Expr::VarRef { .. } | Expr::Call { .. } => None,
        }
    }
}

fn join_source<'a>(exprs: impl Iterator<Item = &'a Expr>) -> String {
    exprs
        .map(|e| e.to_source_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn plus(l: &SoyValue, r: &SoyValue) -> SoyValue {
    match (l, r) {
        (SoyValue::Integer(a), SoyValue::Integer(b)) => SoyValue::Integer(a.wrapping_add(*b)),
        _ if l.is_numeric() && r.is_numeric() => SoyValue::Float(
            l.number_value().unwrap_or_default() + r.number_value().unwrap_or_default(),
        ),
        _ => SoyValue::String(format!("{}{}", l.coerce_to_string(), r.coerce_to_string())),
    }
}

fn eval_builtin(
    builtin: BuiltinFunction,
    args: &[SoyValue],
    renaming: &IdRenamingMap,
) -> Option<SoyValue> {
    match (builtin, args) {
        (BuiltinFunction::Xid, [key]) => {
            Some(SoyValue::String(renaming.xid(&key.coerce_to_string())))
        }
        (BuiltinFunction::AugmentMap, [first, second]) => functions::augment_map(first, second),
        (BuiltinFunction::Ceil, [v]) => functions::ceil(v).map(SoyValue::Integer),
        (BuiltinFunction::Floor, [v]) => functions::floor(v).map(SoyValue::Integer),
        (BuiltinFunction::Keys, [map]) => functions::keys(map).map(SoyValue::List),
        (BuiltinFunction::Max, [a, b]) => functions::max(a, b),
        (BuiltinFunction::Min, [a, b]) => functions::min(a, b),
        (BuiltinFunction::ParseFloat, [s]) => Some(
            functions::parse_float(&s.coerce_to_string())
                .map(SoyValue::Float)
                .unwrap_or(SoyValue::Null),
        ),
        (BuiltinFunction::ParseInt, [s]) => Some(
            functions::parse_int(&s.coerce_to_string())
                .map(SoyValue::Integer)
                .unwrap_or(SoyValue::Null),
        ),
        (BuiltinFunction::Round, [v]) => functions::round(v, 0),
        (BuiltinFunction::Round, [v, SoyValue::Integer(digits)]) => {
            functions::round(v, i32::try_from(*digits).ok()?)
        }
        _ => None,
    }
}
