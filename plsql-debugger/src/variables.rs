// Variable presentation: built-in scalar wrappers, row types, handles
//
// PL/SQL scalars surface in the JVM as wrapper objects holding their
// rendered value in a single `_value` field. Only the signatures below are
// unwrapped; `%ROWTYPE` records expand on demand through a handle; anything
// else non-library gets a placeholder.

use serde::Serialize;

/// Scalar wrapper signatures whose `_value` field holds the displayable
/// value.
pub const BUILTIN_WRAPPERS: [&str; 20] = [
    "L$Oracle/Builtin/VARCHAR2;",
    "L$Oracle/Builtin/NVARCHAR2;",
    "L$Oracle/Builtin/NUMBER;",
    "L$Oracle/Builtin/FLOAT;",
    "L$Oracle/Builtin/LONG;",
    "L$Oracle/Builtin/DATE;",
    "L$Oracle/Builtin/BINARY_FLOAT;",
    "L$Oracle/Builtin/BINARY_DOUBLE;",
    "L$Oracle/Builtin/TIMESTAMP;",
    "L$Oracle/Builtin/TIMESTAMP_WITH_TIMEZONE;",
    "L$Oracle/Builtin/TIMESTAMP_WITH_LOCAL_TIMEZONE;",
    "L$Oracle/Builtin/RAW;",
    "L$Oracle/Builtin/UROWID;",
    "L$Oracle/Builtin/CHAR;",
    "L$Oracle/Builtin/NCHAR;",
    "L$Oracle/Builtin/CLOB;",
    "L$Oracle/Builtin/NCLOB;",
    "L$Oracle/Builtin/BOOLEAN;",
    "L$Oracle/Builtin/PLS_INTEGER;",
    "L$Oracle/Builtin/BINARY_INTEGER;",
];

/// Name of the internal field carrying a wrapper's rendered value.
pub const VALUE_FIELD: &str = "_value";

pub fn is_builtin_wrapper(signature: &str) -> bool {
    BUILTIN_WRAPPERS.contains(&signature)
}

pub fn is_rowtype(signature: &str) -> bool {
    signature.ends_with("/Rowtype;")
}

/// Display type of a wrapper, e.g. `VARCHAR2` from
/// `L$Oracle/Builtin/VARCHAR2;`.
pub fn wrapper_type_name(signature: &str) -> &str {
    let start = signature.rfind('/').map(|p| p + 1).unwrap_or(0);
    let end = signature.len().saturating_sub(1);
    &signature[start..end]
}

/// A variable as presented to the front end. A zero `variables_reference`
/// means scalar; non-zero is a handle expandable through the session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: String,
    pub variables_reference: i64,
}

impl VariableInfo {
    /// The degraded form used whenever a value cannot be rendered.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: "string".into(),
            value: String::new(),
            variables_reference: 0,
        }
    }
}

/// What a variables-reference handle points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeTag {
    Local,
    GlobalHeader,
    GlobalBody,
    /// Expandable compound value, keyed by its class signature.
    Object(String),
}

/// Arena of handles: allocated on first reference, never reused within a
/// session, looked up by index.
#[derive(Debug, Default)]
pub struct VariableHandles {
    entries: Vec<ScopeTag>,
}

impl VariableHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, tag: ScopeTag) -> i64 {
        self.entries.push(tag);
        self.entries.len() as i64
    }

    pub fn get(&self, handle: i64) -> Option<&ScopeTag> {
        if handle < 1 {
            return None;
        }
        self.entries.get(handle as usize - 1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
