// PL/SQL source scanning and Oracle class signature grammar
//
// The Oracle JVM exposes compiled PL/SQL as classes whose signatures encode
// the object type, owning schema, and object name:
//
//   L$Oracle/<Type>/<SCHEMA>/<NAME>;   Type in Function|Procedure|Trigger|Package
//
// A `package body` compiles to `$Oracle/PackageBody/...`; the mapping table
// keys package headers under the body signature so a frame in either class
// resolves to the same source file.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Function,
    Procedure,
    Trigger,
    Package,
}

impl ObjectType {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "function" => Some(Self::Function),
            "procedure" => Some(Self::Procedure),
            "trigger" => Some(Self::Trigger),
            "package body" => Some(Self::Package),
            _ => None,
        }
    }

    /// The `<Type>` segment of the class signature.
    pub fn segment(&self) -> &'static str {
        match self {
            Self::Function => "Function",
            Self::Procedure => "Procedure",
            Self::Trigger => "Trigger",
            Self::Package => "Package",
        }
    }
}

/// One recognized declaration header in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub object_type: ObjectType,
    /// Explicit schema qualifier from the source text, uppercased.
    pub schema: Option<String>,
    /// Object name, uppercased, whitespace removed.
    pub name: String,
    /// Zero-based line index of the header; the "body line" all line
    /// arithmetic is relative to.
    pub line: u32,
}

fn declaration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)create or replace (function|procedure|trigger|package body) (?:(?P<schema>[^.\s(]+)\.)?(?P<name>[^\n(]*)",
        )
        .expect("declaration regex")
    })
}

/// Scan source text line by line for declaration headers.
pub fn scan(text: &str) -> Vec<Declaration> {
    let re = declaration_regex();
    let mut declarations = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let Some(object_type) = ObjectType::from_keyword(&caps[1]) else {
            continue;
        };

        let name: String = caps["name"]
            .to_uppercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if name.is_empty() {
            continue;
        }

        declarations.push(Declaration {
            object_type,
            schema: caps.name("schema").map(|m| m.as_str().to_uppercase()),
            name,
            line: index as u32,
        });
    }

    declarations
}

/// Candidate class signatures for a declaration under the watched schemas.
/// An explicit qualifier pins the declaration to that schema; it produces no
/// candidate at all when the qualifier is not watched.
pub fn candidate_signatures(declaration: &Declaration, schemas: &BTreeSet<String>) -> Vec<String> {
    let type_segment = declaration.object_type.segment();
    let name = declaration.name.replace('.', "/");

    match &declaration.schema {
        Some(qualifier) => {
            if schemas.contains(qualifier) {
                vec![format!("L$Oracle/{}/{}/{};", type_segment, qualifier, name)]
            } else {
                Vec::new()
            }
        }
        None => schemas
            .iter()
            .map(|schema| format!("L$Oracle/{}/{}/{};", type_segment, schema, name))
            .collect(),
    }
}

const PACKAGE_PREFIX: &str = "L$Oracle/Package/";
const PACKAGE_BODY_PREFIX: &str = "L$Oracle/PackageBody/";

/// Mapping-table key for a signature: package headers key under the paired
/// body signature so header and body frames share one mapping.
pub fn canonical_key(signature: &str) -> String {
    match signature.strip_prefix(PACKAGE_PREFIX) {
        Some(rest) => format!("{}{}", PACKAGE_BODY_PREFIX, rest),
        None => signature.to_string(),
    }
}

/// The other half of a package: header for a body signature and vice versa.
pub fn paired_signature(signature: &str) -> Option<String> {
    if let Some(rest) = signature.strip_prefix(PACKAGE_BODY_PREFIX) {
        Some(format!("{}{}", PACKAGE_PREFIX, rest))
    } else {
        signature
            .strip_prefix(PACKAGE_PREFIX)
            .map(|rest| format!("{}{}", PACKAGE_BODY_PREFIX, rest))
    }
}

/// Substitute the body segment with the header segment on a frame's
/// declaring signature; used to reach package-header globals.
pub fn header_signature(signature: &str) -> String {
    signature.replacen(PACKAGE_BODY_PREFIX, PACKAGE_PREFIX, 1)
}

pub fn is_package_signature(signature: &str) -> bool {
    signature.starts_with("L$Oracle/Package")
}

/// Dotted class name, e.g. `$Oracle.Procedure.SCOTT.HELLO`. Doubles as the
/// class-match pattern for prepare requests.
pub fn class_name(signature: &str) -> String {
    signature
        .trim_start_matches('L')
        .trim_end_matches(';')
        .replace('/', ".")
}

/// Short name shown in stack frames: the dotted name with leading segment
/// pairs removed, e.g. `SCOTT.HELLO`.
pub fn stack_display_name(signature: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[^.]+\.[^.]+\.").expect("display regex"));
    re.replace_all(&class_name(signature), "").into_owned()
}

/// Bare object name, e.g. `HELLO`; what interactive source resolution is
/// asked to locate.
pub fn simple_name(signature: &str) -> String {
    let name = class_name(signature);
    match name.rfind('.') {
        Some(pos) => name[pos + 1..].to_string(),
        None => name,
    }
}
