//! IR types and documentation attachment.

use std::fmt;

/// Comment directive opting a declaration into generation.
pub const GENERATE_DIRECTIVE: &str = "//proteus:generate";

/// A scanned type with its two orthogonal modifiers.
///
/// `repeated` comes from slice and array constructs, `nullable` from
/// pointers; both propagate outward through wrapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub repeated: bool,
    pub nullable: bool,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// A predeclared basic type identified by its name.
    Basic(String),
    /// A declared, non-basic type somewhere on the scan path.
    Named { path: String, name: String },
    Map {
        key: Box<Type>,
        value: Box<Type>,
    },
    /// Formed by the resolver from a Named whose declaration points at
    /// another type.
    Alias {
        declared: Box<Type>,
        underlying: Box<Type>,
    },
}

impl Type {
    pub fn basic(name: impl Into<String>) -> Type {
        Type {
            repeated: false,
            nullable: false,
            kind: TypeKind::Basic(name.into()),
        }
    }

    pub fn named(path: impl Into<String>, name: impl Into<String>) -> Type {
        Type {
            repeated: false,
            nullable: false,
            kind: TypeKind::Named {
                path: path.into(),
                name: name.into(),
            },
        }
    }

    pub fn map(key: Type, value: Type) -> Type {
        Type {
            repeated: false,
            nullable: false,
            kind: TypeKind::Map {
                key: Box::new(key),
                value: Box::new(value),
            },
        }
    }

    pub fn alias(declared: Type, underlying: Type) -> Type {
        Type {
            repeated: false,
            nullable: false,
            kind: TypeKind::Alias {
                declared: Box::new(declared),
                underlying: Box::new(underlying),
            },
        }
    }

    /// Whether the type is repeated. Aliases are repeated when either
    /// side is.
    pub fn is_repeated(&self) -> bool {
        match &self.kind {
            TypeKind::Alias {
                declared,
                underlying,
            } => declared.is_repeated() || underlying.is_repeated(),
            _ => self.repeated,
        }
    }

    /// Whether the type can be nil on the wire. Basic types always report
    /// nullable, matching protobuf scalar semantics; aliases are nullable
    /// when either side is.
    pub fn is_nullable(&self) -> bool {
        match &self.kind {
            TypeKind::Basic(_) => true,
            TypeKind::Alias {
                declared,
                underlying,
            } => declared.is_nullable() || underlying.is_nullable(),
            _ => self.nullable,
        }
    }

    /// The bare name without any package qualifier.
    pub fn unqualified_name(&self) -> String {
        match &self.kind {
            TypeKind::Basic(name) => name.clone(),
            TypeKind::Named { name, .. } => name.clone(),
            TypeKind::Map { .. } => self.to_string(),
            TypeKind::Alias { declared, .. } => declared.unqualified_name(),
        }
    }

    /// String form of the type the alias casts to. For aliases this is the
    /// declared side only, unlike `Display` which shows both.
    pub fn cast_string(&self) -> String {
        match &self.kind {
            TypeKind::Alias { declared, .. } => declared.cast_string(),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Basic(name) => f.write_str(name),
            TypeKind::Named { path, name } => {
                if path.is_empty() {
                    f.write_str(name)
                } else {
                    write!(f, "{}.{}", path, name)
                }
            }
            TypeKind::Map { key, value } => write!(f, "map[{}]{}", key, value),
            TypeKind::Alias {
                declared,
                underlying,
            } => write!(f, "type {} {}", declared, underlying),
        }
    }
}

/// Something whose documentation can be set from raw comment lines.
pub trait Documentable {
    /// Attach documentation. Comment markers are stripped and the
    /// `//proteus:generate` directive line is dropped.
    fn set_docs(&mut self, comments: &[String]);
}

/// Documentation carried through to the emitted artifacts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Docs {
    pub lines: Vec<String>,
}

impl Docs {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Documentable for Docs {
    fn set_docs(&mut self, comments: &[String]) {
        self.lines = comments
            .iter()
            .filter(|line| !line.starts_with(GENERATE_DIRECTIVE))
            .map(|line| {
                let text = line.strip_prefix("//").unwrap_or(line);
                text.strip_prefix(' ').unwrap_or(text).trim_end().to_string()
            })
            .collect();

        while self.lines.first().is_some_and(|l| l.is_empty()) {
            self.lines.remove(0);
        }
        while self.lines.last().is_some_and(|l| l.is_empty()) {
            self.lines.pop();
        }
    }
}

/// Whether a declaration's comments carry the generate directive.
pub fn is_annotated(comments: &[String]) -> bool {
    comments.iter().any(|l| l.starts_with(GENERATE_DIRECTIVE))
}
