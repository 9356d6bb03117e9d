//! Protobuf IR: one `Package` per input package, rendered later by the
//! schema emitter.

use std::collections::BTreeMap;
use std::fmt;

use proteus_scanner as scanner;
use proteus_scanner::Docs;

use crate::names;

/// Options of a package, message, field, enum or enum value. A sorted map
/// so every scope emits its options in ascending key order.
pub type Options = BTreeMap<String, OptionValue>;

/// The value of an option: either a literal (`true`, `1`) passed through
/// verbatim, or a string emitted with C-style quoting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Literal(String),
    Quoted(String),
}

impl OptionValue {
    pub fn literal(v: impl Into<String>) -> Self {
        OptionValue::Literal(v.into())
    }

    pub fn quoted(v: impl Into<String>) -> Self {
        OptionValue::Quoted(v.into())
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Literal(v) => f.write_str(v),
            OptionValue::Quoted(v) => write!(f, "{:?}", v),
        }
    }
}

/// A single `.proto` file with its own package definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Package {
    /// Protobuf package name, e.g. `github.com.acme.models`.
    pub name: String,
    /// The Go import path the package was derived from.
    pub path: String,
    /// Imported proto files, deduplicated, in insertion order.
    pub imports: Vec<String>,
    pub options: Options,
    pub messages: Vec<Message>,
    pub enums: Vec<Enum>,
    pub rpcs: Vec<Rpc>,
}

impl Package {
    /// Record an import, unless it is already present.
    pub fn add_import(&mut self, file: impl Into<String>) {
        let file = file.into();
        if !self.is_imported(&file) {
            self.imports.push(file);
        }
    }

    /// Import the schema of another scanned package by its Go path.
    /// Importing the package's own path is a no-op.
    pub fn import_from_path(&mut self, path: &str) {
        if path != self.path {
            self.add_import(format!("{}/generated.proto", path));
        }
    }

    fn is_imported(&self, file: &str) -> bool {
        self.imports.iter().any(|i| i == file)
    }

    /// Name of the gRPC service declared by this package.
    pub fn service_name(&self) -> String {
        names::service_name(&self.name)
    }

    pub fn find_message(&self, name: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.name == name)
    }
}

/// A protobuf message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub name: String,
    pub docs: Docs,
    /// Field positions reserved for dropped fields.
    pub reserved: Vec<u32>,
    pub options: Options,
    pub fields: Vec<Field>,
}

impl Message {
    pub fn reserve(&mut self, pos: u32) {
        self.reserved.push(pos);
    }
}

/// A message field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub docs: Docs,
    pub name: String,
    pub pos: u32,
    pub repeated: bool,
    pub ty: Type,
    pub options: Options,
}

impl Default for Field {
    fn default() -> Self {
        Field {
            docs: Docs::default(),
            name: String::new(),
            pos: 0,
            repeated: false,
            ty: Type::basic(""),
            options: Options::new(),
        }
    }
}

/// A protobuf type reference, with the scanned type it came from riding
/// along for cast-type emission in the generated Go code.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub kind: TypeKind,
    pub source: Option<scanner::Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// One of the protobuf scalar types.
    Basic(String),
    /// A type with a name, maybe from another package. `generated` marks
    /// messages synthesized by the transformer rather than declared in Go.
    Named {
        package: String,
        name: String,
        generated: bool,
    },
    Map {
        key: Box<Type>,
        value: Box<Type>,
    },
    /// An aliased type; emission uses the underlying side, the declared
    /// side only feeds the cast-type option.
    Alias {
        declared: Box<Type>,
        underlying: Box<Type>,
    },
}

impl Type {
    pub fn basic(name: impl Into<String>) -> Self {
        Type {
            kind: TypeKind::Basic(name.into()),
            source: None,
        }
    }

    pub fn named(package: impl Into<String>, name: impl Into<String>) -> Self {
        Type {
            kind: TypeKind::Named {
                package: package.into(),
                name: name.into(),
                generated: false,
            },
            source: None,
        }
    }

    /// A named reference to a message synthesized by the transformer.
    pub fn generated_named(package: impl Into<String>, name: impl Into<String>) -> Self {
        Type {
            kind: TypeKind::Named {
                package: package.into(),
                name: name.into(),
                generated: true,
            },
            source: None,
        }
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type {
            kind: TypeKind::Map {
                key: Box::new(key),
                value: Box::new(value),
            },
            source: None,
        }
    }

    pub fn alias(declared: Type, underlying: Type) -> Self {
        Type {
            kind: TypeKind::Alias {
                declared: Box::new(declared),
                underlying: Box::new(underlying),
            },
            source: None,
        }
    }

    pub fn with_source(mut self, source: scanner::Type) -> Self {
        self.source = Some(source);
        self
    }

    pub fn is_generated(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Named {
                generated: true,
                ..
            }
        )
    }

    /// The bare name of a named type, empty otherwise.
    pub fn name(&self) -> &str {
        match &self.kind {
            TypeKind::Named { name, .. } => name,
            _ => "",
        }
    }
}

/// A protobuf enumeration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enum {
    pub name: String,
    pub docs: Docs,
    pub options: Options,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub docs: Docs,
    pub value: u32,
    pub options: Options,
}

/// A single service method and everything the facade generator needs to
/// dispatch it back to the original Go function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rpc {
    pub docs: Docs,
    pub name: String,
    /// Receiver type name when the origin is a method.
    pub recv: String,
    /// Name of the original function or method.
    pub method: String,
    pub has_ctx: bool,
    pub has_error: bool,
    pub is_variadic: bool,
    pub input: Type,
    pub output: Type,
}

impl Default for Type {
    fn default() -> Self {
        Type::basic("")
    }
}
