//! IR containers produced by the scan.

use std::collections::BTreeMap;

use crate::types::{Docs, Documentable, Type};

/// One scanned package. Only safe to hand to the transformer once the
/// resolver has set `resolved`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Package {
    pub resolved: bool,
    pub path: String,
    pub name: String,
    pub structs: Vec<Struct>,
    pub enums: Vec<Enum>,
    pub funcs: Vec<Func>,
    /// Aliases by qualified name (`path.Name`). Ordered so every pass
    /// that walks them is deterministic.
    pub aliases: BTreeMap<String, Type>,
}

impl Package {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Package {
            path: path.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Qualified name of a declaration in this package.
    pub fn qualify(&self, name: &str) -> String {
        format!("{}.{}", self.path, name)
    }
}

/// A scanned struct and the fields that survived filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Struct {
    pub docs: Docs,
    pub generate: bool,
    pub name: String,
    pub is_stringer: bool,
    pub fields: Vec<Field>,
}

impl Struct {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

impl Documentable for Struct {
    fn set_docs(&mut self, comments: &[String]) {
        self.docs.set_docs(comments);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub docs: Docs,
    pub name: String,
    pub ty: Type,
}

impl Documentable for Field {
    fn set_docs(&mut self, comments: &[String]) {
        self.docs.set_docs(comments);
    }
}

/// An enumeration promoted from a basic alias with constants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enum {
    pub docs: Docs,
    pub name: String,
    pub is_stringer: bool,
    pub values: Vec<EnumValue>,
}

impl Documentable for Enum {
    fn set_docs(&mut self, comments: &[String]) {
        self.docs.set_docs(comments);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumValue {
    pub docs: Docs,
    pub name: String,
}

impl Documentable for EnumValue {
    fn set_docs(&mut self, comments: &[String]) {
        self.docs.set_docs(comments);
    }
}

/// A function or method opted into RPC generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Func {
    pub docs: Docs,
    pub name: String,
    /// Set for methods; `None` for package-level functions.
    pub receiver: Option<Type>,
    pub input: Vec<Type>,
    pub output: Vec<Type>,
    /// True when the last input parameter is variadic.
    pub is_variadic: bool,
}

impl Documentable for Func {
    fn set_docs(&mut self, comments: &[String]) {
        self.docs.set_docs(comments);
    }
}
