//! On-disk descriptor format for type-checked packages.
//!
//! The external type-checker exports one `*.types.json` file per package.
//! The format mirrors the arena model directly: types are a flat array
//! referenced by index, objects reference types by index.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::package::{Object, Package, PackageBuilder};
use crate::types::{Method, StructField, TypeId, TypeNode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
    #[serde(default)]
    pub objects: Vec<ObjectDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDescriptor {
    Basic {
        name: String,
    },
    Named {
        path: String,
        name: String,
        underlying: usize,
        #[serde(default)]
        methods: Vec<MethodDescriptor>,
    },
    Pointer {
        elem: usize,
    },
    Slice {
        elem: usize,
    },
    Array {
        elem: usize,
        len: u64,
    },
    Map {
        key: usize,
        value: usize,
    },
    Struct {
        #[serde(default)]
        fields: Vec<FieldDescriptor>,
    },
    Signature {
        #[serde(default)]
        params: Vec<usize>,
        #[serde(default)]
        results: Vec<usize>,
        #[serde(default)]
        variadic: bool,
    },
    Interface,
    Chan {
        elem: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub signature: usize,
    #[serde(default)]
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: usize,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub embedded: bool,
    #[serde(default)]
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ObjectDescriptor {
    Type {
        name: String,
        ty: usize,
        #[serde(default)]
        docs: Vec<String>,
    },
    Const {
        name: String,
        ty: usize,
        ordinal: u32,
        #[serde(default)]
        docs: Vec<String>,
    },
    Var {
        name: String,
        ty: usize,
    },
    Func {
        name: String,
        signature: usize,
        #[serde(default)]
        docs: Vec<String>,
    },
}

/// A malformed descriptor: some index points outside the type array.
#[derive(Debug)]
pub struct DescriptorError {
    pub index: usize,
    pub len: usize,
    pub context: String,
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type index {} out of range (package has {} types) in {}",
            self.index, self.len, self.context
        )
    }
}

impl StdError for DescriptorError {}

impl PackageDescriptor {
    /// Validate the descriptor and build the arena-backed package.
    pub fn into_package(self) -> Result<Package, DescriptorError> {
        let len = self.types.len();
        let check = |index: usize, context: &str| -> Result<TypeId, DescriptorError> {
            if index < len {
                Ok(TypeId::new(index))
            } else {
                Err(DescriptorError {
                    index,
                    len,
                    context: context.to_string(),
                })
            }
        };

        let mut builder = PackageBuilder::new(self.path, self.name);
        let mut slots = Vec::with_capacity(len);
        for _ in 0..len {
            slots.push(builder.placeholder());
        }

        for (i, ty) in self.types.into_iter().enumerate() {
            let node = match ty {
                TypeDescriptor::Basic { name } => TypeNode::Basic { name },
                TypeDescriptor::Named {
                    path,
                    name,
                    underlying,
                    methods,
                } => {
                    let context = format!("type {}.{}", path, name);
                    let underlying = check(underlying, &context)?;
                    let methods = methods
                        .into_iter()
                        .map(|m| {
                            Ok(Method {
                                signature: check(m.signature, &context)?,
                                name: m.name,
                                docs: m.docs,
                            })
                        })
                        .collect::<Result<_, DescriptorError>>()?;
                    TypeNode::Named {
                        path,
                        name,
                        underlying,
                        methods,
                    }
                }
                TypeDescriptor::Pointer { elem } => TypeNode::Pointer {
                    elem: check(elem, "pointer element")?,
                },
                TypeDescriptor::Slice { elem } => TypeNode::Slice {
                    elem: check(elem, "slice element")?,
                },
                TypeDescriptor::Array { elem, len: n } => TypeNode::Array {
                    elem: check(elem, "array element")?,
                    len: n,
                },
                TypeDescriptor::Map { key, value } => TypeNode::Map {
                    key: check(key, "map key")?,
                    value: check(value, "map value")?,
                },
                TypeDescriptor::Struct { fields } => {
                    let fields = fields
                        .into_iter()
                        .map(|f| {
                            Ok(StructField {
                                ty: check(f.ty, &format!("field {}", f.name))?,
                                name: f.name,
                                tag: f.tag,
                                embedded: f.embedded,
                                docs: f.docs,
                            })
                        })
                        .collect::<Result<_, DescriptorError>>()?;
                    TypeNode::Struct { fields }
                }
                TypeDescriptor::Signature {
                    params,
                    results,
                    variadic,
                } => TypeNode::Signature {
                    params: params
                        .into_iter()
                        .map(|p| check(p, "signature parameter"))
                        .collect::<Result<_, _>>()?,
                    results: results
                        .into_iter()
                        .map(|r| check(r, "signature result"))
                        .collect::<Result<_, _>>()?,
                    variadic,
                },
                TypeDescriptor::Interface => TypeNode::Interface,
                TypeDescriptor::Chan { elem } => TypeNode::Chan {
                    elem: check(elem, "channel element")?,
                },
            };
            builder.define(slots[i], node);
        }

        for obj in self.objects {
            match obj {
                ObjectDescriptor::Type { name, ty, docs } => {
                    let ty = check(ty, &format!("object {}", name))?;
                    builder.declare_type(name, ty, docs);
                }
                ObjectDescriptor::Const {
                    name,
                    ty,
                    ordinal,
                    docs,
                } => {
                    let ty = check(ty, &format!("object {}", name))?;
                    builder.declare_const(name, ty, ordinal, docs);
                }
                ObjectDescriptor::Var { name, ty } => {
                    let ty = check(ty, &format!("object {}", name))?;
                    builder.declare_var(name, ty);
                }
                ObjectDescriptor::Func {
                    name,
                    signature,
                    docs,
                } => {
                    let signature = check(signature, &format!("object {}", name))?;
                    builder.declare_func(name, signature, docs);
                }
            }
        }

        Ok(builder.build())
    }
}

impl From<&Package> for PackageDescriptor {
    /// Export a package back into descriptor form. Tests and tooling use
    /// this to produce fixture files from builder-constructed packages.
    fn from(pkg: &Package) -> Self {
        let mut types = Vec::new();
        for index in 0..pkg.type_count() {
            let id = TypeId::new(index);
            types.push(match pkg.type_node(id) {
                TypeNode::Basic { name } => TypeDescriptor::Basic { name: name.clone() },
                TypeNode::Named {
                    path,
                    name,
                    underlying,
                    methods,
                } => TypeDescriptor::Named {
                    path: path.clone(),
                    name: name.clone(),
                    underlying: underlying.index(),
                    methods: methods
                        .iter()
                        .map(|m| MethodDescriptor {
                            name: m.name.clone(),
                            signature: m.signature.index(),
                            docs: m.docs.clone(),
                        })
                        .collect(),
                },
                TypeNode::Pointer { elem } => TypeDescriptor::Pointer { elem: elem.index() },
                TypeNode::Slice { elem } => TypeDescriptor::Slice { elem: elem.index() },
                TypeNode::Array { elem, len } => TypeDescriptor::Array {
                    elem: elem.index(),
                    len: *len,
                },
                TypeNode::Map { key, value } => TypeDescriptor::Map {
                    key: key.index(),
                    value: value.index(),
                },
                TypeNode::Struct { fields } => TypeDescriptor::Struct {
                    fields: fields
                        .iter()
                        .map(|f| FieldDescriptor {
                            name: f.name.clone(),
                            ty: f.ty.index(),
                            tag: f.tag.clone(),
                            embedded: f.embedded,
                            docs: f.docs.clone(),
                        })
                        .collect(),
                },
                TypeNode::Signature {
                    params,
                    results,
                    variadic,
                } => TypeDescriptor::Signature {
                    params: params.iter().map(|p| p.index()).collect(),
                    results: results.iter().map(|r| r.index()).collect(),
                    variadic: *variadic,
                },
                TypeNode::Interface => TypeDescriptor::Interface,
                TypeNode::Chan { elem } => TypeDescriptor::Chan { elem: elem.index() },
            });
        }

        let objects = pkg
            .objects()
            .iter()
            .map(|obj| match obj {
                Object::TypeName { name, ty, docs } => ObjectDescriptor::Type {
                    name: name.clone(),
                    ty: ty.index(),
                    docs: docs.clone(),
                },
                Object::Const {
                    name,
                    ty,
                    ordinal,
                    docs,
                } => ObjectDescriptor::Const {
                    name: name.clone(),
                    ty: ty.index(),
                    ordinal: *ordinal,
                    docs: docs.clone(),
                },
                Object::Var { name, ty } => ObjectDescriptor::Var {
                    name: name.clone(),
                    ty: ty.index(),
                },
                Object::Func {
                    name,
                    signature,
                    docs,
                } => ObjectDescriptor::Func {
                    name: name.clone(),
                    signature: signature.index(),
                    docs: docs.clone(),
                },
            })
            .collect();

        PackageDescriptor {
            path: pkg.path().to_string(),
            name: pkg.name().to_string(),
            types,
            objects,
        }
    }
}
