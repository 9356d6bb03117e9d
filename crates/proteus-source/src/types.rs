//! Arena-backed type graph.
//!
//! Go type graphs have back-edges (`type Node struct { Next *Node }`), so
//! types are stored in a flat vector owned by the package and referenced
//! by index. `Named` carries its underlying type as another index, never
//! as an owned value.

/// Index of a type inside a package's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub(crate) fn new(index: usize) -> Self {
        TypeId(index as u32)
    }

    /// Position of the node in the owning arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single node of the type graph.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    /// Predeclared basic type (`int`, `string`, `byte`, ...). The `error`
    /// interface is modeled as `Named` with an empty path.
    Basic { name: String },
    /// A declared type. `underlying` follows the declaration to its
    /// structural type; `methods` lists the methods of its method set.
    Named {
        path: String,
        name: String,
        underlying: TypeId,
        methods: Vec<Method>,
    },
    Pointer { elem: TypeId },
    Slice { elem: TypeId },
    Array { elem: TypeId, len: u64 },
    Map { key: TypeId, value: TypeId },
    Struct { fields: Vec<StructField> },
    /// A function or method signature. Receivers are not part of the
    /// parameter list.
    Signature {
        params: Vec<TypeId>,
        results: Vec<TypeId>,
        variadic: bool,
    },
    Interface,
    Chan { elem: TypeId },
}

/// A method attached to a named type.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    /// Raw declaration comment lines, `//` markers included.
    pub docs: Vec<String>,
    pub signature: TypeId,
}

/// A struct field as the type-checker reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: TypeId,
    /// Raw struct tag string, e.g. `proteus:"-"`.
    pub tag: String,
    /// True for embedded (anonymous) fields.
    pub embedded: bool,
    pub docs: Vec<String>,
}
