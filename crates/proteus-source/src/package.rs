//! Package scope and object model.

use crate::types::{Method, StructField, TypeId, TypeNode};

/// An object declared at package scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// A type declaration `type T ...`.
    TypeName {
        name: String,
        ty: TypeId,
        docs: Vec<String>,
    },
    /// A constant. `ordinal` is its iota position inside the const block,
    /// which fixes enum value ordering.
    Const {
        name: String,
        ty: TypeId,
        ordinal: u32,
        docs: Vec<String>,
    },
    Var {
        name: String,
        ty: TypeId,
    },
    /// A package-level function. Methods live on their named type instead.
    Func {
        name: String,
        signature: TypeId,
        docs: Vec<String>,
    },
}

impl Object {
    pub fn name(&self) -> &str {
        match self {
            Object::TypeName { name, .. }
            | Object::Const { name, .. }
            | Object::Var { name, .. }
            | Object::Func { name, .. } => name,
        }
    }
}

/// Whether a Go identifier is exported (first rune uppercase).
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

/// A fully type-checked package: its arena of types plus a name-ordered
/// scope of declared objects.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    path: String,
    name: String,
    types: Vec<TypeNode>,
    objects: Vec<Object>,
}

impl Package {
    /// Import path, e.g. `github.com/acme/models`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Package identifier (the last path segment by convention).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scope objects in name order.
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    /// Resolve a type index into its node.
    pub fn type_node(&self, id: TypeId) -> &TypeNode {
        &self.types[id.index()]
    }

    /// Number of nodes in the type arena.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Look up a scope object by name.
    pub fn lookup(&self, name: &str) -> Option<&Object> {
        self.objects
            .binary_search_by(|o| o.name().cmp(name))
            .ok()
            .map(|i| &self.objects[i])
    }

    /// Follow a chain of named types to the structural underlying node.
    pub fn underlying(&self, id: TypeId) -> &TypeNode {
        self.type_node(self.underlying_id(id))
    }

    /// Like [`Package::underlying`], but returns the node's index.
    pub fn underlying_id(&self, mut id: TypeId) -> TypeId {
        while let TypeNode::Named { underlying, .. } = self.type_node(id) {
            id = *underlying;
        }
        id
    }

    /// Render a type in Go syntax, for diagnostics.
    pub fn describe(&self, id: TypeId) -> String {
        match self.type_node(id) {
            TypeNode::Basic { name } => name.clone(),
            TypeNode::Named { path, name, .. } => {
                if path.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", path, name)
                }
            }
            TypeNode::Pointer { elem } => format!("*{}", self.describe(*elem)),
            TypeNode::Slice { elem } => format!("[]{}", self.describe(*elem)),
            TypeNode::Array { elem, len } => format!("[{}]{}", len, self.describe(*elem)),
            TypeNode::Map { key, value } => {
                format!("map[{}]{}", self.describe(*key), self.describe(*value))
            }
            TypeNode::Struct { .. } => "struct{...}".to_string(),
            TypeNode::Signature { .. } => "func".to_string(),
            TypeNode::Interface => "interface{...}".to_string(),
            TypeNode::Chan { elem } => format!("chan {}", self.describe(*elem)),
        }
    }
}

/// Incremental construction of a [`Package`], used by the descriptor
/// importer and by test fixtures.
#[derive(Debug)]
pub struct PackageBuilder {
    path: String,
    name: String,
    types: Vec<TypeNode>,
    objects: Vec<Object>,
}

impl PackageBuilder {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        PackageBuilder {
            path: path.into(),
            name: name.into(),
            types: Vec::new(),
            objects: Vec::new(),
        }
    }

    fn push(&mut self, node: TypeNode) -> TypeId {
        let id = TypeId::new(self.types.len());
        self.types.push(node);
        id
    }

    /// Reserve a slot that will be defined later, for cyclic graphs.
    pub fn placeholder(&mut self) -> TypeId {
        self.push(TypeNode::Interface)
    }

    /// Replace a previously reserved slot.
    pub fn define(&mut self, id: TypeId, node: TypeNode) {
        self.types[id.index()] = node;
    }

    pub fn basic(&mut self, name: impl Into<String>) -> TypeId {
        self.push(TypeNode::Basic { name: name.into() })
    }

    pub fn named(
        &mut self,
        path: impl Into<String>,
        name: impl Into<String>,
        underlying: TypeId,
    ) -> TypeId {
        self.push(TypeNode::Named {
            path: path.into(),
            name: name.into(),
            underlying,
            methods: Vec::new(),
        })
    }

    pub fn pointer(&mut self, elem: TypeId) -> TypeId {
        self.push(TypeNode::Pointer { elem })
    }

    pub fn slice(&mut self, elem: TypeId) -> TypeId {
        self.push(TypeNode::Slice { elem })
    }

    pub fn array(&mut self, elem: TypeId, len: u64) -> TypeId {
        self.push(TypeNode::Array { elem, len })
    }

    pub fn map(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.push(TypeNode::Map { key, value })
    }

    pub fn struct_type(&mut self, fields: Vec<StructField>) -> TypeId {
        self.push(TypeNode::Struct { fields })
    }

    pub fn signature(
        &mut self,
        params: Vec<TypeId>,
        results: Vec<TypeId>,
        variadic: bool,
    ) -> TypeId {
        self.push(TypeNode::Signature {
            params,
            results,
            variadic,
        })
    }

    pub fn interface(&mut self) -> TypeId {
        self.push(TypeNode::Interface)
    }

    pub fn chan(&mut self, elem: TypeId) -> TypeId {
        self.push(TypeNode::Chan { elem })
    }

    /// Attach a method to a previously created named type.
    ///
    /// Panics if `named` does not point at a `Named` node; fixture bugs
    /// should fail loudly.
    pub fn add_method(
        &mut self,
        named: TypeId,
        name: impl Into<String>,
        signature: TypeId,
        docs: Vec<String>,
    ) {
        match &mut self.types[named.index()] {
            TypeNode::Named { methods, .. } => methods.push(Method {
                name: name.into(),
                docs,
                signature,
            }),
            other => panic!("add_method on non-named type: {:?}", other),
        }
    }

    pub fn declare_type(&mut self, name: impl Into<String>, ty: TypeId, docs: Vec<String>) {
        self.objects.push(Object::TypeName {
            name: name.into(),
            ty,
            docs,
        });
    }

    pub fn declare_const(
        &mut self,
        name: impl Into<String>,
        ty: TypeId,
        ordinal: u32,
        docs: Vec<String>,
    ) {
        self.objects.push(Object::Const {
            name: name.into(),
            ty,
            ordinal,
            docs,
        });
    }

    pub fn declare_var(&mut self, name: impl Into<String>, ty: TypeId) {
        self.objects.push(Object::Var {
            name: name.into(),
            ty,
        });
    }

    pub fn declare_func(&mut self, name: impl Into<String>, signature: TypeId, docs: Vec<String>) {
        self.objects.push(Object::Func {
            name: name.into(),
            signature,
            docs,
        });
    }

    /// Finish the package. Objects are sorted by name so scope iteration
    /// is deterministic no matter the declaration order.
    pub fn build(mut self) -> Package {
        self.objects.sort_by(|a, b| a.name().cmp(b.name()));
        Package {
            path: self.path,
            name: self.name,
            types: self.types,
            objects: self.objects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exported() {
        assert!(is_exported("Foo"));
        assert!(is_exported("F"));
        assert!(!is_exported("foo"));
        assert!(!is_exported("_Foo"));
        assert!(!is_exported(""));
    }

    #[test]
    fn test_scope_is_sorted_and_searchable() {
        let mut b = PackageBuilder::new("acme/pkg", "pkg");
        let int = b.basic("int");
        b.declare_var("zeta", int);
        b.declare_var("Alpha", int);
        b.declare_var("Mid", int);
        let pkg = b.build();

        let names: Vec<_> = pkg.objects().iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["Alpha", "Mid", "zeta"]);
        assert!(pkg.lookup("Mid").is_some());
        assert!(pkg.lookup("missing").is_none());
    }

    #[test]
    fn test_underlying_follows_named_chains() {
        let mut b = PackageBuilder::new("acme/pkg", "pkg");
        let byte = b.basic("byte");
        let named = b.named("acme/pkg", "T", byte);
        let pkg = b.build();

        match pkg.underlying(named) {
            TypeNode::Basic { name } => assert_eq!(name, "byte"),
            other => panic!("unexpected underlying: {:?}", other),
        }
    }

    #[test]
    fn test_cyclic_graph_through_placeholder() {
        let mut b = PackageBuilder::new("acme/pkg", "pkg");
        let node = b.placeholder();
        let ptr = b.pointer(node);
        let strukt = b.struct_type(vec![StructField {
            name: "Next".to_string(),
            ty: ptr,
            tag: String::new(),
            embedded: false,
            docs: Vec::new(),
        }]);
        b.define(
            node,
            TypeNode::Named {
                path: "acme/pkg".to_string(),
                name: "Node".to_string(),
                underlying: strukt,
                methods: Vec::new(),
            },
        );
        let pkg = b.build();

        match pkg.underlying(node) {
            TypeNode::Struct { fields } => assert_eq!(fields[0].name, "Next"),
            other => panic!("unexpected underlying: {:?}", other),
        }
    }
}
