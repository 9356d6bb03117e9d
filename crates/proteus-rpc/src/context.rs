//! Generation context: name lookups against the source package and the
//! Go import list of the emitted file.

use proteus_protobuf as pb;
use proteus_source::{self as source, TypeId, TypeNode};

/// Name of the server implementation type, e.g. `fooServiceServer`.
pub fn service_impl_name(proto: &pb::Package) -> String {
    format!("{}Server", lowercase_first(&proto.service_name()))
}

/// Name of the server constructor, e.g. `NewFooServiceServer`.
pub fn constructor_name(proto: &pb::Package) -> String {
    format!("New{}Server", proto.service_name())
}

/// Lowercase an initial ASCII uppercase letter. Anything else is left
/// untouched; Go type names cannot start with a digit anyway.
fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {
            first.to_ascii_lowercase().to_string() + chars.as_str()
        }
        _ => s.to_string(),
    }
}

pub(crate) struct Context<'a> {
    pub proto: &'a pb::Package,
    pub pkg: &'a source::Package,
    /// Go packages the generated file must import, in encounter order.
    pub imports: Vec<String>,
}

impl<'a> Context<'a> {
    pub fn new(proto: &'a pb::Package, pkg: &'a source::Package) -> Self {
        Context {
            proto,
            pkg,
            imports: Vec::new(),
        }
    }

    pub fn is_name_defined(&self, name: &str) -> bool {
        self.pkg.lookup(name).is_some()
    }

    pub fn find_message(&self, name: &str) -> Option<&'a pb::Message> {
        self.proto.find_message(name)
    }

    /// Go type expression for a non-generated RPC input.
    pub fn argument_type(&mut self, rpc: &pb::Rpc) -> Option<String> {
        let (params, _) = self.signature_of(rpc)?;
        // A leading context parameter was stripped from the RPC input.
        let first = if rpc.has_ctx { params.get(1) } else { params.first() }?;
        self.object_name_in_context(*first)
    }

    /// Go type expression for a non-generated RPC output.
    pub fn return_type(&mut self, rpc: &pb::Rpc) -> Option<String> {
        let (_, results) = self.signature_of(rpc)?;
        let first = results.first()?;
        self.object_name_in_context(*first)
    }

    /// Parameter and result types of the Go function behind an RPC.
    fn signature_of(&self, rpc: &pb::Rpc) -> Option<(Vec<TypeId>, Vec<TypeId>)> {
        let signature = if rpc.recv.is_empty() {
            match self.pkg.lookup(&rpc.method)? {
                source::Object::Func { signature, .. } => *signature,
                _ => return None,
            }
        } else {
            let source::Object::TypeName { ty, .. } = self.pkg.lookup(&rpc.recv)? else {
                return None;
            };
            let TypeNode::Named { methods, .. } = self.pkg.type_node(*ty) else {
                return None;
            };
            methods.iter().find(|m| m.name == rpc.method)?.signature
        };

        match self.pkg.type_node(signature) {
            TypeNode::Signature {
                params, results, ..
            } => Some((params.clone(), results.clone())),
            _ => None,
        }
    }

    /// Name of a named type as written from inside the package: bare for
    /// local types, `pkg.Name` for foreign ones, whose package gets
    /// imported.
    fn object_name_in_context(&mut self, ty: TypeId) -> Option<String> {
        let (path, name) = self.first_type_name(ty)?;
        if path == self.pkg.path() {
            return Some(name);
        }

        self.add_import(&path);
        let pkg_name = path.rsplit('/').next().unwrap_or(&path);
        Some(format!("{}.{}", pkg_name, name))
    }

    /// Unwrap pointers down to the underlying named type.
    fn first_type_name(&self, ty: TypeId) -> Option<(String, String)> {
        match self.pkg.type_node(ty) {
            TypeNode::Pointer { elem } => self.first_type_name(*elem),
            TypeNode::Named { path, name, .. } => Some((path.clone(), name.clone())),
            _ => None,
        }
    }

    fn add_import(&mut self, path: &str) {
        if path != self.pkg.path() && !self.imports.iter().any(|i| i == path) {
            self.imports.push(path.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proto_named(name: &str) -> pb::Package {
        pb::Package {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_impl_and_constructor_names() {
        let proto = proto_named("github.com.acme.models");
        assert_eq!(service_impl_name(&proto), "modelsServiceServer");
        assert_eq!(constructor_name(&proto), "NewModelsServiceServer");
    }

    #[test]
    fn test_lowercase_first_only_touches_ascii_uppercase() {
        assert_eq!(lowercase_first("FooService"), "fooService");
        assert_eq!(lowercase_first("fooService"), "fooService");
        assert_eq!(lowercase_first(""), "");
    }
}
