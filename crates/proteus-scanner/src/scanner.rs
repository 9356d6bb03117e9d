//! The scan itself: one task per package, a scope walk per task.

use std::collections::{HashMap, HashSet};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;

use proteus_report::warn;
use proteus_source::{self as source, is_exported, ImportError, Importer, TypeId, TypeNode};

use crate::package::{Enum, EnumValue, Field, Func, Package, Struct};
use crate::tags::{find_proteus_tags, is_ignored};
use crate::types::{is_annotated, Docs, Documentable, Type};

/// Scans packages looking for types, enums and functions to generate
/// protobuf messages and services from.
pub struct Scanner {
    importer: Arc<dyn Importer>,
    packages: Vec<String>,
}

/// Failure while scanning a single package.
#[derive(Debug)]
pub enum PackageError {
    Import(ImportError),
    /// The type declares a `String` method that is not `func() string`.
    InvalidStringer { type_name: String },
}

impl fmt::Display for PackageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageError::Import(err) => err.fmt(f),
            PackageError::InvalidStringer { type_name } => write!(
                f,
                "type {} implements a String method with an invalid signature",
                type_name
            ),
        }
    }
}

impl StdError for PackageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PackageError::Import(err) => Some(err),
            PackageError::InvalidStringer { .. } => None,
        }
    }
}

impl From<ImportError> for PackageError {
    fn from(err: ImportError) -> Self {
        PackageError::Import(err)
    }
}

/// Aggregated failures from the parallel scan, one entry per package.
#[derive(Debug)]
pub struct ScanError {
    pub failures: Vec<String>,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.failures.join("\n"))
    }
}

impl StdError for ScanError {}

impl Scanner {
    /// Create a new Scanner that will look for types and structs only in
    /// the given packages.
    pub fn new(importer: Arc<dyn Importer>, packages: Vec<String>) -> Self {
        Scanner { importer, packages }
    }

    /// Scan every package in parallel. The output vector preserves the
    /// input order; failures are aggregated across tasks.
    pub fn scan(&self) -> Result<Vec<Package>, ScanError> {
        let results: Vec<Result<Package, String>> = self
            .packages
            .par_iter()
            .map(|path| {
                self.scan_package(path)
                    .map_err(|e| format!("error scanning package \"{}\": {}", path, e))
            })
            .collect();

        let mut packages = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(pkg) => packages.push(pkg),
                Err(msg) => failures.push(msg),
            }
        }

        if failures.is_empty() {
            Ok(packages)
        } else {
            Err(ScanError { failures })
        }
    }

    fn scan_package(&self, path: &str) -> Result<Package, PackageError> {
        let src = self.importer.import(path)?;
        PackageScan::new(&src).run()
    }
}

/// Per-candidate enum value collected during the scope walk.
#[derive(Debug, Clone)]
struct CandidateValue {
    ordinal: u32,
    name: String,
    docs: Vec<String>,
}

/// Scanning context of a single package.
struct PackageScan<'a> {
    src: &'a source::Package,
    pkg: Package,
    /// Enum candidate values by qualified type name.
    enum_values: HashMap<String, Vec<CandidateValue>>,
    /// Unqualified names of type declarations carrying the directive.
    annotated_types: HashSet<String>,
    /// Raw declaration docs per type name, kept for enum promotion.
    type_docs: HashMap<String, Vec<String>>,
    /// Qualified names with a conforming `String() string` method.
    stringers: HashSet<String>,
}

impl<'a> PackageScan<'a> {
    fn new(src: &'a source::Package) -> Self {
        PackageScan {
            src,
            pkg: Package::new(src.path(), src.name()),
            enum_values: HashMap::new(),
            annotated_types: HashSet::new(),
            type_docs: HashMap::new(),
            stringers: HashSet::new(),
        }
    }

    fn run(mut self) -> Result<Package, PackageError> {
        for obj in self.src.objects() {
            if !is_exported(obj.name()) {
                continue;
            }

            match obj {
                source::Object::TypeName { name, ty, docs } => {
                    self.scan_type_decl(name, *ty, docs)?;
                }
                source::Object::Const {
                    name,
                    ty,
                    ordinal,
                    docs,
                } => {
                    self.scan_const(name, *ty, *ordinal, docs);
                }
                source::Object::Var { .. } => {}
                source::Object::Func {
                    name,
                    signature,
                    docs,
                } => {
                    if is_annotated(docs) {
                        self.scan_func(name, *signature, docs, None);
                    }
                }
            }
        }

        self.collect_enums();
        Ok(self.pkg)
    }

    fn scan_type_decl(
        &mut self,
        name: &str,
        ty: TypeId,
        docs: &[String],
    ) -> Result<(), PackageError> {
        let (path, type_name, methods) = match self.src.type_node(ty) {
            TypeNode::Named {
                path,
                name: type_name,
                methods,
                ..
            } => (path.clone(), type_name.clone(), methods.clone()),
            // `type X = []int` style alias: the object's type is not even
            // a named one.
            _ => {
                if let Some(t) = self.scan_type(ty) {
                    self.pkg.aliases.insert(self.pkg.qualify(name), t);
                }
                return Ok(());
            }
        };

        if path != self.pkg.path || type_name != name {
            // `type X = other.T`: an alias object for a type declared
            // elsewhere.
            if let Some(t) = self.scan_type(ty) {
                self.pkg.aliases.insert(self.pkg.qualify(name), t);
            }
            return Ok(());
        }

        let qualified = self.pkg.qualify(name);
        if is_annotated(docs) {
            self.annotated_types.insert(name.to_string());
        }
        self.type_docs.insert(name.to_string(), docs.to_vec());

        for method in &methods {
            if method.name == "String" {
                if self.is_string_method(method.signature) {
                    self.stringers.insert(qualified.clone());
                } else {
                    return Err(PackageError::InvalidStringer {
                        type_name: qualified,
                    });
                }
            }
        }

        for method in &methods {
            if is_annotated(&method.docs) {
                let receiver = Some(Type::named(&self.pkg.path, name));
                self.scan_func(&method.name, method.signature, &method.docs, receiver);
            }
        }

        match self.src.underlying(ty).clone() {
            TypeNode::Struct { fields } => {
                let mut st = Struct {
                    name: name.to_string(),
                    generate: is_annotated(docs),
                    is_stringer: self.stringers.contains(&qualified),
                    ..Default::default()
                };
                st.set_docs(docs);
                self.scan_struct(&mut st, &fields);
                self.pkg.structs.push(st);
            }
            TypeNode::Basic { name: basic } => {
                self.pkg.aliases.insert(qualified, Type::basic(basic));
            }
            _ => {
                let structural = self.src.underlying_id(ty);
                if let Some(t) = self.scan_type(structural) {
                    self.pkg.aliases.insert(qualified, t);
                }
            }
        }

        Ok(())
    }

    /// Whether a signature is exactly `func() string`.
    fn is_string_method(&self, signature: TypeId) -> bool {
        match self.src.type_node(signature) {
            TypeNode::Signature {
                params,
                results,
                variadic: false,
            } if params.is_empty() && results.len() == 1 => matches!(
                self.src.type_node(results[0]),
                TypeNode::Basic { name } if name == "string"
            ),
            _ => false,
        }
    }

    fn scan_const(&mut self, name: &str, ty: TypeId, ordinal: u32, docs: &[String]) {
        let TypeNode::Named {
            path,
            name: type_name,
            ..
        } = self.src.type_node(ty)
        else {
            return;
        };

        if !matches!(self.src.underlying(ty), TypeNode::Basic { .. }) {
            return;
        }

        let key = if path.is_empty() {
            type_name.clone()
        } else {
            format!("{}.{}", path, type_name)
        };
        self.enum_values.entry(key).or_default().push(CandidateValue {
            ordinal,
            name: name.to_string(),
            docs: docs.to_vec(),
        });
    }

    fn scan_func(&mut self, name: &str, signature: TypeId, docs: &[String], receiver: Option<Type>) {
        let TypeNode::Signature {
            params,
            results,
            variadic,
        } = self.src.type_node(signature)
        else {
            return;
        };

        let mut func = Func {
            name: name.to_string(),
            receiver,
            is_variadic: *variadic,
            ..Default::default()
        };
        func.set_docs(docs);

        for param in params {
            match self.scan_type(*param) {
                Some(t) => func.input.push(t),
                None => {
                    warn!(
                        "func {} has an unsupported parameter type and will not be generated",
                        name
                    );
                    return;
                }
            }
        }

        for result in results {
            match self.scan_type(*result) {
                Some(t) => func.output.push(t),
                None => {
                    warn!(
                        "func {} has an unsupported result type and will not be generated",
                        name
                    );
                    return;
                }
            }
        }

        self.pkg.funcs.push(func);
    }

    fn scan_struct(&mut self, st: &mut Struct, fields: &[source::StructField]) {
        // Fields declared directly on the struct win over embedded ones,
        // no matter the declaration order.
        let direct: HashSet<String> = fields
            .iter()
            .filter(|f| !f.embedded && is_exported(&f.name))
            .filter(|f| !is_ignored(&find_proteus_tags(&f.tag)))
            .map(|f| f.name.clone())
            .collect();

        self.scan_struct_fields(st, fields, &direct, true);
    }

    fn scan_struct_fields(
        &mut self,
        st: &mut Struct,
        fields: &[source::StructField],
        outer_direct: &HashSet<String>,
        top_level: bool,
    ) {
        for field in fields {
            let tags = find_proteus_tags(&field.tag);
            if !is_exported(&field.name) || is_ignored(&tags) {
                continue;
            }

            if field.embedded {
                match self.find_struct(field.ty) {
                    Some(embedded) => {
                        self.scan_struct_fields(st, &embedded, outer_direct, false);
                    }
                    None => warn!(
                        "field \"{}\" with type \"{}\" is not a valid embedded type",
                        field.name,
                        self.src.describe(field.ty)
                    ),
                }
                continue;
            }

            if !top_level && outer_direct.contains(&field.name) {
                warn!(
                    "struct \"{}\" already has a field \"{}\"",
                    st.name, field.name
                );
                continue;
            }

            if st.has_field(&field.name) {
                warn!(
                    "struct \"{}\" already has a field \"{}\"",
                    st.name, field.name
                );
                continue;
            }

            let Some(ty) = self.scan_type(field.ty) else {
                continue;
            };
            let mut f = Field {
                docs: Docs::default(),
                name: field.name.clone(),
                ty,
            };
            f.set_docs(&field.docs);
            st.fields.push(f);
        }
    }

    /// Follow pointers and named types to an embeddable struct.
    fn find_struct(&self, ty: TypeId) -> Option<Vec<source::StructField>> {
        match self.src.type_node(ty) {
            TypeNode::Pointer { elem } => self.find_struct(*elem),
            TypeNode::Named { underlying, .. } => self.find_struct(*underlying),
            TypeNode::Struct { fields } => Some(fields.clone()),
            _ => None,
        }
    }

    fn scan_type(&self, ty: TypeId) -> Option<Type> {
        match self.src.type_node(ty) {
            TypeNode::Named { path, name, .. } => Some(Type::named(path, name)),
            TypeNode::Basic { name } => Some(Type::basic(name)),
            TypeNode::Slice { elem } | TypeNode::Array { elem, .. } => {
                let mut t = self.scan_type(*elem)?;
                t.repeated = true;
                Some(t)
            }
            TypeNode::Pointer { elem } => {
                let mut t = self.scan_type(*elem)?;
                t.nullable = true;
                Some(t)
            }
            TypeNode::Map { key, value } => {
                let key = self.scan_type(*key)?;
                let value = self.scan_type(*value)?;
                Some(Type::map(key, value))
            }
            _ => {
                warn!("ignoring type {}", self.src.describe(ty));
                None
            }
        }
    }

    /// Promote aliases with collected constants and the directive into
    /// enums, removing them from the alias table.
    fn collect_enums(&mut self) {
        let keys: Vec<String> = self.pkg.aliases.keys().cloned().collect();
        for key in keys {
            let Some(values) = self.enum_values.get(&key) else {
                continue;
            };

            let name = key.rsplit('.').next().unwrap_or(&key).to_string();
            if !self.annotated_types.contains(&name) {
                continue;
            }

            let mut sorted = values.clone();
            sorted.sort_by_key(|v| v.ordinal);

            let mut e = Enum {
                name: name.clone(),
                is_stringer: self.stringers.contains(&key),
                ..Default::default()
            };
            if let Some(docs) = self.type_docs.get(&name) {
                e.set_docs(docs);
            }
            for value in sorted {
                let mut v = EnumValue {
                    name: value.name,
                    ..Default::default()
                };
                v.set_docs(&value.docs);
                e.values.push(v);
            }

            self.pkg.enums.push(e);
            self.pkg.aliases.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeKind, GENERATE_DIRECTIVE};
    use proteus_source::{PackageBuilder, StructField};
    use std::collections::HashMap;

    struct MapImporter(HashMap<String, Arc<source::Package>>);

    impl MapImporter {
        fn single(pkg: source::Package) -> Arc<Self> {
            let mut map = HashMap::new();
            map.insert(pkg.path().to_string(), Arc::new(pkg));
            Arc::new(MapImporter(map))
        }
    }

    impl Importer for MapImporter {
        fn import(&self, path: &str) -> Result<Arc<source::Package>, ImportError> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| ImportError::NoPackageSource(path.to_string()))
        }
    }

    fn field(name: &str, ty: TypeId) -> StructField {
        StructField {
            name: name.to_string(),
            ty,
            tag: String::new(),
            embedded: false,
            docs: Vec::new(),
        }
    }

    fn embedded(name: &str, ty: TypeId) -> StructField {
        StructField {
            embedded: true,
            ..field(name, ty)
        }
    }

    fn gen_docs() -> Vec<String> {
        vec![GENERATE_DIRECTIVE.to_string()]
    }

    /// A package close to the reference fixtures: an annotated struct with
    /// an embedded struct, slices, arrays, maps, std types and aliases,
    /// plus an annotated byte enum and annotated functions and methods.
    fn fixture_package() -> source::Package {
        let mut b = PackageBuilder::new("github.com/acme/fixtures", "fixtures");

        let t_int = b.basic("int");
        let t_uint64 = b.basic("uint64");
        let t_byte = b.basic("byte");
        let t_string = b.basic("string");
        let t_bool = b.basic("bool");

        // type Baz byte, with constants and a String method.
        let baz = b.named("github.com/acme/fixtures", "Baz", t_byte);
        let string_sig = b.signature(vec![], vec![t_string], false);
        b.add_method(baz, "String", string_sig, Vec::new());
        b.declare_type("Baz", baz, gen_docs());
        b.declare_const("ABaz", baz, 0, vec!["// ABaz is the first value.".to_string()]);
        b.declare_const("CBaz", baz, 2, Vec::new());
        b.declare_const("BBaz", baz, 1, Vec::new());

        // type Bar struct { Bar uint64; Baz Baz }
        let bar_fields = b.struct_type(vec![field("Bar", t_uint64), field("Baz", baz)]);
        let bar = b.named("github.com/acme/fixtures", "Bar", bar_fields);
        b.declare_type("Bar", bar, Vec::new());

        // type Qux struct { A, B int }
        let qux_fields = b.struct_type(vec![field("A", t_int), field("B", t_int)]);
        let qux = b.named("github.com/acme/fixtures", "Qux", qux_fields);
        b.declare_type("Qux", qux, Vec::new());

        // type IntList []int
        let int_slice = b.slice(t_int);
        let int_list = b.named("github.com/acme/fixtures", "IntList", int_slice);
        b.declare_type("IntList", int_list, Vec::new());

        // time.Time and time.Duration as foreign named types.
        let time_fields = b.struct_type(vec![]);
        let time_time = b.named("time", "Time", time_fields);
        let t_int64 = b.basic("int64");
        let time_duration = b.named("time", "Duration", t_int64);

        // type Foo struct { ... }
        let qux_ptr = b.pointer(qux);
        let map_ty = b.map(t_string, qux_ptr);
        let int_array = b.array(t_int, 8);
        let foo_fields = b.struct_type(vec![
            embedded("Bar", bar),
            field("IntList", int_slice),
            field("IntArray", int_array),
            field("Map", map_ty),
            field("Timestamp", time_time),
            field("Duration", time_duration),
            field("Aliased", int_list),
            StructField {
                tag: r#"proteus:"-""#.to_string(),
                ..field("Secret", t_int)
            },
            field("hidden", t_int),
        ]);
        let foo = b.named("github.com/acme/fixtures", "Foo", foo_fields);
        b.declare_type("Foo", foo, gen_docs());

        // func Generated(a string) (bool, error), annotated.
        let error_iface = b.interface();
        let error_ty = b.named("", "error", error_iface);
        let gen_sig = b.signature(vec![t_string], vec![t_bool, error_ty], false);
        b.declare_func("Generated", gen_sig, gen_docs());

        // func NotGenerated(a int) int, not annotated.
        let plain_sig = b.signature(vec![t_int], vec![t_int], false);
        b.declare_func("NotGenerated", plain_sig, Vec::new());

        // Annotated methods on Qux, one of them variadic.
        let qux_ptr_out = b.pointer(qux);
        let method_sig = b.signature(vec![t_int], vec![qux_ptr_out], false);
        b.add_method(qux, "Scale", method_sig, gen_docs());
        let variadic_sig = b.signature(vec![int_slice], vec![t_int], true);
        b.add_method(qux, "Sum", variadic_sig, gen_docs());

        b.build()
    }

    fn scan_fixture() -> Package {
        proteus_report::set_test_mode(true);
        let importer = MapImporter::single(fixture_package());
        let scanner = Scanner::new(importer, vec!["github.com/acme/fixtures".to_string()]);
        let mut pkgs = scanner.scan().expect("scan failed");
        proteus_report::set_test_mode(false);
        assert_eq!(pkgs.len(), 1);
        pkgs.remove(0)
    }

    #[test]
    fn test_scan_structs_and_fields() {
        let pkg = scan_fixture();

        let names: Vec<_> = pkg.structs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Bar", "Foo", "Qux"]);

        let foo = &pkg.structs[1];
        assert!(foo.generate);
        let fields: Vec<_> = foo.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "Bar",
                "Baz",
                "IntList",
                "IntArray",
                "Map",
                "Timestamp",
                "Duration",
                "Aliased"
            ]
        );

        // Embedded Bar was flattened into basic and named fields.
        assert_eq!(foo.fields[0].ty, Type::basic("uint64"));
        assert_eq!(
            foo.fields[1].ty,
            Type::named("github.com/acme/fixtures", "Baz")
        );

        // Slices and arrays are repeated, pointers nullable.
        assert!(foo.fields[2].ty.is_repeated());
        assert!(foo.fields[3].ty.is_repeated());
        match &foo.fields[4].ty.kind {
            TypeKind::Map { key, value } => {
                assert_eq!(**key, Type::basic("string"));
                assert!(value.nullable);
            }
            other => panic!("expected map, got {:?}", other),
        }

        let bar = &pkg.structs[0];
        assert!(!bar.generate);
    }

    #[test]
    fn test_enum_promotion_sorts_by_ordinal_and_removes_alias() {
        let pkg = scan_fixture();

        assert_eq!(pkg.enums.len(), 1);
        let baz = &pkg.enums[0];
        assert_eq!(baz.name, "Baz");
        assert!(baz.is_stringer);
        let values: Vec<_> = baz.values.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(values, vec!["ABaz", "BBaz", "CBaz"]);
        assert_eq!(baz.values[0].docs.lines, vec!["ABaz is the first value."]);

        assert!(!pkg.aliases.contains_key("github.com/acme/fixtures.Baz"));
        assert!(pkg.aliases.contains_key("github.com/acme/fixtures.IntList"));
        match &pkg.aliases["github.com/acme/fixtures.IntList"].kind {
            TypeKind::Basic(name) => assert_eq!(name, "int"),
            other => panic!("expected basic alias, got {:?}", other),
        }
        assert!(pkg.aliases["github.com/acme/fixtures.IntList"].is_repeated());
    }

    #[test]
    fn test_funcs_require_annotation() {
        let pkg = scan_fixture();

        let names: Vec<_> = pkg.funcs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Generated", "Scale", "Sum"]);

        let generated = &pkg.funcs[0];
        assert!(generated.receiver.is_none());
        assert_eq!(generated.input, vec![Type::basic("string")]);
        assert_eq!(generated.output.len(), 2);
        assert_eq!(generated.output[1], Type::named("", "error"));

        let scale = &pkg.funcs[1];
        assert_eq!(
            scale.receiver,
            Some(Type::named("github.com/acme/fixtures", "Qux"))
        );
        assert!(scale.output[0].nullable);

        let sum = &pkg.funcs[2];
        assert!(sum.is_variadic);
        assert!(sum.input[0].is_repeated());
    }

    #[test]
    fn test_invalid_stringer_is_fatal() {
        let mut b = PackageBuilder::new("acme/bad", "bad");
        let t_int = b.basic("int");
        let t_byte = b.basic("byte");
        let named = b.named("acme/bad", "T", t_byte);
        let bad_sig = b.signature(vec![], vec![t_int], false);
        b.add_method(named, "String", bad_sig, Vec::new());
        b.declare_type("T", named, Vec::new());

        let importer = MapImporter::single(b.build());
        let scanner = Scanner::new(importer, vec!["acme/bad".to_string()]);
        let err = scanner.scan().unwrap_err();
        assert!(err.to_string().contains("String method"));
    }

    #[test]
    fn test_scan_aggregates_failures_and_preserves_order() {
        let importer = MapImporter::single(fixture_package());
        let scanner = Scanner::new(
            Arc::clone(&importer) as Arc<dyn Importer>,
            vec![
                "github.com/acme/missing".to_string(),
                "github.com/acme/fixtures".to_string(),
            ],
        );
        let err = scanner.scan().unwrap_err();
        assert_eq!(err.failures.len(), 1);
        assert!(err.failures[0].contains("github.com/acme/missing"));

        let scanner = Scanner::new(importer, vec!["github.com/acme/fixtures".to_string()]);
        assert_eq!(scanner.scan().unwrap().len(), 1);
    }

    #[test]
    fn test_outer_field_wins_over_embedded() {
        proteus_report::set_test_mode(true);
        let mut b = PackageBuilder::new("acme/emb", "emb");
        let t_string = b.basic("string");
        let t_uint64 = b.basic("uint64");
        let inner_fields = b.struct_type(vec![field("Name", t_string)]);
        let inner = b.named("acme/emb", "Inner", inner_fields);
        b.declare_type("Inner", inner, Vec::new());
        let outer_fields = b.struct_type(vec![embedded("Inner", inner), field("Name", t_uint64)]);
        let outer = b.named("acme/emb", "Outer", outer_fields);
        b.declare_type("Outer", outer, Vec::new());

        let importer = MapImporter::single(b.build());
        let scanner = Scanner::new(importer, vec!["acme/emb".to_string()]);
        let pkgs = scanner.scan().unwrap();
        proteus_report::set_test_mode(false);

        let outer = pkgs[0].structs.iter().find(|s| s.name == "Outer").unwrap();
        assert_eq!(outer.fields.len(), 1);
        assert_eq!(outer.fields[0].ty, Type::basic("uint64"));
    }

    #[test]
    fn test_alias_to_foreign_named_type() {
        let mut b = PackageBuilder::new("acme/al", "al");
        let time_fields = b.struct_type(vec![]);
        let time_time = b.named("time", "Time", time_fields);
        b.declare_type("X", time_time, Vec::new());

        let importer = MapImporter::single(b.build());
        let scanner = Scanner::new(importer, vec!["acme/al".to_string()]);
        let pkgs = scanner.scan().unwrap();

        assert_eq!(
            pkgs[0].aliases.get("acme/al.X"),
            Some(&Type::named("time", "Time"))
        );
    }
}
