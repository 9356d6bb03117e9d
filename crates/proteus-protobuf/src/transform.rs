//! Transformation of resolved IR packages into protobuf packages.

use std::collections::HashSet;

use proteus_report::{error, warn};
use proteus_scanner as scanner;
use proteus_scanner::TypeKind as ScannedKind;

use crate::mappings::{default_mappings, TypeMapping, TypeMappings, GOGO_PROTO_IMPORT};
use crate::names::{to_camel_case, to_lower_snake_case, to_protobuf_pkg, to_upper_snake_case};
use crate::package::{
    Enum, EnumValue, Field, Message, OptionValue, Options, Package, Rpc, Type, TypeKind,
};
use crate::type_set::TypeSet;

/// Converts scanned Go entities to protobuf entities and maps between Go
/// and protobuf types. Custom mappings are checked before the defaults so
/// any translation can be overridden.
#[derive(Default)]
pub struct Transformer {
    mappings: TypeMappings,
    struct_set: TypeSet,
    enum_set: TypeSet,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the custom mappings. An empty table leaves the defaults alone.
    pub fn set_mappings(&mut self, mappings: TypeMappings) {
        self.mappings = mappings;
    }

    /// Register the structs known across every scanned package.
    pub fn set_struct_set(&mut self, set: TypeSet) {
        self.struct_set = set;
    }

    /// Register the enums known across every scanned package.
    pub fn set_enum_set(&mut self, set: TypeSet) {
        self.enum_set = set;
    }

    pub fn is_struct(&self, pkg: &str, name: &str) -> bool {
        self.struct_set.contains(pkg, name)
    }

    pub fn is_enum(&self, pkg: &str, name: &str) -> bool {
        self.enum_set.contains(pkg, name)
    }

    /// Transform a resolved package into its protobuf counterpart.
    pub fn transform(&self, p: &scanner::Package) -> Package {
        let mut pkg = Package {
            name: to_protobuf_pkg(&p.path),
            path: p.path.clone(),
            imports: vec![GOGO_PROTO_IMPORT.to_string()],
            options: self.default_package_options(p),
            ..Default::default()
        };

        for s in &p.structs {
            let msg = self.transform_struct(&mut pkg, s);
            pkg.messages.push(msg);
        }

        for e in &p.enums {
            pkg.enums.push(self.transform_enum(e));
        }

        let names = build_name_set(p);
        for f in &p.funcs {
            if let Some(rpc) = self.transform_func(&mut pkg, f, &names) {
                pkg.rpcs.push(rpc);
            }
        }

        pkg
    }

    fn default_package_options(&self, p: &scanner::Package) -> Options {
        let mut opts = Options::new();
        opts.insert("go_package".to_string(), OptionValue::quoted(&p.name));
        opts.insert(
            "(gogoproto.sizer_all)".to_string(),
            OptionValue::literal("false"),
        );
        opts.insert(
            "(gogoproto.protosizer_all)".to_string(),
            OptionValue::literal("true"),
        );
        opts
    }

    fn transform_struct(&self, pkg: &mut Package, s: &scanner::Struct) -> Message {
        let mut msg = Message {
            name: s.name.clone(),
            docs: s.docs.clone(),
            options: self.default_message_options(s),
            ..Default::default()
        };

        for (i, f) in s.fields.iter().enumerate() {
            let pos = (i + 1) as u32;
            match self.transform_field(pkg, &mut msg, f, pos) {
                Some(field) => msg.fields.push(field),
                None => {
                    msg.reserve(pos);
                    warn!(
                        "field \"{}\" of struct \"{}\" has an invalid type, ignoring field but reserving its position",
                        f.name, s.name
                    );
                }
            }
        }

        msg
    }

    fn default_message_options(&self, s: &scanner::Struct) -> Options {
        let mut opts = Options::new();
        opts.insert(
            "(gogoproto.typedecl)".to_string(),
            OptionValue::literal("false"),
        );
        opts.insert(
            "(gogoproto.goproto_getters)".to_string(),
            OptionValue::literal("false"),
        );
        if s.is_stringer {
            opts.insert(
                "(gogoproto.goproto_stringer)".to_string(),
                OptionValue::literal("false"),
            );
        }
        opts
    }

    fn transform_enum(&self, e: &scanner::Enum) -> Enum {
        let mut result = Enum {
            name: e.name.clone(),
            docs: e.docs.clone(),
            options: self.default_enum_options(e),
            ..Default::default()
        };

        for (i, v) in e.values.iter().enumerate() {
            let mut options = Options::new();
            options.insert(
                "(gogoproto.enumvalue_customname)".to_string(),
                OptionValue::quoted(&v.name),
            );
            result.values.push(EnumValue {
                // Enum value names share the package scope in proto3, so
                // they are prefixed with the enum name.
                name: format!(
                    "{}_{}",
                    to_upper_snake_case(&e.name),
                    to_upper_snake_case(&v.name)
                ),
                docs: v.docs.clone(),
                value: i as u32,
                options,
            });
        }

        result
    }

    fn default_enum_options(&self, e: &scanner::Enum) -> Options {
        let mut opts = Options::new();
        opts.insert(
            "(gogoproto.enumdecl)".to_string(),
            OptionValue::literal("false"),
        );
        opts.insert(
            "(gogoproto.goproto_enum_prefix)".to_string(),
            OptionValue::literal("false"),
        );
        if e.is_stringer {
            opts.insert(
                "(gogoproto.goproto_enum_stringer)".to_string(),
                OptionValue::literal("false"),
            );
        }
        opts
    }

    fn transform_func(
        &self,
        pkg: &mut Package,
        f: &scanner::Func,
        names: &HashSet<String>,
    ) -> Option<Rpc> {
        let mut name = f.name.clone();
        let mut recv = String::new();

        if let Some(receiver) = &f.receiver {
            let ScannedKind::Named {
                name: recv_name, ..
            } = &receiver.kind
            else {
                warn!("invalid receiver type for func {}", f.name);
                return None;
            };
            name = format!("{}_{}", recv_name, f.name);
            recv = recv_name.clone();
        }

        let (input, has_ctx) = remove_first_ctx(&f.input);
        let (output, has_error) = remove_last_error(&f.output);

        let input = self.transform_type_list(pkg, input, names, &name, "Request", "arg")?;
        let output = self.transform_type_list(pkg, output, names, &name, "Response", "result")?;

        Some(Rpc {
            docs: f.docs.clone(),
            name,
            recv,
            method: f.name.clone(),
            has_ctx,
            has_error,
            is_variadic: f.is_variadic,
            input,
            output,
        })
    }

    /// Produce the input or output type of an RPC. A type list is wrapped
    /// in a synthesized message unless it is a single, non-repeated named
    /// type: protobuf methods take exactly one message each way.
    fn transform_type_list(
        &self,
        pkg: &mut Package,
        types: &[scanner::Type],
        names: &HashSet<String>,
        rpc_name: &str,
        suffix: &str,
        field_prefix: &str,
    ) -> Option<Type> {
        if types.len() != 1 || types[0].is_repeated() || !is_named(&types[0]) {
            let msg_name = format!("{}{}", rpc_name, suffix);
            if names.contains(&msg_name) {
                warn!(
                    "tried to register message {}, but there is already a message with that name. RPC {} will not be generated",
                    msg_name, rpc_name
                );
                return None;
            }

            let msg = self.create_message_from_types(pkg, &msg_name, types, field_prefix);
            pkg.messages.push(msg);
            return Some(Type::generated_named(to_protobuf_pkg(&pkg.path), msg_name));
        }

        self.transform_type(pkg, &types[0], &mut Message::default(), &mut Field::default())
    }

    fn create_message_from_types(
        &self,
        pkg: &mut Package,
        name: &str,
        types: &[scanner::Type],
        field_prefix: &str,
    ) -> Message {
        let mut msg = Message {
            name: name.to_string(),
            ..Default::default()
        };

        for (i, typ) in types.iter().enumerate() {
            let field = scanner::Field {
                docs: scanner::Docs::default(),
                name: format!("{}{}", capitalize(field_prefix), i + 1),
                ty: typ.clone(),
            };
            match self.transform_field(pkg, &mut msg, &field, (i + 1) as u32) {
                Some(f) => msg.fields.push(f),
                None => msg.reserve((i + 1) as u32),
            }
        }

        msg
    }

    fn transform_field(
        &self,
        pkg: &mut Package,
        msg: &mut Message,
        field: &scanner::Field,
        pos: u32,
    ) -> Option<Field> {
        let mut f = Field {
            docs: field.docs.clone(),
            name: to_lower_snake_case(&field.name),
            pos,
            repeated: field.ty.is_repeated(),
            options: self.default_field_options(field),
            ..Default::default()
        };

        // []byte is the only repeated Go type mapping to a non-repeated
        // protobuf type.
        if is_byte_slice(&field.ty) {
            f.ty = Type::basic("bytes").with_source(field.ty.clone());
            f.repeated = false;
        } else {
            f.ty = self.transform_type(pkg, &field.ty, msg, &mut f)?;
        }

        Some(f)
    }

    fn default_field_options(&self, field: &scanner::Field) -> Options {
        let mut opts = Options::new();

        if to_camel_case(&to_lower_snake_case(&field.name)) != field.name {
            opts.insert(
                "(gogoproto.customname)".to_string(),
                OptionValue::quoted(&field.name),
            );
        }

        if self.needs_not_nullable(&field.ty) {
            opts.insert(
                "(gogoproto.nullable)".to_string(),
                OptionValue::literal("false"),
            );
        }

        opts
    }

    /// Non-nullable named references (and aliases and map values reaching
    /// them) carry `(gogoproto.nullable) = false` so the generated Go code
    /// keeps value semantics. Enums never do.
    fn needs_not_nullable(&self, typ: &scanner::Type) -> bool {
        let nullable = typ.is_nullable();
        match &typ.kind {
            ScannedKind::Named { path, name } => !nullable && !self.is_enum(path, name),
            ScannedKind::Alias { underlying, .. } => self.needs_not_nullable(underlying),
            ScannedKind::Map { value, .. } => self.needs_not_nullable(value),
            ScannedKind::Basic(_) => false,
        }
    }

    fn transform_type(
        &self,
        pkg: &mut Package,
        typ: &scanner::Type,
        msg: &mut Message,
        field: &mut Field,
    ) -> Option<Type> {
        if is_error(typ) {
            error!("error type is not supported");
            return None;
        }

        match &typ.kind {
            ScannedKind::Named { path, name } => {
                let qualified = typ.to_string();
                if let Some(mapping) = self.find_mapping(&qualified) {
                    pkg.add_import_for(mapping);
                    mapping.decorate(pkg, msg, field);
                    return Some(mapping.ty().with_source(typ.clone()));
                }

                pkg.import_from_path(path);
                Some(Type::named(to_protobuf_pkg(path), name).with_source(typ.clone()))
            }
            ScannedKind::Basic(name) => {
                if let Some(mapping) = self.find_mapping(name) {
                    pkg.add_import_for(mapping);
                    mapping.decorate(pkg, msg, field);
                    return Some(mapping.ty().with_source(typ.clone()));
                }

                warn!(
                    "basic type \"{}\" is not defined in the mappings, ignoring",
                    name
                );
                None
            }
            ScannedKind::Map { key, value } => {
                let key = self.transform_type(pkg, key, msg, field)?;
                let value = self.transform_type(pkg, value, msg, field)?;
                Some(Type::map(key, value).with_source(typ.clone()))
            }
            ScannedKind::Alias {
                declared,
                underlying,
            } => {
                let d = self.transform_type(pkg, declared, msg, field)?;
                let u = self.transform_type(pkg, underlying, msg, field)?;

                // Repeated types cannot use a cast; neither can aliases
                // whose target maps to a well-known named type, casting
                // would fight that type's own representation.
                if !typ.is_repeated() {
                    if matches!(u.kind, TypeKind::Named { .. }) {
                        warn!(
                            "alias {} targets a mapped type, no cast will be emitted",
                            declared
                        );
                    } else {
                        field.options.insert(
                            "(gogoproto.casttype)".to_string(),
                            OptionValue::quoted(cast_type(pkg, declared)),
                        );
                    }
                }

                Some(Type::alias(d, u).with_source(typ.clone()))
            }
        }
    }

    fn find_mapping(&self, name: &str) -> Option<&TypeMapping> {
        let mapping = self
            .mappings
            .get(name)
            .or_else(|| default_mappings().get(name))?;

        if let Some(message) = &mapping.warn {
            warn!("{}", message);
        }

        Some(mapping)
    }
}

impl Package {
    /// Import whatever proto file a mapping requires.
    pub(crate) fn add_import_for(&mut self, mapping: &TypeMapping) {
        if let Some(import) = &mapping.import {
            self.add_import(import.clone());
        }
    }
}

/// The Go expression the generated code casts through for an alias. Types
/// of the package being transformed stay unqualified.
fn cast_type(pkg: &Package, declared: &scanner::Type) -> String {
    if let ScannedKind::Named { path, name } = &declared.kind {
        if *path == pkg.path {
            return name.clone();
        }
    }
    declared.cast_string()
}

fn remove_first_ctx(types: &[scanner::Type]) -> (&[scanner::Type], bool) {
    if let Some(first) = types.first() {
        if is_ctx(first) {
            return (&types[1..], true);
        }
    }
    (types, false)
}

fn remove_last_error(types: &[scanner::Type]) -> (&[scanner::Type], bool) {
    if let Some(last) = types.last() {
        if is_error(last) {
            return (&types[..types.len() - 1], true);
        }
    }
    (types, false)
}

fn is_named(typ: &scanner::Type) -> bool {
    matches!(typ.kind, ScannedKind::Named { .. })
}

fn is_ctx(typ: &scanner::Type) -> bool {
    matches!(
        &typ.kind,
        ScannedKind::Named { path, name } if path == "context" && name == "Context"
    )
}

fn is_error(typ: &scanner::Type) -> bool {
    matches!(
        &typ.kind,
        ScannedKind::Named { path, name } if path.is_empty() && name == "error"
    )
}

fn is_byte_slice(typ: &scanner::Type) -> bool {
    typ.is_repeated() && matches!(&typ.kind, ScannedKind::Basic(name) if name == "byte")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Names already taken in a package, so synthesized request and response
/// messages never collide with scanned declarations.
fn build_name_set(pkg: &scanner::Package) -> HashSet<String> {
    let mut names = HashSet::new();
    for e in &pkg.enums {
        names.insert(e.name.clone());
    }
    for s in &pkg.structs {
        names.insert(s.name.clone());
    }
    names
}
