//! Declarative mappings from Go types to protobuf types.
//!
//! Custom mappings are consulted before the defaults, so users can
//! override the translation of any type.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::package::{Field, Message, OptionValue, Package, Type};

/// The gogo protobuf extensions every generated schema imports.
pub const GOGO_PROTO_IMPORT: &str = "github.com/gogo/protobuf/gogoproto/gogo.proto";

/// A side effect a mapping applies to the package, message and field the
/// mapped type appears in.
pub type Decorator = Arc<dyn Fn(&mut Package, &mut Message, &mut Field) + Send + Sync>;

/// Decorator setting a field option, e.g. `(gogoproto.stdtime) = true`.
pub fn field_option_decorator(name: &str, value: OptionValue) -> Decorator {
    let name = name.to_string();
    Arc::new(move |_pkg, _msg, field| {
        field.options.insert(name.clone(), value.clone());
    })
}

/// Decorator recording the original Go type so the generated code casts
/// through it instead of using the widened protobuf representation.
pub fn cast_type_decorator(go_type: &str) -> Decorator {
    field_option_decorator("(gogoproto.casttype)", OptionValue::quoted(go_type))
}

/// How one Go type translates to protobuf.
#[derive(Clone)]
pub struct TypeMapping {
    /// Protobuf package of the target type; empty for scalars.
    pub package: String,
    /// Target type name.
    pub name: String,
    /// True when the target is a protobuf scalar.
    pub basic: bool,
    /// Proto file the target type lives in, if any.
    pub import: Option<String>,
    /// Go package the generated code needs for this type, consumed by the
    /// `protoc` mapping flags.
    pub go_import: Option<String>,
    /// Warning reported every time the mapping is used.
    pub warn: Option<String>,
    pub decorators: Vec<Decorator>,
}

impl fmt::Debug for TypeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMapping")
            .field("package", &self.package)
            .field("name", &self.name)
            .field("basic", &self.basic)
            .field("import", &self.import)
            .field("go_import", &self.go_import)
            .field("warn", &self.warn)
            .field("decorators", &self.decorators.len())
            .finish()
    }
}

impl TypeMapping {
    /// A mapping to a protobuf scalar.
    pub fn basic(name: impl Into<String>) -> Self {
        TypeMapping {
            package: String::new(),
            name: name.into(),
            basic: true,
            import: None,
            go_import: None,
            warn: None,
            decorators: Vec::new(),
        }
    }

    /// A mapping to a named type in another protobuf package.
    pub fn named(package: impl Into<String>, name: impl Into<String>) -> Self {
        TypeMapping {
            package: package.into(),
            name: name.into(),
            basic: false,
            import: None,
            go_import: None,
            warn: None,
            decorators: Vec::new(),
        }
    }

    /// A widening scalar mapping: the Go type does not exist in protobuf,
    /// so it maps to a wider scalar, keeps a cast back to `go_type` and
    /// warns on use.
    pub fn widened(name: &str, go_type: &str) -> Self {
        TypeMapping::basic(name)
            .with_warn(format!(
                "type {} will be widened to {} in protobuf, generated code casts it back",
                go_type, name
            ))
            .with_decorator(cast_type_decorator(go_type))
    }

    pub fn with_import(mut self, import: impl Into<String>) -> Self {
        self.import = Some(import.into());
        self
    }

    pub fn with_go_import(mut self, go_import: impl Into<String>) -> Self {
        self.go_import = Some(go_import.into());
        self
    }

    pub fn with_warn(mut self, warn: impl Into<String>) -> Self {
        self.warn = Some(warn.into());
        self
    }

    pub fn with_decorator(mut self, decorator: Decorator) -> Self {
        self.decorators.push(decorator);
        self
    }

    /// The protobuf type this mapping produces.
    pub fn ty(&self) -> Type {
        if self.basic {
            Type::basic(&self.name)
        } else {
            Type::named(&self.package, &self.name)
        }
    }

    /// Run every decorator.
    pub fn decorate(&self, pkg: &mut Package, msg: &mut Message, field: &mut Field) {
        for decorator in &self.decorators {
            decorator(pkg, msg, field);
        }
    }
}

/// Mapping table keyed by the qualified Go type name (`int`, `time.Time`,
/// `foo.bar/baz.Qux`). Ordered so derived artifacts are deterministic.
#[derive(Debug, Clone, Default)]
pub struct TypeMappings(BTreeMap<String, TypeMapping>);

impl TypeMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, go_type: impl Into<String>, mapping: TypeMapping) {
        self.0.insert(go_type.into(), mapping);
    }

    pub fn get(&self, go_type: &str) -> Option<&TypeMapping> {
        self.0.get(go_type)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render the `Mproto=gopkg` assignments for the `--gofast_out`
    /// invocation, covering every mapping that needs a Go import.
    pub fn to_gofast_out_path(&self) -> String {
        let parts: Vec<String> = self
            .0
            .values()
            .filter_map(|m| match (&m.import, &m.go_import) {
                (Some(import), Some(go_import)) => Some(format!("M{}={}", import, go_import)),
                _ => None,
            })
            .collect();
        parts.join(",")
    }
}

/// The built-in translation table.
pub fn default_mappings() -> &'static TypeMappings {
    static DEFAULTS: OnceLock<TypeMappings> = OnceLock::new();
    DEFAULTS.get_or_init(|| {
        let mut m = TypeMappings::new();

        m.insert("float64", TypeMapping::basic("double"));
        m.insert("float32", TypeMapping::basic("float"));
        m.insert("int32", TypeMapping::basic("int32"));
        m.insert("int64", TypeMapping::basic("int64"));
        m.insert("uint32", TypeMapping::basic("uint32"));
        m.insert("uint64", TypeMapping::basic("uint64"));
        m.insert("bool", TypeMapping::basic("bool"));
        m.insert("string", TypeMapping::basic("string"));

        m.insert("int8", TypeMapping::widened("int32", "int8"));
        m.insert("int16", TypeMapping::widened("int32", "int16"));
        m.insert("byte", TypeMapping::widened("uint32", "byte"));
        m.insert("uint8", TypeMapping::widened("uint32", "uint8"));
        m.insert("uint16", TypeMapping::widened("uint32", "uint16"));
        m.insert("rune", TypeMapping::widened("int32", "rune"));
        m.insert("uintptr", TypeMapping::widened("uint64", "uintptr"));
        m.insert("int", TypeMapping::widened("int64", "int"));
        m.insert("uint", TypeMapping::widened("uint64", "uint"));

        m.insert(
            "time.Time",
            TypeMapping::named("google.protobuf", "Timestamp")
                .with_import("google/protobuf/timestamp.proto")
                .with_go_import("github.com/gogo/protobuf/types")
                .with_decorator(field_option_decorator(
                    "(gogoproto.stdtime)",
                    OptionValue::literal("true"),
                )),
        );
        m.insert(
            "time.Duration",
            TypeMapping::named("google.protobuf", "Duration")
                .with_import("google/protobuf/duration.proto")
                .with_go_import("github.com/gogo/protobuf/types")
                .with_decorator(field_option_decorator(
                    "(gogoproto.stdduration)",
                    OptionValue::literal("true"),
                )),
        );

        m
    })
}
