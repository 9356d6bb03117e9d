//! Third and fourth pipeline stages: transform resolved IR packages into
//! protobuf packages and emit them as proto3 schema files.

mod gen;
mod mappings;
mod names;
mod package;
mod transform;
mod type_set;
mod writer;

pub use gen::{GenError, Generator};
pub use mappings::{
    cast_type_decorator, default_mappings, field_option_decorator, Decorator, TypeMapping,
    TypeMappings, GOGO_PROTO_IMPORT,
};
pub use names::{service_name, to_camel_case, to_lower_snake_case, to_protobuf_pkg, to_upper_snake_case};
pub use package::{
    Enum, EnumValue, Field, Message, OptionValue, Options, Package, Rpc, Type, TypeKind,
};
pub use transform::Transformer;
pub use type_set::TypeSet;
pub use writer::CodeWriter;
