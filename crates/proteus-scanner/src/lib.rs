//! First pipeline stage: walk imported packages and build a neutral IR.
//!
//! The IR is neither a Go type nor a protobuf type; it is the intermediate
//! shape the resolver mutates and the transformer consumes. One parallel
//! task runs per input package; everything downstream is single-threaded.

mod package;
mod scanner;
mod tags;
mod types;

pub use package::{Enum, EnumValue, Field, Func, Package, Struct};
pub use scanner::{PackageError, ScanError, Scanner};
pub use tags::find_proteus_tags;
pub use types::{is_annotated, Docs, Documentable, Type, TypeKind, GENERATE_DIRECTIVE};
