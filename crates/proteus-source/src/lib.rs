//! Model of a type-checked Go package as seen by the generator.
//!
//! The Go type-checker itself is an external collaborator: something else
//! parses and checks the source and exports a package descriptor. This
//! crate owns the in-memory shape of that result (an arena-backed type
//! graph plus a name-ordered scope of objects), the `Importer` contract
//! the pipeline consumes packages through, and the descriptor-file
//! importer shipped with the tool.

pub mod descriptor;
pub mod importer;
mod package;
mod types;

pub use descriptor::PackageDescriptor;
pub use importer::{DescriptorImporter, ImportError, Importer, Workspace};
pub use package::{is_exported, Object, Package, PackageBuilder};
pub use types::{Method, StructField, TypeId, TypeNode};
