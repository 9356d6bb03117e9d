//! Compilation pipeline of the proteus tool.
//!
//! Wires the stages together: scan the requested packages in parallel,
//! resolve them globally, transform each into a protobuf package and hand
//! the result to one of the emitters (proto schemas, gRPC server facade).

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use proteus_protobuf::{GenError, Transformer, TypeMappings, TypeSet};
use proteus_resolver::Resolver;
use proteus_rpc::RpcGenError;
use proteus_scanner::{self as scanner, ScanError, Scanner};
use proteus_source::{Importer, Workspace};

/// Options configuring proto generation.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Directory the generated `.proto` files are written under.
    pub base_path: PathBuf,
    /// Import paths of the packages to scan.
    pub packages: Vec<String>,
    /// Custom type mappings, consulted before the defaults.
    pub mappings: TypeMappings,
}

/// A fatal pipeline failure.
#[derive(Debug)]
pub enum PipelineError {
    Scan(ScanError),
    Schema(GenError),
    Rpc(RpcGenError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Scan(err) => err.fmt(f),
            PipelineError::Schema(err) => err.fmt(f),
            PipelineError::Rpc(err) => err.fmt(f),
        }
    }
}

impl StdError for PipelineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PipelineError::Scan(err) => Some(err),
            PipelineError::Schema(err) => Some(err),
            PipelineError::Rpc(err) => Some(err),
        }
    }
}

impl From<ScanError> for PipelineError {
    fn from(err: ScanError) -> Self {
        PipelineError::Scan(err)
    }
}

impl From<GenError> for PipelineError {
    fn from(err: GenError) -> Self {
        PipelineError::Schema(err)
    }
}

impl From<RpcGenError> for PipelineError {
    fn from(err: RpcGenError) -> Self {
        PipelineError::Rpc(err)
    }
}

/// Scan, resolve and transform the given packages, returning each IR
/// package next to its protobuf counterpart, in input order.
pub fn transform_packages(
    importer: Arc<dyn Importer>,
    packages: Vec<String>,
    mappings: TypeMappings,
) -> Result<Vec<(scanner::Package, proteus_protobuf::Package)>, PipelineError> {
    let scanner = Scanner::new(importer, packages);
    let mut pkgs = scanner.scan()?;

    Resolver::new().resolve(&mut pkgs);

    let mut transformer = Transformer::new();
    transformer.set_mappings(mappings);
    let mut structs = TypeSet::new();
    let mut enums = TypeSet::new();
    for p in &pkgs {
        for s in &p.structs {
            structs.add(&p.path, &s.name);
        }
        for e in &p.enums {
            enums.add(&p.path, &e.name);
        }
    }
    transformer.set_struct_set(structs);
    transformer.set_enum_set(enums);

    Ok(pkgs
        .into_iter()
        .map(|p| {
            let proto = transformer.transform(&p);
            (p, proto)
        })
        .collect())
}

/// Generate one `.proto` schema file per package.
pub fn generate_protos(importer: Arc<dyn Importer>, options: &Options) -> Result<(), PipelineError> {
    let generator = proteus_protobuf::Generator::new(&options.base_path);
    for (_, proto) in transform_packages(
        importer,
        options.packages.clone(),
        options.mappings.clone(),
    )? {
        generator.generate(&proto)?;
    }
    Ok(())
}

/// Generate the gRPC server implementation of the given packages, next to
/// their sources inside the workspace.
pub fn generate_rpc_server(
    importer: Arc<dyn Importer>,
    workspace: Workspace,
    packages: Vec<String>,
    mappings: TypeMappings,
) -> Result<(), PipelineError> {
    let generator = proteus_rpc::Generator::new(Arc::clone(&importer), workspace);
    for (pkg, proto) in transform_packages(importer, packages, mappings)? {
        generator.generate(&proto, &pkg.path)?;
    }
    Ok(())
}
