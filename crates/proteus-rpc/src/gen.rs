//! Emission of the `server.proteus.go` dispatch file.

use std::error::Error as StdError;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use proteus_protobuf as pb;
use proteus_protobuf::CodeWriter;
use proteus_report::warn;
use proteus_source::{ImportError, Importer, Workspace};

use crate::context::{constructor_name, service_impl_name, Context};

/// Name of the dispatch file written next to the package sources.
pub const FACADE_FILE: &str = "server.proteus.go";

/// Generates the gRPC server implementation of a package.
pub struct Generator {
    importer: Arc<dyn Importer>,
    workspace: Workspace,
}

#[derive(Debug)]
pub enum RpcGenError {
    Import(ImportError),
    /// An RPC references a function, method or message the source package
    /// does not declare; the inputs are out of sync.
    MissingDeclaration { package: String, name: String },
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for RpcGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcGenError::Import(err) => err.fmt(f),
            RpcGenError::MissingDeclaration { package, name } => {
                write!(f, "package {} does not declare {}", package, name)
            }
            RpcGenError::Io { path, source } => {
                write!(f, "error writing {}: {}", path.display(), source)
            }
        }
    }
}

impl StdError for RpcGenError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RpcGenError::Import(err) => Some(err),
            RpcGenError::Io { source, .. } => Some(source),
            RpcGenError::MissingDeclaration { .. } => None,
        }
    }
}

impl From<ImportError> for RpcGenError {
    fn from(err: ImportError) -> Self {
        RpcGenError::Import(err)
    }
}

impl Generator {
    pub fn new(importer: Arc<dyn Importer>, workspace: Workspace) -> Self {
        Generator {
            importer,
            workspace,
        }
    }

    /// Write the dispatch file for a package. Returns the written path, or
    /// `None` when the package declares no RPCs and nothing is generated.
    pub fn generate(
        &self,
        proto: &pb::Package,
        path: &str,
    ) -> Result<Option<PathBuf>, RpcGenError> {
        if proto.rpcs.is_empty() {
            warn!("no RPCs in the given proto file, not generating anything");
            return Ok(None);
        }

        let pkg = self.importer.import(path)?;
        let content = render(proto, &pkg)?;

        let dir = self.workspace.package_dir(path);
        let dest = dir.join(FACADE_FILE);
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|source| RpcGenError::Io {
            path: dir.clone(),
            source,
        })?;
        tmp.write_all(content.as_bytes())
            .map_err(|source| RpcGenError::Io {
                path: dest.clone(),
                source,
            })?;
        tmp.persist(&dest).map_err(|e| RpcGenError::Io {
            path: dest.clone(),
            source: e.error,
        })?;

        Ok(Some(dest))
    }
}

/// Render the dispatch file for a proto package and its source package.
pub fn render(
    proto: &pb::Package,
    pkg: &proteus_source::Package,
) -> Result<String, RpcGenError> {
    let mut ctx = Context::new(proto, pkg);
    let impl_name = service_impl_name(proto);
    let ctor_name = constructor_name(proto);

    // Declarations render first so the imports they discover can go into
    // the file header afterwards.
    let mut decls = CodeWriter::new("\t");

    if !ctx.is_name_defined(&impl_name) {
        decls.block(&format!("type {} struct", impl_name), |_| {});
        decls.blank_line();
    }

    if !ctx.is_name_defined(&ctor_name) {
        warn!(
            "constructor {} for service {} is not implemented",
            ctor_name,
            proto.service_name()
        );
        decls.block(&format!("func {}() *{}", ctor_name, impl_name), |w| {
            w.writeln(&format!("return &{}{{}}", impl_name));
        });
    }

    for rpc in &proto.rpcs {
        render_method(&mut decls, &mut ctx, &impl_name, rpc)?;
    }

    let mut w = CodeWriter::new("\t");
    w.writeln(&format!("package {}", pkg.name()));
    w.blank_line();
    w.writeln("import (");
    w.indented(|w| {
        w.writeln("\"golang.org/x/net/context\"");
        for import in &ctx.imports {
            w.writeln(&format!("{:?}", import));
        }
    });
    w.writeln(")");
    w.blank_line();

    Ok(w.into_string() + &decls.into_string())
}

fn render_method(
    w: &mut CodeWriter,
    ctx: &mut Context<'_>,
    impl_name: &str,
    rpc: &pb::Rpc,
) -> Result<(), RpcGenError> {
    let pkg_path = ctx.pkg.path().to_string();
    let missing = move |name: &str| RpcGenError::MissingDeclaration {
        package: pkg_path.clone(),
        name: name.to_string(),
    };

    let in_type = if rpc.input.is_generated() {
        rpc.input.name().to_string()
    } else {
        ctx.argument_type(rpc).ok_or_else(|| missing(&rpc.method))?
    };
    let out_type = if rpc.output.is_generated() {
        rpc.output.name().to_string()
    } else {
        ctx.return_type(rpc).ok_or_else(|| missing(&rpc.method))?
    };

    let call = call_expr(ctx, rpc).ok_or_else(|| missing(rpc.input.name()))?;

    let header = format!(
        "func (s *{}) {}(ctx context.Context, in *{}) (result *{}, err error)",
        impl_name, rpc.name, in_type, out_type
    );

    let mut body: Vec<String> = Vec::new();
    if rpc.output.is_generated() {
        let msg = ctx
            .find_message(rpc.output.name())
            .ok_or_else(|| missing(rpc.output.name()))?;

        if msg.fields.is_empty() && !rpc.has_error {
            // Nothing to assign: the call stands alone.
            body.push(call);
        } else {
            body.push(format!("result = new({})", out_type));
            let mut lhs = result_assignments(msg);
            if rpc.has_error {
                lhs.push("err".to_string());
            }
            body.push(format!("{} = {}", lhs.join(", "), call));
        }
    } else {
        body.push(format!("result = new({})", out_type));

        let output_nullable = rpc
            .output
            .source
            .as_ref()
            .map(|s| s.is_nullable())
            .unwrap_or(true);

        if output_nullable {
            let mut lhs = vec!["result".to_string()];
            if rpc.has_error {
                lhs.push("err".to_string());
            }
            body.push(format!("{} = {}", lhs.join(", "), call));
        } else {
            // The function returns a value; take its address for the
            // result pointer.
            let mut lhs = vec!["aux".to_string()];
            if rpc.has_error {
                lhs.push("err".to_string());
            }
            body.push(format!("{} := {}", lhs.join(", "), call));
            body.push("result = &aux".to_string());
        }
    }
    body.push("return".to_string());

    w.block(&header, |w| {
        for line in &body {
            w.writeln(line);
        }
    });
    Ok(())
}

/// Left-hand sides aligning the call results with the response fields,
/// with `_` placeholders for reserved (dropped) positions.
fn result_assignments(msg: &pb::Message) -> Vec<String> {
    let total = msg.fields.len() + msg.reserved.len();
    (1..=total as u32)
        .map(|pos| {
            if msg.fields.iter().any(|f| f.pos == pos) {
                format!("result.Result{}", pos)
            } else {
                "_".to_string()
            }
        })
        .collect()
}

/// The dispatch expression: `s.Recv.Method(args)` for methods, a plain
/// call for package functions, with the variadic tail splatted.
fn call_expr(ctx: &Context<'_>, rpc: &pb::Rpc) -> Option<String> {
    let mut args: Vec<String> = Vec::new();
    if rpc.has_ctx {
        args.push("ctx".to_string());
    }

    if rpc.input.is_generated() {
        let msg = ctx.find_message(rpc.input.name())?;
        for field in &msg.fields {
            args.push(format!("in.Arg{}", field.pos));
        }
    } else {
        args.push("in".to_string());
    }

    if rpc.is_variadic {
        if let Some(last) = args.last_mut() {
            last.push_str("...");
        }
    }

    let fun = if rpc.recv.is_empty() {
        rpc.method.clone()
    } else {
        format!("s.{}.{}", rpc.recv, rpc.method)
    };

    Some(format!("{}({})", fun, args.join(", ")))
}
