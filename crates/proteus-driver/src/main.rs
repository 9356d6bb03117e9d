//! The proteus command line tool.

use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use proteus_driver::{generate_protos, generate_rpc_server, Options};
use proteus_protobuf::default_mappings;
use proteus_report as report;
use proteus_source::{DescriptorImporter, Workspace};

#[derive(Parser)]
#[command(
    name = "proteus",
    version,
    about = "Generates protobuf 3 schemas and gRPC server implementations from Go packages",
    long_about = "Proteus generates code and protobuffer 3 proto files while keeping\nyour Go source code as the source of truth."
)]
struct Cli {
    #[command(flatten)]
    base: BaseArgs,

    /// Write all generated .proto files to FOLDER
    #[arg(short = 'f', long = "folder", value_name = "FOLDER", global = true)]
    folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct BaseArgs {
    /// Use PACKAGE as input for the generation; repeat the flag to
    /// specify more than one package
    #[arg(short = 'p', long = "pkg", value_name = "PACKAGE", global = true)]
    packages: Vec<String>,

    /// Print all warnings and info messages
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate .proto files from Go packages
    Proto,
    /// Generate the gRPC server implementation defined by the Go packages
    Rpc,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Proto) => with_env(&cli.base, |env| gen_protos(env, cli.folder.as_deref())),
        Some(Commands::Rpc) => with_env(&cli.base, gen_rpc_server),
        None => with_env(&cli.base, |env| gen_all(env, cli.folder.as_deref())),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

/// Everything the commands need: the workspace and a shared importer.
struct Env {
    workspace: Workspace,
    importer: Arc<DescriptorImporter>,
    packages: Vec<String>,
}

type CmdResult = Result<(), Box<dyn Error>>;

/// Validate the configuration shared by every command and run it.
fn with_env(base: &BaseArgs, cmd: impl FnOnce(&Env) -> CmdResult) -> CmdResult {
    if base.packages.is_empty() {
        return Err("no package provided, there is nothing to generate".into());
    }

    if !base.verbose {
        report::set_silent(true);
    }

    let workspace = Workspace::from_env()?;
    for pkg in &base.packages {
        workspace.check_package_dir(pkg)?;
    }

    let importer = Arc::new(DescriptorImporter::new(workspace.clone()));
    cmd(&Env {
        workspace,
        importer,
        packages: base.packages.clone(),
    })
}

fn gen_protos(env: &Env, folder: Option<&Path>) -> CmdResult {
    let Some(folder) = folder else {
        return Err("destination path cannot be empty".into());
    };
    check_folder(folder)?;

    generate_protos(
        env.importer.clone(),
        &Options {
            base_path: folder.to_path_buf(),
            packages: env.packages.clone(),
            ..Default::default()
        },
    )?;
    Ok(())
}

fn gen_rpc_server(env: &Env) -> CmdResult {
    generate_rpc_server(
        env.importer.clone(),
        env.workspace.clone(),
        env.packages.clone(),
        Default::default(),
    )?;
    Ok(())
}

/// The default action: generate protos, compile them with protoc, move
/// the produced Go files next to the package sources and generate the
/// gRPC server implementations.
fn gen_all(env: &Env, folder: Option<&Path>) -> CmdResult {
    let protoc = look_path("protoc").ok_or("protoc is not installed")?;

    let protobuf_src = env
        .workspace
        .src_dir()
        .join("github.com/gogo/protobuf");
    if check_folder(&protobuf_src).is_err() {
        return Err("github.com/gogo/protobuf is not installed".into());
    }

    gen_protos(env, folder)?;
    let folder = folder.expect("gen_protos validated the folder");

    for pkg in &env.packages {
        let proto = folder.join(pkg).join("generated.proto");

        protoc_exec(&protoc, &env.workspace, &protobuf_src, folder, pkg, &proto)
            .map_err(|e| format!("error generating Go files from {:?}: {}", proto, e))?;

        let move_to = env.workspace.package_dir(pkg);
        for file in pb_go_files(&folder.join(pkg))? {
            let dest = move_to.join(file.file_name().expect("read_dir entries have names"));
            fs::rename(&file, &dest)
                .map_err(|e| format!("error moving {} to {}: {}", file.display(), dest.display(), e))?;
        }
    }

    gen_rpc_server(env)
}

fn protoc_exec(
    protoc: &Path,
    workspace: &Workspace,
    protobuf_src: &Path,
    folder: &Path,
    pkg: &str,
    proto_file: &Path,
) -> CmdResult {
    let proto_path = format!(
        "--proto_path={}:{}:{}:.",
        workspace.src_dir().display(),
        protobuf_src.join("protobuf").display(),
        folder.join(pkg).display()
    );

    let status = Command::new(protoc)
        .arg(proto_path)
        .arg(gofast_out_option(&workspace.src_dir()))
        .arg(proto_file)
        .status()?;

    if !status.success() {
        return Err(format!("protoc exited with status {}", status).into());
    }
    Ok(())
}

/// The `--gofast_out` option with the well-known-type import mappings.
fn gofast_out_option(out_path: &Path) -> String {
    let mut option = String::from("--gofast_out=plugins=grpc");

    let mappings = default_mappings().to_gofast_out_path();
    if !mappings.is_empty() {
        option.push(',');
        option.push_str(&mappings);
    }

    option.push(':');
    option.push_str(&out_path.to_string_lossy());
    option
}

/// The `*.pb.go` files protoc produced in a directory.
fn pb_go_files(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().ends_with(".pb.go") {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Find an executable in `$PATH`.
fn look_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn check_folder(path: &Path) -> Result<(), Box<dyn Error>> {
    match fs::metadata(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err("folder does not exist, please create it first".into())
        }
        Err(e) => Err(e.into()),
        Ok(meta) if !meta.is_dir() => {
            Err(format!("folder is not directory: {}", path.display()).into())
        }
        Ok(_) => Ok(()),
    }
}
