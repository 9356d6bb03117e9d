//! End-to-end tests of the pipeline over descriptor fixtures.
//!
//! Each test builds a scratch workspace, exports package descriptors into
//! it and runs the library pipeline, asserting on the emitted artifacts.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use proteus_driver::{generate_protos, generate_rpc_server, Options};
use proteus_source::{
    DescriptorImporter, Package, PackageBuilder, PackageDescriptor, StructField, Workspace,
};

// Reporting state is global; tests that toggle it must not interleave.
static REPORT_LOCK: Mutex<()> = Mutex::new(());

const GEN: &str = "//proteus:generate";

fn export(root: &Path, pkg: &Package) {
    let dir = root.join("src").join(pkg.path());
    fs::create_dir_all(&dir).unwrap();
    let descriptor = PackageDescriptor::from(pkg);
    let name = pkg.name().to_string();
    fs::write(
        dir.join(format!("{}.types.json", name)),
        serde_json::to_string_pretty(&descriptor).unwrap(),
    )
    .unwrap();
}

fn field(name: &str, ty: proteus_source::TypeId) -> StructField {
    StructField {
        name: name.to_string(),
        ty,
        tag: String::new(),
        embedded: false,
        docs: Vec::new(),
    }
}

/// The `ex` package of the enum scenario: an annotated byte type with
/// three constants.
fn enum_package() -> Package {
    let mut b = PackageBuilder::new("acme/ex", "ex");
    let byte = b.basic("byte");
    let t = b.named("acme/ex", "T", byte);
    b.declare_type("T", t, vec![GEN.to_string()]);
    b.declare_const("A", t, 0, Vec::new());
    b.declare_const("B", t, 1, Vec::new());
    b.declare_const("C", t, 2, Vec::new());
    b.build()
}

/// A package with one annotated function `F(a int, b float64) (int, int)`.
fn func_package() -> Package {
    let mut b = PackageBuilder::new("acme/fns", "fns");
    let int = b.basic("int");
    let float64 = b.basic("float64");
    let sig = b.signature(vec![int, float64], vec![int, int], false);
    b.declare_func("F", sig, vec![GEN.to_string()]);
    b.build()
}

/// The struct scenario: embedded struct, slices, maps and std time types.
fn struct_package() -> Package {
    let mut b = PackageBuilder::new("acme/models", "models");
    let int = b.basic("int");
    let uint64 = b.basic("uint64");
    let string = b.basic("string");

    let bar_fields = b.struct_type(vec![field("Bar", uint64)]);
    let bar = b.named("acme/models", "Bar", bar_fields);
    b.declare_type("Bar", bar, Vec::new());

    let qux_fields = b.struct_type(vec![field("A", int)]);
    let qux = b.named("acme/models", "Qux", qux_fields);
    b.declare_type("Qux", qux, Vec::new());

    let time_struct = b.struct_type(vec![]);
    let time_time = b.named("time", "Time", time_struct);
    let int64 = b.basic("int64");
    let time_duration = b.named("time", "Duration", int64);

    let int_slice = b.slice(int);
    let qux_ptr = b.pointer(qux);
    let map_ty = b.map(string, qux_ptr);
    let secret = StructField {
        tag: r#"proteus:"-""#.to_string(),
        ..field("Secret", string)
    };
    let foo_fields = b.struct_type(vec![
        StructField {
            embedded: true,
            ..field("Bar", bar)
        },
        field("IntList", int_slice),
        field("Map", map_ty),
        field("Timestamp", time_time),
        field("Duration", time_duration),
        secret,
    ]);
    let foo = b.named("acme/models", "Foo", foo_fields);
    b.declare_type("Foo", foo, vec![GEN.to_string()]);

    b.build()
}

/// The method scenario: `func (p *Point) M(a int32) *Point`.
fn point_package() -> Package {
    let mut b = PackageBuilder::new("acme/geo", "geo");
    let int32 = b.basic("int32");
    let point_fields = b.struct_type(vec![field("X", int32), field("Y", int32)]);
    let point = b.named("acme/geo", "Point", point_fields);
    let point_ptr = b.pointer(point);
    let sig = b.signature(vec![int32], vec![point_ptr], false);
    b.add_method(point, "M", sig, vec![GEN.to_string()]);
    b.declare_type("Point", point, vec![GEN.to_string()]);
    b.build()
}

fn run_protos(root: &Path, out: &Path, packages: &[&str]) {
    let workspace = Workspace::new(root);
    let importer = Arc::new(DescriptorImporter::new(workspace));
    generate_protos(
        importer,
        &Options {
            base_path: out.to_path_buf(),
            packages: packages.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        },
    )
    .unwrap();
}

#[test]
fn test_enum_scenario() {
    let _guard = REPORT_LOCK.lock().unwrap();
    proteus_report::set_test_mode(true);
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    export(root.path(), &enum_package());

    run_protos(root.path(), out.path(), &["acme/ex"]);
    proteus_report::set_test_mode(false);

    let proto = fs::read_to_string(out.path().join("acme/ex/generated.proto")).unwrap();
    assert!(proto.contains("enum T {"));
    assert!(proto.contains("T_A = 0 [(gogoproto.enumvalue_customname) = \"A\"];"));
    assert!(proto.contains("T_B = 1"));
    assert!(proto.contains("T_C = 2"));
    // The alias was promoted, so no cast-typed message field remains.
    assert!(!proto.contains("casttype"));
}

#[test]
fn test_func_scenario() {
    let _guard = REPORT_LOCK.lock().unwrap();
    proteus_report::set_test_mode(true);
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    export(root.path(), &func_package());

    run_protos(root.path(), out.path(), &["acme/fns"]);
    proteus_report::set_test_mode(false);

    let proto = fs::read_to_string(out.path().join("acme/fns/generated.proto")).unwrap();
    assert!(proto.contains("message FRequest {"));
    assert!(proto.contains("int64 arg1 = 1"));
    assert!(proto.contains("double arg2 = 2"));
    assert!(proto.contains("message FResponse {"));
    assert!(proto.contains("int64 result1 = 1"));
    assert!(proto.contains("int64 result2 = 2"));
    assert!(proto.contains("service FnsService {"));
    assert!(proto.contains("rpc F (FRequest) returns (FResponse);"));
}

#[test]
fn test_struct_scenario() {
    let _guard = REPORT_LOCK.lock().unwrap();
    proteus_report::set_test_mode(true);
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    export(root.path(), &struct_package());

    run_protos(root.path(), out.path(), &["acme/models"]);
    proteus_report::set_test_mode(false);

    let proto = fs::read_to_string(out.path().join("acme/models/generated.proto")).unwrap();
    assert!(proto.contains("message Foo {"));
    assert!(proto.contains("uint64 bar = 1"));
    assert!(proto.contains("repeated int64 int_list = 2"));
    assert!(proto.contains("map<string, Qux> map = 3"));
    assert!(proto.contains("google.protobuf.Timestamp timestamp = 4"));
    assert!(proto.contains("(gogoproto.stdtime) = true"));
    assert!(proto.contains("google.protobuf.Duration duration = 5"));
    assert!(proto.contains("(gogoproto.stdduration) = true"));
    assert!(proto.contains("import \"google/protobuf/timestamp.proto\";"));
    assert!(proto.contains("import \"google/protobuf/duration.proto\";"));

    // Qux is pulled in transitively; Bar stays out (only embedded).
    assert!(proto.contains("message Qux {"));
    assert!(!proto.contains("message Bar {"));

    // The excluded field leaves no trace, not even a reserved number.
    assert!(!proto.contains("secret"));
    assert!(!proto.contains("reserved"));
}

#[test]
fn test_method_scenario() {
    let _guard = REPORT_LOCK.lock().unwrap();
    proteus_report::set_test_mode(true);
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    export(root.path(), &point_package());

    run_protos(root.path(), out.path(), &["acme/geo"]);
    proteus_report::set_test_mode(false);

    let proto = fs::read_to_string(out.path().join("acme/geo/generated.proto")).unwrap();
    assert!(proto.contains("message Point_MRequest {"));
    assert!(proto.contains("int32 arg1 = 1"));
    assert!(proto.contains("rpc Point_M (Point_MRequest) returns (Point);"));
}

#[test]
fn test_unscanned_package_drops_only_the_affected_func() {
    let _guard = REPORT_LOCK.lock().unwrap();
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let mut b = PackageBuilder::new("acme/svc", "svc");
    let int = b.basic("int");
    let file_struct = b.struct_type(vec![]);
    let os_file = b.named("os", "File", file_struct);
    let bad_sig = b.signature(vec![os_file], vec![int], false);
    b.declare_func("UsesFile", bad_sig, vec![GEN.to_string()]);
    let good_sig = b.signature(vec![int], vec![int], false);
    b.declare_func("Doubles", good_sig, vec![GEN.to_string()]);
    export(root.path(), &b.build());

    proteus_report::set_test_mode(true);
    run_protos(root.path(), out.path(), &["acme/svc"]);
    let messages = proteus_report::drain_messages();
    proteus_report::set_test_mode(false);

    let proto = fs::read_to_string(out.path().join("acme/svc/generated.proto")).unwrap();
    assert!(!proto.contains("UsesFile"));
    assert!(proto.contains("rpc Doubles (DoublesRequest) returns (DoublesResponse);"));
    assert!(messages
        .iter()
        .any(|(_, m)| m.contains("UsesFile") && m.contains("will not be generated")));
}

#[test]
fn test_cross_package_references_import_schemas() {
    let _guard = REPORT_LOCK.lock().unwrap();
    proteus_report::set_test_mode(true);
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    export(root.path(), &point_package());

    let mut b = PackageBuilder::new("acme/world", "world");
    let geo_struct = b.struct_type(vec![]);
    let point = b.named("acme/geo", "Point", geo_struct);
    let fields = b.struct_type(vec![field("Origin", point)]);
    let world = b.named("acme/world", "Map", fields);
    b.declare_type("Map", world, vec![GEN.to_string()]);
    export(root.path(), &b.build());

    run_protos(root.path(), out.path(), &["acme/world", "acme/geo"]);
    proteus_report::set_test_mode(false);

    let proto = fs::read_to_string(out.path().join("acme/world/generated.proto")).unwrap();
    assert!(proto.contains("import \"acme/geo/generated.proto\";"));
    assert!(proto.contains("acme.geo.Point origin = 1"));
}

#[test]
fn test_output_is_deterministic_and_idempotent() {
    let _guard = REPORT_LOCK.lock().unwrap();
    proteus_report::set_test_mode(true);
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    export(root.path(), &struct_package());
    export(root.path(), &enum_package());

    run_protos(root.path(), out.path(), &["acme/models", "acme/ex"]);
    let first_models =
        fs::read_to_string(out.path().join("acme/models/generated.proto")).unwrap();
    let first_ex = fs::read_to_string(out.path().join("acme/ex/generated.proto")).unwrap();

    // A second run over the same inputs, with the previous outputs still
    // in place, must produce byte-identical files.
    run_protos(root.path(), out.path(), &["acme/models", "acme/ex"]);
    proteus_report::set_test_mode(false);

    assert_eq!(
        first_models,
        fs::read_to_string(out.path().join("acme/models/generated.proto")).unwrap()
    );
    assert_eq!(
        first_ex,
        fs::read_to_string(out.path().join("acme/ex/generated.proto")).unwrap()
    );
}

#[test]
fn test_rpc_server_generation() {
    let _guard = REPORT_LOCK.lock().unwrap();
    proteus_report::set_test_mode(true);
    let root = tempfile::tempdir().unwrap();
    export(root.path(), &func_package());

    let workspace = Workspace::new(root.path());
    let importer = Arc::new(DescriptorImporter::new(workspace.clone()));
    generate_rpc_server(
        importer,
        workspace,
        vec!["acme/fns".to_string()],
        Default::default(),
    )
    .unwrap();
    proteus_report::set_test_mode(false);

    let server =
        fs::read_to_string(root.path().join("src/acme/fns/server.proteus.go")).unwrap();
    assert!(server.contains("package fns"));
    assert!(server.contains("type fnsServiceServer struct {"));
    assert!(server.contains("func NewFnsServiceServer() *fnsServiceServer {"));
    assert!(server.contains(
        "func (s *fnsServiceServer) F(ctx context.Context, in *FRequest) (result *FResponse, err error) {"
    ));
    assert!(server.contains("result.Result1, result.Result2 = F(in.Arg1, in.Arg2)"));
}

#[test]
fn test_scan_failure_reports_every_package() {
    let _guard = REPORT_LOCK.lock().unwrap();
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    fs::create_dir_all(root.path().join("src/acme/empty1")).unwrap();
    fs::create_dir_all(root.path().join("src/acme/empty2")).unwrap();

    let workspace = Workspace::new(root.path());
    let importer = Arc::new(DescriptorImporter::new(workspace));
    let err = generate_protos(
        importer,
        &Options {
            base_path: out.path().to_path_buf(),
            packages: vec!["acme/empty1".to_string(), "acme/empty2".to_string()],
            ..Default::default()
        },
    )
    .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("acme/empty1"));
    assert!(message.contains("acme/empty2"));
}
