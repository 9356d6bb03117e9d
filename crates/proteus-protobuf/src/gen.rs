//! proto3 schema emission.
//!
//! Rendering is deterministic: options are stored sorted, imports keep
//! insertion order, and everything else follows the package vectors. The
//! file lands atomically so a failed run never leaves a partial schema.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use proteus_report::info;

use crate::package::{Enum, Field, Message, Options, Package, Rpc, Type, TypeKind};
use crate::writer::CodeWriter;

/// Name of the schema file emitted per package.
pub const SCHEMA_FILE: &str = "generated.proto";

/// Writes protobuf packages as proto3 files under a base directory.
pub struct Generator {
    base_path: PathBuf,
}

/// Failure writing a schema file.
#[derive(Debug)]
pub struct GenError {
    pub path: PathBuf,
    pub source: io::Error,
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error writing schema {}: {}",
            self.path.display(),
            self.source
        )
    }
}

impl StdError for GenError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

impl Generator {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Generator {
            base_path: base_path.into(),
        }
    }

    /// Render the package and write `<base>/<pkg.path>/generated.proto`.
    /// The content goes to a temporary file in the target directory first
    /// and is renamed over the destination.
    pub fn generate(&self, pkg: &Package) -> Result<PathBuf, GenError> {
        let dir = self.base_path.join(&pkg.path);
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| GenError { path, source }
        };

        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let dest = dir.join(SCHEMA_FILE);
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err(&dir))?;
        tmp.write_all(render(pkg).as_bytes()).map_err(io_err(&dest))?;
        tmp.persist(&dest).map_err(|e| GenError {
            path: dest.clone(),
            source: e.error,
        })?;

        info!("generated proto: {}", dest.display());
        Ok(dest)
    }
}

/// Render a package as proto3 text.
pub fn render(pkg: &Package) -> String {
    let mut w = CodeWriter::new("\t");

    w.writeln("syntax = \"proto3\";");
    w.writeln(&format!("package {};", pkg.name));

    if !pkg.imports.is_empty() {
        w.blank_line();
        for import in &pkg.imports {
            w.writeln(&format!("import \"{}\";", import));
        }
    }

    if !pkg.options.is_empty() {
        w.blank_line();
        write_options(&mut w, &pkg.options);
    }

    for msg in &pkg.messages {
        w.blank_line();
        write_message(&mut w, pkg, msg);
    }

    for e in &pkg.enums {
        w.blank_line();
        write_enum(&mut w, e);
    }

    if !pkg.rpcs.is_empty() {
        w.blank_line();
        write_service(&mut w, pkg);
    }

    w.into_string()
}

fn write_options(w: &mut CodeWriter, options: &Options) {
    for (name, value) in options {
        w.writeln(&format!("option {} = {};", name, value));
    }
}

fn write_message(w: &mut CodeWriter, pkg: &Package, msg: &Message) {
    w.doc_comment(&msg.docs.lines);
    w.block(&format!("message {}", msg.name), |w| {
        write_options(w, &msg.options);

        if !msg.reserved.is_empty() {
            let list: Vec<String> = msg.reserved.iter().map(|n| n.to_string()).collect();
            w.writeln(&format!("reserved {};", list.join(", ")));
        }

        for field in &msg.fields {
            write_field(w, pkg, field);
        }
    });
}

fn write_field(w: &mut CodeWriter, pkg: &Package, field: &Field) {
    w.doc_comment(&field.docs.lines);

    let mut line = String::new();
    if field.repeated {
        line.push_str("repeated ");
    }
    line.push_str(&type_ref(pkg, &field.ty));
    line.push_str(&format!(" {} = {}", field.name, field.pos));
    line.push_str(&inline_options(&field.options));
    line.push(';');
    w.writeln(&line);
}

fn write_enum(w: &mut CodeWriter, e: &Enum) {
    w.doc_comment(&e.docs.lines);
    w.block(&format!("enum {}", e.name), |w| {
        write_options(w, &e.options);
        for value in &e.values {
            w.doc_comment(&value.docs.lines);
            w.writeln(&format!(
                "{} = {}{};",
                value.name,
                value.value,
                inline_options(&value.options)
            ));
        }
    });
}

fn write_service(w: &mut CodeWriter, pkg: &Package) {
    w.block(&format!("service {}", pkg.service_name()), |w| {
        for rpc in &pkg.rpcs {
            write_rpc(w, pkg, rpc);
        }
    });
}

fn write_rpc(w: &mut CodeWriter, pkg: &Package, rpc: &Rpc) {
    w.doc_comment(&rpc.docs.lines);
    w.writeln(&format!(
        "rpc {} ({}) returns ({});",
        rpc.name,
        type_ref(pkg, &rpc.input),
        type_ref(pkg, &rpc.output)
    ));
}

/// Inline option list, `[k = v, k = v]`, empty string when there are none.
fn inline_options(options: &Options) -> String {
    if options.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = options
        .iter()
        .map(|(name, value)| format!("{} = {}", name, value))
        .collect();
    format!(" [{}]", rendered.join(", "))
}

/// Reference to a type from inside the package: local names stay bare,
/// foreign ones are package-qualified, aliases render their underlying
/// type and maps use the `map<k, v>` syntax.
fn type_ref(pkg: &Package, ty: &Type) -> String {
    match &ty.kind {
        TypeKind::Basic(name) => name.clone(),
        TypeKind::Named { package, name, .. } => {
            if package.is_empty() || *package == pkg.name {
                name.clone()
            } else {
                format!("{}.{}", package, name)
            }
        }
        TypeKind::Map { key, value } => {
            format!("map<{}, {}>", type_ref(pkg, key), type_ref(pkg, value))
        }
        TypeKind::Alias { underlying, .. } => type_ref(pkg, underlying),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{EnumValue, OptionValue};

    fn sample_package() -> Package {
        let mut pkg = Package {
            name: "github.com.acme.models".to_string(),
            path: "github.com/acme/models".to_string(),
            imports: vec![
                "github.com/gogo/protobuf/gogoproto/gogo.proto".to_string(),
                "google/protobuf/timestamp.proto".to_string(),
            ],
            ..Default::default()
        };
        pkg.options
            .insert("go_package".to_string(), OptionValue::quoted("models"));

        let mut msg = Message {
            name: "Doc".to_string(),
            ..Default::default()
        };
        msg.docs.lines = vec!["Doc is a document.".to_string()];
        msg.options.insert(
            "(gogoproto.typedecl)".to_string(),
            OptionValue::literal("false"),
        );
        msg.reserve(2);
        msg.fields.push(Field {
            name: "title".to_string(),
            pos: 1,
            ty: Type::basic("string"),
            ..Default::default()
        });
        let mut tags = Field {
            name: "tags".to_string(),
            pos: 3,
            repeated: true,
            ty: Type::basic("int64"),
            ..Default::default()
        };
        tags.options.insert(
            "(gogoproto.casttype)".to_string(),
            OptionValue::quoted("Tags"),
        );
        tags.options.insert(
            "(gogoproto.customname)".to_string(),
            OptionValue::quoted("TagIDs"),
        );
        msg.fields.push(tags);
        msg.fields.push(Field {
            name: "at".to_string(),
            pos: 4,
            ty: Type::named("google.protobuf", "Timestamp"),
            ..Default::default()
        });
        msg.fields.push(Field {
            name: "index".to_string(),
            pos: 5,
            ty: Type::map(Type::basic("string"), Type::named("github.com.acme.models", "Doc")),
            ..Default::default()
        });
        pkg.messages.push(msg);

        let mut e = Enum {
            name: "Kind".to_string(),
            ..Default::default()
        };
        e.options.insert(
            "(gogoproto.enumdecl)".to_string(),
            OptionValue::literal("false"),
        );
        let mut v = EnumValue {
            name: "KIND_A".to_string(),
            value: 0,
            ..Default::default()
        };
        v.options.insert(
            "(gogoproto.enumvalue_customname)".to_string(),
            OptionValue::quoted("A"),
        );
        e.values.push(v);
        pkg.enums.push(e);

        pkg.rpcs.push(Rpc {
            name: "Fetch".to_string(),
            input: Type::generated_named("github.com.acme.models", "FetchRequest"),
            output: Type::named("github.com.acme.models", "Doc"),
            ..Default::default()
        });

        pkg
    }

    #[test]
    fn test_render_layout() {
        let rendered = render(&sample_package());
        let expected = r#"syntax = "proto3";
package github.com.acme.models;

import "github.com/gogo/protobuf/gogoproto/gogo.proto";
import "google/protobuf/timestamp.proto";

option go_package = "models";

// Doc is a document.
message Doc {
	option (gogoproto.typedecl) = false;
	reserved 2;
	string title = 1;
	repeated int64 tags = 3 [(gogoproto.casttype) = "Tags", (gogoproto.customname) = "TagIDs"];
	google.protobuf.Timestamp at = 4;
	map<string, Doc> index = 5;
}

enum Kind {
	option (gogoproto.enumdecl) = false;
	KIND_A = 0 [(gogoproto.enumvalue_customname) = "A"];
}

service ModelsService {
	rpc Fetch (FetchRequest) returns (Doc);
}
"#;
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_options_emit_in_key_order() {
        let mut pkg = Package {
            name: "p".to_string(),
            ..Default::default()
        };
        pkg.options
            .insert("zeta".to_string(), OptionValue::literal("1"));
        pkg.options
            .insert("alpha".to_string(), OptionValue::literal("2"));

        let rendered = render(&pkg);
        let alpha = rendered.find("option alpha").unwrap();
        let zeta = rendered.find("option zeta").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn test_generate_writes_atomically_and_idempotently() {
        let base = tempfile::tempdir().unwrap();
        let generator = Generator::new(base.path());
        let pkg = sample_package();

        proteus_report::set_test_mode(true);
        let path = generator.generate(&pkg).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        let again = generator.generate(&pkg).unwrap();
        proteus_report::set_test_mode(false);

        assert_eq!(path, again);
        assert_eq!(first, fs::read_to_string(&path).unwrap());
        assert_eq!(first, render(&pkg));
        assert!(path.ends_with("github.com/acme/models/generated.proto"));
    }
}
