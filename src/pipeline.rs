// Copyright 2025 Cornell University
// released under MIT License

use std::path::Path;

use log::{debug, info};

use crate::compiler::compile;
use crate::diagnostic::DiagnosticHandler;
use crate::errors::Error;
use crate::ir::File;
use crate::parser::parse_source;
use crate::typecheck::type_check;

fn run(source: &str) -> Result<File, Error> {
    let tree = parse_source(source)?;
    debug!("parsed {} item(s)", tree.items.len());
    let mut file = compile(&tree)?;
    type_check(&mut file)?;
    Ok(file)
}

/// Parses, compiles and type-checks `source`. On failure the error is also
/// rendered into `handler` against a file registered as `name`.
pub fn compile_source(
    name: &str,
    source: &str,
    handler: &mut DiagnosticHandler,
) -> Result<File, Error> {
    let fileid = handler.add_file(name.to_string(), source.to_string());
    match run(source) {
        Ok(file) => {
            info!(
                "{}: {} block(s), {} test(s)",
                name,
                file.num_blocks(),
                file.num_tests()
            );
            Ok(file)
        }
        Err(e) => {
            handler.report(fileid, &e);
            Err(e)
        }
    }
}

/// Like [`compile_source`] for a file on disk.
pub fn compile_file(
    path: impl AsRef<Path>,
    handler: &mut DiagnosticHandler,
) -> Result<File, Error> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let source = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: name.clone(),
        source,
    })?;
    compile_source(&name, &source, handler)
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use strip_ansi_escapes::strip_str;

    use super::*;
    use crate::errors::{CompileError, ResolveError, TypeError, WidthError};
    use crate::ir::Width;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn adder() {
        init_logger();
        let mut handler = DiagnosticHandler::default();
        let file = compile_file("tests/designs/adder.phdl", &mut handler).unwrap();
        assert!(handler.error_string().is_empty());
        assert_eq!(file.num_blocks(), 10);
        assert_eq!(file.num_tests(), 2);

        let full_add = file.block("full_add").unwrap();
        assert_eq!(
            full_add.vars().sorted_names(),
            ["a", "b", "c1", "c2", "cin", "cout", "s", "s1"]
        );
        for (_, conn) in full_add.vars().iter() {
            assert_eq!(conn.width(), Width::Bits(1));
        }

        let add2 = file.block("add2").unwrap();
        let c0 = add2.vars().get("c0").unwrap();
        assert_eq!(add2.vars()[c0].width(), Width::Bits(1));
        assert_eq!(add2.vars()["x"].width(), Width::Bits(2));

        let test = file.test("add2_small").unwrap();
        assert_eq!(file[test.block].name(), "add2");
        assert_eq!(test.vectors.len(), 2);
        assert_eq!(test.vectors[0].outputs[0].value, 2);
        assert_eq!(test.vectors[1].inputs[0].value, 3);
    }

    #[test]
    fn compiling_twice_is_structurally_equal() {
        let mut handler = DiagnosticHandler::default();
        let a = compile_file("tests/designs/adder.phdl", &mut handler).unwrap();
        let b = compile_file("tests/designs/adder.phdl", &mut handler).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn width_mismatch_is_reported() {
        init_logger();
        let mut handler = DiagnosticHandler::default();
        let err = compile_file("tests/designs/width_mismatch.phdl", &mut handler).unwrap_err();
        assert!(matches!(
            &err,
            Error::Type(TypeError::InBlock {
                source: WidthError::WidthMismatch { .. },
                ..
            })
        ));
        assert_snapshot!(err, @"block 'bad': expected d1, got 'x' (d2)");

        let content = strip_str(handler.error_string());
        assert!(content.starts_with("error: block 'bad': expected d1, got 'x' (d2)"));
        assert!(content.contains("width_mismatch.phdl:4:4"));
    }

    #[test]
    fn blocks_must_be_defined_before_use() {
        let mut handler = DiagnosticHandler::default();
        let err = compile_file("tests/designs/undefined_block.phdl", &mut handler).unwrap_err();
        assert!(matches!(
            &err,
            Error::Compile(CompileError::InBlock {
                source: ResolveError::UnknownBlock { .. },
                ..
            })
        ));
        assert_snapshot!(err, @"block 'top': block 'inv' is not defined");
        assert!(handler.error_string().contains("undefined_block.phdl:2:7"));
    }

    #[test]
    fn syntax_error_is_reported() {
        let mut handler = DiagnosticHandler::default();
        let err = compile_file("tests/designs/syntax_error.phdl", &mut handler).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(err.span().is_some());
        assert!(handler.error_string().starts_with("error: parse error:"));
    }

    #[test]
    fn missing_file() {
        let mut handler = DiagnosticHandler::default();
        let err = compile_file("tests/designs/does_not_exist.phdl", &mut handler).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.span().is_none());
        // nothing was registered, so nothing was rendered
        assert!(handler.error_string().is_empty());
    }

    #[test]
    fn empty_source() {
        let mut handler = DiagnosticHandler::default();
        let file = compile_source("empty.phdl", "", &mut handler).unwrap();
        assert_eq!(file.num_blocks(), 0);
        assert_eq!(file.num_tests(), 0);
    }

    #[test]
    fn test_vector_overflow() {
        let mut handler = DiagnosticHandler::default();
        let source = "block id(a d2) -> (o d2) {}\ntest t(id) { 4 ==> 0; }\n";
        let err = compile_source("t.phdl", source, &mut handler).unwrap_err();
        assert_snapshot!(err, @"test 't': literal '4' does not fit in d2");
    }
}
