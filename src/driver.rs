use std::{fmt::Write, fs, io, path::Path};

use tracing::{debug, info_span};

use crate::{
    ast::Module,
    diagnostic::Diagnostics,
    lexer, lint, parser,
    token::Token,
    transpiler::{self, Transpiler},
};

/// What a compilation runs and what it keeps around for dumping.
#[derive(Clone, Debug)]
pub struct Options {
    pub lint: bool,
    pub dump_tokens: bool,
    pub dump_ast: bool,
    pub transpiler: transpiler::Config,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            lint: true,
            dump_tokens: false,
            dump_ast: false,
            transpiler: transpiler::Config::default(),
        }
    }
}

/// The phase a compilation stopped after.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Lex,
    Lint,
    Parse,
    Transpile,
}

#[derive(Debug)]
pub struct Compilation {
    pub diagnostics: Diagnostics,
    pub tokens: Option<String>,
    pub ast: Option<String>,
    pub module: Option<Module>,
    /// The generated C, present only when no phase reported errors.
    pub output: Option<String>,
    pub last_phase: Phase,
}

impl Compilation {
    pub fn succeeded(&self) -> bool {
        self.output.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transpilation failed: {0}")]
    Transpile(#[from] transpiler::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Reads `path` and compiles it. The source is returned alongside the
/// result so diagnostics can be rendered against it.
pub fn compile_file(path: &Path, options: &Options) -> Result<(String, Compilation), Error> {
    let src = fs::read_to_string(path)?;
    debug!(path = %path.display(), "read source");
    let compilation = compile(&src, options)?;
    Ok((src, compilation))
}

/// Runs lex, lint, parse and transpile over `src`. Stops after the first
/// phase that leaves error-level diagnostics; those are returned in the
/// [`Compilation`], not as an [`Error`].
pub fn compile(src: &str, options: &Options) -> Result<Compilation, Error> {
    let mut c = Compilation {
        diagnostics: Diagnostics::new(),
        tokens: None,
        ast: None,
        module: None,
        output: None,
        last_phase: Phase::Lex,
    };

    let tokens = {
        let _span = info_span!("lex", bytes = src.len()).entered();
        let tokens = lexer::tokenize(src, &mut c.diagnostics);
        debug!(count = tokens.len(), errors = c.diagnostics.error_count(), "lexed");
        tokens
    };
    if options.dump_tokens {
        c.tokens = Some(dump_tokens(&tokens));
    }
    if c.diagnostics.has_errors() {
        debug!("halting after lexing");
        return Ok(c);
    }

    if options.lint {
        c.last_phase = Phase::Lint;
        let _span = info_span!("lint").entered();
        let before = c.diagnostics.len();
        lint::check(&tokens, &mut c.diagnostics);
        debug!(findings = c.diagnostics.len() - before, "linted");
    }

    c.last_phase = Phase::Parse;
    let module = {
        let _span = info_span!("parse").entered();
        let module = parser::parse_program(&tokens, &mut c.diagnostics);
        debug!(
            module = %module.name,
            statements = module.statements.len(),
            errors = c.diagnostics.error_count(),
            "parsed"
        );
        module
    };
    if options.dump_ast {
        c.ast = Some(module.tree().to_string());
    }
    if c.diagnostics.has_errors() {
        debug!("halting after parsing");
        c.module = Some(module);
        return Ok(c);
    }

    c.last_phase = Phase::Transpile;
    let output = {
        let _span = info_span!("transpile").entered();
        let output = Transpiler::new(options.transpiler.clone()).transpile(&module)?;
        debug!(bytes = output.len(), "transpiled");
        output
    };
    c.module = Some(module);
    c.output = Some(output);
    Ok(c)
}

/// One token per line: position, kind and text.
pub fn dump_tokens(tokens: &[Token]) -> String {
    let mut out = String::with_capacity(tokens.len() * 24);
    for token in tokens {
        // Writing to a `String` can't fail.
        let _ = writeln!(
            out,
            "{:<8} {:<12} {:?}",
            token.position.to_string(),
            format!("{:?}", token.kind),
            token.text
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::util::test_utils::format_diagnostics;

    #[test]
    fn compiles_to_c() {
        let c = compile("mod m\nif true { x = 1 }\n", &Options::default()).unwrap();
        assert!(c.succeeded());
        assert_eq!(c.last_phase, Phase::Transpile);
        assert!(c.output.unwrap().contains("if(TRUE){x=1;}\n#endif\n"));
    }

    #[test]
    fn lex_errors_stop_before_parsing() {
        let c = compile("mod m\n/* open", &Options::default()).unwrap();
        assert!(!c.succeeded());
        assert_eq!(c.last_phase, Phase::Lex);
        assert!(c.module.is_none());
        assert_eq!(
            format_diagnostics(&c.diagnostics),
            ["2:1: L001: unterminated block comment"]
        );
    }

    #[test]
    fn parse_errors_stop_before_transpiling() {
        let c = compile("x = 1", &Options::default()).unwrap();
        assert_eq!(c.last_phase, Phase::Parse);
        assert!(c.output.is_none());
        assert_eq!(c.module.unwrap().name, "error");
    }

    #[test]
    fn warnings_do_not_halt() {
        let c = compile("mod m\nif (ok) { x = 1 }", &Options::default()).unwrap();
        assert!(c.succeeded());
        assert_eq!(c.diagnostics.count(crate::diagnostic::Level::Warning), 1);

        let options = Options {
            lint: false,
            ..Options::default()
        };
        let c = compile("mod m\nif (ok) { x = 1 }", &options).unwrap();
        assert!(c.diagnostics.is_empty());
    }

    #[test]
    fn transpiler_errors_are_driver_errors() {
        let err = compile("mod m\nfx main() {}", &Options::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "transpilation failed: function declarations not implemented"
        );
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = compile_file(Path::new("no/such/file.k"), &Options::default()).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn dumps() {
        let options = Options {
            dump_tokens: true,
            dump_ast: true,
            ..Options::default()
        };
        let c = compile("mod m\nx: _Int = 1", &options).unwrap();
        assert_eq!(
            c.ast.as_deref(),
            Some("module m\n  variable x: _Int (module)\n    int 1\n")
        );
        let tokens = c.tokens.unwrap();
        assert_eq!(tokens.lines().next(), Some(r#"1:1      Mod          "mod""#));
        assert!(tokens.lines().last().unwrap().contains("Eof"));
    }
}
