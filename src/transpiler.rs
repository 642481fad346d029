use std::{
    borrow::Cow,
    fmt::{self, Write},
    format_args as f,
};

use crate::{
    ast::*,
    mangle::{self, Mangler},
};

/// C spelling of each builtin type.
pub const BUILTIN_TYPES: &[(&str, &str)] = &[
    ("_Int", "int32_t"),
    ("_Float", "float"),
    ("_Double", "double"),
    ("_Byte", "int8_t"),
    ("_Short", "int16_t"),
    ("_Long", "int64_t"),
    ("_Bool", "uint8_t"),
    ("_UByte", "uint8_t"),
    ("_UInt", "uint32_t"),
    ("_ULong", "uint64_t"),
    ("_Unit", "void"),
];

pub fn builtin_c_type(name: &str) -> Option<&'static str> {
    BUILTIN_TYPES
        .iter()
        .find_map(|&(k, c)| (k == name).then_some(c))
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Prefix emitted names, see [`mangle::Prefixed`].
    pub mangle: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} not implemented")]
    NotImplemented(&'static str),
    #[error("{0} not supported")]
    Unsupported(String),
    #[error("variable `{0}` has no initializer")]
    MissingInitializer(String),
    #[error("failed to write output")]
    Fmt(#[from] fmt::Error),
}

type Result<T = (), E = Error> = std::result::Result<T, E>;

pub struct Transpiler {
    config: Config,
    mangler: &'static dyn Mangler,
    prelude: String,
}

impl Transpiler {
    pub fn new(config: Config) -> Transpiler {
        let mangler = mangle::for_config(config.mangle);
        let prelude = prelude(mangler);
        tracing::trace!(mangle = config.mangle, len = prelude.len(), "built prelude");
        Transpiler {
            config,
            mangler,
            prelude,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The fixed part of every translation unit produced by this transpiler.
    pub fn prelude(&self) -> &str {
        &self.prelude
    }

    /// Translates `module` into a single C translation unit.
    pub fn transpile(&self, module: &Module) -> Result<String> {
        let guard = format!("K_{}_H", module.name.to_uppercase());
        let guard = self.mangler.mangle(&guard);

        let mut out = String::with_capacity(self.prelude.len() + 64 * module.statements.len());
        writeln!(out, "#ifndef {guard}")?;
        writeln!(out, "#define {guard}")?;
        out.push_str(&self.prelude);

        let mut emitter = Emitter {
            buf: out,
            mangler: self.mangler,
        };
        module.accept(&mut emitter)?;

        let mut out = emitter.buf;
        writeln!(out, "#endif")?;
        Ok(out)
    }
}

impl Default for Transpiler {
    fn default() -> Self {
        Transpiler::new(Config::default())
    }
}

/// Transpiles with the default configuration.
pub fn transpile(module: &Module) -> Result<String> {
    Transpiler::default().transpile(module)
}

fn prelude(mangler: &dyn Mangler) -> String {
    let mut p = String::with_capacity(1024);

    // Writing to a `String` can't fail.
    let mut line = |args: fmt::Arguments<'_>| {
        let _ = p.write_fmt(args);
        p.push('\n');
    };

    line(f!("#include <stdint.h>"));
    line(f!("#define {} 1", mangler.mangle("TRUE")));
    line(f!("#define {} 0", mangler.mangle("FALSE")));
    line(f!("#define {} ((void)0)", mangler.mangle("UNIT")));
    for (name, c_type) in BUILTIN_TYPES {
        line(f!("typedef {c_type} {};", mangler.mangle(&format!("K{name}"))));
    }
    line(f!("#define {} const", mangler.mangle("IMMUT")));
    line(f!("#ifdef __GNUC__"));
    line(f!("#define {} __attribute__((unused))", mangler.mangle("MUT")));
    line(f!("#else"));
    line(f!("#define {}", mangler.mangle("MUT")));
    line(f!("#endif"));
    p
}

struct Emitter {
    buf: String,
    mangler: &'static dyn Mangler,
}

impl Emitter {
    fn out(&mut self, args: fmt::Arguments<'_>) -> Result {
        self.buf.write_fmt(args)?;
        Ok(())
    }

    fn name<'a>(&self, name: &'a str) -> Cow<'a, str> {
        self.mangler.mangle(name)
    }

    /// A user-written name. `@` names only make sense as call targets, and
    /// C has no spelling for them.
    fn ident<'a>(&self, name: &'a str) -> Result<Cow<'a, str>> {
        if name.starts_with('@') {
            return Err(Error::Unsupported(format!("identifier `{name}`")));
        }
        Ok(self.name(name))
    }

    fn block(&mut self, statements: &[Stmt]) -> Result {
        self.out(f!("{{"))?;
        for stmt in statements {
            stmt.accept(self)?;
        }
        self.out(f!("}}"))
    }
}

impl Visitor for Emitter {
    type Output = Result;

    fn visit_module(&mut self, module: &Module) -> Result {
        for stmt in &module.statements {
            stmt.accept(self)?;
            self.out(f!("\n"))?;
        }
        Ok(())
    }

    fn visit_expr_stmt(&mut self, stmt: &ExprStmt) -> Result {
        match &stmt.expr {
            // A statement-level assignment needs no parentheses.
            Expr::Binary(BinaryOp { op, lhs, rhs }) if op.is_assignment() => {
                lhs.accept(self)?;
                self.out(f!("{op}"))?;
                rhs.accept(self)?;
            }
            expr => expr.accept(self)?,
        }
        self.out(f!(";"))
    }

    fn visit_variable_decl(&mut self, decl: &VariableDecl) -> Result {
        let Some(init) = &decl.init else {
            return Err(Error::MissingInitializer(decl.name.clone()));
        };
        let qualifier = self.name(if decl.is_mutable() { "MUT" } else { "IMMUT" });
        self.out(f!("{qualifier} "))?;
        decl.ty.accept(self)?;
        let name = self.ident(&decl.name)?;
        self.out(f!(" {name}="))?;
        init.accept(self)?;
        self.out(f!(";"))
    }

    fn visit_type_alias(&mut self, alias: &TypeAlias) -> Result {
        self.out(f!("typedef "))?;
        alias.original.accept(self)?;
        let name = self.ident(&alias.alias)?;
        self.out(f!(" {name};"))
    }

    fn visit_record_decl(&mut self, decl: &RecordDecl) -> Result {
        if !decl.methods.is_empty() {
            return Err(Error::NotImplemented("record methods"));
        }
        let Type::Named { name } = &decl.ty else {
            return Err(Error::Unsupported(format!("record type `{}`", decl.ty)));
        };
        let name = self.ident(name)?.into_owned();

        self.out(f!("typedef struct {name}{{"))?;
        for field in &decl.fields {
            if field.init.is_some() {
                return Err(Error::NotImplemented("record field initializers"));
            }
            field.ty.accept(self)?;
            let field = self.ident(&field.name)?;
            self.out(f!(" {field};"))?;
        }
        self.out(f!("}}{name};"))
    }

    fn visit_if(&mut self, stmt: &IfStmt) -> Result {
        self.out(f!("if("))?;
        stmt.cond.accept(self)?;
        self.out(f!(")"))?;
        self.block(&stmt.then)?;
        if let Some(otherwise) = &stmt.otherwise {
            self.out(f!("else"))?;
            self.block(otherwise)?;
        }
        Ok(())
    }

    fn visit_while(&mut self, stmt: &WhileStmt) -> Result {
        self.out(f!("while("))?;
        stmt.cond.accept(self)?;
        self.out(f!(")"))?;
        self.block(&stmt.body)
    }

    fn visit_defer(&mut self, _: &DeferStmt) -> Result {
        Err(Error::NotImplemented("defer"))
    }

    fn visit_break(&mut self) -> Result {
        self.out(f!("break;"))
    }

    fn visit_continue(&mut self) -> Result {
        self.out(f!("continue;"))
    }

    fn visit_function_decl(&mut self, _: &FunctionDecl) -> Result {
        Err(Error::NotImplemented("function declarations"))
    }

    fn visit_identifier(&mut self, ident: &Identifier) -> Result {
        let name = self.ident(&ident.name)?;
        self.out(f!("{name}"))
    }

    fn visit_literal(&mut self, literal: &Literal) -> Result {
        match literal {
            Literal::Int(value) => self.out(f!("{value}")),
            Literal::Float(value) => self.out(f!("{value:?}")),
            Literal::String(value) => {
                let escaped = escape(value.chars(), '"');
                self.out(f!("\"{escaped}\""))
            }
            Literal::Char(value) => {
                let escaped = escape(std::iter::once(*value), '\'');
                self.out(f!("'{escaped}'"))
            }
            Literal::Bool(value) => {
                let name = self.name(if *value { "TRUE" } else { "FALSE" });
                self.out(f!("{name}"))
            }
        }
    }

    fn visit_binary(&mut self, op: &BinaryOp) -> Result {
        self.out(f!("("))?;
        op.lhs.accept(self)?;
        self.out(f!("{}", op.op))?;
        op.rhs.accept(self)?;
        self.out(f!(")"))
    }

    fn visit_unary(&mut self, op: &UnaryOp) -> Result {
        self.out(f!("("))?;
        if op.is_prefix {
            self.out(f!("{}", op.op))?;
            op.operand.accept(self)?;
        } else {
            op.operand.accept(self)?;
            self.out(f!("{}", op.op))?;
        }
        self.out(f!(")"))
    }

    fn visit_cast(&mut self, cast: &Cast) -> Result {
        self.out(f!("("))?;
        cast.target.accept(self)?;
        self.out(f!(")("))?;
        cast.expr.accept(self)?;
        self.out(f!(")"))
    }

    fn visit_call(&mut self, _: &Call) -> Result {
        Err(Error::NotImplemented("calls"))
    }

    fn visit_builtin_type(&mut self, name: &str) -> Result {
        match builtin_c_type(name) {
            Some(c_type) => self.out(f!("{c_type}")),
            None => Err(Error::Unsupported(format!("builtin type `{name}`"))),
        }
    }

    fn visit_named_type(&mut self, name: &str) -> Result {
        let name = self.ident(name)?;
        self.out(f!("{name}"))
    }

    fn visit_generic_type(&mut self, base: &Type, args: &[Type]) -> Result {
        let ty = Type::Generic {
            base: Box::new(base.clone()),
            args: args.to_vec(),
        };
        Err(Error::Unsupported(format!("generic type `{ty}`")))
    }
}

/// Escapes characters for a C literal delimited by `quote`.
fn escape(chars: impl Iterator<Item = char>, quote: char) -> String {
    let mut escaped = String::new();
    for c in chars {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            '\u{8}' => escaped.push_str("\\b"),
            '\u{c}' => escaped.push_str("\\f"),
            '\\' => escaped.push_str("\\\\"),
            '\0' => escaped.push_str("\\0"),
            c if c == quote => {
                escaped.push('\\');
                escaped.push(c);
            }
            // Octal escapes stop after three digits, unlike hex ones.
            c if c.is_ascii_control() => {
                let _ = write!(escaped, "\\{:03o}", u32::from(c));
            }
            c => escaped.push(c),
        }
    }
    escaped
}

/// Headers referenced by calls to `@header_function` style names, in the
/// order they first appear. `@stdio_printf` refers to `stdio.h`.
///
/// This is an analysis over the tree only: [`Transpiler`] does not emit
/// includes, since it cannot emit the calls that would need them.
pub fn collect_includes(module: &Module) -> Vec<String> {
    let mut collector = IncludeCollector::default();
    module.accept(&mut collector);
    collector.headers
}

#[derive(Default)]
struct IncludeCollector {
    headers: Vec<String>,
}

impl IncludeCollector {
    fn statements(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            stmt.accept(self);
        }
    }
}

impl Visitor for IncludeCollector {
    type Output = ();

    fn visit_module(&mut self, module: &Module) {
        self.statements(&module.statements);
    }

    fn visit_expr_stmt(&mut self, stmt: &ExprStmt) {
        stmt.expr.accept(self);
    }

    fn visit_variable_decl(&mut self, decl: &VariableDecl) {
        if let Some(init) = &decl.init {
            init.accept(self);
        }
    }

    fn visit_type_alias(&mut self, _: &TypeAlias) {}

    fn visit_record_decl(&mut self, decl: &RecordDecl) {
        for field in &decl.fields {
            self.visit_variable_decl(field);
        }
        for method in &decl.methods {
            self.visit_function_decl(method);
        }
    }

    fn visit_if(&mut self, stmt: &IfStmt) {
        stmt.cond.accept(self);
        self.statements(&stmt.then);
        if let Some(otherwise) = &stmt.otherwise {
            self.statements(otherwise);
        }
    }

    fn visit_while(&mut self, stmt: &WhileStmt) {
        stmt.cond.accept(self);
        self.statements(&stmt.body);
    }

    fn visit_defer(&mut self, stmt: &DeferStmt) {
        self.statements(&stmt.body);
    }

    fn visit_break(&mut self) {}

    fn visit_continue(&mut self) {}

    fn visit_function_decl(&mut self, decl: &FunctionDecl) {
        self.statements(&decl.body);
    }

    fn visit_identifier(&mut self, _: &Identifier) {}

    fn visit_literal(&mut self, _: &Literal) {}

    fn visit_binary(&mut self, op: &BinaryOp) {
        op.lhs.accept(self);
        op.rhs.accept(self);
    }

    fn visit_unary(&mut self, op: &UnaryOp) {
        op.operand.accept(self);
    }

    fn visit_cast(&mut self, cast: &Cast) {
        cast.expr.accept(self);
    }

    fn visit_call(&mut self, call: &Call) {
        if let Expr::Identifier(Identifier { name }) = call.callee.as_ref() {
            if let Some(rest) = name.strip_prefix('@') {
                let module = rest.split('_').next().unwrap_or(rest);
                let header = format!("{module}.h");
                if !module.is_empty() && !self.headers.contains(&header) {
                    self.headers.push(header);
                }
            }
        }
        for arg in &call.args {
            arg.accept(self);
        }
    }

    fn visit_builtin_type(&mut self, _: &str) {}

    fn visit_named_type(&mut self, _: &str) {}

    fn visit_generic_type(&mut self, _: &Type, _: &[Type]) {}
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{diagnostic::Diagnostics, lexer, parser};

    fn parse(src: &str) -> Module {
        let mut diagnostics = Diagnostics::new();
        let tokens = lexer::tokenize(src, &mut diagnostics);
        let module = parser::parse_program(&tokens, &mut diagnostics);
        assert!(!diagnostics.has_errors(), "{diagnostics:?}");
        module
    }

    /// The statements part of the output, without guard and prelude.
    fn body(config: Config, src: &str) -> Result<String> {
        let module = parse(src);
        let t = Transpiler::new(config);
        let out = t.transpile(&module)?;
        let guard = t.mangler.mangle(&format!("K_{}_H", module.name.to_uppercase())).into_owned();
        let head = format!("#ifndef {guard}\n#define {guard}\n{}", t.prelude());
        let body = out
            .strip_prefix(&head)
            .and_then(|rest| rest.strip_suffix("#endif\n"))
            .expect("output has guard and prelude");
        Ok(body.to_string())
    }

    fn emit(src: &str) -> String {
        body(Config::default(), src).expect("transpiles")
    }

    #[test]
    fn if_statement_is_compact() {
        assert_eq!(emit("mod m\nif true { x = 1 }"), "if(TRUE){x=1;}\n");
    }

    #[test]
    fn if_else_and_while() {
        let src = indoc! {"
            mod m
            while i < 10 {
                if i == 5 {
                    break
                } else {
                    i += 1
                    continue
                }
            }
        "};
        assert_eq!(
            emit(src),
            "while((i<10)){if((i==5)){break;}else{i+=1;continue;}}\n"
        );
    }

    #[test]
    fn declarations_use_qualifier_macros() {
        let src = indoc! {"
            mod m
            x: _Int = 5
            y mut: _Double = 2.5
            z: _Bool = !false
        "};
        assert_eq!(
            emit(src),
            indoc! {"
                IMMUT int32_t x=5;
                MUT double y=2.5;
                IMMUT uint8_t z=(!FALSE);
            "}
        );
    }

    #[test]
    fn nested_expressions_are_parenthesized() {
        assert_eq!(emit("mod m\na = b + c * -d"), "a=(b+(c*(-d)));\n");
        assert_eq!(
            emit("mod m\nn = x as _Long\nn++"),
            "n=(int64_t)(x);\n(n++);\n"
        );
    }

    #[test]
    fn literals_are_escaped() {
        assert_eq!(
            emit("mod m\nmsg: Text = \"a\\\"b\\n\"\nc: _Byte = '\\''"),
            "IMMUT Text msg=\"a\\\"b\\n\";\nIMMUT int8_t c='\\'';\n"
        );
        assert_eq!(escape("\u{1}x".chars(), '"'), "\\001x");
    }

    #[test]
    fn records_and_aliases() {
        let src = indoc! {"
            mod shapes
            record Point {
                x: _Int
                y: _Float
            }
            alias Point as P
        "};
        assert_eq!(
            emit(src),
            "typedef struct Point{int32_t x;float y;}Point;\ntypedef Point P;\n"
        );
    }

    #[test]
    fn builtin_mapping() {
        let src = indoc! {"
            mod m
            alias _Short as S
            alias _UByte as UB
            alias _UInt as UI
            alias _ULong as UL
            alias _Unit as U
        "};
        assert_eq!(
            emit(src),
            indoc! {"
                typedef int16_t S;
                typedef uint8_t UB;
                typedef uint32_t UI;
                typedef uint64_t UL;
                typedef void U;
            "}
        );
    }

    #[test]
    fn mangling_prefixes_names_and_macros() {
        let config = Config { mangle: true };
        assert_eq!(
            body(config.clone(), "mod m\nif true { x = 1 }").unwrap(),
            "if(k_TRUE){k_x=1;}\n"
        );
        let t = Transpiler::new(config);
        assert!(t.prelude().contains("#define k_TRUE 1\n"));
        assert!(t.prelude().contains("typedef int32_t k_K_Int;\n"));
    }

    #[test]
    fn default_prelude() {
        let t = Transpiler::default();
        assert_eq!(
            t.prelude(),
            indoc! {"
                #include <stdint.h>
                #define TRUE 1
                #define FALSE 0
                #define UNIT ((void)0)
                typedef int32_t K_Int;
                typedef float K_Float;
                typedef double K_Double;
                typedef int8_t K_Byte;
                typedef int16_t K_Short;
                typedef int64_t K_Long;
                typedef uint8_t K_Bool;
                typedef uint8_t K_UByte;
                typedef uint32_t K_UInt;
                typedef uint64_t K_ULong;
                typedef void K_Unit;
                #define IMMUT const
                #ifdef __GNUC__
                #define MUT __attribute__((unused))
                #else
                #define MUT
                #endif
            "}
        );
    }

    #[test]
    fn prelude_depends_only_on_config() {
        let a = Transpiler::new(Config::default());
        let b = Transpiler::new(Config::default());
        let c = Transpiler::new(Config { mangle: true });
        assert_eq!(a.prelude(), b.prelude());
        assert_ne!(a.prelude(), c.prelude());
        assert!(c.config().mangle);
    }

    #[test]
    fn whole_unit_has_guard() {
        let out = transpile(&parse("mod demo\nx: _Int = 1")).unwrap();
        assert!(out.starts_with("#ifndef K_DEMO_H\n#define K_DEMO_H\n#include <stdint.h>\n"));
        assert!(out.ends_with("IMMUT int32_t x=1;\n#endif\n"));
    }

    #[test]
    fn unsupported_constructs() {
        let err = |src: &str| body(Config::default(), src).unwrap_err().to_string();
        assert_eq!(err("mod m\nx: _Int"), "variable `x` has no initializer");
        assert_eq!(err("mod m\nfx f() {}"), "function declarations not implemented");
        assert_eq!(err("mod m\nf(1)"), "calls not implemented");
        assert_eq!(err("mod m\ndefer { x = 1 }"), "defer not implemented");
        assert_eq!(
            err("mod m\nxs: List[_Int] = 1"),
            "generic type `List[_Int]` not supported"
        );
        assert_eq!(
            err("mod m\nrecord P {\n    x: _Int = 5\n}"),
            "record field initializers not implemented"
        );
    }

    #[test]
    fn at_names_have_no_c_spelling() {
        let err = |src: &str| body(Config::default(), src).unwrap_err().to_string();
        assert_eq!(err("mod m\n@x: _Int = 1"), "identifier `@x` not supported");
        assert_eq!(err("mod m\ny = @x + 1"), "identifier `@x` not supported");
        assert_eq!(err("mod m\nalias _Int as @T"), "identifier `@T` not supported");
        assert_eq!(err("mod m\nv: @T = 1"), "identifier `@T` not supported");
    }

    #[test]
    fn includes_come_from_at_calls() {
        let src = indoc! {"
            mod m
            @stdio_printf(\"hi\")
            if ready {
                @math_sqrt(2.0)
                @stdio_puts(name)
            }
            x: _Int = @time_now()
        "};
        assert_eq!(
            collect_includes(&parse(src)),
            ["stdio.h", "math.h", "time.h"]
        );
    }
}
