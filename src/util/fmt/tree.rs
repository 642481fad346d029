use std::fmt::{self, Write};

use crate::ast::*;

const INDENT_WIDTH: usize = 2;

/// Displays a syntax tree node as an indented debug tree, one node per line.
pub struct Tree<'a, T>(&'a T);

impl Module {
    pub fn tree(&self) -> Tree<'_, Module> {
        Tree(self)
    }
}

impl Expr {
    pub fn tree(&self) -> Tree<'_, Expr> {
        Tree(self)
    }
}

impl fmt::Display for Tree<'_, Module> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.accept(&mut Printer::new(f))
    }
}

impl fmt::Display for Tree<'_, Expr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.accept(&mut Printer::new(f))
    }
}

struct Printer<'w, W: Write> {
    w: &'w mut W,
    indent: usize,
}

impl<'w, W: Write> Printer<'w, W> {
    fn new(w: &'w mut W) -> Self {
        Printer { w, indent: 0 }
    }

    fn line(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        write!(self.w, "{:width$}", "", width = self.indent * INDENT_WIDTH)?;
        self.w.write_fmt(args)?;
        self.w.write_char('\n')
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> fmt::Result) -> fmt::Result {
        self.indent += 1;
        let result = f(self);
        self.indent -= 1;
        result
    }

    fn statements(&mut self, statements: &[Stmt]) -> fmt::Result {
        self.nested(|p| statements.iter().try_for_each(|stmt| stmt.accept(p)))
    }

    fn labeled(&mut self, label: &str, statements: &[Stmt]) -> fmt::Result {
        self.line(format_args!("{label}"))?;
        self.statements(statements)
    }
}

/// ` [pub mut]` when there are modifiers, empty otherwise.
fn modifiers(modifiers: &Modifiers) -> String {
    if modifiers.is_empty() {
        String::new()
    } else {
        format!(" [{modifiers}]")
    }
}

impl<W: Write> Visitor for Printer<'_, W> {
    type Output = fmt::Result;

    fn visit_module(&mut self, module: &Module) -> fmt::Result {
        self.line(format_args!("module {}", module.name))?;
        self.statements(&module.statements)
    }

    fn visit_expr_stmt(&mut self, stmt: &ExprStmt) -> fmt::Result {
        stmt.expr.accept(self)
    }

    fn visit_variable_decl(&mut self, decl: &VariableDecl) -> fmt::Result {
        self.line(format_args!(
            "variable {}: {}{} ({})",
            decl.name,
            decl.ty,
            modifiers(&decl.modifiers),
            decl.membership
        ))?;
        match &decl.init {
            Some(init) => self.nested(|p| init.accept(p)),
            None => Ok(()),
        }
    }

    fn visit_type_alias(&mut self, alias: &TypeAlias) -> fmt::Result {
        self.line(format_args!("alias {} as {}", alias.original, alias.alias))
    }

    fn visit_record_decl(&mut self, decl: &RecordDecl) -> fmt::Result {
        self.line(format_args!(
            "record {}{} ({})",
            decl.ty,
            modifiers(&decl.modifiers),
            decl.membership
        ))?;
        self.nested(|p| {
            for field in &decl.fields {
                p.visit_variable_decl(field)?;
            }
            for method in &decl.methods {
                p.visit_function_decl(method)?;
            }
            Ok(())
        })
    }

    fn visit_if(&mut self, stmt: &IfStmt) -> fmt::Result {
        self.line(format_args!("if"))?;
        self.nested(|p| {
            stmt.cond.accept(p)?;
            p.labeled("then", &stmt.then)?;
            match &stmt.otherwise {
                Some(otherwise) => p.labeled("else", otherwise),
                None => Ok(()),
            }
        })
    }

    fn visit_while(&mut self, stmt: &WhileStmt) -> fmt::Result {
        self.line(format_args!("while"))?;
        self.nested(|p| {
            stmt.cond.accept(p)?;
            p.labeled("body", &stmt.body)
        })
    }

    fn visit_defer(&mut self, stmt: &DeferStmt) -> fmt::Result {
        self.labeled("defer", &stmt.body)
    }

    fn visit_break(&mut self) -> fmt::Result {
        self.line(format_args!("break"))
    }

    fn visit_continue(&mut self) -> fmt::Result {
        self.line(format_args!("continue"))
    }

    fn visit_function_decl(&mut self, decl: &FunctionDecl) -> fmt::Result {
        let mut signature = decl.name.clone();
        if !decl.generics.is_empty() {
            let _ = write!(signature, "[{}]", decl.generics.join(", "));
        }
        signature.push('(');
        for (idx, param) in decl.params.iter().enumerate() {
            if idx > 0 {
                signature.push_str(", ");
            }
            if param.is_mutable() {
                signature.push_str("mut ");
            }
            let _ = write!(signature, "{}: {}", param.name, param.ty);
        }
        let _ = write!(signature, "): {}", decl.return_ty);

        self.line(format_args!(
            "function {signature}{} ({})",
            modifiers(&decl.modifiers),
            decl.membership
        ))?;
        self.statements(&decl.body)
    }

    fn visit_identifier(&mut self, ident: &Identifier) -> fmt::Result {
        self.line(format_args!("ident {}", ident.name))
    }

    fn visit_literal(&mut self, literal: &Literal) -> fmt::Result {
        match literal {
            Literal::Int(value) => self.line(format_args!("int {value}")),
            Literal::Float(value) => self.line(format_args!("float {value:?}")),
            Literal::String(value) => self.line(format_args!("string {value:?}")),
            Literal::Char(value) => self.line(format_args!("char {value:?}")),
            Literal::Bool(value) => self.line(format_args!("bool {value}")),
        }
    }

    fn visit_binary(&mut self, op: &BinaryOp) -> fmt::Result {
        self.line(format_args!("binary {:?}", op.op))?;
        self.nested(|p| {
            op.lhs.accept(p)?;
            op.rhs.accept(p)
        })
    }

    fn visit_unary(&mut self, op: &UnaryOp) -> fmt::Result {
        let fixity = if op.is_prefix { "prefix" } else { "postfix" };
        self.line(format_args!("unary {:?} ({fixity})", op.op))?;
        self.nested(|p| op.operand.accept(p))
    }

    fn visit_cast(&mut self, cast: &Cast) -> fmt::Result {
        self.line(format_args!("cast {}", cast.target))?;
        self.nested(|p| cast.expr.accept(p))
    }

    fn visit_call(&mut self, call: &Call) -> fmt::Result {
        self.line(format_args!("call"))?;
        self.nested(|p| {
            call.callee.accept(p)?;
            if !call.type_args.is_empty() {
                p.line(format_args!("type arguments"))?;
                p.nested(|p| call.type_args.iter().try_for_each(|ty| ty.accept(p)))?;
            }
            if !call.args.is_empty() {
                p.line(format_args!("arguments"))?;
                p.nested(|p| call.args.iter().try_for_each(|arg| arg.accept(p)))?;
            }
            Ok(())
        })
    }

    fn visit_builtin_type(&mut self, name: &str) -> fmt::Result {
        self.line(format_args!("type {name}"))
    }

    fn visit_named_type(&mut self, name: &str) -> fmt::Result {
        self.line(format_args!("type {name}"))
    }

    fn visit_generic_type(&mut self, base: &Type, args: &[Type]) -> fmt::Result {
        let args = args.iter().map(ToString::to_string).collect::<Vec<_>>();
        self.line(format_args!("type {base}[{}]", args.join(", ")))
    }
}
