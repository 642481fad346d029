use crate::{
    ast::{
        BinaryOp, BinaryOperator, Call, Cast, DeclKind, DeferStmt, Expr, ExprStmt, FunctionDecl,
        Identifier, IfStmt, Literal, Membership, Modifier, Modifiers, Module, RecordDecl, Stmt,
        Type, TypeAlias, UnaryOp, UnaryOperator, VariableDecl, WhileStmt,
    },
    diagnostic::{Diagnostic, Diagnostics},
    lexer::extract,
    token::{SourcePosition, SourceSpan, Span, Token, TokenKind},
};

type Result<T, E = ()> = std::result::Result<T, E>;

/// How many tokens [`Parser::expect`] may skip while looking for the token it
/// wants before giving up at the current position.
const MAX_RECOVERY_SKIP: usize = 20;

const PREFIX_BP: u8 = 25;
const POSTFIX_BP: u8 = 27;
const CAST_BP: u8 = 3;

/// Parses a whole module. Never fails: problems are reported to
/// `diagnostics` and the offending statements are left out of the tree.
pub fn parse_program(tokens: &[Token], diagnostics: &mut Diagnostics) -> Module {
    Parser::new(tokens, diagnostics).parse_module()
}

/// Parses a single expression, reporting anything left after it.
pub fn parse_expr(tokens: &[Token], diagnostics: &mut Diagnostics) -> Expr {
    let mut p = Parser::new(tokens, diagnostics);
    p.skip_newlines();
    let expr = p.parse_expr().unwrap_or_else(|()| Expr::dummy());
    p.skip_newlines();
    if !p.is(TokenKind::Eof) {
        let _ = p.expect(TokenKind::Eof);
    }
    expr
}

struct Parser<'tok, 'diag> {
    tokens: &'tok [Token],
    cursor: usize,
    eof: Token,
    diagnostics: &'diag mut Diagnostics,
}

impl Parser<'_, '_> {
    fn parse_module(&mut self) -> Module {
        self.skip_newlines();
        let Some(name) = self.parse_module_header() else {
            return Module::error();
        };
        let statements = self.parse_statements(Membership::Module, false);
        Module { name, statements }
    }

    fn parse_module_header(&mut self) -> Option<String> {
        if !self.take(TokenKind::Mod) {
            let at = self.peek().source_span();
            self.report(
                Diagnostic::error("missing module declaration", at)
                    .with_code("P001")
                    .with_hint("start the file with `mod <name>`"),
            );
            return None;
        }

        let name = self.peek().clone();
        if name.kind != TokenKind::Identifier {
            self.report(
                Diagnostic::error(
                    format!("invalid module name: expected identifier, found {}", name.kind),
                    name.source_span(),
                )
                .with_code("P004"),
            );
            return None;
        }
        self.advance();
        self.end_statement();
        Some(name.text)
    }

    /// Parses statements until end of input or, inside a block, until the
    /// closing brace (which is left for the caller).
    fn parse_statements(&mut self, membership: Membership, in_block: bool) -> Vec<Stmt> {
        let mut statements = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::RBrace if in_block => break,
                TokenKind::Newline | TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::RBrace => {
                    let stray = self.advance();
                    self.report(
                        Diagnostic::error("expected statement, found '}'", stray.source_span())
                            .with_code("P002")
                            .with_hint("this brace has no matching '{'"),
                    );
                }
                _ => match self.parse_statement(membership) {
                    Ok(stmt) => {
                        statements.push(stmt);
                        self.end_statement();
                    }
                    Err(()) => self.recover(),
                },
            }
        }
        statements
    }

    fn parse_statement(&mut self, membership: Membership) -> Result<Stmt> {
        let start = self.peek().source_span();
        let modifiers = self.parse_modifiers();
        let kind = self.peek_kind();
        let is_variable = self.is_variable_decl();

        if !matches!(kind, TokenKind::Record | TokenKind::Fx) && !is_variable {
            self.reject_modifiers(&modifiers, kind, start);
        }

        match kind {
            TokenKind::Record => self
                .parse_record(modifiers, membership, start)
                .map(Stmt::Record),
            TokenKind::Fx => self
                .parse_function(modifiers, membership, start)
                .map(Stmt::Function),
            TokenKind::Alias => self.parse_alias().map(Stmt::TypeAlias),
            TokenKind::If => self.parse_if().map(Stmt::If),
            TokenKind::While => self.parse_while().map(Stmt::While),
            TokenKind::Defer => {
                self.advance();
                let body = self.parse_block()?;
                Ok(Stmt::Defer(DeferStmt { body }))
            }
            TokenKind::Break => {
                self.advance();
                Ok(Stmt::Break)
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Stmt::Continue)
            }
            _ if is_variable => self
                .parse_variable(modifiers, membership, start)
                .map(Stmt::Variable),
            _ => {
                let expr = self.parse_expr()?;
                Ok(Stmt::Expr(ExprStmt { expr }))
            }
        }
    }

    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::none();
        loop {
            let modifier = match self.peek_kind() {
                TokenKind::Pub => Modifier::Public,
                TokenKind::Mut => Modifier::Mutable,
                _ => break,
            };
            let token = self.advance();
            self.insert_modifier(&mut modifiers, modifier, &token);
        }
        modifiers
    }

    fn insert_modifier(&mut self, modifiers: &mut Modifiers, modifier: Modifier, token: &Token) {
        if !modifiers.insert(modifier) {
            self.report(
                Diagnostic::error(format!("duplicate modifier `{modifier}`"), token.source_span())
                    .with_code("P006")
                    .with_hint("remove the repeated modifier"),
            );
        }
    }

    /// Drops the modifiers that may not annotate a `kind` declaration in
    /// `membership`, reporting each one.
    fn check_modifiers(
        &mut self,
        modifiers: &mut Modifiers,
        membership: Membership,
        kind: DeclKind,
        at: SourceSpan,
    ) {
        for error in modifiers.retain_allowed(membership, kind) {
            self.report(Diagnostic::error(error.to_string(), at).with_code("P005"));
        }
    }

    fn reject_modifiers(&mut self, modifiers: &Modifiers, kind: TokenKind, at: SourceSpan) {
        if modifiers.is_empty() {
            return;
        }
        let what = match kind {
            TokenKind::Alias => "a type alias",
            TokenKind::If => "an if statement",
            TokenKind::While => "a while loop",
            TokenKind::Defer => "a defer block",
            TokenKind::Break | TokenKind::Continue => "a loop control statement",
            _ => "an expression",
        };
        self.report(
            Diagnostic::error(format!("`{modifiers}` cannot be applied to {what}"), at)
                .with_code("P008"),
        );
    }

    /// `name [mut] : Type` or `name : Type = ...` ahead.
    fn is_variable_decl(&self) -> bool {
        self.peek_nth(0) == TokenKind::Identifier
            && (self.peek_nth(1) == TokenKind::Colon
                || (self.peek_nth(1) == TokenKind::Mut && self.peek_nth(2) == TokenKind::Colon))
    }

    fn parse_variable(
        &mut self,
        modifiers: Modifiers,
        membership: Membership,
        start: SourceSpan,
    ) -> Result<VariableDecl> {
        let mut decl = self.parse_binding(modifiers, membership, start)?;
        if self.take(TokenKind::Assign) {
            decl.init = Some(self.parse_expr()?);
        }
        Ok(decl)
    }

    /// `name [mut] : Type`, without an initializer.
    fn parse_binding(
        &mut self,
        mut modifiers: Modifiers,
        membership: Membership,
        start: SourceSpan,
    ) -> Result<VariableDecl> {
        let name = self.expect(TokenKind::Identifier)?.text;
        if self.is(TokenKind::Mut) {
            let token = self.advance();
            self.insert_modifier(&mut modifiers, Modifier::Mutable, &token);
        }
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        self.check_modifiers(&mut modifiers, membership, DeclKind::Variable, start);
        Ok(VariableDecl {
            name,
            ty,
            init: None,
            modifiers,
            membership,
        })
    }

    fn parse_record(
        &mut self,
        mut modifiers: Modifiers,
        membership: Membership,
        start: SourceSpan,
    ) -> Result<RecordDecl> {
        self.expect(TokenKind::Record)?;
        let ty = self.parse_type()?;
        self.skip_newlines();
        self.expect(TokenKind::LBrace)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::RBrace | TokenKind::Eof => break,
                TokenKind::Newline | TokenKind::Semicolon => {
                    self.advance();
                }
                _ => {
                    let member_start = self.peek().source_span();
                    let member_modifiers = self.parse_modifiers();
                    let parsed = if self.is(TokenKind::Fx) {
                        self.parse_function(member_modifiers, Membership::RecordMethod, member_start)
                            .map(|method| methods.push(method))
                    } else {
                        self.parse_variable(member_modifiers, Membership::Record, member_start)
                            .map(|field| fields.push(field))
                    };
                    match parsed {
                        Ok(()) => self.end_statement(),
                        Err(()) => self.recover(),
                    }
                }
            }
        }
        let end = self.expect(TokenKind::RBrace)?;

        if fields.is_empty() && methods.is_empty() {
            self.report(
                Diagnostic::info(format!("empty record `{ty}`"), start.to(end.source_span()))
                    .with_code("I001"),
            );
        }

        self.check_modifiers(&mut modifiers, membership, DeclKind::Record, start);
        RecordDecl::new(ty, fields, methods, modifiers, membership)
            .map_err(|error| self.report(Diagnostic::error(error.to_string(), start).with_code("P005")))
    }

    fn parse_function(
        &mut self,
        mut modifiers: Modifiers,
        membership: Membership,
        start: SourceSpan,
    ) -> Result<FunctionDecl> {
        self.expect(TokenKind::Fx)?;
        let name = self.expect(TokenKind::Identifier)?.text;

        let mut generics = Vec::new();
        if self.take(TokenKind::LBracket) {
            generics = self.parse_list(TokenKind::RBracket, |p| {
                Ok(p.expect(TokenKind::Identifier)?.text)
            })?;
            self.expect(TokenKind::RBracket)?;
        }

        self.expect(TokenKind::LParen)?;
        let params = self.parse_list(TokenKind::RParen, |p| {
            let start = p.peek().source_span();
            let modifiers = p.parse_modifiers();
            p.parse_binding(modifiers, Membership::FunctionParameter, start)
        })?;
        self.expect(TokenKind::RParen)?;

        let return_ty = if self.take(TokenKind::Colon) {
            self.parse_type()?
        } else {
            Type::unit()
        };
        let body = self.parse_block()?;

        self.check_modifiers(&mut modifiers, membership, DeclKind::Function, start);
        FunctionDecl::new(name, modifiers, generics, return_ty, params, body, membership)
            .map_err(|error| self.report(Diagnostic::error(error.to_string(), start).with_code("P005")))
    }

    fn parse_alias(&mut self) -> Result<TypeAlias> {
        self.expect(TokenKind::Alias)?;
        let original = self.parse_type()?;
        self.expect(TokenKind::As)?;
        let alias = self.expect(TokenKind::Identifier)?.text;
        Ok(TypeAlias { original, alias })
    }

    fn parse_if(&mut self) -> Result<IfStmt> {
        self.expect(TokenKind::If)?;
        let cond = self.parse_expr()?;
        let then = self.parse_block()?;
        let otherwise = if self.take_else() {
            if self.is(TokenKind::If) {
                Some(vec![Stmt::If(self.parse_if()?)])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(IfStmt {
            cond,
            then,
            otherwise,
        })
    }

    /// Consumes an `else`, which may sit on a later line than the closing
    /// brace before it.
    fn take_else(&mut self) -> bool {
        let mut n = 0;
        while self.peek_nth(n) == TokenKind::Newline {
            n += 1;
        }
        if self.peek_nth(n) != TokenKind::Else {
            return false;
        }
        for _ in 0..=n {
            self.advance();
        }
        true
    }

    fn parse_while(&mut self) -> Result<WhileStmt> {
        self.expect(TokenKind::While)?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(WhileStmt { cond, body })
    }

    /// `{ stmt* }`. Block contents are always function locals.
    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.skip_newlines();
        self.expect(TokenKind::LBrace)?;
        let body = self.parse_statements(Membership::FunctionLocal, true);
        self.expect(TokenKind::RBrace)?;
        Ok(body)
    }

    fn parse_type(&mut self) -> Result<Type> {
        let token = self.peek().clone();
        let base = match token.kind {
            TokenKind::Identifier => Type::named(token.text),
            kind if kind.is_builtin_type() => Type::builtin(token.text),
            other => {
                self.report(
                    Diagnostic::error(format!("expected type, found {other}"), token.source_span())
                        .with_code("P004"),
                );
                return Err(());
            }
        };
        self.advance();

        if !self.take(TokenKind::LBracket) {
            return Ok(base);
        }
        let args = self.parse_list(TokenKind::RBracket, Self::parse_type)?;
        self.expect(TokenKind::RBracket)?;
        Ok(Type::Generic {
            base: Box::new(base),
            args,
        })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_nud()?;
        // Once cast, the operand only takes operators that bind no tighter
        // than `as` itself: `a as _Int + b` leaves `+ b` unparsed.
        let mut max_bp = u8::MAX;

        loop {
            let kind = self.peek_kind();

            if let Some(op) = Self::postfix_operator(kind) {
                if POSTFIX_BP < min_bp || POSTFIX_BP > max_bp {
                    break;
                }
                self.advance();
                lhs = Expr::Unary(UnaryOp {
                    op,
                    operand: Box::new(lhs),
                    is_prefix: false,
                });
                continue;
            }

            if kind == TokenKind::As {
                if CAST_BP < min_bp {
                    break;
                }
                self.advance();
                let target = self.parse_type()?;
                lhs = Expr::Cast(Cast {
                    expr: Box::new(lhs),
                    target,
                });
                max_bp = CAST_BP;
                continue;
            }

            let Some(op) = Self::binary_operator(kind) else {
                // Not an operator; the expression ends here.
                break;
            };
            let (lbp, rbp) = Self::infix_binding_power(op);
            if lbp < min_bp || lbp > max_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_expr_bp(rbp)?;
            lhs = Expr::Binary(BinaryOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
            // Anything tighter left over was refused by a cast inside `rhs`.
            max_bp = max_bp.min(lbp);
        }

        Ok(lhs)
    }

    /// nud: tokens that start an expression (prefix operators, literals,
    /// names, grouping).
    fn parse_nud(&mut self) -> Result<Expr> {
        let token = self.peek().clone();

        if let Some(op) = Self::prefix_operator(token.kind) {
            self.advance();
            let operand = self.parse_expr_bp(PREFIX_BP)?;
            return Ok(Expr::Unary(UnaryOp {
                op,
                operand: Box::new(operand),
                is_prefix: true,
            }));
        }

        let literal = match token.kind {
            TokenKind::Integer => {
                let value = extract::int(&token).unwrap_or_else(|_| {
                    self.invalid_literal("integer", &token);
                    0
                });
                Literal::Int(value)
            }
            TokenKind::Float => {
                let value = extract::float(&token).unwrap_or_else(|_| {
                    self.invalid_literal("float", &token);
                    0.0
                });
                Literal::Float(value)
            }
            TokenKind::String => Literal::String(token.text.clone()),
            TokenKind::Char => Literal::Char(extract::char(&token)),
            TokenKind::True => Literal::Bool(true),
            TokenKind::False => Literal::Bool(false),

            // Names, optionally applied: ID [types] (args)
            kind if kind == TokenKind::Identifier || kind.is_builtin_type() => {
                self.advance();
                return self.parse_call_suffix(token.text);
            }

            // Grouping: ( expr )
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(expr);
            }

            other => {
                self.report(
                    Diagnostic::error(
                        format!("expected expression, found {other}"),
                        token.source_span(),
                    )
                    .with_code("P003"),
                );
                if !is_boundary(other) {
                    self.advance();
                }
                return Ok(Expr::dummy());
            }
        };

        self.advance();
        Ok(Expr::Literal(literal))
    }

    fn parse_call_suffix(&mut self, name: String) -> Result<Expr> {
        let callee = Expr::Identifier(Identifier { name });

        let type_args = if self.take(TokenKind::LBracket) {
            let types = self.parse_list(TokenKind::RBracket, Self::parse_type)?;
            self.expect(TokenKind::RBracket)?;
            Some(types)
        } else {
            None
        };
        let args = if self.take(TokenKind::LParen) {
            let args = self.parse_list(TokenKind::RParen, Self::parse_expr)?;
            self.expect(TokenKind::RParen)?;
            Some(args)
        } else {
            None
        };

        if type_args.is_none() && args.is_none() {
            return Ok(callee);
        }
        Ok(Expr::Call(Call {
            callee: Box::new(callee),
            type_args: type_args.unwrap_or_default(),
            args: args.unwrap_or_default(),
        }))
    }

    fn invalid_literal(&mut self, what: &str, token: &Token) {
        self.report(
            Diagnostic::error(
                format!("invalid {what} literal `{}`", token.text),
                token.source_span(),
            )
            .with_code("P007"),
        );
    }

    /// Parses `item (',' item)*` up to `end_delim`, allowing a line break after
    /// the opening delimiter and after each comma. Does **NOT** consume the end
    /// delimiter.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        mut parse_item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        self.skip_newlines();
        while self.except([end_delim]) {
            items.push(parse_item(self)?);
            if !self.take(TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        Ok(items)
    }

    fn binary_operator(kind: TokenKind) -> Option<BinaryOperator> {
        use BinaryOperator as B;
        let op = match kind {
            TokenKind::Assign => B::Assign,
            TokenKind::PlusEq => B::AddAssign,
            TokenKind::MinusEq => B::SubAssign,
            TokenKind::StarEq => B::MulAssign,
            TokenKind::SlashEq => B::DivAssign,
            TokenKind::PercentEq => B::RemAssign,
            TokenKind::AmpEq => B::AndAssign,
            TokenKind::PipeEq => B::OrAssign,
            TokenKind::CaretEq => B::XorAssign,
            TokenKind::ShlEq => B::ShlAssign,
            TokenKind::ShrEq => B::ShrAssign,
            TokenKind::PipePipe => B::LogicalOr,
            TokenKind::AmpAmp => B::LogicalAnd,
            TokenKind::Pipe => B::BitOr,
            TokenKind::Caret => B::BitXor,
            TokenKind::Amp => B::BitAnd,
            TokenKind::EqEq => B::Eq,
            TokenKind::BangEq => B::Ne,
            TokenKind::Less => B::Lt,
            TokenKind::LessEq => B::Le,
            TokenKind::Greater => B::Gt,
            TokenKind::GreaterEq => B::Ge,
            TokenKind::Shl => B::Shl,
            TokenKind::Shr => B::Shr,
            TokenKind::Plus => B::Add,
            TokenKind::Minus => B::Sub,
            TokenKind::Star => B::Mul,
            TokenKind::Slash => B::Div,
            TokenKind::Percent => B::Rem,
            _ => return None,
        };
        Some(op)
    }

    fn infix_binding_power(op: BinaryOperator) -> (u8, u8) {
        use BinaryOperator::*;
        match op {
            // Assignment (right-associative)
            Assign | AddAssign | SubAssign | MulAssign | DivAssign | RemAssign | AndAssign
            | OrAssign | XorAssign | ShlAssign | ShrAssign => (2, 1),

            // `as` sits at (3, 4), see CAST_BP.
            LogicalOr => (5, 6),
            LogicalAnd => (7, 8),
            BitOr => (9, 10),
            BitXor => (11, 12),
            BitAnd => (13, 14),
            Eq | Ne => (15, 16),
            Lt | Le | Gt | Ge => (17, 18),
            Shl | Shr => (19, 20),
            Add | Sub => (21, 22),
            Mul | Div | Rem => (23, 24),
        }
    }

    fn prefix_operator(kind: TokenKind) -> Option<UnaryOperator> {
        let op = match kind {
            TokenKind::Plus => UnaryOperator::Plus,
            TokenKind::Minus => UnaryOperator::Neg,
            TokenKind::Bang => UnaryOperator::Not,
            TokenKind::Tilde => UnaryOperator::BitNot,
            TokenKind::PlusPlus => UnaryOperator::Inc,
            TokenKind::MinusMinus => UnaryOperator::Dec,
            _ => return None,
        };
        Some(op)
    }

    fn postfix_operator(kind: TokenKind) -> Option<UnaryOperator> {
        match kind {
            TokenKind::PlusPlus => Some(UnaryOperator::Inc),
            TokenKind::MinusMinus => Some(UnaryOperator::Dec),
            _ => None,
        }
    }
}

impl Parser<'_, '_> {
    fn new<'tok, 'diag>(
        tokens: &'tok [Token],
        diagnostics: &'diag mut Diagnostics,
    ) -> Parser<'tok, 'diag> {
        let eof = match tokens.last() {
            Some(last) if last.is_eof() => last.clone(),
            Some(last) => {
                let end = last.source_span().end;
                Token::new(
                    TokenKind::Eof,
                    "",
                    Span::new_of_length(last.span().hi(), 0),
                    end,
                    end,
                )
            }
            None => Token::new(
                TokenKind::Eof,
                "",
                Span::new_of_length(0, 0),
                SourcePosition::START,
                SourcePosition::START,
            ),
        };
        Parser {
            tokens,
            cursor: 0,
            eof,
            diagnostics,
        }
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.report(diagnostic);
    }

    /// Returns the current token, or the end-of-input token past the end.
    #[inline]
    fn peek(&self) -> &Token {
        self.tokens.get(self.cursor).unwrap_or(&self.eof)
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_nth(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.cursor + n)
            .map_or(TokenKind::Eof, |token| token.kind)
    }

    /// Returns the current token and advances.
    fn advance(&mut self) -> Token {
        let c = self.peek().clone();
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek_kind() == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes the expected token. Otherwise reports it as missing and skips
    /// a bounded number of tokens looking for it, stopping early at a
    /// statement boundary, which is left unconsumed.
    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        if self.is(expected) {
            return Ok(self.advance());
        }

        let found = self.peek();
        let diagnostic = Diagnostic::error(
            format!("expected {expected}, found {}", found.kind),
            found.source_span(),
        )
        .with_code("P002")
        .with_hint(format!("insert {expected} here"));
        self.report(diagnostic);

        for _ in 0..MAX_RECOVERY_SKIP {
            let kind = self.peek_kind();
            if kind == expected {
                return Ok(self.advance());
            }
            if is_boundary(kind) {
                break;
            }
            self.skip_token();
        }
        Err(())
    }

    /// Advances one token; a `{` takes everything up to its matching `}`
    /// with it, so recovery never strands a closing brace.
    fn skip_token(&mut self) {
        if self.advance().kind != TokenKind::LBrace {
            return;
        }
        let mut depth = 1_usize;
        while depth > 0 && !self.is(TokenKind::Eof) {
            match self.advance().kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                _ => {}
            }
        }
    }

    /// Returns true while the current token does *not* match one of the
    /// provided ones. [`TokenKind::Eof`] is implicitly included in the list.
    ///
    /// This won't advance the cursor.
    fn except(&self, except: impl IntoIterator<Item = TokenKind>) -> bool {
        let c = self.peek_kind();
        c != TokenKind::Eof && except.into_iter().all(|e| e != c)
    }

    fn skip_newlines(&mut self) {
        while self.take(TokenKind::Newline) {}
    }

    /// Skips to the next statement boundary, without consuming it.
    fn recover(&mut self) {
        while !is_boundary(self.peek_kind()) {
            self.skip_token();
        }
    }

    /// Consumes the terminator of a statement. `}` and end of input also end
    /// a statement but belong to the enclosing construct.
    fn end_statement(&mut self) {
        match self.peek_kind() {
            TokenKind::Newline | TokenKind::Semicolon => {
                self.advance();
            }
            TokenKind::RBrace | TokenKind::Eof => {}
            other => {
                let at = self.peek().source_span();
                self.report(
                    Diagnostic::error(format!("expected end of statement, found {other}"), at)
                        .with_code("P002")
                        .with_hint("put each statement on its own line or separate them with `;`"),
                );
                self.recover();
            }
        }
    }
}

fn is_boundary(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Newline | TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
    )
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use parser;

        fn test_precedence_mul_over_add() {
            let expr = "1 + 2 * 3";
            let tree_ok = "
                binary Add
                  int 1
                  binary Mul
                    int 2
                    int 3
            ";
        }

        fn test_grouping_overrides_precedence() {
            let expr = "(1 + 2) * 3";
            let tree_ok = "
                binary Mul
                  binary Add
                    int 1
                    int 2
                  int 3
            ";
        }

        fn test_assignment_is_right_associative() {
            let expr = "a = b += c";
            let tree_ok = "
                binary Assign
                  ident a
                  binary AddAssign
                    ident b
                    ident c
            ";
        }

        fn test_full_precedence_ladder() {
            let expr = "a || b && c | d ^ e & f == g < h << i";
            let tree_ok = "
                binary LogicalOr
                  ident a
                  binary LogicalAnd
                    ident b
                    binary BitOr
                      ident c
                      binary BitXor
                        ident d
                        binary BitAnd
                          ident e
                          binary Eq
                            ident f
                            binary Lt
                              ident g
                              binary Shl
                                ident h
                                ident i
            ";
        }

        fn test_postfix_binds_tighter_than_prefix() {
            let expr = "-x++ * 2";
            let tree_ok = "
                binary Mul
                  unary Neg (prefix)
                    unary Inc (postfix)
                      ident x
                  int 2
            ";
        }

        fn test_cast_is_below_arithmetic() {
            let expr = "a + b as _Long";
            let tree_ok = "
                cast _Long
                  binary Add
                    ident a
                    ident b
            ";
        }

        fn test_cast_chains() {
            let expr = "x as _Int as _Long";
            let tree_ok = "
                cast _Long
                  cast _Int
                    ident x
            ";
        }

        fn test_cast_result_takes_no_tighter_operator() {
            let expr = "a as _Int + b";
            let tree_error = "
                cast _Int
                  ident a
            ";
            let expected_errors = &["1:11: P002: expected end of input, found '+'"];
        }

        fn test_cast_restriction_reaches_enclosing_operators() {
            let expr = "x = y as _Int + 1";
            let tree_error = "
                binary Assign
                  ident x
                  cast _Int
                    ident y
            ";
            let expected_errors = &["1:15: P002: expected end of input, found '+'"];
        }

        fn test_cast_is_above_assignment() {
            let expr = "x = y as _Int";
            let tree_ok = "
                binary Assign
                  ident x
                  cast _Int
                    ident y
            ";
        }

        fn test_generic_call() {
            let expr = "max[_Int](a, 1)";
            let tree_ok = "
                call
                  ident max
                  type arguments
                    type _Int
                  arguments
                    ident a
                    int 1
            ";
        }

        fn test_call_without_arguments() {
            let expr = "now()";
            let tree_ok = "
                call
                  ident now
            ";
        }

        fn test_literals() {
            let expr = "0x1F + 2.5 + 'a' + \"hi\\n\" + true";
            let tree_ok = r#"
                binary Add
                  binary Add
                    binary Add
                      binary Add
                        int 31
                        float 2.5
                      char 'a'
                    string "hi\n"
                  bool true
            "#;
        }

        fn test_error_expected_expression() {
            let expr = "1 + )";
            let tree_error = "
                binary Add
                  int 1
                  int 0
            ";
            let expected_errors = &["1:5: P003: expected expression, found ')'"];
        }

        fn test_error_integer_out_of_range() {
            let expr = "99999999999999999999";
            let tree_error = "int 0";
            let expected_errors = &["1:1: P007: invalid integer literal `99999999999999999999`"];
        }

        fn test_error_unclosed_paren() {
            let expr = "(1 + 2";
            let tree_error = "int 0";
            let expected_errors = &["1:7: P002: expected ')', found end of input"];
        }

        fn test_declarations() {
            let program = ::indoc::indoc! {"
                mod geometry
                pub origin: _Int = 0
                record Point {
                    x: _Int
                    mut y: _Int
                    pub fx norm(): _Int {
                        x
                    }
                }
            "};
            let tree_ok = "
                module geometry
                  variable origin: _Int [pub] (module)
                    int 0
                  record Point (module)
                    variable x: _Int (record field)
                    variable y: _Int [mut] (record field)
                    function norm(): _Int [pub] (record method)
                      ident x
            ";
        }

        fn test_control_flow() {
            let program = ::indoc::indoc! {"
                mod m
                fx main(n mut: _Int) {
                    while n > 0 {
                        if n == 1 {
                            break
                        } else if n == 2 {
                            continue
                        }
                        else {
                            n -= 1
                        }
                    }
                    defer {
                        done()
                    }
                }
            "};
            let tree_ok = "
                module m
                  function main(mut n: _Int): _Unit (module)
                    while
                      binary Gt
                        ident n
                        int 0
                      body
                        if
                          binary Eq
                            ident n
                            int 1
                          then
                            break
                          else
                            if
                              binary Eq
                                ident n
                                int 2
                              then
                                continue
                              else
                                binary SubAssign
                                  ident n
                                  int 1
                    defer
                      call
                        ident done
            ";
        }

        fn test_generic_function_and_alias() {
            let program = ::indoc::indoc! {"
                mod m
                alias Map[_Int, Name] as Table
                fx id[T](x: T): T {
                    x
                }
            "};
            let tree_ok = "
                module m
                  alias Map[_Int, Name] as Table
                  function id[T](x: T): T (module)
                    ident x
            ";
        }

        fn test_semicolons_separate_statements() {
            let program = "mod m; a; b";
            let tree_ok = "
                module m
                  ident a
                  ident b
            ";
        }

        fn test_error_missing_module() {
            let program = "x = 1\ny = 2";
            let tree_error = "module error";
            let expected_errors = &["1:1: P001: missing module declaration"];
        }

        fn test_error_empty_source() {
            let program = "";
            let tree_error = "module error";
            let expected_errors = &["1:1: P001: missing module declaration"];
        }

        fn test_error_invalid_module_name() {
            let program = "mod 42";
            let tree_error = "module error";
            let expected_errors =
                &["1:5: P004: invalid module name: expected identifier, found integer literal"];
        }

        fn test_error_modifiers() {
            let program = ::indoc::indoc! {"
                mod m
                fx f() {
                    pub x: _Int = 1
                }
                pub pub y: _Int = 2
                mut record R { a: _Int }
                pub if true { }
            "};
            let tree_error = "
                module m
                  function f(): _Unit (module)
                    variable x: _Int (local)
                      int 1
                  variable y: _Int [pub] (module)
                    int 2
                  record R (module)
                    variable a: _Int (record field)
                  if
                    bool true
                    then
            ";
            let expected_errors = &[
                "3:5: P005: modifier `pub` is not allowed on a local variable",
                "5:5: P006: duplicate modifier `pub`",
                "6:1: P005: modifier `mut` is not allowed on a module record",
                "7:1: P008: `pub` cannot be applied to an if statement",
            ];
        }

        fn test_empty_record_is_reported_as_info() {
            let program = "mod m\nrecord Empty {}";
            let tree_error = "
                module m
                  record Empty (module)
            ";
            let expected_errors = &["2:1: I001: empty record `Empty`"];
        }

        fn test_recovery_drops_broken_statement() {
            let program = "mod m\nx: _Int = (1 + 2\ny: _Int = 3";
            let tree_error = "
                module m
                  variable y: _Int (module)
                    int 3
            ";
            let expected_errors = &["2:17: P002: expected ')', found newline"];
        }

        fn test_recovery_after_trailing_tokens() {
            let program = "mod m\nx y\nz";
            let tree_error = "
                module m
                  ident x
                  ident z
            ";
            let expected_errors = &["2:3: P002: expected end of statement, found identifier"];
        }

        fn test_recovery_finds_expected_token() {
            let program = "mod m\nalias _Int x y z as T\nu: _Int";
            let tree_error = "
                module m
                  alias _Int as T
                  variable u: _Int (module)
            ";
            let expected_errors = &["2:12: P002: expected 'as', found identifier"];
        }

        fn test_recovery_gives_up_after_skip_limit() {
            let program =
                "mod m\nalias _Int a b c d e f g h i j k l m n o p q r s t u v w x y as T\nu: _Int";
            let tree_error = "
                module m
                  variable u: _Int (module)
            ";
            let expected_errors = &["2:12: P002: expected 'as', found identifier"];
        }

        fn test_recovery_stops_at_newline() {
            let program = "mod m\nalias _Int x\nu: _Int";
            let tree_error = "
                module m
                  variable u: _Int (module)
            ";
            let expected_errors = &["2:12: P002: expected 'as', found identifier"];
        }

        fn test_recovery_skips_whole_blocks() {
            let program = ::indoc::indoc! {"
                mod m
                fx f(1) {
                    x
                }
                x y {
                    z
                }
                w
            "};
            let tree_error = "
                module m
                  ident x
                  ident w
            ";
            let expected_errors = &[
                "2:6: P002: expected identifier, found integer literal",
                "5:3: P002: expected end of statement, found identifier",
            ];
        }

        fn test_error_stray_closing_brace() {
            let program = "mod m\n}\nx";
            let tree_error = "
                module m
                  ident x
            ";
            let expected_errors = &["2:1: P002: expected statement, found '}'"];
        }

        fn test_error_bad_type() {
            let program = "mod m\nx: 5 = 1\ny: _Bool";
            let tree_error = "
                module m
                  variable y: _Bool (module)
            ";
            let expected_errors = &["2:4: P004: expected type, found integer literal"];
        }
    );
}
