// module ::= 'mod' ID NL (stmt NL)*
// stmt ::= modifier* decl
//        | alias type 'as' ID
//        | if expr block [else (block | if ...)]
//        | while expr block
//        | defer block
//        | break | continue
//        | expr
// decl ::= record type '{' (modifier* (field | function) NL)* '}'
//        | function
//        | ID ['mut'] ':' type ['=' expr]
// function ::= 'fx' ID ['[' ID (',' ID)* ']'] '(' [param (',' param)*] ')' [':' type] block
// param ::= ID ['mut'] ':' type
// type ::= BUILTIN | ID ['[' type (',' type)* ']']
// expr ::= primary | unary expr | expr postfix | expr binop expr | expr 'as' type
// primary ::= literal | '(' expr ')'
//           | (ID | BUILTIN) ['[' type (',' type)* ']'] ['(' [expr (',' expr)*] ')']

// Precedence
//
// postfix ++ --
// prefix + - ! ~ ++ --
// * / %
// + -
// << >>
// < <= > >=
// == !=
// &
// ^
// |
// &&
// ||
// as
// = += -= *= /= %= &= |= ^= <<= >>=

use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub name: String,
    pub statements: Vec<Stmt>,
}

impl Module {
    /// The module produced when the source has no usable module header.
    pub fn error() -> Module {
        Module {
            name: "error".into(),
            statements: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Expr(ExprStmt),
    Variable(VariableDecl),
    TypeAlias(TypeAlias),
    Record(RecordDecl),
    If(IfStmt),
    While(WhileStmt),
    Defer(DeferStmt),
    Break,
    Continue,
    Function(FunctionDecl),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprStmt {
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariableDecl {
    pub name: String,
    pub ty: Type,
    pub init: Option<Expr>,
    pub modifiers: Modifiers,
    pub membership: Membership,
}

impl VariableDecl {
    pub fn is_mutable(&self) -> bool {
        self.modifiers.contains(Modifier::Mutable)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeAlias {
    pub original: Type,
    pub alias: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordDecl {
    pub ty: Type,
    pub fields: Vec<VariableDecl>,
    pub methods: Vec<FunctionDecl>,
    pub modifiers: Modifiers,
    pub membership: Membership,
}

impl RecordDecl {
    /// Builds a record declaration, rejecting modifiers that can't annotate
    /// a record in `membership`.
    pub fn new(
        ty: Type,
        fields: Vec<VariableDecl>,
        methods: Vec<FunctionDecl>,
        modifiers: Modifiers,
        membership: Membership,
    ) -> Result<RecordDecl, ModifierError> {
        modifiers.validate(membership, DeclKind::Record)?;
        Ok(RecordDecl {
            ty,
            fields,
            methods,
            modifiers,
            membership,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then: Vec<Stmt>,
    pub otherwise: Option<Vec<Stmt>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeferStmt {
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub modifiers: Modifiers,
    pub generics: Vec<String>,
    pub return_ty: Type,
    pub params: Vec<VariableDecl>,
    pub body: Vec<Stmt>,
    pub membership: Membership,
}

impl FunctionDecl {
    /// Builds a function declaration, rejecting modifiers that can't
    /// annotate a function in `membership`.
    pub fn new(
        name: String,
        modifiers: Modifiers,
        generics: Vec<String>,
        return_ty: Type,
        params: Vec<VariableDecl>,
        body: Vec<Stmt>,
        membership: Membership,
    ) -> Result<FunctionDecl, ModifierError> {
        modifiers.validate(membership, DeclKind::Function)?;
        Ok(FunctionDecl {
            name,
            modifiers,
            generics,
            return_ty,
            params,
            body,
            membership,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Identifier(Identifier),
    Literal(Literal),
    Binary(BinaryOp),
    Unary(UnaryOp),
    Cast(Cast),
    Call(Call),
}

impl Expr {
    /// The placeholder produced where an expression failed to parse.
    pub fn dummy() -> Expr {
        Expr::Literal(Literal::Int(0))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Identifier {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Char(char),
    Bool(bool),
}

impl Literal {
    pub fn kind(&self) -> LiteralKind {
        match self {
            Literal::Int(_) => LiteralKind::Int,
            Literal::Float(_) => LiteralKind::Float,
            Literal::String(_) => LiteralKind::String,
            Literal::Char(_) => LiteralKind::Char,
            Literal::Bool(_) => LiteralKind::Bool,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LiteralKind {
    Int,
    Float,
    String,
    Char,
    Bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BinaryOp {
    pub op: BinaryOperator,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnaryOp {
    pub op: UnaryOperator,
    pub operand: Box<Expr>,
    pub is_prefix: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cast {
    pub expr: Box<Expr>,
    pub target: Type,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub callee: Box<Expr>,
    pub type_args: Vec<Type>,
    pub args: Vec<Expr>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    LogicalOr,
    LogicalAnd,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Assign => "=",
            AddAssign => "+=",
            SubAssign => "-=",
            MulAssign => "*=",
            DivAssign => "/=",
            RemAssign => "%=",
            AndAssign => "&=",
            OrAssign => "|=",
            XorAssign => "^=",
            ShlAssign => "<<=",
            ShrAssign => ">>=",
            LogicalOr => "||",
            LogicalAnd => "&&",
            BitOr => "|",
            BitXor => "^",
            BitAnd => "&",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            Shl => "<<",
            Shr => ">>",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Rem => "%",
        }
    }

    pub fn is_assignment(self) -> bool {
        use BinaryOperator::*;
        matches!(
            self,
            Assign
                | AddAssign
                | SubAssign
                | MulAssign
                | DivAssign
                | RemAssign
                | AndAssign
                | OrAssign
                | XorAssign
                | ShlAssign
                | ShrAssign
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Neg,
    Not,
    BitNot,
    Inc,
    Dec,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Neg => "-",
            UnaryOperator::Not => "!",
            UnaryOperator::BitNot => "~",
            UnaryOperator::Inc => "++",
            UnaryOperator::Dec => "--",
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Builtin { name: String },
    Named { name: String },
    Generic { base: Box<Type>, args: Vec<Type> },
}

impl Type {
    pub fn builtin(name: impl Into<String>) -> Type {
        Type::Builtin { name: name.into() }
    }

    pub fn named(name: impl Into<String>) -> Type {
        Type::Named { name: name.into() }
    }

    pub fn unit() -> Type {
        Type::builtin("_Unit")
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Builtin { name } | Type::Named { name } => f.write_str(name),
            Type::Generic { base, args } => {
                write!(f, "{base}[")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Modifier {
    Public,
    Mutable,
}

impl Modifier {
    pub fn keyword(self) -> &'static str {
        match self {
            Modifier::Public => "pub",
            Modifier::Mutable => "mut",
        }
    }

    /// Lexical contexts this modifier may appear in.
    pub fn memberships(self) -> &'static [Membership] {
        use Membership::*;
        match self {
            Modifier::Public => &[Module, Record, RecordMethod],
            Modifier::Mutable => &[Module, Record, FunctionLocal, FunctionParameter],
        }
    }

    /// Declaration kinds this modifier may annotate.
    pub fn decl_kinds(self) -> &'static [DeclKind] {
        match self {
            Modifier::Public => &[DeclKind::Variable, DeclKind::Record, DeclKind::Function],
            Modifier::Mutable => &[DeclKind::Variable],
        }
    }

    pub fn allows(self, membership: Membership, kind: DeclKind) -> bool {
        self.memberships().contains(&membership) && self.decl_kinds().contains(&kind)
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// The lexical context a declaration was parsed in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Membership {
    Module,
    Record,
    RecordMethod,
    FunctionLocal,
    FunctionParameter,
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Membership::Module => "module",
            Membership::Record => "record field",
            Membership::RecordMethod => "record method",
            Membership::FunctionLocal => "local",
            Membership::FunctionParameter => "function parameter",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Variable,
    Record,
    Function,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeclKind::Variable => "variable",
            DeclKind::Record => "record",
            DeclKind::Function => "function",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModifierError {
    pub modifier: Modifier,
    pub membership: Membership,
    pub kind: DeclKind,
}

impl fmt::Display for ModifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            modifier,
            membership,
            kind,
        } = self;
        write!(f, "modifier `{modifier}` is not allowed on a {membership} {kind}")
    }
}

/// The modifiers of a declaration, in source order and without duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Modifiers(Vec<Modifier>);

impl Modifiers {
    pub fn none() -> Modifiers {
        Modifiers(Vec::new())
    }

    /// Adds a modifier, returning false if it was already present.
    pub fn insert(&mut self, modifier: Modifier) -> bool {
        if self.contains(modifier) {
            return false;
        }
        self.0.push(modifier);
        true
    }

    pub fn contains(&self, modifier: Modifier) -> bool {
        self.0.contains(&modifier)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Modifier> + '_ {
        self.0.iter().copied()
    }

    /// Checks every modifier against `membership` and `kind`, failing on the
    /// first one that isn't allowed.
    pub fn validate(&self, membership: Membership, kind: DeclKind) -> Result<(), ModifierError> {
        match self.iter().find(|m| !m.allows(membership, kind)) {
            Some(modifier) => Err(ModifierError {
                modifier,
                membership,
                kind,
            }),
            None => Ok(()),
        }
    }

    /// Drops the modifiers not allowed for `membership` and `kind`, returning
    /// an error for each one.
    pub fn retain_allowed(&mut self, membership: Membership, kind: DeclKind) -> Vec<ModifierError> {
        let mut errors = Vec::new();
        self.0.retain(|&modifier| {
            let allowed = modifier.allows(membership, kind);
            if !allowed {
                errors.push(ModifierError {
                    modifier,
                    membership,
                    kind,
                });
            }
            allowed
        });
        errors
    }
}

impl From<&[Modifier]> for Modifiers {
    fn from(modifiers: &[Modifier]) -> Self {
        let mut m = Modifiers::none();
        for &modifier in modifiers {
            m.insert(modifier);
        }
        m
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, modifier) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{modifier}")?;
        }
        Ok(())
    }
}

/// A traversal over the syntax tree. Nodes dispatch to the matching method
/// through their `accept` method.
pub trait Visitor {
    type Output;

    fn visit_module(&mut self, module: &Module) -> Self::Output;

    fn visit_expr_stmt(&mut self, stmt: &ExprStmt) -> Self::Output;
    fn visit_variable_decl(&mut self, decl: &VariableDecl) -> Self::Output;
    fn visit_type_alias(&mut self, alias: &TypeAlias) -> Self::Output;
    fn visit_record_decl(&mut self, decl: &RecordDecl) -> Self::Output;
    fn visit_if(&mut self, stmt: &IfStmt) -> Self::Output;
    fn visit_while(&mut self, stmt: &WhileStmt) -> Self::Output;
    fn visit_defer(&mut self, stmt: &DeferStmt) -> Self::Output;
    fn visit_break(&mut self) -> Self::Output;
    fn visit_continue(&mut self) -> Self::Output;
    fn visit_function_decl(&mut self, decl: &FunctionDecl) -> Self::Output;

    fn visit_identifier(&mut self, ident: &Identifier) -> Self::Output;
    fn visit_literal(&mut self, literal: &Literal) -> Self::Output;
    fn visit_binary(&mut self, op: &BinaryOp) -> Self::Output;
    fn visit_unary(&mut self, op: &UnaryOp) -> Self::Output;
    fn visit_cast(&mut self, cast: &Cast) -> Self::Output;
    fn visit_call(&mut self, call: &Call) -> Self::Output;

    fn visit_builtin_type(&mut self, name: &str) -> Self::Output;
    fn visit_named_type(&mut self, name: &str) -> Self::Output;
    fn visit_generic_type(&mut self, base: &Type, args: &[Type]) -> Self::Output;
}

impl Module {
    pub fn accept<V: Visitor>(&self, v: &mut V) -> V::Output {
        v.visit_module(self)
    }
}

impl Stmt {
    pub fn accept<V: Visitor>(&self, v: &mut V) -> V::Output {
        match self {
            Stmt::Expr(stmt) => v.visit_expr_stmt(stmt),
            Stmt::Variable(decl) => v.visit_variable_decl(decl),
            Stmt::TypeAlias(alias) => v.visit_type_alias(alias),
            Stmt::Record(decl) => v.visit_record_decl(decl),
            Stmt::If(stmt) => v.visit_if(stmt),
            Stmt::While(stmt) => v.visit_while(stmt),
            Stmt::Defer(stmt) => v.visit_defer(stmt),
            Stmt::Break => v.visit_break(),
            Stmt::Continue => v.visit_continue(),
            Stmt::Function(decl) => v.visit_function_decl(decl),
        }
    }
}

impl Expr {
    pub fn accept<V: Visitor>(&self, v: &mut V) -> V::Output {
        match self {
            Expr::Identifier(ident) => v.visit_identifier(ident),
            Expr::Literal(literal) => v.visit_literal(literal),
            Expr::Binary(op) => v.visit_binary(op),
            Expr::Unary(op) => v.visit_unary(op),
            Expr::Cast(cast) => v.visit_cast(cast),
            Expr::Call(call) => v.visit_call(call),
        }
    }
}

impl Type {
    pub fn accept<V: Visitor>(&self, v: &mut V) -> V::Output {
        match self {
            Type::Builtin { name } => v.visit_builtin_type(name),
            Type::Named { name } => v.visit_named_type(name),
            Type::Generic { base, args } => v.visit_generic_type(base, args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_allow_lists() {
        use Membership::*;
        assert!(Modifier::Public.allows(Module, DeclKind::Function));
        assert!(Modifier::Public.allows(RecordMethod, DeclKind::Function));
        assert!(!Modifier::Public.allows(FunctionLocal, DeclKind::Variable));
        assert!(!Modifier::Public.allows(FunctionParameter, DeclKind::Variable));
        assert!(Modifier::Mutable.allows(FunctionParameter, DeclKind::Variable));
        assert!(!Modifier::Mutable.allows(Module, DeclKind::Record));
        assert!(!Modifier::Mutable.allows(RecordMethod, DeclKind::Function));
    }

    #[test]
    fn record_constructor_rejects_mut() {
        let modifiers = Modifiers::from(&[Modifier::Public, Modifier::Mutable][..]);
        let err = RecordDecl::new(
            Type::named("Point"),
            Vec::new(),
            Vec::new(),
            modifiers,
            Membership::Module,
        )
        .unwrap_err();
        assert_eq!(err.modifier, Modifier::Mutable);
        assert_eq!(
            err.to_string(),
            "modifier `mut` is not allowed on a module record"
        );
    }

    #[test]
    fn function_constructor_accepts_pub_method() {
        let decl = FunctionDecl::new(
            "area".into(),
            Modifiers::from(&[Modifier::Public][..]),
            Vec::new(),
            Type::builtin("_Int"),
            Vec::new(),
            Vec::new(),
            Membership::RecordMethod,
        );
        assert!(decl.is_ok());
    }

    #[test]
    fn retain_allowed_reports_each_dropped_modifier() {
        let mut modifiers = Modifiers::from(&[Modifier::Public, Modifier::Mutable][..]);
        let errors = modifiers.retain_allowed(Membership::FunctionLocal, DeclKind::Variable);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].modifier, Modifier::Public);
        assert_eq!(modifiers, Modifiers::from(&[Modifier::Mutable][..]));
    }

    #[test]
    fn insert_rejects_duplicates() {
        let mut modifiers = Modifiers::none();
        assert!(modifiers.insert(Modifier::Mutable));
        assert!(!modifiers.insert(Modifier::Mutable));
        assert_eq!(modifiers.to_string(), "mut");
    }

    #[test]
    fn generic_type_display() {
        let ty = Type::Generic {
            base: Box::new(Type::named("Map")),
            args: vec![Type::builtin("_Int"), Type::named("Name")],
        };
        assert_eq!(ty.to_string(), "Map[_Int, Name]");
    }

    struct Counter(usize);

    impl Visitor for Counter {
        type Output = ();

        fn visit_module(&mut self, module: &Module) {
            for stmt in &module.statements {
                stmt.accept(self);
            }
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
        fn visit_record_decl(&mut self, _: &RecordDecl) {}
        fn visit_if(&mut self, _: &IfStmt) {}
        fn visit_while(&mut self, _: &WhileStmt) {}
        fn visit_defer(&mut self, _: &DeferStmt) {}
        fn visit_break(&mut self) {}
        fn visit_continue(&mut self) {}
        fn visit_function_decl(&mut self, _: &FunctionDecl) {}
        fn visit_identifier(&mut self, _: &Identifier) {}
        fn visit_literal(&mut self, _: &Literal) {
            self.0 += 1;
        }
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
        fn visit_call(&mut self, _: &Call) {}
        fn visit_builtin_type(&mut self, _: &str) {}
        fn visit_named_type(&mut self, _: &str) {}
        fn visit_generic_type(&mut self, _: &Type, _: &[Type]) {}
    }

    #[test]
    fn accept_dispatches_through_visitor() {
        let module = Module {
            name: "m".into(),
            statements: vec![
                Stmt::Expr(ExprStmt {
                    expr: Expr::Binary(BinaryOp {
                        op: BinaryOperator::Add,
                        lhs: Box::new(Expr::Literal(Literal::Int(1))),
                        rhs: Box::new(Expr::Unary(UnaryOp {
                            op: UnaryOperator::Neg,
                            operand: Box::new(Expr::Literal(Literal::Float(2.5))),
                            is_prefix: true,
                        })),
                    }),
                }),
                Stmt::Break,
            ],
        };
        let mut counter = Counter(0);
        module.accept(&mut counter);
        assert_eq!(counter.0, 2);
    }
}
