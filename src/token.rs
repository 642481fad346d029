use std::{fmt, ops::Range};

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The token's content. For string and character literals this is the
    /// unescaped value, for every other token the raw lexeme.
    pub text: String,
    pub position: SourcePosition,
    end: SourcePosition,
    lo: usize,
    len: u32,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        text: impl Into<String>,
        span: Span,
        position: SourcePosition,
        end: SourcePosition,
    ) -> Token {
        Token {
            kind,
            text: text.into(),
            position,
            end,
            lo: span.lo,
            len: span.len,
        }
    }

    /// Byte offset of the token's first character in the source.
    pub fn offset(&self) -> usize {
        self.lo
    }

    pub fn span(&self) -> Span {
        Span {
            len: self.len,
            lo: self.lo,
        }
    }

    pub fn source_span(&self) -> SourceSpan {
        SourceSpan::new(self.position, self.end)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token({:?}, {:?}, {}, {})",
            self.kind,
            self.text,
            self.span(),
            self.position
        )
    }
}

/// Byte range of a lexeme.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        Self::new_of_length(lo, u32::try_from(hi - lo).unwrap_or(u32::MAX))
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lo, self.hi())
    }
}

/// A 1-based line and column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub const START: SourcePosition = SourcePosition { line: 1, column: 1 };

    pub const fn new(line: u32, column: u32) -> SourcePosition {
        SourcePosition { line, column }
    }
}

impl Default for SourcePosition {
    fn default() -> Self {
        SourcePosition::START
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A region of source text, from `start` (inclusive) to `end` (exclusive).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

impl SourceSpan {
    pub const fn new(start: SourcePosition, end: SourcePosition) -> SourceSpan {
        SourceSpan { start, end }
    }

    pub const fn point(at: SourcePosition) -> SourceSpan {
        SourceSpan { start: at, end: at }
    }

    /// Number of columns covered by this span.
    ///
    /// Only meaningful for single-line spans; multi-line (and empty) spans
    /// collapse to 1.
    pub fn length(&self) -> u32 {
        if self.start.line == self.end.line && self.end.column > self.start.column {
            self.end.column - self.start.column
        } else {
            1
        }
    }

    /// Returns a span covering both `self` and `other`.
    pub fn to(self, other: SourceSpan) -> SourceSpan {
        SourceSpan {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Integer,
    Float,
    String,
    Char,
    Identifier,

    Mod,
    Record,
    Fx,
    Alias,
    As,
    If,
    Else,
    While,
    Defer,
    Break,
    Continue,
    True,
    False,
    Pub,
    Mut,

    // Builtin primitive types.
    TInt,
    TFloat,
    TDouble,
    TByte,
    TShort,
    TLong,
    TBool,
    TUByte,
    TUInt,
    TULong,
    TUnit,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,

    Plus,
    PlusPlus,
    PlusEq,
    Minus,
    MinusMinus,
    MinusEq,
    Star,
    StarEq,
    Slash,
    SlashEq,
    Percent,
    PercentEq,
    Assign,
    EqEq,
    Bang,
    BangEq,
    Less,
    LessEq,
    Shl,
    ShlEq,
    Greater,
    GreaterEq,
    Shr,
    ShrEq,
    Amp,
    AmpAmp,
    AmpEq,
    Pipe,
    PipePipe,
    PipeEq,
    Caret,
    CaretEq,
    Tilde,

    Newline,
    Eof,
}

impl TokenKind {
    pub fn is_builtin_type(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            TInt | TFloat | TDouble | TByte | TShort | TLong | TBool | TUByte | TUInt | TULong
                | TUnit
        )
    }

    pub fn is_keyword(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Mod | Record
                | Fx
                | Alias
                | As
                | If
                | Else
                | While
                | Defer
                | Break
                | Continue
                | True
                | False
                | Pub
                | Mut
        )
    }

    /// Human-readable name, used in diagnostics.
    pub fn describe(self) -> &'static str {
        use TokenKind::*;
        match self {
            Integer => "integer literal",
            Float => "float literal",
            String => "string literal",
            Char => "character literal",
            Identifier => "identifier",
            Newline => "newline",
            Eof => "end of input",
            _ => self.symbol(),
        }
    }

    /// The fixed source text of keywords, builtin types, symbols and
    /// operators. Empty for tokens with variable content.
    pub fn symbol(self) -> &'static str {
        use TokenKind::*;
        match self {
            Mod => "mod",
            Record => "record",
            Fx => "fx",
            Alias => "alias",
            As => "as",
            If => "if",
            Else => "else",
            While => "while",
            Defer => "defer",
            Break => "break",
            Continue => "continue",
            True => "true",
            False => "false",
            Pub => "pub",
            Mut => "mut",
            TInt => "_Int",
            TFloat => "_Float",
            TDouble => "_Double",
            TByte => "_Byte",
            TShort => "_Short",
            TLong => "_Long",
            TBool => "_Bool",
            TUByte => "_UByte",
            TUInt => "_UInt",
            TULong => "_ULong",
            TUnit => "_Unit",
            LParen => "(",
            RParen => ")",
            LBrace => "{",
            RBrace => "}",
            LBracket => "[",
            RBracket => "]",
            Comma => ",",
            Colon => ":",
            Semicolon => ";",
            Dot => ".",
            Plus => "+",
            PlusPlus => "++",
            PlusEq => "+=",
            Minus => "-",
            MinusMinus => "--",
            MinusEq => "-=",
            Star => "*",
            StarEq => "*=",
            Slash => "/",
            SlashEq => "/=",
            Percent => "%",
            PercentEq => "%=",
            Assign => "=",
            EqEq => "==",
            Bang => "!",
            BangEq => "!=",
            Less => "<",
            LessEq => "<=",
            Shl => "<<",
            ShlEq => "<<=",
            Greater => ">",
            GreaterEq => ">=",
            Shr => ">>",
            ShrEq => ">>=",
            Amp => "&",
            AmpAmp => "&&",
            AmpEq => "&=",
            Pipe => "|",
            PipePipe => "||",
            PipeEq => "|=",
            Caret => "^",
            CaretEq => "^=",
            Tilde => "~",
            Integer | Float | String | Char | Identifier | Newline | Eof => "",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.symbol() {
            "" => f.write_str(self.describe()),
            symbol => write!(f, "'{symbol}'"),
        }
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "mod" => TokenKind::Mod,
    "record" => TokenKind::Record,
    "fx" => TokenKind::Fx,
    "alias" => TokenKind::Alias,
    "as" => TokenKind::As,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "defer" => TokenKind::Defer,
    "break" => TokenKind::Break,
    "continue" => TokenKind::Continue,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "pub" => TokenKind::Pub,
    "mut" => TokenKind::Mut,
    "_Int" => TokenKind::TInt,
    "_Float" => TokenKind::TFloat,
    "_Double" => TokenKind::TDouble,
    "_Byte" => TokenKind::TByte,
    "_Short" => TokenKind::TShort,
    "_Long" => TokenKind::TLong,
    "_Bool" => TokenKind::TBool,
    "_UByte" => TokenKind::TUByte,
    "_UInt" => TokenKind::TUInt,
    "_ULong" => TokenKind::TULong,
    "_Unit" => TokenKind::TUnit,
};
