use crate::{
    cursor::{Cursor, SENTINEL},
    diagnostic::{Diagnostic, Diagnostics},
    token::{SourcePosition, SourceSpan, Span, Token, TokenKind, KEYWORDS},
};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Lexes the provided string. Malformed literals are reported to
/// `diagnostics`, and a best-effort token is still produced for them.
///
/// The returned sequence always ends with a single [`TokenKind::Eof`].
pub fn tokenize(src: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY.min(src.len() + 1));
    Lexer::new(src, &mut tokens, diagnostics).lex();
    tokens
}

/// The K lexer
struct Lexer<'src, 'tok, 'diag> {
    src: &'src str,
    cursor: Cursor,
    current_lo: usize,
    current_start: SourcePosition,
    /// Decoded content of the string or character literal being scanned.
    unescaped: Option<String>,
    tokens: &'tok mut Vec<Token>,
    diagnostics: &'diag mut Diagnostics,
}

impl Lexer<'_, '_, '_> {
    /// Scans the source string until the input is exhausted.
    fn lex(mut self) {
        loop {
            let Some(next) = self.scan_token_kind() else {
                continue;
            };
            self.produce(next);
            if next == TokenKind::Eof {
                break;
            }
        }
    }

    /// Tries to scan the current character. Returns `None` for input that
    /// doesn't produce a token (whitespace, comments, unknown characters).
    fn scan_token_kind(&mut self) -> Option<TokenKind> {
        use TokenKind::*;
        if self.cursor.is_at_end() {
            self.mark();
            return Some(Eof);
        }
        let kind = match self.mark_advance() {
            ' ' | '\t' | '\r' => return None,
            '\n' => Newline,
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            '[' => LBracket,
            ']' => RBracket,
            ',' => Comma,
            ':' => Colon,
            ';' => Semicolon,
            '.' => Dot,
            '~' => Tilde,
            '+' => match self.peek() {
                '+' => self.advance_with(PlusPlus),
                '=' => self.advance_with(PlusEq),
                _ => Plus,
            },
            '-' => match self.peek() {
                '-' => self.advance_with(MinusMinus),
                '=' => self.advance_with(MinusEq),
                _ => Minus,
            },
            '*' => self.with_eq(Star, StarEq),
            '/' => match self.peek() {
                '/' => return self.line_comment(),
                '*' => return self.block_comment(),
                '=' => self.advance_with(SlashEq),
                _ => Slash,
            },
            '%' => self.with_eq(Percent, PercentEq),
            '=' => self.with_eq(Assign, EqEq),
            '!' => self.with_eq(Bang, BangEq),
            '^' => self.with_eq(Caret, CaretEq),
            '<' => match self.peek() {
                '=' => self.advance_with(LessEq),
                '<' => {
                    self.advance();
                    self.with_eq(Shl, ShlEq)
                }
                _ => Less,
            },
            '>' => match self.peek() {
                '=' => self.advance_with(GreaterEq),
                '>' => {
                    self.advance();
                    self.with_eq(Shr, ShrEq)
                }
                _ => Greater,
            },
            '&' => match self.peek() {
                '&' => self.advance_with(AmpAmp),
                '=' => self.advance_with(AmpEq),
                _ => Amp,
            },
            '|' => match self.peek() {
                '|' => self.advance_with(PipePipe),
                '=' => self.advance_with(PipeEq),
                _ => Pipe,
            },
            '"' => self.string(),
            '\'' => self.char(),
            c if c.is_ascii_digit() => self.number(c),
            c if is_identifier_start(c) => self.identifier_or_keyword(),
            _ => return None,
        };
        Some(kind)
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while is_identifier_continue(self.peek()) {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self, first: char) -> TokenKind {
        if first == '0' && matches!(self.peek(), 'x' | 'X' | 'b' | 'B') {
            let radix = if matches!(self.advance(), 'x' | 'X') { 16 } else { 2 };
            let mut digits = 0;
            while self.peek().is_digit(radix) {
                self.advance();
                digits += 1;
            }
            if digits == 0 {
                let kind = if radix == 16 { "hexadecimal" } else { "binary" };
                self.report(
                    Diagnostic::error("expected digits after radix prefix", self.span())
                        .with_code("L005")
                        .with_hint(format!("add at least one {kind} digit")),
                );
            }
            return TokenKind::Integer;
        }

        while self.peek().is_ascii_digit() {
            self.advance();
        }
        // At most one decimal point; a second one ends the literal.
        if self.peek() != '.' {
            return TokenKind::Integer;
        }
        self.advance();
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        TokenKind::Float
    }

    /// Scans a string literal, decoding escape sequences as it goes.
    ///
    /// An unterminated string silently runs to the end of the input.
    fn string(&mut self) -> TokenKind {
        let mut buf = String::new();
        loop {
            if self.cursor.is_at_end() {
                break;
            }
            match self.advance() {
                '"' => break,
                '\\' => {
                    if self.cursor.is_at_end() {
                        break;
                    }
                    let escaped = self.advance();
                    buf.push(unescape(escaped));
                }
                c => buf.push(c),
            }
        }
        self.unescaped = Some(buf);
        TokenKind::String
    }

    fn char(&mut self) -> TokenKind {
        let value = if self.cursor.is_at_end() {
            None
        } else {
            match self.advance() {
                '\'' => {
                    self.report(
                        Diagnostic::error("empty character literal", self.span())
                            .with_code("L004")
                            .with_hint("a character literal holds exactly one character"),
                    );
                    self.unescaped = Some(String::new());
                    return TokenKind::Char;
                }
                '\\' if !self.cursor.is_at_end() => Some(unescape(self.advance())),
                '\\' => None,
                c => Some(c),
            }
        };

        if !self.cursor.eat('\'') {
            let diagnostic = if self.cursor.is_at_end() {
                Diagnostic::error("unterminated character literal", self.span())
                    .with_code("L002")
                    .with_hint("close the literal with `'`")
            } else {
                let found = self.peek();
                // Skip the rest of the malformed literal, up to its closing
                // quote on the same line.
                while !matches!(self.peek(), '\'' | '\n' | SENTINEL) {
                    self.advance();
                }
                self.cursor.eat('\'');
                Diagnostic::error("expected closing quote", self.span())
                    .with_code("L003")
                    .with_hint(format!("found {found:?} where `'` was expected"))
            };
            self.report(diagnostic);
        }

        self.unescaped = Some(value.map(String::from).unwrap_or_default());
        TokenKind::Char
    }

    fn line_comment(&mut self) -> Option<TokenKind> {
        while !matches!(self.peek(), '\n' | SENTINEL) {
            self.advance();
        }
        None
    }

    fn block_comment(&mut self) -> Option<TokenKind> {
        assert_eq!(self.advance(), '*');
        loop {
            match self.advance() {
                '*' if self.peek() == '/' => {
                    self.advance();
                    return None;
                }
                SENTINEL if self.cursor.is_at_end() => break,
                _ => (),
            }
        }
        let start = SourceSpan::new(self.current_start, self.current_start_plus(2));
        self.report(
            Diagnostic::error("unterminated block comment", start)
                .with_code("L001")
                .with_hint("close the comment with `*/`"),
        );
        None
    }
}

impl Lexer<'_, '_, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'src, 'tok, 'diag>(
        src: &'src str,
        tokens: &'tok mut Vec<Token>,
        diagnostics: &'diag mut Diagnostics,
    ) -> Lexer<'src, 'tok, 'diag> {
        Lexer {
            src,
            cursor: Cursor::new(src),
            current_lo: 0,
            current_start: SourcePosition::START,
            unescaped: None,
            tokens,
            diagnostics,
        }
    }

    /// Starts a new token "mark".
    fn mark(&mut self) {
        self.current_lo = self.cursor.offset();
        self.current_start = self.cursor.position();
    }

    /// Starts a new token "mark" and advances the cursor.
    fn mark_advance(&mut self) -> char {
        self.mark();
        self.advance()
    }

    /// Returns the current character and advances the cursor.
    fn advance(&mut self) -> char {
        self.cursor.advance()
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Picks `with_eq` (consuming the `=`) if the next character is `=`.
    fn with_eq(&mut self, plain: TokenKind, with_eq: TokenKind) -> TokenKind {
        if self.cursor.eat('=') {
            with_eq
        } else {
            plain
        }
    }

    /// Returns the current character without advancing the cursor.
    fn peek(&self) -> char {
        self.cursor.current()
    }

    /// Returns the line/column span of the current mark.
    fn span(&self) -> SourceSpan {
        SourceSpan::new(self.current_start, self.cursor.position())
    }

    fn current_start_plus(&self, columns: u32) -> SourcePosition {
        SourcePosition::new(self.current_start.line, self.current_start.column + columns)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        &self.src[self.current_lo..self.cursor.offset()]
    }

    /// Produces a token using the marked bounds.
    fn produce(&mut self, kind: TokenKind) {
        let text = match self.unescaped.take() {
            Some(text) => text,
            None => self.substr().to_owned(),
        };
        let span = Span::new_of_bounds(self.current_lo..self.cursor.offset());
        let token = Token::new(
            kind,
            text,
            span,
            self.current_start,
            self.cursor.position(),
        );
        self.tokens.push(token);
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.report(diagnostic);
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '@'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '@'
}

/// Decodes the character following a backslash. Unknown escapes stand for
/// the escaped character itself.
fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'b' => '\x08', // backspace
        'f' => '\x0c', // form feed
        other => other,
    }
}

pub mod extract {
    use std::num::{ParseFloatError, ParseIntError};

    use super::*;

    /// Parses the value of an integer token, honoring `0x` and `0b` prefixes.
    pub fn int(token: &Token) -> Result<i64, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Integer);
        let text = token.text.as_str();
        match text.get(..2) {
            Some("0x" | "0X") => i64::from_str_radix(&text[2..], 16),
            Some("0b" | "0B") => i64::from_str_radix(&text[2..], 2),
            _ => text.parse(),
        }
    }

    pub fn float(token: &Token) -> Result<f64, ParseFloatError> {
        debug_assert_eq!(token.kind, TokenKind::Float);
        token.text.parse()
    }

    pub fn char(token: &Token) -> char {
        debug_assert_eq!(token.kind, TokenKind::Char);
        token.text.chars().next().unwrap_or('\0')
    }
}
