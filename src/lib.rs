/// A peekable character cursor that tracks line and column.
pub mod cursor;

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// Style checks over the token stream.
pub mod lint;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The transpiler walks a parsed module and emits a C header.
pub mod transpiler;

pub mod ast;
pub mod diagnostic;
pub mod driver;
pub mod mangle;
pub mod token;

pub mod util {
    pub mod fmt;
    #[cfg(test)]
    pub(crate) mod test_utils;
}
