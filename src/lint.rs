//! Token-level style checks. Findings are warnings and never stop a
//! compilation.

use crate::{
    diagnostic::{Diagnostic, Diagnostics},
    token::{Token, TokenKind},
};

/// Blank lines allowed in a row before `W002` fires.
pub const MAX_BLANK_LINES: usize = 2;

pub fn check(tokens: &[Token], diagnostics: &mut Diagnostics) {
    unnecessary_parens(tokens, diagnostics);
    blank_lines(tokens, diagnostics);
}

fn unnecessary_parens(tokens: &[Token], diagnostics: &mut Diagnostics) {
    let closing = match_parens(tokens);
    let kind_at = |i: usize| tokens.get(i).map_or(TokenKind::Eof, |t| t.kind);

    for (open, close) in closing.iter().enumerate() {
        let Some(close) = *close else { continue };
        let before = open.checked_sub(1).map(kind_at);

        let reason = if matches!(before, Some(TokenKind::If | TokenKind::While))
            && kind_at(close + 1) == TokenKind::LBrace
        {
            "unnecessary parentheses around condition"
        } else if kind_at(open + 1) == TokenKind::LParen
            && closing.get(open + 1).copied().flatten() == Some(close - 1)
        {
            "doubled parentheses"
        } else if close == open + 2
            && is_atom(kind_at(open + 1))
            && !before.is_some_and(is_callee_end)
        {
            "unnecessary parentheses around a single value"
        } else {
            continue;
        };

        let span = tokens[open].source_span().to(tokens[close].source_span());
        diagnostics.report(
            Diagnostic::warning(reason, span)
                .with_code("W001")
                .with_hint("remove these parentheses"),
        );
    }
}

/// For each `(` token, the index of its matching `)`. Unbalanced parentheses
/// are left unmatched; the parser reports those.
fn match_parens(tokens: &[Token]) -> Vec<Option<usize>> {
    let mut closing = vec![None; tokens.len()];
    let mut stack = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => stack.push(i),
            TokenKind::RParen => {
                if let Some(open) = stack.pop() {
                    closing[open] = Some(i);
                }
            }
            _ => {}
        }
    }
    closing
}

fn is_atom(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Integer
            | TokenKind::Float
            | TokenKind::String
            | TokenKind::Char
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Identifier
    )
}

/// Tokens after which `(` opens an argument or parameter list.
fn is_callee_end(kind: TokenKind) -> bool {
    kind == TokenKind::Identifier || kind == TokenKind::RBracket || kind.is_builtin_type()
}

fn blank_lines(tokens: &[Token], diagnostics: &mut Diagnostics) {
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].kind != TokenKind::Newline {
            i += 1;
            continue;
        }
        let start = i;
        while tokens.get(i).is_some_and(|t| t.kind == TokenKind::Newline) {
            i += 1;
        }
        // The first newline of a run ends a non-blank line, unless the run
        // starts the file.
        let run = i - start;
        let blank = if start == 0 { run } else { run - 1 };
        if blank > MAX_BLANK_LINES {
            let first_blank = if start == 0 { start } else { start + 1 };
            diagnostics.report(
                Diagnostic::warning(
                    format!("too many blank lines ({blank})"),
                    tokens[first_blank].source_span(),
                )
                .with_code("W002")
                .with_hint(format!("use at most {MAX_BLANK_LINES} blank lines")),
            );
        }
    }
}
