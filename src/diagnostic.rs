use std::fmt;

use crate::token::{SourcePosition, SourceSpan};

/// Maximum number of error-level diagnostics a collector keeps. Errors past
/// this cap are dropped to avoid cascades.
pub const MAX_ERRORS: usize = 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
            Level::Hint => "hint",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    pub span: SourceSpan,
    pub hint: Option<String>,
    pub code: Option<&'static str>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(level: Level, message: impl Into<String>, span: SourceSpan) -> Diagnostic {
        Diagnostic {
            level,
            message: message.into(),
            span,
            hint: None,
            code: None,
            notes: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>, span: SourceSpan) -> Diagnostic {
        Diagnostic::new(Level::Error, message, span)
    }

    pub fn warning(message: impl Into<String>, span: SourceSpan) -> Diagnostic {
        Diagnostic::new(Level::Warning, message, span)
    }

    pub fn info(message: impl Into<String>, span: SourceSpan) -> Diagnostic {
        Diagnostic::new(Level::Info, message, span)
    }

    #[must_use]
    pub fn with_code(mut self, code: &'static str) -> Diagnostic {
        self.code = Some(code);
        self
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Diagnostic {
        self.hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Diagnostic {
        self.notes.push(note.into());
        self
    }

    pub fn position(&self) -> SourcePosition {
        self.span.start
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

/// Accumulates the diagnostics of a single compilation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    errors: usize,
    has_errors: bool,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    /// Records a diagnostic. Error-level diagnostics past [`MAX_ERRORS`] are
    /// silently dropped.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.has_errors = true;
            if self.errors >= MAX_ERRORS {
                return;
            }
            self.errors += 1;
        }
        self.entries.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries.iter().filter(|d| d.level == level).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Forgets everything reported so far, including the error flag.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.errors = 0;
        self.has_errors = false;
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> SourceSpan {
        SourceSpan::point(SourcePosition::START)
    }

    #[test]
    fn caps_errors_but_not_warnings() {
        let mut d = Diagnostics::new();
        for i in 0..15 {
            d.report(Diagnostic::error(format!("error {i}"), span()));
            d.report(Diagnostic::warning(format!("warning {i}"), span()));
        }
        assert!(d.has_errors());
        assert_eq!(d.error_count(), MAX_ERRORS);
        assert_eq!(d.count(Level::Error), MAX_ERRORS);
        assert_eq!(d.count(Level::Warning), 15);
        assert_eq!(d.iter().filter(|d| d.is_error()).last().unwrap().message, "error 9");
    }

    #[test]
    fn has_errors_sticks_until_reset() {
        let mut d = Diagnostics::new();
        d.report(Diagnostic::info("note", span()));
        assert!(!d.has_errors());
        d.report(Diagnostic::error("boom", span()));
        d.report(Diagnostic::warning("later", span()));
        assert!(d.has_errors());
        d.reset();
        assert!(!d.has_errors());
        assert!(d.is_empty());
    }

    #[test]
    fn builder_sets_optional_parts() {
        let diagnostic = Diagnostic::error("missing module declaration", span())
            .with_code("P001")
            .with_hint("start the file with `mod <name>`")
            .with_note("every file is a module");
        assert_eq!(diagnostic.code, Some("P001"));
        assert_eq!(diagnostic.hint.as_deref(), Some("start the file with `mod <name>`"));
        assert_eq!(diagnostic.notes.len(), 1);
    }
}
