use std::fmt::{self, Write};

use crate::{
    diagnostic::{Diagnostic, Diagnostics, Level},
    util::fmt::{Context, Show},
};

/// `{}` renders the diagnostic with its source line and a caret underline;
/// `{:#}` renders a single `file:line:col: level[code]: message` line.
impl Show for Diagnostic {
    fn show(&self, f: &mut fmt::Formatter<'_>, ctx: &Context<'_>) -> fmt::Result {
        let start = self.span.start;

        if f.alternate() {
            write!(f, "{}:{start}: ", ctx.file_name)?;
            write_header(f, self)?;
            return Ok(());
        }

        write_header(f, self)?;
        writeln!(f)?;

        let line_no = start.line.to_string();
        let gutter = " ".repeat(line_no.len());
        writeln!(f, "{gutter}--> {}:{start}", ctx.file_name)?;

        if let Some(line) = ctx.line(start.line) {
            let column = usize::try_from(start.column.saturating_sub(1)).unwrap_or_default();
            let width = usize::try_from(self.span.length()).unwrap_or(1);
            writeln!(f, "{gutter} |")?;
            writeln!(f, "{line_no} | {line}")?;
            writeln!(f, "{gutter} | {:column$}{}", "", "^".repeat(width))?;
        }

        if let Some(hint) = &self.hint {
            writeln!(f, "{gutter} = hint: {hint}")?;
        }
        for note in &self.notes {
            writeln!(f, "{gutter} = note: {note}")?;
        }
        Ok(())
    }
}

fn write_header(f: &mut fmt::Formatter<'_>, diagnostic: &Diagnostic) -> fmt::Result {
    write!(f, "{}", diagnostic.level)?;
    if let Some(code) = diagnostic.code {
        write!(f, "[{code}]")?;
    }
    write!(f, ": {}", diagnostic.message)
}

/// Renders every diagnostic, separated by blank lines.
pub fn render_all(diagnostics: &Diagnostics, ctx: &Context<'_>) -> String {
    let mut out = String::new();
    for (i, diagnostic) in diagnostics.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        // Writing to a `String` can't fail.
        let _ = write!(out, "{}", diagnostic.display(ctx));
    }
    out
}

/// The closing line printed after a compilation's diagnostics, e.g.
/// `error: compilation failed with 2 errors and 1 warning`.
pub fn summary(diagnostics: &Diagnostics) -> String {
    let errors = diagnostics.count(Level::Error);
    let warnings = diagnostics.count(Level::Warning);
    let plural = |n: usize, what: &str| {
        if n == 1 {
            format!("1 {what}")
        } else {
            format!("{n} {what}s")
        }
    };

    match (errors, warnings) {
        (0, 0) => "compilation finished without diagnostics".to_string(),
        (0, w) => format!("compilation finished with {}", plural(w, "warning")),
        (e, 0) => format!("error: compilation failed with {}", plural(e, "error")),
        (e, w) => format!(
            "error: compilation failed with {} and {}",
            plural(e, "error"),
            plural(w, "warning")
        ),
    }
}
