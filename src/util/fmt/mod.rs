pub mod diagnostic;
pub mod tree;

/// The source a diagnostic refers to.
pub struct Context<'src> {
    pub file_name: &'src str,
    pub src: &'src str,
}

impl<'src> Context<'src> {
    pub fn new(file_name: &'src str, src: &'src str) -> Context<'src> {
        Context { file_name, src }
    }

    /// Returns the 1-based `line` of the source, without its terminator.
    pub fn line(&self, line: u32) -> Option<&'src str> {
        let index = usize::try_from(line.checked_sub(1)?).ok()?;
        self.src.lines().nth(index)
    }
}

/// Analogous to [`std::fmt::Display`], but also receives the source the value
/// refers to.
pub trait Show {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result;

    /// Returns a type which can be displayed.
    fn display<'a>(&'a self, ctx: &'a Context<'_>) -> impl std::fmt::Display + 'a
    where
        Self: Sized,
    {
        Display(self, ctx)
    }
}

struct Display<'this, 'ctx, 'src, T: Show>(&'this T, &'ctx Context<'src>);

impl<T> std::fmt::Display for Display<'_, '_, '_, T>
where
    T: Show,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Display(this, ctx) = self;
        this.show(f, ctx)
    }
}
