use std::borrow::Cow;

/// Rewrites the identifiers the transpiler emits into C.
pub trait Mangler {
    fn mangle<'a>(&self, name: &'a str) -> Cow<'a, str>;
}

/// Leaves names untouched. Used when mangling is disabled.
#[derive(Copy, Clone, Debug, Default)]
pub struct Identity;

impl Mangler for Identity {
    fn mangle<'a>(&self, name: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(name)
    }
}

/// Prefixes every name with [`Prefixed::PREFIX`].
#[derive(Copy, Clone, Debug, Default)]
pub struct Prefixed;

impl Prefixed {
    pub const PREFIX: &'static str = "k_";
}

impl Mangler for Prefixed {
    fn mangle<'a>(&self, name: &'a str) -> Cow<'a, str> {
        Cow::Owned(format!("{}{name}", Self::PREFIX))
    }
}

/// Picks the mangler matching the `mangle` setting.
pub fn for_config(enabled: bool) -> &'static dyn Mangler {
    if enabled {
        &Prefixed
    } else {
        &Identity
    }
}
