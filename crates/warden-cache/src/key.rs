use std::fmt::Write as _;

/// Canonical textual form of one call argument.
pub trait KeyPart {
    fn write_part(&self, out: &mut String);
}

macro_rules! display_key_part {
    ($($ty:ty),* $(,)?) => {
        $(
            impl KeyPart for $ty {
                fn write_part(&self, out: &mut String) {
                    let _ = write!(out, "{self}");
                }
            }
        )*
    };
}

display_key_part!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, bool);

impl KeyPart for char {
    fn write_part(&self, out: &mut String) {
        let _ = write!(out, "{self:?}");
    }
}

impl KeyPart for str {
    fn write_part(&self, out: &mut String) {
        let _ = write!(out, "{self:?}");
    }
}

impl KeyPart for String {
    fn write_part(&self, out: &mut String) {
        self.as_str().write_part(out);
    }
}

impl<T: KeyPart> KeyPart for Option<T> {
    fn write_part(&self, out: &mut String) {
        match self {
            Some(value) => {
                out.push_str("Some(");
                value.write_part(out);
                out.push(')');
            }
            None => out.push_str("None"),
        }
    }
}

impl<T: KeyPart + ?Sized> KeyPart for &T {
    fn write_part(&self, out: &mut String) {
        (**self).write_part(out);
    }
}

/// Argument without a meaningful textual form. Every value of `T` collapses
/// to the same `<path::Type>` placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Opaque<T>(pub T);

impl<T> KeyPart for Opaque<T> {
    fn write_part(&self, out: &mut String) {
        let _ = write!(out, "<{}>", std::any::type_name::<T>());
    }
}

/// Collects the parts of one cache key.
#[derive(Debug)]
pub struct KeyBuilder {
    raw: String,
}

impl KeyBuilder {
    #[must_use]
    pub fn new(callable: &str) -> Self {
        Self {
            raw: callable.to_owned(),
        }
    }

    pub fn arg<P: KeyPart + ?Sized>(&mut self, part: &P) -> &mut Self {
        self.raw.push(':');
        part.write_part(&mut self.raw);
        self
    }

    pub fn kwarg<P: KeyPart + ?Sized>(&mut self, name: &str, value: &P) -> &mut Self {
        self.arg(name);
        self.arg(value)
    }

    #[must_use]
    pub fn finish(self) -> CacheKey {
        CacheKey { raw: self.raw }
    }
}

/// Argument list of a cached function.
pub trait KeyArgs {
    fn write_key(&self, key: &mut KeyBuilder);
}

impl KeyArgs for () {
    fn write_key(&self, _key: &mut KeyBuilder) {}
}

macro_rules! tuple_key_args {
    ($($name:ident),+) => {
        impl<$($name: KeyPart),+> KeyArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn write_key(&self, key: &mut KeyBuilder) {
                let ($($name,)+) = self;
                $(key.arg($name);)+
            }
        }
    };
}

tuple_key_args!(A);
tuple_key_args!(A, B);
tuple_key_args!(A, B, C);
tuple_key_args!(A, B, C, D);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    raw: String,
}

impl CacheKey {
    #[must_use]
    pub fn build<A: KeyArgs + ?Sized>(callable: &str, args: &A) -> Self {
        let mut builder = KeyBuilder::new(callable);
        args.write_key(&mut builder);
        builder.finish()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub(crate) fn into_string(self) -> String {
        self.raw
    }
}

impl core::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.raw)
    }
}
