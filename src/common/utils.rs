mod sealed {
    pub trait Sealed: Sized + 'static {}

    impl Sealed for bool {}
    impl Sealed for String {}
}

/// Values that can be read from an environment-style `KEY=value` source.
///
/// Blank values fall back to the default, as do values that fail to parse.
pub trait ParseFromEnv: sealed::Sealed {
    fn parse_value(value: &str) -> Option<Self>;
}

impl ParseFromEnv for bool {
    #[inline]
    fn parse_value(value: &str) -> Option<bool> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        }
    }
}

impl ParseFromEnv for String {
    #[inline]
    fn parse_value(value: &str) -> Option<String> { Some(value.to_owned()) }
}

macro_rules! impl_parse_num_from_env {
    ($($ty:ty)*) => {
        $(
            impl sealed::Sealed for $ty {}
            impl ParseFromEnv for $ty {
                #[inline]
                fn parse_value(value: &str) -> Option<$ty> { value.parse().ok() }
            }
        )*
    };
}

impl_parse_num_from_env!(u16 u32 u64 usize);

/// Reads `key` from `lookup`, trimming surrounding whitespace.
///
/// Returns `None` for absent or blank values.
#[inline]
pub fn lookup_trimmed<L>(lookup: L, key: &str) -> Option<String>
where L: Fn(&str) -> Option<String> {
    let value = lookup(key)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_owned())
    }
}

#[inline]
pub fn parse_from_lookup<T, L>(lookup: L, key: &str, default: T) -> T
where
    T: ParseFromEnv,
    L: Fn(&str) -> Option<String>,
{
    lookup_trimmed(lookup, key).and_then(|v| T::parse_value(&v)).unwrap_or(default)
}
