pub mod error;
pub mod health;

use alloc::borrow::Cow;

use serde::Serialize;

/// The `{"error": "..."}` body every non-stream failure is reported with.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: Cow<'static, str>,
}

impl ErrorBody {
    #[inline]
    pub const fn from_static(error: &'static str) -> Self { Self { error: Cow::Borrowed(error) } }

    #[inline]
    pub fn new(error: impl Into<Cow<'static, str>>) -> Self { Self { error: error.into() } }
}
