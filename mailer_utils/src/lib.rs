pub use mailer_utils_derive::trace_instrument;

mod macros;

/// Returns the version of this workspace.
pub const fn mailer_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub trait Apply {
    /// Applies the function `f` with a mutable reference to `self`.
    fn with<X>(mut self, f: impl FnOnce(&mut Self) -> X) -> Self
    where
        Self: Sized,
    {
        f(&mut self);
        self
    }

    /// Applies the function `f` only if `value` is `Some(...)` and provides the
    /// contained value to `f`.
    ///
    /// #### Example
    /// ```rust
    /// # use mailer_utils::Apply;
    /// fn add_option(a: i32, b: Option<i32>) -> i32 {
    ///     a.apply_map(b, |slf, arg| slf + arg)
    /// }
    /// assert_eq!(add_option(1, None), 1);
    /// assert_eq!(add_option(1, Some(2)), 3);
    /// ```
    fn apply_map<U>(self, value: Option<U>, f: impl FnOnce(Self, U) -> Self) -> Self
    where
        Self: Sized,
    {
        if let Some(value) = value {
            f(self, value)
        } else {
            self
        }
    }
}

impl<T> Apply for T {}

/// Access to optional strings that treats empty strings like `None`.
pub trait Filled {
    /// Returns the contained string if it is present and not empty.
    ///
    /// #### Example
    /// ```rust
    /// # use mailer_utils::Filled;
    /// assert_eq!(Some("x".to_owned()).filled(), Some("x"));
    /// assert_eq!(Some(String::new()).filled(), None);
    /// assert_eq!(None::<String>.filled(), None);
    /// ```
    fn filled(&self) -> Option<&str>;

    fn is_filled(&self) -> bool {
        self.filled().is_some()
    }
}

impl Filled for Option<String> {
    fn filled(&self) -> Option<&str> {
        self.as_deref().filter(|s| !s.is_empty())
    }
}

impl Filled for Option<&str> {
    fn filled(&self) -> Option<&str> {
        self.filter(|s| !s.is_empty())
    }
}

impl Filled for String {
    fn filled(&self) -> Option<&str> {
        (!self.is_empty()).then_some(self.as_str())
    }
}
