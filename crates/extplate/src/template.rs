//! Template capture: literal fragments interleaved with host values.
//!
//! A [`Template`] is two sequences: the literal text fragments and the
//! values that go between them, in source order. There is always exactly one
//! more fragment than there are values; the first and last fragments may be
//! empty.
//!
//! ```text
//! "{ " <value 0> ": 1, k2: " <value 1> " }"
//!  ^fragment 0   ^fragment 1            ^fragment 2
//! ```
//!
//! Three ways to build one:
//!
//! ```rust
//! use extplate::{template, Arg, Template};
//!
//! // Positional macro: fragment, value, fragment, value, fragment...
//! let a = template!("{ ", "k1", ": 1, k2: ", 2, " }");
//!
//! // Builder
//! let b = Template::builder().text("{ ").value("k1").text(": 1, k2: ").value(2).text(" }").build();
//!
//! // Explicit sequences, checked
//! let c = Template::new(
//!     vec!["{ ".into(), ": 1, k2: ".into(), " }".into()],
//!     vec![Arg::new("k1"), Arg::new(2)],
//! ).unwrap();
//!
//! assert_eq!(a.fragments(), b.fragments());
//! assert_eq!(b.fragments(), c.fragments());
//! ```

use std::any::{type_name, Any};
use std::fmt;

use serde::Serialize;

use crate::encode::EncodeError;
use crate::error::{Result, TemplateError};

/// One captured host value, type-erased until a registry encodes it.
///
/// `Arg` remembers the name of the type it was created from so that a
/// missing encoder can be reported by name.
pub struct Arg {
    value: Option<Box<dyn Any + Send + Sync>>,
    type_name: &'static str,
}

impl Arg {
    /// Captures a value. Passing an `Arg` returns it unchanged.
    ///
    /// The value is moved into the `Arg`, so it must own its data: string
    /// literals work, but a borrowed `&String` or a non-literal `&str` must
    /// be passed as `s.clone()` or `s.to_string()`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        let boxed: Box<dyn Any + Send + Sync> = Box::new(value);
        match boxed.downcast::<Arg>() {
            Ok(arg) => *arg,
            Err(boxed) => Self {
                value: Some(boxed),
                type_name: type_name::<T>(),
            },
        }
    }

    /// A null value; always encodes to `Bson::Null`.
    pub fn null() -> Self {
        Self {
            value: None,
            type_name: "null",
        }
    }

    /// Captures `Some(value)` as the value and `None` as null.
    pub fn from_option<T: Any + Send + Sync>(value: Option<T>) -> Self {
        value.map_or_else(Arg::null, Arg::new)
    }

    /// Captures any serializable value as a `serde_json::Value`.
    pub fn serialized<T: Serialize + ?Sized>(value: &T) -> std::result::Result<Self, EncodeError> {
        Ok(Arg::new(serde_json::to_value(value)?))
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Name of the captured type, or `"null"`.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The captured value, or `None` for null.
    pub fn value(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.value.as_deref()
    }

    /// Borrows the captured value as `T`, if that is its type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Arg<{}>", self.type_name)
    }
}

/// Literal fragments plus the values placed between them.
#[derive(Debug)]
pub struct Template {
    fragments: Vec<String>,
    values: Vec<Arg>,
}

impl Template {
    /// Builds a template from explicit sequences.
    ///
    /// Fails with [`TemplateError::FragmentCountMismatch`] unless
    /// `fragments.len() == values.len() + 1`.
    pub fn new(fragments: Vec<String>, values: Vec<Arg>) -> Result<Self> {
        if fragments.len() != values.len() + 1 {
            return Err(TemplateError::FragmentCountMismatch {
                fragments: fragments.len(),
                values: values.len(),
            });
        }
        Ok(Self { fragments, values })
    }

    /// A template with no placeholders.
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![text.into()],
            values: Vec::new(),
        }
    }

    pub fn builder() -> TemplateBuilder {
        TemplateBuilder::default()
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn values(&self) -> &[Arg] {
        &self.values
    }

    /// Number of placeholder sites.
    pub fn placeholder_count(&self) -> usize {
        self.values.len()
    }

    #[doc(hidden)]
    pub fn __from_macro(fragments: Vec<String>, values: Vec<Arg>) -> Self {
        debug_assert_eq!(fragments.len(), values.len() + 1);
        Self { fragments, values }
    }
}

/// Incremental [`Template`] construction.
///
/// Text is appended to the current fragment; each value closes the current
/// fragment and opens a new, empty one. Two values in a row are therefore
/// separated by an empty fragment, and the fragment invariant always holds.
#[derive(Debug)]
pub struct TemplateBuilder {
    fragments: Vec<String>,
    values: Vec<Arg>,
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self {
            fragments: vec![String::new()],
            values: Vec::new(),
        }
    }
}

impl TemplateBuilder {
    pub fn text(mut self, text: &str) -> Self {
        if let Some(current) = self.fragments.last_mut() {
            current.push_str(text);
        }
        self
    }

    pub fn value<T: Any + Send + Sync>(self, value: T) -> Self {
        self.arg(Arg::new(value))
    }

    pub fn null(self) -> Self {
        self.arg(Arg::null())
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.values.push(arg);
        self.fragments.push(String::new());
        self
    }

    pub fn build(self) -> Template {
        Template {
            fragments: self.fragments,
            values: self.values,
        }
    }
}

/// Builds a [`Template`] from alternating fragments and values.
///
/// Arguments in odd positions (first, third, ...) are literal fragments; the
/// ones between them are values. The list must start and end with a
/// fragment.
///
/// ```
/// use extplate::{template, Arg};
///
/// let t = template!("{ k1: ", Arg::null(), ", k2: ", 2.5, " }");
/// assert_eq!(t.placeholder_count(), 2);
/// assert!(t.values()[0].is_null());
/// ```
///
/// Values are captured with [`Arg::new`] and so must be `'static`. Borrowed
/// strings are passed owned; `Option` values are fine as they are and
/// render as null or as their inner value.
///
/// ```
/// use extplate::{doc, ext_json, template};
///
/// let field = String::from("status");
/// let limit: Option<i32> = None;
/// let query = ext_json(&template!("{ ", field.clone(), ": 'active', limit: ", limit, " }")).unwrap();
/// assert_eq!(query, doc! { "status": "active", "limit": null });
/// ```
///
/// Passing `&field` instead does not compile, because the borrow is not
/// `'static`:
///
/// ```compile_fail
/// use extplate::template;
///
/// let field = String::from("status");
/// let _ = template!("{ ", &field, ": 1 }");
/// ```
#[macro_export]
macro_rules! template {
    ($first:expr $(, $value:expr, $fragment:expr)*) => {
        $crate::Template::__from_macro(
            vec![::std::string::String::from($first) $(, ::std::string::String::from($fragment))*],
            vec![$($crate::Arg::new($value)),*],
        )
    };
}
