//! Value encoding: turning captured host values into [`Bson`] nodes.
//!
//! A [`Registry`] holds an ordered list of [`Encoder`]s. To encode a value the
//! registry asks each encoder in turn whether it can handle the value's type
//! and uses the first one that says yes. Encoders registered by the caller are
//! consulted before the built-ins, most recent first, so a registration can
//! override how an existing type is encoded.
//!
//! Every encoder registered for a type `T` also handles `Option<T>`:
//! `None` encodes to null and `Some(v)` encodes like `v`.
//!
//! # Built-in Encoders
//!
//! | Rust type | BSON type |
//! |-----------|-----------|
//! | `String`, `&'static str`, `char` | string |
//! | `bool` | boolean |
//! | `i8`, `i16`, `i32`, `u8`, `u16` | int32 |
//! | `i64`, `u32`, `isize` | int64 |
//! | `u64`, `usize` | int64, or an overflow error |
//! | `f32`, `f64` | double |
//! | `Bson`, `Document`, `ObjectId`, `Binary`, `DateTime`, `Timestamp`, `Regex` | as-is |
//! | `chrono::DateTime<Utc>` | datetime |
//! | `uuid::Uuid`, `bson::Uuid` | binary, laid out per the registry's [`UuidRepresentation`] |
//! | `Vec<u8>` | binary (generic subtype) |
//! | `Vec<Bson>`, `Vec<String>`, `Vec<i32>`, `Vec<i64>`, `Vec<f64>` | array |
//! | `serde_json::Value` | converted structurally |
//! | `Option<T>` for any of the above | null, or as `T` |
//!
//! # Example
//!
//! ```rust
//! use extplate::encode::{Registry, UuidRepresentation};
//! use extplate::{Arg, Bson};
//!
//! struct Celsius(f64);
//!
//! let registry = Registry::new()
//!     .with_uuid_representation(UuidRepresentation::Standard)
//!     .register::<Celsius, _>(|c, _| Ok(Bson::Double(c.0)));
//!
//! assert_eq!(registry.encode(&Arg::new(Celsius(21.5))).unwrap(), Bson::Double(21.5));
//! assert_eq!(registry.encode(&Arg::new(None::<Celsius>)).unwrap(), Bson::Null);
//! ```

mod builtin;

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bson::Bson;
use serde::de::Deserializer;
use serde::Deserialize;
use thiserror::Error;

use crate::template::Arg;

pub use bson::uuid::UuidRepresentation;

/// Errors raised by encoders.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// No encoder accepts this type.
    #[error("no encoder registered for type {type_name}")]
    UnsupportedType { type_name: &'static str },

    /// The encoder exists but the registry is not configured to use it.
    #[error("encoder configuration error: {0}")]
    Configuration(String),

    /// The value does not fit any BSON integer type.
    #[error("{value} of type {type_name} does not fit in a 64-bit signed integer")]
    Overflow {
        type_name: &'static str,
        value: String,
    },

    /// Capturing a value through serde failed.
    #[error("failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Settings that change how built-in encoders lay out values.
///
/// Deserializable so applications can keep it in their own configuration.
/// `uuidRepresentation` takes `"standard"`, `"javaLegacy"`, `"cSharpLegacy"`,
/// `"pythonLegacy"` or `"unspecified"`.
///
/// ```
/// use extplate::encode::{EncodeOptions, UuidRepresentation};
///
/// let options: EncodeOptions = serde_json::from_str(r#"{"uuidRepresentation": "javaLegacy"}"#).unwrap();
/// assert_eq!(options.uuid_representation, Some(UuidRepresentation::JavaLegacy));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncodeOptions {
    /// Binary layout for UUIDs. `None` makes encoding a UUID an error.
    #[serde(deserialize_with = "deserialize_uuid_representation")]
    pub uuid_representation: Option<UuidRepresentation>,
}

fn deserialize_uuid_representation<'de, D>(
    deserializer: D,
) -> Result<Option<UuidRepresentation>, D::Error>
where
    D: Deserializer<'de>,
{
    const NAMES: &[&str] = &[
        "unspecified",
        "standard",
        "javaLegacy",
        "cSharpLegacy",
        "pythonLegacy",
    ];
    let name = Option::<String>::deserialize(deserializer)?;
    match name.as_deref() {
        None | Some("unspecified") => Ok(None),
        Some("standard") => Ok(Some(UuidRepresentation::Standard)),
        Some("javaLegacy") => Ok(Some(UuidRepresentation::JavaLegacy)),
        Some("cSharpLegacy") => Ok(Some(UuidRepresentation::CSharpLegacy)),
        Some("pythonLegacy") => Ok(Some(UuidRepresentation::PythonLegacy)),
        Some(other) => Err(serde::de::Error::unknown_variant(other, NAMES)),
    }
}

/// Context passed to every [`Encoder::encode`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EncodeContext {
    options: EncodeOptions,
}

impl EncodeContext {
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    pub fn uuid_representation(&self) -> Option<UuidRepresentation> {
        self.options.uuid_representation
    }
}

/// Converts values of some host type into [`Bson`].
///
/// Implementations must agree with themselves: `encode` is only called with
/// values for which `can_encode` returned `true`.
pub trait Encoder: Send + Sync {
    /// Returns `true` if this encoder handles the value's type.
    fn can_encode(&self, value: &dyn Any) -> bool;

    /// Encodes the value.
    fn encode(&self, value: &dyn Any, context: &EncodeContext) -> Result<Bson, EncodeError>;
}

/// An [`Encoder`] for exactly one type `T`, backed by a function.
pub struct TypedEncoder<T, F> {
    f: F,
    _marker: PhantomData<fn(&T)>,
}

impl<T, F> TypedEncoder<T, F>
where
    T: Any,
    F: Fn(&T, &EncodeContext) -> Result<Bson, EncodeError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<T, F> Encoder for TypedEncoder<T, F>
where
    T: Any,
    F: Fn(&T, &EncodeContext) -> Result<Bson, EncodeError> + Send + Sync,
{
    fn can_encode(&self, value: &dyn Any) -> bool {
        value.is::<T>()
    }

    fn encode(&self, value: &dyn Any, context: &EncodeContext) -> Result<Bson, EncodeError> {
        match value.downcast_ref::<T>() {
            Some(typed) => (self.f)(typed, context),
            None => Err(EncodeError::UnsupportedType {
                type_name: type_name::<T>(),
            }),
        }
    }
}

/// Encoders for `T` and for `Option<T>`, both backed by `f`.
fn typed_pair<T, F>(f: F) -> [Arc<dyn Encoder>; 2]
where
    T: Any,
    F: Fn(&T, &EncodeContext) -> Result<Bson, EncodeError> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let optional = Arc::clone(&f);
    [
        Arc::new(TypedEncoder::<T, _>::new(
            move |value: &T, context: &EncodeContext| (*f)(value, context),
        )),
        Arc::new(TypedEncoder::<Option<T>, _>::new(
            move |value: &Option<T>, context: &EncodeContext| match value {
                Some(value) => (*optional)(value, context),
                None => Ok(Bson::Null),
            },
        )),
    ]
}

/// An ordered set of encoders plus the context they run with.
///
/// Cloning is cheap; encoders are shared.
#[derive(Clone)]
pub struct Registry {
    encoders: Vec<Arc<dyn Encoder>>,
    context: EncodeContext,
}

impl Registry {
    /// Creates a registry with the built-in encoders and default options.
    ///
    /// No [`UuidRepresentation`] is set, so encoding a UUID fails until one
    /// is chosen.
    pub fn new() -> Self {
        Self {
            encoders: builtin::encoders(),
            context: EncodeContext::default(),
        }
    }

    /// Creates a registry with no encoders at all. Only null values encode.
    pub fn empty() -> Self {
        Self {
            encoders: Vec::new(),
            context: EncodeContext::default(),
        }
    }

    /// Creates a registry with the built-in encoders and the given options.
    pub fn from_options(options: EncodeOptions) -> Self {
        Self::new().with_options(options)
    }

    pub fn with_options(mut self, options: EncodeOptions) -> Self {
        self.context = EncodeContext::new(options);
        self
    }

    /// Sets the binary layout used for `uuid::Uuid` values.
    pub fn with_uuid_representation(mut self, representation: UuidRepresentation) -> Self {
        self.context.options.uuid_representation = Some(representation);
        self
    }

    /// Registers a function encoder for `T` and `Option<T>`, taking
    /// precedence over earlier ones.
    pub fn register<T, F>(mut self, f: F) -> Self
    where
        T: Any,
        F: Fn(&T, &EncodeContext) -> Result<Bson, EncodeError> + Send + Sync + 'static,
    {
        for encoder in typed_pair(f) {
            self.encoders.insert(0, encoder);
        }
        self
    }

    /// Registers an encoder, taking precedence over earlier ones.
    pub fn register_encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.encoders.insert(0, Arc::new(encoder));
        self
    }

    pub fn context(&self) -> &EncodeContext {
        &self.context
    }

    /// Encodes a captured value. Null captures encode to [`Bson::Null`]
    /// without consulting any encoder.
    pub fn encode(&self, arg: &Arg) -> Result<Bson, EncodeError> {
        match arg.value() {
            None => Ok(Bson::Null),
            Some(value) => self.encode_any(value, arg.type_name()),
        }
    }

    /// Encodes a borrowed value of a concrete type.
    pub fn encode_value<T: Any>(&self, value: &T) -> Result<Bson, EncodeError> {
        self.encode_any(value, type_name::<T>())
    }

    fn encode_any(&self, value: &dyn Any, type_name: &'static str) -> Result<Bson, EncodeError> {
        let encoder = self
            .encoders
            .iter()
            .find(|encoder| encoder.can_encode(value))
            .ok_or(EncodeError::UnsupportedType { type_name })?;
        encoder.encode(value, &self.context)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("encoders", &self.encoders.len())
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, Document};

    struct Point {
        x: i32,
        y: i32,
    }

    fn point_registry() -> Registry {
        Registry::new().register::<Point, _>(|p, _| Ok(Bson::Document(doc! { "x": p.x, "y": p.y })))
    }

    #[test]
    fn null_skips_lookup() {
        assert_eq!(Registry::empty().encode(&Arg::null()).unwrap(), Bson::Null);
    }

    #[test]
    fn empty_registry_rejects_everything_else() {
        let err = Registry::empty().encode(&Arg::new(1i32)).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedType { type_name: "i32" }));
    }

    #[test]
    fn unknown_type_reports_its_name() {
        let err = Registry::new().encode(&Arg::new(Point { x: 0, y: 0 })).unwrap_err();
        match err {
            EncodeError::UnsupportedType { type_name } => assert!(type_name.ends_with("Point")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn registered_encoder_is_used() {
        let encoded = point_registry().encode(&Arg::new(Point { x: 1, y: 2 })).unwrap();
        assert_eq!(encoded, Bson::Document(doc! { "x": 1, "y": 2 }));
    }

    #[test]
    fn registered_encoder_covers_option() {
        let registry = point_registry();
        assert_eq!(registry.encode(&Arg::new(None::<Point>)).unwrap(), Bson::Null);
        assert_eq!(
            registry.encode(&Arg::new(Some(Point { x: 3, y: 4 }))).unwrap(),
            Bson::Document(doc! { "x": 3, "y": 4 })
        );
    }

    #[test]
    fn builtin_options() {
        let registry = Registry::new();
        assert_eq!(registry.encode_value(&None::<i32>).unwrap(), Bson::Null);
        assert_eq!(registry.encode_value(&Some(5i32)).unwrap(), Bson::Int32(5));
        assert_eq!(
            registry.encode_value(&Some(String::from("k"))).unwrap(),
            Bson::from("k")
        );
    }

    #[test]
    fn later_registration_overrides_builtin() {
        let registry = Registry::new().register::<i32, _>(|n, _| Ok(Bson::Int64(i64::from(*n))));
        assert_eq!(registry.encode_value(&5i32).unwrap(), Bson::Int64(5));
        assert_eq!(registry.encode_value(&Some(5i32)).unwrap(), Bson::Int64(5));
        // Other builtins are untouched.
        assert_eq!(registry.encode_value(&true).unwrap(), Bson::Boolean(true));
    }

    #[test]
    fn context_reaches_encoders() {
        let registry = Registry::empty()
            .with_uuid_representation(UuidRepresentation::Standard)
            .register::<(), _>(|_, ctx| Ok(Bson::from(format!("{:?}", ctx.uuid_representation()))));
        assert_eq!(registry.encode_value(&()).unwrap(), Bson::from("Some(Standard)"));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: EncodeOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.uuid_representation, None);
        let options: EncodeOptions =
            serde_json::from_str(r#"{"uuidRepresentation": "unspecified"}"#).unwrap();
        assert_eq!(options.uuid_representation, None);
        assert!(serde_json::from_str::<EncodeOptions>(r#"{"uuidRepresentation": "bigEndian"}"#).is_err());

        let registry = Registry::from_options(EncodeOptions {
            uuid_representation: Some(UuidRepresentation::CSharpLegacy),
        });
        assert_eq!(
            registry.context().uuid_representation(),
            Some(UuidRepresentation::CSharpLegacy)
        );
    }

    #[test]
    fn documents_encode_as_themselves() {
        let doc = doc! { "a": 1 };
        assert_eq!(
            Registry::new().encode(&Arg::new(doc.clone())).unwrap(),
            Bson::Document(doc)
        );
        let empty = Document::new();
        assert_eq!(
            Registry::new().encode_value(&empty).unwrap(),
            Bson::Document(Document::new())
        );
    }
}
