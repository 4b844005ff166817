//! Error types for template processing.

use bson::spec::ElementType;
use extplate_bson::ParseError;
use thiserror::Error;

use crate::encode::EncodeError;

/// Errors raised while turning a template into documents.
///
/// Every error is final: processing stops at the first one and no partial
/// result is produced.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template was built with a fragment count other than values + 1.
    #[error("a template needs one more fragment than values: got {fragments} fragments for {values} values")]
    FragmentCountMismatch { fragments: usize, values: usize },

    /// The number of placeholder markers found in the parsed text differs from
    /// the number of values. Caused by template text that itself contains the
    /// reserved sentinel string, or by a placeholder inside a string literal.
    #[error(
        "found {markers} placeholder markers for {values} values; \
         the template text may contain the reserved sentinel string"
    )]
    SentinelCountMismatch { markers: usize, values: usize },

    /// A value interpolated in key position did not encode to a string.
    #[error("value {index} is used as a key but encodes to {actual:?}, not a string")]
    InvalidKeyType { index: usize, actual: ElementType },

    /// No encoder in the registry accepts the value's type.
    #[error("value {index} has type {type_name}, which has no registered encoder")]
    UnsupportedValueType {
        index: usize,
        type_name: &'static str,
    },

    /// An encoder accepted the value but failed to encode it.
    #[error("failed to encode value {index}")]
    Encode {
        index: usize,
        #[source]
        source: EncodeError,
    },

    /// The template text is not valid Extended JSON.
    #[error(transparent)]
    Syntax(#[from] ParseError),

    /// The rendered tree does not have the shape the entry point expects.
    #[error("unexpected document shape: {0}")]
    StructuralMismatch(String),
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;
