//! Extplate - Extended JSON templates rendered into typed BSON documents.
//!
//! Write a document in Extended JSON text, leave placeholders where keys or
//! values should go, and supply the values at runtime. Values keep their
//! types: an `i64` becomes an `Int64`, a `Uuid` becomes binary, a `Document`
//! is spliced in as a nested document. Nothing is formatted into text and
//! re-parsed, so values cannot break the template's syntax.
//!
//! # Quick Start
//!
//! ```rust
//! use extplate::{doc, ext_json, template, Bson};
//!
//! let field = "status";
//! let min_qty = 10i64;
//!
//! let filter = ext_json(&template!("{ ", field, ": 'active', qty: { $gte: ", min_qty, " } }")).unwrap();
//!
//! assert_eq!(
//!     filter,
//!     doc! { "status": "active", "qty": { "$gte": Bson::Int64(10) } }
//! );
//! ```
//!
//! # How It Works
//!
//! ```text
//! fragments + values
//!     -> marker text      every placeholder becomes the quoted SENTINEL string
//!     -> parsed tree      a normal Extended JSON parse
//!     -> interpolated     markers replaced, in document order, by encoded values
//!     -> Document / Vec<Document>
//! ```
//!
//! Placeholders in key position must encode to strings. Placeholders in
//! value position may encode to anything the [`Registry`] supports, including
//! null. An `Option<T>` is captured as null when `None` and as its inner value
//! when `Some`.
//!
//! Results are [`bson`] crate values. The reader in `extplate-bson` accepts
//! the relaxed, shell-flavoured text that templates are written in and
//! builds the same [`Document`] the driver sends.
//!
//! # Limits
//!
//! The marker is an ordinary string, so a template whose literal text
//! contains [`SENTINEL`] cannot be told apart from one with an extra
//! placeholder. That case is detected by counting markers against values and
//! reported as [`TemplateError::SentinelCountMismatch`]. Placeholders inside
//! string literals or type wrappers (`{"$oid": ...}`) are not supported; pass
//! the typed value instead.
//!
//! Captured values must be `'static`. A borrowed `&String` or a `&str` that
//! is not a literal has to be passed owned (`name.clone()`,
//! `name.to_string()`).
//!
//! Nesting deeper than [`DEFAULT_MAX_DEPTH`] levels is rejected as a
//! [`TemplateError::Syntax`] error.
//!
//! # Entry Points
//!
//! | Function | Text shape | Result |
//! |----------|------------|--------|
//! | [`ext_json`] | one document | `Document` |
//! | [`ext_json_list`] | array of documents | `Vec<Document>` |
//! | [`ExtJson::process`] | one document, custom registry | `Document` |
//! | [`ExtJson::process_list`] | array of documents, custom registry | `Vec<Document>` |

pub mod encode;
mod error;
mod interpolate;
mod processor;
mod sentinel;
mod template;

// Re-export public API
pub use encode::{EncodeError, EncodeOptions, Encoder, Registry, UuidRepresentation};
pub use error::{Result, TemplateError};
pub use processor::{ext_json, ext_json_list, ExtJson};
pub use sentinel::SENTINEL;
pub use template::{Arg, Template, TemplateBuilder};

pub use bson;
pub use bson::{doc, Bson, Document};
pub use extplate_bson::{parse_document, ParseError, DEFAULT_MAX_DEPTH};
