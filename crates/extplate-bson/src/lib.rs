//! Relaxed Extended JSON reader producing [`bson`] values.
//!
//! The `bson` crate reads strict Extended JSON only. Templates are written
//! the way the Mongo shell writes them, with bare keys, single quotes and
//! constructor calls, so this crate supplies a reader for that dialect. It
//! builds ordinary [`bson::Bson`] and [`bson::Document`] values that any Rust
//! Mongo tooling accepts.
//!
//! # Example
//!
//! ```rust
//! use extplate_bson::parse_document;
//!
//! let parsed = parse_document(r#"{ name: 'widget', qty: 3, id: ObjectId("5f1d7f3a9b1e8a3c4d2e1f00") }"#).unwrap();
//! assert_eq!(parsed.get_str("name").unwrap(), "widget");
//! assert_eq!(parsed.get_i32("qty").unwrap(), 3);
//! assert!(parsed.get_object_id("id").is_ok());
//! ```
//!
//! # Text Syntax
//!
//! The reader accepts strict JSON plus:
//!
//! | Form | Example |
//! |------|---------|
//! | Unquoted keys | `{ k1: 1 }` |
//! | Single-quoted strings | `{ 'k': 'v' }` |
//! | Non-finite doubles | `NaN`, `Infinity`, `-Infinity` |
//! | Type wrappers | `{"$oid": ".."}`, `{"$numberLong": ".."}`, `{"$date": ..}`, `{"$binary": ..}`, `{"$uuid": ..}` |
//! | Shell constructors | `ObjectId("..")`, `NumberLong(1)`, `ISODate("..")`, `UUID("..")` |
//!
//! Integers narrow to `Int32` when they fit and widen to `Int64` otherwise.
//! Nesting is limited to [`DEFAULT_MAX_DEPTH`] levels unless
//! [`Parser::max_depth`] says otherwise.

mod error;
mod node;
mod parser;

pub use error::ParseError;
pub use node::Node;
pub use parser::{parse, parse_document, Parser, DEFAULT_MAX_DEPTH};

pub use bson;
