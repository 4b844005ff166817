//! The tree walk that replaces sentinel markers with encoded values.
//!
//! Markers are consumed in document order: for each object entry the key
//! first, then the value (recursively); for arrays, elements by index. That
//! order matches the left-to-right order of placeholders in the template
//! text, so the `n`th marker reached is bound to the `n`th value.
//!
//! Each call returns how many values its subtree consumed. A container
//! passes `start + consumed_so_far` to each child, so the cursor threads
//! through siblings without any shared mutable state.
//!
//! The walk reads the parser's raw [`Node`] tree, where two key markers in
//! one object are still separate entries, and builds [`Bson`] documents as
//! it goes. Rebuilt documents use `insert`, so a key produced twice keeps
//! its first position and takes the last value.

use bson::{Bson, Document};
use extplate_bson::Node;

use crate::encode::{EncodeError, Registry};
use crate::error::{Result, TemplateError};
use crate::sentinel::SENTINEL;
use crate::template::Arg;

/// A rewritten node and the number of values its subtree consumed.
#[derive(Debug)]
pub(crate) struct Interpolated {
    pub(crate) value: Bson,
    pub(crate) consumed: usize,
}

/// Number of markers in the tree, keys included.
pub(crate) fn count_markers(node: &Node) -> usize {
    match node {
        Node::Value(_) => usize::from(is_marker(node)),
        Node::Array(items) => items.iter().map(count_markers).sum(),
        Node::Document(entries) => entries
            .iter()
            .map(|(key, value)| usize::from(key == SENTINEL) + count_markers(value))
            .sum(),
    }
}

fn is_marker(node: &Node) -> bool {
    node.as_str() == Some(SENTINEL)
}

pub(crate) struct Interpolator<'a> {
    values: &'a [Arg],
    registry: &'a Registry,
}

impl<'a> Interpolator<'a> {
    pub(crate) fn new(values: &'a [Arg], registry: &'a Registry) -> Self {
        Self { values, registry }
    }

    /// Rewrites the whole tree after checking that it holds exactly one
    /// marker per value.
    pub(crate) fn run(&self, tree: Node) -> Result<Bson> {
        let markers = count_markers(&tree);
        if markers != self.values.len() {
            return Err(TemplateError::SentinelCountMismatch {
                markers,
                values: self.values.len(),
            });
        }
        let interpolated = self.interpolate(tree, 0)?;
        debug_assert_eq!(interpolated.consumed, markers);
        Ok(interpolated.value)
    }

    /// Rewrites `node`, binding its first marker to `values[start]`.
    pub(crate) fn interpolate(&self, node: Node, start: usize) -> Result<Interpolated> {
        if is_marker(&node) {
            return Ok(Interpolated {
                value: self.substitute(start)?,
                consumed: 1,
            });
        }
        match node {
            Node::Value(value) => Ok(Interpolated { value, consumed: 0 }),
            Node::Array(items) => self.array(items, start),
            Node::Document(entries) => self.document(entries, start),
        }
    }

    fn document(&self, entries: Vec<(String, Node)>, start: usize) -> Result<Interpolated> {
        let mut consumed = 0;
        let mut result = Document::new();
        for (key, value) in entries {
            let key = if key == SENTINEL {
                let key = self.substitute_key(start + consumed)?;
                consumed += 1;
                key
            } else {
                key
            };

            let value = self.interpolate(value, start + consumed)?;
            consumed += value.consumed;

            result.insert(key, value.value);
        }
        Ok(Interpolated {
            value: Bson::Document(result),
            consumed,
        })
    }

    fn array(&self, items: Vec<Node>, start: usize) -> Result<Interpolated> {
        let mut consumed = 0;
        let mut result = Vec::with_capacity(items.len());
        for item in items {
            let rewritten = self.interpolate(item, start + consumed)?;
            consumed += rewritten.consumed;
            result.push(rewritten.value);
        }
        Ok(Interpolated {
            value: Bson::Array(result),
            consumed,
        })
    }

    // `run` checks the count before walking, so only a direct `interpolate`
    // call can get here with too few values.
    fn arg(&self, index: usize) -> Result<&'a Arg> {
        self.values
            .get(index)
            .ok_or(TemplateError::SentinelCountMismatch {
                markers: index + 1,
                values: self.values.len(),
            })
    }

    fn substitute(&self, index: usize) -> Result<Bson> {
        let arg = self.arg(index)?;
        tracing::trace!(index, type_name = arg.type_name(), "substituting value");
        self.registry.encode(arg).map_err(|err| match err {
            EncodeError::UnsupportedType { type_name } => {
                TemplateError::UnsupportedValueType { index, type_name }
            }
            source => TemplateError::Encode { index, source },
        })
    }

    fn substitute_key(&self, index: usize) -> Result<String> {
        tracing::trace!(index, "substituting key");
        match self.substitute(index)? {
            Bson::String(key) => Ok(key),
            other => Err(TemplateError::InvalidKeyType {
                index,
                actual: other.element_type(),
            }),
        }
    }
}
