//! Entry points: render a [`Template`] into one document or a list of them.
//!
//! Each call runs one linear pass:
//!
//! ```text
//! plan markers -> parse -> count markers -> interpolate -> adapt shape
//! ```
//!
//! Nothing is cached between calls and no partial result is returned on
//! error.

use std::sync::Arc;

use bson::{Bson, Document};
use extplate_bson::Parser;
use once_cell::sync::Lazy;

use crate::encode::Registry;
use crate::error::{Result, TemplateError};
use crate::interpolate::Interpolator;
use crate::sentinel::marker_text;
use crate::template::Template;

/// Field name of the synthetic wrapper used in list mode.
const LIST_FIELD: &str = "w";

static DEFAULT_REGISTRY: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::new()));

/// Renders a template into a single document using the default registry.
///
/// ```
/// use extplate::{ext_json, template, doc};
///
/// let result = ext_json(&template!("{ ", "k1", ": 1 }")).unwrap();
/// assert_eq!(result, doc! { "k1": 1 });
/// ```
pub fn ext_json(template: &Template) -> Result<Document> {
    ExtJson::new().process(template)
}

/// Renders an array-of-documents template using the default registry.
///
/// ```
/// use extplate::{ext_json_list, template, doc};
///
/// let result = ext_json_list(&template!("[{k1: ", 1, "}, {k1: ", 2, "}]")).unwrap();
/// assert_eq!(result, vec![doc! { "k1": 1 }, doc! { "k1": 2 }]);
/// ```
pub fn ext_json_list(template: &Template) -> Result<Vec<Document>> {
    ExtJson::new().process_list(template)
}

/// A template processor bound to an encoder [`Registry`].
///
/// Cheap to clone and safe to share across threads.
#[derive(Debug, Clone)]
pub struct ExtJson {
    registry: Arc<Registry>,
}

impl ExtJson {
    /// A processor using the shared default registry.
    pub fn new() -> Self {
        Self {
            registry: Arc::clone(&DEFAULT_REGISTRY),
        }
    }

    /// A processor using the given registry.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Renders a template whose text is a single document.
    pub fn process(&self, template: &Template) -> Result<Document> {
        let text = marker_text(template.fragments());
        tracing::debug!(
            placeholders = template.placeholder_count(),
            text_len = text.len(),
            "processing document template"
        );

        match self.render(&text, template)? {
            Bson::Document(doc) => Ok(doc),
            other => Err(TemplateError::StructuralMismatch(format!(
                "expected a document at the root, found {:?}",
                other.element_type()
            ))),
        }
    }

    /// Renders a template whose text is an array of documents, returning the
    /// documents in array order.
    pub fn process_list(&self, template: &Template) -> Result<Vec<Document>> {
        let text = format!("{{ {}: {} }}", LIST_FIELD, marker_text(template.fragments()));
        tracing::debug!(
            placeholders = template.placeholder_count(),
            text_len = text.len(),
            "processing list template"
        );

        let mut wrapper = match self.render(&text, template)? {
            Bson::Document(doc) => doc,
            other => {
                return Err(TemplateError::StructuralMismatch(format!(
                    "expected the list wrapper document, found {:?}",
                    other.element_type()
                )))
            }
        };

        let items = match wrapper.remove(LIST_FIELD) {
            Some(Bson::Array(items)) => items,
            Some(other) => {
                return Err(TemplateError::StructuralMismatch(format!(
                    "expected an array at the root, found {:?}",
                    other.element_type()
                )))
            }
            None => {
                return Err(TemplateError::StructuralMismatch(
                    "expected an array at the root".to_string(),
                ))
            }
        };
        if !wrapper.is_empty() {
            return Err(TemplateError::StructuralMismatch(
                "unexpected content after the root array".to_string(),
            ));
        }

        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Bson::Document(doc) => Ok(doc),
                other => Err(TemplateError::StructuralMismatch(format!(
                    "list element {} is {:?}, expected a document",
                    i,
                    other.element_type()
                ))),
            })
            .collect()
    }

    /// Parses marker text and binds every marker to its value.
    fn render(&self, text: &str, template: &Template) -> Result<Bson> {
        let tree = Parser::new(text).parse_node()?;
        let value = Interpolator::new(template.values(), &self.registry).run(tree)?;
        tracing::debug!(consumed = template.placeholder_count(), "interpolation complete");
        Ok(value)
    }
}

impl Default for ExtJson {
    fn default() -> Self {
        Self::new()
    }
}
