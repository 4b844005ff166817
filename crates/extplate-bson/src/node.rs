//! Raw parse tree.

use bson::spec::ElementType;
use bson::{Bson, Document};

/// A parsed value whose objects have not been merged into documents yet.
///
/// Objects keep every entry in source order, repeated keys included, so keys
/// can be rewritten before they are made unique. Extended JSON type wrappers
/// are already resolved into [`Node::Value`] leaves.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Value(Bson),
    Array(Vec<Node>),
    Document(Vec<(String, Node)>),
}

impl Node {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Value(Bson::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&[(String, Node)]> {
        match self {
            Node::Document(entries) => Some(entries),
            _ => None,
        }
    }

    /// The last value given for `key`, if this is an object.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries()?
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Node::Value(value) => value.element_type(),
            Node::Array(_) => ElementType::Array,
            Node::Document(_) => ElementType::EmbeddedDocument,
        }
    }

    /// Converts to a [`Bson`] tree. A repeated key keeps its first position
    /// and takes its last value.
    pub fn into_bson(self) -> Bson {
        match self {
            Node::Value(value) => value,
            Node::Array(items) => Bson::Array(items.into_iter().map(Node::into_bson).collect()),
            Node::Document(entries) => {
                let mut doc = Document::new();
                for (key, value) in entries {
                    doc.insert(key, value.into_bson());
                }
                Bson::Document(doc)
            }
        }
    }
}

impl From<Bson> for Node {
    fn from(value: Bson) -> Self {
        Node::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn entry(key: &str, n: i32) -> (String, Node) {
        (key.to_string(), Node::from(Bson::Int32(n)))
    }

    #[test]
    fn repeated_keys_merge_on_conversion() {
        let node = Node::Document(vec![entry("a", 1), entry("b", 2), entry("a", 3)]);
        let Bson::Document(doc) = node.into_bson() else {
            panic!("expected a document");
        };
        let keys: Vec<&String> = doc.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(doc, doc! { "a": 3, "b": 2 });
    }

    #[test]
    fn get_prefers_the_last_entry() {
        let node = Node::Document(vec![entry("a", 1), entry("a", 2)]);
        assert_eq!(node.get("a"), Some(&Node::from(Bson::Int32(2))));
        assert_eq!(node.get("b"), None);
        assert_eq!(Node::Array(vec![]).get("a"), None);
    }

    #[test]
    fn element_types() {
        assert_eq!(Node::Array(vec![]).element_type(), ElementType::Array);
        assert_eq!(Node::Document(vec![]).element_type(), ElementType::EmbeddedDocument);
        assert_eq!(Node::from(Bson::Null).element_type(), ElementType::Null);
        assert_eq!(Node::from(Bson::from("x")).as_str(), Some("x"));
    }
}
