//! Owned, typed syntax tree that path signatures are resolved against.
//!
//! Nodes use ESTree kind and field names so that dotted paths written
//! against ESTree-shaped output (`body.0.expression.arguments`) resolve
//! the same way here.

/// Byte range of a node in the original bundle text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Leaf values carried by nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

/// Contents of a node field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Node(Box<SyntaxNode>),
    /// Array-like children. `None` marks a hole (`[a,,b]`).
    NodeList(Vec<Option<SyntaxNode>>),
    /// Object literal members, in source order.
    PropertyList(Vec<SyntaxNode>),
    Scalar(Scalar),
}

impl Value {
    pub fn node(node: SyntaxNode) -> Self {
        Value::Node(Box::new(node))
    }

    pub fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    pub fn str(value: impl Into<String>) -> Self {
        Value::Scalar(Scalar::Str(value.into()))
    }

    /// Short description used in log output.
    pub fn describe(&self) -> &'static str {
        match self {
            Value::Node(_) => "node",
            Value::NodeList(_) => "node list",
            Value::PropertyList(_) => "property list",
            Value::Scalar(_) => "scalar",
        }
    }
}

/// A node of the syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub kind: &'static str,
    pub span: Span,
    fields: Vec<(&'static str, Value)>,
}

impl SyntaxNode {
    pub fn new(kind: &'static str, span: Span) -> Self {
        Self {
            kind,
            span,
            fields: Vec::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: &'static str, value: Value) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &'static str, value: Value) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(n, _)| *n)
    }

    pub fn is_leaf(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup() {
        let node = SyntaxNode::new("Identifier", Span::new(0, 3)).with("name", Value::str("foo"));

        assert_eq!(
            node.field("name"),
            Some(&Value::Scalar(Scalar::Str("foo".to_string())))
        );
        assert!(node.field("missing").is_none());
        assert!(!node.is_leaf());
    }

    #[test]
    fn test_set_replaces_existing_field() {
        let mut node = SyntaxNode::new("ReturnStatement", Span::new(0, 7));
        node.set("argument", Value::null());
        node.set("argument", Value::str("x"));

        assert_eq!(node.field_names().count(), 1);
        assert_eq!(node.field("argument"), Some(&Value::str("x")));
    }

    #[test]
    fn test_span_len() {
        assert_eq!(Span::new(4, 10).len(), 6);
        assert!(Span::new(5, 5).is_empty());
        assert_eq!(Span::new(9, 3).len(), 0);
    }
}
