use async_trait::async_trait;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("transform failed: {0}")]
    Transform(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Stylesheet parameters, passed through to the processor untouched.
pub type TransformParams = serde_json::Map<String, serde_json::Value>;

/// Opaque parsed document. Only the processor that produced it can look inside.
#[derive(Clone)]
pub struct DocumentHandle {
    inner: Arc<dyn Any + Send + Sync>,
}

impl DocumentHandle {
    pub fn new<T: Any + Send + Sync>(document: T) -> Self {
        Self {
            inner: Arc::new(document),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DocumentHandle(..)")
    }
}

/// Snapshot of a selected element or attribute.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub text: Option<String>,
}

impl Node {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attribute_f64(&self, name: &str) -> Option<f64> {
        self.attribute(name)?.trim().parse().ok()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryResult {
    Empty,
    Boolean(bool),
    Number(f64),
    Text(String),
    Nodes(Vec<Node>),
}

impl QueryResult {
    /// Effective boolean value: non-empty selections and strings are true.
    pub fn as_bool(&self) -> bool {
        match self {
            QueryResult::Empty => false,
            QueryResult::Boolean(value) => *value,
            QueryResult::Number(value) => *value != 0.0 && !value.is_nan(),
            QueryResult::Text(text) => !text.is_empty(),
            QueryResult::Nodes(nodes) => !nodes.is_empty(),
        }
    }

    /// String value of the result, or of the first selected node.
    pub fn first_value(&self) -> Option<String> {
        match self {
            QueryResult::Empty => None,
            QueryResult::Boolean(value) => Some(value.to_string()),
            QueryResult::Number(value) => Some(value.to_string()),
            QueryResult::Text(text) => Some(text.clone()),
            QueryResult::Nodes(nodes) => nodes.first().and_then(|node| node.text.clone()),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        match self {
            QueryResult::Nodes(nodes) => nodes,
            _ => &[],
        }
    }
}

/// Tree transform and query engine used to unroll scores and derive timemaps.
#[async_trait]
pub trait TransformProcessor: Send + Sync {
    async fn parse(&self, source: &str) -> Result<DocumentHandle, TransformError>;

    fn query(&self, path: &str, document: &DocumentHandle) -> Result<QueryResult, TransformError>;

    async fn transform(
        &self,
        template: &str,
        source: &str,
        params: &TransformParams,
    ) -> Result<String, TransformError>;
}
