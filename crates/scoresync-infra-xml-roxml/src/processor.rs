use crate::path::{parse_path_query, LocationPath, Step};
use async_trait::async_trait;
use roxmltree::{Document, ParsingOptions};
use scoresync_ports::{
    DocumentHandle, Node, QueryResult, TransformError, TransformParams, TransformProcessor,
};
use std::collections::BTreeMap;

/// XML text that parsed cleanly. Queries re-parse it, since `roxmltree`
/// documents borrow their input.
struct ParsedXml {
    text: String,
}

/// Query-only `TransformProcessor` over `roxmltree`. Stylesheet transforms are
/// not available and report `Unsupported`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RoxmlProcessor;

impl RoxmlProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, xml: &str, expr: &str) -> Result<QueryResult, TransformError> {
        let query = parse_path_query(expr).map_err(|e| TransformError::Query(e.to_string()))?;
        let doc = parse_document(xml)?;

        let mut selected: Vec<(usize, Node)> = Vec::new();
        for path in &query.paths {
            for element in select(&doc, path) {
                let order = element.range().start;
                match &path.attribute {
                    Some(attr) => {
                        if let Some(value) = element.attribute(attr.as_str()) {
                            selected.push((
                                order,
                                Node {
                                    name: format!("@{attr}"),
                                    attributes: BTreeMap::new(),
                                    text: Some(value.to_string()),
                                },
                            ));
                        }
                    }
                    None => selected.push((order, snapshot(element))),
                }
            }
        }
        selected.sort_by_key(|(order, _)| *order);
        selected.dedup();

        let nodes: Vec<Node> = selected.into_iter().map(|(_, node)| node).collect();
        Ok(if query.boolean {
            QueryResult::Boolean(!nodes.is_empty())
        } else if nodes.is_empty() {
            QueryResult::Empty
        } else {
            QueryResult::Nodes(nodes)
        })
    }
}

#[async_trait]
impl TransformProcessor for RoxmlProcessor {
    async fn parse(&self, source: &str) -> Result<DocumentHandle, TransformError> {
        parse_document(source)?;
        Ok(DocumentHandle::new(ParsedXml {
            text: source.to_string(),
        }))
    }

    fn query(&self, path: &str, document: &DocumentHandle) -> Result<QueryResult, TransformError> {
        let parsed = document.downcast_ref::<ParsedXml>().ok_or_else(|| {
            TransformError::Query("document was not parsed by RoxmlProcessor".to_string())
        })?;
        self.evaluate(&parsed.text, path)
    }

    async fn transform(
        &self,
        template: &str,
        _source: &str,
        _params: &TransformParams,
    ) -> Result<String, TransformError> {
        tracing::debug!(template, "stylesheet transform requested");
        Err(TransformError::Unsupported(format!(
            "no stylesheet engine available for {template}"
        )))
    }
}

/// MusicXML files carry a `<!DOCTYPE score-partwise ...>` declaration, so
/// DTDs are accepted. External entities are never fetched.
fn parse_document(text: &str) -> Result<Document<'_>, TransformError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(text, options).map_err(|e| TransformError::Parse(e.to_string()))
}

fn select<'a, 'input>(doc: &'a Document<'input>, path: &LocationPath) -> Vec<roxmltree::Node<'a, 'input>> {
    let Some((first, rest)) = path.steps.split_first() else {
        return Vec::new();
    };
    let mut current: Vec<roxmltree::Node> = doc
        .descendants()
        .filter(|node| matches_step(*node, first))
        .collect();
    for step in rest {
        current = current
            .iter()
            .flat_map(|context| context.children().filter(|node| matches_step(*node, step)))
            .collect();
    }
    current
}

fn matches_step(node: roxmltree::Node, step: &Step) -> bool {
    if !node.is_element() || node.tag_name().name() != step.name {
        return false;
    }
    match step.position {
        Some(position) => sibling_position(node) == position,
        None => true,
    }
}

fn sibling_position(node: roxmltree::Node) -> usize {
    let name = node.tag_name().name();
    let mut position = 1;
    let mut sibling = node.prev_sibling_element();
    while let Some(prev) = sibling {
        if prev.tag_name().name() == name {
            position += 1;
        }
        sibling = prev.prev_sibling_element();
    }
    position
}

fn snapshot(node: roxmltree::Node) -> Node {
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let text = text.trim();
    Node {
        name: node.tag_name().name().to_string(),
        attributes: node
            .attributes()
            .map(|attr| (attr.name().to_string(), attr.value().to_string()))
            .collect(),
        text: (!text.is_empty()).then(|| text.to_string()),
    }
}
