/// Parsed form of the path subset understood by [`crate::RoxmlProcessor`]:
/// `boolean(...)`, `|` unions, `//name(/name)*`, `[n]` positions and a
/// trailing `/@attr`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathQuery {
    pub boolean: bool,
    pub paths: Vec<LocationPath>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationPath {
    /// First step matches at any depth, later steps match children.
    pub steps: Vec<Step>,
    pub attribute: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    /// 1-based position among same-named siblings.
    pub position: Option<usize>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("unsupported path `{0}`")]
    Unsupported(String),
    #[error("invalid step `{0}`")]
    InvalidStep(String),
}

pub fn parse_path_query(expr: &str) -> Result<PathQuery, PathError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(PathError::Empty);
    }

    let (boolean, body) = match expr
        .strip_prefix("boolean(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, expr),
    };

    let paths = body
        .split('|')
        .map(parse_location_path)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PathQuery { boolean, paths })
}

fn parse_location_path(path: &str) -> Result<LocationPath, PathError> {
    let path = path.trim();
    let rest = path
        .strip_prefix("//")
        .ok_or_else(|| PathError::Unsupported(path.to_string()))?;

    let mut steps = Vec::new();
    let mut attribute = None;
    let parts: Vec<&str> = rest.split('/').collect();
    for (idx, part) in parts.iter().enumerate() {
        if let Some(name) = part.strip_prefix('@') {
            if idx + 1 != parts.len() || !is_name(name) {
                return Err(PathError::InvalidStep(part.to_string()));
            }
            attribute = Some(name.to_string());
        } else {
            steps.push(parse_step(part)?);
        }
    }

    if steps.is_empty() {
        return Err(PathError::Unsupported(path.to_string()));
    }
    Ok(LocationPath { steps, attribute })
}

fn parse_step(step: &str) -> Result<Step, PathError> {
    let invalid = || PathError::InvalidStep(step.to_string());
    let (name, position) = match step.split_once('[') {
        Some((name, predicate)) => {
            let index = predicate
                .strip_suffix(']')
                .and_then(|n| n.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
                .ok_or_else(invalid)?;
            (name, Some(index))
        }
        None => (step, None),
    };
    if !is_name(name) {
        return Err(invalid());
    }
    Ok(Step {
        name: name.to_string(),
        position,
    })
}

fn is_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}
