use crate::error::PlayerError;
use async_trait::async_trait;
use scoresync_ports::{
    DocumentHandle, PlayerConfig, QueryResult, TransformError, TransformParams, TransformProcessor,
};
use scoresync_timeline::Timemap;
use serde_json::Value;
use std::collections::BTreeMap;

const VALIDATE_QUERY: &str = "boolean(//score-partwise | //score-timewise)";
const VERSION_QUERY: &str = "//score-partwise/@version | //score-timewise/@version";
pub const TITLE_QUERY: &str = "//work-title";

/// Metadata read while loading a score.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoreInfo {
    pub version: Option<String>,
    pub queries: BTreeMap<String, Option<String>>,
}

impl ScoreInfo {
    pub fn query(&self, name: &str) -> Option<&str> {
        self.queries.get(name).and_then(|value| value.as_deref())
    }
}

/// Transform processor used when the host supplies none.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTransform;

#[async_trait]
impl TransformProcessor for NullTransform {
    async fn parse(&self, _source: &str) -> Result<DocumentHandle, TransformError> {
        Err(unsupported())
    }

    fn query(&self, _path: &str, _document: &DocumentHandle) -> Result<QueryResult, TransformError> {
        Err(unsupported())
    }

    async fn transform(
        &self,
        _template: &str,
        _source: &str,
        _params: &TransformParams,
    ) -> Result<String, TransformError> {
        Err(unsupported())
    }
}

fn unsupported() -> TransformError {
    TransformError::Unsupported("no transform processor configured".to_string())
}

/// Parses and validates a score, then runs the named `queries` against it.
pub async fn load_score(
    score: &str,
    transform: &dyn TransformProcessor,
    queries: &[(&str, &str)],
) -> Result<ScoreInfo, PlayerError> {
    let document = match transform.parse(score).await {
        Ok(document) => document,
        Err(TransformError::Unsupported(reason)) => {
            tracing::warn!(%reason, "score validation skipped");
            return Ok(ScoreInfo::default());
        }
        Err(err) => return Err(PlayerError::InvalidScore(err.to_string())),
    };

    let valid = transform
        .query(VALIDATE_QUERY, &document)
        .map_err(|e| PlayerError::InvalidScore(e.to_string()))?;
    if !valid.as_bool() {
        return Err(PlayerError::InvalidScore(
            "not a partwise or timewise score".to_string(),
        ));
    }

    let version = transform
        .query(VERSION_QUERY, &document)
        .ok()
        .and_then(|result| result.first_value());
    tracing::info!(
        version = version.as_deref().unwrap_or("(unknown)"),
        "score loaded"
    );

    let queries = queries
        .iter()
        .map(|(name, path)| {
            let value = match transform.query(path, &document) {
                Ok(result) => result.first_value(),
                Err(err) => {
                    tracing::debug!(query = %name, error = %err, "score query failed");
                    None
                }
            };
            (name.to_string(), value)
        })
        .collect();

    Ok(ScoreInfo { version, queries })
}

/// Expands repeats and jumps. Any failure keeps the original score.
pub async fn unroll_score(
    score: &str,
    config: &PlayerConfig,
    transform: &dyn TransformProcessor,
) -> String {
    let mut params = TransformParams::new();
    params.insert("renumberMeasures".to_string(), Value::Bool(true));
    match transform
        .transform(&config.unroll_xsl_uri, score, &params)
        .await
    {
        Ok(unrolled) if unrolled.contains("<note") => unrolled,
        Ok(_) => {
            tracing::warn!("unrolled score has no notes, keeping original");
            score.to_string()
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to unroll score");
            score.to_string()
        }
    }
}

/// Builds a timemap through the timemap stylesheet. Any failure yields an
/// empty timemap.
pub async fn derive_timemap(
    score: &str,
    timemap_xsl_uri: &str,
    transform: &dyn TransformProcessor,
) -> Timemap {
    let mut params = TransformParams::new();
    params.insert("useSef".to_string(), Value::Bool(true));
    let json = match transform.transform(timemap_xsl_uri, score, &params).await {
        Ok(json) => json,
        Err(err) => {
            tracing::error!(error = %err, "failed to derive timemap");
            return Timemap::empty();
        }
    };
    match Timemap::from_json_str(&json) {
        Ok(timemap) => timemap,
        Err(err) => {
            tracing::error!(error = %err, "invalid timemap");
            Timemap::empty()
        }
    }
}
