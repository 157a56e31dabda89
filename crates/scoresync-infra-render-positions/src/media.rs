use scoresync_ports::{DocumentHandle, Millis, RendererError, TransformProcessor};
use scoresync_timeline::SpatialElement;
use serde::{Deserialize, Serialize};

/// Engraver positions are in dots; the pages are rendered at 96 dpi.
pub const DOTS_PER_PIXEL: f64 = (72.0 * 5.0 * 12.0) / 96.0;

const ELEMENTS_QUERY: &str = "//elements/element";
const EVENTS_QUERY: &str = "//events/event";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePage {
    pub svg: String,
    /// Width the page was laid out at, in pixels. `None` keeps a 1:1 scale.
    pub native_width: Option<f64>,
}

/// Pre-engraved score: page images plus the measure and segment position
/// files written next to them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreMedia {
    pub pages: Vec<ScorePage>,
    pub measure_positions: String,
    pub segment_positions: String,
    pub duration_secs: f64,
}

pub(crate) async fn read_measure_positions(
    transform: &dyn TransformProcessor,
    xml: &str,
) -> Result<Vec<SpatialElement>, RendererError> {
    let doc = parse(transform, xml).await?;
    read_elements(transform, &doc)
}

pub(crate) async fn read_segment_positions(
    transform: &dyn TransformProcessor,
    xml: &str,
) -> Result<(Vec<SpatialElement>, Vec<Millis>), RendererError> {
    let doc = parse(transform, xml).await?;
    let elements = read_elements(transform, &doc)?;
    let events = transform
        .query(EVENTS_QUERY, &doc)
        .map_err(|e| RendererError::Layout(e.to_string()))?;
    let positions = events
        .nodes()
        .iter()
        .enumerate()
        .map(|(index, node)| {
            node.attribute_f64("position").ok_or_else(|| {
                RendererError::Layout(format!("event {index} has no position"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((elements, positions))
}

async fn parse(transform: &dyn TransformProcessor, xml: &str) -> Result<DocumentHandle, RendererError> {
    transform
        .parse(xml)
        .await
        .map_err(|e| RendererError::Layout(format!("unreadable positions: {e}")))
}

fn read_elements(
    transform: &dyn TransformProcessor,
    doc: &DocumentHandle,
) -> Result<Vec<SpatialElement>, RendererError> {
    let result = transform
        .query(ELEMENTS_QUERY, doc)
        .map_err(|e| RendererError::Layout(e.to_string()))?;
    result
        .nodes()
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let dots = |name: &str| {
                node.attribute_f64(name)
                    .map(|value| value / DOTS_PER_PIXEL)
                    .ok_or_else(|| RendererError::Layout(format!("element {index} has no `{name}`")))
            };
            let page = node
                .attribute("page")
                .and_then(|page| page.trim().parse::<usize>().ok())
                .unwrap_or(0);
            Ok(SpatialElement {
                x: dots("x")?,
                y: dots("y")?,
                sx: dots("sx")?,
                sy: dots("sy")?,
                page,
            })
        })
        .collect()
}
