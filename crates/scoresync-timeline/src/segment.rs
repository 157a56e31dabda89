use crate::temporal_index::{floor_by_timestamp, Timestamped};
use crate::timemap::Timemap;
use crate::{MeasureIndex, Millis};
use serde::{Deserialize, Serialize};

/// Laid-out element of the score, in document order, without time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialElement {
    pub x: f64,
    pub y: f64,
    pub sx: f64,
    pub sy: f64,
    pub page: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub x: f64,
    pub y: f64,
    pub sx: f64,
    pub sy: f64,
    pub page: usize,
    pub timestamp: Millis,
    pub duration: Millis,
    pub measure: MeasureIndex,
}

impl Segment {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.sx / 2.0, self.y + self.sy / 2.0)
    }

    /// Half-open rectangle test against the box scaled by `scale`.
    pub fn contains(&self, px: f64, py: f64, scale: f64) -> bool {
        self.x * scale <= px
            && self.y * scale <= py
            && (self.x + self.sx) * scale > px
            && (self.y + self.sy) * scale > py
    }
}

impl Timestamped for Segment {
    fn timestamp(&self) -> Millis {
        self.timestamp
    }
}

/// Seek request produced from a point on the score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeekTarget {
    pub measure: MeasureIndex,
    pub measure_start: Millis,
    pub offset: Millis,
}

impl SeekTarget {
    pub fn timestamp(&self) -> Millis {
        self.measure_start + self.offset
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SegmentError {
    #[error("event {index}: position {position} is not a non-negative number")]
    InvalidPosition { index: usize, position: Millis },
    #[error("event {index}: position {position} comes before {previous}")]
    Unordered {
        index: usize,
        position: Millis,
        previous: Millis,
    },
}

/// Ratio between the on-screen container width and the page's native width.
pub fn scale_factor(container_width: f64, native_width: Option<f64>) -> f64 {
    match native_width {
        Some(native) if native > 0.0 && native.is_finite() => container_width / native,
        _ => 1.0,
    }
}

/// Spatial/temporal index of the laid-out score, owned by one renderer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SegmentIndex {
    segments: Vec<Segment>,
}

impl SegmentIndex {
    /// Zip elements (document order) with event positions (temporal order).
    ///
    /// Both lists come from the same unrolled score; when the counts differ the
    /// extra tail of the longer list is dropped.
    pub fn build(
        elements: &[SpatialElement],
        positions: &[Millis],
        timemap: &Timemap,
        total_duration: Millis,
    ) -> Result<Self, SegmentError> {
        if elements.len() != positions.len() {
            tracing::warn!(
                elements = elements.len(),
                events = positions.len(),
                "segment element and event counts differ, truncating"
            );
        }

        let count = elements.len().min(positions.len());
        let mut segments: Vec<Segment> = Vec::with_capacity(count);
        for (index, (element, &position)) in elements.iter().zip(positions).take(count).enumerate() {
            if !position.is_finite() || position < 0.0 {
                return Err(SegmentError::InvalidPosition { index, position });
            }
            if let Some(prev) = segments.last_mut() {
                if position < prev.timestamp {
                    return Err(SegmentError::Unordered {
                        index,
                        position,
                        previous: prev.timestamp,
                    });
                }
                prev.duration = position - prev.timestamp;
            }
            segments.push(Segment {
                x: element.x,
                y: element.y,
                sx: element.sx,
                sy: element.sy,
                page: element.page,
                timestamp: position,
                duration: 0.0,
                measure: timemap.floor_index(position).unwrap_or(0),
            });
        }

        if let Some(last) = segments.last_mut() {
            last.duration = (total_duration - last.timestamp).max(0.0);
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn floor_index(&self, timestamp: Millis) -> Option<usize> {
        floor_by_timestamp(&self.segments, timestamp)
    }

    /// Segment sounding at `timestamp`.
    pub fn segment_at(&self, timestamp: Millis) -> Option<&Segment> {
        self.floor_index(timestamp).map(|index| &self.segments[index])
    }

    /// First segment on `page` whose scaled box contains the point.
    pub fn hit_test(&self, page: usize, px: f64, py: f64, scale: f64) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|segment| segment.page == page && segment.contains(px, py, scale))
    }

    /// Turn a click into a seek request against `timemap`.
    pub fn seek_target_at(
        &self,
        page: usize,
        px: f64,
        py: f64,
        scale: f64,
        timemap: &Timemap,
    ) -> Option<SeekTarget> {
        let segment = self.hit_test(page, px, py, scale)?;
        let measure_start = timemap
            .get(segment.measure)
            .map(|entry| entry.timestamp)
            .unwrap_or(0.0);
        Some(SeekTarget {
            measure: segment.measure,
            measure_start,
            offset: segment.timestamp - measure_start,
        })
    }
}
