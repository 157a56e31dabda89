use crate::Millis;
use std::cmp::Ordering;

/// Two timestamps closer than this are the same instant. Transform pipelines
/// accumulate rounding well below a microsecond.
pub const TIMESTAMP_EPSILON: Millis = 1e-3;

pub trait Timestamped {
    fn timestamp(&self) -> Millis;
}

impl Timestamped for Millis {
    fn timestamp(&self) -> Millis {
        *self
    }
}

pub fn compare_timestamps(a: Millis, b: Millis) -> Ordering {
    let delta = a - b;
    if delta.abs() < TIMESTAMP_EPSILON {
        Ordering::Equal
    } else if delta < 0.0 {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Binary search over a sorted slice.
///
/// `Ok(index)` is an exact match, `Err(index)` the insertion point that keeps
/// the slice sorted.
pub fn search_by<T, F>(items: &[T], mut cmp: F) -> Result<usize, usize>
where
    F: FnMut(&T) -> Ordering,
{
    let mut lo = 0usize;
    let mut hi = items.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match cmp(&items[mid]) {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
            Ordering::Equal => return Ok(mid),
        }
    }
    Err(lo)
}

/// Index of the entry in effect at the searched key: the exact match, or the
/// entry right before the insertion point. A key before the first entry floors
/// to 0 and a key after the last entry floors to the last index.
pub fn floor_index(found: Result<usize, usize>) -> usize {
    match found {
        Ok(index) => index,
        Err(insert_at) => insert_at.saturating_sub(1),
    }
}

pub fn search_timestamp<T: Timestamped>(items: &[T], target: Millis) -> Result<usize, usize> {
    search_by(items, |item| compare_timestamps(item.timestamp(), target))
}

/// `None` only when `items` is empty.
pub fn floor_by_timestamp<T: Timestamped>(items: &[T], target: Millis) -> Option<usize> {
    if items.is_empty() {
        return None;
    }
    Some(floor_index(search_timestamp(items, target)))
}
