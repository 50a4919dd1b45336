//! Per-material partitioning of an index buffer.
//!
//! A model's indices are split into contiguous runs, one per material
//! switch. Each run is stored as `(material, end)` where `end` is the
//! cumulative index count; the previous run's end is the next run's start.

use crate::error::{ResourceError, ResourceResult};

/// One `(material, cumulative end)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawRange {
    pub material: u32,
    pub end: u32,
}

impl DrawRange {
    /// Range ending (exclusive) at index `end`.
    #[inline]
    pub const fn new(material: u32, end: u32) -> Self {
        Self { material, end }
    }
}

/// A resolved run of indices to draw with one material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawSpan {
    pub material: u32,
    pub first_index: u32,
    pub index_count: u32,
}

/// Draw ranges that are known to partition `[0, index_count)`.
///
/// Ends are non-decreasing, the first range starts at 0 and the last one
/// ends exactly at the index count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawRanges {
    ranges: Vec<DrawRange>,
}

impl DrawRanges {
    /// Validate `ranges` against an index buffer of `index_count` entries.
    pub fn new(ranges: Vec<DrawRange>, index_count: u32) -> ResourceResult<Self> {
        let Some(last) = ranges.last() else {
            return Err(ResourceError::InvalidDrawRanges(
                "at least one range is required".into(),
            ));
        };

        if last.end != index_count {
            return Err(ResourceError::InvalidDrawRanges(format!(
                "last range ends at {} but the index buffer has {} indices",
                last.end, index_count
            )));
        }

        if let Some(pair) = ranges.windows(2).find(|pair| pair[1].end < pair[0].end) {
            return Err(ResourceError::InvalidDrawRanges(format!(
                "range end {} follows larger end {}",
                pair[1].end, pair[0].end
            )));
        }

        Ok(Self { ranges })
    }

    /// A single range covering every index with material 0.
    pub fn single(index_count: u32) -> Self {
        Self {
            ranges: vec![DrawRange::new(0, index_count)],
        }
    }

    /// Ranges in index order.
    #[inline]
    pub fn as_slice(&self) -> &[DrawRange] {
        &self.ranges
    }

    /// Number of ranges, one per used material.
    #[inline]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// `true` for a model with no indices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Index count covered by all ranges.
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.ranges.last().map_or(0, |r| r.end)
    }

    /// Highest material index referenced.
    pub fn max_material(&self) -> u32 {
        self.ranges.iter().map(|r| r.material).max().unwrap_or(0)
    }

    /// Iterate the ranges as `(material, first_index, index_count)` spans.
    pub fn spans(&self) -> impl Iterator<Item = DrawSpan> + '_ {
        let mut previous_end = 0;
        self.ranges.iter().map(move |range| {
            let span = DrawSpan {
                material: range.material,
                first_index: previous_end,
                index_count: range.end - previous_end,
            };
            previous_end = range.end;
            span
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_follow_cumulative_ends() {
        let ranges =
            DrawRanges::new(vec![DrawRange::new(0, 300), DrawRange::new(1, 450)], 450).unwrap();
        let spans: Vec<DrawSpan> = ranges.spans().collect();
        assert_eq!(
            spans,
            vec![
                DrawSpan {
                    material: 0,
                    first_index: 0,
                    index_count: 300
                },
                DrawSpan {
                    material: 1,
                    first_index: 300,
                    index_count: 150
                },
            ]
        );
        assert_eq!(ranges.index_count(), 450);
        assert_eq!(ranges.max_material(), 1);
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            DrawRanges::new(Vec::new(), 0),
            Err(ResourceError::InvalidDrawRanges(_))
        ));
    }

    #[test]
    fn test_rejects_decreasing_end() {
        let result = DrawRanges::new(
            vec![
                DrawRange::new(0, 300),
                DrawRange::new(1, 200),
                DrawRange::new(2, 450),
            ],
            450,
        );
        assert!(matches!(result, Err(ResourceError::InvalidDrawRanges(_))));
    }

    #[test]
    fn test_rejects_short_final_end() {
        let result = DrawRanges::new(vec![DrawRange::new(0, 300)], 450);
        assert!(matches!(result, Err(ResourceError::InvalidDrawRanges(_))));
    }

    #[test]
    fn test_equal_ends_give_empty_span() {
        let ranges =
            DrawRanges::new(vec![DrawRange::new(0, 6), DrawRange::new(1, 6)], 6).unwrap();
        let counts: Vec<u32> = ranges.spans().map(|s| s.index_count).collect();
        assert_eq!(counts, vec![6, 0]);
    }

    #[test]
    fn test_single() {
        let ranges = DrawRanges::single(36);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges.spans().next().unwrap().index_count, 36);
    }
}
