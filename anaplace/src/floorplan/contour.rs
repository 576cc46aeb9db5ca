/// One maximal interval of the skyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourSegment {
    pub start: f64,
    pub end: f64,
    pub height: f64,
}

/// Skyline of the placed rectangles projected onto one axis.
///
/// Segments are kept sorted by `start`, pairwise non-overlapping and of
/// positive width; adjacent segments of equal height are coalesced. Queries
/// locate the first overlapping segment by binary search and scan linearly
/// from there. All operations are total: degenerate input is a no-op.
#[derive(Debug, Clone, Default)]
pub struct Contour {
    segments: Vec<ContourSegment>,
    max_coordinate: f64,
    max_height: f64,
}

impl Contour {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.max_coordinate = 0.0;
        self.max_height = 0.0;
    }

    /// Raises the skyline over `[start, end)` to at least `height`.
    ///
    /// Overlapped segments are split at `start` and `end`; the portions
    /// outside the interval, and portions already higher than `height`,
    /// keep their previous height.
    pub fn add_segment(&mut self, start: f64, end: f64, height: f64) {
        if start >= end {
            return;
        }
        self.max_coordinate = self.max_coordinate.max(end);
        self.max_height = self.max_height.max(height);

        let mut rebuilt = Vec::with_capacity(self.segments.len() + 2);
        // part of [start, end) not yet emitted
        let mut cursor = start;

        for seg in &self.segments {
            if seg.end <= start {
                rebuilt.push(*seg);
                continue;
            }
            if seg.start >= end {
                if cursor < end {
                    rebuilt.push(ContourSegment { start: cursor, end, height });
                    cursor = end;
                }
                rebuilt.push(*seg);
                continue;
            }
            // the segment overlaps [start, end)
            if seg.start < start {
                rebuilt.push(ContourSegment {
                    start: seg.start,
                    end: start,
                    height: seg.height,
                });
            }
            if cursor < seg.start {
                rebuilt.push(ContourSegment {
                    start: cursor,
                    end: seg.start,
                    height,
                });
                cursor = seg.start;
            }
            let overlap_end = seg.end.min(end);
            rebuilt.push(ContourSegment {
                start: cursor.max(seg.start),
                end: overlap_end,
                height: seg.height.max(height),
            });
            cursor = overlap_end;
            if seg.end > end {
                rebuilt.push(ContourSegment {
                    start: end,
                    end: seg.end,
                    height: seg.height,
                });
            }
        }
        if cursor < end {
            rebuilt.push(ContourSegment { start: cursor, end, height });
        }

        self.segments = rebuilt;
        self.coalesce();
    }

    /// Maximum height over `[start, end)`; 0 where nothing has been placed.
    pub fn height(&self, start: f64, end: f64) -> f64 {
        if start >= end || self.segments.is_empty() {
            return 0.0;
        }
        // first segment with start' >= start, minus one if its predecessor
        // still reaches into the queried range
        let mut idx = self.segments.partition_point(|s| s.start < start);
        if idx > 0 && self.segments[idx - 1].end > start {
            idx -= 1;
        }

        let mut max_height: f64 = 0.0;
        while idx < self.segments.len() && self.segments[idx].start < end {
            max_height = max_height.max(self.segments[idx].height);
            idx += 1;
        }
        max_height
    }

    /// Pointwise maximum of the two skylines across the union of their breakpoints.
    pub fn merge(&mut self, other: &Contour) {
        let mut breakpoints: Vec<f64> = self
            .segments
            .iter()
            .chain(other.segments.iter())
            .flat_map(|s| [s.start, s.end])
            .collect();
        breakpoints.sort_by(|a, b| a.partial_cmp(b).unwrap());
        breakpoints.dedup();

        let mut merged = Vec::with_capacity(breakpoints.len().saturating_sub(1));
        for window in breakpoints.windows(2) {
            let (start, end) = (window[0], window[1]);
            let height = self.height(start, end).max(other.height(start, end));
            merged.push(ContourSegment { start, end, height });
        }

        self.segments = merged;
        self.max_coordinate = self.max_coordinate.max(other.max_coordinate);
        self.max_height = self.max_height.max(other.max_height);
        self.coalesce();
    }

    pub fn segments(&self) -> &[ContourSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn max_coordinate(&self) -> f64 {
        self.max_coordinate
    }

    pub fn max_height(&self) -> f64 {
        self.max_height
    }

    /// Fuses adjacent contiguous segments of equal height.
    fn coalesce(&mut self) {
        if self.segments.len() <= 1 {
            return;
        }
        let mut merged: Vec<ContourSegment> = Vec::with_capacity(self.segments.len());
        for seg in self.segments.drain(..) {
            match merged.last_mut() {
                Some(last) if last.end == seg.start && last.height == seg.height => {
                    last.end = seg.end;
                }
                _ => merged.push(seg),
            }
        }
        self.segments = merged;
    }
}
